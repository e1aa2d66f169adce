// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! EGL enumerants used by the stream subsystem.
//!
//! Values come from the Khronos `egl.h` / `eglext.h` registry headers.

use super::{EGLint, EGLenum};

pub const EGL_FALSE: EGLint = 0;
pub const EGL_TRUE: EGLint = 1;
pub const EGL_NONE: EGLint = 0x3038;

// eglQueryString names
pub const EGL_VENDOR: EGLint = 0x3053;
pub const EGL_VERSION: EGLint = 0x3054;
pub const EGL_EXTENSIONS: EGLint = 0x3055;
pub const EGL_CLIENT_APIS: EGLint = 0x308D;

// Errors
pub const EGL_SUCCESS: EGLint = 0x3000;
pub const EGL_NOT_INITIALIZED: EGLint = 0x3001;
pub const EGL_BAD_ACCESS: EGLint = 0x3002;
pub const EGL_BAD_ALLOC: EGLint = 0x3003;
pub const EGL_BAD_ATTRIBUTE: EGLint = 0x3004;
pub const EGL_BAD_CONFIG: EGLint = 0x3005;
pub const EGL_BAD_CONTEXT: EGLint = 0x3006;
pub const EGL_BAD_CURRENT_SURFACE: EGLint = 0x3007;
pub const EGL_BAD_DISPLAY: EGLint = 0x3008;
pub const EGL_BAD_MATCH: EGLint = 0x3009;
pub const EGL_BAD_NATIVE_PIXMAP: EGLint = 0x300A;
pub const EGL_BAD_NATIVE_WINDOW: EGLint = 0x300B;
pub const EGL_BAD_PARAMETER: EGLint = 0x300C;
pub const EGL_BAD_SURFACE: EGLint = 0x300D;
pub const EGL_CONTEXT_LOST: EGLint = 0x300E;
pub const EGL_BAD_STREAM_KHR: EGLint = 0x321B;
pub const EGL_BAD_STATE_KHR: EGLint = 0x321C;

// EGL_KHR_stream
pub const EGL_CONSUMER_LATENCY_USEC_KHR: EGLint = 0x3210;
pub const EGL_PRODUCER_FRAME_KHR: EGLenum = 0x3212;
pub const EGL_CONSUMER_FRAME_KHR: EGLenum = 0x3213;
pub const EGL_STREAM_STATE_KHR: EGLenum = 0x3214;
pub const EGL_STREAM_STATE_CREATED_KHR: EGLint = 0x3215;
pub const EGL_STREAM_STATE_CONNECTING_KHR: EGLint = 0x3216;
pub const EGL_STREAM_STATE_EMPTY_KHR: EGLint = 0x3217;
pub const EGL_STREAM_STATE_NEW_FRAME_AVAILABLE_KHR: EGLint = 0x3218;
pub const EGL_STREAM_STATE_OLD_FRAME_AVAILABLE_KHR: EGLint = 0x3219;
pub const EGL_STREAM_STATE_DISCONNECTED_KHR: EGLint = 0x321A;
pub const EGL_CONSUMER_ACQUIRE_TIMEOUT_USEC_KHR: EGLint = 0x321E;

// EGL_NV_stream_reuse
pub const EGL_SUPPORT_REUSE_NV: EGLint = 0x3335;

// EGL_NV_stream_remote
pub const EGL_STREAM_STATE_INITIALIZING_NV: EGLint = 0x3240;
pub const EGL_STREAM_TYPE_NV: EGLint = 0x3241;
pub const EGL_STREAM_PROTOCOL_NV: EGLint = 0x3242;
pub const EGL_STREAM_ENDPOINT_NV: EGLint = 0x3243;
pub const EGL_STREAM_LOCAL_NV: EGLint = 0x3244;
pub const EGL_STREAM_CROSS_PROCESS_NV: EGLint = 0x3245;
pub const EGL_STREAM_PROTOCOL_FD_NV: EGLint = 0x3246;
pub const EGL_STREAM_PRODUCER_NV: EGLint = 0x3247;
pub const EGL_STREAM_CONSUMER_NV: EGLint = 0x3248;

// EGL_NV_stream_socket / EGL_NV_stream_socket_unix
pub const EGL_STREAM_PROTOCOL_SOCKET_NV: EGLint = 0x324B;
pub const EGL_SOCKET_HANDLE_NV: EGLint = 0x324C;
pub const EGL_SOCKET_TYPE_NV: EGLint = 0x324D;
pub const EGL_SOCKET_TYPE_UNIX_NV: EGLint = 0x324E;
