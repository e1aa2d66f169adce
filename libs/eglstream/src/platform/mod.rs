// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! EGL client-library seam.
//!
//! Everything above this module talks to EGL through [`EglPlatform`]. The
//! production implementation, [`LibEgl`], loads `libEGL.so.1` at runtime;
//! [`StubPlatform`] is an in-process stand-in that models the stream state
//! machine without a GPU.

pub mod constants;
mod libegl;
pub mod stub;

use std::ffi::c_void;

pub use libegl::LibEgl;
pub use stub::StubPlatform;

/// `EGLint`.
pub type EGLint = i32;
/// `EGLenum`.
pub type EGLenum = u32;
/// `EGLBoolean`.
pub type EGLBoolean = u32;
/// `EGLuint64KHR`.
pub type EGLuint64KHR = u64;
/// `EGLDisplay`.
pub type EGLDisplay = *mut c_void;
/// `EGLStreamKHR`.
pub type EGLStreamKHR = *mut c_void;
/// `EGLConfig`.
pub type EGLConfig = *mut c_void;
/// `EGLNativeDisplayType`.
pub type EGLNativeDisplayType = *mut c_void;

/// `eglCreateStreamKHR`.
pub type CreateStreamFn =
    unsafe extern "C" fn(dpy: EGLDisplay, attrib_list: *const EGLint) -> EGLStreamKHR;
/// `eglDestroyStreamKHR`.
pub type DestroyStreamFn = unsafe extern "C" fn(dpy: EGLDisplay, stream: EGLStreamKHR) -> EGLBoolean;
/// `eglQueryStreamKHR`.
pub type QueryStreamFn = unsafe extern "C" fn(
    dpy: EGLDisplay,
    stream: EGLStreamKHR,
    attribute: EGLenum,
    value: *mut EGLint,
) -> EGLBoolean;
/// `eglQueryStreamu64KHR`.
pub type QueryStreamU64Fn = unsafe extern "C" fn(
    dpy: EGLDisplay,
    stream: EGLStreamKHR,
    attribute: EGLenum,
    value: *mut EGLuint64KHR,
) -> EGLBoolean;

/// Base EGL entry points a process needs before any extension is resolved.
///
/// Implementations must be callable from any thread. Display and stream
/// handles are passed through untouched; the implementation never retains
/// them beyond the call.
pub trait EglPlatform: Send + Sync {
    /// `eglGetDisplay(EGL_DEFAULT_DISPLAY)`. `None` for `EGL_NO_DISPLAY`.
    fn default_display(&self) -> Option<EGLDisplay>;

    /// `eglInitialize`. Returns the reported `(major, minor)` version, or
    /// `None` when the platform rejected initialization.
    fn initialize(&self, display: EGLDisplay) -> Option<(EGLint, EGLint)>;

    /// `eglTerminate`. `false` when the platform rejected termination.
    fn terminate(&self, display: EGLDisplay) -> bool;

    /// `eglQueryString`. `None` when the platform returned NULL.
    fn query_string(&self, display: EGLDisplay, name: EGLint) -> Option<String>;

    /// `eglGetConfigs` with a NULL config array, i.e. the number of
    /// framebuffer configurations the display exposes.
    fn config_count(&self, display: EGLDisplay) -> Option<EGLint>;

    /// `eglGetError`. Reading the error resets it to `EGL_SUCCESS`.
    fn last_error(&self) -> EGLint;

    /// `eglGetProcAddress`. Null when the entry point is not provided.
    fn proc_address(&self, name: &str) -> *const c_void;
}
