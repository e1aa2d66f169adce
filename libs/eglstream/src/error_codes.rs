// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! EGL error code translation.
//!
//! [`EglError::from_code`] is total: every `EGLint` maps to a known variant
//! or to [`EglError::Unknown`].

use std::fmt;

use crate::platform::constants::*;
use crate::platform::EGLint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EglError {
    Success,
    NotInitialized,
    BadAccess,
    BadAlloc,
    BadAttribute,
    BadConfig,
    BadContext,
    BadCurrentSurface,
    BadDisplay,
    BadMatch,
    BadNativePixmap,
    BadNativeWindow,
    BadParameter,
    BadSurface,
    ContextLost,
    BadStream,
    BadState,
    /// A code outside the EGL core and stream extension registries.
    Unknown(EGLint),
}

impl EglError {
    pub fn from_code(code: EGLint) -> Self {
        match code {
            EGL_SUCCESS => Self::Success,
            EGL_NOT_INITIALIZED => Self::NotInitialized,
            EGL_BAD_ACCESS => Self::BadAccess,
            EGL_BAD_ALLOC => Self::BadAlloc,
            EGL_BAD_ATTRIBUTE => Self::BadAttribute,
            EGL_BAD_CONFIG => Self::BadConfig,
            EGL_BAD_CONTEXT => Self::BadContext,
            EGL_BAD_CURRENT_SURFACE => Self::BadCurrentSurface,
            EGL_BAD_DISPLAY => Self::BadDisplay,
            EGL_BAD_MATCH => Self::BadMatch,
            EGL_BAD_NATIVE_PIXMAP => Self::BadNativePixmap,
            EGL_BAD_NATIVE_WINDOW => Self::BadNativeWindow,
            EGL_BAD_PARAMETER => Self::BadParameter,
            EGL_BAD_SURFACE => Self::BadSurface,
            EGL_CONTEXT_LOST => Self::ContextLost,
            EGL_BAD_STREAM_KHR => Self::BadStream,
            EGL_BAD_STATE_KHR => Self::BadState,
            other => Self::Unknown(other),
        }
    }

    pub fn code(&self) -> EGLint {
        match self {
            Self::Success => EGL_SUCCESS,
            Self::NotInitialized => EGL_NOT_INITIALIZED,
            Self::BadAccess => EGL_BAD_ACCESS,
            Self::BadAlloc => EGL_BAD_ALLOC,
            Self::BadAttribute => EGL_BAD_ATTRIBUTE,
            Self::BadConfig => EGL_BAD_CONFIG,
            Self::BadContext => EGL_BAD_CONTEXT,
            Self::BadCurrentSurface => EGL_BAD_CURRENT_SURFACE,
            Self::BadDisplay => EGL_BAD_DISPLAY,
            Self::BadMatch => EGL_BAD_MATCH,
            Self::BadNativePixmap => EGL_BAD_NATIVE_PIXMAP,
            Self::BadNativeWindow => EGL_BAD_NATIVE_WINDOW,
            Self::BadParameter => EGL_BAD_PARAMETER,
            Self::BadSurface => EGL_BAD_SURFACE,
            Self::ContextLost => EGL_CONTEXT_LOST,
            Self::BadStream => EGL_BAD_STREAM_KHR,
            Self::BadState => EGL_BAD_STATE_KHR,
            Self::Unknown(code) => *code,
        }
    }

    /// Registry name of the error, e.g. `EGL_BAD_ATTRIBUTE`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Success => "EGL_SUCCESS",
            Self::NotInitialized => "EGL_NOT_INITIALIZED",
            Self::BadAccess => "EGL_BAD_ACCESS",
            Self::BadAlloc => "EGL_BAD_ALLOC",
            Self::BadAttribute => "EGL_BAD_ATTRIBUTE",
            Self::BadConfig => "EGL_BAD_CONFIG",
            Self::BadContext => "EGL_BAD_CONTEXT",
            Self::BadCurrentSurface => "EGL_BAD_CURRENT_SURFACE",
            Self::BadDisplay => "EGL_BAD_DISPLAY",
            Self::BadMatch => "EGL_BAD_MATCH",
            Self::BadNativePixmap => "EGL_BAD_NATIVE_PIXMAP",
            Self::BadNativeWindow => "EGL_BAD_NATIVE_WINDOW",
            Self::BadParameter => "EGL_BAD_PARAMETER",
            Self::BadSurface => "EGL_BAD_SURFACE",
            Self::ContextLost => "EGL_CONTEXT_LOST",
            Self::BadStream => "EGL_BAD_STREAM_KHR",
            Self::BadState => "EGL_BAD_STATE_KHR",
            Self::Unknown(_) => "EGL_UNKNOWN_ERROR",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::Success => "The last function succeeded without error.",
            Self::NotInitialized => {
                "EGL is not initialized, or could not be initialized, for the specified display."
            }
            Self::BadAccess => "EGL cannot access a requested resource.",
            Self::BadAlloc => "EGL failed to allocate resources for the requested operation.",
            Self::BadAttribute => {
                "An unrecognized attribute or attribute value was passed in the attribute list."
            }
            Self::BadConfig => "An EGLConfig argument does not name a valid EGL frame buffer configuration.",
            Self::BadContext => "An EGLContext argument does not name a valid EGL rendering context.",
            Self::BadCurrentSurface => "The current surface of the calling thread is no longer valid.",
            Self::BadDisplay => "An EGLDisplay argument does not name a valid EGL display connection.",
            Self::BadMatch => "Arguments are inconsistent.",
            Self::BadNativePixmap => "A NativePixmapType argument does not refer to a valid native pixmap.",
            Self::BadNativeWindow => "A NativeWindowType argument does not refer to a valid native window.",
            Self::BadParameter => "One or more argument values are invalid.",
            Self::BadSurface => "An EGLSurface argument does not name a valid surface.",
            Self::ContextLost => "A power management event has occurred.",
            Self::BadStream => "An EGLStreamKHR argument does not name a valid stream.",
            Self::BadState => "The stream is not in a valid state for the requested operation.",
            Self::Unknown(_) => "Unknown platform error.",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl fmt::Display for EglError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:04x}): {}", self.name(), self.code(), self.message())
    }
}
