// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! EGL display connection.

use std::sync::Arc;

use crate::error::{EglStreamError, Result};
use crate::error_codes::EglError;
use crate::platform::constants::{EGL_CLIENT_APIS, EGL_EXTENSIONS, EGL_VENDOR, EGL_VERSION};
use crate::platform::{EGLDisplay, EGLint, EglPlatform};

/// Platform identification strings, for logs only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayDiagnostics {
    pub client_apis: Option<String>,
    pub extensions: Option<String>,
    pub vendor: Option<String>,
    pub version: Option<String>,
    pub config_count: Option<EGLint>,
}

/// The process's initialized EGL display.
///
/// Every [`Stream`](crate::Stream) borrows the context it was created
/// against, so the display cannot be terminated while a stream is alive.
/// Dropping the context calls `eglTerminate`.
pub struct DisplayContext {
    platform: Arc<dyn EglPlatform>,
    display: EGLDisplay,
    version: (EGLint, EGLint),
}

// SAFETY: EGLDisplay is an opaque handle that EGL allows to be used from any
// thread. The context never mutates it after initialization.
unsafe impl Send for DisplayContext {}
unsafe impl Sync for DisplayContext {}

impl DisplayContext {
    /// Open and initialize the default display.
    pub fn open(platform: Arc<dyn EglPlatform>) -> Result<Self> {
        let display = platform
            .default_display()
            .ok_or(EglStreamError::DisplayUnavailable)?;

        let Some(version) = platform.initialize(display) else {
            let code = platform.last_error();
            tracing::error!("eglInitialize rejected: 0x{:04x}", code);
            return Err(EglStreamError::DisplayNotInitialized {
                code: EglError::from_code(code),
            });
        };

        tracing::info!("EGL display initialized, version {}.{}", version.0, version.1);

        Ok(Self {
            platform,
            display,
            version,
        })
    }

    pub fn raw(&self) -> EGLDisplay {
        self.display
    }

    /// `(major, minor)` reported by `eglInitialize`.
    pub fn version(&self) -> (EGLint, EGLint) {
        self.version
    }

    pub fn platform(&self) -> &dyn EglPlatform {
        self.platform.as_ref()
    }

    pub fn query_string(&self, name: EGLint) -> Option<String> {
        let value = self.platform.query_string(self.display, name);
        if value.is_none() {
            tracing::debug!(
                "eglQueryString(0x{:04x}) failed: 0x{:04x}",
                name,
                self.platform.last_error()
            );
        }
        value
    }

    /// Whether `name` appears in `EGL_EXTENSIONS`.
    pub fn has_extension(&self, name: &str) -> bool {
        self.query_string(EGL_EXTENSIONS)
            .is_some_and(|extensions| extensions.split_whitespace().any(|ext| ext == name))
    }

    pub fn diagnostics(&self) -> DisplayDiagnostics {
        DisplayDiagnostics {
            client_apis: self.query_string(EGL_CLIENT_APIS),
            extensions: self.query_string(EGL_EXTENSIONS),
            vendor: self.query_string(EGL_VENDOR),
            version: self.query_string(EGL_VERSION),
            config_count: self.platform.config_count(self.display),
        }
    }

    pub fn log_diagnostics(&self) {
        let diag = self.diagnostics();
        let unavailable = || "<unavailable>".to_string();
        tracing::info!("EGL_CLIENT_APIS: {}", diag.client_apis.unwrap_or_else(unavailable));
        tracing::info!("EGL_EXTENSIONS: {}", diag.extensions.unwrap_or_else(unavailable));
        tracing::info!("EGL_VENDOR: {}", diag.vendor.unwrap_or_else(unavailable));
        tracing::info!("EGL_VERSION: {}", diag.version.unwrap_or_else(unavailable));
        match diag.config_count {
            Some(count) => tracing::info!("EGL configs: {}", count),
            None => tracing::info!("EGL configs: <unavailable>"),
        }
    }
}

impl Drop for DisplayContext {
    fn drop(&mut self) {
        if self.platform.terminate(self.display) {
            tracing::info!("EGL display terminated");
        } else {
            let code = self.platform.last_error();
            tracing::warn!("eglTerminate failed: {}", EglError::from_code(code));
        }
    }
}

impl std::fmt::Debug for DisplayContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplayContext")
            .field("display", &self.display)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}
