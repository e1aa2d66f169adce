// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! `libEGL.so.1` loaded at runtime.

use std::ffi::{c_char, c_void, CStr, CString};
use std::ptr;

use libloading::Library;

use super::{EGLBoolean, EGLConfig, EGLDisplay, EGLNativeDisplayType, EGLint, EglPlatform};
use crate::error::{EglStreamError, Result};
use crate::platform::constants::EGL_SUCCESS;

type GetDisplayFn = unsafe extern "C" fn(EGLNativeDisplayType) -> EGLDisplay;
type InitializeFn = unsafe extern "C" fn(EGLDisplay, *mut EGLint, *mut EGLint) -> EGLBoolean;
type TerminateFn = unsafe extern "C" fn(EGLDisplay) -> EGLBoolean;
type QueryStringFn = unsafe extern "C" fn(EGLDisplay, EGLint) -> *const c_char;
type GetConfigsFn = unsafe extern "C" fn(EGLDisplay, *mut EGLConfig, EGLint, *mut EGLint) -> EGLBoolean;
type GetErrorFn = unsafe extern "C" fn() -> EGLint;
type GetProcAddressFn = unsafe extern "C" fn(*const c_char) -> *const c_void;

/// Library names tried in order by [`LibEgl::load`].
pub const LIBEGL_CANDIDATES: &[&str] = &["libEGL.so.1", "libEGL.so"];

/// Dynamically loaded EGL client library.
///
/// Core entry points are resolved with `dlsym` once at load time. The
/// library handle is kept alive for as long as this value exists, so every
/// function pointer below stays valid.
pub struct LibEgl {
    get_display: GetDisplayFn,
    initialize: InitializeFn,
    terminate: TerminateFn,
    query_string: QueryStringFn,
    get_configs: GetConfigsFn,
    get_error: GetErrorFn,
    get_proc_address: GetProcAddressFn,
    library_name: String,
    _library: Library,
}

impl LibEgl {
    /// Load the system EGL library, trying [`LIBEGL_CANDIDATES`] in order.
    pub fn load() -> Result<Self> {
        let mut last_err = None;
        for name in LIBEGL_CANDIDATES {
            match Self::load_from(name) {
                Ok(lib) => return Ok(lib),
                Err(e) => {
                    tracing::debug!("Could not load {}: {}", name, e);
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or(EglStreamError::DisplayUnavailable))
    }

    /// Load EGL from an explicit library name or path.
    pub fn load_from(name: &str) -> Result<Self> {
        let load_err = |source| EglStreamError::LibraryLoad {
            library: name.to_string(),
            source,
        };

        // RTLD_NODELETE: some vendor EGL implementations register atexit
        // handlers that crash if the library is unmapped first.
        let library: Library = unsafe {
            libloading::os::unix::Library::open(Some(name), libc::RTLD_NOW | libc::RTLD_NODELETE)
        }
        .map_err(load_err)?
        .into();

        // SAFETY: the symbol types match the EGL 1.4 prototypes, and the
        // copied function pointers never outlive `library`, which is moved
        // into the returned value.
        unsafe {
            let get_display = *library.get::<GetDisplayFn>(b"eglGetDisplay\0").map_err(load_err)?;
            let initialize = *library.get::<InitializeFn>(b"eglInitialize\0").map_err(load_err)?;
            let terminate = *library.get::<TerminateFn>(b"eglTerminate\0").map_err(load_err)?;
            let query_string = *library
                .get::<QueryStringFn>(b"eglQueryString\0")
                .map_err(load_err)?;
            let get_configs = *library.get::<GetConfigsFn>(b"eglGetConfigs\0").map_err(load_err)?;
            let get_error = *library.get::<GetErrorFn>(b"eglGetError\0").map_err(load_err)?;
            let get_proc_address = *library
                .get::<GetProcAddressFn>(b"eglGetProcAddress\0")
                .map_err(load_err)?;

            tracing::debug!("Loaded EGL client library {}", name);

            Ok(Self {
                get_display,
                initialize,
                terminate,
                query_string,
                get_configs,
                get_error,
                get_proc_address,
                library_name: name.to_string(),
                _library: library,
            })
        }
    }

    pub fn library_name(&self) -> &str {
        &self.library_name
    }
}

impl EglPlatform for LibEgl {
    fn default_display(&self) -> Option<EGLDisplay> {
        // EGL_DEFAULT_DISPLAY is the null native display.
        let display = unsafe { (self.get_display)(ptr::null_mut()) };
        (!display.is_null()).then_some(display)
    }

    fn initialize(&self, display: EGLDisplay) -> Option<(EGLint, EGLint)> {
        let mut major = 0;
        let mut minor = 0;
        let ok = unsafe { (self.initialize)(display, &mut major, &mut minor) };
        (ok != 0).then_some((major, minor))
    }

    fn terminate(&self, display: EGLDisplay) -> bool {
        unsafe { (self.terminate)(display) != 0 }
    }

    fn query_string(&self, display: EGLDisplay, name: EGLint) -> Option<String> {
        let raw = unsafe { (self.query_string)(display, name) };
        if raw.is_null() {
            return None;
        }
        // SAFETY: EGL returns a NUL-terminated static string owned by the
        // implementation.
        let value = unsafe { CStr::from_ptr(raw) };
        Some(value.to_string_lossy().into_owned())
    }

    fn config_count(&self, display: EGLDisplay) -> Option<EGLint> {
        let mut count = 0;
        let ok = unsafe { (self.get_configs)(display, ptr::null_mut(), 0, &mut count) };
        (ok != 0).then_some(count)
    }

    fn last_error(&self) -> EGLint {
        let code = unsafe { (self.get_error)() };
        if code != EGL_SUCCESS {
            tracing::trace!("eglGetError -> 0x{:04x}", code);
        }
        code
    }

    fn proc_address(&self, name: &str) -> *const c_void {
        let Ok(name) = CString::new(name) else {
            return ptr::null();
        };
        unsafe { (self.get_proc_address)(name.as_ptr()) }
    }
}

impl std::fmt::Debug for LibEgl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibEgl")
            .field("library", &self.library_name)
            .finish_non_exhaustive()
    }
}
