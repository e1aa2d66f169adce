// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! In-process EGL stand-in.
//!
//! [`StubPlatform`] implements [`EglPlatform`] without a GPU or a vendor
//! driver. Its extension entry points are plain `extern "C"` functions whose
//! `EGLDisplay` argument points back at the stub's own state, so the same
//! [`CapabilityTable`](crate::CapabilityTable) code path runs against it.
//!
//! Cross-process streams emulate the remote-stream handshake on the socket
//! they were created with: each end sends [`STUB_PEER_MARKER`], and a state
//! query reads the peer's marker (`Initializing` -> `Connecting`) or notices
//! the peer hanging up (`Disconnected`). Other transitions are driven
//! from tests through the control methods.

use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::ffi::c_void;
use std::os::fd::RawFd;
use std::ptr;

use parking_lot::Mutex;

use super::constants::*;
use super::{
    CreateStreamFn, DestroyStreamFn, EGLBoolean, EGLDisplay, EGLStreamKHR, EGLenum, EGLint,
    EGLuint64KHR, EglPlatform, QueryStreamFn, QueryStreamU64Fn,
};

thread_local! {
    static LAST_ERROR: Cell<EGLint> = const { Cell::new(EGL_SUCCESS) };
}

fn set_error(code: EGLint) {
    LAST_ERROR.with(|e| e.set(code));
}

/// Byte a cross-process stub stream sends to its peer when created. Any
/// other byte on the socket (such as handshake bytes the listener left
/// unread) is discarded.
pub const STUB_PEER_MARKER: u8 = 0xE5;

const STUB_VENDOR: &str = "eglstream stub";
const STUB_VERSION: (EGLint, EGLint) = (1, 5);
const STUB_EXTENSIONS: &str = "EGL_KHR_stream EGL_KHR_stream_consumer_gltexture \
     EGL_NV_stream_remote EGL_NV_stream_socket EGL_NV_stream_socket_unix EGL_NV_stream_reuse";

#[derive(Debug)]
struct StubStream {
    state: EGLint,
    attribs: Vec<EGLint>,
    socket: Option<RawFd>,
    peer_created: bool,
    producer_frames: u64,
    consumer_frames: u64,
}

#[derive(Debug, Default)]
struct StubBehavior {
    no_display: bool,
    missing: HashSet<String>,
    initialize_error: Option<EGLint>,
    reject_terminate: bool,
    create_error: Option<EGLint>,
    reject_destroy: bool,
    query_error: Option<EGLint>,
}

#[derive(Debug, Default)]
struct StubState {
    behavior: StubBehavior,
    initialized: bool,
    streams: HashMap<usize, StubStream>,
    next_stream: usize,
    lookups: Vec<String>,
    destroyed: usize,
    query_calls: usize,
}

/// Heap-pinned so its address can serve as the `EGLDisplay`.
#[derive(Debug, Default)]
struct StubDisplay {
    state: Mutex<StubState>,
}

/// In-process [`EglPlatform`] used by tests, the cross-process test helper
/// and `eglstream --stub`.
#[derive(Debug, Default)]
pub struct StubPlatform {
    display: Box<StubDisplay>,
}

impl StubPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// `eglGetDisplay` returns `EGL_NO_DISPLAY`.
    pub fn without_display(self) -> Self {
        self.display.state.lock().behavior.no_display = true;
        self
    }

    /// `eglGetProcAddress(name)` returns NULL.
    pub fn without_entry_point(self, name: &str) -> Self {
        self.display
            .state
            .lock()
            .behavior
            .missing
            .insert(name.to_string());
        self
    }

    /// `eglInitialize` fails and records `code`.
    pub fn rejecting_initialize(self, code: EGLint) -> Self {
        self.display.state.lock().behavior.initialize_error = Some(code);
        self
    }

    /// `eglTerminate` fails with `EGL_BAD_DISPLAY`.
    pub fn rejecting_terminate(self) -> Self {
        self.display.state.lock().behavior.reject_terminate = true;
        self
    }

    /// `eglCreateStreamKHR` returns `EGL_NO_STREAM_KHR` and records `code`.
    pub fn rejecting_create(self, code: EGLint) -> Self {
        self.display.state.lock().behavior.create_error = Some(code);
        self
    }

    /// `eglDestroyStreamKHR` fails with `EGL_BAD_STREAM_KHR`.
    pub fn rejecting_destroy(self) -> Self {
        self.display.state.lock().behavior.reject_destroy = true;
        self
    }

    /// Make subsequent `eglQueryStreamKHR` calls fail with `code`, or succeed
    /// again with `None`.
    pub fn set_query_error(&self, code: Option<EGLint>) {
        self.display.state.lock().behavior.query_error = code;
    }

    /// Entry-point names looked up through `eglGetProcAddress`, in order.
    pub fn lookups(&self) -> Vec<String> {
        self.display.state.lock().lookups.clone()
    }

    /// Number of streams currently alive.
    pub fn live_streams(&self) -> usize {
        self.display.state.lock().streams.len()
    }

    /// Number of successful `eglDestroyStreamKHR` calls.
    pub fn destroyed_streams(&self) -> usize {
        self.display.state.lock().destroyed
    }

    /// Number of `eglQueryStreamKHR` calls, successful or not.
    pub fn query_calls(&self) -> usize {
        self.display.state.lock().query_calls
    }

    pub fn is_initialized(&self) -> bool {
        self.display.state.lock().initialized
    }

    /// Attribute list the stream was created with, terminator included.
    pub fn stream_attribs(&self, stream: EGLStreamKHR) -> Option<Vec<EGLint>> {
        self.with_stream(stream, |s| s.attribs.clone())
    }

    /// The remote end created its stream.
    pub fn connect_peer(&self, stream: EGLStreamKHR) -> bool {
        self.with_stream(stream, |s| {
            s.peer_created = true;
            transition(s, EGL_STREAM_STATE_CONNECTING_KHR)
        })
        .unwrap_or(false)
    }

    /// The producer inserted a frame.
    pub fn present_frame(&self, stream: EGLStreamKHR) -> bool {
        self.with_stream(stream, |s| {
            let moved = transition(s, EGL_STREAM_STATE_NEW_FRAME_AVAILABLE_KHR);
            if moved {
                s.producer_frames += 1;
            }
            moved
        })
        .unwrap_or(false)
    }

    /// The consumer acquired the newest frame.
    pub fn acquire_frame(&self, stream: EGLStreamKHR) -> bool {
        self.with_stream(stream, |s| {
            let moved = transition(s, EGL_STREAM_STATE_OLD_FRAME_AVAILABLE_KHR);
            if moved {
                s.consumer_frames += 1;
            }
            moved
        })
        .unwrap_or(false)
    }

    /// The remote end went away.
    pub fn disconnect(&self, stream: EGLStreamKHR) -> bool {
        self.with_stream(stream, |s| transition(s, EGL_STREAM_STATE_DISCONNECTED_KHR))
            .unwrap_or(false)
    }

    fn with_stream<R>(&self, stream: EGLStreamKHR, f: impl FnOnce(&mut StubStream) -> R) -> Option<R> {
        let mut state = self.display.state.lock();
        state.streams.get_mut(&(stream as usize)).map(f)
    }

    fn display_ptr(&self) -> EGLDisplay {
        let display: *const StubDisplay = &*self.display;
        display as EGLDisplay
    }
}

/// Move a stream to `next`. `Disconnected` is terminal.
fn transition(stream: &mut StubStream, next: EGLint) -> bool {
    if stream.state == EGL_STREAM_STATE_DISCONNECTED_KHR {
        return false;
    }
    stream.state = next;
    true
}

impl EglPlatform for StubPlatform {
    fn default_display(&self) -> Option<EGLDisplay> {
        if self.display.state.lock().behavior.no_display {
            return None;
        }
        Some(self.display_ptr())
    }

    fn initialize(&self, display: EGLDisplay) -> Option<(EGLint, EGLint)> {
        if display != self.display_ptr() {
            set_error(EGL_BAD_DISPLAY);
            return None;
        }
        let mut state = self.display.state.lock();
        if let Some(code) = state.behavior.initialize_error {
            set_error(code);
            return None;
        }
        state.initialized = true;
        Some(STUB_VERSION)
    }

    fn terminate(&self, display: EGLDisplay) -> bool {
        let mut state = self.display.state.lock();
        if display != self.display_ptr() || state.behavior.reject_terminate {
            set_error(EGL_BAD_DISPLAY);
            return false;
        }
        state.initialized = false;
        true
    }

    fn query_string(&self, display: EGLDisplay, name: EGLint) -> Option<String> {
        if display != self.display_ptr() || !self.display.state.lock().initialized {
            set_error(EGL_NOT_INITIALIZED);
            return None;
        }
        let value = match name {
            EGL_CLIENT_APIS => "OpenGL_ES OpenGL".to_string(),
            EGL_EXTENSIONS => STUB_EXTENSIONS.to_string(),
            EGL_VENDOR => STUB_VENDOR.to_string(),
            EGL_VERSION => format!("{}.{} stub", STUB_VERSION.0, STUB_VERSION.1),
            _ => {
                set_error(EGL_BAD_PARAMETER);
                return None;
            }
        };
        Some(value)
    }

    fn config_count(&self, display: EGLDisplay) -> Option<EGLint> {
        (display == self.display_ptr()).then_some(1)
    }

    fn last_error(&self) -> EGLint {
        LAST_ERROR.with(|e| e.replace(EGL_SUCCESS))
    }

    fn proc_address(&self, name: &str) -> *const c_void {
        let mut state = self.display.state.lock();
        state.lookups.push(name.to_string());
        if state.behavior.missing.contains(name) {
            return ptr::null();
        }
        match name {
            "eglCreateStreamKHR" => stub_create_stream as CreateStreamFn as *const c_void,
            "eglDestroyStreamKHR" => stub_destroy_stream as DestroyStreamFn as *const c_void,
            "eglQueryStreamKHR" => stub_query_stream as QueryStreamFn as *const c_void,
            "eglQueryStreamu64KHR" => stub_query_stream_u64 as QueryStreamU64Fn as *const c_void,
            _ => ptr::null(),
        }
    }
}

/// # Safety
/// `dpy` must be null or a display handed out by a live [`StubPlatform`].
unsafe fn stub_display<'a>(dpy: EGLDisplay) -> Option<&'a StubDisplay> {
    // SAFETY: upheld by the caller.
    unsafe { (dpy as *const StubDisplay).as_ref() }
}

/// Collect an `EGL_NONE`-terminated attribute list, terminator included.
///
/// # Safety
/// `attribs` must be null or point to a terminated key/value list.
unsafe fn read_attribs(attribs: *const EGLint) -> Vec<EGLint> {
    let mut out = Vec::new();
    if attribs.is_null() {
        out.push(EGL_NONE);
        return out;
    }
    let mut i = 0;
    loop {
        // SAFETY: every key before the terminator is followed by a value.
        let key = unsafe { *attribs.add(i) };
        out.push(key);
        if key == EGL_NONE {
            break;
        }
        out.push(unsafe { *attribs.add(i + 1) });
        i += 2;
    }
    out
}

fn attrib_value(attribs: &[EGLint], key: EGLint) -> Option<EGLint> {
    attribs
        .chunks_exact(2)
        .find(|pair| pair[0] == key)
        .map(|pair| pair[1])
}

unsafe extern "C" fn stub_create_stream(dpy: EGLDisplay, attrib_list: *const EGLint) -> EGLStreamKHR {
    let Some(display) = (unsafe { stub_display(dpy) }) else {
        set_error(EGL_BAD_DISPLAY);
        return ptr::null_mut();
    };
    let mut state = display.state.lock();
    if !state.initialized {
        set_error(EGL_NOT_INITIALIZED);
        return ptr::null_mut();
    }
    if let Some(code) = state.behavior.create_error {
        set_error(code);
        return ptr::null_mut();
    }

    let attribs = unsafe { read_attribs(attrib_list) };
    let cross_process =
        attrib_value(&attribs, EGL_STREAM_TYPE_NV) == Some(EGL_STREAM_CROSS_PROCESS_NV);
    let socket = if cross_process {
        match attrib_value(&attribs, EGL_SOCKET_HANDLE_NV) {
            Some(fd) if fd >= 0 => Some(fd),
            _ => {
                set_error(EGL_BAD_ATTRIBUTE);
                return ptr::null_mut();
            }
        }
    } else {
        None
    };

    if let Some(fd) = socket {
        // Tell the remote end this side exists.
        let marker = [STUB_PEER_MARKER];
        let sent = unsafe {
            libc::send(
                fd,
                marker.as_ptr() as *const c_void,
                marker.len(),
                libc::MSG_NOSIGNAL,
            )
        };
        if sent != 1 {
            set_error(EGL_BAD_ACCESS);
            return ptr::null_mut();
        }
    }

    state.next_stream += 1;
    let id = state.next_stream;
    state.streams.insert(
        id,
        StubStream {
            state: if cross_process {
                EGL_STREAM_STATE_INITIALIZING_NV
            } else {
                EGL_STREAM_STATE_CREATED_KHR
            },
            attribs,
            socket,
            peer_created: false,
            producer_frames: 0,
            consumer_frames: 0,
        },
    );
    id as EGLStreamKHR
}

unsafe extern "C" fn stub_destroy_stream(dpy: EGLDisplay, stream: EGLStreamKHR) -> EGLBoolean {
    let Some(display) = (unsafe { stub_display(dpy) }) else {
        set_error(EGL_BAD_DISPLAY);
        return 0;
    };
    let mut state = display.state.lock();
    if state.behavior.reject_destroy || state.streams.remove(&(stream as usize)).is_none() {
        set_error(EGL_BAD_STREAM_KHR);
        return 0;
    }
    state.destroyed += 1;
    1
}

/// Observe the remote end through the stream's socket without blocking.
fn poll_remote(stream: &mut StubStream) {
    let Some(fd) = stream.socket else {
        return;
    };
    if stream.state == EGL_STREAM_STATE_DISCONNECTED_KHR {
        return;
    }

    if stream.peer_created {
        let mut byte = [0u8; 1];
        let n = unsafe {
            libc::recv(
                fd,
                byte.as_mut_ptr() as *mut c_void,
                1,
                libc::MSG_DONTWAIT | libc::MSG_PEEK,
            )
        };
        if n == 0 || (n < 0 && !would_block()) {
            transition(stream, EGL_STREAM_STATE_DISCONNECTED_KHR);
        }
        return;
    }

    loop {
        let mut byte = [0u8; 1];
        let n = unsafe { libc::recv(fd, byte.as_mut_ptr() as *mut c_void, 1, libc::MSG_DONTWAIT) };
        match n {
            0 => {
                transition(stream, EGL_STREAM_STATE_DISCONNECTED_KHR);
                return;
            }
            1 if byte[0] == STUB_PEER_MARKER => {
                stream.peer_created = true;
                if stream.state == EGL_STREAM_STATE_INITIALIZING_NV {
                    stream.state = EGL_STREAM_STATE_CONNECTING_KHR;
                }
                return;
            }
            1 => continue,
            _ => {
                if !would_block() {
                    transition(stream, EGL_STREAM_STATE_DISCONNECTED_KHR);
                }
                return;
            }
        }
    }
}

fn would_block() -> bool {
    std::io::Error::last_os_error().kind() == std::io::ErrorKind::WouldBlock
}

unsafe extern "C" fn stub_query_stream(
    dpy: EGLDisplay,
    stream: EGLStreamKHR,
    attribute: EGLenum,
    value: *mut EGLint,
) -> EGLBoolean {
    let Some(display) = (unsafe { stub_display(dpy) }) else {
        set_error(EGL_BAD_DISPLAY);
        return 0;
    };
    let mut state = display.state.lock();
    state.query_calls += 1;
    if let Some(code) = state.behavior.query_error {
        set_error(code);
        return 0;
    }
    let Some(s) = state.streams.get_mut(&(stream as usize)) else {
        set_error(EGL_BAD_STREAM_KHR);
        return 0;
    };
    let result = match attribute {
        EGL_STREAM_STATE_KHR => {
            poll_remote(s);
            s.state
        }
        _ => match attrib_value(&s.attribs, attribute as EGLint) {
            Some(v) => v,
            None => {
                set_error(EGL_BAD_ATTRIBUTE);
                return 0;
            }
        },
    };
    if value.is_null() {
        set_error(EGL_BAD_PARAMETER);
        return 0;
    }
    unsafe { *value = result };
    1
}

unsafe extern "C" fn stub_query_stream_u64(
    dpy: EGLDisplay,
    stream: EGLStreamKHR,
    attribute: EGLenum,
    value: *mut EGLuint64KHR,
) -> EGLBoolean {
    let Some(display) = (unsafe { stub_display(dpy) }) else {
        set_error(EGL_BAD_DISPLAY);
        return 0;
    };
    let state = display.state.lock();
    let Some(s) = state.streams.get(&(stream as usize)) else {
        set_error(EGL_BAD_STREAM_KHR);
        return 0;
    };
    let result = match attribute {
        EGL_PRODUCER_FRAME_KHR => s.producer_frames,
        EGL_CONSUMER_FRAME_KHR => s.consumer_frames,
        _ => {
            set_error(EGL_BAD_ATTRIBUTE);
            return 0;
        }
    };
    if value.is_null() {
        set_error(EGL_BAD_PARAMETER);
        return 0;
    }
    unsafe { *value = result };
    1
}
