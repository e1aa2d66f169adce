// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! EGL stream lifecycle: create after the rendezvous, poll, destroy once.

use std::fmt;
use std::os::fd::{AsRawFd, RawFd};
use std::path::Path;
use std::ptr;

use crate::capability::CapabilityTable;
use crate::config::StreamConfig;
use crate::display::DisplayContext;
use crate::endpoint::EndpointChannel;
use crate::error::{EglStreamError, Result};
use crate::error_codes::EglError;
use crate::platform::constants::*;
use crate::platform::{EGLStreamKHR, EGLenum, EGLint, EGLuint64KHR};
use crate::poll::StateSource;

/// Which end of the stream this process is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamRole {
    Producer,
    Consumer,
}

impl StreamRole {
    /// Value for `EGL_STREAM_ENDPOINT_NV`.
    pub fn endpoint_attrib(&self) -> EGLint {
        match self {
            StreamRole::Producer => EGL_STREAM_PRODUCER_NV,
            StreamRole::Consumer => EGL_STREAM_CONSUMER_NV,
        }
    }

    /// The consumer binds and waits; the producer connects to it.
    pub fn is_listener(&self) -> bool {
        matches!(self, StreamRole::Consumer)
    }

    /// Whether `state` means the peer has attached from this role's point
    /// of view.
    pub fn is_ready(&self, state: StreamState) -> bool {
        match self {
            StreamRole::Producer => matches!(
                state,
                StreamState::Connecting
                    | StreamState::Empty
                    | StreamState::NewFrameAvailable
                    | StreamState::OldFrameAvailable
            ),
            StreamRole::Consumer => {
                !matches!(state, StreamState::Initializing | StreamState::Unknown)
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamRole::Producer => "producer",
            StreamRole::Consumer => "consumer",
        }
    }
}

impl fmt::Display for StreamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of `eglQueryStreamKHR(EGL_STREAM_STATE_KHR)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamState {
    Created,
    Connecting,
    Empty,
    NewFrameAvailable,
    OldFrameAvailable,
    Disconnected,
    /// Remote stream waiting for its peer.
    Initializing,
    /// A value this crate does not name.
    Other(EGLint),
    /// The query itself failed.
    Unknown,
}

impl StreamState {
    pub fn from_raw(raw: EGLint) -> Self {
        match raw {
            0 => Self::Unknown,
            EGL_STREAM_STATE_CREATED_KHR => Self::Created,
            EGL_STREAM_STATE_CONNECTING_KHR => Self::Connecting,
            EGL_STREAM_STATE_EMPTY_KHR => Self::Empty,
            EGL_STREAM_STATE_NEW_FRAME_AVAILABLE_KHR => Self::NewFrameAvailable,
            EGL_STREAM_STATE_OLD_FRAME_AVAILABLE_KHR => Self::OldFrameAvailable,
            EGL_STREAM_STATE_DISCONNECTED_KHR => Self::Disconnected,
            EGL_STREAM_STATE_INITIALIZING_NV => Self::Initializing,
            other => Self::Other(other),
        }
    }

    pub fn raw(&self) -> EGLint {
        match self {
            Self::Unknown => 0,
            Self::Created => EGL_STREAM_STATE_CREATED_KHR,
            Self::Connecting => EGL_STREAM_STATE_CONNECTING_KHR,
            Self::Empty => EGL_STREAM_STATE_EMPTY_KHR,
            Self::NewFrameAvailable => EGL_STREAM_STATE_NEW_FRAME_AVAILABLE_KHR,
            Self::OldFrameAvailable => EGL_STREAM_STATE_OLD_FRAME_AVAILABLE_KHR,
            Self::Disconnected => EGL_STREAM_STATE_DISCONNECTED_KHR,
            Self::Initializing => EGL_STREAM_STATE_INITIALIZING_NV,
            Self::Other(raw) => *raw,
        }
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("EGL_STREAM_STATE_CREATED_KHR"),
            Self::Connecting => f.write_str("EGL_STREAM_STATE_CONNECTING_KHR"),
            Self::Empty => f.write_str("EGL_STREAM_STATE_EMPTY_KHR"),
            Self::NewFrameAvailable => f.write_str("EGL_STREAM_STATE_NEW_FRAME_AVAILABLE_KHR"),
            Self::OldFrameAvailable => f.write_str("EGL_STREAM_STATE_OLD_FRAME_AVAILABLE_KHR"),
            Self::Disconnected => f.write_str("EGL_STREAM_STATE_DISCONNECTED_KHR"),
            Self::Initializing => f.write_str("EGL_STREAM_STATE_INITIALIZING_NV"),
            Self::Other(raw) => write!(f, "stream state 0x{raw:04x}"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// Producer and consumer frame counters (`eglQueryStreamu64KHR`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameCounters {
    pub producer: EGLuint64KHR,
    pub consumer: EGLuint64KHR,
}

/// `EGL_NONE`-terminated attribute list for `eglCreateStreamKHR`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamAttributes {
    list: Vec<EGLint>,
}

impl StreamAttributes {
    /// Remote stream bound to the connected Unix socket `fd`.
    pub fn cross_process(role: StreamRole, config: &StreamConfig, fd: RawFd) -> Self {
        Self {
            list: vec![
                EGL_SUPPORT_REUSE_NV,
                EGL_FALSE,
                EGL_CONSUMER_LATENCY_USEC_KHR,
                config.consumer_latency_usec,
                EGL_CONSUMER_ACQUIRE_TIMEOUT_USEC_KHR,
                config.acquire_timeout_usec,
                EGL_STREAM_TYPE_NV,
                EGL_STREAM_CROSS_PROCESS_NV,
                EGL_STREAM_ENDPOINT_NV,
                role.endpoint_attrib(),
                EGL_STREAM_PROTOCOL_NV,
                EGL_STREAM_PROTOCOL_SOCKET_NV,
                EGL_SOCKET_TYPE_NV,
                EGL_SOCKET_TYPE_UNIX_NV,
                EGL_SOCKET_HANDLE_NV,
                fd,
                EGL_NONE,
            ],
        }
    }

    /// Same-process stream: only the latency budgets.
    pub fn direct(config: &StreamConfig) -> Self {
        Self {
            list: vec![
                EGL_CONSUMER_LATENCY_USEC_KHR,
                config.consumer_latency_usec,
                EGL_CONSUMER_ACQUIRE_TIMEOUT_USEC_KHR,
                config.acquire_timeout_usec,
                EGL_NONE,
            ],
        }
    }

    pub fn as_slice(&self) -> &[EGLint] {
        &self.list
    }

    fn as_ptr(&self) -> *const EGLint {
        self.list.as_ptr()
    }
}

/// One end of an EGL stream.
///
/// Borrows the capability table and display it was created against, so
/// neither can go away first. The stream handle is destroyed exactly once,
/// by [`Stream::destroy`] or on drop, before the rendezvous socket closes.
pub struct Stream<'a> {
    caps: &'a CapabilityTable,
    display: &'a DisplayContext,
    role: StreamRole,
    handle: Option<EGLStreamKHR>,
    channel: Option<EndpointChannel>,
}

impl<'a> Stream<'a> {
    /// Rendezvous with the peer on `path`, then create the remote stream.
    ///
    /// A consumer blocks until a producer connects; a producer fails if no
    /// consumer is listening (after `config.connect_attempts`).
    pub fn connect(
        caps: &'a CapabilityTable,
        display: &'a DisplayContext,
        path: impl AsRef<Path>,
        role: StreamRole,
        config: &StreamConfig,
    ) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Connecting {} stream via {}", role, path.display());

        let channel = if role.is_listener() {
            EndpointChannel::listen(path)?
        } else {
            EndpointChannel::connect_with_retry(path, config.connect_retry())?
        };
        tracing::debug!("Rendezvous complete on fd {}", channel.as_raw_fd());

        let attribs = StreamAttributes::cross_process(role, config, channel.as_raw_fd());
        let handle = create_handle(caps, display, &attribs)?;
        tracing::info!("Created {} stream {:?}", role, handle);

        Ok(Self {
            caps,
            display,
            role,
            handle: Some(handle),
            channel: Some(channel),
        })
    }

    /// Create a same-process stream with no rendezvous.
    pub fn direct(
        caps: &'a CapabilityTable,
        display: &'a DisplayContext,
        role: StreamRole,
        config: &StreamConfig,
    ) -> Result<Self> {
        let attribs = StreamAttributes::direct(config);
        let handle = create_handle(caps, display, &attribs)?;
        tracing::info!("Created direct {} stream {:?}", role, handle);

        Ok(Self {
            caps,
            display,
            role,
            handle: Some(handle),
            channel: None,
        })
    }

    pub fn role(&self) -> StreamRole {
        self.role
    }

    /// Handle to pass to the compute or graphics API attaching to the
    /// stream.
    pub fn raw_handle(&self) -> EGLStreamKHR {
        self.handle.unwrap_or(ptr::null_mut())
    }

    /// The rendezvous socket, for socket-backed streams.
    pub fn channel(&self) -> Option<&EndpointChannel> {
        self.channel.as_ref()
    }

    /// Non-blocking state query. A failed query is logged and reported as
    /// [`StreamState::Unknown`].
    pub fn query_state(&self) -> StreamState {
        match self.query_int(EGL_STREAM_STATE_KHR) {
            Ok(raw) => {
                let state = StreamState::from_raw(raw);
                tracing::trace!("Stream {:?} state {}", self.raw_handle(), state);
                state
            }
            Err(e) => {
                tracing::warn!("Stream state query failed: {}", e);
                StreamState::Unknown
            }
        }
    }

    /// Frames inserted by the producer and acquired by the consumer.
    pub fn frame_counters(&self) -> Result<FrameCounters> {
        Ok(FrameCounters {
            producer: self.query_u64(EGL_PRODUCER_FRAME_KHR)?,
            consumer: self.query_u64(EGL_CONSUMER_FRAME_KHR)?,
        })
    }

    /// Destroy the stream now instead of at drop.
    pub fn destroy(mut self) {
        self.release();
    }

    fn query_int(&self, attribute: EGLenum) -> Result<EGLint> {
        let query = self.caps.query_stream()?;
        let handle = self.live_handle()?;
        let mut value: EGLint = 0;
        let ok = unsafe { query(self.display.raw(), handle, attribute, &mut value) };
        if ok == 0 {
            return Err(self.query_error());
        }
        Ok(value)
    }

    fn query_u64(&self, attribute: EGLenum) -> Result<EGLuint64KHR> {
        let query = self.caps.query_stream_u64()?;
        let handle = self.live_handle()?;
        let mut value: EGLuint64KHR = 0;
        let ok = unsafe { query(self.display.raw(), handle, attribute, &mut value) };
        if ok == 0 {
            return Err(self.query_error());
        }
        Ok(value)
    }

    fn live_handle(&self) -> Result<EGLStreamKHR> {
        self.handle
            .ok_or(EglStreamError::StreamQuery(EglError::BadStream))
    }

    fn query_error(&self) -> EglStreamError {
        EglStreamError::StreamQuery(EglError::from_code(self.display.platform().last_error()))
    }

    fn release(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        match self.caps.destroy_stream() {
            Ok(destroy) => {
                if unsafe { destroy(self.display.raw(), handle) } == 0 {
                    let code = self.display.platform().last_error();
                    tracing::warn!(
                        "eglDestroyStreamKHR failed for {:?}: {}",
                        handle,
                        EglError::from_code(code)
                    );
                } else {
                    tracing::debug!("Destroyed {} stream {:?}", self.role, handle);
                }
            }
            Err(e) => tracing::warn!("Cannot destroy stream {:?}: {}", handle, e),
        }
        // Close the socket only after the driver has let go of the stream.
        self.channel = None;
    }
}

fn create_handle(
    caps: &CapabilityTable,
    display: &DisplayContext,
    attribs: &StreamAttributes,
) -> Result<EGLStreamKHR> {
    let create = caps.create_stream()?;
    // SAFETY: `attribs` is EGL_NONE-terminated and outlives the call; the
    // display is initialized for as long as `display` is borrowed.
    let handle = unsafe { create(display.raw(), attribs.as_ptr()) };
    if handle.is_null() {
        let code = display.platform().last_error();
        let err = EglStreamError::from_create_failure(code);
        tracing::error!("eglCreateStreamKHR failed: {}", err);
        return Err(err);
    }
    Ok(handle)
}

impl StateSource for Stream<'_> {
    fn current_state(&self) -> StreamState {
        self.query_state()
    }
}

impl Drop for Stream<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Stream<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("role", &self.role)
            .field("handle", &self.handle)
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::StubPlatform;
    use std::sync::Arc;

    fn setup(stub: StubPlatform) -> (Arc<StubPlatform>, DisplayContext, CapabilityTable) {
        let stub = Arc::new(stub);
        let display = DisplayContext::open(stub.clone()).unwrap();
        let caps = CapabilityTable::for_streams(stub.as_ref()).unwrap();
        (stub, display, caps)
    }

    #[test]
    fn test_state_raw_values() {
        assert_eq!(StreamState::from_raw(0), StreamState::Unknown);
        assert_eq!(StreamState::from_raw(0x3216), StreamState::Connecting);
        assert_eq!(StreamState::from_raw(0x3240), StreamState::Initializing);
        assert_eq!(StreamState::from_raw(0x1234), StreamState::Other(0x1234));
        assert_eq!(StreamState::Disconnected.raw(), 0x321A);
    }

    #[test]
    fn test_role_ready_conditions() {
        assert!(!StreamRole::Producer.is_ready(StreamState::Initializing));
        assert!(!StreamRole::Producer.is_ready(StreamState::Created));
        assert!(StreamRole::Producer.is_ready(StreamState::Connecting));
        assert!(!StreamRole::Consumer.is_ready(StreamState::Initializing));
        assert!(!StreamRole::Consumer.is_ready(StreamState::Unknown));
        assert!(StreamRole::Consumer.is_ready(StreamState::Created));
    }

    #[test]
    fn test_cross_process_attribute_layout() {
        let attribs = StreamAttributes::cross_process(StreamRole::Consumer, &StreamConfig::default(), 7);
        assert_eq!(
            attribs.as_slice(),
            &[
                0x3335, 0, 0x3210, 16000, 0x321E, 16000, 0x3241, 0x3245, 0x3243, 0x3248, 0x3242,
                0x324B, 0x324D, 0x324E, 0x324C, 7, 0x3038,
            ]
        );
    }

    #[test]
    fn test_direct_stream_lifecycle() {
        let (stub, display, caps) = setup(StubPlatform::new());
        let stream = Stream::direct(&caps, &display, StreamRole::Producer, &StreamConfig::default()).unwrap();
        assert!(!stream.raw_handle().is_null());
        assert!(stream.channel().is_none());
        assert_eq!(stream.query_state(), StreamState::Created);
        assert_eq!(
            stub.stream_attribs(stream.raw_handle()).unwrap(),
            StreamAttributes::direct(&StreamConfig::default()).as_slice()
        );
        stream.destroy();
        assert_eq!(stub.live_streams(), 0);
        assert_eq!(stub.destroyed_streams(), 1);
    }

    #[test]
    fn test_create_without_error_code_is_not_created() {
        let (_stub, display, caps) = setup(StubPlatform::new().rejecting_create(EGL_SUCCESS));
        let err = Stream::direct(&caps, &display, StreamRole::Consumer, &StreamConfig::default())
            .unwrap_err();
        assert!(matches!(err, EglStreamError::StreamNotCreated));
    }

    #[test]
    fn test_failed_query_is_unknown() {
        let (stub, display, caps) = setup(StubPlatform::new());
        let stream = Stream::direct(&caps, &display, StreamRole::Consumer, &StreamConfig::default()).unwrap();
        stub.set_query_error(Some(EGL_BAD_STREAM_KHR));
        assert_eq!(stream.query_state(), StreamState::Unknown);
        stub.set_query_error(None);
        assert_eq!(stream.query_state(), StreamState::Created);
    }

    #[test]
    fn test_frame_counters_need_optional_entry_point() {
        let (_stub, display, caps) = setup(StubPlatform::new().without_entry_point("eglQueryStreamu64KHR"));
        let stream = Stream::direct(&caps, &display, StreamRole::Producer, &StreamConfig::default()).unwrap();
        assert!(matches!(
            stream.frame_counters(),
            Err(EglStreamError::MissingCapability { .. })
        ));
    }

    #[test]
    fn test_rejected_destroy_is_only_logged() {
        let (stub, display, caps) = setup(StubPlatform::new().rejecting_destroy());
        let stream = Stream::direct(&caps, &display, StreamRole::Producer, &StreamConfig::default()).unwrap();
        drop(stream);
        assert_eq!(stub.destroyed_streams(), 0);
    }
}
