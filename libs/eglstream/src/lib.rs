// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! eglstream - Cross-process EGL stream rendezvous.
//!
//! Two processes meet on a Unix socket path, each creates its end of an
//! `EGL_NV_stream_remote` stream bound to the connected socket, and both
//! then poll the stream state until the other side has attached:
//!
//! ```no_run
//! use std::sync::Arc;
//! use eglstream::{
//!     CapabilityTable, DisplayContext, LibEgl, StatePoller, Stream, StreamConfig, StreamRole,
//! };
//!
//! # fn main() -> eglstream::Result<()> {
//! let config = StreamConfig::default();
//! let display = DisplayContext::open(Arc::new(LibEgl::load()?))?;
//! let caps = CapabilityTable::for_streams(display.platform())?;
//! let stream = Stream::connect(&caps, &display, &config.socket_path, StreamRole::Consumer, &config)?;
//! StatePoller::from_config(&config).wait_ready(&stream, StreamRole::Consumer);
//! let handle = stream.raw_handle();
//! # let _ = handle;
//! # Ok(())
//! # }
//! ```

pub mod capability;
pub mod config;
pub mod display;
pub mod endpoint;
pub mod error;
pub mod error_codes;
pub mod platform;
pub mod poll;
pub mod stream;

pub use capability::{Capability, CapabilityTable};
pub use config::StreamConfig;
pub use display::{DisplayContext, DisplayDiagnostics};
pub use endpoint::{
    ConnectRetry, EndpointChannel, EndpointRole, HandshakeStep, InitiatorHandshake,
    InitiatorState, ListenerHandshake, ListenerState, CONFIRMATION_LEN, CONFIRMATION_PAYLOAD,
};
pub use error::{EglStreamError, Result};
pub use error_codes::EglError;
pub use platform::{EglPlatform, LibEgl, StubPlatform};
pub use poll::{PollOutcome, StatePoller, StateSource};
pub use stream::{FrameCounters, Stream, StreamAttributes, StreamRole, StreamState};

/// Crate version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
