// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Unix-socket rendezvous between the two ends of a cross-process stream.
//!
//! The socket never carries frame data. Its only job is to give both
//! processes a connected descriptor that the EGL driver binds the stream to,
//! and to order the two processes: the listener does not finish until the
//! initiator has connected and written its confirmation.
//!
//! ```text
//! listener:  Unbound -> Bound -> Listening -> Accepted -> ConfirmationRead -> Ready
//! initiator: Unconnected -> Connected -> ConfirmationWritten -> Ready
//! ```
//!
//! Any failing step moves the handshake to `Failed` and releases every
//! socket it held.

use std::fmt;
use std::fs;
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{EglStreamError, Result};

/// Size of the confirmation the initiator writes and the listener reads.
pub const CONFIRMATION_LEN: usize = 16;

/// Content is not interpreted; only its arrival matters.
pub const CONFIRMATION_PAYLOAD: [u8; CONFIRMATION_LEN] = *b"eglstream-ready\0";

/// The operation a handshake failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStep {
    RemoveStale,
    Bind,
    Listen,
    Accept,
    Read,
    Connect,
    Write,
}

impl fmt::Display for HandshakeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HandshakeStep::RemoveStale => "stale socket removal",
            HandshakeStep::Bind => "bind",
            HandshakeStep::Listen => "listen",
            HandshakeStep::Accept => "accept",
            HandshakeStep::Read => "confirmation read",
            HandshakeStep::Connect => "connect",
            HandshakeStep::Write => "confirmation write",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Unbound,
    Bound,
    Listening,
    Accepted,
    ConfirmationRead,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitiatorState {
    Unconnected,
    Connected,
    ConfirmationWritten,
    Ready,
    Failed,
}

/// Which side of the rendezvous a channel was built as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointRole {
    Listener,
    Initiator,
}

/// How an initiator retries a connect that found no listener yet.
///
/// Only "no such socket" and "connection refused" are retried; every other
/// error fails immediately. One attempt is the strict default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectRetry {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for ConnectRetry {
    fn default() -> Self {
        Self {
            attempts: 1,
            interval: Duration::from_millis(100),
        }
    }
}

fn channel_failure(step: HandshakeStep, path: &Path, source: io::Error) -> EglStreamError {
    EglStreamError::ChannelFailure {
        step,
        path: path.to_path_buf(),
        source,
    }
}

/// Remove a socket left behind by an earlier run. Anything that is not a
/// socket is refused rather than deleted.
fn remove_stale_socket(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {
            fs::remove_file(path)?;
            tracing::debug!("Removed stale socket {}", path.display());
            Ok(())
        }
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "path exists and is not a socket",
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn sockaddr_un(path: &Path) -> io::Result<(libc::sockaddr_un, libc::socklen_t)> {
    // SAFETY: sockaddr_un is plain old data; all-zero is a valid value.
    let mut addr: libc::sockaddr_un = unsafe { std::mem::zeroed() };
    addr.sun_family = libc::AF_UNIX as libc::sa_family_t;

    let bytes = path.as_os_str().as_bytes();
    if bytes.contains(&0) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "socket path contains a NUL byte",
        ));
    }
    // Leave room for the terminating NUL.
    if bytes.len() >= addr.sun_path.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "socket path too long",
        ));
    }
    for (dst, src) in addr.sun_path.iter_mut().zip(bytes) {
        *dst = *src as libc::c_char;
    }

    let len = std::mem::offset_of!(libc::sockaddr_un, sun_path) + bytes.len() + 1;
    Ok((addr, len as libc::socklen_t))
}

fn bind_unix_socket(path: &Path) -> io::Result<OwnedFd> {
    let (addr, len) = sockaddr_un(path)?;

    let fd = unsafe { libc::socket(libc::AF_UNIX, libc::SOCK_STREAM | libc::SOCK_CLOEXEC, 0) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: `fd` was just returned by socket(2) and is owned by nobody else.
    let fd = unsafe { OwnedFd::from_raw_fd(fd) };

    let rc = unsafe {
        libc::bind(
            fd.as_raw_fd(),
            &addr as *const libc::sockaddr_un as *const libc::sockaddr,
            len,
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(fd)
}

/// Listener half of the rendezvous, advanced one state at a time.
#[derive(Debug)]
pub struct ListenerHandshake {
    path: PathBuf,
    state: ListenerState,
    listener: Option<UnixListener>,
    connection: Option<UnixStream>,
    failed_at: Option<HandshakeStep>,
}

impl ListenerHandshake {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: ListenerState::Unbound,
            listener: None,
            connection: None,
            failed_at: None,
        }
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Advance exactly one state. `Accepted` is reached only once a peer
    /// connects, so this call blocks while `Listening`.
    pub fn step(&mut self) -> Result<ListenerState> {
        let next = match self.state {
            ListenerState::Unbound => {
                remove_stale_socket(&self.path)
                    .map_err(|e| self.fail(HandshakeStep::RemoveStale, e))?;
                let fd = bind_unix_socket(&self.path).map_err(|e| self.fail(HandshakeStep::Bind, e))?;
                self.listener = Some(UnixListener::from(fd));
                ListenerState::Bound
            }
            ListenerState::Bound => {
                let fd = self.listener.as_ref().map(|l| l.as_raw_fd()).unwrap_or(-1);
                // One pending connection: this is a one-to-one pairing.
                if unsafe { libc::listen(fd, 1) } < 0 {
                    let err = io::Error::last_os_error();
                    return Err(self.fail(HandshakeStep::Listen, err));
                }
                ListenerState::Listening
            }
            ListenerState::Listening => {
                let accepted = match self.listener.as_ref() {
                    Some(listener) => listener.accept().map(|(stream, _)| stream),
                    None => Err(io::Error::from(io::ErrorKind::NotConnected)),
                };
                let stream = accepted.map_err(|e| self.fail(HandshakeStep::Accept, e))?;
                self.close_listener();
                self.connection = Some(stream);
                ListenerState::Accepted
            }
            ListenerState::Accepted => {
                let mut confirmation = [0u8; CONFIRMATION_LEN];
                let read = match self.connection.as_mut() {
                    Some(stream) => stream.read_exact(&mut confirmation),
                    None => Err(io::Error::from(io::ErrorKind::NotConnected)),
                };
                read.map_err(|e| self.fail(HandshakeStep::Read, e))?;
                tracing::debug!("Read {}-byte confirmation on {}", CONFIRMATION_LEN, self.path.display());
                ListenerState::ConfirmationRead
            }
            ListenerState::ConfirmationRead | ListenerState::Ready => ListenerState::Ready,
            ListenerState::Failed => return Err(self.already_failed()),
        };
        tracing::trace!("Listener handshake {:?} -> {:?}", self.state, next);
        self.state = next;
        Ok(next)
    }

    /// Step until `Ready` and hand over the accepted connection.
    pub fn run(mut self) -> Result<EndpointChannel> {
        while self.state != ListenerState::Ready {
            self.step()?;
        }
        self.into_channel()
    }

    pub fn into_channel(mut self) -> Result<EndpointChannel> {
        match (self.state, self.connection.take()) {
            (ListenerState::Ready, Some(stream)) => Ok(EndpointChannel {
                role: EndpointRole::Listener,
                path: self.path.clone(),
                stream,
            }),
            _ => Err(self.already_failed()),
        }
    }

    fn close_listener(&mut self) {
        if self.listener.take().is_some() {
            if let Err(e) = fs::remove_file(&self.path) {
                tracing::debug!("Could not unlink {}: {}", self.path.display(), e);
            }
        }
    }

    fn fail(&mut self, step: HandshakeStep, source: io::Error) -> EglStreamError {
        tracing::error!("Listener {} failed on {}: {}", step, self.path.display(), source);
        self.close_listener();
        self.connection = None;
        self.state = ListenerState::Failed;
        self.failed_at = Some(step);
        channel_failure(step, &self.path, source)
    }

    fn already_failed(&self) -> EglStreamError {
        channel_failure(
            self.failed_at.unwrap_or(HandshakeStep::Accept),
            &self.path,
            io::Error::other(format!("listener handshake is {:?}", self.state)),
        )
    }
}

impl Drop for ListenerHandshake {
    fn drop(&mut self) {
        self.close_listener();
    }
}

/// Initiator half of the rendezvous, advanced one state at a time.
#[derive(Debug)]
pub struct InitiatorHandshake {
    path: PathBuf,
    state: InitiatorState,
    retry: ConnectRetry,
    connection: Option<UnixStream>,
    failed_at: Option<HandshakeStep>,
}

impl InitiatorHandshake {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: InitiatorState::Unconnected,
            retry: ConnectRetry::default(),
            connection: None,
            failed_at: None,
        }
    }

    pub fn with_retry(mut self, retry: ConnectRetry) -> Self {
        self.retry = retry;
        self
    }

    pub fn state(&self) -> InitiatorState {
        self.state
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn step(&mut self) -> Result<InitiatorState> {
        let next = match self.state {
            InitiatorState::Unconnected => {
                let stream = self
                    .connect()
                    .map_err(|e| self.fail(HandshakeStep::Connect, e))?;
                self.connection = Some(stream);
                InitiatorState::Connected
            }
            InitiatorState::Connected => {
                let written = match self.connection.as_mut() {
                    Some(stream) => stream.write_all(&CONFIRMATION_PAYLOAD),
                    None => Err(io::Error::from(io::ErrorKind::NotConnected)),
                };
                written.map_err(|e| self.fail(HandshakeStep::Write, e))?;
                InitiatorState::ConfirmationWritten
            }
            InitiatorState::ConfirmationWritten | InitiatorState::Ready => InitiatorState::Ready,
            InitiatorState::Failed => return Err(self.already_failed()),
        };
        tracing::trace!("Initiator handshake {:?} -> {:?}", self.state, next);
        self.state = next;
        Ok(next)
    }

    pub fn run(mut self) -> Result<EndpointChannel> {
        while self.state != InitiatorState::Ready {
            self.step()?;
        }
        self.into_channel()
    }

    pub fn into_channel(mut self) -> Result<EndpointChannel> {
        match (self.state, self.connection.take()) {
            (InitiatorState::Ready, Some(stream)) => Ok(EndpointChannel {
                role: EndpointRole::Initiator,
                path: self.path,
                stream,
            }),
            _ => Err(self.already_failed()),
        }
    }

    fn connect(&self) -> io::Result<UnixStream> {
        let attempts = self.retry.attempts.max(1);
        let mut attempt = 1;
        loop {
            match UnixStream::connect(&self.path) {
                Ok(stream) => return Ok(stream),
                Err(e) if attempt < attempts && is_listener_missing(&e) => {
                    tracing::debug!(
                        "No listener at {} yet ({}), retry {}/{}",
                        self.path.display(),
                        e,
                        attempt,
                        attempts
                    );
                    attempt += 1;
                    std::thread::sleep(self.retry.interval);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn fail(&mut self, step: HandshakeStep, source: io::Error) -> EglStreamError {
        tracing::error!("Initiator {} failed on {}: {}", step, self.path.display(), source);
        self.connection = None;
        self.state = InitiatorState::Failed;
        self.failed_at = Some(step);
        channel_failure(step, &self.path, source)
    }

    fn already_failed(&self) -> EglStreamError {
        channel_failure(
            self.failed_at.unwrap_or(HandshakeStep::Connect),
            &self.path,
            io::Error::other(format!("initiator handshake is {:?}", self.state)),
        )
    }
}

fn is_listener_missing(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused
    )
}

/// A connected rendezvous socket, ready to be handed to the EGL driver.
#[derive(Debug)]
pub struct EndpointChannel {
    role: EndpointRole,
    path: PathBuf,
    stream: UnixStream,
}

impl EndpointChannel {
    /// Bind `path`, accept exactly one peer and read its confirmation.
    /// Blocks until an initiator connects.
    pub fn listen(path: impl Into<PathBuf>) -> Result<Self> {
        ListenerHandshake::new(path).run()
    }

    /// Connect to `path` and write the confirmation.
    pub fn connect(path: impl Into<PathBuf>) -> Result<Self> {
        InitiatorHandshake::new(path).run()
    }

    pub fn connect_with_retry(path: impl Into<PathBuf>, retry: ConnectRetry) -> Result<Self> {
        InitiatorHandshake::new(path).with_retry(retry).run()
    }

    pub fn role(&self) -> EndpointRole {
        self.role
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AsRawFd for EndpointChannel {
    fn as_raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }
}

impl AsFd for EndpointChannel {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.stream.as_fd()
    }
}
