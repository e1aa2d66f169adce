// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Stream creation, state polling and teardown against the stub platform.

use std::io::Write;
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

use eglstream::platform::constants::{EGL_BAD_ALLOC, EGL_BAD_ATTRIBUTE};
use eglstream::platform::stub::STUB_PEER_MARKER;
use eglstream::{
    CapabilityTable, DisplayContext, EglError, EglStreamError, FrameCounters, PollOutcome,
    StatePoller, Stream, StreamAttributes, StreamConfig, StreamRole, StreamState, StubPlatform,
    CONFIRMATION_PAYLOAD,
};
use tempfile::TempDir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("eglstream=debug")
        .with_test_writer()
        .try_init();
}

fn test_config() -> StreamConfig {
    StreamConfig {
        poll_interval_ms: 2,
        connect_attempts: 500,
        connect_retry_interval_ms: 10,
        ..StreamConfig::default()
    }
}

fn open(stub: StubPlatform) -> (Arc<StubPlatform>, DisplayContext, CapabilityTable) {
    let stub = Arc::new(stub);
    let display = DisplayContext::open(stub.clone()).unwrap();
    let caps = CapabilityTable::for_streams(display.platform()).unwrap();
    (stub, display, caps)
}

/// Connect and confirm like a producer would, without creating a stream.
fn raw_initiator(path: &Path) -> UnixStream {
    for _ in 0..500 {
        if let Ok(mut stream) = UnixStream::connect(path) {
            stream.write_all(&CONFIRMATION_PAYLOAD).unwrap();
            return stream;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("no listener appeared at {}", path.display());
}

#[test]
fn test_producer_and_consumer_meet() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.sock");
    let config = test_config();
    let (stub, display, caps) = open(StubPlatform::new());
    let poller = StatePoller::from_config(&config).with_deadline(Duration::from_secs(10));

    std::thread::scope(|s| {
        let consumer = s.spawn(|| {
            let stream = Stream::connect(&caps, &display, &path, StreamRole::Consumer, &config).unwrap();
            let outcome = poller.wait_ready(&stream, StreamRole::Consumer);
            let attribs = stub.stream_attribs(stream.raw_handle()).unwrap();
            (outcome, attribs)
        });
        let producer = s.spawn(|| {
            let stream = Stream::connect(&caps, &display, &path, StreamRole::Producer, &config).unwrap();
            poller.wait_ready(&stream, StreamRole::Producer)
        });

        assert_eq!(
            producer.join().unwrap(),
            PollOutcome::Reached(StreamState::Connecting)
        );
        let (outcome, attribs) = consumer.join().unwrap();
        assert_eq!(outcome, PollOutcome::Reached(StreamState::Connecting));
        // Everything but the socket descriptor is fixed by role and config.
        let fd = attribs[15];
        assert_eq!(
            attribs,
            StreamAttributes::cross_process(StreamRole::Consumer, &config, fd).as_slice()
        );
    });

    assert_eq!(stub.live_streams(), 0);
    assert_eq!(stub.destroyed_streams(), 2);
}

#[test]
fn test_state_progresses_and_disconnect_is_final() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.sock");
    let config = test_config();
    let (stub, display, caps) = open(StubPlatform::new());

    let peer = {
        let path = path.clone();
        std::thread::spawn(move || raw_initiator(&path))
    };
    let stream = Stream::connect(&caps, &display, &path, StreamRole::Consumer, &config).unwrap();
    let mut peer = peer.join().unwrap();

    // Rendezvous done, but the peer has not created its stream yet.
    assert_eq!(stream.query_state(), StreamState::Initializing);
    assert_eq!(stream.query_state(), StreamState::Initializing);

    peer.write_all(&[STUB_PEER_MARKER]).unwrap();
    let poller = StatePoller::from_config(&config).with_deadline(Duration::from_secs(10));
    assert_eq!(
        poller.wait_ready(&stream, StreamRole::Consumer),
        PollOutcome::Reached(StreamState::Connecting)
    );

    assert!(stub.present_frame(stream.raw_handle()));
    assert_eq!(stream.query_state(), StreamState::NewFrameAvailable);

    drop(peer);
    assert_eq!(
        poller.wait_until(&stream, |_| false),
        PollOutcome::Disconnected
    );
    assert!(!stub.present_frame(stream.raw_handle()));
    assert!(!stub.connect_peer(stream.raw_handle()));
    for _ in 0..5 {
        assert_eq!(stream.query_state(), StreamState::Disconnected);
    }
}

#[test]
fn test_longer_greeting_leaves_stream_initializing() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.sock");
    let config = test_config();
    let (_stub, display, caps) = open(StubPlatform::new());

    // 18 bytes: the listener reads 16, the rest stays on the socket.
    let greeting = *b"eglstream-greeting";
    let peer = {
        let path = path.clone();
        std::thread::spawn(move || {
            for _ in 0..500 {
                if let Ok(mut stream) = UnixStream::connect(&path) {
                    stream.write_all(&greeting).unwrap();
                    return stream;
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            panic!("no listener appeared at {}", path.display());
        })
    };
    let stream = Stream::connect(&caps, &display, &path, StreamRole::Consumer, &config).unwrap();
    let mut peer = peer.join().unwrap();

    // No peer stream exists yet, whatever else is on the socket.
    for _ in 0..3 {
        assert_eq!(stream.query_state(), StreamState::Initializing);
    }

    peer.write_all(&[STUB_PEER_MARKER]).unwrap();
    assert_eq!(stream.query_state(), StreamState::Connecting);
}

#[test]
fn test_create_failure_after_rendezvous() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.sock");
    let config = test_config();
    let (stub, display, caps) = open(StubPlatform::new().rejecting_create(EGL_BAD_ATTRIBUTE));

    let peer = {
        let path = path.clone();
        std::thread::spawn(move || raw_initiator(&path))
    };
    let err = Stream::connect(&caps, &display, &path, StreamRole::Consumer, &config).unwrap_err();
    let _peer = peer.join().unwrap();

    assert!(matches!(
        err,
        EglStreamError::StreamCreate(EglError::BadAttribute)
    ));
    assert!(err.to_string().contains("EGL_BAD_ATTRIBUTE"));
    assert!(!path.exists());
    assert_eq!(stub.live_streams(), 0);
}

#[test]
fn test_create_error_translation() {
    let config = StreamConfig::default();

    let (_stub, display, caps) = open(StubPlatform::new().rejecting_create(EGL_BAD_ALLOC));
    let err = Stream::direct(&caps, &display, StreamRole::Producer, &config).unwrap_err();
    assert!(matches!(err, EglStreamError::StreamCreate(EglError::BadAlloc)));

    let (_stub, display, caps) = open(StubPlatform::new().rejecting_create(0x4321));
    let err = Stream::direct(&caps, &display, StreamRole::Producer, &config).unwrap_err();
    assert!(matches!(
        err,
        EglStreamError::UnknownPlatformError { code: 0x4321 }
    ));
}

#[test]
fn test_query_state_is_repeatable() {
    let (stub, display, caps) = open(StubPlatform::new());
    let stream = Stream::direct(&caps, &display, StreamRole::Consumer, &StreamConfig::default()).unwrap();

    let first = stream.query_state();
    for _ in 0..100 {
        assert_eq!(stream.query_state(), first);
    }
    assert_eq!(stub.query_calls(), 101);
}

#[test]
fn test_destroy_runs_exactly_once() {
    let (stub, display, caps) = open(StubPlatform::new());
    let config = StreamConfig::default();

    let explicit = Stream::direct(&caps, &display, StreamRole::Producer, &config).unwrap();
    explicit.destroy();
    assert_eq!(stub.destroyed_streams(), 1);

    {
        let _implicit = Stream::direct(&caps, &display, StreamRole::Producer, &config).unwrap();
    }
    assert_eq!(stub.destroyed_streams(), 2);
    assert_eq!(stub.live_streams(), 0);
}

#[test]
fn test_streams_share_one_display_across_threads() {
    let (stub, display, caps) = open(StubPlatform::new());
    let config = StreamConfig::default();

    std::thread::scope(|s| {
        for i in 0..8 {
            let (display, caps, config) = (&display, &caps, &config);
            s.spawn(move || {
                let role = if i % 2 == 0 {
                    StreamRole::Producer
                } else {
                    StreamRole::Consumer
                };
                let stream = Stream::direct(caps, display, role, config).unwrap();
                for _ in 0..20 {
                    assert_eq!(stream.query_state(), StreamState::Created);
                }
            });
        }
    });

    assert_eq!(stub.destroyed_streams(), 8);
    assert_eq!(stub.live_streams(), 0);
}

#[test]
fn test_frame_counters_follow_frames() {
    let (stub, display, caps) = open(StubPlatform::new());
    let stream = Stream::direct(&caps, &display, StreamRole::Consumer, &StreamConfig::default()).unwrap();
    let handle = stream.raw_handle();

    assert_eq!(stream.frame_counters().unwrap(), FrameCounters::default());
    assert!(stub.present_frame(handle));
    assert!(stub.present_frame(handle));
    assert!(stub.acquire_frame(handle));

    assert_eq!(
        stream.frame_counters().unwrap(),
        FrameCounters {
            producer: 2,
            consumer: 1
        }
    );
    assert_eq!(stream.query_state(), StreamState::OldFrameAvailable);
}

#[test]
fn test_stream_with_separate_producer_process() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.sock");
    let config = test_config();
    let (_stub, display, caps) = open(StubPlatform::new());

    let child = Command::new(env!("CARGO_BIN_EXE_handshake_peer"))
        .arg("stream")
        .arg(&path)
        .arg("200")
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();

    let stream = Stream::connect(&caps, &display, &path, StreamRole::Consumer, &config).unwrap();
    let poller = StatePoller::from_config(&config).with_deadline(Duration::from_secs(10));
    assert_eq!(
        poller.wait_ready(&stream, StreamRole::Consumer),
        PollOutcome::Reached(StreamState::Connecting)
    );

    // The producer exits after its hold period.
    assert_eq!(poller.wait_until(&stream, |_| false), PollOutcome::Disconnected);

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success(), "peer failed: {:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("ready EGL_STREAM_STATE_CONNECTING_KHR"),
        "peer said: {stdout}"
    );
}
