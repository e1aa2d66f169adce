// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Rendezvous ordering, within one process and across two.

use std::io::Write;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use eglstream::{
    ConnectRetry, EglStreamError, EndpointChannel, EndpointRole, HandshakeStep,
    InitiatorHandshake, InitiatorState, CONFIRMATION_LEN,
};
use tempfile::TempDir;

const PATIENT: ConnectRetry = ConnectRetry {
    attempts: 500,
    interval: Duration::from_millis(10),
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("eglstream=debug")
        .with_test_writer()
        .try_init();
}

fn connect_raw(path: &Path) -> UnixStream {
    for _ in 0..500 {
        if let Ok(stream) = UnixStream::connect(path) {
            return stream;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("no listener appeared at {}", path.display());
}

#[test]
fn test_listener_returns_only_after_initiator_wrote() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.sock");

    let connected = Arc::new(AtomicBool::new(false));
    let writing = Arc::new(AtomicBool::new(false));

    let initiator = {
        let path = path.clone();
        let connected = connected.clone();
        let writing = writing.clone();
        std::thread::spawn(move || {
            let mut hs = InitiatorHandshake::new(path).with_retry(PATIENT);
            assert_eq!(hs.step().unwrap(), InitiatorState::Connected);
            connected.store(true, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            writing.store(true, Ordering::SeqCst);
            hs.run().unwrap()
        })
    };

    let listener = EndpointChannel::listen(&path).unwrap();
    assert!(connected.load(Ordering::SeqCst));
    assert!(writing.load(Ordering::SeqCst));
    assert_eq!(listener.role(), EndpointRole::Listener);

    let initiator = initiator.join().unwrap();
    assert_eq!(initiator.role(), EndpointRole::Initiator);
}

#[test]
fn test_listener_reads_exactly_confirmation_len_of_longer_greeting() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.sock");

    let greeting = *b"eglstream-greeting";
    assert_eq!(greeting.len(), 18);
    assert!(greeting.len() > CONFIRMATION_LEN);

    let peer = {
        let path = path.clone();
        std::thread::spawn(move || {
            let mut stream = connect_raw(&path);
            stream.write_all(&greeting).unwrap();
            stream
        })
    };

    let listener = EndpointChannel::listen(&path);
    let _peer = peer.join().unwrap();
    assert!(listener.is_ok());
}

#[test]
fn test_path_is_reusable_across_runs() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.sock");

    for _ in 0..2 {
        let initiator = {
            let path = path.clone();
            std::thread::spawn(move || EndpointChannel::connect_with_retry(path, PATIENT))
        };
        EndpointChannel::listen(&path).unwrap();
        initiator.join().unwrap().unwrap();
        assert!(!path.exists());
    }

    // A previous run that died without cleaning up.
    drop(UnixListener::bind(&path).unwrap());
    let initiator = {
        let path = path.clone();
        std::thread::spawn(move || EndpointChannel::connect_with_retry(path, PATIENT))
    };
    EndpointChannel::listen(&path).unwrap();
    initiator.join().unwrap().unwrap();
}

#[test]
fn test_initiator_without_listener_fails_on_connect() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.sock");
    let err = EndpointChannel::connect(&path).unwrap_err();
    match err {
        EglStreamError::ChannelFailure { step, path: failed, .. } => {
            assert_eq!(step, HandshakeStep::Connect);
            assert_eq!(failed, path);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_handshake_with_separate_process() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.sock");

    let child = Command::new(env!("CARGO_BIN_EXE_handshake_peer"))
        .arg("handshake")
        .arg(&path)
        .stdout(std::process::Stdio::piped())
        .spawn()
        .unwrap();

    let listener = EndpointChannel::listen(&path).unwrap();
    assert_eq!(listener.role(), EndpointRole::Listener);

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success(), "peer failed: {:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("connected Initiator"), "peer said: {stdout}");
}
