// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Stream budgets and rendezvous settings, from `eglstream.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::endpoint::ConnectRetry;
use crate::error::{EglStreamError, Result};

pub const ENV_SOCKET: &str = "EGLSTREAM_SOCKET";
pub const ENV_LATENCY_USEC: &str = "EGLSTREAM_LATENCY_USEC";
pub const ENV_ACQUIRE_TIMEOUT_USEC: &str = "EGLSTREAM_ACQUIRE_TIMEOUT_USEC";

pub const DEFAULT_SOCKET_PATH: &str = "/tmp/egl-stream.sock";
pub const DEFAULT_LATENCY_USEC: i32 = 16_000;
pub const DEFAULT_ACQUIRE_TIMEOUT_USEC: i32 = 16_000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamConfig {
    /// `EGL_CONSUMER_LATENCY_USEC_KHR`.
    pub consumer_latency_usec: i32,

    /// `EGL_CONSUMER_ACQUIRE_TIMEOUT_USEC_KHR`.
    pub acquire_timeout_usec: i32,

    /// Sleep between state queries while waiting for the peer.
    pub poll_interval_ms: u64,

    /// Rendezvous path used when the caller does not name one.
    pub socket_path: PathBuf,

    /// Connect attempts made by the initiating side. `1` fails as soon as no
    /// listener is found.
    pub connect_attempts: u32,

    pub connect_retry_interval_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            consumer_latency_usec: DEFAULT_LATENCY_USEC,
            acquire_timeout_usec: DEFAULT_ACQUIRE_TIMEOUT_USEC,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            connect_attempts: 1,
            connect_retry_interval_ms: 100,
        }
    }
}

impl StreamConfig {
    /// Configuration file name.
    pub const FILE_NAME: &'static str = "eglstream.toml";

    /// Load configuration from `path`. Missing keys take their defaults;
    /// a missing or unparseable file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EglStreamError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            EglStreamError::Configuration(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;

        tracing::info!("Loaded stream config from {}", path.display());
        Ok(config)
    }

    /// Load configuration from `path`, falling back to defaults if the file
    /// is missing or invalid.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!("No {} found, using defaults", path.display());
            return Self::default();
        }

        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Apply `EGLSTREAM_*` environment overrides on top of the loaded values.
    pub fn apply_env_overrides(mut self) -> Result<Self> {
        if let Some(path) = std::env::var_os(ENV_SOCKET) {
            self.socket_path = PathBuf::from(path);
        }
        if let Some(value) = env_i32(ENV_LATENCY_USEC)? {
            self.consumer_latency_usec = value;
        }
        if let Some(value) = env_i32(ENV_ACQUIRE_TIMEOUT_USEC)? {
            self.acquire_timeout_usec = value;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.consumer_latency_usec < 0 {
            return Err(EglStreamError::Configuration(format!(
                "consumer_latency_usec must not be negative (got {})",
                self.consumer_latency_usec
            )));
        }
        if self.acquire_timeout_usec < 0 {
            return Err(EglStreamError::Configuration(format!(
                "acquire_timeout_usec must not be negative (got {})",
                self.acquire_timeout_usec
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(EglStreamError::Configuration(
                "poll_interval_ms must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn connect_retry(&self) -> ConnectRetry {
        ConnectRetry {
            attempts: self.connect_attempts,
            interval: Duration::from_millis(self.connect_retry_interval_ms),
        }
    }
}

fn env_i32(name: &str) -> Result<Option<i32>> {
    match std::env::var(name) {
        Ok(value) => value.trim().parse().map(Some).map_err(|e| {
            EglStreamError::Configuration(format!("{} must be an integer ('{}'): {}", name, value, e))
        }),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(EglStreamError::Configuration(format!("{}: {}", name, e))),
    }
}
