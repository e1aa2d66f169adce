// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Sleep-interleaved state polling.
//!
//! Streams never block or call back on a state change. Callers poll
//! [`StateSource::current_state`] and decide how long to wait; this module
//! packages the common loop.

use std::time::{Duration, Instant};

use crate::config::StreamConfig;
use crate::stream::{StreamRole, StreamState};

/// Anything whose stream state can be queried without blocking.
pub trait StateSource {
    fn current_state(&self) -> StreamState;
}

/// How a [`StatePoller`] wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The target predicate accepted this state.
    Reached(StreamState),
    /// The peer went away before the target was seen.
    Disconnected,
    /// The caller's deadline passed; carries the last observed state.
    TimedOut(StreamState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatePoller {
    interval: Duration,
    deadline: Option<Duration>,
}

impl StatePoller {
    /// Poll every `interval` with no deadline.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    pub fn from_config(config: &StreamConfig) -> Self {
        Self::new(config.poll_interval())
    }

    /// Give up after `deadline` with [`PollOutcome::TimedOut`].
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Sleep, query, and repeat until `target` accepts a state or the
    /// stream reports `Disconnected`.
    pub fn wait_until<S, F>(&self, source: &S, mut target: F) -> PollOutcome
    where
        S: StateSource + ?Sized,
        F: FnMut(StreamState) -> bool,
    {
        let started = Instant::now();
        let mut last: Option<StreamState> = None;

        loop {
            std::thread::sleep(self.interval);
            let state = source.current_state();
            if last != Some(state) {
                match last {
                    Some(previous) => tracing::debug!("Stream state {} -> {}", previous, state),
                    None => tracing::debug!("Stream state {}", state),
                }
                last = Some(state);
            }

            if state == StreamState::Disconnected {
                return PollOutcome::Disconnected;
            }
            if target(state) {
                return PollOutcome::Reached(state);
            }
            if self.deadline.is_some_and(|d| started.elapsed() >= d) {
                tracing::debug!("Gave up waiting after {:?} in state {}", started.elapsed(), state);
                return PollOutcome::TimedOut(state);
            }
        }
    }

    /// Wait for the role's ready condition.
    pub fn wait_ready<S>(&self, source: &S, role: StreamRole) -> PollOutcome
    where
        S: StateSource + ?Sized,
    {
        self.wait_until(source, |state| role.is_ready(state))
    }

    /// Report every state change to `on_change` until the stream
    /// disconnects (or the deadline passes).
    pub fn watch<S, F>(&self, source: &S, mut on_change: F) -> PollOutcome
    where
        S: StateSource + ?Sized,
        F: FnMut(StreamState),
    {
        let mut last = None;
        self.wait_until(source, |state| {
            if last != Some(state) {
                on_change(state);
                last = Some(state);
            }
            false
        })
    }
}
