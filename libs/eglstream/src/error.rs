// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::path::PathBuf;

use thiserror::Error;

use crate::endpoint::HandshakeStep;
use crate::error_codes::EglError;
use crate::platform::EGLint;

#[derive(Error, Debug)]
pub enum EglStreamError {
    #[error("Failed to load EGL library '{library}': {source}")]
    LibraryLoad {
        library: String,
        #[source]
        source: libloading::Error,
    },

    #[error("Missing EGL capability: {name}")]
    MissingCapability { name: &'static str },

    #[error("No default EGL display available")]
    DisplayUnavailable,

    #[error("EGL display not initialized: {code}")]
    DisplayNotInitialized { code: EglError },

    #[error("Endpoint channel {step} failed for {}: {source}", path.display())]
    ChannelFailure {
        step: HandshakeStep,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create EGL stream: {0}")]
    StreamCreate(EglError),

    #[error("Failed to create EGL stream: unknown platform error 0x{code:04x}")]
    UnknownPlatformError { code: EGLint },

    #[error("EGL stream not created (no platform error recorded)")]
    StreamNotCreated,

    #[error("Stream query failed: {0}")]
    StreamQuery(EglError),

    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl EglStreamError {
    /// Translate the platform's last error code after a rejected
    /// `eglCreateStreamKHR` call.
    ///
    /// `EGL_SUCCESS` means the platform returned the null sentinel without
    /// recording why; unmapped codes are kept distinct from known ones.
    pub fn from_create_failure(code: EGLint) -> Self {
        match EglError::from_code(code) {
            EglError::Success => Self::StreamNotCreated,
            EglError::Unknown(code) => Self::UnknownPlatformError { code },
            known => Self::StreamCreate(known),
        }
    }
}

pub type Result<T> = std::result::Result<T, EglStreamError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::constants::*;

    #[test]
    fn test_create_failure_translation() {
        assert!(matches!(
            EglStreamError::from_create_failure(EGL_SUCCESS),
            EglStreamError::StreamNotCreated
        ));
        assert!(matches!(
            EglStreamError::from_create_failure(EGL_BAD_ATTRIBUTE),
            EglStreamError::StreamCreate(EglError::BadAttribute)
        ));
        assert!(matches!(
            EglStreamError::from_create_failure(0x7fff_0000),
            EglStreamError::UnknownPlatformError { code: 0x7fff_0000 }
        ));
    }

    #[test]
    fn test_missing_capability_message_names_entry_point() {
        let err = EglStreamError::MissingCapability {
            name: "eglQueryStreamKHR",
        };
        assert!(err.to_string().contains("eglQueryStreamKHR"));
    }
}
