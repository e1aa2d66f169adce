// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Stream extension entry points, resolved once and passed by reference.

use std::ffi::c_void;
use std::fmt;

use crate::error::{EglStreamError, Result};
use crate::platform::{
    CreateStreamFn, DestroyStreamFn, EglPlatform, QueryStreamFn, QueryStreamU64Fn,
};

/// An extension entry point the stream subsystem can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    CreateStream,
    DestroyStream,
    QueryStream,
    QueryStreamU64,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::CreateStream,
        Capability::DestroyStream,
        Capability::QueryStream,
        Capability::QueryStreamU64,
    ];

    /// Entry points every stream needs, in resolution order.
    pub const STREAM_REQUIRED: [Capability; 3] = [
        Capability::CreateStream,
        Capability::DestroyStream,
        Capability::QueryStream,
    ];

    /// Symbol name passed to `eglGetProcAddress`.
    pub fn name(&self) -> &'static str {
        match self {
            Capability::CreateStream => "eglCreateStreamKHR",
            Capability::DestroyStream => "eglDestroyStreamKHR",
            Capability::QueryStream => "eglQueryStreamKHR",
            Capability::QueryStreamU64 => "eglQueryStreamu64KHR",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolved stream extension entry points.
///
/// Immutable after construction. Entries the caller marked as required are
/// guaranteed present; the others may be absent and report
/// [`EglStreamError::MissingCapability`] when used.
#[derive(Clone, Copy)]
pub struct CapabilityTable {
    create_stream: Option<CreateStreamFn>,
    destroy_stream: Option<DestroyStreamFn>,
    query_stream: Option<QueryStreamFn>,
    query_stream_u64: Option<QueryStreamU64Fn>,
}

impl CapabilityTable {
    /// Resolve everything a [`Stream`](crate::Stream) needs.
    ///
    /// Create, destroy and state query are required; the 64-bit frame
    /// counter query is optional.
    pub fn for_streams(platform: &dyn EglPlatform) -> Result<Self> {
        Self::resolve(platform, &Capability::STREAM_REQUIRED)
    }

    /// Resolve `required` in order, failing on the first NULL address, then
    /// resolve the remaining capabilities as optional.
    pub fn resolve(platform: &dyn EglPlatform, required: &[Capability]) -> Result<Self> {
        let mut table = Self {
            create_stream: None,
            destroy_stream: None,
            query_stream: None,
            query_stream_u64: None,
        };

        for &capability in required {
            let address = platform.proc_address(capability.name());
            if address.is_null() {
                tracing::error!("Required EGL entry point {} not found", capability);
                return Err(EglStreamError::MissingCapability {
                    name: capability.name(),
                });
            }
            table.install(capability, address);
        }

        for capability in Capability::ALL {
            if required.contains(&capability) {
                continue;
            }
            let address = platform.proc_address(capability.name());
            if address.is_null() {
                tracing::debug!("Optional EGL entry point {} not found", capability);
            } else {
                table.install(capability, address);
            }
        }

        tracing::debug!("Resolved EGL stream capabilities: {:?}", table);
        Ok(table)
    }

    fn install(&mut self, capability: Capability, address: *const c_void) {
        // SAFETY: `address` is non-null and was returned by eglGetProcAddress
        // for `capability.name()`, whose prototype is the matching fn type.
        unsafe {
            match capability {
                Capability::CreateStream => {
                    self.create_stream = Some(std::mem::transmute::<*const c_void, CreateStreamFn>(address))
                }
                Capability::DestroyStream => {
                    self.destroy_stream =
                        Some(std::mem::transmute::<*const c_void, DestroyStreamFn>(address))
                }
                Capability::QueryStream => {
                    self.query_stream = Some(std::mem::transmute::<*const c_void, QueryStreamFn>(address))
                }
                Capability::QueryStreamU64 => {
                    self.query_stream_u64 =
                        Some(std::mem::transmute::<*const c_void, QueryStreamU64Fn>(address))
                }
            }
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::CreateStream => self.create_stream.is_some(),
            Capability::DestroyStream => self.destroy_stream.is_some(),
            Capability::QueryStream => self.query_stream.is_some(),
            Capability::QueryStreamU64 => self.query_stream_u64.is_some(),
        }
    }

    pub fn create_stream(&self) -> Result<CreateStreamFn> {
        self.create_stream.ok_or(EglStreamError::MissingCapability {
            name: Capability::CreateStream.name(),
        })
    }

    pub fn destroy_stream(&self) -> Result<DestroyStreamFn> {
        self.destroy_stream.ok_or(EglStreamError::MissingCapability {
            name: Capability::DestroyStream.name(),
        })
    }

    pub fn query_stream(&self) -> Result<QueryStreamFn> {
        self.query_stream.ok_or(EglStreamError::MissingCapability {
            name: Capability::QueryStream.name(),
        })
    }

    pub fn query_stream_u64(&self) -> Result<QueryStreamU64Fn> {
        self.query_stream_u64.ok_or(EglStreamError::MissingCapability {
            name: Capability::QueryStreamU64.name(),
        })
    }
}

impl fmt::Debug for CapabilityTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let present: Vec<&str> = Capability::ALL
            .iter()
            .filter(|c| self.has(**c))
            .map(|c| c.name())
            .collect();
        f.debug_struct("CapabilityTable")
            .field("present", &present)
            .finish()
    }
}
