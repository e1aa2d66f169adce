// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! `eglstream probe`: what does this machine's EGL offer for streams?

use std::sync::Arc;

use anyhow::{Context, Result};
use eglstream::{Capability, CapabilityTable, DisplayContext, EglPlatform};

const STREAM_EXTENSIONS: [&str; 5] = [
    "EGL_KHR_stream",
    "EGL_NV_stream_remote",
    "EGL_NV_stream_socket",
    "EGL_NV_stream_socket_unix",
    "EGL_NV_stream_reuse",
];

fn yes_no(present: bool) -> &'static str {
    if present { "yes" } else { "no" }
}

pub fn run(platform: Arc<dyn EglPlatform>) -> Result<()> {
    let display = DisplayContext::open(platform).context("Failed to open the EGL display")?;
    display.log_diagnostics();

    let (major, minor) = display.version();
    println!("EGL {}.{}", major, minor);

    println!("Extensions:");
    for name in STREAM_EXTENSIONS {
        println!("  {:<28} {}", name, yes_no(display.has_extension(name)));
    }

    // Nothing required: report every entry point instead of stopping at the
    // first missing one.
    let table = CapabilityTable::resolve(display.platform(), &[])
        .context("Failed to resolve stream entry points")?;
    println!("Entry points:");
    for capability in Capability::ALL {
        println!("  {:<28} {}", capability, yes_no(table.has(capability)));
    }

    let usable = Capability::STREAM_REQUIRED.iter().all(|c| table.has(*c));
    println!("Cross-process streams: {}", yes_no(usable));
    Ok(())
}
