// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Logging setup shared by the unifs crates.
//!
//! Log output goes to stderr through `emit_term`. The level comes from the
//! `UNIFS_LOG` environment variable:
//! - `off` (default) - nothing is emitted
//! - `error`, `warn`, `info`, `debug` - minimum level to emit
//!
//! Library code logs through the short macros re-exported here
//! (`debug!`, `info!`, `warn!`, `error!`). Crates using them must also depend
//! on `emit` directly, since the macros expand to `emit` paths.

use std::sync::Once;

// Re-export emit so macros can use it
pub use emit;

/// Environment variable holding the log level
pub const LOG_ENV: &str = "UNIFS_LOG";

static INIT: Once = Once::new();

/// Parse a `UNIFS_LOG` value.
///
/// Returns `Ok(None)` for `off`, `Ok(Some(level))` for a known level and
/// `Err(())` for anything else.
pub fn parse_level(value: &str) -> Result<Option<emit::Level>, ()> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "off" => Ok(None),
        "error" => Ok(Some(emit::Level::Error)),
        "warn" | "warning" => Ok(Some(emit::Level::Warn)),
        "info" => Ok(Some(emit::Level::Info)),
        "debug" | "trace" => Ok(Some(emit::Level::Debug)),
        _ => Err(()),
    }
}

/// Initialize logging from `UNIFS_LOG`.
///
/// Safe to call more than once; only the first call has any effect.
pub fn init_diagnostics() {
    INIT.call_once(|| {
        let raw = std::env::var(LOG_ENV).unwrap_or_else(|_| "off".to_string());

        let (level, unknown) = match parse_level(&raw) {
            Ok(None) => return,
            Ok(Some(level)) => (level, false),
            Err(()) => (emit::Level::Info, true),
        };

        let rt = emit::setup()
            .emit_to(emit_term::stderr())
            .emit_when(emit::level::min_filter(level))
            .init();

        if unknown {
            emit::warn!("unknown {var} value {raw}, logging at info", var: LOG_ENV, raw: raw.as_str());
        }

        // emit_term writes synchronously, there is nothing to flush at exit.
        std::mem::forget(rt);
    });
}

/// Emit a debug-level event (cache hits, per-call tracing)
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

/// Emit an info-level event (backend opened, router built)
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

/// Emit a warning (swallowed cache failures, degraded answers)
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

/// Emit an error-level event
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}

pub use init_diagnostics as init;
