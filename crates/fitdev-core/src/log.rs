//! Logging shim.
//!
//! With the `telemetry` feature events go through `tracing`; without it
//! warnings are printed to stderr and debug events are dropped.

use std::fmt::Arguments;

pub fn warn(args: Arguments<'_>) {
    #[cfg(feature = "telemetry")]
    tracing::warn!("{}", args);
    #[cfg(not(feature = "telemetry"))]
    eprintln!("warning: {args}");
}

pub fn debug(args: Arguments<'_>) {
    #[cfg(feature = "telemetry")]
    tracing::debug!("{}", args);
    #[cfg(not(feature = "telemetry"))]
    let _ = args;
}
