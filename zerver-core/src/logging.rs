//! Tracing bootstrap. Grounded on the teacher's `layers::init_tracing` —
//! the HTTP-layer pieces of that module (CORS, trace layer, panic layer)
//! belong to the wire parser, which is out of scope here.

use tracing_subscriber::EnvFilter;

/// Initialize the global `tracing` subscriber with a standard `fmt` layer.
///
/// Respects `RUST_LOG`; falls back to `info` when unset. Call once, at
/// the very start of `main`, before any tracing macro.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".parse().unwrap()))
        .init();
}
