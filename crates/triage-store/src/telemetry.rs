//! Tracing setup for binaries and tests embedding the store

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter, Layer};

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install a global fmt subscriber; `RUST_LOG` wins over `default_filter`
///
/// # Errors
/// When a global subscriber is already installed
pub fn init_tracing(default_filter: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_filter(filter(default_filter)))
        .try_init()
}

/// Like [`init_tracing`], emitting one JSON object per line
///
/// # Errors
/// When a global subscriber is already installed
pub fn init_json_tracing(default_filter: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(fmt::layer().json().with_filter(filter(default_filter)))
        .try_init()
}
