//! Tracing setup for the compiler and the `render-template` binary.
//!
//! The library only emits events. Embedders install whatever subscriber they
//! like; [`init`] is the stock stderr formatter used by the CLI.

use tracing_subscriber::filter::EnvFilter;

/// Installs a global fmt subscriber writing to stderr.
///
/// `RUST_LOG` wins over `default_directive` when set. Returns `false` if a
/// global subscriber was already installed.
pub fn init(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

#[cfg(test)]
pub(crate) use capture::capture;
