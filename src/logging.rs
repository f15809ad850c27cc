//! Tracing setup for the `grapher` binary.
//!
//! The library only emits events; installing a subscriber is the binary's job.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "grapher_data=info";
const VERBOSE_FILTER: &str = "grapher_data=debug";

/// Install a stderr `fmt` subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_tracing(verbose: bool) {
    let fallback = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into());

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
