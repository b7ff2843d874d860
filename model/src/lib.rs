//! Data model and data sources for the anime release tracker.

use tracing_subscriber::EnvFilter;

pub mod anilist;
pub mod anitrendz;
pub mod catalog;
pub mod clock;
pub mod jikan;
pub mod links;
pub mod ranking;
pub mod rules;
pub mod schedule;
pub mod season;
pub mod store;
pub mod upcoming;

/// Install the global `tracing` subscriber.
///
/// The filter is read from `RUST_LOG`, defaulting to `info`. Calling this more than once is
/// harmless; only the first call installs a subscriber.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
