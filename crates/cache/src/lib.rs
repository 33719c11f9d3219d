#![warn(clippy::unwrap_used)]

pub mod local;

pub use local::{CacheStats, LocalCache};
