//! Caching layer for surveyboard-core
//!
//! In-memory status cache with TTL, per-subject request coalescing and
//! subscriber fan-out.

pub mod status_cache;
pub mod subscribers;

pub use status_cache::{CacheStats, StatusCache};
pub use subscribers::{SubscriberList, Subscription};
