//! surveyboard-core - Core library for surveyboard
//!
//! Provides the survey status cache, per-category lookups, models and the
//! status event bus.

pub mod cache;
pub mod config;
pub mod error;
pub mod event;
pub mod lookup;
pub mod models;
pub mod view;

pub use cache::{CacheStats, StatusCache, Subscription};
pub use config::{CacheConfig, Settings};
pub use error::CoreError;
pub use event::{EventBus, StatusEvent};
pub use lookup::{SqliteLookup, StatusLookup};
pub use models::{Category, CategoryStatus, LookupOutcome, StatusRecord, SubjectKey};
pub use view::SubjectView;
