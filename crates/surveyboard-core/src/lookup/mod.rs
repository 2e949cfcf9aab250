//! Per-category lookups the status cache fans out to
//!
//! The cache treats a lookup as an opaque async call that may fail on its own
//! without affecting other categories.

pub mod sqlite;

pub use sqlite::SqliteLookup;

use crate::error::CoreError;
use crate::models::{Category, LookupOutcome, SubjectKey};
use async_trait::async_trait;

/// Source of per-category completion data
#[async_trait]
pub trait StatusLookup: Send + Sync {
    /// Look up one category for one subject
    async fn lookup(
        &self,
        subject: &SubjectKey,
        category: Category,
    ) -> Result<LookupOutcome, CoreError>;

    /// Short name used in logs
    fn name(&self) -> &str {
        "lookup"
    }
}
