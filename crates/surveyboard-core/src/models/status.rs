//! Status records returned by the cache
//!
//! A [`StatusRecord`] is the full, ordered set of per-category results for one
//! subject. It is rebuilt from scratch on every fetch and never merged.

use super::{Category, SubjectKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of a single per-category lookup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupOutcome {
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl LookupOutcome {
    pub fn not_completed() -> Self {
        Self::default()
    }

    pub fn completed(completed_at: Option<String>, payload: Option<serde_json::Value>) -> Self {
        Self {
            completed: true,
            completed_at,
            payload,
        }
    }
}

/// Status of one category for one subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStatus {
    pub category: Category,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    /// Set when the lookup failed; `completed` is then false but unknown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CategoryStatus {
    pub fn from_outcome(category: Category, outcome: LookupOutcome) -> Self {
        Self {
            category,
            completed: outcome.completed,
            completed_at: outcome.completed_at,
            payload: outcome.payload,
            error: None,
        }
    }

    pub fn failed(category: Category, reason: impl Into<String>) -> Self {
        Self {
            category,
            completed: false,
            completed_at: None,
            payload: None,
            error: Some(reason.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// All category statuses for a subject, in configured category order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    pub subject: SubjectKey,
    pub entries: Vec<CategoryStatus>,
    pub fetched_at: DateTime<Utc>,
}

impl StatusRecord {
    pub fn new(subject: SubjectKey, entries: Vec<CategoryStatus>) -> Self {
        Self {
            subject,
            entries,
            fetched_at: Utc::now(),
        }
    }

    /// Record meaning "nothing known yet"
    pub fn empty(subject: SubjectKey) -> Self {
        Self::new(subject, Vec::new())
    }

    pub fn get(&self, category: Category) -> Option<&CategoryStatus> {
        self.entries.iter().find(|e| e.category == category)
    }

    pub fn is_completed(&self, category: Category) -> bool {
        self.get(category).map(|e| e.completed).unwrap_or(false)
    }

    pub fn payload(&self, category: Category) -> Option<&serde_json::Value> {
        self.get(category).and_then(|e| e.payload.as_ref())
    }

    /// Number of yearly surveys completed (the `Current` fallback is not counted)
    pub fn completed_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.completed && e.category.year().is_some())
            .count()
    }

    /// True when at least one category could not be looked up
    pub fn is_partial(&self) -> bool {
        self.entries.iter().any(CategoryStatus::is_failed)
    }

    pub fn failed(&self) -> impl Iterator<Item = &CategoryStatus> {
        self.entries.iter().filter(|e| e.is_failed())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
