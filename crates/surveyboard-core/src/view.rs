//! Per-subject view over the shared status cache
//!
//! A view follows one subject: it keeps the latest record, picks up records
//! fetched by anyone else through a cache subscription, and unsubscribes when
//! dropped.

use crate::cache::{StatusCache, Subscription};
use crate::models::{Category, CategoryStatus, StatusRecord, SubjectKey};
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug)]
struct ViewState {
    record: Option<Arc<StatusRecord>>,
    loading: bool,
}

/// Latest known status for a single subject
pub struct SubjectView {
    cache: Arc<StatusCache>,
    subject: SubjectKey,
    state: Arc<RwLock<ViewState>>,
    _subscription: Subscription,
}

impl SubjectView {
    /// Attach to `subject`; nothing is fetched until [`load`](Self::load)
    pub fn attach(cache: Arc<StatusCache>, subject: SubjectKey) -> Self {
        let state = Arc::new(RwLock::new(ViewState {
            record: None,
            loading: true,
        }));

        let subscription = {
            let state = Arc::clone(&state);
            let watched = subject.clone();
            cache.subscribe(move |subject, record| {
                if *subject == watched {
                    let mut guard = state.write();
                    guard.record = Some(Arc::new(record.clone()));
                    guard.loading = false;
                }
            })
        };

        Self {
            cache,
            subject,
            state,
            _subscription: subscription,
        }
    }

    pub fn subject(&self) -> &SubjectKey {
        &self.subject
    }

    /// Fetch through the cache (fresh entries are reused)
    pub async fn load(&self) -> Arc<StatusRecord> {
        self.state.write().loading = true;
        let record = self.cache.fetch(&self.subject).await;

        let mut guard = self.state.write();
        guard.record = Some(Arc::clone(&record));
        guard.loading = false;
        record
    }

    /// Drop the cached entry for this subject and fetch again
    pub async fn refresh(&self) -> Arc<StatusRecord> {
        self.cache.invalidate(Some(&self.subject));
        self.load().await
    }

    pub fn is_loading(&self) -> bool {
        self.state.read().loading
    }

    pub fn record(&self) -> Option<Arc<StatusRecord>> {
        self.state.read().record.clone()
    }

    pub fn status(&self, category: Category) -> Option<CategoryStatus> {
        self.state
            .read()
            .record
            .as_ref()
            .and_then(|r| r.get(category).cloned())
    }

    pub fn is_completed(&self, category: Category) -> bool {
        self.state
            .read()
            .record
            .as_ref()
            .map(|r| r.is_completed(category))
            .unwrap_or(false)
    }

    pub fn payload(&self, category: Category) -> Option<serde_json::Value> {
        self.state
            .read()
            .record
            .as_ref()
            .and_then(|r| r.payload(category).cloned())
    }

    pub fn completed_count(&self) -> usize {
        self.state
            .read()
            .record
            .as_ref()
            .map(|r| r.completed_count())
            .unwrap_or(0)
    }
}

impl std::fmt::Debug for SubjectView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubjectView")
            .field("subject", &self.subject)
            .field("state", &*self.state.read())
            .finish()
    }
}
