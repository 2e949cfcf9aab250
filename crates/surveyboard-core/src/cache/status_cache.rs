//! Memoized, de-duplicated status retrieval
//!
//! Per subject the cache cycles `Absent -> Fetching -> fresh -> stale ->
//! Fetching ...`, or drops back to `Absent` on invalidation.
//!
//! - A fresh entry (younger than the TTL) is returned without I/O.
//! - At most one fan-out runs per subject. Late callers subscribe to the
//!   running fetch's watch channel and receive its record when it settles.
//! - Completion is last-write-wins. An invalidate racing an older in-flight
//!   fetch can be overwritten by that fetch's result.

use super::subscribers::{SubscriberList, Subscription};
use crate::config::CacheConfig;
use crate::error::CoreError;
use crate::event::{EventBus, StatusEvent};
use crate::lookup::StatusLookup;
use crate::models::{Category, CategoryStatus, StatusRecord, SubjectKey};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, warn};

type Completion = watch::Receiver<Option<Arc<StatusRecord>>>;

struct CacheEntry {
    record: Arc<StatusRecord>,
    fetched_at: Instant,
}

/// Counters for cache behaviour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Fresh entry returned without I/O
    pub hits: u64,
    /// Fan-outs started
    pub fetches: u64,
    /// Callers that joined an in-flight fetch
    pub coalesced: u64,
    /// Individual category lookups that failed
    pub lookup_failures: u64,
    /// Fan-outs that failed as a whole
    pub fetch_failures: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    fetches: AtomicU64,
    coalesced: AtomicU64,
    lookup_failures: AtomicU64,
    fetch_failures: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            lookup_failures: self.lookup_failures.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
        }
    }
}

/// Removes the in-flight marker however the fetch ends, including drop
struct InFlightGuard<'a> {
    in_flight: &'a DashMap<SubjectKey, Completion>,
    subject: &'a SubjectKey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(self.subject);
    }
}

enum Role {
    Settled(Arc<StatusRecord>),
    Leader(watch::Sender<Option<Arc<StatusRecord>>>),
    Follower(Completion),
}

/// Status cache shared by every consumer in the process
///
/// Construct once and share as `Arc<StatusCache>`.
pub struct StatusCache {
    lookup: Arc<dyn StatusLookup>,
    config: CacheConfig,
    entries: DashMap<SubjectKey, CacheEntry>,
    in_flight: DashMap<SubjectKey, Completion>,
    subscribers: Arc<SubscriberList>,
    event_bus: EventBus,
    counters: Counters,
}

impl StatusCache {
    /// Create a cache over `lookup`; fails if the config is invalid
    pub fn new(lookup: Arc<dyn StatusLookup>, config: CacheConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let event_bus = EventBus::new(config.event_capacity);
        Ok(Self {
            lookup,
            config,
            entries: DashMap::new(),
            in_flight: DashMap::new(),
            subscribers: Arc::new(SubscriberList::new()),
            event_bus,
            counters: Counters::default(),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn categories(&self) -> &[Category] {
        &self.config.categories
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }

    /// Number of cached subjects (fresh or stale)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_in_flight(&self, subject: &SubjectKey) -> bool {
        self.in_flight.contains_key(subject)
    }

    /// Cached record regardless of age, without any I/O
    pub fn cached(&self, subject: &SubjectKey) -> Option<Arc<StatusRecord>> {
        self.entries.get(subject).map(|e| Arc::clone(&e.record))
    }

    fn fresh(&self, subject: &SubjectKey) -> Option<Arc<StatusRecord>> {
        self.entries
            .get(subject)
            .filter(|e| e.fetched_at.elapsed() < self.config.ttl)
            .map(|e| Arc::clone(&e.record))
    }

    /// Status for `subject`: cached if fresh, otherwise fetched once
    ///
    /// Never fails. Failed categories come back as not completed with an
    /// error reason; a failed fan-out comes back as an empty record.
    pub async fn fetch(&self, subject: &SubjectKey) -> Arc<StatusRecord> {
        loop {
            if let Some(record) = self.fresh(subject) {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                debug!(%subject, "Status cache hit");
                return record;
            }

            let role = match self.in_flight.entry(subject.clone()) {
                Entry::Occupied(e) => Role::Follower(e.get().clone()),
                Entry::Vacant(v) => match self.fresh(subject) {
                    // A leader stores its entry before dropping the marker, so
                    // re-checking under the shard lock sees a just-finished fetch
                    Some(record) => Role::Settled(record),
                    None => {
                        let (tx, rx) = watch::channel(None);
                        v.insert(rx);
                        Role::Leader(tx)
                    }
                },
            };

            match role {
                Role::Settled(record) => {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(%subject, "Status cache hit after in-flight fetch settled");
                    return record;
                }
                Role::Leader(tx) => return self.run_fetch(subject, tx).await,
                Role::Follower(mut rx) => {
                    self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                    debug!(%subject, "Joining in-flight status fetch");

                    let settled = rx
                        .wait_for(Option::is_some)
                        .await
                        .ok()
                        .and_then(|value| value.clone());
                    if let Some(record) = settled {
                        return record;
                    }
                    debug!(%subject, "In-flight fetch abandoned, retrying");
                }
            }
        }
    }

    async fn run_fetch(
        &self,
        subject: &SubjectKey,
        tx: watch::Sender<Option<Arc<StatusRecord>>>,
    ) -> Arc<StatusRecord> {
        let _guard = InFlightGuard {
            in_flight: &self.in_flight,
            subject,
        };
        self.counters.fetches.fetch_add(1, Ordering::Relaxed);
        debug!(%subject, categories = self.config.categories.len(), "Status cache miss, fetching");

        let record = match self.gather(subject).await {
            Some(entries) => {
                let record = Arc::new(StatusRecord::new(subject.clone(), entries));
                self.entries.insert(
                    subject.clone(),
                    CacheEntry {
                        record: Arc::clone(&record),
                        fetched_at: Instant::now(),
                    },
                );
                self.subscribers.notify(subject, &record);
                self.event_bus.publish(StatusEvent::Refreshed {
                    subject: subject.clone(),
                    partial: record.is_partial(),
                });
                record
            }
            None => {
                self.counters.fetch_failures.fetch_add(1, Ordering::Relaxed);
                self.event_bus
                    .publish(StatusEvent::FetchFailed(subject.clone()));
                Arc::new(StatusRecord::empty(subject.clone()))
            }
        };

        tx.send_replace(Some(Arc::clone(&record)));
        record
    }

    /// Fan out one lookup per category; `None` if the gather itself failed
    async fn gather(&self, subject: &SubjectKey) -> Option<Vec<CategoryStatus>> {
        let lookup = &self.lookup;
        let pending = self.config.categories.iter().map(|&category| async move {
            (category, lookup.lookup(subject, category).await)
        });

        let results = match AssertUnwindSafe(join_all(pending)).catch_unwind().await {
            Ok(results) => results,
            Err(panic) => {
                error!(
                    %subject,
                    lookup = self.lookup.name(),
                    reason = %panic_message(&*panic),
                    "Status fan-out failed"
                );
                return None;
            }
        };

        let entries = results
            .into_iter()
            .map(|(category, result)| match result {
                Ok(outcome) => CategoryStatus::from_outcome(category, outcome),
                Err(e) => {
                    self.counters.lookup_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(%subject, %category, error = %e, "Category lookup failed");
                    self.event_bus.publish(StatusEvent::LookupFailed {
                        subject: subject.clone(),
                        category,
                        reason: e.to_string(),
                    });
                    CategoryStatus::failed(category, e.to_string())
                }
            })
            .collect();

        Some(entries)
    }

    /// Register a callback run after every completed fetch, for any subject
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SubjectKey, &StatusRecord) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Drop one subject's entry, or everything when `subject` is `None`
    ///
    /// In-flight fetches keep running and will repopulate their entry.
    pub fn invalidate(&self, subject: Option<&SubjectKey>) {
        match subject {
            Some(subject) => {
                self.entries.remove(subject);
                debug!(%subject, "Status cache entry invalidated");
            }
            None => {
                self.entries.clear();
                debug!("Status cache cleared");
            }
        }
        self.event_bus
            .publish(StatusEvent::Invalidated(subject.cloned()));
    }

    /// Fetch (or reuse) the record and check one category
    pub async fn is_completed(&self, subject: &SubjectKey, category: Category) -> bool {
        self.fetch(subject).await.is_completed(category)
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
