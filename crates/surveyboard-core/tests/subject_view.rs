//! SubjectView follows one subject through the shared cache

mod common;

use common::{key, Script, ScriptedLookup};
use std::sync::Arc;
use surveyboard_core::{CacheConfig, Category, LookupOutcome, StatusCache, SubjectView};

fn completed(at: &str) -> Script {
    Script::Outcome(LookupOutcome::completed(
        Some(at.to_string()),
        Some(serde_json::json!({"completed_at": at})),
    ))
}

fn setup() -> (Arc<ScriptedLookup>, Arc<StatusCache>) {
    let lookup = Arc::new(
        ScriptedLookup::new()
            .script("u1", Category::Year(2021), completed("2021-10-01"))
            .script("u1", Category::Year(2024), completed("2024-03-15"))
            .script("u1", Category::Current, completed("2021-10-01")),
    );
    let cache = Arc::new(StatusCache::new(lookup.clone(), CacheConfig::default()).unwrap());
    (lookup, cache)
}

#[tokio::test(start_paused = true)]
async fn test_view_starts_loading_and_settles_after_load() {
    let (_lookup, cache) = setup();
    let view = SubjectView::attach(Arc::clone(&cache), key("u1"));

    assert!(view.is_loading());
    assert!(view.record().is_none());
    assert!(!view.is_completed(Category::Year(2021)));

    view.load().await;

    assert!(!view.is_loading());
    assert!(view.is_completed(Category::Year(2021)));
    assert!(view.is_completed(Category::Year(2024)));
    assert!(!view.is_completed(Category::Year(2022)));
    assert_eq!(view.completed_count(), 2);
    assert_eq!(
        view.payload(Category::Year(2024)),
        Some(serde_json::json!({"completed_at": "2024-03-15"}))
    );
    assert_eq!(
        view.status(Category::Current).unwrap().completed_at.as_deref(),
        Some("2021-10-01")
    );
}

#[tokio::test(start_paused = true)]
async fn test_view_picks_up_fetches_made_elsewhere() {
    let (_lookup, cache) = setup();
    let view = SubjectView::attach(Arc::clone(&cache), key("u1"));
    let other = SubjectView::attach(Arc::clone(&cache), key("u2"));

    cache.fetch(&key("u1")).await;

    assert!(!view.is_loading());
    assert!(view.is_completed(Category::Year(2021)));

    // Notifications for other subjects are ignored
    assert!(other.is_loading());
    assert!(other.record().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_view_refresh_bypasses_ttl() {
    let (lookup, cache) = setup();
    let view = SubjectView::attach(Arc::clone(&cache), key("u1"));

    view.load().await;
    view.load().await;
    assert_eq!(lookup.calls(), 5);

    lookup.set("u1", Category::Year(2022), completed("2022-05-01"));
    view.refresh().await;

    assert_eq!(lookup.calls(), 10);
    assert!(view.is_completed(Category::Year(2022)));
    assert_eq!(view.completed_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_view_unsubscribes() {
    let (_lookup, cache) = setup();
    let view = SubjectView::attach(Arc::clone(&cache), key("u1"));
    assert_eq!(cache.subscriber_count(), 1);

    drop(view);
    assert_eq!(cache.subscriber_count(), 0);
}
