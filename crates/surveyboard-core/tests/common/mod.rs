//! Scripted lookup shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use surveyboard_core::{Category, CoreError, LookupOutcome, StatusLookup, SubjectKey};

#[derive(Clone)]
pub enum Script {
    Outcome(LookupOutcome),
    Fail(String),
    Panic,
}

/// Lookup answering from a script, counting every call
pub struct ScriptedLookup {
    scripts: Mutex<HashMap<(String, Category), Script>>,
    delay: Duration,
    calls: AtomicUsize,
    calls_by_subject: Mutex<HashMap<String, usize>>,
}

impl ScriptedLookup {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            delay: Duration::from_millis(50),
            calls: AtomicUsize::new(0),
            calls_by_subject: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn script(self, subject: &str, category: Category, script: Script) -> Self {
        self.set(subject, category, script);
        self
    }

    pub fn set(&self, subject: &str, category: Category, script: Script) {
        self.scripts
            .lock()
            .insert((subject.to_string(), category), script);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, subject: &str) -> usize {
        self.calls_by_subject
            .lock()
            .get(subject)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl StatusLookup for ScriptedLookup {
    async fn lookup(
        &self,
        subject: &SubjectKey,
        category: Category,
    ) -> Result<LookupOutcome, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .calls_by_subject
            .lock()
            .entry(subject.as_str().to_string())
            .or_insert(0) += 1;

        tokio::time::sleep(self.delay).await;

        let script = self
            .scripts
            .lock()
            .get(&(subject.as_str().to_string(), category))
            .cloned();

        match script {
            Some(Script::Outcome(outcome)) => Ok(outcome),
            Some(Script::Fail(message)) => Err(CoreError::Lookup {
                category: category.to_string(),
                message,
            }),
            Some(Script::Panic) => panic!("lookup exploded for {}", category),
            None => Ok(LookupOutcome::not_completed()),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub fn key(s: &str) -> SubjectKey {
    SubjectKey::new(s).unwrap()
}
