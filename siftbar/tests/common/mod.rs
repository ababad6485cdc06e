//! Shared mock collaborators for bar behavior tests.

// Not every test binary exercises every helper.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use siftbar::{FilterExpression, Notification, Notifier, QueryError, QueryService, Reload, Row, SearchOptions, Severity};

#[derive(Debug, Clone)]
pub struct RecordedSearch {
    pub entity: String,
    pub filter: FilterExpression,
    pub projection: Vec<String>,
}

/// Query service returning canned rows per entity, recording every call.
#[derive(Default)]
pub struct MockQueryService {
    rows: Mutex<HashMap<String, Vec<Row>>>,
    failing: Mutex<HashSet<String>>,
    delay: Mutex<Option<Duration>>,
    calls: Mutex<Vec<RecordedSearch>>,
}

impl MockQueryService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rows(&self, entity: &str, rows: Vec<Row>) {
        self.rows.lock().unwrap().insert(entity.to_string(), rows);
    }

    pub fn fail_entity(&self, entity: &str) {
        self.failing.lock().unwrap().insert(entity.to_string());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> Vec<RecordedSearch> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl QueryService for MockQueryService {
    async fn search(
        &self,
        entity: &str,
        filter: &FilterExpression,
        projection: &[&str],
        _options: SearchOptions,
    ) -> Result<Vec<Row>, QueryError> {
        self.calls.lock().unwrap().push(RecordedSearch {
            entity: entity.to_string(),
            filter: filter.clone(),
            projection: projection.iter().map(|s| s.to_string()).collect(),
        });

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.lock().unwrap().contains(entity) {
            return Err(QueryError::Unavailable {
                message: format!("{} is down", entity),
            });
        }
        Ok(self.rows.lock().unwrap().get(entity).cloned().unwrap_or_default())
    }
}

/// Reload hook recording every submitted expression.
#[derive(Default)]
pub struct RecordingReload {
    calls: Mutex<Vec<FilterExpression>>,
    fail: AtomicBool,
}

impl RecordingReload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<FilterExpression> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<FilterExpression> {
        self.calls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Reload for RecordingReload {
    async fn reload(&self, filter: FilterExpression) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(filter);
        if self.fail.swap(false, Ordering::SeqCst) {
            anyhow::bail!("list view refused to refresh");
        }
        Ok(())
    }
}

/// Notifier collecting notifications for assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    notes: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notes(&self) -> Vec<Notification> {
        self.notes.lock().unwrap().clone()
    }

    pub fn severities(&self) -> Vec<Severity> {
        self.notes.lock().unwrap().iter().map(|n| n.severity).collect()
    }

    pub fn has_error(&self) -> bool {
        self.severities().contains(&Severity::Error)
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.notes.lock().unwrap().push(notification);
    }
}

/// Build a result row from JSON key/value pairs.
pub fn row(pairs: &[(&str, serde_json::Value)]) -> Row {
    let mut row = Row::new();
    for (key, value) in pairs {
        row.insert(key.to_string(), value.clone());
    }
    row
}
