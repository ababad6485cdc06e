//! Collaborator seams.
//!
//! The bar consumes exactly two remote interfaces, both black boxes: a
//! side-effect-free [`QueryService`] used for autocomplete candidates,
//! pick-list population, and cross-entity lookups, and the host view's
//! [`Reload`] which re-executes the visible result set under a new filter.
//! User-facing messages go through [`Notifier`]. All three are injected at
//! mount; nothing in this crate reaches for a shared global to find them.

use async_trait::async_trait;
use serde::Serialize;

#[cfg(feature = "utoipa")]
use utoipa::ToSchema;

use crate::errors::QueryError;
use crate::expr::FilterExpression;

/// One result row, keyed by projection field.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Sort direction for [`SearchOptions::order`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub limit: Option<u64>,
    pub order: Option<(String, SortOrder)>,
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[inline]
    pub fn with_order(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.order = Some((field.into(), order));
        self
    }
}

/// Remote read/search interface. Assumed idempotent and side-effect-free.
#[async_trait]
pub trait QueryService: Send + Sync {
    async fn search(
        &self,
        entity: &str,
        filter: &FilterExpression,
        projection: &[&str],
        options: SearchOptions,
    ) -> Result<Vec<Row>, QueryError>;
}

/// Host list view's re-query hook. Must tolerate repeated calls with the
/// same or an empty expression.
#[async_trait]
pub trait Reload: Send + Sync {
    async fn reload(&self, filter: FilterExpression) -> anyhow::Result<()>;
}

#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Warning,
    Error,
}

#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub severity: Severity,
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn success(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            severity: Severity::Success,
            title: title.into(),
            body: body.into(),
        }
    }

    pub fn warning(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            title: title.into(),
            body: body.into(),
        }
    }

    pub fn error(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Sink for user-facing notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Notifier that drops everything; handy for headless hosts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _notification: Notification) {}
}
