//! Debounced autocomplete turning free text into a resolved entity id.
//!
//! The resolver is an attachable behavior: it owns the suggestion surface
//! (candidate list + highlight cursor) and the resolved selection, while the
//! visible input itself belongs to whoever attached it. Every keystroke
//! restarts a debounce timer; only the most recently scheduled lookup may
//! apply its results. Staleness is enforced twice, with a monotonic
//! generation checked both before the remote call and again before results
//! are applied, so a slow in-flight response can never clobber a newer one.
//!
//! Autocomplete is a convenience path: remote failures close the surface and
//! are logged only, since the free-text substring fallback remains valid.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;

#[cfg(feature = "utoipa")]
use utoipa::ToSchema;

use crate::expr::{FilterExpression, Predicate};
use crate::service::{QueryService, Row, SearchOptions, SortOrder};

const DEFAULT_DEBOUNCE_MS: u64 = 250;
const DEFAULT_LIMIT: u64 = 10;
const MAX_LIMIT: u64 = 20;
/// Grace window so a click-to-select lands before a blur closes the surface.
const BLUR_GRACE_MS: u64 = 120;

/// A candidate returned by the remote lookup.
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceCandidate {
    pub id: i64,
    pub label: String,
    /// Secondary code (internal reference, SKU, login) when the entity has one.
    pub code: Option<String>,
}

impl ReferenceCandidate {
    pub fn new(id: i64, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Build a candidate from a result row. Ids may arrive as JSON numbers
    /// or numeric strings; rows missing id or label are skipped by callers.
    pub fn from_row(row: &Row, id_field: &str, label_field: &str, code_field: Option<&str>) -> Option<Self> {
        let id_value = row.get(id_field)?;
        let id = id_value
            .as_i64()
            .or_else(|| id_value.as_str().and_then(|s| s.parse::<i64>().ok()))?;
        let label = row.get(label_field)?.as_str()?.to_string();
        let code = code_field
            .and_then(|field| row.get(field))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        Some(Self { id, label, code })
    }
}

/// Candidate domain configuration for one resolver.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Entity kind searched for candidates.
    pub entity: String,
    /// Paths matched (case-insensitive substring) against the typed text,
    /// typically display name plus a secondary code.
    pub search_paths: Vec<String>,
    pub id_field: String,
    pub label_field: String,
    pub code_field: Option<String>,
    pub limit: u64,
    pub debounce: Duration,
}

impl ResolverConfig {
    pub fn new(entity: impl Into<String>, id_field: impl Into<String>, label_field: impl Into<String>) -> Self {
        let label_field = label_field.into();
        Self {
            entity: entity.into(),
            search_paths: vec![label_field.clone()],
            id_field: id_field.into(),
            label_field,
            code_field: None,
            limit: DEFAULT_LIMIT,
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
        }
    }

    /// Also match and surface a secondary code path.
    pub fn with_code(mut self, code_field: impl Into<String>) -> Self {
        let code_field = code_field.into();
        if !self.search_paths.contains(&code_field) {
            self.search_paths.push(code_field.clone());
        }
        self.code_field = Some(code_field);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit.clamp(1, MAX_LIMIT);
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }
}

/// Highlight cursor movement. Navigation is clamped at the edges, the safer
/// of the two behaviors observed across the source variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavDirection {
    Up,
    Down,
}

#[derive(Debug, Default)]
struct Surface {
    open: bool,
    candidates: Vec<ReferenceCandidate>,
    highlight: Option<usize>,
    resolved: Option<ReferenceCandidate>,
    text: String,
}

struct ResolverInner {
    cfg: ResolverConfig,
    service: Arc<dyn QueryService>,
    surface: Mutex<Surface>,
    /// Monotonic lookup generation; a stale generation may not touch the surface.
    generation: AtomicU64,
    pending: Mutex<Option<JoinHandle<()>>>,
    grace: Mutex<Option<JoinHandle<()>>>,
}

/// Cloneable handle to one resolver instance.
#[derive(Clone)]
pub struct ReferenceResolver {
    inner: Arc<ResolverInner>,
}

impl ReferenceResolver {
    pub fn new(cfg: ResolverConfig, service: Arc<dyn QueryService>) -> Self {
        Self {
            inner: Arc::new(ResolverInner {
                cfg,
                service,
                surface: Mutex::new(Surface::default()),
                generation: AtomicU64::new(0),
                pending: Mutex::new(None),
                grace: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.inner.cfg
    }

    /// Handle a keystroke. Clears any previous resolution, then schedules a
    /// debounced lookup; empty input just closes the surface.
    pub fn on_input(&self, text: &str) {
        let generation = self.bump_generation();
        self.abort_pending();

        {
            let mut surface = self.inner.surface.lock().unwrap();
            surface.resolved = None;
            surface.text = text.to_string();
            if text.trim().is_empty() {
                surface.open = false;
                surface.candidates.clear();
                surface.highlight = None;
                return;
            }
        }

        let needle = text.trim().to_string();
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(inner.cfg.debounce).await;
            if inner.generation.load(Ordering::SeqCst) != generation {
                return;
            }

            let filter = candidate_filter(&inner.cfg, &needle);
            let projection = projection_fields(&inner.cfg);
            let projection_refs: Vec<&str> = projection.iter().map(String::as_str).collect();
            let options = SearchOptions::new()
                .with_limit(inner.cfg.limit)
                .with_order(inner.cfg.label_field.clone(), SortOrder::Asc);

            let outcome = inner
                .service
                .search(&inner.cfg.entity, &filter, &projection_refs, options)
                .await;

            let mut surface = inner.surface.lock().unwrap();
            if inner.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            match outcome {
                Ok(rows) => {
                    surface.candidates = rows
                        .iter()
                        .filter_map(|row| {
                            ReferenceCandidate::from_row(
                                row,
                                &inner.cfg.id_field,
                                &inner.cfg.label_field,
                                inner.cfg.code_field.as_deref(),
                            )
                        })
                        .collect();
                    surface.highlight = None;
                    surface.open = !surface.candidates.is_empty();
                }
                Err(err) => {
                    log::debug!("autocomplete lookup on '{}' failed: {}", inner.cfg.entity, err);
                    surface.open = false;
                    surface.candidates.clear();
                    surface.highlight = None;
                }
            }
        });

        *self.inner.pending.lock().unwrap() = Some(handle);
    }

    /// Accept a candidate: resolve the id, echo the label into the input,
    /// close the surface, and invalidate any lookup still in flight.
    pub fn on_select(&self, candidate: &ReferenceCandidate) {
        self.bump_generation();
        self.abort_pending();
        let mut surface = self.inner.surface.lock().unwrap();
        surface.text = candidate.label.clone();
        surface.resolved = Some(candidate.clone());
        surface.open = false;
        surface.candidates.clear();
        surface.highlight = None;
    }

    /// Move the highlight cursor, clamped at both edges.
    pub fn navigate(&self, direction: NavDirection) {
        let mut surface = self.inner.surface.lock().unwrap();
        if !surface.open || surface.candidates.is_empty() {
            return;
        }
        let last = surface.candidates.len() - 1;
        surface.highlight = match (direction, surface.highlight) {
            (NavDirection::Down, None) => Some(0),
            (NavDirection::Down, Some(i)) => Some((i + 1).min(last)),
            (NavDirection::Up, None) => None,
            (NavDirection::Up, Some(i)) => Some(i.saturating_sub(1)),
        };
    }

    /// Close the surface after a short grace delay, leaving the resolved
    /// state untouched. The delay lets a pending click-to-select register
    /// before the surface disappears.
    pub fn close_soon(&self) {
        let generation = self.inner.generation.load(Ordering::SeqCst);
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(BLUR_GRACE_MS)).await;
            if inner.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            let mut surface = inner.surface.lock().unwrap();
            surface.open = false;
            surface.highlight = None;
        });
        if let Some(previous) = self.inner.grace.lock().unwrap().replace(handle) {
            previous.abort();
        }
    }

    /// Close immediately, keeping resolution and candidates.
    pub fn close(&self) {
        let mut surface = self.inner.surface.lock().unwrap();
        surface.open = false;
        surface.highlight = None;
    }

    /// Forget everything: text, candidates, resolution, in-flight lookups.
    pub fn reset(&self) {
        self.bump_generation();
        self.abort_pending();
        let mut surface = self.inner.surface.lock().unwrap();
        *surface = Surface::default();
    }

    /// Cancel all pending timers and invalidate in-flight lookups. Called on
    /// unmount; afterwards no scheduled remote call will fire or apply.
    pub fn shutdown(&self) {
        self.bump_generation();
        self.abort_pending();
        self.close();
    }

    // ---- Surface accessors -------------------------------------------------

    pub fn is_open(&self) -> bool {
        self.inner.surface.lock().unwrap().open
    }

    pub fn candidates(&self) -> Vec<ReferenceCandidate> {
        self.inner.surface.lock().unwrap().candidates.clone()
    }

    pub fn highlighted(&self) -> Option<ReferenceCandidate> {
        let surface = self.inner.surface.lock().unwrap();
        surface.highlight.and_then(|i| surface.candidates.get(i).cloned())
    }

    pub fn resolved(&self) -> Option<ReferenceCandidate> {
        self.inner.surface.lock().unwrap().resolved.clone()
    }

    pub fn text(&self) -> String {
        self.inner.surface.lock().unwrap().text.clone()
    }

    // ---- Internals ---------------------------------------------------------

    fn bump_generation(&self) -> u64 {
        self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn abort_pending(&self) {
        if let Some(handle) = self.inner.pending.lock().unwrap().take() {
            handle.abort();
        }
        if let Some(handle) = self.inner.grace.lock().unwrap().take() {
            handle.abort();
        }
    }
}

fn candidate_filter(cfg: &ResolverConfig, needle: &str) -> FilterExpression {
    let mut filter = FilterExpression::empty();
    filter.push_any(
        cfg.search_paths
            .iter()
            .map(|path| Predicate::contains_ci(path.clone(), needle))
            .collect(),
    );
    filter
}

fn projection_fields(cfg: &ResolverConfig) -> Vec<String> {
    let mut fields = vec![cfg.id_field.clone(), cfg.label_field.clone()];
    if let Some(code) = &cfg.code_field
        && !fields.contains(code)
    {
        fields.push(code.clone());
    }
    fields
}
