//! The filter-bar controller.
//!
//! A [`FilterBar`] owns the field state for one mounted bar, compiles it into
//! a [`FilterExpression`] by kind-specific rules, and submits the result to
//! the host view's reload hook. Collaborators are injected at mount; each
//! bar is an isolated instance with an opaque handle, so concurrently
//! mounted bars for different document types cannot collide.
//!
//! Compilation is forgiving: malformed numeric or date input is treated as
//! absent rather than erroring, so a half-typed value never blocks the rest
//! of the bar. The one exception is the both-dates-required
//! contract, which is user-facing validation and aborts before any remote
//! call.
//!
//! Fields start *pristine*: the prefilled default date range is presentation
//! only and compiles to nothing until the user touches it. `clear()` puts
//! every field back into that state and always submits the empty expression,
//! so cleared bars can never serve cached, stale restrictions.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use chrono::{Datelike, Local, NaiveDate};

use crate::errors::{BarError, QueryError, ValidationError, ValidationIssue};
use crate::expr::{Clause, CompareOp, FilterExpression, Predicate, Value};
use crate::id::InstanceId;
use crate::resolver::{NavDirection, ReferenceCandidate, ReferenceResolver};
use crate::schema::{BarSchema, DateBound, DatePolicy, FieldKind, FieldSchema, RelatedLookup};
use crate::service::{Notification, Notifier, QueryService, Reload, SearchOptions};
use crate::shortcuts::{self, Key};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Submission lifecycle of a bar. Transient phases always settle back to
/// `Idle`; there is no automatic retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BarPhase {
    #[default]
    Idle,
    Compiling,
    Submitting,
    ValidationFailed,
}

#[derive(Debug, Clone)]
struct FieldState {
    raw: Option<String>,
    resolved: Option<ReferenceCandidate>,
    /// Untouched since mount/clear; pristine values never compile.
    pristine: bool,
}

impl FieldState {
    fn fresh(schema: &FieldSchema) -> Self {
        let raw = match &schema.kind {
            FieldKind::Date { bound, .. } => Some(default_date(*bound).format(DATE_FORMAT).to_string()),
            _ => None,
        };
        Self {
            raw,
            resolved: None,
            pristine: true,
        }
    }

    /// The value compilation sees: trimmed, non-empty, user-entered.
    fn present(&self) -> Option<&str> {
        if self.pristine {
            return None;
        }
        let trimmed = self.raw.as_deref()?.trim();
        if trimmed.is_empty() { None } else { Some(trimmed) }
    }
}

#[derive(Debug, Default)]
struct BarState {
    fields: Vec<FieldState>,
    focus: Option<usize>,
    phase: BarPhase,
}

enum PlanStep {
    Ready(Clause),
    Lookup { lookup: RelatedLookup, needle: String },
}

/// One mounted filter bar.
pub struct FilterBar {
    id: InstanceId,
    schema: BarSchema,
    service: Arc<dyn QueryService>,
    reload: Arc<dyn Reload>,
    notifier: Arc<dyn Notifier>,
    resolvers: HashMap<String, ReferenceResolver>,
    state: Mutex<BarState>,
}

impl FilterBar {
    /// Validate the schema, build one resolver per reference field, apply
    /// date defaults, and register the bar's shortcut scope.
    pub fn mount(
        schema: BarSchema,
        service: Arc<dyn QueryService>,
        reload: Arc<dyn Reload>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Arc<Self>, BarError> {
        schema.validate()?;

        let mut resolvers = HashMap::new();
        for field in &schema.fields {
            if let FieldKind::Reference { resolver, .. } = &field.kind {
                resolvers.insert(
                    field.name.clone(),
                    ReferenceResolver::new(resolver.clone(), Arc::clone(&service)),
                );
            }
        }

        let fields = schema.fields.iter().map(FieldState::fresh).collect();
        let bar = Arc::new(Self {
            id: InstanceId::generate(),
            schema,
            service,
            reload,
            notifier,
            resolvers,
            state: Mutex::new(BarState {
                fields,
                focus: None,
                phase: BarPhase::Idle,
            }),
        });
        shortcuts::register_scope(&bar);
        Ok(bar)
    }

    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    pub fn schema(&self) -> &BarSchema {
        &self.schema
    }

    pub fn phase(&self) -> BarPhase {
        self.state.lock().unwrap().phase
    }

    /// Resolver attached to a reference field, if the field has one.
    pub fn resolver(&self, name: &str) -> Option<&ReferenceResolver> {
        self.resolvers.get(name)
    }

    /// Current raw value of a field.
    pub fn value(&self, name: &str) -> Result<Option<String>, BarError> {
        let idx = self.field_index(name)?;
        Ok(self.state.lock().unwrap().fields[idx].raw.clone())
    }

    /// Resolved id of a reference field, if a candidate was selected.
    pub fn resolved_id(&self, name: &str) -> Result<Option<i64>, BarError> {
        let idx = self.field_index(name)?;
        Ok(self.state.lock().unwrap().fields[idx].resolved.as_ref().map(|c| c.id))
    }

    /// Programmatic write. Marks the field touched and, on reference fields,
    /// discards any previous resolution: text and id are never both
    /// meaningful at once.
    pub fn set_value(&self, name: &str, value: &str) -> Result<(), BarError> {
        let idx = self.field_index(name)?;
        let mut state = self.state.lock().unwrap();
        let field = &mut state.fields[idx];
        field.raw = Some(value.to_string());
        field.resolved = None;
        field.pristine = false;
        Ok(())
    }

    /// The user-typing path: writes the value, focuses the field, and feeds
    /// the attached resolver on reference fields.
    pub fn input(&self, name: &str, value: &str) -> Result<(), BarError> {
        self.set_value(name, value)?;
        self.focus_field(name)?;
        if let Some(resolver) = self.resolvers.get(name) {
            resolver.on_input(value);
        }
        Ok(())
    }

    /// Record a resolved candidate on a reference field.
    pub fn set_resolved(&self, name: &str, candidate: &ReferenceCandidate) -> Result<(), BarError> {
        let idx = self.field_index(name)?;
        if !self.schema.fields[idx].is_reference() {
            return Err(BarError::NotReference { name: name.to_string() });
        }
        let mut state = self.state.lock().unwrap();
        let field = &mut state.fields[idx];
        field.raw = Some(candidate.label.clone());
        field.resolved = Some(candidate.clone());
        field.pristine = false;
        Ok(())
    }

    /// Selection wiring: accept the candidate on the resolver surface and
    /// record it on the field in one step.
    pub fn select_candidate(&self, name: &str, candidate: &ReferenceCandidate) -> Result<(), BarError> {
        if let Some(resolver) = self.resolvers.get(name) {
            resolver.on_select(candidate);
        }
        self.set_resolved(name, candidate)
    }

    /// Move focus to a field and claim the global shortcut focus.
    pub fn focus_field(&self, name: &str) -> Result<(), BarError> {
        let idx = self.field_index(name)?;
        self.state.lock().unwrap().focus = Some(idx);
        shortcuts::focus_bar(&self.id);
        Ok(())
    }

    /// Compile the current field state without submitting it. Cross-entity
    /// fields perform their intermediate lookup here.
    pub async fn compile(&self) -> Result<FilterExpression, BarError> {
        let plan = {
            let state = self.state.lock().unwrap();
            self.validate_dates(&state)?;
            self.compile_plan(&state)
        };

        let mut expr = FilterExpression::empty();
        for step in plan {
            match step {
                PlanStep::Ready(clause) => expr.push_clause(clause),
                PlanStep::Lookup { lookup, needle } => {
                    let ids = self
                        .collect_related_ids(&lookup, &needle)
                        .await
                        .map_err(|source| BarError::Lookup {
                            entity: lookup.entity.clone(),
                            source,
                        })?;
                    // Zero matches must exclude all rows, not fall back to
                    // the unfiltered set.
                    if ids.is_empty() {
                        expr.push(Predicate::match_nothing(&lookup.target_path));
                    } else {
                        expr.push(Predicate::id_in(&lookup.target_path, ids));
                    }
                }
            }
        }
        Ok(expr)
    }

    /// Compile and submit. Validation failures and failed sub-lookups abort
    /// before the reload call and surface a notification; reload failures
    /// are logged as warnings and the entered values stay on screen for
    /// correction and retry.
    pub async fn apply(&self) -> Result<(), BarError> {
        self.set_phase(BarPhase::Compiling);
        let result = self.apply_inner().await;
        self.set_phase(BarPhase::Idle);
        result
    }

    async fn apply_inner(&self) -> Result<(), BarError> {
        let expr = match self.compile().await {
            Ok(expr) => expr,
            Err(err) => {
                match &err {
                    BarError::Validation(validation) => {
                        self.set_phase(BarPhase::ValidationFailed);
                        self.notifier
                            .notify(Notification::error("Invalid filter", validation.summary()));
                    }
                    BarError::Lookup { entity, source } => {
                        self.notifier.notify(Notification::error(
                            "Filter lookup failed",
                            format!("Searching {} failed: {}", entity, source),
                        ));
                    }
                    other => {
                        self.notifier
                            .notify(Notification::error("Filter failed", other.to_string()));
                    }
                }
                return Err(err);
            }
        };

        self.submit(expr).await;
        Ok(())
    }

    /// Reset every field to its schema default (dates back to
    /// first-of-current-month..today, everything else empty), reset all
    /// resolvers, and submit the empty expression.
    pub async fn clear(&self) {
        {
            let mut state = self.state.lock().unwrap();
            for (i, field) in self.schema.fields.iter().enumerate() {
                state.fields[i] = FieldState::fresh(field);
            }
        }
        for resolver in self.resolvers.values() {
            resolver.reset();
        }
        self.submit(FilterExpression::empty()).await;
        self.set_phase(BarPhase::Idle);
    }

    async fn submit(&self, expr: FilterExpression) {
        self.set_phase(BarPhase::Submitting);
        let summary = if expr.is_empty() {
            "Showing unfiltered results".to_string()
        } else {
            format!("{} active criteria", expr.len())
        };
        match self.reload.reload(expr).await {
            Ok(()) => self.notifier.notify(Notification::success("Filter applied", summary)),
            Err(err) => log::warn!("reload failed on '{}': {err:#}", self.schema.key),
        }
    }

    /// Keyboard entry point. Enter selects the highlighted candidate when a
    /// suggestion surface is open, otherwise submits the bar; Escape closes
    /// an open surface, and clears the bar only when the schema opts in;
    /// arrows move the highlight cursor.
    pub async fn handle_key(&self, key: Key) {
        match key {
            Key::ArrowDown => {
                if let Some((_, resolver)) = self.focused_reference() {
                    resolver.navigate(NavDirection::Down);
                }
            }
            Key::ArrowUp => {
                if let Some((_, resolver)) = self.focused_reference() {
                    resolver.navigate(NavDirection::Up);
                }
            }
            Key::Enter => {
                if let Some((name, resolver)) = self.focused_reference()
                    && resolver.is_open()
                    && let Some(candidate) = resolver.highlighted()
                {
                    let _ = self.select_candidate(&name, &candidate);
                    return;
                }
                // Outcome surfaces through notifications.
                let _ = self.apply().await;
            }
            Key::Escape => {
                if let Some((_, resolver)) = self.focused_reference()
                    && resolver.is_open()
                {
                    resolver.close();
                    return;
                }
                if self.schema.escape_clears {
                    self.clear().await;
                }
            }
        }
    }

    /// Release the shortcut scope and cancel every pending resolver timer.
    /// After this returns, no scheduled remote call will fire.
    pub fn unmount(&self) {
        for resolver in self.resolvers.values() {
            resolver.shutdown();
        }
        shortcuts::release_scope(&self.id);
    }

    // ---- Compilation internals ---------------------------------------------

    fn compile_plan(&self, state: &BarState) -> Vec<PlanStep> {
        let mut plan = Vec::new();
        for (schema, field) in self.schema.fields.iter().zip(&state.fields) {
            match &schema.kind {
                FieldKind::Text { paths } => {
                    if let Some(needle) = field.present() {
                        plan.push(PlanStep::Ready(Clause::Any(
                            paths.iter().map(|path| Predicate::contains_ci(path, needle)).collect(),
                        )));
                    }
                }
                FieldKind::Number { path } => {
                    // Non-numeric input is treated as absent, never an error.
                    if let Some(raw) = field.present()
                        && let Ok(number) = raw.parse::<f64>()
                    {
                        plan.push(PlanStep::Ready(Clause::One(Predicate::new(
                            path,
                            CompareOp::Eq,
                            Value::Number(number),
                        ))));
                    }
                }
                FieldKind::Date { path, bound } => {
                    if let Some(date) = field.present().and_then(parse_date) {
                        let op = match bound {
                            DateBound::Lower => CompareOp::Ge,
                            DateBound::Upper => CompareOp::Le,
                        };
                        plan.push(PlanStep::Ready(Clause::One(Predicate::new(path, op, Value::Date(date)))));
                    }
                }
                FieldKind::Enum { path, choices } => {
                    if let Some(tag) = field.present()
                        && choices.iter().any(|choice| choice.value == tag)
                    {
                        plan.push(PlanStep::Ready(Clause::One(Predicate::new(
                            path,
                            CompareOp::Eq,
                            Value::text(tag),
                        ))));
                    }
                }
                FieldKind::Reference { id_path, label_path, .. } => {
                    if let Some(candidate) = &field.resolved {
                        plan.push(PlanStep::Ready(Clause::One(Predicate::id_eq(id_path, candidate.id))));
                    } else if let Some(needle) = field.present() {
                        plan.push(PlanStep::Ready(Clause::One(Predicate::contains_ci(label_path, needle))));
                    }
                }
                FieldKind::Related { lookup } => {
                    if let Some(needle) = field.present() {
                        plan.push(PlanStep::Lookup {
                            lookup: lookup.clone(),
                            needle: needle.to_string(),
                        });
                    }
                }
            }
        }
        plan
    }

    fn validate_dates(&self, state: &BarState) -> Result<(), ValidationError> {
        let mut lower: Option<(&str, Option<NaiveDate>)> = None;
        let mut upper: Option<(&str, Option<NaiveDate>)> = None;
        for (schema, field) in self.schema.fields.iter().zip(&state.fields) {
            if let FieldKind::Date { bound, .. } = &schema.kind {
                let parsed = field.present().and_then(parse_date);
                let slot = (schema.name.as_str(), parsed);
                match bound {
                    DateBound::Lower => lower.get_or_insert(slot),
                    DateBound::Upper => upper.get_or_insert(slot),
                };
            }
        }

        let mut issues = Vec::new();
        if self.schema.date_policy == DatePolicy::BothRequired
            && let (Some((lower_name, lower_date)), Some((upper_name, upper_date))) = (&lower, &upper)
            && lower_date.is_some() != upper_date.is_some()
        {
            let missing = if lower_date.is_none() { lower_name } else { upper_name };
            issues.push(ValidationIssue::new(
                *missing,
                "date_range_required",
                "Both start and end dates are required",
            ));
        }
        if let (Some((lower_name, Some(from))), Some((_, Some(to)))) = (&lower, &upper)
            && from > to
        {
            issues.push(ValidationIssue::new(
                *lower_name,
                "date_range_inverted",
                "Start date is after end date",
            ));
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(issues))
        }
    }

    async fn collect_related_ids(&self, lookup: &RelatedLookup, needle: &str) -> Result<Vec<i64>, QueryError> {
        let filter = FilterExpression::empty().with(Predicate::contains_ci(&lookup.match_path, needle));
        let rows = self
            .service
            .search(
                &lookup.entity,
                &filter,
                &[lookup.collect_path.as_str()],
                SearchOptions::new(),
            )
            .await?;

        let mut ids = BTreeSet::new();
        for row in &rows {
            if let Some(value) = row.get(&lookup.collect_path)
                && let Some(id) = value.as_i64().or_else(|| value.as_str().and_then(|s| s.parse().ok()))
            {
                ids.insert(id);
            }
        }
        Ok(ids.into_iter().collect())
    }

    fn focused_reference(&self) -> Option<(String, ReferenceResolver)> {
        let focus = self.state.lock().unwrap().focus?;
        let name = &self.schema.fields.get(focus)?.name;
        let resolver = self.resolvers.get(name)?;
        Some((name.clone(), resolver.clone()))
    }

    fn field_index(&self, name: &str) -> Result<usize, BarError> {
        self.schema
            .fields
            .iter()
            .position(|field| field.name == name)
            .ok_or_else(|| BarError::UnknownField { name: name.to_string() })
    }

    fn set_phase(&self, phase: BarPhase) {
        self.state.lock().unwrap().phase = phase;
    }
}

impl Drop for FilterBar {
    fn drop(&mut self) {
        for resolver in self.resolvers.values() {
            resolver.shutdown();
        }
        shortcuts::release_scope(&self.id);
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()
}

fn default_date(bound: DateBound) -> NaiveDate {
    let today = Local::now().date_naive();
    match bound {
        DateBound::Lower => today.with_day(1).unwrap_or(today),
        DateBound::Upper => today,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_date_fields_are_prefilled_but_pristine() {
        let field = FieldState::fresh(&FieldSchema::date_from("from", "order_date"));
        assert!(field.pristine);
        assert!(field.raw.is_some());
        assert_eq!(field.present(), None);
    }

    #[test]
    fn fresh_text_fields_are_empty() {
        let field = FieldState::fresh(&FieldSchema::text("number", "name"));
        assert_eq!(field.raw, None);
        assert_eq!(field.present(), None);
    }

    #[test]
    fn present_trims_whitespace() {
        let mut field = FieldState::fresh(&FieldSchema::text("number", "name"));
        field.raw = Some("  INV/7  ".to_string());
        field.pristine = false;
        assert_eq!(field.present(), Some("INV/7"));
        field.raw = Some("   ".to_string());
        assert_eq!(field.present(), None);
    }

    #[test]
    fn default_range_is_first_of_month_to_today() {
        let lower = default_date(DateBound::Lower);
        let upper = default_date(DateBound::Upper);
        assert_eq!(lower.day(), 1);
        assert!(lower <= upper);
        assert_eq!((lower.year(), lower.month()), (upper.year(), upper.month()));
    }

    #[test]
    fn parse_date_accepts_iso_and_rejects_garbage() {
        assert!(parse_date("2024-06-01").is_some());
        assert!(parse_date("06/01/2024").is_none());
        assert!(parse_date("soon").is_none());
    }
}
