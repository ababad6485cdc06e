//! Bar schemas: the per-document-type description a [`crate::bar::FilterBar`]
//! is built from.
//!
//! Each document type supplies only a schema (field names, kinds, and
//! predicate-path mapping); the compiling logic lives once in the bar. The
//! schema also records the deliberate per-document choices the source
//! variants disagreed on: whether both date bounds are mandatory, whether
//! keyboard shortcuts apply globally or only while the bar has focus, and
//! whether Escape clears the bar.

use crate::errors::BarError;
use crate::resolver::ResolverConfig;

/// Which end of the bar's date range a date field represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBound {
    Lower,
    Upper,
}

/// Date-range contract for a bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DatePolicy {
    /// A missing end is treated as unbounded.
    #[default]
    OpenEnded,
    /// Both ends must be present if either is; violation is user-facing
    /// validation, not silent recovery.
    BothRequired,
}

/// Whether the bar answers Enter/Escape when no scope has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShortcutScope {
    /// Only while focus is inside this bar's scope.
    #[default]
    Scoped,
    /// Also when no foreign input is focused.
    Global,
}

/// Inbound documents carry a vendor reference, outbound a customer
/// reference. Exactly one of the two is rendered per bar instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

/// One selectable option of an enum field.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumChoice {
    pub value: String,
    pub label: String,
}

impl EnumChoice {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Cross-entity filter: match a path on a related sub-document, collect the
/// parent identifiers, and filter the primary documents by that id set.
#[derive(Debug, Clone)]
pub struct RelatedLookup {
    /// Entity kind of the sub-document to search.
    pub entity: String,
    /// Path on the sub-document matched with contains-ci.
    pub match_path: String,
    /// Projection field on the sub-document holding the parent id.
    pub collect_path: String,
    /// Predicate path on the primary document receiving the id set.
    pub target_path: String,
}

/// Field kind plus its predicate-path mapping.
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// Case-insensitive substring match. More than one path compiles to a
    /// disjunction group over the alternate paths.
    Text { paths: Vec<String> },
    /// Exact decimal match; non-numeric input is treated as absent.
    Number { path: String },
    /// One end of the bar's date range.
    Date { path: String, bound: DateBound },
    /// Exact match against a closed set of tags.
    Enum { path: String, choices: Vec<EnumChoice> },
    /// Autocomplete-backed foreign-entity reference. A resolved id compiles
    /// to id-equality; unresolved free text falls back to a substring match
    /// on the label path.
    Reference {
        id_path: String,
        label_path: String,
        resolver: ResolverConfig,
    },
    /// Cross-entity filter requiring an intermediate lookup.
    Related { lookup: RelatedLookup },
}

#[derive(Debug, Clone)]
pub struct FieldSchema {
    pub name: String,
    pub kind: FieldKind,
    pub placeholder: String,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            placeholder: String::new(),
        }
    }

    pub fn text(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldKind::Text {
                paths: vec![path.into()],
            },
        )
    }

    /// Text field matching any of several alternate paths.
    pub fn text_any<S: Into<String>>(name: impl Into<String>, paths: impl IntoIterator<Item = S>) -> Self {
        Self::new(
            name,
            FieldKind::Text {
                paths: paths.into_iter().map(Into::into).collect(),
            },
        )
    }

    pub fn number(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Number { path: path.into() })
    }

    pub fn date_from(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldKind::Date {
                path: path.into(),
                bound: DateBound::Lower,
            },
        )
    }

    pub fn date_to(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldKind::Date {
                path: path.into(),
                bound: DateBound::Upper,
            },
        )
    }

    pub fn enumeration(
        name: impl Into<String>,
        path: impl Into<String>,
        choices: impl IntoIterator<Item = EnumChoice>,
    ) -> Self {
        Self::new(
            name,
            FieldKind::Enum {
                path: path.into(),
                choices: choices.into_iter().collect(),
            },
        )
    }

    pub fn reference(
        name: impl Into<String>,
        id_path: impl Into<String>,
        label_path: impl Into<String>,
        resolver: ResolverConfig,
    ) -> Self {
        Self::new(
            name,
            FieldKind::Reference {
                id_path: id_path.into(),
                label_path: label_path.into(),
                resolver,
            },
        )
    }

    pub fn related(name: impl Into<String>, lookup: RelatedLookup) -> Self {
        Self::new(name, FieldKind::Related { lookup })
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.kind, FieldKind::Reference { .. })
    }
}

/// Schema for one filter bar: the entity it queries, its fields in display
/// (and compile) order, and the per-document behavioral choices.
#[derive(Debug, Clone)]
pub struct BarSchema {
    /// Stable key identifying the document type (also the blueprint key).
    pub key: String,
    /// Entity kind the host list view queries.
    pub entity: String,
    pub fields: Vec<FieldSchema>,
    pub date_policy: DatePolicy,
    pub shortcut_scope: ShortcutScope,
    /// Whether Escape with no open suggestion surface clears the bar.
    pub escape_clears: bool,
}

impl BarSchema {
    pub fn new(key: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            entity: entity.into(),
            fields: Vec::new(),
            date_policy: DatePolicy::default(),
            shortcut_scope: ShortcutScope::default(),
            escape_clears: false,
        }
    }

    /// Chainable field push; uniqueness is enforced at mount (or use
    /// [`BarSchema::register_field`] for an early check).
    pub fn with_field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    /// Declare a field, rejecting duplicate names immediately.
    pub fn register_field(&mut self, field: FieldSchema) -> Result<(), BarError> {
        if self.fields.iter().any(|existing| existing.name == field.name) {
            return Err(BarError::DuplicateField { name: field.name });
        }
        self.fields.push(field);
        Ok(())
    }

    pub fn with_date_policy(mut self, policy: DatePolicy) -> Self {
        self.date_policy = policy;
        self
    }

    pub fn with_shortcut_scope(mut self, scope: ShortcutScope) -> Self {
        self.shortcut_scope = scope;
        self
    }

    pub fn with_escape_clears(mut self, escape_clears: bool) -> Self {
        self.escape_clears = escape_clears;
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Every field name exactly once, or the first duplicate as an error.
    pub fn validate(&self) -> Result<(), BarError> {
        for (i, field) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|earlier| earlier.name == field.name) {
                return Err(BarError::DuplicateField {
                    name: field.name.clone(),
                });
            }
        }
        Ok(())
    }
}
