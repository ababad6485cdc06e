//! SiftBar core library.
//!
//! Schema-driven filter bars for list views: a generic controller compiles a
//! fixed schema of filter fields into a conjunctive [`expr::FilterExpression`]
//! and submits it to the host view's reload hook, while
//! [`resolver::ReferenceResolver`] turns free text into resolved entity ids
//! through debounced remote lookups. Document types contribute schemas only
//! (see [`catalog`]); the compiling logic exists once.

pub mod backend;
pub mod bar;
pub mod catalog;
pub mod columns;
pub mod errors;
pub mod expr;
pub mod id;
pub mod resolver;
pub mod schema;
pub mod service;
pub mod shortcuts;

pub use backend::RediSearchService;
pub use bar::{BarPhase, FilterBar};
pub use catalog::{BarBlueprint, blueprint, blueprints};
pub use columns::ColumnPrefs;
pub use errors::*;
pub use expr::{Clause, CompareOp, FilterExpression, NO_MATCH_ID, Predicate, Value};
pub use id::InstanceId;
pub use resolver::{NavDirection, ReferenceCandidate, ReferenceResolver, ResolverConfig};
pub use schema::{
    BarSchema, DateBound, DatePolicy, Direction, EnumChoice, FieldKind, FieldSchema, RelatedLookup, ShortcutScope,
};
pub use service::{
    Notification, Notifier, NullNotifier, QueryService, Reload, Row, SearchOptions, Severity, SortOrder,
};
pub use shortcuts::{Focus, Key};

// Re-export redis so hosts wiring the adapter don't need to pin a matching
// version themselves.
pub use redis;
pub use redis::aio::ConnectionManager;

// Re-export inventory for blueprint registration in host crates.
pub use inventory;
