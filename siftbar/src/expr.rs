//! Compiled filter expressions.
//!
//! A [`FilterExpression`] is an ordered list of clauses interpreted as a
//! conjunction. A clause is either a single [`Predicate`] or an [`Clause::Any`]
//! group, which matches when at least one of its predicates matches (the
//! "vendor OR customer" style alternate-path case).
//!
//! Invariant: the empty expression means *no restriction* and must compile to
//! the unfiltered query downstream, never to "match nothing". Code that needs
//! guaranteed-empty results uses [`Predicate::match_nothing`] instead of
//! omitting a clause.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier value guaranteed to match no row; backends assign ids from 1.
pub const NO_MATCH_ID: i64 = -1;

/// Comparison operators supported by the query seam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    /// Case-insensitive substring match.
    ContainsCi,
    /// Membership in a value list.
    In,
}

impl CompareOp {
    pub const fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::ContainsCi => "contains-ci",
            CompareOp::In => "in",
        }
    }
}

/// A comparison value. Dates stay typed so backends can pick their own
/// wire encoding (the RediSearch adapter maps them to numeric mirrors).
///
/// Untagged deserialization tries variants in order, so `Date` sits before
/// `Text`: an ISO date string round-trips as a date, everything else falls
/// through to text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
    Text(String),
    IntList(Vec<i64>),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(v) => write!(f, "'{}'", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Number(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Date(v) => write!(f, "{}", v),
            Value::IntList(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// An atomic comparison `(path, op, value)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub path: String,
    pub op: CompareOp,
    pub value: Value,
}

impl Predicate {
    pub fn new(path: impl Into<String>, op: CompareOp, value: Value) -> Self {
        Self {
            path: path.into(),
            op,
            value,
        }
    }

    /// Equality against a resolved integer identifier.
    pub fn id_eq(path: impl Into<String>, id: i64) -> Self {
        Self::new(path, CompareOp::Eq, Value::Int(id))
    }

    /// Case-insensitive substring match, the text-field workhorse.
    pub fn contains_ci(path: impl Into<String>, needle: impl Into<String>) -> Self {
        Self::new(path, CompareOp::ContainsCi, Value::text(needle))
    }

    /// Membership in an id set collected by a cross-entity lookup.
    pub fn id_in(path: impl Into<String>, ids: Vec<i64>) -> Self {
        Self::new(path, CompareOp::In, Value::IntList(ids))
    }

    /// A predicate guaranteed to exclude every row. Used when a cross-entity
    /// lookup found nothing: omitting the clause would fall back to the
    /// unfiltered set, which is the wrong answer.
    pub fn match_nothing(path: impl Into<String>) -> Self {
        Self::id_eq(path, NO_MATCH_ID)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.path, self.op.symbol(), self.value)
    }
}

/// One conjunct of a compiled expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Clause {
    One(Predicate),
    /// Disjunction group: matches when any member predicate matches.
    Any(Vec<Predicate>),
}

/// Ordered conjunction of clauses. Clause order is insertion order; there is
/// no precedence beyond the implicit AND between clauses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterExpression {
    clauses: Vec<Clause>,
}

impl FilterExpression {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn push(&mut self, predicate: Predicate) {
        self.clauses.push(Clause::One(predicate));
    }

    /// Push a disjunction group. Single-element groups collapse to a plain
    /// predicate; empty groups are dropped (a vacuous OR restricts nothing).
    pub fn push_any(&mut self, mut predicates: Vec<Predicate>) {
        match predicates.len() {
            0 => {}
            1 => {
                if let Some(predicate) = predicates.pop() {
                    self.push(predicate);
                }
            }
            _ => self.clauses.push(Clause::Any(predicates)),
        }
    }

    pub fn push_clause(&mut self, clause: Clause) {
        match clause {
            Clause::One(p) => self.push(p),
            Clause::Any(ps) => self.push_any(ps),
        }
    }

    #[inline]
    pub fn with(mut self, predicate: Predicate) -> Self {
        self.push(predicate);
        self
    }

    /// Flat iterator over every predicate, group members included.
    pub fn predicates(&self) -> impl Iterator<Item = &Predicate> {
        self.clauses.iter().flat_map(|clause| match clause {
            Clause::One(p) => std::slice::from_ref(p).iter(),
            Clause::Any(ps) => ps.iter(),
        })
    }
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.clauses.is_empty() {
            return write!(f, "<unrestricted>");
        }
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                write!(f, " AND ")?;
            }
            match clause {
                Clause::One(p) => write!(f, "{}", p)?,
                Clause::Any(ps) => {
                    write!(f, "(")?;
                    for (j, p) in ps.iter().enumerate() {
                        if j > 0 {
                            write!(f, " OR ")?;
                        }
                        write!(f, "{}", p)?;
                    }
                    write!(f, ")")?;
                }
            }
        }
        Ok(())
    }
}

impl FromIterator<Predicate> for FilterExpression {
    fn from_iter<I: IntoIterator<Item = Predicate>>(iter: I) -> Self {
        Self {
            clauses: iter.into_iter().map(Clause::One).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_expression_is_unrestricted() {
        let expr = FilterExpression::empty();
        assert!(expr.is_empty());
        assert_eq!(expr.to_string(), "<unrestricted>");
    }

    #[test]
    fn clause_order_is_insertion_order() {
        let mut expr = FilterExpression::empty();
        expr.push(Predicate::contains_ci("name", "INV"));
        expr.push(Predicate::id_eq("partner_id", 7));
        let rendered = expr.to_string();
        assert_eq!(rendered, "name contains-ci 'INV' AND partner_id = 7");
    }

    #[test]
    fn single_member_group_collapses() {
        let mut expr = FilterExpression::empty();
        expr.push_any(vec![Predicate::contains_ci("number", "X")]);
        assert!(matches!(expr.clauses()[0], Clause::One(_)));
    }

    #[test]
    fn empty_group_is_dropped() {
        let mut expr = FilterExpression::empty();
        expr.push_any(Vec::new());
        assert!(expr.is_empty());
    }

    #[test]
    fn match_nothing_uses_sentinel() {
        let p = Predicate::match_nothing("id");
        assert_eq!(p.value.as_i64(), Some(NO_MATCH_ID));
        assert_eq!(p.op, CompareOp::Eq);
    }
}
