//! Request-scoped predicates over transaction documents.
//!
//! A [Predicate] is an ordered list of clauses that must all hold for a record to match.
//! It knows nothing about how the record store evaluates it, see
//! [crate::transaction::sql] for the SQLite rendering.

use std::fmt::Display;

use crate::transaction::{SALE_STATUS, STATUS_FIELD};

/// A path to a (possibly nested) field of a transaction document, e.g. `Product.Platform`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// Split a dotted key into a field path.
    pub fn new(dotted: &str) -> Self {
        Self(dotted.split('.').map(str::to_owned).collect())
    }

    /// The field names from the document root down to the target field.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Whether the path points into a nested sub-record.
    pub fn is_nested(&self) -> bool {
        self.0.len() > 1
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// A typed value to compare a field against.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// A string, compared exactly.
    Text(String),
    /// A JSON number.
    Number(f64),
    /// A JSON boolean.
    Bool(bool),
}

/// A single match condition on one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// The field is exactly equal to the value.
    Equals(Scalar),
    /// The field is a number equal to the value.
    NumericEquals(f64),
    /// The field is a boolean equal to the value.
    BooleanEquals(bool),
    /// The field is one of the strings, ignoring ASCII case.
    InSet(Vec<String>),
    /// The field is missing or not one of the strings, ignoring ASCII case.
    NotInSet(Vec<String>),
    /// The field sorts at or after the bound.
    RangeGte(String),
    /// The field sorts at or before the bound.
    RangeLte(String),
    /// The first 10 characters of the field equal the `YYYY-MM-DD` day.
    DayEquals(String),
    /// The field contains the text, ignoring ASCII case.
    ///
    /// The text is a literal: characters with a special meaning to the store's pattern
    /// language are escaped when the predicate is rendered.
    RegexContains(String),
}

/// A condition bound to the field it applies to.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    /// The field the condition is evaluated against.
    pub field: FieldPath,
    /// The condition that must hold.
    pub condition: Condition,
}

/// A conjunction of clauses. The empty predicate matches every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    clauses: Vec<Clause>,
}

impl Predicate {
    /// Create a predicate that matches everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a clause to the predicate.
    pub fn push(&mut self, field: FieldPath, condition: Condition) {
        self.clauses.push(Clause { field, condition });
    }

    /// Add a clause, builder style.
    pub fn and(mut self, field: FieldPath, condition: Condition) -> Self {
        self.push(field, condition);
        self
    }

    /// The clauses in the order they were added.
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Whether the predicate has no clauses.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// The subset of matching records that are completed sales.
    pub fn sales(&self) -> Self {
        self.clone().and(
            FieldPath::new(STATUS_FIELD),
            Condition::InSet(vec![SALE_STATUS.to_owned()]),
        )
    }
}
