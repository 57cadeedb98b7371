//! Predicates: named, typed relations.
//!
//! Standard predicates are persisted in the backing store and partitioned;
//! functional predicates are computed from their arguments and never stored.
//! Only standard predicates take part in the lazy-atom protocol.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::term::Constant;

/// Declared type of one argument slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArgumentType {
    Integer,
    String,
}

impl ArgumentType {
    /// Whether `constant` is admissible in a slot of this type.
    pub fn accepts(self, constant: &Constant) -> bool {
        matches!(
            (self, constant),
            (ArgumentType::Integer, Constant::Int(_)) | (ArgumentType::String, Constant::Str(_))
        )
    }
}

impl fmt::Display for ArgumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentType::Integer => write!(f, "Integer"),
            ArgumentType::String => write!(f, "String"),
        }
    }
}

/// Built-in computed predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecialPredicate {
    /// `#Equal(a, b)`: 1.0 iff the constants are equal.
    Equal,
    /// `#NotEqual(a, b)`: 1.0 iff the constants differ.
    NotEqual,
    /// `#NonSymmetric(a, b)`: 1.0 iff `a < b`; breaks symmetric groundings.
    NonSymmetric,
}

impl SpecialPredicate {
    /// Truth value for fully ground arguments.
    pub fn value(self, args: &[Constant]) -> f64 {
        let holds = match (self, args) {
            (SpecialPredicate::Equal, [a, b]) => a == b,
            (SpecialPredicate::NotEqual, [a, b]) => a != b,
            (SpecialPredicate::NonSymmetric, [a, b]) => a < b,
            _ => false,
        };
        if holds { 1.0 } else { 0.0 }
    }

    fn name(self) -> &'static str {
        match self {
            SpecialPredicate::Equal => "#Equal",
            SpecialPredicate::NotEqual => "#NotEqual",
            SpecialPredicate::NonSymmetric => "#NonSymmetric",
        }
    }
}

/// Whether a predicate is persisted or computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredicateKind {
    Standard,
    Functional(SpecialPredicate),
}

/// A name plus an ordered list of argument type slots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Predicate {
    name: String,
    arg_types: Vec<ArgumentType>,
    kind: PredicateKind,
}

impl Predicate {
    /// Declare a standard (persisted) predicate.
    pub fn standard(name: impl Into<String>, arg_types: Vec<ArgumentType>) -> Self {
        Self {
            name: name.into(),
            arg_types,
            kind: PredicateKind::Standard,
        }
    }

    /// One of the built-in binary functional predicates, over `arg_type`.
    pub fn special(special: SpecialPredicate, arg_type: ArgumentType) -> Self {
        Self {
            name: special.name().to_string(),
            arg_types: vec![arg_type, arg_type],
            kind: PredicateKind::Functional(special),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arg_types.len()
    }

    pub fn arg_types(&self) -> &[ArgumentType] {
        &self.arg_types
    }

    pub fn kind(&self) -> PredicateKind {
        self.kind
    }

    pub fn is_standard(&self) -> bool {
        matches!(self.kind, PredicateKind::Standard)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
