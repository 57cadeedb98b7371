//! First-order model: terms, predicates, atoms, formulas, arithmetic
//! expressions and rules.
//!
//! Everything here is immutable once built and validated at construction,
//! so grounding never sees a malformed rule.

pub mod arithmetic;
pub mod atom;
pub mod formula;
pub mod predicate;
pub mod rule;
pub mod term;

pub use arithmetic::{
    ArithmeticRuleExpression, Coefficient, Comparator, ExpressionAtom, SummationAtom, SummationSets,
    SummationTerm, SummationVariable,
};
pub use atom::{Atom, AtomKey};
pub use formula::{Dnf, Formula, Literal};
pub use predicate::{ArgumentType, Predicate, PredicateKind, SpecialPredicate};
pub use rule::{ArithmeticRule, LogicalRule, Model, Rule};
pub use term::{Constant, Term, Variable};
