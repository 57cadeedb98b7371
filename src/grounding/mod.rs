//! Rule grounding: turning first-order rules into ground rules.
//!
//! - [`arithmetic`]: linear constraints with summation atoms, expanded over
//!   the cross product of per-row selection sets.
//! - [`logical`]: clauses, grounded once per body substitution, either from
//!   a fresh query or from a precomputed result set.

pub mod arithmetic;
pub mod cross_product;
pub mod logical;

pub use cross_product::CrossProduct;
