//! Reference backing store for grounding.
//!
//! - [`MemDatabase`]: partitioned atom tables in concurrent hashmaps
//!   (DashMap), implementing [`Database`](crate::database::Database) and
//!   conjunctive query evaluation.
//! - [`TableStats`]: per-predicate row counts and column distributions used
//!   to order query literals.

pub mod mem;
pub mod stats;

pub use mem::MemDatabase;
pub use stats::TableStats;
