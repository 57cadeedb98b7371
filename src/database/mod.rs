//! Query executor and backing-store interfaces.
//!
//! Grounding only ever talks to the store through these traits: a
//! [`QueryExecutor`] turns a conjunctive [`DatabaseQuery`] into a
//! [`ResultList`] of variable substitutions, and a [`Database`] adds atom
//! lookup and the partition commit/move operations used by lazy activation.

mod query;

use crate::error::{QueryError, QueryResult, StoreResult};
use crate::ground::GroundAtom;
use crate::model::{AtomKey, Predicate};
use crate::partition::{PartitionId, PartitionLayout};

pub use query::{DatabaseQuery, ResultList, VariableAssignment};

/// Executes grounding queries.
pub trait QueryExecutor {
    /// All distinct substitutions of the projected variables satisfying the
    /// query.
    fn execute(&self, query: &DatabaseQuery) -> QueryResult<ResultList>;

    /// Set union of several queries over the same projection.
    fn execute_union(&self, queries: &[DatabaseQuery]) -> QueryResult<ResultList> {
        let (first, rest) = queries
            .split_first()
            .ok_or(QueryError::EmptyUnion)?;
        let mut union = self.execute(first)?;
        for query in rest {
            union.merge(self.execute(query)?);
        }
        Ok(union)
    }
}

/// A stored atom as seen by the atom managers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoredAtom {
    pub value: f64,
    pub partition: PartitionId,
}

/// A partitioned relational store.
pub trait Database: QueryExecutor {
    fn layout(&self) -> &PartitionLayout;

    /// Value given to atoms that are not stored.
    fn default_value(&self) -> f64;

    /// Look up an atom in the visible partitions.
    fn get_atom(&self, key: &AtomKey) -> Option<StoredAtom>;

    /// Write the atoms, with their current values, into `partition`. An atom
    /// already stored in a different partition is rejected.
    fn commit(&self, atoms: &[GroundAtom], partition: PartitionId) -> StoreResult<()>;

    /// Move every atom of `predicate` stored in `from` into the write
    /// partition. Returns how many atoms moved.
    fn move_to_write_partition(&self, predicate: &Predicate, from: PartitionId) -> StoreResult<usize>;
}
