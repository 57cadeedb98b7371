//! Atom managers: the only factories of [`GroundAtom`] handles.
//!
//! A manager resolves `(predicate, constants)` to one canonical instance and
//! keeps returning that instance for the rest of its lifetime, so values
//! written by a solver through any handle are seen by every ground rule.
//!
//! - [`PersistedAtomManager`]: only atoms present in the backing store are
//!   known; anything else is an [`AtomError::UnknownGroundAtom`].
//! - [`LazyAtomManager`]: unknown atoms are deferred into a lazy set and
//!   activated later, with incremental regrounding.
//!
//! [`AtomError::UnknownGroundAtom`]: crate::error::AtomError::UnknownGroundAtom

pub mod lazy;
pub mod persisted;

use crate::database::{DatabaseQuery, ResultList};
use crate::error::{AtomResult, QueryResult};
use crate::ground::GroundAtom;
use crate::model::{Constant, Predicate};

pub use lazy::LazyAtomManager;
pub use persisted::PersistedAtomManager;

/// Resolves ground atoms and forwards grounding queries to the store.
pub trait AtomManager {
    /// The canonical instance of `predicate(args)`.
    fn get_atom(&mut self, predicate: &Predicate, args: &[Constant]) -> AtomResult<GroundAtom>;

    fn execute_query(&self, query: &DatabaseQuery) -> QueryResult<ResultList>;

    fn execute_union(&self, queries: &[DatabaseQuery]) -> QueryResult<ResultList>;
}
