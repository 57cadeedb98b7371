//! Atom manager backed by the persisted store.

use std::collections::HashMap;
use std::sync::Arc;

use crate::database::{Database, DatabaseQuery, ResultList};
use crate::error::{AtomError, AtomResult, QueryResult};
use crate::ground::{AtomState, GroundAtom};
use crate::model::{AtomKey, Constant, Predicate, PredicateKind};
use crate::partition::PartitionId;

use super::AtomManager;

/// Resolves atoms that exist in the visible partitions of a [`Database`].
///
/// Functional atoms are computed on first use and cached like stored ones.
pub struct PersistedAtomManager<D> {
    db: Arc<D>,
    cache: HashMap<AtomKey, GroundAtom>,
}

impl<D: Database> PersistedAtomManager<D> {
    pub fn new(db: Arc<D>) -> Self {
        Self {
            db,
            cache: HashMap::new(),
        }
    }

    pub fn database(&self) -> &Arc<D> {
        &self.db
    }

    /// Whether `key` has been resolved and cached.
    pub fn contains(&self, key: &AtomKey) -> bool {
        self.cache.contains_key(key)
    }

    pub fn cached(&self, key: &AtomKey) -> Option<&GroundAtom> {
        self.cache.get(key)
    }

    /// Every atom resolved so far.
    pub fn persisted_atoms(&self) -> impl Iterator<Item = &GroundAtom> {
        self.cache.values()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Treat `atoms` as known from now on. Existing entries are kept, so an
    /// already-cached instance is never replaced.
    pub(crate) fn add_to_persisted_cache(&mut self, atoms: &[GroundAtom]) {
        for atom in atoms {
            self.cache
                .entry(atom.key().clone())
                .or_insert_with(|| atom.clone());
        }
    }

    /// Re-tag cached atoms of `predicate` that live in `from` as living in
    /// `to`, after the store has moved them.
    pub(crate) fn promote(&mut self, predicate: &Predicate, from: PartitionId, to: PartitionId) -> usize {
        let mut promoted = 0;
        for atom in self.cache.values() {
            if atom.predicate() == predicate && atom.state() == AtomState::Unobserved(from) {
                atom.set_state(AtomState::Unobserved(to));
                promoted += 1;
            }
        }
        promoted
    }

    fn resolve(&self, key: AtomKey) -> AtomResult<GroundAtom> {
        if let PredicateKind::Functional(special) = key.predicate().kind() {
            let value = special.value(key.args());
            return Ok(GroundAtom::new(key, value, AtomState::Computed));
        }
        match self.db.get_atom(&key) {
            Some(stored) => {
                let state = if self.db.layout().is_read(stored.partition) {
                    AtomState::Observed(stored.partition)
                } else {
                    AtomState::Unobserved(stored.partition)
                };
                Ok(GroundAtom::new(key, stored.value, state))
            }
            None => Err(AtomError::UnknownGroundAtom {
                atom: Box::new(GroundAtom::new(key, self.db.default_value(), AtomState::Lazy)),
            }),
        }
    }
}

impl<D: Database> AtomManager for PersistedAtomManager<D> {
    fn get_atom(&mut self, predicate: &Predicate, args: &[Constant]) -> AtomResult<GroundAtom> {
        let key = AtomKey::new(predicate.clone(), args.to_vec())?;
        if let Some(atom) = self.cache.get(&key) {
            return Ok(atom.clone());
        }
        let atom = self.resolve(key)?;
        self.cache.insert(atom.key().clone(), atom.clone());
        Ok(atom)
    }

    fn execute_query(&self, query: &DatabaseQuery) -> QueryResult<ResultList> {
        self.db.execute(query)
    }

    fn execute_union(&self, queries: &[DatabaseQuery]) -> QueryResult<ResultList> {
        self.db.execute_union(queries)
    }
}
