//! Lazy atom manager: defers unknown atoms and activates them on demand.
//!
//! Grounding against a [`LazyAtomManager`] never fails on an atom the store
//! does not have. The atom is parked in the lazy set with the store's default
//! value instead. Once an inference pass has raised some lazy atoms to the
//! activation threshold, [`LazyAtomManager::activate_atoms`] makes them real:
//!
//! 1. commit them into the lazy-staging partition,
//! 2. add them to the persisted cache,
//! 3. find the logical rules whose query mentions their predicates,
//! 4. reground those rules restricted to groundings that bind at least one
//!    query atom to a staged atom,
//! 5. move the staged atoms into the write partition.
//!
//! The order is fixed: regrounding queries need the staged atoms, and
//! promotion must not happen before the implied ground rules exist.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::config::GroundingConfig;
use crate::database::{Database, DatabaseQuery, ResultList};
use crate::error::{ActivationError, ActivationResult, AtomError, AtomResult, QueryResult};
use crate::events::AtomEventRegistry;
use crate::ground::{AtomState, GroundAtom, GroundRuleStore};
use crate::model::{AtomKey, Constant, LogicalRule, Model, Predicate, Rule};

use super::{AtomManager, PersistedAtomManager};

pub struct LazyAtomManager<D> {
    persisted: PersistedAtomManager<D>,
    lazy_atoms: HashMap<AtomKey, GroundAtom>,
    activation_threshold: f64,
}

impl<D: Database> LazyAtomManager<D> {
    /// Create a manager activating lazy atoms whose value reaches
    /// `activation_threshold`, which must lie in (0, 1].
    pub fn new(db: Arc<D>, activation_threshold: f64) -> ActivationResult<Self> {
        if !(activation_threshold > 0.0 && activation_threshold <= 1.0) {
            return Err(ActivationError::InvalidThreshold {
                value: activation_threshold,
            });
        }
        Ok(Self {
            persisted: PersistedAtomManager::new(db),
            lazy_atoms: HashMap::new(),
            activation_threshold,
        })
    }

    pub fn from_config(db: Arc<D>, config: &GroundingConfig) -> ActivationResult<Self> {
        Self::new(db, config.activation_threshold)
    }

    pub fn activation_threshold(&self) -> f64 {
        self.activation_threshold
    }

    pub fn persisted(&self) -> &PersistedAtomManager<D> {
        &self.persisted
    }

    pub fn database(&self) -> &Arc<D> {
        self.persisted.database()
    }

    /// Atoms seen during grounding but not stored yet.
    pub fn lazy_atoms(&self) -> impl Iterator<Item = &GroundAtom> {
        self.lazy_atoms.values()
    }

    pub fn lazy_len(&self) -> usize {
        self.lazy_atoms.len()
    }

    pub fn is_lazy(&self, key: &AtomKey) -> bool {
        self.lazy_atoms.contains_key(key)
    }

    /// Activate every lazy atom whose value is at least the threshold and
    /// reground the logical rules of `model` they affect. Returns the number
    /// of atoms activated.
    pub fn activate_atoms(
        &mut self,
        model: &Model,
        store: &mut dyn GroundRuleStore,
    ) -> ActivationResult<usize> {
        let threshold = self.activation_threshold;
        let mut to_activate: Vec<GroundAtom> = self
            .lazy_atoms
            .values()
            .filter(|atom| atom.value() >= threshold)
            .cloned()
            .collect();
        if to_activate.is_empty() {
            return Ok(0);
        }
        to_activate.sort_by_cached_key(|atom| atom.to_string());

        tracing::info!(
            activating = to_activate.len(),
            remaining_lazy = self.lazy_atoms.len() - to_activate.len(),
            threshold,
            "activating lazy atoms"
        );
        self.activate(&to_activate, model, store)?;
        Ok(to_activate.len())
    }

    fn activate(
        &mut self,
        atoms: &[GroundAtom],
        model: &Model,
        store: &mut dyn GroundRuleStore,
    ) -> ActivationResult<()> {
        let db = Arc::clone(self.persisted.database());
        let lazy = db.layout().lazy();
        let write = db.layout().write();

        // The atoms stay lazy until the commit succeeds, then move to the
        // persisted cache in one step.
        db.commit(atoms, lazy)?;
        for atom in atoms {
            self.lazy_atoms.remove(atom.key());
            atom.set_state(AtomState::Unobserved(lazy));
        }
        self.persisted.add_to_persisted_cache(atoms);

        let mut lazy_predicates: Vec<Predicate> = Vec::new();
        for atom in atoms {
            let p = atom.predicate();
            if p.is_standard() && !lazy_predicates.contains(p) {
                lazy_predicates.push(p.clone());
            }
        }

        for rule in model.rules() {
            if let Rule::Arithmetic(r) = rule {
                if lazy_predicates.iter().any(|p| r.mentions(p)) {
                    tracing::warn!(
                        rule = r.name(),
                        "arithmetic rules are not reground on activation, skipping"
                    );
                }
            }
        }

        let registry = AtomEventRegistry::from_model(model);
        let affected: BTreeSet<usize> = registry.rules_for(&lazy_predicates);
        let mut emitted = 0;
        for index in affected {
            if let Some(Rule::Logical(rule)) = model.rule(index) {
                emitted += self.lazy_ground(rule, &lazy_predicates, store)?;
            }
        }

        let mut moved = 0;
        for predicate in &lazy_predicates {
            moved += db.move_to_write_partition(predicate, lazy)?;
            self.persisted.promote(predicate, lazy, write);
        }

        tracing::info!(
            atoms = atoms.len(),
            predicates = lazy_predicates.len(),
            ground_rules = emitted,
            moved,
            "activation complete"
        );
        Ok(())
    }

    /// Reground `rule` over groundings in which at least one query atom of a
    /// lazy predicate binds to a staged atom.
    fn lazy_ground(
        &mut self,
        rule: &LogicalRule,
        lazy_predicates: &[Predicate],
        store: &mut dyn GroundRuleStore,
    ) -> ActivationResult<usize> {
        let query = rule.query();
        let targets: Vec<usize> = query
            .iter()
            .enumerate()
            .filter(|(_, l)| lazy_predicates.contains(l.atom.predicate()))
            .map(|(i, _)| i)
            .collect();
        if targets.is_empty() {
            return Err(ActivationError::NoLazyTargets {
                rule: rule.name().to_string(),
            });
        }

        let variables = rule.variables();
        let queries: Vec<DatabaseQuery> = targets
            .into_iter()
            .map(|i| {
                DatabaseQuery::new(query.clone())
                    .project(variables.clone())
                    .with_lazy_target(i)
            })
            .collect();
        let results = self.execute_union(&queries)?;
        tracing::debug!(rule = rule.name(), rows = results.len(), "lazy regrounding");
        Ok(rule.ground_results(&results, self, store)?)
    }
}

impl<D: Database> AtomManager for LazyAtomManager<D> {
    fn get_atom(&mut self, predicate: &Predicate, args: &[Constant]) -> AtomResult<GroundAtom> {
        let key = AtomKey::new(predicate.clone(), args.to_vec())?;
        if let Some(atom) = self.lazy_atoms.get(&key) {
            return Ok(atom.clone());
        }
        match self.persisted.get_atom(predicate, args) {
            Err(AtomError::UnknownGroundAtom { atom }) => {
                let atom = *atom;
                tracing::debug!(atom = %atom, "deferring unknown atom");
                self.lazy_atoms.insert(key, atom.clone());
                Ok(atom)
            }
            other => other,
        }
    }

    fn execute_query(&self, query: &DatabaseQuery) -> QueryResult<ResultList> {
        self.persisted.execute_query(query)
    }

    fn execute_union(&self, queries: &[DatabaseQuery]) -> QueryResult<ResultList> {
        self.persisted.execute_union(queries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{QueryExecutor, StoredAtom};
    use crate::error::{StoreError, StoreResult};
    use crate::ground::MemGroundRuleStore;
    use crate::model::{ArgumentType, Atom, Formula, Term};
    use crate::partition::{PartitionId, PartitionLayout, PartitionRegistry};
    use crate::store::MemDatabase;

    fn friend() -> Predicate {
        Predicate::standard("Friend", vec![ArgumentType::String, ArgumentType::String])
    }

    fn layout() -> PartitionLayout {
        PartitionLayout::named(&mut PartitionRegistry::new(), &["observations"], "targets", "lazy")
            .unwrap()
    }

    fn db() -> Arc<MemDatabase> {
        Arc::new(MemDatabase::new(layout()))
    }

    /// Store that answers reads but refuses every commit.
    struct ReadOnly(MemDatabase);

    impl QueryExecutor for ReadOnly {
        fn execute(&self, query: &DatabaseQuery) -> QueryResult<ResultList> {
            self.0.execute(query)
        }
    }

    impl Database for ReadOnly {
        fn layout(&self) -> &PartitionLayout {
            self.0.layout()
        }

        fn default_value(&self) -> f64 {
            self.0.default_value()
        }

        fn get_atom(&self, key: &AtomKey) -> Option<StoredAtom> {
            self.0.get_atom(key)
        }

        fn commit(&self, _atoms: &[GroundAtom], partition: PartitionId) -> StoreResult<()> {
            Err(StoreError::UnknownPartition {
                partition: partition.get(),
            })
        }

        fn move_to_write_partition(&self, predicate: &Predicate, from: PartitionId) -> StoreResult<usize> {
            self.0.move_to_write_partition(predicate, from)
        }
    }

    fn args(a: &str, b: &str) -> Vec<Constant> {
        vec![a.into(), b.into()]
    }

    #[test]
    fn threshold_must_be_in_unit_interval() {
        for bad in [0.0, -0.1, 1.5, f64::NAN] {
            assert!(matches!(
                LazyAtomManager::new(db(), bad),
                Err(ActivationError::InvalidThreshold { .. })
            ));
        }
        assert!(LazyAtomManager::new(db(), 1.0).is_ok());
    }

    #[test]
    fn unknown_atoms_become_lazy_once() {
        let mut manager = LazyAtomManager::new(db(), 0.5).unwrap();
        let a = manager.get_atom(&friend(), &args("alice", "dave")).unwrap();
        let b = manager.get_atom(&friend(), &args("alice", "dave")).unwrap();
        assert!(a.same_instance(&b));
        assert!(a.is_lazy());
        assert_eq!(manager.lazy_len(), 1);
        assert!(manager.persisted().is_empty());
    }

    #[test]
    fn activation_splits_on_threshold() {
        let mut manager = LazyAtomManager::new(db(), 0.5).unwrap();
        let high = manager.get_atom(&friend(), &args("alice", "dave")).unwrap();
        let low = manager.get_atom(&friend(), &args("alice", "erin")).unwrap();
        high.set_value(0.5);
        low.set_value(0.49);

        let mut store = MemGroundRuleStore::new();
        let activated = manager.activate_atoms(&Model::new(), &mut store).unwrap();
        assert_eq!(activated, 1);
        assert!(!manager.is_lazy(high.key()));
        assert!(manager.is_lazy(low.key()));
        assert!(manager.lazy_atoms().all(|a| a.value() < 0.5));

        let write = manager.database().layout().write();
        assert_eq!(high.state(), AtomState::Unobserved(write));
        assert_eq!(manager.database().partition_of(high.key()), Some(write));

        // Known now: resolves through the persisted cache to the same instance.
        let again = manager.get_atom(&friend(), &args("alice", "dave")).unwrap();
        assert!(again.same_instance(&high));
    }

    #[test]
    fn failed_commit_keeps_atoms_lazy() {
        let mut manager = LazyAtomManager::new(Arc::new(ReadOnly(MemDatabase::new(layout()))), 0.5).unwrap();
        let dave = manager.get_atom(&friend(), &args("alice", "dave")).unwrap();
        dave.set_value(0.9);

        let mut store = MemGroundRuleStore::new();
        assert!(matches!(
            manager.activate_atoms(&Model::new(), &mut store),
            Err(ActivationError::Store(StoreError::UnknownPartition { .. }))
        ));
        assert!(manager.is_lazy(dave.key()));
        assert!(!manager.persisted().contains(dave.key()));
        assert!(dave.is_lazy());

        // Still eligible on the next pass.
        let again = manager.get_atom(&friend(), &args("alice", "dave")).unwrap();
        assert!(again.same_instance(&dave));
        assert_eq!(manager.lazy_len(), 1);
    }

    #[test]
    fn nothing_to_activate() {
        let mut manager = LazyAtomManager::new(db(), 0.5).unwrap();
        manager.get_atom(&friend(), &args("alice", "dave")).unwrap();
        let mut store = MemGroundRuleStore::new();
        assert_eq!(manager.activate_atoms(&Model::new(), &mut store).unwrap(), 0);
        assert_eq!(manager.lazy_len(), 1);
    }

    #[test]
    fn lazy_ground_requires_a_target() {
        let mut manager = LazyAtomManager::new(db(), 0.5).unwrap();
        let likes = Predicate::standard("Likes", vec![ArgumentType::String, ArgumentType::String]);
        let body = Formula::atom(Atom::new(likes.clone(), vec![Term::var("A"), Term::var("B")]).unwrap());
        let head = Formula::atom(Atom::new(friend(), vec![Term::var("A"), Term::var("B")]).unwrap());
        let rule = LogicalRule::new("r", Formula::implies(body, head), None).unwrap();
        let mut store = MemGroundRuleStore::new();
        assert!(matches!(
            manager.lazy_ground(&rule, &[friend()], &mut store),
            Err(ActivationError::NoLazyTargets { .. })
        ));
    }
}
