//! In-memory partitioned atom store backed by DashMap.
//!
//! One table per predicate, keyed by argument list. Every stored atom
//! carries its value and the single partition it belongs to. All data is
//! lost on process exit.

use std::collections::HashMap;

use dashmap::DashMap;

use crate::database::{Database, DatabaseQuery, QueryExecutor, ResultList, StoredAtom, VariableAssignment};
use crate::error::{QueryError, QueryResult, StoreError, StoreResult};
use crate::ground::GroundAtom;
use crate::model::{Atom, AtomKey, Constant, Literal, Predicate, PredicateKind, Term, Variable};
use crate::partition::{PartitionId, PartitionLayout};

use super::stats::TableStats;

#[derive(Debug, Default)]
struct Table {
    rows: HashMap<Vec<Constant>, StoredAtom>,
}

/// Concurrent in-memory backing store.
#[derive(Debug)]
pub struct MemDatabase {
    tables: DashMap<Predicate, Table>,
    layout: PartitionLayout,
    default_value: f64,
}

impl MemDatabase {
    /// Create an empty store over `layout`. Unstored atoms default to 0.
    pub fn new(layout: PartitionLayout) -> Self {
        Self {
            tables: DashMap::new(),
            layout,
            default_value: 0.0,
        }
    }

    /// Set the value given to atoms that are not stored.
    pub fn with_default_value(mut self, value: f64) -> Self {
        self.default_value = value.clamp(0.0, 1.0);
        self
    }

    /// Store an atom in `partition`.
    ///
    /// Re-inserting into the same partition replaces the value; inserting an
    /// atom that lives in another partition is an error.
    pub fn insert(&self, key: &AtomKey, value: f64, partition: PartitionId) -> StoreResult<()> {
        self.check_writable(key, value, partition)?;
        self.check_unique(key, partition)?;
        let mut table = self.tables.entry(key.predicate().clone()).or_default();
        table
            .rows
            .insert(key.args().to_vec(), StoredAtom { value, partition });
        Ok(())
    }

    /// Every atom stored in `partition`, with its value.
    pub fn atoms_in(&self, partition: PartitionId) -> Vec<(AtomKey, f64)> {
        let mut out = Vec::new();
        for entry in self.tables.iter() {
            for (args, stored) in &entry.value().rows {
                if stored.partition == partition {
                    if let Ok(key) = AtomKey::new(entry.key().clone(), args.clone()) {
                        out.push((key, stored.value));
                    }
                }
            }
        }
        out
    }

    pub fn partition_of(&self, key: &AtomKey) -> Option<PartitionId> {
        self.get_atom(key).map(|s| s.partition)
    }

    /// Number of stored atoms across all tables.
    pub fn len(&self) -> usize {
        self.tables.iter().map(|t| t.rows.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Statistics over every stored row of `predicate`.
    pub fn table_stats(&self, predicate: &Predicate) -> TableStats {
        match self.tables.get(predicate) {
            Some(table) => {
                TableStats::from_rows(predicate.arity(), table.rows.keys().map(Vec::as_slice))
            }
            None => TableStats::from_rows(predicate.arity(), std::iter::empty()),
        }
    }

    fn check_writable(&self, key: &AtomKey, value: f64, partition: PartitionId) -> StoreResult<()> {
        if !self.layout.contains(partition) {
            return Err(StoreError::UnknownPartition {
                partition: partition.get(),
            });
        }
        if !key.predicate().is_standard() {
            return Err(StoreError::FunctionalAtom {
                atom: key.to_string(),
            });
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(StoreError::ValueOutOfRange {
                atom: key.to_string(),
                value,
            });
        }
        Ok(())
    }

    /// An atom lives in one partition only; writing it elsewhere is an error.
    fn check_unique(&self, key: &AtomKey, partition: PartitionId) -> StoreResult<()> {
        let existing = self
            .tables
            .get(key.predicate())
            .and_then(|table| table.rows.get(key.args()).map(|s| s.partition));
        match existing {
            Some(existing) if existing != partition => Err(StoreError::DuplicateAtom {
                atom: key.to_string(),
                existing: existing.get(),
            }),
            _ => Ok(()),
        }
    }

    /// Rows of `atom`'s table in an admitted partition whose arguments agree
    /// with the atom's constants and with `pinned`.
    fn candidates(
        &self,
        atom: &Atom,
        pinned: &VariableAssignment,
        admit: impl Fn(PartitionId) -> bool,
    ) -> Vec<Vec<Constant>> {
        let Some(table) = self.tables.get(atom.predicate()) else {
            return Vec::new();
        };
        let pattern: Vec<Option<&Constant>> = atom
            .args()
            .iter()
            .map(|arg| match arg {
                Term::Constant(c) => Some(c),
                Term::Variable(v) => pinned.get(v),
            })
            .collect();
        let mut rows: Vec<Vec<Constant>> = table
            .rows
            .iter()
            .filter(|(_, stored)| admit(stored.partition))
            .filter(|(args, _)| {
                pattern
                    .iter()
                    .zip(args.iter())
                    .all(|(want, have)| want.is_none_or(|w| w == have))
            })
            .map(|(args, _)| args.clone())
            .collect();
        // HashMap order is arbitrary; keep results reproducible.
        rows.sort();
        rows
    }

    /// Truth of a filter literal under a complete binding of its variables.
    fn filter_holds(&self, literal: &Literal, args: Vec<Constant>) -> bool {
        let value = match literal.atom.predicate().kind() {
            PredicateKind::Functional(special) => special.value(&args),
            PredicateKind::Standard => AtomKey::new(literal.atom.predicate().clone(), args)
                .ok()
                .and_then(|key| self.get_atom(&key))
                .map_or(0.0, |s| s.value),
        };
        if literal.negated {
            value == 0.0
        } else {
            value > 0.0
        }
    }
}

// ---------------------------------------------------------------------------
// Query evaluation
// ---------------------------------------------------------------------------

struct Generator<'q> {
    atom: &'q Atom,
    rows: Vec<Vec<Constant>>,
}

struct Filter<'q> {
    literal: &'q Literal,
    // Number of generators that must be joined before the filter can run.
    depth: usize,
}

struct Join<'a, 'q> {
    db: &'a MemDatabase,
    generators: Vec<Generator<'q>>,
    filters: Vec<Filter<'q>>,
    projection: Vec<Variable>,
    results: ResultList,
}

impl Join<'_, '_> {
    fn run(&mut self, depth: usize, bindings: &mut VariableAssignment) {
        if !self.filters_pass(depth, bindings) {
            return;
        }
        if depth == self.generators.len() {
            let row = self
                .projection
                .iter()
                .map(|v| bindings[v].clone())
                .collect();
            self.results.push(row);
            return;
        }
        let atom = self.generators[depth].atom;
        for i in 0..self.generators[depth].rows.len() {
            let mut bound: Vec<Variable> = Vec::new();
            if unify(atom, &self.generators[depth].rows[i], bindings, &mut bound) {
                self.run(depth + 1, bindings);
            }
            for v in bound {
                bindings.remove(&v);
            }
        }
    }

    fn filters_pass(&self, depth: usize, bindings: &VariableAssignment) -> bool {
        self.filters
            .iter()
            .filter(|f| f.depth == depth)
            .all(|f| match f.literal.atom.ground_args(bindings) {
                Ok(args) => self.db.filter_holds(f.literal, args),
                Err(_) => false,
            })
    }
}

/// Bind the atom's variables against `row`. Newly bound variables are pushed
/// onto `bound` so the caller can undo them, even on failure.
fn unify(
    atom: &Atom,
    row: &[Constant],
    bindings: &mut VariableAssignment,
    bound: &mut Vec<Variable>,
) -> bool {
    for (arg, value) in atom.args().iter().zip(row) {
        match arg {
            Term::Constant(c) => {
                if c != value {
                    return false;
                }
            }
            Term::Variable(v) => match bindings.get(v) {
                Some(existing) if existing != value => return false,
                Some(_) => {}
                None => {
                    bindings.insert(v.clone(), value.clone());
                    bound.push(v.clone());
                }
            },
        }
    }
    true
}

impl QueryExecutor for MemDatabase {
    fn execute(&self, query: &DatabaseQuery) -> QueryResult<ResultList> {
        let literals = query.literals();
        let pinned = query.partial_grounding();

        if let Some(index) = query.lazy_target() {
            let valid = literals
                .get(index)
                .is_some_and(|l| !l.negated && l.atom.predicate().is_standard());
            if !valid {
                return Err(QueryError::LazyTarget {
                    index,
                    len: literals.len(),
                });
            }
        }

        let projection = query.projection();
        let formula_variables = query.formula_variables();
        if let Some(unknown) = projection
            .iter()
            .find(|v| !formula_variables.contains(*v) && !pinned.contains_key(*v))
        {
            return Err(QueryError::UnknownProjection {
                variable: unknown.to_string(),
            });
        }

        let layout = &self.layout;
        let mut ordered: Vec<(bool, Generator<'_>)> = Vec::new();
        let mut filter_literals: Vec<&Literal> = Vec::new();
        for (i, literal) in literals.iter().enumerate() {
            if literal.negated || !literal.atom.predicate().is_standard() {
                filter_literals.push(literal);
                continue;
            }
            let is_target = query.lazy_target() == Some(i);
            let rows = if is_target {
                self.candidates(&literal.atom, pinned, |p| p == layout.lazy())
            } else {
                self.candidates(&literal.atom, pinned, |p| layout.contains(p))
            };
            ordered.push((
                is_target,
                Generator {
                    atom: &literal.atom,
                    rows,
                },
            ));
        }
        // Lazy target first, then smallest candidate set first.
        ordered.sort_by_key(|(is_target, g)| (!*is_target, g.rows.len()));
        let generators: Vec<Generator<'_>> = ordered.into_iter().map(|(_, g)| g).collect();

        // A filter runs as soon as every one of its variables is bound.
        let mut bound_after: Vec<Vec<&Variable>> = Vec::with_capacity(generators.len() + 1);
        let mut seen: Vec<&Variable> = pinned.keys().collect();
        bound_after.push(seen.clone());
        for g in &generators {
            seen.extend(g.atom.variables());
            bound_after.push(seen.clone());
        }
        let mut filters = Vec::with_capacity(filter_literals.len());
        for literal in filter_literals {
            let variables = literal.atom.variables();
            let depth = bound_after
                .iter()
                .position(|bound| variables.iter().all(|v| bound.contains(v)));
            let Some(depth) = depth else {
                let missing = variables
                    .iter()
                    .find(|v| !seen.contains(*v))
                    .map(|v| v.to_string())
                    .unwrap_or_default();
                return Err(QueryError::UnboundVariable {
                    variable: missing,
                    literal: literal.to_string(),
                });
            };
            filters.push(Filter { literal, depth });
        }

        tracing::debug!(
            literals = literals.len(),
            generators = generators.len(),
            filters = filters.len(),
            lazy_target = ?query.lazy_target(),
            "executing grounding query"
        );

        let mut join = Join {
            db: self,
            generators,
            filters,
            projection: projection.clone(),
            results: ResultList::new(projection),
        };
        let mut bindings = pinned.clone();
        join.run(0, &mut bindings);
        Ok(join.results)
    }
}

impl Database for MemDatabase {
    fn layout(&self) -> &PartitionLayout {
        &self.layout
    }

    fn default_value(&self) -> f64 {
        self.default_value
    }

    fn get_atom(&self, key: &AtomKey) -> Option<StoredAtom> {
        let table = self.tables.get(key.predicate())?;
        table
            .rows
            .get(key.args())
            .copied()
            .filter(|s| self.layout.contains(s.partition))
    }

    fn commit(&self, atoms: &[GroundAtom], partition: PartitionId) -> StoreResult<()> {
        for atom in atoms {
            self.check_writable(atom.key(), atom.value(), partition)?;
            self.check_unique(atom.key(), partition)?;
        }
        for atom in atoms {
            let mut table = self.tables.entry(atom.predicate().clone()).or_default();
            table.rows.insert(
                atom.args().to_vec(),
                StoredAtom {
                    value: atom.value(),
                    partition,
                },
            );
        }
        tracing::debug!(count = atoms.len(), partition = %partition, "committed atoms");
        Ok(())
    }

    fn move_to_write_partition(&self, predicate: &Predicate, from: PartitionId) -> StoreResult<usize> {
        if !self.layout.contains(from) {
            return Err(StoreError::UnknownPartition {
                partition: from.get(),
            });
        }
        let write = self.layout.write();
        let Some(mut table) = self.tables.get_mut(predicate) else {
            return Ok(0);
        };
        let mut moved = 0;
        for stored in table.rows.values_mut() {
            if stored.partition == from && from != write {
                stored.partition = write;
                moved += 1;
            }
        }
        Ok(moved)
    }
}
