//! Grounding of arithmetic rules with summation atoms.
//!
//! One outer query enumerates substitutions of the ordinary variables. For
//! each row the selection set of every summation variable is recomputed from
//! its select formula, coefficients are evaluated against those sets, and
//! summation atoms are expanded over the cross product of their sets.

use crate::atom::AtomManager;
use crate::database::{DatabaseQuery, VariableAssignment};
use crate::error::{GroundingError, GroundingResult};
use crate::ground::{GroundArithmeticRule, GroundAtom, GroundRule, GroundRuleStore, Inequality};
use crate::model::{
    ArithmeticRule, Comparator, Constant, ExpressionAtom, Literal, Predicate, SummationSets,
    SummationTerm, Term,
};

use super::cross_product::CrossProduct;

/// Ground `rule` for every substitution of its outer variables. Returns the
/// number of ground rules emitted; an equality emits two per row.
pub fn ground_all(
    rule: &ArithmeticRule,
    manager: &mut dyn AtomManager,
    store: &mut dyn GroundRuleStore,
) -> GroundingResult<usize> {
    let expression = rule.expression();

    let mut literals: Vec<Literal> = Vec::new();
    for (_, atom) in expression.terms() {
        let literal = Literal::positive(atom.query_atom().clone());
        if !literals.contains(&literal) {
            literals.push(literal);
        }
    }
    let query = DatabaseQuery::new(literals).project(expression.variables().to_vec());
    let results = manager.execute_query(&query)?;

    let mut emitted = 0;
    let mut sets = SummationSets::new();
    for assignment in results.assignments() {
        compute_selection_sets(rule, &assignment, manager, &mut sets)?;
        emitted += ground_row(rule, &assignment, &sets, manager, store)?;
    }
    tracing::debug!(rule = rule.name(), rows = results.len(), emitted, "grounded arithmetic rule");
    Ok(emitted)
}

/// Replace `sets` with the selection sets for one outer substitution.
///
/// Each conjunction of a select formula is queried on its own with the row
/// pinned, and the results are unioned.
fn compute_selection_sets(
    rule: &ArithmeticRule,
    assignment: &VariableAssignment,
    manager: &mut dyn AtomManager,
    sets: &mut SummationSets,
) -> GroundingResult<()> {
    sets.clear();
    for sv in rule.expression().summation_variables() {
        let set = sets.entry(sv.clone()).or_default();
        let Some(select) = rule.select(sv) else {
            continue;
        };
        for conjunction in select.conjunctions() {
            let query = DatabaseQuery::new(conjunction.clone())
                .with_partial_grounding(assignment.clone())
                .project(vec![sv.variable().clone()]);
            let results = manager.execute_query(&query)?;
            set.extend(results.rows().iter().map(|row| row[0].clone()));
        }
    }
    Ok(())
}

/// Emit the ground rule(s) of one outer row. A row whose coefficients or
/// constant are not finite, as with `1/|S|` over an empty set, is skipped.
fn ground_row(
    rule: &ArithmeticRule,
    assignment: &VariableAssignment,
    sets: &SummationSets,
    manager: &mut dyn AtomManager,
    store: &mut dyn GroundRuleStore,
) -> GroundingResult<usize> {
    let expression = rule.expression();

    // Coefficients are settled before any atom is resolved, so a skipped row
    // leaves the manager untouched.
    let mut expansions: Vec<(&Predicate, f64, CrossProduct)> = Vec::new();
    for (coefficient, term) in expression.terms() {
        let product = CrossProduct::new(domains(term, assignment, sets)?);
        // An empty expansion never evaluates its coefficient.
        if product.size() == 0 {
            continue;
        }
        let value = coefficient.value(sets);
        if !value.is_finite() {
            tracing::debug!(rule = rule.name(), term = %term, value, "skipping row with non-finite coefficient");
            return Ok(0);
        }
        expansions.push((term.predicate(), value, product));
    }
    let constant = expression.final_coefficient().value(sets);
    if !constant.is_finite() {
        tracing::debug!(rule = rule.name(), value = constant, "skipping row with non-finite constant");
        return Ok(0);
    }

    let mut coefficients = Vec::new();
    let mut atoms: Vec<GroundAtom> = Vec::new();
    for (predicate, value, product) in expansions {
        for args in product {
            atoms.push(manager.get_atom(predicate, &args)?);
            coefficients.push(value);
        }
    }

    let comparators: &[Inequality] = match expression.comparator() {
        Comparator::Equal => &[Inequality::GreaterOrEqual, Inequality::LessOrEqual],
        Comparator::GreaterOrEqual => &[Inequality::GreaterOrEqual],
        Comparator::LessOrEqual => &[Inequality::LessOrEqual],
    };
    for &comparator in comparators {
        store.add_ground_rule(GroundRule::Arithmetic(GroundArithmeticRule {
            rule: rule.name().to_string(),
            weight: rule.weight(),
            coefficients: coefficients.clone(),
            atoms: atoms.clone(),
            comparator,
            constant,
        }));
    }
    Ok(comparators.len())
}

/// Per-position candidate constants of a term for one row. Plain atoms and
/// fixed positions are singletons; summation positions draw from their set.
fn domains(
    term: &ExpressionAtom,
    assignment: &VariableAssignment,
    sets: &SummationSets,
) -> GroundingResult<Vec<Vec<Constant>>> {
    let bound = |t: &Term| match t {
        Term::Constant(c) => Ok(vec![c.clone()]),
        Term::Variable(v) => assignment
            .get(v)
            .map(|c| vec![c.clone()])
            .ok_or_else(|| GroundingError::MissingBinding {
                variable: v.to_string(),
            }),
    };
    match term {
        ExpressionAtom::Atom(atom) => atom.args().iter().map(bound).collect(),
        ExpressionAtom::Summation(atom) => atom
            .args()
            .iter()
            .map(|arg| match arg {
                SummationTerm::Term(t) => bound(t),
                SummationTerm::Summation(sv) => Ok(sets
                    .get(sv)
                    .map(|set| set.iter().cloned().collect())
                    .unwrap_or_default()),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;
    use crate::atom::{LazyAtomManager, PersistedAtomManager};
    use crate::database::Database;
    use crate::ground::MemGroundRuleStore;
    use crate::model::{
        ArgumentType, ArithmeticRuleExpression, Atom, AtomKey, Coefficient, Formula, SummationAtom,
        SummationVariable,
    };
    use crate::partition::{PartitionLayout, PartitionRegistry};
    use crate::store::MemDatabase;

    fn pred(name: &str) -> Predicate {
        Predicate::standard(name, vec![ArgumentType::String, ArgumentType::String])
    }

    fn insert(db: &MemDatabase, p: &str, a: &str, b: &str, observed: bool) {
        let partition = if observed { db.layout().read()[0] } else { db.layout().write() };
        db.insert(&AtomKey::new(pred(p), vec![a.into(), b.into()]).unwrap(), 1.0, partition)
            .unwrap();
    }

    fn db() -> Arc<MemDatabase> {
        let layout =
            PartitionLayout::named(&mut PartitionRegistry::new(), &["observations"], "targets", "lazy")
                .unwrap();
        let db = MemDatabase::new(layout);
        insert(&db, "Knows", "alice", "bob", true);
        insert(&db, "Knows", "alice", "carol", true);
        insert(&db, "Knows", "bob", "carol", true);
        insert(&db, "Friend", "alice", "bob", false);
        insert(&db, "Friend", "alice", "carol", false);
        insert(&db, "Friend", "bob", "alice", false);
        Arc::new(db)
    }

    /// `coefficient * Friend(A, +B) <comparator> rhs` with `+B` selected by
    /// `Knows(A, B)`.
    fn rule(coefficient: Coefficient, comparator: Comparator, rhs: Coefficient) -> ArithmeticRule {
        let b = SummationVariable::new("B");
        let summed = SummationAtom::new(pred("Friend"), vec![Term::var("A").into(), b.clone().into()]).unwrap();
        let expression = ArithmeticRuleExpression::new(
            vec![(coefficient, ExpressionAtom::Summation(summed))],
            comparator,
            rhs,
        )
        .unwrap();
        let mut selects = HashMap::new();
        selects.insert(
            b,
            Formula::atom(Atom::new(pred("Knows"), vec![Term::var("A"), Term::var("B")]).unwrap()),
        );
        ArithmeticRule::new("sum", expression, selects, Some(1.0)).unwrap()
    }

    fn inverse_cardinality() -> Coefficient {
        Coefficient::divide(
            Coefficient::constant(1.0),
            Coefficient::cardinality(&SummationVariable::new("B")),
        )
    }

    #[test]
    fn selection_sets_are_recomputed_per_row() {
        let r = rule(inverse_cardinality(), Comparator::GreaterOrEqual, Coefficient::constant(0.5));
        let mut manager = LazyAtomManager::new(db(), 0.5).unwrap();
        let mut store = MemGroundRuleStore::new();

        assert_eq!(ground_all(&r, &mut manager, &mut store).unwrap(), 2);
        let mut sizes: Vec<usize> = store
            .iter()
            .filter_map(GroundRule::as_arithmetic)
            .map(|g| g.atoms.len())
            .collect();
        sizes.sort();
        // bob knows only carol; alice knows bob and carol.
        assert_eq!(sizes, vec![1, 2]);
        for g in store.iter().filter_map(GroundRule::as_arithmetic) {
            let expected = 1.0 / g.atoms.len() as f64;
            assert!(g.coefficients.iter().all(|c| (c - expected).abs() < 1e-12));
        }
        // Friend(bob, carol) is not stored.
        assert_eq!(manager.lazy_len(), 1);
    }

    #[test]
    fn equality_emits_both_inequalities() {
        let r = rule(Coefficient::constant(1.0), Comparator::Equal, Coefficient::constant(1.0));
        let mut manager = LazyAtomManager::new(db(), 0.5).unwrap();
        let mut store = MemGroundRuleStore::new();

        assert_eq!(ground_all(&r, &mut manager, &mut store).unwrap(), 4);
        let rules: Vec<_> = store.iter().filter_map(GroundRule::as_arithmetic).collect();
        for pair in rules.chunks(2) {
            assert_eq!(pair[0].comparator, Inequality::GreaterOrEqual);
            assert_eq!(pair[1].comparator, Inequality::LessOrEqual);
            assert_eq!(pair[0].atoms, pair[1].atoms);
            assert_eq!(pair[0].coefficients, pair[1].coefficients);
            assert_eq!(pair[0].constant, pair[1].constant);
        }
    }

    #[test]
    fn empty_selection_set_contributes_no_terms() {
        let db = db();
        // carol is a Friend subject but knows nobody.
        insert(&db, "Friend", "carol", "alice", false);
        let r = rule(inverse_cardinality(), Comparator::LessOrEqual, Coefficient::constant(1.0));
        let mut manager = LazyAtomManager::new(db, 0.5).unwrap();
        let mut store = MemGroundRuleStore::new();

        assert_eq!(ground_all(&r, &mut manager, &mut store).unwrap(), 3);
        let empty = store
            .iter()
            .filter_map(GroundRule::as_arithmetic)
            .filter(|g| g.atoms.is_empty())
            .count();
        assert_eq!(empty, 1);
    }

    #[test]
    fn row_with_non_finite_constant_is_skipped() {
        let db = db();
        // carol is a Friend subject but knows nobody, so 1/|B| is infinite.
        insert(&db, "Friend", "carol", "alice", false);
        let r = rule(Coefficient::constant(1.0), Comparator::LessOrEqual, inverse_cardinality());
        let mut manager = LazyAtomManager::new(db, 0.5).unwrap();
        let mut store = MemGroundRuleStore::new();

        assert_eq!(ground_all(&r, &mut manager, &mut store).unwrap(), 2);
        assert_eq!(store.len(), 2);
        for g in store.iter().filter_map(GroundRule::as_arithmetic) {
            assert!(g.constant.is_finite());
            assert!(g.atoms.iter().all(|a| a.args()[0] != Constant::from("carol")));
        }
    }

    #[test]
    fn expansion_size_is_product_of_selection_sets() {
        let rated = Predicate::standard("Rated", vec![ArgumentType::String; 3]);
        let db = db();
        for y in ["x1", "x2", "x3"] {
            insert(&db, "Likes", "alice", y, true);
        }
        db.insert(
            &AtomKey::new(rated.clone(), vec!["alice".into(), "bob".into(), "x1".into()]).unwrap(),
            0.3,
            db.layout().write(),
        )
        .unwrap();

        // 1/(|X|*|Y|) * Rated(A, +X, +Y) >= 0.5
        let x = SummationVariable::new("X");
        let y = SummationVariable::new("Y");
        let summed = SummationAtom::new(
            rated,
            vec![Term::var("A").into(), x.clone().into(), y.clone().into()],
        )
        .unwrap();
        let coefficient = Coefficient::divide(
            Coefficient::constant(1.0),
            Coefficient::multiply(Coefficient::cardinality(&x), Coefficient::cardinality(&y)),
        );
        let expression = ArithmeticRuleExpression::new(
            vec![(coefficient, ExpressionAtom::Summation(summed))],
            Comparator::GreaterOrEqual,
            Coefficient::constant(0.5),
        )
        .unwrap();
        let mut selects = HashMap::new();
        selects.insert(
            x,
            Formula::atom(Atom::new(pred("Knows"), vec![Term::var("A"), Term::var("X")]).unwrap()),
        );
        selects.insert(
            y,
            Formula::atom(Atom::new(pred("Likes"), vec![Term::var("A"), Term::var("Y")]).unwrap()),
        );
        let r = ArithmeticRule::new("rated", expression, selects, None).unwrap();

        let mut manager = LazyAtomManager::new(db, 0.5).unwrap();
        let mut store = MemGroundRuleStore::new();
        assert_eq!(ground_all(&r, &mut manager, &mut store).unwrap(), 1);

        let g = store.iter().next().and_then(GroundRule::as_arithmetic).unwrap();
        // alice knows {bob, carol} and likes {x1, x2, x3}.
        assert_eq!(g.atoms.len(), 6);
        assert!(g.coefficients.iter().all(|c| (c - 1.0 / 6.0).abs() < 1e-12));
        let distinct: std::collections::HashSet<_> = g.atoms.iter().map(|a| a.key().clone()).collect();
        assert_eq!(distinct.len(), 6);
        // Only Rated(alice, bob, x1) is stored.
        assert_eq!(manager.lazy_len(), 5);
    }

    #[test]
    fn select_disjuncts_are_unioned_as_a_set() {
        let db = db();
        // bob satisfies both disjuncts for alice.
        insert(&db, "Likes", "alice", "bob", true);

        let b = SummationVariable::new("B");
        let summed = SummationAtom::new(pred("Friend"), vec![Term::var("A").into(), b.clone().into()]).unwrap();
        let expression = ArithmeticRuleExpression::new(
            vec![(inverse_cardinality(), ExpressionAtom::Summation(summed))],
            Comparator::GreaterOrEqual,
            Coefficient::constant(0.5),
        )
        .unwrap();
        let ab = |p: &str| {
            Formula::atom(Atom::new(pred(p), vec![Term::var("A"), Term::var("B")]).unwrap())
        };
        let mut selects = HashMap::new();
        selects.insert(b, Formula::or(vec![ab("Knows"), ab("Likes")]).unwrap());
        let r = ArithmeticRule::new("either", expression, selects, None).unwrap();

        let mut manager = LazyAtomManager::new(db, 0.5).unwrap();
        let mut store = MemGroundRuleStore::new();
        assert_eq!(ground_all(&r, &mut manager, &mut store).unwrap(), 2);

        let alice = store
            .iter()
            .filter_map(GroundRule::as_arithmetic)
            .find(|g| g.atoms.iter().any(|a| a.args()[0] == Constant::from("alice")))
            .unwrap();
        let mut atoms: Vec<String> = alice.atoms.iter().map(|a| a.to_string()).collect();
        atoms.sort();
        assert_eq!(atoms, vec!["Friend('alice', 'bob')", "Friend('alice', 'carol')"]);
        // |B| is 2, not 3.
        assert_eq!(alice.coefficients, vec![0.5, 0.5]);
    }

    #[test]
    fn plain_atoms_mix_with_summation_atoms() {
        let b = SummationVariable::new("B");
        let summed = SummationAtom::new(pred("Friend"), vec![Term::var("A").into(), b.clone().into()]).unwrap();
        let plain = Atom::new(pred("Friend"), vec![Term::var("A"), Term::constant("alice")]).unwrap();
        let expression = ArithmeticRuleExpression::new(
            vec![
                (Coefficient::constant(2.0), ExpressionAtom::Atom(plain)),
                (Coefficient::constant(-1.0), ExpressionAtom::Summation(summed)),
            ],
            Comparator::LessOrEqual,
            Coefficient::constant(0.0),
        )
        .unwrap();
        let mut selects = HashMap::new();
        selects.insert(
            b,
            Formula::atom(Atom::new(pred("Knows"), vec![Term::var("A"), Term::var("B")]).unwrap()),
        );
        let r = ArithmeticRule::new("mixed", expression, selects, None).unwrap();

        // Only bob has Friend(bob, 'alice') stored.
        let mut manager = PersistedAtomManager::new(db());
        let mut store = MemGroundRuleStore::new();
        let err = ground_all(&r, &mut manager, &mut store);
        // Friend(bob, carol) is unknown to a persisted manager.
        assert!(matches!(err, Err(GroundingError::Atom(_))));

        let mut manager = LazyAtomManager::new(db(), 0.5).unwrap();
        let mut store = MemGroundRuleStore::new();
        assert_eq!(ground_all(&r, &mut manager, &mut store).unwrap(), 1);
        let g = store.iter().next().and_then(GroundRule::as_arithmetic).unwrap();
        assert_eq!(g.coefficients, vec![2.0, -1.0]);
        assert_eq!(g.atoms[0].to_string(), "Friend('bob', 'alice')");
        assert_eq!(g.weight, None);
    }
}
