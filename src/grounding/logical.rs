//! Grounding of logical rules.

use crate::atom::AtomManager;
use crate::database::{DatabaseQuery, ResultList, VariableAssignment};
use crate::error::{GroundingError, GroundingResult};
use crate::ground::{GroundLogicalRule, GroundRule, GroundRuleStore};
use crate::model::LogicalRule;

/// Query the rule body and ground every substitution.
pub fn ground_all(
    rule: &LogicalRule,
    manager: &mut dyn AtomManager,
    store: &mut dyn GroundRuleStore,
) -> GroundingResult<usize> {
    let query = DatabaseQuery::new(rule.query()).project(rule.variables());
    let results = manager.execute_query(&query)?;
    ground_results(rule, &results, manager, store)
}

/// Ground `rule` once per row of `results`, which must bind every variable
/// of the rule.
pub fn ground_results(
    rule: &LogicalRule,
    results: &ResultList,
    manager: &mut dyn AtomManager,
    store: &mut dyn GroundRuleStore,
) -> GroundingResult<usize> {
    let mut emitted = 0;
    for assignment in results.assignments() {
        if let Some(ground) = ground_row(rule, &assignment, manager)? {
            store.add_ground_rule(GroundRule::Logical(ground));
            emitted += 1;
        }
    }
    tracing::debug!(rule = rule.name(), rows = results.len(), emitted, "grounded logical rule");
    Ok(emitted)
}

/// `None` when a functional literal already satisfies the clause.
fn ground_row(
    rule: &LogicalRule,
    assignment: &VariableAssignment,
    manager: &mut dyn AtomManager,
) -> GroundingResult<Option<GroundLogicalRule>> {
    let mut positive = Vec::new();
    let mut negative = Vec::new();
    for literal in rule.clause() {
        let args = literal
            .atom
            .ground_args(assignment)
            .map_err(|v| GroundingError::MissingBinding {
                variable: v.to_string(),
            })?;
        let atom = manager.get_atom(literal.atom.predicate(), &args)?;

        if atom.predicate().is_standard() {
            // Positive literals of the negated clause are the body.
            if literal.negated {
                positive.push(atom);
            } else {
                negative.push(atom);
            }
            continue;
        }

        let holds = atom.value() > 0.0;
        if holds == literal.negated {
            // False body literal or true head literal.
            return Ok(None);
        }
    }

    if positive.is_empty() && negative.is_empty() {
        return Ok(None);
    }
    Ok(Some(GroundLogicalRule {
        rule: rule.name().to_string(),
        weight: rule.weight(),
        positive,
        negative,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::atom::{LazyAtomManager, PersistedAtomManager};
    use crate::database::Database;
    use crate::ground::MemGroundRuleStore;
    use crate::model::{ArgumentType, Atom, AtomKey, Formula, Predicate, SpecialPredicate, Term};
    use crate::partition::{PartitionLayout, PartitionRegistry};
    use crate::store::MemDatabase;

    fn pred(name: &str) -> Predicate {
        Predicate::standard(name, vec![ArgumentType::String, ArgumentType::String])
    }

    fn f(p: &Predicate, a: &str, b: &str) -> Formula {
        Formula::atom(Atom::new(p.clone(), vec![Term::var(a), Term::var(b)]).unwrap())
    }

    fn db() -> Arc<MemDatabase> {
        let layout =
            PartitionLayout::named(&mut PartitionRegistry::new(), &["observations"], "targets", "lazy")
                .unwrap();
        let db = MemDatabase::new(layout);
        let obs = db.layout().read()[0];
        let write = db.layout().write();
        for (a, b) in [("alice", "bob"), ("bob", "carol")] {
            db.insert(&AtomKey::new(pred("Knows"), vec![a.into(), b.into()]).unwrap(), 1.0, obs)
                .unwrap();
        }
        db.insert(
            &AtomKey::new(pred("Friend"), vec!["alice".into(), "bob".into()]).unwrap(),
            0.0,
            write,
        )
        .unwrap();
        Arc::new(db)
    }

    #[test]
    fn implication_grounds_body_negated_and_head_asserted() {
        // Knows(A, B) -> Friend(A, B)
        let rule = LogicalRule::new("r", Formula::implies(f(&pred("Knows"), "A", "B"), f(&pred("Friend"), "A", "B")), Some(1.5)).unwrap();
        let mut manager = LazyAtomManager::new(db(), 0.5).unwrap();
        let mut store = MemGroundRuleStore::new();

        assert_eq!(ground_all(&rule, &mut manager, &mut store).unwrap(), 2);
        let first = store.iter().next().and_then(GroundRule::as_logical).unwrap();
        assert_eq!(first.weight, Some(1.5));
        assert_eq!(first.negative.len(), 1);
        assert_eq!(first.positive.len(), 1);
        // Friend(bob, carol) is not stored, so it was deferred.
        assert_eq!(manager.lazy_len(), 1);
    }

    #[test]
    fn persisted_manager_fails_on_unknown_head() {
        let rule = LogicalRule::new("r", Formula::implies(f(&pred("Knows"), "A", "B"), f(&pred("Friend"), "A", "B")), None).unwrap();
        let mut manager = PersistedAtomManager::new(db());
        let mut store = MemGroundRuleStore::new();
        assert!(matches!(
            ground_all(&rule, &mut manager, &mut store),
            Err(GroundingError::Atom(_))
        ));
    }

    #[test]
    fn functional_head_literal_satisfies_clause() {
        // Knows(A, B) -> Friend(A, B) | #Equal(A, B)
        let eq = Predicate::special(SpecialPredicate::Equal, ArgumentType::String);
        let head = Formula::or(vec![f(&pred("Friend"), "A", "B"), f(&eq, "A", "B")]).unwrap();
        let rule = LogicalRule::new("r", Formula::implies(f(&pred("Knows"), "A", "B"), head), None).unwrap();

        let mut manager = LazyAtomManager::new(db(), 0.5).unwrap();
        let mut store = MemGroundRuleStore::new();
        // #Equal is false for every row, so it is dropped and both rows ground.
        assert_eq!(ground_all(&rule, &mut manager, &mut store).unwrap(), 2);
        let first = store.iter().next().and_then(GroundRule::as_logical).unwrap();
        assert_eq!(first.positive.len(), 1);

        let mut results = ResultList::new(vec![crate::model::Variable::new("A"), crate::model::Variable::new("B")]);
        results.push(vec!["alice".into(), "alice".into()]);
        let mut store = MemGroundRuleStore::new();
        // #Equal(alice, alice) holds: the clause is satisfied and nothing is emitted.
        assert_eq!(ground_results(&rule, &results, &mut manager, &mut store).unwrap(), 0);
    }

    #[test]
    fn missing_binding_is_reported() {
        let rule = LogicalRule::new("r", Formula::implies(f(&pred("Knows"), "A", "B"), f(&pred("Friend"), "A", "B")), None).unwrap();
        let mut results = ResultList::new(vec![crate::model::Variable::new("A")]);
        results.push(vec!["alice".into()]);
        let mut manager = PersistedAtomManager::new(db());
        let mut store = MemGroundRuleStore::new();
        assert!(matches!(
            ground_results(&rule, &results, &mut manager, &mut store),
            Err(GroundingError::MissingBinding { .. })
        ));
    }
}
