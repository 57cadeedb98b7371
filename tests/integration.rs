//! End-to-end integration tests for the relground engine.
//!
//! These tests exercise the full pipeline from populating a partitioned
//! store through grounding, lazy atom activation with incremental
//! regrounding, and export.

use std::collections::HashMap;
use std::sync::Arc;

use relground::atom::{AtomManager, LazyAtomManager, PersistedAtomManager};
use relground::config::GroundingConfig;
use relground::database::Database;
use relground::error::RelgroundResult;
use relground::ground::{GroundRule, Inequality, MemGroundRuleStore};
use relground::model::{
    ArgumentType, ArithmeticRule, ArithmeticRuleExpression, Atom, AtomKey, Coefficient, Comparator,
    Constant, ExpressionAtom, Formula, LogicalRule, Model, Predicate, SummationAtom, SummationVariable,
    Term,
};
use relground::partition::PartitionRegistry;
use relground::store::MemDatabase;

fn friend() -> Predicate {
    Predicate::standard("Friend", vec![ArgumentType::String; 2])
}

fn knows() -> Predicate {
    Predicate::standard("Knows", vec![ArgumentType::String; 2])
}

fn key(p: &Predicate, a: &str, b: &str) -> AtomKey {
    AtomKey::new(p.clone(), vec![a.into(), b.into()]).unwrap()
}

fn formula(p: &Predicate, a: &str, b: &str) -> Formula {
    Formula::atom(Atom::new(p.clone(), vec![Term::var(a), Term::var(b)]).unwrap())
}

fn test_db(config: &GroundingConfig) -> Arc<MemDatabase> {
    Arc::new(config.mem_database(&mut PartitionRegistry::new()).unwrap())
}

fn observe(db: &MemDatabase, p: &Predicate, a: &str, b: &str) {
    db.insert(&key(p, a, b), 1.0, db.layout().read()[0]).unwrap();
}

fn target(db: &MemDatabase, p: &Predicate, a: &str, b: &str, value: f64) {
    db.insert(&key(p, a, b), value, db.layout().write()).unwrap();
}

/// `1/|B| * Friend(A, +B) <comparator> 0.5`, `+B` selected by `Knows(A, B)`.
fn friend_average_rule(comparator: Comparator) -> ArithmeticRule {
    let b = SummationVariable::new("B");
    let summed = SummationAtom::new(friend(), vec![Term::var("A").into(), b.clone().into()]).unwrap();
    let expression = ArithmeticRuleExpression::new(
        vec![(
            Coefficient::divide(Coefficient::constant(1.0), Coefficient::cardinality(&b)),
            ExpressionAtom::Summation(summed),
        )],
        comparator,
        Coefficient::constant(0.5),
    )
    .unwrap();
    let mut selects = HashMap::new();
    selects.insert(b, formula(&knows(), "A", "B"));
    ArithmeticRule::new("friend-average", expression, selects, Some(1.0)).unwrap()
}

#[test]
fn summation_rule_end_to_end() -> RelgroundResult<()> {
    let db = test_db(&GroundingConfig::default());
    observe(&db, &knows(), "alice", "bob");
    observe(&db, &knows(), "alice", "carol");
    target(&db, &friend(), "alice", "bob", 0.0);
    target(&db, &friend(), "alice", "carol", 0.0);

    let mut model = Model::new();
    model.add_rule(friend_average_rule(Comparator::GreaterOrEqual));

    let mut manager = PersistedAtomManager::new(db);
    let mut store = MemGroundRuleStore::new();
    let emitted = model.ground_all(&mut manager, &mut store)?;
    assert_eq!(emitted, 1);

    let ground = store
        .iter()
        .next()
        .and_then(GroundRule::as_arithmetic)
        .unwrap();
    let mut atoms: Vec<String> = ground.atoms.iter().map(|a| a.to_string()).collect();
    atoms.sort();
    assert_eq!(atoms, vec!["Friend('alice', 'bob')", "Friend('alice', 'carol')"]);
    assert_eq!(ground.coefficients, vec![0.5, 0.5]);
    assert_eq!(ground.comparator, Inequality::GreaterOrEqual);
    assert_eq!(ground.constant, 0.5);
    assert_eq!(ground.weight, Some(1.0));

    // Both targets at 0.0: the average is 0, half a unit short of 0.5.
    assert!((ground.incompatibility() - 0.5).abs() < 1e-12);
    for atom in &ground.atoms {
        atom.set_value(1.0);
    }
    assert_eq!(ground.incompatibility(), 0.0);
    Ok(())
}

#[test]
fn equality_rule_is_split_per_row() -> RelgroundResult<()> {
    let db = test_db(&GroundingConfig::default());
    for (a, b) in [("alice", "bob"), ("alice", "carol"), ("bob", "carol")] {
        observe(&db, &knows(), a, b);
        target(&db, &friend(), a, b, 0.0);
    }

    let mut manager = PersistedAtomManager::new(db);
    let mut store = MemGroundRuleStore::new();
    let rule = friend_average_rule(Comparator::Equal);
    assert_eq!(rule.ground_all(&mut manager, &mut store)?, 4);

    let rules: Vec<_> = store.iter().filter_map(GroundRule::as_arithmetic).collect();
    let ge = rules
        .iter()
        .filter(|g| g.comparator == Inequality::GreaterOrEqual)
        .count();
    assert_eq!(ge, 2);
    for pair in rules.chunks(2) {
        assert_eq!(pair[0].atoms, pair[1].atoms);
        assert_eq!(pair[0].coefficients, pair[1].coefficients);
        assert_eq!(pair[0].constant, pair[1].constant);
        assert_ne!(pair[0].comparator, pair[1].comparator);
    }
    Ok(())
}

#[test]
fn ground_atoms_are_shared_across_ground_rules() -> RelgroundResult<()> {
    let db = test_db(&GroundingConfig::default());
    observe(&db, &knows(), "alice", "bob");
    target(&db, &friend(), "alice", "bob", 0.0);

    let mut model = Model::new();
    model.add_rule(friend_average_rule(Comparator::LessOrEqual));
    model.add_rule(LogicalRule::new(
        "knows-friend",
        Formula::implies(formula(&knows(), "A", "B"), formula(&friend(), "A", "B")),
        Some(2.0),
    )?);

    let mut manager = PersistedAtomManager::new(db);
    let mut store = MemGroundRuleStore::new();
    assert_eq!(model.ground_all(&mut manager, &mut store)?, 2);

    let from_arithmetic = store
        .rules_for("friend-average")
        .next()
        .and_then(GroundRule::as_arithmetic)
        .map(|g| g.atoms[0].clone())
        .unwrap();
    let from_logical = store
        .rules_for("knows-friend")
        .next()
        .and_then(GroundRule::as_logical)
        .map(|g| g.positive[0].clone())
        .unwrap();
    assert!(from_arithmetic.same_instance(&from_logical));
    from_logical.set_value(0.75);
    assert_eq!(from_arithmetic.value(), 0.75);

    let direct = manager.get_atom(&friend(), &[Constant::from("alice"), Constant::from("bob")])?;
    assert!(direct.same_instance(&from_logical));
    Ok(())
}

#[test]
fn lazy_activation_regrounds_only_new_groundings() -> RelgroundResult<()> {
    let config = GroundingConfig {
        activation_threshold: 0.5,
        ..Default::default()
    };
    let db = test_db(&config);
    observe(&db, &knows(), "alice", "bob");
    observe(&db, &knows(), "alice", "dave");
    observe(&db, &knows(), "dave", "erin");
    target(&db, &friend(), "alice", "bob", 0.0);

    let mut model = Model::new();
    // Knows(A, B) -> Friend(A, B)
    model.add_rule(LogicalRule::new(
        "knows-friend",
        Formula::implies(formula(&knows(), "A", "B"), formula(&friend(), "A", "B")),
        Some(1.0),
    )?);
    // Friend(A, B) & Knows(B, C) -> Friend(A, C)
    model.add_rule(LogicalRule::new(
        "friend-of-acquaintance",
        Formula::implies(
            Formula::and(vec![formula(&friend(), "A", "B"), formula(&knows(), "B", "C")])?,
            formula(&friend(), "A", "C"),
        ),
        Some(0.5),
    )?);

    let mut manager = LazyAtomManager::from_config(Arc::clone(&db), &config)?;
    let mut store = MemGroundRuleStore::new();
    assert_eq!(model.ground_all(&mut manager, &mut store)?, 3);
    assert_eq!(store.rules_for("friend-of-acquaintance").count(), 0);

    // Friend(alice, dave) and Friend(dave, erin) were deferred.
    let dave = key(&friend(), "alice", "dave");
    assert!(manager.is_lazy(&dave));
    assert_eq!(manager.lazy_len(), 2);
    let lazy_dave = manager.get_atom(&friend(), &[Constant::from("alice"), Constant::from("dave")])?;
    assert_eq!(lazy_dave.value(), config.default_value);
    assert!(db.get_atom(&dave).is_none());

    lazy_dave.set_value(0.8);
    let activated = manager.activate_atoms(&model, &mut store)?;
    assert_eq!(activated, 1);

    // Committed and promoted to the write partition.
    assert_eq!(db.partition_of(&dave), Some(db.layout().write()));
    assert!(db.atoms_in(db.layout().lazy()).is_empty());
    assert!(!manager.is_lazy(&dave));
    assert!(manager.persisted().contains(&dave));

    // Only the grounding through dave was added.
    let regrounded: Vec<_> = store
        .rules_for("friend-of-acquaintance")
        .filter_map(GroundRule::as_logical)
        .collect();
    assert_eq!(regrounded.len(), 1);
    let body: Vec<String> = regrounded[0].negative.iter().map(|a| a.to_string()).collect();
    assert!(body.contains(&"Friend('alice', 'dave')".to_string()));
    assert!(body.contains(&"Knows('dave', 'erin')".to_string()));
    assert_eq!(regrounded[0].positive[0].to_string(), "Friend('alice', 'erin')");
    assert_eq!(store.len(), 4);

    // The new head atom is lazy; nothing left reaches the threshold.
    assert!(manager.is_lazy(&key(&friend(), "alice", "erin")));
    assert!(manager.lazy_atoms().all(|a| a.value() < config.activation_threshold));
    assert_eq!(manager.activate_atoms(&model, &mut store)?, 0);
    Ok(())
}

#[test]
fn arithmetic_rules_are_not_regrounded_on_activation() -> RelgroundResult<()> {
    let config = GroundingConfig {
        activation_threshold: 0.5,
        ..Default::default()
    };
    let db = test_db(&config);
    observe(&db, &knows(), "alice", "bob");
    observe(&db, &knows(), "alice", "carol");
    target(&db, &friend(), "alice", "bob", 0.0);

    let mut model = Model::new();
    model.add_rule(friend_average_rule(Comparator::GreaterOrEqual));

    let mut manager = LazyAtomManager::from_config(Arc::clone(&db), &config)?;
    let mut store = MemGroundRuleStore::new();
    assert_eq!(model.ground_all(&mut manager, &mut store)?, 1);
    assert_eq!(manager.lazy_len(), 1);

    for atom in manager.lazy_atoms() {
        atom.set_value(1.0);
    }
    assert_eq!(manager.activate_atoms(&model, &mut store)?, 1);
    assert_eq!(store.len(), 1);
    assert_eq!(db.partition_of(&key(&friend(), "alice", "carol")), Some(db.layout().write()));
    Ok(())
}

#[test]
fn config_file_drives_store_and_manager() -> RelgroundResult<()> {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("conf").join("grounding.toml");

    let config = GroundingConfig {
        activation_threshold: 0.3,
        default_value: 0.1,
        ..Default::default()
    };
    config.save(&path)?;
    let loaded = GroundingConfig::load(&path)?;
    assert_eq!(loaded, config);

    let mut registry = PartitionRegistry::new();
    let db = Arc::new(loaded.mem_database(&mut registry)?);
    assert_eq!(db.layout().write(), registry.get("targets")?.id);

    let mut manager = LazyAtomManager::from_config(db, &loaded)?;
    assert_eq!(manager.activation_threshold(), 0.3);
    let atom = manager.get_atom(&friend(), &[Constant::from("x"), Constant::from("y")])?;
    assert_eq!(atom.value(), 0.1);
    Ok(())
}

#[test]
fn missing_config_file_is_a_read_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let err = GroundingConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, relground::error::ConfigError::Read { .. }));
}

#[test]
fn export_ground_rules_as_json() -> RelgroundResult<()> {
    let db = test_db(&GroundingConfig::default());
    observe(&db, &knows(), "alice", "bob");
    target(&db, &friend(), "alice", "bob", 0.25);

    let mut manager = PersistedAtomManager::new(db);
    let mut store = MemGroundRuleStore::new();
    friend_average_rule(Comparator::GreaterOrEqual).ground_all(&mut manager, &mut store)?;

    let json = store.export_json()?;
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed[0]["kind"], "arithmetic");
    assert_eq!(parsed[0]["rule"], "friend-average");
    assert_eq!(parsed[0]["atoms"][0]["value"], 0.25);
    assert_eq!(parsed[0]["atoms"][0]["args"][1], "'bob'");
    Ok(())
}
