// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # relground
//!
//! A relational grounding engine: instantiates first-order logical and
//! arithmetic rules against a partitioned atom store, producing ground
//! rules for a downstream solver.
//!
//! ## Architecture
//!
//! - **Model** (`model`): terms, predicates, atoms, formulas with DNF,
//!   arithmetic expressions with summation atoms, rules
//! - **Ground** (`ground`): shared ground-atom handles, ground rules, the
//!   ground rule sink
//! - **Database** (`database`, `store`): query/commit interfaces and the
//!   DashMap-backed reference store
//! - **Atom managers** (`atom`): canonical atom instances, lazy atoms and
//!   their activation with incremental regrounding
//! - **Grounding** (`grounding`): arithmetic grounding with per-row
//!   selection sets and cross-product expansion, logical grounding
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use relground::atom::LazyAtomManager;
//! use relground::config::GroundingConfig;
//! use relground::ground::MemGroundRuleStore;
//! use relground::model::{ArgumentType, Atom, Formula, LogicalRule, Model, Predicate, Term};
//! use relground::partition::PartitionRegistry;
//!
//! let config = GroundingConfig::default();
//! let db = Arc::new(config.mem_database(&mut PartitionRegistry::new()).unwrap());
//!
//! let knows = Predicate::standard("Knows", vec![ArgumentType::String; 2]);
//! let friend = Predicate::standard("Friend", vec![ArgumentType::String; 2]);
//! let ab = || vec![Term::var("A"), Term::var("B")];
//! let rule = LogicalRule::new(
//!     "knows-implies-friend",
//!     Formula::implies(
//!         Formula::atom(Atom::new(knows, ab()).unwrap()),
//!         Formula::atom(Atom::new(friend, ab()).unwrap()),
//!     ),
//!     Some(1.0),
//! )
//! .unwrap();
//!
//! let mut model = Model::new();
//! model.add_rule(rule);
//!
//! let mut manager = LazyAtomManager::from_config(db, &config).unwrap();
//! let mut store = MemGroundRuleStore::new();
//! model.ground_all(&mut manager, &mut store).unwrap();
//! manager.activate_atoms(&model, &mut store).unwrap();
//! ```

pub mod atom;
pub mod config;
pub mod database;
pub mod error;
pub mod events;
pub mod export;
pub mod ground;
pub mod grounding;
pub mod model;
pub mod partition;
pub mod store;
