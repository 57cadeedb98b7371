//! Atom event subscriptions: which rules care about which predicates.
//!
//! Only logical rules can subscribe. Arithmetic rules have no registration
//! method at all, so they never appear here.

use std::collections::{BTreeSet, HashMap};

use crate::model::{Model, Predicate, Rule};

/// Predicate → indices of subscribed rules in a [`Model`].
#[derive(Debug, Clone, Default)]
pub struct AtomEventRegistry {
    subscriptions: HashMap<Predicate, BTreeSet<usize>>,
}

impl AtomEventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every logical rule of `model` subscribed to its query
    /// predicates.
    pub fn from_model(model: &Model) -> Self {
        let mut registry = Self::new();
        for (index, rule) in model.rules().iter().enumerate() {
            match rule {
                Rule::Logical(r) => r.register_for_atom_events(index, &mut registry),
                Rule::Arithmetic(_) => {}
            }
        }
        registry
    }

    pub fn subscribe(&mut self, predicate: Predicate, rule: usize) {
        self.subscriptions.entry(predicate).or_default().insert(rule);
    }

    /// Rules subscribed to any of `predicates`, in index order.
    pub fn rules_for<'a>(&self, predicates: impl IntoIterator<Item = &'a Predicate>) -> BTreeSet<usize> {
        let mut out = BTreeSet::new();
        for predicate in predicates {
            if let Some(rules) = self.subscriptions.get(predicate) {
                out.extend(rules.iter().copied());
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}
