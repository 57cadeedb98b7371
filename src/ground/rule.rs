//! Ground rules and the sink that accumulates them.

use std::fmt;

use crate::error::{StoreError, StoreResult};
use crate::export::GroundRuleExport;

use super::GroundAtom;

// ---------------------------------------------------------------------------
// Arithmetic
// ---------------------------------------------------------------------------

/// Comparator of a ground arithmetic rule.
///
/// Equality never reaches this level: it is always split into a `>=` and a
/// `<=` ground rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Inequality {
    LessOrEqual,
    GreaterOrEqual,
}

impl fmt::Display for Inequality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inequality::LessOrEqual => write!(f, "<="),
            Inequality::GreaterOrEqual => write!(f, ">="),
        }
    }
}

/// `Σ coefficient·atom ▷ constant` over ground atoms.
#[derive(Debug, Clone)]
pub struct GroundArithmeticRule {
    pub rule: String,
    pub weight: Option<f64>,
    pub coefficients: Vec<f64>,
    pub atoms: Vec<GroundAtom>,
    pub comparator: Inequality,
    pub constant: f64,
}

impl GroundArithmeticRule {
    /// Linear combination at the atoms' current values.
    pub fn lhs(&self) -> f64 {
        self.coefficients
            .iter()
            .zip(&self.atoms)
            .map(|(c, a)| c * a.value())
            .sum()
    }

    /// How far the current values are from satisfying the constraint.
    pub fn incompatibility(&self) -> f64 {
        let lhs = self.lhs();
        match self.comparator {
            Inequality::LessOrEqual => (lhs - self.constant).max(0.0),
            Inequality::GreaterOrEqual => (self.constant - lhs).max(0.0),
        }
    }
}

impl fmt::Display for GroundArithmeticRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (c, a)) in self.coefficients.iter().zip(&self.atoms).enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            write!(f, "{c} * {a}")?;
        }
        if self.atoms.is_empty() {
            write!(f, "0")?;
        }
        write!(f, " {} {}", self.comparator, self.constant)
    }
}

// ---------------------------------------------------------------------------
// Logical
// ---------------------------------------------------------------------------

/// A ground disjunctive clause: `∨ positive ∨ ¬negative`.
#[derive(Debug, Clone)]
pub struct GroundLogicalRule {
    pub rule: String,
    pub weight: Option<f64>,
    /// Atoms asserted by the clause (typically the rule head).
    pub positive: Vec<GroundAtom>,
    /// Atoms negated in the clause (typically the rule body).
    pub negative: Vec<GroundAtom>,
}

impl GroundLogicalRule {
    /// Łukasiewicz truth value of the clause at the current atom values.
    pub fn truth_value(&self) -> f64 {
        let sum: f64 = self.positive.iter().map(GroundAtom::value).sum::<f64>()
            + self.negative.iter().map(|a| 1.0 - a.value()).sum::<f64>();
        sum.min(1.0)
    }

    pub fn distance_to_satisfaction(&self) -> f64 {
        1.0 - self.truth_value()
    }
}

impl fmt::Display for GroundLogicalRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let literals = self
            .negative
            .iter()
            .map(|a| format!("~{a}"))
            .chain(self.positive.iter().map(|a| a.to_string()))
            .collect::<Vec<_>>();
        write!(f, "{}", literals.join(" | "))
    }
}

// ---------------------------------------------------------------------------
// Ground rule
// ---------------------------------------------------------------------------

/// A fully instantiated constraint emitted by grounding.
#[derive(Debug, Clone)]
pub enum GroundRule {
    Logical(GroundLogicalRule),
    Arithmetic(GroundArithmeticRule),
}

impl GroundRule {
    /// Name of the first-order rule this was grounded from.
    pub fn rule_name(&self) -> &str {
        match self {
            GroundRule::Logical(g) => &g.rule,
            GroundRule::Arithmetic(g) => &g.rule,
        }
    }

    pub fn weight(&self) -> Option<f64> {
        match self {
            GroundRule::Logical(g) => g.weight,
            GroundRule::Arithmetic(g) => g.weight,
        }
    }

    pub fn atoms(&self) -> Vec<&GroundAtom> {
        match self {
            GroundRule::Logical(g) => g.negative.iter().chain(&g.positive).collect(),
            GroundRule::Arithmetic(g) => g.atoms.iter().collect(),
        }
    }

    pub fn as_arithmetic(&self) -> Option<&GroundArithmeticRule> {
        match self {
            GroundRule::Arithmetic(g) => Some(g),
            GroundRule::Logical(_) => None,
        }
    }

    pub fn as_logical(&self) -> Option<&GroundLogicalRule> {
        match self {
            GroundRule::Logical(g) => Some(g),
            GroundRule::Arithmetic(_) => None,
        }
    }
}

impl fmt::Display for GroundRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroundRule::Logical(g) => write!(f, "{g}"),
            GroundRule::Arithmetic(g) => write!(f, "{g}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Sink for emitted ground rules. Deduplication and indexing are up to the
/// implementation.
pub trait GroundRuleStore {
    fn add_ground_rule(&mut self, rule: GroundRule);
}

/// Append-only in-memory ground rule store.
#[derive(Debug, Default)]
pub struct MemGroundRuleStore {
    rules: Vec<GroundRule>,
}

impl MemGroundRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GroundRule> {
        self.rules.iter()
    }

    /// Ground rules emitted for the named first-order rule.
    pub fn rules_for<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a GroundRule> + 'a {
        self.rules.iter().filter(move |r| r.rule_name() == name)
    }

    /// Pretty JSON array of every ground rule.
    pub fn export_json(&self) -> StoreResult<String> {
        let exported: Vec<GroundRuleExport> = self.rules.iter().map(GroundRuleExport::from).collect();
        serde_json::to_string_pretty(&exported).map_err(|e| StoreError::Serialization {
            message: format!("failed to export ground rules: {e}"),
        })
    }
}

impl GroundRuleStore for MemGroundRuleStore {
    fn add_ground_rule(&mut self, rule: GroundRule) {
        self.rules.push(rule);
    }
}
