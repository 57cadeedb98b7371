//! Export types for serializing grounding output.
//!
//! These types provide human-readable, label-resolved representations
//! of ground atoms and ground rules suitable for JSON export.

use serde::{Deserialize, Serialize};

use crate::ground::{GroundAtom, GroundRule};

/// Exported ground atom with its current value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundAtomExport {
    /// Predicate name.
    pub predicate: String,
    /// Arguments rendered as text.
    pub args: Vec<String>,
    /// Soft-truth value at export time.
    pub value: f64,
    /// Partition state (observed, unobserved, lazy, computed).
    pub state: String,
}

impl From<&GroundAtom> for GroundAtomExport {
    fn from(atom: &GroundAtom) -> Self {
        Self {
            predicate: atom.predicate().name().to_string(),
            args: atom.args().iter().map(|c| c.to_string()).collect(),
            value: atom.value(),
            state: atom.state().to_string(),
        }
    }
}

/// Exported ground rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GroundRuleExport {
    Logical {
        rule: String,
        weight: Option<f64>,
        positive: Vec<GroundAtomExport>,
        negative: Vec<GroundAtomExport>,
    },
    Arithmetic {
        rule: String,
        weight: Option<f64>,
        coefficients: Vec<f64>,
        atoms: Vec<GroundAtomExport>,
        comparator: String,
        constant: f64,
    },
}

impl From<&GroundRule> for GroundRuleExport {
    fn from(rule: &GroundRule) -> Self {
        match rule {
            GroundRule::Logical(g) => GroundRuleExport::Logical {
                rule: g.rule.clone(),
                weight: g.weight,
                positive: g.positive.iter().map(GroundAtomExport::from).collect(),
                negative: g.negative.iter().map(GroundAtomExport::from).collect(),
            },
            GroundRule::Arithmetic(g) => GroundRuleExport::Arithmetic {
                rule: g.rule.clone(),
                weight: g.weight,
                coefficients: g.coefficients.clone(),
                atoms: g.atoms.iter().map(GroundAtomExport::from).collect(),
                comparator: g.comparator.to_string(),
                constant: g.constant,
            },
        }
    }
}
