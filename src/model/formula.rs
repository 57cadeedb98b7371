//! Quantifier-free formulas and their disjunctive normal form.
//!
//! Grounding queries are conjunctive, so every formula that reaches the
//! query executor is first rewritten into a [`Dnf`]: a disjunction of
//! conjunctions of possibly-negated atoms. Each conjunction is then queried
//! on its own.

use std::fmt;

use crate::error::{ModelError, ModelResult};

use super::atom::Atom;
use super::term::Variable;

/// A formula tree over atoms.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Formula {
    Atom(Atom),
    Negation(Box<Formula>),
    Conjunction(Vec<Formula>),
    Disjunction(Vec<Formula>),
}

impl Formula {
    pub fn atom(atom: Atom) -> Self {
        Formula::Atom(atom)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(formula: Formula) -> Self {
        Formula::Negation(Box::new(formula))
    }

    /// Conjunction of at least one formula.
    pub fn and(formulas: Vec<Formula>) -> ModelResult<Self> {
        if formulas.is_empty() {
            return Err(ModelError::EmptyConnective {
                connective: "conjunction",
            });
        }
        Ok(Formula::Conjunction(formulas))
    }

    /// Disjunction of at least one formula.
    pub fn or(formulas: Vec<Formula>) -> ModelResult<Self> {
        if formulas.is_empty() {
            return Err(ModelError::EmptyConnective {
                connective: "disjunction",
            });
        }
        Ok(Formula::Disjunction(formulas))
    }

    /// `body -> head`, encoded as `~body | head`.
    pub fn implies(body: Formula, head: Formula) -> Self {
        Formula::Disjunction(vec![Formula::not(body), head])
    }

    /// Every distinct atom in the tree, in first-occurrence order.
    pub fn atoms(&self) -> Vec<&Atom> {
        let mut out = Vec::new();
        self.collect_atoms(&mut out);
        out
    }

    fn collect_atoms<'a>(&'a self, out: &mut Vec<&'a Atom>) {
        match self {
            Formula::Atom(a) => {
                if !out.contains(&a) {
                    out.push(a);
                }
            }
            Formula::Negation(inner) => inner.collect_atoms(out),
            Formula::Conjunction(fs) | Formula::Disjunction(fs) => {
                for f in fs {
                    f.collect_atoms(out);
                }
            }
        }
    }

    /// Every distinct variable in the tree, in first-occurrence order.
    pub fn variables(&self) -> Vec<&Variable> {
        let mut out: Vec<&Variable> = Vec::new();
        for atom in self.atoms() {
            for v in atom.variables() {
                if !out.contains(&v) {
                    out.push(v);
                }
            }
        }
        out
    }

    /// Rewrite into disjunctive normal form.
    pub fn dnf(&self) -> Dnf {
        Dnf {
            conjunctions: dnf_of(self, false),
        }
    }
}

fn dnf_of(formula: &Formula, negated: bool) -> Vec<Vec<Literal>> {
    match (formula, negated) {
        (Formula::Atom(atom), _) => vec![vec![Literal {
            atom: atom.clone(),
            negated,
        }]],
        (Formula::Negation(inner), _) => dnf_of(inner, !negated),
        // De Morgan: a negated disjunction is a conjunction of negations.
        (Formula::Conjunction(fs), false) | (Formula::Disjunction(fs), true) => {
            let mut acc: Vec<Vec<Literal>> = vec![Vec::new()];
            for f in fs {
                let child = dnf_of(f, negated);
                let mut next = Vec::with_capacity(acc.len() * child.len());
                for left in &acc {
                    for right in &child {
                        let mut merged = left.clone();
                        for lit in right {
                            if !merged.contains(lit) {
                                merged.push(lit.clone());
                            }
                        }
                        next.push(merged);
                    }
                }
                acc = next;
            }
            acc
        }
        (Formula::Disjunction(fs), false) | (Formula::Conjunction(fs), true) => {
            fs.iter().flat_map(|f| dnf_of(f, negated)).collect()
        }
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::Atom(a) => write!(f, "{a}"),
            Formula::Negation(inner) => write!(f, "~({inner})"),
            Formula::Conjunction(fs) => write_joined(f, fs, " & "),
            Formula::Disjunction(fs) => write_joined(f, fs, " | "),
        }
    }
}

fn write_joined<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{item}")?;
    }
    write!(f, ")")
}

/// A possibly-negated atom.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Literal {
    pub atom: Atom,
    pub negated: bool,
}

impl Literal {
    pub fn positive(atom: Atom) -> Self {
        Self {
            atom,
            negated: false,
        }
    }

    pub fn negative(atom: Atom) -> Self {
        Self {
            atom,
            negated: true,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "~{}", self.atom)
        } else {
            write!(f, "{}", self.atom)
        }
    }
}

/// Disjunction of conjunctions of literals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dnf {
    conjunctions: Vec<Vec<Literal>>,
}

impl Dnf {
    pub fn conjunctions(&self) -> &[Vec<Literal>] {
        &self.conjunctions
    }

    pub fn into_conjunctions(self) -> Vec<Vec<Literal>> {
        self.conjunctions
    }

    /// The equivalent formula tree.
    pub fn to_formula(&self) -> Formula {
        Formula::Disjunction(
            self.conjunctions
                .iter()
                .map(|conj| {
                    Formula::Conjunction(
                        conj.iter()
                            .map(|lit| {
                                let atom = Formula::Atom(lit.atom.clone());
                                if lit.negated { Formula::not(atom) } else { atom }
                            })
                            .collect(),
                    )
                })
                .collect(),
        )
    }
}
