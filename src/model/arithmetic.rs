//! Arithmetic rule expressions: `Σ coefficient·atom ▷ constant`.
//!
//! A term may be a plain [`Atom`] or a [`SummationAtom`], whose
//! [`SummationVariable`] arguments range over a selection set computed per
//! grounding row. Coefficients may depend on the size of those sets.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

use super::atom::{write_call, Atom};
use super::predicate::Predicate;
use super::term::{Constant, Term, Variable};

/// Selection sets per summation variable for the row being grounded.
///
/// Ordered sets keep the cross-product expansion deterministic.
pub type SummationSets = HashMap<SummationVariable, BTreeSet<Constant>>;

/// A variable ranging over a selection set rather than over query rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SummationVariable(Variable);

impl SummationVariable {
    pub fn new(name: impl Into<String>) -> Self {
        Self(Variable::new(name))
    }

    /// The plain variable a select formula binds.
    pub fn variable(&self) -> &Variable {
        &self.0
    }
}

impl fmt::Display for SummationVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{}", self.0)
    }
}

/// Argument of a summation atom.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SummationTerm {
    Term(Term),
    Summation(SummationVariable),
}

impl fmt::Display for SummationTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummationTerm::Term(t) => write!(f, "{t}"),
            SummationTerm::Summation(s) => write!(f, "{s}"),
        }
    }
}

impl From<Term> for SummationTerm {
    fn from(t: Term) -> Self {
        SummationTerm::Term(t)
    }
}

impl From<SummationVariable> for SummationTerm {
    fn from(s: SummationVariable) -> Self {
        SummationTerm::Summation(s)
    }
}

/// An atom template whose arguments may include summation variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SummationAtom {
    predicate: Predicate,
    args: Vec<SummationTerm>,
    query_atom: Atom,
}

impl SummationAtom {
    pub fn new(predicate: Predicate, args: Vec<SummationTerm>) -> ModelResult<Self> {
        let plain = args
            .iter()
            .map(|arg| match arg {
                SummationTerm::Term(t) => t.clone(),
                SummationTerm::Summation(s) => Term::Variable(s.variable().clone()),
            })
            .collect();
        // Arity and constant types are validated through the query atom.
        let query_atom = Atom::new(predicate.clone(), plain)?;
        Ok(Self {
            predicate,
            args,
            query_atom,
        })
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn args(&self) -> &[SummationTerm] {
        &self.args
    }

    /// Same shape with summation variables replaced by plain variables.
    pub fn query_atom(&self) -> &Atom {
        &self.query_atom
    }

    pub fn summation_variables(&self) -> Vec<&SummationVariable> {
        let mut out: Vec<&SummationVariable> = Vec::new();
        for arg in &self.args {
            if let SummationTerm::Summation(s) = arg {
                if !out.contains(&s) {
                    out.push(s);
                }
            }
        }
        out
    }

    /// Ordinary (outer) variables.
    pub fn variables(&self) -> Vec<&Variable> {
        let mut out: Vec<&Variable> = Vec::new();
        for arg in &self.args {
            if let SummationTerm::Term(Term::Variable(v)) = arg {
                if !out.contains(&v) {
                    out.push(v);
                }
            }
        }
        out
    }
}

impl fmt::Display for SummationAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_call(f, self.predicate.name(), &self.args)
    }
}

/// One term of an arithmetic expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExpressionAtom {
    Atom(Atom),
    Summation(SummationAtom),
}

impl ExpressionAtom {
    pub fn predicate(&self) -> &Predicate {
        match self {
            ExpressionAtom::Atom(a) => a.predicate(),
            ExpressionAtom::Summation(s) => s.predicate(),
        }
    }

    /// Atom used in the outer grounding query.
    pub fn query_atom(&self) -> &Atom {
        match self {
            ExpressionAtom::Atom(a) => a,
            ExpressionAtom::Summation(s) => s.query_atom(),
        }
    }

    fn outer_variables(&self) -> Vec<&Variable> {
        match self {
            ExpressionAtom::Atom(a) => a.variables(),
            ExpressionAtom::Summation(s) => s.variables(),
        }
    }
}

impl fmt::Display for ExpressionAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpressionAtom::Atom(a) => write!(f, "{a}"),
            ExpressionAtom::Summation(s) => write!(f, "{s}"),
        }
    }
}

/// Coefficient expression, evaluated once per grounding row.
#[derive(Debug, Clone, PartialEq)]
pub enum Coefficient {
    Constant(f64),
    /// `|S|`: size of a summation variable's selection set.
    Cardinality(SummationVariable),
    Add(Box<Coefficient>, Box<Coefficient>),
    Subtract(Box<Coefficient>, Box<Coefficient>),
    Multiply(Box<Coefficient>, Box<Coefficient>),
    Divide(Box<Coefficient>, Box<Coefficient>),
    Min(Box<Coefficient>, Box<Coefficient>),
    Max(Box<Coefficient>, Box<Coefficient>),
}

impl Coefficient {
    pub fn constant(value: f64) -> Self {
        Coefficient::Constant(value)
    }

    pub fn cardinality(var: &SummationVariable) -> Self {
        Coefficient::Cardinality(var.clone())
    }

    pub fn divide(lhs: Coefficient, rhs: Coefficient) -> Self {
        Coefficient::Divide(Box::new(lhs), Box::new(rhs))
    }

    pub fn multiply(lhs: Coefficient, rhs: Coefficient) -> Self {
        Coefficient::Multiply(Box::new(lhs), Box::new(rhs))
    }

    /// Evaluate against the current selection sets. A missing set counts as empty.
    pub fn value(&self, sets: &SummationSets) -> f64 {
        match self {
            Coefficient::Constant(c) => *c,
            Coefficient::Cardinality(var) => sets.get(var).map_or(0, BTreeSet::len) as f64,
            Coefficient::Add(a, b) => a.value(sets) + b.value(sets),
            Coefficient::Subtract(a, b) => a.value(sets) - b.value(sets),
            Coefficient::Multiply(a, b) => a.value(sets) * b.value(sets),
            Coefficient::Divide(a, b) => a.value(sets) / b.value(sets),
            Coefficient::Min(a, b) => a.value(sets).min(b.value(sets)),
            Coefficient::Max(a, b) => a.value(sets).max(b.value(sets)),
        }
    }

    fn collect_summation_variables<'a>(&'a self, out: &mut Vec<&'a SummationVariable>) {
        match self {
            Coefficient::Constant(_) => {}
            Coefficient::Cardinality(var) => out.push(var),
            Coefficient::Add(a, b)
            | Coefficient::Subtract(a, b)
            | Coefficient::Multiply(a, b)
            | Coefficient::Divide(a, b)
            | Coefficient::Min(a, b)
            | Coefficient::Max(a, b) => {
                a.collect_summation_variables(out);
                b.collect_summation_variables(out);
            }
        }
    }
}

impl fmt::Display for Coefficient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coefficient::Constant(c) => write!(f, "{c}"),
            Coefficient::Cardinality(v) => write!(f, "|{}|", v.variable()),
            Coefficient::Add(a, b) => write!(f, "({a} + {b})"),
            Coefficient::Subtract(a, b) => write!(f, "({a} - {b})"),
            Coefficient::Multiply(a, b) => write!(f, "({a} * {b})"),
            Coefficient::Divide(a, b) => write!(f, "({a} / {b})"),
            Coefficient::Min(a, b) => write!(f, "@Min[{a}, {b}]"),
            Coefficient::Max(a, b) => write!(f, "@Max[{a}, {b}]"),
        }
    }
}

/// Relation between the linear combination and the constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    Equal,
    LessOrEqual,
    GreaterOrEqual,
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparator::Equal => write!(f, "="),
            Comparator::LessOrEqual => write!(f, "<="),
            Comparator::GreaterOrEqual => write!(f, ">="),
        }
    }
}

/// `Σ coefficient·atom ▷ final_coefficient`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArithmeticRuleExpression {
    terms: Vec<(Coefficient, ExpressionAtom)>,
    comparator: Comparator,
    final_coefficient: Coefficient,
    variables: Vec<Variable>,
    summation_variables: Vec<SummationVariable>,
}

impl ArithmeticRuleExpression {
    pub fn new(
        terms: Vec<(Coefficient, ExpressionAtom)>,
        comparator: Comparator,
        final_coefficient: Coefficient,
    ) -> ModelResult<Self> {
        if terms.is_empty() {
            return Err(ModelError::EmptyExpression);
        }

        let mut variables: Vec<Variable> = Vec::new();
        let mut summation_variables: Vec<SummationVariable> = Vec::new();
        for (_, atom) in &terms {
            for v in atom.outer_variables() {
                if !variables.contains(v) {
                    variables.push(v.clone());
                }
            }
            if let ExpressionAtom::Summation(s) = atom {
                for sv in s.summation_variables() {
                    if !summation_variables.contains(sv) {
                        summation_variables.push(sv.clone());
                    }
                }
            }
        }

        if let Some(clash) = summation_variables
            .iter()
            .find(|sv| variables.contains(sv.variable()))
        {
            return Err(ModelError::SummationClash {
                variable: clash.variable().to_string(),
            });
        }

        let mut referenced = Vec::new();
        for (coeff, _) in &terms {
            coeff.collect_summation_variables(&mut referenced);
        }
        final_coefficient.collect_summation_variables(&mut referenced);
        if let Some(unknown) = referenced
            .into_iter()
            .find(|sv| !summation_variables.contains(sv))
        {
            return Err(ModelError::UnknownSummationVariable {
                variable: unknown.variable().to_string(),
            });
        }

        Ok(Self {
            terms,
            comparator,
            final_coefficient,
            variables,
            summation_variables,
        })
    }

    pub fn terms(&self) -> &[(Coefficient, ExpressionAtom)] {
        &self.terms
    }

    pub fn comparator(&self) -> Comparator {
        self.comparator
    }

    pub fn final_coefficient(&self) -> &Coefficient {
        &self.final_coefficient
    }

    /// Outer (non-summation) variables in first-occurrence order.
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn summation_variables(&self) -> &[SummationVariable] {
        &self.summation_variables
    }
}

impl fmt::Display for ArithmeticRuleExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (coeff, atom)) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            write!(f, "{coeff} * {atom}")?;
        }
        write!(f, " {} {}", self.comparator, self.final_coefficient)
    }
}
