//! First-order rules and the model that holds them.

use std::collections::HashMap;
use std::fmt;

use crate::atom::AtomManager;
use crate::database::ResultList;
use crate::error::{GroundingError, GroundingResult, ModelError, ModelResult};
use crate::events::AtomEventRegistry;
use crate::ground::GroundRuleStore;
use crate::grounding;

use super::arithmetic::{ArithmeticRuleExpression, SummationVariable};
use super::formula::{Dnf, Formula, Literal};
use super::predicate::Predicate;
use super::term::Variable;

fn check_weight(weight: Option<f64>) -> ModelResult<()> {
    match weight {
        Some(w) if !w.is_finite() => Err(ModelError::NonFinite {
            what: "rule weight",
            value: w,
        }),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Logical rules
// ---------------------------------------------------------------------------

/// A rule built from a quantifier-free formula in clause form.
///
/// The negation of the formula must normalize to a single conjunction of
/// literals. Its positive literals form the query that enumerates
/// groundings (the rule body); its negated literals are the clause's
/// asserted atoms (the head).
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalRule {
    name: String,
    formula: Formula,
    clause: Vec<Literal>,
    weight: Option<f64>,
}

impl LogicalRule {
    pub fn new(name: impl Into<String>, formula: Formula, weight: Option<f64>) -> ModelResult<Self> {
        let name = name.into();
        check_weight(weight)?;

        let mut conjunctions = Formula::not(formula.clone()).dnf().into_conjunctions();
        if conjunctions.len() != 1 {
            return Err(ModelError::NotAClause {
                rule: name,
                conjunctions: conjunctions.len(),
            });
        }
        let clause = conjunctions.remove(0);

        if !clause.iter().any(|l| !l.negated) {
            return Err(ModelError::EmptyQuery { rule: name });
        }
        // Every variable must be enumerable by a positive standard atom.
        let bound: Vec<&Variable> = clause
            .iter()
            .filter(|l| !l.negated && l.atom.predicate().is_standard())
            .flat_map(|l| l.atom.variables())
            .collect();
        for literal in &clause {
            if let Some(v) = literal.atom.variables().into_iter().find(|v| !bound.contains(v)) {
                return Err(ModelError::UnsafeVariable {
                    rule: name,
                    variable: v.to_string(),
                });
            }
        }

        Ok(Self {
            name,
            formula,
            clause,
            weight,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn formula(&self) -> &Formula {
        &self.formula
    }

    pub fn weight(&self) -> Option<f64> {
        self.weight
    }

    /// Literals of the negated clause: positive ones are body atoms, negated
    /// ones are head atoms.
    pub fn clause(&self) -> &[Literal] {
        &self.clause
    }

    /// The conjunctive query enumerating groundings.
    pub fn query(&self) -> Vec<Literal> {
        self.clause.iter().filter(|l| !l.negated).cloned().collect()
    }

    /// Variables of the rule in first-occurrence order.
    pub fn variables(&self) -> Vec<Variable> {
        let mut out: Vec<Variable> = Vec::new();
        for literal in &self.clause {
            for v in literal.atom.variables() {
                if !out.contains(v) {
                    out.push(v.clone());
                }
            }
        }
        out
    }

    /// Standard predicates of the query formula.
    pub fn query_predicates(&self) -> Vec<&Predicate> {
        let mut out: Vec<&Predicate> = Vec::new();
        for literal in self.clause.iter().filter(|l| !l.negated) {
            let p = literal.atom.predicate();
            if p.is_standard() && !out.contains(&p) {
                out.push(p);
            }
        }
        out
    }

    /// Subscribe rule `index` to changes of its query predicates.
    pub fn register_for_atom_events(&self, index: usize, registry: &mut AtomEventRegistry) {
        for predicate in self.query_predicates() {
            registry.subscribe(predicate.clone(), index);
        }
    }

    pub fn ground_all(
        &self,
        manager: &mut dyn AtomManager,
        store: &mut dyn GroundRuleStore,
    ) -> GroundingResult<usize> {
        grounding::logical::ground_all(self, manager, store)
    }

    /// Ground against a precomputed set of substitutions.
    pub fn ground_results(
        &self,
        results: &ResultList,
        manager: &mut dyn AtomManager,
        store: &mut dyn GroundRuleStore,
    ) -> GroundingResult<usize> {
        grounding::logical::ground_results(self, results, manager, store)
    }
}

impl fmt::Display for LogicalRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.weight {
            Some(w) => write!(f, "{w}: {}", self.formula),
            None => write!(f, "{} .", self.formula),
        }
    }
}

// ---------------------------------------------------------------------------
// Arithmetic rules
// ---------------------------------------------------------------------------

/// A linear constraint over atoms, with per-summation-variable select
/// formulas.
#[derive(Debug, Clone, PartialEq)]
pub struct ArithmeticRule {
    name: String,
    expression: ArithmeticRuleExpression,
    selects: HashMap<SummationVariable, Dnf>,
    weight: Option<f64>,
}

impl ArithmeticRule {
    /// Every summation variable of `expression` needs a select formula that
    /// mentions it; select formulas for anything else are rejected.
    pub fn new(
        name: impl Into<String>,
        expression: ArithmeticRuleExpression,
        selects: HashMap<SummationVariable, Formula>,
        weight: Option<f64>,
    ) -> ModelResult<Self> {
        let name = name.into();
        check_weight(weight)?;

        if let Some(unknown) = selects
            .keys()
            .find(|sv| !expression.summation_variables().contains(*sv))
        {
            return Err(ModelError::UnknownSummationVariable {
                variable: unknown.variable().to_string(),
            });
        }

        let mut normalized = HashMap::with_capacity(selects.len());
        for sv in expression.summation_variables() {
            let Some(formula) = selects.get(sv) else {
                return Err(ModelError::MissingSelect {
                    variable: sv.variable().to_string(),
                });
            };
            let dnf = formula.dnf();
            for conjunction in dnf.conjunctions() {
                let binds = conjunction.iter().any(|l| {
                    !l.negated
                        && l.atom.predicate().is_standard()
                        && l.atom.variables().contains(&sv.variable())
                });
                if !binds {
                    return Err(ModelError::UnsafeVariable {
                        rule: name,
                        variable: sv.to_string(),
                    });
                }
                // Outer variables are pinned by the row; anything else must be
                // enumerated by a positive standard literal.
                let mut bound: Vec<&Variable> = expression.variables().iter().collect();
                for literal in conjunction {
                    if !literal.negated && literal.atom.predicate().is_standard() {
                        bound.extend(literal.atom.variables());
                    }
                }
                let unbound = conjunction
                    .iter()
                    .flat_map(|l| l.atom.variables())
                    .find(|v| !bound.contains(v));
                if let Some(variable) = unbound {
                    return Err(ModelError::UnsafeVariable {
                        rule: name,
                        variable: variable.to_string(),
                    });
                }
            }
            normalized.insert(sv.clone(), dnf);
        }

        Ok(Self {
            name,
            expression,
            selects: normalized,
            weight,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expression(&self) -> &ArithmeticRuleExpression {
        &self.expression
    }

    /// Select formula of `variable`, in disjunctive normal form.
    pub fn select(&self, variable: &SummationVariable) -> Option<&Dnf> {
        self.selects.get(variable)
    }

    pub fn weight(&self) -> Option<f64> {
        self.weight
    }

    /// Whether any term of the expression is over `predicate`.
    pub fn mentions(&self, predicate: &Predicate) -> bool {
        self.expression
            .terms()
            .iter()
            .any(|(_, atom)| atom.predicate() == predicate)
    }

    pub fn ground_all(
        &self,
        manager: &mut dyn AtomManager,
        store: &mut dyn GroundRuleStore,
    ) -> GroundingResult<usize> {
        grounding::arithmetic::ground_all(self, manager, store)
    }
}

impl fmt::Display for ArithmeticRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.weight {
            Some(w) => write!(f, "{w}: {}", self.expression),
            None => write!(f, "{} .", self.expression),
        }
    }
}

// ---------------------------------------------------------------------------
// Rule / Model
// ---------------------------------------------------------------------------

/// A first-order rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Logical(LogicalRule),
    Arithmetic(ArithmeticRule),
}

impl Rule {
    pub fn name(&self) -> &str {
        match self {
            Rule::Logical(r) => r.name(),
            Rule::Arithmetic(r) => r.name(),
        }
    }

    pub fn weight(&self) -> Option<f64> {
        match self {
            Rule::Logical(r) => r.weight(),
            Rule::Arithmetic(r) => r.weight(),
        }
    }

    /// Ground every substitution the store currently satisfies. Returns the
    /// number of ground rules emitted.
    pub fn ground_all(
        &self,
        manager: &mut dyn AtomManager,
        store: &mut dyn GroundRuleStore,
    ) -> GroundingResult<usize> {
        match self {
            Rule::Logical(r) => r.ground_all(manager, store),
            Rule::Arithmetic(r) => r.ground_all(manager, store),
        }
    }

    /// Ground against a precomputed result set. Only logical rules support
    /// this.
    pub fn ground_results(
        &self,
        results: &ResultList,
        manager: &mut dyn AtomManager,
        store: &mut dyn GroundRuleStore,
    ) -> GroundingResult<usize> {
        match self {
            Rule::Logical(r) => r.ground_results(results, manager, store),
            Rule::Arithmetic(r) => Err(GroundingError::Unsupported {
                rule: r.name().to_string(),
                operation: "grounding against a precomputed result set",
            }),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Logical(r) => write!(f, "{r}"),
            Rule::Arithmetic(r) => write!(f, "{r}"),
        }
    }
}

impl From<LogicalRule> for Rule {
    fn from(r: LogicalRule) -> Self {
        Rule::Logical(r)
    }
}

impl From<ArithmeticRule> for Rule {
    fn from(r: ArithmeticRule) -> Self {
        Rule::Arithmetic(r)
    }
}

/// The set of registered rules.
#[derive(Debug, Clone, Default)]
pub struct Model {
    rules: Vec<Rule>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule and return its index.
    pub fn add_rule(&mut self, rule: impl Into<Rule>) -> usize {
        self.rules.push(rule.into());
        self.rules.len() - 1
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, index: usize) -> Option<&Rule> {
        self.rules.get(index)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Ground every rule in registration order.
    pub fn ground_all(
        &self,
        manager: &mut dyn AtomManager,
        store: &mut dyn GroundRuleStore,
    ) -> GroundingResult<usize> {
        let mut total = 0;
        for rule in &self.rules {
            let emitted = rule.ground_all(manager, store)?;
            tracing::debug!(rule = rule.name(), emitted, "grounded rule");
            total += emitted;
        }
        tracing::info!(rules = self.rules.len(), ground_rules = total, "grounded model");
        Ok(total)
    }
}
