//! Grounding queries and their result sets.

use std::collections::{HashMap, HashSet};

use crate::model::{Constant, Literal, Variable};

/// A mapping from variables to the constants they are bound to.
pub type VariableAssignment = HashMap<Variable, Constant>;

/// A conjunctive query over the backing store.
///
/// `lazy_target` names a positive literal that must bind to atoms of the
/// lazy-staging partition only; every other literal sees all visible
/// partitions. This is how activation restricts regrounding to groundings
/// that involve at least one newly activated atom.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseQuery {
    literals: Vec<Literal>,
    projection: Option<Vec<Variable>>,
    partial_grounding: VariableAssignment,
    lazy_target: Option<usize>,
}

impl DatabaseQuery {
    pub fn new(literals: Vec<Literal>) -> Self {
        Self {
            literals,
            projection: None,
            partial_grounding: VariableAssignment::new(),
            lazy_target: None,
        }
    }

    /// Project onto `variables`, in this order. Without a projection every
    /// variable of the formula is returned.
    pub fn project(mut self, variables: Vec<Variable>) -> Self {
        self.projection = Some(variables);
        self
    }

    /// Pin variables to constants before evaluation.
    pub fn with_partial_grounding(mut self, assignment: VariableAssignment) -> Self {
        self.partial_grounding = assignment;
        self
    }

    pub fn with_lazy_target(mut self, literal: usize) -> Self {
        self.lazy_target = Some(literal);
        self
    }

    pub fn literals(&self) -> &[Literal] {
        &self.literals
    }

    pub fn partial_grounding(&self) -> &VariableAssignment {
        &self.partial_grounding
    }

    pub fn lazy_target(&self) -> Option<usize> {
        self.lazy_target
    }

    /// Variables of the formula in first-occurrence order.
    pub fn formula_variables(&self) -> Vec<Variable> {
        let mut out: Vec<Variable> = Vec::new();
        for lit in &self.literals {
            for v in lit.atom.variables() {
                if !out.contains(v) {
                    out.push(v.clone());
                }
            }
        }
        out
    }

    /// The effective projection.
    pub fn projection(&self) -> Vec<Variable> {
        match &self.projection {
            Some(vars) => vars.clone(),
            None => self.formula_variables(),
        }
    }
}

/// Distinct result rows over a fixed list of variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultList {
    variables: Vec<Variable>,
    rows: Vec<Vec<Constant>>,
    seen: HashSet<Vec<Constant>>,
}

impl ResultList {
    pub fn new(variables: Vec<Variable>) -> Self {
        Self {
            variables,
            rows: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Append a row unless an identical one is already present. Returns
    /// whether the row was new.
    pub fn push(&mut self, row: Vec<Constant>) -> bool {
        debug_assert_eq!(row.len(), self.variables.len());
        if self.seen.contains(&row) {
            return false;
        }
        self.seen.insert(row.clone());
        self.rows.push(row);
        true
    }

    /// Set union with `other`, matching columns by variable.
    pub fn merge(&mut self, other: ResultList) {
        let columns: Option<Vec<usize>> = self
            .variables
            .iter()
            .map(|v| other.variable_index(v))
            .collect();
        let Some(columns) = columns else {
            debug_assert!(false, "merging result lists with different projections");
            return;
        };
        for row in other.rows {
            self.push(columns.iter().map(|&i| row[i].clone()).collect());
        }
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable_index(&self, variable: &Variable) -> Option<usize> {
        self.variables.iter().position(|v| v == variable)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Vec<Constant>] {
        &self.rows
    }

    /// Constant bound to `variable` in row `row`.
    pub fn get(&self, row: usize, variable: &Variable) -> Option<&Constant> {
        let col = self.variable_index(variable)?;
        self.rows.get(row).map(|r| &r[col])
    }

    /// Row `row` as a variable assignment.
    pub fn assignment(&self, row: usize) -> VariableAssignment {
        self.variables
            .iter()
            .cloned()
            .zip(self.rows[row].iter().cloned())
            .collect()
    }

    /// Every row as a variable assignment, in row order.
    pub fn assignments(&self) -> impl Iterator<Item = VariableAssignment> + '_ {
        (0..self.rows.len()).map(|i| self.assignment(i))
    }

    /// Distinct constants bound to `variable` across all rows.
    pub fn column(&self, variable: &Variable) -> Vec<&Constant> {
        let Some(col) = self.variable_index(variable) else {
            return Vec::new();
        };
        let mut out: Vec<&Constant> = Vec::new();
        for row in &self.rows {
            if !out.contains(&&row[col]) {
                out.push(&row[col]);
            }
        }
        out
    }
}
