//! Atoms: a predicate applied to an argument list.

use std::fmt;

use crate::database::VariableAssignment;
use crate::error::{ModelError, ModelResult};

use super::predicate::Predicate;
use super::term::{Constant, Term, Variable};

/// A (possibly non-ground) atom used as a query pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Atom {
    predicate: Predicate,
    args: Vec<Term>,
}

impl Atom {
    /// Build an atom, checking arity and the type of every constant argument.
    pub fn new(predicate: Predicate, args: Vec<Term>) -> ModelResult<Self> {
        check_arity(&predicate, args.len())?;
        for (position, (arg, ty)) in args.iter().zip(predicate.arg_types()).enumerate() {
            if let Term::Constant(c) = arg {
                check_type(&predicate, position, *ty, c)?;
            }
        }
        Ok(Self { predicate, args })
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn args(&self) -> &[Term] {
        &self.args
    }

    /// Variables in argument order, without duplicates.
    pub fn variables(&self) -> Vec<&Variable> {
        let mut out: Vec<&Variable> = Vec::new();
        for v in self.args.iter().filter_map(Term::as_variable) {
            if !out.contains(&v) {
                out.push(v);
            }
        }
        out
    }

    pub fn is_ground(&self) -> bool {
        self.args.iter().all(|a| matches!(a, Term::Constant(_)))
    }

    /// Replace every bound variable with its constant; unbound ones stay open.
    pub fn bind(&self, assignment: &VariableAssignment) -> Atom {
        let args = self
            .args
            .iter()
            .map(|arg| match arg {
                Term::Variable(v) => assignment
                    .get(v)
                    .map(|c| Term::Constant(c.clone()))
                    .unwrap_or_else(|| arg.clone()),
                Term::Constant(_) => arg.clone(),
            })
            .collect();
        Atom {
            predicate: self.predicate.clone(),
            args,
        }
    }

    /// The constant argument list, if every argument is bound by `assignment`
    /// or already constant.
    pub fn ground_args(&self, assignment: &VariableAssignment) -> Result<Vec<Constant>, Variable> {
        self.args
            .iter()
            .map(|arg| match arg {
                Term::Constant(c) => Ok(c.clone()),
                Term::Variable(v) => assignment.get(v).cloned().ok_or_else(|| v.clone()),
            })
            .collect()
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_call(f, self.predicate.name(), &self.args)
    }
}

/// Identity of a ground atom: predicate plus constant arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AtomKey {
    predicate: Predicate,
    args: Vec<Constant>,
}

impl AtomKey {
    /// Build a key, checking arity and argument types.
    pub fn new(predicate: Predicate, args: Vec<Constant>) -> ModelResult<Self> {
        check_arity(&predicate, args.len())?;
        for (position, (arg, ty)) in args.iter().zip(predicate.arg_types()).enumerate() {
            check_type(&predicate, position, *ty, arg)?;
        }
        Ok(Self { predicate, args })
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn args(&self) -> &[Constant] {
        &self.args
    }
}

impl fmt::Display for AtomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_call(f, self.predicate.name(), &self.args)
    }
}

fn check_arity(predicate: &Predicate, actual: usize) -> ModelResult<()> {
    if predicate.arity() != actual {
        return Err(ModelError::ArityMismatch {
            predicate: predicate.name().to_string(),
            expected: predicate.arity(),
            actual,
        });
    }
    Ok(())
}

fn check_type(
    predicate: &Predicate,
    position: usize,
    ty: super::predicate::ArgumentType,
    constant: &Constant,
) -> ModelResult<()> {
    if ty.accepts(constant) {
        Ok(())
    } else {
        Err(ModelError::ArgumentType {
            predicate: predicate.name().to_string(),
            position,
            expected: ty.to_string(),
            actual: constant.to_string(),
        })
    }
}

pub(crate) fn write_call<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    name: &str,
    args: &[T],
) -> fmt::Result {
    write!(f, "{name}(")?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{arg}")?;
    }
    write!(f, ")")
}
