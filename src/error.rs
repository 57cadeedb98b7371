//! Rich diagnostic error types for the relground engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so callers know exactly
//! which stage of grounding failed and why.

use miette::Diagnostic;
use thiserror::Error;

use crate::ground::GroundAtom;
use crate::partition::PartitionError;

/// Top-level error type for the relground engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain through to the caller.
#[derive(Debug, Error, Diagnostic)]
pub enum RelgroundError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Partition(#[from] PartitionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Atom(#[from] AtomError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Grounding(#[from] GroundingError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Activation(#[from] ActivationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

/// Convenience result alias for top-level operations.
pub type RelgroundResult<T> = std::result::Result<T, RelgroundError>;

// ---------------------------------------------------------------------------
// Model errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ModelError {
    #[error("predicate {predicate} takes {expected} arguments, got {actual}")]
    #[diagnostic(
        code(relground::model::arity),
        help("Every atom must supply exactly one term per argument slot of its predicate.")
    )]
    ArityMismatch {
        predicate: String,
        expected: usize,
        actual: usize,
    },

    #[error("argument {position} of {predicate} expects {expected}, got constant {actual}")]
    #[diagnostic(
        code(relground::model::argument_type),
        help("Constants must match the declared argument type of the predicate slot.")
    )]
    ArgumentType {
        predicate: String,
        position: usize,
        expected: String,
        actual: String,
    },

    #[error("{connective} requires at least one sub-formula")]
    #[diagnostic(
        code(relground::model::empty_connective),
        help("Build conjunctions and disjunctions from a non-empty list of formulas.")
    )]
    EmptyConnective { connective: &'static str },

    #[error("rule '{rule}' is not a clause: its negation has {conjunctions} DNF conjunctions")]
    #[diagnostic(
        code(relground::model::not_a_clause),
        help(
            "Logical rules must be a disjunction of literals, e.g. an implication \
             whose body is a conjunction and whose head is a disjunction."
        )
    )]
    NotAClause { rule: String, conjunctions: usize },

    #[error("rule '{rule}' has no positive body literal to query")]
    #[diagnostic(
        code(relground::model::empty_query),
        help("At least one atom must appear in the rule body so groundings can be enumerated.")
    )]
    EmptyQuery { rule: String },

    #[error("variable {variable} in rule '{rule}' does not appear in the query formula")]
    #[diagnostic(
        code(relground::model::unsafe_variable),
        help(
            "Every variable must be bound by a positive, standard-predicate body atom. \
             Variables that only occur negated or in the head cannot be enumerated."
        )
    )]
    UnsafeVariable { rule: String, variable: String },

    #[error("arithmetic expression has no terms")]
    #[diagnostic(
        code(relground::model::empty_expression),
        help("An arithmetic rule needs at least one coefficient/atom pair.")
    )]
    EmptyExpression,

    #[error("summation variable +{variable} is used but never appears in a summation atom")]
    #[diagnostic(
        code(relground::model::unused_summation),
        help("Cardinality coefficients and select formulas may only refer to summation variables of the expression.")
    )]
    UnknownSummationVariable { variable: String },

    #[error("summation variable +{variable} has no select formula")]
    #[diagnostic(
        code(relground::model::missing_select),
        help("Provide a select formula that defines the set each summation variable ranges over.")
    )]
    MissingSelect { variable: String },

    #[error("variable {variable} is used both as a summation variable and as an ordinary variable")]
    #[diagnostic(
        code(relground::model::summation_clash),
        help("Rename one of the occurrences; summation variables are bound by their select formula only.")
    )]
    SummationClash { variable: String },

    #[error("{what} must be finite, got {value}")]
    #[diagnostic(
        code(relground::model::non_finite),
        help("Weights and constants must be finite floating-point numbers.")
    )]
    NonFinite { what: &'static str, value: f64 },
}

/// Result type for model construction.
pub type ModelResult<T> = std::result::Result<T, ModelError>;

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("atom {atom} already stored in partition {existing}")]
    #[diagnostic(
        code(relground::store::duplicate_atom),
        help("An atom belongs to exactly one partition; move it instead of inserting it twice.")
    )]
    DuplicateAtom { atom: String, existing: u32 },

    #[error("partition {partition} is not part of the store layout")]
    #[diagnostic(
        code(relground::store::unknown_partition),
        help("Only the read, write and lazy partitions given at construction can be written.")
    )]
    UnknownPartition { partition: u32 },

    #[error("value {value} for atom {atom} is outside [0, 1]")]
    #[diagnostic(
        code(relground::store::value_range),
        help("Soft-truth values must lie in the closed unit interval.")
    )]
    ValueOutOfRange { atom: String, value: f64 },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(relground::store::serde),
        help("Failed to serialize ground rules for export.")
    )]
    Serialization { message: String },

    #[error("cannot persist atom {atom} of functional predicate")]
    #[diagnostic(
        code(relground::store::functional),
        help("Functional predicates are computed on demand and never stored.")
    )]
    FunctionalAtom { atom: String },
}

/// Result type for backing store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Query errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum QueryError {
    #[error("variable {variable} is unbound when evaluating {literal}")]
    #[diagnostic(
        code(relground::query::unbound),
        help(
            "Negated literals and functional predicates are filters: every variable they \
             mention must be bound by a positive standard atom of the same query."
        )
    )]
    UnboundVariable { variable: String, literal: String },

    #[error("projected variable {variable} does not occur in the query formula")]
    #[diagnostic(
        code(relground::query::unknown_projection),
        help("Project only variables that appear in the formula or in the partial grounding.")
    )]
    UnknownProjection { variable: String },

    #[error("lazy target index {index} out of range for a query of {len} literals")]
    #[diagnostic(
        code(relground::query::lazy_target),
        help("The lazy target must point at a positive literal of the query.")
    )]
    LazyTarget { index: usize, len: usize },

    #[error("union of zero queries")]
    #[diagnostic(
        code(relground::query::empty_union),
        help("Pass at least one query to execute_union.")
    )]
    EmptyUnion,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

/// Result type for query execution.
pub type QueryResult<T> = std::result::Result<T, QueryError>;

// ---------------------------------------------------------------------------
// Atom manager errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum AtomError {
    #[error("unknown ground atom {atom}")]
    #[diagnostic(
        code(relground::atom::unknown),
        help(
            "The atom is not stored in any visible partition. Insert it into the store \
             first, or ground with a lazy atom manager to defer it."
        )
    )]
    UnknownGroundAtom { atom: Box<GroundAtom> },

    #[error(transparent)]
    #[diagnostic(transparent)]
    InvalidKey(#[from] ModelError),
}

/// Result type for atom manager lookups.
pub type AtomResult<T> = std::result::Result<T, AtomError>;

// ---------------------------------------------------------------------------
// Grounding errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GroundingError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Atom(#[from] AtomError),

    #[error("variable {variable} has no binding in the result row")]
    #[diagnostic(
        code(relground::grounding::missing_binding),
        help("The executor must project every free variable of the rule.")
    )]
    MissingBinding { variable: String },

    #[error("unsupported operation on arithmetic rule '{rule}': {operation}")]
    #[diagnostic(
        code(relground::grounding::unsupported),
        help(
            "Arithmetic rules support full grounding only. They cannot register for atom \
             events or be reground incrementally from a precomputed result set."
        )
    )]
    Unsupported { rule: String, operation: &'static str },
}

/// Result type for grounding passes.
pub type GroundingResult<T> = std::result::Result<T, GroundingError>;

// ---------------------------------------------------------------------------
// Activation errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ActivationError {
    #[error("activation threshold must be in (0, 1], got {value}")]
    #[diagnostic(
        code(relground::activation::threshold),
        help("Pick a threshold such as 0.01; zero would activate every lazy atom.")
    )]
    InvalidThreshold { value: f64 },

    #[error("lazy regrounding of rule '{rule}' requested with no lazy targets")]
    #[diagnostic(
        code(relground::activation::no_targets),
        help("This is an internal invariant violation; please file a bug report.")
    )]
    NoLazyTargets { rule: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Grounding(#[from] GroundingError),
}

/// Result type for lazy atom activation.
pub type ActivationResult<T> = std::result::Result<T, ActivationError>;

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    #[diagnostic(
        code(relground::config::read),
        help("Check that the file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write config file {path}")]
    #[diagnostic(
        code(relground::config::write),
        help("Check directory permissions and available disk space.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {message}")]
    #[diagnostic(
        code(relground::config::parse),
        help("The file must be valid TOML matching the GroundingConfig layout.")
    )]
    Parse { path: String, message: String },

    #[error("invalid value for {key}: {message}")]
    #[diagnostic(
        code(relground::config::value),
        help("See GroundingConfig for the accepted ranges.")
    )]
    InvalidValue { key: &'static str, message: String },
}

/// Result type for configuration loading.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
