//! Ground atoms and ground rules.
//!
//! A [`GroundAtom`] is a cheap, shared handle: clones point at the same
//! underlying instance, so a value written through one handle is seen through
//! every other. Atom managers are the only code that creates them.

mod rule;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::model::{AtomKey, Constant, Predicate};
use crate::partition::PartitionId;

pub use rule::{
    GroundArithmeticRule, GroundLogicalRule, GroundRule, GroundRuleStore, Inequality,
    MemGroundRuleStore,
};

/// Where a ground atom currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomState {
    /// Stored in a read partition; fixed evidence.
    Observed(PartitionId),
    /// Stored in the write or lazy-staging partition; a target of inference.
    Unobserved(PartitionId),
    /// Seen during grounding but not stored in any partition yet.
    Lazy,
    /// Value computed by a functional predicate.
    Computed,
}

impl AtomState {
    pub fn partition(self) -> Option<PartitionId> {
        match self {
            AtomState::Observed(p) | AtomState::Unobserved(p) => Some(p),
            AtomState::Lazy | AtomState::Computed => None,
        }
    }
}

impl fmt::Display for AtomState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtomState::Observed(p) => write!(f, "observed({p})"),
            AtomState::Unobserved(p) => write!(f, "unobserved({p})"),
            AtomState::Lazy => write!(f, "lazy"),
            AtomState::Computed => write!(f, "computed"),
        }
    }
}

struct GroundAtomInner {
    key: AtomKey,
    // f64 bits, so values can be shared without a lock.
    value: AtomicU64,
    state: RwLock<AtomState>,
}

/// Canonical, manager-owned instance of a ground atom.
///
/// Equality and hashing follow the atom's identity (predicate and
/// arguments), never its value.
#[derive(Clone)]
pub struct GroundAtom(Arc<GroundAtomInner>);

impl GroundAtom {
    pub(crate) fn new(key: AtomKey, value: f64, state: AtomState) -> Self {
        Self(Arc::new(GroundAtomInner {
            key,
            value: AtomicU64::new(value.to_bits()),
            state: RwLock::new(state),
        }))
    }

    pub fn key(&self) -> &AtomKey {
        &self.0.key
    }

    pub fn predicate(&self) -> &Predicate {
        self.0.key.predicate()
    }

    pub fn args(&self) -> &[Constant] {
        self.0.key.args()
    }

    /// Current soft-truth value in `[0, 1]`.
    pub fn value(&self) -> f64 {
        f64::from_bits(self.0.value.load(Ordering::Relaxed))
    }

    /// Set the soft-truth value, clamped into `[0, 1]`.
    pub fn set_value(&self, value: f64) {
        debug_assert!(!value.is_nan(), "ground atom value must not be NaN");
        let clamped = value.clamp(0.0, 1.0);
        self.0.value.store(clamped.to_bits(), Ordering::Relaxed);
    }

    pub fn state(&self) -> AtomState {
        *self.0.state.read().expect("atom state lock poisoned")
    }

    pub(crate) fn set_state(&self, state: AtomState) {
        *self.0.state.write().expect("atom state lock poisoned") = state;
    }

    pub fn is_lazy(&self) -> bool {
        self.state() == AtomState::Lazy
    }

    /// Whether two handles refer to the very same instance.
    pub fn same_instance(&self, other: &GroundAtom) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for GroundAtom {
    fn eq(&self, other: &Self) -> bool {
        self.0.key == other.0.key
    }
}

impl Eq for GroundAtom {}

impl Hash for GroundAtom {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.key.hash(state);
    }
}

impl fmt::Debug for GroundAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroundAtom")
            .field("atom", &self.0.key.to_string())
            .field("value", &self.value())
            .field("state", &self.state())
            .finish()
    }
}

impl fmt::Display for GroundAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.key)
    }
}
