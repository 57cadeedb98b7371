//! Partitions: named, ordered buckets of ground atoms in the backing store.
//!
//! Partition ids are allocated by a [`PartitionRegistry`] and handed to the
//! store and atom managers explicitly through a [`PartitionLayout`], so
//! several stores can coexist in one process without sharing a global
//! "lazy partition" constant.

use std::collections::HashMap;
use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

/// Errors from partition operations.
#[derive(Debug, Error, Diagnostic)]
pub enum PartitionError {
    #[error("partition \"{name}\" not found")]
    #[diagnostic(
        code(relground::partition::not_found),
        help("Available partitions can be listed with the partition registry.")
    )]
    NotFound { name: String },

    #[error("partition \"{name}\" already exists")]
    #[diagnostic(
        code(relground::partition::already_exists),
        help("Use a different name or look up the existing partition.")
    )]
    AlreadyExists { name: String },

    #[error("partition {id} has more than one role in the layout")]
    #[diagnostic(
        code(relground::partition::overlap),
        help("Read, write and lazy partitions must be pairwise distinct.")
    )]
    Overlap { id: PartitionId },
}

pub type PartitionResult<T> = std::result::Result<T, PartitionError>;

/// Opaque partition identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionId(u32);

impl PartitionId {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "partition:{}", self.0)
    }
}

/// A named partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub id: PartitionId,
    pub name: String,
}

/// Allocates partition ids by name.
#[derive(Debug, Default)]
pub struct PartitionRegistry {
    partitions: HashMap<String, Partition>,
    next_id: u32,
}

impl PartitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new partition name and allocate its id.
    pub fn register(&mut self, name: &str) -> PartitionResult<PartitionId> {
        if self.partitions.contains_key(name) {
            return Err(PartitionError::AlreadyExists {
                name: name.to_string(),
            });
        }
        Ok(self.allocate(name))
    }

    /// Look up a partition by name.
    pub fn get(&self, name: &str) -> PartitionResult<&Partition> {
        self.partitions
            .get(name)
            .ok_or_else(|| PartitionError::NotFound {
                name: name.to_string(),
            })
    }

    /// Existing id for `name`, registering it if needed.
    pub fn get_or_register(&mut self, name: &str) -> PartitionId {
        match self.partitions.get(name) {
            Some(p) => p.id,
            None => self.allocate(name),
        }
    }

    fn allocate(&mut self, name: &str) -> PartitionId {
        let id = PartitionId(self.next_id);
        self.next_id += 1;
        self.partitions.insert(
            name.to_string(),
            Partition {
                id,
                name: name.to_string(),
            },
        );
        id
    }

    /// All registered partition names.
    pub fn list(&self) -> Vec<&str> {
        self.partitions.keys().map(|s| s.as_str()).collect()
    }
}

/// Roles of the partitions a store and its atom managers work with.
///
/// Read partitions hold observed evidence. The write partition holds target
/// atoms. The lazy partition stages activated atoms until their rules have
/// been reground.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionLayout {
    read: Vec<PartitionId>,
    write: PartitionId,
    lazy: PartitionId,
}

impl PartitionLayout {
    pub fn new(read: Vec<PartitionId>, write: PartitionId, lazy: PartitionId) -> PartitionResult<Self> {
        let mut seen: Vec<PartitionId> = Vec::with_capacity(read.len() + 2);
        for id in read.iter().copied().chain([write, lazy]) {
            if seen.contains(&id) {
                return Err(PartitionError::Overlap { id });
            }
            seen.push(id);
        }
        Ok(Self { read, write, lazy })
    }

    /// Register `read`, `write` and `lazy` in `registry` and build a layout.
    pub fn named(
        registry: &mut PartitionRegistry,
        read: &[&str],
        write: &str,
        lazy: &str,
    ) -> PartitionResult<Self> {
        let read = read.iter().map(|n| registry.get_or_register(n)).collect();
        let write = registry.get_or_register(write);
        let lazy = registry.get_or_register(lazy);
        Self::new(read, write, lazy)
    }

    pub fn read(&self) -> &[PartitionId] {
        &self.read
    }

    pub fn write(&self) -> PartitionId {
        self.write
    }

    pub fn lazy(&self) -> PartitionId {
        self.lazy
    }

    pub fn is_read(&self, id: PartitionId) -> bool {
        self.read.contains(&id)
    }

    /// Partitions visible to queries: read, write and lazy.
    pub fn visible(&self) -> impl Iterator<Item = PartitionId> + '_ {
        self.read.iter().copied().chain([self.write, self.lazy])
    }

    pub fn contains(&self, id: PartitionId) -> bool {
        self.is_read(id) || id == self.write || id == self.lazy
    }
}
