//! Process and resource identifiers
//!
//! Both are 1-based and display as `P<n>` / `R<n>`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a simulated process
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(u32);

/// Identifier of a single-instance resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(u32);

impl ProcessId {
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Ids `P1..=Pcount`
    pub fn range(count: usize) -> impl Iterator<Item = Self> {
        (1..=count).map(|n| Self(u32::try_from(n).unwrap_or(u32::MAX)))
    }
}

impl ResourceId {
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Position of this resource in a dense, 0-based arena
    #[must_use]
    pub fn index(self) -> Option<usize> {
        usize::try_from(self.0).ok()?.checked_sub(1)
    }

    /// Inverse of [`ResourceId::index`]
    #[must_use]
    pub fn from_index(index: usize) -> Self {
        Self(u32::try_from(index + 1).unwrap_or(u32::MAX))
    }

    /// Ids `R1..=Rcount`
    pub fn range(count: usize) -> impl Iterator<Item = Self> {
        (0..count).map(Self::from_index)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}
