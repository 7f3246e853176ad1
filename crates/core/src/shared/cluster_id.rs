use std::fmt;

use serde::{Deserialize, Serialize};

/// Label assigned to one observation by a clustering pass.
///
/// Ids are discovery-order positions within a single pass, not persistent
/// identities: the same integer may denote different people after the next
/// pass. Pair with [`CorpusGeneration`] to tell passes apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(i32);

impl ClusterId {
    /// Points not reachable from any dense region.
    pub const NOISE: ClusterId = ClusterId(-1);

    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    /// The `index`-th cluster discovered in a pass.
    pub fn from_index(index: usize) -> Self {
        Self(i32::try_from(index).unwrap_or(i32::MAX))
    }

    pub fn value(self) -> i32 {
        self.0
    }

    pub fn is_noise(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for ClusterId {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

/// Counter bumped every time the corpus is rebuilt from scratch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorpusGeneration(u64);

impl CorpusGeneration {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for CorpusGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
