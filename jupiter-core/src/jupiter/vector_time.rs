/*
    vector_time.rs - Bilateral vector timestamp for a Jupiter pair

    Each end of a pair counts:
    - local: operations it has generated
    - remote: operations it has received from the other end

    A timestamp travelling on a request is expressed from the sender's point
    of view. `mirrored` flips it into the receiver's frame before comparing.
*/

use serde::{Deserialize, Serialize};
use std::fmt;

/// Causal relationship between two timestamps in the same frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CausalOrder {
    Equal,
    /// Every component is <= the other's and at least one is smaller
    Before,
    After,
    /// Neither dominates
    Concurrent,
}

/// Vector timestamp for a (local, remote) pair
///
/// Serialized as a two element array `[local, remote]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[u64; 2]", into = "[u64; 2]")]
pub struct VectorTime {
    local: u64,
    remote: u64,
}

impl VectorTime {
    pub fn new(local: u64, remote: u64) -> Self {
        VectorTime { local, remote }
    }

    /// Number of operations generated by this end
    pub fn local(&self) -> u64 {
        self.local
    }

    /// Number of operations received from the other end
    pub fn remote(&self) -> u64 {
        self.remote
    }

    /// Advance the local component by one
    pub fn increment_local(&self) -> Self {
        VectorTime { local: self.local + 1, remote: self.remote }
    }

    /// Advance the remote component by one
    pub fn increment_remote(&self) -> Self {
        VectorTime { local: self.local, remote: self.remote + 1 }
    }

    /// The same timestamp seen from the other end of the pair
    pub fn mirrored(&self) -> Self {
        VectorTime { local: self.remote, remote: self.local }
    }

    /// Component list in wire order
    pub fn components(&self) -> [u64; 2] {
        [self.local, self.remote]
    }

    /// Component-wise comparison
    pub fn compare(&self, other: &VectorTime) -> CausalOrder {
        let local_le = self.local <= other.local;
        let remote_le = self.remote <= other.remote;
        let local_ge = self.local >= other.local;
        let remote_ge = self.remote >= other.remote;

        match (local_le && remote_le, local_ge && remote_ge) {
            (true, true) => CausalOrder::Equal,
            (true, false) => CausalOrder::Before,
            (false, true) => CausalOrder::After,
            (false, false) => CausalOrder::Concurrent,
        }
    }

    /// Check if this timestamp causally precedes another
    pub fn happened_before(&self, other: &VectorTime) -> bool {
        self.compare(other) == CausalOrder::Before
    }

    pub fn is_concurrent(&self, other: &VectorTime) -> bool {
        self.compare(other) == CausalOrder::Concurrent
    }
}

impl From<[u64; 2]> for VectorTime {
    fn from(components: [u64; 2]) -> Self {
        VectorTime::new(components[0], components[1])
    }
}

impl From<VectorTime> for [u64; 2] {
    fn from(time: VectorTime) -> Self {
        time.components()
    }
}

impl fmt::Display for VectorTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.local, self.remote)
    }
}
