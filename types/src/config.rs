//! Per-round lattice configuration.

use crate::keys::NodeId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for one round (configuration epoch) of the lattice.
///
/// Supplied by governance ahead of the round boundary; every derived
/// threshold below is a pure function of these fields.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LatticeConfig {
    /// Number of parallel chains, one per committee member.
    pub num_chains: u32,

    /// Look-back depth for early delivery (0 ≤ k < num_chains).
    pub k: u32,

    /// Threshold ratio φ used to derive the delivery threshold.
    pub phi_ratio: f32,

    /// Minimum spacing between a block and the acked blocks it extends.
    pub min_block_interval: Duration,

    /// Maximum spacing between a block and the acked blocks it extends.
    pub max_block_interval: Duration,

    /// Common reference string for the round's leader election; opaque here.
    pub crs: [u8; 32],

    /// The round's notary committee.
    pub notary_set: Vec<NodeId>,
}

impl LatticeConfig {
    /// Byzantine tolerance: `f = (N - 1) / 3`.
    pub fn f(&self) -> u32 {
        self.num_chains.saturating_sub(1) / 3
    }

    /// Chains that must transitively ack a block before it is strongly
    /// acked: `2f + 1`.
    pub fn strong_ack_threshold(&self) -> usize {
        (2 * self.f() + 1) as usize
    }

    /// The grade threshold `φ = ⌊(N − 1) · phi_ratio⌋`.
    pub fn phi(&self) -> usize {
        ((self.num_chains.saturating_sub(1) as f32) * self.phi_ratio) as usize
    }

    /// The delivery ack-count threshold `T = φ + 1`.
    pub fn delivery_threshold(&self) -> usize {
        self.phi() + 1
    }

    /// Structural validity of the configuration itself.
    pub fn is_valid(&self) -> bool {
        self.num_chains >= 1
            && self.k < self.num_chains
            && self.phi_ratio > 0.0
            && self.phi_ratio <= 1.0
            && self.min_block_interval <= self.max_block_interval
    }
}

impl Default for LatticeConfig {
    fn default() -> Self {
        Self {
            num_chains: 4,
            k: 1,
            phi_ratio: 0.667,
            min_block_interval: Duration::from_millis(1),
            max_block_interval: Duration::from_secs(30),
            crs: [0u8; 32],
            notary_set: Vec::new(),
        }
    }
}
