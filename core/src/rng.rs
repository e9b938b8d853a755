//! Deterministic random number generation.
//!
//! RULE: Nothing in the engine may call any platform RNG.
//! All randomness flows through StageRng instances derived
//! from the single master seed in EngineConfig.
//!
//! Each pipeline stage gets its own RNG stream, seeded deterministically
//! from (master_seed XOR stage_index). Within a stage, independent fits
//! (one per candidate k) fork their own sub-streams, so
//! the result for a given k never depends on which other k were tried.

use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

const GOLDEN_GAMMA: u64 = 0x9e37_79b9_7f4a_7c15;

/// A named, deterministic RNG for a single pipeline stage.
pub struct StageRng {
    pub name: &'static str,
    seed:  u64,
    inner: Pcg64Mcg,
}

impl StageRng {
    /// Create a stage RNG from the master seed and a stable
    /// stage index. The index must never change once assigned.
    pub fn new(master_seed: u64, stage_index: u64) -> Self {
        let derived_seed = master_seed ^ stage_index.wrapping_mul(GOLDEN_GAMMA);
        Self {
            name: "unnamed",
            seed: derived_seed,
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Derive an independent child stream. Same parent seed and
    /// same `index` always yield the same child.
    pub fn fork(&self, index: u64) -> StageRng {
        let child_seed = self
            .seed
            .rotate_left(17)
            ^ index.wrapping_add(1).wrapping_mul(GOLDEN_GAMMA);
        StageRng {
            name: self.name,
            seed: child_seed,
            inner: Pcg64Mcg::seed_from_u64(child_seed),
        }
    }

    /// A generator positioned where this stream currently is, for
    /// libraries that take an owned `Rng`.
    pub fn generator(&self) -> Pcg64Mcg {
        self.inner.clone()
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        use rand::RngCore;
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Roll a usize in [0, n).
    pub fn next_index(&mut self, n: usize) -> usize {
        use rand::RngCore;
        assert!(n > 0, "n must be > 0");
        (self.inner.next_u64() % n as u64) as usize
    }

    /// Roll a float in [-half_width, half_width).
    pub fn symmetric(&mut self, half_width: f64) -> f64 {
        (self.next_f64() * 2.0 - 1.0) * half_width
    }
}

/// All stage RNGs for one engine invocation, indexed by stable slot.
pub struct RngBank {
    master_seed: u64,
}

impl RngBank {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn for_stage(&self, slot: StageSlot) -> StageRng {
        StageRng::new(self.master_seed, slot as u64).with_name(slot.name())
    }
}

/// Stable stage slot assignments.
/// NEVER reorder or remove entries, only append.
/// Reordering changes every stage's seed and breaks audit replays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum StageSlot {
    FactorFit      = 0,
    ClusterSearch  = 1,
    FinalPartition = 2,
}

impl StageSlot {
    pub fn name(&self) -> &'static str {
        match self {
            Self::FactorFit      => "factor_fit",
            Self::ClusterSearch  => "cluster_search",
            Self::FinalPartition => "final_partition",
        }
    }
}
