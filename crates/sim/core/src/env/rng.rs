//! Seeded random sequence for a single trial.
//!
//! Every probabilistic decision in a trial (outcome rolls, proc chances)
//! draws from one [`SimRng`] owned by the simulation, so identical seeds
//! reproduce identical event traces.

/// PCG random number generator (Permuted Congruential Generator).
///
/// PCG-XSH-RR variant: 64-bit state, 32-bit output.
///
/// # Properties
///
/// - **Deterministic**: Same seed always produces same sequence
/// - **Fast**: Single multiply + xorshift + rotate
/// - **Small state**: Only 64 bits
///
/// # References
///
/// - PCG paper: <https://www.pcg-random.org/>
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimRng {
    state: u64,
    draws: u64,
}

impl SimRng {
    const MULTIPLIER: u64 = 6364136223846793005;
    const INCREMENT: u64 = 1442695040888963407;

    pub fn new(seed: u64) -> Self {
        let mut rng = Self { state: 0, draws: 0 };
        rng.reseed(seed);
        rng
    }

    /// Restarts the sequence from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        // Standard PCG seeding: step once, add the seed, step again.
        self.state = Self::pcg_step(0).wrapping_add(seed);
        self.state = Self::pcg_step(self.state);
        self.draws = 0;
    }

    /// Number of values drawn since the last reseed.
    pub fn draws(&self) -> u64 {
        self.draws
    }

    /// `state' = (state * multiplier + increment) mod 2^64`
    #[inline]
    fn pcg_step(state: u64) -> u64 {
        state
            .wrapping_mul(Self::MULTIPLIER)
            .wrapping_add(Self::INCREMENT)
    }

    /// XSH-RR output permutation.
    #[inline]
    fn pcg_output(state: u64) -> u32 {
        let xorshifted = (((state >> 18) ^ state) >> 27) as u32;
        let rot = (state >> 59) as u32;
        xorshifted.rotate_right(rot)
    }

    pub fn next_u32(&mut self) -> u32 {
        let old = self.state;
        self.state = Self::pcg_step(old);
        self.draws += 1;
        Self::pcg_output(old)
    }

    /// Uniform value in `[0, 1)` with 53 bits of precision.
    pub fn next_f64(&mut self) -> f64 {
        let hi = u64::from(self.next_u32()) << 21;
        let lo = u64::from(self.next_u32()) >> 11;
        ((hi | lo) as f64) * (1.0 / (1u64 << 53) as f64)
    }

    /// Returns true with probability `p` (clamped to `[0, 1]`).
    ///
    /// Always consumes exactly one value, even for `p <= 0` or `p >= 1`,
    /// so the sequence does not shift when a chance crosses a boundary.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p.clamp(0.0, 1.0)
    }
}

impl Default for SimRng {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Seed for trial `iteration` of a run started from `base_seed`.
///
/// Mixes the two inputs and applies a final avalanche so consecutive
/// iterations get unrelated sequences.
pub fn trial_seed(base_seed: u64, iteration: u64) -> u64 {
    let mut hash = base_seed;

    hash ^= iteration.wrapping_mul(0x9e3779b97f4a7c15);
    hash ^= (hash >> 29).wrapping_mul(0x517cc1b727220a95);

    hash ^= hash >> 33;
    hash = hash.wrapping_mul(0xff51afd7ed558ccd);
    hash ^= hash >> 33;

    hash
}
