//! Environment collaborators consumed by the engine.
//!
//! The roster answers target and group-membership questions; the RNG is the
//! single seeded random sequence for a trial.
mod roster;
mod rng;

pub use rng::{SimRng, trial_seed};
pub use roster::{Roster, UnitKind};
