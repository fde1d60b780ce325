//! Beacon orchestration: contributors, commitments, the escrow boundary and
//! the round state machine.

use core::fmt;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

/// Commit-then-reveal digests.
pub mod commitment;
/// Participants and their private entropy.
pub mod contributor;
/// Escrow ledger boundary.
pub mod ledger;
/// Round state machine.
pub mod orchestrator;

pub use commitment::Commitment;
pub use contributor::{EntropyContributor, Participant};
pub use ledger::{EscrowLedger, MemoryLedger};
pub use orchestrator::{BeaconOrchestrator, BeaconOutput, PhaseTimings, RoundSettings, RoundState};

/// Width of contributions and of the published randomness.
pub const ENTROPY_BITS: u64 = 256;

/// Byte width of contributions and of the published randomness.
pub const ENTROPY_BYTES: usize = 32;

/// Stable identifier of a participant within a round.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ParticipantId(pub u32);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Policy for a participant that commits but fails to reveal a valid
/// opening.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DropoutPolicy {
    /// Fail the whole round on the first missing or invalid reveal.
    #[default]
    Abort,
    /// Drop the participant, slash it on the ledger, and continue while at
    /// least `min_participants` remain.
    Exclude {
        /// Smallest set of revealed contributions accepted for a round.
        min_participants: usize,
    },
}

/// Final beacon output, a value in `[0, 2^256)`.
#[derive(Clone, PartialEq, Eq)]
pub struct Randomness(BigUint);

impl Randomness {
    /// Reduces `value` modulo `2^256`.
    pub fn new(value: BigUint) -> Self {
        Self(reduce(value))
    }

    /// Returns the value as an integer.
    pub fn value(&self) -> &BigUint {
        &self.0
    }

    /// Returns the value as 32 big-endian bytes.
    pub fn to_bytes(&self) -> [u8; ENTROPY_BYTES] {
        to_fixed_bytes(&self.0)
    }

    /// Returns the value as 64 lowercase hex characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

impl fmt::Debug for Randomness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Randomness({})", self.to_hex())
    }
}

impl fmt::Display for Randomness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Sums contributions modulo `2^256`.
///
/// Addition is commutative, so the result does not depend on order. Rounds
/// still fix the participant order so independent verifiers replay the same
/// transcript.
pub fn combine<'a, I>(contributions: I) -> BigUint
where
    I: IntoIterator<Item = &'a BigUint>,
{
    let sum = contributions
        .into_iter()
        .fold(BigUint::default(), |acc, c| acc + c);
    reduce(sum)
}

/// Derives the published value `(combined + y) mod 2^256`.
pub fn finalize(combined: &BigUint, delay_output: &BigUint) -> Randomness {
    Randomness::new(combined + delay_output)
}

fn reduce(value: BigUint) -> BigUint {
    if value.bits() <= ENTROPY_BITS {
        return value;
    }
    let mask = (BigUint::from(1u8) << ENTROPY_BITS) - 1u32;
    value & mask
}

pub(crate) fn to_fixed_bytes(value: &BigUint) -> [u8; ENTROPY_BYTES] {
    let reduced = reduce(value.clone());
    let bytes = reduced.to_bytes_be();
    let mut out = [0u8; ENTROPY_BYTES];
    out[ENTROPY_BYTES - bytes.len()..].copy_from_slice(&bytes);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn max() -> BigUint {
        (BigUint::from(1u8) << ENTROPY_BITS) - 1u32
    }

    #[test]
    fn combine_small_values() {
        let values = [5u32, 12, 9].map(BigUint::from);
        assert_eq!(combine(&values), BigUint::from(26u8));
    }

    #[test]
    fn combine_wraps_at_256_bits() {
        let values = [max(), BigUint::from(3u8)];
        assert_eq!(combine(&values), BigUint::from(2u8));
    }

    #[test]
    fn combine_empty_is_zero() {
        assert_eq!(combine(std::iter::empty()), BigUint::default());
    }

    #[test]
    fn finalize_wraps() {
        let out = finalize(&max(), &BigUint::from(1u8));
        assert_eq!(out.value(), &BigUint::default());
        assert_eq!(out.to_bytes(), [0u8; 32]);
    }

    #[test]
    fn randomness_hex_is_padded() {
        let out = finalize(&BigUint::from(26u8), &BigUint::from(1u8));
        let hex = out.to_hex();
        assert_eq!(hex.len(), 64);
        assert!(hex.ends_with("1b"));
    }

    #[test]
    fn participant_id_display() {
        assert_eq!(ParticipantId(3).to_string(), "#3");
    }
}
