use num_bigint::BigUint;
use sha2::{Digest, Sha256};

use super::{to_fixed_bytes, ParticipantId, ENTROPY_BITS};
use crate::{Error, Result};

/// Domain separation tag for contribution commitments.
const COMMITMENT_DST: &[u8] = b"vdf-beacon/commitment/v1";

/// Digest a participant publishes before revealing its contribution.
///
/// A commitment received from a participant starts as
/// [`Commitment::Unverified`]. Nothing about it is trusted until
/// [`Commitment::open`] checks it against the revealed value and returns the
/// [`Commitment::Verified`] form. Callers must match on the variant; there is
/// no accessor that hides which state a digest is in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Commitment {
    /// Delivered by a participant and not yet checked.
    Unverified([u8; 32]),
    /// Opened by a matching reveal.
    Verified([u8; 32]),
}

impl Commitment {
    /// Computes the digest binding `participant` to `value`.
    pub fn digest(participant: ParticipantId, value: &BigUint) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(COMMITMENT_DST);
        hasher.update(participant.0.to_be_bytes());
        hasher.update(to_fixed_bytes(value));
        hasher.finalize().into()
    }

    /// Commits `participant` to `value`, as the participant would publish
    /// it.
    pub fn commit(participant: ParticipantId, value: &BigUint) -> Self {
        Commitment::Unverified(Self::digest(participant, value))
    }

    /// Checks a revealed value against this commitment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommitmentMismatch`] if the value is wider than 256
    /// bits or does not hash to the committed digest.
    pub fn open(&self, participant: ParticipantId, value: &BigUint) -> Result<Commitment> {
        let expected = self.bytes();
        // the digest covers only the low 256 bits
        if value.bits() > ENTROPY_BITS || Self::digest(participant, value) != *expected {
            return Err(Error::CommitmentMismatch(participant));
        }
        Ok(Commitment::Verified(*expected))
    }

    /// Returns true once the commitment has been opened.
    pub fn is_verified(&self) -> bool {
        matches!(self, Commitment::Verified(_))
    }

    /// Returns the committed digest as lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes())
    }

    fn bytes(&self) -> &[u8; 32] {
        match self {
            Commitment::Unverified(d) | Commitment::Verified(d) => d,
        }
    }
}
