use num_bigint::BigUint;
use rand_core::CryptoRngCore;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{Commitment, ParticipantId, ENTROPY_BYTES};
use crate::{Error, Result};

/// A round participant as seen by the orchestrator.
///
/// `commit` is called on every participant before `reveal` is called on any
/// of them. Implementations backed by a transport return
/// [`Error::ParticipantDropped`] from `reveal` when the opening never
/// arrives.
pub trait Participant: Send {
    /// Identifier, unique within a round.
    fn id(&self) -> ParticipantId;

    /// Draws this round's contribution and returns the commitment to it.
    fn commit(&mut self) -> Result<Commitment>;

    /// Opens the commitment by returning the contribution.
    fn reveal(&self) -> Result<BigUint>;
}

/// Secret contribution, wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
struct Contribution([u8; ENTROPY_BYTES]);

/// Local participant that draws its entropy from its own RNG.
///
/// # Security
///
/// - The contribution stays private until [`EntropyContributor::reveal`]
/// - Exactly one contribution per round; call [`EntropyContributor::reset`]
///   before the next round
pub struct EntropyContributor<R> {
    id: ParticipantId,
    rng: R,
    contribution: Option<Contribution>,
}

impl<R: CryptoRngCore> EntropyContributor<R> {
    /// Creates a contributor that has not contributed yet.
    pub fn new(id: ParticipantId, rng: R) -> Self {
        Self {
            id,
            rng,
            contribution: None,
        }
    }

    /// Returns the participant id.
    pub fn id(&self) -> ParticipantId {
        self.id
    }

    /// Draws a fresh uniformly random 256-bit contribution.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyContributed`] on a second call in the same
    /// round.
    pub fn contribute(&mut self) -> Result<BigUint> {
        if self.contribution.is_some() {
            return Err(Error::AlreadyContributed(self.id));
        }

        let mut bytes = [0u8; ENTROPY_BYTES];
        self.rng.fill_bytes(&mut bytes);
        let value = BigUint::from_bytes_be(&bytes);
        self.contribution = Some(Contribution(bytes));
        bytes.zeroize();

        debug!(participant = %self.id, "contribution drawn");
        Ok(value)
    }

    /// Returns the contribution drawn by [`EntropyContributor::contribute`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotYetContributed`] before `contribute`.
    pub fn reveal(&self) -> Result<BigUint> {
        self.contribution
            .as_ref()
            .map(|c| BigUint::from_bytes_be(&c.0))
            .ok_or(Error::NotYetContributed(self.id))
    }

    /// Returns true once this round's contribution exists.
    pub fn has_contributed(&self) -> bool {
        self.contribution.is_some()
    }

    /// Discards the current contribution so the next round can draw anew.
    pub fn reset(&mut self) {
        self.contribution = None;
    }
}

impl<R: CryptoRngCore + Send> Participant for EntropyContributor<R> {
    fn id(&self) -> ParticipantId {
        self.id
    }

    fn commit(&mut self) -> Result<Commitment> {
        let value = self.contribute()?;
        Ok(Commitment::commit(self.id, &value))
    }

    fn reveal(&self) -> Result<BigUint> {
        EntropyContributor::reveal(self)
    }
}
