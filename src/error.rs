//! Error types for the beacon.

use crate::beacon::ParticipantId;

/// Main error types for the library.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A delay parameter, modulus or bit length is malformed.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The value shares a factor with the modulus and has no inverse.
    #[error("Value is not invertible modulo the given modulus")]
    NotInvertible,

    /// The participant already committed to a value this round.
    #[error("Participant {0} already contributed this round")]
    AlreadyContributed(ParticipantId),

    /// The participant was asked to reveal before committing.
    #[error("Participant {0} has not contributed yet")]
    NotYetContributed(ParticipantId),

    /// A round step was invoked from the wrong state.
    #[error("Protocol order violation: {0}")]
    ProtocolOrderViolation(String),

    /// The revealed value does not open the participant's commitment.
    #[error("Participant {0} revealed a value that does not match its commitment")]
    CommitmentMismatch(ParticipantId),

    /// The participant committed but never revealed.
    #[error("Participant {0} did not reveal its contribution")]
    ParticipantDropped(ParticipantId),

    /// Too many participants were excluded for the round to continue.
    #[error("Only {remaining} participants remain, at least {required} are required")]
    QuorumLost {
        /// Participants still in the round.
        remaining: usize,
        /// Minimum configured by the dropout policy.
        required: usize,
    },

    /// The delay output failed trapdoor verification.
    #[error("Delay function verification failed in round {round}")]
    VerificationFailed {
        /// Round in which verification failed.
        round: u64,
    },

    /// The operating-system entropy source failed.
    #[error("Entropy source unavailable: {0}")]
    EntropyUnavailable(String),

    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns true for errors caused by calling contribute, reveal or a
    /// round step out of sequence.
    pub fn is_order_violation(&self) -> bool {
        matches!(
            self,
            Error::AlreadyContributed(_)
                | Error::NotYetContributed(_)
                | Error::ProtocolOrderViolation(_)
        )
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(err.to_string())
    }
}
