//! Distributed random beacon built on a repeated-squaring delay function.
//!
//! A round collects 256-bit contributions from its participants with a
//! commit-then-reveal exchange, sums them modulo `2^256`, and then evaluates
//! `y = x^(2^t) mod N` over a freshly generated RSA modulus. The published
//! value is `(combined + y) mod 2^256`.
//!
//! ```no_run
//! use vdf_beacon::beacon::{BeaconOrchestrator, EntropyContributor, ParticipantId, RoundSettings};
//! use vdf_beacon::primitives::{seeded_stream, RandomPrimes};
//!
//! # fn main() -> vdf_beacon::Result<()> {
//! let mut round = BeaconOrchestrator::new(
//!     RoundSettings::default(),
//!     1,
//!     RandomPrimes::new(seeded_stream(7, 0)),
//!     seeded_stream(7, 1),
//! )?;
//! for id in 0..3 {
//!     round.register(EntropyContributor::new(ParticipantId(id), seeded_stream(7, 2 + u64::from(id))))?;
//! }
//! let output = round.run()?;
//! println!("{}", output.randomness);
//! # Ok(())
//! # }
//! ```
//!
//! Verification relies on the setup trapdoor, see [`vdf`].

#![warn(missing_docs)]

/// Rounds, participants and the escrow boundary.
pub mod beacon;
/// Layered configuration.
pub mod config;
/// Error types.
pub mod error;
/// Modular arithmetic, primes and randomness.
pub mod primitives;
pub mod vdf;

pub use beacon::{BeaconOrchestrator, BeaconOutput, DropoutPolicy, ParticipantId, Randomness};
pub use config::BeaconConfig;
pub use error::Error;

/// Result type used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
