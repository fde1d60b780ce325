//! Common test utilities shared across integration tests.
#![allow(dead_code)]

use num_bigint::BigUint;
use rand_chacha::ChaCha20Rng;
use vdf_beacon::beacon::{
    BeaconOrchestrator, Commitment, EntropyContributor, Participant, ParticipantId, RoundSettings,
};
use vdf_beacon::primitives::{seeded_stream, PrimeSource};
use vdf_beacon::{DropoutPolicy, Error, Result};

/// Initialize test tracing (call once at the beginning of tests).
///
/// Subsequent calls are safe and will be ignored.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::new("vdf_beacon=debug");

    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(filter)
        .try_init();
}

/// Hands out a fixed list of primes, cycling when exhausted.
pub struct FixedPrimes {
    primes: Vec<BigUint>,
    next: usize,
}

impl FixedPrimes {
    pub fn new(primes: &[u64]) -> Self {
        Self {
            primes: primes.iter().copied().map(BigUint::from).collect(),
            next: 0,
        }
    }

    /// 65521 and 65519, the two largest 16-bit primes.
    pub fn sixteen_bit() -> Self {
        Self::new(&[65_521, 65_519])
    }
}

impl PrimeSource for FixedPrimes {
    fn generate_prime(&mut self, _bits: u64) -> Result<BigUint> {
        let prime = self.primes[self.next % self.primes.len()].clone();
        self.next += 1;
        Ok(prime)
    }
}

/// How a [`FixedParticipant`] behaves during reveal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Behaviour {
    Honest,
    /// Commits, then never reveals.
    Withhold,
    /// Reveals a value other than the committed one.
    Equivocate,
    /// Reveals the committed value plus `2^256`.
    Overflow,
}

/// Participant with a chosen contribution.
pub struct FixedParticipant {
    id: ParticipantId,
    value: BigUint,
    behaviour: Behaviour,
    committed: bool,
}

impl FixedParticipant {
    pub fn new(id: u32, value: u64) -> Self {
        Self::with_behaviour(id, value, Behaviour::Honest)
    }

    pub fn with_behaviour(id: u32, value: u64, behaviour: Behaviour) -> Self {
        Self {
            id: ParticipantId(id),
            value: BigUint::from(value),
            behaviour,
            committed: false,
        }
    }
}

impl Participant for FixedParticipant {
    fn id(&self) -> ParticipantId {
        self.id
    }

    fn commit(&mut self) -> Result<Commitment> {
        if self.committed {
            return Err(Error::AlreadyContributed(self.id));
        }
        self.committed = true;
        Ok(Commitment::commit(self.id, &self.value))
    }

    fn reveal(&self) -> Result<BigUint> {
        if !self.committed {
            return Err(Error::NotYetContributed(self.id));
        }
        match self.behaviour {
            Behaviour::Honest => Ok(self.value.clone()),
            Behaviour::Withhold => Err(Error::ParticipantDropped(self.id)),
            Behaviour::Equivocate => Ok(&self.value + 1u32),
            Behaviour::Overflow => Ok(&self.value + (BigUint::from(1u8) << 256u32)),
        }
    }
}

pub fn settings(modulus_bits: u64, delay: u64, dropout: DropoutPolicy) -> RoundSettings {
    RoundSettings {
        modulus_bits,
        delay,
        dropout,
        checkpoint: 0,
    }
}

/// Round over fixed 16-bit primes and a seeded base.
pub fn fixed_round(
    delay: u64,
    dropout: DropoutPolicy,
    seed: u64,
) -> BeaconOrchestrator<FixedPrimes, ChaCha20Rng> {
    BeaconOrchestrator::new(
        settings(16, delay, dropout),
        1,
        FixedPrimes::sixteen_bit(),
        seeded_stream(seed, 1),
    )
    .expect("valid settings")
}

/// Fully seeded round with `participants` random contributors.
pub fn seeded_round(
    modulus_bits: u64,
    delay: u64,
    participants: u32,
    seed: u64,
) -> BeaconOrchestrator<vdf_beacon::primitives::RandomPrimes<ChaCha20Rng>, ChaCha20Rng> {
    let mut round = BeaconOrchestrator::new(
        settings(modulus_bits, delay, DropoutPolicy::Abort),
        seed,
        vdf_beacon::primitives::RandomPrimes::new(seeded_stream(seed, 0)),
        seeded_stream(seed, 1),
    )
    .expect("valid settings");

    for id in 0..participants {
        round
            .register(EntropyContributor::new(
                ParticipantId(id),
                seeded_stream(seed, 2 + u64::from(id)),
            ))
            .expect("registration in idle round");
    }
    round
}
