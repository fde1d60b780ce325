use core::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use num_bigint::BigUint;
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use super::{
    combine, finalize, Commitment, DropoutPolicy, EscrowLedger, Participant, ParticipantId,
    Randomness,
};
use crate::primitives::PrimeSource;
use crate::vdf::{self, PublicParams, Setup, MIN_PRIME_BITS};
use crate::{Error, Result};

/// Per-round protocol parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSettings {
    /// Bit length of each prime factor of the modulus.
    pub modulus_bits: u64,
    /// Number of sequential squarings `t`.
    pub delay: u64,
    /// Handling of participants that commit but do not open.
    pub dropout: DropoutPolicy,
    /// Squarings between progress reports; zero disables them.
    #[serde(default)]
    pub checkpoint: u64,
}

impl Default for RoundSettings {
    fn default() -> Self {
        Self {
            modulus_bits: 256,
            delay: 20,
            dropout: DropoutPolicy::Abort,
            checkpoint: 0,
        }
    }
}

impl RoundSettings {
    /// Checks the settings before any round state exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for a bit length below
    /// [`MIN_PRIME_BITS`] or an exclusion policy with a zero quorum.
    pub fn validate(&self) -> Result<()> {
        if self.modulus_bits < MIN_PRIME_BITS {
            return Err(Error::InvalidParameter(format!(
                "modulus_bits must be at least {MIN_PRIME_BITS}, got {}",
                self.modulus_bits
            )));
        }

        if let DropoutPolicy::Exclude { min_participants } = self.dropout {
            if min_participants == 0 {
                return Err(Error::InvalidParameter(
                    "min_participants cannot be zero".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Position of a round in the protocol.
///
/// Rounds move strictly forward through `Idle, Collecting, Combined,
/// Delaying, Verified, Finalized`. Any failure after collection starts moves
/// the round to the terminal `Failed` state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundState {
    /// Accepting participant registrations.
    Idle,
    /// Every participant has committed.
    Collecting,
    /// Contributions are revealed and combined.
    Combined,
    /// The delay output is computed and awaits verification.
    Delaying,
    /// The delay output passed verification.
    Verified,
    /// Randomness is published.
    Finalized,
    /// The round ended without output.
    Failed,
}

impl fmt::Display for RoundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoundState::Idle => "idle",
            RoundState::Collecting => "collecting",
            RoundState::Combined => "combined",
            RoundState::Delaying => "delaying",
            RoundState::Verified => "verified",
            RoundState::Finalized => "finalized",
            RoundState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Wall-clock time spent in each phase of a round.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PhaseTimings {
    /// Commit phase.
    pub collect: Duration,
    /// Reveal and combination.
    pub combine: Duration,
    /// Modulus and base generation.
    pub setup: Duration,
    /// Sequential squarings.
    pub compute: Duration,
    /// Trapdoor verification.
    pub verify: Duration,
    /// Output derivation and ledger deposit.
    pub finalize: Duration,
}

impl PhaseTimings {
    /// Sum of all phases.
    pub fn total(&self) -> Duration {
        self.collect + self.combine + self.setup + self.compute + self.verify + self.finalize
    }
}

/// Everything a finalized round publishes. The trapdoor is not part of it.
#[derive(Clone, Debug)]
pub struct BeaconOutput {
    /// Round number.
    pub round: u64,
    /// Participants whose contributions were combined, in registration order.
    pub participants: Vec<ParticipantId>,
    /// Participants dropped under [`DropoutPolicy::Exclude`].
    pub excluded: Vec<ParticipantId>,
    /// Opened commitments of the combined participants.
    pub commitments: Vec<(ParticipantId, Commitment)>,
    /// Sum of revealed contributions modulo `2^256`.
    pub combined: BigUint,
    /// Modulus and base the delay ran over.
    pub params: PublicParams,
    /// Number of squarings.
    pub delay: u64,
    /// Delay output `y`.
    pub delay_output: BigUint,
    /// Published randomness.
    pub randomness: Randomness,
    /// Time spent per phase.
    pub timings: PhaseTimings,
}

/// Drives one beacon round from registration to published randomness.
///
/// Each step checks the current [`RoundState`]; calling a step out of order
/// returns [`Error::ProtocolOrderViolation`] and leaves the state untouched.
/// [`BeaconOrchestrator::run`] performs all steps in sequence.
///
/// The base of the delay function is drawn during setup, independently of
/// the combined entropy, and the published value is
/// `(combined + y) mod 2^256`.
pub struct BeaconOrchestrator<P, R> {
    settings: RoundSettings,
    round: u64,
    primes: P,
    rng: R,
    ledger: Option<Arc<dyn EscrowLedger>>,
    participants: Vec<Box<dyn Participant>>,
    state: RoundState,
    commitments: Vec<(ParticipantId, Commitment)>,
    revealed: Vec<(ParticipantId, BigUint)>,
    excluded: Vec<ParticipantId>,
    combined: Option<BigUint>,
    setup: Option<Setup>,
    delay_output: Option<BigUint>,
    timings: PhaseTimings,
    progress: Option<Box<dyn FnMut(u64, u64) + Send>>,
}

impl<P: PrimeSource, R: CryptoRngCore> BeaconOrchestrator<P, R> {
    /// Creates an idle round.
    ///
    /// `primes` supplies the modulus factors and `rng` the delay base.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if the settings are invalid.
    pub fn new(settings: RoundSettings, round: u64, primes: P, rng: R) -> Result<Self> {
        settings.validate()?;

        Ok(Self {
            settings,
            round,
            primes,
            rng,
            ledger: None,
            participants: Vec::new(),
            state: RoundState::Idle,
            commitments: Vec::new(),
            revealed: Vec::new(),
            excluded: Vec::new(),
            combined: None,
            setup: None,
            delay_output: None,
            timings: PhaseTimings::default(),
            progress: None,
        })
    }

    /// Reports deposits and slashes to `ledger`.
    pub fn with_ledger(mut self, ledger: Arc<dyn EscrowLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Calls `observer(done, t)` every `checkpoint` squarings and once when
    /// the delay output is ready.
    pub fn with_progress<F>(mut self, observer: F) -> Self
    where
        F: FnMut(u64, u64) + Send + 'static,
    {
        self.progress = Some(Box::new(observer));
        self
    }

    /// Adds a participant. Order of registration fixes the transcript order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProtocolOrderViolation`] after collection started and
    /// [`Error::InvalidParameter`] for a duplicate id.
    pub fn register<T: Participant + 'static>(&mut self, participant: T) -> Result<()> {
        self.expect_state(RoundState::Idle, "register")?;

        let id = participant.id();
        if self.participants.iter().any(|p| p.id() == id) {
            return Err(Error::InvalidParameter(format!(
                "participant {id} is already registered"
            )));
        }

        self.participants.push(Box::new(participant));
        Ok(())
    }

    /// Returns the current state.
    pub fn state(&self) -> RoundState {
        self.state
    }

    /// Returns the round number.
    pub fn round(&self) -> u64 {
        self.round
    }

    /// Returns the number of registered participants.
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Returns the participants excluded so far.
    pub fn excluded(&self) -> &[ParticipantId] {
        &self.excluded
    }

    /// Returns the recorded commitments.
    pub fn commitments(&self) -> &[(ParticipantId, Commitment)] {
        &self.commitments
    }

    /// Returns the combined entropy once available.
    pub fn combined(&self) -> Option<&BigUint> {
        self.combined.as_ref()
    }

    /// Returns the public delay parameters once set up.
    pub fn public_params(&self) -> Option<&PublicParams> {
        self.setup.as_ref().map(Setup::params)
    }

    /// Returns the delay output once computed.
    pub fn delay_output(&self) -> Option<&BigUint> {
        self.delay_output.as_ref()
    }

    /// Runs every step and returns the published output.
    ///
    /// # Errors
    ///
    /// Propagates the first failing step; the round is then `Failed` unless
    /// the error was raised before collection started.
    pub fn run(&mut self) -> Result<BeaconOutput> {
        let span = info_span!("round", round = self.round);
        let _guard = span.enter();

        self.collect()?;
        self.combine()?;
        self.delay()?;
        self.verify()?;
        self.finalize()
    }

    /// Commit phase: every participant commits before anyone reveals.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] without changing state if no
    /// participant is registered or the quorum exceeds the participant count.
    pub fn collect(&mut self) -> Result<()> {
        self.expect_state(RoundState::Idle, "collect")?;

        if self.participants.is_empty() {
            return Err(Error::InvalidParameter(
                "a round needs at least one participant".to_string(),
            ));
        }
        if let DropoutPolicy::Exclude { min_participants } = self.settings.dropout {
            if min_participants > self.participants.len() {
                return Err(Error::InvalidParameter(format!(
                    "min_participants {min_participants} exceeds the {} registered participants",
                    self.participants.len()
                )));
            }
        }

        let start = Instant::now();
        let mut failures = Vec::new();
        for participant in &mut self.participants {
            let id = participant.id();
            match participant.commit() {
                Ok(commitment) => self.commitments.push((id, commitment)),
                Err(e) => failures.push((id, e)),
            }
        }
        for (id, err) in failures {
            self.drop_participant(id, err)?;
        }
        self.check_quorum(self.commitments.len())?;

        self.timings.collect = start.elapsed();
        self.state = RoundState::Collecting;
        debug!(
            committed = self.commitments.len(),
            "all participants committed"
        );
        Ok(())
    }

    /// Reveal phase: opens every commitment and sums the contributions.
    ///
    /// # Errors
    ///
    /// Under [`DropoutPolicy::Abort`], the first missing or mismatching
    /// reveal fails the round. Under [`DropoutPolicy::Exclude`], the round
    /// fails with [`Error::QuorumLost`] once too few participants remain.
    pub fn combine(&mut self) -> Result<BigUint> {
        self.expect_state(RoundState::Collecting, "combine")?;

        let start = Instant::now();
        let mut opened = Vec::with_capacity(self.commitments.len());
        let mut failures = Vec::new();
        for (id, commitment) in &self.commitments {
            let Some(participant) = self.participants.iter().find(|p| p.id() == *id) else {
                failures.push((*id, Error::ParticipantDropped(*id)));
                continue;
            };

            let result = participant
                .reveal()
                .and_then(|value| commitment.open(*id, &value).map(|c| (c, value)));
            match result {
                Ok((verified, value)) => opened.push((*id, verified, value)),
                Err(e) => failures.push((*id, e)),
            }
        }

        for (id, err) in failures {
            self.drop_participant(id, err)?;
        }
        self.check_quorum(opened.len())?;

        self.commitments = opened
            .iter()
            .map(|(id, c, _)| (*id, c.clone()))
            .collect();
        self.revealed = opened.into_iter().map(|(id, _, v)| (id, v)).collect();

        let combined = combine(self.revealed.iter().map(|(_, v)| v));
        self.timings.combine = start.elapsed();
        self.combined = Some(combined.clone());
        self.state = RoundState::Combined;
        debug!(revealed = self.revealed.len(), "contributions combined");
        Ok(combined)
    }

    /// Sets up a fresh modulus and computes the delay output.
    ///
    /// # Errors
    ///
    /// Propagates setup and compute failures; the round is then `Failed`.
    pub fn delay(&mut self) -> Result<BigUint> {
        self.expect_state(RoundState::Combined, "delay")?;

        let start = Instant::now();
        let setup = match vdf::setup(self.settings.modulus_bits, &mut self.primes, &mut self.rng)
        {
            Ok(setup) => setup,
            Err(e) => return Err(self.fail(e)),
        };
        self.timings.setup = start.elapsed();

        let round = self.round;
        let checkpoint = self.settings.checkpoint;
        let observer = &mut self.progress;
        let start = Instant::now();
        let computed = vdf::compute_with_progress(
            self.settings.delay,
            setup.params().modulus(),
            setup.params().base(),
            checkpoint,
            |done, total| {
                if checkpoint != 0 {
                    info!(round, done, total, "delay progress");
                }
                if let Some(observer) = observer.as_mut() {
                    observer(done, total);
                }
            },
        );
        let y = match computed {
            Ok(y) => y,
            Err(e) => return Err(self.fail(e)),
        };
        self.timings.compute = start.elapsed();
        histogram!("beacon.vdf.compute.duration").record(self.timings.compute.as_secs_f64());

        debug!(
            delay = self.settings.delay,
            elapsed_ms = self.timings.compute.as_millis() as u64,
            "delay output computed"
        );

        self.setup = Some(setup);
        self.delay_output = Some(y.clone());
        self.state = RoundState::Delaying;
        Ok(y)
    }

    /// Checks the delay output with the setup trapdoor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VerificationFailed`] and moves the round to `Failed`
    /// if the output does not match.
    pub fn verify(&mut self) -> Result<()> {
        self.expect_state(RoundState::Delaying, "verify")?;

        let (Some(setup), Some(y)) = (self.setup.as_ref(), self.delay_output.as_ref()) else {
            return Err(self.fail(Error::ProtocolOrderViolation(
                "delay output missing".to_string(),
            )));
        };

        let start = Instant::now();
        let verified = vdf::check(self.settings.delay, y, setup);
        self.timings.verify = start.elapsed();
        histogram!("beacon.vdf.verify.duration").record(self.timings.verify.as_secs_f64());

        match verified {
            Ok(true) => {
                self.state = RoundState::Verified;
                debug!("delay output verified");
                Ok(())
            }
            Ok(false) => Err(self.fail(Error::VerificationFailed { round: self.round })),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Derives and publishes `(combined + y) mod 2^256`.
    ///
    /// Deposits the value to the ledger when one is attached and discards the
    /// trapdoor.
    pub fn finalize(&mut self) -> Result<BeaconOutput> {
        self.expect_state(RoundState::Verified, "finalize")?;

        let start = Instant::now();
        let (Some(combined), Some(y), Some(setup)) = (
            self.combined.clone(),
            self.delay_output.clone(),
            self.setup.take(),
        ) else {
            return Err(self.fail(Error::ProtocolOrderViolation(
                "round data missing at finalization".to_string(),
            )));
        };
        let (params, _trapdoor) = setup.into_parts();

        let randomness = finalize(&combined, &y);
        if let Some(ledger) = &self.ledger {
            ledger.deposit(self.round, &randomness);
        }
        self.timings.finalize = start.elapsed();
        self.state = RoundState::Finalized;

        counter!("beacon.round.finalized").increment(1);
        histogram!("beacon.round.duration").record(self.timings.total().as_secs_f64());
        info!(
            round = self.round,
            participants = self.revealed.len(),
            excluded = self.excluded.len(),
            randomness = %randomness,
            "round finalized"
        );

        Ok(BeaconOutput {
            round: self.round,
            participants: self.revealed.iter().map(|(id, _)| *id).collect(),
            excluded: self.excluded.clone(),
            commitments: self.commitments.clone(),
            combined,
            params,
            delay: self.settings.delay,
            delay_output: y,
            randomness,
            timings: self.timings,
        })
    }

    fn expect_state(&self, expected: RoundState, step: &str) -> Result<()> {
        if self.state != expected {
            return Err(Error::ProtocolOrderViolation(format!(
                "{step} requires a {expected} round, but round {} is {}",
                self.round, self.state
            )));
        }
        Ok(())
    }

    fn drop_participant(&mut self, id: ParticipantId, err: Error) -> Result<()> {
        match self.settings.dropout {
            DropoutPolicy::Abort => Err(self.fail(err)),
            DropoutPolicy::Exclude { .. } => {
                warn!(participant = %id, error = %err, "excluding participant");
                counter!("beacon.participant.excluded").increment(1);
                self.excluded.push(id);
                if let Some(ledger) = &self.ledger {
                    ledger.slash(id);
                }
                Ok(())
            }
        }
    }

    fn check_quorum(&mut self, remaining: usize) -> Result<()> {
        let required = match self.settings.dropout {
            DropoutPolicy::Abort => 1,
            DropoutPolicy::Exclude { min_participants } => min_participants,
        };
        if remaining < required {
            return Err(self.fail(Error::QuorumLost {
                remaining,
                required,
            }));
        }
        Ok(())
    }

    fn fail(&mut self, err: Error) -> Error {
        warn!(round = self.round, state = %self.state, error = %err, "round failed");
        counter!("beacon.round.failed").increment(1);
        self.state = RoundState::Failed;
        self.setup = None;
        err
    }
}
