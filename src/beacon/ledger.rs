use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use tracing::info;

use super::{ParticipantId, Randomness};

/// Escrow ledger the beacon reports to.
///
/// The beacon deposits every finalized value and slashes participants that
/// are excluded from a round. Real deployments back this with an external
/// ledger; [`MemoryLedger`] keeps the records in process.
pub trait EscrowLedger: Send + Sync {
    /// Records the finalized randomness of `round`.
    fn deposit(&self, round: u64, value: &Randomness);

    /// Records a penalty against `participant`.
    fn slash(&self, participant: ParticipantId);
}

#[derive(Default)]
struct LedgerState {
    deposits: Vec<(u64, Randomness)>,
    slashes: BTreeMap<ParticipantId, u64>,
}

/// In-process escrow ledger.
#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
}

impl MemoryLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all deposits in the order they were recorded.
    pub fn deposits(&self) -> Vec<(u64, Randomness)> {
        self.lock().deposits.clone()
    }

    /// Returns how many times `participant` was slashed.
    pub fn slash_count(&self, participant: ParticipantId) -> u64 {
        self.lock().slashes.get(&participant).copied().unwrap_or(0)
    }

    /// Returns every slashed participant with its count.
    pub fn slashed(&self) -> Vec<(ParticipantId, u64)> {
        self.lock()
            .slashes
            .iter()
            .map(|(id, count)| (*id, *count))
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        // a panic while holding the lock leaves plain data behind; keep using it
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl EscrowLedger for MemoryLedger {
    fn deposit(&self, round: u64, value: &Randomness) {
        info!(round, value = %value, "deposited beacon output");
        self.lock().deposits.push((round, value.clone()));
    }

    fn slash(&self, participant: ParticipantId) {
        info!(%participant, "participant slashed");
        *self.lock().slashes.entry(participant).or_insert(0) += 1;
    }
}
