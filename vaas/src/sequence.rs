//! Per-emitter sequence tracking.
//!
//! The registry keeps a high-water mark for every `(chain, emitter)` pair. Gaps are fine since
//! observers can see messages out of order, but a sequence at or below the mark has been seen
//! before and is reported as a replay.

use std::{
    collections::HashMap,
    fmt,
    str::FromStr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, PoisonError, RwLock,
    },
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Address, Chain};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SequenceError {
    #[error("sequence {sequence} was already observed, next expected is {next_expected}")]
    Replay { sequence: u64, next_expected: u64 },
    #[error("emitter has observed the last possible sequence")]
    Exhausted,
}

// Each slot stores `last + 1`, so 0 means nothing has been observed yet.
type Slot = Arc<AtomicU64>;

/// Tracks the highest sequence observed for each emitter.
///
/// `observe` calls for different emitters never contend. Calls for the same emitter are a
/// single atomic read-modify-write on that emitter's slot.
#[derive(Debug, Default)]
pub struct SequenceRegistry {
    slots: RwLock<HashMap<(Chain, Address), Slot>>,
}

impl SequenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, chain: Chain, address: Address) -> Option<Slot> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(chain, address))
            .cloned()
    }

    fn slot_or_insert(&self, chain: Chain, address: Address) -> Slot {
        if let Some(s) = self.slot(chain, address) {
            return s;
        }

        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry((chain, address))
            .or_default()
            .clone()
    }

    /// The lowest sequence that `observe` would accept: one past the last observed sequence, or
    /// 0 for an emitter that has not been seen.
    pub fn next_expected(&self, chain: Chain, address: Address) -> u64 {
        self.slot(chain, address)
            .map_or(0, |s| s.load(Ordering::Acquire))
    }

    /// The highest sequence observed for the emitter, if any.
    pub fn last_observed(&self, chain: Chain, address: Address) -> Option<u64> {
        self.next_expected(chain, address).checked_sub(1)
    }

    /// Records `sequence` for the emitter, raising its high-water mark.
    pub fn observe(
        &self,
        chain: Chain,
        address: Address,
        sequence: u64,
    ) -> Result<(), SequenceError> {
        let next = sequence.checked_add(1).ok_or(SequenceError::Exhausted)?;
        let slot = self.slot_or_insert(chain, address);

        slot.fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
            (sequence >= cur).then_some(next)
        })
        .map(|_| ())
        .map_err(|cur| SequenceError::Replay {
            sequence,
            next_expected: cur,
        })
    }
}

/// The identifier used to index a message across chains: `chain/emitter/sequence`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId {
    pub emitter_chain: Chain,
    pub emitter_address: Address,
    pub sequence: u64,
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            u16::from(self.emitter_chain),
            self.emitter_address,
            self.sequence
        )
    }
}

#[derive(Debug, Error)]
#[error("invalid message id: {0}")]
pub struct InvalidMessageId(String);

impl FromStr for MessageId {
    type Err = InvalidMessageId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || InvalidMessageId(s.into());

        let mut parts = s.split('/');
        let (Some(chain), Some(address), Some(sequence), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(err());
        };

        Ok(MessageId {
            emitter_chain: chain.parse::<u16>().map_err(|_| err())?.into(),
            emitter_address: address.parse().map_err(|_| err())?,
            sequence: sequence.parse().map_err(|_| err())?,
        })
    }
}
