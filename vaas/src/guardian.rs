//! Guardian sets and the store that tracks their lifecycle.
//!
//! A guardian set is never modified after it is created. Applying a guardian set upgrade adds a
//! new set and replaces the previous one with a copy that carries an expiration time, after which
//! VAAs signed by it are no longer accepted.

use std::{collections::BTreeMap, collections::BTreeSet, future::Future, sync::Arc};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{config::Config, core::Action, GuardianAddress};

/// How long a replaced guardian set stays valid, in seconds.
pub const DEFAULT_GUARDIAN_SET_EXPIRY: u64 = 24 * 60 * 60;

/// A `GuardianSet` is a versioned set of keys that can sign Wormhole messages.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct GuardianSet {
    /// The index of this set. Every upgrade increments it by one.
    pub index: u32,

    /// The guardian addresses. A guardian's position in this list is the index it signs with.
    pub addresses: Vec<GuardianAddress>,

    /// Seconds since UNIX epoch after which this set no longer verifies anything. `None` for the
    /// active set.
    pub expiration_time: Option<u64>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GuardianSetError {
    #[error("guardian set is empty")]
    EmptyGuardianSet,
    #[error("guardian {0} appears more than once")]
    DuplicateGuardian(GuardianAddress),
    #[error("guardian set index must increase by one: current {current}, got {new}")]
    NonSequentialIndex { current: u32, new: u32 },
    #[error("a guardian set can have at most 256 members, got {0}")]
    TooManyGuardians(usize),
    #[error("governance action is not a guardian set upgrade")]
    NotAnUpgrade,
    #[error("guardian set {0} is newer than the active set and was never activated")]
    NotActivated(u32),
    #[error("guardian set {0} is not available")]
    Unavailable(u32),
    #[error("requested guardian set {requested}, got set {fetched}")]
    IndexMismatch { requested: u32, fetched: u32 },
}

impl GuardianSet {
    /// Creates an active guardian set, checking that `addresses` is non-empty, fits in a
    /// signature index and has no duplicates.
    pub fn new(index: u32, addresses: Vec<GuardianAddress>) -> Result<Self, GuardianSetError> {
        if addresses.is_empty() {
            return Err(GuardianSetError::EmptyGuardianSet);
        }

        if addresses.len() > 256 {
            return Err(GuardianSetError::TooManyGuardians(addresses.len()));
        }

        let mut seen = BTreeSet::new();
        for a in &addresses {
            if !seen.insert(*a) {
                return Err(GuardianSetError::DuplicateGuardian(*a));
            }
        }

        Ok(GuardianSet {
            index,
            addresses,
            expiration_time: None,
        })
    }

    /// The minimum number of signatures needed for a VAA to be valid.
    pub fn quorum(&self) -> usize {
        quorum(self.addresses.len())
    }

    /// Whether this set may no longer be used at time `now`.
    pub fn is_expired(&self, now: u64) -> bool {
        self.expiration_time.is_some_and(|t| now > t)
    }
}

/// `floor(n * 2 / 3) + 1`.
pub fn quorum(n: usize) -> usize {
    (n * 2) / 3 + 1
}

/// Where a guardian set is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardianSetState {
    Active,
    Retiring { expires_at: u64 },
    Expired,
}

/// Maps a guardian set index to the set, if one is known.
pub trait GuardianSetResolver {
    fn resolve(&self, index: u32) -> Option<Arc<GuardianSet>>;
}

impl<F> GuardianSetResolver for F
where
    F: Fn(u32) -> Option<Arc<GuardianSet>>,
{
    fn resolve(&self, index: u32) -> Option<Arc<GuardianSet>> {
        self(index)
    }
}

/// Owns every known guardian set and tracks which one is active.
#[derive(Debug, Clone)]
pub struct GuardianSetStore {
    sets: BTreeMap<u32, Arc<GuardianSet>>,
    current: Arc<GuardianSet>,
    expiry: u64,
}

impl GuardianSetStore {
    /// Starts a store with `initial` as the active set. Replaced sets stay valid for `expiry`
    /// seconds.
    pub fn new(initial: GuardianSet, expiry: u64) -> Self {
        let current = Arc::new(initial);
        let mut sets = BTreeMap::new();
        let _ = sets.insert(current.index, current.clone());

        GuardianSetStore {
            sets,
            current,
            expiry,
        }
    }

    /// Starts a store with `initial` as the active set, using the expiry from `config`.
    pub fn from_config(initial: GuardianSet, config: &Config) -> Self {
        Self::new(initial, config.guardian_set_expiry)
    }

    pub fn current_index(&self) -> u32 {
        self.current.index
    }

    /// The active guardian set.
    pub fn current(&self) -> Arc<GuardianSet> {
        self.current.clone()
    }

    pub fn get(&self, index: u32) -> Option<Arc<GuardianSet>> {
        self.sets.get(&index).cloned()
    }

    /// The lifecycle state of set `index` at time `now`, or `None` for an unknown index.
    pub fn state(&self, index: u32, now: u64) -> Option<GuardianSetState> {
        let set = self.sets.get(&index)?;

        Some(match set.expiration_time {
            _ if index == self.current.index => GuardianSetState::Active,
            Some(t) if now <= t => GuardianSetState::Retiring { expires_at: t },
            _ => GuardianSetState::Expired,
        })
    }

    /// Makes `addresses` the active set with index `new_index` and starts the expiry clock of
    /// the set it replaces.
    pub fn upgrade(
        &mut self,
        new_index: u32,
        addresses: Vec<GuardianAddress>,
        now: u64,
    ) -> Result<Arc<GuardianSet>, GuardianSetError> {
        let current = self.current.index;
        if Some(new_index) != current.checked_add(1) {
            return Err(GuardianSetError::NonSequentialIndex {
                current,
                new: new_index,
            });
        }

        let next = Arc::new(GuardianSet::new(new_index, addresses)?);
        let expires_at = now.saturating_add(self.expiry);

        let mut retired = GuardianSet::clone(&self.current);
        retired.expiration_time = Some(expires_at);
        let _ = self.sets.insert(current, Arc::new(retired));
        let _ = self.sets.insert(new_index, next.clone());
        self.current = next.clone();

        info!("guardian set {new_index} is now active, set {current} expires at {expires_at}");

        Ok(next)
    }

    /// Applies a core `GuardianSetUpgrade` governance action.
    pub fn apply(
        &mut self,
        action: &Action,
        now: u64,
    ) -> Result<Arc<GuardianSet>, GuardianSetError> {
        match action {
            Action::GuardianSetUpgrade {
                new_index,
                new_guardians,
            } => self.upgrade(*new_index, new_guardians.clone(), now),
            _ => Err(GuardianSetError::NotAnUpgrade),
        }
    }

    /// Resolves a retired set from an asynchronous source, for stores that do not hold the full
    /// history, and caches it.
    ///
    /// Sets newer than the active one are never fetched: they only become active through
    /// `upgrade`. A fetched set must carry the requested index. One without an expiration time is
    /// stored as already expired, since only the active set may be unbounded.
    pub async fn resolve_with<F, Fut>(
        &mut self,
        index: u32,
        fetch: F,
    ) -> Result<Arc<GuardianSet>, GuardianSetError>
    where
        F: FnOnce(u32) -> Fut,
        Fut: Future<Output = Option<GuardianSet>>,
    {
        if let Some(set) = self.get(index) {
            return Ok(set);
        }

        if index > self.current.index {
            return Err(GuardianSetError::NotActivated(index));
        }

        let mut set = fetch(index)
            .await
            .ok_or(GuardianSetError::Unavailable(index))?;
        if set.index != index {
            return Err(GuardianSetError::IndexMismatch {
                requested: index,
                fetched: set.index,
            });
        }

        if set.expiration_time.is_none() {
            warn!("fetched guardian set {index} has no expiration time, treating it as expired");
            set.expiration_time = Some(0);
        }

        let set = Arc::new(set);
        let _ = self.sets.insert(index, set.clone());
        Ok(set)
    }
}

impl GuardianSetResolver for GuardianSetStore {
    fn resolve(&self, index: u32) -> Option<Arc<GuardianSet>> {
        self.get(index)
    }
}
