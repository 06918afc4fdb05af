//! Settings for the VAA processing pipeline.

use serde::{Deserialize, Serialize};

use crate::{guardian::DEFAULT_GUARDIAN_SET_EXPIRY, vaa::MAX_VAA_SIZE, Address, Chain};

/// What to do with a VAA whose sequence has already been observed.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReplayPolicy {
    /// Log a warning and hand the message to the caller anyway.
    #[default]
    Warn,
    /// Fail with `SequenceError::Replay`.
    Reject,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// The chain this pipeline runs on. Governance packets must target it or `Chain::Any`.
    /// `Chain::Any` here accepts governance packets for every chain.
    pub chain: Chain,

    /// The only emitter allowed to send governance packets.
    pub governance_chain: Chain,
    pub governance_emitter: Address,

    /// Seconds a replaced guardian set keeps verifying VAAs.
    pub guardian_set_expiry: u64,

    /// Envelopes larger than this many bytes are rejected unparsed.
    pub max_vaa_size: usize,

    pub replay_policy: ReplayPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            chain: Chain::Any,
            governance_chain: Chain::Solana,
            governance_emitter: crate::GOVERNANCE_EMITTER,
            guardian_set_expiry: DEFAULT_GUARDIAN_SET_EXPIRY,
            max_vaa_size: MAX_VAA_SIZE,
            replay_policy: ReplayPolicy::Warn,
        }
    }
}

impl Config {
    /// Whether `(chain, address)` is the configured governance emitter.
    pub fn is_governance_emitter(&self, chain: Chain, address: &Address) -> bool {
        chain == self.governance_chain && *address == self.governance_emitter
    }

    /// Whether a governance packet addressed to `target` should be executed here.
    pub fn accepts_governance_target(&self, target: Chain) -> bool {
        self.chain == Chain::Any || target == Chain::Any || target == self.chain
    }
}
