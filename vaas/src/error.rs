use thiserror::Error;

use crate::{
    payload::PayloadError, sequence::SequenceError, vaa::DecodeError, verify::VerifyError, Address,
    Chain,
};

/// Everything that can go wrong while processing a VAA, by stage.
#[derive(Debug, Error)]
pub enum VaaError {
    #[error("failed to decode VAA: {0}")]
    Decode(#[from] DecodeError),
    #[error("failed to verify VAA: {0}")]
    Verify(#[from] VerifyError),
    #[error("failed to decode VAA payload: {0}")]
    Payload(#[from] PayloadError),
    #[error("governance packet from unexpected emitter {chain}/{address}")]
    InvalidGovernanceEmitter { chain: Chain, address: Address },
    #[error("governance packet targets {target}, not {expected}")]
    GovernanceTargetMismatch { target: Chain, expected: Chain },
    #[error(transparent)]
    Sequence(#[from] SequenceError),
}
