//! Parsers for Token bridge VAAs.
//!
//! Token bridging relies on VAA's that indicate custody/lockup/burn events in order to maintain
//! token parity between multiple chains. These parsers can be used to read these VAAs. It also
//! defines the Governance actions that this module supports, namely contract upgrades and chain
//! registrations.

use bstr::BString;
use primitive_types::U256;
use serde::{de::SeqAccess, ser::SerializeStruct, Deserialize, Serialize};
use serde_wormhole::RawMessage;
use thiserror::Error;

use crate::{
    governance::{self, module_id, GovernanceAction},
    Address, Amount, Chain,
};

/// Amounts on the wire never carry more than this many decimals.
pub const NORMALIZED_DECIMALS: u8 = 8;

/// Represents a non-governance action targeted at the token bridge.
///
/// The generic parameter `P` indicates the type of the payload for the `TransferWithPayload`
/// variant.  This defaults to `Box<RawMessage>` as that provides the most flexibility when
/// deserializing the payload and avoids leaking lifetimes throughout the rest of the code.
/// However, users who want to avoid an extra allocation may choose to use a borrowed type.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Message<P = Box<RawMessage>> {
    /// The Transfer message contains specifics detailing a token lock up on a sending chain. Chains
    /// that are attempting to initiate a transfer must lock up tokens in some manner, such as in a
    /// custody account or via burning, before emitting this message.
    #[serde(rename = "1")]
    Transfer {
        /// The amount being transferred, truncated to 8 decimals.
        amount: Amount,

        /// Address of the token. Left-zero-padded if shorter than 32 bytes.
        token_address: Address,

        /// Chain ID of the token.
        token_chain: Chain,

        /// Address of the recipient. Left-zero-padded if shorter than 32 bytes.
        recipient: Address,

        /// Chain ID of the recipient.
        recipient_chain: Chain,

        /// Amount that the user is willing to pay as the relayer fee. Must be <= `amount`.
        fee: Amount,
    },

    /// Attests metadata for a token so that a wrapped version can be created on other chains.
    #[serde(rename = "2")]
    AssetMeta {
        /// Address of the token. Left-zero-padded if shorter than 32 bytes.
        token_address: Address,

        /// Chain ID of the token.
        token_chain: Chain,

        /// Number of decimals in the token's native representation.
        decimals: u8,

        /// Symbol of the token, NUL padded to 32 bytes on the wire.
        #[serde(with = "crate::arraystring")]
        symbol: BString,

        /// Name of the token, NUL padded to 32 bytes on the wire.
        #[serde(with = "crate::arraystring")]
        name: BString,
    },

    /// Similar to `Transfer` but also includes an arbitrary payload for the recipient contract.
    ///
    /// # Notes
    ///
    /// Unlike `Transfer`, there is no fee field. The recipient is expected to be a contract that
    /// knows how to interpret `payload`.
    #[serde(rename = "3")]
    TransferWithPayload {
        /// The amount being transferred, truncated to 8 decimals.
        amount: Amount,

        /// Address of the token. Left-zero-padded if shorter than 32 bytes.
        token_address: Address,

        /// Chain ID of the token.
        token_chain: Chain,

        /// Address of the recipient. Left-zero-padded if shorter than 32 bytes.
        recipient: Address,

        /// Chain ID of the recipient.
        recipient_chain: Chain,

        /// The address of the contract that initiated the transfer on the source chain.
        sender_address: Address,

        /// Everything after the fixed fields.
        payload: P,
    },
}

impl<P> Message<P> {
    /// The payload type discriminant of this message.
    pub fn payload_id(&self) -> u8 {
        match self {
            Message::Transfer { .. } => 1,
            Message::AssetMeta { .. } => 2,
            Message::TransferWithPayload { .. } => 3,
        }
    }
}

/// Represents a governance action targeted at the token bridge.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Action {
    /// Registers an emitter address for a particular chain on a different chain.  An emitter
    /// address for a particular chain must be registered on a destination chain before tokens can
    /// be transferred from the source chain to the destination chain.
    #[serde(rename = "1")]
    RegisterChain {
        chain: Chain,
        emitter_address: Address,
    },

    /// Upgrades the token bridge contract to a new address.
    #[serde(rename = "2")]
    ContractUpgrade { new_contract: Address },
}

/// Represents the payload for a governance VAA targeted at the token bridge.
pub type GovernancePacket = governance::GovernancePacket<Action>;

// MODULE = "TokenBridge"
pub const MODULE: [u8; 32] = module_id(b"TokenBridge");

#[derive(Serialize, Deserialize)]
struct RegisterChain {
    chain: Chain,
    emitter_address: Address,
}

#[derive(Serialize, Deserialize)]
struct ContractUpgrade {
    new_contract: Address,
}

impl GovernanceAction for Action {
    const MODULE: [u8; 32] = MODULE;
    const NAME: &'static str = "TokenBridge";

    fn action(&self) -> u8 {
        match self {
            Action::RegisterChain { .. } => 1,
            Action::ContractUpgrade { .. } => 2,
        }
    }

    fn is_known(action: u8) -> bool {
        matches!(action, 1 | 2)
    }

    fn serialize_payload<S: SerializeStruct>(&self, seq: &mut S) -> Result<(), S::Error> {
        match *self {
            Action::RegisterChain {
                chain,
                emitter_address,
            } => seq.serialize_field(
                "payload",
                &RegisterChain {
                    chain,
                    emitter_address,
                },
            ),
            Action::ContractUpgrade { new_contract } => {
                seq.serialize_field("payload", &ContractUpgrade { new_contract })
            }
        }
    }

    fn deserialize_payload<'de, A: SeqAccess<'de>>(
        action: u8,
        seq: &mut A,
    ) -> Result<Self, A::Error> {
        match action {
            1 => {
                let RegisterChain {
                    chain,
                    emitter_address,
                } = governance::next_payload(seq)?;

                Ok(Action::RegisterChain {
                    chain,
                    emitter_address,
                })
            }
            _ => {
                let ContractUpgrade { new_contract } = governance::next_payload(seq)?;
                Ok(Action::ContractUpgrade { new_contract })
            }
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("10^{exponent} does not fit in 256 bits")]
    ScaleOverflow { exponent: u8 },
    #[error("amount overflows 256 bits when scaled to {decimals} decimals")]
    Overflow { decimals: u8 },
}

/// An amount truncated to `NORMALIZED_DECIMALS`.
///
/// `native == amount * factor + dust`. The dust is whatever the truncation cut off and is
/// normally refunded or left with the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedAmount {
    pub amount: U256,
    pub dust: U256,
    pub factor: U256,
}

/// `10^(decimals - 8)` for tokens with more than 8 decimals, otherwise 1.
pub fn scale_factor(decimals: u8) -> Result<U256, AmountError> {
    let exponent = decimals.saturating_sub(NORMALIZED_DECIMALS);
    U256::from(10u8)
        .checked_pow(U256::from(exponent))
        .ok_or(AmountError::ScaleOverflow { exponent })
}

/// Truncates `native`, expressed with `decimals` decimals, to the wire representation.
pub fn normalize_amount(native: U256, decimals: u8) -> Result<NormalizedAmount, AmountError> {
    let factor = scale_factor(decimals)?;
    let (amount, dust) = native.div_mod(factor);

    Ok(NormalizedAmount {
        amount,
        dust,
        factor,
    })
}

/// Rescales a wire amount back to a token with `decimals` decimals.
pub fn denormalize_amount(amount: U256, decimals: u8) -> Result<U256, AmountError> {
    scale_factor(decimals)?
        .checked_mul(amount)
        .ok_or(AmountError::Overflow { decimals })
}
