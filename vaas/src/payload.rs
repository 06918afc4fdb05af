//! Interprets the payload of a VAA body as one of the known message types.
//!
//! The first byte selects the type. Token bridge messages use 1, 2 and 3. Governance packets
//! start with a left zero padded module name, so their first byte is always 0.

use thiserror::Error;

use crate::{
    core,
    governance::{GovernanceAction, GovernancePacket},
    token,
};

const MODULE_LEN: usize = 32;

/// A decoded VAA payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedMessage {
    /// Transfer, attestation or transfer-with-payload.
    Token(token::Message),
    TokenBridgeGovernance(token::GovernancePacket),
    CoreGovernance(core::GovernancePacket),
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload is truncated")]
    TruncatedPayload,
    #[error("unknown payload type {0}")]
    UnknownPayloadType(u8),
    #[error("field `{field}` is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },
    #[error("unknown governance module {}", hex::encode(.0))]
    UnknownGovernanceModule([u8; 32]),
    #[error("unknown action {action} for governance module {module}")]
    UnknownGovernanceAction { module: &'static str, action: u8 },
    #[error("payload has trailing data")]
    TrailingData,
    #[error("malformed payload: {0}")]
    Malformed(#[source] serde_wormhole::Error),
}

impl From<serde_wormhole::Error> for PayloadError {
    fn from(e: serde_wormhole::Error) -> Self {
        match e {
            serde_wormhole::Error::Eof => PayloadError::TruncatedPayload,
            serde_wormhole::Error::TrailingData => PayloadError::TrailingData,
            e => PayloadError::Malformed(e),
        }
    }
}

impl TypedMessage {
    /// Whether this is a governance packet of any module.
    pub fn is_governance(&self) -> bool {
        !matches!(self, TypedMessage::Token(_))
    }

    /// The chain a governance packet is addressed to.
    pub fn governance_chain(&self) -> Option<crate::Chain> {
        match self {
            TypedMessage::Token(_) => None,
            TypedMessage::TokenBridgeGovernance(p) => Some(p.chain),
            TypedMessage::CoreGovernance(p) => Some(p.chain),
        }
    }
}

/// Decodes `payload` into a typed message.
pub fn decode_payload(payload: &[u8]) -> Result<TypedMessage, PayloadError> {
    let id = *payload.first().ok_or(PayloadError::TruncatedPayload)?;

    match id {
        0 => decode_governance(payload),
        1..=3 => {
            let msg: token::Message = serde_wormhole::from_slice(payload)?;
            if let token::Message::AssetMeta { symbol, name, .. } = &msg {
                check_utf8("symbol", symbol)?;
                check_utf8("name", name)?;
            }

            Ok(TypedMessage::Token(msg))
        }
        other => Err(PayloadError::UnknownPayloadType(other)),
    }
}

/// Encodes a typed message. `decode_payload(&encode_payload(m)?)` reproduces `m` exactly.
pub fn encode_payload(msg: &TypedMessage) -> Result<Vec<u8>, serde_wormhole::Error> {
    match msg {
        TypedMessage::Token(m) => serde_wormhole::to_vec(m),
        TypedMessage::TokenBridgeGovernance(p) => serde_wormhole::to_vec(p),
        TypedMessage::CoreGovernance(p) => serde_wormhole::to_vec(p),
    }
}

fn decode_governance(payload: &[u8]) -> Result<TypedMessage, PayloadError> {
    if payload.len() <= MODULE_LEN {
        return Err(PayloadError::TruncatedPayload);
    }

    let mut module = [0u8; MODULE_LEN];
    module.copy_from_slice(&payload[..MODULE_LEN]);
    let action = payload[MODULE_LEN];

    if module == token::MODULE {
        check_action::<token::Action>(action)?;
        let p: GovernancePacket<token::Action> = serde_wormhole::from_slice(payload)?;
        Ok(TypedMessage::TokenBridgeGovernance(p))
    } else if module == core::MODULE {
        check_action::<core::Action>(action)?;
        let p: GovernancePacket<core::Action> = serde_wormhole::from_slice(payload)?;
        Ok(TypedMessage::CoreGovernance(p))
    } else {
        Err(PayloadError::UnknownGovernanceModule(module))
    }
}

fn check_action<A: GovernanceAction>(action: u8) -> Result<(), PayloadError> {
    if A::is_known(action) {
        Ok(())
    } else {
        Err(PayloadError::UnknownGovernanceAction {
            module: A::NAME,
            action,
        })
    }
}

fn check_utf8(field: &'static str, value: &[u8]) -> Result<(), PayloadError> {
    std::str::from_utf8(value)
        .map(|_| ())
        .map_err(|_| PayloadError::InvalidUtf8 { field })
}
