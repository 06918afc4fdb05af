//! Pure Rust primitives for handling Wormhole VAAs.
//!
//! This crate decodes untrusted VAA bytes, verifies their guardian signatures against a
//! versioned guardian set, and turns the payload into a typed message. It includes:
//!
//! - Constants containing known network data/addresses.
//! - The canonical 32 byte address codec for every supported chain family.
//! - Serde based codecs for the VAA envelope, token bridge messages and governance actions.
//! - A guardian set store, a signature verifier and a per-emitter sequence registry.
//! - `process_vaa`, which chains all of the above together.

#![deny(unused_results)]

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

pub mod address;
mod arraystring;
pub mod config;
pub mod core;
mod error;
pub mod governance;
pub mod guardian;
pub mod payload;
pub mod processor;
mod serde_array;
pub mod sequence;
pub mod token;
pub mod vaa;
pub mod verify;

pub use address::{from_canonical, to_canonical, AddressError};
pub use config::{Config, ReplayPolicy};
pub use error::VaaError;
pub use guardian::{GuardianSet, GuardianSetResolver, GuardianSetState, GuardianSetStore};
pub use payload::{decode_payload, encode_payload, PayloadError, TypedMessage};
pub use processor::{process_vaa, process_vaa_async, ProcessedVaa, Processor};
pub use sequence::{MessageId, SequenceError, SequenceRegistry};
pub use vaa::{decode_envelope, encode_envelope, DecodeError, Vaa, VaaEnvelope};
pub use verify::{verify, verify_async, Secp256k1, SignatureRecovery, VerifyError};
pub use wormhole_supported_chains::{AddressFamily, Chain};

/// The `GOVERNANCE_EMITTER` is a special address Wormhole guardians trust to observe governance
/// actions from. The value is "0000000000000000000000000000000000000000000000000000000000000004".
pub const GOVERNANCE_EMITTER: Address = Address([
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x04,
]);

/// The 20 byte Ethereum-style address derived from a guardian's secp256k1 public key.
#[derive(
    Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub struct GuardianAddress(pub [u8; 20]);

impl fmt::Display for GuardianAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("0x")?;
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }

        Ok(())
    }
}

/// Wormhole specifies addresses as 32 bytes. Addresses that are shorter, for example 20 byte
/// Ethereum addresses, are left zero padded to 32.
#[derive(
    Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub struct Address(pub [u8; 32]);

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }

        Ok(())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    /// Parses exactly 64 hex characters, with or without a leading `0x`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let mut buf = [0u8; 32];
        hex::decode_to_slice(s, &mut buf).map_err(|_| AddressError::InvalidHex(s.into()))?;

        Ok(Address(buf))
    }
}

/// Wormhole specifies an amount as a uint256 encoded in big-endian order.
#[derive(
    Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub struct Amount(pub [u8; 32]);

impl From<primitive_types::U256> for Amount {
    fn from(v: primitive_types::U256) -> Self {
        let mut buf = [0u8; 32];
        v.to_big_endian(&mut buf);
        Amount(buf)
    }
}

impl From<Amount> for primitive_types::U256 {
    fn from(v: Amount) -> Self {
        primitive_types::U256::from_big_endian(&v.0)
    }
}

impl From<u64> for Amount {
    fn from(v: u64) -> Self {
        primitive_types::U256::from(v).into()
    }
}
