//! Conversion between chain native addresses and Wormhole's 32 byte canonical form.
//!
//! Shorter native addresses are left padded with zeroes. The inverse strips that padding again
//! for the families where the native width is known.

use thiserror::Error;
use wormhole_supported_chains::{AddressFamily, Chain};

use crate::Address;

const OPAQUE_MAX: &[usize] = &[32];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid address length for chain {chain}: got {actual} bytes, expected {expected:?}")]
    InvalidAddressLength {
        chain: Chain,
        expected: &'static [usize],
        actual: usize,
    },
    #[error("address {0} is not a valid 20 byte EVM address, the leading 12 bytes are not zero")]
    AddressNotEvmCompatible(Address),
    #[error("invalid hex address: {0}")]
    InvalidHex(String),
}

/// Canonicalizes `native` into a 32 byte Wormhole address for `chain`.
pub fn to_canonical(chain: Chain, native: &[u8]) -> Result<Address, AddressError> {
    let family = chain.address_family();
    let accepted = family.native_lengths();
    let ok = match family {
        AddressFamily::Opaque => native.len() <= 32,
        _ => accepted.contains(&native.len()),
    };

    if !ok {
        return Err(AddressError::InvalidAddressLength {
            chain,
            expected: if accepted.is_empty() { OPAQUE_MAX } else { accepted },
            actual: native.len(),
        });
    }

    let mut buf = [0u8; 32];
    buf[32 - native.len()..].copy_from_slice(native);
    Ok(Address(buf))
}

/// Recovers the native address bytes for `chain` from a canonical address.
///
/// EVM chains must have 12 leading zero bytes. Cosmos style chains yield 20 bytes when the
/// padding is present and the full 32 bytes otherwise. Everything else is returned unchanged.
///
/// The Cosmos rule is the one the cosmwasm contracts use to turn a canonical address back into
/// an account. A 32 byte contract address whose first 12 bytes happen to be zero therefore comes
/// back as 20 bytes, and does not round trip.
pub fn from_canonical(chain: Chain, canonical: &Address) -> Result<Vec<u8>, AddressError> {
    let (prefix, short) = canonical.0.split_at(12);
    let padded = prefix.iter().all(|&b| b == 0);

    match chain.address_family() {
        AddressFamily::Evm if padded => Ok(short.to_vec()),
        AddressFamily::Evm => Err(AddressError::AddressNotEvmCompatible(*canonical)),
        AddressFamily::Cosmos if padded => Ok(short.to_vec()),
        AddressFamily::Cosmos | AddressFamily::Fixed32 | AddressFamily::Opaque => {
            Ok(canonical.0.to_vec())
        }
    }
}
