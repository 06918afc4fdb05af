//! VAA's represent a collection of signatures combined with a message and its metadata. VAA's are
//! used as a form of proof; by submitting a VAA to a target contract, the receiving contract can
//! make assumptions about the validity of state on the source chain.
//!
//! The wire layout is a header (version, guardian set index, signatures) followed by the body.
//! All integers are big-endian and the payload takes up whatever bytes remain after the body's
//! fixed fields.

use serde::{Deserialize, Serialize};
use serde_wormhole::RawMessage;
use sha3::Digest as Sha3Digest;
use thiserror::Error;

use crate::{Address, Chain};

/// The only envelope version currently produced by the guardian network.
pub const VAA_VERSION: u8 = 1;

/// Envelopes larger than this are rejected before any parsing takes place.
pub const MAX_VAA_SIZE: usize = 256 * 1024;

// version + guardian set index + signature count.
const HEADER_PREFIX_LEN: usize = 6;

/// Signatures are typical ECDSA signatures prefixed with a Guardian position. These have the
/// following byte layout:
/// ```markdown
/// 0  .. 64: Signature   (ECDSA)
/// 64 .. 65: Recovery ID (ECDSA)
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Signature {
    pub index: u8,
    #[serde(with = "crate::serde_array")]
    pub signature: [u8; 65],
}

impl Default for Signature {
    fn default() -> Self {
        Self {
            index: 0,
            signature: [0; 65],
        }
    }
}

/// The core VAA itself. This structure is what is received by a contract on the receiving side of
/// a wormhole message passing flow.  The generic parameter `P` represents the payload.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct Vaa<P> {
    // `#[serde(flatten)]` would turn this into a map, which the wormhole data format cannot
    // encode, so the header and body fields are repeated here.
    pub version: u8,
    pub guardian_set_index: u32,
    pub signatures: Vec<Signature>,
    pub timestamp: u32,
    pub nonce: u32,
    pub emitter_chain: Chain,
    pub emitter_address: Address,
    pub sequence: u64,
    pub consistency_level: u8,
    pub payload: P,
}

/// A VAA whose payload has not been interpreted yet.
pub type VaaEnvelope = Vaa<Box<RawMessage>>;

/// A body whose payload has not been interpreted yet.
pub type VaaBody = Body<Box<RawMessage>>;

/// The header for a VAA.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub guardian_set_index: u32,
    pub signatures: Vec<Signature>,
}

/// The body for a VAA. This is the part the guardians sign.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct Body<P> {
    /// Seconds since UNIX epoch.
    pub timestamp: u32,
    pub nonce: u32,
    pub emitter_chain: Chain,
    pub emitter_address: Address,
    pub sequence: u64,
    pub consistency_level: u8,
    pub payload: P,
}

/// Digest data for the Body.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest {
    /// Keccak256 of the serialized body. This is what identifies a VAA across the network.
    pub hash: [u8; 32],

    /// Keccak256 of `hash`. secp256k1 signing hashes its input before signing, so guardians end
    /// up signing the hash of the hash. Public key recovery must be done against this value.
    pub secp256k_hash: [u8; 32],
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("envelope is {size} bytes, larger than the {limit} byte limit")]
    EnvelopeTooLarge { size: usize, limit: usize },
    #[error("envelope is truncated")]
    Truncated,
    #[error("unsupported VAA version {0}")]
    UnsupportedVersion(u8),
    #[error("VAA payload is empty")]
    EmptyPayload,
    #[error("malformed envelope: {0}")]
    Malformed(#[source] serde_wormhole::Error),
}

impl From<serde_wormhole::Error> for DecodeError {
    fn from(e: serde_wormhole::Error) -> Self {
        match e {
            serde_wormhole::Error::Eof => DecodeError::Truncated,
            e => DecodeError::Malformed(e),
        }
    }
}

/// Calculates the digest of an already serialized VAA body.
pub fn digest(body: &[u8]) -> Digest {
    let hash: [u8; 32] = sha3::Keccak256::digest(body).into();
    let secp256k_hash: [u8; 32] = sha3::Keccak256::digest(hash).into();

    Digest {
        hash,
        secp256k_hash,
    }
}

/// Decodes an envelope, rejecting anything larger than `MAX_VAA_SIZE`.
pub fn decode_envelope(bytes: &[u8]) -> Result<VaaEnvelope, DecodeError> {
    decode_envelope_with_limit(bytes, MAX_VAA_SIZE)
}

/// Decodes an envelope, rejecting anything larger than `limit` before looking at its contents.
pub fn decode_envelope_with_limit(bytes: &[u8], limit: usize) -> Result<VaaEnvelope, DecodeError> {
    if bytes.len() > limit {
        return Err(DecodeError::EnvelopeTooLarge {
            size: bytes.len(),
            limit,
        });
    }

    if bytes.len() < HEADER_PREFIX_LEN {
        return Err(DecodeError::Truncated);
    }

    if bytes[0] != VAA_VERSION {
        return Err(DecodeError::UnsupportedVersion(bytes[0]));
    }

    let vaa: VaaEnvelope = serde_wormhole::from_slice(bytes)?;
    if vaa.payload.get().is_empty() {
        return Err(DecodeError::EmptyPayload);
    }

    Ok(vaa)
}

/// Encodes an envelope. `decode_envelope(&encode_envelope(v)?)` reproduces `v` exactly.
pub fn encode_envelope<P: Serialize>(vaa: &Vaa<P>) -> Result<Vec<u8>, serde_wormhole::Error> {
    serde_wormhole::to_vec(vaa)
}

impl<P> From<Vaa<P>> for (Header, Body<P>) {
    fn from(v: Vaa<P>) -> Self {
        (
            Header {
                version: v.version,
                guardian_set_index: v.guardian_set_index,
                signatures: v.signatures,
            },
            Body {
                timestamp: v.timestamp,
                nonce: v.nonce,
                emitter_chain: v.emitter_chain,
                emitter_address: v.emitter_address,
                sequence: v.sequence,
                consistency_level: v.consistency_level,
                payload: v.payload,
            },
        )
    }
}

impl<P> From<(Header, Body<P>)> for Vaa<P> {
    fn from((hdr, body): (Header, Body<P>)) -> Self {
        Vaa {
            version: hdr.version,
            guardian_set_index: hdr.guardian_set_index,
            signatures: hdr.signatures,
            timestamp: body.timestamp,
            nonce: body.nonce,
            emitter_chain: body.emitter_chain,
            emitter_address: body.emitter_address,
            sequence: body.sequence,
            consistency_level: body.consistency_level,
            payload: body.payload,
        }
    }
}

impl<P> Body<P> {
    /// Replace the payload of the body.  Useful when parsing the payload needs to be delayed.
    pub fn with_payload<U>(self, p: U) -> Body<U> {
        Body {
            timestamp: self.timestamp,
            nonce: self.nonce,
            emitter_chain: self.emitter_chain,
            emitter_address: self.emitter_address,
            sequence: self.sequence,
            consistency_level: self.consistency_level,
            payload: p,
        }
    }
}

impl<P: Serialize> Body<P> {
    /// Serializes the body in wire format and hashes it. See `Digest` for the two hashes.
    pub fn digest(&self) -> Result<Digest, serde_wormhole::Error> {
        let hash: [u8; 32] = {
            let mut h = sha3::Keccak256::default();
            serde_wormhole::to_writer(&mut h, self)?;
            h.finalize().into()
        };
        let secp256k_hash: [u8; 32] = sha3::Keccak256::digest(hash).into();

        Ok(Digest {
            hash,
            secp256k_hash,
        })
    }
}
