//! Guardian signature verification.
//!
//! A VAA is valid when every signature recovers to the guardian at the position it claims, the
//! positions are strictly increasing and there are at least `quorum` of them. Checks run in a
//! fixed order and stop at the first failure:
//!
//! 1. resolve the guardian set and check its expiration
//! 2. hash the body
//! 3. check signature ordering
//! 4. recover and compare every signer
//! 5. check quorum

use std::{future::Future, sync::Arc};

use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey};
use log::debug;
use sha3::{Digest as Sha3Digest, Keccak256};
use thiserror::Error;

use crate::{
    guardian::{GuardianSet, GuardianSetResolver},
    vaa::{Header, Signature, VaaBody, VaaEnvelope},
    GuardianAddress,
};

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("unknown guardian set {0}")]
    UnknownGuardianSet(u32),
    #[error("guardian set {index} expired at {expired_at}")]
    GuardianSetExpired { index: u32, expired_at: u64 },
    #[error("failed to serialize VAA body")]
    Body(#[source] serde_wormhole::Error),
    #[error("signatures are not in strictly increasing guardian order at guardian {index}")]
    UnorderedSignatures { index: u8 },
    #[error("signature from guardian {index} is outside a guardian set of {len}")]
    GuardianIndexOutOfRange { index: u8, len: usize },
    #[error("signature from guardian {index} is malformed")]
    MalformedSignature { index: u8 },
    #[error("signature from guardian {index} does not match the guardian's key")]
    SignatureMismatch { index: u8 },
    #[error("got {signatures} valid signatures, need {quorum}")]
    QuorumNotMet { signatures: usize, quorum: usize },
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("public key recovery failed")]
pub struct RecoveryError;

/// Recovers the address that produced a signature.
pub trait SignatureRecovery {
    /// Returns the guardian address that signed `digest` with `signature` (r, s, recovery id).
    fn recover(
        &self,
        digest: &[u8; 32],
        signature: &[u8; 65],
    ) -> Result<GuardianAddress, RecoveryError>;
}

/// secp256k1 public key recovery, as done by `ecrecover`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Secp256k1;

impl SignatureRecovery for Secp256k1 {
    fn recover(
        &self,
        digest: &[u8; 32],
        signature: &[u8; 65],
    ) -> Result<GuardianAddress, RecoveryError> {
        let sig = EcdsaSignature::from_slice(&signature[..64]).map_err(|_| RecoveryError)?;
        let id = RecoveryId::from_byte(signature[64]).ok_or(RecoveryError)?;
        let key =
            VerifyingKey::recover_from_prehash(digest, &sig, id).map_err(|_| RecoveryError)?;

        Ok(address_of(&key))
    }
}

/// The guardian address of a public key: the last 20 bytes of the Keccak256 hash of the
/// uncompressed point, without its 0x04 tag.
pub fn address_of(key: &VerifyingKey) -> GuardianAddress {
    let point = key.to_encoded_point(false);
    let hash = Keccak256::digest(&point.as_bytes()[1..]);

    let mut addr = [0u8; 20];
    addr.copy_from_slice(&hash[12..]);
    GuardianAddress(addr)
}

/// Verifies `envelope` with secp256k1 recovery and returns its body.
pub fn verify<R>(envelope: VaaEnvelope, resolver: &R, now: u64) -> Result<VaaBody, VerifyError>
where
    R: GuardianSetResolver + ?Sized,
{
    verify_with(envelope, resolver, now, &Secp256k1)
}

/// Like `verify`, with the guardian set supplied by an asynchronous lookup.
pub async fn verify_async<F, Fut>(
    envelope: VaaEnvelope,
    resolve: F,
    now: u64,
) -> Result<VaaBody, VerifyError>
where
    F: FnOnce(u32) -> Fut,
    Fut: Future<Output = Option<Arc<GuardianSet>>>,
{
    verify_async_with(envelope, resolve, now, &Secp256k1).await
}

/// Like `verify_with`, with the guardian set supplied by an asynchronous lookup. The lookup is
/// the only point where verification may suspend.
pub async fn verify_async_with<F, Fut, S>(
    envelope: VaaEnvelope,
    resolve: F,
    now: u64,
    recovery: &S,
) -> Result<VaaBody, VerifyError>
where
    F: FnOnce(u32) -> Fut,
    Fut: Future<Output = Option<Arc<GuardianSet>>>,
    S: SignatureRecovery + ?Sized,
{
    let set = resolve(envelope.guardian_set_index).await;
    check(envelope, set, now, recovery)
}

/// Verifies `envelope` using `recovery` to recover signers.
pub fn verify_with<R, S>(
    envelope: VaaEnvelope,
    resolver: &R,
    now: u64,
    recovery: &S,
) -> Result<VaaBody, VerifyError>
where
    R: GuardianSetResolver + ?Sized,
    S: SignatureRecovery + ?Sized,
{
    let set = resolver.resolve(envelope.guardian_set_index);
    check(envelope, set, now, recovery)
}

fn check<S>(
    envelope: VaaEnvelope,
    set: Option<Arc<GuardianSet>>,
    now: u64,
    recovery: &S,
) -> Result<VaaBody, VerifyError>
where
    S: SignatureRecovery + ?Sized,
{
    let (header, body): (Header, VaaBody) = envelope.into();

    let set = set.ok_or(VerifyError::UnknownGuardianSet(header.guardian_set_index))?;
    if let Some(expired_at) = set.expiration_time.filter(|&t| now > t) {
        return Err(VerifyError::GuardianSetExpired {
            index: set.index,
            expired_at,
        });
    }

    let digest = body.digest().map_err(VerifyError::Body)?;

    check_ordering(&header.signatures)?;

    for sig in &header.signatures {
        check_signature(&set, &digest.secp256k_hash, sig, recovery)?;
    }

    let quorum = set.quorum();
    if header.signatures.len() < quorum {
        return Err(VerifyError::QuorumNotMet {
            signatures: header.signatures.len(),
            quorum,
        });
    }

    debug!(
        "verified {}/{} signatures from guardian set {} for {}/{}/{}",
        header.signatures.len(),
        set.addresses.len(),
        set.index,
        u16::from(body.emitter_chain),
        body.emitter_address,
        body.sequence
    );

    Ok(body)
}

fn check_ordering(signatures: &[Signature]) -> Result<(), VerifyError> {
    for pair in signatures.windows(2) {
        if pair[1].index <= pair[0].index {
            return Err(VerifyError::UnorderedSignatures {
                index: pair[1].index,
            });
        }
    }

    Ok(())
}

/// Checks that `sig` was produced over `digest` by the guardian it names in `set`.
pub fn check_signature<S>(
    set: &GuardianSet,
    digest: &[u8; 32],
    sig: &Signature,
    recovery: &S,
) -> Result<(), VerifyError>
where
    S: SignatureRecovery + ?Sized,
{
    let expected = set
        .addresses
        .get(usize::from(sig.index))
        .ok_or(VerifyError::GuardianIndexOutOfRange {
            index: sig.index,
            len: set.addresses.len(),
        })?;

    let signer = recovery
        .recover(digest, &sig.signature)
        .map_err(|_| VerifyError::MalformedSignature { index: sig.index })?;

    if signer != *expected {
        return Err(VerifyError::SignatureMismatch { index: sig.index });
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use k256::ecdsa::SigningKey;

    use super::*;
    use crate::{vaa::digest, GuardianSetStore};

    fn key(i: u8) -> SigningKey {
        let mut b = [0u8; 32];
        b[31] = i;
        b[0] = 0x42;
        SigningKey::from_slice(&b).unwrap()
    }

    fn sign(k: &SigningKey, prehash: &[u8; 32]) -> [u8; 65] {
        let (sig, id) = k.sign_prehash_recoverable(prehash).unwrap();
        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&sig.to_bytes());
        out[64] = id.to_byte();
        out
    }

    #[test]
    fn secp256k1_recovers_signer() {
        let k = key(1);
        let d = digest(b"hello").secp256k_hash;
        let sig = sign(&k, &d);

        assert_eq!(
            address_of(k.verifying_key()),
            Secp256k1.recover(&d, &sig).unwrap()
        );

        let mut bad = sig;
        bad[64] = 9;
        assert_eq!(RecoveryError, Secp256k1.recover(&d, &bad).unwrap_err());
    }

    #[test]
    fn ordering() {
        let sig = |index| Signature {
            index,
            ..Default::default()
        };

        assert!(check_ordering(&[]).is_ok());
        assert!(check_ordering(&[sig(0), sig(2), sig(5)]).is_ok());
        assert!(matches!(
            check_ordering(&[sig(0), sig(2), sig(2)]),
            Err(VerifyError::UnorderedSignatures { index: 2 })
        ));
        assert!(matches!(
            check_ordering(&[sig(3), sig(1)]),
            Err(VerifyError::UnorderedSignatures { index: 1 })
        ));
    }

    // Accepts every signature whose first byte equals the guardian index it claims.
    struct FakeRecovery<'a>(&'a GuardianSet);

    impl SignatureRecovery for FakeRecovery<'_> {
        fn recover(
            &self,
            _digest: &[u8; 32],
            signature: &[u8; 65],
        ) -> Result<GuardianAddress, RecoveryError> {
            self.0
                .addresses
                .get(usize::from(signature[0]))
                .copied()
                .ok_or(RecoveryError)
        }
    }

    fn fake_envelope(gsi: u32, indices: &[u8]) -> VaaEnvelope {
        VaaEnvelope {
            version: 1,
            guardian_set_index: gsi,
            signatures: indices
                .iter()
                .map(|&index| {
                    let mut signature = [0u8; 65];
                    signature[0] = index;
                    Signature { index, signature }
                })
                .collect(),
            payload: serde_wormhole::RawMessage::new(b"payload").to_owned(),
            ..Default::default()
        }
    }

    fn addrs(n: u8) -> Vec<GuardianAddress> {
        (1..=n).map(|i| GuardianAddress([i; 20])).collect()
    }

    #[test]
    fn pluggable_recovery() {
        let set = GuardianSet::new(0, addrs(4)).unwrap();
        let store = GuardianSetStore::new(set.clone(), 10);
        let fake = FakeRecovery(&set);

        let body = verify_with(fake_envelope(0, &[0, 1, 3]), &store, 0, &fake).unwrap();
        assert_eq!(b"payload", body.payload.get());

        assert!(matches!(
            verify_with(fake_envelope(0, &[0, 1]), &store, 0, &fake),
            Err(VerifyError::QuorumNotMet {
                signatures: 2,
                quorum: 3
            })
        ));
        assert!(matches!(
            verify_with(fake_envelope(0, &[0, 1, 4]), &store, 0, &fake),
            Err(VerifyError::GuardianIndexOutOfRange { index: 4, len: 4 })
        ));
        assert!(matches!(
            verify_with(fake_envelope(1, &[0, 1, 2]), &store, 0, &fake),
            Err(VerifyError::UnknownGuardianSet(1))
        ));
    }

    #[test]
    fn mismatched_signer() {
        let set = GuardianSet::new(0, addrs(3)).unwrap();
        let store = GuardianSetStore::new(set.clone(), 10);
        let fake = FakeRecovery(&set);

        let mut env = fake_envelope(0, &[0, 1, 2]);
        env.signatures[1].signature[0] = 2;

        assert!(matches!(
            verify_with(env, &store, 0, &fake),
            Err(VerifyError::SignatureMismatch { index: 1 })
        ));
    }

    #[test]
    fn expired_set() {
        let mut store = GuardianSetStore::new(GuardianSet::new(0, addrs(1)).unwrap(), 10);
        let old = store.current();
        let _ = store.upgrade(1, addrs(2), 100).unwrap();
        let fake = FakeRecovery(&old);

        assert!(verify_with(fake_envelope(0, &[0]), &store, 110, &fake).is_ok());
        assert!(matches!(
            verify_with(fake_envelope(0, &[0]), &store, 111, &fake),
            Err(VerifyError::GuardianSetExpired {
                index: 0,
                expired_at: 110
            })
        ));
    }
}
