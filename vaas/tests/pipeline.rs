use std::sync::Arc;

use futures::executor::block_on;
use k256::ecdsa::SigningKey;
use serde_wormhole::RawMessage;
use wormhole_vaas::{
    core::{Action as CoreAction, GovernancePacket as CorePacket},
    encode_envelope, encode_payload,
    guardian::GuardianSetError,
    process_vaa, process_vaa_async, token,
    vaa::{Body, Header, Signature},
    verify::address_of,
    Address, Chain, Config, GuardianSet, GuardianSetStore, SequenceError, SequenceRegistry,
    TypedMessage, Vaa, VaaError, VerifyError, GOVERNANCE_EMITTER,
};

const NOW: u64 = 1_700_000_000;

struct GuardianKeys {
    keys: Vec<SigningKey>,
}

impl GuardianKeys {
    fn new(n: u8) -> Self {
        Self::with_seed(0x17, n)
    }

    fn with_seed(seed: u8, n: u8) -> Self {
        let keys = (1..=n)
            .map(|i| {
                let mut secret = [seed; 32];
                secret[31] = i;
                SigningKey::from_slice(&secret).unwrap()
            })
            .collect();

        GuardianKeys { keys }
    }

    fn guardian_set(&self, index: u32) -> GuardianSet {
        let addresses = self
            .keys
            .iter()
            .map(|k| address_of(k.verifying_key()))
            .collect();
        GuardianSet::new(index, addresses).unwrap()
    }

    /// Signs `body` with the guardians at `indices`, in the order given.
    fn sign(&self, gsi: u32, body: Body<Box<RawMessage>>, indices: &[u8]) -> Vec<u8> {
        let digest = body.digest().unwrap();

        let signatures = indices
            .iter()
            .map(|&index| {
                let (sig, id) = self.keys[usize::from(index)]
                    .sign_prehash_recoverable(&digest.secp256k_hash)
                    .unwrap();

                let mut signature = [0u8; 65];
                signature[..64].copy_from_slice(&sig.to_bytes());
                signature[64] = id.to_byte();
                Signature { index, signature }
            })
            .collect();

        let header = Header {
            version: 1,
            guardian_set_index: gsi,
            signatures,
        };

        encode_envelope(&Vaa::from((header, body))).unwrap()
    }
}

fn body(
    emitter_chain: Chain,
    emitter_address: Address,
    sequence: u64,
    msg: &TypedMessage,
) -> Body<Box<RawMessage>> {
    Body {
        timestamp: 1_699_999_000,
        nonce: 7,
        emitter_chain,
        emitter_address,
        sequence,
        consistency_level: 1,
        payload: Box::<RawMessage>::from(encode_payload(msg).unwrap()),
    }
}

fn transfer() -> TypedMessage {
    TypedMessage::Token(token::Message::Transfer {
        amount: 1_000_000u64.into(),
        token_address: Address([0xaa; 32]),
        token_chain: Chain::Ethereum,
        recipient: Address([0xbb; 32]),
        recipient_chain: Chain::Solana,
        fee: 0u64.into(),
    })
}

#[test]
fn quorum_of_nineteen() {
    let keys = GuardianKeys::new(19);
    let store = GuardianSetStore::new(keys.guardian_set(3), 86_400);
    let registry = SequenceRegistry::new();
    let emitter = Address([0xe1; 32]);

    let twelve: Vec<u8> = (0..12).collect();
    let raw = keys.sign(3, body(Chain::Ethereum, emitter, 1, &transfer()), &twelve);
    assert!(matches!(
        process_vaa(&raw, &store, &registry, NOW),
        Err(VaaError::Verify(VerifyError::QuorumNotMet {
            signatures: 12,
            quorum: 13
        }))
    ));

    let thirteen: Vec<u8> = (0..19).step_by(3).chain([1, 4, 7, 10, 13, 16]).collect();
    let mut thirteen = thirteen;
    thirteen.sort_unstable();
    assert_eq!(13, thirteen.len());

    let raw = keys.sign(3, body(Chain::Ethereum, emitter, 1, &transfer()), &thirteen);
    assert_eq!(
        transfer(),
        process_vaa(&raw, &store, &registry, NOW).unwrap()
    );
}

#[test]
fn unordered_signatures() {
    let keys = GuardianKeys::new(3);
    let store = GuardianSetStore::new(keys.guardian_set(0), 86_400);
    let registry = SequenceRegistry::new();

    let raw = keys.sign(
        0,
        body(Chain::Ethereum, Address([1; 32]), 0, &transfer()),
        &[0, 2, 1],
    );
    assert!(matches!(
        process_vaa(&raw, &store, &registry, NOW),
        Err(VaaError::Verify(VerifyError::UnorderedSignatures { index: 1 }))
    ));

    let raw = keys.sign(
        0,
        body(Chain::Ethereum, Address([1; 32]), 0, &transfer()),
        &[0, 1, 1],
    );
    assert!(matches!(
        process_vaa(&raw, &store, &registry, NOW),
        Err(VaaError::Verify(VerifyError::UnorderedSignatures { index: 1 }))
    ));
}

#[test]
fn any_flipped_body_bit_breaks_the_signature() {
    let keys = GuardianKeys::new(1);
    let store = GuardianSetStore::new(keys.guardian_set(0), 86_400);
    let registry = SequenceRegistry::new();

    let raw = keys.sign(
        0,
        body(Chain::Ethereum, Address([1; 32]), 0, &transfer()),
        &[0],
    );

    // The body starts after the version, guardian set index, count and the one signature.
    let start = 6 + 66;
    let payload_end = raw.len() - start - 1;

    // Both ends of every field: timestamp, nonce, emitter chain, emitter address, sequence,
    // consistency level and payload.
    let offsets = [0, 3, 4, 7, 8, 9, 10, 41, 42, 49, 50, 51, payload_end];

    for offset in offsets {
        for bit in [0, 7] {
            let mut tampered = raw.clone();
            tampered[start + offset] ^= 1 << bit;

            assert!(
                matches!(
                    process_vaa(&tampered, &store, &registry, NOW),
                    Err(VaaError::Verify(VerifyError::SignatureMismatch { index: 0 }))
                ),
                "bit {bit} of body byte {offset}"
            );
        }
    }

    assert_eq!(None, registry.last_observed(Chain::Ethereum, Address([1; 32])));
    let _ = process_vaa(&raw, &store, &registry, NOW).unwrap();
}

#[test]
fn register_chain_end_to_end() {
    let keys = GuardianKeys::new(1);
    let store = GuardianSetStore::new(keys.guardian_set(0), 86_400);
    let registry = SequenceRegistry::new();

    let msg = TypedMessage::TokenBridgeGovernance(token::GovernancePacket {
        chain: Chain::Ethereum,
        action: token::Action::RegisterChain {
            chain: Chain::Terra,
            emitter_address: Address([0x3e; 32]),
        },
    });

    let raw = keys.sign(0, body(Chain::Solana, GOVERNANCE_EMITTER, 5, &msg), &[0]);
    assert_eq!(msg, process_vaa(&raw, &store, &registry, NOW).unwrap());
    assert_eq!(
        Some(5),
        registry.last_observed(Chain::Solana, GOVERNANCE_EMITTER)
    );

    // The same packet from anyone else is not governance.
    let raw = keys.sign(0, body(Chain::Solana, Address([9; 32]), 5, &msg), &[0]);
    assert!(matches!(
        process_vaa(&raw, &store, &registry, NOW),
        Err(VaaError::InvalidGovernanceEmitter {
            chain: Chain::Solana,
            ..
        })
    ));
}

#[test]
fn replays_are_reported_not_fatal() {
    let keys = GuardianKeys::new(1);
    let store = GuardianSetStore::new(keys.guardian_set(0), 86_400);
    let registry = SequenceRegistry::new();
    let emitter = Address([0xe1; 32]);

    let raw = keys.sign(0, body(Chain::Ethereum, emitter, 10, &transfer()), &[0]);
    let _ = process_vaa(&raw, &store, &registry, NOW).unwrap();

    // The default policy hands replays back to the caller.
    let _ = process_vaa(&raw, &store, &registry, NOW).unwrap();
    assert_eq!(11, registry.next_expected(Chain::Ethereum, emitter));

    assert_eq!(
        SequenceError::Replay {
            sequence: 10,
            next_expected: 11
        },
        registry.observe(Chain::Ethereum, emitter, 10).unwrap_err()
    );
}

#[test]
fn guardian_set_rotation() {
    let old_keys = GuardianKeys::new(1);
    let new_keys = GuardianKeys::new(4);
    let mut store = GuardianSetStore::new(old_keys.guardian_set(0), 100);
    let registry = SequenceRegistry::new();

    let _ = store
        .upgrade(1, new_keys.guardian_set(1).addresses, NOW)
        .unwrap();

    let raw = old_keys.sign(0, body(Chain::Ethereum, Address([1; 32]), 0, &transfer()), &[0]);
    let _ = process_vaa(&raw, &store, &registry, NOW + 100).unwrap();

    let raw = old_keys.sign(0, body(Chain::Ethereum, Address([1; 32]), 1, &transfer()), &[0]);
    assert!(matches!(
        process_vaa(&raw, &store, &registry, NOW + 101),
        Err(VaaError::Verify(VerifyError::GuardianSetExpired { index: 0, .. }))
    ));

    let raw = new_keys.sign(
        1,
        body(Chain::Ethereum, Address([1; 32]), 2, &transfer()),
        &[0, 1, 3],
    );
    let _ = process_vaa(&raw, &store, &registry, NOW + 101).unwrap();
}

#[test]
fn async_resolution() {
    let keys = GuardianKeys::new(2);
    let set = Arc::new(keys.guardian_set(0));
    let registry = SequenceRegistry::new();

    let raw = keys.sign(0, body(Chain::Ethereum, Address([1; 32]), 0, &transfer()), &[0, 1]);

    let msg = block_on(process_vaa_async(
        &raw,
        |index| {
            let set = set.clone();
            async move { (index == set.index).then_some(set) }
        },
        &registry,
        NOW,
    ))
    .unwrap();
    assert_eq!(transfer(), msg);
}

#[test]
fn guardian_set_upgrade_through_governance() {
    let old_keys = GuardianKeys::new(1);
    let new_keys = GuardianKeys::with_seed(0x42, 4);
    let mut store = GuardianSetStore::from_config(old_keys.guardian_set(0), &Config::default());
    let registry = SequenceRegistry::new();

    let upgrade = TypedMessage::CoreGovernance(CorePacket {
        chain: Chain::Any,
        action: CoreAction::GuardianSetUpgrade {
            new_index: 1,
            new_guardians: new_keys.guardian_set(1).addresses,
        },
    });
    let raw_upgrade = old_keys.sign(0, body(Chain::Solana, GOVERNANCE_EMITTER, 1, &upgrade), &[0]);

    let processed = process_vaa(&raw_upgrade, &store, &registry, NOW).unwrap();
    let TypedMessage::CoreGovernance(pkt) = processed else {
        panic!("not a core governance packet");
    };
    let active = store.apply(&pkt.action, NOW).unwrap();
    assert_eq!(1, active.index);
    assert_eq!(new_keys.guardian_set(1), *active);

    let raw = new_keys.sign(
        1,
        body(Chain::Ethereum, Address([1; 32]), 0, &transfer()),
        &[0, 1, 3],
    );
    assert_eq!(
        transfer(),
        process_vaa(&raw, &store, &registry, NOW).unwrap()
    );

    // The old guardian is not part of the new set.
    let raw = old_keys.sign(
        1,
        body(Chain::Ethereum, Address([1; 32]), 1, &transfer()),
        &[0],
    );
    assert!(matches!(
        process_vaa(&raw, &store, &registry, NOW),
        Err(VaaError::Verify(VerifyError::SignatureMismatch { index: 0 }))
    ));

    // Once the default 24 hour window has passed, the old set verifies nothing.
    assert!(matches!(
        process_vaa(&raw_upgrade, &store, &registry, NOW + 86_401),
        Err(VaaError::Verify(VerifyError::GuardianSetExpired { index: 0, .. }))
    ));
}

#[test]
fn fetched_sets_are_never_activated() {
    let keys = GuardianKeys::new(1);
    let outsider = GuardianKeys::with_seed(0x99, 1);
    let mut store = GuardianSetStore::new(keys.guardian_set(0), 86_400);
    let registry = SequenceRegistry::new();

    let fetched = block_on(store.resolve_with(7, |i| {
        let set = outsider.guardian_set(i);
        async move { Some(set) }
    }));
    assert_eq!(Err(GuardianSetError::NotActivated(7)), fetched);

    let raw = outsider.sign(
        7,
        body(Chain::Ethereum, Address([1; 32]), 0, &transfer()),
        &[0],
    );
    assert!(matches!(
        process_vaa(&raw, &store, &registry, u64::MAX),
        Err(VaaError::Verify(VerifyError::UnknownGuardianSet(7)))
    ));
    assert_eq!(None, registry.last_observed(Chain::Ethereum, Address([1; 32])));
}
