//! The end to end pipeline: decode, verify, interpret, check governance and record the sequence.

use std::{future::Future, sync::Arc};

use log::{debug, warn};

use crate::{
    config::{Config, ReplayPolicy},
    guardian::{GuardianSet, GuardianSetResolver},
    payload::{decode_payload, TypedMessage},
    sequence::{MessageId, SequenceError, SequenceRegistry},
    vaa::{decode_envelope_with_limit, Body, Digest, VaaBody},
    verify::{verify_async_with, verify_with, Secp256k1, SignatureRecovery, VerifyError},
    VaaError,
};

/// A verified VAA with its payload decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedVaa {
    pub id: MessageId,
    pub digest: Digest,
    pub body: Body<TypedMessage>,

    /// Set when the sequence had already been observed and the replay policy let it through.
    pub replay: bool,
}

impl ProcessedVaa {
    pub fn message(&self) -> &TypedMessage {
        &self.body.payload
    }

    pub fn into_message(self) -> TypedMessage {
        self.body.payload
    }
}

/// Runs VAAs through the pipeline with a fixed configuration and a shared sequence registry.
#[derive(Debug)]
pub struct Processor<S = Secp256k1> {
    config: Config,
    registry: Arc<SequenceRegistry>,
    recovery: S,
}

impl Processor<Secp256k1> {
    pub fn new(config: Config) -> Self {
        Self::with_registry(config, Arc::default())
    }

    /// A processor that records sequences in `registry`, which may be shared with other
    /// processors.
    pub fn with_registry(config: Config, registry: Arc<SequenceRegistry>) -> Self {
        Processor {
            config,
            registry,
            recovery: Secp256k1,
        }
    }
}

impl<S: SignatureRecovery> Processor<S> {
    /// Replaces the signature recovery backend.
    pub fn with_recovery<T: SignatureRecovery>(self, recovery: T) -> Processor<T> {
        Processor {
            config: self.config,
            registry: self.registry,
            recovery,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SequenceRegistry> {
        &self.registry
    }

    /// Processes `raw` at time `now` (seconds since UNIX epoch).
    pub fn process<R>(&self, raw: &[u8], resolver: &R, now: u64) -> Result<ProcessedVaa, VaaError>
    where
        R: GuardianSetResolver + ?Sized,
    {
        let res = decode_envelope_with_limit(raw, self.config.max_vaa_size)
            .map_err(VaaError::from)
            .and_then(|env| Ok(verify_with(env, resolver, now, &self.recovery)?))
            .and_then(|body| finish(&self.config, &self.registry, body));

        res.inspect_err(|e| warn!("rejected VAA: {e}"))
    }

    /// Like `process`, with the guardian set supplied by an asynchronous lookup.
    pub async fn process_async<F, Fut>(
        &self,
        raw: &[u8],
        resolve: F,
        now: u64,
    ) -> Result<ProcessedVaa, VaaError>
    where
        F: FnOnce(u32) -> Fut,
        Fut: Future<Output = Option<Arc<GuardianSet>>>,
    {
        let res = match decode_envelope_with_limit(raw, self.config.max_vaa_size) {
            Ok(env) => verify_async_with(env, resolve, now, &self.recovery)
                .await
                .map_err(VaaError::from)
                .and_then(|body| finish(&self.config, &self.registry, body)),
            Err(e) => Err(e.into()),
        };

        res.inspect_err(|e| warn!("rejected VAA: {e}"))
    }
}

/// Decodes, verifies and interprets `raw` with the default configuration, recording its
/// sequence in `registry`. Replays are logged and still returned.
pub fn process_vaa<R>(
    raw: &[u8],
    resolver: &R,
    registry: &SequenceRegistry,
    now: u64,
) -> Result<TypedMessage, VaaError>
where
    R: GuardianSetResolver + ?Sized,
{
    let config = Config::default();
    let env = decode_envelope_with_limit(raw, config.max_vaa_size)?;
    let body = verify_with(env, resolver, now, &Secp256k1)?;

    finish(&config, registry, body).map(ProcessedVaa::into_message)
}

/// Like `process_vaa`, with the guardian set supplied by an asynchronous lookup.
pub async fn process_vaa_async<F, Fut>(
    raw: &[u8],
    resolve: F,
    registry: &SequenceRegistry,
    now: u64,
) -> Result<TypedMessage, VaaError>
where
    F: FnOnce(u32) -> Fut,
    Fut: Future<Output = Option<Arc<GuardianSet>>>,
{
    let config = Config::default();
    let env = decode_envelope_with_limit(raw, config.max_vaa_size)?;
    let body = verify_async_with(env, resolve, now, &Secp256k1).await?;

    finish(&config, registry, body).map(ProcessedVaa::into_message)
}

fn finish(
    config: &Config,
    registry: &SequenceRegistry,
    body: VaaBody,
) -> Result<ProcessedVaa, VaaError> {
    let digest = body.digest().map_err(VerifyError::Body)?;
    let message = decode_payload(body.payload.get())?;

    if let Some(target) = message.governance_chain() {
        if !config.is_governance_emitter(body.emitter_chain, &body.emitter_address) {
            return Err(VaaError::InvalidGovernanceEmitter {
                chain: body.emitter_chain,
                address: body.emitter_address,
            });
        }

        if !config.accepts_governance_target(target) {
            return Err(VaaError::GovernanceTargetMismatch {
                target,
                expected: config.chain,
            });
        }
    }

    let id = MessageId {
        emitter_chain: body.emitter_chain,
        emitter_address: body.emitter_address,
        sequence: body.sequence,
    };

    let replay = match registry.observe(id.emitter_chain, id.emitter_address, id.sequence) {
        Ok(()) => false,
        Err(SequenceError::Replay { next_expected, .. })
            if config.replay_policy == ReplayPolicy::Warn =>
        {
            warn!("VAA {id} replays an observed sequence, next expected is {next_expected}");
            true
        }
        Err(e) => return Err(e.into()),
    };

    debug!("processed VAA {id} ({})", hex::encode(digest.hash));

    Ok(ProcessedVaa {
        id,
        digest,
        body: body.with_payload(message),
        replay,
    })
}
