//! Issuer: the write side of the license lifecycle — minting, consuming a
//! seat, regenerating a key for an existing client, and bulk minting a batch
//! of fresh keys. Ties the Token Codec, Policy Engine, `TokenRecordStore`,
//! and `Clock` together behind one entry point.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::clock::Clock;
use crate::codec::{self, client_binding};
use crate::metadata::{EmbeddedMetadata, FeatureValue};
use crate::policy::{self, RejectionKind, ValidationContext, Verdict};
use crate::record::{StoreError, TokenRecord, TokenRecordStore};

/// Identifying fields of the client a license is issued to. Only used to
/// derive the client binding baked into the token; not persisted verbatim.
#[derive(Clone, Debug)]
pub struct ClientIdentity {
    pub client_id: u32,
    pub client_name: String,
    pub email: String,
}

/// The terms of a single license being minted.
#[derive(Clone, Debug)]
pub struct IssuanceParameters {
    pub expires: u32,
    pub max_seats: u32,
    pub features: BTreeMap<String, FeatureValue>,
}

#[derive(Debug, Error)]
pub enum IssuerError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("bulk mint count must be between 1 and {max}, got {got}")]
    BulkCountOutOfRange { got: usize, max: usize },
}

/// Upper bound on a single `bulk_mint` call, matching the reference
/// implementation's batch ceiling.
pub const MAX_BULK_MINT: usize = 1000;

/// Computes the advisory, forensic-only email hash: an MD5 digest of the
/// email, truncated to its first 8 hex characters. Never consulted by the
/// Policy Engine — it exists purely so support tooling can correlate a
/// token back to an email without storing the email itself.
fn email_hash(email: &str) -> String {
    if email.is_empty() {
        return String::new();
    }
    let digest = md5::Md5::digest(email.as_bytes());
    let full_hex = format!("{digest:x}");
    full_hex[..8].to_string()
}

/// Derives a hardware fingerprint from a mapping of system-info components:
/// keys are sorted lexicographically, joined as `"{key}:{value}"` pairs with
/// `|`, and the result is SHA-256 hashed and hex-encoded. Pure and
/// deterministic — callers collect the components however fits their
/// platform.
pub fn hardware_fingerprint_of(system_info: &BTreeMap<String, String>) -> String {
    let joined = system_info
        .iter()
        .map(|(key, value)| format!("{key}:{value}"))
        .collect::<Vec<_>>()
        .join("|");
    let digest = Sha256::digest(joined.as_bytes());
    format!("{digest:x}")
}

fn record_not_found() -> Verdict {
    Verdict::Rejection {
        kind: RejectionKind::RecordNotFound,
        message: "License key not found".to_string(),
    }
}

fn record_expires_at(expires: u32) -> Option<u64> {
    if expires == 0 {
        None
    } else {
        Some(expires as u64)
    }
}

/// Logs a mint/consume outcome at `debug` (valid) or `warn` (rejected),
/// keyed on client id and verdict kind only — never the token string or
/// signing secret.
fn log_verdict(operation: &str, client_id: Option<u32>, verdict: &Verdict) {
    match verdict {
        Verdict::Valid { remaining_seats } => log::debug!(
            "{operation} valid: client_id={client_id:?} remaining_seats={remaining_seats}"
        ),
        Verdict::Rejection { kind, .. } => {
            log::warn!("{operation} rejected: client_id={client_id:?} kind={kind:?}")
        }
    }
}

/// Ties the Token Codec, Policy Engine, and external collaborators together.
pub struct Issuer<S: TokenRecordStore, C: Clock> {
    secret: Vec<u8>,
    store: S,
    clock: C,
}

impl<S: TokenRecordStore, C: Clock> Issuer<S, C> {
    pub fn new(secret: Vec<u8>, store: S, clock: C) -> Self {
        Self { secret, store, clock }
    }

    /// Mints a fresh license token for `identity` under `params`, persists
    /// its record, and returns the formatted token string.
    pub fn mint(
        &self,
        identity: &ClientIdentity,
        params: &IssuanceParameters,
    ) -> Result<String, IssuerError> {
        self.mint_at(identity, params, self.clock.now())
    }

    /// Computes the token string for `identity`/`params` at `issued_ts`,
    /// without touching the store. Pure composition of the Token Codec —
    /// `mint_at` and `regenerate` both build on this, the latter folding the
    /// result into a record it constructs itself rather than a fresh one.
    fn build_token(&self, identity: &ClientIdentity, params: &IssuanceParameters, issued_ts: u64) -> String {
        let binding = client_binding(identity.client_id, &identity.client_name, &identity.email);
        let meta = EmbeddedMetadata {
            client_id: identity.client_id,
            email_hash: email_hash(&identity.email),
            expires: params.expires,
            max_seats: params.max_seats,
            features: params.features.clone(),
            issued: issued_ts as u32,
        };
        codec::encode(&self.secret, issued_ts as u32, &binding, &meta)
    }

    fn mint_at(
        &self,
        identity: &ClientIdentity,
        params: &IssuanceParameters,
        issued_ts: u64,
    ) -> Result<String, IssuerError> {
        let token = self.build_token(identity, params, issued_ts);
        let record_expires_at = record_expires_at(params.expires);
        self.store
            .insert(TokenRecord::new(token.clone(), identity.client_id, record_expires_at))?;
        log::debug!(
            "minted license token for client_id={} max_seats={}",
            identity.client_id,
            params.max_seats
        );
        Ok(token)
    }

    /// Evaluates `token` against its stored record and, if valid, atomically
    /// increments usage and stamps `last_used`. The whole load-validate-store
    /// sequence runs inside `TokenRecordStore::consume`'s single critical
    /// section, giving per-record linearizability even under concurrent
    /// callers. A token with no matching record yields
    /// `Verdict::Rejection { kind: RecordNotFound, .. }` rather than a hard
    /// error — the caller observes a uniform rejection either way.
    pub fn consume_once(&self, token: &str, ctx: &ValidationContext) -> Result<Verdict, IssuerError> {
        let mut client_id = None;
        let result = self.store.consume(token, ctx.now, |record| {
            client_id = Some(record.client_id);
            policy::evaluate(token, &self.secret, record, ctx)
        });
        let verdict = match result {
            Ok(verdict) => verdict,
            Err(StoreError::NotFound) => record_not_found(),
            Err(err) => return Err(err.into()),
        };
        log_verdict("consume_once", client_id, &verdict);
        Ok(verdict)
    }

    /// Validates `token` without consuming a seat.
    pub fn validate(&self, token: &str, ctx: &ValidationContext) -> Result<Verdict, IssuerError> {
        let verdict = match self.find_record(token)? {
            Some(record) => {
                let verdict = policy::evaluate(token, &self.secret, &record, ctx);
                log_verdict("validate", Some(record.client_id), &verdict);
                verdict
            }
            None => {
                let verdict = record_not_found();
                log_verdict("validate", None, &verdict);
                verdict
            }
        };
        Ok(verdict)
    }

    fn find_record(&self, token: &str) -> Result<Option<TokenRecord>, IssuerError> {
        match self.store.find(token) {
            Ok(record) => Ok(Some(record)),
            Err(StoreError::NotFound) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Mints a replacement token for the same client and terms, carries the
    /// old record's mutable state over verbatim — `usage_count`, `last_used`,
    /// `hardware_fingerprint`, `ip_allowlist`, `host_allowlist` are all
    /// preserved, only `token` (and the terms passed in `params`) change —
    /// and deactivates the old record so it can no longer be consumed.
    /// The usage counter is explicitly *not* reset by regeneration.
    pub fn regenerate(
        &self,
        old_token: &str,
        identity: &ClientIdentity,
        params: &IssuanceParameters,
    ) -> Result<String, IssuerError> {
        let old_record = self.store.find(old_token)?;
        let new_token = self.build_token(identity, params, self.clock.now());
        let new_record = TokenRecord {
            token: new_token.clone(),
            client_id: identity.client_id,
            is_active: true,
            record_expires_at: record_expires_at(params.expires),
            ..old_record
        };
        self.store.insert(new_record)?;
        self.store.update_active(old_token, false)?;
        log::debug!("regenerated license token for client_id={}", identity.client_id);
        Ok(new_token)
    }

    /// Mints `count` fresh tokens for `identity`, one per entry in `batch`.
    /// Each successive token's `issued_ts` is stepped forward by one second
    /// so that batch members remain individually distinguishable and
    /// auditable even when minted within the same wall-clock second.
    pub fn bulk_mint(
        &self,
        identity: &ClientIdentity,
        batch: &[IssuanceParameters],
    ) -> Result<Vec<String>, IssuerError> {
        if batch.is_empty() || batch.len() > MAX_BULK_MINT {
            return Err(IssuerError::BulkCountOutOfRange {
                got: batch.len(),
                max: MAX_BULK_MINT,
            });
        }
        let base_ts = self.clock.now();
        let mut tokens = Vec::with_capacity(batch.len());
        for (offset, params) in batch.iter().enumerate() {
            let token = self.mint_at(identity, params, base_ts + offset as u64)?;
            tokens.push(token);
        }
        Ok(tokens)
    }
}
