//! `TokenRecord` and the narrow `TokenRecordStore` interface the core reads
//! and writes through. The store itself (persistence, admin mutations) is
//! an external collaborator; this module only defines the contract.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::policy::Verdict;

/// Per-token mutable state persisted by the external store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub token: String,
    pub client_id: u32,
    pub is_active: bool,
    pub record_expires_at: Option<u64>,
    pub usage_count: u32,
    pub last_used: Option<u64>,
    pub hardware_fingerprint: Option<String>,
    pub ip_allowlist: HashSet<String>,
    pub host_allowlist: HashSet<String>,
}

impl TokenRecord {
    /// A freshly minted, active record with no usage and no restrictions.
    pub fn new(token: String, client_id: u32, record_expires_at: Option<u64>) -> Self {
        Self {
            token,
            client_id,
            is_active: true,
            record_expires_at,
            usage_count: 0,
            last_used: None,
            hardware_fingerprint: None,
            ip_allowlist: HashSet::new(),
            host_allowlist: HashSet::new(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("token record not found")]
    NotFound,
    #[error("token record already exists")]
    DuplicateKey,
    #[error("token record storage error: {0}")]
    Io(String),
}

/// The external persistence interface. Implementations must make `save`
/// atomic with respect to concurrent `find`/`save` pairs on the same token.
///
/// `consume` is the load-validate-store primitive `Issuer::consume_once`
/// relies on for per-record linearizability: implementations must hold a
/// single per-record write lock for the entire span from reading the record,
/// through calling `evaluate`, through applying the usage increment — not
/// merely around `find` and `save` individually. Two concurrent `consume`
/// calls on the same token must never both observe the same pre-increment
/// `usage_count`.
pub trait TokenRecordStore: Send + Sync {
    fn find(&self, token: &str) -> Result<TokenRecord, StoreError>;
    fn save(&self, record: &TokenRecord) -> Result<(), StoreError>;
    fn insert(&self, record: TokenRecord) -> Result<(), StoreError>;

    /// Atomically evaluates `evaluate` against the current record for
    /// `token` and, if it returns `Verdict::Valid`, increments `usage_count`
    /// and stamps `last_used = now` before releasing the lock. The whole
    /// sequence — read, evaluate, conditional mutate, persist — happens
    /// under one critical section so no other `consume` call on the same
    /// token can interleave.
    fn consume(
        &self,
        token: &str,
        now: u64,
        evaluate: impl FnOnce(&TokenRecord) -> Verdict,
    ) -> Result<Verdict, StoreError>;

    fn update_active(&self, token: &str, active: bool) -> Result<(), StoreError>;
    fn reset_usage(&self, token: &str) -> Result<(), StoreError>;
    fn add_ip(&self, token: &str, ip: &str) -> Result<(), StoreError>;
    fn add_host(&self, token: &str, host: &str) -> Result<(), StoreError>;
}
