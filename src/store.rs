//! Reference `TokenRecordStore` implementation: a lock-guarded in-memory
//! map. This stands in for the durable record store a real deployment
//! would bring; it exists so the crate is usable end to end in tests and
//! the CLI harness without an external database.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::policy::Verdict;
use crate::record::{StoreError, TokenRecord, TokenRecordStore};

/// Lock-guarded in-memory token record store.
///
/// `consume` and the admin mutation helpers take the map's write lock for
/// their whole read-modify-write sequence — `consume` in particular holds it
/// across the caller-supplied `evaluate` closure, not just around the final
/// mutation — which gives `Issuer::consume_once` linearizability per record
/// at the cost of serializing unrelated tokens too — acceptable for a
/// reference store; a sharded or per-row-locked store would do better under
/// contention.
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    inner: Arc<RwLock<HashMap<String, TokenRecord>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn mutate<F>(&self, token: &str, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut TokenRecord),
    {
        let mut guard = self.inner.write();
        let record = guard.get_mut(token).ok_or(StoreError::NotFound)?;
        f(record);
        Ok(())
    }
}

impl TokenRecordStore for InMemoryRecordStore {
    fn find(&self, token: &str) -> Result<TokenRecord, StoreError> {
        self.inner
            .read()
            .get(token)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn save(&self, record: &TokenRecord) -> Result<(), StoreError> {
        let mut guard = self.inner.write();
        guard.insert(record.token.clone(), record.clone());
        Ok(())
    }

    fn consume(
        &self,
        token: &str,
        now: u64,
        evaluate: impl FnOnce(&TokenRecord) -> Verdict,
    ) -> Result<Verdict, StoreError> {
        let mut guard = self.inner.write();
        let record = guard.get_mut(token).ok_or(StoreError::NotFound)?;
        let verdict = evaluate(record);
        if let Verdict::Valid { .. } = &verdict {
            record.usage_count += 1;
            record.last_used = Some(now);
        }
        Ok(verdict)
    }

    fn insert(&self, record: TokenRecord) -> Result<(), StoreError> {
        let mut guard = self.inner.write();
        if guard.contains_key(&record.token) {
            return Err(StoreError::DuplicateKey);
        }
        guard.insert(record.token.clone(), record);
        Ok(())
    }

    fn update_active(&self, token: &str, active: bool) -> Result<(), StoreError> {
        self.mutate(token, |record| record.is_active = active)
    }

    fn reset_usage(&self, token: &str) -> Result<(), StoreError> {
        self.mutate(token, |record| record.usage_count = 0)
    }

    fn add_ip(&self, token: &str, ip: &str) -> Result<(), StoreError> {
        self.mutate(token, |record| {
            record.ip_allowlist.insert(ip.to_string());
        })
    }

    fn add_host(&self, token: &str, host: &str) -> Result<(), StoreError> {
        self.mutate(token, |record| {
            record.host_allowlist.insert(host.to_string());
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(token: &str, client_id: u32) -> TokenRecord {
        TokenRecord::new(token.to_string(), client_id, None)
    }

    #[test]
    fn insert_then_find() {
        let store = InMemoryRecordStore::new();
        store.insert(record("ALK-AAAAA", 1)).unwrap();
        let found = store.find("ALK-AAAAA").unwrap();
        assert_eq!(found.client_id, 1);
    }

    #[test]
    fn duplicate_insert_rejected() {
        let store = InMemoryRecordStore::new();
        store.insert(record("ALK-AAAAA", 1)).unwrap();
        let err = store.insert(record("ALK-AAAAA", 2)).unwrap_err();
        assert_eq!(err, StoreError::DuplicateKey);
    }

    #[test]
    fn missing_record_mutations_fail() {
        let store = InMemoryRecordStore::new();
        assert_eq!(store.update_active("nope", false).unwrap_err(), StoreError::NotFound);
        assert_eq!(store.reset_usage("nope").unwrap_err(), StoreError::NotFound);
        assert_eq!(store.add_ip("nope", "1.2.3.4").unwrap_err(), StoreError::NotFound);
        assert_eq!(store.find("nope").unwrap_err(), StoreError::NotFound);
    }

    #[test]
    fn consume_increments_usage_and_stamps_last_used_only_on_valid() {
        let store = InMemoryRecordStore::new();
        store.insert(record("ALK-AAAAA", 1)).unwrap();

        let verdict = store
            .consume("ALK-AAAAA", 42, |r| {
                assert_eq!(r.usage_count, 0);
                Verdict::Valid { remaining_seats: 1 }
            })
            .unwrap();
        assert_eq!(verdict, Verdict::Valid { remaining_seats: 1 });

        let found = store.find("ALK-AAAAA").unwrap();
        assert_eq!(found.usage_count, 1);
        assert_eq!(found.last_used, Some(42));
    }

    #[test]
    fn consume_does_not_mutate_on_rejection() {
        let store = InMemoryRecordStore::new();
        store.insert(record("ALK-AAAAA", 1)).unwrap();

        let verdict = store
            .consume("ALK-AAAAA", 42, |_| Verdict::Rejection {
                kind: crate::policy::RejectionKind::SeatsExhausted,
                message: "no seats".to_string(),
            })
            .unwrap();
        assert!(!verdict.is_valid());

        let found = store.find("ALK-AAAAA").unwrap();
        assert_eq!(found.usage_count, 0);
        assert_eq!(found.last_used, None);
    }

    #[test]
    fn concurrent_consume_calls_on_the_same_token_never_double_increment() {
        use std::thread;

        let store = InMemoryRecordStore::new();
        store.insert(record("ALK-AAAAA", 1)).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    store
                        .consume("ALK-AAAAA", 1, |r| {
                            if r.usage_count < 8 {
                                Verdict::Valid {
                                    remaining_seats: 8 - r.usage_count,
                                }
                            } else {
                                Verdict::Rejection {
                                    kind: crate::policy::RejectionKind::SeatsExhausted,
                                    message: "no seats".to_string(),
                                }
                            }
                        })
                        .unwrap()
                })
            })
            .collect();

        let valid_count = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|v| v.is_valid())
            .count();

        assert_eq!(valid_count, 8);
        assert_eq!(store.find("ALK-AAAAA").unwrap().usage_count, 8);
    }

    #[test]
    fn admin_mutations_apply() {
        let store = InMemoryRecordStore::new();
        store.insert(record("ALK-AAAAA", 1)).unwrap();
        store.add_ip("ALK-AAAAA", "10.0.0.1").unwrap();
        store.add_host("ALK-AAAAA", "acme.com").unwrap();
        store.update_active("ALK-AAAAA", false).unwrap();

        let found = store.find("ALK-AAAAA").unwrap();
        assert!(found.ip_allowlist.contains("10.0.0.1"));
        assert!(found.host_allowlist.contains("acme.com"));
        assert!(!found.is_active);
    }
}
