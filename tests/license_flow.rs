use std::collections::BTreeMap;

use alk_license::{
    ClientIdentity, FeatureValue, FixedClock, InMemoryRecordStore, IssuanceParameters, Issuer,
    RejectionKind, TokenRecordStore, ValidationContext,
};
use once_cell::sync::Lazy;

static SECRET: Lazy<Vec<u8>> = Lazy::new(|| b"integration-test-signing-secret-value!!".to_vec());

fn issuer_at(now: u64) -> Issuer<InMemoryRecordStore, FixedClock> {
    Issuer::new(SECRET.clone(), InMemoryRecordStore::new(), FixedClock(now))
}

fn acme() -> ClientIdentity {
    ClientIdentity {
        client_id: 555,
        client_name: "Acme Robotics".to_string(),
        email: "ops@acme-robotics.example".to_string(),
    }
}

fn terms(expires: u32, max_seats: u32) -> IssuanceParameters {
    IssuanceParameters {
        expires,
        max_seats,
        features: BTreeMap::new(),
    }
}

#[test]
fn end_to_end_mint_validate_consume_exhaust() {
    let issuer = issuer_at(1_700_000_000);
    let identity = acme();
    let token = issuer.mint(&identity, &terms(0, 2)).expect("mint succeeds");

    let ctx = ValidationContext::at(1_700_000_010);
    assert!(issuer.validate(&token, &ctx).unwrap().is_valid());

    assert!(issuer.consume_once(&token, &ctx).unwrap().is_valid());
    assert!(issuer.consume_once(&token, &ctx).unwrap().is_valid());

    let exhausted = issuer.consume_once(&token, &ctx).unwrap();
    assert_eq!(exhausted.kind(), Some(RejectionKind::SeatsExhausted));
}

#[test]
fn expired_token_is_rejected_but_inactive_record_takes_priority() {
    let issuer = issuer_at(1_700_000_000);
    let identity = acme();
    let token = issuer
        .mint(&identity, &terms(1_700_000_050, 1))
        .expect("mint succeeds");

    let past = ValidationContext::at(1_700_000_010);
    assert!(issuer.validate(&token, &past).unwrap().is_valid());

    let after_expiry = ValidationContext::at(1_700_000_100);
    assert_eq!(
        issuer.validate(&token, &after_expiry).unwrap().kind(),
        Some(RejectionKind::TokenExpired)
    );
}

#[test]
fn ip_and_host_restrictions_compose_with_seat_limits() {
    let issuer = issuer_at(1_700_000_000);
    let identity = acme();
    let token = issuer.mint(&identity, &terms(0, 1)).expect("mint succeeds");

    let mut ctx = ValidationContext::at(1_700_000_010);
    ctx.ip = Some("203.0.113.9".to_string());

    let rejected = issuer.consume_once(&token, &ctx).unwrap();
    assert_eq!(rejected.kind(), Some(RejectionKind::IpNotAuthorized));
}

#[test]
fn regenerate_preserves_client_but_invalidates_old_key() {
    let issuer = issuer_at(1_700_000_000);
    let identity = acme();
    let old_token = issuer.mint(&identity, &terms(0, 5)).expect("mint succeeds");

    let new_token = issuer
        .regenerate(&old_token, &identity, &terms(0, 5))
        .expect("regenerate succeeds");
    assert_ne!(old_token, new_token);

    let ctx = ValidationContext::at(1_700_000_010);
    assert_eq!(
        issuer.validate(&old_token, &ctx).unwrap().kind(),
        Some(RejectionKind::Inactive)
    );
    assert!(issuer.validate(&new_token, &ctx).unwrap().is_valid());
}

#[test]
fn regenerate_carries_over_usage_count_and_restrictions_instead_of_resetting_them() {
    let store = InMemoryRecordStore::new();
    let issuer = Issuer::new(SECRET.clone(), store.clone(), FixedClock(1_700_000_000));
    let identity = acme();
    let old_token = issuer.mint(&identity, &terms(0, 5)).expect("mint succeeds");

    let ctx = ValidationContext::at(1_700_000_010);
    issuer.consume_once(&old_token, &ctx).expect("consume succeeds");
    issuer.consume_once(&old_token, &ctx).expect("consume succeeds");
    store.add_ip(&old_token, "10.0.0.1").expect("record exists");
    store.add_host(&old_token, "acme.com").expect("record exists");

    let new_token = issuer
        .regenerate(&old_token, &identity, &terms(0, 5))
        .expect("regenerate succeeds");

    let new_record = store.find(&new_token).expect("new record persisted");
    assert_eq!(new_record.usage_count, 2, "regeneration must not reset usage");
    assert!(new_record.ip_allowlist.contains("10.0.0.1"));
    assert!(new_record.host_allowlist.contains("acme.com"));

    assert_eq!(
        issuer.validate(&new_token, &ctx).unwrap(),
        alk_license::Verdict::Valid { remaining_seats: 3 }
    );
}

#[test]
fn bulk_mint_yields_distinct_tokens_for_a_thousand_item_batch() {
    let issuer = issuer_at(1_700_000_000);
    let identity = acme();
    let batch: Vec<_> = (0..1_000).map(|_| terms(0, 1)).collect();

    let tokens = issuer.bulk_mint(&identity, &batch).expect("bulk mint succeeds");
    assert_eq!(tokens.len(), 1_000);

    let unique: std::collections::HashSet<_> = tokens.iter().collect();
    assert_eq!(unique.len(), 1_000, "every bulk-minted token must be distinct");
}

#[test]
fn feature_flags_round_trip_through_the_full_stack() {
    let issuer = issuer_at(1_700_000_000);
    let identity = acme();

    let mut features = BTreeMap::new();
    features.insert("priority_support".to_string(), FeatureValue::Bool(true));
    features.insert("max_projects".to_string(), FeatureValue::Int(25));
    features.insert("tier".to_string(), FeatureValue::Str("enterprise".to_string()));

    let params = IssuanceParameters {
        expires: 0,
        max_seats: 10,
        features,
    };
    let token = issuer.mint(&identity, &params).expect("mint succeeds");

    let ctx = ValidationContext::at(1_700_000_010);
    let verdict = issuer.validate(&token, &ctx).unwrap();
    assert_eq!(verdict.kind(), None);
}
