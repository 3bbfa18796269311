use std::collections::BTreeMap;

use alk_license::{
    ClientIdentity, Clock, Config, FeatureValue, InMemoryRecordStore, IssuanceParameters, Issuer,
    SystemClock, ValidationContext,
};

/// Minimal end-to-end demonstration of the mint -> validate -> consume ->
/// regenerate lifecycle, run against an in-memory store. Not a server: the
/// license core has no network surface, so the only externally observable
/// behavior is what this harness prints.
fn main() {
    env_logger::init();

    let config = Config::new(
        b"demo-signing-secret-change-me-in-production!!".to_vec(),
        0,
    )
    .expect("valid demo config");

    let issuer = Issuer::new(config.signing_secret, InMemoryRecordStore::new(), SystemClock);

    let identity = ClientIdentity {
        client_id: 7001,
        client_name: "Acme Robotics".to_string(),
        email: "ops@acme-robotics.example".to_string(),
    };

    let mut features = BTreeMap::new();
    features.insert("api_access".to_string(), FeatureValue::Bool(true));
    features.insert("rate_limit".to_string(), FeatureValue::Int(1000));

    let params = IssuanceParameters {
        expires: 0,
        max_seats: 3,
        features,
    };

    let token = issuer.mint(&identity, &params).expect("mint succeeds");
    log::info!("minted license token for client_id={}", identity.client_id);

    let ctx = ValidationContext::at(SystemClock.now());
    match issuer.validate(&token, &ctx) {
        Ok(verdict) => log::info!("validation: {verdict:?}"),
        Err(err) => log::error!("validation error: {err}"),
    }

    for _ in 0..3 {
        match issuer.consume_once(&token, &ctx) {
            Ok(verdict) => log::info!("consume: {verdict:?}"),
            Err(err) => log::error!("consume error: {err}"),
        }
    }

    let _regenerated = issuer
        .regenerate(&token, &identity, &params)
        .expect("regenerate succeeds");
    log::info!("regenerated license token for client_id={}", identity.client_id);
}
