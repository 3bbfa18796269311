use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use alk_license::{
    ClientIdentity, FeatureValue, InMemoryRecordStore, IssuanceParameters, Issuer, SystemClock,
};

fn main() {
    env_logger::init();
    println!("alk-license bulk mint benchmarks");
    for batch_size in [10usize, 100, 1_000] {
        run_bulk_mint_benchmark(batch_size);
    }
}

fn run_bulk_mint_benchmark(batch_size: usize) {
    let issuer = Issuer::new(
        b"bulk-mint-benchmark-signing-secret-value!!".to_vec(),
        InMemoryRecordStore::new(),
        SystemClock,
    );

    let identity = ClientIdentity {
        client_id: 9000,
        client_name: "Bulk Benchmark Co".to_string(),
        email: "licensing@bulk-benchmark.example".to_string(),
    };

    let mut features = BTreeMap::new();
    features.insert("seats".to_string(), FeatureValue::Int(1));
    let batch: Vec<IssuanceParameters> = (0..batch_size)
        .map(|_| IssuanceParameters {
            expires: 0,
            max_seats: 1,
            features: features.clone(),
        })
        .collect();

    let start = Instant::now();
    let tokens = issuer.bulk_mint(&identity, &batch).expect("bulk mint succeeds");
    let elapsed = start.elapsed();

    let unique: HashSet<&String> = tokens.iter().collect();
    println!(
        "bulk_mint | count: {:>5} | unique: {:>5} | elapsed: {:>8?} | avg/token: {:>8?}",
        tokens.len(),
        unique.len(),
        elapsed,
        elapsed / batch_size as u32
    );
    assert_eq!(unique.len(), tokens.len());
}
