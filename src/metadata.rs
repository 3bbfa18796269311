//! Metadata Serializer: canonical compact JSON, deflate-compressed.
//!
//! Canonical means: a fixed envelope key order (`client_id`, `email_hash`,
//! `expires`, `max_users`, `features`, `issued`), lexicographically sorted
//! `features` keys, and no incidental whitespace. Two issuances with the
//! same inputs must produce byte-identical compressed metadata.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A feature value, restricted to the JSON-representable kinds the source
/// format actually carries: booleans, integers, and strings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

/// Metadata embedded inside a token. Field declaration order is the wire order: serde_json
/// serializes struct fields in declaration order, and `BTreeMap` iterates in
/// sorted key order, so this struct's shape alone gives us the canonical
/// envelope without a hand-rolled writer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedMetadata {
    pub client_id: u32,
    pub email_hash: String,
    pub expires: u32,
    #[serde(rename = "max_users")]
    pub max_seats: u32,
    pub features: BTreeMap<String, FeatureValue>,
    pub issued: u32,
}

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to parse license key metadata")]
    Malformed,
}

/// Encodes metadata to its canonical compact JSON form, then deflate
/// (zlib-framed) compresses it at maximum compression, matching the
/// reference implementation's `zlib.compress(data, level=9)`.
pub fn encode(meta: &EmbeddedMetadata) -> Vec<u8> {
    let json = serde_json::to_vec(meta).expect("EmbeddedMetadata always serializes");
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(&json).expect("in-memory write cannot fail");
    encoder.finish().expect("in-memory write cannot fail")
}

/// Decompresses and parses metadata, failing if decompression fails or the
/// resulting JSON is not a mapping with the expected keys and value kinds.
pub fn decode(bytes: &[u8]) -> Result<EmbeddedMetadata, MetadataError> {
    let mut decompressed = Vec::new();
    ZlibDecoder::new(bytes)
        .read_to_end(&mut decompressed)
        .map_err(|_| MetadataError::Malformed)?;
    serde_json::from_slice(&decompressed).map_err(|_| MetadataError::Malformed)
}
