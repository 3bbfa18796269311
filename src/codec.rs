//! Token Codec: composes the Binary Layout Codec and Metadata Serializer
//! into the final signed payload, then applies the textual Base32 framing.
//!
//! Validation ordering is mandatory and load-bearing: framing/length, then
//! checksum, then MAC, then metadata decompression/shape. Tampered tokens
//! are rejected before the cost of decompression, and a MAC failure is
//! distinguishable from a merely malformed structure.

use data_encoding::BASE32;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use crate::layout::{self, LayoutError, LAYOUT_VERSION};
use crate::metadata::{self, EmbeddedMetadata, MetadataError};

type HmacSha256 = Hmac<Sha256>;

/// Literal, mandatory prefix on every license key's textual form.
pub const PREFIX: &str = "ALK-";

/// Width, in characters, of each hyphen-separated group of the formatted key.
const GROUP_WIDTH: usize = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("license key does not start with the required {PREFIX:?} prefix")]
    MissingPrefix,
    #[error("license key contains a character outside the Base32 alphabet")]
    InvalidCharacter,
    #[error("license key payload length is invalid")]
    MalformedFraming,
    #[error("license key checksum validation failed")]
    ChecksumFailed,
    #[error("license key signature validation failed")]
    SignatureFailed,
    #[error("failed to parse license key metadata")]
    MalformedMetadata,
    #[error("license key layout version {0} is not supported")]
    UnknownVersion(u8),
}

impl From<LayoutError> for CodecError {
    fn from(err: LayoutError) -> Self {
        match err {
            LayoutError::TooShort | LayoutError::EmptyMetadata => CodecError::MalformedFraming,
            LayoutError::UnknownVersion(v) => CodecError::UnknownVersion(v),
        }
    }
}

impl From<MetadataError> for CodecError {
    fn from(_: MetadataError) -> Self {
        CodecError::MalformedMetadata
    }
}

/// A fully decoded and authenticated token.
#[derive(Debug, Clone)]
pub struct DecodedToken {
    pub version: u8,
    pub issued_ts: u32,
    pub client_binding: [u8; 8],
    pub metadata: EmbeddedMetadata,
}

/// Computes the 8-byte client binding: the first 8 bytes of SHA-256 over
/// `"{client_id}:{client_name}:{email}"`.
pub fn client_binding(client_id: u32, client_name: &str, email: &str) -> [u8; 8] {
    use sha2::Digest;
    let data = format!("{client_id}:{client_name}:{email}");
    let digest = sha2::Sha256::digest(data.as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

fn truncated_hmac(secret: &[u8], message: &[u8]) -> [u8; 16] {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(message);
    let full = mac.finalize().into_bytes();
    let mut out = [0u8; 16];
    out.copy_from_slice(&full[..16]);
    out
}

/// Constant-time comparison of two equal-length byte slices. Always walks
/// every byte regardless of where a mismatch occurs.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Encodes a fresh token from its constituent fields, signing with `secret`.
pub fn encode(
    secret: &[u8],
    issued_ts: u32,
    client_binding: &[u8; 8],
    metadata: &EmbeddedMetadata,
) -> String {
    let metadata_bytes = metadata::encode(metadata);
    let core = layout::pack_core(LAYOUT_VERSION, issued_ts, client_binding, &metadata_bytes);
    let checksum = crc32fast::hash(&core);

    let mut signed_region = core.clone();
    signed_region.extend_from_slice(&checksum.to_be_bytes());
    let mac = truncated_hmac(secret, &signed_region);

    let payload = layout::pack(&core, checksum, &mac);
    format_token(&payload)
}

fn format_token(payload: &[u8]) -> String {
    let encoded = BASE32.encode(payload);
    let trimmed = encoded.trim_end_matches('=');
    let grouped = trimmed
        .as_bytes()
        .chunks(GROUP_WIDTH)
        .map(|chunk| std::str::from_utf8(chunk).expect("ascii"))
        .collect::<Vec<_>>()
        .join("-");
    format!("{PREFIX}{grouped}")
}

/// Decodes the textual form back to raw payload bytes, without verifying
/// checksum or MAC. Handles prefix stripping, hyphen removal, re-padding,
/// and case-insensitive Base32 decoding.
fn decode_framing(token: &str) -> Result<Vec<u8>, CodecError> {
    if !token.starts_with(PREFIX) {
        return Err(CodecError::MissingPrefix);
    }
    let body = &token[PREFIX.len()..];
    let cleaned: String = body.chars().filter(|c| *c != '-').collect();
    let upper = cleaned.to_ascii_uppercase();

    let padding_needed = (8 - upper.len() % 8) % 8;
    let mut padded = upper;
    padded.extend(std::iter::repeat('=').take(padding_needed));

    BASE32
        .decode(padded.as_bytes())
        .map_err(|_| CodecError::InvalidCharacter)
}

/// Decodes and authenticates a token string, running checksum then MAC
/// verification before ever touching the compressed metadata.
pub fn decode_and_verify(token: &str, secret: &[u8]) -> Result<DecodedToken, CodecError> {
    let payload = decode_framing(token)?;
    let unpacked = layout::unpack(&payload)?;

    let expected_checksum = crc32fast::hash(&unpacked.core);
    if expected_checksum != unpacked.checksum {
        return Err(CodecError::ChecksumFailed);
    }

    let mut signed_region = unpacked.core.clone();
    signed_region.extend_from_slice(&unpacked.checksum.to_be_bytes());
    let expected_mac = truncated_hmac(secret, &signed_region);
    if !constant_time_eq(&expected_mac, &unpacked.mac) {
        return Err(CodecError::SignatureFailed);
    }

    let metadata = metadata::decode(&unpacked.metadata)?;

    Ok(DecodedToken {
        version: unpacked.version,
        issued_ts: unpacked.issued_ts,
        client_binding: unpacked.client_binding,
        metadata,
    })
}
