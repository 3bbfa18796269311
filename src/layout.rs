//! Binary Layout Codec: packs and unpacks the fixed-schema token payload.
//!
//! No cryptography and no policy live here — this module only knows about
//! byte widths and offsets. `version . issued_ts . client_binding . metadata
//! . checksum . mac`, all big-endian.

use thiserror::Error;

/// Current (and only) supported layout version.
pub const LAYOUT_VERSION: u8 = 1;

const VERSION_LEN: usize = 1;
const ISSUED_TS_LEN: usize = 4;
const CLIENT_BINDING_LEN: usize = 8;
const CHECKSUM_LEN: usize = 4;
const MAC_LEN: usize = 16;

/// Bytes consumed by every field except the variable-length metadata region.
const FIXED_LEN: usize = VERSION_LEN + ISSUED_TS_LEN + CLIENT_BINDING_LEN + CHECKSUM_LEN + MAC_LEN;

/// Minimum total payload length (fixed fields only; metadata must add at least one byte).
pub const MIN_PAYLOAD_LEN: usize = FIXED_LEN;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("license key payload is shorter than the minimum layout size")]
    TooShort,
    #[error("license key payload carries no metadata")]
    EmptyMetadata,
    #[error("license key layout version {0} is not supported")]
    UnknownVersion(u8),
}

/// The fields extracted from a decoded layout, plus the `core` slice (every
/// byte preceding the checksum) that the Token Codec hashes and signs.
pub struct Unpacked {
    pub version: u8,
    pub issued_ts: u32,
    pub client_binding: [u8; 8],
    pub metadata: Vec<u8>,
    pub core: Vec<u8>,
    pub checksum: u32,
    pub mac: [u8; MAC_LEN],
}

/// Concatenates the fields that precede the checksum: version, issued_ts,
/// client binding, and the compressed metadata blob.
pub fn pack_core(version: u8, issued_ts: u32, client_binding: &[u8; 8], metadata: &[u8]) -> Vec<u8> {
    let mut core = Vec::with_capacity(FIXED_LEN - CHECKSUM_LEN - MAC_LEN + metadata.len());
    core.push(version);
    core.extend_from_slice(&issued_ts.to_be_bytes());
    core.extend_from_slice(client_binding);
    core.extend_from_slice(metadata);
    core
}

/// Appends the checksum and MAC to a previously packed core, producing the
/// final payload bytes that get Base32-framed by the Token Codec.
pub fn pack(core: &[u8], checksum: u32, mac: &[u8; MAC_LEN]) -> Vec<u8> {
    let mut out = Vec::with_capacity(core.len() + CHECKSUM_LEN + MAC_LEN);
    out.extend_from_slice(core);
    out.extend_from_slice(&checksum.to_be_bytes());
    out.extend_from_slice(mac);
    out
}

/// Splits a raw payload into its component fields without verifying anything
/// cryptographic — checksum and MAC are handed back for the caller to check.
pub fn unpack(bytes: &[u8]) -> Result<Unpacked, LayoutError> {
    if bytes.len() < MIN_PAYLOAD_LEN {
        return Err(LayoutError::TooShort);
    }

    let version = bytes[0];
    if version != LAYOUT_VERSION {
        return Err(LayoutError::UnknownVersion(version));
    }

    let metadata_len = bytes.len() - MIN_PAYLOAD_LEN;
    if metadata_len == 0 {
        return Err(LayoutError::EmptyMetadata);
    }

    let issued_ts = u32::from_be_bytes(bytes[1..5].try_into().expect("4 bytes"));
    let mut client_binding = [0u8; CLIENT_BINDING_LEN];
    client_binding.copy_from_slice(&bytes[5..13]);

    let metadata_start = 13;
    let metadata_end = metadata_start + metadata_len;
    let metadata = bytes[metadata_start..metadata_end].to_vec();

    let core = bytes[..metadata_end].to_vec();

    let checksum_start = metadata_end;
    let checksum = u32::from_be_bytes(
        bytes[checksum_start..checksum_start + CHECKSUM_LEN]
            .try_into()
            .expect("4 bytes"),
    );

    let mac_start = checksum_start + CHECKSUM_LEN;
    let mut mac = [0u8; MAC_LEN];
    mac.copy_from_slice(&bytes[mac_start..mac_start + MAC_LEN]);

    Ok(Unpacked {
        version,
        issued_ts,
        client_binding,
        metadata,
        core,
        checksum,
        mac,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_round_trip() {
        let binding = [7u8; 8];
        let metadata = b"hello-metadata".to_vec();
        let core = pack_core(LAYOUT_VERSION, 1_700_000_000, &binding, &metadata);
        let checksum = 0xDEAD_BEEFu32;
        let mac = [9u8; MAC_LEN];
        let payload = pack(&core, checksum, &mac);

        let unpacked = unpack(&payload).expect("valid payload");
        assert_eq!(unpacked.version, LAYOUT_VERSION);
        assert_eq!(unpacked.issued_ts, 1_700_000_000);
        assert_eq!(unpacked.client_binding, binding);
        assert_eq!(unpacked.metadata, metadata);
        assert_eq!(unpacked.checksum, checksum);
        assert_eq!(unpacked.mac, mac);
        assert_eq!(unpacked.core, core);
    }

    #[test]
    fn rejects_short_payload() {
        let bytes = vec![0u8; MIN_PAYLOAD_LEN - 1];
        assert_eq!(unpack(&bytes), Err(LayoutError::TooShort));
    }

    #[test]
    fn rejects_empty_metadata_region() {
        let bytes = vec![0u8; MIN_PAYLOAD_LEN];
        // version byte 0 is also unknown, so force a valid version with empty metadata.
        let mut bytes = bytes;
        bytes[0] = LAYOUT_VERSION;
        assert_eq!(unpack(&bytes), Err(LayoutError::EmptyMetadata));
    }

    #[test]
    fn rejects_unknown_version() {
        let mut bytes = vec![0u8; MIN_PAYLOAD_LEN + 1];
        bytes[0] = 0xFF;
        assert_eq!(unpack(&bytes), Err(LayoutError::UnknownVersion(0xFF)));
    }
}
