//! Policy Engine: the ordered rule set that turns a decoded token, a
//! `TokenRecord`, and a `ValidationContext` into a `Verdict`.
//!
//! Pure — no I/O, no mutation. Rule order is mandatory: active flag, record
//! expiry, codec authenticity, token expiry, client match, IP, host,
//! hardware, seats.

use crate::codec::{self, CodecError};
use crate::record::TokenRecord;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectionKind {
    Inactive,
    RecordExpired,
    TokenExpired,
    ClientMismatch,
    IpNotAuthorized,
    HostNotAuthorized,
    HardwareMismatch,
    SeatsExhausted,
    MalformedFraming,
    ChecksumFailed,
    SignatureFailed,
    MalformedMetadata,
    UnknownVersion,
    RecordNotFound,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Verdict {
    Valid { remaining_seats: u32 },
    Rejection { kind: RejectionKind, message: String },
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid { .. })
    }

    pub fn kind(&self) -> Option<RejectionKind> {
        match self {
            Verdict::Valid { .. } => None,
            Verdict::Rejection { kind, .. } => Some(*kind),
        }
    }
}

fn reject(kind: RejectionKind, message: &str) -> Verdict {
    Verdict::Rejection {
        kind,
        message: message.to_string(),
    }
}

fn reject_from_codec_error(err: CodecError) -> Verdict {
    match err {
        CodecError::MissingPrefix | CodecError::InvalidCharacter | CodecError::MalformedFraming => {
            reject(RejectionKind::MalformedFraming, "Invalid license key format")
        }
        CodecError::ChecksumFailed => reject(
            RejectionKind::ChecksumFailed,
            "License key checksum validation failed",
        ),
        CodecError::SignatureFailed => reject(
            RejectionKind::SignatureFailed,
            "License key signature validation failed",
        ),
        CodecError::MalformedMetadata => reject(
            RejectionKind::MalformedMetadata,
            "Failed to parse license key metadata",
        ),
        CodecError::UnknownVersion(_) => reject(
            RejectionKind::UnknownVersion,
            "Unsupported license key version",
        ),
    }
}

/// Caller-supplied validation inputs: current time plus optional
/// network/hardware context.
#[derive(Clone, Debug, Default)]
pub struct ValidationContext {
    pub now: u64,
    pub ip: Option<String>,
    pub host: Option<String>,
    pub hardware_fingerprint: Option<String>,
}

impl ValidationContext {
    pub fn at(now: u64) -> Self {
        Self {
            now,
            ..Self::default()
        }
    }
}

/// Runs the full ordered rule set, decoding and authenticating the token as
/// part of rule 3. `secret` is the process-wide HMAC signing key.
pub fn evaluate(token: &str, secret: &[u8], record: &TokenRecord, ctx: &ValidationContext) -> Verdict {
    if !record.is_active {
        return reject(RejectionKind::Inactive, "License is inactive");
    }

    if let Some(expires_at) = record.record_expires_at {
        if expires_at <= ctx.now {
            return reject(RejectionKind::RecordExpired, "License has expired");
        }
    }

    let decoded = match codec::decode_and_verify(token, secret) {
        Ok(decoded) => decoded,
        Err(err) => return reject_from_codec_error(err),
    };

    if decoded.metadata.expires != 0 && ctx.now >= decoded.metadata.expires as u64 {
        return reject(RejectionKind::TokenExpired, "License key has expired");
    }

    if decoded.metadata.client_id != record.client_id {
        return reject(RejectionKind::ClientMismatch, "License key client mismatch");
    }

    if let Some(ip) = ctx.ip.as_deref() {
        if !record.ip_allowlist.is_empty() && !record.ip_allowlist.contains(ip) {
            return reject(RejectionKind::IpNotAuthorized, "IP address not authorized");
        }
    }

    if let Some(host) = ctx.host.as_deref() {
        if !record.host_allowlist.is_empty() {
            let host_lower = host.to_ascii_lowercase();
            let authorized = record
                .host_allowlist
                .iter()
                .any(|pattern| host_lower.ends_with(pattern.to_ascii_lowercase().as_str()));
            if !authorized {
                return reject(RejectionKind::HostNotAuthorized, "Host not authorized");
            }
        }
    }

    if let (Some(expected), Some(given)) = (
        record.hardware_fingerprint.as_deref(),
        ctx.hardware_fingerprint.as_deref(),
    ) {
        if expected != given {
            return reject(
                RejectionKind::HardwareMismatch,
                "Hardware fingerprint mismatch",
            );
        }
    }

    if record.usage_count >= decoded.metadata.max_seats {
        return reject(
            RejectionKind::SeatsExhausted,
            "Maximum usage limit exceeded",
        );
    }

    Verdict::Valid {
        remaining_seats: decoded.metadata.max_seats - record.usage_count,
    }
}
