//! Process configuration, read once at startup and passed by value to the
//! components that need it. No globals, no statics — the signing secret in
//! particular is a value an `Issuer` owns, not ambient process state.

use std::env;

use thiserror::Error;

const SECRET_ENV_VAR: &str = "LICENSE_SIGNING_SECRET";
const SKEW_ENV_VAR: &str = "LICENSE_CLOCK_SKEW_SECONDS";

/// Minimum length, in bytes, below which the signing secret is considered
/// weak. Not enforced — only logged — since the operator may have reasons
/// (e.g. staging environments) to run with a short secret anyway.
const RECOMMENDED_SECRET_MIN_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{SECRET_ENV_VAR} is not set")]
    MissingSecret,
    #[error("{SECRET_ENV_VAR} must not be empty")]
    EmptySecret,
    #[error("{SKEW_ENV_VAR} is not a valid non-negative integer: {0}")]
    InvalidSkew(String),
}

/// Runtime configuration for license signing and validation.
#[derive(Clone)]
pub struct Config {
    pub signing_secret: Vec<u8>,
    pub clock_skew_tolerance_seconds: u64,
}

impl Config {
    /// Reads configuration from the process environment.
    ///
    /// `LICENSE_SIGNING_SECRET` is required. `LICENSE_CLOCK_SKEW_SECONDS` is
    /// optional and defaults to 0.
    pub fn from_env() -> Result<Self, ConfigError> {
        let secret = env::var(SECRET_ENV_VAR).map_err(|_| ConfigError::MissingSecret)?;
        if secret.is_empty() {
            return Err(ConfigError::EmptySecret);
        }
        if secret.len() < RECOMMENDED_SECRET_MIN_LEN {
            log::warn!(
                "{SECRET_ENV_VAR} is only {} bytes; {RECOMMENDED_SECRET_MIN_LEN}+ is recommended",
                secret.len()
            );
        }

        let clock_skew_tolerance_seconds = match env::var(SKEW_ENV_VAR) {
            Ok(raw) => raw
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidSkew(raw))?,
            Err(_) => 0,
        };

        Ok(Self {
            signing_secret: secret.into_bytes(),
            clock_skew_tolerance_seconds,
        })
    }

    /// Builds a config directly from values, bypassing the environment.
    /// Used by tests and by binaries that source the secret some other way
    /// (e.g. a secrets manager) but still want the same validation.
    pub fn new(signing_secret: Vec<u8>, clock_skew_tolerance_seconds: u64) -> Result<Self, ConfigError> {
        if signing_secret.is_empty() {
            return Err(ConfigError::EmptySecret);
        }
        if signing_secret.len() < RECOMMENDED_SECRET_MIN_LEN {
            log::warn!(
                "signing secret is only {} bytes; {RECOMMENDED_SECRET_MIN_LEN}+ is recommended",
                signing_secret.len()
            );
        }
        Ok(Self {
            signing_secret,
            clock_skew_tolerance_seconds,
        })
    }
}
