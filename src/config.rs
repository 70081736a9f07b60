//! Runtime configuration.
//!
//! Everything is read from the environment once at startup and then passed
//! down explicitly; nothing here is global.
//!
//! | Variable                     | Default              |
//! |------------------------------|----------------------|
//! | `PHARMACY_HOST`              | `0.0.0.0`            |
//! | `PORT`                       | `5000`               |
//! | `PHARMACY_SECRET_KEY_FILE`   | see below            |
//! | `PHARMACY_MAX_UPLOAD_BYTES`  | 4 MiB                |
//! | `PHARMACY_TOKEN_TTL_SECS`    | unset (no expiry)    |
//!
//! The flash-signing secret is read, in order, from `PHARMACY_SECRET_KEY_FILE`,
//! the Docker secret `/run/secrets/pharmacy_secret_key`, and (debug builds
//! only) `PHARMACY_SECRET_KEY`. Without any of them a random secret is
//! generated for the lifetime of the process.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

const HOST_ENV: &str = "PHARMACY_HOST";
const PORT_ENV: &str = "PORT";
const SECRET_KEY_FILE_ENV: &str = "PHARMACY_SECRET_KEY_FILE";
const SECRET_KEY_DOCKER_SECRET_PATH: &str = "/run/secrets/pharmacy_secret_key";
const MAX_UPLOAD_BYTES_ENV: &str = "PHARMACY_MAX_UPLOAD_BYTES";
const TOKEN_TTL_SECS_ENV: &str = "PHARMACY_TOKEN_TTL_SECS";

// Dev-only escape hatch for local runs.
const SECRET_KEY_ENV_DEV: &str = "PHARMACY_SECRET_KEY";

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 4 * 1024 * 1024;

/// Minimum accepted length for a configured secret.
const MIN_SECRET_LEN: usize = 16;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has an invalid value {value:?}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("Failed to read secret key file {path}: {source}")]
    SecretFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Secret key must be at least {MIN_SECRET_LEN} bytes")]
    SecretTooShort,

    #[error("Random secret generation failed: {0}")]
    Entropy(String),
}

/// Where the flash-signing secret came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretSource {
    File,
    Environment,
    Generated,
}

/// Application configuration, constructed once at process start.
#[derive(Clone)]
pub struct AppConfig {
    /// Interface to bind
    pub host: IpAddr,

    /// TCP port to listen on
    pub port: u16,

    /// Secret used to sign flash cookies
    pub secret_key: Zeroizing<Vec<u8>>,

    /// Origin of `secret_key`
    pub secret_source: SecretSource,

    /// Upper bound for a whole multipart submission
    pub max_upload_bytes: u64,

    /// Maximum accepted token age; `None` accepts any age
    pub token_ttl: Option<Duration>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secret_source", &self.secret_source)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("token_ttl", &self.token_ttl)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// Load configuration from process environment variables.
    ///
    /// # Errors
    /// Returns error if a variable is set to an invalid value or the secret
    /// key file cannot be read.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    /// Returns error if a variable is set to an invalid value or the secret
    /// key file cannot be read.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = match non_empty(&lookup, HOST_ENV) {
            Some(value) => value.parse().map_err(|e: std::net::AddrParseError| {
                ConfigError::InvalidValue {
                    var: HOST_ENV,
                    value,
                    reason: e.to_string(),
                }
            })?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };

        let port = parse_number(&lookup, PORT_ENV)?.unwrap_or(DEFAULT_PORT);

        let max_upload_bytes = match parse_number::<u64, _>(&lookup, MAX_UPLOAD_BYTES_ENV)? {
            Some(0) => {
                return Err(ConfigError::InvalidValue {
                    var: MAX_UPLOAD_BYTES_ENV,
                    value: "0".to_string(),
                    reason: "must be greater than zero".to_string(),
                })
            }
            Some(n) => n,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let token_ttl = parse_number::<u64, _>(&lookup, TOKEN_TTL_SECS_ENV)?
            .map(Duration::from_secs);

        let (secret_key, secret_source) = load_secret(&lookup)?;

        Ok(Self {
            host,
            port,
            secret_key,
            secret_source,
            max_upload_bytes,
            token_ttl,
        })
    }

    /// Socket address to bind.
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn non_empty<F>(lookup: &F, var: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_number<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    non_empty(lookup, var)
        .map(|value| {
            value.parse::<T>().map_err(|e| ConfigError::InvalidValue {
                var,
                reason: e.to_string(),
                value,
            })
        })
        .transpose()
}

fn load_secret<F>(lookup: &F) -> Result<(Zeroizing<Vec<u8>>, SecretSource), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = non_empty(lookup, SECRET_KEY_FILE_ENV) {
        return read_secret_file(Path::new(&path)).map(|s| (s, SecretSource::File));
    }

    let docker_secret = Path::new(SECRET_KEY_DOCKER_SECRET_PATH);
    if docker_secret.exists() {
        return read_secret_file(docker_secret).map(|s| (s, SecretSource::File));
    }

    if cfg!(debug_assertions) {
        if let Some(value) = lookup(SECRET_KEY_ENV_DEV).map(Zeroizing::new) {
            let secret = Zeroizing::new(value.trim().as_bytes().to_vec());
            if !secret.is_empty() {
                check_secret_len(&secret)?;
                return Ok((secret, SecretSource::Environment));
            }
        }
    }

    let mut secret = Zeroizing::new(vec![0u8; 32]);
    OsRng
        .try_fill_bytes(secret.as_mut_slice())
        .map_err(|e| ConfigError::Entropy(e.to_string()))?;
    Ok((secret, SecretSource::Generated))
}

fn read_secret_file(path: &Path) -> Result<Zeroizing<Vec<u8>>, ConfigError> {
    let contents = Zeroizing::new(std::fs::read(path).map_err(|source| {
        ConfigError::SecretFile {
            path: path.display().to_string(),
            source,
        }
    })?);
    let secret = Zeroizing::new(contents.trim_ascii().to_vec());
    check_secret_len(&secret)?;
    Ok(secret)
}

fn check_secret_len(secret: &[u8]) -> Result<(), ConfigError> {
    if secret.len() < MIN_SECRET_LEN {
        return Err(ConfigError::SecretTooShort);
    }
    Ok(())
}
