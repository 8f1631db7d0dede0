//! Configuration management for Bitstore Server

use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Reference chunk size: 10 KiB
pub const DEFAULT_CHUNK_SIZE: usize = 10 * 1024;

/// Default request body limit: 512 MiB
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub role: ServiceRole,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub chunking: ChunkingConfig,
    pub limits: LimitsConfig,
}

/// Which surfaces this process serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceRole {
    /// Block store only, backed by the local filesystem
    Blocks,
    /// File orchestrator only, talking to a remote block store
    Files,
    /// Both, with the block store in process
    Standalone,
}

impl ServiceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blocks => "blocks",
            Self::Files => "files",
            Self::Standalone => "standalone",
        }
    }

    pub fn serves_blocks(&self) -> bool {
        matches!(self, Self::Blocks | Self::Standalone)
    }

    pub fn serves_files(&self) -> bool {
        matches!(self, Self::Files | Self::Standalone)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory of the local block store
    pub root: PathBuf,
    /// Base address of the remote block service
    pub url: String,
    /// Re-hash blocks when reading them from disk
    pub verify_on_read: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    /// Maximum in-flight block requests per file
    pub concurrency: usize,
    pub duplicate_policy: DuplicatePolicy,
}

/// What to do when a file name is uploaded a second time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Last write wins: the record is replaced atomically, keeping its id
    #[default]
    Replace,
    /// The second upload fails with `FileAlreadyExists`
    Reject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Upper bound on every block store and metadata call
    pub operation_timeout: Duration,
    pub max_upload_bytes: usize,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            root: PathBuf::from("./storage"),
            url: "http://localhost:8080".to_string(),
            verify_on_read: false,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        ChunkingConfig {
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency: 4,
            duplicate_policy: DuplicatePolicy::Replace,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        LimitsConfig {
            operation_timeout: Duration::from_secs(30),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            role: ServiceRole::Standalone,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            storage: StorageConfig::default(),
            database: DatabaseConfig {
                url: "sqlite:./bitstore.db".to_string(),
            },
            chunking: ChunkingConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let role = match env::var("SERVICE_ROLE") {
            Ok(value) => match value.to_lowercase().as_str() {
                "blocks" => ServiceRole::Blocks,
                "files" => ServiceRole::Files,
                "standalone" => ServiceRole::Standalone,
                _ => return Err(ConfigError::InvalidValue { name: "SERVICE_ROLE", value }),
            },
            Err(_) => defaults.role,
        };

        let duplicate_policy = match env::var("DUPLICATE_POLICY") {
            Ok(value) => match value.to_lowercase().as_str() {
                "replace" => DuplicatePolicy::Replace,
                "reject" => DuplicatePolicy::Reject,
                _ => return Err(ConfigError::InvalidValue { name: "DUPLICATE_POLICY", value }),
            },
            Err(_) => defaults.chunking.duplicate_policy,
        };

        let chunk_size = parse_nonzero("CHUNK_SIZE", defaults.chunking.chunk_size)?;
        let concurrency = parse_nonzero("UPLOAD_CONCURRENCY", defaults.chunking.concurrency)?;
        let timeout_secs = parse_nonzero(
            "OPERATION_TIMEOUT_SECS",
            defaults.limits.operation_timeout.as_secs(),
        )?;

        Ok(Config {
            role,
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_var("SERVER_PORT", defaults.server.port)?,
            },
            storage: StorageConfig {
                root: env::var("BLOCK_STORE_ROOT")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.storage.root),
                url: env::var("BLOCK_STORE_URL").unwrap_or(defaults.storage.url),
                verify_on_read: parse_var("BLOCK_VERIFY_ON_READ", defaults.storage.verify_on_read)?,
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or(defaults.database.url),
            },
            chunking: ChunkingConfig {
                chunk_size,
                concurrency,
                duplicate_policy,
            },
            limits: LimitsConfig {
                operation_timeout: Duration::from_secs(timeout_secs),
                max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", defaults.limits.max_upload_bytes)?,
            },
        })
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        Err(_) => Ok(default),
    }
}

/// Like `parse_var`, but zero is rejected
fn parse_nonzero<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialEq + Default + ToString,
{
    let value = parse_var(name, default)?;
    if value == T::default() {
        return Err(ConfigError::InvalidValue { name, value: value.to_string() });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.role, ServiceRole::Standalone);
        assert_eq!(config.chunking.chunk_size, 10240);
        assert_eq!(config.chunking.duplicate_policy, DuplicatePolicy::Replace);
        assert_eq!(config.storage.root, PathBuf::from("./storage"));
        assert!(config.role.serves_blocks() && config.role.serves_files());
    }

    #[test]
    fn test_roles() {
        assert!(ServiceRole::Blocks.serves_blocks());
        assert!(!ServiceRole::Blocks.serves_files());
        assert!(ServiceRole::Files.serves_files());
        assert!(!ServiceRole::Files.serves_blocks());
    }

    #[test]
    fn test_parse_var_reports_name() {
        // Variable names unique to this test so parallel tests don't interfere
        env::set_var("BITSTORE_TEST_PORT", "not-a-port");
        let result = parse_var::<u16>("BITSTORE_TEST_PORT", 1);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { name: "BITSTORE_TEST_PORT", .. })
        ));

        env::remove_var("BITSTORE_TEST_UNSET");
        assert_eq!(parse_var::<u16>("BITSTORE_TEST_UNSET", 7).unwrap(), 7);
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        env::set_var("BITSTORE_TEST_TIMEOUT_SECS", "0");
        assert!(matches!(
            parse_nonzero::<u64>("BITSTORE_TEST_TIMEOUT_SECS", 30),
            Err(ConfigError::InvalidValue { name: "BITSTORE_TEST_TIMEOUT_SECS", ref value })
                if value == "0"
        ));

        env::set_var("BITSTORE_TEST_TIMEOUT_SECS", "5");
        assert_eq!(parse_nonzero::<u64>("BITSTORE_TEST_TIMEOUT_SECS", 30).unwrap(), 5);

        env::remove_var("BITSTORE_TEST_TIMEOUT_SECS");
        assert_eq!(parse_nonzero::<u64>("BITSTORE_TEST_TIMEOUT_SECS", 30).unwrap(), 30);
    }
}
