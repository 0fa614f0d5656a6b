use crate::cli::{Cli, StorageKind};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Main configuration.
///
/// Can be loaded from files, env vars, or CLI args with precedence order:
/// CLI > File > Environment > Defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    File {
        #[serde(default = "default_datasets_path")]
        path: PathBuf,
    },
    Remote(RemoteConfig),
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::File {
            path: default_datasets_path(),
        }
    }
}

impl StorageConfig {
    pub fn kind(&self) -> StorageKind {
        match self {
            StorageConfig::File { .. } => StorageKind::File,
            StorageConfig::Remote(_) => StorageKind::Remote,
        }
    }
}

/// Connection settings for an S3-compatible object store.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            endpoint: default_endpoint(),
            region: default_region(),
            access_key_id: None,
            secret_access_key: None,
            connect_timeout_ms: default_connect_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("read_timeout_ms", &self.read_timeout_ms)
            .finish()
    }
}

impl RemoteConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.trim().is_empty() {
            return Err(ConfigError::MissingField("bucket".to_string()));
        }
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::MissingField("endpoint".to_string()));
        }
        if self.access_key_id.is_some() != self.secret_access_key.is_some() {
            return Err(ConfigError::Validation(
                "access key id and secret access key must be set together".to_string(),
            ));
        }
        if self.connect_timeout_ms == 0 || self.read_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Object store settings from `S3_*` and `AWS_*` variables, read
    /// regardless of which backend `DATABASE` selects.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut remote = RemoteConfig::default();
        if let Some(bucket) = lookup("S3_BUCKET") {
            remote.bucket = bucket;
        }
        if let Some(endpoint) = lookup("S3_ENDPOINT") {
            remote.endpoint = endpoint;
        }
        if let Some(region) = lookup("AWS_REGION") {
            remote.region = region;
        }
        remote.access_key_id = lookup("AWS_ACCESS_KEY_ID");
        remote.secret_access_key = lookup("AWS_SECRET_ACCESS_KEY");
        if let Some(ms) = lookup("S3_CONNECT_TIMEOUT_MS") {
            remote.connect_timeout_ms = parse_millis("S3_CONNECT_TIMEOUT_MS", &ms)?;
        }
        if let Some(ms) = lookup("S3_READ_TIMEOUT_MS") {
            remote.read_timeout_ms = parse_millis("S3_READ_TIMEOUT_MS", &ms)?;
        }
        Ok(remote)
    }
}

fn default_datasets_path() -> PathBuf {
    PathBuf::from("datasets")
}

fn default_bucket() -> String {
    "datasets".to_string()
}

fn default_endpoint() -> String {
    "http://minio:8000".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_read_timeout_ms() -> u64 {
    30_000
}

impl Config {
    /// Create config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from any variable source. `DATABASE=file` (the default)
    /// selects local files; any other value selects the object store.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database = lookup("DATABASE").unwrap_or_else(|| "file".to_string());

        let storage = if database == "file" {
            StorageConfig::File {
                path: lookup("DATASETS_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(default_datasets_path),
            }
        } else {
            StorageConfig::Remote(RemoteConfig::from_lookup(&lookup)?)
        };

        Ok(Self { storage })
    }

    /// Create config with CLI args taking precedence over file and environment.
    ///
    /// Precedence: CLI > File > Environment > Defaults
    pub fn from_sources(cli: &Cli) -> Result<Self, ConfigError> {
        let file_config = cli
            .config
            .as_ref()
            .map(Self::load_from_file)
            .transpose()?;

        let storage = Self::resolve_storage(cli, file_config.as_ref(), |name: &str| {
            std::env::var(name).ok()
        })?;

        Ok(Config { storage })
    }

    fn resolve_storage<F>(
        cli: &Cli,
        file_config: Option<&Config>,
        env: F,
    ) -> Result<StorageConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_config = Self::from_lookup(&env)?;
        let kind = cli
            .storage
            .clone()
            .or_else(|| file_config.map(|c| c.storage.kind()))
            .unwrap_or_else(|| env_config.storage.kind());

        cli.validate_for_storage(&kind)?;

        let storage = match kind {
            StorageKind::File => {
                let path = cli
                    .datasets_path
                    .clone()
                    .or_else(|| {
                        file_config.and_then(|c| match &c.storage {
                            StorageConfig::File { path } => Some(path.clone()),
                            _ => None,
                        })
                    })
                    .or_else(|| match &env_config.storage {
                        StorageConfig::File { path } => Some(path.clone()),
                        _ => None,
                    })
                    .unwrap_or_else(default_datasets_path);

                StorageConfig::File { path }
            }
            StorageKind::Remote => {
                // `--storage remote` with DATABASE=file still honours S3_* variables.
                let env_remote = match env_config.storage {
                    StorageConfig::Remote(remote) => remote,
                    StorageConfig::File { .. } => RemoteConfig::from_lookup(&env)?,
                };
                let file_remote = file_config.and_then(|c| match &c.storage {
                    StorageConfig::Remote(remote) => Some(remote.clone()),
                    _ => None,
                });

                // Credentials are never taken from the command line.
                let mut remote = match file_remote {
                    Some(mut remote) => {
                        if remote.access_key_id.is_none() && remote.secret_access_key.is_none() {
                            remote.access_key_id = env_remote.access_key_id;
                            remote.secret_access_key = env_remote.secret_access_key;
                        }
                        remote
                    }
                    None => env_remote,
                };
                if let Some(bucket) = &cli.s3_bucket {
                    remote.bucket = bucket.clone();
                }
                if let Some(endpoint) = &cli.s3_endpoint {
                    remote.endpoint = endpoint.clone();
                }
                if let Some(region) = &cli.aws_region {
                    remote.region = region.clone();
                }

                remote.validate()?;
                StorageConfig::Remote(remote)
            }
        };

        Ok(storage)
    }

    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

fn parse_millis(name: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Validation(format!("{} must be a number of milliseconds", name)))
}
