use duration_string::DurationString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MONGO_ADDRESS: &str = "localhost:27017";
pub const DEFAULT_AUTH_DB: &str = "admin";
pub const DEFAULT_STATSD_HOST: &str = "localhost";
pub const DEFAULT_STATSD_PORT: u16 = 8125;
pub const DEFAULT_STATSD_CLUSTER: &str = "unknown";
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("interval must be greater than zero")]
    ZeroInterval,
    #[error("statsd host must not be empty")]
    MissingStatsdHost,
    #[error("mongo address #{index} is empty")]
    EmptyAddress { index: usize },
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub auth_db: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("auth_db", &self.auth_db)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MongoConfig {
    pub addresses: Vec<String>,
    /// Shared by every server, `None` when no user was configured.
    pub credentials: Option<Credentials>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsdConfig {
    pub host: String,
    pub port: u16,
    pub env: String,
    pub cluster: String,
}

impl StatsdConfig {
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Metric prefix shared by all servers, e.g. `prod.cluster0`.
    ///
    /// Empty labels are left out instead of producing empty path segments.
    pub fn prefix(&self) -> String {
        [self.env.as_str(), self.cluster.as_str()]
            .into_iter()
            .filter(|label| !label.is_empty())
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// Configuration of a single polled server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub index: usize,
    pub address: String,
    pub credentials: Option<Credentials>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub interval: Duration,
    pub mongo: MongoConfig,
    pub statsd: StatsdConfig,
    pub verbose: bool,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn servers(&self) -> Vec<ServerConfig> {
        self.mongo
            .addresses
            .iter()
            .enumerate()
            .map(|(index, address)| ServerConfig {
                index,
                address: address.clone(),
                credentials: self.mongo.credentials.clone(),
            })
            .collect()
    }
}

/// Contents of a YAML config file.
///
/// Keys match the command line options.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub verbose: Option<bool>,
    pub mongo_user: Option<String>,
    pub mongo_pass: Option<String>,
    pub mongo_auth_db: Option<String>,
    #[serde(default)]
    pub mongo_address: Vec<String>,
    pub statsd_host: Option<String>,
    pub statsd_port: Option<u16>,
    pub statsd_env: Option<String>,
    pub statsd_cluster: Option<String>,
    pub interval: Option<DurationString>,
}

impl FileConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = std::fs::OpenOptions::new()
            .read(true)
            .open(path)
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let reader = std::io::BufReader::new(file);
        Self::from_reader(reader)
    }

    pub fn from_reader(reader: impl std::io::BufRead) -> Result<Self, ConfigError> {
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }
}

/// Collects configuration values from the config file and the command line.
///
/// Later calls override earlier ones, except for mongo addresses which
/// accumulate in order.
#[derive(Debug, Default, Clone)]
pub struct ConfigBuilder {
    verbose: bool,
    mongo_user: Option<String>,
    mongo_pass: Option<String>,
    mongo_auth_db: Option<String>,
    mongo_addresses: Vec<String>,
    statsd_host: Option<String>,
    statsd_port: Option<u16>,
    statsd_env: Option<String>,
    statsd_cluster: Option<String>,
    interval: Option<Duration>,
}

impl ConfigBuilder {
    pub fn file(mut self, file: FileConfig) -> Self {
        if let Some(verbose) = file.verbose {
            self.verbose = verbose;
        }
        self.mongo_user = file.mongo_user.or(self.mongo_user);
        self.mongo_pass = file.mongo_pass.or(self.mongo_pass);
        self.mongo_auth_db = file.mongo_auth_db.or(self.mongo_auth_db);
        self.mongo_addresses.extend(file.mongo_address);
        self.statsd_host = file.statsd_host.or(self.statsd_host);
        self.statsd_port = file.statsd_port.or(self.statsd_port);
        self.statsd_env = file.statsd_env.or(self.statsd_env);
        self.statsd_cluster = file.statsd_cluster.or(self.statsd_cluster);
        self.interval = file.interval.map(Into::into).or(self.interval);
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn mongo_user(mut self, user: impl Into<String>) -> Self {
        self.mongo_user = Some(user.into());
        self
    }

    pub fn mongo_pass(mut self, pass: impl Into<String>) -> Self {
        self.mongo_pass = Some(pass.into());
        self
    }

    pub fn mongo_auth_db(mut self, auth_db: impl Into<String>) -> Self {
        self.mongo_auth_db = Some(auth_db.into());
        self
    }

    pub fn mongo_address(mut self, address: impl Into<String>) -> Self {
        self.mongo_addresses.push(address.into());
        self
    }

    pub fn statsd_host(mut self, host: impl Into<String>) -> Self {
        self.statsd_host = Some(host.into());
        self
    }

    pub fn statsd_port(mut self, port: u16) -> Self {
        self.statsd_port = Some(port);
        self
    }

    pub fn statsd_env(mut self, env: impl Into<String>) -> Self {
        self.statsd_env = Some(env.into());
        self
    }

    pub fn statsd_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.statsd_cluster = Some(cluster.into());
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        let interval = self.interval.unwrap_or(DEFAULT_INTERVAL);
        if interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }

        let mut addresses = self.mongo_addresses;
        if addresses.is_empty() {
            addresses.push(DEFAULT_MONGO_ADDRESS.to_string());
        }
        for (index, address) in addresses.iter_mut().enumerate() {
            *address = address.trim().to_string();
            if address.is_empty() {
                return Err(ConfigError::EmptyAddress { index });
            }
        }

        let credentials = self
            .mongo_user
            .filter(|user| !user.is_empty())
            .map(|username| Credentials {
                username,
                password: self.mongo_pass.unwrap_or_default(),
                auth_db: self
                    .mongo_auth_db
                    .filter(|db| !db.is_empty())
                    .unwrap_or_else(|| DEFAULT_AUTH_DB.to_string()),
            });

        let host = self
            .statsd_host
            .unwrap_or_else(|| DEFAULT_STATSD_HOST.to_string());
        if host.trim().is_empty() {
            return Err(ConfigError::MissingStatsdHost);
        }

        Ok(Config {
            interval,
            mongo: MongoConfig {
                addresses,
                credentials,
            },
            statsd: StatsdConfig {
                host,
                port: self.statsd_port.unwrap_or(DEFAULT_STATSD_PORT),
                env: self.statsd_env.unwrap_or_default(),
                cluster: self
                    .statsd_cluster
                    .unwrap_or_else(|| DEFAULT_STATSD_CLUSTER.to_string()),
            },
            verbose: self.verbose,
        })
    }
}
