use duration_string::DurationString;
use mgo_statsd_component::config::{Config, ConfigError, FileConfig};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable providing the default metric environment label.
pub const PROFILE_ENV: &str = "VIVINT_CONFIG_PROFILE";

fn parse_interval(value: &str) -> Result<Duration, String> {
    value
        .parse::<DurationString>()
        .map(Into::into)
        .map_err(|err| err.to_string())
}

#[derive(Debug, Default, clap::Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Options {
    #[arg(long = "mongo_user", help = "MongoDB User")]
    pub mongo_user: Option<String>,
    #[arg(long = "mongo_pass", help = "MongoDB Password")]
    pub mongo_pass: Option<String>,
    #[arg(
        long = "mongo_auth_db",
        help = "MongoDB Authentication DB [default: admin]"
    )]
    pub mongo_auth_db: Option<String>,
    #[arg(
        long = "mongo_address",
        help = "Mongo address in host:port format, may be repeated [default: localhost:27017]"
    )]
    pub mongo_addresses: Vec<String>,
    #[arg(long = "statsd_host", help = "StatsD Host [default: localhost]")]
    pub statsd_host: Option<String>,
    #[arg(long = "statsd_port", help = "StatsD Port [default: 8125]")]
    pub statsd_port: Option<u16>,
    #[arg(
        long = "statsd_env",
        help = "StatsD metric environment prefix [default: $VIVINT_CONFIG_PROFILE]"
    )]
    pub statsd_env: Option<String>,
    #[arg(
        long = "statsd_cluster",
        help = "StatsD metric cluster prefix [default: unknown]"
    )]
    pub statsd_cluster: Option<String>,
    #[arg(
        long = "interval",
        value_parser = parse_interval,
        help = "Polling interval, e.g. 5s or 1m [default: 5s]"
    )]
    pub interval: Option<Duration>,
    #[arg(short = 'v', long = "verbose", help = "Log every poll cycle")]
    pub verbose: bool,
    #[arg(
        short = 'c',
        long = "config",
        aliases = ["conf"],
        env = "MGO_STATSD_CONFIG",
        help = "Path to YAML config file"
    )]
    pub config_path: Option<PathBuf>,
}

impl Options {
    /// Merges defaults, the config file and the command line, in increasing
    /// order of precedence.
    pub fn into_config(self, profile: Option<String>) -> Result<Config, ConfigError> {
        let mut builder = Config::builder();
        if let Some(profile) = profile {
            builder = builder.statsd_env(profile);
        }
        if let Some(path) = &self.config_path {
            builder = builder.file(FileConfig::from_file(path)?);
        }

        if self.verbose {
            builder = builder.verbose(true);
        }
        if let Some(user) = self.mongo_user {
            builder = builder.mongo_user(user);
        }
        if let Some(pass) = self.mongo_pass {
            builder = builder.mongo_pass(pass);
        }
        if let Some(auth_db) = self.mongo_auth_db {
            builder = builder.mongo_auth_db(auth_db);
        }
        for address in self.mongo_addresses {
            builder = builder.mongo_address(address);
        }
        if let Some(host) = self.statsd_host {
            builder = builder.statsd_host(host);
        }
        if let Some(port) = self.statsd_port {
            builder = builder.statsd_port(port);
        }
        if let Some(env) = self.statsd_env {
            builder = builder.statsd_env(env);
        }
        if let Some(cluster) = self.statsd_cluster {
            builder = builder.statsd_cluster(cluster);
        }
        if let Some(interval) = self.interval {
            builder = builder.interval(interval);
        }
        builder.build()
    }
}
