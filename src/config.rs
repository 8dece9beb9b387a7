//! Configuration management.
//!
//! Read from `FAMILY_TASKS__<SECTION>__<KEY>` environment variables,
//! e.g. `FAMILY_TASKS__STORE__BACKEND=scylla`.

use serde::Deserialize;

pub const ENV_PREFIX: &str = "FAMILY_TASKS";

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Admin HTTP server
    #[serde(default)]
    pub server: ServerConfig,

    /// Event and snapshot storage
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub scylla: ScyllaConfig,

    /// Where published events go
    #[serde(default)]
    pub bus: BusConfig,

    #[serde(default)]
    pub redpanda: RedpandaConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Scylla,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScyllaConfig {
    /// Contact point, `host:port`
    #[serde(default = "default_known_node")]
    pub known_node: String,

    #[serde(default = "default_keyspace")]
    pub keyspace: String,

    /// Connection attempts before giving up at startup
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
}

impl Default for ScyllaConfig {
    fn default() -> Self {
        Self {
            known_node: default_known_node(),
            keyspace: default_keyspace(),
            connect_attempts: default_connect_attempts(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    /// In-process projections
    #[default]
    Projections,
    Redpanda,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BusConfig {
    #[serde(default)]
    pub kind: BusKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedpandaConfig {
    #[serde(default = "default_brokers")]
    pub brokers: String,

    #[serde(default = "default_topic")]
    pub topic: String,
}

impl Default for RedpandaConfig {
    fn default() -> Self {
        Self {
            brokers: default_brokers(),
            topic: default_topic(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
        }
    }
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_known_node() -> String { "127.0.0.1:9042".to_string() }
fn default_keyspace() -> String { "family_tasks".to_string() }
fn default_connect_attempts() -> u32 { 5 }
fn default_brokers() -> String { "127.0.0.1:9092".to_string() }
fn default_topic() -> String { "family-task-events".to_string() }
fn default_log_filter() -> String { "info,family_tasks_es=debug".to_string() }

impl Config {
    /// Load configuration from the process environment.
    pub fn load() -> anyhow::Result<Self> {
        Self::from_environment(environment())
    }

    /// Load configuration from a file, with environment overrides.
    pub fn load_from_file(path: &str) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(environment())
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }

    fn from_environment(source: config::Environment) -> anyhow::Result<Self> {
        let config = config::Config::builder().add_source(source).build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.server.host.clone(), self.server.port)
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_vars(vars: &[(&str, &str)]) -> Config {
        let map: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_environment(environment().source(Some(map))).unwrap()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = from_vars(&[]);

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.bus.kind, BusKind::Projections);
        assert_eq!(config.scylla.keyspace, "family_tasks");
        assert_eq!(config.redpanda.topic, "family-task-events");
        assert_eq!(config.observability.log_filter, "info,family_tasks_es=debug");
    }

    #[test]
    fn test_environment_overrides() {
        let config = from_vars(&[
            ("FAMILY_TASKS__SERVER__PORT", "9000"),
            ("FAMILY_TASKS__STORE__BACKEND", "scylla"),
            ("FAMILY_TASKS__SCYLLA__KNOWN_NODE", "scylla:9042"),
            ("FAMILY_TASKS__BUS__KIND", "redpanda"),
        ]);

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.store.backend, StoreBackend::Scylla);
        assert_eq!(config.scylla.known_node, "scylla:9042");
        assert_eq!(config.bus.kind, BusKind::Redpanda);
        assert_eq!(config.redpanda.brokers, "127.0.0.1:9092");
    }
}
