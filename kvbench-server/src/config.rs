//! Configuration for the kvbench runner.
//!
//! Configuration can be loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. Environment variables (prefixed with `KVBENCH__`)
//! 2. YAML configuration file (specified via `-c` or `--config` flag)
//! 3. Defaults
//!
//! See [`Config`] for a description of all configuration fields and their defaults.
//!
//! # Environment Variables
//!
//! Environment variables use `KVBENCH__` as a prefix and double underscores (`__`) to denote
//! nested configuration structures. For example:
//!
//! - `KVBENCH__WORKLOAD__THREADS=50` sets the number of steady-state workers
//! - `KVBENCH__STORE__TYPE=standalone` selects a single Redis server
//! - `KVBENCH__STORE__NODES='["redis-0:6379"]'` sets the node list
//!
//! # YAML Configuration File
//!
//! The above configuration in YAML format would look like this:
//!
//! ```yaml
//! workload:
//!   threads: 50
//!
//! store:
//!   type: standalone
//!   nodes: [redis-0:6379]
//! ```

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use bytesize::ByteSize;
use figment::providers::{Env, Format, Serialized, Yaml};
use kvbench_engine::{EngineConfig, RateLimit};
use secrecy::{CloneableSecret, SecretBox, SerializableSecret, zeroize::Zeroize};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "KVBENCH__";

/// Newtype around `String` that may protect against accidental
/// logging of secrets in our configuration struct. Use with
/// [`secrecy::SecretBox`].
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigSecret(String);

impl ConfigSecret {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for ConfigSecret {
    fn from(str: &str) -> Self {
        ConfigSecret(str.to_string())
    }
}

impl fmt::Debug for ConfigSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "[redacted]")
    }
}

impl CloneableSecret for ConfigSecret {}
impl SerializableSecret for ConfigSecret {}
impl Zeroize for ConfigSecret {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

/// Throughput ceiling of the steady-state workers.
///
/// Used in: [`Workload::rate_limit`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Operations allowed per `window`. `0` disables rate limiting.
    ///
    /// # Default
    ///
    /// `100`
    ///
    /// # Environment Variable
    ///
    /// `KVBENCH__WORKLOAD__RATE_LIMIT__PERMITS`
    pub permits: u32,

    /// The window `permits` applies to.
    ///
    /// # Default
    ///
    /// `1s`
    #[serde(with = "humantime_serde")]
    pub window: Duration,

    /// Maximum time a worker waits for a permit before skipping the cycle.
    ///
    /// # Default
    ///
    /// `2ms`
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Permits that may be used back-to-back after an idle period.
    ///
    /// # Default
    ///
    /// `0`
    pub burst: u32,

    /// Apply one limit to all workers together instead of one limit per worker.
    ///
    /// # Default
    ///
    /// `false`
    pub shared: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let limit = RateLimit::default();
        Self {
            permits: limit.permits,
            window: limit.window,
            timeout: limit.timeout,
            burst: limit.burst,
            shared: false,
        }
    }
}

/// Shape of the generated load.
///
/// Used in: [`Config::workload`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Workload {
    /// Number of keys the store should contain before steady state starts.
    ///
    /// Missing keys are written during the preset phase. Keys already in the store count towards
    /// this target and are never overwritten by the preset.
    ///
    /// # Default
    ///
    /// `100000`
    ///
    /// # Environment Variable
    ///
    /// `KVBENCH__WORKLOAD__DATA_SET_SIZE`
    pub data_set_size: usize,

    /// Size of every value written by preset and update operations.
    ///
    /// # Default
    ///
    /// `1 KiB`
    ///
    /// # Environment Variable
    ///
    /// `KVBENCH__WORKLOAD__DATA_SIZE`
    pub data_size: ByteSize,

    /// Number of steady-state workers.
    ///
    /// # Default
    ///
    /// `100`
    pub threads: usize,

    /// Maximum number of concurrent writes during the preset phase.
    ///
    /// # Default
    ///
    /// `100`
    pub preset_threads: usize,

    /// Throughput ceiling. See [`RateLimitConfig`].
    pub rate_limit: RateLimitConfig,

    /// Probability that an iteration reads its key.
    ///
    /// # Default
    ///
    /// `0.25`
    pub read_rate: f64,

    /// Probability that an iteration overwrites its key.
    ///
    /// `read_rate + update_rate` must not exceed `1.0`. Any remainder makes iterations idle.
    ///
    /// # Default
    ///
    /// `0.75`
    pub update_rate: f64,

    /// Prefix of keys generated during the preset phase.
    ///
    /// # Default
    ///
    /// `"kvbench-"`
    pub key_prefix: String,

    /// Number of keys requested per `SCAN` round trip.
    ///
    /// # Default
    ///
    /// `1000`
    pub scan_count: usize,

    /// Re-scan the store after the preset phase and warn if it misses the target.
    ///
    /// # Default
    ///
    /// `true`
    pub verify_preset: bool,

    /// Duration of the steady state.
    ///
    /// # Default
    ///
    /// `None` (run until interrupted)
    ///
    /// # Environment Variable
    ///
    /// `KVBENCH__WORKLOAD__DURATION=5m`
    #[serde(with = "humantime_serde")]
    pub duration: Option<Duration>,

    /// Time to wait for workers to finish their in-flight calls on shutdown.
    ///
    /// Workers that have not stopped by then are aborted.
    ///
    /// # Default
    ///
    /// `100s`
    #[serde(with = "humantime_serde")]
    pub stop_timeout: Duration,

    /// Seed for the random number generators of the workers.
    ///
    /// # Default
    ///
    /// `None` (random)
    pub seed: Option<u64>,
}

impl Workload {
    /// Builds the engine parameters of this workload.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            data_set_size: self.data_set_size,
            data_size: self.data_size.as_u64() as usize,
            threads: self.threads,
            preset_threads: self.preset_threads,
            rate_limit: RateLimit {
                permits: self.rate_limit.permits,
                window: self.rate_limit.window,
                timeout: self.rate_limit.timeout,
                burst: self.rate_limit.burst,
            },
            shared_rate_limit: self.rate_limit.shared,
            read_rate: self.read_rate,
            update_rate: self.update_rate,
            key_prefix: self.key_prefix.clone(),
            scan_count: self.scan_count,
            verify_preset: self.verify_preset,
            seed: self.seed,
        }
    }
}

impl Default for Workload {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            data_set_size: engine.data_set_size,
            data_size: ByteSize::b(engine.data_size as u64),
            threads: engine.threads,
            preset_threads: engine.preset_threads,
            rate_limit: RateLimitConfig::default(),
            read_rate: engine.read_rate,
            update_rate: engine.update_rate,
            key_prefix: engine.key_prefix,
            scan_count: engine.scan_count,
            verify_preset: engine.verify_preset,
            duration: None,
            stop_timeout: Duration::from_secs(100),
            seed: None,
        }
    }
}

/// Topology of the target store.
///
/// Used in: [`Store::kind`]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// A Redis Cluster. Commands are routed to the node owning the key.
    Cluster,
    /// A single Redis server. Only the first node is used.
    Standalone,
    /// An in-process map, for dry runs without a server.
    Memory,
}

/// Connection limits of the store client.
///
/// Used in: [`Store::pool`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Pool {
    /// Number of multiplexed connections to a standalone server.
    ///
    /// # Default
    ///
    /// `10`
    pub connections: usize,

    /// Maximum number of commands in flight at once.
    ///
    /// Commands beyond this limit fail immediately instead of queueing.
    ///
    /// # Default
    ///
    /// `3000`
    pub max_active: usize,
}

impl Default for Pool {
    fn default() -> Self {
        Self {
            connections: 10,
            max_active: 3000,
        }
    }
}

/// Target store configuration.
///
/// The `type` field in YAML or `__TYPE` in environment variables determines the topology.
///
/// Used in: [`Config::store`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Store {
    /// Topology of the store. See [`StoreKind`].
    ///
    /// # Default
    ///
    /// `cluster`
    ///
    /// # Environment Variable
    ///
    /// `KVBENCH__STORE__TYPE`
    #[serde(rename = "type")]
    pub kind: StoreKind,

    /// Addresses of the store nodes as `host:port`.
    ///
    /// For a cluster these are the seed nodes; the remaining topology is discovered.
    ///
    /// # Default
    ///
    /// `["localhost:6379"]`
    ///
    /// # Environment Variable
    ///
    /// `KVBENCH__STORE__NODES='["redis-0:6379","redis-1:6379"]'`
    pub nodes: Vec<String>,

    /// Logical database of a standalone server.
    ///
    /// # Default
    ///
    /// `0`
    pub database: i64,

    /// Username for ACL authentication.
    pub username: Option<String>,

    /// Password for authentication. Redacted from logs.
    ///
    /// # Environment Variable
    ///
    /// `KVBENCH__STORE__PASSWORD`
    pub password: Option<SecretBox<ConfigSecret>>,

    /// Timeout of every single command. A command that times out counts as failed.
    ///
    /// # Default
    ///
    /// `15s`
    #[serde(with = "humantime_serde")]
    pub command_timeout: Duration,

    /// Connection limits. See [`Pool`].
    pub pool: Pool,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            kind: StoreKind::Cluster,
            nodes: vec!["localhost:6379".to_owned()],
            database: 0,
            username: None,
            password: None,
            command_timeout: Duration::from_secs(15),
            pool: Pool::default(),
        }
    }
}

/// Runtime configuration for the Tokio async runtime.
///
/// Used in: [`Config::runtime`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Runtime {
    /// Number of worker threads of the runtime driving the workers.
    ///
    /// # Default
    ///
    /// Defaults to the number of CPU cores on the host machine.
    ///
    /// # Environment Variable
    ///
    /// `KVBENCH__RUNTIME__WORKER_THREADS`
    pub worker_threads: usize,
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            worker_threads: std::thread::available_parallelism().map_or(1, |n| n.get()),
        }
    }
}

/// [Sentry](https://sentry.io/) error tracking configuration.
///
/// Sentry is disabled by default and only enabled when a DSN is provided. Warnings and errors
/// logged during a run are reported as events.
///
/// Used in: [`Config::sentry`]
#[derive(Debug, Deserialize, Serialize)]
pub struct Sentry {
    /// Sentry DSN (Data Source Name).
    ///
    /// # Default
    ///
    /// `None` (Sentry disabled)
    ///
    /// # Environment Variable
    ///
    /// `KVBENCH__SENTRY__DSN`
    pub dsn: Option<SecretBox<ConfigSecret>>,

    /// Environment name for this deployment.
    pub environment: Option<Cow<'static, str>>,

    /// Name of the host running the benchmark.
    pub server_name: Option<Cow<'static, str>>,

    /// Error event sampling rate.
    ///
    /// # Default
    ///
    /// `1.0` (send all errors)
    pub sample_rate: f32,

    /// Performance trace sampling rate.
    ///
    /// # Default
    ///
    /// `0.01`
    pub traces_sample_rate: f32,

    /// Enable Sentry SDK debug mode.
    ///
    /// # Default
    ///
    /// `false`
    pub debug: bool,

    /// Additional tags to attach to all Sentry events.
    ///
    /// # Environment Variables
    ///
    /// Each tag is set individually:
    /// - `KVBENCH__SENTRY__TAGS__FOO=foo`
    pub tags: BTreeMap<String, String>,
}

impl Sentry {
    /// Returns whether Sentry integration is enabled.
    pub fn is_enabled(&self) -> bool {
        self.dsn.is_some()
    }
}

impl Default for Sentry {
    fn default() -> Self {
        Self {
            dsn: None,
            environment: None,
            server_name: None,
            sample_rate: 1.0,
            traces_sample_rate: 0.01,
            debug: false,
            tags: BTreeMap::new(),
        }
    }
}

/// Log output format.
///
/// Controls how log messages are formatted. The format can be explicitly specified or
/// auto-detected based on whether output is to a TTY.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect the best format.
    ///
    /// This chooses [`LogFormat::Pretty`] for TTY, otherwise [`LogFormat::Simplified`].
    Auto,

    /// Pretty printing with colors.
    Pretty,

    /// Simplified plain text output.
    Simplified,

    /// Dump out JSON lines.
    Json,
}

/// The logging format parse error.
#[derive(Clone, Debug)]
pub struct FormatParseError(String);

impl fmt::Display for FormatParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"error parsing "{}" as format: expected one of "auto", "pretty", "simplified", "json""#,
            self.0
        )
    }
}

impl std::str::FromStr for LogFormat {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let result = match s {
            "" => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("auto") => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            s if s.eq_ignore_ascii_case("simplified") => LogFormat::Simplified,
            s if s.eq_ignore_ascii_case("json") => LogFormat::Json,
            s => return Err(FormatParseError(s.into())),
        };

        Ok(result)
    }
}

impl std::error::Error for FormatParseError {}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging configuration.
///
/// Logs are always written to stderr, so they don't interleave with the summary on stdout.
///
/// Used in: [`Config::logging`]
#[derive(Debug, Deserialize, Serialize)]
pub struct Logging {
    /// Minimum log level to output.
    ///
    /// The `RUST_LOG` environment variable provides more granular control per module if needed.
    ///
    /// # Default
    ///
    /// `INFO`
    ///
    /// # Environment Variable
    ///
    /// `KVBENCH__LOGGING__LEVEL`
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// Log output format. See [`LogFormat`].
    ///
    /// # Default
    ///
    /// `Auto`
    ///
    /// # Environment Variable
    ///
    /// `KVBENCH__LOGGING__FORMAT`
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// Metrics configuration.
///
/// Per-operation counters and latency distributions can be submitted to Datadog in addition to
/// the progress log and the final summary.
#[derive(Debug, Deserialize, Serialize)]
pub struct Metrics {
    /// Datadog [API key] for metrics.
    ///
    /// # Default
    ///
    /// `None` (Datadog metrics disabled)
    ///
    /// # Environment Variable
    ///
    /// `KVBENCH__METRICS__DATADOG_KEY`
    ///
    /// [API key]: https://docs.datadoghq.com/account_management/api-app-keys/#api-keys
    pub datadog_key: Option<SecretBox<ConfigSecret>>,

    /// Global tags applied to all metrics.
    ///
    /// # Environment Variables
    ///
    /// Each tag is set individually:
    /// - `KVBENCH__METRICS__TAGS__FOO=foo`
    pub tags: BTreeMap<String, String>,

    /// Interval of the progress log during steady state.
    ///
    /// # Default
    ///
    /// `10s`
    #[serde(with = "humantime_serde")]
    pub report_interval: Duration,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            datadog_key: None,
            tags: BTreeMap::new(),
            report_interval: Duration::from_secs(10),
        }
    }
}

/// Main configuration struct for kvbench.
///
/// Configuration is loaded with the following precedence (highest to lowest):
/// 1. Environment variables (prefixed with `KVBENCH__`)
/// 2. YAML configuration file (if provided via `-c` flag)
/// 3. Default values
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Shape of the generated load. See [`Workload`].
    pub workload: Workload,

    /// The store under test. See [`Store`].
    pub store: Store,

    /// Configuration of the internal task runtime. See [`Runtime`].
    pub runtime: Runtime,

    /// Logging configuration. See [`Logging`].
    pub logging: Logging,

    /// Sentry error tracking configuration. See [`Sentry`].
    pub sentry: Sentry,

    /// Metrics configuration. See [`Metrics`].
    pub metrics: Metrics,
}

impl Config {
    /// Loads configuration from defaults, an optional YAML file and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The YAML configuration file cannot be read or parsed
    /// - Environment variables contain invalid values
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn defaults() {
        figment::Jail::expect_with(|_jail| {
            let config = Config::load(None).unwrap();

            assert_eq!(config.workload.data_set_size, 100_000);
            assert_eq!(config.workload.data_size, ByteSize::kib(1));
            assert_eq!(config.workload.threads, 100);
            assert_eq!(config.workload.rate_limit.permits, 100);
            assert_eq!(config.workload.rate_limit.timeout, Duration::from_millis(2));
            assert_eq!(config.workload.read_rate, 0.25);
            assert_eq!(config.workload.update_rate, 0.75);
            assert_eq!(config.workload.duration, None);
            assert_eq!(config.store.kind, StoreKind::Cluster);
            assert_eq!(config.store.nodes, ["localhost:6379"]);
            assert_eq!(config.store.command_timeout, Duration::from_secs(15));
            assert_eq!(config.store.pool.max_active, 3000);
            assert!(!config.sentry.is_enabled());

            Ok(())
        });
    }

    #[test]
    fn configurable_via_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("KVBENCH__WORKLOAD__THREADS", "8");
            jail.set_env("KVBENCH__WORKLOAD__DATA_SIZE", "4KiB");
            jail.set_env("KVBENCH__WORKLOAD__RATE_LIMIT__PERMITS", "0");
            jail.set_env("KVBENCH__WORKLOAD__DURATION", "5m");
            jail.set_env("KVBENCH__STORE__TYPE", "standalone");
            jail.set_env("KVBENCH__STORE__NODES", r#"["redis-0:6379", "redis-1:6379"]"#);
            jail.set_env("KVBENCH__STORE__PASSWORD", "hunter2");
            jail.set_env("KVBENCH__METRICS__TAGS__FOO", "bar");
            jail.set_env("KVBENCH__SENTRY__DSN", "abcde");
            jail.set_env("KVBENCH__SENTRY__ENVIRONMENT", "staging");

            let config = Config::load(None).unwrap();

            assert_eq!(config.workload.threads, 8);
            assert_eq!(config.workload.data_size, ByteSize::kib(4));
            assert_eq!(config.workload.rate_limit.permits, 0);
            assert_eq!(config.workload.duration, Some(Duration::from_secs(300)));
            // Untouched fields of a nested section keep their defaults.
            assert_eq!(config.workload.preset_threads, 100);
            assert_eq!(config.store.kind, StoreKind::Standalone);
            assert_eq!(config.store.nodes, ["redis-0:6379", "redis-1:6379"]);
            assert_eq!(
                config.store.password.unwrap().expose_secret().as_str(),
                "hunter2"
            );
            assert_eq!(config.metrics.tags, [("foo".into(), "bar".into())].into());
            assert_eq!(config.sentry.dsn.unwrap().expose_secret().as_str(), "abcde");
            assert_eq!(config.sentry.environment.as_deref(), Some("staging"));

            Ok(())
        });
    }

    #[test]
    fn configurable_via_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            workload:
                data_set_size: 500
                read_rate: 0.5
                update_rate: 0.5
                rate_limit:
                    permits: 20
                    window: 100ms
                    shared: true
            store:
                type: memory
            logging:
                level: debug
                format: json
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|_jail| {
            let config = Config::load(Some(tempfile.path())).unwrap();

            assert_eq!(config.workload.data_set_size, 500);
            assert_eq!(config.workload.read_rate, 0.5);
            assert_eq!(config.workload.rate_limit.permits, 20);
            assert_eq!(config.workload.rate_limit.window, Duration::from_millis(100));
            assert!(config.workload.rate_limit.shared);
            assert_eq!(config.store.kind, StoreKind::Memory);
            assert_eq!(config.logging.level, LevelFilter::DEBUG);
            assert_eq!(config.logging.format, LogFormat::Json);

            Ok(())
        });
    }

    #[test]
    fn configured_with_env_and_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            workload:
                threads: 4
                key_prefix: yaml-
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|jail| {
            jail.set_env("KVBENCH__WORKLOAD__THREADS", "16");

            let config = Config::load(Some(tempfile.path())).unwrap();

            // Env should overwrite the yaml config
            assert_eq!(config.workload.threads, 16);
            assert_eq!(config.workload.key_prefix, "yaml-");

            Ok(())
        });
    }

    #[test]
    fn secrets_are_redacted() {
        let store = Store {
            password: Some(SecretBox::new(Box::new(ConfigSecret::from("hunter2")))),
            ..Default::default()
        };
        let debug = format!("{store:?}");
        assert!(!debug.contains("hunter2"), "{debug}");
    }

    #[test]
    fn engine_config_from_workload() {
        let workload = Workload {
            data_size: ByteSize::kib(2),
            rate_limit: RateLimitConfig {
                permits: 5,
                shared: true,
                ..Default::default()
            },
            seed: Some(3),
            ..Default::default()
        };

        let engine = workload.engine_config();
        assert_eq!(engine.data_size, 2048);
        assert_eq!(engine.rate_limit.permits, 5);
        assert!(engine.shared_rate_limit);
        assert_eq!(engine.seed, Some(3));
        assert!(engine.validate().is_ok());
    }
}
