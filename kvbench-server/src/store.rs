//! Store clients for the configured target.
//!
//! [`RedisStore`] talks to a Redis server or cluster over multiplexed connections. Every command
//! is bounded by the configured command timeout and counted against a [`ConcurrencyLimiter`], so a
//! slow or exhausted store shows up as failed calls rather than stalled workers.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use kvbench_engine::store::BoxedStore;
use kvbench_engine::{InMemoryStore, Key, StoreClient, StoreError, StoreResult};
use redis::aio::{ConnectionLike, ConnectionManager};
use redis::cluster::ClusterClient;
use redis::cluster_async::ClusterConnection;
use redis::{ConnectionInfo, FromRedisValue, IntoConnectionInfo, RedisError};
use secrecy::ExposeSecret;

use crate::concurrency::ConcurrencyLimiter;
use crate::config::{Store, StoreKind};

/// Creates a store client for the given configuration and establishes its connections.
pub async fn connect(config: &Store) -> Result<BoxedStore> {
    let store: BoxedStore = match config.kind {
        StoreKind::Memory => Arc::new(InMemoryStore::new()),
        StoreKind::Standalone => Arc::new(RedisStore::standalone(config).await?),
        StoreKind::Cluster => Arc::new(RedisStore::cluster(config).await?),
    };

    tracing::info!(store = store.name(), nodes = ?config.nodes, "connected to store");
    Ok(store)
}

enum Connection {
    /// Multiplexed connections to a single server, used round-robin.
    Standalone(Vec<ConnectionManager>),
    /// A cluster-aware connection that routes every command to the owning node.
    Cluster {
        connection: ClusterConnection,
        seeds: Vec<ConnectionInfo>,
    },
}

/// A [`StoreClient`] backed by Redis.
pub struct RedisStore {
    connection: Connection,
    next: AtomicUsize,
    limiter: ConcurrencyLimiter,
    timeout: Duration,
}

impl RedisStore {
    /// Connects to the first configured node as a single server.
    pub async fn standalone(config: &Store) -> Result<Self> {
        let node = config.nodes.first().context("no store node configured")?;
        let info = connection_info(config, node, config.database)?;
        let client = redis::Client::open(info)?;

        let mut managers = Vec::with_capacity(config.pool.connections.max(1));
        for _ in 0..config.pool.connections.max(1) {
            let connecting = client.get_connection_manager();
            let manager = tokio::time::timeout(config.command_timeout, connecting)
                .await
                .with_context(|| format!("timed out connecting to {node}"))?
                .with_context(|| format!("failed to connect to {node}"))?;
            managers.push(manager);
        }

        Ok(Self::new(Connection::Standalone(managers), config))
    }

    /// Connects to a cluster using the configured nodes as seeds.
    pub async fn cluster(config: &Store) -> Result<Self> {
        anyhow::ensure!(!config.nodes.is_empty(), "no store node configured");
        let seeds = config
            .nodes
            .iter()
            .map(|node| connection_info(config, node, 0))
            .collect::<Result<Vec<_>>>()?;

        let mut builder = ClusterClient::builder(seeds.clone())
            .connection_timeout(config.command_timeout)
            .response_timeout(config.command_timeout);
        if let Some(ref username) = config.username {
            builder = builder.username(username.clone());
        }
        if let Some(ref password) = config.password {
            builder = builder.password(password.expose_secret().as_str().to_owned());
        }

        let client = builder.build()?;
        let connection = client
            .get_async_connection()
            .await
            .context("failed to connect to cluster")?;

        Ok(Self::new(Connection::Cluster { connection, seeds }, config))
    }

    fn new(connection: Connection, config: &Store) -> Self {
        Self {
            connection,
            next: AtomicUsize::new(0),
            limiter: ConcurrencyLimiter::new(config.pool.max_active),
            timeout: config.command_timeout,
        }
    }

    fn manager(&self, managers: &[ConnectionManager]) -> ConnectionManager {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % managers.len();
        managers[index].clone()
    }

    /// Runs a single-key command under the concurrency ceiling and the command timeout.
    async fn query<T: FromRedisValue>(&self, op: &'static str, cmd: &redis::Cmd) -> StoreResult<T> {
        let _permit = self.limiter.try_acquire()?;

        let result = match self.connection {
            Connection::Standalone(ref managers) => {
                let mut con = self.manager(managers);
                tokio::time::timeout(self.timeout, cmd.query_async(&mut con)).await
            }
            Connection::Cluster { ref connection, .. } => {
                let mut con = connection.clone();
                tokio::time::timeout(self.timeout, cmd.query_async(&mut con)).await
            }
        };

        match result {
            Ok(result) => result.map_err(|err| map_error(op, err)),
            Err(_elapsed) => Err(StoreError::Timeout),
        }
    }

    /// Returns standalone connections to every primary of the cluster.
    ///
    /// The topology is read from the first seed that answers `CLUSTER NODES`.
    async fn cluster_primaries(
        &self,
        seeds: &[ConnectionInfo],
    ) -> StoreResult<Vec<redis::aio::MultiplexedConnection>> {
        let mut last_error = None;
        for seed in seeds {
            match self.topology(seed).await {
                Ok(infos) => {
                    let mut connections = Vec::with_capacity(infos.len());
                    for info in infos {
                        connections.push(self.open(info).await?);
                    }
                    return Ok(connections);
                }
                Err(err) => {
                    tracing::debug!(
                        error = &err as &dyn std::error::Error,
                        seed = ?seed.addr,
                        "failed to read cluster topology"
                    );
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            StoreError::backend("no cluster seed", std::io::Error::other("no seeds configured"))
        }))
    }

    async fn topology(&self, seed: &ConnectionInfo) -> StoreResult<Vec<ConnectionInfo>> {
        let mut con = self.open(seed.clone()).await?;
        let nodes: String = self
            .with_timeout("cluster nodes", redis::cmd("CLUSTER").arg("NODES").query_async(&mut con))
            .await?;

        let seed_host = match seed.addr {
            redis::ConnectionAddr::Tcp(ref host, _) => host.as_str(),
            _ => "localhost",
        };

        let primaries = parse_primaries(&nodes, seed_host);
        if !primaries.failed.is_empty() {
            // Keys on these nodes are not counted, so the preset may write past the target.
            tracing::warn!(
                failed = ?primaries.failed,
                "skipping failed cluster primaries, their keys are not counted"
            );
        }

        primaries
            .healthy
            .into_iter()
            .map(|addr| {
                let mut info = format!("redis://{addr}")
                    .into_connection_info()
                    .map_err(|err| map_error("parse node address", err))?;
                info.redis = seed.redis.clone();
                Ok(info)
            })
            .collect()
    }

    async fn open(&self, info: ConnectionInfo) -> StoreResult<redis::aio::MultiplexedConnection> {
        let client = redis::Client::open(info).map_err(|err| map_error("connect", err))?;
        self.with_timeout("connect", client.get_multiplexed_async_connection())
            .await
    }

    async fn with_timeout<F, T>(&self, op: &'static str, future: F) -> StoreResult<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, future).await {
            Ok(result) => result.map_err(|err| map_error(op, err)),
            Err(_elapsed) => Err(StoreError::Timeout),
        }
    }

    /// Iterates `SCAN` on one server until the cursor wraps around.
    async fn scan_node<C>(
        &self,
        con: &mut C,
        batch_size: usize,
        keys: &mut HashSet<Key>,
    ) -> StoreResult<()>
    where
        C: ConnectionLike + Send,
    {
        let mut cursor: u64 = 0;
        let mut skipped = 0;
        loop {
            let (next, batch): (u64, Vec<Vec<u8>>) = self
                .with_timeout(
                    "scan",
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg("*")
                        .arg("COUNT")
                        .arg(batch_size)
                        .query_async(con),
                )
                .await?;

            for key in batch {
                match String::from_utf8(key) {
                    Ok(key) => {
                        keys.insert(key);
                    }
                    Err(_) => skipped += 1,
                }
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        if skipped > 0 {
            tracing::warn!(skipped, "ignoring keys that are not valid UTF-8");
        }
        Ok(())
    }
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let topology = match self.connection {
            Connection::Standalone(ref managers) => {
                format!("standalone ({} connections)", managers.len())
            }
            Connection::Cluster { ref seeds, .. } => format!("cluster ({} seeds)", seeds.len()),
        };

        f.debug_struct("RedisStore")
            .field("topology", &topology)
            .field("in_flight", &self.limiter.used_permits())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl StoreClient for RedisStore {
    fn name(&self) -> &'static str {
        match self.connection {
            Connection::Standalone(_) => "redis",
            Connection::Cluster { .. } => "redis-cluster",
        }
    }

    async fn scan_all_keys(&self, batch_size: usize) -> StoreResult<HashSet<Key>> {
        let mut keys = HashSet::new();
        match self.connection {
            Connection::Standalone(ref managers) => {
                let mut con = self.manager(managers);
                self.scan_node(&mut con, batch_size, &mut keys).await?;
            }
            Connection::Cluster { ref seeds, .. } => {
                let primaries = self.cluster_primaries(seeds).await?;
                tracing::debug!(primaries = primaries.len(), "scanning cluster");
                for mut con in primaries {
                    self.scan_node(&mut con, batch_size, &mut keys).await?;
                }
            }
        }
        Ok(keys)
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        let value: Option<Vec<u8>> = self.query("get", redis::cmd("GET").arg(key)).await?;
        Ok(value.map(Bytes::from))
    }

    async fn set(&self, key: &str, value: Bytes) -> StoreResult<()> {
        self.query("set", redis::cmd("SET").arg(key).arg(value.as_ref()))
            .await
    }
}

fn map_error(op: &'static str, err: RedisError) -> StoreError {
    if err.is_timeout() {
        StoreError::Timeout
    } else {
        StoreError::backend(format!("{op} failed"), err)
    }
}

fn connection_info(config: &Store, node: &str, database: i64) -> Result<ConnectionInfo> {
    let mut info = format!("redis://{node}")
        .into_connection_info()
        .with_context(|| format!("invalid store node {node:?}"))?;

    info.redis.db = database;
    info.redis.username = config.username.clone();
    info.redis.password = config
        .password
        .as_ref()
        .map(|password| password.expose_secret().as_str().to_owned());

    Ok(info)
}

/// Primaries listed in `CLUSTER NODES` output.
#[derive(Debug, Default, PartialEq)]
struct Primaries {
    /// Addresses of primaries that can be scanned.
    healthy: Vec<String>,
    /// Addresses of primaries flagged as failing or without an address.
    failed: Vec<String>,
}

/// Extracts the addresses of all primaries from `CLUSTER NODES` output.
///
/// A node that doesn't know its own address reports it as `:port`; `seed_host` fills in the host.
fn parse_primaries(nodes: &str, seed_host: &str) -> Primaries {
    let mut primaries = Primaries::default();

    for line in nodes.lines() {
        let mut fields = line.split_whitespace();
        let (Some(address), Some(flags)) = (fields.nth(1), fields.next()) else {
            continue;
        };

        let flags: Vec<&str> = flags.split(',').collect();
        if !flags.contains(&"master") {
            continue;
        }

        // ip:port@cport[,hostname]
        let Some(address) = address.split(['@', ',']).next() else {
            continue;
        };
        let address = match address.strip_prefix(':') {
            Some(port) => format!("{seed_host}:{port}"),
            None => address.to_owned(),
        };

        if flags.iter().any(|f| matches!(*f, "fail" | "fail?" | "noaddr")) {
            primaries.failed.push(address);
        } else {
            primaries.healthy.push(address);
        }
    }

    primaries
}
