pub mod client;
pub mod metrics;

use client::{Connect, GaugeSink, StatsdConnector};
use mgo_statsd_component::config::StatsdConfig;
use mgo_statsd_component::sanitize::sanitize_host;
use mgo_statsd_component::{EmitError, Emitter, StatusDocument};
use tracing::trace;

/// Namespace of all gauges of one server, e.g. `prod.rs0.db-1_example_com-27017`.
pub fn namespace(prefix: &str, host: &str) -> String {
    let host = sanitize_host(host);
    if prefix.is_empty() {
        host
    } else {
        format!("{prefix}.{host}")
    }
}

/// Sends every gauge of `document` through a freshly opened sink.
///
/// Documents without a host are skipped without connecting. The first failed
/// send aborts the emission and the sink is dropped on return.
pub async fn emit<C>(
    connector: &C,
    prefix: &str,
    document: &StatusDocument,
) -> Result<usize, EmitError>
where
    C: Connect,
{
    if document.is_empty() {
        return Ok(0);
    }
    let namespace = namespace(prefix, &document.host);
    let gauges = metrics::gauges(document);

    let mut sink = connector
        .connect(&namespace)
        .await
        .map_err(|source| EmitError::Connect {
            endpoint: connector.endpoint().to_string(),
            source: source.into(),
        })?;

    for gauge in &gauges {
        sink.gauge(&gauge.path, gauge.value)
            .await
            .map_err(|source| EmitError::Send {
                metric: format!("{namespace}.{}", gauge.path),
                source: source.into(),
            })?;
    }
    trace!(
        endpoint = connector.endpoint(),
        namespace = %namespace,
        "sent {} gauges",
        gauges.len()
    );
    Ok(gauges.len())
}

/// [`Emitter`] forwarding snapshots to a statsd daemon.
#[derive(Debug)]
pub struct StatsdEmitter<C = StatsdConnector> {
    connector: C,
    prefix: String,
}

impl StatsdEmitter {
    pub fn new(config: &StatsdConfig) -> Self {
        Self::with_connector(StatsdConnector::new(config.endpoint()), config.prefix())
    }
}

impl<C> StatsdEmitter<C>
where
    C: Connect,
{
    pub fn with_connector(connector: C, prefix: impl Into<String>) -> Self {
        Self {
            connector,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }
}

#[async_trait::async_trait]
impl<C> Emitter for StatsdEmitter<C>
where
    C: Connect,
{
    async fn emit(&self, document: &StatusDocument) -> Result<usize, EmitError> {
        crate::emit(&self.connector, &self.prefix, document).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence::MetricResult;
    use mgo_statsd_component::document::{
        CommandCounter, Connections, Counters, ReplicationRole, StorageEngineInfo,
    };
    use std::collections::BTreeSet;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct MockConnector {
        lines: Arc<Mutex<Vec<String>>>,
        connects: AtomicUsize,
        fail_connect: bool,
        fail_at: Option<usize>,
    }

    impl MockConnector {
        fn lines(&self) -> Vec<String> {
            self.lines.lock().unwrap().clone()
        }
    }

    #[derive(Debug)]
    struct MockSink {
        prefix: String,
        lines: Arc<Mutex<Vec<String>>>,
        sent: usize,
        fail_at: Option<usize>,
    }

    #[async_trait::async_trait]
    impl GaugeSink for MockSink {
        async fn gauge(&mut self, metric: &str, value: i64) -> MetricResult<()> {
            if self.fail_at == Some(self.sent) {
                return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused").into());
            }
            self.sent += 1;
            self.lines
                .lock()
                .unwrap()
                .push(format!("{}.{metric}:{value}|g", self.prefix));
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl Connect for MockConnector {
        type Sink = MockSink;

        fn endpoint(&self) -> &str {
            "statsd.test:8125"
        }

        async fn connect(&self, prefix: &str) -> MetricResult<Self::Sink> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.fail_connect {
                return Err(io::Error::new(io::ErrorKind::NotFound, "no such host").into());
            }
            Ok(MockSink {
                prefix: prefix.to_string(),
                lines: Arc::clone(&self.lines),
                sent: 0,
                fail_at: self.fail_at,
            })
        }
    }

    fn counters<const N: usize>(entries: [(&str, i64); N]) -> Counters {
        entries
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect()
    }

    fn full_document() -> StatusDocument {
        let mut document = StatusDocument {
            host: "db-1.example.com:27017".to_string(),
            connections: Connections {
                current: 12,
                available: 800,
                total_created: 40,
            },
            replication_role: ReplicationRole {
                is_master: true,
                is_secondary: false,
            },
            ..StatusDocument::default()
        };
        let metrics = &mut document.server_metrics;
        metrics.command_counters.insert(
            "find".to_string(),
            CommandCounter {
                failed: 0,
                total: 40,
            },
        );
        metrics.command_counters.insert(
            "insert".to_string(),
            CommandCounter {
                failed: 1,
                total: 5,
            },
        );
        metrics
            .command_counters
            .insert("dropIndexes".to_string(), CommandCounter::default());
        metrics.cursor.timed_out = 2;
        metrics.cursor.open_by_type = counters([("pinned", 1), ("total", 3)]);
        metrics.document = counters([("inserted", 5)]);
        metrics.operation = counters([("writeConflicts", 0)]);
        metrics.query_executor = counters([("scanned", 100)]);

        let mut info = StorageEngineInfo {
            cache: counters([("LRU eviction (0.0)", 0), ("bytes currently in the cache", 10)]),
            connection: counters([("files currently open", 24)]),
            ..StorageEngineInfo::default()
        };
        info.concurrent_transactions.read = counters([("out", 1)]);
        info.concurrent_transactions.write = counters([("available", 128)]);
        document.storage_engine_info = Some(info);
        document
    }

    fn metric_paths(lines: &[String]) -> BTreeSet<String> {
        lines
            .iter()
            .map(|line| {
                let (name, _) = line.split_once(':').unwrap();
                name.to_string()
            })
            .collect()
    }

    #[test]
    fn namespace_includes_sanitized_host() {
        assert_eq!(
            namespace("prod.rs0", "db-1.example.com:27017"),
            "prod.rs0.db-1_example_com-27017"
        );
        assert_eq!(namespace("", "localhost:27017"), "localhost-27017");
    }

    #[tokio::test]
    async fn sends_exactly_the_gauge_table() {
        let connector = MockConnector::default();
        let sent = emit(&connector, "prod.rs0", &full_document()).await.unwrap();
        let lines = connector.lines();
        assert_eq!(sent, 40);
        assert_eq!(lines.len(), 40);

        let expected: BTreeSet<String> = [
            "connections.current",
            "connections.available",
            "connections.created",
            "ops.inserts",
            "ops.queries",
            "ops.updates",
            "ops.deletes",
            "ops.getmores",
            "ops.commands",
            "mem.resident",
            "mem.virtual",
            "mem.mapped",
            "mem.mapped_with_journal",
            "global_lock.total_time",
            "global_lock.lock_time",
            "global_lock.active_readers",
            "global_lock.active_writers",
            "global_lock.active_total",
            "global_lock.queued_readers",
            "global_lock.queued_writers",
            "global_lock.queued_total",
            "extra.page_faults",
            "extra.heap_usage",
            "extra.is_master",
            "extra.is_secondary",
            "metrics.commands.find.failed",
            "metrics.commands.find.total",
            "metrics.commands.insert.failed",
            "metrics.commands.insert.total",
            "metrics.cursor.timedout",
            "metrics.cursor.open-pinned",
            "metrics.cursor.open-total",
            "metrics.document.inserted",
            "metrics.operation.writeConflicts",
            "metrics.query_executor.scanned",
            "wiredtiger.cache.LRU_eviction__0_0_",
            "wiredtiger.cache.bytes_currently_in_the_cache",
            "wiredtiger.conc_txn_rd.out",
            "wiredtiger.conc_txn_wr.available",
            "wiredtiger.conn.files_currently_open",
        ]
        .into_iter()
        .map(|path| format!("prod.rs0.db-1_example_com-27017.{path}"))
        .collect();
        assert_eq!(metric_paths(&lines), expected);

        for line in [
            "prod.rs0.db-1_example_com-27017.connections.current:12|g",
            "prod.rs0.db-1_example_com-27017.extra.is_master:1|g",
            "prod.rs0.db-1_example_com-27017.extra.is_secondary:0|g",
            "prod.rs0.db-1_example_com-27017.metrics.commands.insert.failed:1|g",
        ] {
            assert!(lines.iter().any(|sent| sent == line), "missing {line}");
        }
        assert!(!lines.iter().any(|line| line.contains("dropIndexes")));
    }

    #[tokio::test]
    async fn absent_storage_engine_info() {
        let connector = MockConnector::default();
        let document = StatusDocument {
            storage_engine_info: None,
            ..full_document()
        };
        let sent = emit(&connector, "prod.rs0", &document).await.unwrap();
        assert_eq!(sent, 35);
        assert!(!connector.lines().iter().any(|line| line.contains(".wiredtiger.")));
    }

    #[tokio::test]
    async fn empty_host_does_not_connect() {
        let connector = MockConnector::default();
        let sent = emit(&connector, "prod.rs0", &StatusDocument::default())
            .await
            .unwrap();
        assert_eq!(sent, 0);
        assert_eq!(connector.connects.load(Ordering::SeqCst), 0);
        assert!(connector.lines().is_empty());
    }

    #[tokio::test]
    async fn first_send_failure_aborts() {
        let connector = MockConnector {
            fail_at: Some(2),
            ..MockConnector::default()
        };
        let err = emit(&connector, "prod.rs0", &full_document())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EmitError::Send { ref metric, .. }
                if metric == "prod.rs0.db-1_example_com-27017.connections.created"
        ));
        assert_eq!(connector.lines().len(), 2);
    }

    #[tokio::test]
    async fn connect_failure() {
        let connector = MockConnector {
            fail_connect: true,
            ..MockConnector::default()
        };
        let err = emit(&connector, "prod.rs0", &full_document())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EmitError::Connect { ref endpoint, .. } if endpoint == "statsd.test:8125"
        ));
        assert!(connector.lines().is_empty());
    }

    #[tokio::test]
    async fn repeated_emissions_are_identical() {
        let connector = MockConnector::default();
        let emitter = StatsdEmitter::with_connector(connector, "prod.rs0");
        let document = full_document();
        emitter.emit(&document).await.unwrap();
        let first = emitter.connector().lines();
        emitter.emit(&document).await.unwrap();
        let all = emitter.connector().lines();
        assert_eq!(all.len(), first.len() * 2);
        assert_eq!(&all[first.len()..], first.as_slice());
        assert_eq!(emitter.connector().connects.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn emitter_from_config() {
        let config = StatsdConfig {
            host: "statsd.internal".to_string(),
            port: 9125,
            env: "prod".to_string(),
            cluster: String::new(),
        };
        let emitter = StatsdEmitter::new(&config);
        assert_eq!(emitter.prefix(), "prod");
        assert_eq!(emitter.connector().endpoint(), "statsd.internal:9125");
    }

    #[tokio::test]
    async fn sends_over_udp() {
        let server = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();
        let emitter = StatsdEmitter::new(&StatsdConfig {
            host: "127.0.0.1".to_string(),
            port,
            env: "prod".to_string(),
            cluster: "rs0".to_string(),
        });
        let document = StatusDocument {
            host: "db-1:27017".to_string(),
            ..StatusDocument::default()
        };
        let sent = emitter.emit(&document).await.unwrap();
        assert_eq!(sent, 26);

        let mut buf = [0u8; 512];
        let len = server.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"prod.rs0.db-1-27017.connections.current:0|g");
    }
}
