use crate::doc::{get_path, BsonValue, InvalidTypeError, Path};
use mgo_statsd_component::document::{
    CommandCounter, ConcurrentTransactions, Connections, Counters, CursorMetrics, ExtraInfo,
    GlobalLock, Memory, OpCounters, ReadersWriters, ReplicationRole, ServerMetrics,
    StatusDocument, StorageEngineInfo,
};
use mongodb::bson::{Bson, Document};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Looks up `path`, treating a value of the wrong type like a missing one.
///
/// A single unexpected field only loses that field, never the snapshot.
fn lookup<'a, T>(
    document: &'a Document,
    path: &[&str],
    get: impl FnOnce(&'a Bson) -> Result<T, InvalidTypeError>,
) -> Option<T> {
    let value = get_path(document, path)?;
    match get(value) {
        Ok(value) => Some(value),
        Err(err) => {
            debug!(path = %Path(path), "ignoring field: {err}");
            None
        }
    }
}

/// Missing counters decode as zero, as older servers omit some of them.
fn int(document: &Document, path: &[&str]) -> i64 {
    lookup(document, path, |v| v.get_i64()).unwrap_or_default()
}

fn string(document: &Document, path: &[&str]) -> String {
    lookup(document, path, |v| v.get_str())
        .unwrap_or_default()
        .to_string()
}

fn flag(document: &Document, path: &[&str]) -> Option<bool> {
    lookup(document, path, |v| v.get_bool())
}

/// Collects the numeric entries of the sub-document at `path`.
///
/// Nested documents and other non-numeric entries are skipped.
fn counters(document: &Document, path: &[&str]) -> Counters {
    let Some(section) = lookup(document, path, |v| v.get_document()) else {
        return Counters::new();
    };
    section
        .iter()
        .filter_map(|(key, value)| match value.get_i64() {
            Ok(value) => Some((key.clone(), value)),
            Err(_) => {
                trace!("skipping non-numeric {}.{key}", Path(path));
                None
            }
        })
        .collect()
}

fn readers_writers(document: &Document, path: &[&str]) -> ReadersWriters {
    let field = |name: &str| {
        let mut full_path = path.to_vec();
        full_path.push(name);
        int(document, &full_path)
    };
    ReadersWriters {
        readers: field("readers"),
        writers: field("writers"),
        total: field("total"),
    }
}

fn op_counters(document: &Document, section: &str) -> OpCounters {
    OpCounters {
        insert: int(document, &[section, "insert"]),
        query: int(document, &[section, "query"]),
        update: int(document, &[section, "update"]),
        delete: int(document, &[section, "delete"]),
        get_more: int(document, &[section, "getmore"]),
        command: int(document, &[section, "command"]),
    }
}

fn replication_role(status: &Document) -> ReplicationRole {
    // renamed to isWritablePrimary in 5.0
    let is_master = flag(status, &["repl", "ismaster"])
        .or_else(|| flag(status, &["repl", "isWritablePrimary"]))
        .unwrap_or(false);
    ReplicationRole {
        is_master,
        is_secondary: flag(status, &["repl", "secondary"]).unwrap_or(false),
    }
}

/// Commands report `{failed, total}`; scalar entries such as `<UNKNOWN>` and
/// groups without either counter are skipped.
fn command_counters(status: &Document) -> BTreeMap<String, CommandCounter> {
    let mut command_counters = BTreeMap::new();
    let Some(commands) = lookup(status, &["metrics", "commands"], |v| v.get_document()) else {
        return command_counters;
    };
    for (name, value) in commands {
        let Some(command) = value.as_document() else {
            continue;
        };
        if !command.contains_key("failed") && !command.contains_key("total") {
            continue;
        }
        let counter = |field: &str| {
            int(status, &["metrics", "commands", name.as_str(), field])
        };
        command_counters.insert(
            name.clone(),
            CommandCounter {
                failed: counter("failed"),
                total: counter("total"),
            },
        );
    }
    command_counters
}

fn storage_engine_info(status: &Document) -> Option<StorageEngineInfo> {
    lookup(status, &["wiredTiger"], |v| v.get_document())?;
    Some(StorageEngineInfo {
        cache: counters(status, &["wiredTiger", "cache"]),
        connection: counters(status, &["wiredTiger", "connection"]),
        concurrent_transactions: ConcurrentTransactions {
            read: counters(status, &["wiredTiger", "concurrentTransactions", "read"]),
            write: counters(status, &["wiredTiger", "concurrentTransactions", "write"]),
        },
    })
}

/// Decodes a `serverStatus` response.
///
/// Missing fields and fields of an unexpected type decode as zero or empty.
/// A missing `host` decodes as an empty string, which callers treat as a
/// failed fetch. The WiredTiger section decodes to `None` when absent.
pub fn decode_server_status(status: &Document) -> StatusDocument {
    StatusDocument {
        host: string(status, &["host"]),
        version: string(status, &["version"]),
        process: string(status, &["process"]),
        pid: int(status, &["pid"]),
        uptime_seconds: int(status, &["uptime"]),
        uptime_millis: int(status, &["uptimeMillis"]),
        uptime_estimate: int(status, &["uptimeEstimate"]),
        connections: Connections {
            current: int(status, &["connections", "current"]),
            available: int(status, &["connections", "available"]),
            total_created: int(status, &["connections", "totalCreated"]),
        },
        memory: Memory {
            resident_mb: int(status, &["mem", "resident"]),
            virtual_mb: int(status, &["mem", "virtual"]),
            mapped_mb: int(status, &["mem", "mapped"]),
            mapped_with_journal_mb: int(status, &["mem", "mappedWithJournal"]),
        },
        global_lock: GlobalLock {
            total_time: int(status, &["globalLock", "totalTime"]),
            lock_time: int(status, &["globalLock", "lockTime"]),
            current_queue: readers_writers(status, &["globalLock", "currentQueue"]),
            active_clients: readers_writers(status, &["globalLock", "activeClients"]),
        },
        op_counters: op_counters(status, "opcounters"),
        op_counters_replicated: op_counters(status, "opcountersRepl"),
        extra_info: ExtraInfo {
            page_faults: int(status, &["extra_info", "page_faults"]),
            heap_usage_bytes: int(status, &["extra_info", "heap_usage_bytes"]),
        },
        replication_role: replication_role(status),
        server_metrics: ServerMetrics {
            command_counters: command_counters(status),
            cursor: CursorMetrics {
                timed_out: int(status, &["metrics", "cursor", "timedOut"]),
                open_by_type: counters(status, &["metrics", "cursor", "open"]),
            },
            document: counters(status, &["metrics", "document"]),
            operation: counters(status, &["metrics", "operation"]),
            query_executor: counters(status, &["metrics", "queryExecutor"]),
        },
        storage_engine_info: storage_engine_info(status),
    }
}
