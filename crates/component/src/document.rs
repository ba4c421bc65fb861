use std::collections::BTreeMap;

/// Counters keyed by a name chosen by the server.
///
/// The set of keys depends on the MongoDB version, so consumers must not
/// assume any of them is present.
pub type Counters = BTreeMap<String, i64>;

/// Snapshot of the `serverStatus` fields that are forwarded as metrics.
///
/// An empty `host` marks a failed fetch and such a document is never emitted.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StatusDocument {
    pub host: String,
    pub version: String,
    pub process: String,
    pub pid: i64,
    pub uptime_seconds: i64,
    pub uptime_millis: i64,
    pub uptime_estimate: i64,
    pub connections: Connections,
    pub memory: Memory,
    pub global_lock: GlobalLock,
    pub op_counters: OpCounters,
    pub op_counters_replicated: OpCounters,
    pub extra_info: ExtraInfo,
    pub replication_role: ReplicationRole,
    pub server_metrics: ServerMetrics,
    /// `None` when the storage engine does not report its statistics.
    pub storage_engine_info: Option<StorageEngineInfo>,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Connections {
    pub current: i64,
    pub available: i64,
    pub total_created: i64,
}

/// Memory usage in megabytes.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Memory {
    pub resident_mb: i64,
    pub virtual_mb: i64,
    pub mapped_mb: i64,
    pub mapped_with_journal_mb: i64,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ReadersWriters {
    pub readers: i64,
    pub writers: i64,
    pub total: i64,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct GlobalLock {
    pub total_time: i64,
    pub lock_time: i64,
    pub current_queue: ReadersWriters,
    pub active_clients: ReadersWriters,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct OpCounters {
    pub insert: i64,
    pub query: i64,
    pub update: i64,
    pub delete: i64,
    pub get_more: i64,
    pub command: i64,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ExtraInfo {
    pub page_faults: i64,
    pub heap_usage_bytes: i64,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ReplicationRole {
    pub is_master: bool,
    pub is_secondary: bool,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct CommandCounter {
    pub failed: i64,
    pub total: i64,
}

impl CommandCounter {
    /// Whether the command was run at least once since startup.
    pub fn is_active(&self) -> bool {
        self.failed > 0 || self.total > 0
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CursorMetrics {
    pub timed_out: i64,
    pub open_by_type: Counters,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ServerMetrics {
    pub command_counters: BTreeMap<String, CommandCounter>,
    pub cursor: CursorMetrics,
    pub document: Counters,
    pub operation: Counters,
    pub query_executor: Counters,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConcurrentTransactions {
    pub read: Counters,
    pub write: Counters,
}

/// WiredTiger statistics.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StorageEngineInfo {
    pub cache: Counters,
    pub connection: Counters,
    pub concurrent_transactions: ConcurrentTransactions,
}

impl StatusDocument {
    /// A document is only worth emitting if the server identified itself.
    pub fn is_empty(&self) -> bool {
        self.host.is_empty()
    }
}
