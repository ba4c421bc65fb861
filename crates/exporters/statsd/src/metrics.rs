use mgo_statsd_component::document::{
    Connections, Counters, ExtraInfo, GlobalLock, Memory, OpCounters, ReplicationRole,
    ServerMetrics, StorageEngineInfo,
};
use mgo_statsd_component::sanitize::sanitize;
use mgo_statsd_component::StatusDocument;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gauge {
    pub path: String,
    pub value: i64,
}

/// Gauges of a single snapshot, in send order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Gauges(Vec<Gauge>);

impl Gauges {
    fn push(&mut self, path: impl Into<String>, value: i64) {
        self.0.push(Gauge {
            path: path.into(),
            value,
        });
    }

    fn extend_counters(&mut self, prefix: &str, counters: &Counters, sanitize_keys: bool) {
        for (key, value) in counters {
            let key = if sanitize_keys {
                sanitize(key)
            } else {
                key.as_str().into()
            };
            self.push(format!("{prefix}{key}"), *value);
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Gauge> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a Gauges {
    type Item = &'a Gauge;
    type IntoIter = std::slice::Iter<'a, Gauge>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

pub trait Record {
    fn record(&self, gauges: &mut Gauges);
}

impl Record for Connections {
    fn record(&self, gauges: &mut Gauges) {
        gauges.push("connections.current", self.current);
        gauges.push("connections.available", self.available);
        gauges.push("connections.created", self.total_created);
    }
}

impl Record for OpCounters {
    fn record(&self, gauges: &mut Gauges) {
        gauges.push("ops.inserts", self.insert);
        gauges.push("ops.queries", self.query);
        gauges.push("ops.updates", self.update);
        gauges.push("ops.deletes", self.delete);
        gauges.push("ops.getmores", self.get_more);
        gauges.push("ops.commands", self.command);
    }
}

impl Record for Memory {
    fn record(&self, gauges: &mut Gauges) {
        gauges.push("mem.resident", self.resident_mb);
        gauges.push("mem.virtual", self.virtual_mb);
        gauges.push("mem.mapped", self.mapped_mb);
        gauges.push("mem.mapped_with_journal", self.mapped_with_journal_mb);
    }
}

impl Record for GlobalLock {
    fn record(&self, gauges: &mut Gauges) {
        gauges.push("global_lock.total_time", self.total_time);
        gauges.push("global_lock.lock_time", self.lock_time);
        gauges.push("global_lock.active_readers", self.active_clients.readers);
        gauges.push("global_lock.active_writers", self.active_clients.writers);
        gauges.push("global_lock.active_total", self.active_clients.total);
        gauges.push("global_lock.queued_readers", self.current_queue.readers);
        gauges.push("global_lock.queued_writers", self.current_queue.writers);
        gauges.push("global_lock.queued_total", self.current_queue.total);
    }
}

impl Record for ExtraInfo {
    fn record(&self, gauges: &mut Gauges) {
        gauges.push("extra.page_faults", self.page_faults);
        gauges.push("extra.heap_usage", self.heap_usage_bytes);
    }
}

impl Record for ReplicationRole {
    fn record(&self, gauges: &mut Gauges) {
        gauges.push("extra.is_master", i64::from(self.is_master));
        gauges.push("extra.is_secondary", i64::from(self.is_secondary));
    }
}

impl Record for ServerMetrics {
    fn record(&self, gauges: &mut Gauges) {
        for (command, counter) in &self.command_counters {
            // commands never run since startup are noise
            if !counter.is_active() {
                continue;
            }
            gauges.push(format!("metrics.commands.{command}.failed"), counter.failed);
            gauges.push(format!("metrics.commands.{command}.total"), counter.total);
        }
        gauges.push("metrics.cursor.timedout", self.cursor.timed_out);
        gauges.extend_counters("metrics.cursor.open-", &self.cursor.open_by_type, false);
        gauges.extend_counters("metrics.document.", &self.document, false);
        gauges.extend_counters("metrics.operation.", &self.operation, false);
        gauges.extend_counters("metrics.query_executor.", &self.query_executor, false);
    }
}

impl Record for StorageEngineInfo {
    fn record(&self, gauges: &mut Gauges) {
        gauges.extend_counters("wiredtiger.cache.", &self.cache, true);
        gauges.extend_counters(
            "wiredtiger.conc_txn_rd.",
            &self.concurrent_transactions.read,
            true,
        );
        gauges.extend_counters(
            "wiredtiger.conc_txn_wr.",
            &self.concurrent_transactions.write,
            true,
        );
        gauges.extend_counters("wiredtiger.conn.", &self.connection, true);
    }
}

impl Record for StatusDocument {
    fn record(&self, gauges: &mut Gauges) {
        self.connections.record(gauges);
        self.op_counters.record(gauges);
        self.memory.record(gauges);
        self.global_lock.record(gauges);
        self.extra_info.record(gauges);
        self.replication_role.record(gauges);
        self.server_metrics.record(gauges);
        if let Some(storage_engine_info) = &self.storage_engine_info {
            storage_engine_info.record(gauges);
        }
    }
}

/// All gauges forwarded for a snapshot.
pub fn gauges(document: &StatusDocument) -> Gauges {
    let mut gauges = Gauges::default();
    document.record(&mut gauges);
    gauges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(gauges: &Gauges) -> Vec<&str> {
        gauges.iter().map(|gauge| gauge.path.as_str()).collect()
    }

    #[test]
    fn fixed_sections_in_order() {
        let gauges = gauges(&StatusDocument {
            host: "db-1".to_string(),
            ..StatusDocument::default()
        });
        assert_eq!(
            paths(&gauges),
            vec![
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
                "metrics.cursor.timedout",
            ]
        );
    }

    #[test]
    fn replication_role_as_flags() {
        let mut gauges = Gauges::default();
        ReplicationRole {
            is_master: true,
            is_secondary: false,
        }
        .record(&mut gauges);
        let values: Vec<_> = gauges.iter().map(|gauge| gauge.value).collect();
        assert_eq!(values, vec![1, 0]);
    }

    #[test]
    fn storage_engine_keys_are_sanitized() {
        let mut info = StorageEngineInfo::default();
        info.cache.insert("LRU eviction (0.0)".to_string(), 3);
        info.connection
            .insert("files currently open".to_string(), 24);
        info.concurrent_transactions
            .write
            .insert("available".to_string(), 128);

        let mut gauges = Gauges::default();
        info.record(&mut gauges);
        assert_eq!(
            gauges.iter().cloned().collect::<Vec<_>>(),
            vec![
                Gauge {
                    path: "wiredtiger.cache.LRU_eviction__0_0_".to_string(),
                    value: 3
                },
                Gauge {
                    path: "wiredtiger.conc_txn_wr.available".to_string(),
                    value: 128
                },
                Gauge {
                    path: "wiredtiger.conn.files_currently_open".to_string(),
                    value: 24
                },
            ]
        );
    }
}
