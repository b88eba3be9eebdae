// Report builder: materialises the event log into a detached snapshot

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::errors::{NebulaError, NebulaResult};
use crate::event::{EventRecord, COLUMNS};
use crate::event_store::EventStore;

/// Point-in-time copy of the event log, most recent record first.
///
/// Owns its rows; appends made after it was taken never show up here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    taken_at: DateTime<Utc>,
    records: Vec<EventRecord>,
}

impl Snapshot {
    pub fn new(records: Vec<EventRecord>) -> Self {
        Self {
            taken_at: Utc::now(),
            records,
        }
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    pub fn columns(&self) -> [&'static str; 4] {
        COLUMNS
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Rows as display strings, in `columns()` order.
    pub fn rows(&self) -> impl Iterator<Item = [String; 4]> + '_ {
        self.records.iter().map(EventRecord::cells)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Source of snapshots for report and export surfaces.
pub trait SnapshotSource {
    fn snapshot(&self) -> NebulaResult<Snapshot>;
}

/// Reads the whole store and hands back a [`Snapshot`].
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    store: EventStore,
}

impl ReportBuilder {
    pub fn new(store: EventStore) -> Self {
        Self { store }
    }
}

impl SnapshotSource for ReportBuilder {
    fn snapshot(&self) -> NebulaResult<Snapshot> {
        let records = self
            .store
            .all()
            .map_err(|e| NebulaError::no_data(format!("event store read failed: {e}")))?;
        debug!(rows = records.len(), "snapshot taken");
        Ok(Snapshot::new(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: u64, detail: &str) -> EventRecord {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, id as u32).unwrap();
        EventRecord::new(id, "CMD".into(), detail.into(), ts)
    }

    #[test]
    fn rows_keep_snapshot_order() {
        let snapshot = Snapshot::new(vec![record(2, "Ping Google"), record(1, "Flush DNS")]);

        let details: Vec<String> = snapshot.rows().map(|row| row[2].clone()).collect();
        assert_eq!(details, vec!["Ping Google", "Flush DNS"]);
        assert_eq!(snapshot.columns(), ["id", "category", "detail", "timestamp"]);
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn empty_snapshot_is_not_an_error() {
        let snapshot = Snapshot::new(Vec::new());
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.rows().count(), 0);
    }
}
