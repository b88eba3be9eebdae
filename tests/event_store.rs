// Event store: ordering, durability across reopen, concurrent producers
use chrono::Utc;
use nebula_log::event_store::EventStore;
use nebula_log::report::{ReportBuilder, SnapshotSource};
use nebula_log::Recorder;
use std::collections::HashSet;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;

fn wait_for_records(store: &EventStore, expected: usize) -> Vec<nebula_log::EventRecord> {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let records = store.all().expect("read failed");
        if records.len() >= expected || Instant::now() > deadline {
            return records;
        }
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
pub fn fresh_store_has_empty_snapshot() {
    let dir = tempdir().expect("failed to create temp dir");
    let store = EventStore::open(dir.path().join("logs.sled")).expect("open failed");

    let snapshot = ReportBuilder::new(store.clone()).snapshot().expect("snapshot failed");
    assert!(snapshot.is_empty());
    assert_eq!(store.write_failures(), 0);
}

#[test]
pub fn recorded_navigation_shows_up_in_snapshot() {
    let dir = tempdir().expect("failed to create temp dir");
    let store = EventStore::open(dir.path().join("logs.sled")).expect("open failed");

    let before = Utc::now();
    store.record("NAV", "Dashboard visitado");
    let records = wait_for_records(&store, 1);
    let after = Utc::now();

    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.category, "NAV");
    assert_eq!(record.detail, "Dashboard visitado");
    assert!(record.timestamp >= before && record.timestamp <= after);
}

#[test]
pub fn snapshot_is_most_recent_first() {
    let dir = tempdir().expect("failed to create temp dir");
    let store = EventStore::open(dir.path().join("logs.sled")).expect("open failed");

    store.record("CMD", "Flush DNS");
    store.record("CMD", "Ping Google");
    store.flush().expect("flush failed");

    let snapshot = ReportBuilder::new(store).snapshot().expect("snapshot failed");
    let details: Vec<&str> = snapshot.records().iter().map(|r| r.detail.as_str()).collect();
    assert_eq!(details, vec!["Ping Google", "Flush DNS"]);
    assert!(snapshot.records()[0].id > snapshot.records()[1].id);
}

#[test]
pub fn append_handle_reports_committed_record() {
    let dir = tempdir().expect("failed to create temp dir");
    let store = EventStore::open(dir.path().join("logs.sled")).expect("open failed");

    let first = store.append("CMD", "").wait().expect("append failed");
    let second = store.append("SPEEDTEST", "D:90.0 U:10.0 P:12").wait().expect("append failed");

    assert_eq!(first.id, 1);
    assert_eq!(first.detail, "");
    assert_eq!(second.id, 2);
    assert!(second.timestamp >= first.timestamp);
}

#[tokio::test]
async fn append_handle_can_be_awaited() {
    let dir = tempdir().expect("failed to create temp dir");
    let store = EventStore::open(dir.path().join("logs.sled")).expect("open failed");

    let record = store.append("NAV", "Logs visitado").await.expect("append failed");
    assert_eq!(record.category, "NAV");

    let all = store.all().expect("read failed");
    assert_eq!(all, vec![record]);
}

#[tokio::test(flavor = "multi_thread")]
async fn flush_async_waits_for_queued_records_inside_a_runtime() {
    let dir = tempdir().expect("failed to create temp dir");
    let store = EventStore::open(dir.path().join("logs.sled")).expect("open failed");

    store.record("NAV", "Speed visitado");
    store.record("SPEEDTEST", "D:93.5 U:11.0 P:17");
    store.flush_async().await.expect("flush failed");

    let records = store.all().expect("read failed");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].category, "SPEEDTEST");
    assert_eq!(store.write_failures(), 0);
}

#[test]
pub fn concurrent_producers_get_unique_ascending_ids() {
    let dir = tempdir().expect("failed to create temp dir");
    let store = EventStore::open(dir.path().join("logs.sled")).expect("open failed");

    let producers: Vec<_> = (0..8)
        .map(|p| {
            let store = store.clone();
            thread::spawn(move || {
                for i in 0..25 {
                    store.record("CMD", &format!("producer {p} event {i}"));
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().expect("producer panicked");
    }
    store.flush().expect("flush failed");

    let records = store.all().expect("read failed");
    assert_eq!(records.len(), 200);

    let ids: HashSet<u64> = records.iter().map(|r| r.id).collect();
    assert_eq!(ids.len(), 200);
    assert!(records.windows(2).all(|w| w[0].id > w[1].id));
    assert!(records.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));

    let details: HashSet<&str> = records.iter().map(|r| r.detail.as_str()).collect();
    assert_eq!(details.len(), 200);
    assert_eq!(store.write_failures(), 0);
}

#[test]
pub fn snapshot_is_detached_from_later_appends() {
    let dir = tempdir().expect("failed to create temp dir");
    let store = EventStore::open(dir.path().join("logs.sled")).expect("open failed");
    let builder = ReportBuilder::new(store.clone());

    store.append("CMD", "Flush DNS").wait().expect("append failed");
    let snapshot = builder.snapshot().expect("snapshot failed");
    store.append("CMD", "Release IP").wait().expect("append failed");

    assert_eq!(snapshot.len(), 1);
    assert_eq!(builder.snapshot().expect("snapshot failed").len(), 2);
}

#[test]
pub fn reopening_keeps_records_and_continues_ids() {
    let dir = tempdir().expect("failed to create temp dir");
    let path = dir.path().join("logs.sled");

    {
        let store = EventStore::open(&path).expect("open failed");
        store.append("NAV", "Dashboard visitado").wait().expect("append failed");
        store.append("CMD", "IP Config").wait().expect("append failed");
    }

    let reopened = EventStore::open(&path).expect("reopen failed");
    let before = reopened.all().expect("read failed");
    assert_eq!(before.len(), 2);

    let third = reopened.append("CMD", "ARP Table").wait().expect("append failed");
    assert_eq!(third.id, 3);
    drop(reopened);

    let again = EventStore::open(&path).expect("third open failed");
    let records = again.all().expect("read failed");
    let ids: Vec<u64> = records.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![3, 2, 1]);
    assert_eq!(&records[1..], &before[..]);
}

#[test]
pub fn unusable_location_is_storage_unavailable() {
    let dir = tempdir().expect("failed to create temp dir");
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"plain file").expect("write failed");

    let err = EventStore::open(blocker.join("logs.sled")).unwrap_err();
    assert!(err.is_fatal());
}
