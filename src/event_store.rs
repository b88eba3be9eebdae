//! sled-backed append-only event store.
//!
//! Records live in the `events` tree keyed by their id in big-endian form, so
//! key order and id order coincide. All writes funnel through one queue drained
//! by a dedicated writer thread; that thread is the only place ids and
//! timestamps are assigned.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::thread::JoinHandle;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::errors::{NebulaError, NebulaResult};
use crate::event::EventRecord;
use crate::recorder::Recorder;

const EVENTS_TREE: &str = "events";
const META_TREE: &str = "meta";
const SCHEMA_KEY: &[u8] = b"schema_version";
const SCHEMA_VERSION: &str = "1";
const WRITER_THREAD: &str = "nebula-event-writer";

enum WriteJob {
    Append {
        category: String,
        detail: String,
        reply: oneshot::Sender<NebulaResult<EventRecord>>,
    },
    Barrier {
        reply: oneshot::Sender<()>,
    },
    Shutdown,
}

/// Pending result of an [`EventStore::append`].
///
/// Dropping the handle keeps the fire-and-forget behaviour. Awaiting it (or
/// calling [`AppendHandle::wait`] outside an async context) yields the
/// committed record or the write failure.
#[must_use = "dropping the handle discards the write outcome; use `Recorder::record` for fire-and-forget"]
pub struct AppendHandle {
    rx: oneshot::Receiver<NebulaResult<EventRecord>>,
}

impl AppendHandle {
    /// Block the current thread until the write is committed or has failed.
    ///
    /// Panics if called from within an async runtime; await the handle there.
    pub fn wait(self) -> NebulaResult<EventRecord> {
        self.rx.blocking_recv().unwrap_or_else(|_| Err(writer_gone()))
    }
}

impl Future for AppendHandle {
    type Output = NebulaResult<EventRecord>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.unwrap_or_else(|_| Err(writer_gone())))
    }
}

fn writer_gone() -> NebulaError {
    NebulaError::write_failure("append", "event writer stopped before confirming the write")
}

struct Shared {
    location: PathBuf,
    events: sled::Tree,
    commit_lock: Arc<Mutex<()>>,
    failures: Arc<AtomicU64>,
    queue: mpsc::UnboundedSender<WriteJob>,
    writer: Option<JoinHandle<()>>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        // Jobs queued before the shutdown marker are still committed.
        let _ = self.queue.send(WriteJob::Shutdown);
        if let Some(handle) = self.writer.take() {
            if handle.join().is_err() {
                warn!(location = %self.location.display(), "event writer panicked");
            }
        }
    }
}

/// Owned handle to the persisted action log.
///
/// Cheap to clone; every clone feeds the same write queue. The writer thread is
/// joined when the last clone is dropped, after which the location may be
/// opened again.
#[derive(Clone)]
pub struct EventStore {
    shared: Arc<Shared>,
}

impl fmt::Debug for EventStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStore")
            .field("location", &self.shared.location)
            .field("write_failures", &self.write_failures())
            .finish()
    }
}

impl EventStore {
    /// Open the store at `location`, creating storage and schema if absent.
    ///
    /// Existing records are left untouched. Any failure here is
    /// [`NebulaError::StorageUnavailable`] and should abort startup.
    pub fn open(location: impl AsRef<Path>) -> NebulaResult<Self> {
        Self::open_with(location.as_ref(), |events| Box::new(events.clone()))
    }

    /// Open with the writer committing through the sink built by `sink`.
    fn open_with(
        location: &Path,
        sink: impl FnOnce(&sled::Tree) -> Box<dyn EventSink>,
    ) -> NebulaResult<Self> {
        let location = location.to_path_buf();

        let db = sled::open(&location)
            .map_err(|e| NebulaError::storage_unavailable(&location, e))?;
        ensure_schema(&db, &location)?;
        let events = db
            .open_tree(EVENTS_TREE)
            .map_err(|e| NebulaError::storage_unavailable(&location, e))?;

        let (next_id, last_timestamp) = resume_point(&events, &location)?;

        let commit_lock = Arc::new(Mutex::new(()));
        let failures = Arc::new(AtomicU64::new(0));
        let (queue, jobs) = mpsc::unbounded_channel();

        let writer = Writer {
            sink: sink(&events),
            commit_lock: Arc::clone(&commit_lock),
            failures: Arc::clone(&failures),
            next_id,
            last_timestamp,
        };
        let handle = std::thread::Builder::new()
            .name(WRITER_THREAD.to_string())
            .spawn(move || writer.run(jobs))
            .map_err(|e| NebulaError::storage_unavailable(&location, e))?;

        info!(
            location = %location.display(),
            next_id,
            "event store opened"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                location,
                events,
                commit_lock,
                failures,
                queue,
                writer: Some(handle),
            }),
        })
    }

    pub fn location(&self) -> &Path {
        &self.shared.location
    }

    /// Queue one record for insertion and return immediately.
    ///
    /// The id and timestamp are assigned by the writer thread when the job is
    /// committed, in queue order.
    pub fn append(&self, category: impl Into<String>, detail: impl Into<String>) -> AppendHandle {
        let (reply, rx) = oneshot::channel();
        let job = WriteJob::Append {
            category: category.into(),
            detail: detail.into(),
            reply,
        };

        if let Err(mpsc::error::SendError(job)) = self.shared.queue.send(job) {
            self.shared.failures.fetch_add(1, Ordering::Relaxed);
            warn!(location = %self.shared.location.display(), "event writer is gone; dropping event");
            if let WriteJob::Append { reply, .. } = job {
                let _ = reply.send(Err(writer_gone()));
            }
        }
        AppendHandle { rx }
    }

    /// Every stored record, most recent id first.
    ///
    /// Holds the commit lock while reading, so the result is a committed
    /// prefix of the write queue.
    pub fn all(&self) -> NebulaResult<Vec<EventRecord>> {
        let _guard = self
            .shared
            .commit_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        self.shared
            .events
            .iter()
            .rev()
            .map(|entry| {
                let (_, value) = entry.map_err(|e| NebulaError::no_data(e.to_string()))?;
                decode_record(&value)
            })
            .collect()
    }

    /// Number of appends accepted but not persisted since this store was opened.
    pub fn write_failures(&self) -> u64 {
        self.shared.failures.load(Ordering::Relaxed)
    }

    /// Block until every append queued before this call has been processed.
    ///
    /// Panics if called from within an async runtime; use
    /// [`EventStore::flush_async`] there.
    pub fn flush(&self) -> NebulaResult<()> {
        self.barrier()?.blocking_recv().map_err(|_| writer_gone())
    }

    /// Wait, without blocking the runtime, until every append queued before
    /// this call has been processed.
    pub async fn flush_async(&self) -> NebulaResult<()> {
        self.barrier()?.await.map_err(|_| writer_gone())
    }

    fn barrier(&self) -> NebulaResult<oneshot::Receiver<()>> {
        let (reply, rx) = oneshot::channel();
        self.shared
            .queue
            .send(WriteJob::Barrier { reply })
            .map_err(|_| writer_gone())?;
        Ok(rx)
    }
}

impl Recorder for EventStore {
    fn record(&self, category: &str, detail: &str) {
        drop(self.append(category, detail));
    }
}

fn ensure_schema(db: &sled::Db, location: &Path) -> NebulaResult<()> {
    let meta = db
        .open_tree(META_TREE)
        .map_err(|e| NebulaError::storage_unavailable(location, e))?;

    match meta
        .get(SCHEMA_KEY)
        .map_err(|e| NebulaError::storage_unavailable(location, e))?
    {
        None => {
            meta.insert(SCHEMA_KEY, SCHEMA_VERSION.as_bytes())
                .map_err(|e| NebulaError::storage_unavailable(location, e))?;
            meta.flush()
                .map_err(|e| NebulaError::storage_unavailable(location, e))?;
            debug!(location = %location.display(), "initialized event schema");
            Ok(())
        }
        Some(found) if &*found == SCHEMA_VERSION.as_bytes() => Ok(()),
        Some(found) => Err(NebulaError::storage_unavailable(
            location,
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "unsupported schema version {}",
                    String::from_utf8_lossy(&found)
                ),
            ),
        )),
    }
}

/// Id and timestamp the writer continues from after a restart.
fn resume_point(
    events: &sled::Tree,
    location: &Path,
) -> NebulaResult<(u64, Option<DateTime<Utc>>)> {
    let last = events
        .last()
        .map_err(|e| NebulaError::storage_unavailable(location, e))?;

    let Some((key, value)) = last else {
        return Ok((1, None));
    };

    let id_bytes = <[u8; 8]>::try_from(&*key).map_err(|_| {
        NebulaError::storage_unavailable(
            location,
            std::io::Error::new(std::io::ErrorKind::InvalidData, "malformed event key"),
        )
    })?;
    let record = decode_record(&value).map_err(|e| {
        NebulaError::storage_unavailable(
            location,
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()),
        )
    })?;

    Ok((u64::from_be_bytes(id_bytes) + 1, Some(record.timestamp)))
}

fn decode_record(bytes: &[u8]) -> NebulaResult<EventRecord> {
    serde_json::from_slice(bytes).map_err(|e| NebulaError::serialization("event record", e))
}

/// Durable destination of committed records.
trait EventSink: Send {
    fn insert(&self, id: u64, value: Vec<u8>) -> NebulaResult<()>;
    fn flush(&self) -> NebulaResult<()>;
}

impl EventSink for sled::Tree {
    fn insert(&self, id: u64, value: Vec<u8>) -> NebulaResult<()> {
        sled::Tree::insert(self, id.to_be_bytes(), value)
            .map(drop)
            .map_err(|e| NebulaError::write_failure("insert", e.to_string()))
    }

    fn flush(&self) -> NebulaResult<()> {
        sled::Tree::flush(self)
            .map(drop)
            .map_err(|e| NebulaError::write_failure("flush", e.to_string()))
    }
}

struct Writer {
    sink: Box<dyn EventSink>,
    commit_lock: Arc<Mutex<()>>,
    failures: Arc<AtomicU64>,
    next_id: u64,
    last_timestamp: Option<DateTime<Utc>>,
}

impl Writer {
    fn run(mut self, mut jobs: mpsc::UnboundedReceiver<WriteJob>) {
        while let Some(job) = jobs.blocking_recv() {
            match job {
                WriteJob::Append {
                    category,
                    detail,
                    reply,
                } => {
                    let result = self.commit(category, detail);
                    match &result {
                        Ok(record) => debug!(id = record.id, category = %record.category, "event committed"),
                        Err(err) => {
                            self.failures.fetch_add(1, Ordering::Relaxed);
                            warn!(error = %err, "event write failed; entry dropped");
                        }
                    }
                    let _ = reply.send(result);
                }
                WriteJob::Barrier { reply } => {
                    let _ = reply.send(());
                }
                WriteJob::Shutdown => break,
            }
        }
        debug!("event writer stopped");
    }

    fn commit(&mut self, category: String, detail: String) -> NebulaResult<EventRecord> {
        let _guard = self.commit_lock.lock().unwrap_or_else(PoisonError::into_inner);

        // An id is consumed even if the insert fails, so it is never handed out twice.
        let id = self.next_id;
        self.next_id += 1;

        let now = Utc::now();
        let timestamp = match self.last_timestamp {
            Some(last) if last > now => last,
            _ => now,
        };

        let record = EventRecord::new(id, category, detail, timestamp);
        let value = serde_json::to_vec(&record)
            .map_err(|e| NebulaError::serialization("event record", e))?;

        self.sink.insert(id, value)?;
        self.last_timestamp = Some(timestamp);
        self.sink.flush()?;

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use tempfile::tempdir;

    /// Refuses inserts until `healed` is set, then writes to the real tree.
    struct FlakySink {
        tree: sled::Tree,
        healed: Arc<AtomicBool>,
    }

    impl EventSink for FlakySink {
        fn insert(&self, id: u64, value: Vec<u8>) -> NebulaResult<()> {
            if !self.healed.load(Ordering::SeqCst) {
                return Err(NebulaError::write_failure("insert", "no space left on device"));
            }
            EventSink::insert(&self.tree, id, value)
        }

        fn flush(&self) -> NebulaResult<()> {
            EventSink::flush(&self.tree)
        }
    }

    fn open_flaky(location: &Path) -> (EventStore, Arc<AtomicBool>) {
        let healed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&healed);
        let store = EventStore::open_with(location, move |events| {
            Box::new(FlakySink {
                tree: events.clone(),
                healed: flag,
            })
        })
        .unwrap();
        (store, healed)
    }

    #[test]
    fn failed_write_is_counted_and_reported_through_the_handle() {
        let dir = tempdir().unwrap();
        let (store, _healed) = open_flaky(&dir.path().join("events"));

        let result = store.append("CMD", "Flush DNS").wait();

        assert!(matches!(result, Err(NebulaError::WriteFailure { .. })));
        assert_eq!(store.write_failures(), 1);
        assert!(store.all().unwrap().is_empty());
    }

    #[test]
    fn fire_and_forget_failures_are_counted() {
        let dir = tempdir().unwrap();
        let (store, _healed) = open_flaky(&dir.path().join("events"));

        store.record("NAV", "Dashboard visitado");
        store.record("NAV", "Tools visitado");
        store.flush().unwrap();

        assert_eq!(store.write_failures(), 2);
    }

    #[test]
    fn failed_id_is_not_reused() {
        let dir = tempdir().unwrap();
        let (store, healed) = open_flaky(&dir.path().join("events"));

        assert!(store.append("CMD", "Renew IP").wait().is_err());
        healed.store(true, Ordering::SeqCst);
        let record = store.append("CMD", "Renew IP").wait().unwrap();

        assert_eq!(record.id, 2);
        assert_eq!(store.write_failures(), 1);
        let ids: Vec<u64> = store.all().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2]);
    }
}
