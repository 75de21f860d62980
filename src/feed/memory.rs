use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedSender},
    watch,
};
use uuid::Uuid;

use super::{Feed, FeedError, LiveRecord, RecordBody, RecordId, Snapshot, Subscription};

/// An in-process feed.
///
/// Behaves like the hosted feed: ids are assigned on append, and a new
/// subscription first replays every stored record before reporting new ones.
///
/// Fetches can be held back with [`MemoryFeed::pause_fetches`]. A held fetch
/// has already read its snapshot, so records appended while it is held reach
/// subscribers but not that snapshot.
#[derive(Clone)]
pub struct MemoryFeed {
    inner: Arc<Mutex<Inner>>,
    paused: Arc<watch::Sender<bool>>,
}

#[derive(Default)]
struct Inner {
    records: IndexMap<RecordId, Value>,
    subscribers: Vec<(u64, UnboundedSender<LiveRecord>)>,
    next_subscriber: u64,
    failing_fetches: usize,
    fetches: usize,
}

impl Default for MemoryFeed {
    fn default() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            inner: Arc::default(),
            paused: Arc::new(paused),
        }
    }
}

impl MemoryFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records<'a>(records: impl IntoIterator<Item = (&'a str, RecordBody)>) -> Self {
        let this = Self::default();
        for (id, body) in records {
            this.insert(id, &body);
        }
        this
    }

    /// Stores a record under a caller-chosen id.
    pub fn insert(&self, id: impl Into<RecordId>, body: &RecordBody) {
        self.insert_raw(id, body.to_value())
    }

    /// Stores an unvalidated record. Malformed records are kept in storage,
    /// where fetches will quarantine them, but never reach subscribers.
    pub fn insert_raw(&self, id: impl Into<RecordId>, value: Value) {
        let id = id.into();
        let body = RecordBody::quarantine(&id, &value);

        let mut inner = self.lock();
        // an existing id is a change, not an addition
        if inner.records.insert(id.clone(), value).is_some() {
            return;
        }

        let Some(body) = body else { return };
        let record = LiveRecord { id, body };
        inner
            .subscribers
            .retain(|(_, send)| send.send(record.clone()).is_ok());
    }

    pub fn fail_next_fetches(&self, count: usize) {
        self.lock().failing_fetches = count;
    }

    pub fn pause_fetches(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume_fetches(&self) {
        self.paused.send_replace(false);
    }

    pub fn fetch_count(&self) -> usize {
        self.lock().fetches
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock(&self.inner)
    }

    fn next_id() -> RecordId {
        Uuid::new_v4().simple().to_string()
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl Feed for MemoryFeed {
    async fn fetch_all(&self) -> Result<Snapshot, FeedError> {
        let snapshot = {
            let mut inner = self.lock();
            inner.fetches += 1;
            if inner.failing_fetches > 0 {
                inner.failing_fetches -= 1;
                return Err(FeedError::Unavailable("fetch refused".into()));
            }

            inner
                .records
                .iter()
                .map(|(id, value)| (id.clone(), value.clone()))
                .collect::<Snapshot>()
        };

        let mut paused = self.paused.subscribe();
        loop {
            let held = *paused.borrow_and_update();
            if !held {
                break;
            }
            paused.changed().await.map_err(|_| FeedError::Closed)?;
        }

        Ok(snapshot)
    }

    fn subscribe_on_added(&self) -> Subscription {
        let (send, recv) = unbounded_channel();

        let key = {
            let mut inner = self.lock();
            for (id, value) in &inner.records {
                let Ok(body) = RecordBody::from_value(value) else { continue };
                let _ = send.send(LiveRecord {
                    id: id.clone(),
                    body,
                });
            }

            let key = inner.next_subscriber;
            inner.next_subscriber += 1;
            inner.subscribers.push((key, send));
            key
        };

        let inner = Arc::downgrade(&self.inner);
        Subscription::new(recv, move || {
            if let Some(inner) = inner.upgrade() {
                lock(&inner).subscribers.retain(|(k, _)| *k != key);
            }
        })
    }

    async fn append(&self, body: &RecordBody) -> Result<RecordId, FeedError> {
        let id = Self::next_id();
        self.insert(id.clone(), body);
        Ok(id)
    }
}
