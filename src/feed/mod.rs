use async_trait::async_trait;

mod error;
pub use error::FeedError;

mod record;
pub use record::{LiveRecord, RecordBody, RecordId, Snapshot};

mod subscription;
pub use subscription::Subscription;

mod memory;
pub use memory::MemoryFeed;

mod firebase;
pub use firebase::{FirebaseConfig, FirebaseFeed};

/// A remote, key-ordered message store.
///
/// `subscribe_on_added` reports every record the feed holds or receives after
/// the call, so it races with `fetch_all`. Deduplication is the caller's job.
#[async_trait]
pub trait Feed: Send + Sync + 'static {
    /// One-shot read of every record currently stored.
    async fn fetch_all(&self) -> Result<Snapshot, FeedError>;

    /// Arms a live subscription. Dropping the handle releases it.
    fn subscribe_on_added(&self) -> Subscription;

    /// Persists a new record. The feed assigns the id and echoes the record
    /// to every active subscription, the submitter's included.
    async fn append(&self, body: &RecordBody) -> Result<RecordId, FeedError>;
}
