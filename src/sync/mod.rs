use indexmap::IndexMap;

use crate::{
    feed::{FeedError, LiveRecord, RecordBody, RecordId, Snapshot},
    message::Message,
};

mod policy;
pub use policy::LoadingPolicy;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Initial,
    Loading,
    Ready,
    Closed,
}

/// What the owner has to do after [`MessageFeedSync::start`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Start {
    Fetch,
    Restored,
    /// Already closed; nothing to do.
    Closed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Merge {
    Appended(Message),
    Buffered,
    Ignored(Ignored),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Ignored {
    Loading,
    Duplicate,
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("bulk fetch failed: {0}")]
    FetchFailed(#[source] FeedError),
}

/// Reconciles a one-shot snapshot with a racing live stream into one ordered
/// list without duplicate ids.
///
/// The list is the snapshot in feed enumeration order, followed by live
/// records in arrival order. Nothing is resorted by timestamp.
#[derive(Debug, Default)]
pub struct MessageFeedSync {
    phase: Phase,
    policy: LoadingPolicy,
    messages: IndexMap<RecordId, Message>,
    buffered: Vec<LiveRecord>,
    failures: u32,
}

impl MessageFeedSync {
    pub fn new(policy: LoadingPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Starts from messages the owner already holds. Repeated ids keep their
    /// first position.
    pub fn restore(messages: impl IntoIterator<Item = Message>, policy: LoadingPolicy) -> Self {
        let mut this = Self::new(policy);
        for message in messages {
            this.messages.entry(message.id.clone()).or_insert(message);
        }
        this
    }

    /// Leaves `Initial`. An empty list needs a bulk fetch; a restored one is
    /// ready immediately.
    pub fn start(&mut self) -> Start {
        if self.phase == Phase::Closed {
            tracing::debug!("not starting a closed sync");
            return Start::Closed;
        }
        if self.phase != Phase::Initial {
            tracing::warn!(phase = ?self.phase, "sync already started");
        }

        if self.messages.is_empty() {
            self.phase = Phase::Loading;
            Start::Fetch
        } else {
            self.phase = Phase::Ready;
            tracing::debug!(count = self.messages.len(), "restored messages");
            Start::Restored
        }
    }

    /// Applies the bulk fetch result. Returns the reconciled list, or `None`
    /// when no fetch was expected.
    pub fn on_bulk_fetch_result(
        &mut self,
        snapshot: Snapshot,
    ) -> Option<indexmap::map::Values<'_, RecordId, Message>> {
        if self.phase != Phase::Loading {
            tracing::debug!(phase = ?self.phase, "ignoring unexpected snapshot");
            return None;
        }

        let Snapshot {
            records,
            quarantined,
        } = snapshot;

        self.messages = records
            .into_iter()
            .map(|(id, body)| (id.clone(), Message::from_record(id, body)))
            .collect();
        self.phase = Phase::Ready;

        let fetched = self.messages.len();
        let buffered = std::mem::take(&mut self.buffered);
        let replayed = buffered
            .into_iter()
            .filter(|LiveRecord { id, body }| self.merge(id, body))
            .count();

        tracing::info!(
            fetched,
            replayed,
            quarantined = quarantined.len(),
            failures = self.failures,
            "messages loaded"
        );
        Some(self.messages.values())
    }

    /// Records a failed bulk fetch. The sync stays in `Loading`.
    pub fn on_fetch_failed(&mut self, error: FeedError) -> SyncError {
        if self.phase == Phase::Loading {
            self.failures += 1;
        }
        tracing::warn!(%error, failures = self.failures, "bulk fetch failed");
        SyncError::FetchFailed(error)
    }

    pub fn on_live_record_added(&mut self, id: RecordId, body: RecordBody) -> Merge {
        let phase = self.phase;
        match phase {
            Phase::Initial | Phase::Loading => match self.policy {
                LoadingPolicy::Drop => {
                    tracing::trace!(%id, "dropping live record while loading");
                    Merge::Ignored(Ignored::Loading)
                }
                LoadingPolicy::Buffer => {
                    self.buffered.push(LiveRecord { id, body });
                    Merge::Buffered
                }
            },
            Phase::Ready if self.merge(&id, &body) => {
                Merge::Appended(self.messages[&*id].clone())
            }
            Phase::Ready => Merge::Ignored(Ignored::Duplicate),
            Phase::Closed => Merge::Ignored(Ignored::Closed),
        }
    }

    pub fn close(&mut self) {
        self.phase = Phase::Closed;
        self.buffered.clear();
    }

    pub const fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_ready(&self) -> bool {
        self.phase == Phase::Ready
    }

    /// Failed fetches since the sync started.
    pub const fn failures(&self) -> u32 {
        self.failures
    }

    pub fn messages(&self) -> impl ExactSizeIterator<Item = &Message> + DoubleEndedIterator {
        self.messages.values()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.messages.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn merge(&mut self, id: &str, body: &RecordBody) -> bool {
        if self.messages.contains_key(id) {
            tracing::trace!(id, "ignoring duplicate record");
            return false;
        }
        let message = Message::from_record(id.to_string(), body.clone());
        self.messages.insert(message.id.clone(), message);
        tracing::debug!(id, "appended live record");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(name: &str, text: &str, created_at: i64) -> RecordBody {
        RecordBody {
            name: name.into(),
            text: text.into(),
            created_at,
        }
    }

    fn snapshot<'a>(records: impl IntoIterator<Item = (&'a str, RecordBody)>) -> Snapshot {
        Snapshot {
            records: records
                .into_iter()
                .map(|(id, body)| (id.to_string(), body))
                .collect(),
            quarantined: vec![],
        }
    }

    fn ids(sync: &MessageFeedSync) -> Vec<&str> {
        sync.messages().map(|m| m.id.as_str()).collect()
    }

    fn loading(policy: LoadingPolicy) -> MessageFeedSync {
        let mut sync = MessageFeedSync::new(policy);
        assert_eq!(sync.start(), Start::Fetch);
        sync
    }

    #[test]
    fn echo_of_fetched_message_is_not_duplicated() {
        let mut sync = loading(LoadingPolicy::Drop);
        sync.on_bulk_fetch_result(snapshot([("m1", body("bob", "hi", 100))]))
            .unwrap();

        let merge = sync.on_live_record_added("m1".into(), body("bob", "hi", 100));
        assert_eq!(merge, Merge::Ignored(Ignored::Duplicate));

        let all = sync.messages().cloned().collect::<Vec<_>>();
        assert_eq!(
            all,
            [Message {
                id: "m1".into(),
                name: "bob".into(),
                text: "hi".into(),
                created_at: 100,
            }]
        );
    }

    #[test]
    fn snapshot_order_then_arrival_order() {
        let mut sync = loading(LoadingPolicy::Drop);
        // timestamps disagree with feed order on purpose
        let list = sync
            .on_bulk_fetch_result(snapshot([
                ("c", body("x", "1", 30)),
                ("a", body("x", "2", 10)),
                ("b", body("x", "3", 20)),
            ]))
            .unwrap();
        assert_eq!(list.len(), 3);

        sync.on_live_record_added("z".into(), body("y", "4", 5));
        sync.on_live_record_added("d".into(), body("y", "5", 1));

        assert_eq!(ids(&sync), ["c", "a", "b", "z", "d"]);
    }

    #[test]
    fn no_duplicate_ids_across_sources() {
        let mut sync = loading(LoadingPolicy::Buffer);
        sync.on_live_record_added("a".into(), body("x", "1", 1));
        sync.on_live_record_added("b".into(), body("x", "2", 2));
        sync.on_live_record_added("a".into(), body("x", "1", 1));

        sync.on_bulk_fetch_result(snapshot([("a", body("x", "1", 1))]))
            .unwrap();
        for id in ["a", "b", "c", "c"] {
            sync.on_live_record_added(id.into(), body("x", id, 3));
        }

        assert_eq!(ids(&sync), ["a", "b", "c"]);
    }

    #[test]
    fn ready_only_after_successful_fetch() {
        let mut sync = MessageFeedSync::new(LoadingPolicy::Drop);
        assert!(!sync.is_ready());

        sync.start();
        assert_eq!(sync.phase(), Phase::Loading);

        let err = sync.on_fetch_failed(FeedError::Unavailable("down".into()));
        assert!(matches!(err, SyncError::FetchFailed(..)));
        assert!(!sync.is_ready());
        assert_eq!(sync.failures(), 1);

        sync.on_bulk_fetch_result(Snapshot::default()).unwrap();
        assert!(sync.is_ready());
        assert!(sync.is_empty());
    }

    #[test]
    fn live_merge_is_idempotent() {
        let mut sync = loading(LoadingPolicy::Drop);
        sync.on_bulk_fetch_result(Snapshot::default()).unwrap();

        let first = sync.on_live_record_added("m2".into(), body("alice", "yo", 7));
        assert!(matches!(first, Merge::Appended(ref m) if m.id == "m2"));
        let once = sync.messages().cloned().collect::<Vec<_>>();

        sync.on_live_record_added("m2".into(), body("alice", "yo", 7));
        let twice = sync.messages().cloned().collect::<Vec<_>>();

        assert_eq!(once, twice);
    }

    #[test]
    fn loading_window_records_are_dropped() {
        let mut sync = loading(LoadingPolicy::Drop);
        let merge = sync.on_live_record_added("late".into(), body("bob", "new", 200));
        assert_eq!(merge, Merge::Ignored(Ignored::Loading));

        sync.on_bulk_fetch_result(snapshot([("m1", body("bob", "hi", 100))]))
            .unwrap();
        assert_eq!(ids(&sync), ["m1"]);
    }

    #[test]
    fn loading_window_records_are_replayed_when_buffering() {
        let mut sync = loading(LoadingPolicy::Buffer);
        assert_eq!(
            sync.on_live_record_added("late".into(), body("bob", "new", 200)),
            Merge::Buffered
        );
        sync.on_live_record_added("m1".into(), body("bob", "hi", 100));

        sync.on_bulk_fetch_result(snapshot([("m1", body("bob", "hi", 100))]))
            .unwrap();
        assert_eq!(ids(&sync), ["m1", "late"]);
    }

    #[test]
    fn restored_list_skips_the_fetch() {
        let restored = [
            Message::from_record("m1".into(), body("bob", "hi", 1)),
            Message::from_record("m1".into(), body("bob", "again", 2)),
        ];
        let mut sync = MessageFeedSync::restore(restored, LoadingPolicy::Drop);
        assert_eq!(sync.start(), Start::Restored);
        assert!(sync.is_ready());
        assert_eq!(sync.len(), 1);
        assert_eq!(sync.messages().next().unwrap().text, "hi");

        assert!(sync.on_bulk_fetch_result(Snapshot::default()).is_none());
        assert_eq!(sync.len(), 1);
    }

    #[test]
    fn closed_sync_ignores_everything() {
        let mut sync = loading(LoadingPolicy::Buffer);
        sync.close();

        assert_eq!(
            sync.on_live_record_added("m1".into(), body("bob", "hi", 1)),
            Merge::Ignored(Ignored::Closed)
        );
        assert!(sync.on_bulk_fetch_result(Snapshot::default()).is_none());
        assert!(!sync.is_ready());
    }

    #[test]
    fn closed_sync_does_not_restart() {
        let mut sync = MessageFeedSync::new(LoadingPolicy::Drop);
        sync.close();

        assert_eq!(sync.start(), Start::Closed);
        assert_eq!(sync.phase(), Phase::Closed);
        assert_eq!(
            sync.on_live_record_added("m1".into(), body("bob", "hi", 1)),
            Merge::Ignored(Ignored::Closed)
        );
    }
}
