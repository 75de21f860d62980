use std::{sync::Arc, time::Duration};

use crate::{
    feed::{Feed, FeedError, LiveRecord, RecordId, Snapshot, Subscription},
    fut::{Fut, Resolve},
    message::{Composer, Draft, Message, SubmitError, MAX_LENGTH},
    repaint::{ErasedRepaint, Repaint},
    sync::{LoadingPolicy, Merge, MessageFeedSync, Phase, Start, SyncError},
    transcript::{self, Row},
};

mod retry;
pub use retry::Retry;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ViewOptions {
    pub loading: LoadingPolicy,
    pub retry: Retry,
    pub max_length: usize,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            loading: LoadingPolicy::default(),
            retry: Retry::default(),
            max_length: MAX_LENGTH,
        }
    }
}

#[derive(Debug)]
pub enum ViewEvent {
    /// The bulk fetch landed; `count` messages are now shown.
    Loaded { count: usize },
    Appended(Message),
    FetchFailed {
        error: SyncError,
        retry_in: Option<Duration>,
    },
    /// The feed accepted a submitted message. It shows up once echoed.
    Sent { id: RecordId },
    AppendFailed { error: FeedError },
}

#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("a user name is required to open the chat")]
    NoUser,
}

/// The chat screen: one live subscription, one reconciled message list.
///
/// The subscription is held for the lifetime of the view and released when
/// it is closed or dropped.
pub struct ChatView {
    feed: Arc<dyn Feed>,
    user: String,
    options: ViewOptions,
    sync: MessageFeedSync,
    subscription: Option<Subscription>,
    stashed: Option<LiveRecord>,
    live_ended: bool,
    fetch: Option<Fut<Result<Snapshot, FeedError>>>,
    appends: Vec<Fut<Result<RecordId, FeedError>>>,
    composer: Composer,
    repaint: ErasedRepaint,
}

enum Woke {
    Live(Option<LiveRecord>),
    Other,
}

impl ChatView {
    pub fn open(
        feed: Arc<dyn Feed>,
        user: &str,
        options: ViewOptions,
        repaint: impl Repaint,
    ) -> Result<Self, OpenError> {
        Self::restore(feed, user, Vec::new(), options, repaint)
    }

    /// Opens the view over messages kept from an earlier one. A non-empty
    /// list skips the bulk fetch.
    pub fn restore(
        feed: Arc<dyn Feed>,
        user: &str,
        messages: impl IntoIterator<Item = Message>,
        options: ViewOptions,
        repaint: impl Repaint,
    ) -> Result<Self, OpenError> {
        if user.trim().is_empty() {
            return Err(OpenError::NoUser);
        }

        // armed before the fetch is issued
        let subscription = feed.subscribe_on_added();

        let mut sync = MessageFeedSync::restore(messages, options.loading);
        let fetch = match sync.start() {
            Start::Fetch => Some(Self::spawn_fetch(&feed, Duration::ZERO)),
            Start::Restored | Start::Closed => None,
        };

        tracing::info!(
            user,
            restored = sync.len(),
            loading = ?options.loading,
            retry = ?options.retry,
            "chat view opened"
        );

        Ok(Self {
            feed,
            user: user.to_string(),
            options,
            sync,
            subscription: Some(subscription),
            stashed: None,
            live_ended: false,
            fetch,
            appends: Vec::new(),
            composer: Composer::new(options.max_length),
            repaint: repaint.erased(),
        })
    }

    /// Applies everything that is ready without waiting.
    pub fn poll(&mut self) -> Vec<ViewEvent> {
        let mut events = Vec::new();

        // queued live records predate the fetch result observed below
        self.drain_live(&mut events);
        self.poll_fetch(&mut events);
        self.drain_live(&mut events);
        self.poll_appends(&mut events);

        if !events.is_empty() {
            (self.repaint)();
        }
        events
    }

    /// Waits until something changes, then applies it.
    pub async fn changed(&mut self) -> Vec<ViewEvent> {
        loop {
            let events = self.poll();
            if !events.is_empty() {
                return events;
            }

            match self.wait().await {
                Woke::Live(Some(record)) => self.stashed = Some(record),
                Woke::Live(None) => {
                    tracing::warn!("live subscription ended");
                    self.live_ended = true;
                }
                Woke::Other => {}
            }
        }
    }

    /// Refetches after a failed load. Returns `false` when not loading.
    pub fn reload(&mut self) -> bool {
        if self.sync.phase() != Phase::Loading {
            return false;
        }

        if let Some(fetch) = self.fetch.take() {
            fetch.abort();
        }
        tracing::info!("reloading messages");
        self.fetch = Some(Self::spawn_fetch(&self.feed, Duration::ZERO));
        true
    }

    /// Sends `raw` as the current user. Nothing is added locally until the
    /// feed echoes it back.
    pub fn submit(&mut self, raw: &str) -> Result<(), SubmitError> {
        let draft = Draft::new(raw, &self.user, self.options.max_length)?;
        self.dispatch(draft)
    }

    /// Sends the composer's contents, clearing it on success.
    pub fn send(&mut self) -> Result<(), SubmitError> {
        if !self.sync.is_ready() {
            return Err(SubmitError::NotReady);
        }
        let draft = self.composer.take_draft(&self.user)?;
        self.dispatch(draft)
    }

    pub fn close(self) {}

    pub fn messages(&self) -> impl ExactSizeIterator<Item = &Message> + DoubleEndedIterator {
        self.sync.messages()
    }

    pub fn to_messages(&self) -> Vec<Message> {
        self.sync.messages().cloned().collect()
    }

    pub fn transcript(&self) -> Vec<Row<'_>> {
        transcript::rows(self.sync.messages(), &self.user)
    }

    pub fn is_ready(&self) -> bool {
        self.sync.is_ready()
    }

    pub const fn phase(&self) -> Phase {
        self.sync.phase()
    }

    pub fn is_live(&self) -> bool {
        self.subscription.is_some() && !self.live_ended
    }

    pub const fn is_fetching(&self) -> bool {
        self.fetch.is_some()
    }

    pub fn pending_appends(&self) -> usize {
        self.appends.len()
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub const fn options(&self) -> &ViewOptions {
        &self.options
    }

    pub const fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn composer_mut(&mut self) -> &mut Composer {
        &mut self.composer
    }

    fn spawn_fetch(feed: &Arc<dyn Feed>, delay: Duration) -> Fut<Result<Snapshot, FeedError>> {
        let feed = Arc::clone(feed);
        Fut::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            feed.fetch_all().await
        })
    }

    fn dispatch(&mut self, draft: Draft) -> Result<(), SubmitError> {
        if !self.sync.is_ready() {
            return Err(SubmitError::NotReady);
        }

        let body = draft.into_body_now();
        tracing::debug!(chars = body.text.chars().count(), "submitting message");

        let feed = Arc::clone(&self.feed);
        self.appends
            .push(Fut::spawn(async move { feed.append(&body).await }));
        Ok(())
    }

    fn next_live(&mut self) -> Option<LiveRecord> {
        self.stashed
            .take()
            .or_else(|| self.subscription.as_mut()?.try_recv())
    }

    fn drain_live(&mut self, events: &mut Vec<ViewEvent>) {
        while let Some(LiveRecord { id, body }) = self.next_live() {
            if let Merge::Appended(message) = self.sync.on_live_record_added(id, body) {
                events.push(ViewEvent::Appended(message));
            }
        }
    }

    fn poll_fetch(&mut self, events: &mut Vec<ViewEvent>) {
        let Some(fetch) = &mut self.fetch else { return };
        let result = match fetch.try_resolve() {
            Resolve::Pending => return,
            Resolve::Done(result) => result,
            Resolve::Lost => Err(FeedError::Unavailable(
                "fetch ended without a result".into(),
            )),
        };
        self.fetch = None;

        match result {
            Ok(snapshot) => {
                if let Some(list) = self.sync.on_bulk_fetch_result(snapshot) {
                    events.push(ViewEvent::Loaded { count: list.len() });
                }
            }
            Err(err) => {
                let error = self.sync.on_fetch_failed(err);
                let retry_in = self.options.retry.delay(self.sync.failures());
                if let Some(delay) = retry_in {
                    tracing::info!("refetching in {delay:?}");
                    self.fetch = Some(Self::spawn_fetch(&self.feed, delay));
                }
                events.push(ViewEvent::FetchFailed { error, retry_in });
            }
        }
    }

    fn poll_appends(&mut self, events: &mut Vec<ViewEvent>) {
        self.appends.retain_mut(|append| {
            let result = match append.try_resolve() {
                Resolve::Pending => return true,
                Resolve::Done(result) => result,
                Resolve::Lost => Err(FeedError::Unavailable(
                    "append ended without a result".into(),
                )),
            };

            match result {
                Ok(id) => {
                    tracing::debug!(%id, "message accepted");
                    events.push(ViewEvent::Sent { id });
                }
                Err(error) => {
                    tracing::error!(%error, "message was not sent");
                    events.push(ViewEvent::AppendFailed { error });
                }
            }
            false
        });
    }

    async fn wait(&mut self) -> Woke {
        let Self {
            subscription,
            live_ended,
            fetch,
            appends,
            ..
        } = self;

        let live = async {
            match subscription {
                Some(subscription) if !*live_ended => subscription.recv().await,
                _ => std::future::pending::<Option<LiveRecord>>().await,
            }
        };

        let fetched = async {
            match fetch {
                Some(fetch) => fetch.ready().await,
                None => std::future::pending::<()>().await,
            }
        };

        let appended = async {
            if appends.is_empty() {
                std::future::pending::<()>().await;
            } else {
                futures::future::select_all(appends.iter_mut().map(|a| Box::pin(a.ready())))
                    .await;
            }
        };

        tokio::select! {
            record = live => Woke::Live(record),
            () = fetched => Woke::Other,
            () = appended => Woke::Other,
        }
    }

    fn teardown(&mut self) {
        self.sync.close();
        if let Some(fetch) = self.fetch.take() {
            fetch.abort();
        }
        if let Some(subscription) = self.subscription.take() {
            subscription.release();
        }
        tracing::info!(
            user = %self.user,
            pending_appends = self.appends.len(),
            "chat view closed"
        );
    }
}

impl Drop for ChatView {
    fn drop(&mut self) {
        self.teardown()
    }
}

impl std::fmt::Debug for ChatView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatView")
            .field("user", &self.user)
            .field("phase", &self.sync.phase())
            .field("messages", &self.sync.len())
            .field("live", &self.is_live())
            .finish_non_exhaustive()
    }
}
