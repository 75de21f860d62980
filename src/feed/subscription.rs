use tokio::sync::mpsc::UnboundedReceiver;

use super::LiveRecord;

/// A live subscription to a feed.
///
/// Released when dropped, or explicitly with [`Subscription::release`].
pub struct Subscription {
    recv: UnboundedReceiver<LiveRecord>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(
        recv: UnboundedReceiver<LiveRecord>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            recv,
            release: Some(Box::new(release)),
        }
    }

    /// Waits for the next added record. `None` once the feed stops delivering.
    pub async fn recv(&mut self) -> Option<LiveRecord> {
        self.recv.recv().await
    }

    pub fn try_recv(&mut self) -> Option<LiveRecord> {
        self.recv.try_recv().ok()
    }

    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        let Some(release) = self.release.take() else { return };
        self.recv.close();
        release();
        tracing::debug!("released live subscription");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_inner()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("released", &self.release.is_none())
            .finish()
    }
}
