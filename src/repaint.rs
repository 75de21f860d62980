use std::sync::Arc;

use tokio::sync::Notify;

/// Tells the presentation layer that the message list or readiness changed.
pub trait Repaint: Sized + Send + Sync + 'static {
    fn repaint(&self) {}

    fn erased(self) -> ErasedRepaint {
        let this = self;
        Arc::new(move || this.repaint())
    }
}

impl Repaint for () {}

impl Repaint for Arc<Notify> {
    fn repaint(&self) {
        self.notify_one();
    }
}

pub type ErasedRepaint = Arc<dyn Fn() + Send + Sync + 'static>;
