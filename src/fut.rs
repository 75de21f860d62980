use std::future::Future;

use tokio::{
    sync::oneshot::{self, error::TryRecvError},
    task::AbortHandle,
};

/// A spawned task whose result can be picked up without blocking.
pub struct Fut<T> {
    recv: oneshot::Receiver<T>,
    resolved: Option<Option<T>>,
    handle: AbortHandle,
}

pub enum Resolve<T> {
    Pending,
    Done(T),
    /// The task ended without producing a value.
    Lost,
}

impl<T> Fut<T>
where
    T: Send + 'static,
{
    pub fn spawn(fut: impl Future<Output = T> + Send + 'static) -> Self {
        let (tx, rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            let result = fut.await;
            let _ = tx.send(result);
        })
        .abort_handle();

        Self {
            recv: rx,
            resolved: None,
            handle,
        }
    }

    /// Waits until the task has finished. The value stays here for
    /// [`Fut::try_resolve`].
    pub async fn ready(&mut self) {
        if self.resolved.is_none() {
            let value = (&mut self.recv).await.ok();
            self.resolved = Some(value);
        }
    }

    pub fn try_resolve(&mut self) -> Resolve<T> {
        if let Some(value) = self.resolved.take() {
            return value.map_or(Resolve::Lost, Resolve::Done);
        }

        match self.recv.try_recv() {
            Ok(value) => Resolve::Done(value),
            Err(TryRecvError::Empty) => Resolve::Pending,
            Err(TryRecvError::Closed) => Resolve::Lost,
        }
    }

    pub fn abort(&self) {
        self.handle.abort()
    }
}

impl<T> std::fmt::Debug for Fut<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fut")
            .field("resolved", &self.resolved.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_once() {
        let mut fut = Fut::spawn(async { 42 });
        fut.ready().await;
        assert!(matches!(fut.try_resolve(), Resolve::Done(42)));
    }

    #[tokio::test]
    async fn aborted_task_is_lost() {
        let mut fut = Fut::spawn(std::future::pending::<()>());
        fut.abort();
        fut.ready().await;
        assert!(matches!(fut.try_resolve(), Resolve::Lost));
    }
}
