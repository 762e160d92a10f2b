//! Shared build completion
//!
//! One pending build result, observed by any number of waiters. A source
//! settles exactly once; after that a fresh one is created for the next
//! round of requests.

use crate::error::PrebuildError;
use crate::workspace::CompilationWorkspace;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Result every waiter of one build round receives
pub type BuildOutcome = Result<Arc<CompilationWorkspace>, Arc<PrebuildError>>;

/// Cloneable future resolving to a [`BuildOutcome`]
pub type SharedOutcome = Shared<BoxFuture<'static, BuildOutcome>>;

/// Write-once result slot with a shared read side
pub struct CompletionSource {
    sender: Option<oneshot::Sender<BuildOutcome>>,
    future: SharedOutcome,
}

impl CompletionSource {
    pub fn new() -> Self {
        let (sender, receiver) = oneshot::channel();
        let future = async move {
            receiver.await.unwrap_or_else(|_| {
                Err(Arc::new(PrebuildError::Internal(
                    "build completion dropped before a result was set".to_string(),
                )))
            })
        }
        .boxed()
        .shared();

        Self {
            sender: Some(sender),
            future,
        }
    }

    /// Whether a result has been set
    pub fn is_settled(&self) -> bool {
        self.sender.is_none()
    }

    /// A handle on the result
    pub fn future(&self) -> SharedOutcome {
        self.future.clone()
    }

    /// Publish `outcome` to every waiter; ignored once settled
    pub fn set_result(&mut self, outcome: BuildOutcome) {
        if let Some(sender) = self.sender.take() {
            // Nobody waiting is fine; the outcome is still cached on the entity.
            let _ = sender.send(outcome);
        }
    }
}

impl Default for CompletionSource {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CompletionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionSource")
            .field("settled", &self.is_settled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_waiter_sees_the_same_result() {
        let mut source = CompletionSource::new();
        let waiters: Vec<_> = (0..5).map(|_| tokio::spawn(source.future())).collect();

        let workspace = Arc::new(CompilationWorkspace::new());
        source.set_result(Ok(workspace.clone()));
        assert!(source.is_settled());

        for waiter in waiters {
            let result = waiter.await.unwrap().unwrap();
            assert!(Arc::ptr_eq(&result, &workspace));
        }

        // Late subscribers still observe it.
        assert!(source.future().await.is_ok());
    }

    #[tokio::test]
    async fn first_result_wins() {
        let mut source = CompletionSource::new();
        source.set_result(Err(Arc::new(PrebuildError::Internal("first".to_string()))));
        source.set_result(Ok(Arc::new(CompilationWorkspace::new())));

        let err = source.future().await.unwrap_err();
        assert!(err.to_string().contains("first"));
    }

    #[tokio::test]
    async fn dropped_source_fails_waiters() {
        let source = CompletionSource::new();
        let future = source.future();
        drop(source);

        let err = future.await.unwrap_err();
        assert!(matches!(*err, PrebuildError::Internal(_)));
    }
}
