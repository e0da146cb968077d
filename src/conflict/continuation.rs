use futures::future::{BoxFuture, FutureExt, Shared};
use futures::ready;
use log::debug;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::outcome::{ConflictDetails, ReplaceOutcome, ReplaceState};

type ConflictHandler = Box<dyn FnOnce(&ConflictDetails) + Send>;

/// Handlers registered against one replace call.
enum Handlers {
    /// The outcome has not been dispatched yet.
    Waiting(Vec<ConflictHandler>),
    /// The outcome was dispatched; later handlers run on attachment.
    Dispatched,
}

/// Handle to the not-yet-resolved outcome of a replace call.
///
/// A `PendingReplace` resolves exactly once and can be observed by any number
/// of consumers: clones share the same underlying request, so awaiting two
/// clones never sends the write twice. Like every Rust future it is lazy;
/// the request is issued the first time any clone is polled.
///
/// Conflict reactions are attached with [`PendingReplace::on_conflict`].
/// Every clone and every handle returned by `on_conflict` shares one handler
/// registry, so the handlers fire once no matter which of them is awaited.
#[must_use = "a pending replace does nothing unless it is awaited"]
#[derive(Clone)]
pub struct PendingReplace {
    inner: Shared<BoxFuture<'static, ReplaceOutcome>>,
    handlers: Arc<Mutex<Handlers>>,
    /// Set on handles produced by `on_conflict`.
    observes_conflicts: bool,
}

impl PendingReplace {
    /// Wraps a future producing a replace outcome.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = ReplaceOutcome> + Send + 'static,
    {
        Self {
            inner: future.boxed().shared(),
            handlers: Arc::new(Mutex::new(Handlers::Waiting(Vec::new()))),
            observes_conflicts: false,
        }
    }

    /// A pending value that is already resolved to `outcome`.
    pub fn ready(outcome: ReplaceOutcome) -> Self {
        Self::new(futures::future::ready(outcome))
    }

    /// Attaches a conflict handler and returns a handle to the same outcome.
    ///
    /// The handler runs exactly once, and only if the outcome is
    /// [`ReplaceOutcome::VersionConflict`]. It runs as a continuation after
    /// the call resolves, on whichever task first drives *any* handle of this
    /// call to completion: the source, one of its clones, or a handle returned
    /// by another `on_conflict`. A handler attached after that point runs
    /// immediately, on the attaching thread.
    ///
    /// It never runs for `Replaced` or `OtherFailure`, and it cannot change
    /// the outcome: the returned handle resolves to exactly what `self`
    /// resolves to, so it can be awaited, cloned or tapped again as if no
    /// handler was attached.
    ///
    /// Turning a conflict into a success (re-read and retry) is not the job of
    /// this hook; see [`crate::conflict::resolution::update_with_retry`].
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use docdb_concurrency::prelude::*;
    ///
    /// # fn demo(
    /// #     replacer: &VersionedReplacer,
    /// #     doc: &Document,
    /// #     locator: &DocumentLocator,
    /// # ) -> Result<()> {
    /// let outcome = replacer
    ///     .replace_document(locator, doc)?
    ///     .on_conflict(|conflict| println!("I got it!! {}", conflict.message));
    /// let outcome = futures::executor::block_on(outcome);
    /// # Ok(())
    /// # }
    /// ```
    pub fn on_conflict<H>(&self, handler: H) -> PendingReplace
    where
        H: FnOnce(&ConflictDetails) + Send + 'static,
    {
        {
            let mut handlers = self.handlers.lock();
            if let Handlers::Waiting(queue) = &mut *handlers {
                queue.push(Box::new(handler));
                return self.observing();
            }
        }
        // Already dispatched, so the outcome is memoized.
        if let Some(ReplaceOutcome::VersionConflict(details)) = self.peek() {
            debug!("Running late conflict handler for {}", details.locator);
            handler(details);
        }
        self.observing()
    }

    fn observing(&self) -> PendingReplace {
        PendingReplace {
            inner: self.inner.clone(),
            handlers: Arc::clone(&self.handlers),
            observes_conflicts: true,
        }
    }

    /// Runs the registered handlers, once per call across all handles.
    fn dispatch(&self, outcome: &ReplaceOutcome) {
        let queued = match mem::replace(&mut *self.handlers.lock(), Handlers::Dispatched) {
            Handlers::Waiting(queued) => queued,
            Handlers::Dispatched => return,
        };
        if let ReplaceOutcome::VersionConflict(details) = outcome {
            if !queued.is_empty() {
                debug!(
                    "Running {} conflict handler(s) for {}",
                    queued.len(),
                    details.locator
                );
            }
            for handler in queued {
                handler(details);
            }
        }
    }

    /// Returns the outcome if some consumer already drove this handle to completion.
    pub fn peek(&self) -> Option<&ReplaceOutcome> {
        self.inner.peek()
    }

    pub fn is_resolved(&self) -> bool {
        self.peek().is_some()
    }

    /// Current state of the call as seen through this handle.
    ///
    /// A conflict seen through a handle returned by `on_conflict` reports
    /// [`ReplaceState::ConflictObserved`] once the handlers have been run.
    pub fn state(&self) -> ReplaceState {
        match self.peek() {
            None => ReplaceState::Issued,
            Some(outcome) => match outcome.state() {
                ReplaceState::ConflictDetected if self.observes_conflicts && self.dispatched() => {
                    ReplaceState::ConflictObserved
                }
                state => state,
            },
        }
    }

    fn dispatched(&self) -> bool {
        matches!(*self.handlers.lock(), Handlers::Dispatched)
    }

    /// Blocks the current thread until the outcome is available.
    ///
    /// This exists for call sites that cannot be asynchronous. Prefer
    /// `.await`.
    ///
    /// # Deadlock hazard
    ///
    /// `wait` parks the calling thread inside
    /// [`futures::executor::block_on`]. If the store client needs that same
    /// thread to make progress, for example because it is the only worker of
    /// a single-threaded runtime or a `LocalPool` that also drives the
    /// request's I/O or other pending replaces, the request can never complete
    /// and the thread hangs forever. Only call `wait` from a thread that no
    /// executor depends on.
    pub fn wait(self) -> ReplaceOutcome {
        futures::executor::block_on(self)
    }
}

impl Future for PendingReplace {
    type Output = ReplaceOutcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let outcome = ready!(this.inner.poll_unpin(cx));
        this.dispatch(&outcome);
        Poll::Ready(outcome)
    }
}

impl fmt::Debug for PendingReplace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingReplace")
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_store::locator::DocumentLocator;
    use crate::data_store::versioned_document::VersionToken;
    use futures::executor::block_on;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn conflict() -> ReplaceOutcome {
        ReplaceOutcome::VersionConflict(ConflictDetails {
            locator: DocumentLocator::new("test", "c", "doc"),
            expected: VersionToken::new("v1"),
            current: None,
            message: "mismatch".to_string(),
        })
    }

    fn counting(calls: Arc<AtomicUsize>) -> impl FnOnce(&ConflictDetails) + Send + 'static {
        move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn clones_share_one_resolution() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&polls);
        let pending = PendingReplace::new(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            ReplaceOutcome::Replaced(VersionToken::new("v2"))
        });

        let other = pending.clone();
        assert_eq!(block_on(pending), block_on(other));
        assert_eq!(polls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn state_follows_resolution() {
        let pending = PendingReplace::new(async { conflict() });
        assert_eq!(pending.state(), ReplaceState::Issued);

        let observed = pending.on_conflict(|_| {});
        block_on(observed.clone());
        assert_eq!(observed.state(), ReplaceState::ConflictObserved);
        assert_eq!(pending.state(), ReplaceState::ConflictDetected);
    }

    #[test]
    fn handler_runs_once_per_attachment_even_when_awaited_twice() {
        let calls = Arc::new(AtomicUsize::new(0));
        let tapped = PendingReplace::ready(conflict()).on_conflict(counting(Arc::clone(&calls)));

        block_on(tapped.clone());
        block_on(tapped);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn awaiting_one_tap_fires_handlers_of_sibling_taps() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let pending = PendingReplace::new(async { conflict() });
        let tapped_a = pending.on_conflict(counting(Arc::clone(&first)));
        let tapped_b = pending.on_conflict(counting(Arc::clone(&second)));

        block_on(tapped_a);
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(tapped_b.state(), ReplaceState::ConflictObserved);

        block_on(tapped_b);
        block_on(pending);
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handler_attached_after_resolution_runs_on_attachment() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pending = PendingReplace::ready(conflict());
        block_on(pending.clone());

        let late = pending.on_conflict(counting(Arc::clone(&calls)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        block_on(late);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn late_handler_skips_non_conflicts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pending = PendingReplace::ready(ReplaceOutcome::Replaced(VersionToken::new("v2")));
        block_on(pending.clone());

        let late = pending.on_conflict(counting(Arc::clone(&calls)));
        assert!(block_on(late).is_replaced());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
