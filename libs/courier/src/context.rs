//! Delivery of callbacks onto the thread that owns a [`CallbackContext`].
//!
//! Dispatch pipelines run on tokio worker threads. They never call a
//! [`ResultCallback`](crate::ResultCallback) directly; instead they post a job
//! through a [`ContextHandle`], and the owner of the context runs queued jobs
//! when it drains the queue.

use std::future::Future;
use std::marker::PhantomData;
use std::rc::Rc;

use tokio::sync::mpsc;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A callback queue bound to the thread that drains it.
///
/// `CallbackContext` is deliberately `!Send`: jobs only ever run where the
/// context lives.
pub struct CallbackContext {
    sender: mpsc::UnboundedSender<Job>,
    receiver: mpsc::UnboundedReceiver<Job>,
    _not_send: PhantomData<Rc<()>>,
}

impl Default for CallbackContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CallbackContext {
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver,
            _not_send: PhantomData,
        }
    }

    /// A handle that posts jobs onto this context from any thread.
    #[must_use]
    pub fn handle(&self) -> ContextHandle {
        ContextHandle {
            sender: self.sender.clone(),
        }
    }

    /// Run every job queued so far and return how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.receiver.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Wait for the next job and run it.
    pub async fn next(&mut self) {
        // The context holds a sender, so the channel never closes
        if let Some(job) = self.receiver.recv().await {
            job();
        }
    }

    /// Run jobs as they arrive until `until` completes, then run whatever is
    /// still queued.
    pub async fn run_until<F: Future>(&mut self, until: F) -> F::Output {
        let mut until = std::pin::pin!(until);
        loop {
            tokio::select! {
                biased;
                output = &mut until => {
                    self.run_pending();
                    return output;
                }
                Some(job) = self.receiver.recv() => job(),
            }
        }
    }
}

/// Posts jobs onto a [`CallbackContext`]. Cheap to clone, `Send + Sync`.
#[derive(Clone)]
pub struct ContextHandle {
    sender: mpsc::UnboundedSender<Job>,
}

impl ContextHandle {
    /// Queue `job`. Returns `false` if the context has been dropped, in
    /// which case the job is discarded.
    pub fn post(&self, job: impl FnOnce() + Send + 'static) -> bool {
        if self.sender.send(Box::new(job)).is_ok() {
            true
        } else {
            tracing::warn!("callback context dropped; discarding callback");
            false
        }
    }
}

impl std::fmt::Debug for ContextHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextHandle")
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn jobs_run_only_when_drained() {
        let mut ctx = CallbackContext::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&counter);
        assert!(ctx.handle().post(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        assert_eq!(ctx.run_pending(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.run_pending(), 0);
    }

    #[test]
    fn jobs_posted_elsewhere_run_on_owner_thread() {
        let mut ctx = CallbackContext::new();
        let handle = ctx.handle();
        let ran_on = Arc::new(parking_lot::Mutex::new(None));

        let slot = Arc::clone(&ran_on);
        thread::spawn(move || {
            handle.post(move || *slot.lock() = Some(thread::current().id()));
        })
        .join()
        .unwrap();

        ctx.run_pending();
        assert_eq!(*ran_on.lock(), Some(thread::current().id()));
    }

    #[test]
    fn post_after_drop_reports_false() {
        let ctx = CallbackContext::new();
        let handle = ctx.handle();
        drop(ctx);
        assert!(!handle.post(|| {}));
    }

    #[tokio::test]
    async fn run_until_drains_queue_after_completion() {
        let mut ctx = CallbackContext::new();
        let handle = ctx.handle();
        let counter = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&counter);
        let producer = tokio::spawn(async move {
            for _ in 0..3 {
                let c = Arc::clone(&c);
                handle.post(move || {
                    c.fetch_add(1, Ordering::SeqCst);
                });
                tokio::task::yield_now().await;
            }
        });

        ctx.run_until(producer).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
