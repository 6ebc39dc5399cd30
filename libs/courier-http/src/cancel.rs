//! Tag-based cancellation of in-flight requests.
//!
//! Every request sent through [`HttpClient`](crate::HttpClient) is registered
//! here for the duration of the exchange. Requests carrying the same tag share
//! one [`CancellationToken`], so cancelling the tag aborts all of them at once.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

struct TagEntry {
    token: CancellationToken,
    generation: u64,
    in_flight: usize,
}

struct Inner {
    root: CancellationToken,
    tags: HashMap<String, TagEntry>,
    next_generation: u64,
}

/// Registry of cancellation tokens keyed by request tag.
///
/// Cloning is cheap; clones share the same registry.
#[derive(Clone)]
pub struct CancelRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl Default for CancelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                root: CancellationToken::new(),
                tags: HashMap::new(),
                next_generation: 0,
            })),
        }
    }

    /// Register one in-flight request.
    ///
    /// The returned guard keeps the tag entry alive; the entry is removed when
    /// the last guard for that tag is dropped.
    #[must_use]
    pub fn register(&self, tag: Option<&str>) -> CancelGuard {
        let mut inner = self.inner.lock();
        let Some(tag) = tag else {
            return CancelGuard {
                registry: self.clone(),
                token: inner.root.child_token(),
                tag: None,
            };
        };

        let generation = inner.next_generation;
        let root = inner.root.clone();
        let entry = inner.tags.entry(tag.to_owned()).or_insert_with(|| TagEntry {
            token: root.child_token(),
            generation,
            in_flight: 0,
        });
        entry.in_flight += 1;
        let token = entry.token.clone();
        let generation = entry.generation;
        inner.next_generation += 1;

        CancelGuard {
            registry: self.clone(),
            token,
            tag: Some((tag.to_owned(), generation)),
        }
    }

    /// Cancel every in-flight request registered under `tag`.
    ///
    /// Returns `true` if at least one request was cancelled.
    pub fn cancel_tag(&self, tag: &str) -> bool {
        let removed = self.inner.lock().tags.remove(tag);
        match removed {
            Some(entry) => {
                tracing::debug!(tag, in_flight = entry.in_flight, "cancelling tagged requests");
                entry.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every in-flight request, tagged or not.
    pub fn cancel_all(&self) {
        let mut inner = self.inner.lock();
        tracing::debug!(tags = inner.tags.len(), "cancelling all requests");
        inner.root.cancel();
        inner.root = CancellationToken::new();
        inner.tags.clear();
    }

    /// Number of distinct tags with in-flight requests.
    #[must_use]
    pub fn active_tags(&self) -> usize {
        self.inner.lock().tags.len()
    }

    fn release(&self, tag: &str, generation: u64) {
        let mut inner = self.inner.lock();
        let remove = match inner.tags.get_mut(tag) {
            Some(entry) if entry.generation == generation => {
                entry.in_flight = entry.in_flight.saturating_sub(1);
                entry.in_flight == 0
            }
            _ => false,
        };
        if remove {
            inner.tags.remove(tag);
        }
    }
}

/// Registration of a single in-flight request.
pub struct CancelGuard {
    registry: CancelRegistry,
    token: CancellationToken,
    tag: Option<(String, u64)>,
}

impl CancelGuard {
    /// Token that fires when this request is cancelled.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if let Some((tag, generation)) = self.tag.take() {
            self.registry.release(&tag, generation);
        }
    }
}
