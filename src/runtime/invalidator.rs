//! Coalescing wake-up primitives.
//!
//! Both primitives share the same shape: a compare-and-swap on a pending
//! flag decides a single winner, only the winner posts a wake message, and
//! a failed post releases the flag so the next caller can retry. The event
//! loop resets the flag after it processes the wake, re-arming the
//! primitive for the next burst.

use super::effect::PostFn;
use super::message::Message;
use super::queue::Queue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Requests render passes, collapsing bursts into one message.
///
/// Any number of [`Invalidator::invalidate`] calls between two loop
/// iterations produce at most one [`Message::Invalidate`] in the queue.
#[derive(Clone)]
pub struct Invalidator {
    post: PostFn,
    pending: Arc<AtomicBool>,
}

impl Invalidator {
    /// Wire an invalidator to a post function.
    pub fn new(post: PostFn) -> Self {
        Self {
            post,
            pending: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request a render pass.
    pub fn invalidate(&self) {
        if self
            .pending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            // Winner posts; a failed post releases the flag so the next
            // call retries.
            if !(self.post)(Message::Invalidate) {
                self.pending.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Run `f` on the calling thread, then request a render pass.
    pub fn schedule(&self, f: impl FnOnce()) {
        f();
        self.invalidate();
    }

    /// Re-arm after the loop has processed the wake message.
    pub(crate) fn reset_pending(&self) {
        self.pending.store(false, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for Invalidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invalidator")
            .field("pending", &self.pending.load(Ordering::SeqCst))
            .finish()
    }
}

/// Enqueues callbacks and wakes the loop to flush them.
///
/// Like [`Invalidator`], wake messages coalesce: a burst of schedules
/// produces one [`Message::QueueFlush`].
#[derive(Clone)]
pub struct QueueScheduler {
    queue: Arc<Queue>,
    post: PostFn,
    pending: Arc<AtomicBool>,
}

impl QueueScheduler {
    /// Wire a scheduler to a queue and a post function.
    pub fn new(queue: Arc<Queue>, post: PostFn) -> Self {
        Self {
            queue,
            post,
            pending: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Enqueue a callback and wake the loop.
    pub fn schedule(&self, f: impl FnOnce() + Send + 'static) {
        self.queue.schedule(f);
        if self
            .pending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            if !(self.post)(Message::QueueFlush) {
                self.pending.store(false, Ordering::SeqCst);
            }
        }
    }

    /// The queue this scheduler feeds.
    pub fn queue(&self) -> &Arc<Queue> {
        &self.queue
    }

    /// Re-arm after the loop has flushed the queue.
    pub(crate) fn reset_pending(&self) {
        self.pending.store(false, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for QueueScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueScheduler")
            .field("pending", &self.pending.load(Ordering::SeqCst))
            .field("queued", &self.queue.len())
            .finish()
    }
}
