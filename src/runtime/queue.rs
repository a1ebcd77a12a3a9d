//! Scheduled-callback queue and flush policy.
//!
//! Background work hands closures to the queue; the event loop drains it
//! at points chosen by the [`FlushPolicy`]. A [`Message::QueueFlush`]
//! always drains, regardless of policy.

use super::message::Message;
use std::sync::Mutex;

type Callback = Box<dyn FnOnce() + Send>;

/// A thread-safe batch of callbacks drained on the event loop thread.
#[derive(Default)]
pub struct Queue {
    pending: Mutex<Vec<Callback>>,
}

impl Queue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a callback for the next flush.
    pub fn schedule(&self, f: impl FnOnce() + Send + 'static) {
        let mut pending = match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        pending.push(Box::new(f));
    }

    /// Run all queued callbacks and return how many ran.
    ///
    /// Callbacks scheduled during a flush land in the next batch.
    pub fn flush(&self) -> usize {
        let batch = {
            let mut pending = match self.pending.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            std::mem::take(&mut *pending)
        };
        let count = batch.len();
        for callback in batch {
            callback();
        }
        count
    }

    /// Number of callbacks waiting.
    pub fn len(&self) -> usize {
        match self.pending.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Whether the queue has no pending callbacks.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// When the event loop drains the callback queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushPolicy {
    /// Flush on any message, including ticks.
    #[default]
    OnMessageAndTick,
    /// Flush on any message except ticks.
    OnMessage,
    /// Flush only on ticks.
    OnTick,
    /// Flush only on an explicit [`Message::QueueFlush`].
    Manual,
}

/// Whether `msg` should trigger a queue flush under `policy`.
pub fn should_flush(policy: FlushPolicy, msg: &Message) -> bool {
    if matches!(msg, Message::QueueFlush) {
        return true;
    }
    match policy {
        FlushPolicy::Manual => false,
        FlushPolicy::OnMessage => !msg.is_tick(),
        FlushPolicy::OnTick => msg.is_tick(),
        FlushPolicy::OnMessageAndTick => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn test_flush_runs_in_order() {
        let queue = Queue::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let log = log.clone();
            queue.schedule(move || log.lock().unwrap().push(i));
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.flush(), 3);
        assert!(queue.is_empty());
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_callbacks_scheduled_during_flush_wait() {
        let queue = Arc::new(Queue::new());
        let ran = Arc::new(AtomicUsize::new(0));
        {
            let queue = queue.clone();
            let ran = ran.clone();
            queue.clone().schedule(move || {
                ran.fetch_add(1, Ordering::SeqCst);
                let ran = ran.clone();
                queue.schedule(move || {
                    ran.fetch_add(1, Ordering::SeqCst);
                });
            });
        }
        assert_eq!(queue.flush(), 1);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(queue.flush(), 1);
        assert_eq!(ran.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_flush_policy_table() {
        let tick = Message::Tick(Instant::now());
        let key = Message::Invalidate;
        let flush = Message::QueueFlush;

        // QueueFlush always drains.
        for policy in [
            FlushPolicy::OnMessageAndTick,
            FlushPolicy::OnMessage,
            FlushPolicy::OnTick,
            FlushPolicy::Manual,
        ] {
            assert!(should_flush(policy, &flush));
        }

        assert!(should_flush(FlushPolicy::OnMessageAndTick, &tick));
        assert!(should_flush(FlushPolicy::OnMessageAndTick, &key));

        assert!(!should_flush(FlushPolicy::OnMessage, &tick));
        assert!(should_flush(FlushPolicy::OnMessage, &key));

        assert!(should_flush(FlushPolicy::OnTick, &tick));
        assert!(!should_flush(FlushPolicy::OnTick, &key));

        assert!(!should_flush(FlushPolicy::Manual, &tick));
        assert!(!should_flush(FlushPolicy::Manual, &key));
    }
}
