//! Background effects with cooperative cancellation.
//!
//! An effect is a closure that runs on its own thread, given a cancel
//! token and a non-blocking post function. Effects are never joined; they
//! observe cancellation and exit on their own.

use super::message::Message;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Non-blocking message post. Returns false when the queue is full or the
/// loop has gone away.
pub type PostFn = Arc<dyn Fn(Message) -> bool + Send + Sync>;

struct TokenInner {
    cancelled: AtomicBool,
    lock: Mutex<()>,
    signal: Condvar,
}

/// A shared cancellation flag with a wakeable wait.
///
/// Cloning yields another handle to the same flag.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

impl CancelToken {
    /// Create a token in the not-cancelled state.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                lock: Mutex::new(()),
                signal: Condvar::new(),
            }),
        }
    }

    /// Set the flag and wake all waiters.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.signal.notify_all();
    }

    /// Whether the token has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Sleep until cancelled or `timeout` elapses.
    ///
    /// Returns true if the token was cancelled, false on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = match self.inner.lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        loop {
            if self.is_cancelled() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (next, timed_out) = match self.inner.signal.wait_timeout(guard, deadline - now) {
                Ok((guard, result)) => (guard, result.timed_out()),
                Err(poisoned) => {
                    let (guard, result) = poisoned.into_inner();
                    (guard, result.timed_out())
                }
            };
            guard = next;
            if timed_out {
                return self.is_cancelled();
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Work that runs on a background thread.
pub struct Effect {
    run: Box<dyn FnOnce(CancelToken, PostFn) + Send>,
}

impl Effect {
    /// Wrap a closure as an effect.
    pub fn new(run: impl FnOnce(CancelToken, PostFn) + Send + 'static) -> Self {
        Self { run: Box::new(run) }
    }

    /// Execute the effect on the calling thread.
    pub(crate) fn execute(self, token: CancelToken, post: PostFn) {
        (self.run)(token, post);
    }
}

/// An effect that posts `msg` after `delay`, unless cancelled first.
///
/// A zero delay posts immediately.
pub fn after(delay: Duration, msg: Message) -> Effect {
    Effect::new(move |token, post| {
        if delay.is_zero() {
            post(msg);
            return;
        }
        if !token.wait_timeout(delay) {
            post(msg);
        }
    })
}

/// An effect that posts a message on every interval tick, until cancelled.
///
/// Returning `None` from `f` skips that tick.
pub fn every(
    interval: Duration,
    mut f: impl FnMut(Instant) -> Option<Message> + Send + 'static,
) -> Effect {
    Effect::new(move |token, post| {
        if interval.is_zero() {
            return;
        }
        loop {
            if token.wait_timeout(interval) {
                return;
            }
            if let Some(msg) = f(Instant::now()) {
                if !post(msg) && token.is_cancelled() {
                    return;
                }
            }
        }
    })
}
