//! App-level services handed to bound widgets.

use super::effect::{CancelToken, Effect, PostFn};
use super::invalidator::{Invalidator, QueueScheduler};
use super::message::Message;
use super::queue::Queue;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;

/// Host clipboard integration.
///
/// The runtime itself never touches the clipboard; widgets reach it
/// through [`Services::clipboard_get`] and [`Services::clipboard_set`].
pub trait Clipboard: Send {
    /// Read the clipboard contents, if available.
    fn get(&mut self) -> Option<String>;
    /// Replace the clipboard contents.
    fn set(&mut self, text: &str);
}

/// A cloneable handle to the runtime's scheduling and messaging machinery.
///
/// Widgets receive one in [`crate::widget::Widget::bind`] and may keep a
/// clone for the lifetime of their binding; all clones share the same
/// underlying loop.
#[derive(Clone)]
pub struct Services {
    post: PostFn,
    invalidator: Invalidator,
    scheduler: QueueScheduler,
    cancel: CancelToken,
    clipboard: Option<Arc<Mutex<Box<dyn Clipboard>>>>,
}

impl Services {
    pub(crate) fn new(
        post: PostFn,
        invalidator: Invalidator,
        scheduler: QueueScheduler,
        cancel: CancelToken,
        clipboard: Option<Arc<Mutex<Box<dyn Clipboard>>>>,
    ) -> Self {
        Self {
            post,
            invalidator,
            scheduler,
            cancel,
            clipboard,
        }
    }

    /// Services wired to nothing: posts fail, schedules queue but never
    /// flush. Useful for constructing widgets outside a running app.
    pub fn detached() -> Self {
        let post: PostFn = Arc::new(|_| false);
        Self {
            invalidator: Invalidator::new(post.clone()),
            scheduler: QueueScheduler::new(Arc::new(Queue::new()), post.clone()),
            cancel: CancelToken::new(),
            clipboard: None,
            post,
        }
    }

    /// Read the host clipboard, if one was installed on the app.
    pub fn clipboard_get(&self) -> Option<String> {
        let handle = self.clipboard.as_ref()?;
        let mut clipboard = handle.lock().unwrap_or_else(PoisonError::into_inner);
        clipboard.get()
    }

    /// Write to the host clipboard. A no-op if none was installed.
    pub fn clipboard_set(&self, text: &str) {
        if let Some(handle) = self.clipboard.as_ref() {
            let mut clipboard = handle.lock().unwrap_or_else(PoisonError::into_inner);
            clipboard.set(text);
        }
    }

    /// Post a message into the event loop without blocking.
    ///
    /// Returns false when the message queue is full.
    pub fn post(&self, msg: Message) -> bool {
        (self.post)(msg)
    }

    /// Request a render pass.
    pub fn invalidate(&self) {
        self.invalidator.invalidate();
    }

    /// Enqueue a callback to run on the event loop thread.
    pub fn schedule(&self, f: impl FnOnce() + Send + 'static) {
        self.scheduler.schedule(f);
    }

    /// Start an effect on a background thread.
    ///
    /// The effect receives the app's cancel token and is expected to exit
    /// when the token fires; it is never joined.
    pub fn spawn(&self, effect: Effect) {
        let token = self.cancel.clone();
        let post = self.post.clone();
        let spawned = thread::Builder::new()
            .name("treadle-effect".to_string())
            .spawn(move || effect.execute(token, post));
        if let Err(err) = spawned {
            warn!(%err, "failed to spawn effect thread");
        }
    }

    /// Post `msg` after a delay.
    pub fn after(&self, delay: Duration, msg: Message) {
        self.spawn(super::effect::after(delay, msg));
    }

    /// Post messages on a fixed interval until the app stops.
    pub fn every(
        &self,
        interval: Duration,
        f: impl FnMut(Instant) -> Option<Message> + Send + 'static,
    ) {
        self.spawn(super::effect::every(interval, f));
    }
}

impl Default for Services {
    fn default() -> Self {
        Self::detached()
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_post_fails() {
        let services = Services::detached();
        assert!(!services.post(Message::Invalidate));
    }

    #[test]
    fn test_spawned_effect_sees_cancel_token() {
        let services = Services::detached();
        services.cancel.cancel();
        let (tx, rx) = crossbeam_channel::bounded(1);
        services.spawn(Effect::new(move |token, _post| {
            let _ = tx.send(token.is_cancelled());
        }));
        assert!(rx.recv_timeout(Duration::from_secs(1)).unwrap());
    }

    #[test]
    fn test_effects_run_on_named_threads() {
        let services = Services::detached();
        let (tx, rx) = crossbeam_channel::bounded(1);
        services.spawn(Effect::new(move |_token, _post| {
            let _ = tx.send(thread::current().name().map(str::to_owned));
        }));
        let name = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(name.as_deref(), Some("treadle-effect"));
    }

    #[test]
    fn test_clipboard_roundtrip() {
        struct FakeClipboard(Option<String>);
        impl Clipboard for FakeClipboard {
            fn get(&mut self) -> Option<String> {
                self.0.clone()
            }
            fn set(&mut self, text: &str) {
                self.0 = Some(text.to_string());
            }
        }

        let mut services = Services::detached();
        assert_eq!(services.clipboard_get(), None);
        services.clipboard_set("lost"); // no clipboard installed

        services.clipboard = Some(Arc::new(Mutex::new(
            Box::new(FakeClipboard(None)) as Box<dyn Clipboard>
        )));
        services.clipboard_set("yanked");
        assert_eq!(services.clipboard_get().as_deref(), Some("yanked"));
    }
}
