//! Input poller: dedicated thread turning backend events into messages.

use super::message::Message;
use crate::backend::{Event, EventSource};
use crossbeam_channel::{Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::warn;

/// Polls a backend event source from its own thread.
///
/// Posting is non-blocking: if the message queue is full the event is
/// dropped rather than stalling input delivery.
pub struct InputPoller {
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl InputPoller {
    /// Spawn the polling thread.
    pub fn spawn(
        mut source: Box<dyn EventSource>,
        sender: Sender<Message>,
        poll_timeout: Duration,
    ) -> std::io::Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let stop = shutdown.clone();

        let handle = thread::Builder::new()
            .name("treadle-input".to_string())
            .spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    match source.poll(poll_timeout) {
                        Ok(Some(event)) => {
                            let msg = convert(event);
                            match sender.try_send(msg) {
                                Ok(()) => {}
                                Err(TrySendError::Full(msg)) => {
                                    warn!(?msg, "input dropped, message queue full");
                                }
                                Err(TrySendError::Disconnected(_)) => break,
                            }
                        }
                        Ok(None) => {}
                        Err(err) => {
                            warn!(%err, "input poll failed");
                            break;
                        }
                    }
                }
            })?;

        Ok(Self {
            handle: Some(handle),
            shutdown,
        })
    }

    /// Signal the thread to stop.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Signal and wait for the thread to finish.
    pub fn join(mut self) {
        self.shutdown();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for InputPoller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn convert(event: Event) -> Message {
    match event {
        Event::Key(key) => Message::Key(key),
        Event::Mouse(mouse) => Message::Mouse(mouse),
        Event::Paste(text) => Message::Paste(text),
        Event::Resize { width, height } => Message::Resize { width, height },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Backend, MemoryBackend};
    use crossbeam_channel::bounded;

    #[test]
    fn test_poller_delivers_messages() {
        let mut backend = MemoryBackend::new(4, 4);
        let source = backend.take_event_source().unwrap();
        let (tx, rx) = bounded(16);
        let poller = InputPoller::spawn(source, tx, Duration::from_millis(5)).unwrap();

        backend.push_event(Event::Resize {
            width: 10,
            height: 10,
        });
        let msg = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(matches!(
            msg,
            Message::Resize {
                width: 10,
                height: 10
            }
        ));
        poller.join();
    }

    #[test]
    fn test_poller_shutdown_stops_thread() {
        let mut backend = MemoryBackend::new(4, 4);
        let source = backend.take_event_source().unwrap();
        let (tx, _rx) = bounded(16);
        let poller = InputPoller::spawn(source, tx, Duration::from_millis(1)).unwrap();
        poller.join();
    }
}
