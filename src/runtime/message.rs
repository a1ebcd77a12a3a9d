//! Messages flowing into the event loop.

use crate::backend::{KeyEvent, MouseEvent};
use std::any::Any;
use std::time::Instant;

/// An event flowing into the UI.
///
/// Messages come from terminal input, the frame tick, or background
/// effects. Application-defined payloads travel as [`Message::User`].
pub enum Message {
    /// A keyboard input event.
    Key(KeyEvent),
    /// A mouse input event.
    Mouse(MouseEvent),
    /// Pasted text from bracketed paste mode.
    Paste(String),
    /// The terminal size changed.
    Resize {
        /// New width in columns.
        width: u16,
        /// New height in rows.
        height: u16,
    },
    /// Frame tick for animations.
    Tick(Instant),
    /// Wake the loop to flush the scheduled-callback queue.
    QueueFlush,
    /// Request a render pass without forcing a full redraw.
    Invalidate,
    /// An application-defined payload.
    User(Box<dyn Any + Send>),
}

impl Message {
    /// Wrap an application-defined value in a message.
    pub fn user<T: Any + Send>(value: T) -> Self {
        Self::User(Box::new(value))
    }

    /// Borrow the payload of a [`Message::User`] as `T`, if it is one.
    pub fn downcast_user<T: Any>(&self) -> Option<&T> {
        match self {
            Self::User(payload) => payload.downcast_ref(),
            _ => None,
        }
    }

    /// Whether this is a frame tick.
    pub fn is_tick(&self) -> bool {
        matches!(self, Self::Tick(_))
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Key(ev) => f.debug_tuple("Key").field(ev).finish(),
            Self::Mouse(ev) => f.debug_tuple("Mouse").field(ev).finish(),
            Self::Paste(text) => f.debug_tuple("Paste").field(text).finish(),
            Self::Resize { width, height } => f
                .debug_struct("Resize")
                .field("width", width)
                .field("height", height)
                .finish(),
            Self::Tick(at) => f.debug_tuple("Tick").field(at).finish(),
            Self::QueueFlush => f.write_str("QueueFlush"),
            Self::Invalidate => f.write_str("Invalidate"),
            Self::User(_) => f.write_str("User(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_downcast() {
        let msg = Message::user(42u32);
        assert_eq!(msg.downcast_user::<u32>(), Some(&42));
        assert_eq!(msg.downcast_user::<String>(), None);
        assert_eq!(Message::QueueFlush.downcast_user::<u32>(), None);
    }

    #[test]
    fn test_is_tick() {
        assert!(Message::Tick(Instant::now()).is_tick());
        assert!(!Message::Invalidate.is_tick());
    }
}
