//! Commands emitted by widgets.
//!
//! Commands bubble up from widgets toward the runtime. The screen consumes
//! the focus and overlay commands itself; the rest reach the app, and
//! anything the app does not recognize goes to the installed command
//! handler.

use super::effect::Effect;
use super::message::Message;
use crate::widget::Widget;
use std::any::Any;

/// An action or intent emitted by a widget.
pub enum Command {
    /// Exit the event loop.
    Quit,
    /// Force a full redraw of the screen.
    Refresh,
    /// Post a message back into the event loop.
    Send(Message),
    /// Text was submitted, e.g. from an input widget.
    Submit(String),
    /// An operation was cancelled, e.g. Escape pressed.
    Cancel,
    /// Start a background effect.
    Run(Effect),
    /// Move focus to the next focusable widget.
    FocusNext,
    /// Move focus to the previous focusable widget.
    FocusPrev,
    /// Push an overlay layer.
    PushOverlay {
        /// Root widget of the overlay.
        root: Box<dyn Widget>,
        /// Whether the overlay blocks input to layers below.
        modal: bool,
    },
    /// Dismiss the top overlay layer.
    PopOverlay,
    /// An item was chosen from a palette.
    PaletteSelected {
        /// Item identifier.
        id: String,
        /// Custom data attached to the item.
        data: Box<dyn Any>,
    },
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Quit => f.write_str("Quit"),
            Self::Refresh => f.write_str("Refresh"),
            Self::Send(msg) => f.debug_tuple("Send").field(msg).finish(),
            Self::Submit(text) => f.debug_tuple("Submit").field(text).finish(),
            Self::Cancel => f.write_str("Cancel"),
            Self::Run(_) => f.write_str("Run(..)"),
            Self::FocusNext => f.write_str("FocusNext"),
            Self::FocusPrev => f.write_str("FocusPrev"),
            Self::PushOverlay { modal, .. } => f
                .debug_struct("PushOverlay")
                .field("modal", modal)
                .finish_non_exhaustive(),
            Self::PopOverlay => f.write_str("PopOverlay"),
            Self::PaletteSelected { id, .. } => f
                .debug_struct("PaletteSelected")
                .field("id", id)
                .finish_non_exhaustive(),
        }
    }
}
