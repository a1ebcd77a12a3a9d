//! Event loop, message protocol, and scheduling.
//!
//! The runtime ties the pieces together: an [`App`] owns a backend and a
//! [`crate::screen::Screen`], pulls [`Message`]s off a bounded queue, and
//! renders dirty frames. Background work talks back through [`Services`],
//! whose wake-ups coalesce so a burst of changes costs one loop iteration.

mod app;
mod command;
mod effect;
mod invalidator;
mod message;
mod poller;
mod queue;
mod services;

pub use app::{
    App, AppConfig, CancelHandle, CommandHandlerFn, FrameStats, KeyRouter, Recorder,
    RenderObserver, RuntimeError, UpdateFn,
};
pub use command::Command;
pub use effect::{after, every, CancelToken, Effect, PostFn};
pub use invalidator::{Invalidator, QueueScheduler};
pub use message::Message;
pub use poller::InputPoller;
pub use queue::{should_flush, FlushPolicy, Queue};
pub use services::{Clipboard, Services};
