//! The event loop.
//!
//! One thread owns the widget tree, the screen, and the backend. Input
//! arrives from the poller thread, ticks from a timer channel, and
//! everything else through the message queue. Each iteration processes one
//! message, optionally flushes the callback queue, and renders at most one
//! frame.

use super::effect::{CancelToken, Effect, PostFn};
use super::invalidator::{Invalidator, QueueScheduler};
use super::message::Message;
use super::poller::InputPoller;
use super::queue::{should_flush, FlushPolicy, Queue};
use super::services::{Clipboard, Services};
use super::Command;
use crate::backend::{Backend, KeyEvent};
use crate::buffer::Buffer;
use crate::layout::Rect;
use crate::screen::{Announcer, FocusIndicator, FocusMode, Screen};
use crate::widget::Widget;
use crossbeam_channel::{bounded, never, tick, Receiver, Sender};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Errors from running the app.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The backend failed to initialize or report its size.
    #[error("backend init failed: {0}")]
    Init(#[source] io::Error),
    /// Flushing a frame to the backend failed.
    #[error("frame flush failed: {0}")]
    Render(#[source] io::Error),
    /// The run was cancelled from outside.
    #[error("run cancelled")]
    Cancelled,
}

/// A message-processing override installed with [`App::set_update`].
///
/// Return true if the message requires a render. Delegate to
/// [`App::default_update`] for the standard routing.
pub type UpdateFn = Box<dyn FnMut(&mut App, &Message) -> bool>;

/// Handler for commands the runtime does not consume itself.
///
/// Return true if the command requires a render.
pub type CommandHandlerFn = Box<dyn FnMut(Command) -> bool>;

/// Intercepts key events before they reach the widget tree.
///
/// Returning `Some` consumes the key and executes the commands; `None`
/// lets the key flow to the focused widget.
pub trait KeyRouter {
    /// Map a key event to commands, or pass it through.
    fn route(&mut self, key: &KeyEvent) -> Option<Vec<Command>>;
}

/// Captures rendered frames, e.g. for session replay.
///
/// A recorder that fails is dropped with a warning; recording is never
/// allowed to take the app down.
pub trait Recorder {
    /// Begin a recording session at the given dimensions.
    fn start(&mut self, width: u16, height: u16) -> io::Result<()>;
    /// Record one rendered frame.
    fn frame(&mut self, buffer: &Buffer) -> io::Result<()>;
    /// Note a terminal resize.
    fn resize(&mut self, width: u16, height: u16) -> io::Result<()>;
    /// Finish the session.
    fn close(&mut self) {}
}

/// Statistics for one flushed frame, handed to a [`RenderObserver`].
#[derive(Debug, Clone, Copy)]
pub struct FrameStats {
    /// Cells flushed to the backend this frame.
    pub dirty: usize,
    /// Total cells in the buffer.
    pub total: usize,
    /// Time spent diffing and staging the frame.
    pub elapsed: Duration,
}

/// Observes flushed frames, e.g. for a diagnostics overlay or perf capture.
pub trait RenderObserver {
    /// Called once per flushed frame.
    fn frame(&mut self, stats: &FrameStats);
}

/// Static configuration for an [`App`].
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Capacity of the message queue.
    pub message_buffer: usize,
    /// Tick interval for [`Message::Tick`]; `None` disables ticks.
    pub tick_rate: Option<Duration>,
    /// When the callback queue drains.
    pub flush_policy: FlushPolicy,
    /// How long the input thread waits per poll before rechecking shutdown.
    pub poll_timeout: Duration,
    /// How layers learn about focusable widgets.
    pub focus_mode: FocusMode,
    /// Marker drawn next to the focused widget; `None` draws nothing.
    pub focus_indicator: Option<FocusIndicator>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            message_buffer: 128,
            tick_rate: None,
            flush_policy: FlushPolicy::default(),
            poll_timeout: Duration::from_millis(50),
            focus_mode: FocusMode::default(),
            focus_indicator: None,
        }
    }
}

/// A handle that stops a running app from another thread.
#[derive(Clone)]
pub struct CancelHandle {
    tx: Sender<()>,
    token: CancelToken,
}

impl CancelHandle {
    /// Stop the app. [`App::run`] returns [`RuntimeError::Cancelled`].
    pub fn cancel(&self) {
        self.token.cancel();
        let _ = self.tx.try_send(());
    }
}

/// Runs a widget tree against a terminal backend.
pub struct App {
    backend: Box<dyn Backend>,
    screen: Option<Screen>,
    pending_root: Option<Box<dyn Widget>>,
    update: Option<UpdateFn>,
    command_handler: Option<CommandHandlerFn>,
    key_router: Option<Box<dyn KeyRouter>>,
    recorder: Option<Box<dyn Recorder>>,
    pending_announcer: Option<Box<dyn Announcer>>,
    observer: Option<Box<dyn RenderObserver>>,
    clipboard: Option<Arc<Mutex<Box<dyn Clipboard>>>>,

    message_tx: Sender<Message>,
    message_rx: Receiver<Message>,
    cancel_tx: Sender<()>,
    cancel_rx: Receiver<()>,
    cancel_token: CancelToken,
    post: PostFn,
    invalidator: Invalidator,
    scheduler: QueueScheduler,
    queue: Arc<Queue>,

    tick_rate: Option<Duration>,
    flush_policy: FlushPolicy,
    poll_timeout: Duration,
    focus_mode: FocusMode,
    focus_indicator: Option<FocusIndicator>,

    running: bool,
    dirty: bool,
    in_render: bool,
}

impl App {
    /// Create an app with default configuration.
    pub fn new(backend: impl Backend + 'static) -> Self {
        Self::with_config(backend, AppConfig::default())
    }

    /// Create an app from explicit configuration.
    pub fn with_config(backend: impl Backend + 'static, config: AppConfig) -> Self {
        let capacity = config.message_buffer.max(1);
        let (message_tx, message_rx) = bounded(capacity);
        let (cancel_tx, cancel_rx) = bounded(1);
        let post: PostFn = {
            let tx = message_tx.clone();
            Arc::new(move |msg| tx.try_send(msg).is_ok())
        };
        let queue = Arc::new(Queue::new());
        Self {
            backend: Box::new(backend),
            screen: None,
            pending_root: None,
            update: None,
            command_handler: None,
            key_router: None,
            recorder: None,
            pending_announcer: None,
            observer: None,
            clipboard: None,
            message_tx,
            message_rx,
            cancel_tx,
            cancel_rx,
            cancel_token: CancelToken::new(),
            invalidator: Invalidator::new(post.clone()),
            scheduler: QueueScheduler::new(queue.clone(), post.clone()),
            post,
            queue,
            tick_rate: config.tick_rate,
            flush_policy: config.flush_policy,
            poll_timeout: config.poll_timeout,
            focus_mode: config.focus_mode,
            focus_indicator: config.focus_indicator,
            running: false,
            dirty: false,
            in_render: false,
        }
    }

    /// Install or replace the root widget.
    pub fn set_root(&mut self, root: Box<dyn Widget>) {
        match self.screen.as_mut() {
            Some(screen) => {
                screen.set_root(root);
                self.dirty = true;
            }
            None => self.pending_root = Some(root),
        }
    }

    /// Replace the message-processing function.
    pub fn set_update(&mut self, update: impl FnMut(&mut App, &Message) -> bool + 'static) {
        self.update = Some(Box::new(update));
    }

    /// Install a handler for commands the runtime does not consume.
    pub fn set_command_handler(&mut self, handler: impl FnMut(Command) -> bool + 'static) {
        self.command_handler = Some(Box::new(handler));
    }

    /// Install a key router that runs before widget dispatch.
    pub fn set_key_router(&mut self, router: impl KeyRouter + 'static) {
        self.key_router = Some(Box::new(router));
    }

    /// Install a frame recorder.
    pub fn set_recorder(&mut self, recorder: impl Recorder + 'static) {
        self.recorder = Some(Box::new(recorder));
    }

    /// Install a sink for focus announcements.
    pub fn set_announcer(&mut self, announcer: impl Announcer + 'static) {
        match self.screen.as_mut() {
            Some(screen) => screen.set_announcer(Box::new(announcer)),
            None => self.pending_announcer = Some(Box::new(announcer)),
        }
    }

    /// Install a per-frame render observer.
    pub fn set_render_observer(&mut self, observer: impl RenderObserver + 'static) {
        self.observer = Some(Box::new(observer));
    }

    /// Install a host clipboard, exposed to widgets through [`Services`].
    pub fn set_clipboard(&mut self, clipboard: impl Clipboard + 'static) {
        self.clipboard = Some(Arc::new(Mutex::new(
            Box::new(clipboard) as Box<dyn Clipboard>
        )));
    }

    /// The active screen, once [`App::run`] has started.
    pub fn screen(&self) -> Option<&Screen> {
        self.screen.as_ref()
    }

    /// Mutable access to the active screen.
    pub fn screen_mut(&mut self) -> Option<&mut Screen> {
        self.screen.as_mut()
    }

    /// A cloneable service handle for widgets and background threads.
    pub fn services(&self) -> Services {
        Services::new(
            self.post.clone(),
            self.invalidator.clone(),
            self.scheduler.clone(),
            self.cancel_token.clone(),
            self.clipboard.clone(),
        )
    }

    /// A handle that stops the loop from another thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: self.cancel_tx.clone(),
            token: self.cancel_token.clone(),
        }
    }

    /// Post a message without blocking.
    ///
    /// Returns false when the queue is full.
    pub fn post(&self, msg: Message) -> bool {
        (self.post)(msg)
    }

    /// Request a render pass from any thread, coalesced.
    pub fn invalidate(&self) {
        self.invalidator.invalidate();
    }

    /// The callback queue drained by the loop per the flush policy.
    pub fn queue(&self) -> &Arc<Queue> {
        &self.queue
    }

    /// Start a background effect.
    pub fn spawn(&self, effect: Effect) {
        self.services().spawn(effect);
    }

    /// Run the event loop until quit or cancellation.
    ///
    /// A graceful quit returns `Ok(())`; external cancellation returns
    /// [`RuntimeError::Cancelled`].
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        self.backend.init().map_err(RuntimeError::Init)?;
        // Once init succeeds the terminal is in raw mode; every exit from
        // here on, error or not, must go through teardown.
        let mut poller = None;
        let result = self.run_loop(&mut poller);
        self.teardown(poller);
        result
    }

    fn run_loop(&mut self, poller: &mut Option<InputPoller>) -> Result<(), RuntimeError> {
        self.backend.hide_cursor().map_err(RuntimeError::Init)?;
        let (width, height) = self.backend.size().map_err(RuntimeError::Init)?;

        let mut screen = Screen::new(width, height);
        screen.set_services(self.services());
        screen.set_focus_mode(self.focus_mode);
        screen.set_focus_indicator(self.focus_indicator);
        if let Some(announcer) = self.pending_announcer.take() {
            screen.set_announcer(announcer);
        }
        if let Some(root) = self.pending_root.take() {
            screen.set_root(root);
        }
        self.screen = Some(screen);

        if let Some(recorder) = self.recorder.as_mut() {
            if let Err(err) = recorder.start(width, height) {
                warn!(%err, "recorder failed to start, disabling");
                self.recorder = None;
            }
        }

        if let Some(source) = self.backend.take_event_source() {
            *poller = Some(
                InputPoller::spawn(source, self.message_tx.clone(), self.poll_timeout)
                    .map_err(RuntimeError::Init)?,
            );
        }

        let ticks = match self.tick_rate {
            Some(rate) if !rate.is_zero() => tick(rate),
            _ => never(),
        };
        let messages = self.message_rx.clone();
        let cancel = self.cancel_rx.clone();

        self.running = true;
        self.dirty = true;
        let mut cancelled = false;
        debug!(width, height, "event loop started");

        while self.running {
            let msg = crossbeam_channel::select! {
                recv(cancel) -> _ => {
                    self.running = false;
                    cancelled = true;
                    continue;
                }
                recv(messages) -> msg => match msg {
                    Ok(msg) => msg,
                    Err(_) => continue,
                },
                recv(ticks) -> at => match at {
                    Ok(now) => Message::Tick(now),
                    Err(_) => continue,
                },
            };

            if self.dispatch(&msg) {
                self.dirty = true;
            }
            if !self.running {
                continue;
            }

            if self.flush_queue_if_needed(&msg) {
                self.dirty = true;
            }
            if matches!(msg, Message::Invalidate) {
                self.invalidator.reset_pending();
            }

            if self.dirty {
                self.render_frame().map_err(RuntimeError::Render)?;
                self.dirty = false;
            }
        }

        if cancelled {
            Err(RuntimeError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn teardown(&mut self, poller: Option<InputPoller>) {
        self.cancel_token.cancel();
        if let Some(poller) = poller {
            poller.join();
        }
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.close();
        }
        self.backend.fini();
        debug!("event loop stopped");
    }

    fn dispatch(&mut self, msg: &Message) -> bool {
        if let Some(mut update) = self.update.take() {
            let dirty = update(self, msg);
            if self.update.is_none() {
                self.update = Some(update);
            }
            dirty
        } else {
            self.default_update(msg)
        }
    }

    /// The standard message routing. Custom update functions delegate here
    /// for anything they do not handle themselves.
    pub fn default_update(&mut self, msg: &Message) -> bool {
        match msg {
            Message::Resize { width, height } => {
                if let Some(screen) = self.screen.as_mut() {
                    screen.resize(*width, *height);
                }
                let mut drop_recorder = false;
                if let Some(recorder) = self.recorder.as_mut() {
                    if let Err(err) = recorder.resize(*width, *height) {
                        warn!(%err, "recorder resize failed, disabling");
                        drop_recorder = true;
                    }
                }
                if drop_recorder {
                    self.recorder = None;
                }
                true
            }
            Message::Key(key) => {
                if let Some(mut router) = self.key_router.take() {
                    let routed = router.route(key);
                    if self.key_router.is_none() {
                        self.key_router = Some(router);
                    }
                    if let Some(commands) = routed {
                        for cmd in commands {
                            self.execute_command(cmd);
                        }
                        // A routed key always counts as handled.
                        return true;
                    }
                }
                self.dispatch_to_screen(msg)
            }
            Message::QueueFlush => false,
            Message::Invalidate => true,
            _ => self.dispatch_to_screen(msg),
        }
    }

    fn dispatch_to_screen(&mut self, msg: &Message) -> bool {
        let result = match self.screen.as_mut() {
            Some(screen) => screen.handle_message(msg),
            None => return false,
        };
        let mut dirty = result.consumed;
        for cmd in result.commands {
            if self.execute_command(cmd) {
                dirty = true;
            }
        }
        dirty
    }

    /// Execute a command as the runtime would. Returns true if a render is
    /// needed.
    pub fn execute_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Quit => {
                self.running = false;
                self.cancel_token.cancel();
                false
            }
            Command::Refresh => {
                if let Some(screen) = self.screen.as_mut() {
                    screen.buffer_mut().mark_all_dirty();
                }
                true
            }
            Command::Send(msg) => {
                self.post(msg);
                false
            }
            Command::Run(effect) => {
                self.spawn(effect);
                false
            }
            cmd @ (Command::FocusNext
            | Command::FocusPrev
            | Command::PushOverlay { .. }
            | Command::PopOverlay) => match self.screen.as_mut() {
                Some(screen) => {
                    screen.execute_commands(vec![cmd]);
                    true
                }
                None => false,
            },
            other => {
                if let Some(mut handler) = self.command_handler.take() {
                    let dirty = handler(other);
                    if self.command_handler.is_none() {
                        self.command_handler = Some(handler);
                    }
                    dirty
                } else {
                    false
                }
            }
        }
    }

    fn flush_queue_if_needed(&mut self, msg: &Message) -> bool {
        if !should_flush(self.flush_policy, msg) {
            return false;
        }
        self.scheduler.reset_pending();
        self.queue.flush() > 0
    }

    fn render_frame(&mut self) -> io::Result<()> {
        debug_assert!(!self.in_render, "render re-entered");
        self.in_render = true;
        let result = self.render_inner();
        self.in_render = false;
        result
    }

    /// Render the screen and flush changed cells to the backend.
    ///
    /// The write strategy is picked per frame: mostly-dirty frames go out
    /// as one rect or full rows, scattered dirt goes out as row spans or
    /// individual cells, whichever the backend supports and the dirty
    /// density justifies.
    fn render_inner(&mut self) -> io::Result<()> {
        let start = Instant::now();
        let Some(screen) = self.screen.as_mut() else {
            return Ok(());
        };
        screen.render();

        let backend = &mut self.backend;
        let buf = screen.buffer();
        if buf.is_dirty() {
            let (width, height) = buf.size();
            let total = buf.len();
            let dirty_count = buf.dirty_count();
            let cells = buf.cells();
            let w = usize::from(width);

            let has_rect = backend.as_rect_writer().is_some();
            let has_row = backend.as_row_writer().is_some();

            if dirty_count > total / 2 {
                if let Some(writer) = backend.as_rect_writer() {
                    writer.write_rect(Rect::from_size(width, height), cells)?;
                } else if let Some(writer) = backend.as_row_writer() {
                    for y in 0..height {
                        let start = usize::from(y) * w;
                        writer.write_row(y, 0, &cells[start..start + w])?;
                    }
                } else {
                    for (idx, cell) in cells.iter().enumerate() {
                        let y = idx / w;
                        let x = idx - y * w;
                        backend.set_content(x as u16, y as u16, cell);
                    }
                }
            } else {
                let rect = buf.dirty_rect();
                let rect_area = rect.area() as usize;
                let use_rect =
                    has_rect && rect.width == width && rect_area > 0 && dirty_count * 2 >= rect_area;
                if use_rect {
                    if let Some(writer) = backend.as_rect_writer() {
                        let start = usize::from(rect.y) * w;
                        writer.write_rect(
                            Rect::new(0, rect.y, width, rect.height),
                            &cells[start..start + rect_area],
                        )?;
                    }
                } else if has_row && rect_area > 0 && dirty_count * 4 >= rect_area {
                    let mut spans = Vec::new();
                    buf.for_each_dirty_span(|y, start_x, end_x| spans.push((y, start_x, end_x)));
                    if let Some(writer) = backend.as_row_writer() {
                        for (y, start_x, end_x) in spans {
                            let row = usize::from(y) * w;
                            writer.write_row(
                                y,
                                start_x,
                                &cells[row + usize::from(start_x)..row + usize::from(end_x)],
                            )?;
                        }
                    }
                } else {
                    buf.for_each_dirty_cell(|x, y, cell| backend.set_content(x, y, &cell));
                }
            }

            let mut drop_recorder = false;
            if let Some(recorder) = self.recorder.as_mut() {
                if let Err(err) = recorder.frame(buf) {
                    warn!(%err, "recorder frame failed, disabling");
                    drop_recorder = true;
                }
            }
            if drop_recorder {
                self.recorder = None;
            }

            let stats = FrameStats {
                dirty: dirty_count,
                total,
                elapsed: start.elapsed(),
            };
            if let Some(observer) = self.observer.as_mut() {
                observer.frame(&stats);
            }
            trace!(
                dirty = stats.dirty,
                total = stats.total,
                elapsed_us = stats.elapsed.as_micros() as u64,
                "frame flushed"
            );
            screen.buffer_mut().clear_dirty();
        }

        self.backend.show()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::screen::RenderContext;
    use crate::widget::HandleResult;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Instant;

    struct Stop;
    struct SetFill(char);

    /// Fills its bounds with a character; quits on `Stop`, restyles on
    /// `SetFill`. Focusable when given a label.
    struct Harness {
        fill: char,
        bounds: Option<Rect>,
        label: Option<&'static str>,
    }

    impl Harness {
        fn new(fill: char) -> Self {
            Self {
                fill,
                bounds: None,
                label: None,
            }
        }
    }

    impl Widget for Harness {
        fn layout(&mut self, bounds: Rect) {
            self.bounds = Some(bounds);
        }
        fn bounds(&self) -> Option<Rect> {
            self.bounds
        }
        fn render(&self, ctx: &mut RenderContext<'_>) {
            let bounds = ctx.bounds;
            ctx.buffer()
                .fill(bounds, self.fill, crate::buffer::Style::DEFAULT);
        }
        fn handle_message(&mut self, msg: &Message) -> HandleResult {
            if msg.downcast_user::<Stop>().is_some() {
                return HandleResult::with_commands(vec![Command::Quit]);
            }
            if let Some(SetFill(ch)) = msg.downcast_user::<SetFill>() {
                self.fill = *ch;
                return HandleResult::consumed();
            }
            HandleResult::ignored()
        }
        fn can_focus(&self) -> bool {
            self.label.is_some()
        }
        fn accessible_label(&self) -> Option<String> {
            self.label.map(str::to_string)
        }
    }

    #[test]
    fn test_quit_command_stops_loop() {
        let backend = MemoryBackend::new(10, 4);
        let view = backend.clone();
        let mut app = App::new(backend);
        app.set_root(Box::new(Harness::new('.')));
        app.post(Message::user(Stop));

        app.run().unwrap();
        assert!(!view.is_initialized());
    }

    #[test]
    fn test_cancel_returns_cancelled() {
        let backend = MemoryBackend::new(10, 4);
        let view = backend.clone();
        let mut app = App::new(backend);
        app.set_root(Box::new(Harness::new('.')));
        app.cancel_handle().cancel();

        let err = app.run().unwrap_err();
        assert!(matches!(err, RuntimeError::Cancelled));
        assert!(!view.is_initialized());
    }

    #[test]
    fn test_setup_failure_still_restores_terminal() {
        use crate::backend::EventSource;
        use crate::buffer::Cell;

        /// Initializes fine, then fails on the first cursor call.
        struct FlakyBackend {
            fini_called: Arc<AtomicBool>,
        }
        impl Backend for FlakyBackend {
            fn init(&mut self) -> io::Result<()> {
                Ok(())
            }
            fn fini(&mut self) {
                self.fini_called.store(true, Ordering::SeqCst);
            }
            fn size(&self) -> io::Result<(u16, u16)> {
                Ok((10, 4))
            }
            fn hide_cursor(&mut self) -> io::Result<()> {
                Err(io::Error::new(io::ErrorKind::Other, "tty gone"))
            }
            fn set_content(&mut self, _x: u16, _y: u16, _cell: &Cell) {}
            fn show(&mut self) -> io::Result<()> {
                Ok(())
            }
            fn take_event_source(&mut self) -> Option<Box<dyn EventSource>> {
                None
            }
        }

        let fini_called = Arc::new(AtomicBool::new(false));
        let mut app = App::new(FlakyBackend {
            fini_called: fini_called.clone(),
        });
        app.set_root(Box::new(Harness::new('.')));

        let err = app.run().unwrap_err();
        assert!(matches!(err, RuntimeError::Init(_)));
        // Setup failed after init succeeded, so the backend must still be
        // torn down.
        assert!(fini_called.load(Ordering::SeqCst));
    }

    #[test]
    fn test_render_flushes_to_backend() {
        let backend = MemoryBackend::new(6, 2);
        let view = backend.clone();
        let mut app = App::new(backend);
        app.set_root(Box::new(Harness::new('x')));
        app.post(Message::Invalidate);
        app.post(Message::user(Stop));

        app.run().unwrap();
        assert_eq!(view.row_string(0), "xxxxxx");
        assert_eq!(view.row_string(1), "xxxxxx");
        assert!(view.show_count() >= 1);
    }

    #[test]
    fn test_full_redraw_prefers_rect_writer() {
        let backend = MemoryBackend::new(8, 4).with_rect_writer().with_row_writer();
        let view = backend.clone();
        let mut app = App::new(backend);
        app.set_root(Box::new(Harness::new('#')));
        app.post(Message::Invalidate);
        app.post(Message::user(Stop));

        app.run().unwrap();
        // First frame is fully dirty: one rect write, no per-cell writes.
        assert_eq!(view.rect_write_count(), 1);
        assert_eq!(view.cell_write_count(), 0);
        assert_eq!(view.row_string(0), "########");
    }

    #[test]
    fn test_incremental_frame_writes_only_changes() {
        let backend = MemoryBackend::new(10, 4);
        let view = backend.clone();
        let mut app = App::new(backend);
        app.set_root(Box::new(Harness::new('a')));
        app.post(Message::Invalidate);
        app.post(Message::user(SetFill('b')));
        app.post(Message::user(Stop));

        app.run().unwrap();
        // Frame one writes all 40 cells, frame two rewrites all 40 again
        // (every cell changed), and nothing else.
        assert_eq!(view.cell_write_count(), 80);
        assert_eq!(view.row_string(0), "bbbbbbbbbb");
    }

    #[test]
    fn test_flush_paths_converge_on_same_content() {
        struct Marks(Vec<(u16, u16)>);

        /// Fills with dots, then overlays `#` at the marked cells.
        struct Scatter {
            marks: Vec<(u16, u16)>,
            bounds: Option<Rect>,
        }
        impl Widget for Scatter {
            fn layout(&mut self, bounds: Rect) {
                self.bounds = Some(bounds);
            }
            fn bounds(&self) -> Option<Rect> {
                self.bounds
            }
            fn render(&self, ctx: &mut RenderContext<'_>) {
                let bounds = ctx.bounds;
                ctx.buffer().fill(bounds, '.', crate::buffer::Style::DEFAULT);
                for &(x, y) in &self.marks {
                    ctx.buffer().set(x, y, crate::buffer::Cell::new('#'));
                }
            }
            fn handle_message(&mut self, msg: &Message) -> HandleResult {
                if msg.downcast_user::<Stop>().is_some() {
                    return HandleResult::with_commands(vec![Command::Quit]);
                }
                if let Some(Marks(marks)) = msg.downcast_user::<Marks>() {
                    self.marks = marks.clone();
                    return HandleResult::consumed();
                }
                HandleResult::ignored()
            }
        }

        // A 3x3 block strictly inside a 10x6 screen: the second frame is
        // sparse enough to avoid the full-redraw path, and its bounding
        // rect is narrower than the screen, so rect-capable backends fall
        // through to spans or cells.
        let marks: Vec<(u16, u16)> = (1..=3)
            .flat_map(|y| (2..=4).map(move |x| (x, y)))
            .collect();
        // What a full redraw of the final state would show.
        let expected: Vec<String> = (0..6u16)
            .map(|y| {
                (0..10u16)
                    .map(|x| if marks.contains(&(x, y)) { '#' } else { '.' })
                    .collect()
            })
            .collect();

        let backends = [
            ("cells", MemoryBackend::new(10, 6)),
            ("rows", MemoryBackend::new(10, 6).with_row_writer()),
            ("rect", MemoryBackend::new(10, 6).with_rect_writer()),
            (
                "both",
                MemoryBackend::new(10, 6).with_row_writer().with_rect_writer(),
            ),
        ];
        for (name, backend) in backends {
            let view = backend.clone();
            let mut app = App::new(backend);
            app.set_root(Box::new(Scatter {
                marks: Vec::new(),
                bounds: None,
            }));
            app.post(Message::Invalidate);
            app.post(Message::user(Marks(marks.clone())));
            app.post(Message::user(Stop));

            app.run().unwrap();
            for (y, row) in expected.iter().enumerate() {
                assert_eq!(&view.row_string(y as u16), row, "{name} backend, row {y}");
            }
            if name == "rows" {
                // Six full rows for the first frame, then one span per
                // marked row.
                assert_eq!(view.row_write_count(), 9);
                assert_eq!(view.cell_write_count(), 0);
            }
        }
    }

    #[test]
    fn test_unchanged_frame_flushes_nothing() {
        let backend = MemoryBackend::new(10, 4);
        let view = backend.clone();
        let mut app = App::new(backend);
        app.set_root(Box::new(Harness::new('a')));
        app.post(Message::Invalidate);
        // Re-renders the same content: compare-before-write keeps the
        // buffer clean, so no cells reach the backend.
        app.post(Message::Invalidate);
        app.post(Message::user(Stop));

        app.run().unwrap();
        assert_eq!(view.cell_write_count(), 40);
    }

    #[test]
    fn test_resize_message_resizes_screen() {
        let backend = MemoryBackend::new(10, 4);
        let mut app = App::new(backend);
        app.set_root(Box::new(Harness::new('.')));
        app.post(Message::Resize {
            width: 20,
            height: 8,
        });
        app.post(Message::user(Stop));

        app.run().unwrap();
        let screen = app.screen().unwrap();
        assert_eq!(screen.size(), (20, 8));
        assert_eq!(
            screen.top_layer().unwrap().root().bounds(),
            Some(Rect::from_size(20, 8))
        );
    }

    #[test]
    fn test_queue_flush_message_drains_queue() {
        let backend = MemoryBackend::new(4, 2);
        let mut app = App::with_config(
            backend,
            AppConfig {
                flush_policy: FlushPolicy::Manual,
                ..AppConfig::default()
            },
        );
        app.set_root(Box::new(Harness::new('.')));
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        app.queue().schedule(move || flag.store(true, Ordering::SeqCst));
        app.post(Message::QueueFlush);
        app.post(Message::user(Stop));

        app.run().unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_manual_policy_skips_other_messages() {
        let backend = MemoryBackend::new(4, 2);
        let mut app = App::with_config(
            backend,
            AppConfig {
                flush_policy: FlushPolicy::Manual,
                ..AppConfig::default()
            },
        );
        app.set_root(Box::new(Harness::new('.')));
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        app.queue().schedule(move || flag.store(true, Ordering::SeqCst));
        app.post(Message::Invalidate);
        app.post(Message::user(Stop));

        app.run().unwrap();
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_update_override_sees_every_message() {
        let backend = MemoryBackend::new(4, 2);
        let mut app = App::new(backend);
        app.set_root(Box::new(Harness::new('.')));
        let ticks = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen = ticks.clone();
        app.set_update(move |app, msg| {
            if msg.is_tick() {
                seen.fetch_add(1, Ordering::SeqCst);
            }
            app.default_update(msg)
        });
        app.post(Message::Tick(Instant::now()));
        app.post(Message::user(Stop));

        app.run().unwrap();
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_command_handler_receives_submit() {
        struct Submitter;
        impl Widget for Submitter {
            fn layout(&mut self, _bounds: Rect) {}
            fn render(&self, _ctx: &mut RenderContext<'_>) {}
            fn handle_message(&mut self, msg: &Message) -> HandleResult {
                if msg.downcast_user::<Stop>().is_some() {
                    return HandleResult::with_commands(vec![
                        Command::Submit("hello".to_string()),
                        Command::Quit,
                    ]);
                }
                HandleResult::ignored()
            }
        }

        let backend = MemoryBackend::new(4, 2);
        let mut app = App::new(backend);
        app.set_root(Box::new(Submitter));
        let submitted = Arc::new(std::sync::Mutex::new(String::new()));
        let sink = submitted.clone();
        app.set_command_handler(move |cmd| {
            if let Command::Submit(text) = cmd {
                *sink.lock().unwrap() = text;
            }
            false
        });
        app.post(Message::user(Stop));

        app.run().unwrap();
        assert_eq!(*submitted.lock().unwrap(), "hello");
    }

    #[test]
    fn test_key_router_intercepts_before_widgets() {
        use crate::backend::{KeyCode, KeyEvent};

        struct QuitOnCtrlC;
        impl KeyRouter for QuitOnCtrlC {
            fn route(&mut self, key: &KeyEvent) -> Option<Vec<Command>> {
                if key.modifiers.control && key.code == KeyCode::Char('c') {
                    Some(vec![Command::Quit])
                } else {
                    None
                }
            }
        }

        let backend = MemoryBackend::new(4, 2);
        let view = backend.clone();
        let mut app = App::new(backend);
        app.set_root(Box::new(Harness::new('.')));
        app.set_key_router(QuitOnCtrlC);
        app.post(Message::Key(KeyEvent::ctrl(KeyCode::Char('c'))));

        app.run().unwrap();
        assert!(!view.is_initialized());
    }

    #[test]
    fn test_recorder_failure_disables_recording() {
        struct FailingRecorder {
            frames: Arc<std::sync::atomic::AtomicUsize>,
        }
        impl Recorder for FailingRecorder {
            fn start(&mut self, _w: u16, _h: u16) -> io::Result<()> {
                Ok(())
            }
            fn frame(&mut self, _buffer: &Buffer) -> io::Result<()> {
                self.frames.fetch_add(1, Ordering::SeqCst);
                Err(io::Error::new(io::ErrorKind::Other, "disk full"))
            }
            fn resize(&mut self, _w: u16, _h: u16) -> io::Result<()> {
                Ok(())
            }
        }

        let frames = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let backend = MemoryBackend::new(4, 2);
        let mut app = App::new(backend);
        app.set_root(Box::new(Harness::new('a')));
        app.set_recorder(FailingRecorder {
            frames: frames.clone(),
        });
        app.post(Message::Invalidate);
        app.post(Message::user(SetFill('b')));
        app.post(Message::user(Stop));

        app.run().unwrap();
        // The first frame fails and drops the recorder; the second frame
        // renders without it.
        assert_eq!(frames.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_render_observer_sees_frame_stats() {
        struct Observer(Arc<std::sync::Mutex<Vec<(usize, usize)>>>);
        impl RenderObserver for Observer {
            fn frame(&mut self, stats: &FrameStats) {
                self.0.lock().unwrap().push((stats.dirty, stats.total));
            }
        }

        let backend = MemoryBackend::new(6, 2);
        let mut app = App::new(backend);
        app.set_root(Box::new(Harness::new('x')));
        let frames = Arc::new(std::sync::Mutex::new(Vec::new()));
        app.set_render_observer(Observer(frames.clone()));
        app.post(Message::Invalidate);
        app.post(Message::user(Stop));

        app.run().unwrap();
        // One flushed frame: all 12 cells changed.
        assert_eq!(frames.lock().unwrap().as_slice(), &[(12, 12)]);
    }

    #[test]
    fn test_announcer_installed_before_run() {
        struct VecAnnouncer(Arc<std::sync::Mutex<Vec<String>>>);
        impl crate::screen::Announcer for VecAnnouncer {
            fn announce(&mut self, label: &str) {
                self.0.lock().unwrap().push(label.to_string());
            }
        }

        let backend = MemoryBackend::new(6, 2);
        let mut app = App::new(backend);
        let mut root = Harness::new('.');
        root.label = Some("name field");
        app.set_root(Box::new(root));
        let announced = Arc::new(std::sync::Mutex::new(Vec::new()));
        app.set_announcer(VecAnnouncer(announced.clone()));
        app.post(Message::user(Stop));

        app.run().unwrap();
        assert_eq!(
            announced.lock().unwrap().as_slice(),
            &["name field".to_string()]
        );
    }

    #[test]
    fn test_effect_posts_back_into_loop() {
        let backend = MemoryBackend::new(4, 2);
        let mut app = App::new(backend);
        app.set_root(Box::new(Harness::new('.')));
        app.spawn(super::super::effect::after(
            Duration::from_millis(10),
            Message::user(Stop),
        ));

        app.run().unwrap();
    }
}
