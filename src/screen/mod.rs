//! Layered screen: widget trees, focus, and hit testing over one buffer.
//!
//! The screen owns a stack of layers. The base layer is the application
//! root; overlays (dialogs, palettes) push on top and pop off. All layers
//! render bottom-to-top into the same buffer, input routes top-down, and a
//! modal layer blocks input from reaching anything below it.

mod focus;
mod hit;

pub use focus::{FocusMode, FocusScope};
pub use hit::{HitGrid, HitRegion};

use crate::buffer::{Buffer, Cell, Style, SubBuffer};
use crate::layout::Rect;
use crate::runtime::{Command, Message, Services};
use crate::widget::{
    bind_tree, mount_tree, resolve_path, resolve_path_mut, unbind_tree, unmount_tree,
    HandleResult, Widget, WidgetPath,
};
use tracing::trace;

/// Sink for assistive focus announcements.
///
/// Installed with [`Screen::set_announcer`]; receives the accessible
/// label of each newly focused widget.
pub trait Announcer {
    /// Announce a newly focused widget.
    fn announce(&mut self, label: &str);
}

/// Visual marker drawn in the cell left of the focused widget's bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusIndicator {
    /// The marker glyph.
    pub glyph: char,
    /// Style of the marker cell.
    pub style: Style,
}

impl Default for FocusIndicator {
    fn default() -> Self {
        Self {
            glyph: '▸',
            style: Style::DEFAULT,
        }
    }
}

/// Context handed to widgets while rendering.
pub struct RenderContext<'a> {
    buffer: &'a mut Buffer,
    /// The widget's allocated bounds.
    pub bounds: Rect,
    /// Whether the containing layer is the top (focused) layer.
    pub focused: bool,
}

impl RenderContext<'_> {
    /// The screen buffer.
    pub fn buffer(&mut self) -> &mut Buffer {
        self.buffer
    }

    /// A context for a child widget with different bounds.
    pub fn sub(&mut self, bounds: Rect) -> RenderContext<'_> {
        RenderContext {
            buffer: self.buffer,
            bounds,
            focused: self.focused,
        }
    }

    /// A buffer view clipped to this context's bounds.
    pub fn sub_buffer(&mut self) -> SubBuffer<'_> {
        self.buffer.sub(self.bounds)
    }

    /// Fill the bounds with spaces in the given style.
    pub fn clear(&mut self, style: Style) {
        self.buffer.fill(self.bounds, ' ', style);
    }
}

/// A layer in the modal stack: one widget tree with its own focus scope.
pub struct Layer {
    root: Box<dyn Widget>,
    focus: FocusScope,
    modal: bool,
}

impl Layer {
    /// Whether this layer blocks input to layers below.
    pub fn is_modal(&self) -> bool {
        self.modal
    }

    /// The layer's root widget.
    pub fn root(&self) -> &dyn Widget {
        self.root.as_ref()
    }

    /// The layer's focus scope.
    pub fn focus_scope(&self) -> &FocusScope {
        &self.focus
    }
}

/// Widget trees, modal stack, focus, and hit testing over one buffer.
pub struct Screen {
    width: u16,
    height: u16,
    buffer: Buffer,
    layers: Vec<Layer>,
    hit_grid: HitGrid,
    hit_grid_dirty: bool,
    hit_grid_modal: bool,
    services: Services,
    announcer: Option<Box<dyn Announcer>>,
    focus_indicator: Option<FocusIndicator>,
    focus_mode: FocusMode,
}

impl Screen {
    /// Create a screen with the given dimensions and no layers.
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            buffer: Buffer::new(width, height),
            layers: Vec::new(),
            hit_grid: HitGrid::new(width, height),
            hit_grid_dirty: true,
            hit_grid_modal: false,
            services: Services::detached(),
            announcer: None,
            focus_indicator: None,
            focus_mode: FocusMode::default(),
        }
    }

    /// Wire app services for bindable widgets.
    pub fn set_services(&mut self, services: Services) {
        self.services = services;
    }

    /// Install a sink for focus announcements.
    pub fn set_announcer(&mut self, announcer: Box<dyn Announcer>) {
        self.announcer = Some(announcer);
    }

    /// Set or clear the focus indicator drawn next to the focused widget.
    pub fn set_focus_indicator(&mut self, indicator: Option<FocusIndicator>) {
        self.focus_indicator = indicator;
    }

    /// Choose how focus scopes learn about focusable widgets.
    pub fn set_focus_mode(&mut self, mode: FocusMode) {
        self.focus_mode = mode;
    }

    /// Record a focusable widget on the top layer.
    ///
    /// Only needed under [`FocusMode::Manual`]; automatic mode rescans the
    /// tree itself. The first registered widget receives focus.
    pub fn register_focusable(&mut self, path: WidgetPath) {
        let label = match self.layers.last_mut() {
            Some(layer) => {
                layer.focus.register(path);
                layer.focus.ensure_focus(layer.root.as_mut())
            }
            None => None,
        };
        self.announce(label);
    }

    fn announce(&mut self, label: Option<String>) {
        if let (Some(announcer), Some(label)) = (self.announcer.as_mut(), label) {
            announcer.announce(&label);
        }
    }

    /// Screen dimensions.
    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    /// The render buffer.
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// Mutable access to the render buffer.
    pub fn buffer_mut(&mut self) -> &mut Buffer {
        &mut self.buffer
    }

    /// Number of layers on the stack.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// The topmost layer.
    pub fn top_layer(&self) -> Option<&Layer> {
        self.layers.last()
    }

    /// Change the screen dimensions and re-layout every layer.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.buffer.resize(width, height);
        self.hit_grid.resize(width, height);
        self.hit_grid_dirty = true;

        let bounds = Rect::from_size(width, height);
        let rescan = self.focus_mode == FocusMode::Automatic;
        for layer in &mut self.layers {
            layer.root.layout(bounds);
            if rescan {
                layer.focus.rebuild(layer.root.as_mut());
            }
        }
    }

    /// Install the root widget of the base layer, replacing any previous
    /// root. The old tree is unmounted and unbound first; the new tree is
    /// bound, laid out, and mounted, and focus lands on its first
    /// focusable widget.
    pub fn set_root(&mut self, root: Box<dyn Widget>) {
        if self.layers.is_empty() {
            self.layers.push(Layer {
                root,
                focus: FocusScope::new(),
                modal: false,
            });
        } else {
            let mut old = std::mem::replace(&mut self.layers[0].root, root);
            unmount_tree(old.as_mut());
            unbind_tree(old.as_mut());
        }
        self.hit_grid_dirty = true;

        let bounds = Rect::from_size(self.width, self.height);
        let rescan = self.focus_mode == FocusMode::Automatic;
        let layer = &mut self.layers[0];
        bind_tree(layer.root.as_mut(), &self.services);
        layer.root.layout(bounds);
        mount_tree(layer.root.as_mut());
        if rescan {
            layer.focus.rebuild(layer.root.as_mut());
        }
        let label = layer.focus.ensure_focus(layer.root.as_mut());
        self.announce(label);
    }

    /// Push an overlay layer on top of the stack.
    pub fn push_layer(&mut self, root: Box<dyn Widget>, modal: bool) {
        let mut layer = Layer {
            root,
            focus: FocusScope::new(),
            modal,
        };
        bind_tree(layer.root.as_mut(), &self.services);
        layer.root.layout(Rect::from_size(self.width, self.height));
        mount_tree(layer.root.as_mut());
        if self.focus_mode == FocusMode::Automatic {
            layer.focus.rebuild(layer.root.as_mut());
        }
        let label = layer.focus.ensure_focus(layer.root.as_mut());
        self.layers.push(layer);
        self.hit_grid_dirty = true;
        self.announce(label);
    }

    /// Pop the top overlay.
    ///
    /// Returns false when only the base layer remains; the base layer is
    /// never popped.
    pub fn pop_layer(&mut self) -> bool {
        if self.layers.len() <= 1 {
            return false;
        }
        let mut top = match self.layers.pop() {
            Some(layer) => layer,
            None => return false,
        };
        top.focus.clear_focus(top.root.as_mut());
        unmount_tree(top.root.as_mut());
        unbind_tree(top.root.as_mut());
        self.hit_grid_dirty = true;
        true
    }

    /// Render every layer bottom-to-top into the buffer, then rebuild the
    /// hit grid if the layer stack changed.
    pub fn render(&mut self) {
        let bounds = Rect::from_size(self.width, self.height);
        let top = self.layers.len().saturating_sub(1);
        for (i, layer) in self.layers.iter().enumerate() {
            render_widget(layer.root.as_ref(), &mut self.buffer, bounds, i == top);
        }
        self.draw_focus_indicator();
        if self.hit_grid_dirty {
            self.build_hit_grid();
        }
    }

    /// Overlay the focus indicator glyph in the cell left of the focused
    /// widget on the top layer. Skipped when the widget sits at column 0.
    fn draw_focus_indicator(&mut self) {
        let Some(indicator) = self.focus_indicator else {
            return;
        };
        let Some(layer) = self.layers.last() else {
            return;
        };
        let Some(path) = layer.focus.current_path() else {
            return;
        };
        let Some(bounds) = resolve_path(layer.root.as_ref(), path).and_then(Widget::bounds)
        else {
            return;
        };
        if bounds.x > 0 && !bounds.is_empty() {
            self.buffer.set(
                bounds.x - 1,
                bounds.y,
                Cell::styled(indicator.glyph, indicator.style),
            );
        }
    }

    /// Route a message through the layer stack.
    ///
    /// Mouse messages go to the widget under the pointer. Everything else
    /// goes to the top layer (focused widget first, then the layer root)
    /// and bubbles down while unconsumed, stopping at a modal layer.
    /// Focus and overlay commands are executed here; any others are
    /// returned for the app to handle.
    pub fn handle_message(&mut self, msg: &Message) -> HandleResult {
        let mut bubbled = Vec::new();

        if let Message::Mouse(mouse) = msg {
            if self.hit_grid_dirty {
                self.build_hit_grid();
            }
            if let Some(region) = self.hit_grid.region_at(mouse.x, mouse.y).cloned() {
                trace!(layer = region.layer, path = ?region.path, "mouse hit");
                let mut result = HandleResult::ignored();
                if let Some(layer) = self.layers.get_mut(region.layer) {
                    if let Some(widget) = resolve_path_mut(layer.root.as_mut(), &region.path) {
                        result = widget.handle_message(msg);
                    }
                }
                bubbled.extend(self.execute_commands(result.commands));
                if result.consumed || self.hit_grid_modal {
                    return HandleResult {
                        consumed: result.consumed,
                        commands: bubbled,
                    };
                }
            } else if self.hit_grid_modal {
                return HandleResult::ignored();
            }
        }
        let mut i = self.layers.len();
        while i > 0 {
            i -= 1;
            // Commands may have pushed or popped layers.
            if i >= self.layers.len() {
                continue;
            }
            let (result, modal) = {
                let layer = &mut self.layers[i];
                let result = deliver_to_layer(layer, msg);
                (result, layer.modal)
            };
            bubbled.extend(self.execute_commands(result.commands));
            if result.consumed {
                return HandleResult {
                    consumed: true,
                    commands: bubbled,
                };
            }
            if modal {
                break;
            }
        }

        HandleResult {
            consumed: false,
            commands: bubbled,
        }
    }

    /// Execute the screen-level commands in `commands`; return the rest.
    pub(crate) fn execute_commands(&mut self, commands: Vec<Command>) -> Vec<Command> {
        let mut bubbled = Vec::new();
        for cmd in commands {
            match cmd {
                Command::FocusNext => {
                    let label = self
                        .layers
                        .last_mut()
                        .and_then(|layer| layer.focus.focus_next(layer.root.as_mut()));
                    self.announce(label);
                }
                Command::FocusPrev => {
                    let label = self
                        .layers
                        .last_mut()
                        .and_then(|layer| layer.focus.focus_prev(layer.root.as_mut()));
                    self.announce(label);
                }
                Command::PushOverlay { root, modal } => self.push_layer(root, modal),
                Command::PopOverlay => {
                    self.pop_layer();
                }
                other => bubbled.push(other),
            }
        }
        bubbled
    }

    fn build_hit_grid(&mut self) {
        self.hit_grid.resize(self.width, self.height);
        self.hit_grid_dirty = false;
        self.hit_grid_modal = self.layers.last().is_some_and(|l| l.modal);

        let start = if self.hit_grid_modal {
            self.layers.len() - 1
        } else {
            0
        };
        for (offset, layer) in self.layers[start..].iter().enumerate() {
            let mut path = Vec::new();
            add_hit_widgets(
                layer.root.as_ref(),
                start + offset,
                &mut path,
                &mut self.hit_grid,
            );
        }
    }
}

fn deliver_to_layer(layer: &mut Layer, msg: &Message) -> HandleResult {
    // Focused widget first, then the layer root.
    if let Some(path) = layer.focus.current_path().cloned() {
        if !path.is_empty() {
            if let Some(widget) = resolve_path_mut(layer.root.as_mut(), &path) {
                let result = widget.handle_message(msg);
                if result.consumed || !result.commands.is_empty() {
                    return result;
                }
            }
        }
    }
    layer.root.handle_message(msg)
}

fn render_widget(widget: &dyn Widget, buffer: &mut Buffer, inherited: Rect, focused: bool) {
    let bounds = widget.bounds().unwrap_or(inherited);
    let mut ctx = RenderContext {
        buffer,
        bounds,
        focused,
    };
    widget.render(&mut ctx);
    for i in 0..widget.child_count() {
        if let Some(child) = widget.child_at(i) {
            render_widget(child, buffer, bounds, focused);
        }
    }
}

fn add_hit_widgets(widget: &dyn Widget, layer: usize, path: &mut Vec<usize>, grid: &mut HitGrid) {
    let child_count = widget.child_count();
    if child_count > 0 {
        for i in 0..child_count {
            if let Some(child) = widget.child_at(i) {
                path.push(i);
                add_hit_widgets(child, layer, path, grid);
                path.pop();
            }
        }
        return;
    }
    if let Some(bounds) = widget.bounds() {
        grid.add(layer, path.clone(), bounds);
    }
}
