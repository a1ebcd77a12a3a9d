//! Focus traversal within a layer.
//!
//! Each layer carries its own focus scope, so dismissing an overlay
//! restores whatever was focused underneath. The scope stores child-index
//! paths, not references; every operation takes the layer root and
//! resolves paths through it.

use crate::widget::{resolve_path_mut, Widget, WidgetPath};
use tracing::debug;

/// How a focus scope learns about focusable widgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusMode {
    /// Scan the widget tree after structural changes.
    #[default]
    Automatic,
    /// Only paths registered through [`crate::screen::Screen::register_focusable`].
    Manual,
}

/// The ordered set of focusable widgets in one layer.
#[derive(Debug, Default)]
pub struct FocusScope {
    entries: Vec<WidgetPath>,
    current: Option<usize>,
}

impl FocusScope {
    /// Create an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rescan the tree for focusable widgets, in depth-first order.
    ///
    /// Keeps the current focus if its path still resolves to a focusable
    /// entry; otherwise focus is cleared.
    pub fn rebuild(&mut self, root: &mut dyn Widget) {
        let current_path = self.current.and_then(|i| self.entries.get(i)).cloned();

        self.entries.clear();
        let mut path = Vec::new();
        collect_focusables(root, &mut path, &mut self.entries);

        self.current = current_path
            .as_ref()
            .and_then(|p| self.entries.iter().position(|e| e == p));
        if current_path.is_some() && self.current.is_none() {
            // The focused widget is gone; nothing left to blur through.
            debug!("focused widget disappeared during rebuild");
        }
    }

    /// Number of focusable widgets.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the scope has no focusable widgets.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Path of the currently focused widget.
    pub fn current_path(&self) -> Option<&WidgetPath> {
        self.current.and_then(|i| self.entries.get(i))
    }

    /// Record a focusable widget without scanning the tree.
    ///
    /// Used under [`FocusMode::Manual`]; widgets are traversed in
    /// registration order. Re-registering a path is a no-op.
    pub fn register(&mut self, path: WidgetPath) {
        if !self.entries.contains(&path) {
            self.entries.push(path);
        }
    }

    /// Focus the first widget if nothing is focused yet.
    ///
    /// Returns the newly focused widget's accessible label, if any focus
    /// change happened.
    pub fn ensure_focus(&mut self, root: &mut dyn Widget) -> Option<String> {
        if self.current.is_none() && !self.entries.is_empty() {
            self.focus_index(root, 0)
        } else {
            None
        }
    }

    /// Advance focus to the next widget, wrapping around.
    ///
    /// Returns the newly focused widget's accessible label, if any.
    pub fn focus_next(&mut self, root: &mut dyn Widget) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }
        let next = self.current.map_or(0, |i| (i + 1) % self.entries.len());
        self.focus_index(root, next)
    }

    /// Move focus to the previous widget, wrapping around.
    ///
    /// Returns the newly focused widget's accessible label, if any.
    pub fn focus_prev(&mut self, root: &mut dyn Widget) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }
        let len = self.entries.len();
        let prev = self.current.map_or(len - 1, |i| (i + len - 1) % len);
        self.focus_index(root, prev)
    }

    /// Blur the current widget and forget it.
    pub fn clear_focus(&mut self, root: &mut dyn Widget) {
        if let Some(path) = self.current_path().cloned() {
            if let Some(widget) = resolve_path_mut(root, &path) {
                widget.blur();
            }
        }
        self.current = None;
    }

    fn focus_index(&mut self, root: &mut dyn Widget, index: usize) -> Option<String> {
        if self.current == Some(index) {
            return None;
        }
        if let Some(path) = self.current_path().cloned() {
            if let Some(widget) = resolve_path_mut(root, &path) {
                widget.blur();
            }
        }
        self.current = Some(index);
        let mut label = None;
        if let Some(path) = self.entries.get(index).cloned() {
            if let Some(widget) = resolve_path_mut(root, &path) {
                widget.focus();
                label = widget.accessible_label();
                if let Some(label) = label.as_deref() {
                    debug!(%label, "focus changed");
                }
            }
        }
        label
    }
}

fn collect_focusables(widget: &dyn Widget, path: &mut WidgetPath, out: &mut Vec<WidgetPath>) {
    if widget.can_focus() {
        out.push(path.clone());
    }
    for i in 0..widget.child_count() {
        if let Some(child) = widget.child_at(i) {
            path.push(i);
            collect_focusables(child, path, out);
            path.pop();
        }
    }
}
