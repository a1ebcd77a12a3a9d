//! Widget trait and tree plumbing.
//!
//! A widget is a node in a single-owner tree: each widget owns its children
//! and exposes them through [`Widget::child_count`] and [`Widget::child_at`].
//! Everything beyond rendering is an opt-in capability with a no-op default,
//! so a plain label implements two methods and a focusable input implements
//! a few more.

mod lifecycle;

pub use lifecycle::{bind_tree, mount_tree, unbind_tree, unmount_tree};

use crate::layout::Rect;
use crate::runtime::{Command, Message, Services};
use crate::screen::RenderContext;

/// Layout constraints passed to [`Widget::measure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constraints {
    /// Maximum width available, in columns.
    pub max_width: u16,
    /// Maximum height available, in rows.
    pub max_height: u16,
}

impl Constraints {
    /// Constraints that allow exactly the given area.
    pub const fn tight(width: u16, height: u16) -> Self {
        Self {
            max_width: width,
            max_height: height,
        }
    }
}

/// A measured size, in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    /// Width in columns.
    pub width: u16,
    /// Height in rows.
    pub height: u16,
}

/// Outcome of delivering a message to a widget.
#[derive(Debug, Default)]
pub struct HandleResult {
    /// Whether the widget consumed the message (stops propagation).
    pub consumed: bool,
    /// Commands the widget wants the runtime to execute.
    pub commands: Vec<Command>,
}

impl HandleResult {
    /// The message was not handled.
    pub fn ignored() -> Self {
        Self::default()
    }

    /// The message was handled, with nothing else to do.
    pub fn consumed() -> Self {
        Self {
            consumed: true,
            commands: Vec::new(),
        }
    }

    /// The message was handled and produced commands.
    pub fn with_commands(commands: Vec<Command>) -> Self {
        Self {
            consumed: true,
            commands,
        }
    }
}

/// A node in the widget tree.
///
/// Default implementations make every capability optional: a widget that
/// never receives input or focus only implements [`Widget::layout`],
/// [`Widget::bounds`], and [`Widget::render`].
pub trait Widget {
    /// Report the preferred size under the given constraints.
    fn measure(&self, constraints: Constraints) -> Size {
        Size {
            width: constraints.max_width,
            height: constraints.max_height,
        }
    }

    /// Assign screen-space bounds to this widget and lay out children.
    fn layout(&mut self, bounds: Rect);

    /// The screen-space bounds assigned by the last layout pass.
    ///
    /// `None` means the widget has not been laid out and is skipped by
    /// hit testing.
    fn bounds(&self) -> Option<Rect> {
        None
    }

    /// Draw this widget. Children are rendered by the tree walk, not here.
    fn render(&self, ctx: &mut RenderContext<'_>);

    /// React to a message routed to this widget.
    fn handle_message(&mut self, _message: &Message) -> HandleResult {
        HandleResult::ignored()
    }

    /// Number of direct children.
    fn child_count(&self) -> usize {
        0
    }

    /// Direct child by index.
    fn child_at(&self, _index: usize) -> Option<&dyn Widget> {
        None
    }

    /// Mutable direct child by index.
    fn child_at_mut(&mut self, _index: usize) -> Option<&mut dyn Widget> {
        None
    }

    /// Whether this widget participates in focus traversal.
    fn can_focus(&self) -> bool {
        false
    }

    /// Gain keyboard focus.
    fn focus(&mut self) {}

    /// Lose keyboard focus.
    fn blur(&mut self) {}

    /// Whether this widget currently holds focus.
    fn is_focused(&self) -> bool {
        false
    }

    /// A short label for assistive announcement on focus change.
    fn accessible_label(&self) -> Option<String> {
        None
    }

    /// Called when the widget enters the visible tree.
    fn mount(&mut self) {}

    /// Called when the widget leaves the visible tree.
    fn unmount(&mut self) {}

    /// Called before mount, with access to runtime services.
    fn bind(&mut self, _services: &Services) {}

    /// Called after unmount, to release anything acquired in bind.
    fn unbind(&mut self) {}
}

/// A path from a layer root to a widget: child indices at each level.
pub type WidgetPath = Vec<usize>;

/// Resolve a path to a widget reference.
pub fn resolve_path<'a>(root: &'a dyn Widget, path: &[usize]) -> Option<&'a dyn Widget> {
    let mut cur = root;
    for &index in path {
        cur = cur.child_at(index)?;
    }
    Some(cur)
}

/// Resolve a path to a mutable widget reference.
pub fn resolve_path_mut<'a>(
    root: &'a mut dyn Widget,
    path: &[usize],
) -> Option<&'a mut dyn Widget> {
    let mut cur = root;
    for &index in path {
        cur = cur.child_at_mut(index)?;
    }
    Some(cur)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Leaf(&'static str);

    impl Widget for Leaf {
        fn layout(&mut self, _bounds: Rect) {}
        fn render(&self, _ctx: &mut RenderContext<'_>) {}
        fn accessible_label(&self) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    struct Pair {
        children: Vec<Box<dyn Widget>>,
    }

    impl Widget for Pair {
        fn layout(&mut self, _bounds: Rect) {}
        fn render(&self, _ctx: &mut RenderContext<'_>) {}
        fn child_count(&self) -> usize {
            self.children.len()
        }
        fn child_at(&self, index: usize) -> Option<&dyn Widget> {
            self.children.get(index).map(AsRef::as_ref)
        }
        fn child_at_mut(&mut self, index: usize) -> Option<&mut dyn Widget> {
            self.children.get_mut(index).map(|child| &mut **child as &mut dyn Widget)
        }
    }

    #[test]
    fn test_resolve_path() {
        let root = Pair {
            children: vec![
                Box::new(Leaf("a")),
                Box::new(Pair {
                    children: vec![Box::new(Leaf("b"))],
                }),
            ],
        };
        let found = resolve_path(&root, &[1, 0]).unwrap();
        assert_eq!(found.accessible_label().as_deref(), Some("b"));
        assert!(resolve_path(&root, &[2]).is_none());
        assert!(resolve_path(&root, &[0, 0]).is_none());
    }

    #[test]
    fn test_empty_path_is_root() {
        let root = Leaf("root");
        let found = resolve_path(&root, &[]).unwrap();
        assert_eq!(found.accessible_label().as_deref(), Some("root"));
    }

    #[test]
    fn test_handle_result_constructors() {
        assert!(!HandleResult::ignored().consumed);
        assert!(HandleResult::consumed().consumed);
        let r = HandleResult::with_commands(vec![Command::Quit]);
        assert!(r.consumed);
        assert_eq!(r.commands.len(), 1);
    }
}
