//! Lifecycle tree walks.
//!
//! Setup hooks (bind, mount) run parent before children, so a child always
//! sees a fully prepared parent. Teardown hooks (unmount, unbind) run
//! children before parent, the exact reverse.

use super::Widget;
use crate::runtime::Services;

/// Recursively mount a widget tree, parents before children.
pub fn mount_tree(widget: &mut dyn Widget) {
    widget.mount();
    for i in 0..widget.child_count() {
        if let Some(child) = widget.child_at_mut(i) {
            mount_tree(child);
        }
    }
}

/// Recursively unmount a widget tree, children before parents.
pub fn unmount_tree(widget: &mut dyn Widget) {
    for i in 0..widget.child_count() {
        if let Some(child) = widget.child_at_mut(i) {
            unmount_tree(child);
        }
    }
    widget.unmount();
}

/// Recursively bind services into a widget tree, parents before children.
pub fn bind_tree(widget: &mut dyn Widget, services: &Services) {
    widget.bind(services);
    for i in 0..widget.child_count() {
        if let Some(child) = widget.child_at_mut(i) {
            bind_tree(child, services);
        }
    }
}

/// Recursively unbind a widget tree, children before parents.
pub fn unbind_tree(widget: &mut dyn Widget) {
    for i in 0..widget.child_count() {
        if let Some(child) = widget.child_at_mut(i) {
            unbind_tree(child);
        }
    }
    widget.unbind();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Rect;
    use crate::screen::RenderContext;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Tracked {
        name: &'static str,
        log: Log,
        children: Vec<Box<dyn Widget>>,
    }

    impl Tracked {
        fn leaf(name: &'static str, log: &Log) -> Box<dyn Widget> {
            Box::new(Self {
                name,
                log: log.clone(),
                children: Vec::new(),
            })
        }
    }

    impl Widget for Tracked {
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
        fn mount(&mut self) {
            self.log.borrow_mut().push(format!("mount:{}", self.name));
        }
        fn unmount(&mut self) {
            self.log.borrow_mut().push(format!("unmount:{}", self.name));
        }
        fn bind(&mut self, _services: &Services) {
            self.log.borrow_mut().push(format!("bind:{}", self.name));
        }
        fn unbind(&mut self) {
            self.log.borrow_mut().push(format!("unbind:{}", self.name));
        }
    }

    fn sample_tree(log: &Log) -> Tracked {
        Tracked {
            name: "root",
            log: log.clone(),
            children: vec![
                Box::new(Tracked {
                    name: "a",
                    log: log.clone(),
                    children: vec![Tracked::leaf("a1", log)],
                }),
                Tracked::leaf("b", log),
            ],
        }
    }

    #[test]
    fn test_mount_parent_before_children() {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let mut tree = sample_tree(&log);
        mount_tree(&mut tree);
        assert_eq!(
            *log.borrow(),
            vec!["mount:root", "mount:a", "mount:a1", "mount:b"]
        );
    }

    #[test]
    fn test_unmount_children_before_parent() {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let mut tree = sample_tree(&log);
        unmount_tree(&mut tree);
        assert_eq!(
            *log.borrow(),
            vec!["unmount:a1", "unmount:a", "unmount:b", "unmount:root"]
        );
    }

    #[test]
    fn test_bind_unbind_mirror_each_other() {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let mut tree = sample_tree(&log);
        let services = Services::default();
        bind_tree(&mut tree, &services);
        unbind_tree(&mut tree);
        assert_eq!(
            *log.borrow(),
            vec![
                "bind:root",
                "bind:a",
                "bind:a1",
                "bind:b",
                "unbind:a1",
                "unbind:a",
                "unbind:b",
                "unbind:root"
            ]
        );
    }
}
