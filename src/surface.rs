use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::debug;

use crate::data::DataSource;
use crate::dom::{Document, Event, EventKind, ListenerId, NodeId};
use crate::model::{Post, PostId};
use crate::posts::display_posts;
use crate::toggle::toggle_comments;

/// Shared handle to the document.
///
/// Borrows are scoped to a closure and never span an await point.
#[derive(Clone, Default)]
pub struct Surface(Rc<RefCell<Document>>);

impl Surface {
    pub fn new(doc: Document) -> Self {
        Self(Rc::new(RefCell::new(doc)))
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }

    pub fn read<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        f(&self.0.borrow())
    }
}

/// Removes and discards every child of `node`, last child first. Anything
/// other than a live element is left alone.
pub fn clear_children(doc: &mut Document, node: NodeId) -> Option<NodeId> {
    if !doc.is_live_element(node) {
        return None;
    }
    while let Some(child) = doc.last_element_child(node) {
        doc.remove_child(node, child);
        doc.discard(child);
    }
    Some(node)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Binding {
    button: NodeId,
    listener: ListenerId,
}

/// Identifies one render cycle. Only the most recently issued ticket may mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub removed_buttons: Vec<NodeId>,
    pub mounted: Vec<NodeId>,
    pub added_buttons: Vec<NodeId>,
}

/// Owns the `main` mount point and the toggle bindings inside it.
pub struct RenderController {
    surface: Surface,
    main: NodeId,
    prompt: String,
    bindings: RefCell<Vec<Binding>>,
    generation: Cell<u64>,
}

impl RenderController {
    pub fn new(surface: Surface, main: NodeId, prompt: impl Into<String>) -> Self {
        Self {
            surface,
            main,
            prompt: prompt.into(),
            bindings: RefCell::new(Vec::new()),
            generation: Cell::new(0),
        }
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn main(&self) -> NodeId {
        self.main
    }

    pub fn detach_toggle_listeners(&self) -> Vec<NodeId> {
        self.surface.with(|doc| self.detach_in(doc))
    }

    pub fn attach_toggle_listeners(&self) -> Vec<NodeId> {
        self.surface.with(|doc| self.attach_in(doc))
    }

    fn detach_in(&self, doc: &mut Document) -> Vec<NodeId> {
        let bindings = std::mem::take(&mut *self.bindings.borrow_mut());
        bindings
            .into_iter()
            .map(|binding| {
                doc.remove_listener(binding.button, EventKind::Click, binding.listener);
                binding.button
            })
            .collect()
    }

    fn attach_in(&self, doc: &mut Document) -> Vec<NodeId> {
        if !self.bindings.borrow().is_empty() {
            self.detach_in(doc);
        }

        let buttons = doc.query_all(self.main, "button");
        let mut bindings = self.bindings.borrow_mut();
        for &button in &buttons {
            let post_id = doc
                .data(button, "postId")
                .and_then(|value| value.parse::<PostId>().ok());
            let handler = Rc::new(move |doc: &mut Document, _: &Event| {
                toggle_comments(doc, post_id);
            });
            if let Some(listener) = doc.add_listener(button, EventKind::Click, handler) {
                bindings.push(Binding { button, listener });
            }
        }
        buttons
    }

    /// Click listeners currently bound inside the mount point.
    pub fn listener_total(&self) -> usize {
        self.surface.read(|doc| {
            doc.query_all(self.main, "button")
                .into_iter()
                .map(|button| doc.listener_count(button, EventKind::Click))
                .sum()
        })
    }

    /// Starts a render cycle, superseding any cycle still in flight.
    pub fn begin_cycle(&self) -> Ticket {
        let next = self.generation.get() + 1;
        self.generation.set(next);
        Ticket(next)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.generation.get() == ticket.0
    }

    pub async fn refresh<S: DataSource>(
        &self,
        source: &S,
        posts: Option<Vec<Post>>,
    ) -> Option<RefreshOutcome> {
        let ticket = self.begin_cycle();
        self.render(ticket, source, posts).await
    }

    /// Assembles the next unit off-document, then swaps it in with one
    /// uninterrupted detach, clear, mount and attach. Returns `None` when a
    /// newer cycle started while this one was fetching.
    pub async fn render<S: DataSource>(
        &self,
        ticket: Ticket,
        source: &S,
        posts: Option<Vec<Post>>,
    ) -> Option<RefreshOutcome> {
        let unit = display_posts(source, &self.surface, posts.as_deref(), &self.prompt).await;

        if !self.is_current(ticket) {
            debug!("discarding superseded render cycle {}", ticket.0);
            self.surface.with(|doc| doc.discard(unit));
            return None;
        }

        Some(self.surface.with(|doc| {
            let removed_buttons = self.detach_in(doc);
            clear_children(doc, self.main);
            let mounted = if doc.is_fragment(unit) {
                doc.children(unit).to_vec()
            } else {
                vec![unit]
            };
            doc.append_child(self.main, unit);
            if doc.is_fragment(unit) {
                doc.discard(unit);
            }
            let added_buttons = self.attach_in(doc);
            debug!(
                "render cycle {} mounted {} nodes, {} toggles bound",
                ticket.0,
                mounted.len(),
                added_buttons.len()
            );
            RefreshOutcome {
                removed_buttons,
                mounted,
                added_buttons,
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MockDataSource;
    use crate::model::{Comment, CommentId, UserId};
    use crate::posts::{DEFAULT_PROMPT, PROMPT_CLASS};
    use crate::toggle::{HIDE_COMMENTS, SHOW_COMMENTS};

    fn post(id: u64, user: u64) -> Post {
        Post {
            id: PostId(id),
            user_id: UserId(user),
            title: format!("title {id}"),
            body: String::new(),
        }
    }

    fn controller() -> RenderController {
        let surface = Surface::default();
        let main = surface.with(|doc| {
            let main = doc.create_element("main");
            let root = doc.root();
            doc.append_child(root, main);
            main
        });
        RenderController::new(surface, main, DEFAULT_PROMPT)
    }

    fn button_for(controller: &RenderController, id: &str) -> NodeId {
        controller
            .surface()
            .read(|doc| doc.query_by_data("button", "postId", id))
            .unwrap()
    }

    #[test]
    fn clear_children_is_idempotent_and_ignores_non_elements() {
        let mut doc = Document::new();
        let main = doc.create_element("main");
        let p = doc.create_element("p");
        doc.append_child(main, p);
        assert_eq!(clear_children(&mut doc, main), Some(main));
        assert_eq!(clear_children(&mut doc, main), Some(main));
        assert!(doc.children(main).is_empty());

        let fragment = doc.create_fragment();
        assert_eq!(clear_children(&mut doc, fragment), None);
        let root = doc.root();
        assert_eq!(clear_children(&mut doc, root), None);
    }

    #[tokio::test]
    async fn refresh_binds_exactly_one_listener_per_button() {
        let source = MockDataSource::new();
        let controller = controller();
        let outcome = controller
            .refresh(&source, Some(vec![post(1, 1), post(2, 1)]))
            .await
            .unwrap();
        assert!(outcome.removed_buttons.is_empty());
        assert_eq!(outcome.mounted.len(), 2);
        assert_eq!(outcome.added_buttons.len(), 2);
        assert_eq!(controller.listener_total(), 2);

        // Re-attaching must not double-bind.
        controller.attach_toggle_listeners();
        controller.attach_toggle_listeners();
        assert_eq!(controller.listener_total(), 2);

        let removed = controller.detach_toggle_listeners();
        assert_eq!(removed.len(), 2);
        assert_eq!(controller.listener_total(), 0);
    }

    #[tokio::test]
    async fn refresh_replaces_previous_render_wholesale() {
        let source = MockDataSource::new();
        let controller = controller();
        controller.refresh(&source, Some(vec![post(1, 1)])).await;
        let old_button = button_for(&controller, "1");

        let outcome = controller
            .refresh(&source, Some(vec![post(7, 2), post(8, 2)]))
            .await
            .unwrap();
        assert_eq!(outcome.removed_buttons, vec![old_button]);
        controller.surface().read(|doc| {
            assert_eq!(doc.children(controller.main()).len(), 2);
            assert!(doc.query_by_data("button", "postId", "1").is_none());
            assert!(!doc.is_live_element(old_button));
        });
        assert_eq!(controller.listener_total(), 2);
    }

    #[tokio::test]
    async fn clicks_route_to_the_toggle_coordinator() {
        let source = MockDataSource::new().with_comments(
            PostId(3),
            vec![Comment {
                id: CommentId(1),
                post_id: PostId(3),
                name: "n".into(),
                email: "e@x.io".into(),
                body: "b".into(),
            }],
        );
        let controller = controller();
        controller.refresh(&source, Some(vec![post(3, 1)])).await;
        let button = button_for(&controller, "3");

        let ran = controller
            .surface()
            .with(|doc| doc.dispatch(&Event::click(button)));
        assert_eq!(ran, 1);
        controller.surface().read(|doc| {
            assert_eq!(doc.text_content(button), HIDE_COMMENTS);
            let section = doc.query_by_data("section", "postId", "3").unwrap();
            assert!(!doc.has_class(section, "hide"));
        });

        controller
            .surface()
            .with(|doc| doc.dispatch(&Event::click(button)));
        controller
            .surface()
            .read(|doc| assert_eq!(doc.text_content(button), SHOW_COMMENTS));
    }

    #[tokio::test]
    async fn absence_mounts_the_prompt_without_listeners() {
        let source = MockDataSource::new();
        let controller = controller();
        controller.refresh(&source, Some(vec![post(1, 1)])).await;
        let outcome = controller.refresh(&source, None).await.unwrap();
        assert_eq!(outcome.removed_buttons.len(), 1);
        assert!(outcome.added_buttons.is_empty());
        controller.surface().read(|doc| {
            let children = doc.children(controller.main());
            assert_eq!(children.len(), 1);
            assert!(doc.has_class(children[0], PROMPT_CLASS));
            assert!(doc.query_all(controller.main(), "article").is_empty());
        });
        assert_eq!(controller.listener_total(), 0);
    }

    #[tokio::test]
    async fn repeated_refreshes_keep_the_arena_bounded() {
        let source = MockDataSource::new();
        let controller = controller();
        let posts: Vec<Post> = (1..=10).map(|id| post(id, 1)).collect();

        controller.refresh(&source, Some(posts.clone())).await;
        controller.refresh(&source, Some(posts.clone())).await;
        let settled = controller.surface().read(Document::slot_count);

        for _ in 0..100 {
            controller.refresh(&source, Some(posts.clone())).await;
        }
        assert_eq!(controller.surface().read(Document::slot_count), settled);
        assert_eq!(controller.listener_total(), 10);
    }

    #[tokio::test]
    async fn superseded_cycle_never_mounts() {
        let source = MockDataSource::new();
        let controller = controller();

        let stale = controller.begin_cycle();
        let fresh = controller.begin_cycle();
        let (late, current) = tokio::join!(
            controller.render(stale, &source, Some(vec![post(1, 1)])),
            controller.render(fresh, &source, Some(vec![post(2, 1)])),
        );
        assert!(late.is_none());
        assert!(current.is_some());
        controller.surface().read(|doc| {
            assert!(doc.query_by_data("button", "postId", "1").is_none());
            assert!(doc.query_by_data("button", "postId", "2").is_some());
        });
        assert_eq!(controller.listener_total(), 1);
    }
}
