use std::cell::Cell;
use std::rc::Rc;

use log::{debug, info};
use tokio::sync::mpsc::UnboundedSender;

use crate::builder::{create_elem_with_text, create_select_options};
use crate::data::DataSource;
use crate::dom::{Document, Event, EventKind, ListenerId, NodeId};
use crate::model::{User, UserId};
use crate::surface::{RefreshOutcome, RenderController, Surface};

pub const SELECT_MENU_ID: &str = "selectMenu";
pub const SELECT_PROMPT: &str = "Employees";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub header: NodeId,
    pub select: NodeId,
    pub main: NodeId,
}

/// Builds the static page skeleton: a header holding the select menu and
/// an empty `main` mount point.
pub fn build_page(doc: &mut Document) -> Page {
    let root = doc.root();
    let header = doc.create_element("header");
    let heading = create_elem_with_text(doc, "h1", "Employee Posts");
    let select = doc.create_element("select");
    doc.set_attr(select, "id", SELECT_MENU_ID);
    let prompt = create_elem_with_text(doc, "option", SELECT_PROMPT);
    doc.set_attr(prompt, "value", "");
    doc.append_child(select, prompt);
    doc.append_child(header, heading);
    doc.append_child(header, select);

    let main = doc.create_element("main");
    doc.append_child(root, header);
    doc.append_child(root, main);
    Page {
        header,
        select,
        main,
    }
}

pub fn populate_select_menu(
    doc: &mut Document,
    select: NodeId,
    users: Option<&[User]>,
) -> Option<NodeId> {
    let options = create_select_options(doc, users)?;
    if !doc.is_live_element(select) {
        return None;
    }
    for option in options {
        doc.append_child(select, option);
    }
    Some(select)
}

/// Fetches the user list and fills the select menu with it.
pub async fn init_page<S: DataSource>(
    source: &S,
    surface: &Surface,
    page: &Page,
) -> Option<Vec<User>> {
    let users = source.list_users().await.ok();
    surface.with(|doc| populate_select_menu(doc, page.select, users.as_deref()));
    if let Some(users) = &users {
        info!("select menu populated with {} users", users.len());
    }
    users
}

/// Change notification from the select menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionChange {
    pub value: Option<String>,
}

pub fn resolve_user_id(value: Option<&str>, fallback: UserId) -> UserId {
    value
        .filter(|value| !value.trim().is_empty())
        .and_then(|value| value.parse().ok())
        .unwrap_or(fallback)
}

/// Forwards the select menu's change events to the host loop.
pub fn bind_select_menu(
    doc: &mut Document,
    select: NodeId,
    sender: UnboundedSender<SelectionChange>,
) -> Option<ListenerId> {
    let handler = Rc::new(move |_: &mut Document, event: &Event| {
        let change = SelectionChange {
            value: event.value.clone(),
        };
        if sender.send(change).is_err() {
            debug!("selection change dropped, host loop has stopped");
        }
    });
    doc.add_listener(select, EventKind::Change, handler)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionOutcome {
    pub user_id: UserId,
    /// `None` when a newer selection superseded this one.
    pub refresh: Option<RefreshOutcome>,
}

/// Runs the fetch-and-refresh cycle for selection changes while keeping the
/// select menu disabled until every cycle in flight has finished.
pub struct SelectionHandler {
    select: NodeId,
    fallback: UserId,
    in_flight: Cell<usize>,
}

impl SelectionHandler {
    pub fn new(select: NodeId, fallback: UserId) -> Self {
        Self {
            select,
            fallback,
            in_flight: Cell::new(0),
        }
    }

    pub async fn on_select_change<S: DataSource>(
        &self,
        source: &S,
        controller: &RenderController,
        change: &SelectionChange,
    ) -> SelectionOutcome {
        let _guard = DisabledGuard::enter(self, controller.surface());
        let user_id = resolve_user_id(change.value.as_deref(), self.fallback);
        info!("rendering posts for user {user_id}");

        let ticket = controller.begin_cycle();
        let posts = source.list_posts(Some(user_id)).await.ok();
        let refresh = controller.render(ticket, source, posts).await;
        SelectionOutcome { user_id, refresh }
    }
}

struct DisabledGuard<'a> {
    handler: &'a SelectionHandler,
    surface: &'a Surface,
}

impl<'a> DisabledGuard<'a> {
    fn enter(handler: &'a SelectionHandler, surface: &'a Surface) -> Self {
        handler.in_flight.set(handler.in_flight.get() + 1);
        surface.with(|doc| doc.set_disabled(handler.select, true));
        Self { handler, surface }
    }
}

impl Drop for DisabledGuard<'_> {
    fn drop(&mut self) {
        let remaining = self.handler.in_flight.get().saturating_sub(1);
        self.handler.in_flight.set(remaining);
        if remaining == 0 {
            self.surface
                .with(|doc| doc.set_disabled(self.handler.select, false));
        }
    }
}
