//! In-memory rendering surface.
//!
//! Nodes live in an arena addressed by [`NodeId`]. Slots of discarded
//! subtrees are reused; the generation stamped into each id keeps stale ids
//! from resolving to the new occupant. Element content is kept as raw markup
//! next to the element's child nodes, which is all the renderer needs;
//! nothing here parses HTML.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Click,
    Change,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub target: NodeId,
    /// Value carried by `change` events.
    pub value: Option<String>,
}

impl Event {
    pub fn click(target: NodeId) -> Self {
        Self {
            kind: EventKind::Click,
            target,
            value: None,
        }
    }

    pub fn change(target: NodeId, value: Option<String>) -> Self {
        Self {
            kind: EventKind::Change,
            target,
            value,
        }
    }
}

pub type Handler = Rc<dyn Fn(&mut Document, &Event)>;

#[derive(Debug, Clone)]
enum NodeKind {
    Document,
    Fragment,
    Element(Element),
    /// Slot of a discarded subtree.
    Vacant,
}

#[derive(Debug, Clone)]
struct Element {
    tag: String,
    attrs: BTreeMap<String, String>,
    inner_html: String,
}

#[derive(Debug, Clone)]
struct Node {
    generation: u32,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

#[derive(Clone)]
struct Listener {
    id: ListenerId,
    handler: Handler,
}

#[derive(Default)]
struct ListenerStore {
    map: HashMap<NodeId, HashMap<EventKind, Vec<Listener>>>,
}

impl ListenerStore {
    fn add(&mut self, node: NodeId, kind: EventKind, listener: Listener) {
        self.map
            .entry(node)
            .or_default()
            .entry(kind)
            .or_default()
            .push(listener);
    }

    fn remove(&mut self, node: NodeId, kind: EventKind, id: ListenerId) -> bool {
        let Some(events) = self.map.get_mut(&node) else {
            return false;
        };
        let Some(listeners) = events.get_mut(&kind) else {
            return false;
        };

        if let Some(pos) = listeners.iter().position(|listener| listener.id == id) {
            listeners.remove(pos);
            if listeners.is_empty() {
                events.remove(&kind);
            }
            if events.is_empty() {
                self.map.remove(&node);
            }
            return true;
        }

        false
    }

    fn get(&self, node: NodeId, kind: EventKind) -> Vec<Listener> {
        self.map
            .get(&node)
            .and_then(|events| events.get(&kind))
            .cloned()
            .unwrap_or_default()
    }

    fn count(&self, node: NodeId, kind: EventKind) -> usize {
        self.map
            .get(&node)
            .and_then(|events| events.get(&kind))
            .map_or(0, Vec::len)
    }

    fn drop_node(&mut self, node: NodeId) {
        self.map.remove(&node);
    }
}

pub struct Document {
    nodes: Vec<Node>,
    free: Vec<usize>,
    root: NodeId,
    listeners: ListenerStore,
    next_listener: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("slots", &self.slot_count())
            .field("free", &self.free.len())
            .field("listeners", &self.listeners.map.len())
            .finish()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                generation: 0,
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Document,
            }],
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
            listeners: ListenerStore::default(),
            next_listener: 1,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element(Element {
            tag: tag.to_ascii_lowercase(),
            attrs: BTreeMap::new(),
            inner_html: String::new(),
        }))
    }

    pub fn create_fragment(&mut self) -> NodeId {
        self.push(NodeKind::Fragment)
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        if let Some(index) = self.free.pop() {
            let node = &mut self.nodes[index];
            node.kind = kind;
            return NodeId {
                index,
                generation: node.generation,
            };
        }
        let index = self.nodes.len();
        self.nodes.push(Node {
            generation: 0,
            parent: None,
            children: Vec::new(),
            kind,
        });
        NodeId {
            index,
            generation: 0,
        }
    }

    /// Arena slots in use or waiting for reuse.
    pub fn slot_count(&self) -> usize {
        self.nodes.len()
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes
            .get(id.index)
            .filter(|node| node.generation == id.generation)
            .filter(|node| !matches!(node.kind, NodeKind::Vacant))
    }

    fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.node(id)?.kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        let node = self
            .nodes
            .get_mut(id.index)
            .filter(|node| node.generation == id.generation)?;
        match &mut node.kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    /// True for element nodes that have not been discarded.
    pub fn is_live_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn is_fragment(&self, id: NodeId) -> bool {
        matches!(self.node(id).map(|n| &n.kind), Some(NodeKind::Fragment))
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|element| element.tag.as_str())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn last_element_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id)
            .iter()
            .rev()
            .copied()
            .find(|child| self.is_live_element(*child))
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.parent(node) {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }

    /// Appends `child` to `parent`, moving it out of any previous parent.
    /// Appending a fragment moves the fragment's children instead.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if self.node(parent).is_none() || self.node(child).is_none() {
            return false;
        }
        if self.is_inclusive_ancestor(child, parent) {
            return false;
        }

        if self.is_fragment(child) {
            let moved = std::mem::take(&mut self.nodes[child.index].children);
            for grandchild in moved {
                self.nodes[grandchild.index].parent = Some(parent);
                self.nodes[parent.index].children.push(grandchild);
            }
            return true;
        }

        self.detach(child);
        self.nodes[child.index].parent = Some(parent);
        self.nodes[parent.index].children.push(child);
        true
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if self.parent(child) != Some(parent) {
            return false;
        }
        self.detach(child);
        true
    }

    fn detach(&mut self, child: NodeId) {
        if let Some(parent) = self.nodes[child.index].parent.take() {
            self.nodes[parent.index].children.retain(|id| *id != child);
        }
    }

    /// Removes children last-first and returns them in removal order.
    fn remove_children(&mut self, parent: NodeId) -> Vec<NodeId> {
        let mut removed = Vec::new();
        while let Some(child) = self.children(parent).last().copied() {
            self.detach(child);
            removed.push(child);
        }
        removed
    }

    /// Drops a subtree from the arena along with its listeners and frees
    /// its slots for reuse.
    pub fn discard(&mut self, id: NodeId) {
        if self.node(id).is_none() || id == self.root {
            return;
        }
        self.detach(id);
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = &mut self.nodes[current.index];
            stack.append(&mut node.children);
            node.parent = None;
            node.kind = NodeKind::Vacant;
            node.generation = node.generation.wrapping_add(1);
            self.free.push(current.index);
            self.listeners.drop_node(current);
        }
    }

    pub fn inner_html(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|element| element.inner_html.as_str())
    }

    pub fn set_inner_html(&mut self, id: NodeId, markup: &str) {
        if let Some(element) = self.element_mut(id) {
            element.inner_html = markup.to_string();
        }
    }

    /// Text of the element and its descendants with markup tags stripped.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        if let Some(element) = self.element(id) {
            out.push_str(&strip_tags(&element.inner_html));
        }
        for child in self.children(id) {
            self.collect_text(*child, out);
        }
    }

    /// Replaces content and children with plain text.
    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        if !self.is_live_element(id) {
            return;
        }
        for child in self.remove_children(id) {
            self.discard(child);
        }
        if let Some(element) = self.element_mut(id) {
            element.inner_html = escape_html_text(text);
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?
            .attrs
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(element) = self.element_mut(id) {
            element
                .attrs
                .insert(name.to_ascii_lowercase(), value.to_string());
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let Some(element) = self.element_mut(id) {
            element.attrs.remove(&name.to_ascii_lowercase());
        }
    }

    pub fn class_name(&self, id: NodeId) -> &str {
        self.attr(id, "class").unwrap_or("")
    }

    /// Sets the raw class attribute; an empty string removes it.
    pub fn set_class_name(&mut self, id: NodeId, classes: &str) {
        if classes.is_empty() {
            self.remove_attr(id, "class");
        } else {
            self.set_attr(id, "class", classes);
        }
    }

    pub fn classes(&self, id: NodeId) -> Vec<String> {
        class_tokens(self.attr(id, "class"))
    }

    pub fn has_class(&self, id: NodeId, class_name: &str) -> bool {
        self.attr(id, "class")
            .map(|classes| classes.split_whitespace().any(|c| c == class_name))
            .unwrap_or(false)
    }

    /// Flips one class token and reports whether it is now present.
    pub fn toggle_class(&mut self, id: NodeId, class_name: &str) -> bool {
        let mut tokens = self.classes(id);
        let present = if let Some(pos) = tokens.iter().position(|t| t == class_name) {
            tokens.remove(pos);
            false
        } else {
            tokens.push(class_name.to_string());
            true
        };
        self.set_class_name(id, &tokens.join(" "));
        present
    }

    /// Dataset write: `postId` is stored as `data-post-id`.
    pub fn set_data(&mut self, id: NodeId, key: &str, value: &str) {
        self.set_attr(id, &dataset_key_to_attr_name(key), value);
    }

    pub fn data(&self, id: NodeId, key: &str) -> Option<&str> {
        self.attr(id, &dataset_key_to_attr_name(key))
    }

    pub fn set_disabled(&mut self, id: NodeId, disabled: bool) {
        if disabled {
            self.set_attr(id, "disabled", "");
        } else {
            self.remove_attr(id, "disabled");
        }
    }

    pub fn is_disabled(&self, id: NodeId) -> bool {
        self.attr(id, "disabled").is_some()
    }

    /// Descendants of `scope` with the given tag, in document order.
    pub fn query_all(&self, scope: NodeId, tag: &str) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(scope).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            if self
                .tag_name(current)
                .is_some_and(|name| name.eq_ignore_ascii_case(tag))
            {
                out.push(current);
            }
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// First `tag` descendant of the document whose dataset `key` equals `value`.
    pub fn query_by_data(&self, tag: &str, key: &str, value: &str) -> Option<NodeId> {
        self.query_all(self.root, tag)
            .into_iter()
            .find(|node| self.data(*node, key) == Some(value))
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        let mut stack = vec![self.root];
        while let Some(current) = stack.pop() {
            if self.attr(current, "id") == Some(id) {
                return Some(current);
            }
            stack.extend(self.children(current).iter().rev().copied());
        }
        None
    }

    pub fn add_listener(
        &mut self,
        node: NodeId,
        kind: EventKind,
        handler: Handler,
    ) -> Option<ListenerId> {
        if !self.is_live_element(node) {
            return None;
        }
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.add(node, kind, Listener { id, handler });
        Some(id)
    }

    pub fn remove_listener(&mut self, node: NodeId, kind: EventKind, id: ListenerId) -> bool {
        self.listeners.remove(node, kind, id)
    }

    pub fn listener_count(&self, node: NodeId, kind: EventKind) -> usize {
        self.listeners.count(node, kind)
    }

    /// Runs the target's listeners for the event and returns how many ran.
    pub fn dispatch(&mut self, event: &Event) -> usize {
        if !self.is_live_element(event.target) {
            return 0;
        }
        let listeners = self.listeners.get(event.target, event.kind);
        for listener in &listeners {
            (listener.handler)(self, event);
        }
        listeners.len()
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.serialize(id, &mut out);
        out
    }

    fn serialize(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        match &node.kind {
            NodeKind::Element(element) => {
                out.push('<');
                out.push_str(&element.tag);
                for (name, value) in &element.attrs {
                    out.push(' ');
                    out.push_str(name);
                    if !value.is_empty() {
                        out.push_str("=\"");
                        out.push_str(&escape_html_attr(value));
                        out.push('"');
                    }
                }
                out.push('>');
                out.push_str(&element.inner_html);
                for child in &node.children {
                    self.serialize(*child, out);
                }
                out.push_str("</");
                out.push_str(&element.tag);
                out.push('>');
            }
            NodeKind::Document | NodeKind::Fragment => {
                for child in &node.children {
                    self.serialize(*child, out);
                }
            }
            NodeKind::Vacant => {}
        }
    }
}

fn class_tokens(class_attr: Option<&str>) -> Vec<String> {
    class_attr
        .map(|value| value.split_whitespace().map(ToOwned::to_owned).collect())
        .unwrap_or_default()
}

fn dataset_key_to_attr_name(key: &str) -> String {
    let mut out = String::from("data-");
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Drops markup tags and decodes the entities [`escape_html_text`] and
/// [`escape_html_attr`] produce. A `<` only opens a tag when a letter, `/`
/// or `!` follows it.
fn strip_tags(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut chars = markup.chars().peekable();
    let mut in_tag = false;
    while let Some(ch) = chars.next() {
        if in_tag {
            if ch == '>' {
                in_tag = false;
            }
            continue;
        }
        match ch {
            '<' if chars
                .peek()
                .is_some_and(|next| next.is_ascii_alphabetic() || matches!(next, '/' | '!')) =>
            {
                in_tag = true;
            }
            _ => out.push(ch),
        }
    }
    decode_entities(&out)
}

fn decode_entities(text: &str) -> String {
    const ENTITIES: [(&str, char); 5] = [
        ("&amp;", '&'),
        ("&lt;", '<'),
        ("&gt;", '>'),
        ("&quot;", '"'),
        ("&#39;", '\''),
    ];
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        match ENTITIES
            .iter()
            .find(|(entity, _)| rest.starts_with(entity))
        {
            Some((entity, ch)) => {
                out.push(*ch);
                rest = &rest[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn escape_html_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

fn escape_html_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}
