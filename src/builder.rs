use crate::dom::{Document, NodeId};
use crate::model::User;

/// Detached element with markup content and a class attribute.
///
/// Omitted parts default to a `p` tag, empty content and no class. Content is
/// inserted as markup, so untrusted text must be escaped by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextElement<'a> {
    tag: &'a str,
    text: &'a str,
    classes: &'a str,
}

impl Default for TextElement<'_> {
    fn default() -> Self {
        Self {
            tag: "p",
            text: "",
            classes: "",
        }
    }
}

impl<'a> TextElement<'a> {
    pub fn new(tag: &'a str) -> Self {
        Self {
            tag,
            ..Self::default()
        }
    }

    pub fn text(mut self, text: &'a str) -> Self {
        self.text = text;
        self
    }

    pub fn classes(mut self, classes: &'a str) -> Self {
        self.classes = classes;
        self
    }

    pub fn build(&self, doc: &mut Document) -> NodeId {
        let node = doc.create_element(self.tag);
        doc.set_inner_html(node, self.text);
        doc.set_class_name(node, self.classes);
        node
    }
}

/// Shorthand for `TextElement::new(tag).text(text).build(doc)`.
pub fn create_elem_with_text(doc: &mut Document, tag: &str, text: &str) -> NodeId {
    TextElement::new(tag).text(text).build(doc)
}

/// One `option` per user, labelled by name and valued by id.
pub fn create_select_options(doc: &mut Document, users: Option<&[User]>) -> Option<Vec<NodeId>> {
    let users = users?;
    let options = users
        .iter()
        .map(|user| {
            let option = create_elem_with_text(doc, "option", &user.name);
            doc.set_attr(option, "value", &user.id.to_string());
            option
        })
        .collect();
    Some(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Company, UserId};

    #[test]
    fn defaults_are_paragraph_empty_and_classless() {
        let mut doc = Document::new();
        let node = TextElement::default().build(&mut doc);
        assert_eq!(doc.tag_name(node), Some("p"));
        assert_eq!(doc.inner_html(node), Some(""));
        assert_eq!(doc.class_name(node), "");
        assert_eq!(doc.parent(node), None);
    }

    #[test]
    fn arguments_are_applied_verbatim() {
        let mut doc = Document::new();
        let node = TextElement::new("h2")
            .text("<i>Title</i>")
            .classes("headline big")
            .build(&mut doc);
        assert_eq!(doc.tag_name(node), Some("h2"));
        assert_eq!(doc.inner_html(node), Some("<i>Title</i>"));
        assert_eq!(doc.class_name(node), "headline big");
        assert!(doc.has_class(node, "big"));
    }

    #[test]
    fn select_options_follow_user_order() {
        let mut doc = Document::new();
        let users = vec![
            User {
                id: UserId(1),
                name: "Leanne Graham".into(),
                username: String::new(),
                email: String::new(),
                company: Company::default(),
            },
            User {
                id: UserId(2),
                name: "Ervin Howell".into(),
                username: String::new(),
                email: String::new(),
                company: Company::default(),
            },
        ];
        let options = create_select_options(&mut doc, Some(&users)).unwrap();
        assert_eq!(options.len(), 2);
        assert_eq!(doc.text_content(options[1]), "Ervin Howell");
        assert_eq!(doc.attr(options[1], "value"), Some("2"));
        assert!(create_select_options(&mut doc, None).is_none());
    }
}
