//! Comment visibility toggling.
//!
//! A post's comment section and its button share the post id as
//! `data-post-id`. Toggling never touches the network.

use crate::dom::{Document, NodeId};
use crate::model::PostId;

pub const HIDDEN_CLASS: &str = "hide";
pub const SHOW_COMMENTS: &str = "Show Comments";
pub const HIDE_COMMENTS: &str = "Hide Comments";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Hidden,
    Shown,
}

impl Visibility {
    /// Button label offering the opposite state.
    pub fn button_label(self) -> &'static str {
        match self {
            Visibility::Hidden => SHOW_COMMENTS,
            Visibility::Shown => HIDE_COMMENTS,
        }
    }
}

fn find(doc: &Document, tag: &str, post_id: PostId) -> Option<NodeId> {
    doc.query_by_data(tag, "postId", &post_id.to_string())
}

pub fn section_visibility(doc: &Document, post_id: PostId) -> Option<Visibility> {
    let section = find(doc, "section", post_id)?;
    Some(if doc.has_class(section, HIDDEN_CLASS) {
        Visibility::Hidden
    } else {
        Visibility::Shown
    })
}

pub fn toggle_comment_section(doc: &mut Document, post_id: Option<PostId>) -> Option<NodeId> {
    let section = find(doc, "section", post_id?)?;
    doc.toggle_class(section, HIDDEN_CLASS);
    Some(section)
}

pub fn toggle_comment_button(doc: &mut Document, post_id: Option<PostId>) -> Option<NodeId> {
    let button = find(doc, "button", post_id?)?;
    let next = if doc.text_content(button) == SHOW_COMMENTS {
        HIDE_COMMENTS
    } else {
        SHOW_COMMENTS
    };
    doc.set_text_content(button, next);
    Some(button)
}

/// Flips the section and rewrites the button label from the section's new
/// state, so the two cannot drift apart. Without a matching section nothing
/// changes.
pub fn toggle_comments(
    doc: &mut Document,
    post_id: Option<PostId>,
) -> Option<(NodeId, Option<NodeId>)> {
    let post_id = post_id?;
    let section = toggle_comment_section(doc, Some(post_id))?;
    let visibility = section_visibility(doc, post_id)?;
    let button = find(doc, "button", post_id);
    if let Some(button) = button {
        doc.set_text_content(button, visibility.button_label());
    }
    Some((section, button))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mounted_pair(doc: &mut Document, id: &str) -> (NodeId, NodeId) {
        let main = doc.create_element("main");
        doc.append_child(doc.root(), main);
        let button = doc.create_element("button");
        doc.set_inner_html(button, SHOW_COMMENTS);
        doc.set_data(button, "postId", id);
        let section = doc.create_element("section");
        doc.set_class_name(section, "comments hide");
        doc.set_data(section, "postId", id);
        doc.append_child(main, button);
        doc.append_child(main, section);
        (section, button)
    }

    #[test]
    fn toggle_flips_section_and_label_together() {
        let mut doc = Document::new();
        let (section, button) = mounted_pair(&mut doc, "5");

        let (toggled, labelled) = toggle_comments(&mut doc, Some(PostId(5))).unwrap();
        assert_eq!(toggled, section);
        assert_eq!(labelled, Some(button));
        assert!(!doc.has_class(section, HIDDEN_CLASS));
        assert_eq!(doc.text_content(button), HIDE_COMMENTS);

        toggle_comments(&mut doc, Some(PostId(5)));
        assert!(doc.has_class(section, HIDDEN_CLASS));
        assert_eq!(doc.text_content(button), SHOW_COMMENTS);
    }

    #[test]
    fn four_toggles_return_to_initial_state() {
        let mut doc = Document::new();
        let (section, button) = mounted_pair(&mut doc, "7");
        for _ in 0..4 {
            toggle_comments(&mut doc, Some(PostId(7)));
        }
        assert_eq!(doc.class_name(section), "comments hide");
        assert_eq!(doc.text_content(button), SHOW_COMMENTS);
    }

    #[test]
    fn undefined_or_unknown_ids_are_noops() {
        let mut doc = Document::new();
        let (section, button) = mounted_pair(&mut doc, "1");
        assert!(toggle_comments(&mut doc, None).is_none());
        assert!(toggle_comments(&mut doc, Some(PostId(2))).is_none());
        assert!(toggle_comment_button(&mut doc, None).is_none());
        assert!(doc.has_class(section, HIDDEN_CLASS));
        assert_eq!(doc.text_content(button), SHOW_COMMENTS);
    }

    #[test]
    fn button_label_flip_is_independent_of_section() {
        let mut doc = Document::new();
        let (_, button) = mounted_pair(&mut doc, "3");
        toggle_comment_button(&mut doc, Some(PostId(3)));
        assert_eq!(doc.text_content(button), HIDE_COMMENTS);
        assert_eq!(section_visibility(&doc, PostId(3)), Some(Visibility::Hidden));
    }
}
