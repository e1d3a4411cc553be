use crate::builder::create_elem_with_text;
use crate::data::DataSource;
use crate::dom::{Document, NodeId};
use crate::model::{Comment, PostId};
use crate::surface::Surface;
use crate::toggle::HIDDEN_CLASS;

pub const SECTION_CLASS: &str = "comments";

/// Fragment of comment blocks in the order given.
pub fn create_comments(doc: &mut Document, comments: Option<&[Comment]>) -> Option<NodeId> {
    let comments = comments?;
    let fragment = doc.create_fragment();
    for comment in comments {
        let article = doc.create_element("article");
        let name = create_elem_with_text(doc, "h3", &comment.name);
        let body = create_elem_with_text(doc, "p", &comment.body);
        let from = create_elem_with_text(doc, "p", &format!("From: {}", comment.email));
        doc.append_child(article, name);
        doc.append_child(article, body);
        doc.append_child(article, from);
        doc.append_child(fragment, article);
    }
    Some(fragment)
}

/// Builds the hidden comment section for one post.
///
/// The section is produced even when the source yields no comments; only a
/// missing post id produces nothing.
pub async fn display_comments<S: DataSource>(
    source: &S,
    surface: &Surface,
    post_id: Option<PostId>,
) -> Option<NodeId> {
    let post_id = post_id?;

    let section = surface.with(|doc| {
        let section = doc.create_element("section");
        doc.set_data(section, "postId", &post_id.to_string());
        doc.set_class_name(section, &format!("{SECTION_CLASS} {HIDDEN_CLASS}"));
        section
    });

    let comments = source.list_comments(Some(post_id)).await.ok();

    surface.with(|doc| {
        if let Some(fragment) = create_comments(doc, comments.as_deref()) {
            doc.append_child(section, fragment);
            doc.discard(fragment);
        }
    });
    Some(section)
}
