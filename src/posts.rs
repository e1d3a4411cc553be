use futures::future::join_all;
use log::debug;

use crate::builder::{create_elem_with_text, TextElement};
use crate::comments::display_comments;
use crate::data::{DataSource, Fetched};
use crate::dom::{Document, NodeId};
use crate::model::{Post, User};
use crate::surface::Surface;
use crate::toggle::SHOW_COMMENTS;

pub const DEFAULT_PROMPT: &str = "Select an Employee to display their posts.";
pub const PROMPT_CLASS: &str = "default-text";
pub const UNKNOWN_AUTHOR: &str = "Author: unknown";

/// Builds one article per post and returns them in a fragment, in input order.
///
/// Posts are assembled concurrently; each article is complete before it is
/// placed in the fragment.
pub async fn create_posts<S: DataSource>(
    source: &S,
    surface: &Surface,
    posts: Option<&[Post]>,
) -> Option<NodeId> {
    let posts = posts?;
    let articles = join_all(
        posts
            .iter()
            .map(|post| create_article(source, surface, post)),
    )
    .await;

    Some(surface.with(|doc| {
        let fragment = doc.create_fragment();
        for article in articles {
            doc.append_child(fragment, article);
        }
        fragment
    }))
}

async fn create_article<S: DataSource>(source: &S, surface: &Surface, post: &Post) -> NodeId {
    let article = surface.with(|doc| {
        let article = doc.create_element("article");
        let title = create_elem_with_text(doc, "h2", &post.title);
        let body = create_elem_with_text(doc, "p", &post.body);
        let id = create_elem_with_text(doc, "p", &format!("Post ID: {}", post.id));
        doc.append_child(article, title);
        doc.append_child(article, body);
        doc.append_child(article, id);
        article
    });

    let author = source.get_user(Some(post.user_id)).await;
    surface.with(|doc| {
        append_author(doc, article, author);
        let button = create_elem_with_text(doc, "button", SHOW_COMMENTS);
        doc.set_data(button, "postId", &post.id.to_string());
        doc.append_child(article, button);
    });

    if let Some(section) = display_comments(source, surface, Some(post.id)).await {
        surface.with(|doc| doc.append_child(article, section));
    }
    article
}

fn append_author(doc: &mut Document, article: NodeId, author: Fetched<User>) {
    match author {
        Fetched::Data(user) => {
            let line = format!("Author: {} with {}", user.name, user.company.name);
            let byline = create_elem_with_text(doc, "p", &line);
            let phrase = create_elem_with_text(doc, "p", &user.company.catch_phrase);
            doc.append_child(article, byline);
            doc.append_child(article, phrase);
        }
        Fetched::Missing | Fetched::Failed => {
            debug!("author unavailable, rendering fallback byline");
            let byline = create_elem_with_text(doc, "p", UNKNOWN_AUTHOR);
            doc.append_child(article, byline);
        }
    }
}

pub fn placeholder_prompt(doc: &mut Document, text: &str) -> NodeId {
    TextElement::new("p")
        .text(text)
        .classes(PROMPT_CLASS)
        .build(doc)
}

/// Next renderable unit: the post articles, or the prompt when there is
/// nothing to show.
pub async fn display_posts<S: DataSource>(
    source: &S,
    surface: &Surface,
    posts: Option<&[Post]>,
    prompt: &str,
) -> NodeId {
    let posts = posts.filter(|posts| !posts.is_empty());
    match create_posts(source, surface, posts).await {
        Some(fragment) => fragment,
        None => surface.with(|doc| placeholder_prompt(doc, prompt)),
    }
}
