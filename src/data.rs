use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use log::warn;

use crate::model::{Comment, Post, PostId, User, UserId};
use crate::placeholder;

/// Outcome of one Data Source lookup.
///
/// Failures are logged where they happen and arrive here already handled, so
/// callers only decide what to render for each case.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    Data(T),
    /// The identifier was not supplied or the lookup matched nothing.
    Missing,
    /// The request failed; a warning has been logged.
    Failed,
}

impl<T> Fetched<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            Fetched::Data(value) => Some(value),
            Fetched::Missing | Fetched::Failed => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Fetched::Failed)
    }
}

pub trait DataSource {
    fn list_users(&self) -> impl Future<Output = Fetched<Vec<User>>>;
    fn list_posts(&self, user_id: Option<UserId>) -> impl Future<Output = Fetched<Vec<Post>>>;
    fn get_user(&self, user_id: Option<UserId>) -> impl Future<Output = Fetched<User>>;
    fn list_comments(
        &self,
        post_id: Option<PostId>,
    ) -> impl Future<Output = Fetched<Vec<Comment>>>;
}

/// Applies the fetch-boundary failure policy: errors are logged with the
/// operation name and turned into [`Fetched::Failed`].
pub async fn guarded<T, F>(operation: &'static str, request: F) -> Fetched<T>
where
    F: Future<Output = Result<Option<T>>>,
{
    match request.await {
        Ok(Some(value)) => Fetched::Data(value),
        Ok(None) => Fetched::Missing,
        Err(err) => {
            warn!("{operation}() fetch request failed: {err:#}");
            Fetched::Failed
        }
    }
}

pub struct HttpDataSource {
    client: Arc<placeholder::Client>,
}

impl HttpDataSource {
    pub fn new(client: Arc<placeholder::Client>) -> Self {
        Self { client }
    }
}

impl DataSource for HttpDataSource {
    async fn list_users(&self) -> Fetched<Vec<User>> {
        guarded("list_users", async { self.client.users().await.map(Some) }).await
    }

    async fn list_posts(&self, user_id: Option<UserId>) -> Fetched<Vec<Post>> {
        let Some(user_id) = user_id else {
            return Fetched::Missing;
        };
        guarded("list_posts", async {
            self.client.user_posts(user_id).await.map(Some)
        })
        .await
    }

    async fn get_user(&self, user_id: Option<UserId>) -> Fetched<User> {
        let Some(user_id) = user_id else {
            return Fetched::Missing;
        };
        guarded("get_user", self.client.user(user_id)).await
    }

    async fn list_comments(&self, post_id: Option<PostId>) -> Fetched<Vec<Comment>> {
        let Some(post_id) = post_id else {
            return Fetched::Missing;
        };
        guarded("list_comments", async {
            self.client.post_comments(post_id).await.map(Some)
        })
        .await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    ListUsers,
    ListPosts(UserId),
    GetUser(UserId),
    ListComments(PostId),
}

impl Call {
    fn operation(&self) -> &'static str {
        match self {
            Call::ListUsers => "list_users",
            Call::ListPosts(_) => "list_posts",
            Call::GetUser(_) => "get_user",
            Call::ListComments(_) => "list_comments",
        }
    }
}

/// In-memory source for tests and offline runs.
///
/// Every call yields to the scheduler at least once so concurrent renders
/// interleave the way network-backed ones do.
#[derive(Debug, Default)]
pub struct MockDataSource {
    users: Vec<User>,
    posts: HashMap<UserId, Vec<Post>>,
    comments: HashMap<PostId, Vec<Comment>>,
    failing: HashSet<&'static str>,
    post_latency: HashMap<UserId, usize>,
    user_latency: HashMap<UserId, usize>,
    comment_latency: HashMap<PostId, usize>,
    calls: RefCell<Vec<Call>>,
}

impl MockDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.users.push(user);
        self
    }

    pub fn with_posts(mut self, user_id: UserId, posts: Vec<Post>) -> Self {
        self.posts.insert(user_id, posts);
        self
    }

    pub fn with_comments(mut self, post_id: PostId, comments: Vec<Comment>) -> Self {
        self.comments.insert(post_id, comments);
        self
    }

    /// Makes every call of `operation` (`"list_posts"`, `"get_user"`, ...) fail.
    pub fn failing(mut self, operation: &'static str) -> Self {
        self.failing.insert(operation);
        self
    }

    /// Adds extra suspension points to `list_posts` for one user.
    pub fn with_posts_latency(mut self, user_id: UserId, yields: usize) -> Self {
        self.post_latency.insert(user_id, yields);
        self
    }

    /// Adds extra suspension points to `get_user` for one user.
    pub fn with_user_latency(mut self, user_id: UserId, yields: usize) -> Self {
        self.user_latency.insert(user_id, yields);
        self
    }

    /// Adds extra suspension points to `list_comments` for one post.
    pub fn with_comments_latency(mut self, post_id: PostId, yields: usize) -> Self {
        self.comment_latency.insert(post_id, yields);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    async fn enter(&self, call: Call, extra_yields: usize) -> Result<()> {
        self.calls.borrow_mut().push(call);
        for _ in 0..=extra_yields {
            tokio::task::yield_now().await;
        }
        let operation = call.operation();
        if self.failing.contains(operation) {
            return Err(anyhow!("mock: {operation} unavailable"));
        }
        Ok(())
    }
}

impl DataSource for MockDataSource {
    async fn list_users(&self) -> Fetched<Vec<User>> {
        guarded("list_users", async {
            self.enter(Call::ListUsers, 0).await?;
            Ok(Some(self.users.clone()))
        })
        .await
    }

    async fn list_posts(&self, user_id: Option<UserId>) -> Fetched<Vec<Post>> {
        let Some(user_id) = user_id else {
            return Fetched::Missing;
        };
        guarded("list_posts", async {
            let latency = self.post_latency.get(&user_id).copied().unwrap_or(0);
            self.enter(Call::ListPosts(user_id), latency).await?;
            Ok(Some(self.posts.get(&user_id).cloned().unwrap_or_default()))
        })
        .await
    }

    async fn get_user(&self, user_id: Option<UserId>) -> Fetched<User> {
        let Some(user_id) = user_id else {
            return Fetched::Missing;
        };
        guarded("get_user", async {
            let latency = self.user_latency.get(&user_id).copied().unwrap_or(0);
            self.enter(Call::GetUser(user_id), latency).await?;
            Ok(self.users.iter().find(|user| user.id == user_id).cloned())
        })
        .await
    }

    async fn list_comments(&self, post_id: Option<PostId>) -> Fetched<Vec<Comment>> {
        let Some(post_id) = post_id else {
            return Fetched::Missing;
        };
        guarded("list_comments", async {
            let latency = self.comment_latency.get(&post_id).copied().unwrap_or(0);
            self.enter(Call::ListComments(post_id), latency).await?;
            Ok(Some(self.comments.get(&post_id).cloned().unwrap_or_default()))
        })
        .await
    }
}
