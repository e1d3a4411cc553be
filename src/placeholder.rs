use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::header::USER_AGENT;
use reqwest::Client as HttpClient;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

use crate::model::{Comment, Post, PostId, User, UserId};

pub const DEFAULT_BASE_URL: &str = "https://jsonplaceholder.typicode.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub base_url: Option<String>,
    pub user_agent: String,
    pub timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("placeholder: {endpoint} returned status {status}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
    },
}

/// Read-only client for the placeholder JSON resource.
pub struct Client {
    http: HttpClient,
    user_agent: String,
    base_url: Url,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("placeholder client user agent required");
        }

        let mut base = config
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        // Url::join drops the last path segment unless it ends with a slash.
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url =
            Url::parse(&base).with_context(|| format!("placeholder: parse base url {base:?}"))?;

        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(config.timeout.unwrap_or(DEFAULT_TIMEOUT))
                .build()
                .context("placeholder: build HTTP client")?,
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn users(&self) -> Result<Vec<User>> {
        self.get_json("users", &[]).await
    }

    pub async fn user_posts(&self, user_id: UserId) -> Result<Vec<Post>> {
        self.get_json("posts", &[("userId", user_id.to_string())])
            .await
    }

    /// Looks a user up through the filtered collection; an empty match is `None`.
    pub async fn user(&self, user_id: UserId) -> Result<Option<User>> {
        let users: Vec<User> = self
            .get_json("users", &[("id", user_id.to_string())])
            .await?;
        Ok(users.into_iter().next())
    }

    pub async fn post_comments(&self, post_id: PostId) -> Result<Vec<Comment>> {
        self.get_json("comments", &[("postId", post_id.to_string())])
            .await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let mut url = self
            .base_url
            .join(endpoint)
            .with_context(|| format!("placeholder: build url for {endpoint}"))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }

        let response = self
            .http
            .get(url.clone())
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
            .with_context(|| format!("placeholder: request {url}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status { endpoint, status }.into());
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("placeholder: decode {endpoint} response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::mpsc;
    use std::thread;
    use tiny_http::{Header, Response, Server};

    struct Recorded {
        url: String,
        user_agent: String,
    }

    fn serve(
        routes: HashMap<&'static str, (u16, &'static str)>,
        requests: usize,
    ) -> (String, mpsc::Receiver<Recorded>) {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for request in server.incoming_requests().take(requests) {
                let url = request.url().to_string();
                let user_agent = request
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv("User-Agent"))
                    .map(|h| h.value.as_str().to_string())
                    .unwrap_or_default();
                let (status, body) = routes.get(url.as_str()).copied().unwrap_or((404, "{}"));
                let response = Response::from_string(body)
                    .with_status_code(status)
                    .with_header(
                        "Content-Type: application/json"
                            .parse::<Header>()
                            .unwrap(),
                    );
                let _ = request.respond(response);
                let _ = tx.send(Recorded { url, user_agent });
            }
        });
        (format!("http://{addr}"), rx)
    }

    fn client(base: String) -> Client {
        Client::new(ClientConfig {
            base_url: Some(base),
            user_agent: "postview-test/1.0".into(),
            http_client: Some(HttpClient::builder().no_proxy().build().unwrap()),
            ..ClientConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn rejects_blank_user_agent() {
        let err = Client::new(ClientConfig::default()).err().unwrap();
        assert!(err.to_string().contains("user agent"));
    }

    #[test]
    fn base_url_keeps_nested_path() {
        let client = client("http://localhost:9/api/v1".into());
        assert_eq!(client.base_url().as_str(), "http://localhost:9/api/v1/");
    }

    #[tokio::test]
    async fn fetches_posts_filtered_by_user() {
        let routes = HashMap::from([(
            "/posts?userId=3",
            (
                200,
                r#"[{"userId":3,"id":21,"title":"first","body":"one"},
                    {"userId":3,"id":22,"title":"second","body":"two"}]"#,
            ),
        )]);
        let (base, seen) = serve(routes, 1);
        let posts = client(base).user_posts(UserId(3)).await.unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[1].id, PostId(22));

        let recorded = seen.recv().unwrap();
        assert_eq!(recorded.url, "/posts?userId=3");
        assert_eq!(recorded.user_agent, "postview-test/1.0");
    }

    #[tokio::test]
    async fn single_user_takes_first_match_or_none() {
        let routes = HashMap::from([
            (
                "/users?id=1",
                (
                    200,
                    r#"[{"id":1,"name":"Leanne Graham","company":{"name":"Romaguera-Crona","catchPhrase":"Multi-layered"}}]"#,
                ),
            ),
            ("/users?id=99", (200, "[]")),
        ]);
        let (base, _seen) = serve(routes, 2);
        let client = client(base);
        let user = client.user(UserId(1)).await.unwrap().unwrap();
        assert_eq!(user.name, "Leanne Graham");
        assert_eq!(user.company.catch_phrase, "Multi-layered");
        assert!(client.user(UserId(99)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn non_success_status_is_an_api_error() {
        let routes = HashMap::from([("/comments?postId=5", (500, "oops"))]);
        let (base, _seen) = serve(routes, 1);
        let err = client(base).post_comments(PostId(5)).await.unwrap_err();
        match err.downcast_ref::<ApiError>() {
            Some(ApiError::Status { endpoint, status }) => {
                assert_eq!(*endpoint, "comments");
                assert_eq!(*status, StatusCode::INTERNAL_SERVER_ERROR);
            }
            None => panic!("unexpected error: {err:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_fails_to_decode() {
        let routes = HashMap::from([("/users", (200, r#"{"not":"a list"}"#))]);
        let (base, _seen) = serve(routes, 1);
        let err = client(base).users().await.unwrap_err();
        assert!(format!("{err:#}").contains("decode users response"));
    }
}
