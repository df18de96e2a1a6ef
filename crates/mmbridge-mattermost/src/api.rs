//! Mattermost REST API v4 (the handful of endpoints the adapter uses).

use reqwest::{header, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize};
use url::Url;

use mmbridge_core::{
    domain::{Channel, Post, Team, User},
    errors::Error,
    Result,
};

/// Error body returned by the server on non-2xx responses.
#[derive(Debug, Default, Deserialize)]
struct AppError {
    #[serde(default)]
    id: String,
    #[serde(default)]
    message: String,
}

#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    token: String,
}

impl ApiClient {
    /// A client for the server at `server_url` (which may carry a path prefix).
    pub fn new(server_url: &Url, token: impl Into<String>) -> Result<Self> {
        if !matches!(server_url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "unsupported server url scheme '{}'",
                server_url.scheme()
            )));
        }

        let mut base = server_url.clone();
        let path = format!("{}/api/v4", base.path().trim_end_matches('/'));
        base.set_path(&path);
        base.set_query(None);
        base.set_fragment(None);

        Ok(Self {
            http: reqwest::Client::new(),
            base,
            token: token.into(),
        })
    }

    pub async fn get_me(&self, etag: &str) -> Result<User> {
        self.get(&["users", "me"], etag).await
    }

    pub async fn get_channel(&self, channel_id: &str, etag: &str) -> Result<Channel> {
        self.get(&["channels", channel_id], etag).await
    }

    pub async fn get_channel_by_name(
        &self,
        name: &str,
        team_id: &str,
        etag: &str,
    ) -> Result<Channel> {
        self.get(&["teams", team_id, "channels", "name", name], etag)
            .await
    }

    pub async fn get_team_by_name(&self, name: &str, etag: &str) -> Result<Team> {
        self.get(&["teams", "name", name], etag).await
    }

    pub async fn create_post(&self, post: &Post) -> Result<Post> {
        let req = self.request(Method::POST, &["posts"])?.json(post);
        decode(send(req).await?).await
    }

    pub async fn logout(&self) -> Result<()> {
        let resp = send(self.request(Method::POST, &["users", "logout"])?).await?;
        if resp.status().is_success() {
            return Ok(());
        }
        Err(api_error(resp).await)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str], etag: &str) -> Result<T> {
        let mut req = self.request(Method::GET, segments)?;
        if !etag.is_empty() {
            req = req.header(header::IF_NONE_MATCH, etag);
        }
        decode(send(req).await?).await
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let url = self.endpoint(segments)?;
        Ok(self.http.request(method, url).bearer_auth(&self.token))
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("server url cannot be a base: {}", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

async fn send(req: RequestBuilder) -> Result<Response> {
    req.send().await.map_err(map_err)
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T> {
    if !resp.status().is_success() {
        return Err(api_error(resp).await);
    }
    resp.json::<T>().await.map_err(map_err)
}

async fn api_error(resp: Response) -> Error {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    let app = serde_json::from_str::<AppError>(&body).unwrap_or_default();
    Error::Api {
        status,
        id: app.id,
        message: if app.message.is_empty() {
            body
        } else {
            app.message
        },
    }
}

fn map_err(e: reqwest::Error) -> Error {
    Error::External(format!("mattermost request failed: {e}"))
}
