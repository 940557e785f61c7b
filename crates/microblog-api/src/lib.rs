// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use microblog_app::{
    AdminError, Article, ArticleDraft, ArticleId, Comment, CommentId, DashboardStats,
    INVALID_CREDENTIALS_MESSAGE, LoginInput, LoginResponse, ReadOnly, ResourceSource, Session,
    User, UserDraft, UserId,
};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_COMMENT_ARTICLE_LIMIT: usize = 5;

/// A normalized list response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing<T> {
    pub records: Vec<T>,
    /// Server-reported total, when the envelope carries one.
    pub total: Option<u64>,
}

/// Accepts a bare array, `{<key>: [...]}`, or `{data: [...]}`.
pub fn normalize_collection<T: DeserializeOwned>(
    body: Value,
    key: &str,
) -> Result<Listing<T>, AdminError> {
    let total = body.get("total").and_then(Value::as_u64);
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut fields) => {
            let keyed = fields.remove(key);
            let data = fields.remove("data");
            match (keyed, data) {
                (Some(Value::Array(items)), _) | (_, Some(Value::Array(items))) => items,
                _ => return Err(AdminError::Shape),
            }
        }
        _ => return Err(AdminError::Shape),
    };

    let records = serde_json::from_value(Value::Array(items))
        .map_err(|error| AdminError::transport(format!("decode {key}: {error}")))?;
    Ok(Listing { records, total })
}

#[derive(Clone)]
pub struct Client {
    base_url: Url,
    timeout: Duration,
    token: Option<String>,
    http: HttpClient,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            bail!("api.base_url must not be empty");
        }
        let base_url = Url::parse(trimmed)
            .with_context(|| format!("api.base_url {trimmed:?} is not a valid URL"))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            bail!(
                "api.base_url must use http or https, got {:?} -- e.g. {DEFAULT_BASE_URL}",
                base_url.scheme()
            );
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            timeout,
            token: None,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// A copy of this client that authenticates as `session`.
    pub fn for_session(&self, session: &Session) -> Self {
        let mut client = self.clone();
        client.token = Some(session.token.clone());
        client
    }

    pub fn login(&self, email: &str, password: &str) -> Result<LoginResponse, AdminError> {
        let url = self.endpoint(&["auth", "login"])?;
        debug!(%url, "POST");
        let response = self
            .http
            .post(url)
            .json(&LoginRequest { email, password })
            .send()
            .map_err(|error| connection_error(self.base_url(), &error))?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "login rejected");
            return Err(AdminError::auth(INVALID_CREDENTIALS_MESSAGE));
        }
        response
            .json()
            .map_err(|error| AdminError::transport(format!("decode login response: {error}")))
    }

    /// Validates the form, logs in, and admits only admin accounts. On
    /// success the client keeps the session token for later requests.
    pub fn sign_in(&mut self, input: &LoginInput) -> Result<Session, AdminError> {
        input.validate()?;
        let response = self.login(input.email.trim(), &input.password)?;
        let session = Session::admit(response)?;
        info!(user = %session.user.name, "signed in");
        self.token = Some(session.token.clone());
        Ok(session)
    }

    pub fn list_users(&self) -> Result<Vec<User>, AdminError> {
        Ok(self.list(&["admin", "users"], "users")?.records)
    }

    pub fn update_user(&self, id: &UserId, draft: &UserDraft) -> Result<(), AdminError> {
        self.put(&["admin", "users", id.as_str()], draft)
    }

    pub fn delete_user(&self, id: &UserId) -> Result<(), AdminError> {
        self.delete(&["admin", "users", id.as_str()])
    }

    pub fn list_articles(&self) -> Result<Listing<Article>, AdminError> {
        self.list(&["articles"], "articles")
    }

    pub fn update_article(&self, id: &ArticleId, draft: &ArticleDraft) -> Result<(), AdminError> {
        self.put(&["articles", id.as_str()], draft)
    }

    pub fn delete_article(&self, id: &ArticleId) -> Result<(), AdminError> {
        self.delete(&["articles", id.as_str()])
    }

    pub fn comments_for_article(&self, id: &ArticleId) -> Result<Vec<Comment>, AdminError> {
        Ok(self
            .list(&["comments", "article", id.as_str()], "comments")?
            .records)
    }

    pub fn delete_comment(&self, id: &CommentId) -> Result<(), AdminError> {
        self.delete(&["comments", id.as_str()])
    }

    /// Comments of the first `article_limit` articles, in article order, each
    /// tagged with its article's title. Per-article failures are skipped.
    pub fn recent_comments(&self, article_limit: usize) -> Result<Vec<Comment>, AdminError> {
        let articles = self.list_articles()?.records;
        let mut comments = Vec::new();
        for article in articles.iter().take(article_limit) {
            match self.comments_for_article(&article.id) {
                Ok(batch) => {
                    comments.extend(batch.into_iter().map(|mut comment| {
                        comment.article_title = Some(article.title.clone());
                        if comment.article_id.is_none() {
                            comment.article_id = Some(article.id.clone());
                        }
                        comment
                    }));
                }
                Err(error) => {
                    warn!(article = %article.id, %error, "skipping comments for article");
                }
            }
        }
        Ok(comments)
    }

    pub fn dashboard_stats(&self) -> Result<DashboardStats, AdminError> {
        let users = self.list_users()?;
        let articles = self.list_articles()?;
        let article_count = articles
            .total
            .and_then(|total| usize::try_from(total).ok())
            .unwrap_or(articles.records.len());
        Ok(DashboardStats {
            users: users.len(),
            articles: article_count,
            comments: articles.records.iter().map(Article::comment_count).sum(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, AdminError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| AdminError::transport("api.base_url cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, AdminError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request
            .send()
            .map_err(|error| connection_error(self.base_url(), &error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        Ok(response)
    }

    fn list<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        key: &str,
    ) -> Result<Listing<T>, AdminError> {
        let url = self.endpoint(segments)?;
        debug!(%url, "GET");
        let body: Value = self
            .send(self.http.get(url))?
            .json()
            .map_err(|error| AdminError::transport(format!("decode {key} response: {error}")))?;
        normalize_collection(body, key)
    }

    fn put<B: Serialize>(&self, segments: &[&str], body: &B) -> Result<(), AdminError> {
        let url = self.endpoint(segments)?;
        debug!(%url, "PUT");
        self.send(self.http.put(url).json(body))?;
        Ok(())
    }

    fn delete(&self, segments: &[&str]) -> Result<(), AdminError> {
        let url = self.endpoint(segments)?;
        debug!(%url, "DELETE");
        self.send(self.http.delete(url))?;
        Ok(())
    }
}

/// Binds a [`Client`] to the resource table controllers.
#[derive(Debug, Clone, Copy)]
pub struct ApiSource<'a> {
    client: &'a Client,
    comment_article_limit: usize,
}

impl<'a> ApiSource<'a> {
    pub fn new(client: &'a Client, comment_article_limit: usize) -> Self {
        Self {
            client,
            comment_article_limit,
        }
    }
}

impl ResourceSource<User> for ApiSource<'_> {
    fn fetch(&mut self) -> Result<Vec<User>, AdminError> {
        self.client.list_users()
    }

    fn update(&mut self, id: &UserId, draft: &UserDraft) -> Result<(), AdminError> {
        self.client.update_user(id, draft)
    }

    fn delete(&mut self, id: &UserId) -> Result<(), AdminError> {
        self.client.delete_user(id)
    }
}

impl ResourceSource<Article> for ApiSource<'_> {
    fn fetch(&mut self) -> Result<Vec<Article>, AdminError> {
        Ok(self.client.list_articles()?.records)
    }

    fn update(&mut self, id: &ArticleId, draft: &ArticleDraft) -> Result<(), AdminError> {
        self.client.update_article(id, draft)
    }

    fn delete(&mut self, id: &ArticleId) -> Result<(), AdminError> {
        self.client.delete_article(id)
    }
}

impl ResourceSource<Comment> for ApiSource<'_> {
    fn fetch(&mut self) -> Result<Vec<Comment>, AdminError> {
        self.client.recent_comments(self.comment_article_limit)
    }

    fn update(&mut self, _id: &CommentId, draft: &ReadOnly) -> Result<(), AdminError> {
        match *draft {}
    }

    fn delete(&mut self, id: &CommentId) -> Result<(), AdminError> {
        self.client.delete_comment(id)
    }
}

fn connection_error(base_url: &str, error: &reqwest::Error) -> AdminError {
    if error.is_timeout() {
        return AdminError::transport(format!(
            "request to {base_url} timed out -- raise [api] timeout or check the server"
        ));
    }
    AdminError::transport(format!(
        "cannot reach {base_url} -- is the API server running? ({error})"
    ))
}

fn clean_error_response(status: StatusCode, body: &str) -> AdminError {
    if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(body) {
        let message = ["error", "message"].iter().find_map(|key| match fields.get(*key) {
            Some(Value::String(message)) if !message.is_empty() => Some(message.clone()),
            Some(Value::Object(nested)) => nested
                .get("message")
                .and_then(Value::as_str)
                .filter(|message| !message.is_empty())
                .map(str::to_owned),
            _ => None,
        });
        if let Some(message) = message {
            return AdminError::transport(format!(
                "server error ({}): {message}",
                status.as_u16()
            ));
        }
    }

    let body = body.trim();
    if !body.is_empty() && body.len() < 100 && !body.contains('{') {
        return AdminError::transport(format!("server error ({}): {body}", status.as_u16()));
    }

    AdminError::transport(format!("server returned {}", status.as_u16()))
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}
