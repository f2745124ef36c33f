//! `reqwest`-backed implementation of [`TaskApi`] and [`AuthApi`].

use crate::api::{
    AuthApi, CheckUsernameRequest, CheckUsernameResponse, LoginRequest, LoginResponse,
    MotivationRequest, MotivationResponse, SignupRequest, SignupResponse, TaskApi,
};
use crate::error::{ApiError, ApiResult};
use crate::task::{NewTask, Task, TaskPatch};
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// One client serves both controllers so the session cookie set by
/// `/api/login` rides along on every later task request.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpClient {
    /// `timeout` of `None` lets a request run until the server answers.
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> ApiResult<Self> {
        let mut builder = Client::builder()
            .cookie_store(true)
            .redirect(Policy::none());
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Sends `token` as a bearer credential alongside the session cookie.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> ApiResult<Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status.is_redirection() {
            warn!("redirected with {}, session is gone", status);
            return Err(ApiError::Unauthorized {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.unwrap_or_default();
        let message = rejection_message(&body);
        warn!("request rejected with {}: {:?}", status, message);
        Err(ApiError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ApiResult<T> {
        let body = self.send(builder).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Pulls `message` (or `error`) out of a JSON error body.
fn rejection_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(|v| v.as_str()))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl TaskApi for HttpClient {
    async fn list_tasks(&self) -> ApiResult<Vec<Task>> {
        self.send_json(self.request(Method::GET, "/api/tasks")).await
    }

    async fn create_task(&self, task: &NewTask) -> ApiResult<Task> {
        self.send_json(self.request(Method::POST, "/api/tasks").json(task))
            .await
    }

    async fn update_task(&self, id: &str, patch: &TaskPatch) -> ApiResult<Task> {
        let path = format!("/api/tasks/{}", id);
        self.send_json(self.request(Method::PUT, &path).json(patch))
            .await
    }

    async fn delete_task(&self, id: &str) -> ApiResult<()> {
        let path = format!("/api/tasks/{}", id);
        self.send(self.request(Method::DELETE, &path)).await?;
        Ok(())
    }

    async fn motivational_message(&self, request: &MotivationRequest) -> ApiResult<String> {
        let response: MotivationResponse = self
            .send_json(
                self.request(Method::POST, "/api/motivational-message")
                    .json(request),
            )
            .await?;
        Ok(response.message)
    }
}

#[async_trait]
impl AuthApi for HttpClient {
    async fn login(&self, request: &LoginRequest) -> ApiResult<LoginResponse> {
        self.send_json(self.request(Method::POST, "/api/login").json(request))
            .await
    }

    async fn signup(&self, request: &SignupRequest) -> ApiResult<SignupResponse> {
        self.send_json(self.request(Method::POST, "/api/signup").json(request))
            .await
    }

    async fn check_username(&self, username: &str) -> ApiResult<bool> {
        let response: CheckUsernameResponse = self
            .send_json(
                self.request(Method::POST, "/api/check-username")
                    .json(&CheckUsernameRequest { username }),
            )
            .await?;
        Ok(response.available)
    }
}
