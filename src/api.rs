//! The REST surface the two controllers talk to.
//!
//! Controllers only see these traits; [`crate::http::HttpClient`] is the real
//! implementation and the unit tests swap in recording fakes.

use crate::error::ApiResult;
use crate::task::{NewTask, Task, TaskPatch};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotivationContext {
    OverdueGentle,
    OverdueEncouraging,
    CompletionCelebration,
    DailyMotivation,
}

impl MotivationContext {
    /// More than three overdue tasks calls for the encouraging tone.
    pub fn for_overdue(count: usize) -> Self {
        if count > 3 {
            MotivationContext::OverdueEncouraging
        } else {
            MotivationContext::OverdueGentle
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MotivationRequest {
    pub context: MotivationContext,
    pub days_overdue: i64,
    pub task_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct MotivationResponse {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub remember: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub favorite_beach: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(rename = "confirmPassword")]
    pub confirm_password: String,
    #[serde(rename = "favoriteBeach")]
    pub favorite_beach: String,
    pub terms: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SignupResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckUsernameRequest<'a> {
    pub username: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct CheckUsernameResponse {
    #[serde(default)]
    pub available: bool,
}

#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn list_tasks(&self) -> ApiResult<Vec<Task>>;

    async fn create_task(&self, task: &NewTask) -> ApiResult<Task>;

    async fn update_task(&self, id: &str, patch: &TaskPatch) -> ApiResult<Task>;

    async fn delete_task(&self, id: &str) -> ApiResult<()>;

    async fn motivational_message(&self, request: &MotivationRequest) -> ApiResult<String>;
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> ApiResult<LoginResponse>;

    async fn signup(&self, request: &SignupRequest) -> ApiResult<SignupResponse>;

    /// `true` when nobody has registered `username` yet.
    async fn check_username(&self, username: &str) -> ApiResult<bool>;
}
