//! Login and signup forms: per-field validity, the signup submission gate,
//! and the two controllers that talk to the auth endpoints.

use crate::api::{AuthApi, LoginRequest, LoginResponse, SignupRequest, SignupResponse};
use crate::error::{ApiError, ApiResult};
use crate::notify::Level;
use crate::session::StoredSession;
use chrono::Local;
use regex::Regex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Username,
    Email,
    Password,
    ConfirmPassword,
    FavoriteBeach,
    Terms,
    Remember,
}

/// Signup fields in the order they are validated and tabbed through.
pub const SIGNUP_FIELDS: [Field; 6] = [
    Field::Username,
    Field::Email,
    Field::Password,
    Field::ConfirmPassword,
    Field::FavoriteBeach,
    Field::Terms,
];

pub const LOGIN_FIELDS: [Field; 3] = [Field::Username, Field::Password, Field::Remember];

impl Field {
    pub fn label(self) -> &'static str {
        match self {
            Field::Username => "Username",
            Field::Email => "Email",
            Field::Password => "Password",
            Field::ConfirmPassword => "Confirm password",
            Field::FavoriteBeach => "Beach vibe",
            Field::Terms => "Ride the waves responsibly",
            Field::Remember => "Remember me",
        }
    }

    pub fn is_secret(self) -> bool {
        matches!(self, Field::Password | Field::ConfirmPassword)
    }

    /// Next field in `order`, wrapping around.
    pub fn next_in(self, order: &[Field]) -> Field {
        let index = order.iter().position(|f| *f == self).unwrap_or(0);
        order[(index + 1) % order.len()]
    }

    pub fn prev_in(self, order: &[Field]) -> Field {
        let index = order.iter().position(|f| *f == self).unwrap_or(0);
        order[(index + order.len() - 1) % order.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldState {
    #[default]
    Empty,
    Invalid,
    Valid,
}

impl FieldState {
    fn of(value: &str, valid: bool) -> Self {
        if value.is_empty() {
            FieldState::Empty
        } else if valid {
            FieldState::Valid
        } else {
            FieldState::Invalid
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeachVibe {
    Tropical,
    Sandy,
    Rocky,
    Surf,
    Sunset,
}

impl BeachVibe {
    pub const ALL: [BeachVibe; 5] = [
        BeachVibe::Tropical,
        BeachVibe::Sandy,
        BeachVibe::Rocky,
        BeachVibe::Surf,
        BeachVibe::Sunset,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BeachVibe::Tropical => "tropical",
            BeachVibe::Sandy => "sandy",
            BeachVibe::Rocky => "rocky",
            BeachVibe::Surf => "surf",
            BeachVibe::Sunset => "sunset",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BeachVibe::Tropical => "🌴 Tropical paradise",
            BeachVibe::Sandy => "🏖️ Sandy shores",
            BeachVibe::Rocky => "🪨 Rocky coves",
            BeachVibe::Surf => "🏄 Surf break",
            BeachVibe::Sunset => "🌅 Sunset strip",
        }
    }

    /// Cycles none → first → ... → last → none.
    pub fn cycle(current: Option<BeachVibe>) -> Option<BeachVibe> {
        match current {
            None => Some(Self::ALL[0]),
            Some(vibe) => {
                let index = Self::ALL.iter().position(|v| *v == vibe).unwrap_or(0);
                Self::ALL.get(index + 1).copied()
            }
        }
    }
}

fn username_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("username pattern compiles"))
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles")
    })
}

pub fn username_length_ok(username: &str) -> bool {
    (3..=20).contains(&username.chars().count())
}

pub fn username_charset_ok(username: &str) -> bool {
    username_pattern().is_match(username)
}

pub fn is_valid_username(username: &str) -> bool {
    username_length_ok(username) && username_charset_ok(username)
}

pub fn is_valid_email(email: &str) -> bool {
    email_pattern().is_match(email)
}

pub fn is_valid_password(password: &str) -> bool {
    password.chars().count() >= 6
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignupDraft {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub favorite_beach: Option<BeachVibe>,
    pub terms: bool,
}

impl SignupDraft {
    fn request(&self) -> SignupRequest {
        SignupRequest {
            username: self.username.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password.clone(),
            confirm_password: self.confirm_password.clone(),
            favorite_beach: self
                .favorite_beach
                .map(|v| v.as_str().to_string())
                .unwrap_or_default(),
            terms: self.terms,
        }
    }
}

/// The first rule a form broke, and what to tell the user about it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct Rejection {
    pub field: Field,
    pub message: &'static str,
}

fn reject(field: Field, message: &'static str) -> Result<(), Rejection> {
    Err(Rejection { field, message })
}

/// Runs every signup rule in order; the first failure wins.
pub fn validate_signup(draft: &SignupDraft) -> Result<(), Rejection> {
    let username = draft.username.trim();
    let email = draft.email.trim();

    if !username_length_ok(username) {
        return reject(
            Field::Username,
            "🏄‍♀️ Your beach name should be 3-20 characters long!",
        );
    }
    if !username_charset_ok(username) {
        return reject(
            Field::Username,
            "🐚 Beach names can only contain letters, numbers, and underscores!",
        );
    }
    if !is_valid_email(email) {
        return reject(
            Field::Email,
            "📧 Please provide a valid email address for your beach mail!",
        );
    }
    if !is_valid_password(&draft.password) {
        return reject(
            Field::Password,
            "🔒 Your password should be at least 6 characters long!",
        );
    }
    if draft.password != draft.confirm_password {
        return reject(
            Field::ConfirmPassword,
            "🔐 Your passwords don't match like synchronized waves!",
        );
    }
    if draft.favorite_beach.is_none() {
        return reject(
            Field::FavoriteBeach,
            "🌊 Please choose your beach vibe to personalize your experience!",
        );
    }
    if !draft.terms {
        return reject(Field::Terms, "🏖️ Please agree to ride the waves responsibly!");
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub level: Level,
    pub message: String,
}

impl Feedback {
    fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error(transparent)]
    Api(#[from] ApiError),
}

const CHOPPY: &str = "🌊 The ocean connection seems choppy. Please try again in a moment!";

fn clock_time() -> String {
    Local::now().format("%-I:%M %p").to_string()
}

fn failure_feedback(err: &ApiError, fallback: &str) -> Feedback {
    let message = if err.is_transport() {
        CHOPPY.to_string()
    } else {
        err.user_message(fallback)
    };
    Feedback::new(Level::Error, message)
}

pub struct SignupController {
    api: Arc<dyn AuthApi>,
    pub draft: SignupDraft,
    pub focus: Field,
    pub feedback: Option<Feedback>,
    states: HashMap<Field, FieldState>,
    submitting: bool,
}

impl SignupController {
    pub fn new(api: Arc<dyn AuthApi>) -> Self {
        Self {
            api,
            draft: SignupDraft::default(),
            focus: Field::Username,
            feedback: None,
            states: HashMap::new(),
            submitting: false,
        }
    }

    pub fn api(&self) -> Arc<dyn AuthApi> {
        Arc::clone(&self.api)
    }

    pub fn state(&self, field: Field) -> FieldState {
        self.states.get(&field).copied().unwrap_or_default()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    fn text_mut(&mut self, field: Field) -> Option<&mut String> {
        match field {
            Field::Username => Some(&mut self.draft.username),
            Field::Email => Some(&mut self.draft.email),
            Field::Password => Some(&mut self.draft.password),
            Field::ConfirmPassword => Some(&mut self.draft.confirm_password),
            _ => None,
        }
    }

    /// Replaces a text field's value and re-derives its state.
    pub fn set_field(&mut self, field: Field, value: impl Into<String>) {
        if let Some(slot) = self.text_mut(field) {
            *slot = value.into();
            self.on_input(field);
        }
    }

    pub fn push_char(&mut self, c: char) {
        let field = self.focus;
        if let Some(slot) = self.text_mut(field) {
            slot.push(c);
            self.on_input(field);
        }
    }

    pub fn pop_char(&mut self) {
        let field = self.focus;
        if let Some(slot) = self.text_mut(field) {
            slot.pop();
            self.on_input(field);
        }
    }

    /// Space on a choice field: cycle the beach vibe or flip the terms box.
    pub fn toggle_focused(&mut self) {
        match self.focus {
            Field::FavoriteBeach => {
                self.draft.favorite_beach = BeachVibe::cycle(self.draft.favorite_beach)
            }
            Field::Terms => self.draft.terms = !self.draft.terms,
            _ => self.push_char(' '),
        }
    }

    /// Recomputes the state of `field` from the current draft.
    pub fn on_input(&mut self, field: Field) {
        let draft = &self.draft;
        let state = match field {
            Field::Username => {
                let username = draft.username.trim();
                FieldState::of(username, is_valid_username(username))
            }
            Field::Email => FieldState::of(&draft.email, is_valid_email(&draft.email)),
            Field::Password => {
                let state = FieldState::of(&draft.password, is_valid_password(&draft.password));
                self.on_input(Field::ConfirmPassword);
                state
            }
            Field::ConfirmPassword => FieldState::of(
                &draft.confirm_password,
                draft.confirm_password == draft.password,
            ),
            _ => return,
        };
        self.states.insert(field, state);
    }

    /// Moves focus; leaving the username field returns the name worth checking.
    pub fn focus_field(&mut self, field: Field) -> Option<String> {
        let left = self.focus;
        self.focus = field;
        if left == Field::Username && field != Field::Username {
            self.on_username_blur()
        } else {
            None
        }
    }

    /// The name to look up, if it could be registered at all.
    pub fn on_username_blur(&self) -> Option<String> {
        let username = self.draft.username.trim();
        is_valid_username(username).then(|| username.to_string())
    }

    /// Applies an availability answer unless the user has typed a different name since.
    pub fn apply_availability(&mut self, username: &str, available: bool) -> bool {
        if self.draft.username.trim() != username {
            debug!("dropping stale availability result for {}", username);
            return false;
        }

        if available {
            if is_valid_username(username) {
                self.states.insert(Field::Username, FieldState::Valid);
            }
        } else {
            self.states.insert(Field::Username, FieldState::Invalid);
            self.feedback = Some(Feedback::new(
                Level::Warning,
                format!(
                    "🏄‍♀️ The beach name \"{}\" is already taken! Try another wave-rider name.",
                    username
                ),
            ));
        }
        true
    }

    /// Checks and applies availability in one go. Lookup failures are only logged.
    pub async fn check_username_availability(&mut self) {
        let Some(username) = self.on_username_blur() else {
            return;
        };
        if let Some(available) = check_username(self.api.as_ref(), &username).await {
            self.apply_availability(&username, available);
        }
    }

    /// Validates locally and marks the form as submitting. The returned
    /// request still has to be sent and its result passed to [`Self::finish_submit`].
    pub fn begin_submit(&mut self) -> Result<SignupRequest, FormError> {
        if let Err(rejection) = validate_signup(&self.draft) {
            debug!("signup rejected locally at {:?}", rejection.field);
            self.focus = rejection.field;
            self.feedback = Some(Feedback::new(Level::Error, rejection.message));
            return Err(rejection.into());
        }

        self.submitting = true;
        Ok(self.draft.request())
    }

    /// Returns the new username for the login prefill.
    pub fn finish_submit(
        &mut self,
        username: &str,
        result: ApiResult<SignupResponse>,
    ) -> Result<String, FormError> {
        self.submitting = false;

        match result {
            Ok(_) => {
                info!("signed up {}", username);
                self.feedback = Some(Feedback::new(
                    Level::Success,
                    format!(
                        "🌊 Welcome to the ocean, {}! Your beach paradise awaits! Redirecting to login... ({})",
                        username,
                        clock_time()
                    ),
                ));
                Ok(username.to_string())
            }
            Err(err) => {
                error!("Signup error: {}", err);
                self.feedback = Some(failure_feedback(
                    &err,
                    "🏖️ The waves seem rough today. Please try again!",
                ));
                Err(err.into())
            }
        }
    }

    /// Validates, registers and waits for the answer.
    pub async fn submit(&mut self) -> Result<String, FormError> {
        let request = self.begin_submit()?;
        let result = self.api.signup(&request).await;
        self.finish_submit(&request.username, result)
    }
}

/// `Some(available)`, or `None` when the lookup itself failed.
pub async fn check_username(api: &dyn AuthApi, username: &str) -> Option<bool> {
    match api.check_username(username).await {
        Ok(available) => Some(available),
        Err(err) => {
            warn!("Username check error: {}", err);
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedIn {
    pub username: String,
    pub token: Option<String>,
}

pub struct LoginController {
    api: Arc<dyn AuthApi>,
    session_path: Option<PathBuf>,
    pub username: String,
    pub password: String,
    pub remember: bool,
    pub focus: Field,
    pub feedback: Option<Feedback>,
    submitting: bool,
}

impl LoginController {
    pub fn new(api: Arc<dyn AuthApi>) -> Self {
        Self {
            api,
            session_path: None,
            username: String::new(),
            password: String::new(),
            remember: false,
            focus: Field::Username,
            feedback: None,
            submitting: false,
        }
    }

    /// Where a successful login records the username and token.
    pub fn with_session_path(mut self, path: PathBuf) -> Self {
        self.session_path = Some(path);
        self
    }

    pub fn prefill(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        if !self.username.is_empty() {
            self.focus = Field::Password;
        }
        self
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn push_char(&mut self, c: char) {
        match self.focus {
            Field::Username => self.username.push(c),
            Field::Password => self.password.push(c),
            Field::Remember if c == ' ' => self.remember = !self.remember,
            _ => {}
        }
    }

    pub fn pop_char(&mut self) {
        match self.focus {
            Field::Username => {
                self.username.pop();
            }
            Field::Password => {
                self.password.pop();
            }
            _ => {}
        }
    }

    pub fn forgot_password(&mut self) {
        self.feedback = Some(Feedback::new(
            Level::Info,
            "🌊 Like the tide, your password will return to you soon! Check your email for reset instructions.",
        ));
    }

    pub fn api(&self) -> Arc<dyn AuthApi> {
        Arc::clone(&self.api)
    }

    /// Only checks that both fields are filled; the server judges the rest.
    /// Marks the form as submitting until [`Self::finish_submit`] sees the answer.
    pub fn begin_submit(&mut self) -> Result<LoginRequest, FormError> {
        let username = self.username.trim().to_string();
        let password = self.password.trim().to_string();

        if username.is_empty() || password.is_empty() {
            let rejection = Rejection {
                field: if username.is_empty() {
                    Field::Username
                } else {
                    Field::Password
                },
                message: "🐚 Please fill in both your username and password like shells completing a collection!",
            };
            self.focus = rejection.field;
            self.feedback = Some(Feedback::new(Level::Error, rejection.message));
            return Err(rejection.into());
        }

        self.submitting = true;
        Ok(LoginRequest {
            username,
            password,
            remember: self.remember,
        })
    }

    pub fn finish_submit(
        &mut self,
        username: &str,
        result: ApiResult<LoginResponse>,
    ) -> Result<LoggedIn, FormError> {
        self.submitting = false;

        match result {
            Ok(response) => {
                info!("logged in as {}", username);
                self.store_session(username, response.token.clone());
                self.feedback = Some(Feedback::new(
                    Level::Success,
                    format!(
                        "🌊 Welcome back to your ocean of productivity, {}! Redirecting... ({})",
                        username,
                        clock_time()
                    ),
                ));
                Ok(LoggedIn {
                    username: username.to_string(),
                    token: response.token,
                })
            }
            Err(err) => {
                error!("Login error: {}", err);
                self.feedback = Some(failure_feedback(
                    &err,
                    "🏖️ The waves seem rough today. Please check your credentials and try again!",
                ));
                Err(err.into())
            }
        }
    }

    pub async fn submit(&mut self) -> Result<LoggedIn, FormError> {
        let request = self.begin_submit()?;
        let result = self.api.login(&request).await;
        self.finish_submit(&request.username, result)
    }

    fn store_session(&self, username: &str, token: Option<String>) {
        let Some(path) = &self.session_path else {
            return;
        };
        let session = StoredSession {
            username: username.to_string(),
            token,
        };
        if let Err(err) = session.save_to(path) {
            warn!("could not store session: {:#}", err);
        }
    }
}
