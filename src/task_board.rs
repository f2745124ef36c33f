use crate::api::{MotivationContext, MotivationRequest, TaskApi};
use crate::calendar::{tasks_on, CalendarGrid, MonthCursor};
use crate::error::{ApiError, ApiResult};
use crate::notify::{greeting, Level, Notifications};
use crate::task::{
    max_days_overdue, overdue_tasks, BoardStats, DueDate, NewTask, ParseDueDateError, Task,
    TaskPatch,
};
use chrono::{Local, NaiveDate, NaiveDateTime};
use rand::seq::SliceRandom;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const FALLBACK_MOTIVATION: [&str; 3] = [
    "The tide hasn't turned yet 🌊 — you've still got this!",
    "Every wave begins somewhere. Take one small step today.",
    "Like shells on the shore, your tasks are waiting to be discovered 🐚",
];

#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("task title is empty")]
    EmptyTitle,

    #[error(transparent)]
    InvalidDueDate(#[from] ParseDueDateError),

    #[error("no cached task with id {0}")]
    UnknownTask(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl BoardError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, BoardError::Api(err) if err.is_unauthorized())
    }
}

/// Raw contents of the task input form.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    /// `YYYY-MM-DD`, or empty for no due date.
    pub due_date: String,
    /// Set while the form holds an existing task being edited.
    pub editing: Option<String>,
}

impl TaskDraft {
    fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone().unwrap_or_default(),
            due_date: task
                .due_date
                .map(|due| due.date().format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            editing: Some(task.id.clone()),
        }
    }

    pub fn parsed_due_date(&self) -> Result<Option<DueDate>, ParseDueDateError> {
        let raw = self.due_date.trim();
        if raw.is_empty() {
            Ok(None)
        } else {
            raw.parse().map(Some)
        }
    }

    pub fn is_editing(&self) -> bool {
        self.editing.is_some()
    }
}

/// A delete the user has been asked about but has not yet confirmed.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    id: String,
    title: String,
    prompt: String,
}

impl DeleteRequest {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn confirm(self) -> ConfirmedDelete {
        ConfirmedDelete {
            id: self.id,
            title: self.title,
        }
    }
}

/// Only obtainable through [`DeleteRequest::confirm`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedDelete {
    id: String,
    title: String,
}

/// A server call the board wants made. Run it with [`BoardRequest::send`],
/// anywhere, and hand the reply to [`TaskBoard::apply`].
#[derive(Debug)]
pub enum BoardRequest {
    Load,
    Motivation(MotivationRequest),
    Create {
        task: NewTask,
        from_draft: bool,
    },
    Update {
        id: String,
        patch: TaskPatch,
        from_draft: bool,
    },
    Delete(ConfirmedDelete),
}

#[derive(Debug)]
pub enum BoardReply {
    Loaded(ApiResult<Vec<Task>>),
    Motivation(ApiResult<String>),
    Created {
        from_draft: bool,
        result: ApiResult<Task>,
    },
    Updated {
        id: String,
        patch: TaskPatch,
        from_draft: bool,
        result: ApiResult<Task>,
    },
    Deleted {
        confirmed: ConfirmedDelete,
        result: ApiResult<()>,
    },
}

impl BoardRequest {
    pub async fn send(self, api: &dyn TaskApi) -> BoardReply {
        match self {
            BoardRequest::Load => BoardReply::Loaded(api.list_tasks().await),
            BoardRequest::Motivation(request) => {
                BoardReply::Motivation(api.motivational_message(&request).await)
            }
            BoardRequest::Create { task, from_draft } => BoardReply::Created {
                from_draft,
                result: api.create_task(&task).await,
            },
            BoardRequest::Update {
                id,
                patch,
                from_draft,
            } => {
                let result = api.update_task(&id, &patch).await;
                BoardReply::Updated {
                    id,
                    patch,
                    from_draft,
                    result,
                }
            }
            BoardRequest::Delete(confirmed) => {
                let result = api.delete_task(&confirmed.id).await;
                BoardReply::Deleted { confirmed, result }
            }
        }
    }
}

impl BoardReply {
    /// Whether this answers a submitted input form.
    pub fn from_draft(&self) -> bool {
        matches!(
            self,
            BoardReply::Created {
                from_draft: true,
                ..
            } | BoardReply::Updated {
                from_draft: true,
                ..
            }
        )
    }
}

pub struct TaskBoard {
    api: Arc<dyn TaskApi>,
    pub tasks: Vec<Task>,
    pub selected_task: usize,
    pub draft: TaskDraft,
    pub month: MonthCursor,
    pub notifications: Notifications,
    pub username: String,
    clock: fn() -> NaiveDateTime,
    in_flight: usize,
    draft_pending: bool,
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

impl TaskBoard {
    pub fn new(api: Arc<dyn TaskApi>, username: impl Into<String>) -> Self {
        Self {
            api,
            tasks: Vec::new(),
            selected_task: 0,
            draft: TaskDraft::default(),
            month: MonthCursor::current(local_now().date()),
            notifications: Notifications::new(),
            username: username.into(),
            clock: local_now,
            in_flight: 0,
            draft_pending: false,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self.month = MonthCursor::current(clock().date());
        self
    }

    pub fn api(&self) -> Arc<dyn TaskApi> {
        Arc::clone(&self.api)
    }

    fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date()
    }

    fn greeting(&self) -> String {
        greeting(&self.username, self.now())
    }

    fn notify(&mut self, level: Level, message: String) {
        self.notifications.push(level, message);
    }

    pub fn welcome(&mut self) {
        let message = format!(
            "🌊 Welcome to your ocean of productivity, {}! {}\n\nReady to make some waves today? 🏄‍♀️",
            self.username,
            self.greeting()
        );
        self.notify(Level::Success, message);
    }

    /// Any request still waiting for its reply.
    pub fn is_busy(&self) -> bool {
        self.in_flight > 0
    }

    /// The input form has been sent and its reply has not come back yet.
    pub fn is_submitting_draft(&self) -> bool {
        self.draft_pending
    }

    /// Counts `request` as outstanding until its reply goes through [`Self::apply`].
    pub fn track(&mut self, request: BoardRequest) -> BoardRequest {
        self.in_flight += 1;
        request
    }

    /// Folds a server reply into the board. A successful load may ask for a
    /// follow-up motivation request.
    pub fn apply(&mut self, reply: BoardReply) -> Result<Option<BoardRequest>, BoardError> {
        self.in_flight = self.in_flight.saturating_sub(1);
        if reply.from_draft() {
            self.draft_pending = false;
        }

        match reply {
            BoardReply::Loaded(result) => self.finish_load(result),
            BoardReply::Motivation(result) => {
                self.finish_motivation(result);
                Ok(None)
            }
            BoardReply::Created { from_draft, result } => {
                self.finish_create(from_draft, result).map(|_| None)
            }
            BoardReply::Updated {
                id,
                patch,
                from_draft,
                result,
            } => self.finish_update(&id, &patch, from_draft, result).map(|_| None),
            BoardReply::Deleted { confirmed, result } => {
                self.finish_delete(confirmed, result).map(|_| None)
            }
        }
    }

    /// Sends `request` and any follow-ups in place, waiting on each.
    async fn run(&mut self, request: BoardRequest) -> Result<(), BoardError> {
        let mut next = Some(request);
        while let Some(request) = next.take() {
            let request = self.track(request);
            let reply = request.send(self.api.as_ref()).await;
            next = self.apply(reply)?;
        }
        Ok(())
    }

    /// Replaces the cache with the server's list. A failed load keeps the old cache.
    pub async fn load(&mut self) -> Result<(), BoardError> {
        self.run(BoardRequest::Load).await
    }

    fn finish_load(
        &mut self,
        result: ApiResult<Vec<Task>>,
    ) -> Result<Option<BoardRequest>, BoardError> {
        match result {
            Ok(tasks) => {
                info!("loaded {} tasks", tasks.len());
                self.tasks = tasks;
                self.clamp_selection();
                Ok(self.overdue_request().map(BoardRequest::Motivation))
            }
            Err(err) => {
                error!("Failed to load tasks: {}", err);
                let message = if err.is_unauthorized() {
                    self.session_lost_text()
                } else if err.is_transport() {
                    format!(
                        "🌊 Connection troubles, {}. Please refresh when the tide returns!",
                        self.username
                    )
                } else {
                    err.user_message(&format!(
                        "🌊 Couldn't load your tasks, {}. The ocean seems choppy!",
                        self.username
                    ))
                };
                self.notify(Level::Error, message);
                Err(err.into())
            }
        }
    }

    /// The pep talk to ask for, when anything is overdue.
    pub fn overdue_request(&self) -> Option<MotivationRequest> {
        let now = self.now();
        let overdue = overdue_tasks(&self.tasks, now);
        if overdue.is_empty() {
            return None;
        }
        debug!("{} overdue tasks, asking for motivation", overdue.len());
        Some(MotivationRequest {
            context: MotivationContext::for_overdue(overdue.len()),
            days_overdue: max_days_overdue(&overdue, now),
            task_count: overdue.len(),
        })
    }

    fn finish_motivation(&mut self, result: ApiResult<String>) {
        let message = match result {
            Ok(message) => message,
            Err(err) => {
                warn!("motivational message unavailable: {}", err);
                fallback_motivation().to_string()
            }
        };
        let text = format!("{}\n\n{}", message, self.greeting());
        self.notify(Level::Warning, text);
    }

    fn new_task(
        &mut self,
        title: &str,
        description: &str,
        due_date: Option<DueDate>,
    ) -> Result<NewTask, BoardError> {
        let title = title.trim();
        if title.is_empty() {
            self.warn_empty_title();
            return Err(BoardError::EmptyTitle);
        }

        Ok(NewTask {
            title: title.to_string(),
            description: description.trim().to_string(),
            due_date,
        })
    }

    fn warn_empty_title(&mut self) {
        let message = format!(
            "🐚 {}, please add a task title like naming a precious shell!",
            self.username
        );
        self.notify(Level::Warning, message);
    }

    pub async fn add(
        &mut self,
        title: &str,
        description: &str,
        due_date: Option<DueDate>,
    ) -> Result<&Task, BoardError> {
        let task = self.new_task(title, description, due_date)?;
        self.run(BoardRequest::Create {
            task,
            from_draft: false,
        })
        .await?;
        let last = self.tasks.len() - 1;
        Ok(&self.tasks[last])
    }

    fn finish_create(
        &mut self,
        from_draft: bool,
        result: ApiResult<Task>,
    ) -> Result<(), BoardError> {
        match result {
            Ok(task) => {
                info!("created task {}", task.id);
                let message = format!(
                    "🌊 Task \"{}\" has been cast into your ocean, {}! {}",
                    task.title,
                    self.username,
                    self.greeting()
                );
                self.notify(Level::Success, message);
                self.tasks.push(task);
                if from_draft {
                    self.draft = TaskDraft::default();
                }
                Ok(())
            }
            Err(err) => {
                error!("Failed to add task: {}", err);
                let message = self.failure_text(
                    &err,
                    "Couldn't add your task",
                    "The waves seem rough right now!",
                );
                self.notify(Level::Error, message);
                Err(err.into())
            }
        }
    }

    /// Sends a partial update and swaps in the server's copy of the task.
    pub async fn update(&mut self, id: &str, patch: TaskPatch) -> Result<&Task, BoardError> {
        self.run(BoardRequest::Update {
            id: id.to_string(),
            patch,
            from_draft: false,
        })
        .await?;
        self.find(id).ok_or_else(|| BoardError::UnknownTask(id.to_string()))
    }

    fn finish_update(
        &mut self,
        id: &str,
        patch: &TaskPatch,
        from_draft: bool,
        result: ApiResult<Task>,
    ) -> Result<(), BoardError> {
        let updated = match result {
            Ok(task) => task,
            Err(err) => {
                error!("Failed to update task {}: {}", id, err);
                let message = self.failure_text(
                    &err,
                    "Couldn't update your task",
                    "The tide seems to be against us!",
                );
                self.notify(Level::Error, message);
                return Err(err.into());
            }
        };

        let message = match patch.completed {
            Some(true) => format!(
                "⭐ Fantastic, {}! \"{}\" completed like a perfect seashell! {}",
                self.username,
                updated.title,
                self.greeting()
            ),
            Some(false) => format!(
                "🌊 Task \"{}\" is back in your ocean, {}! {}",
                updated.title,
                self.username,
                self.greeting()
            ),
            None => format!(
                "🐚 Task \"{}\" updated successfully, {}! {}",
                updated.title,
                self.username,
                self.greeting()
            ),
        };
        let level = if patch.completed == Some(false) {
            Level::Info
        } else {
            Level::Success
        };

        match self.tasks.iter().position(|t| t.id == id) {
            Some(index) => self.tasks[index] = updated,
            None => {
                // deleted elsewhere while the request was in flight
                debug!("updated task {} is no longer cached", id);
                self.tasks.push(updated);
            }
        }
        if from_draft {
            self.draft = TaskDraft::default();
        }
        self.notify(level, message);
        Ok(())
    }

    /// The update that flips a cached task's completion.
    pub fn toggle_request(&self, id: &str) -> Result<BoardRequest, BoardError> {
        let completed = self
            .find(id)
            .map(|t| t.completed)
            .ok_or_else(|| BoardError::UnknownTask(id.to_string()))?;
        Ok(BoardRequest::Update {
            id: id.to_string(),
            patch: TaskPatch::completed(!completed),
            from_draft: false,
        })
    }

    pub async fn toggle_complete(&mut self, id: &str) -> Result<&Task, BoardError> {
        let request = self.toggle_request(id)?;
        self.run(request).await?;
        self.find(id).ok_or_else(|| BoardError::UnknownTask(id.to_string()))
    }

    /// First half of a delete: builds the question to put to the user.
    pub fn request_delete(&self, id: &str) -> DeleteRequest {
        let title = self
            .find(id)
            .map(|t| t.title.clone())
            .unwrap_or_else(|| "Unknown task".to_string());
        let prompt = format!(
            "🌊 {}, are you sure you want to let \"{}\" drift away into the deep ocean? This cannot be undone!",
            self.username, title
        );
        DeleteRequest {
            id: id.to_string(),
            title,
            prompt,
        }
    }

    pub async fn delete(&mut self, confirmed: ConfirmedDelete) -> Result<(), BoardError> {
        self.run(BoardRequest::Delete(confirmed)).await
    }

    fn finish_delete(
        &mut self,
        confirmed: ConfirmedDelete,
        result: ApiResult<()>,
    ) -> Result<(), BoardError> {
        let ConfirmedDelete { id, title } = confirmed;
        if let Err(err) = result {
            error!("Failed to delete task {}: {}", id, err);
            let message = self.failure_text(
                &err,
                "Couldn't delete the task",
                "It seems to be anchored too deep!",
            );
            self.notify(Level::Error, message);
            return Err(err.into());
        }

        self.tasks.retain(|t| t.id != id);
        self.clamp_selection();
        if self.draft.editing.as_deref() == Some(id.as_str()) {
            self.draft = TaskDraft::default();
        }
        let message = format!(
            "🗑️ Task \"{}\" has drifted away, {}. {}",
            title,
            self.username,
            self.greeting()
        );
        self.notify(Level::Info, message);
        Ok(())
    }

    /// Loads a cached task into the form. The task itself is not touched until
    /// the draft is submitted, and then only by a single update.
    pub fn edit(&mut self, id: &str) -> Result<(), BoardError> {
        let task = self
            .find(id)
            .cloned()
            .ok_or_else(|| BoardError::UnknownTask(id.to_string()))?;
        self.draft = TaskDraft::from_task(&task);
        let message = format!(
            "✏️ Editing \"{}\", {}! Make your changes and cast it back into the ocean. {}",
            task.title,
            self.username,
            self.greeting()
        );
        self.notify(Level::Info, message);
        Ok(())
    }

    pub fn cancel_edit(&mut self) {
        self.draft = TaskDraft::default();
    }

    /// Turns the input form into a create, or into an update of the changed
    /// fields of the task being edited. `None` when an edit changed nothing.
    pub fn draft_request(&mut self) -> Result<Option<BoardRequest>, BoardError> {
        let due_date = match self.draft.parsed_due_date() {
            Ok(due) => due,
            Err(err) => {
                let message = format!(
                    "📅 {}, \"{}\" is not a date the tides understand. Use YYYY-MM-DD.",
                    self.username, err.0
                );
                self.notify(Level::Warning, message);
                return Err(err.into());
            }
        };
        let draft = self.draft.clone();

        let request = match &draft.editing {
            None => BoardRequest::Create {
                task: self.new_task(&draft.title, &draft.description, due_date)?,
                from_draft: true,
            },
            Some(id) => {
                if draft.title.trim().is_empty() {
                    self.warn_empty_title();
                    return Err(BoardError::EmptyTitle);
                }
                let original = self
                    .find(id)
                    .ok_or_else(|| BoardError::UnknownTask(id.clone()))?;
                let patch = edit_patch(original, &draft, due_date);
                if patch.is_empty() {
                    self.notify(Level::Info, format!("🐚 Nothing changed, {}.", self.username));
                    self.draft = TaskDraft::default();
                    return Ok(None);
                }
                BoardRequest::Update {
                    id: id.clone(),
                    patch,
                    from_draft: true,
                }
            }
        };
        self.draft_pending = true;
        Ok(Some(request))
    }

    /// Submits the input form and waits for the server.
    pub async fn submit_draft(&mut self) -> Result<(), BoardError> {
        if let Some(request) = self.draft_request()? {
            self.run(request).await?;
        }
        Ok(())
    }

    pub fn show_month(&mut self, offset: i32) {
        self.month = MonthCursor::current(self.today()).shifted(offset);
    }

    pub fn prev_month(&mut self) {
        self.month = self.month.prev();
    }

    pub fn next_month(&mut self) {
        self.month = self.month.next();
    }

    pub fn calendar(&self) -> CalendarGrid {
        CalendarGrid::build(self.month, &self.tasks, self.today())
    }

    /// Lists the tasks due on `date` as a notification.
    pub fn select_day(&mut self, date: NaiveDate) -> usize {
        let titles: Vec<String> = tasks_on(&self.tasks, date)
            .iter()
            .map(|t| format!("• {}", t.title))
            .collect();
        let day = date.format("%-m/%-d/%Y");
        let message = if titles.is_empty() {
            format!(
                "🏖️ No tasks scheduled for {}, {}! Perfect day for beach relaxation. {}",
                day,
                self.username,
                self.greeting()
            )
        } else {
            format!(
                "📅 {}, here are your tasks for {}:\n\n{}\n\n{}",
                self.username,
                day,
                titles.join("\n"),
                self.greeting()
            )
        };
        self.notify(Level::Info, message);
        titles.len()
    }

    pub fn is_overdue(&self, task: &Task) -> bool {
        task.is_overdue(self.now())
    }

    pub fn stats(&self) -> BoardStats {
        BoardStats::of(&self.tasks)
    }

    pub fn find(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn selected(&self) -> Option<&Task> {
        self.tasks.get(self.selected_task)
    }

    pub fn select_next(&mut self) {
        if self.selected_task + 1 < self.tasks.len() {
            self.selected_task += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected_task = self.selected_task.saturating_sub(1);
    }

    fn clamp_selection(&mut self) {
        self.selected_task = self.selected_task.min(self.tasks.len().saturating_sub(1));
    }

    fn session_lost_text(&self) -> String {
        format!(
            "🐚 Your session has drifted out to sea, {}. Please log in again!",
            self.username
        )
    }

    fn failure_text(&self, err: &ApiError, what: &str, flavour: &str) -> String {
        if err.is_unauthorized() {
            self.session_lost_text()
        } else if err.is_transport() {
            format!(
                "🌊 Connection troubles, {}. Please try again when the tide returns!",
                self.username
            )
        } else {
            err.user_message(&format!("🏖️ {}, {}. {}", what, self.username, flavour))
        }
    }
}

fn fallback_motivation() -> &'static str {
    FALLBACK_MOTIVATION
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(FALLBACK_MOTIVATION[0])
}

fn edit_patch(original: &Task, draft: &TaskDraft, due_date: Option<DueDate>) -> TaskPatch {
    let title = draft.title.trim();
    let description = draft.description.trim();
    let original_due_day = original.due_date.map(|d| d.date());

    TaskPatch {
        title: (title != original.title).then(|| title.to_string()),
        description: (description != original.description.as_deref().unwrap_or(""))
            .then(|| description.to_string()),
        // the form only edits the day; keep the stored time when the day is unchanged
        due_date: (due_date.map(|d| d.date()) != original_due_day).then_some(due_date),
        completed: None,
    }
}
