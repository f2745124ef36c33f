//! Terminal front end: turns key events into controller calls.
//!
//! Server calls never run on the loop itself. They are spawned, and their
//! answers come back as [`AppEvent`]s that are applied between frames.

use crate::api::{AuthApi, LoginRequest, LoginResponse, SignupRequest, SignupResponse, TaskApi};
use crate::auth_form::{
    check_username, LoginController, SignupController, LOGIN_FIELDS, SIGNUP_FIELDS,
};
use crate::calendar::MonthCursor;
use crate::draw;
use crate::error::ApiResult;
use crate::http::HttpClient;
use crate::task_board::{BoardReply, BoardRequest, DeleteRequest, TaskBoard};
use chrono::{NaiveDate, TimeDelta};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{backend::Backend, Terminal};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::debug;

/// Results that arrive from spawned work rather than from the keyboard.
#[derive(Debug)]
pub enum AppEvent {
    UsernameChecked {
        username: String,
        available: bool,
    },
    LoggedIn {
        username: String,
        result: ApiResult<LoginResponse>,
    },
    SignedUp {
        username: String,
        result: ApiResult<SignupResponse>,
    },
    Board(BoardReply),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartScreen {
    Login,
    Signup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    Title,
    Description,
    DueDate,
}

impl DraftField {
    fn next(self) -> Self {
        match self {
            DraftField::Title => DraftField::Description,
            DraftField::Description => DraftField::DueDate,
            DraftField::DueDate => DraftField::Title,
        }
    }

    fn prev(self) -> Self {
        match self {
            DraftField::Title => DraftField::DueDate,
            DraftField::Description => DraftField::Title,
            DraftField::DueDate => DraftField::Description,
        }
    }
}

pub enum BoardMode {
    Browse,
    Form(DraftField),
    Confirm(DeleteRequest),
}

pub struct BoardScreen {
    pub board: TaskBoard,
    pub mode: BoardMode,
    pub day_cursor: NaiveDate,
}

impl BoardScreen {
    fn new(board: TaskBoard) -> Self {
        let day_cursor = board.today();
        Self {
            board,
            mode: BoardMode::Browse,
            day_cursor,
        }
    }

    fn move_cursor(&mut self, days: i64) {
        self.day_cursor += TimeDelta::days(days);
        self.board.month = MonthCursor::current(self.day_cursor);
    }

    fn draft_field_mut(&mut self, field: DraftField) -> &mut String {
        match field {
            DraftField::Title => &mut self.board.draft.title,
            DraftField::Description => &mut self.board.draft.description,
            DraftField::DueDate => &mut self.board.draft.due_date,
        }
    }
}

pub enum Screen {
    Login(LoginController),
    Signup(SignupController),
    Board(BoardScreen),
}

enum Transition {
    Stay,
    ToLogin(Option<String>),
    ToSignup,
    ToBoard(String),
    Quit,
}

/// Spawns server calls and routes their answers back to the loop.
#[derive(Clone)]
struct Background {
    client: Arc<HttpClient>,
    events: mpsc::UnboundedSender<AppEvent>,
}

impl Background {
    fn deliver(events: &mpsc::UnboundedSender<AppEvent>, event: AppEvent) {
        // the receiver is gone only when the app is shutting down
        let _ = events.send(event);
    }

    fn board(&self, board: &mut TaskBoard, request: BoardRequest) {
        let request = board.track(request);
        let api: Arc<dyn TaskApi> = self.client.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let reply = request.send(api.as_ref()).await;
            Self::deliver(&events, AppEvent::Board(reply));
        });
    }

    fn login(&self, request: LoginRequest) {
        let client = self.client.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = client.login(&request).await;
            let username = request.username;
            Self::deliver(&events, AppEvent::LoggedIn { username, result });
        });
    }

    fn signup(&self, request: SignupRequest) {
        let client = self.client.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = client.signup(&request).await;
            let username = request.username;
            Self::deliver(&events, AppEvent::SignedUp { username, result });
        });
    }

    fn username_check(&self, username: String) {
        let api: Arc<dyn AuthApi> = self.client.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            if let Some(available) = check_username(api.as_ref(), &username).await {
                Self::deliver(
                    &events,
                    AppEvent::UsernameChecked {
                        username,
                        available,
                    },
                );
            }
        });
    }
}

pub struct App {
    background: Background,
    session_path: Option<PathBuf>,
    pub screen: Screen,
    events_rx: mpsc::UnboundedReceiver<AppEvent>,
}

impl App {
    pub fn new(client: Arc<HttpClient>, session_path: Option<PathBuf>) -> Self {
        let (events, events_rx) = mpsc::unbounded_channel();
        let screen = Screen::Login(LoginController::new(client.clone()));
        Self {
            background: Background { client, events },
            session_path,
            screen,
            events_rx,
        }
    }

    pub fn start(&mut self, start: StartScreen, username: Option<String>) {
        let transition = match start {
            StartScreen::Login => Transition::ToLogin(username),
            StartScreen::Signup => Transition::ToSignup,
        };
        self.apply(transition);
    }

    /// Returns `false` once the user asked to quit.
    fn apply(&mut self, transition: Transition) -> bool {
        let client = self.background.client.clone();
        match transition {
            Transition::Stay => {}
            Transition::Quit => return false,
            Transition::ToLogin(prefill) => {
                let mut login = LoginController::new(client);
                if let Some(path) = &self.session_path {
                    login = login.with_session_path(path.clone());
                }
                if let Some(username) = prefill {
                    login = login.prefill(username);
                }
                self.screen = Screen::Login(login);
            }
            Transition::ToSignup => {
                self.screen = Screen::Signup(SignupController::new(client));
            }
            Transition::ToBoard(username) => {
                let mut board = TaskBoard::new(client, username);
                board.welcome();
                self.background.board(&mut board, BoardRequest::Load);
                self.screen = Screen::Board(BoardScreen::new(board));
            }
        }
        true
    }

    fn handle_app_event(&mut self, event: AppEvent) -> bool {
        let transition = match (event, &mut self.screen) {
            (
                AppEvent::UsernameChecked {
                    username,
                    available,
                },
                Screen::Signup(signup),
            ) => {
                signup.apply_availability(&username, available);
                Transition::Stay
            }
            (AppEvent::LoggedIn { username, result }, Screen::Login(login)) => {
                match login.finish_submit(&username, result) {
                    Ok(logged_in) => Transition::ToBoard(logged_in.username),
                    Err(err) => {
                        debug!("login not completed: {}", err);
                        Transition::Stay
                    }
                }
            }
            (AppEvent::SignedUp { username, result }, Screen::Signup(signup)) => {
                match signup.finish_submit(&username, result) {
                    Ok(username) => Transition::ToLogin(Some(username)),
                    Err(err) => {
                        debug!("signup not completed: {}", err);
                        Transition::Stay
                    }
                }
            }
            (AppEvent::Board(reply), Screen::Board(screen)) => {
                board_reply(screen, &self.background, reply)
            }
            (event, _) => {
                debug!("dropping {:?} for a screen that is gone", event);
                Transition::Stay
            }
        };
        self.apply(transition)
    }

    fn tick(&mut self, now: Instant) {
        if let Screen::Board(screen) = &mut self.screen {
            screen.board.notifications.prune(now);
        }
    }

    /// Returns `false` once the user asked to quit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        let background = &self.background;
        let transition = match &mut self.screen {
            Screen::Login(login) => login_key(login, key, background),
            Screen::Signup(signup) => signup_key(signup, key, background),
            Screen::Board(screen) => board_key(screen, key, background),
        };
        self.apply(transition)
    }
}

fn board_reply(screen: &mut BoardScreen, background: &Background, reply: BoardReply) -> Transition {
    let closes_form = reply.from_draft();
    match screen.board.apply(reply) {
        Ok(next) => {
            if closes_form && matches!(screen.mode, BoardMode::Form(_)) {
                screen.mode = BoardMode::Browse;
            }
            if let Some(request) = next {
                background.board(&mut screen.board, request);
            }
            Transition::Stay
        }
        Err(err) if err.is_unauthorized() => {
            Transition::ToLogin(Some(screen.board.username.clone()))
        }
        Err(err) => {
            debug!("board request not completed: {}", err);
            Transition::Stay
        }
    }
}

fn login_key(login: &mut LoginController, key: KeyEvent, background: &Background) -> Transition {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => return Transition::Quit,
        KeyCode::Char('s') if ctrl => return Transition::ToSignup,
        KeyCode::Char('f') if ctrl => login.forgot_password(),
        KeyCode::Tab | KeyCode::Down => login.focus = login.focus.next_in(&LOGIN_FIELDS),
        KeyCode::BackTab | KeyCode::Up => login.focus = login.focus.prev_in(&LOGIN_FIELDS),
        KeyCode::Enter if login.is_submitting() => {}
        KeyCode::Enter => match login.begin_submit() {
            Ok(request) => background.login(request),
            Err(err) => debug!("login not sent: {}", err),
        },
        KeyCode::Backspace => login.pop_char(),
        KeyCode::Char(c) => login.push_char(c),
        _ => {}
    }
    Transition::Stay
}

fn signup_key(signup: &mut SignupController, key: KeyEvent, background: &Background) -> Transition {
    let target = match key.code {
        KeyCode::Esc => return Transition::ToLogin(None),
        KeyCode::Tab | KeyCode::Down => Some(signup.focus.next_in(&SIGNUP_FIELDS)),
        KeyCode::BackTab | KeyCode::Up => Some(signup.focus.prev_in(&SIGNUP_FIELDS)),
        KeyCode::Enter => {
            if !signup.is_submitting() {
                match signup.begin_submit() {
                    Ok(request) => background.signup(request),
                    Err(err) => debug!("signup not sent: {}", err),
                }
            }
            None
        }
        KeyCode::Backspace => {
            signup.pop_char();
            None
        }
        KeyCode::Char(' ') => {
            signup.toggle_focused();
            None
        }
        KeyCode::Char(c) => {
            signup.push_char(c);
            None
        }
        _ => None,
    };

    if let Some(field) = target {
        if let Some(username) = signup.focus_field(field) {
            background.username_check(username);
        }
    }
    Transition::Stay
}

fn board_key(screen: &mut BoardScreen, key: KeyEvent, background: &Background) -> Transition {
    match std::mem::replace(&mut screen.mode, BoardMode::Browse) {
        BoardMode::Browse => browse_key(screen, key, background),
        BoardMode::Form(field) => {
            form_key(screen, field, key, background);
            Transition::Stay
        }
        BoardMode::Confirm(request) => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    let confirmed = BoardRequest::Delete(request.confirm());
                    background.board(&mut screen.board, confirmed);
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {}
                _ => screen.mode = BoardMode::Confirm(request),
            }
            Transition::Stay
        }
    }
}

fn browse_key(screen: &mut BoardScreen, key: KeyEvent, background: &Background) -> Transition {
    let selected = screen.board.selected().map(|t| t.id.clone());
    match key.code {
        KeyCode::Char('q') => return Transition::Quit,
        KeyCode::Up => screen.board.select_prev(),
        KeyCode::Down => screen.board.select_next(),
        KeyCode::Left => screen.move_cursor(-1),
        KeyCode::Right => screen.move_cursor(1),
        KeyCode::Char('[') | KeyCode::PageUp => {
            screen.board.prev_month();
            screen.day_cursor = screen.board.month.first_day();
        }
        KeyCode::Char(']') | KeyCode::PageDown => {
            screen.board.next_month();
            screen.day_cursor = screen.board.month.first_day();
        }
        KeyCode::Char('t') => {
            screen.board.show_month(0);
            screen.day_cursor = screen.board.today();
        }
        KeyCode::Enter => {
            let day = screen.day_cursor;
            screen.board.select_day(day);
        }
        KeyCode::Char('a') | KeyCode::Char('n') => {
            screen.mode = BoardMode::Form(DraftField::Title);
        }
        KeyCode::Char('e') => {
            if let Some(id) = selected {
                if screen.board.edit(&id).is_ok() {
                    screen.mode = BoardMode::Form(DraftField::Title);
                }
            }
        }
        KeyCode::Char(' ') | KeyCode::Char('c') => {
            if let Some(id) = selected {
                match screen.board.toggle_request(&id) {
                    Ok(request) => background.board(&mut screen.board, request),
                    Err(err) => debug!("toggle not sent: {}", err),
                }
            }
        }
        KeyCode::Char('d') => {
            if let Some(id) = selected {
                screen.mode = BoardMode::Confirm(screen.board.request_delete(&id));
            }
        }
        KeyCode::Char('r') => background.board(&mut screen.board, BoardRequest::Load),
        KeyCode::Esc => screen.board.notifications.dismiss_latest(),
        _ => {}
    }
    Transition::Stay
}

fn form_key(screen: &mut BoardScreen, field: DraftField, key: KeyEvent, background: &Background) {
    // the form stays open and frozen until the server answers
    if screen.board.is_submitting_draft() {
        screen.mode = BoardMode::Form(field);
        return;
    }

    let mut next = Some(field);
    match key.code {
        KeyCode::Esc => {
            screen.board.cancel_edit();
            next = None;
        }
        KeyCode::Tab | KeyCode::Down => next = Some(field.next()),
        KeyCode::BackTab | KeyCode::Up => next = Some(field.prev()),
        KeyCode::Enter => match screen.board.draft_request() {
            Ok(Some(request)) => background.board(&mut screen.board, request),
            Ok(None) => next = None,
            Err(err) => debug!("task form not sent: {}", err),
        },
        KeyCode::Backspace => {
            screen.draft_field_mut(field).pop();
        }
        KeyCode::Char(c) => screen.draft_field_mut(field).push(c),
        _ => {}
    }
    if let Some(field) = next {
        screen.mode = BoardMode::Form(field);
    }
}

pub async fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> anyhow::Result<()> {
    loop {
        app.tick(Instant::now());
        terminal.draw(|f| draw::draw(f, app))?;

        while let Ok(event) = app.events_rx.try_recv() {
            if !app.handle_app_event(event) {
                return Ok(());
            }
        }

        // poll blocks, so give spawned requests a turn first
        tokio::task::yield_now().await;
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if !app.handle_key(key) {
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth_form::Field;
    use crate::task::sample;
    use chrono::Datelike;
    use ratatui::backend::TestBackend;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn offline_client() -> Arc<HttpClient> {
        Arc::new(HttpClient::new("http://127.0.0.1:1", Some(Duration::from_secs(2))).unwrap())
    }

    fn offline_app() -> App {
        let mut app = App::new(offline_client(), None);
        app.start(StartScreen::Login, None);
        app
    }

    fn offline_screen() -> BoardScreen {
        let mut board = TaskBoard::new(offline_client(), "ocean");
        board.tasks.push(sample("1", "Swim", None, false));
        BoardScreen::new(board)
    }

    fn rendered(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|f| draw::draw(f, app)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[tokio::test]
    async fn login_shows_progress_until_the_answer_arrives() {
        let mut app = offline_app();
        for c in "ocean".chars() {
            assert!(app.handle_key(press(KeyCode::Char(c))));
        }
        app.handle_key(press(KeyCode::Tab));
        for c in "waves1".chars() {
            app.handle_key(press(KeyCode::Char(c)));
        }

        assert!(app.handle_key(press(KeyCode::Enter)));
        match &app.screen {
            Screen::Login(login) => assert!(login.is_submitting()),
            _ => panic!("expected the login screen"),
        }
        assert!(rendered(&app).contains("Diving In..."));

        let event = app.events_rx.recv().await.unwrap();
        assert!(matches!(event, AppEvent::LoggedIn { ref username, .. } if username == "ocean"));
        assert!(app.handle_app_event(event));

        match &app.screen {
            Screen::Login(login) => {
                assert!(!login.is_submitting());
                assert_eq!(login.focus, Field::Password);
                assert!(login.feedback.as_ref().unwrap().message.contains("choppy"));
            }
            _ => panic!("expected the login screen"),
        }
    }

    #[tokio::test]
    async fn lost_session_returns_to_login() {
        let mut app = offline_app();
        app.apply(Transition::ToBoard("ocean".into()));
        // the spawned initial load
        let first = app.events_rx.recv().await.unwrap();
        assert!(matches!(first, AppEvent::Board(BoardReply::Loaded(Err(_)))));
        app.handle_app_event(first);
        assert!(matches!(app.screen, Screen::Board(_)));

        let reply = BoardReply::Loaded(Err(crate::error::ApiError::Unauthorized { status: 302 }));
        assert!(app.handle_app_event(AppEvent::Board(reply)));
        match &app.screen {
            Screen::Login(login) => assert_eq!(login.username, "ocean"),
            _ => panic!("expected the login screen"),
        }
    }

    #[tokio::test]
    async fn typing_fills_the_draft_fields() {
        let app = offline_app();
        let mut screen = offline_screen();
        let background = &app.background;
        board_key(&mut screen, press(KeyCode::Char('a')), background);
        for c in "Surf".chars() {
            board_key(&mut screen, press(KeyCode::Char(c)), background);
        }
        board_key(&mut screen, press(KeyCode::Tab), background);
        board_key(&mut screen, press(KeyCode::Tab), background);
        for c in "2026-10-25".chars() {
            board_key(&mut screen, press(KeyCode::Char(c)), background);
        }

        assert!(matches!(screen.mode, BoardMode::Form(DraftField::DueDate)));
        assert_eq!(screen.board.draft.title, "Surf");
        assert_eq!(screen.board.draft.due_date, "2026-10-25");

        board_key(&mut screen, press(KeyCode::Esc), background);
        assert!(matches!(screen.mode, BoardMode::Browse));
        assert!(screen.board.draft.title.is_empty());
    }

    #[tokio::test]
    async fn submitted_form_waits_for_the_server() {
        let mut app = offline_app();
        let mut screen = offline_screen();
        board_key(&mut screen, press(KeyCode::Char('a')), &app.background);
        for c in "Surf".chars() {
            board_key(&mut screen, press(KeyCode::Char(c)), &app.background);
        }
        board_key(&mut screen, press(KeyCode::Enter), &app.background);

        assert!(screen.board.is_submitting_draft());
        board_key(&mut screen, press(KeyCode::Char('x')), &app.background);
        assert_eq!(screen.board.draft.title, "Surf");
        assert!(matches!(screen.mode, BoardMode::Form(DraftField::Title)));

        let reply = match app.events_rx.recv().await.unwrap() {
            AppEvent::Board(reply) => reply,
            other => panic!("unexpected event {:?}", other),
        };
        board_reply(&mut screen, &app.background, reply);
        assert!(!screen.board.is_busy());
        // failed create keeps the form and the typed title
        assert!(matches!(screen.mode, BoardMode::Form(_)));
        assert_eq!(screen.board.draft.title, "Surf");
        assert_eq!(screen.board.tasks.len(), 1);
    }

    #[tokio::test]
    async fn declined_delete_keeps_the_task() {
        let app = offline_app();
        let mut screen = offline_screen();
        board_key(&mut screen, press(KeyCode::Char('d')), &app.background);
        assert!(matches!(&screen.mode, BoardMode::Confirm(request) if request.id() == "1"));

        board_key(&mut screen, press(KeyCode::Char('x')), &app.background);
        assert!(matches!(screen.mode, BoardMode::Confirm(_)));

        board_key(&mut screen, press(KeyCode::Char('n')), &app.background);
        assert!(matches!(screen.mode, BoardMode::Browse));
        assert!(!screen.board.is_busy());
        assert_eq!(screen.board.tasks.len(), 1);
    }

    #[test]
    fn day_cursor_follows_into_next_month() {
        let mut screen = offline_screen();
        let start = screen.board.month;
        let days_left = start.days_in_month() as i64 - screen.day_cursor.day0() as i64;
        screen.move_cursor(days_left);
        assert_eq!(screen.board.month, start.next());
    }
}
