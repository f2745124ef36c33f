use crate::auth_form::{
    Field, FieldState, LoginController, SignupController, LOGIN_FIELDS, SIGNUP_FIELDS,
};
use crate::calendar::DAY_HEADERS;
use crate::notify::Level;
use crate::ui::{App, BoardMode, BoardScreen, DraftField, Screen};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

pub fn draw(frame: &mut Frame, app: &App) {
    match &app.screen {
        Screen::Login(login) => draw_login(frame, login),
        Screen::Signup(signup) => draw_signup(frame, signup),
        Screen::Board(screen) => draw_board(frame, screen),
    }
}

fn level_color(level: Level) -> Color {
    match level {
        Level::Info => Color::Cyan,
        Level::Success => Color::Green,
        Level::Warning => Color::Yellow,
        Level::Error => Color::Red,
    }
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White)
    }
}

fn masked(value: &str) -> String {
    "*".repeat(value.chars().count())
}

fn checkbox(checked: bool) -> &'static str {
    if checked {
        "[x]"
    } else {
        "[ ]"
    }
}

fn auth_area(frame: &Frame, rows: u16) -> Rect {
    let area = frame.area();
    let height = (rows + 4).min(area.height);
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(15),
            Constraint::Percentage(70),
            Constraint::Percentage(15),
        ])
        .split(vertical[1])[1]
}

fn draw_login(frame: &mut Frame, login: &LoginController) {
    let area = auth_area(frame, 12);
    let block = Block::default()
        .title(" 🌊 Ocean Tasks · Login ")
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines: Vec<Line> = LOGIN_FIELDS
        .iter()
        .map(|&field| {
            let value = match field {
                Field::Username => login.username.clone(),
                Field::Password => masked(&login.password),
                _ => checkbox(login.remember).to_string(),
            };
            Line::from(vec![
                Span::styled(format!("{:>18}: ", field.label()), focus_style(login.focus == field)),
                Span::raw(value),
            ])
        })
        .collect();

    lines.push(Line::from(""));
    if login.is_submitting() {
        lines.push(Line::styled("🌊 Diving In...", Style::default().fg(Color::Cyan)));
    } else if let Some(feedback) = &login.feedback {
        lines.push(Line::styled(
            feedback.message.clone(),
            Style::default().fg(level_color(feedback.level)),
        ));
    }
    lines.push(Line::from(""));
    lines.push(Line::styled(
        "Tab: next field · Space: remember me · Enter: log in · Ctrl+S: sign up · Ctrl+F: forgot password · Esc: quit",
        Style::default().fg(Color::DarkGray),
    ));

    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);
}

fn state_marker(state: FieldState) -> Span<'static> {
    match state {
        FieldState::Empty => Span::raw(""),
        FieldState::Valid => Span::styled(" ✓", Style::default().fg(Color::Green)),
        FieldState::Invalid => Span::styled(" ✗", Style::default().fg(Color::Red)),
    }
}

fn draw_signup(frame: &mut Frame, signup: &SignupController) {
    let area = auth_area(frame, 16);
    let block = Block::default()
        .title(" 🏖️ Ocean Tasks · Sign up ")
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .style(Style::default().fg(Color::Green));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let draft = &signup.draft;
    let mut lines: Vec<Line> = SIGNUP_FIELDS
        .iter()
        .map(|&field| {
            let value = match field {
                Field::Username => draft.username.clone(),
                Field::Email => draft.email.clone(),
                Field::Password => masked(&draft.password),
                Field::ConfirmPassword => masked(&draft.confirm_password),
                Field::FavoriteBeach => draft
                    .favorite_beach
                    .map(|vibe| vibe.label())
                    .unwrap_or("(choose with Space)")
                    .to_string(),
                _ => checkbox(draft.terms).to_string(),
            };
            Line::from(vec![
                Span::styled(
                    format!("{:>26}: ", field.label()),
                    focus_style(signup.focus == field),
                ),
                Span::raw(value),
                state_marker(signup.state(field)),
            ])
        })
        .collect();

    lines.push(Line::from(""));
    if signup.is_submitting() {
        lines.push(Line::styled(
            "🌊 Creating your beach account...",
            Style::default().fg(Color::Cyan),
        ));
    } else if let Some(feedback) = &signup.feedback {
        lines.push(Line::styled(
            feedback.message.clone(),
            Style::default().fg(level_color(feedback.level)),
        ));
    }
    lines.push(Line::from(""));
    lines.push(Line::styled(
        "Tab: next field · Space: choose/toggle · Enter: create account · Esc: back to login",
        Style::default().fg(Color::DarkGray),
    ));

    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);
}

fn draw_board(frame: &mut Frame, screen: &BoardScreen) {
    let board = &screen.board;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(frame.area());

    let stats = board.stats();
    let busy = if board.is_busy() {
        "  ⏳ riding the current..."
    } else {
        ""
    };
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            format!(" 🌊 {}'s ocean ", board.username),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(
            "  {} tasks · {} completed · {} pending · {:.1}% done",
            stats.total, stats.completed, stats.pending, stats.completion_rate
        )),
        Span::styled(busy, Style::default().fg(Color::Yellow)),
    ]))
    .block(Block::default().borders(Borders::ALL));
    frame.render_widget(header, chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(chunks[1]);
    draw_task_list(frame, screen, body[0]);
    draw_calendar(frame, screen, body[1]);

    let help = match screen.mode {
        BoardMode::Browse => {
            "a: add · e: edit · Space: done · d: delete · r: reload · ←/→: day · [/]: month · t: today · Enter: day's tasks · q: quit"
        }
        BoardMode::Form(_) => "Tab: next field · Enter: save · Esc: cancel",
        BoardMode::Confirm(_) => "y: let it drift away · n: keep it",
    };
    frame.render_widget(
        Paragraph::new(help).style(Style::default().fg(Color::DarkGray)),
        chunks[2],
    );

    match &screen.mode {
        BoardMode::Browse => {}
        BoardMode::Form(field) => draw_task_form(frame, screen, *field),
        BoardMode::Confirm(request) => draw_popup(
            frame,
            " Delete task ",
            Color::Red,
            &format!("{}\n\n(y/n)", request.prompt()),
        ),
    }

    if let Some(notification) = board.notifications.latest() {
        draw_notification(frame, notification.level, &notification.message);
    }
}

fn draw_task_list(frame: &mut Frame, screen: &BoardScreen, area: Rect) {
    let board = &screen.board;
    let items: Vec<ListItem> = board
        .tasks
        .iter()
        .map(|task| {
            let overdue = board.is_overdue(task);
            let title_style = if task.completed {
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::CROSSED_OUT)
            } else if overdue {
                Style::default().fg(Color::Red)
            } else {
                Style::default().fg(Color::White)
            };

            let mut spans = vec![
                Span::raw(format!("{} ", checkbox(task.completed))),
                Span::styled(task.title.clone(), title_style),
            ];
            if let Some(due) = task.due_date {
                spans.push(Span::raw(format!(" (Due: {})", due.display())));
            }
            if overdue {
                spans.push(Span::styled(" ⚠ overdue", Style::default().fg(Color::Red)));
            }

            let mut lines = vec![Line::from(spans)];
            if let Some(description) = &task.description {
                lines.push(Line::styled(
                    format!("    {}", description),
                    Style::default().fg(Color::Gray),
                ));
            }
            ListItem::new(lines)
        })
        .collect();

    let title = if items.is_empty() {
        " Tasks · 🏖️ Your ocean is calm. Press a to cast a task! ".to_string()
    } else {
        format!(" Tasks ({}) ", items.len())
    };
    let list = List::new(items)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .highlight_style(Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED));

    let mut state = ListState::default();
    if !board.tasks.is_empty() {
        state.select(Some(board.selected_task));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_calendar(frame: &mut Frame, screen: &BoardScreen, area: Rect) {
    let grid = screen.board.calendar();

    let mut lines = vec![
        Line::from(
            DAY_HEADERS
                .iter()
                .map(|d| Span::styled(format!("{:>4}", d), Style::default().fg(Color::Cyan)))
                .collect::<Vec<_>>(),
        ),
        Line::from(""),
    ];

    for week in grid.weeks() {
        let spans: Vec<Span> = week
            .iter()
            .map(|cell| match cell {
                None => Span::raw("    "),
                Some(day) => {
                    let marker = if day.has_tasks { "•" } else { " " };
                    let mut style = Style::default();
                    if day.has_tasks {
                        style = style.fg(Color::Yellow);
                    }
                    if day.is_today {
                        style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
                    }
                    if day.date == screen.day_cursor {
                        style = style.add_modifier(Modifier::REVERSED);
                    }
                    Span::styled(format!("{:>3}{}", day.day, marker), style)
                }
            })
            .collect();
        lines.push(Line::from(spans));
    }

    let calendar = Paragraph::new(lines).block(
        Block::default()
            .title(format!(" {} ", grid.month.title()))
            .title_alignment(Alignment::Center)
            .borders(Borders::ALL),
    );
    frame.render_widget(calendar, area);
}

fn draw_task_form(frame: &mut Frame, screen: &BoardScreen, focus: DraftField) {
    let draft = &screen.board.draft;
    let title = if screen.board.is_submitting_draft() {
        " 🌊 Casting into the ocean... "
    } else if draft.is_editing() {
        " ✏️ Edit task "
    } else {
        " 🐚 New task "
    };
    let fields = [
        (DraftField::Title, "Title", &draft.title),
        (DraftField::Description, "Description", &draft.description),
        (DraftField::DueDate, "Due (YYYY-MM-DD)", &draft.due_date),
    ];
    let lines: Vec<Line> = fields
        .iter()
        .map(|(field, label, value)| {
            Line::from(vec![
                Span::styled(format!("{:>16}: ", label), focus_style(*field == focus)),
                Span::raw(value.as_str()),
            ])
        })
        .collect();

    let area = centered_rect(60, 30, frame.area());
    let form = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(Clear, area);
    frame.render_widget(form, area);
}

fn draw_notification(frame: &mut Frame, level: Level, message: &str) {
    let area = frame.area();
    let width = (area.width / 2).max(30).min(area.width);
    let height = (message.lines().count() as u16 + 4).min(area.height / 2);
    let popup = Rect {
        x: area.x + area.width - width,
        y: area.y + area.height.saturating_sub(height + 1),
        width,
        height,
    };

    let text = Paragraph::new(message)
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(Color::White))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(level_color(level))),
        );
    frame.render_widget(Clear, popup);
    frame.render_widget(text, popup);
}

fn draw_popup(frame: &mut Frame, title: &str, color: Color, body: &str) {
    let area = centered_rect(60, 25, frame.area());
    let popup = Paragraph::new(body)
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(Color::White))
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_type(BorderType::Double)
                .style(Style::default().fg(color)),
        );
    frame.render_widget(Clear, area);
    frame.render_widget(popup, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpClient;
    use crate::task_board::TaskBoard;
    use ratatui::{backend::TestBackend, Terminal};
    use std::sync::Arc;

    fn rendered(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|f| draw(f, app)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn login_screen_masks_password() {
        let client = HttpClient::new("http://localhost:5000", None).unwrap();
        let mut app = App::new(Arc::new(client), None);
        if let Screen::Login(login) = &mut app.screen {
            login.username = "ocean".into();
            login.password = "waves".into();
        }

        let screen = rendered(&app);
        assert!(screen.contains("ocean"));
        assert!(screen.contains("*****"));
        assert!(!screen.contains("waves"));
    }

    #[test]
    fn pending_requests_show_on_the_board() {
        let client = Arc::new(HttpClient::new("http://localhost:5000", None).unwrap());
        let mut app = App::new(client.clone(), None);
        let mut board = TaskBoard::new(client, "ocean");
        board.draft.title = "Surf".into();
        let request = board.draft_request().unwrap().unwrap();
        let _in_flight = board.track(request);
        let day_cursor = board.today();
        app.screen = Screen::Board(BoardScreen {
            board,
            mode: BoardMode::Form(DraftField::Title),
            day_cursor,
        });

        let screen = rendered(&app);
        assert!(screen.contains("riding the current"));
        assert!(screen.contains("Casting into the ocean"));
    }

    #[test]
    fn centered_rect_stays_inside() {
        let outer = Rect::new(0, 0, 100, 50);
        let inner = centered_rect(60, 20, outer);
        assert_eq!(inner.width, 60);
        assert_eq!(inner.height, 10);
        assert!(outer.contains(inner.as_position()));
    }
}
