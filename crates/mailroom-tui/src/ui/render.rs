use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use mailroom_core::auth::{gate, GateDecision, Route, SessionState};
use mailroom_core::models::Identity;
use mailroom_core::notify::Notification;

use crate::app::{App, AppState, LoginFocus};

use super::styles;

/// Width of the toast stack in the top-right corner
const TOAST_WIDTH: u16 = 44;

/// Toasts beyond this many are not drawn until older ones leave
const MAX_VISIBLE_TOASTS: usize = 5;

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // Title bar
            Constraint::Min(8),    // Main content
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    let state = app.session_state();

    render_title_bar(frame, app, &state, chunks[0]);
    render_main_content(frame, app, &state, chunks[1]);
    render_status_bar(frame, app, &state, chunks[2]);

    render_toasts(frame, &app.notifications.list(), chunks[1]);

    if matches!(app.state, AppState::ConfirmingQuit) {
        render_quit_overlay(frame);
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, state: &SessionState, area: Rect) {
    let title = format!("  mailroom · {}", app.route.title());
    let account = state
        .identity()
        .map(Identity::display_label)
        .unwrap_or_default();

    let title_line = Line::from(vec![
        Span::styled(title.clone(), styles::title_style()),
        Span::raw(" ".repeat(
            (area.width as usize)
                .saturating_sub(title.chars().count() + account.chars().count() + 2),
        )),
        Span::styled(account, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    let paragraph = Paragraph::new(title_line).block(block);
    frame.render_widget(paragraph, area);
}

fn render_main_content(frame: &mut Frame, app: &App, state: &SessionState, area: Rect) {
    match gate(app.route, state) {
        GateDecision::Loading | GateDecision::Redirect(_) => render_loading(frame, area),
        GateDecision::Render => match (app.route, state.identity()) {
            (Route::Login, _) => render_login_form(frame, app, area),
            (Route::Inbox, Some(identity)) => render_inbox(frame, identity, area),
            (Route::Admin, Some(identity)) => render_admin(frame, identity, area),
            // Gating never renders a protected route without an identity
            (_, None) => render_loading(frame, area),
        },
    }
}

fn render_loading(frame: &mut Frame, area: Rect) {
    let area = centered_rect_fixed(30, 3, area);
    let paragraph = Paragraph::new(Line::from(Span::styled(
        "Restoring session…",
        styles::muted_style(),
    )))
    .block(Block::default().borders(Borders::ALL).border_style(styles::border_style(false)));
    frame.render_widget(paragraph, area);
}

fn render_login_form(frame: &mut Frame, app: &App, area: Rect) {
    // Fixed size dialog - compact
    let height = if app.login_error.is_some() { 11 } else { 9 };
    let area = centered_rect_fixed(46, height, area);

    let mut lines = vec![
        Line::from(Span::styled("        Sign in to Mail Manager", styles::title_style())),
        Line::from(""),
    ];

    let username_focused = app.login_focus == LoginFocus::Username;
    let username_display = format!("{:<16}", tail(&app.login_username, 16));
    lines.push(field_line(
        "Username",
        username_display,
        username_focused,
    ));

    // Password is masked
    let password_focused = app.login_focus == LoginFocus::Password;
    let password_masked = "*".repeat(app.login_password.chars().count().min(16));
    lines.push(field_line(
        "Password",
        format!("{:<16}", password_masked),
        password_focused,
    ));

    // Login button
    lines.push(Line::from(""));
    let button_focused = app.login_focus == LoginFocus::Button;
    let button_style = if button_focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    let label = if app.login_pending {
        " Signing in… "
    } else if button_focused {
        "  ▶ Login ◀  "
    } else {
        "    Login    "
    };
    lines.push(Line::from(vec![
        Span::raw("            ["),
        Span::styled(label, button_style),
        Span::raw("]"),
    ]));

    if let Some(ref error) = app.login_error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(" {}", error),
            styles::error_style(),
        )));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn field_line(label: &str, value: String, focused: bool) -> Line<'static> {
    let style = if focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    let cursor = if focused { "▌" } else { "" };
    Line::from(vec![
        Span::raw("      "),
        Span::styled(format!("{}: [", label), styles::muted_style()),
        Span::styled(format!("{}{}", value, cursor), style),
        Span::styled("]", styles::muted_style()),
    ])
}

/// Last `max` characters of `s`, so the cursor end of a long entry stays visible
fn tail(s: &str, max: usize) -> String {
    let count = s.chars().count();
    s.chars().skip(count.saturating_sub(max)).collect()
}

fn render_inbox(frame: &mut Frame, identity: &Identity, area: Rect) {
    let mut lines = vec![
        Line::from(Span::styled(
            format!(" Welcome, {}", identity.username),
            styles::highlight_style(),
        )),
        Line::from(""),
    ];
    lines.extend(identity_lines(identity));

    let block = Block::default()
        .title(" Inbox ")
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_admin(frame: &mut Frame, identity: &Identity, area: Rect) {
    let mut lines = vec![
        Line::from(Span::styled(" Administration", styles::highlight_style())),
        Line::from(""),
        Line::from(Span::styled(
            " Signed in with administrator rights.",
            styles::list_item_style(),
        )),
        Line::from(""),
    ];
    lines.extend(identity_lines(identity));

    let block = Block::default()
        .title(" Admin ")
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn identity_lines(identity: &Identity) -> Vec<Line<'static>> {
    let row = |label: &str, value: String| {
        Line::from(vec![
            Span::styled(format!("  {:<12}", label), styles::muted_style()),
            Span::styled(value, styles::list_item_style()),
        ])
    };

    let mut lines = vec![
        row("User", identity.username.clone()),
        row("ID", identity.id.to_string()),
        row("Role", if identity.is_admin { "Administrator" } else { "User" }.to_string()),
        row("Status", if identity.is_active { "Active" } else { "Disabled" }.to_string()),
    ];
    if let Some(created) = identity.created_at {
        lines.push(row("Member since", created.format("%Y-%m-%d").to_string()));
    }
    if let Some(bytes) = identity.storage_used_bytes {
        lines.push(row("Storage", format_bytes(bytes)));
    }
    lines
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

fn render_status_bar(frame: &mut Frame, app: &App, state: &SessionState, area: Rect) {
    let left_text = match state {
        SessionState::Initializing => " Connecting…".to_string(),
        SessionState::Unauthenticated => " Signed out".to_string(),
        SessionState::Authenticated(identity) => format!(" Signed in as {}", identity.username),
    };

    let shortcuts = match gate(app.route, state) {
        GateDecision::Render if app.route == Route::Login => "Tab next | Enter login | Esc quit",
        GateDecision::Render => "[i]nbox | [a]dmin | [L]ogout | [x] dismiss | [q]uit",
        _ => "[q]uit",
    };
    let right_text = format!("{} ", shortcuts);

    let padding_len = (area.width as usize)
        .saturating_sub(left_text.chars().count())
        .saturating_sub(right_text.chars().count());
    let status_line = Line::from(vec![
        Span::styled(left_text, styles::muted_style()),
        Span::raw(" ".repeat(padding_len)),
        Span::styled(right_text, styles::muted_style()),
    ]);
    let paragraph = Paragraph::new(status_line).style(styles::status_bar_style());
    frame.render_widget(paragraph, area);
}

/// Stack of active notifications in the top-right corner, oldest first
fn render_toasts(frame: &mut Frame, toasts: &[Notification], area: Rect) {
    let width = TOAST_WIDTH.min(area.width);
    let x = area.x + area.width.saturating_sub(width + 1);
    let mut y = area.y;

    for toast in toasts.iter().take(MAX_VISIBLE_TOASTS) {
        if y + 3 > area.y + area.height {
            break;
        }
        let rect = Rect::new(x, y, width, 3);
        frame.render_widget(Clear, rect);

        let kind = toast.kind();
        let secs = toast.remaining().as_secs_f32().ceil() as u64;
        let line = Line::from(vec![
            Span::styled(format!("{} ", kind.icon()), styles::kind_style(kind)),
            Span::styled(toast.message().to_string(), styles::list_item_style()),
        ]);
        let block = Block::default()
            .title(Span::styled(format!(" {} ", kind.label()), styles::kind_style(kind)))
            .title_bottom(Line::from(Span::styled(format!(" {}s ", secs), styles::muted_style())).right_aligned())
            .borders(Borders::ALL)
            .border_style(Style::default().fg(styles::kind_color(kind)));
        frame.render_widget(Paragraph::new(line).block(block), rect);

        y += 3;
    }
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

fn render_quit_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(46, 6, frame.area());

    // Clear the area
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "   Are you sure you want to quit?",
            styles::highlight_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("   Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(" to quit, ", styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.0 GB");
    }

    #[test]
    fn test_tail_keeps_end_of_long_input() {
        assert_eq!(tail("abc", 16), "abc");
        assert_eq!(tail("abcdefghij", 4), "ghij");
        assert_eq!(tail("ééééé", 2), "éé");
    }
}
