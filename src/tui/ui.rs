//! Frame layout and chrome for the TUI

use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Widget};
use ratatui::Frame;

use crate::ws::ConnState;

use super::app::{App, Pane};
use super::compose;
use super::debug_log;
use super::help;
use super::messages;
use super::sidebar;

const SIDEBAR_WIDTH: u16 = 24;

/// Symbol, color and word for the connection state.
fn conn_indicator(state: ConnState) -> (&'static str, Color, &'static str) {
    match state {
        ConnState::Open => ("*", Color::Green, "connected"),
        ConnState::Connecting => ("~", Color::Yellow, "connecting"),
        ConnState::PendingReconnect => ("~", Color::Yellow, "reconnecting"),
        ConnState::Disconnected => ("o", Color::Red, "offline"),
    }
}

/// Draw one frame from the app's current snapshot.
pub fn render(frame: &mut Frame, app: &mut App) {
    let area = frame.area();

    let [header_area, main_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(header_area, frame.buffer_mut(), app);

    let [sidebar_area, content_area] =
        Layout::horizontal([Constraint::Length(SIDEBAR_WIDTH), Constraint::Fill(1)])
            .areas(main_area);

    let sidebar_view = sidebar::SidebarView {
        groups: app.snapshot.groups(),
        active_group: app.snapshot.active_group(),
        typing: &app.typing_groups(),
        online_count: app.snapshot.online_users().len(),
    };
    sidebar::render(
        sidebar_area,
        frame.buffer_mut(),
        &sidebar_view,
        &app.sidebar,
        app.active_pane == Pane::Sidebar,
    );

    let [messages_area, typing_area, compose_area] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(1),
        Constraint::Length(compose::COMPOSE_HEIGHT),
    ])
    .areas(content_area);

    let active_group = app.snapshot.active_group().map(str::to_string);
    let messages_view = messages::MessagesView {
        group: active_group.as_deref().and_then(|id| app.snapshot.group(id)),
        messages: active_group
            .as_deref()
            .map_or(&[], |id| app.snapshot.messages(id)),
        my_user_id: app.me.as_ref().map(|u| u.id.as_str()),
        loading: app.history_in_flight(active_group.as_deref()),
    };
    messages::render(
        messages_area,
        frame.buffer_mut(),
        &messages_view,
        &mut app.messages,
        app.active_pane == Pane::Messages,
    );

    render_typing_line(typing_area, frame.buffer_mut(), app, active_group.as_deref());

    let placeholder = match &messages_view.group {
        Some(group) => format!(" Message #{}...", group.name),
        None => " Pick a group first...".to_string(),
    };
    compose::render(
        frame,
        compose_area,
        &app.compose,
        &placeholder,
        app.active_pane == Pane::Compose,
    );

    render_status(status_area, frame.buffer_mut(), app);

    if app.logs.visible {
        debug_log::render(messages_area, frame.buffer_mut(), &app.logs);
    }

    if app.show_help {
        help::render_help_popup(frame);
    }
}

fn render_header(area: Rect, buf: &mut Buffer, app: &App) {
    let title = Span::styled(
        " lanchat",
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    );

    let (symbol, color, word) = conn_indicator(app.conn_state);
    let user_name = app
        .me
        .as_ref()
        .map(|u| u.display_name.clone())
        .unwrap_or_else(|| "(unknown)".to_string());

    let right_text = format!("[?] Help  {} {}  {} ", symbol, word, user_name);
    let padding =
        " ".repeat(area.width.saturating_sub((" lanchat".len() + right_text.len()) as u16) as usize);

    let line = Line::from(vec![
        title,
        Span::raw(padding),
        Span::styled("[?] Help  ", Style::default().fg(Color::Gray)),
        Span::styled(format!("{} {}  ", symbol, word), Style::default().fg(color)),
        Span::styled(format!("{} ", user_name), Style::default().fg(Color::Cyan)),
    ]);
    Paragraph::new(line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

/// One line above the compose box listing who is typing in the group.
fn render_typing_line(area: Rect, buf: &mut Buffer, app: &App, active_group: Option<&str>) {
    let Some(group_id) = active_group else {
        return;
    };

    let me = app.me.as_ref().map(|u| u.id.as_str());
    let names: Vec<String> = app
        .snapshot
        .typing_users(group_id)
        .into_iter()
        .filter(|id| Some(*id) != me)
        .map(|id| app.display_name(id))
        .collect();
    if names.is_empty() {
        return;
    }

    let text = if names.len() == 1 {
        format!(" ~ {} is typing...", names[0])
    } else {
        format!(" ~ {} are typing...", names.join(", "))
    };
    let line = Line::from(Span::styled(
        text,
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::ITALIC),
    ));
    Paragraph::new(line).render(area, buf);
}

fn render_status(area: Rect, buf: &mut Buffer, app: &App) {
    if let Some(ref msg) = app.status_message {
        let style = if app.status_is_error {
            Style::default().fg(Color::Red).bg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Green).bg(Color::DarkGray)
        };
        Paragraph::new(Line::from(Span::styled(format!(" {} ", msg), style)))
            .style(Style::default().bg(Color::DarkGray))
            .render(area, buf);
        return;
    }

    let (symbol, color, word) = conn_indicator(app.conn_state);
    let sep_style = Style::default().fg(Color::DarkGray);

    let group_display = app
        .snapshot
        .active_group()
        .and_then(|id| app.snapshot.group(id))
        .map(|g| format!("#{}", g.name))
        .unwrap_or_else(|| "(no group)".to_string());

    let line = Line::from(vec![
        Span::styled(format!(" {} {} ", symbol, word), Style::default().fg(color)),
        Span::styled(" | ", sep_style),
        Span::styled(group_display, Style::default().fg(Color::Yellow)),
        Span::styled(" | ", sep_style),
        Span::styled(
            format!("Tab: {} ", app.active_pane.as_str()),
            Style::default().fg(Color::Cyan),
        ),
        Span::styled(" | ", sep_style),
        Span::styled("?: help", Style::default().fg(Color::Gray)),
        Span::styled(" | ", sep_style),
        Span::styled("C-l: logs", Style::default().fg(Color::Gray)),
    ]);
    Paragraph::new(line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}
