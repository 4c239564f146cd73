//! Messages pane
//!
//! Renders the active group's message sequence straight from a store
//! snapshot. Scroll position is measured from the bottom so the view
//! stays put when an older history page lands at the front, and an
//! offset of zero means "follow new messages".

use chrono::Local;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph, Widget};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::models::{Group, Message, MessageKind};

/// Scroll state for the messages pane.
#[derive(Default)]
pub struct MessagesState {
    /// Rendered lines between the viewport bottom and the sequence end.
    /// Zero keeps the view pinned to the newest message.
    from_bottom: usize,
    /// Set by the last render: the oldest loaded line was on screen.
    top_visible: bool,
}

impl MessagesState {
    pub fn scroll_up(&mut self, lines: usize) {
        self.from_bottom += lines;
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.from_bottom = self.from_bottom.saturating_sub(lines);
    }

    /// Re-pin the view to the newest message.
    pub fn jump_to_bottom(&mut self) {
        self.from_bottom = 0;
    }

    pub fn is_pinned_to_bottom(&self) -> bool {
        self.from_bottom == 0
    }

    /// Whether the last drawn frame reached the oldest loaded message.
    pub fn top_visible(&self) -> bool {
        self.top_visible
    }
}

/// Snapshot data the pane draws from.
pub struct MessagesView<'a> {
    pub group: Option<&'a Group>,
    /// Messages for the active group, oldest first.
    pub messages: &'a [Message],
    /// Own user id, used to highlight own messages.
    pub my_user_id: Option<&'a str>,
    /// True while a history page for this group is in flight.
    pub loading: bool,
}

pub fn render(
    area: Rect,
    buf: &mut Buffer,
    view: &MessagesView,
    state: &mut MessagesState,
    focused: bool,
) {
    let (border_style, border_type) = if focused {
        (Style::default().fg(Color::Yellow), BorderType::Double)
    } else {
        (Style::default().fg(Color::DarkGray), BorderType::Plain)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(border_type)
        .border_style(border_style);
    let inner = block.inner(area);
    block.render(area, buf);

    state.top_visible = false;

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let Some(group) = view.group else {
        let hint = Line::from(Span::styled(
            " No group selected. Pick one in the group list.",
            Style::default().fg(Color::DarkGray),
        ));
        Paragraph::new(hint).render(Rect::new(inner.x, inner.y, inner.width, 1), buf);
        return;
    };

    // First row names the group; messages scroll below it.
    let header_area = Rect::new(inner.x, inner.y, inner.width, 1);
    render_group_header(header_area, buf, group);

    let body = Rect::new(
        inner.x,
        inner.y + 1,
        inner.width,
        inner.height.saturating_sub(1),
    );
    if body.height == 0 {
        return;
    }

    if view.messages.is_empty() {
        state.top_visible = true;
        let text = if view.loading {
            " Loading history..."
        } else {
            " No messages yet."
        };
        let line = Line::from(Span::styled(text, Style::default().fg(Color::DarkGray)));
        Paragraph::new(line).render(Rect::new(body.x, body.y, body.width, 1), buf);
        return;
    }

    let lines = build_lines(view, body.width.saturating_sub(1) as usize);
    let total = lines.len();
    let height = body.height as usize;

    // Clamp so scrolling past the oldest line stops at the top.
    state.from_bottom = state.from_bottom.min(total.saturating_sub(height));
    let scroll = top_line(total, height, state.from_bottom);
    state.top_visible = scroll == 0;

    for (row, line_idx) in (scroll..total).take(height).enumerate() {
        let line_area = Rect::new(body.x, body.y + row as u16, body.width, 1);
        Paragraph::new(lines[line_idx].clone()).render(line_area, buf);
    }

    if total > height {
        let indicator_x = body.x + body.width.saturating_sub(1);
        if scroll > 0 {
            let cell = &mut buf[(indicator_x, body.y)];
            cell.set_char('^');
            cell.set_style(Style::default().fg(Color::DarkGray));
        }
        if scroll + height < total {
            let cell = &mut buf[(indicator_x, body.y + body.height - 1)];
            cell.set_char('v');
            cell.set_style(Style::default().fg(Color::DarkGray));
        }
    }
}

fn render_group_header(area: Rect, buf: &mut Buffer, group: &Group) {
    let mut spans = vec![Span::styled(
        format!(" #{} ", group.name),
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    )];
    if let Some(desc) = group.description.as_deref().filter(|d| !d.is_empty()) {
        spans.push(Span::styled(
            desc.to_string(),
            Style::default().fg(Color::Gray),
        ));
    }
    Paragraph::new(Line::from(spans))
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

/// Index of the first visible line for a bottom-anchored offset.
fn top_line(total: usize, height: usize, from_bottom: usize) -> usize {
    total.saturating_sub(height + from_bottom)
}

/// Flatten the message sequence into styled lines, with day separators.
fn build_lines(view: &MessagesView, width: usize) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut last_day: Option<String> = None;

    for msg in view.messages {
        let day = msg
            .created_at
            .with_timezone(&Local)
            .format("%Y-%m-%d")
            .to_string();
        if last_day.as_deref() != Some(day.as_str()) {
            push_day_separator(&mut lines, &day, width);
            last_day = Some(day);
        }
        push_message(&mut lines, msg, view.my_user_id, width);
        lines.push(Line::from(""));
    }

    lines
}

fn push_day_separator(lines: &mut Vec<Line<'static>>, day: &str, width: usize) {
    let label = format!(" {} ", day);
    let fill = width.saturating_sub(label.width() + 2) / 2;
    let text = format!("{}{}{}", "-".repeat(fill.max(1)), label, "-".repeat(fill.max(1)));
    lines.push(Line::from(Span::styled(
        text,
        Style::default().fg(Color::DarkGray),
    )));
    lines.push(Line::from(""));
}

fn push_message(
    lines: &mut Vec<Line<'static>>,
    msg: &Message,
    my_user_id: Option<&str>,
    width: usize,
) {
    let time = msg
        .created_at
        .with_timezone(&Local)
        .format("%H:%M")
        .to_string();

    if msg.message_type == MessageKind::System {
        let text = msg.content.clone().unwrap_or_default();
        lines.push(Line::from(vec![
            Span::styled(
                format!("-- {} ", text),
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::ITALIC),
            ),
            Span::styled(time, Style::default().fg(Color::DarkGray)),
        ]));
        return;
    }

    let sender = msg
        .sender
        .as_ref()
        .map(|s| s.display_name.clone())
        .unwrap_or_else(|| "(unknown)".to_string());
    let own = match (my_user_id, msg.sender_id.as_deref()) {
        (Some(me), Some(them)) => me == them,
        _ => false,
    };
    let sender_style = if own {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    };

    lines.push(Line::from(vec![
        Span::styled(sender, sender_style),
        Span::raw("  "),
        Span::styled(time, Style::default().fg(Color::DarkGray)),
    ]));

    let body_width = width.saturating_sub(2);
    if let Some(content) = msg.content.as_deref().filter(|c| !c.is_empty()) {
        for wrapped in wrap_text(content, body_width) {
            lines.push(Line::from(vec![Span::raw("  "), Span::raw(wrapped)]));
        }
    }

    if let Some(att) = &msg.file_attachment {
        let tag = if msg.message_type == MessageKind::Image {
            "[image]"
        } else {
            "[file]"
        };
        lines.push(Line::from(vec![
            Span::raw("  "),
            Span::styled(
                format!("{} {} ({})", tag, att.original_filename, format_size(att.file_size)),
                Style::default().fg(Color::Cyan),
            ),
        ]));
    }
}

/// Word wrap; words wider than the limit are hard-split so pasted URLs
/// cannot push a line past the pane.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    if max_width == 0 {
        return vec![];
    }
    let mut result = Vec::new();
    for line in text.lines() {
        if line.width() <= max_width {
            result.push(line.to_string());
            continue;
        }
        let mut current = String::new();
        for word in line.split_whitespace() {
            for piece in split_word(word, max_width) {
                if current.is_empty() {
                    current = piece;
                } else if current.width() + 1 + piece.width() <= max_width {
                    current.push(' ');
                    current.push_str(&piece);
                } else {
                    result.push(current);
                    current = piece;
                }
            }
        }
        if !current.is_empty() {
            result.push(current);
        }
    }
    result
}

fn split_word(word: &str, max_width: usize) -> Vec<String> {
    if word.width() <= max_width {
        return vec![word.to_string()];
    }
    let mut pieces = Vec::new();
    let mut current = String::new();
    for c in word.chars() {
        if current.width() + c.width().unwrap_or(0) > max_width && !current.is_empty() {
            pieces.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_respects_width() {
        let wrapped = wrap_text("one two three four five", 9);
        assert_eq!(wrapped, vec!["one two", "three", "four five"]);
        for line in &wrapped {
            assert!(line.width() <= 9);
        }
    }

    #[test]
    fn test_wrap_splits_overlong_word() {
        let wrapped = wrap_text("see https://example.invalid/abcdef", 10);
        for line in &wrapped {
            assert!(line.width() <= 10, "line too wide: {:?}", line);
        }
        assert_eq!(wrapped.concat(), "seehttps://example.invalid/abcdef");
    }

    #[test]
    fn test_wrap_keeps_explicit_newlines() {
        assert_eq!(wrap_text("a\nb", 10), vec!["a", "b"]);
    }

    #[test]
    fn test_top_line_pins_to_bottom_at_zero() {
        assert_eq!(top_line(100, 20, 0), 80);
        assert_eq!(top_line(100, 20, 30), 50);
        // Fewer lines than the viewport: start at the top.
        assert_eq!(top_line(5, 20, 0), 0);
    }

    #[test]
    fn test_format_size_units() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024 + 300 * 1024), "5.3 MB");
    }

    #[test]
    fn test_scroll_state_clamping() {
        let mut state = MessagesState::default();
        assert!(state.is_pinned_to_bottom());

        state.scroll_up(5);
        assert!(!state.is_pinned_to_bottom());

        state.scroll_down(3);
        state.scroll_down(10);
        assert!(state.is_pinned_to_bottom());

        state.scroll_up(2);
        state.jump_to_bottom();
        assert!(state.is_pinned_to_bottom());
    }
}
