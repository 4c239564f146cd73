//! Sidebar: group list with an online-count footer
//!
//! The list itself lives in the store; this module only tracks which row
//! the cursor is on and draws whatever snapshot the frame was given.

use std::collections::HashSet;

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph, Widget};

use crate::models::Group;

/// Cursor state for the group list.
pub struct SidebarState {
    /// Index into the group slice passed at render time.
    pub selected: usize,
    /// True until the first group list arrives.
    pub loading: bool,
}

impl Default for SidebarState {
    fn default() -> Self {
        Self {
            selected: 0,
            loading: true,
        }
    }
}

impl SidebarState {
    pub fn move_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn move_down(&mut self, count: usize) {
        if count > 0 && self.selected < count - 1 {
            self.selected += 1;
        }
    }

    /// Keep the cursor valid after the group list changes size.
    pub fn clamp(&mut self, count: usize) {
        if count == 0 {
            self.selected = 0;
        } else if self.selected >= count {
            self.selected = count - 1;
        }
    }
}

/// Snapshot data the sidebar draws from.
pub struct SidebarView<'a> {
    pub groups: &'a [Group],
    /// Id of the group whose messages fill the main pane.
    pub active_group: Option<&'a str>,
    /// Group ids with at least one active typist.
    pub typing: &'a HashSet<String>,
    pub online_count: usize,
}

pub fn render(area: Rect, buf: &mut Buffer, view: &SidebarView, state: &SidebarState, focused: bool) {
    let (border_style, border_type) = if focused {
        (Style::default().fg(Color::Yellow), BorderType::Double)
    } else {
        (Style::default().fg(Color::DarkGray), BorderType::Plain)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(border_type)
        .border_style(border_style)
        .title(Span::styled(" Groups ", Style::default().fg(Color::White)));
    let inner = block.inner(area);
    block.render(area, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    if view.groups.is_empty() {
        let text = if state.loading { " Loading..." } else { " No groups" };
        let line = Line::from(Span::styled(text, Style::default().fg(Color::DarkGray)));
        Paragraph::new(line).render(Rect::new(inner.x, inner.y, inner.width, 1), buf);
        return;
    }

    // Bottom row is the presence footer; the list scrolls above it.
    let list_height = inner.height.saturating_sub(1) as usize;
    let offset = compute_scroll_offset(state.selected, list_height, view.groups.len());

    for (row, idx) in (offset..view.groups.len()).take(list_height).enumerate() {
        let group = &view.groups[idx];
        let row_area = Rect::new(inner.x, inner.y + row as u16, inner.width, 1);
        render_group_row(buf, row_area, group, view, idx == state.selected);
    }

    let footer_area = Rect::new(inner.x, inner.y + inner.height - 1, inner.width, 1);
    let footer = Line::from(vec![
        Span::styled(" * ", Style::default().fg(Color::Green)),
        Span::styled(
            format!("{} online", view.online_count),
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    Paragraph::new(footer).render(footer_area, buf);
}

/// Keep the selected row visible.
fn compute_scroll_offset(selected: usize, height: usize, total: usize) -> usize {
    if total <= height || selected < height {
        return 0;
    }
    let max_offset = total.saturating_sub(height);
    selected.saturating_sub(height - 1).min(max_offset)
}

fn render_group_row(buf: &mut Buffer, area: Rect, group: &Group, view: &SidebarView, selected: bool) {
    let active = view.active_group == Some(group.id.as_str());
    let cursor = if selected { "\u{25BA}" } else { " " };
    let label = format!("{}# {}", cursor, group.name);

    let badge = if view.typing.contains(&group.id) {
        "~"
    } else if group.is_global {
        "all"
    } else {
        ""
    };

    let style = if selected {
        Style::default()
            .fg(Color::White)
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD)
    } else if active {
        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };

    let badge_style = if view.typing.contains(&group.id) {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    render_row(buf, area, &label, badge, style, badge_style);
}

/// Left-aligned text with an optional right-aligned badge.
fn render_row(
    buf: &mut Buffer,
    area: Rect,
    left: &str,
    badge: &str,
    text_style: Style,
    badge_style: Style,
) {
    let width = area.width as usize;
    if width == 0 {
        return;
    }

    let badge_len = badge.chars().count();
    let max_left = if badge_len > 0 {
        width.saturating_sub(badge_len + 1)
    } else {
        width
    };
    let left_truncated: String = left.chars().take(max_left).collect();
    let pad = width.saturating_sub(left_truncated.chars().count() + badge_len);

    let line = Line::from(vec![
        Span::styled(left_truncated, text_style),
        Span::styled(" ".repeat(pad), text_style),
        Span::styled(badge.to_string(), badge_style),
    ]);
    Paragraph::new(line).render(area, buf);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_moves_within_bounds() {
        let mut state = SidebarState::default();
        state.move_up();
        assert_eq!(state.selected, 0);

        state.move_down(3);
        state.move_down(3);
        state.move_down(3);
        assert_eq!(state.selected, 2);
    }

    #[test]
    fn test_clamp_after_list_shrinks() {
        let mut state = SidebarState::default();
        state.selected = 5;

        state.clamp(2);
        assert_eq!(state.selected, 1);

        state.clamp(0);
        assert_eq!(state.selected, 0);
    }

    #[test]
    fn test_scroll_offset_keeps_selection_visible() {
        assert_eq!(compute_scroll_offset(0, 5, 20), 0);
        assert_eq!(compute_scroll_offset(4, 5, 20), 0);
        assert_eq!(compute_scroll_offset(5, 5, 20), 1);
        assert_eq!(compute_scroll_offset(19, 5, 20), 15);
    }
}
