//! Help popup: keyboard shortcuts by category.

use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

const POPUP_WIDTH: u16 = 72;
const POPUP_HEIGHT: u16 = 20;

struct Shortcut {
    key: &'static str,
    desc: &'static str,
}

struct Category {
    title: &'static str,
    shortcuts: &'static [Shortcut],
}

const NAVIGATION: Category = Category {
    title: "NAVIGATION",
    shortcuts: &[
        Shortcut {
            key: "Tab",
            desc: "Cycle focus forward",
        },
        Shortcut {
            key: "Shift+Tab",
            desc: "Cycle focus backward",
        },
        Shortcut {
            key: "Up/Down",
            desc: "Move / scroll in pane",
        },
        Shortcut {
            key: "PgUp/PgDn",
            desc: "Scroll messages by page",
        },
        Shortcut {
            key: "End",
            desc: "Jump to newest message",
        },
    ],
};

const GROUPS: Category = Category {
    title: "GROUPS",
    shortcuts: &[
        Shortcut {
            key: "Enter",
            desc: "Open selected group",
        },
        Shortcut {
            key: "Ctrl+R",
            desc: "Refresh groups and presence",
        },
        Shortcut {
            key: "PgUp",
            desc: "Load older history (at top)",
        },
    ],
};

const MESSAGING: Category = Category {
    title: "MESSAGING",
    shortcuts: &[
        Shortcut {
            key: "Enter",
            desc: "Send message",
        },
        Shortcut {
            key: "Ctrl+U",
            desc: "Clear compose box",
        },
        Shortcut {
            key: "Esc",
            desc: "Leave compose / close popup",
        },
    ],
};

const MISC: Category = Category {
    title: "MISC",
    shortcuts: &[
        Shortcut {
            key: "Ctrl+L",
            desc: "Toggle log overlay",
        },
        Shortcut {
            key: "?",
            desc: "Toggle this help",
        },
        Shortcut {
            key: "q",
            desc: "Quit (outside compose)",
        },
        Shortcut {
            key: "Ctrl+C",
            desc: "Quit",
        },
    ],
};

/// Render the help popup centered over everything else.
pub fn render_help_popup(frame: &mut Frame) {
    let area = frame.area();
    let popup_w = POPUP_WIDTH.min(area.width.saturating_sub(2));
    let popup_h = POPUP_HEIGHT.min(area.height.saturating_sub(2));
    let popup_area = centered_rect(popup_w, popup_h, area);

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Span::styled(
            " HELP ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ))
        .title_bottom(Line::from(Span::styled(
            " Press any key to close ",
            Style::default().fg(Color::Gray),
        )));
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let [left_col, right_col] =
        Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(inner);

    let left = Paragraph::new(build_column_lines(&[&NAVIGATION, &GROUPS]));
    frame.render_widget(left, inset(left_col, 1, 1));

    let right = Paragraph::new(build_column_lines(&[&MESSAGING, &MISC]));
    frame.render_widget(right, inset(right_col, 1, 1));
}

fn build_column_lines<'a>(categories: &[&Category]) -> Vec<Line<'a>> {
    let mut lines: Vec<Line<'a>> = Vec::new();

    for (idx, cat) in categories.iter().enumerate() {
        if idx > 0 {
            lines.push(Line::from(""));
        }
        lines.push(Line::from(Span::styled(
            cat.title,
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(
            "\u{2500}".repeat(30),
            Style::default().fg(Color::DarkGray),
        )));
        for sc in cat.shortcuts {
            lines.push(Line::from(vec![
                Span::styled(format!("{:<11}", sc.key), Style::default().fg(Color::Yellow)),
                Span::styled(sc.desc, Style::default().fg(Color::Gray)),
            ]));
        }
    }

    lines
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width, height)
}

fn inset(area: Rect, h: u16, v: u16) -> Rect {
    Rect::new(
        area.x + h,
        area.y + v,
        area.width.saturating_sub(h * 2),
        area.height.saturating_sub(v * 2),
    )
}
