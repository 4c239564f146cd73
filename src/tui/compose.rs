//! Compose box state and rendering
//!
//! Single-line input with a character-based cursor. Byte offsets are
//! derived only at the edit point, so multi-byte input stays safe.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph};
use ratatui::Frame;

/// Rows the compose box occupies, borders included.
pub const COMPOSE_HEIGHT: u16 = 3;

/// Editable input state. `cursor` counts characters, not bytes.
#[derive(Default)]
pub struct ComposeState {
    input: String,
    cursor: usize,
}

impl ComposeState {
    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    pub fn insert_char(&mut self, c: char) {
        let byte = self.char_to_byte(self.cursor);
        self.input.insert(byte, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let byte = self.char_to_byte(self.cursor - 1);
        self.input.remove(byte);
        self.cursor -= 1;
    }

    pub fn delete(&mut self) {
        if self.cursor >= self.input.chars().count() {
            return;
        }
        let byte = self.char_to_byte(self.cursor);
        self.input.remove(byte);
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        let len = self.input.chars().count();
        if self.cursor < len {
            self.cursor += 1;
        }
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.input.chars().count();
    }

    pub fn clear(&mut self) {
        self.input.clear();
        self.cursor = 0;
    }

    /// Take the trimmed input for sending. Returns `None` when there is
    /// nothing but whitespace; the box is cleared on success.
    pub fn send(&mut self) -> Option<String> {
        let text = self.input.trim().to_string();
        if text.is_empty() {
            return None;
        }
        self.clear();
        Some(text)
    }

    fn char_to_byte(&self, char_pos: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_pos)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }
}

pub fn render(
    frame: &mut Frame,
    area: Rect,
    state: &ComposeState,
    placeholder: &str,
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
        .border_style(border_style)
        .title(Span::styled(" Compose ", Style::default().fg(Color::White)));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if state.is_empty() && !focused {
        let hint = Paragraph::new(Line::from(Span::styled(
            placeholder.to_string(),
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        )));
        frame.render_widget(hint, inner);
        return;
    }

    let width = inner.width as usize;
    let (window, cursor_col) = visible_window(&state.input, state.cursor, width);
    frame.render_widget(Paragraph::new(Line::from(window)), inner);

    if focused && inner.width > 0 {
        frame.set_cursor_position((inner.x + cursor_col, inner.y));
    }
}

/// Slice of the input that fits in `width` columns, scrolled so the
/// cursor stays visible, plus the cursor's column inside that slice.
fn visible_window(input: &str, cursor: usize, width: usize) -> (String, u16) {
    if width == 0 {
        return (String::new(), 0);
    }
    // Keep one column free so the cursor can sit past the last char.
    let start = if cursor < width { 0 } else { cursor + 1 - width };
    let window: String = input.chars().skip(start).take(width).collect();
    let col = (cursor - start).min(width.saturating_sub(1)) as u16;
    (window, col)
}
