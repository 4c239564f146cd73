//! Log overlay
//!
//! Shows captured tracing output on top of the messages pane. Lines come
//! out of the [`LogBuffer`] ring on every frame; this state keeps a longer
//! scrollback than the ring itself so the overlay can look further back.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, Paragraph, Widget};

use super::log_capture::LogBuffer;

/// Scrollback kept for display, beyond the ring's own capacity.
const SCROLLBACK_LINES: usize = 1000;

pub struct LogViewState {
    buffer: LogBuffer,
    lines: Vec<String>,
    pub visible: bool,
    /// Lines between the viewport bottom and the newest line.
    scroll_offset: usize,
}

impl LogViewState {
    pub fn new(buffer: LogBuffer) -> Self {
        Self {
            buffer,
            lines: Vec::new(),
            visible: false,
            scroll_offset: 0,
        }
    }

    /// Move freshly captured lines into the scrollback. Runs every frame
    /// whether or not the overlay is open, so the ring never sits full.
    pub fn refresh(&mut self) {
        let fresh = self.buffer.drain();
        if fresh.is_empty() {
            return;
        }
        self.lines.extend(fresh);
        if self.lines.len() > SCROLLBACK_LINES {
            let excess = self.lines.len() - SCROLLBACK_LINES;
            self.lines.drain(..excess);
            self.scroll_offset = self.scroll_offset.saturating_sub(excess);
        }
    }

    /// Show or hide the overlay; opening jumps to the newest lines.
    pub fn toggle(&mut self) {
        self.visible = !self.visible;
        if self.visible {
            self.scroll_offset = 0;
        }
    }

    pub fn scroll_up(&mut self, n: usize) {
        let max_offset = self.lines.len().saturating_sub(1);
        self.scroll_offset = self.scroll_offset.saturating_add(n).min(max_offset);
    }

    pub fn scroll_down(&mut self, n: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(n);
    }

    #[cfg(test)]
    fn line_count(&self) -> usize {
        self.lines.len()
    }
}

/// Render the overlay over the given area.
pub fn render(area: Rect, buf: &mut Buffer, state: &LogViewState) {
    Clear.render(area, buf);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Plain)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Span::styled(
            " Logs ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ))
        .title_bottom(Span::styled(
            " Up/Down scroll, Ctrl-L close ",
            Style::default().fg(Color::DarkGray),
        ));
    let inner = block.inner(area);
    block.render(area, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let height = inner.height as usize;
    let end = state.lines.len().saturating_sub(state.scroll_offset);
    let start = end.saturating_sub(height);

    let shown: Vec<Line> = state.lines[start..end]
        .iter()
        .map(|line| colorize(line))
        .collect();
    Paragraph::new(shown).render(inner, buf);
}

/// Color a formatted tracing line by its level token.
fn colorize(line: &str) -> Line<'static> {
    let color = if line.contains("ERROR") {
        Color::Red
    } else if line.contains("WARN") {
        Color::Yellow
    } else if line.contains("INFO") {
        Color::Green
    } else if line.contains("DEBUG") || line.contains("TRACE") {
        Color::DarkGray
    } else {
        Color::White
    };
    Line::from(Span::styled(line.to_owned(), Style::default().fg(color)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_pulls_from_ring() {
        let buffer = LogBuffer::new(64);
        buffer.push("a".to_string());
        buffer.push("b".to_string());

        let mut state = LogViewState::new(buffer.clone());
        assert_eq!(state.line_count(), 0);

        state.refresh();
        assert_eq!(state.line_count(), 2);

        buffer.push("c".to_string());
        state.refresh();
        assert_eq!(state.line_count(), 3);
    }

    #[test]
    fn test_toggle_resets_to_newest() {
        let buffer = LogBuffer::new(64);
        for i in 0..10 {
            buffer.push(format!("line {}", i));
        }
        let mut state = LogViewState::new(buffer);
        state.refresh();

        state.scroll_up(5);
        state.toggle();
        assert!(state.visible);
        assert_eq!(state.scroll_offset, 0);
    }

    #[test]
    fn test_scroll_clamps_to_oldest() {
        let buffer = LogBuffer::new(64);
        for i in 0..5 {
            buffer.push(format!("line {}", i));
        }
        let mut state = LogViewState::new(buffer);
        state.refresh();

        state.scroll_up(100);
        assert_eq!(state.scroll_offset, 4);

        state.scroll_down(100);
        assert_eq!(state.scroll_offset, 0);
    }
}
