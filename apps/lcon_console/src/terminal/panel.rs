//! Drop-down console panel drawn with crossterm
//!
//! The panel covers the top rows of the terminal. Its last row is the input line, the
//! row above it a separator, and everything above that shows the tail of the transcript.

use std::io::{self, Write};

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::queue;
use crossterm::style::{Attribute, Print, SetAttribute};
use crossterm::terminal::{Clear, ClearType};

use crate::console::ConsoleGui;

const PROMPT: &str = "> ";
const STATUS_HINT: &str = "` console | F1 shortcuts | Ctrl+C quit";

#[derive(Debug)]
pub struct TerminalPanel {
    cols: u16,
    rows: u16,
    panel_height: i32,
    panel_y: i32,
    visible: bool,
    transcript: String,
    input: String,
    /// Byte offset into `input`, always on a char boundary
    cursor: usize,
    input_enabled: bool,
    input_focused: bool,
}

impl TerminalPanel {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            cols,
            rows,
            panel_height: 0,
            panel_y: 0,
            visible: false,
            transcript: String::new(),
            input: String::new(),
            cursor: 0,
            input_enabled: false,
            input_focused: false,
        }
    }

    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.cols = cols;
        self.rows = rows;
    }

    fn editable(&self) -> bool {
        self.visible && self.input_enabled && self.input_focused
    }

    /// Apply an editing key to the input line
    pub fn apply_key(&mut self, key_event: &KeyEvent) {
        if !self.editable() || key_event.kind == KeyEventKind::Release {
            return;
        }
        if key_event.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) {
            return;
        }

        match key_event.code {
            KeyCode::Char(c) => {
                self.input.insert(self.cursor, c);
                self.cursor += c.len_utf8();
            }
            KeyCode::Backspace => {
                if let Some(prev) = self.prev_boundary() {
                    self.input.replace_range(prev..self.cursor, "");
                    self.cursor = prev;
                }
            }
            KeyCode::Delete => {
                if let Some(next) = self.next_boundary() {
                    self.input.replace_range(self.cursor..next, "");
                }
            }
            KeyCode::Left => {
                if let Some(prev) = self.prev_boundary() {
                    self.cursor = prev;
                }
            }
            KeyCode::Right => {
                if let Some(next) = self.next_boundary() {
                    self.cursor = next;
                }
            }
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.input.len(),
            _ => {}
        }
    }

    /// Insert pasted text at the cursor, newlines included
    pub fn paste(&mut self, text: &str) {
        if !self.editable() {
            return;
        }
        let text = text.replace("\r\n", "\n").replace('\r', "\n");
        self.input.insert_str(self.cursor, &text);
        self.cursor += text.len();
    }

    fn prev_boundary(&self) -> Option<usize> {
        self.input[..self.cursor].char_indices().next_back().map(|(i, _)| i)
    }

    fn next_boundary(&self) -> Option<usize> {
        self.input[self.cursor..].chars().next().map(|c| self.cursor + c.len_utf8())
    }

    fn clip(&self, line: &str) -> String {
        line.chars().take(self.cols as usize).collect()
    }

    /// Redraw the whole screen
    pub fn draw<W: Write>(&self, out: &mut W) -> io::Result<()> {
        queue!(out, Hide, Clear(ClearType::All))?;

        let rows = i32::from(self.rows);
        let mut cursor_at = None;

        if self.visible && self.panel_height > 0 {
            let transcript_rows = (self.panel_height - 2).max(0) as usize;
            let lines: Vec<&str> = self.transcript.lines().collect();
            let tail = &lines[lines.len().saturating_sub(transcript_rows)..];

            for (i, line) in tail.iter().enumerate() {
                let row = self.panel_y + i as i32;
                if (0..rows).contains(&row) {
                    queue!(out, MoveTo(0, row as u16), Print(self.clip(line)))?;
                }
            }

            let separator_row = self.panel_y + self.panel_height - 2;
            if (0..rows).contains(&separator_row) {
                queue!(out, MoveTo(0, separator_row as u16), Print("-".repeat(self.cols as usize)))?;
            }

            let input_row = self.panel_y + self.panel_height - 1;
            if (0..rows).contains(&input_row) {
                let width = (self.cols as usize).saturating_sub(PROMPT.len() + 1);
                let chars_before_cursor = self.input[..self.cursor].chars().count();
                let scroll = chars_before_cursor.saturating_sub(width);
                let shown: String = self
                    .input
                    .chars()
                    .skip(scroll)
                    .take(width)
                    .map(|c| if c == '\n' { '⏎' } else { c })
                    .collect();

                queue!(out, MoveTo(0, input_row as u16))?;
                if !self.input_enabled {
                    queue!(out, SetAttribute(Attribute::Dim))?;
                }
                queue!(out, Print(PROMPT), Print(shown), SetAttribute(Attribute::Reset))?;

                if self.editable() {
                    let col = PROMPT.len() + chars_before_cursor - scroll;
                    cursor_at = Some((col as u16, input_row as u16));
                }
            }
        }

        if self.rows > 0 && (!self.visible || self.panel_y + self.panel_height < rows) {
            queue!(
                out,
                MoveTo(0, self.rows - 1),
                SetAttribute(Attribute::Reverse),
                Print(self.clip(STATUS_HINT)),
                SetAttribute(Attribute::Reset)
            )?;
        }

        if let Some((col, row)) = cursor_at {
            queue!(out, MoveTo(col, row), Show)?;
        }

        out.flush()
    }
}

impl ConsoleGui for TerminalPanel {
    fn screen_height(&self) -> i32 {
        i32::from(self.rows)
    }

    fn set_panel_height(&mut self, height: i32) {
        self.panel_height = height;
    }

    fn panel_y(&self) -> i32 {
        self.panel_y
    }

    fn set_panel_y(&mut self, y: i32) {
        self.panel_y = y;
    }

    fn set_panel_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn set_transcript(&mut self, text: &str) {
        self.transcript.clear();
        self.transcript.push_str(text);
    }

    fn input_text(&self) -> String {
        self.input.clone()
    }

    fn set_input_text(&mut self, text: &str) {
        self.input = text.to_string();
        self.cursor = self.input.len();
    }

    fn set_input_cursor(&mut self, position: usize) {
        let mut position = position.min(self.input.len());
        while !self.input.is_char_boundary(position) {
            position -= 1;
        }
        self.cursor = position;
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        self.input_enabled = enabled;
    }

    fn set_input_focus(&mut self, focused: bool) {
        self.input_focused = focused;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_panel() -> TerminalPanel {
        let mut panel = TerminalPanel::new(40, 20);
        panel.set_panel_height(6);
        panel.set_panel_visible(true);
        panel.set_input_enabled(true);
        panel.set_input_focus(true);
        panel
    }

    fn press(panel: &mut TerminalPanel, code: KeyCode) {
        panel.apply_key(&KeyEvent::new(code, KeyModifiers::NONE));
    }

    #[test]
    fn test_typing_and_editing() {
        let mut panel = open_panel();
        for c in "prnt".chars() {
            press(&mut panel, KeyCode::Char(c));
        }
        press(&mut panel, KeyCode::Left);
        press(&mut panel, KeyCode::Left);
        press(&mut panel, KeyCode::Char('i'));
        assert_eq!(panel.input_text(), "print");

        press(&mut panel, KeyCode::End);
        press(&mut panel, KeyCode::Backspace);
        assert_eq!(panel.input_text(), "prin");

        press(&mut panel, KeyCode::Home);
        press(&mut panel, KeyCode::Delete);
        assert_eq!(panel.input_text(), "rin");
    }

    #[test]
    fn test_multibyte_editing() {
        let mut panel = open_panel();
        press(&mut panel, KeyCode::Char('é'));
        press(&mut panel, KeyCode::Char('x'));
        press(&mut panel, KeyCode::Left);
        press(&mut panel, KeyCode::Backspace);
        assert_eq!(panel.input_text(), "x");
    }

    #[test]
    fn test_typing_ignored_when_closed() {
        let mut panel = open_panel();
        panel.set_input_focus(false);
        press(&mut panel, KeyCode::Char('a'));
        assert_eq!(panel.input_text(), "");
    }

    #[test]
    fn test_paste_normalizes_line_endings() {
        let mut panel = open_panel();
        panel.paste("a=1\r\nb=2");
        assert_eq!(panel.input_text(), "a=1\nb=2");
    }

    #[test]
    fn test_draw_shows_transcript_tail_and_prompt() {
        let mut panel = open_panel();
        panel.set_transcript("one\ntwo\nthree\nfour\nfive\nsix");
        panel.set_input_text("x = 1");

        let mut out = Vec::new();
        panel.draw(&mut out).unwrap();
        let screen = String::from_utf8_lossy(&out);

        assert!(screen.contains("six"));
        assert!(screen.contains("three"));
        assert!(!screen.contains("two"));
        assert!(screen.contains("> x = 1"));
    }

    #[test]
    fn test_cursor_clamps_to_char_boundary() {
        let mut panel = open_panel();
        panel.set_input_text("é");
        panel.set_input_cursor(1);
        assert_eq!(panel.cursor, 0);
    }
}
