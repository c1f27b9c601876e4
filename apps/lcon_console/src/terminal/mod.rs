//! Terminal front-end: raw-mode input reader and the crossterm panel renderer

pub mod input;
pub mod panel;

pub use input::{TerminalEvent, TerminalReaderHandle, is_quit, is_terminal, key_event_to_press, spawn_terminal_event_reader};
pub use panel::TerminalPanel;
