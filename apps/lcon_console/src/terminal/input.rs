//! Terminal Input Handler
//!
//! Reads keyboard and paste events in raw mode on a background thread and hands them
//! to the console tick through a channel.

use std::io;
use std::time::Duration;

use crossterm::event::{
    self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal;
use tokio::sync::mpsc;
use tracing::{debug, error, trace};

use crate::console::{ConsoleKey, KeyPress};

/// Event forwarded from the reader thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalEvent {
    Key(KeyEvent),
    Paste(String),
    Resize(u16, u16),
}

/// Map a key event to a console key press
///
/// Keys the console does not react to (plain typing, editing keys) map to `None`; the
/// panel handles those itself.
pub fn key_event_to_press(key_event: &KeyEvent) -> Option<KeyPress> {
    if key_event.kind == KeyEventKind::Release {
        return None;
    }

    let ctrl = key_event.modifiers.contains(KeyModifiers::CONTROL);
    let shift = key_event.modifiers.contains(KeyModifiers::SHIFT);

    let (key, shift) = match key_event.code {
        KeyCode::Char('`') => (ConsoleKey::Toggle, shift),
        // Shift+` on most layouts
        KeyCode::Char('~') => (ConsoleKey::Toggle, true),
        // Legacy terminals report Ctrl+` as NUL
        KeyCode::Null => return Some(KeyPress::ctrl(ConsoleKey::Toggle)),
        KeyCode::Enter => (ConsoleKey::Enter, shift),
        KeyCode::Up => (ConsoleKey::Up, shift),
        KeyCode::Down => (ConsoleKey::Down, shift),
        KeyCode::F(1) => (ConsoleKey::F1, shift),
        KeyCode::F(3) => (ConsoleKey::F3, shift),
        KeyCode::F(4) => (ConsoleKey::F4, shift),
        KeyCode::F(5) => (ConsoleKey::F5, shift),
        _ => return None,
    };

    Some(KeyPress { key, ctrl, shift })
}

/// Ctrl+C ends the session
pub fn is_quit(key_event: &KeyEvent) -> bool {
    key_event.kind != KeyEventKind::Release
        && key_event.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key_event.code, KeyCode::Char('c') | KeyCode::Char('C'))
}

/// Handle for the terminal event reader thread
///
/// When dropped, this will signal the thread to stop and wait for cleanup to complete.
pub struct TerminalReaderHandle {
    cancel_tx: Option<mpsc::Sender<()>>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl TerminalReaderHandle {
    /// Stop the terminal reader and wait for cleanup to complete
    pub fn stop(&mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.try_send(());
        }
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
    }

    /// Stop the terminal reader asynchronously
    pub async fn stop_async(&mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.join_handle.take() {
            tokio::task::spawn_blocking(move || {
                let _ = handle.join();
            }).await.ok();
        }
    }
}

impl Drop for TerminalReaderHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawn a thread that reads terminal events and sends them to a channel
///
/// Enables raw mode and bracketed paste, and the kitty keyboard protocol where the
/// terminal supports it. Everything is restored when the thread stops.
pub fn spawn_terminal_event_reader() -> io::Result<(
    mpsc::Receiver<TerminalEvent>,
    TerminalReaderHandle,
)> {
    terminal::enable_raw_mode()?;
    lcon_log::set_raw_mode_active(true);

    if let Err(e) = execute!(io::stdout(), EnableBracketedPaste) {
        debug!("Failed to enable bracketed paste: {}", e);
    }

    let keyboard_enhancement_enabled = if terminal::supports_keyboard_enhancement().unwrap_or(false) {
        let flags = KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES;
        if execute!(io::stdout(), PushKeyboardEnhancementFlags(flags)).is_ok() {
            debug!("Keyboard enhancement enabled (kitty protocol)");
            true
        } else {
            debug!("Failed to enable keyboard enhancement");
            false
        }
    } else {
        debug!("Terminal does not support keyboard enhancement (Ctrl+` may not be detected)");
        false
    };

    let (event_tx, event_rx) = mpsc::channel::<TerminalEvent>(64);
    let (cancel_tx, mut cancel_rx) = mpsc::channel::<()>(1);

    let join_handle = std::thread::spawn(move || {
        loop {
            if cancel_rx.try_recv().is_ok() {
                debug!("Terminal event reader cancelled");
                break;
            }

            match event::poll(Duration::from_millis(100)) {
                Ok(true) => {
                    let forwarded = match event::read() {
                        Ok(Event::Key(key_event)) => {
                            trace!(code = ?key_event.code, "Key event");
                            TerminalEvent::Key(key_event)
                        }
                        Ok(Event::Paste(text)) => TerminalEvent::Paste(text),
                        Ok(Event::Resize(cols, rows)) => TerminalEvent::Resize(cols, rows),
                        Ok(_) => continue,
                        Err(e) => {
                            error!("Error reading terminal event: {}", e);
                            break;
                        }
                    };

                    if event_tx.blocking_send(forwarded).is_err() {
                        break;
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    error!("Error polling terminal events: {}", e);
                    break;
                }
            }
        }

        if keyboard_enhancement_enabled {
            let _ = execute!(io::stdout(), PopKeyboardEnhancementFlags);
        }
        let _ = execute!(io::stdout(), DisableBracketedPaste);

        lcon_log::set_raw_mode_active(false);
        if let Err(e) = terminal::disable_raw_mode() {
            error!("Failed to disable raw mode: {}", e);
        }
        debug!("Terminal event reader stopped");
    });

    let handle = TerminalReaderHandle {
        cancel_tx: Some(cancel_tx),
        join_handle: Some(join_handle),
    };

    Ok((event_rx, handle))
}

/// Check if stdin is connected to a terminal (TTY)
pub fn is_terminal() -> bool {
    atty::is(atty::Stream::Stdin) && atty::is(atty::Stream::Stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backtick_is_toggle() {
        let press = key_event_to_press(&KeyEvent::new(KeyCode::Char('`'), KeyModifiers::NONE)).unwrap();
        assert_eq!(press, KeyPress::plain(ConsoleKey::Toggle));

        let press = key_event_to_press(&KeyEvent::new(KeyCode::Char('`'), KeyModifiers::CONTROL)).unwrap();
        assert_eq!(press, KeyPress::ctrl(ConsoleKey::Toggle));
    }

    #[test]
    fn test_tilde_implies_shift() {
        let press = key_event_to_press(&KeyEvent::new(KeyCode::Char('~'), KeyModifiers::NONE)).unwrap();
        assert_eq!(press.key, ConsoleKey::Toggle);
        assert!(press.shift);
    }

    #[test]
    fn test_ctrl_arrows() {
        let press = key_event_to_press(&KeyEvent::new(KeyCode::Down, KeyModifiers::CONTROL)).unwrap();
        assert_eq!(press, KeyPress::ctrl(ConsoleKey::Down));
    }

    #[test]
    fn test_typing_is_not_a_console_key() {
        assert!(key_event_to_press(&KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE)).is_none());
        assert!(key_event_to_press(&KeyEvent::new(KeyCode::F(2), KeyModifiers::NONE)).is_none());
    }

    #[test]
    fn test_release_is_ignored() {
        let mut event = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        event.kind = KeyEventKind::Release;
        assert!(key_event_to_press(&event).is_none());
    }

    #[test]
    fn test_is_quit() {
        assert!(is_quit(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        assert!(!is_quit(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE)));
    }
}
