//! Developer console
//!
//! A drop-down panel with a scrollback transcript and a one-line input box. Lines typed
//! into the box run as Lua statements through the [`ScriptEngine`].
//!
//! # Lifecycle
//!
//! The panel slides between two steady states:
//!
//! ```text
//! Disabled -> Enabling -> Enabled -> Disabling -> Disabled
//! ```
//!
//! Every tick moves a transient state half the remaining distance. Steady states check
//! the panel offset and start moving again when something else displaced it.
//!
//! # Read-only mode
//!
//! Ctrl+toggle shows the console without taking keyboard input, so the transcript can
//! be watched while the rest of the application keeps the keys.

pub mod gui;
pub mod headless;
pub mod history;
pub mod input;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use lcon_scripting::ScriptEngine;
use lcon_scripting::api::ConsoleRequest;
use tracing::{debug, info, warn};

pub use gui::{ConsoleGui, MutedSounds, SoundCue, UiSounds};
pub use headless::HeadlessGui;
pub use history::InputLog;
pub use input::{ConsoleInput, ConsoleKey, KeyPress};

pub const MIN_SCREEN_RATIO: f32 = 0.1;
pub const MAX_SCREEN_RATIO: f32 = 1.0;
const SCREEN_RATIO_STEP: f32 = 0.05;

const READ_ONLY_NOTICE: &str = "- CONSOLE IN READ-ONLY MODE! -";

const INTRO_BANNER: &str = "- Lua Console -\n\
Type Lua statements and press Enter to run them\n\
Press F1 for a list of helpful shortcuts\n\
-------------------------------------";

const SHORTCUTS: &[&str] = &[
    "--- SHORTCUTS ---",
    "` - Open/close the console",
    "CTRL + ` - Console in read-only mode without input capture",
    "CTRL + DOWN / UP - Increase/decrease console size (only while the console is open)",
    "UP / DOWN - Recall older/newer input",
    "----------------",
    "F1 - Show this list",
    "F3 - Save console log",
    "F4 - Save console user input log",
    "F5 - Clear console log",
    "CTRL + C - Quit",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleState {
    Disabled,
    Enabling,
    Enabled,
    Disabling,
}

/// Console behaviour settings
#[derive(Debug, Clone)]
pub struct ConsoleSettings {
    /// Initial panel height as a fraction of the screen
    pub screen_ratio: f32,
    /// Directory relative save requests from scripts resolve against
    pub output_dir: PathBuf,
    pub transcript_file: PathBuf,
    pub input_log_file: PathBuf,
    pub save_input_log_on_exit: bool,
    /// Mirror every printed line to the log at debug level
    pub log_to_cli: bool,
}

impl ConsoleSettings {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        let output_dir = output_dir.into();
        Self {
            screen_ratio: 0.3,
            transcript_file: output_dir.join("LogConsole.txt"),
            input_log_file: output_dir.join("LogConsoleInput.lua"),
            output_dir,
            save_input_log_on_exit: false,
            log_to_cli: false,
        }
    }
}

pub struct Console<G: ConsoleGui, S: UiSounds = MutedSounds> {
    gui: G,
    sounds: S,
    settings: ConsoleSettings,
    state: ConsoleState,
    screen_ratio: f32,
    read_only: bool,
    /// Input box contents kept while the box is closed or shows the read-only notice
    saved_input: String,
    transcript: String,
    input_log: InputLog,
    failed_statements: usize,
}

impl<G: ConsoleGui, S: UiSounds> Console<G, S> {
    /// Create a closed console and print the intro banner
    pub fn new(gui: G, sounds: S, settings: ConsoleSettings) -> Self {
        let mut console = Self {
            gui,
            sounds,
            screen_ratio: MIN_SCREEN_RATIO,
            settings,
            state: ConsoleState::Disabled,
            read_only: false,
            saved_input: String::new(),
            transcript: INTRO_BANNER.to_string(),
            input_log: InputLog::new(),
            failed_statements: 0,
        };

        console.set_screen_size(console.settings.screen_ratio);
        let height = console.panel_height();
        console.gui.set_panel_y(-height);
        console.gui.set_panel_visible(false);
        console.gui.set_input_enabled(false);
        console.gui.set_input_focus(false);
        console.gui.set_transcript(&console.transcript);

        console
    }

    pub fn gui(&self) -> &G {
        &self.gui
    }

    pub fn gui_mut(&mut self) -> &mut G {
        &mut self.gui
    }

    pub fn state(&self) -> ConsoleState {
        self.state
    }

    /// Open or opening
    pub fn is_enabled(&self) -> bool {
        matches!(self.state, ConsoleState::Enabled | ConsoleState::Enabling)
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn screen_ratio(&self) -> f32 {
        self.screen_ratio
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn input_log(&self) -> &InputLog {
        &self.input_log
    }

    /// Statements submitted from the input box that ended in an error
    pub fn failed_statements(&self) -> usize {
        self.failed_statements
    }

    fn panel_height(&self) -> i32 {
        (self.gui.screen_height() as f32 * self.screen_ratio) as i32
    }

    /// Start opening or closing the panel
    ///
    /// Does nothing when the console is already in the target state or moving towards it.
    pub fn set_enabled(&mut self, enable: bool) {
        if enable && !self.is_enabled() {
            self.state = ConsoleState::Enabling;
            self.sounds.play(SoundCue::EnterMenu);
        } else if !enable && matches!(self.state, ConsoleState::Enabled | ConsoleState::Enabling) {
            self.state = ConsoleState::Disabling;
            self.sounds.play(SoundCue::ExitMenu);
        }
    }

    /// Show the console without capturing input
    pub fn set_read_only(&mut self) {
        if self.read_only {
            return;
        }
        self.saved_input = strip_backticks(&self.gui.input_text());
        self.gui.set_input_text(READ_ONLY_NOTICE);
        self.read_only = true;
        self.set_enabled(true);
    }

    fn leave_read_only(&mut self) {
        self.restore_input();
        self.read_only = false;
    }

    fn restore_input(&mut self) {
        let text = std::mem::take(&mut self.saved_input);
        self.gui.set_input_text(&text);
        self.gui.set_input_cursor(text.len());
    }

    /// Set the panel height as a fraction of the screen
    ///
    /// The ratio is clamped to [0.1, 1.0]; NaN is ignored.
    pub fn set_screen_size(&mut self, ratio: f32) {
        if ratio.is_nan() {
            return;
        }
        self.screen_ratio = ratio.clamp(MIN_SCREEN_RATIO, MAX_SCREEN_RATIO);
        let height = self.panel_height();
        self.gui.set_panel_height(height);
        debug!(ratio = self.screen_ratio, height, "Console resized");
    }

    /// Append a line to the transcript
    pub fn print_string(&mut self, line: &str) {
        self.transcript.push('\n');
        self.transcript.push_str(line);
        self.gui.set_transcript(&self.transcript);

        if self.settings.log_to_cli {
            debug!(source = "console", "{}", line);
        }
    }

    /// Open the console and list the keyboard shortcuts
    pub fn show_shortcuts(&mut self) {
        if !self.is_enabled() {
            self.set_enabled(true);
        }
        for line in SHORTCUTS {
            self.print_string(line);
        }
    }

    /// Forget the input log and empty the transcript
    pub fn clear_log(&mut self) {
        self.input_log.clear();
        self.transcript.clear();
        self.gui.set_transcript(&self.transcript);
    }

    /// Write the whole transcript to `path`
    pub fn save_all_text(&mut self, path: &Path) -> io::Result<()> {
        fs::write(path, &self.transcript)?;
        self.print_string(&format!("SYSTEM: Entire console contents saved to {}", path.display()));
        Ok(())
    }

    /// Write the input log to `path`, newest first, one statement per line
    pub fn save_input_log(&mut self, path: &Path) -> io::Result<()> {
        let mut file = io::BufWriter::new(fs::File::create(path)?);
        for line in self.input_log.entries() {
            if line.ends_with(';') {
                writeln!(file, "{}", line)?;
            } else {
                writeln!(file, "{};", line)?;
            }
        }
        file.flush()?;
        self.print_string(&format!("SYSTEM: Console input log saved to {}", path.display()));
        Ok(())
    }

    fn save_transcript_to(&mut self, path: &Path) {
        if let Err(e) = self.save_all_text(path) {
            warn!("Failed to save console contents to {}: {}", path.display(), e);
            self.print_string(&format!("ERROR: Failed to save console contents to {}: {}", path.display(), e));
        }
    }

    fn save_input_log_to(&mut self, path: &Path) {
        if let Err(e) = self.save_input_log(path) {
            warn!("Failed to save console input log to {}: {}", path.display(), e);
            self.print_string(&format!("ERROR: Failed to save console input log to {}: {}", path.display(), e));
        }
    }

    /// Where a script-requested save goes; only the file name of `requested` is used
    fn request_path(&self, requested: Option<&str>, default: &Path) -> PathBuf {
        match requested.and_then(|name| Path::new(name).file_name()) {
            Some(name) => self.settings.output_dir.join(name),
            None => default.to_path_buf(),
        }
    }

    /// Move printed lines and console requests from the scripting layer into the console
    pub fn drain_script_output(&mut self, engine: &ScriptEngine) {
        for line in engine.take_output() {
            self.print_string(&line);
        }

        for request in engine.take_requests() {
            match request {
                ConsoleRequest::Clear => self.clear_log(),
                ConsoleRequest::SaveAllText(name) => {
                    let path = self.request_path(name.as_deref(), &self.settings.transcript_file.clone());
                    self.save_transcript_to(&path);
                }
                ConsoleRequest::SaveInputLog(name) => {
                    let path = self.request_path(name.as_deref(), &self.settings.input_log_file.clone());
                    self.save_input_log_to(&path);
                }
            }
        }
    }

    fn run_statement(&mut self, line: &str, engine: &mut ScriptEngine) {
        engine.clear_errors();
        self.print_string(line);
        // Failures are recorded in the engine's error slot, which is read below
        let _ = engine.run_script_string(line, false);
        self.drain_script_output(engine);

        if let Some(error) = engine.last_error().map(str::to_string) {
            self.failed_statements += 1;
            self.print_string(&format!("ERROR: {}", error));
        }

        self.input_log.push(line);
    }

    /// Run the contents of the input box and clear it
    pub fn feed_string(&mut self, engine: &mut ScriptEngine) {
        let line = self.gui.input_text();
        self.run_statement(&line, engine);
        self.gui.set_input_text("");
    }

    /// Run every non-empty line of a multi-line input box, in order, then clear it
    pub fn feed_multiple_strings(&mut self, engine: &mut ScriptEngine) {
        let text = self.gui.input_text();
        for line in text.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                continue;
            }
            self.run_statement(line, engine);
        }
        self.gui.set_input_text("");
    }

    fn load_logged_input(&mut self, newer: bool) {
        let text = if newer {
            self.input_log.newer()
        } else {
            self.input_log.older()
        };
        self.gui.set_input_text(&text);
        self.gui.set_input_cursor(text.len());
    }

    /// Advance the panel animation by one step
    fn animate(&mut self) {
        let height = self.panel_height();
        let y = self.gui.panel_y();

        match self.state {
            ConsoleState::Enabling => {
                self.gui.set_panel_visible(true);
                let y = y - y.div_euclid(2);
                self.gui.set_panel_y(y);
                if y >= 0 {
                    self.state = ConsoleState::Enabled;
                }
            }
            ConsoleState::Enabled => {
                if y < 0 {
                    self.state = ConsoleState::Enabling;
                }
                self.gui.set_panel_visible(true);
            }
            ConsoleState::Disabling => {
                let y = y - (height + y + 1).div_euclid(2);
                self.gui.set_panel_y(y);
                if y <= -height {
                    self.gui.set_panel_visible(false);
                    self.gui.set_input_enabled(false);
                    self.gui.set_input_focus(false);
                    self.state = ConsoleState::Disabled;
                }
            }
            ConsoleState::Disabled => {
                if y > -height {
                    self.state = ConsoleState::Disabling;
                }
                self.gui.set_panel_visible(false);
                self.gui.set_input_enabled(false);
                self.gui.set_input_focus(false);
            }
        }
    }

    /// Process one tick of input and animation
    pub fn update(&mut self, input: &ConsoleInput, engine: &mut ScriptEngine) {
        self.drain_script_output(engine);

        if input.pressed_with_ctrl(ConsoleKey::Toggle) {
            if self.read_only {
                self.leave_read_only();
            } else {
                self.set_read_only();
            }
        } else if input.pressed_plain(ConsoleKey::Toggle) {
            if self.is_enabled() {
                if self.read_only {
                    self.leave_read_only();
                } else {
                    self.gui.set_input_enabled(false);
                    self.gui.set_input_focus(false);
                    self.saved_input = strip_backticks(&self.gui.input_text());
                    self.set_enabled(false);
                }
            } else {
                self.restore_input();
                self.set_enabled(true);
            }
        }

        if input.pressed_without_ctrl(ConsoleKey::F1) {
            self.show_shortcuts();
        }
        if input.pressed_without_ctrl(ConsoleKey::F3) {
            let path = self.settings.transcript_file.clone();
            self.save_transcript_to(&path);
        }
        if input.pressed_without_ctrl(ConsoleKey::F4) {
            let path = self.settings.input_log_file.clone();
            self.save_input_log_to(&path);
        }
        if input.pressed_without_ctrl(ConsoleKey::F5) {
            self.clear_log();
        }

        self.animate();

        if self.state != ConsoleState::Enabled {
            return;
        }

        if input.pressed_with_ctrl(ConsoleKey::Down) {
            self.set_screen_size(self.screen_ratio + SCREEN_RATIO_STEP);
        } else if input.pressed_with_ctrl(ConsoleKey::Up) {
            self.set_screen_size(self.screen_ratio - SCREEN_RATIO_STEP);
        }

        if self.read_only {
            self.gui.set_input_enabled(false);
            self.gui.set_input_focus(false);
            return;
        }

        self.gui.set_input_enabled(true);
        self.gui.set_input_focus(true);

        let text = self.gui.input_text();
        if text.contains('`') {
            let stripped = strip_backticks(&text);
            self.gui.set_input_text(&stripped);
            self.gui.set_input_cursor(stripped.len());
        }

        if input.pressed_without_ctrl(ConsoleKey::Enter) {
            self.feed_string(engine);
        }

        if self.gui.input_text().contains('\n') {
            self.feed_multiple_strings(engine);
        }

        if !self.input_log.is_empty() {
            if input.pressed_without_ctrl(ConsoleKey::Up) {
                self.load_logged_input(false);
            } else if input.pressed_without_ctrl(ConsoleKey::Down) {
                self.load_logged_input(true);
            }
        }
    }

    /// Flush the transcript, and the input log when configured
    pub fn shutdown(&mut self) {
        let transcript = self.settings.transcript_file.clone();
        self.save_transcript_to(&transcript);

        if self.settings.save_input_log_on_exit {
            let input_log = self.settings.input_log_file.clone();
            self.save_input_log_to(&input_log);
        }

        info!(
            statements = self.input_log.len(),
            failed = self.failed_statements,
            "Console shut down"
        );
    }
}

fn strip_backticks(text: &str) -> String {
    text.replace('`', "")
}
