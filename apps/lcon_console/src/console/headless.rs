/// In-memory panel used for batch runs and tests

use super::gui::ConsoleGui;

#[derive(Debug, Clone)]
pub struct HeadlessGui {
    screen_height: i32,
    pub panel_height: i32,
    pub panel_y: i32,
    pub visible: bool,
    pub transcript: String,
    pub input: String,
    pub cursor: usize,
    pub input_enabled: bool,
    pub input_focused: bool,
}

impl HeadlessGui {
    pub fn new(screen_height: i32) -> Self {
        Self {
            screen_height,
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
}

impl ConsoleGui for HeadlessGui {
    fn screen_height(&self) -> i32 {
        self.screen_height
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
        self.transcript = text.to_string();
    }

    fn input_text(&self) -> String {
        self.input.clone()
    }

    fn set_input_text(&mut self, text: &str) {
        self.input = text.to_string();
        self.cursor = self.cursor.min(self.input.len());
    }

    fn set_input_cursor(&mut self, position: usize) {
        self.cursor = position.min(self.input.len());
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        self.input_enabled = enabled;
    }

    fn set_input_focus(&mut self, focused: bool) {
        self.input_focused = focused;
    }
}
