/// Seams between the console logic and whatever draws it
///
/// The console never touches a terminal or a window directly. A front-end implements
/// `ConsoleGui` for the panel (transcript label plus one-line input box) and `UiSounds`
/// for the menu cues.

use tracing::trace;

pub trait ConsoleGui {
    /// Height of the screen the panel slides over, in the front-end's units
    fn screen_height(&self) -> i32;

    /// Resize the panel and reflow the transcript and input regions inside it
    fn set_panel_height(&mut self, height: i32);

    /// Vertical offset of the panel; 0 is fully shown, `-height` fully hidden
    fn panel_y(&self) -> i32;
    fn set_panel_y(&mut self, y: i32);

    fn set_panel_visible(&mut self, visible: bool);

    fn set_transcript(&mut self, text: &str);

    fn input_text(&self) -> String;
    fn set_input_text(&mut self, text: &str);
    fn set_input_cursor(&mut self, position: usize);
    fn set_input_enabled(&mut self, enabled: bool);
    fn set_input_focus(&mut self, focused: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundCue {
    EnterMenu,
    ExitMenu,
}

pub trait UiSounds {
    fn play(&mut self, cue: SoundCue);
}

/// Sound sink for front-ends without audio
#[derive(Debug, Default)]
pub struct MutedSounds;

impl UiSounds for MutedSounds {
    fn play(&mut self, cue: SoundCue) {
        trace!("UI sound cue: {:?}", cue);
    }
}
