/// Keys the console reacts to, collected once per tick
///
/// Front-ends translate their own events into `KeyPress` values. Text editing of the
/// input box stays in the front-end; the console only sees the keys below.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleKey {
    /// Open/close key (backtick)
    Toggle,
    Enter,
    Up,
    Down,
    F1,
    F3,
    F4,
    F5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: ConsoleKey,
    pub ctrl: bool,
    pub shift: bool,
}

impl KeyPress {
    pub fn plain(key: ConsoleKey) -> Self {
        Self { key, ctrl: false, shift: false }
    }

    pub fn ctrl(key: ConsoleKey) -> Self {
        Self { key, ctrl: true, shift: false }
    }

    pub fn shift(key: ConsoleKey) -> Self {
        Self { key, ctrl: false, shift: true }
    }
}

/// Key presses seen during one tick
#[derive(Debug, Clone, Default)]
pub struct ConsoleInput {
    presses: Vec<KeyPress>,
}

impl ConsoleInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, press: KeyPress) {
        self.presses.push(press);
    }

    pub fn is_empty(&self) -> bool {
        self.presses.is_empty()
    }

    /// Pressed with Ctrl held, any Shift state
    pub fn pressed_with_ctrl(&self, key: ConsoleKey) -> bool {
        self.presses.iter().any(|p| p.key == key && p.ctrl)
    }

    /// Pressed without Ctrl, any Shift state
    pub fn pressed_without_ctrl(&self, key: ConsoleKey) -> bool {
        self.presses.iter().any(|p| p.key == key && !p.ctrl)
    }

    /// Pressed with no modifier at all
    pub fn pressed_plain(&self, key: ConsoleKey) -> bool {
        self.presses.iter().any(|p| p.key == key && !p.ctrl && !p.shift)
    }
}

impl FromIterator<KeyPress> for ConsoleInput {
    fn from_iter<I: IntoIterator<Item = KeyPress>>(iter: I) -> Self {
        Self {
            presses: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifier_queries() {
        let input: ConsoleInput = [KeyPress::shift(ConsoleKey::Toggle), KeyPress::ctrl(ConsoleKey::Up)]
            .into_iter()
            .collect();

        assert!(!input.pressed_plain(ConsoleKey::Toggle));
        assert!(input.pressed_without_ctrl(ConsoleKey::Toggle));
        assert!(input.pressed_with_ctrl(ConsoleKey::Up));
        assert!(!input.pressed_without_ctrl(ConsoleKey::Up));
        assert!(!input.pressed_with_ctrl(ConsoleKey::Down));
    }
}
