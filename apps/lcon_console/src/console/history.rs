/// Input log of submitted console commands
///
/// Entries are kept newest first. The cursor sits between entries: position 0 is the
/// sentinel in front of the newest entry (nothing recalled), `len` is past the oldest.
/// Stepping in one direction right after stepping in the other skips the entry that is
/// already on screen.

use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LastMove {
    None,
    Older,
    Newer,
}

#[derive(Debug)]
pub struct InputLog {
    entries: VecDeque<String>,
    position: usize,
    last_move: LastMove,
}

impl Default for InputLog {
    fn default() -> Self {
        Self::new()
    }
}

impl InputLog {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            position: 0,
            last_move: LastMove::None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries, newest first
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Record a submitted line
    ///
    /// Empty lines and repeats of the newest entry are not recorded. The cursor goes
    /// back to the sentinel either way.
    pub fn push(&mut self, line: &str) {
        if !line.is_empty() && self.entries.front().map(String::as_str) != Some(line) {
            self.entries.push_front(line.to_string());
        }
        self.reset();
    }

    /// Move the cursor back to the sentinel
    pub fn reset(&mut self) {
        self.position = 0;
        self.last_move = LastMove::None;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.reset();
    }

    /// Step towards older entries and return the text to show
    ///
    /// Past the oldest entry this keeps returning an empty string.
    pub fn older(&mut self) -> String {
        if self.last_move == LastMove::Newer && self.position < self.entries.len() {
            self.position += 1;
        }

        match self.entries.get(self.position) {
            Some(entry) => {
                self.position += 1;
                self.last_move = LastMove::Older;
                entry.clone()
            }
            None => {
                self.position = self.entries.len();
                self.last_move = LastMove::None;
                String::new()
            }
        }
    }

    /// Step towards newer entries and return the text to show
    ///
    /// Stepping past the newest entry lands on the sentinel, which shows an empty string.
    pub fn newer(&mut self) -> String {
        if self.last_move == LastMove::Older && self.position > 0 {
            self.position -= 1;
        }

        if self.position == 0 {
            self.last_move = LastMove::None;
            return String::new();
        }

        self.position -= 1;
        self.last_move = LastMove::Newer;
        self.entries[self.position].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_of(oldest_first: &[&str]) -> InputLog {
        let mut log = InputLog::new();
        for line in oldest_first {
            log.push(line);
        }
        log
    }

    #[test]
    fn test_older_walks_to_empty_and_stays() {
        let mut log = log_of(&["c1", "c2", "c3"]);
        assert_eq!(log.older(), "c3");
        assert_eq!(log.older(), "c2");
        assert_eq!(log.older(), "c1");
        assert_eq!(log.older(), "");
        assert_eq!(log.older(), "");
    }

    #[test]
    fn test_newer_from_sentinel_is_empty() {
        let mut log = log_of(&["c1", "c2"]);
        assert_eq!(log.newer(), "");
        assert_eq!(log.older(), "c2");
    }

    #[test]
    fn test_direction_reversal_skips_shown_entry() {
        let mut log = log_of(&["c1", "c2", "c3"]);
        assert_eq!(log.older(), "c3");
        assert_eq!(log.older(), "c2");
        assert_eq!(log.newer(), "c3");
        assert_eq!(log.newer(), "");
        assert_eq!(log.older(), "c3");
        assert_eq!(log.older(), "c2");
        assert_eq!(log.newer(), "c3");
        assert_eq!(log.older(), "c2");
    }

    #[test]
    fn test_newer_after_running_off_the_end() {
        let mut log = log_of(&["c1", "c2", "c3"]);
        for _ in 0..4 {
            log.older();
        }
        assert_eq!(log.newer(), "c1");
        assert_eq!(log.newer(), "c2");
    }

    #[test]
    fn test_duplicate_and_empty_lines_are_skipped() {
        let log = log_of(&["foo", "foo", ""]);
        assert_eq!(log.entries().collect::<Vec<_>>(), vec!["foo"]);

        let log = log_of(&["foo", "bar", "foo"]);
        assert_eq!(log.entries().collect::<Vec<_>>(), vec!["foo", "bar", "foo"]);
    }

    #[test]
    fn test_push_resets_cursor() {
        let mut log = log_of(&["c1", "c2"]);
        log.older();
        log.older();
        log.push("c3");
        assert_eq!(log.older(), "c3");
    }
}
