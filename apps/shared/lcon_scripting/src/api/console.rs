/// Console API abstraction
///
/// Scripts and the bridge never write to the console directly. They push lines and
/// requests into this queue and the console drains it once per tick. Every line is
/// also mirrored to tracing with the `lua` target fields.
/// This module is runtime-agnostic.

use std::collections::VecDeque;

use tracing::{debug, info, warn};

/// Something a script asked the console to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleRequest {
    /// Clear the transcript and the input log
    Clear,
    /// Save the transcript to the given file (default name when `None`)
    SaveAllText(Option<String>),
    /// Save the input log to the given file (default name when `None`)
    SaveInputLog(Option<String>),
}

/// Console API implementation
#[derive(Debug, Default)]
pub struct ConsoleApi {
    runtime_type: &'static str,
    lines: VecDeque<String>,
    requests: VecDeque<ConsoleRequest>,
}

impl ConsoleApi {
    /// Create a new ConsoleApi for the given runtime name (used in log fields)
    pub fn new(runtime_type: &'static str) -> Self {
        Self {
            runtime_type,
            ..Self::default()
        }
    }

    /// Output of a script `print`
    pub fn print(&mut self, message: &str) {
        info!(runtime_type = self.runtime_type, source = "print", "{}", message);
        self.lines.push_back(format!("PRINT: {}", message));
    }

    /// A recovered error from the bridge (missing preset, bad cast, closed file, ...)
    pub fn error(&mut self, message: &str) {
        warn!(runtime_type = self.runtime_type, source = "bridge", "{}", message);
        self.lines.push_back(format!("ERROR: {}", message));
    }

    /// Informational line from the host itself
    pub fn system(&mut self, message: &str) {
        debug!(runtime_type = self.runtime_type, source = "system", "{}", message);
        self.lines.push_back(format!("SYSTEM: {}", message));
    }

    pub fn request(&mut self, request: ConsoleRequest) {
        debug!(?request, "Console request queued");
        self.requests.push_back(request);
    }

    pub fn take_lines(&mut self) -> Vec<String> {
        self.lines.drain(..).collect()
    }

    pub fn take_requests(&mut self) -> Vec<ConsoleRequest> {
        self.requests.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_are_prefixed_and_drained_in_order() {
        let mut console = ConsoleApi::new("lua");
        console.print("hello");
        console.error("boom");
        console.system("saved");
        assert_eq!(
            console.take_lines(),
            vec!["PRINT: hello", "ERROR: boom", "SYSTEM: saved"]
        );
        assert!(console.take_lines().is_empty());
        assert!(console.take_requests().is_empty());
    }

    #[test]
    fn test_requests() {
        let mut console = ConsoleApi::new("lua");
        console.request(ConsoleRequest::Clear);
        console.request(ConsoleRequest::SaveAllText(Some("out.txt".into())));
        assert_eq!(
            console.take_requests(),
            vec![
                ConsoleRequest::Clear,
                ConsoleRequest::SaveAllText(Some("out.txt".into()))
            ]
        );
        assert!(console.take_requests().is_empty());
        assert!(console.take_lines().is_empty());
    }
}
