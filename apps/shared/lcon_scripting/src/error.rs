use thiserror::Error;

/// How bad a scripting failure is for the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Reported as a diagnostic; execution continues
    Recovered,
    /// The scripting layer cannot work at all; startup must abort
    Fatal,
}

#[derive(Error, Debug)]
pub enum ScriptError {
    /// Syntax or runtime error raised by the script, already attributed to a source line
    #[error("{0}")]
    Script(String),

    #[error("Can't run an empty script string!")]
    EmptySource,

    #[error("Can't run a script file with an empty filepath!")]
    EmptyPath,

    #[error("Failed to read script file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Host callback panicked: {0}")]
    Panic(String),

    #[error("Failed to initialize the {runtime} runtime: {message}")]
    Init { runtime: &'static str, message: String },
}

impl ScriptError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ScriptError::Init { .. } => ErrorSeverity::Fatal,
            _ => ErrorSeverity::Recovered,
        }
    }
}

#[derive(Error, Debug)]
pub enum PresetError {
    #[error("Failed to read data directory '{path}': {source}")]
    DataDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity() {
        assert_eq!(ScriptError::EmptyPath.severity(), ErrorSeverity::Recovered);
        assert_eq!(
            ScriptError::Script("console:1: boom".into()).severity(),
            ErrorSeverity::Recovered
        );
        let init = ScriptError::Init {
            runtime: "Lua",
            message: "out of memory".into(),
        };
        assert_eq!(init.severity(), ErrorSeverity::Fatal);
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            ScriptError::EmptyPath.to_string(),
            "Can't run a script file with an empty filepath!"
        );
        assert_eq!(ScriptError::Script("x:2: y".into()).to_string(), "x:2: y");
    }
}
