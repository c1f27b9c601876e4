/// File channel table
///
/// A fixed number of slots holding files opened on behalf of scripts. Scripts only
/// ever see the slot index; an index is valid exactly while its slot is open.
/// Every path goes through the sandbox in `path_security` before a slot is used.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use super::path_security::{PathSecurityConfig, SandboxViolation, validate_script_path};

/// Why a file could not be opened
#[derive(Error, Debug)]
pub enum OpenError {
    #[error("{0}")]
    Rejected(#[from] SandboxViolation),

    #[error("Can't open file, no more slots.")]
    NoFreeSlot,

    #[error("Unsupported file mode '{0}'")]
    BadMode(String),

    #[error("Can't open file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Failure of an operation on an already issued handle
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Invalid or closed file handle {0}")]
    InvalidHandle(i64),

    #[error("End of file")]
    Eof,

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Translate a C `fopen` mode string into open options
///
/// Accepts `r`, `w`, `a` with an optional `+`; `b` is ignored anywhere in the string.
pub fn parse_mode(mode: &str) -> Option<OpenOptions> {
    let stripped: String = mode.chars().filter(|c| *c != 'b').collect();
    let mut options = OpenOptions::new();
    match stripped.as_str() {
        "r" => options.read(true),
        "r+" => options.read(true).write(true),
        "w" => options.write(true).create(true).truncate(true),
        "w+" => options.read(true).write(true).create(true).truncate(true),
        "a" => options.append(true).create(true),
        "a+" => options.read(true).append(true).create(true),
        _ => return None,
    };
    Some(options)
}

struct Channel {
    reader: BufReader<File>,
    path: PathBuf,
}

/// Bounded table of script-visible file handles
pub struct FileChannelTable {
    slots: Vec<Option<Channel>>,
    security: PathSecurityConfig,
    max_line_length: usize,
}

impl FileChannelTable {
    /// Create a table with `capacity` empty slots
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of simultaneously open files
    /// * `security` - Sandbox rules applied to every path
    /// * `max_line_length` - Most bytes a single `read_line` returns, terminator included
    pub fn new(capacity: usize, security: PathSecurityConfig, max_line_length: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            security,
            max_line_length: max_line_length.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Open a file inside a module tree
    ///
    /// The path is validated before any slot is looked at, so a rejected path never
    /// reports a full table.
    pub fn open(&mut self, path: &str, mode: &str) -> Result<i64, OpenError> {
        let resolved = validate_script_path(path, &self.security)?;
        let options = parse_mode(mode).ok_or_else(|| OpenError::BadMode(mode.to_string()))?;

        let index = self
            .slots
            .iter()
            .position(|slot| slot.is_none())
            .ok_or(OpenError::NoFreeSlot)?;

        let file = options.open(&resolved).map_err(|source| OpenError::Io {
            path: resolved.display().to_string(),
            source,
        })?;

        debug!(handle = index, mode, "Opened {}", resolved.display());
        self.slots[index] = Some(Channel {
            reader: BufReader::new(file),
            path: resolved,
        });
        Ok(index as i64)
    }

    fn channel_mut(&mut self, handle: i64) -> Result<&mut Channel, ChannelError> {
        usize::try_from(handle)
            .ok()
            .and_then(|index| self.slots.get_mut(index))
            .and_then(|slot| slot.as_mut())
            .ok_or(ChannelError::InvalidHandle(handle))
    }

    /// Close a handle; unknown or already closed handles are ignored
    pub fn close(&mut self, handle: i64) {
        let Some(slot) = usize::try_from(handle)
            .ok()
            .and_then(|index| self.slots.get_mut(index))
        else {
            return;
        };
        if let Some(channel) = slot.take() {
            let mut file = channel.reader.into_inner();
            if let Err(e) = file.flush() {
                debug!(handle, "Flush on close failed: {}", e);
            }
            debug!(handle, "Closed {}", channel.path.display());
        }
    }

    pub fn close_all(&mut self) {
        for handle in 0..self.slots.len() {
            self.close(handle as i64);
        }
    }

    /// Read the next line, terminator included
    ///
    /// At most `max_line_length` bytes come back per call; a longer line is returned
    /// in pieces.
    pub fn read_line(&mut self, handle: i64) -> Result<String, ChannelError> {
        let limit = self.max_line_length as u64;
        let channel = self.channel_mut(handle)?;

        let mut buffer = Vec::new();
        let read = (&mut channel.reader)
            .take(limit)
            .read_until(b'\n', &mut buffer)?;
        if read == 0 {
            return Err(ChannelError::Eof);
        }
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Write `text` exactly as given; no terminator is added
    pub fn write_line(&mut self, handle: i64, text: &str) -> Result<(), ChannelError> {
        let channel = self.channel_mut(handle)?;
        // Drop read-ahead so the write lands at the logical position
        channel.reader.seek(SeekFrom::Current(0))?;
        channel.reader.get_mut().write_all(text.as_bytes())?;
        Ok(())
    }

    /// True for invalid handles and for files with nothing left to read
    pub fn eof(&mut self, handle: i64) -> bool {
        match self.channel_mut(handle) {
            Ok(channel) => channel
                .reader
                .fill_buf()
                .map(|buffer| buffer.is_empty())
                .unwrap_or(true),
            Err(_) => true,
        }
    }
}

impl Drop for FileChannelTable {
    fn drop(&mut self) {
        self.close_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn table(root: &Path, capacity: usize) -> FileChannelTable {
        fs::create_dir_all(root.join("Some.rte")).unwrap();
        FileChannelTable::new(capacity, PathSecurityConfig::new(root, ".rte"), 4095)
    }

    #[test]
    fn test_parse_mode() {
        assert!(parse_mode("r").is_some());
        assert!(parse_mode("rb").is_some());
        assert!(parse_mode("a+").is_some());
        assert!(parse_mode("w+b").is_some());
        assert!(parse_mode("x").is_none());
        assert!(parse_mode("").is_none());
    }

    #[test]
    fn test_write_then_read_lines() {
        let temp = tempdir().unwrap();
        let mut files = table(temp.path(), 4);

        let out = files.open("Some.rte/data.txt", "w").unwrap();
        files.write_line(out, "first\n").unwrap();
        files.write_line(out, "second").unwrap();
        files.close(out);

        let input = files.open("Some.rte/data.txt", "r").unwrap();
        assert!(!files.eof(input));
        assert_eq!(files.read_line(input).unwrap(), "first\n");
        assert_eq!(files.read_line(input).unwrap(), "second");
        assert!(files.eof(input));
        assert!(matches!(files.read_line(input), Err(ChannelError::Eof)));
    }

    #[test]
    fn test_append_mode() {
        let temp = tempdir().unwrap();
        let mut files = table(temp.path(), 2);
        fs::write(temp.path().join("Some.rte/log.txt"), "a\n").unwrap();

        let handle = files.open("Some.rte/log.txt", "a").unwrap();
        files.write_line(handle, "b\n").unwrap();
        files.close(handle);

        let content = fs::read_to_string(temp.path().join("Some.rte/log.txt")).unwrap();
        assert_eq!(content, "a\nb\n");
    }

    #[test]
    fn test_rejected_paths() {
        let temp = tempdir().unwrap();
        let mut files = table(temp.path(), 2);
        assert!(matches!(
            files.open("../secrets.txt", "r"),
            Err(OpenError::Rejected(SandboxViolation::ParentTraversal(_)))
        ));
        assert!(matches!(
            files.open("Elsewhere/data.txt", "w"),
            Err(OpenError::Rejected(_))
        ));
        assert_eq!(files.open_count(), 0);
    }

    #[test]
    fn test_slots_are_bounded() {
        let temp = tempdir().unwrap();
        let mut files = table(temp.path(), 2);
        let a = files.open("Some.rte/a.txt", "w").unwrap();
        let b = files.open("Some.rte/b.txt", "w").unwrap();
        assert_eq!((a, b), (0, 1));
        assert!(matches!(
            files.open("Some.rte/c.txt", "w"),
            Err(OpenError::NoFreeSlot)
        ));

        files.close(a);
        assert_eq!(files.open("Some.rte/c.txt", "w").unwrap(), 0);
    }

    #[test]
    fn test_missing_file_for_reading() {
        let temp = tempdir().unwrap();
        let mut files = table(temp.path(), 2);
        assert!(matches!(
            files.open("Some.rte/missing.txt", "r"),
            Err(OpenError::Io { .. })
        ));
        assert_eq!(files.open_count(), 0);
    }

    #[test]
    fn test_invalid_handles() {
        let temp = tempdir().unwrap();
        let mut files = table(temp.path(), 2);
        assert!(files.eof(-1));
        assert!(files.eof(7));
        assert!(matches!(files.read_line(0), Err(ChannelError::InvalidHandle(0))));
        assert!(matches!(
            files.write_line(-3, "x"),
            Err(ChannelError::InvalidHandle(-3))
        ));
        files.close(-1);
        files.close(99);
        files.close_all();
        files.close_all();
    }

    #[test]
    fn test_long_line_is_split() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("Some.rte")).unwrap();
        fs::write(temp.path().join("Some.rte/long.txt"), "abcdefgh\nabcd\n").unwrap();
        let mut files = FileChannelTable::new(1, PathSecurityConfig::new(temp.path(), ".rte"), 5);

        let handle = files.open("Some.rte/long.txt", "r").unwrap();
        assert_eq!(files.read_line(handle).unwrap(), "abcde");
        assert_eq!(files.read_line(handle).unwrap(), "fgh\n");
        // The terminator counts towards the bound
        assert_eq!(files.read_line(handle).unwrap(), "abcd\n");
    }
}
