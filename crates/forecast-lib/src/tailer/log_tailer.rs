//! Polling tailer for an append-only log file
//!
//! Each poll reads only the byte range appended since the previous poll.
//! Complete lines are returned; a trailing partial line is held back until
//! the writer finishes it, unless it grows past the chunk limit, in which
//! case it is dropped up to its terminating newline. A file that shrinks,
//! changes identity, or disappears is treated as rotated and consumed again
//! from offset 0.

use std::fs::{File, Metadata};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Upper bound on bytes consumed by a single poll
pub const DEFAULT_MAX_CHUNK_BYTES: u64 = 8 * 1024 * 1024;

/// Device/inode pair used to notice a replaced file that already grew
/// past the previous offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileIdentity {
    dev: u64,
    ino: u64,
}

impl FileIdentity {
    #[cfg(unix)]
    fn of(meta: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: meta.dev(),
            ino: meta.ino(),
        })
    }

    #[cfg(not(unix))]
    fn of(_meta: &Metadata) -> Option<Self> {
        None
    }
}

/// How much of the tailed file has been consumed
#[derive(Debug, Clone, Default)]
pub struct LogCursor {
    /// Byte offset of the first unread byte
    pub offset: u64,
    /// Bytes after the last line separator, waiting for completion
    pending: Vec<u8>,
    /// Skipping the tail of an oversized line until its newline
    discarding: bool,
    identity: Option<FileIdentity>,
}

impl LogCursor {
    /// Bytes read but not yet surfaced as a complete line
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn has_consumed(&self) -> bool {
        self.offset > 0 || self.identity.is_some()
    }

    fn reset(&mut self) {
        self.offset = 0;
        self.pending.clear();
        self.discarding = false;
        self.identity = None;
    }
}

/// Output of a single poll
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TailBatch {
    /// Newly completed lines, in file order
    pub lines: Vec<String>,
    /// The file was truncated, replaced or removed since the last poll
    pub rotated: bool,
    /// The file existed at poll time
    pub file_present: bool,
    /// Every byte present at poll time has been consumed
    pub caught_up: bool,
    /// Lines dropped for exceeding the chunk limit without a newline
    pub oversized: u64,
}

/// Incremental reader for a growing log file
#[derive(Debug)]
pub struct LogTailer {
    path: PathBuf,
    cursor: LogCursor,
    max_chunk_bytes: u64,
}

impl LogTailer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cursor: LogCursor::default(),
            max_chunk_bytes: DEFAULT_MAX_CHUNK_BYTES,
        }
    }

    /// Limit the bytes read per poll (minimum 1).
    ///
    /// This is also the longest partial line held between polls.
    pub fn with_max_chunk_bytes(mut self, max_chunk_bytes: u64) -> Self {
        self.max_chunk_bytes = max_chunk_bytes.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cursor(&self) -> &LogCursor {
        &self.cursor
    }

    /// Read whatever was appended since the last poll.
    ///
    /// A missing file yields an empty batch; the next poll simply retries.
    pub fn poll(&mut self) -> io::Result<TailBatch> {
        let mut file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(self.on_missing()),
            Err(e) => return Err(e),
        };

        let meta = file.metadata()?;
        let size = meta.len();
        let identity = FileIdentity::of(&meta);

        let mut batch = TailBatch {
            file_present: true,
            ..Default::default()
        };

        let replaced = matches!(
            (self.cursor.identity, identity),
            (Some(previous), Some(current)) if previous != current
        );
        if size < self.cursor.offset || replaced {
            info!(
                path = %self.path.display(),
                previous_offset = self.cursor.offset,
                size,
                replaced,
                "Log rotation detected, restarting from offset 0"
            );
            self.cursor.reset();
            batch.rotated = true;
        }
        self.cursor.identity = identity;

        if size == self.cursor.offset {
            batch.caught_up = true;
            return Ok(batch);
        }

        let want = (size - self.cursor.offset).min(self.max_chunk_bytes);
        file.seek(SeekFrom::Start(self.cursor.offset))?;
        let mut chunk = Vec::with_capacity(want as usize);
        file.take(want).read_to_end(&mut chunk)?;

        self.cursor.offset += chunk.len() as u64;
        batch.caught_up = self.cursor.offset >= size;
        self.split_complete_lines(&chunk, &mut batch);

        debug!(
            bytes = chunk.len(),
            lines = batch.lines.len(),
            offset = self.cursor.offset,
            pending = self.cursor.pending.len(),
            "Tailed log chunk"
        );

        Ok(batch)
    }

    fn on_missing(&mut self) -> TailBatch {
        let rotated = self.cursor.has_consumed();
        if rotated {
            info!(path = %self.path.display(), "Log file disappeared, awaiting a new one");
            self.cursor.reset();
        }
        TailBatch {
            rotated,
            caught_up: true,
            ..Default::default()
        }
    }

    /// Append `chunk` to the held-back bytes and drain every complete line
    fn split_complete_lines(&mut self, mut chunk: &[u8], batch: &mut TailBatch) {
        if self.cursor.discarding {
            let Some(end) = chunk.iter().position(|&b| b == b'\n') else {
                return;
            };
            chunk = &chunk[end + 1..];
            self.cursor.discarding = false;
        }
        self.cursor.pending.extend_from_slice(chunk);

        if let Some(last_newline) = self.cursor.pending.iter().rposition(|&b| b == b'\n') {
            let rest = self.cursor.pending.split_off(last_newline + 1);
            let complete = std::mem::replace(&mut self.cursor.pending, rest);
            batch.lines = complete
                .split(|&b| b == b'\n')
                .map(|raw| raw.strip_suffix(b"\r").unwrap_or(raw))
                .map(|raw| String::from_utf8_lossy(raw).into_owned())
                .filter(|line| !line.trim().is_empty())
                .collect();
        }

        if self.cursor.pending.len() as u64 > self.max_chunk_bytes {
            warn!(
                path = %self.path.display(),
                bytes = self.cursor.pending.len(),
                limit = self.max_chunk_bytes,
                "Dropping oversized partial line"
            );
            self.cursor.pending.clear();
            self.cursor.discarding = true;
            batch.oversized += 1;
        }
    }
}
