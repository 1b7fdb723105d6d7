//! Incremental follow engine for a single file.
//!
//! A small state machine over an open read handle: each wake reads whatever
//! complete lines were appended since the last one, detects truncation, and
//! leaves the offset parked at the start of any unfinished line. Timer and
//! native-notification wakes drive the same loop; a redundant wake simply
//! finds the engine already caught up.

use std::fs::File;
use std::io::{self, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::error::TailError;
use super::line;
use super::locator::{self, TailSnapshot, read_up_to};

/// Why the engine was woken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// The recurring poll timer fired.
    Timer,
    /// The platform watcher reported a modification.
    NativeEvent,
}

/// Follows one file, emitting appended lines wake by wake.
///
/// `trailing` is true when the engine sits exactly at end-of-file right
/// after consuming a terminator (or after a replay snapshot). In that state
/// a read consisting solely of a terminator is the closing of content that
/// was already delivered and is swallowed instead of emitted.
pub struct FollowEngine {
    path: PathBuf,
    file: File,
    offset: u64,
    trailing: bool,
    chunk_size: usize,
}

impl FollowEngine {
    /// Open `path` for following, positioned at the start of the file.
    pub fn open(path: &Path, chunk_size: usize) -> Result<Self, TailError> {
        let file = File::open(path).map_err(|e| TailError::Open {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            offset: 0,
            trailing: true,
            chunk_size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current read offset, for inspection.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Take a last-N-lines snapshot and resynchronize the follow position
    /// to the end of file as of the scan, in trailing state.
    ///
    /// Used for the per-subscriber replay on attach; live emission resumes
    /// exactly past the snapshot, so replayed content is never re-emitted.
    pub fn replay(&mut self, count: usize) -> Result<Vec<Vec<u8>>, TailError> {
        let TailSnapshot { lines, end_pos } =
            locator::tail_lines(&mut self.file, count, self.chunk_size)
                .map_err(|e| self.read_error(e))?;
        self.offset = end_pos;
        self.trailing = true;
        Ok(lines)
    }

    /// Run the read loop once; returns the lines to broadcast, in file
    /// order, terminators stripped.
    pub fn on_wake(&mut self, reason: WakeReason) -> Result<Vec<Vec<u8>>, TailError> {
        let mut out = Vec::new();

        loop {
            let start = self.offset;
            let raw = self.next_line().map_err(|e| self.read_error(e))?;

            match raw {
                Some(raw) => {
                    let stripped = line::strip_terminator(&raw);
                    if self.trailing && stripped.is_empty() {
                        // The terminator of a line whose content was already
                        // delivered (replay of an unterminated fragment, or a
                        // terminator landing in a later write). Swallow it.
                        tracing::trace!(
                            path = %self.path.display(),
                            "trailing terminator swallowed"
                        );
                        return Ok(out);
                    }
                    out.push(stripped.to_vec());
                    self.trailing = false;
                }
                None => {
                    // End of data without a terminator; any partial bytes
                    // stay unconsumed until their line completes.
                    let size = self
                        .file
                        .metadata()
                        .map_err(|e| self.read_error(e))?
                        .len();
                    if size < start {
                        tracing::info!(
                            path = %self.path.display(),
                            old_offset = start,
                            new_size = size,
                            "file truncated, clamping offset"
                        );
                        self.offset = size;
                        out.push(format!("{}: file truncated", self.path.display()).into_bytes());
                    }
                    self.trailing = true;
                    if !out.is_empty() {
                        tracing::debug!(
                            path = %self.path.display(),
                            lines = out.len(),
                            ?reason,
                            "emitting"
                        );
                    }
                    return Ok(out);
                }
            }
        }
    }

    /// Read one line starting at the current offset.
    ///
    /// Returns the raw bytes including the terminator when one is found and
    /// advances the offset past it. Returns `None` at end of data without a
    /// terminator, leaving the offset untouched. A CR as the last available
    /// byte is only a complete terminator at EOF; mid-stream it may be the
    /// first half of a CRLF still being written, so reading continues.
    fn next_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        self.file.seek(SeekFrom::Start(self.offset))?;
        let mut acc: Vec<u8> = Vec::new();

        loop {
            let chunk = read_up_to(&mut self.file, self.chunk_size)?;
            let at_eof = chunk.len() < self.chunk_size;
            let base = acc.len();
            acc.extend_from_slice(&chunk);

            // Rescan including the last byte of the previous chunk so a
            // CRLF split across chunk reads is still one terminator.
            let scan_from = base.saturating_sub(1);
            if let Some((i, tlen)) = line::find_terminator(&acc[scan_from..]) {
                let term_end = scan_from + i + tlen;
                let cr_pending = tlen == 1 && acc[scan_from + i] == b'\r' && term_end == acc.len();
                if !cr_pending || at_eof {
                    acc.truncate(term_end);
                    self.offset += acc.len() as u64;
                    return Ok(Some(acc));
                }
            }

            if at_eof {
                return Ok(None);
            }
        }
    }

    fn read_error(&self, source: io::Error) -> TailError {
        TailError::Read {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::io::Write;
    use tempfile::TempDir;

    fn setup(contents: &[u8]) -> (TempDir, PathBuf, FollowEngine) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, contents).unwrap();
        let engine = FollowEngine::open(&path, 1024).unwrap();
        (dir, path, engine)
    }

    fn append(path: &Path, bytes: &[u8]) {
        let mut f = OpenOptions::new().append(true).open(path).unwrap();
        f.write_all(bytes).unwrap();
        f.flush().unwrap();
    }

    fn wake(engine: &mut FollowEngine) -> Vec<String> {
        engine
            .on_wake(WakeReason::Timer)
            .unwrap()
            .into_iter()
            .map(|l| String::from_utf8(l).unwrap())
            .collect()
    }

    #[test]
    fn emits_appended_lines_in_order() {
        let (_dir, path, mut engine) = setup(b"old\n");
        engine.replay(10).unwrap();

        append(&path, b"a\nb\nc\n");
        assert_eq!(wake(&mut engine), vec!["a", "b", "c"]);
        assert!(wake(&mut engine).is_empty());
    }

    #[test]
    fn crlf_lines_are_stripped_once() {
        let (_dir, path, mut engine) = setup(b"");
        engine.replay(10).unwrap();

        append(&path, b"x\r\ny\r\n");
        assert_eq!(wake(&mut engine), vec!["x", "y"]);
    }

    #[test]
    fn partial_line_is_held_back_until_complete() {
        let (_dir, path, mut engine) = setup(b"");
        engine.replay(10).unwrap();

        append(&path, b"par");
        assert!(wake(&mut engine).is_empty());

        append(&path, b"tial\n");
        assert_eq!(wake(&mut engine), vec!["partial"]);
    }

    #[test]
    fn late_terminator_after_replay_is_suppressed() {
        // Replay delivered the unterminated fragment "ab"; the terminator
        // arriving later must not produce a duplicate or an empty line.
        let (_dir, path, mut engine) = setup(b"ab");
        assert_eq!(engine.replay(10).unwrap(), vec![b"ab".to_vec()]);

        append(&path, b"\n");
        assert!(wake(&mut engine).is_empty());

        append(&path, b"cd\n");
        assert_eq!(wake(&mut engine), vec!["cd"]);
    }

    #[test]
    fn empty_line_after_content_is_emitted() {
        let (_dir, path, mut engine) = setup(b"");
        engine.replay(10).unwrap();

        append(&path, b"a\n\n");
        assert_eq!(wake(&mut engine), vec!["a", ""]);
    }

    #[test]
    fn crlf_split_across_wakes_is_suppressed() {
        let (_dir, path, mut engine) = setup(b"");
        engine.replay(10).unwrap();

        append(&path, b"row\r");
        // CR at EOF closes the line.
        assert_eq!(wake(&mut engine), vec!["row"]);

        // The LF half of the writer's CRLF lands in the next write.
        append(&path, b"\n");
        assert!(wake(&mut engine).is_empty());

        append(&path, b"next\n");
        assert_eq!(wake(&mut engine), vec!["next"]);
    }

    #[test]
    fn truncation_emits_notice_and_clamps() {
        let (_dir, path, mut engine) = setup(b"one\ntwo\n");
        engine.replay(10).unwrap();

        OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(0)
            .unwrap();

        let lines = wake(&mut engine);
        assert_eq!(lines, vec![format!("{}: file truncated", path.display())]);
        assert_eq!(engine.offset(), 0);

        append(&path, b"fresh\n");
        assert_eq!(wake(&mut engine), vec!["fresh"]);
    }

    #[test]
    fn truncation_notice_is_emitted_once() {
        let (_dir, path, mut engine) = setup(b"one\ntwo\n");
        engine.replay(10).unwrap();

        OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(0)
            .unwrap();

        assert_eq!(wake(&mut engine).len(), 1);
        assert!(wake(&mut engine).is_empty());
    }

    #[test]
    fn replay_resynchronizes_after_growth() {
        let (_dir, path, mut engine) = setup(b"a\nb\n");
        engine.replay(10).unwrap();
        append(&path, b"c\n");

        // A fresh replay (as for a second subscriber) sees the grown file
        // and live follow resumes past it without re-emitting.
        let lines = engine.replay(10).unwrap();
        assert_eq!(lines.len(), 3);
        assert!(wake(&mut engine).is_empty());

        append(&path, b"d\n");
        assert_eq!(wake(&mut engine), vec!["d"]);
    }

    #[test]
    fn lines_longer_than_chunk_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, b"").unwrap();
        let mut engine = FollowEngine::open(&path, 8).unwrap();
        engine.replay(10).unwrap();

        let long = "y".repeat(100);
        append(&path, format!("{long}\nshort\n").as_bytes());
        assert_eq!(wake(&mut engine), vec![long, "short".to_string()]);
    }
}
