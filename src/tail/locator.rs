//! Backward line locator: find the last N lines of a file without reading
//! the whole file.
//!
//! The scan walks backward from end-of-file in fixed-size chunks, counting
//! line boundaries right-to-left until enough have been found or the start
//! of the file is reached, then reads forward once from the final boundary.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

use super::line;

/// Result of a backward scan: the located lines plus the end position the
/// scan was taken at, so a follower can resume exactly where the snapshot
/// stopped.
#[derive(Debug)]
pub struct TailSnapshot {
    /// The last lines of the file, oldest first, terminators stripped.
    pub lines: Vec<Vec<u8>>,
    /// File size at scan time.
    pub end_pos: u64,
}

/// Return the last `count` lines of `file`, oldest first.
///
/// Reads backward in `chunk_size` steps, so at most one pass over the bytes
/// that actually belong to the requested lines. A file with fewer than
/// `count` lines yields all of them; an empty file yields none. The final
/// fragment of a file that does not end in a terminator counts as a line.
pub fn tail_lines(file: &mut File, count: usize, chunk_size: usize) -> io::Result<TailSnapshot> {
    let end_pos = file.seek(SeekFrom::End(0))?;
    let mut cursor = end_pos;

    for _ in 0..count {
        match seek_boundary(file, cursor, chunk_size)? {
            Some(boundary) => cursor = boundary,
            None => {
                // Start of file reached: fewer than `count` lines exist.
                cursor = 0;
                break;
            }
        }
    }

    if cursor >= end_pos {
        return Ok(TailSnapshot {
            lines: Vec::new(),
            end_pos,
        });
    }

    file.seek(SeekFrom::Start(cursor))?;
    let data = read_up_to(file, (end_pos - cursor) as usize)?;

    // Strip the terminator of the newest line before splitting; splitting
    // raw data would turn it into a phantom empty final line (and a CRLF
    // would be cut in half).
    let body = line::strip_terminator(&data);
    Ok(TailSnapshot {
        lines: line::split_lines(body),
        end_pos,
    })
}

/// Scan backward from `from_pos` for the nearest terminator and return the
/// offset just past it, the start of the line that `from_pos` is inside of
/// (or just after). `None` once the start of file is reached without one.
fn seek_boundary(file: &mut File, from_pos: u64, chunk_size: usize) -> io::Result<Option<u64>> {
    if from_pos == 0 {
        return Ok(None);
    }

    let step = (chunk_size as u64).min(from_pos);
    let mut pos = from_pos - step;

    file.seek(SeekFrom::Start(pos))?;
    let mut buf = read_up_to(file, step as usize)?;
    let mut len = buf.len();

    // The byte just before `from_pos` terminates the line the caller is
    // standing after; it must not count as another boundary. Discount a
    // second byte when the pair is CRLF.
    if len > 0 && line::is_terminator(buf[len - 1]) {
        len -= 1;
        if len > 0 && buf[len] == b'\n' && buf[len - 1] == b'\r' {
            len -= 1;
        }
    }

    loop {
        for i in (0..len).rev() {
            if line::is_terminator(buf[i]) {
                return Ok(Some(pos + i as u64 + 1));
            }
        }

        if pos == 0 {
            return Ok(None);
        }

        let step = (chunk_size as u64).min(pos);
        pos -= step;
        file.seek(SeekFrom::Start(pos))?;
        buf = read_up_to(file, step as usize)?;
        len = buf.len();
    }
}

/// Read up to `limit` bytes from the current position, short only at EOF.
pub(crate) fn read_up_to(file: &mut File, limit: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; limit];
    let mut filled = 0;
    while filled < limit {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(buf)
}
