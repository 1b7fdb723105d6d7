//! Line terminator handling shared by the locator and the follow engine.
//!
//! The terminator set is ordered: CRLF is matched before the single-byte
//! forms so a two-byte terminator is never counted as two boundaries.

/// True for bytes that can end a line.
pub fn is_terminator(byte: u8) -> bool {
    byte == b'\n' || byte == b'\r'
}

/// Length of the terminator ending `data`, if any. CRLF wins over LF/CR.
pub fn terminator_suffix(data: &[u8]) -> Option<usize> {
    match data {
        [.., b'\r', b'\n'] => Some(2),
        [.., b'\n'] | [.., b'\r'] => Some(1),
        _ => None,
    }
}

/// Strip exactly one trailing terminator occurrence.
pub fn strip_terminator(data: &[u8]) -> &[u8] {
    match terminator_suffix(data) {
        Some(n) => &data[..data.len() - n],
        None => data,
    }
}

/// First terminator in `data` as `(index, length)`. A CR directly followed
/// by LF is one two-byte terminator, not two.
pub fn find_terminator(data: &[u8]) -> Option<(usize, usize)> {
    let idx = data.iter().position(|&b| is_terminator(b))?;
    if data[idx] == b'\r' && data.get(idx + 1) == Some(&b'\n') {
        Some((idx, 2))
    } else {
        Some((idx, 1))
    }
}

/// Split `data` on the terminator set.
///
/// Separator semantics: a trailing terminator produces a final empty
/// segment. Callers wanting complete lines strip one trailing terminator
/// first (see [`strip_terminator`]).
pub fn split_lines(data: &[u8]) -> Vec<Vec<u8>> {
    let mut lines = Vec::new();
    let mut rest = data;
    while let Some((idx, len)) = find_terminator(rest) {
        lines.push(rest[..idx].to_vec());
        rest = &rest[idx + len..];
    }
    lines.push(rest.to_vec());
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crlf_is_one_terminator() {
        assert_eq!(find_terminator(b"ab\r\ncd"), Some((2, 2)));
        assert_eq!(terminator_suffix(b"ab\r\n"), Some(2));
    }

    #[test]
    fn single_byte_terminators() {
        assert_eq!(find_terminator(b"a\nb"), Some((1, 1)));
        assert_eq!(find_terminator(b"a\rb"), Some((1, 1)));
        assert_eq!(find_terminator(b"ab"), None);
    }

    #[test]
    fn strip_takes_exactly_one() {
        assert_eq!(strip_terminator(b"a\r\n"), b"a");
        assert_eq!(strip_terminator(b"a\n\n"), b"a\n");
        assert_eq!(strip_terminator(b"a\r"), b"a");
        assert_eq!(strip_terminator(b"a"), b"a");
    }

    #[test]
    fn split_mixed_terminators() {
        let lines = split_lines(b"a\nb\rc");
        assert_eq!(lines, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn split_keeps_interior_empty_lines() {
        let lines = split_lines(b"a\n\nb");
        assert_eq!(lines, vec![b"a".to_vec(), b"".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn split_trailing_terminator_yields_empty_segment() {
        let lines = split_lines(b"a\n");
        assert_eq!(lines, vec![b"a".to_vec(), b"".to_vec()]);
    }
}
