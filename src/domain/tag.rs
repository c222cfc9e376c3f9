//! Helpers for removing inline tags from raw messages.

use std::borrow::Cow;

/// Remove `message[start..end]` and join the remaining halves with a single
/// space, so `"disk W! low"` becomes `"disk low"` rather than `"disk  low"`.
pub(crate) fn cut_tag(message: &str, start: usize, end: usize) -> Cow<'_, str> {
    let before = message[..start].trim_end();
    let after = message[end..].trim_start();

    match (before.is_empty(), after.is_empty()) {
        (true, _) => Cow::Borrowed(after),
        (false, true) => Cow::Borrowed(before),
        (false, false) => {
            let mut joined = String::with_capacity(before.len() + after.len() + 1);
            joined.push_str(before);
            joined.push(' ');
            joined.push_str(after);
            Cow::Owned(joined)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cut_leading_tag() {
        assert_eq!(cut_tag("W! disk low", 0, 2), "disk low");
    }

    #[test]
    fn test_cut_middle_tag() {
        let msg = "disk  W!   low";
        assert_eq!(cut_tag(msg, 6, 8), "disk low");
    }

    #[test]
    fn test_cut_trailing_tag() {
        assert_eq!(cut_tag("disk low E!", 9, 11), "disk low");
    }

    #[test]
    fn test_cut_whole_message() {
        assert_eq!(cut_tag("E!", 0, 2), "");
    }
}
