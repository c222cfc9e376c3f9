//! Extraction of severity tags embedded in raw messages.
//!
//! Built-in tags are two characters, a level letter followed by `!`, and
//! must start on a word boundary:
//!
//! | Tag  | Level |
//! |------|-------|
//! | `T!` | trace |
//! | `D!` | debug |
//! | `I!` | info  |
//! | `W!` | warn  |
//! | `E!` | error |
//! | `F!` | fatal |
//! | `P!` | panic |
//!
//! Custom tags (e.g. `[DEBUG]`) can be registered and are checked first, in
//! registration order.

use crate::domain::level::Level;
use crate::domain::tag::cut_tag;
use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

fn builtin_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[TDIWEFP]!").expect("level tag pattern is valid"))
}

/// Result of [`LevelTagParser::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLevel<'a> {
    pub level: Level,
    /// Message with the tag removed, or the input when no tag was found
    pub message: Cow<'a, str>,
    pub found: bool,
}

/// Parser for inline level tags.
#[derive(Debug, Clone, Default)]
pub struct LevelTagParser {
    custom: Vec<(String, Level)>,
}

impl LevelTagParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom tag. Empty tags are ignored.
    pub fn register(&mut self, tag: impl Into<String>, level: Level) {
        let tag = tag.into();
        if tag.is_empty() {
            return;
        }
        match self.custom.iter_mut().find(|(existing, _)| *existing == tag) {
            Some(slot) => slot.1 = level,
            None => self.custom.push((tag, level)),
        }
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_tag(mut self, tag: impl Into<String>, level: Level) -> Self {
        self.register(tag, level);
        self
    }

    /// Number of custom tags.
    pub fn custom_len(&self) -> usize {
        self.custom.len()
    }

    /// Find a level tag in `raw`.
    ///
    /// Falls back to `default` with `found == false` when no tag is present.
    pub fn parse<'a>(&self, raw: &'a str, default: Level) -> ParsedLevel<'a> {
        for (tag, level) in &self.custom {
            if let Some(start) = raw.find(tag.as_str()) {
                return ParsedLevel {
                    level: *level,
                    message: cut_tag(raw, start, start + tag.len()),
                    found: true,
                };
            }
        }

        if let Some(m) = builtin_regex().find(raw) {
            if let Some(level) = Level::from_tag_letter(raw.as_bytes()[m.start()]) {
                return ParsedLevel {
                    level,
                    message: cut_tag(raw, m.start(), m.end()),
                    found: true,
                };
            }
        }

        ParsedLevel {
            level: default,
            message: Cow::Borrowed(raw),
            found: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tag() {
        let parser = LevelTagParser::new();
        let parsed = parser.parse("W! disk low", Level::Info);
        assert_eq!(parsed.level, Level::Warn);
        assert_eq!(parsed.message, "disk low");
        assert!(parsed.found);
    }

    #[test]
    fn test_no_tag_returns_default() {
        let parser = LevelTagParser::new();
        let parsed = parser.parse("no tag here", Level::Debug);
        assert_eq!(parsed.level, Level::Debug);
        assert_eq!(parsed.message, "no tag here");
        assert!(!parsed.found);
    }

    #[test]
    fn test_tag_in_the_middle() {
        let parser = LevelTagParser::new();
        let parsed = parser.parse("sync failed E! retrying", Level::Info);
        assert_eq!(parsed.level, Level::Error);
        assert_eq!(parsed.message, "sync failed retrying");
    }

    #[test]
    fn test_word_boundary_required() {
        let parser = LevelTagParser::new();
        let parsed = parser.parse("HEW! not a tag", Level::Info);
        assert!(!parsed.found);
        assert_eq!(parsed.message, "HEW! not a tag");
    }

    #[test]
    fn test_custom_tags_win_in_registration_order() {
        let parser = LevelTagParser::new()
            .with_tag("[DEBUG]", Level::Debug)
            .with_tag("[ERR]", Level::Error);

        let parsed = parser.parse("[ERR] and [DEBUG] and W!", Level::Info);
        assert_eq!(parsed.level, Level::Debug);
        assert_eq!(parsed.message, "[ERR] and and W!");
    }

    #[test]
    fn test_reregistering_a_tag_updates_its_level() {
        let mut parser = LevelTagParser::new();
        parser.register("[X]", Level::Debug);
        parser.register("[X]", Level::Fatal);
        parser.register("", Level::Fatal);
        assert_eq!(parser.custom_len(), 1);
        assert_eq!(parser.parse("[X] boom", Level::Info).level, Level::Fatal);
    }
}
