//! Inline rate limit directives.
//!
//! A message may carry one directive of the form `[L:...]`:
//!
//! - `[L:100,15s:ignore.sync]` emit 1 of every 100 messages, flush the latest
//!   buffered one every 15 seconds, key `ignore.sync`
//! - `[L:15s:ignore.sync]` flush the latest buffered message every 15 seconds
//! - `[L:100,15s]` as above, keyed by the first two words of the message
//! - `[L:100,0s]` 1 of every 100 messages, no timed flush
//! - `[L:LimitConf1]` use the named configuration `LimitConf1`
//! - `[L:off]` drop the message
//! - `[L:async]` write the message through the async queue
//!
//! Malformed directives are ignored and the message is left untouched.

use crate::domain::duration::parse_duration;
use crate::domain::level::Level;
use crate::domain::tag::cut_tag;
use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;
use std::time::Duration;

fn directive_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[L:[\w\-.:,\s]+\]").expect("directive pattern is valid"))
}

fn spec_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:(\d+),)?((?:[\d.]+[a-zµ]{0,2})+)(?::([\w\-.]+))?$")
            .expect("limit spec pattern is valid")
    })
}

/// Rate limit settings for one suppression key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitConfig {
    /// Emit one of every `every_num` messages immediately; 0 disables
    pub every_num: u32,
    /// Flush the latest buffered message at this period; zero disables
    pub every_time: Duration,
    /// Suppression key
    pub key: String,
    /// Messages more severe than this level bypass suppression
    pub level: Level,
}

impl LimitConfig {
    pub fn new(key: impl Into<String>, every_num: u32, every_time: Duration) -> Self {
        Self {
            every_num,
            every_time,
            key: key.into(),
            level: Level::Info,
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Whether a message at `level` is subject to this configuration.
    pub fn applies_to(&self, level: Level) -> bool {
        level <= self.level
    }
}

/// What a directive asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimitDirective {
    /// Drop the message
    Off,
    /// Route the message through the async queue
    Async,
    /// Rate limit the message under a key
    Limit(LimitConfig),
}

/// A directive found in a message, plus the message with the directive removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDirective<'a> {
    pub directive: LimitDirective,
    pub message: Cow<'a, str>,
}

/// Find and parse an inline directive.
///
/// `named` resolves `[L:<name>]` against registered configurations.
/// Returns `None` when no well formed directive is present.
pub fn parse_directive<'a, F>(message: &'a str, named: F) -> Option<ParsedDirective<'a>>
where
    F: FnOnce(&str) -> Option<LimitConfig>,
{
    let found = directive_regex().find(message)?;
    let body = message[found.start() + 3..found.end() - 1].trim();
    let stripped = cut_tag(message, found.start(), found.end());

    if body.eq_ignore_ascii_case("off") {
        return Some(ParsedDirective {
            directive: LimitDirective::Off,
            message: stripped,
        });
    }
    if body.eq_ignore_ascii_case("async") {
        return Some(ParsedDirective {
            directive: LimitDirective::Async,
            message: stripped,
        });
    }
    if let Some(config) = named(body) {
        return Some(ParsedDirective {
            directive: LimitDirective::Limit(config),
            message: stripped,
        });
    }

    let caps = spec_regex().captures(body)?;
    let every_num = match caps.get(1) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    let every_time = parse_duration(caps.get(2)?.as_str()).ok()?;
    let key = match caps.get(3) {
        Some(m) => m.as_str().to_string(),
        None => default_key(&stripped),
    };

    Some(ParsedDirective {
        directive: LimitDirective::Limit(LimitConfig::new(key, every_num, every_time)),
        message: stripped,
    })
}

/// The first two whitespace separated words of a message.
fn default_key(message: &str) -> String {
    message.split_whitespace().take(2).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(msg: &str) -> Option<ParsedDirective<'_>> {
        parse_directive(msg, |_| None)
    }

    fn limit(parsed: ParsedDirective<'_>) -> LimitConfig {
        match parsed.directive {
            LimitDirective::Limit(config) => config,
            other => panic!("expected a limit directive, got {:?}", other),
        }
    }

    #[test]
    fn test_num_time_and_key() {
        let parsed =
            parse("[L:100,15s:ignore.sync] to limit 1 message every 15 seconds").unwrap();
        assert_eq!(parsed.message, "to limit 1 message every 15 seconds");
        assert_eq!(
            limit(parsed),
            LimitConfig::new("ignore.sync", 100, Duration::from_secs(15))
        );
    }

    #[test]
    fn test_time_and_key() {
        let parsed = parse("[L:15s:ignore.sync]      to limit by time").unwrap();
        assert_eq!(parsed.message, "to limit by time");
        assert_eq!(
            limit(parsed),
            LimitConfig::new("ignore.sync", 0, Duration::from_secs(15))
        );
    }

    #[test]
    fn test_default_key_is_first_two_words() {
        let parsed = parse("[L:100,15s]  to limit 1 message").unwrap();
        assert_eq!(
            limit(parsed),
            LimitConfig::new("to limit", 100, Duration::from_secs(15))
        );

        let parsed = parse("[L:100,0s] to limit every 100").unwrap();
        assert_eq!(limit(parsed), LimitConfig::new("to limit", 100, Duration::ZERO));
    }

    #[test]
    fn test_named_config() {
        let named = LimitConfig::new("LimitConf1", 0, Duration::from_secs(15));
        let expected = named.clone();
        let parsed = parse_directive("[L:LimitConf1] named config", move |name| {
            (name == "LimitConf1").then_some(named)
        })
        .unwrap();
        assert_eq!(parsed.message, "named config");
        assert_eq!(limit(parsed), expected);
    }

    #[test]
    fn test_off_and_async() {
        let parsed = parse("noisy [L:off] line").unwrap();
        assert_eq!(parsed.directive, LimitDirective::Off);
        assert_eq!(parsed.message, "noisy line");

        let parsed = parse("[L:ASYNC] queued").unwrap();
        assert_eq!(parsed.directive, LimitDirective::Async);
        assert_eq!(parsed.message, "queued");
    }

    #[test]
    fn test_malformed_is_not_found() {
        assert!(parse("[L:100] missing unit").is_none());
        assert!(parse("[L:unknown-name] nothing registered").is_none());
        assert!(parse("plain message").is_none());
        assert!(parse("[L:] empty").is_none());
    }

    #[test]
    fn test_level_gate() {
        let config = LimitConfig::new("k", 1, Duration::ZERO);
        assert!(config.applies_to(Level::Info));
        assert!(config.applies_to(Level::Debug));
        assert!(!config.applies_to(Level::Warn));
    }
}
