//! Token based time layouts.
//!
//! Layouts are written with Java-style tokens and translated once into a
//! `chrono` strftime string:
//!
//! | Token  | Meaning                | strftime |
//! |--------|------------------------|----------|
//! | `yyyy` | four digit year        | `%Y`     |
//! | `yy`   | two digit year         | `%y`     |
//! | `MM`   | month, zero padded     | `%m`     |
//! | `dd`   | day, zero padded       | `%d`     |
//! | `HH`   | hour (00-23)           | `%H`     |
//! | `hh`   | hour (01-12)           | `%I`     |
//! | `mm`   | minute                 | `%M`     |
//! | `ss`   | second                 | `%S`     |
//! | `SSS`  | milliseconds           | `%3f`    |
//!
//! Everything else is copied literally; text inside single quotes is never
//! read as tokens, and `''` stands for a quote.

use chrono::{DateTime, TimeZone};
use std::fmt::{self, Write};

// Longer tokens first so `yyyy` wins over `yy`.
const TOKENS: [(&str, &str); 9] = [
    ("yyyy", "%Y"),
    ("SSS", "%3f"),
    ("yy", "%y"),
    ("MM", "%m"),
    ("dd", "%d"),
    ("HH", "%H"),
    ("hh", "%I"),
    ("mm", "%M"),
    ("ss", "%S"),
];

/// A compiled time layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeLayout {
    source: String,
    strftime: String,
}

impl TimeLayout {
    /// Translate a token layout such as `yyyy-MM-dd HH:mm:ss.SSS`.
    pub fn new(layout: &str) -> Self {
        let mut strftime = String::with_capacity(layout.len() + 8);
        for segment in segments(layout) {
            match segment {
                Segment::Token(token) => strftime.push_str(strftime_format(token)),
                Segment::Literal('%') => strftime.push_str("%%"),
                Segment::Literal('\n') => strftime.push_str("%n"),
                Segment::Literal('\t') => strftime.push_str("%t"),
                Segment::Literal(c) => strftime.push(c),
            }
        }

        Self {
            source: layout.to_string(),
            strftime,
        }
    }

    /// The layout as written.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The translated strftime string.
    pub fn strftime(&self) -> &str {
        &self.strftime
    }

    /// A regular expression (unanchored) matching any string this layout
    /// can produce. Tokens become digit runs, everything else is literal.
    pub fn regex_source(&self) -> String {
        let mut out = String::with_capacity(self.source.len() * 2);
        for segment in segments(&self.source) {
            match segment {
                Segment::Token("yyyy") => out.push_str(r"\d{4}"),
                Segment::Token("SSS") => out.push_str(r"\d{3}"),
                Segment::Token(_) => out.push_str(r"\d{2}"),
                Segment::Literal(c) => out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
            }
        }
        out
    }

    /// The literal text before the first token, with quoting removed.
    pub fn literal_prefix(&self) -> String {
        segments(&self.source)
            .map_while(|segment| match segment {
                Segment::Literal(c) => Some(c),
                Segment::Token(_) => None,
            })
            .collect()
    }

    /// Format `time` into `out`.
    pub fn write_to<Tz, W>(&self, time: &DateTime<Tz>, out: &mut W) -> fmt::Result
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
        W: Write,
    {
        write!(out, "{}", time.format(&self.strftime))
    }

    /// Format `time` into a new string.
    pub fn format<Tz>(&self, time: &DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let mut out = String::with_capacity(self.source.len() + 8);
        // Only valid specifiers are ever produced, so formatting cannot fail.
        let _ = self.write_to(time, &mut out);
        out
    }
}

fn strftime_format(token: &str) -> &'static str {
    TOKENS
        .iter()
        .find(|(t, _)| *t == token)
        .map_or("", |&(_, format)| format)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    Token(&'static str),
    Literal(char),
}

/// Split a layout into tokens and literal characters. Text between single
/// quotes is literal and `''` is a quote.
fn segments(layout: &str) -> impl Iterator<Item = Segment> + '_ {
    let mut rest = layout;
    let mut quoted = false;
    std::iter::from_fn(move || loop {
        if let Some(stripped) = rest.strip_prefix("''") {
            rest = stripped;
            return Some(Segment::Literal('\''));
        }
        if let Some(stripped) = rest.strip_prefix('\'') {
            rest = stripped;
            quoted = !quoted;
            continue;
        }
        if !quoted {
            for (token, _) in TOKENS {
                if let Some(stripped) = rest.strip_prefix(token) {
                    rest = stripped;
                    return Some(Segment::Token(token));
                }
            }
        }
        let mut chars = rest.chars();
        let c = chars.next()?;
        rest = chars.as_str();
        return Some(Segment::Literal(c));
    })
}
