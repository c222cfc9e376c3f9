//! Pattern layouts for rendering log records.
//!
//! A layout is a template mixing literal text with `%` directives:
//!
//! ```text
//! %t{yyyy-MM-dd HH:mm:ss.SSS} [%5l] %pid --- [%gid] [%trace] %caller : %fields %msg%n
//! ```
//!
//! Each directive is `%`, an optional `-` (left justify), an optional width
//! (`5`, `5.10`, `.3`), an indicator word and an optional `{k=v,...}` option
//! block. `%%` is a literal percent sign.
//!
//! | Indicator                | Renders                                      |
//! |--------------------------|----------------------------------------------|
//! | `t`, `time`              | record time, options hold a token layout     |
//! | `l`, `level`             | upper case level, optionally colored         |
//! | `pid`                    | process id                                   |
//! | `gid`                    | calling thread id                            |
//! | `trace`                  | trace id, `-` when empty                     |
//! | `caller`                 | `function file:line` frames                  |
//! | `context`                | named ambient value, `name` option required  |
//! | `fields`                 | fields as a JSON object                      |
//! | `m`, `msg`, `message`    | message text                                 |
//! | `n`                      | newline                                      |
//!
//! Layouts are compiled once; errors are reported by [`Layout::compile`],
//! never while rendering.

use crate::application::ports::{CallerResolver, Clock, ContextStore, ThreadIdSource};
use crate::domain::entry::{CallerFrame, Entry};
use crate::domain::level::Level;
use crate::domain::time_layout::TimeLayout;
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::context::ThreadLocalContext;
use crate::infrastructure::thread_id::ThreadLocalIds;
use std::fmt::{self, Write};
use std::sync::Arc;

/// Default time layout of the `%t` directive.
pub const DEFAULT_TIME_LAYOUT: &str = "yyyy-MM-dd HH:mm:ss.SSS";

/// Layout used when none is configured.
pub const DEFAULT_LAYOUT: &str =
    "%t{yyyy-MM-dd HH:mm:ss.SSS} [%5l] %pid --- [%gid] [%trace] %caller : %fields %msg%n";

/// Marker after which a message is written verbatim.
pub const PRE_MARKER: &str = "[PRE]";

const COLOR_RESET: &str = "\x1b[0m";

/// Error returned when a layout pattern cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// The directive indicator is not recognised (empty for a dangling `%`)
    UnknownIndicator(String),
    /// An option block starting at `position` has no closing `}`
    UnclosedBrace { position: usize },
    /// `%context` without a `name` option
    MissingContextName,
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutError::UnknownIndicator(indicator) => {
                write!(f, "unknown layout indicator {:?}", indicator)
            }
            LayoutError::UnclosedBrace { position } => {
                write!(f, "unclosed brace at byte {} of layout", position)
            }
            LayoutError::MissingContextName => write!(f, "name required for %context"),
        }
    }
}

impl std::error::Error for LayoutError {}

/// Collaborators a layout consults while rendering.
#[derive(Debug, Clone)]
pub struct LayoutOptions {
    /// Color level names by default
    pub print_color: bool,
    /// Time source for records without a timestamp
    pub clock: Arc<dyn Clock>,
    /// Frame lookup for `%caller` frames the record did not capture. It runs
    /// on the rendering thread, so it only suits layouts rendered where the
    /// record was logged; a pipeline captures frames up front instead.
    pub caller_resolver: Option<Arc<dyn CallerResolver>>,
    /// Source of `%gid`
    pub thread_ids: Arc<dyn ThreadIdSource>,
    /// Source of `%context`
    pub context: Arc<dyn ContextStore>,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            print_color: false,
            clock: Arc::new(SystemClock::new()),
            caller_resolver: None,
            thread_ids: Arc::new(ThreadLocalIds::new()),
            context: Arc::new(ThreadLocalContext::new()),
        }
    }
}

/// Width and justification of a directive, `%-5.10l` style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Width {
    /// Pad to at least this many characters
    pub min: usize,
    /// Truncate to at most this many characters
    pub max: Option<usize>,
    /// Pad on the right instead of the left
    pub left: bool,
}

impl Width {
    fn parse(left: bool, digits: &str, default: &str) -> Self {
        let digits = if digits.is_empty() { default } else { digits };
        let (min, max) = match digits.split_once('.') {
            Some((min, max)) => (min, max.split('.').next().and_then(|m| m.parse().ok())),
            None => (digits, None),
        };
        Self {
            min: min.parse().unwrap_or(0),
            max,
            left,
        }
    }

    fn write(&self, out: &mut String, value: &str) {
        let value = match self.max {
            Some(max) => match value.char_indices().nth(max) {
                Some((cut, _)) => &value[..cut],
                None => value,
            },
            None => value,
        };
        let pad = self.min.saturating_sub(value.chars().count());
        if !self.left {
            out.extend(std::iter::repeat(' ').take(pad));
        }
        out.push_str(value);
        if self.left {
            out.extend(std::iter::repeat(' ').take(pad));
        }
    }
}

/// One compiled directive or literal run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Literal(String),
    Time(TimeLayout),
    Level {
        width: Width,
        print_color: bool,
        lowercase: bool,
        /// Truncate the name to this many characters; 0 keeps it whole
        length: usize,
    },
    Pid(Width),
    Gid(Width),
    Trace(Width),
    Caller {
        width: Width,
        /// Separator between file and line
        sep: String,
        /// Records less severe than this print no caller
        level: Level,
        /// Number of frames to print
        skip: usize,
    },
    Context {
        width: Width,
        name: String,
    },
    Fields,
    Message {
        single_line: bool,
    },
    Newline,
}

/// A compiled layout.
///
/// # Examples
///
/// ```
/// use chrono::{Local, TimeZone};
/// use tracing_logroll::{Entry, Layout, LayoutOptions, Level};
///
/// let layout = Layout::compile("%t{yyyy-MM-dd} [%5l] %msg%n", &LayoutOptions::default()).unwrap();
/// let time = Local.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
/// let entry = Entry::new(Level::Info, "hello").with_time(time);
///
/// assert_eq!(layout.render_string(&entry), "2024-01-02 [ INFO] hello\n");
/// ```
#[derive(Debug, Clone)]
pub struct Layout {
    pattern: String,
    parts: Vec<Part>,
    clock: Arc<dyn Clock>,
    caller_resolver: Option<Arc<dyn CallerResolver>>,
    thread_ids: Arc<dyn ThreadIdSource>,
    context: Arc<dyn ContextStore>,
}

impl Layout {
    /// Compile a pattern.
    ///
    /// # Errors
    ///
    /// Unknown indicators, an option block without `}` and `%context`
    /// without a name are rejected.
    pub fn compile(pattern: &str, options: &LayoutOptions) -> Result<Self, LayoutError> {
        let parts = parse_pattern(pattern, options.print_color)?;
        Ok(Self {
            pattern: pattern.to_string(),
            parts,
            clock: Arc::clone(&options.clock),
            caller_resolver: options.caller_resolver.clone(),
            thread_ids: Arc::clone(&options.thread_ids),
            context: Arc::clone(&options.context),
        })
    }

    /// The pattern this layout was compiled from.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Whether any part emits ANSI colors.
    pub fn is_colored(&self) -> bool {
        self.parts
            .iter()
            .any(|p| matches!(p, Part::Level { print_color: true, .. }))
    }

    /// The least severe level at which `%caller` prints and the most frames
    /// it prints, or `None` without a `%caller` part.
    pub fn caller_demand(&self) -> Option<(Level, usize)> {
        self.parts.iter().fold(None, |demand, part| match part {
            Part::Caller { level, skip, .. } => Some(match demand {
                Some((min, max)) => (min.min(*level), max.max(*skip)),
                None => (*level, *skip),
            }),
            _ => demand,
        })
    }

    /// The same layout with all coloring removed, for file sinks.
    pub fn without_color(&self) -> Self {
        let parts = self
            .parts
            .iter()
            .map(|part| match part {
                Part::Level {
                    width,
                    lowercase,
                    length,
                    ..
                } => Part::Level {
                    width: *width,
                    print_color: false,
                    lowercase: *lowercase,
                    length: *length,
                },
                other => other.clone(),
            })
            .collect();

        Self {
            parts,
            ..self.clone()
        }
    }

    /// Render a record to bytes.
    pub fn render(&self, entry: &Entry) -> Vec<u8> {
        self.render_string(entry).into_bytes()
    }

    /// Render a record to a string.
    pub fn render_string(&self, entry: &Entry) -> String {
        let mut out = String::with_capacity(128 + entry.message.len());
        self.render_into(entry, &mut out);
        out
    }

    /// Append a rendered record to `out`.
    pub fn render_into(&self, entry: &Entry, out: &mut String) {
        for part in &self.parts {
            self.render_part(part, entry, out);
        }
    }

    fn render_part(&self, part: &Part, entry: &Entry, out: &mut String) {
        match part {
            Part::Literal(text) => out.push_str(text),
            Part::Time(layout) => {
                let time = entry.time.unwrap_or_else(|| self.clock.now());
                // Only valid specifiers are ever produced.
                let _ = layout.write_to(&time, out);
            }
            Part::Level {
                width,
                print_color,
                lowercase,
                length,
            } => render_level(entry.level, *width, *print_color, *lowercase, *length, out),
            Part::Pid(width) => width.write(out, &std::process::id().to_string()),
            Part::Gid(width) => {
                let id = entry.thread_id.unwrap_or_else(|| self.thread_ids.current());
                width.write(out, &id.to_string());
            }
            Part::Trace(width) => {
                let trace = if entry.trace_id.is_empty() {
                    "-"
                } else {
                    entry.trace_id.as_str()
                };
                width.write(out, trace);
            }
            Part::Caller {
                width,
                sep,
                level,
                skip,
            } => {
                if entry.level < *level {
                    return;
                }
                let frames = entry.caller_skip.unwrap_or(*skip);
                let rendered = self.render_frames(&entry.callers, frames, sep);
                if !rendered.is_empty() {
                    width.write(out, &rendered);
                }
            }
            Part::Context { width, name } => {
                let value = self.context.get(name).unwrap_or_default();
                width.write(out, &value);
            }
            Part::Fields => {
                if !entry.fields.is_empty() {
                    if let Ok(json) = serde_json::to_string(&entry.fields) {
                        out.push_str(&json);
                    }
                }
            }
            Part::Message { single_line } => render_message(&entry.message, *single_line, out),
            Part::Newline => out.push('\n'),
        }
    }

    fn render_frames(&self, captured: &[CallerFrame], count: usize, sep: &str) -> String {
        let mut rendered = String::new();
        for i in 0..count {
            let frame = match captured.get(i) {
                Some(frame) => Some(frame.clone()),
                None => self
                    .caller_resolver
                    .as_ref()
                    .and_then(|resolver| resolver.resolve(i)),
            };
            let Some(frame) = frame else {
                continue;
            };
            if !rendered.is_empty() {
                rendered.push(' ');
            }
            if let Some(function) = &frame.function {
                let _ = write!(rendered, "{} ", function);
            }
            let _ = write!(rendered, "{}{}{}", frame.file_name(), sep, frame.line);
        }
        rendered
    }
}

fn render_level(
    level: Level,
    width: Width,
    print_color: bool,
    lowercase: bool,
    length: usize,
    out: &mut String,
) {
    let mut name = if lowercase {
        level.as_str().to_string()
    } else {
        level.as_str().to_ascii_uppercase()
    };
    if length > 0 && name.len() > length {
        name.truncate(length);
    }

    if print_color {
        let _ = write!(out, "\x1b[{}m", level.color_code());
    }
    width.write(out, &name);
    if print_color {
        out.push_str(COLOR_RESET);
    }
}

fn render_message(message: &str, single_line: bool, out: &mut String) {
    let (text, verbatim) = match message.find(PRE_MARKER) {
        Some(pos) => (&message[..pos], Some(&message[pos + PRE_MARKER.len()..])),
        None => (message, None),
    };

    let text = if verbatim.is_none() {
        text.trim_end_matches(['\r', '\n'])
    } else {
        text
    };

    if single_line {
        for c in text.chars() {
            match c {
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                c => out.push(c),
            }
        }
    } else {
        out.push_str(text);
    }

    if let Some(verbatim) = verbatim {
        out.push_str(verbatim.trim_end_matches(['\r', '\n']));
    }
}

fn parse_pattern(pattern: &str, print_color: bool) -> Result<Vec<Part>, LayoutError> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut rest = pattern;

    while let Some(pos) = rest.find('%') {
        literal.push_str(&rest[..pos]);
        rest = &rest[pos + 1..];

        if let Some(stripped) = rest.strip_prefix('%') {
            literal.push('%');
            rest = stripped;
            continue;
        }

        if !literal.is_empty() {
            parts.push(Part::Literal(std::mem::take(&mut literal)));
        }

        let left = rest.starts_with('-');
        if left {
            rest = &rest[1..];
        }

        let digits_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (digits, after) = rest.split_at(digits_len);

        let indicator_len = after
            .find(|c: char| !c.is_alphabetic())
            .unwrap_or(after.len());
        let (indicator, after) = after.split_at(indicator_len);

        let (options, after) = match after.strip_prefix('{') {
            Some(body) => match body.find('}') {
                Some(close) => (&body[..close], &body[close + 1..]),
                None => {
                    return Err(LayoutError::UnclosedBrace {
                        position: pattern.len() - after.len(),
                    })
                }
            },
            None => ("", after),
        };
        rest = after;

        parts.push(create_part(indicator, left, digits, options, print_color)?);
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        parts.push(Part::Literal(literal));
    }

    Ok(parts)
}

fn create_part(
    indicator: &str,
    left: bool,
    digits: &str,
    options: &str,
    print_color: bool,
) -> Result<Part, LayoutError> {
    let width = Width::parse(left, digits, "");
    let part = match indicator {
        "t" | "time" => {
            let layout = match options.trim() {
                "" => DEFAULT_TIME_LAYOUT,
                layout => layout,
            };
            Part::Time(TimeLayout::new(layout))
        }
        "l" | "level" => {
            let mut print_color = print_color;
            let mut lowercase = false;
            let mut length = 0;
            for (key, value) in parse_options(options) {
                match key.as_str() {
                    "printcolor" => print_color = parse_flag(value),
                    "lowercase" => lowercase = parse_flag(value),
                    "length" => length = value.parse().unwrap_or(0),
                    _ => {}
                }
            }
            Part::Level {
                width: Width::parse(left, digits, "5"),
                print_color,
                lowercase,
                length,
            }
        }
        "pid" => Part::Pid(width),
        "gid" => Part::Gid(width),
        "trace" => Part::Trace(width),
        "caller" => {
            let mut sep = ":".to_string();
            let mut level = Level::Warn;
            let mut skip = 1;
            for (key, value) in parse_options(options) {
                match key.as_str() {
                    "sep" if !value.is_empty() => sep = value.to_string(),
                    "level" => level = value.parse().unwrap_or(Level::Warn),
                    "skip" => skip = value.parse().unwrap_or(1),
                    _ => {}
                }
            }
            Part::Caller {
                width,
                sep,
                level,
                skip,
            }
        }
        "context" => {
            let name = parse_options(options)
                .find(|(key, _)| key == "name")
                .map(|(_, value)| value.to_string())
                .filter(|name| !name.is_empty())
                .ok_or(LayoutError::MissingContextName)?;
            Part::Context { width, name }
        }
        "fields" => Part::Fields,
        "m" | "msg" | "message" => {
            let single_line = parse_options(options)
                .find(|(key, _)| key == "singleline")
                .map_or(true, |(_, value)| parse_flag(value));
            Part::Message { single_line }
        }
        "n" => Part::Newline,
        other => return Err(LayoutError::UnknownIndicator(other.to_string())),
    };
    Ok(part)
}

/// Split an option block into lowercase keys and raw values.
fn parse_options(options: &str) -> impl Iterator<Item = (String, &str)> {
    options
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|item| !item.is_empty())
        .map(|item| match item.split_once('=') {
            Some((key, value)) => (key.to_ascii_lowercase(), value),
            None => (item.to_ascii_lowercase(), ""),
        })
}

/// A bare flag is true.
fn parse_flag(value: &str) -> bool {
    match value.to_ascii_lowercase().as_str() {
        "" | "true" | "t" | "yes" | "y" | "on" | "1" => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mocks::clock::MockClock;
    use chrono::{Local, TimeZone};

    #[derive(Debug)]
    struct FixedIds(u64);

    impl ThreadIdSource for FixedIds {
        fn current(&self) -> u64 {
            self.0
        }
    }

    #[derive(Debug)]
    struct OneValue;

    impl ContextStore for OneValue {
        fn get(&self, name: &str) -> Option<String> {
            (name == "user").then(|| "alice".to_string())
        }
    }

    #[derive(Debug)]
    struct Frames;

    impl CallerResolver for Frames {
        fn resolve(&self, skip: usize) -> Option<CallerFrame> {
            Some(CallerFrame::new(
                Some(format!("app::f{}", skip)),
                "src/app.rs",
                10 + skip as u32,
            ))
        }
    }

    fn options() -> LayoutOptions {
        LayoutOptions {
            thread_ids: Arc::new(FixedIds(42)),
            context: Arc::new(OneValue),
            ..LayoutOptions::default()
        }
    }

    fn render(pattern: &str, entry: &Entry) -> String {
        Layout::compile(pattern, &options())
            .unwrap()
            .render_string(entry)
    }

    fn day() -> chrono::DateTime<Local> {
        Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
    }

    #[test]
    fn test_time_and_padded_level() {
        let entry = Entry::new(Level::Info, "hello").with_time(day());
        let line = render("%t{yyyy-MM-dd} [%5l] %msg%n", &entry);
        assert_eq!(line, "2024-01-02 [ INFO] hello\n");
        assert!(line.ends_with("[ INFO] hello\n"));
    }

    #[test]
    fn test_default_time_layout() {
        let entry = Entry::new(Level::Info, "x").with_time(day());
        assert_eq!(render("%t", &entry), "2024-01-02 03:04:05.000");
    }

    #[test]
    fn test_time_falls_back_to_clock() {
        let clock = Arc::new(MockClock::new(day()));
        let layout = Layout::compile(
            "%t{HH:mm}",
            &LayoutOptions {
                clock,
                ..LayoutOptions::default()
            },
        )
        .unwrap();
        assert_eq!(layout.render_string(&Entry::new(Level::Info, "x")), "03:04");
    }

    #[test]
    fn test_percent_escape_and_literals() {
        let entry = Entry::new(Level::Info, "m");
        assert_eq!(render("100%% %m!", &entry), "100% m!");
    }

    #[test]
    fn test_level_options() {
        let entry = Entry::new(Level::Warn, "");
        assert_eq!(render("%-5l|", &entry), "WARN |");
        assert_eq!(render("%l{lowercase}", &entry), " warn");
        assert_eq!(render("%l{length=1}", &entry), "    W");
        assert_eq!(render("%2l", &entry), "WARN");
        assert_eq!(render("%.3l", &entry), "WAR");
    }

    #[test]
    fn test_level_color_and_without_color() {
        let entry = Entry::new(Level::Error, "");
        let layout = Layout::compile("%l", &options()).unwrap();
        assert!(!layout.is_colored());
        let colored = Layout::compile("%l{printcolor}", &options()).unwrap();
        assert!(colored.is_colored());
        assert_eq!(colored.render_string(&entry), "\x1b[31mERROR\x1b[0m");

        let plain = colored.without_color();
        assert!(!plain.is_colored());
        assert_eq!(plain.render_string(&entry), "ERROR");
        assert_eq!(plain.parts().len(), colored.parts().len());
        assert_eq!(plain.pattern(), colored.pattern());
    }

    #[test]
    fn test_print_color_option_applies_to_all_levels() {
        let layout = Layout::compile(
            "%l",
            &LayoutOptions {
                print_color: true,
                ..options()
            },
        )
        .unwrap();
        assert_eq!(
            layout.render_string(&Entry::new(Level::Debug, "")),
            "\x1b[37mDEBUG\x1b[0m"
        );
        assert_eq!(
            layout.render_string(&Entry::new(Level::Info, "")),
            "\x1b[36m INFO\x1b[0m"
        );
    }

    #[test]
    fn test_pid_gid_trace() {
        let entry = Entry::new(Level::Info, "");
        assert_eq!(render("%pid", &entry), std::process::id().to_string());
        assert_eq!(render("[%gid]", &entry), "[42]");
        assert_eq!(render("[%gid]", &entry.clone().with_thread_id(7)), "[7]");
        assert_eq!(render("[%trace]", &entry), "[-]");
        assert_eq!(render("[%-6trace]", &entry.with_trace_id("abc")), "[abc   ]");
    }

    #[test]
    fn test_caller_threshold_and_format() {
        let frame = CallerFrame::new(Some("app::handler".to_string()), "src/net/handler.rs", 88);
        let warn = Entry::new(Level::Warn, "").with_caller(frame.clone());
        let info = Entry::new(Level::Info, "").with_caller(frame);

        assert_eq!(render("%caller", &warn), "app::handler handler.rs:88");
        assert_eq!(render("%caller", &info), "");
        assert_eq!(render("%caller{level=info,sep=#}", &info), "app::handler handler.rs#88");
    }

    #[test]
    fn test_caller_frames_from_resolver() {
        let layout = Layout::compile(
            "%caller{skip=2}",
            &LayoutOptions {
                caller_resolver: Some(Arc::new(Frames)),
                ..options()
            },
        )
        .unwrap();
        let entry = Entry::new(Level::Error, "");
        assert_eq!(layout.render_string(&entry), "app::f0 app.rs:10 app::f1 app.rs:11");
        assert_eq!(
            layout.render_string(&entry.with_caller_skip(1)),
            "app::f0 app.rs:10"
        );
    }

    #[test]
    fn test_context() {
        let entry = Entry::new(Level::Info, "");
        assert_eq!(render("%context{name=user}", &entry), "alice");
        assert_eq!(render("[%context{name=other}]", &entry), "[]");
        assert_eq!(
            Layout::compile("%context", &options()).unwrap_err(),
            LayoutError::MissingContextName
        );
    }

    #[test]
    fn test_fields() {
        let entry = Entry::new(Level::Info, "")
            .with_field("b", 2)
            .with_field("a", "x");
        assert_eq!(render("%fields", &entry), r#"{"a":"x","b":2}"#);
        assert_eq!(render("%fields", &Entry::new(Level::Info, "")), "");
    }

    #[test]
    fn test_message_single_line() {
        let entry = Entry::new(Level::Info, "line1\nline2\r\n");
        assert_eq!(render("%msg", &entry), "line1\\nline2");
        assert_eq!(render("%msg{singleline=false}", &entry), "line1\nline2");
    }

    #[test]
    fn test_message_pre_marker() {
        let entry = Entry::new(Level::Info, "dump:[PRE]\n  a\n  b\n");
        assert_eq!(render("%m", &entry), "dump:\n  a\n  b");
    }

    #[test]
    fn test_compile_errors() {
        assert_eq!(
            Layout::compile("%bogus", &options()).unwrap_err(),
            LayoutError::UnknownIndicator("bogus".to_string())
        );
        assert_eq!(
            Layout::compile("abc %", &options()).unwrap_err(),
            LayoutError::UnknownIndicator(String::new())
        );
        assert_eq!(
            Layout::compile("ab %t{yyyy", &options()).unwrap_err(),
            LayoutError::UnclosedBrace { position: 5 }
        );
    }

    #[test]
    fn test_default_layout_compiles() {
        let layout = Layout::compile(DEFAULT_LAYOUT, &options()).unwrap();
        let entry = Entry::new(Level::Info, "started")
            .with_time(day())
            .with_field("port", 8080);
        let line = layout.render_string(&entry);
        assert!(line.starts_with("2024-01-02 03:04:05.000 [ INFO] "));
        assert!(line.ends_with(" [42] [-]  : {\"port\":8080} started\n"));
    }
}
