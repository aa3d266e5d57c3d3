//! Line Parser
//!
//! Turns one raw log line into a structured [`Line`]. The expected shape is
//!
//! ```text
//! D 21:04:58.5488393 LoadingScreen.OnScenePreUnload() - prevMode=BACON nextMode=GAMEPLAY
//! ```
//!
//! i.e. a severity marker, a time of day, an origin tag ending in `()`, the `-`
//! separator and a free-text body. Indentation of the body encodes nesting.
//! Parsing is pure and never panics; lines of any other shape yield a
//! [`LineParseError`] that callers are expected to skip.

use crate::config::EngineConfig;
use crate::types::{BodyType, Line, LineParseError, Parameter, Severity, Timestamp};
use regex::Regex;
use std::sync::OnceLock;

static PREFIX_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_prefix_regex() -> &'static Regex {
    PREFIX_REGEX.get_or_init(|| {
        // <severity> <time> <Origin.Tag>()<rest>
        Regex::new(
            r"^(?P<severity>\S)\s+(?P<time>\S+)\s+(?P<origin>[\w.]+)\(\)(?P<rest>.*)$",
        )
        .unwrap()
    })
}

/// Stateless log line parser
#[derive(Debug, Clone)]
pub struct LineParser {
    indent_width: usize,
}

impl LineParser {
    /// Create a parser with the given indentation unit (spaces per level)
    pub fn new(indent_width: usize) -> Self {
        Self {
            indent_width: indent_width.max(1),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.indent_width)
    }

    /// Parse a single raw line
    ///
    /// # Returns
    /// * `Ok(Line)` for a well-formed line
    /// * `Err(LineParseError)` if the line does not have the expected shape
    pub fn parse(&self, raw: &str) -> Result<Line, LineParseError> {
        let text = raw.trim_end_matches(['\r', '\n']);
        if text.trim().is_empty() {
            return Err(LineParseError::Empty);
        }

        let caps = get_prefix_regex()
            .captures(text)
            .ok_or_else(|| LineParseError::UnrecognizedShape(text.to_string()))?;

        let marker = caps["severity"].chars().next().unwrap_or_default();
        let severity =
            Severity::from_marker(marker).ok_or(LineParseError::UnknownSeverity(marker))?;
        let timestamp = parse_timestamp(&caps["time"])?;
        let sequence_type = caps["origin"].to_string();

        let Some(body) = extract_body(&caps["rest"])
            .ok_or_else(|| LineParseError::MissingSeparator(text.to_string()))?
        else {
            return Ok(Line {
                timestamp,
                severity,
                level: 0,
                sequence_type,
                body_type: None,
                command: None,
                parameters: Vec::new(),
            });
        };

        let indentation = body.len() - body.trim_start_matches(' ').len();
        let level = indentation / self.indent_width;
        let (body_type, command, parameters) = split_body(body.trim());

        Ok(Line {
            timestamp,
            severity,
            level,
            sequence_type,
            body_type: Some(body_type),
            command,
            parameters,
        })
    }
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new(EngineConfig::default().indent_width)
    }
}

/// Parse a line with the default indentation unit
pub fn parse_line(raw: &str) -> Result<Line, LineParseError> {
    LineParser::default().parse(raw)
}

fn parse_timestamp(text: &str) -> Result<Timestamp, LineParseError> {
    Timestamp::parse_from_str(text, "%H:%M:%S%.f")
        .map_err(|_| LineParseError::InvalidTimestamp(text.to_string()))
}

/// Split the text after `()` into an optional body
///
/// `None` means the rest is not a body at all (separator missing);
/// `Some(None)` means the line legitimately ends after the origin tag.
fn extract_body(rest: &str) -> Option<Option<&str>> {
    if rest.trim().is_empty() {
        return Some(None);
    }

    let after_separator = rest.trim_start().strip_prefix('-')?;
    let body = after_separator
        .strip_prefix(' ')
        .unwrap_or(after_separator);

    if body.trim().is_empty() {
        return Some(None);
    }

    Some(Some(body))
}

/// A top-level `key=` token inside a body: (token start, `=` position)
type KeyToken = (usize, usize);

/// Find every top-level key token in a body
///
/// A token is a run of text delimited by whitespace at bracket depth 0.
/// It is a key token when it contains `=` at depth 0 after at least one
/// character. Text inside `[...]` never starts a new token.
fn find_key_tokens(body: &str) -> Vec<KeyToken> {
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut token_start: Option<usize> = None;
    let mut key_end: Option<usize> = None;

    // Only ASCII bytes are inspected, which never occur inside multi-byte
    // UTF-8 sequences, so byte offsets stay on char boundaries.
    for (index, byte) in body.bytes().enumerate() {
        if depth == 0 && byte.is_ascii_whitespace() {
            if let (Some(start), Some(eq)) = (token_start, key_end) {
                tokens.push((start, eq));
            }
            token_start = None;
            key_end = None;
            continue;
        }

        let start = *token_start.get_or_insert(index);
        match byte {
            b'[' => depth += 1,
            b']' => depth = depth.saturating_sub(1),
            b'=' if depth == 0 && key_end.is_none() && index > start => key_end = Some(index),
            _ => {}
        }
    }

    if let (Some(start), Some(eq)) = (token_start, key_end) {
        tokens.push((start, eq));
    }

    tokens
}

/// Classify a trimmed body and extract its command and parameters
fn split_body(body: &str) -> (BodyType, Option<String>, Vec<Parameter>) {
    let keys = find_key_tokens(body);

    let Some(&(first_start, _)) = keys.first() else {
        return (BodyType::Command, Some(body.to_string()), Vec::new());
    };

    let parameters = keys
        .iter()
        .enumerate()
        .map(|(index, &(start, eq))| {
            let value_end = keys
                .get(index + 1)
                .map(|&(next_start, _)| next_start)
                .unwrap_or(body.len());
            Parameter::new(&body[start..eq], body[eq + 1..value_end].trim())
        })
        .collect();

    if first_start == 0 {
        (BodyType::Parameter, None, parameters)
    } else {
        let command = body[..first_start].trim().to_string();
        (BodyType::CommandWithParameter, Some(command), parameters)
    }
}
