//! Embedded script arrays.
//!
//! Tree pages carry their data as an inline JavaScript global holding
//! `[hierarchyPathId, name, numericId]` triples. Locating it is an ordered
//! regex chain with early exit; reading it is a lenient array parser that
//! accepts what browsers accept and `serde_json` does not: single quotes,
//! trailing commas, bare words, missing outer brackets and truncated input.

use regex::Regex;
use serde_json::{Number, Value};
use std::sync::OnceLock;

use crate::error::{PortalError, PortalResult};

/// One raw tree entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triple {
    pub hierarchy_id: String,
    pub name: String,
    pub id: u64,
}

struct Pattern {
    name: &'static str,
    regex: &'static str,
}

/// Candidate assignments, most specific first. Each match ends on the first
/// character of the value.
const PATTERNS: &[Pattern] = &[
    Pattern {
        name: "window-bracket",
        regex: r#"window\s*\[\s*["']([A-Za-z_$][\w$]*)["']\s*\]\s*=\s*\["#,
    },
    Pattern {
        name: "var-declaration",
        regex: r"\b(?:var|let|const)\s+([A-Za-z_$][\w$]*)\s*=\s*\[",
    },
    Pattern {
        name: "new-array",
        regex: r"([A-Za-z_$][\w$.]*)\s*=\s*new\s+Array\s*\(",
    },
    Pattern {
        name: "bare-assignment",
        regex: r"(?:^|[;{}\s])([A-Za-z_$][\w$.]*)\s*=\s*\[",
    },
];

fn compiled() -> &'static [(&'static str, Regex)] {
    static CELL: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    CELL.get_or_init(|| {
        PATTERNS
            .iter()
            .filter_map(|p| Regex::new(p.regex).ok().map(|r| (p.name, r)))
            .collect()
    })
}

fn is_tree_identifier(name: &str) -> bool {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    let last = name.rsplit('.').next().unwrap_or(name);
    CELL.get_or_init(|| Regex::new(r"(?i)tree|node|arr").ok())
        .as_ref()
        .is_some_and(|r| r.is_match(last))
}

/// Find and read the tree array of a page.
///
/// No candidate assignment at all is an empty page, not an error. A
/// candidate that no repair strategy can read is
/// [`PortalError::MalformedEmbeddedData`].
pub fn extract_triples(html: &str) -> PortalResult<Vec<Triple>> {
    let mut failure: Option<PortalError> = None;
    let mut parsed_empty = false;

    for (pattern, regex) in compiled() {
        for caps in regex.captures_iter(html) {
            let (Some(whole), Some(ident)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if !is_tree_identifier(ident.as_str()) {
                continue;
            }

            // the value starts at the last character of the match: `[` or `(`
            let start = whole.end() - 1;
            let raw = value_slice(&html[start..]);

            match parse_lenient(raw).and_then(to_triples) {
                Some(triples) if !triples.is_empty() => {
                    tracing::debug!(
                        pattern,
                        identifier = ident.as_str(),
                        count = triples.len(),
                        "embedded tree array parsed"
                    );
                    return Ok(triples);
                }
                Some(_) => parsed_empty = true,
                None => {
                    tracing::warn!(
                        pattern,
                        identifier = ident.as_str(),
                        raw_len = raw.len(),
                        "embedded array could not be read, trying next candidate"
                    );
                    failure.get_or_insert_with(|| PortalError::MalformedEmbeddedData {
                        raw_len: raw.len(),
                        pattern: (*pattern).to_string(),
                        sample: raw.chars().take(120).collect(),
                    });
                }
            }
        }
    }

    match failure {
        Some(err) if !parsed_empty => Err(err),
        _ => Ok(Vec::new()),
    }
}

/// The script text after an assignment, cut at the end of its `<script>`.
fn value_slice(rest: &str) -> &str {
    let end = rest.find("</script").unwrap_or(rest.len());
    &rest[..end]
}

/// Read one value, or a comma-separated run of values with the outer
/// brackets missing, from the start of `raw`.
pub fn parse_lenient(raw: &str) -> Option<Value> {
    let mut parser = Parser::new(raw);
    parser.skip_ws();

    if parser.peek() == Some('(') {
        parser.bump();
        return parser.sequence(Some(')')).map(Value::Array);
    }

    let mut values = parser.sequence(None)?;
    match values.len() {
        0 => None,
        1 => values.pop(),
        _ => Some(Value::Array(values)),
    }
}

fn to_triples(value: Value) -> Option<Vec<Triple>> {
    let Value::Array(items) = value else {
        return None;
    };

    // a lone triple without the outer array
    if !items.is_empty() && !items.iter().any(Value::is_array) {
        return Some(triple(&items).into_iter().collect());
    }

    let mut out = Vec::with_capacity(items.len());
    for item in &items {
        match item {
            Value::Array(fields) => {
                if let Some(t) = triple(fields) {
                    out.push(t);
                } else {
                    tracing::debug!(?fields, "skipping incomplete tree entry");
                }
            }
            _ => return None,
        }
    }
    Some(out)
}

fn triple(fields: &[Value]) -> Option<Triple> {
    let hierarchy_id = scalar_string(fields.first()?)?;
    let name = scalar_string(fields.get(1)?)?;
    let id = match fields.get(2)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    if hierarchy_id.is_empty() {
        return None;
    }
    Some(Triple {
        hierarchy_id,
        name,
        id,
    })
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(raw: &str) -> Self {
        Self {
            chars: raw.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    /// Comma-separated values up to `close` (or, at top level, up to the
    /// first token that cannot continue the run). End of input closes every
    /// open level so truncated arrays keep what they have.
    fn sequence(&mut self, close: Option<char>) -> Option<Vec<Value>> {
        let mut values = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                None => return Some(values),
                Some(c) if Some(c) == close => {
                    self.bump();
                    return Some(values);
                }
                Some(',') => {
                    self.bump();
                    continue;
                }
                Some(_) => {}
            }

            values.push(self.value()?);

            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                None => return Some(values),
                Some(c) if Some(c) == close => {
                    self.bump();
                    return Some(values);
                }
                // top level: `;`, `<` or the next statement ends the run
                Some(_) if close.is_none() => return Some(values),
                Some(_) => return None,
            }
        }
    }

    fn value(&mut self) -> Option<Value> {
        match self.peek()? {
            '[' => {
                self.bump();
                self.sequence(Some(']')).map(Value::Array)
            }
            '\'' | '"' => self.string().map(Value::String),
            c if c == '-' || c == '.' || c.is_ascii_digit() => self.number(),
            c if c.is_alphabetic() || c == '_' || c == '$' => Some(self.word()),
            _ => None,
        }
    }

    fn string(&mut self) -> Option<String> {
        let quote = self.bump()?;
        let mut out = String::new();
        while let Some(c) = self.bump() {
            match c {
                c if c == quote => return Some(out),
                '\\' => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('u') => {
                        let hex: String = (0..4).filter_map(|_| self.bump()).collect();
                        if let Some(ch) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                            out.push(ch);
                        }
                    }
                    Some(other) => out.push(other),
                    None => break,
                },
                _ => out.push(c),
            }
        }
        // unterminated string at end of input
        Some(out)
    }

    fn number(&mut self) -> Option<Value> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'))
        {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if let Ok(n) = text.parse::<i64>() {
            return Some(Value::Number(n.into()));
        }
        text.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
    }

    fn word(&mut self) -> Value {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$')
        {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        match word.as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            "null" | "undefined" => Value::Null,
            _ => Value::String(word),
        }
    }
}
