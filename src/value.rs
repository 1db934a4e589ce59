use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Backtick-delimited string literal, with escapes. Shared with the tokenizer,
/// which must extract literals before any structural analysis.
pub(crate) static STRING_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[\s\S]*?```|`(?:\\.|[^\n`\\])*`").unwrap());

/// Numeric literal: optional sign, fractional part, exponent.
static NUMBER_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Number,
    String,
    Boolean,
}

impl ValueKind {
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Boolean => "boolean",
        }
    }
}

/// Runtime primitive value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Str(String),
    Boolean(bool),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Number(_) => ValueKind::Number,
            Value::Str(_) => ValueKind::String,
            Value::Boolean(_) => ValueKind::Boolean,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind().name()
    }

    /// Truthiness used for condition branches: non-zero, non-empty, or the
    /// boolean itself.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Boolean(b) => *b,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Number(n) => {
                // Integral numbers print without a fractional part.
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                    write!(f, "{:.0}", n)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Str(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
        }
    }
}

pub fn is_number_literal(text: &str) -> bool {
    NUMBER_LITERAL.is_match(text)
}

pub fn parse_number(text: &str) -> Option<f64> {
    if !is_number_literal(text) {
        return None;
    }
    text.parse().ok()
}

pub fn parse_boolean(text: &str) -> Option<bool> {
    match text {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Strip the backtick delimiters from a raw literal (triple backticks delimit
/// raw blocks) and expand escape sequences. `tab` is the configured tab fill,
/// already repeated to the configured width.
pub fn parse_string_literal(raw: &str, tab: &str) -> String {
    let inner = if raw.len() >= 6 && raw.starts_with("```") && raw.ends_with("```") {
        &raw[3..raw.len() - 3]
    } else if raw.len() >= 2 && raw.starts_with('`') && raw.ends_with('`') {
        &raw[1..raw.len() - 1]
    } else {
        raw
    };

    expand_escapes(inner, tab)
}

fn expand_escapes(text: &str, tab: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.peek() {
            Some('n') => {
                out.push('\n');
                chars.next();
            }
            Some('t') => {
                out.push_str(tab);
                chars.next();
            }
            Some('`') => {
                out.push('`');
                chars.next();
            }
            // Unknown escapes are kept verbatim.
            _ => out.push('\\'),
        }
    }

    out
}
