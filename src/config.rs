use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Diagnostic, DiagnosticKind, Span};
use crate::value;

static PRAGMA_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#PRAGMA\s*::\s*([a-zA-Z_][a-zA-Z_0-9]*)\s*>>\s*(.*);$").unwrap()
});

pub const DEFAULT_TAB_WIDTH: usize = 4;
pub const DEFAULT_TAB_FILL: &str = " ";
pub const DEFAULT_SL_COMMENTS: &str = r"//.*";
pub const DEFAULT_ML_COMMENTS: &str = r"/\*[\s\S]*?\*/";

/// Run-wide options, constructed once from the pragma header and passed into
/// the tokenizer and dispatcher. Immutable for the lifetime of a run.
#[derive(Debug, Clone)]
pub struct Config {
    pub tab_width: usize,
    pub tab_fill: String,
    pub sl_comments: Regex,
    pub ml_comments: Regex,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tab_width: DEFAULT_TAB_WIDTH,
            tab_fill: DEFAULT_TAB_FILL.to_string(),
            sl_comments: Regex::new(DEFAULT_SL_COMMENTS).unwrap(),
            ml_comments: Regex::new(DEFAULT_ML_COMMENTS).unwrap(),
        }
    }
}

impl Config {
    /// The expansion of a `\t` escape under this configuration.
    pub fn tab(&self) -> String {
        self.tab_fill.repeat(self.tab_width)
    }
}

/// A pragma value is a string, number, or boolean literal.
enum PragmaValue {
    Str(String),
    Number(f64),
    Boolean(bool),
}

fn parse_pragma_value(raw: &str) -> Option<PragmaValue> {
    let raw = raw.trim();
    if raw.len() >= 2 && raw.starts_with('`') && raw.ends_with('`') {
        // Delimiters stripped, escapes left alone: comment patterns are raw
        // regex text.
        return Some(PragmaValue::Str(raw[1..raw.len() - 1].to_string()));
    }
    if let Some(n) = value::parse_number(raw) {
        return Some(PragmaValue::Number(n));
    }
    value::parse_boolean(raw).map(PragmaValue::Boolean)
}

/// Consume leading `#PRAGMA::KEY>>value;` lines and build the run `Config`.
///
/// Returns the config together with the byte offset of the first
/// statement-bearing line; diagnostics from later stages index into
/// `&source[offset..]`.
pub fn split_pragmas(source: &str) -> Result<(Config, usize), Diagnostic> {
    let mut config = Config::default();
    let mut offset = 0;

    for line in source.split_inclusive('\n') {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            offset += line.len();
            continue;
        }

        let Some(captures) = PRAGMA_LINE.captures(trimmed) else {
            break;
        };

        let line_span = Span::new(offset, offset + line.trim_end().len());
        let key = captures.get(1).map_or("", |m| m.as_str());
        let raw_value = captures.get(2).map_or("", |m| m.as_str());

        let Some(parsed) = parse_pragma_value(raw_value) else {
            return Err(Diagnostic::new(
                DiagnosticKind::Pragma {
                    message: "invalid syntax for pragma declaration; the specified value should be a string, number, or boolean".to_string(),
                },
                line_span,
            ));
        };

        match (key, parsed) {
            ("__TAB_SIZE__", PragmaValue::Number(n)) if n >= 0.0 && n.fract() == 0.0 => {
                config.tab_width = n as usize;
            }
            ("__TAB_BASE__", PragmaValue::Str(s)) => {
                config.tab_fill = s;
            }
            ("__SL_COMMENTS__", PragmaValue::Str(s)) => {
                config.sl_comments = compile_pattern(&s, line_span)?;
            }
            ("__ML_COMMENTS__", PragmaValue::Str(s)) => {
                config.ml_comments = compile_pattern(&s, line_span)?;
            }
            ("__TAB_SIZE__" | "__TAB_BASE__" | "__SL_COMMENTS__" | "__ML_COMMENTS__", _) => {
                return Err(Diagnostic::new(
                    DiagnosticKind::Pragma {
                        message: format!(
                            "invalid syntax for pragma declaration; the value given for `{}` has the wrong type",
                            key
                        ),
                    },
                    line_span,
                ));
            }
            _ => {
                return Err(Diagnostic::new(
                    DiagnosticKind::Pragma {
                        message: format!(
                            "invalid syntax for pragma declaration; the specified key `{}` does not exist",
                            key
                        ),
                    },
                    line_span,
                ));
            }
        }

        offset += line.len();
    }

    Ok((config, offset))
}

fn compile_pattern(pattern: &str, span: Span) -> Result<Regex, Diagnostic> {
    Regex::new(pattern).map_err(|err| {
        Diagnostic::new(
            DiagnosticKind::Pragma {
                message: format!("invalid comment pattern in pragma declaration: {}", err),
            },
            span,
        )
    })
}
