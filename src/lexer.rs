use crate::config::Config;
use crate::error::{Diagnostic, DiagnosticKind, Span};
use crate::token::{Keyword, Operator, OperatorClass, Token, TokenKind};
use crate::value;

/// One header/body pair of a block-bearing statement. The body is kept as
/// deferred raw source; the parser tokenizes it recursively.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub header: Vec<Token>,
    pub body: String,
    pub body_span: Span,
}

/// A statement line as produced by the tokenizer: either a flat token
/// sequence, or an ordered list of clauses for control/try-catch/function
/// constructs (`if … {} elif … {} else {}` is ONE statement).
#[derive(Debug, Clone, PartialEq)]
pub enum RawStatement {
    Simple(Vec<Token>),
    Compound(Vec<Clause>),
}

/// Multi-pass tokenizer: string-literal protection, depth-aware statement
/// splitting, block isolation, comment stripping, classification, and
/// operator-run merging, in that order.
pub struct Tokenizer<'a> {
    config: &'a Config,
    base: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PieceKind {
    Text,
    Literal,
}

/// A contiguous slice of one statement's source: plain text or a protected
/// string literal. Ranges index the tokenizer's input.
#[derive(Debug, Clone, Copy)]
struct Piece {
    kind: PieceKind,
    start: usize,
    end: usize,
}

#[derive(Debug, Default)]
struct ClausePieces {
    header: Vec<Piece>,
    body_start: usize,
    body_end: usize,
}

#[derive(Debug, Default)]
struct StmtPieces {
    pieces: Vec<Piece>,
    clauses: Vec<ClausePieces>,
}

impl StmtPieces {
    fn is_empty(&self) -> bool {
        self.pieces.is_empty() && self.clauses.is_empty()
    }
}

/// Word or protected literal, pre-classification. The decorator line join
/// operates on this level.
enum RawTok {
    Word(String, Span),
    Lit(Token),
}

impl<'a> Tokenizer<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config, base: 0 }
    }

    /// Tokenizer for a nested block body; `base` is the body's byte offset in
    /// the outermost source, so every span stays absolute.
    pub fn with_base(config: &'a Config, base: usize) -> Self {
        Self { config, base }
    }

    pub fn tokenize(&self, source: &str) -> Result<Vec<RawStatement>, Diagnostic> {
        let statements = self.split_statements(source)?;

        let mut out = Vec::new();
        for stmt in statements {
            if let Some(raw) = self.tokenize_statement(source, stmt)? {
                out.push(raw);
            }
        }
        Ok(out)
    }

    fn span(&self, start: usize, end: usize) -> Span {
        Span::new(self.base + start, self.base + end)
    }

    /// Passes 1-3: literal protection, depth-aware splitting, block isolation.
    fn split_statements(&self, source: &str) -> Result<Vec<StmtPieces>, Diagnostic> {
        let mut statements: Vec<StmtPieces> = Vec::new();
        let mut current = StmtPieces::default();
        let mut text_start: Option<usize> = None;
        let mut depth_paren: i32 = 0;
        let mut depth_bracket: i32 = 0;
        let mut depth_brace: i32 = 0;
        let mut body_start: Option<usize> = None;

        let close_text = |text_start: &mut Option<usize>, current: &mut StmtPieces, end: usize| {
            if let Some(start) = text_start.take() {
                if start < end {
                    current.pieces.push(Piece {
                        kind: PieceKind::Text,
                        start,
                        end,
                    });
                }
            }
        };
        let finish_statement = |statements: &mut Vec<StmtPieces>, current: &mut StmtPieces| {
            if !current.is_empty() {
                statements.push(std::mem::take(current));
            }
        };

        for (kind, seg_start, seg_end) in segments(source) {
            if kind == PieceKind::Literal {
                // Literals are opaque: they never perturb depth counters, and
                // inside a block body they stay part of the raw slice.
                if body_start.is_none() {
                    close_text(&mut text_start, &mut current, seg_start);
                    current.pieces.push(Piece {
                        kind: PieceKind::Literal,
                        start: seg_start,
                        end: seg_end,
                    });
                }
                continue;
            }

            for (i, ch) in source[seg_start..seg_end].char_indices() {
                let at = seg_start + i;

                if body_start.is_some() {
                    match ch {
                        '{' => depth_brace += 1,
                        '}' => {
                            depth_brace -= 1;
                            if depth_brace == 0 {
                                current.clauses.push(ClausePieces {
                                    header: std::mem::take(&mut current.pieces),
                                    body_start: body_start.take().unwrap_or(at),
                                    body_end: at,
                                });
                            }
                        }
                        _ => {}
                    }
                    continue;
                }

                match ch {
                    '(' => {
                        open_text(&mut text_start, at);
                        depth_paren += 1;
                    }
                    ')' => {
                        open_text(&mut text_start, at);
                        depth_paren -= 1;
                    }
                    '[' => {
                        open_text(&mut text_start, at);
                        depth_bracket += 1;
                    }
                    ']' => {
                        open_text(&mut text_start, at);
                        depth_bracket -= 1;
                    }
                    '{' => {
                        if depth_paren == 0 && depth_bracket == 0 {
                            close_text(&mut text_start, &mut current, at);
                            depth_brace = 1;
                            body_start = Some(at + 1);
                        } else {
                            open_text(&mut text_start, at);
                            depth_brace += 1;
                        }
                    }
                    '}' => {
                        open_text(&mut text_start, at);
                        depth_brace -= 1;
                    }
                    ';' if depth_paren == 0 && depth_bracket == 0 && depth_brace == 0 => {
                        close_text(&mut text_start, &mut current, at);
                        finish_statement(&mut statements, &mut current);
                    }
                    '\n' => {
                        if splits_at_newline(source, seg_start, seg_end, at) {
                            close_text(&mut text_start, &mut current, at);
                            finish_statement(&mut statements, &mut current);
                        }
                    }
                    _ => {
                        if !ch.is_whitespace() {
                            open_text(&mut text_start, at);
                        }
                    }
                }
            }
        }

        if let Some(start) = body_start {
            return Err(Diagnostic::syntax(
                self.span(start.saturating_sub(1), start),
                "unterminated block; expected `}`",
            ));
        }

        close_text(&mut text_start, &mut current, source.len());
        finish_statement(&mut statements, &mut current);
        Ok(statements)
    }

    /// Passes 4-6 for one statement: comment stripping, classification,
    /// operator-run merging.
    fn tokenize_statement(
        &self,
        source: &str,
        stmt: StmtPieces,
    ) -> Result<Option<RawStatement>, Diagnostic> {
        if stmt.clauses.is_empty() {
            let tokens = self.tokenize_pieces(source, &stmt.pieces, true)?;
            if tokens.is_empty() {
                return Ok(None);
            }
            return Ok(Some(RawStatement::Simple(tokens)));
        }

        let mut clauses = Vec::new();
        for clause in &stmt.clauses {
            let header = self.tokenize_pieces(source, &clause.header, false)?;
            clauses.push(Clause {
                header,
                body: source[clause.body_start..clause.body_end].to_string(),
                body_span: self.span(clause.body_start, clause.body_end),
            });
        }

        // Header tokens after the last closed block (no body of their own);
        // the parser decides whether they are a legal clause.
        let trailing = self.tokenize_pieces(source, &stmt.pieces, false)?;
        if !trailing.is_empty() {
            let span = trailing
                .iter()
                .map(|t| t.span)
                .reduce(|a, b| a.merge(&b))
                .unwrap_or_else(|| self.span(source.len(), source.len()));
            clauses.push(Clause {
                header: trailing,
                body: String::new(),
                body_span: Span::new(span.end, span.end),
            });
        }

        Ok(Some(RawStatement::Compound(clauses)))
    }

    fn tokenize_pieces(
        &self,
        source: &str,
        pieces: &[Piece],
        line_level: bool,
    ) -> Result<Vec<Token>, Diagnostic> {
        let mut raw: Vec<RawTok> = Vec::new();

        for piece in pieces {
            match piece.kind {
                PieceKind::Literal => {
                    let text = &source[piece.start..piece.end];
                    let parsed = value::parse_string_literal(text, &self.config.tab());
                    raw.push(RawTok::Lit(Token::new(
                        TokenKind::Str(parsed),
                        self.span(piece.start, piece.end),
                    )));
                }
                PieceKind::Text => {
                    let blanked = self.blank_comments(&source[piece.start..piece.end]);
                    self.split_words(&blanked, piece.start, &mut raw);
                }
            }
        }

        if line_level {
            raw = self.join_decorator(raw)?;
        }

        let mut tokens = Vec::with_capacity(raw.len());
        for tok in raw {
            match tok {
                RawTok::Lit(token) => tokens.push(token),
                RawTok::Word(word, span) => tokens.push(self.classify(&word, span)?),
            }
        }

        Ok(merge_operator_runs(tokens))
    }

    /// Replace comment spans with spaces so offsets survive into spans.
    fn blank_comments(&self, text: &str) -> String {
        let mut out = text.to_string();
        for pattern in [&self.config.ml_comments, &self.config.sl_comments] {
            let ranges: Vec<_> = pattern.find_iter(&out).map(|m| m.range()).collect();
            for range in ranges {
                let blank = " ".repeat(out[range.clone()].len());
                out.replace_range(range, &blank);
            }
        }
        out
    }

    fn split_words(&self, text: &str, offset: usize, out: &mut Vec<RawTok>) {
        let bytes = text.as_bytes();
        let mut i = 0;

        while i < bytes.len() {
            let ch = bytes[i] as char;

            if ch.is_ascii_whitespace() {
                i += 1;
                continue;
            }

            let start = i;
            if ch.is_ascii_alphabetic() || ch == '_' {
                while i < bytes.len()
                    && ((bytes[i] as char).is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
            } else if ch.is_ascii_digit() {
                i = scan_number(bytes, i);
            } else if ch == '.' {
                if text[i..].starts_with("...") {
                    i += 3;
                } else if bytes.get(i + 1).is_some_and(|b| b.is_ascii_digit()) {
                    i = scan_number(bytes, i);
                } else {
                    i += 1;
                }
            } else {
                i += utf8_len(bytes[i]);
            }

            out.push(RawTok::Word(
                text[start..i].to_string(),
                self.span(offset + start, offset + i),
            ));
        }
    }

    /// A line whose first word is a bare `@` must be exactly `@ identifier`;
    /// the pair collapses into one decorator token.
    fn join_decorator(&self, raw: Vec<RawTok>) -> Result<Vec<RawTok>, Diagnostic> {
        let starts_with_at = matches!(raw.first(), Some(RawTok::Word(w, _)) if w == "@");
        if !starts_with_at {
            return Ok(raw);
        }

        let line: Vec<String> = raw
            .iter()
            .map(|t| match t {
                RawTok::Word(w, _) => w.clone(),
                RawTok::Lit(token) => token.to_string(),
            })
            .collect();

        if raw.len() == 2 {
            if let (Some(RawTok::Word(_, at_span)), Some(RawTok::Word(name, name_span))) =
                (raw.first(), raw.get(1))
            {
                if is_identifier(name) {
                    let token = Token::new(
                        TokenKind::Decorator(name.clone()),
                        at_span.merge(name_span),
                    );
                    return Ok(vec![RawTok::Lit(token)]);
                }
            }
        }

        let span = match raw.first() {
            Some(RawTok::Word(_, span)) => *span,
            _ => Span::single(self.base),
        };
        Err(Diagnostic::new(
            DiagnosticKind::Decorator {
                line: line.join(" "),
            },
            span,
        ))
    }

    /// Pass 5: classification, first match wins.
    fn classify(&self, word: &str, span: Span) -> Result<Token, Diagnostic> {
        if let Some(kw) = Keyword::lookup(word) {
            // The boolean words are reserved, but they classify as literals.
            let kind = match kw {
                Keyword::True => TokenKind::Boolean(true),
                Keyword::False => TokenKind::Boolean(false),
                _ => TokenKind::Keyword(kw),
            };
            return Ok(Token::new(kind, span));
        }

        if let Some(n) = value::parse_number(word) {
            return Ok(Token::new(TokenKind::Number(n), span));
        }

        let mut chars = word.chars();
        if chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        {
            if is_identifier(word) {
                return Ok(Token::new(TokenKind::Variable(word.to_string()), span));
            }
            return Err(Diagnostic::new(
                DiagnosticKind::InvalidVariableName {
                    name: word.to_string(),
                },
                span,
            ));
        }

        if let Some(op) = Operator::from_symbol(word) {
            return Ok(Token::new(TokenKind::Operator(op), span));
        }

        if word == "`" {
            return Err(Diagnostic::syntax(span, "unterminated string literal"));
        }

        Err(Diagnostic::syntax(
            span,
            format!("invalid token: `{}`", word),
        ))
    }
}

fn open_text(text_start: &mut Option<usize>, at: usize) {
    if text_start.is_none() {
        *text_start = Some(at);
    }
}

/// Alternating text/literal ranges over the source. Extracting literals
/// first is what protects braces and semicolons inside them.
fn segments(source: &str) -> Vec<(PieceKind, usize, usize)> {
    let mut out = Vec::new();
    let mut pos = 0;
    for m in value::STRING_LITERAL.find_iter(source) {
        if m.start() > pos {
            out.push((PieceKind::Text, pos, m.start()));
        }
        out.push((PieceKind::Literal, m.start(), m.end()));
        pos = m.end();
    }
    if pos < source.len() {
        out.push((PieceKind::Text, pos, source.len()));
    }
    out
}

/// Line-joining heuristic: a newline only terminates the statement when the
/// nearest non-space characters on both sides are alphanumeric; anything else
/// (an operator, a delimiter) marks a continuation and the newline is
/// dropped.
fn splits_at_newline(source: &str, seg_start: usize, seg_end: usize, at: usize) -> bool {
    let before = source[seg_start..at]
        .chars()
        .rev()
        .find(|c| !c.is_whitespace());
    let after = source[at + 1..seg_end]
        .chars()
        .find(|c| !c.is_whitespace());
    matches!((before, after), (Some(b), Some(a)) if b.is_ascii_alphanumeric() && a.is_ascii_alphanumeric())
}

fn scan_number(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i < bytes.len()
        && bytes[i] == b'.'
        && bytes.get(i + 1).is_some_and(|b| b.is_ascii_digit())
    {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        if j < bytes.len() && bytes[j].is_ascii_digit() {
            i = j;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
    }
    i
}

fn utf8_len(byte: u8) -> usize {
    match byte {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        _ => 4,
    }
}

fn is_identifier(word: &str) -> bool {
    let mut chars = word.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Pass 6: coalesce adjacent non-Group operator tokens while the concatenated
/// symbol is a known compound; an unknown concatenation leaves the run split.
fn merge_operator_runs(tokens: Vec<Token>) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    let mut i = 0;

    while i < tokens.len() {
        let Some(op) = tokens[i].operator() else {
            out.push(tokens[i].clone());
            i += 1;
            continue;
        };
        if op.class() == OperatorClass::Group {
            out.push(tokens[i].clone());
            i += 1;
            continue;
        }

        let mut merged = op;
        let mut symbol = op.symbol().to_string();
        let mut span = tokens[i].span;
        i += 1;

        while i < tokens.len() {
            let Some(next) = tokens[i].operator() else {
                break;
            };
            if next.class() == OperatorClass::Group {
                break;
            }
            symbol.push_str(next.symbol());
            match Operator::from_symbol(&symbol) {
                Some(compound) => {
                    merged = compound;
                    span = span.merge(&tokens[i].span);
                    i += 1;
                }
                None => break,
            }
        }

        out.push(Token::new(TokenKind::Operator(merged), span));
    }

    out
}
