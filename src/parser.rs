use crate::ast::{Branch, Expr, FunctionDecl, Program, Stmt};
use crate::config::Config;
use crate::env::Scope;
use crate::error::{Diagnostic, DiagnosticKind, Span};
use crate::lexer::{Clause, RawStatement, Tokenizer};
use crate::token::{Keyword, Operator, Token, TokenKind};

const ORPHAN_CHAIN: &str =
    "`elif`/`else` statements cannot be independent to a condition tree; ensure you have an `if` statement";

/// Builds the statement tree out of tokenized lines. Shapes are recognized by
/// the sequence of token kinds, not values; block bodies are tokenized and
/// parsed recursively right here, so chain violations surface before
/// anything executes.
pub struct Parser<'a> {
    config: &'a Config,
}

impl<'a> Parser<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    pub fn parse(&self, raw: Vec<RawStatement>) -> Result<Program, Diagnostic> {
        Ok(Program {
            statements: self.parse_statements(raw)?,
        })
    }

    fn parse_statements(&self, raw: Vec<RawStatement>) -> Result<Vec<Stmt>, Diagnostic> {
        let mut statements = Vec::new();
        // Decorator lines accumulate here and attach to the next function
        // declaration; anything else consumes them silently.
        let mut pending_decorators: Vec<String> = Vec::new();

        for statement in raw {
            match statement {
                RawStatement::Simple(tokens) => {
                    if let [token] = tokens.as_slice() {
                        if let TokenKind::Decorator(name) = &token.kind {
                            pending_decorators.push(name.clone());
                            continue;
                        }
                    }
                    statements.push(self.parse_simple(tokens)?);
                    pending_decorators.clear();
                }
                RawStatement::Compound(clauses) => {
                    let parsed = self.parse_compound(clauses, &mut pending_decorators)?;
                    statements.extend(parsed);
                    pending_decorators.clear();
                }
            }
        }

        Ok(statements)
    }

    fn parse_simple(&self, tokens: Vec<Token>) -> Result<Stmt, Diagnostic> {
        let span = tokens_span(&tokens);

        match tokens.first().map(|t| &t.kind) {
            Some(TokenKind::Keyword(Keyword::Let)) => {
                self.parse_declaration(Scope::Let, tokens, span)
            }
            Some(TokenKind::Keyword(Keyword::Const)) => {
                self.parse_declaration(Scope::Const, tokens, span)
            }
            Some(TokenKind::Keyword(Keyword::Stdout)) => self.parse_output(tokens, span),
            Some(TokenKind::Variable(_))
                if matches!(tokens.get(1).map(|t| &t.kind), Some(TokenKind::Operator(_))) =>
            {
                self.parse_reassignment(tokens, span)
            }
            _ => Ok(Stmt::Unrecognized { tokens, span }),
        }
    }

    /// `let`/`const` name `=` expr
    fn parse_declaration(
        &self,
        scope: Scope,
        tokens: Vec<Token>,
        span: Span,
    ) -> Result<Stmt, Diagnostic> {
        if tokens.len() < 4 {
            return Err(Diagnostic::syntax(span, "not enough terms in declaration"));
        }

        let (name, name_span) = match &tokens[1].kind {
            TokenKind::Variable(name) => (name.clone(), tokens[1].span),
            TokenKind::Keyword(kw) => {
                return Err(Diagnostic::new(
                    DiagnosticKind::ReservedKeyword {
                        word: kw.as_str().to_string(),
                    },
                    tokens[1].span,
                ));
            }
            _ => {
                return Err(Diagnostic::new(
                    DiagnosticKind::InvalidVariableName {
                        name: tokens[1].to_string(),
                    },
                    tokens[1].span,
                ));
            }
        };

        if tokens[2].operator() != Some(Operator::Assign) {
            return Err(Diagnostic::new(DiagnosticKind::Operator, tokens[2].span));
        }

        let expr = Expr::new(tokens[3..].to_vec(), span);
        Ok(Stmt::Declaration {
            scope,
            name,
            name_span,
            expr,
            span,
        })
    }

    /// `stdout` expr — exactly one value.
    fn parse_output(&self, tokens: Vec<Token>, span: Span) -> Result<Stmt, Diagnostic> {
        if tokens.len() != 2 {
            return Err(Diagnostic::new(DiagnosticKind::StdoutArity, span));
        }
        let expr = Expr::new(vec![tokens[1].clone()], span);
        Ok(Stmt::Output { expr, span })
    }

    /// name `=` expr
    fn parse_reassignment(&self, tokens: Vec<Token>, span: Span) -> Result<Stmt, Diagnostic> {
        let TokenKind::Variable(name) = &tokens[0].kind else {
            return Ok(Stmt::Unrecognized { tokens, span });
        };
        let name = name.clone();
        let name_span = tokens[0].span;

        if tokens[1].operator() != Some(Operator::Assign) {
            return Err(Diagnostic::new(DiagnosticKind::Operator, tokens[1].span));
        }

        let expr = Expr::new(tokens[2..].to_vec(), span);
        Ok(Stmt::Reassignment {
            name,
            name_span,
            expr,
            span,
        })
    }

    /// Group a statement's clauses into condition chains, try/catch pairs,
    /// and function declarations.
    fn parse_compound(
        &self,
        clauses: Vec<Clause>,
        pending_decorators: &mut Vec<String>,
    ) -> Result<Vec<Stmt>, Diagnostic> {
        let mut statements = Vec::new();
        let mut i = 0;

        while i < clauses.len() {
            let clause = &clauses[i];
            let span = clause_span(clause);

            let Some(first) = clause.header.first() else {
                statements.push(Stmt::Unrecognized {
                    tokens: Vec::new(),
                    span,
                });
                i += 1;
                continue;
            };

            match &first.kind {
                TokenKind::Keyword(Keyword::If) => {
                    let (stmt, consumed) = self.parse_conditional(&clauses[i..])?;
                    statements.push(stmt);
                    i += consumed;
                }
                TokenKind::Keyword(Keyword::Elif | Keyword::Else) => {
                    return Err(Diagnostic::control_flow(first.span, ORPHAN_CHAIN));
                }
                TokenKind::Keyword(Keyword::Try) => {
                    let (stmt, consumed) = self.parse_try_catch(&clauses[i..])?;
                    statements.push(stmt);
                    i += consumed;
                }
                TokenKind::Keyword(Keyword::Catch) => {
                    return Err(Diagnostic::new(DiagnosticKind::MisplacedCatch, first.span));
                }
                TokenKind::Keyword(Keyword::Function) => {
                    let decorators = std::mem::take(pending_decorators);
                    statements.push(self.parse_function(clause, decorators, span)?);
                    i += 1;
                }
                _ => {
                    statements.push(Stmt::Unrecognized {
                        tokens: clause.header.clone(),
                        span,
                    });
                    i += 1;
                }
            }
        }

        Ok(statements)
    }

    /// `if (…) {…}` with any number of `elif` arms and at most one trailing
    /// `else`. Returns the chain and the number of clauses consumed.
    fn parse_conditional(&self, clauses: &[Clause]) -> Result<(Stmt, usize), Diagnostic> {
        let head = &clauses[0];
        let mut branches = vec![Branch {
            condition: Some(self.parse_condition(&head.header, Keyword::If)?),
            body: self.parse_body(&head.body, head.body_span)?,
            span: clause_span(head),
        }];
        let mut consumed = 1;
        let mut closed = false;

        while consumed < clauses.len() {
            let clause = &clauses[consumed];
            match clause.header.first().map(|t| &t.kind) {
                Some(TokenKind::Keyword(Keyword::Elif)) => {
                    if closed {
                        return Err(Diagnostic::control_flow(
                            clause.header[0].span,
                            "`elif` cannot follow the `else` arm of a condition tree",
                        ));
                    }
                    branches.push(Branch {
                        condition: Some(self.parse_condition(&clause.header, Keyword::Elif)?),
                        body: self.parse_body(&clause.body, clause.body_span)?,
                        span: clause_span(clause),
                    });
                    consumed += 1;
                }
                Some(TokenKind::Keyword(Keyword::Else)) => {
                    if closed {
                        return Err(Diagnostic::control_flow(
                            clause.header[0].span,
                            "a condition tree can hold only one `else` arm",
                        ));
                    }
                    if clause.header.len() != 1 {
                        return Err(Diagnostic::syntax(
                            clause_span(clause),
                            "unexpected tokens after `else`",
                        ));
                    }
                    branches.push(Branch {
                        condition: None,
                        body: self.parse_body(&clause.body, clause.body_span)?,
                        span: clause_span(clause),
                    });
                    closed = true;
                    consumed += 1;
                }
                _ => break,
            }
        }

        let span = branches
            .iter()
            .map(|b| b.span)
            .reduce(|a, b| a.merge(&b))
            .unwrap_or_else(|| clause_span(head));
        Ok((Stmt::Conditional { branches, span }, consumed))
    }

    fn parse_try_catch(&self, clauses: &[Clause]) -> Result<(Stmt, usize), Diagnostic> {
        let head = &clauses[0];
        if head.header.len() != 1 {
            return Err(Diagnostic::syntax(
                clause_span(head),
                "unexpected tokens after `try`",
            ));
        }
        let try_body = self.parse_body(&head.body, head.body_span)?;
        let mut span = clause_span(head);
        let mut consumed = 1;

        let mut catch_body = Vec::new();
        if let Some(clause) = clauses.get(1) {
            if matches!(
                clause.header.first().map(|t| &t.kind),
                Some(TokenKind::Keyword(Keyword::Catch))
            ) {
                if clause.header.len() != 1 {
                    return Err(Diagnostic::syntax(
                        clause_span(clause),
                        "unexpected tokens after `catch`",
                    ));
                }
                catch_body = self.parse_body(&clause.body, clause.body_span)?;
                span = span.merge(&clause_span(clause));
                consumed += 1;
            }
        }

        Ok((
            Stmt::TryCatch {
                try_body,
                catch_body,
                span,
            },
            consumed,
        ))
    }

    /// `function name(params) {…}` — the body parses but is never invoked by
    /// this dispatcher.
    fn parse_function(
        &self,
        clause: &Clause,
        decorators: Vec<String>,
        span: Span,
    ) -> Result<Stmt, Diagnostic> {
        let header = &clause.header;

        let name = match header.get(1).map(|t| &t.kind) {
            Some(TokenKind::Variable(name)) => name.clone(),
            _ => {
                return Err(Diagnostic::syntax(
                    span,
                    "expected a function name after `function`",
                ));
            }
        };

        if header.get(2).and_then(Token::operator) != Some(Operator::LParen)
            || header.last().and_then(Token::operator) != Some(Operator::RParen)
        {
            return Err(Diagnostic::syntax(
                span,
                "expected a parenthesized parameter list",
            ));
        }

        let mut params = Vec::new();
        let inner = &header[3..header.len() - 1];
        let mut expect_name = true;
        for token in inner {
            match (&token.kind, expect_name) {
                (TokenKind::Variable(name), true) => {
                    params.push(name.clone());
                    expect_name = false;
                }
                (TokenKind::Operator(Operator::Comma), false) => expect_name = true,
                _ => {
                    return Err(Diagnostic::syntax(
                        token.span,
                        "malformed parameter list; expected comma-separated names",
                    ));
                }
            }
        }
        if expect_name && !params.is_empty() {
            return Err(Diagnostic::syntax(span, "trailing comma in parameter list"));
        }

        let body = self.parse_body(&clause.body, clause.body_span)?;
        Ok(Stmt::FunctionDecl(FunctionDecl {
            name,
            params,
            decorators,
            body,
            span,
        }))
    }

    fn parse_condition(&self, header: &[Token], kw: Keyword) -> Result<Expr, Diagnostic> {
        let span = tokens_span(header);
        let open = header.get(1).and_then(Token::operator);
        let close = header.last().and_then(Token::operator);
        if header.len() < 3 || open != Some(Operator::LParen) || close != Some(Operator::RParen) {
            return Err(Diagnostic::syntax(
                span,
                format!("expected a parenthesized condition after `{}`", kw.as_str()),
            ));
        }
        Ok(Expr::new(header[2..header.len() - 1].to_vec(), span))
    }

    /// Deferred block bodies are tokenized and parsed here, against the same
    /// configuration, with spans kept absolute.
    fn parse_body(&self, body: &str, body_span: Span) -> Result<Vec<Stmt>, Diagnostic> {
        let tokenizer = Tokenizer::with_base(self.config, body_span.start);
        let raw = tokenizer.tokenize(body)?;
        self.parse_statements(raw)
    }
}

fn tokens_span(tokens: &[Token]) -> Span {
    tokens
        .iter()
        .map(|t| t.span)
        .reduce(|a, b| a.merge(&b))
        .unwrap_or(Span { start: 0, end: 0 })
}

fn clause_span(clause: &Clause) -> Span {
    let header = tokens_span(&clause.header);
    if clause.header.is_empty() {
        clause.body_span
    } else {
        header.merge(&clause.body_span)
    }
}
