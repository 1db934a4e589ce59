use crate::env::Scope;
use crate::error::Span;
use crate::token::Token;

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

/// An expression slot. Only single-token expressions evaluate today; the
/// token run is preserved so richer forms fail loudly instead of being
/// truncated.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub tokens: Vec<Token>,
    pub span: Span,
}

impl Expr {
    pub fn new(tokens: Vec<Token>, fallback: Span) -> Self {
        let span = tokens
            .iter()
            .map(|t| t.span)
            .reduce(|a, b| a.merge(&b))
            .unwrap_or(fallback);
        Self { tokens, span }
    }
}

/// One arm of a condition chain; `condition` is `None` for the `else` arm.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub condition: Option<Expr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<String>,
    pub decorators: Vec<String>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Declaration {
        scope: Scope,
        name: String,
        name_span: Span,
        expr: Expr,
        span: Span,
    },
    Output {
        expr: Expr,
        span: Span,
    },
    Reassignment {
        name: String,
        name_span: Span,
        expr: Expr,
        span: Span,
    },
    /// `if`/`elif`/`else` chain; exactly one branch is taken, and its children
    /// execute against the same environment as the parent.
    Conditional {
        branches: Vec<Branch>,
        span: Span,
    },
    /// The try body is never executed directly; the catch body runs in safe
    /// mode with diagnostics captured as a status.
    TryCatch {
        try_body: Vec<Stmt>,
        catch_body: Vec<Stmt>,
        span: Span,
    },
    FunctionDecl(FunctionDecl),
    /// Anything whose shape matched no statement signature; reported
    /// permissively at execution time.
    Unrecognized {
        tokens: Vec<Token>,
        span: Span,
    },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Declaration { span, .. } => *span,
            Stmt::Output { span, .. } => *span,
            Stmt::Reassignment { span, .. } => *span,
            Stmt::Conditional { span, .. } => *span,
            Stmt::TryCatch { span, .. } => *span,
            Stmt::FunctionDecl(decl) => decl.span,
            Stmt::Unrecognized { span, .. } => *span,
        }
    }
}
