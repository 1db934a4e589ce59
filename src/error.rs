use ariadne::{Color, Fmt, Label, Report, ReportKind, Source};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn single(pos: usize) -> Self {
        Self {
            start: pos,
            end: pos + 1,
        }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn merge(&self, other: &Span) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Stable diagnostic code; safe sub-runs return one of these as their status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    Syntax,
    ControlFlow,
    Decorator,
    Operator,
    Declaration,
    ReservedKeyword,
    IoStreamWriting,
    VariableNotDefined,
    ConstantAssignment,
    StrictTypeViolation,
    VariableNameDeclaration,
    Reference,
    MisplacedCatch,
    UnsupportedExpression,
    UnrecognizedStatement,
    Pragma,
}

impl Code {
    /// Reference id printed alongside the title, where one exists.
    pub fn reference(&self) -> Option<&'static str> {
        match self {
            Code::Operator => Some("x0001"),
            Code::Declaration => Some("x0002"),
            Code::ReservedKeyword => Some("x0003"),
            Code::IoStreamWriting => Some("x0004"),
            Code::VariableNotDefined => Some("x0005"),
            Code::ConstantAssignment => Some("x0006"),
            Code::StrictTypeViolation => Some("x0007"),
            Code::VariableNameDeclaration => Some("x0008"),
            Code::Reference => Some("x0009"),
            Code::MisplacedCatch => Some("x0010"),
            _ => None,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Code::Syntax => "SyntaxError",
            Code::ControlFlow => "ControlFlowError",
            Code::Decorator => "DecoratorError",
            Code::Operator => "OperatorError",
            Code::Declaration => "DeclarationError",
            Code::ReservedKeyword => "ReservedKeywordError",
            Code::IoStreamWriting => "IOStreamWritingError",
            Code::VariableNotDefined => "VariableNotDefinedError",
            Code::ConstantAssignment => "ConstantAssignmentError",
            Code::StrictTypeViolation => "StrictTypeViolationError",
            Code::VariableNameDeclaration => "VariableNameDeclarationError",
            Code::Reference => "ReferenceError",
            Code::MisplacedCatch => "MisplacedCatchError",
            Code::UnsupportedExpression => "UnsupportedExpressionError",
            Code::UnrecognizedStatement => "UnrecognizedStatement",
            Code::Pragma => "IllegalPragmaDeclaration",
        }
    }
}

/// The diagnostic table: one variant per kind, message template attached.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DiagnosticKind {
    #[error("{message}")]
    Syntax { message: String },

    #[error("{message}")]
    ControlFlow { message: String },

    #[error("invalid syntax for decorator: `{line}`")]
    Decorator { line: String },

    #[error("invalid operation employed for defining/modifying a variable; consider utilizing an assignment operator instead")]
    Operator,

    #[error("attempting to redefine an existing variable is not permissible; the `let` and `const` keywords are intended for defining variables that do not already exist")]
    Redeclaration { name: String },

    #[error("invalid variable definition using a reserved keyword, `{word}`; consider using an alternative identifier")]
    ReservedKeyword { word: String },

    #[error("inappropriate utilization of the stdout keyword; this keyword should precede exactly one value")]
    StdoutArity,

    #[error("unauthorized assignment to a non-existent variable, {name}")]
    AssignUndeclared { name: String },

    #[error("unauthorized assignment of a constant variable, {name}; constants are immutable and cannot be reassigned")]
    AssignConstant { name: String },

    #[error("unauthorized attempt to reassign a variable with strict typing; variable {name} cannot be reassigned from type {declared} to {found}; it must adhere to the type {declared}")]
    StrictTypeViolation {
        name: String,
        declared: &'static str,
        found: &'static str,
    },

    #[error("unauthorized attempt to declare a variable, {name}; the provided name or type is invalid")]
    InvalidVariableName { name: String },

    #[error("attempted resolution of a non-existent token or symbol; the variable named {name} has not been declared within the local or global scope")]
    UndefinedReference { name: String },

    #[error("the usage of the `try`/`catch` statement is invalid; it is impermissible to employ a `catch` clause without an antecedent `try` block defined for error handling")]
    MisplacedCatch,

    #[error("{message}")]
    UnsupportedExpression { message: String },

    #[error("unrecognized statement shape: `{signature}`")]
    UnrecognizedStatement { signature: String },

    #[error("{message}")]
    Pragma { message: String },
}

impl DiagnosticKind {
    pub fn code(&self) -> Code {
        match self {
            DiagnosticKind::Syntax { .. } => Code::Syntax,
            DiagnosticKind::ControlFlow { .. } => Code::ControlFlow,
            DiagnosticKind::Decorator { .. } => Code::Decorator,
            DiagnosticKind::Operator => Code::Operator,
            DiagnosticKind::Redeclaration { .. } => Code::Declaration,
            DiagnosticKind::ReservedKeyword { .. } => Code::ReservedKeyword,
            DiagnosticKind::StdoutArity => Code::IoStreamWriting,
            DiagnosticKind::AssignUndeclared { .. } => Code::VariableNotDefined,
            DiagnosticKind::AssignConstant { .. } => Code::ConstantAssignment,
            DiagnosticKind::StrictTypeViolation { .. } => Code::StrictTypeViolation,
            DiagnosticKind::InvalidVariableName { .. } => Code::VariableNameDeclaration,
            DiagnosticKind::UndefinedReference { .. } => Code::Reference,
            DiagnosticKind::MisplacedCatch => Code::MisplacedCatch,
            DiagnosticKind::UnsupportedExpression { .. } => Code::UnsupportedExpression,
            DiagnosticKind::UnrecognizedStatement { .. } => Code::UnrecognizedStatement,
            DiagnosticKind::Pragma { .. } => Code::Pragma,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}")]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub span: Span,
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, span: Span) -> Self {
        Self {
            kind,
            span,
            help: None,
        }
    }

    pub fn with_help(kind: DiagnosticKind, span: Span, help: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            help: Some(help.into()),
        }
    }

    pub fn syntax(span: Span, message: impl Into<String>) -> Self {
        Self::new(
            DiagnosticKind::Syntax {
                message: message.into(),
            },
            span,
        )
    }

    pub fn control_flow(span: Span, message: impl Into<String>) -> Self {
        Self::new(
            DiagnosticKind::ControlFlow {
                message: message.into(),
            },
            span,
        )
    }

    pub fn code(&self) -> Code {
        self.kind.code()
    }

    /// Render a fatal report against `source` (the post-pragma text that the
    /// spans index into).
    pub fn report(&self, source: &str, filename: Option<&str>) {
        self.render(source, filename, ReportKind::Error, Color::Red);
    }

    /// Render a permissive report; the run continues after these.
    pub fn report_warning(&self, source: &str, filename: Option<&str>) {
        self.render(source, filename, ReportKind::Warning, Color::Yellow);
    }

    fn render(&self, source: &str, filename: Option<&str>, kind: ReportKind, color: Color) {
        let filename = filename.unwrap_or("<repl>");
        let code = self.code();

        let title = match code.reference() {
            Some(reference) => format!("(REF:{}) ~ {}", reference, code.title()),
            None => code.title().to_string(),
        };

        let end = self.span.end.max(self.span.start + 1);
        let mut builder = Report::build(kind, filename, self.span.start)
            .with_message(format!("{}: {}", title.fg(color), self.kind))
            .with_label(
                Label::new((filename, self.span.start..end))
                    .with_message(self.kind.to_string())
                    .with_color(color),
            );

        if let Some(ref help_text) = self.help {
            builder = builder.with_note(format!("{}: {}", "help".fg(Color::Cyan), help_text));
        }

        // A broken output stream must not panic the interpreter on its way out.
        let _ = builder.finish().print((filename, Source::from(source)));
    }
}
