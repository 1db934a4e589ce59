use std::io::{self, Write};

use tracing::debug;

use crate::ast::{Expr, Program, Stmt};
use crate::env::{BindingUpdate, Environment, Scope};
use crate::error::{Code, Diagnostic, DiagnosticKind};
use crate::token::TokenKind;
use crate::value::Value;

/// Fixed prefix written before every `stdout` value.
pub const OUTPUT_BANNER: &str = "rill >> ";

/// Executes the statement tree against the shared environment. One instance
/// per run; the REPL keeps one alive across lines.
pub struct Evaluator<W: Write = io::Stdout> {
    environment: Environment,
    warnings: Vec<Diagnostic>,
    last_status: Option<Code>,
    out: W,
}

impl Evaluator<io::Stdout> {
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl Default for Evaluator<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Evaluator<W> {
    pub fn with_output(out: W) -> Self {
        Self {
            environment: Environment::new(),
            warnings: Vec::new(),
            last_status: None,
            out,
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn environment_mut(&mut self) -> &mut Environment {
        &mut self.environment
    }

    /// Status captured by the most recent catch-body run, if any.
    pub fn last_status(&self) -> Option<Code> {
        self.last_status
    }

    /// Permissive diagnostics accumulated so far; draining them is the
    /// caller's job (they render after the run, as warnings).
    pub fn take_warnings(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.warnings)
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn run(&mut self, program: &Program) -> Result<(), Diagnostic> {
        self.execute_block(&program.statements)
    }

    fn execute_block(&mut self, statements: &[Stmt]) -> Result<(), Diagnostic> {
        for statement in statements {
            self.execute(statement)?;
        }
        Ok(())
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<(), Diagnostic> {
        match stmt {
            Stmt::Declaration {
                scope,
                name,
                name_span,
                expr,
                ..
            } => {
                let value = self.evaluate(expr)?;
                if self.environment.contains(name) {
                    return Err(Diagnostic::new(
                        DiagnosticKind::Redeclaration { name: name.clone() },
                        *name_span,
                    ));
                }
                let kind = value.kind();
                self.environment.set(
                    name,
                    BindingUpdate {
                        value: Some(value),
                        declared_kind: Some(kind),
                        scope: Some(*scope),
                        strict: Some(false),
                    },
                );
                Ok(())
            }

            Stmt::Output { expr, .. } => {
                let value = self.evaluate(expr)?;
                self.write_output(&value);
                Ok(())
            }

            Stmt::Reassignment {
                name,
                name_span,
                expr,
                ..
            } => {
                let value = self.evaluate(expr)?;

                let Some(binding) = self.environment.get(name) else {
                    return Err(Diagnostic::new(
                        DiagnosticKind::AssignUndeclared { name: name.clone() },
                        *name_span,
                    ));
                };
                let (scope, strict, declared_kind) =
                    (binding.scope, binding.strict, binding.declared_kind);

                if scope == Scope::Const {
                    return Err(Diagnostic::new(
                        DiagnosticKind::AssignConstant { name: name.clone() },
                        *name_span,
                    ));
                }
                if strict {
                    if let Some(declared) = declared_kind {
                        if declared != value.kind() {
                            return Err(Diagnostic::new(
                                DiagnosticKind::StrictTypeViolation {
                                    name: name.clone(),
                                    declared: declared.name(),
                                    found: value.kind().name(),
                                },
                                *name_span,
                            ));
                        }
                    }
                }

                self.environment.set(name, BindingUpdate::value(value));
                Ok(())
            }

            Stmt::Conditional { branches, .. } => {
                for branch in branches {
                    let taken = match &branch.condition {
                        None => true,
                        Some(condition) => self.evaluate(condition)?.is_truthy(),
                    };
                    if taken {
                        self.execute_block(&branch.body)?;
                        break;
                    }
                }
                Ok(())
            }

            Stmt::TryCatch { catch_body, .. } => {
                // The try body is deliberately not executed; the catch body
                // runs in safe mode and its diagnostics become a status.
                let status = self.execute_safe(catch_body);
                if let Some(code) = status {
                    debug!(?code, "captured diagnostic in catch body");
                }
                self.last_status = status;
                Ok(())
            }

            Stmt::FunctionDecl(decl) => {
                debug!(
                    name = %decl.name,
                    params = decl.params.len(),
                    decorators = decl.decorators.len(),
                    "recorded function declaration"
                );
                Ok(())
            }

            Stmt::Unrecognized { tokens, span } => {
                let signature = tokens
                    .iter()
                    .map(|t| t.kind.kind_name())
                    .collect::<Vec<_>>()
                    .join(":");
                self.warnings.push(Diagnostic::new(
                    DiagnosticKind::UnrecognizedStatement { signature },
                    *span,
                ));
                Ok(())
            }
        }
    }

    /// Safe sub-interpretation: any diagnostic raised by the nested run is
    /// returned as a status instead of propagating.
    fn execute_safe(&mut self, statements: &[Stmt]) -> Option<Code> {
        self.execute_block(statements).err().map(|d| d.code())
    }

    /// Single-token expression evaluation: a literal is itself, a variable
    /// resolves through the environment. Anything longer is explicitly
    /// unsupported rather than silently truncated.
    fn evaluate(&mut self, expr: &Expr) -> Result<Value, Diagnostic> {
        match expr.tokens.as_slice() {
            [token] => match &token.kind {
                TokenKind::Number(n) => Ok(Value::Number(*n)),
                TokenKind::Str(s) => Ok(Value::Str(s.clone())),
                TokenKind::Boolean(b) => Ok(Value::Boolean(*b)),
                TokenKind::Variable(name) => match self.environment.get(name) {
                    Some(binding) => Ok(binding.value.clone()),
                    None => Err(Diagnostic::new(
                        DiagnosticKind::UndefinedReference { name: name.clone() },
                        token.span,
                    )),
                },
                _ => Err(Diagnostic::new(
                    DiagnosticKind::UnsupportedExpression {
                        message: format!("`{}` cannot be evaluated as a value", token),
                    },
                    token.span,
                )),
            },
            [] => Err(Diagnostic::new(
                DiagnosticKind::UnsupportedExpression {
                    message: "expected a value".to_string(),
                },
                expr.span,
            )),
            _ => Err(Diagnostic::new(
                DiagnosticKind::UnsupportedExpression {
                    message: "multi-token expressions are not implemented; only a single literal or variable reference evaluates".to_string(),
                },
                expr.span,
            )),
        }
    }

    fn write_output(&mut self, value: &Value) {
        let text = value.to_string();
        let _ = write!(self.out, "{}{}", OUTPUT_BANNER, text);
        if text.ends_with('\n') {
            let _ = self.out.flush();
        }
    }
}
