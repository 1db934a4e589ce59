// Integration tests for the rill front end.
//
// The table-driven section checks statement recognition and the diagnostics
// it produces; the direct tests below exercise runtime semantics against the
// shared environment and the captured output stream.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use pretty_assertions::assert_eq;

use rill::{
    Code, Config, Diagnostic, Evaluator, Operator, Parser, Program, RawStatement, Scope,
    Tokenizer, Value, ValueKind, BindingUpdate, TokenKind, OUTPUT_BANNER,
};

/// Output sink recording everything written plus the number of flushes.
#[derive(Default)]
struct Recorder {
    data: Vec<u8>,
    flushes: usize,
}

impl Recorder {
    fn text(&self) -> &str {
        std::str::from_utf8(&self.data).expect("output is utf-8")
    }
}

impl Write for Recorder {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes += 1;
        Ok(())
    }
}

/// Tokenize + parse with the default configuration.
fn analyze(source: &str) -> Result<Program, Diagnostic> {
    let config = Config::default();
    let raw = Tokenizer::new(&config).tokenize(source)?;
    Parser::new(&config).parse(raw)
}

fn tokenize(source: &str) -> Vec<RawStatement> {
    let config = Config::default();
    Tokenizer::new(&config)
        .tokenize(source)
        .expect("tokenization should succeed")
}

/// Run a source text that is expected to at least parse; returns the run
/// outcome and the evaluator for state inspection.
fn run_source(source: &str) -> (Result<(), Diagnostic>, Evaluator<Recorder>) {
    let mut evaluator = Evaluator::with_output(Recorder::default());
    let result = run_more(source, &mut evaluator);
    (result, evaluator)
}

/// Run another source text against an existing evaluator (REPL-style).
fn run_more(source: &str, evaluator: &mut Evaluator<Recorder>) -> Result<(), Diagnostic> {
    let program = analyze(source).expect("source should parse");
    evaluator.run(&program)
}

fn binding_value(evaluator: &Evaluator<Recorder>, name: &str) -> Value {
    evaluator
        .environment()
        .get(name)
        .unwrap_or_else(|| panic!("binding `{}` should exist", name))
        .value
        .clone()
}

// ============================================================================
// Statement recognition table
// ============================================================================

struct ParseCase {
    name: &'static str,
    input: &'static str,
    /// `None`: must parse. `Some(code)`: must fail with that diagnostic code.
    expected: Option<Code>,
}

fn check(cases: &[ParseCase]) {
    for case in cases {
        match (analyze(case.input), case.expected) {
            (Ok(_), None) => {}
            (Err(error), Some(code)) => assert_eq!(
                error.code(),
                code,
                "case `{}`: wrong diagnostic for {:?}",
                case.name,
                case.input,
            ),
            (Ok(_), Some(code)) => {
                panic!("case `{}`: expected {:?}, but parsing succeeded", case.name, code)
            }
            (Err(error), None) => panic!(
                "case `{}`: expected success, got {:?}: {}",
                case.name,
                error.code(),
                error
            ),
        }
    }
}

#[test]
fn declaration_shapes() {
    check(&[
        ParseCase {
            name: "simple_let",
            input: "let x = 5;",
            expected: None,
        },
        ParseCase {
            name: "simple_const",
            input: "const greeting = `hello`;",
            expected: None,
        },
        ParseCase {
            name: "too_short",
            input: "let x =;",
            expected: Some(Code::Syntax),
        },
        ParseCase {
            name: "reserved_keyword_name",
            input: "let if = 1;",
            expected: Some(Code::ReservedKeyword),
        },
        ParseCase {
            name: "reserved_keyword_name_watch",
            input: "const watch = 1;",
            expected: Some(Code::ReservedKeyword),
        },
        ParseCase {
            name: "boolean_literal_name",
            input: "let true = 1;",
            expected: Some(Code::VariableNameDeclaration),
        },
        ParseCase {
            name: "number_as_name",
            input: "let 5 = 1;",
            expected: Some(Code::VariableNameDeclaration),
        },
        ParseCase {
            name: "compound_assign_in_declaration",
            input: "let x += 5;",
            expected: Some(Code::Operator),
        },
    ]);
}

#[test]
fn output_and_reassignment_shapes() {
    check(&[
        ParseCase {
            name: "stdout_literal",
            input: "stdout `hi`;",
            expected: None,
        },
        ParseCase {
            name: "stdout_two_values",
            input: "stdout `a` `b`;",
            expected: Some(Code::IoStreamWriting),
        },
        ParseCase {
            name: "stdout_bare",
            input: "stdout;",
            expected: Some(Code::IoStreamWriting),
        },
        ParseCase {
            name: "plain_reassignment",
            input: "x = 5;",
            expected: None,
        },
        ParseCase {
            name: "arithmetic_in_assignment_slot",
            input: "x + 5;",
            expected: Some(Code::Operator),
        },
        ParseCase {
            name: "compound_assignment_rejected",
            input: "x += 5;",
            expected: Some(Code::Operator),
        },
    ]);
}

#[test]
fn control_flow_shapes() {
    check(&[
        ParseCase {
            name: "if_block",
            input: "if (true) { let a = 1; };",
            expected: None,
        },
        ParseCase {
            name: "if_elif_else_chain",
            input: "if (a) { } elif (b) { } else { };",
            expected: None,
        },
        ParseCase {
            name: "orphan_elif",
            input: "elif (x) { };",
            expected: Some(Code::ControlFlow),
        },
        ParseCase {
            name: "orphan_else",
            input: "else { };",
            expected: Some(Code::ControlFlow),
        },
        ParseCase {
            name: "elif_after_else",
            input: "if (a) { } else { } elif (b) { };",
            expected: Some(Code::ControlFlow),
        },
        ParseCase {
            name: "if_missing_parens",
            input: "if true { };",
            expected: Some(Code::Syntax),
        },
        ParseCase {
            name: "try_catch",
            input: "try { } catch { };",
            expected: None,
        },
        ParseCase {
            name: "try_alone",
            input: "try { };",
            expected: None,
        },
        ParseCase {
            name: "orphan_catch",
            input: "catch { };",
            expected: Some(Code::MisplacedCatch),
        },
        ParseCase {
            name: "unterminated_block",
            input: "if (x) { let a = 1;",
            expected: Some(Code::Syntax),
        },
    ]);
}

#[test]
fn function_and_decorator_shapes() {
    check(&[
        ParseCase {
            name: "function_with_params",
            input: "function add(a, b) { };",
            expected: None,
        },
        ParseCase {
            name: "function_no_params",
            input: "function main() { };",
            expected: None,
        },
        ParseCase {
            name: "decorated_function",
            input: "@memo\nfunction fib(n) { };",
            expected: None,
        },
        ParseCase {
            name: "function_missing_name",
            input: "function (a) { };",
            expected: Some(Code::Syntax),
        },
        ParseCase {
            name: "function_bad_params",
            input: "function f(a b) { };",
            expected: Some(Code::Syntax),
        },
        ParseCase {
            name: "decorator_with_junk",
            input: "@ memo extra;",
            expected: Some(Code::Decorator),
        },
    ]);
}

// ============================================================================
// Tokenizer behavior
// ============================================================================

#[test]
fn tokenizing_is_deterministic() {
    let source = "let x = 5;\nif (x) { stdout `ok\\n`; };";
    assert_eq!(tokenize(source), tokenize(source));
}

#[test]
fn adjacent_operators_merge_into_known_compounds() {
    let statements = tokenize("x += 5;");
    let [RawStatement::Simple(tokens)] = statements.as_slice() else {
        panic!("expected one flat statement");
    };
    assert_eq!(tokens.len(), 3);
    assert_eq!(tokens[1].operator(), Some(Operator::PlusAssign));
}

#[test]
fn unknown_compounds_stay_split() {
    let statements = tokenize("x = + - 5;");
    let [RawStatement::Simple(tokens)] = statements.as_slice() else {
        panic!("expected one flat statement");
    };
    let operators: Vec<_> = tokens.iter().filter_map(|t| t.operator()).collect();
    assert_eq!(
        operators,
        vec![Operator::Assign, Operator::Plus, Operator::Minus]
    );
}

#[test]
fn triple_equals_merges() {
    let statements = tokenize("x = = = 1;");
    let [RawStatement::Simple(tokens)] = statements.as_slice() else {
        panic!("expected one flat statement");
    };
    assert_eq!(tokens[1].operator(), Some(Operator::StrictEq));
}

#[test]
fn braces_inside_string_literals_are_opaque() {
    let statements = tokenize("let x = `{`;");
    let [RawStatement::Simple(tokens)] = statements.as_slice() else {
        panic!("a brace inside a literal must not open a block");
    };
    assert_eq!(tokens[3].kind, TokenKind::Str("{".to_string()));
}

#[test]
fn semicolons_inside_literals_do_not_split() {
    let statements = tokenize("let x = `a;b`;");
    assert_eq!(statements.len(), 1);
}

#[test]
fn newline_joins_after_operator_and_splits_between_words() {
    // `=` before the newline marks a continuation.
    let joined = tokenize("let x =\n5;");
    assert_eq!(joined.len(), 1);

    // Alphanumeric on both sides terminates the statement.
    let split = tokenize("let a = 1\nlet b = 2");
    assert_eq!(split.len(), 2);
}

#[test]
fn comments_are_stripped_before_classification() {
    let statements = tokenize("let x = 1; /* note */ let y = 2; // trailing");
    assert_eq!(statements.len(), 2);
}

#[test]
fn ellipsis_and_number_formats() {
    let statements = tokenize("x = ...;\nlet y = 3.25;\nlet z = 2e3;");
    assert_eq!(statements.len(), 3);
    let [RawStatement::Simple(first), RawStatement::Simple(second), RawStatement::Simple(third)] =
        statements.as_slice()
    else {
        panic!("expected three flat statements");
    };
    assert_eq!(first[2].operator(), Some(Operator::Ellipsis));
    assert_eq!(second[3].kind, TokenKind::Number(3.25));
    assert_eq!(third[3].kind, TokenKind::Number(2000.0));
}

#[test]
fn triple_backtick_literals_keep_inner_backticks() {
    let statements = tokenize("let x = ```a`b```;");
    let [RawStatement::Simple(tokens)] = statements.as_slice() else {
        panic!("expected one flat statement");
    };
    assert_eq!(tokens[3].kind, TokenKind::Str("a`b".to_string()));
}

// ============================================================================
// Runtime semantics
// ============================================================================

#[test]
fn declaration_creates_let_binding() {
    let (result, evaluator) = run_source("let x = 5;");
    assert!(result.is_ok());

    let binding = evaluator.environment().get("x").expect("x should exist");
    assert_eq!(binding.value, Value::Number(5.0));
    assert_eq!(binding.scope, Scope::Let);
    assert_eq!(binding.declared_kind, Some(ValueKind::Number));
}

#[test]
fn redeclaration_is_rejected() {
    let (result, _) = run_source("let x = 1; let x = 2;");
    assert_eq!(result.unwrap_err().code(), Code::Declaration);
}

#[test]
fn const_bindings_are_write_once() {
    let (result, evaluator) = run_source("const x = 5; x = 6;");
    assert_eq!(result.unwrap_err().code(), Code::ConstantAssignment);
    assert_eq!(binding_value(&evaluator, "x"), Value::Number(5.0));
}

#[test]
fn reassigning_an_unknown_name_fails() {
    let (result, _) = run_source("ghost = 1;");
    assert_eq!(result.unwrap_err().code(), Code::VariableNotDefined);
}

#[test]
fn strict_bindings_reject_kind_changes() {
    let mut evaluator = Evaluator::with_output(Recorder::default());
    run_more("let x = 5;", &mut evaluator).expect("declaration should succeed");
    evaluator.environment_mut().set(
        "x",
        BindingUpdate {
            strict: Some(true),
            ..BindingUpdate::default()
        },
    );

    let result = run_more("x = `text`;", &mut evaluator);
    assert_eq!(result.unwrap_err().code(), Code::StrictTypeViolation);
    assert_eq!(binding_value(&evaluator, "x"), Value::Number(5.0));

    // A kind-preserving write still goes through.
    run_more("x = 9;", &mut evaluator).expect("same-kind write should succeed");
    assert_eq!(binding_value(&evaluator, "x"), Value::Number(9.0));
}

#[test]
fn undefined_reference_in_expression() {
    let (result, _) = run_source("let x = ghost;");
    assert_eq!(result.unwrap_err().code(), Code::Reference);
}

#[test]
fn multi_token_expressions_are_unsupported() {
    let (result, _) = run_source("let x = 1 + 2;");
    assert_eq!(result.unwrap_err().code(), Code::UnsupportedExpression);
}

#[test]
fn stdout_writes_banner_and_flushes_on_newline() {
    let (result, evaluator) = run_source("stdout `hi\\n`;");
    assert!(result.is_ok());

    let recorder = evaluator.output();
    assert_eq!(recorder.text(), format!("{}hi\n", OUTPUT_BANNER));
    assert!(recorder.flushes > 0, "newline-terminated output must flush");
}

#[test]
fn stdout_without_newline_does_not_flush() {
    let (result, evaluator) = run_source("stdout `hi`;");
    assert!(result.is_ok());

    let recorder = evaluator.output();
    assert_eq!(recorder.text(), format!("{}hi", OUTPUT_BANNER));
    assert_eq!(recorder.flushes, 0);
}

#[test]
fn stdout_resolves_variables() {
    let (result, evaluator) = run_source("let msg = `hello`;\nstdout msg;");
    assert!(result.is_ok());
    assert_eq!(evaluator.output().text(), format!("{}hello", OUTPUT_BANNER));
}

#[test]
fn escape_sequences_expand_with_configured_tab() {
    let source = "#PRAGMA::__TAB_SIZE__>>2;\n#PRAGMA::__TAB_BASE__>>`.`;\nstdout `a\\tb`;";
    let (config, offset) = rill::config::split_pragmas(source).expect("pragmas should parse");
    assert_eq!(config.tab_width, 2);

    let body = &source[offset..];
    let raw = Tokenizer::new(&config).tokenize(body).expect("tokenize");
    let program = Parser::new(&config).parse(raw).expect("parse");
    let mut evaluator = Evaluator::with_output(Recorder::default());
    evaluator.run(&program).expect("run");

    assert_eq!(evaluator.output().text(), format!("{}a..b", OUTPUT_BANNER));
}

#[test]
fn unknown_pragma_key_is_rejected() {
    let source = "#PRAGMA::__NO_SUCH_KEY__>>1;\nlet x = 1;";
    let error = rill::config::split_pragmas(source).unwrap_err();
    assert_eq!(error.code(), Code::Pragma);
}

#[test]
fn taken_branch_shares_the_environment() {
    let (result, evaluator) = run_source("if (true) { let y = 1; };");
    assert!(result.is_ok());
    // Block-scoped declarations survive the block.
    assert_eq!(binding_value(&evaluator, "y"), Value::Number(1.0));
}

#[test]
fn exactly_one_branch_is_taken() {
    let source =
        "if (false) { let a = 1; } elif (true) { let b = 2; } else { let c = 3; };";
    let (result, evaluator) = run_source(source);
    assert!(result.is_ok());
    assert!(!evaluator.environment().contains("a"));
    assert_eq!(binding_value(&evaluator, "b"), Value::Number(2.0));
    assert!(!evaluator.environment().contains("c"));
}

#[test]
fn condition_resolves_variables_for_truthiness() {
    let (result, evaluator) = run_source("let flag = true;\nif (flag) { let hit = 1; };");
    assert!(result.is_ok());
    assert!(evaluator.environment().contains("hit"));
}

#[test]
fn catch_body_diagnostics_become_a_status() {
    let (result, evaluator) = run_source("try { } catch { ghost = 5; };");
    // The failure is captured, not propagated.
    assert!(result.is_ok());
    assert_eq!(evaluator.last_status(), Some(Code::VariableNotDefined));
}

#[test]
fn clean_catch_body_clears_the_status() {
    let (result, evaluator) = run_source("try { } catch { let ok = 1; };");
    assert!(result.is_ok());
    assert_eq!(evaluator.last_status(), None);
    // Safe mode still runs against the shared environment.
    assert_eq!(binding_value(&evaluator, "ok"), Value::Number(1.0));
}

#[test]
fn try_body_is_never_executed() {
    let (result, evaluator) = run_source("try { let inside = 1; } catch { };");
    assert!(result.is_ok());
    assert!(!evaluator.environment().contains("inside"));
}

#[test]
fn unrecognized_statements_warn_without_aborting() {
    let (result, mut evaluator) = run_source("foo;\nlet x = 1;");
    assert!(result.is_ok());
    assert_eq!(binding_value(&evaluator, "x"), Value::Number(1.0));

    let warnings = evaluator.take_warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].code(), Code::UnrecognizedStatement);
}

#[test]
fn watchers_observe_old_and_new_values() {
    let mut evaluator = Evaluator::with_output(Recorder::default());
    run_more("let x = 1;", &mut evaluator).expect("declaration");

    let seen: Rc<RefCell<Vec<(Value, Value)>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    evaluator.environment_mut().add_watcher(
        "x",
        Box::new(move |old, new| {
            sink.borrow_mut().push((old.clone(), new.clone()));
        }),
    );

    run_more("x = 2;", &mut evaluator).expect("reassignment");

    assert_eq!(
        seen.borrow().as_slice(),
        &[(Value::Number(1.0), Value::Number(2.0))]
    );
    assert_eq!(binding_value(&evaluator, "x"), Value::Number(2.0));
}

#[test]
fn watcher_registration_for_unknown_names_is_a_noop() {
    let mut evaluator = Evaluator::with_output(Recorder::default());
    evaluator
        .environment_mut()
        .add_watcher("missing", Box::new(|_, _| panic!("must never fire")));
    run_more("let missing = 1;", &mut evaluator).expect("declaration");
    run_more("missing = 2;", &mut evaluator).expect("reassignment");
}

#[test]
fn number_display_drops_integral_fraction() {
    assert_eq!(Value::Number(5.0).to_string(), "5");
    assert_eq!(Value::Number(2.5).to_string(), "2.5");
    assert_eq!(Value::Number(2000.0).to_string(), "2000");
}

#[test]
fn truthiness_follows_kind() {
    assert!(Value::Number(1.0).is_truthy());
    assert!(!Value::Number(0.0).is_truthy());
    assert!(Value::Str("x".into()).is_truthy());
    assert!(!Value::Str(String::new()).is_truthy());
    assert!(Value::Boolean(true).is_truthy());
    assert!(!Value::Boolean(false).is_truthy());
}
