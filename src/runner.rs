use tracing::debug;

use crate::config;
use crate::evaluator::Evaluator;
use crate::lexer::Tokenizer;
use crate::parser::Parser;

/// Run a complete source text: pragma header → tokenizer → parser →
/// dispatcher. Returns `false` when a fatal diagnostic ended the run.
pub fn run(source: &str, filename: Option<&str>) -> bool {
    // Pragma directives only apply ahead of the first statement line.
    let (cfg, offset) = match config::split_pragmas(source) {
        Ok(parts) => parts,
        Err(error) => {
            error.report(source, filename);
            return false;
        }
    };
    let body = &source[offset..];
    debug!(tab_width = cfg.tab_width, "run configuration loaded");

    let tokenizer = Tokenizer::new(&cfg);
    let raw = match tokenizer.tokenize(body) {
        Ok(raw) => raw,
        Err(error) => {
            error.report(body, filename);
            return false;
        }
    };
    debug!(statements = raw.len(), "tokenized");

    let parser = Parser::new(&cfg);
    let program = match parser.parse(raw) {
        Ok(program) => program,
        Err(error) => {
            error.report(body, filename);
            return false;
        }
    };

    let mut evaluator = Evaluator::new();
    let result = evaluator.run(&program);

    for warning in evaluator.take_warnings() {
        warning.report_warning(body, filename);
    }

    if let Err(error) = result {
        error.report(body, filename);
        return false;
    }
    true
}
