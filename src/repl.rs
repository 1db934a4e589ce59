use std::io::{self, Write};

use crate::config::Config;
use crate::evaluator::Evaluator;
use crate::lexer::Tokenizer;
use crate::parser::Parser;

/// Interactive mode. A single evaluator lives for the whole session, so
/// bindings persist between lines; diagnostics are reported but never fatal
/// here.
pub fn start() {
    println!("rill interpreter v0.1.0");
    println!("Type 'exit' or press Ctrl+C to quit");
    println!();

    let config = Config::default();
    let mut evaluator = Evaluator::new();

    loop {
        print!("> ");
        io::stdout().flush().unwrap();

        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            Ok(0) => {
                // EOF (Ctrl+D or piped input ended)
                println!();
                break;
            }
            Ok(_) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "exit" || line == "quit" {
                    println!("Goodbye!");
                    break;
                }

                run_line(line, &config, &mut evaluator);
            }
            Err(error) => {
                eprintln!("Error reading input: {}", error);
                break;
            }
        }
    }
}

fn run_line(source: &str, config: &Config, evaluator: &mut Evaluator) {
    let raw = match Tokenizer::new(config).tokenize(source) {
        Ok(raw) => raw,
        Err(error) => {
            error.report(source, None);
            return;
        }
    };

    let program = match Parser::new(config).parse(raw) {
        Ok(program) => program,
        Err(error) => {
            error.report(source, None);
            return;
        }
    };

    if let Err(error) = evaluator.run(&program) {
        error.report(source, None);
    }
    for warning in evaluator.take_warnings() {
        warning.report_warning(source, None);
    }
}
