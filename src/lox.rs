//! Driver: wires scanner → parser → resolver → interpreter together, routes
//! diagnostics to the host and maps the outcome to a process exit status.
//!
//! The driver never exits the process itself; [`ExitStatus`] is handed back
//! to the binary.

use std::fs;
use std::io::BufRead;
use std::path::Path;

use log::{debug, info};

use crate::ast_printer::AstPrinter;
use crate::error::{LoxError, Result};
use crate::host::SharedHost;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::Scanner;
use crate::stmt::Stmt;

/// Stack size for the thread that runs Lox code.  Deep enough for
/// [`MAX_CALL_DEPTH`](crate::interpreter::MAX_CALL_DEPTH) nested calls.
pub const STACK_SIZE: usize = 256 * 1024 * 1024;

const BANNER: &[&str] = &[
    "treelox REPL",
    "CTRL + D to exit",
    "-f <filename> to run a file in the lox dir (no ext)",
    "-d plus your input will print out the AST",
    "",
];

/// How a run ended, in `sysexits.h` terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    /// Bad command line.
    Usage,
    /// Lexical, syntax or resolution error.
    DataError,
    /// Runtime error.
    Software,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Usage => 64,
            ExitStatus::DataError => 65,
            ExitStatus::Software => 70,
        }
    }
}

pub struct Lox {
    host: SharedHost,
    interpreter: Interpreter,
    had_error: bool,
    had_runtime_error: bool,
}

impl Lox {
    pub fn new(host: SharedHost) -> Self {
        let interpreter = Interpreter::new(host.clone());

        Self {
            host,
            interpreter,
            had_error: false,
            had_runtime_error: false,
        }
    }

    /// Run one program.  Evaluation is skipped if any static error was
    /// reported.
    pub fn run_source(&mut self, source: &str) -> ExitStatus {
        self.run(source, false);
        self.status()
    }

    /// Read `path` as UTF‑8 and run it.
    pub fn run_file(&mut self, path: &Path) -> Result<ExitStatus> {
        info!("Reading file: {:?}", path);

        let bytes: Vec<u8> = fs::read(path)?;
        let source: String = String::from_utf8(bytes)?;

        info!("Read {} bytes from {:?}", source.len(), path);

        Ok(self.run_source(&source))
    }

    /// Line‑oriented session over `input`.  Definitions persist across lines;
    /// errors on one line do not affect the next.
    pub fn run_prompt<R: BufRead>(&mut self, input: R) -> Result<ExitStatus> {
        for line in BANNER {
            self.host.borrow_mut().out_line(line);
        }

        let mut lines = input.lines();

        loop {
            self.host.borrow_mut().write_out("> ");

            let Some(line) = lines.next() else {
                break;
            };
            let line: String = line?;

            if let Some(name) = line.strip_prefix("-f ") {
                let path = format!("lox/{}.lox", name.trim());
                debug!("REPL running file {}", path);

                return self.run_file(Path::new(&path));
            } else if let Some(source) = line.strip_prefix("-d ") {
                self.print_ast(source);
            } else {
                self.run(&line, true);
            }

            self.had_error = false;
            self.had_runtime_error = false;
        }

        info!("REPL reached end of input");

        Ok(ExitStatus::Success)
    }

    /// Parse `source` and print each statement's prefix form.
    pub fn print_ast(&mut self, source: &str) {
        let Some(statements) = self.parse(source) else {
            return;
        };

        let mut host = self.host.borrow_mut();
        for stmt in &statements {
            host.out_line(&AstPrinter::print_stmt(stmt));
        }
    }

    /// Print `source`'s tokens one per line, either in `KIND lexeme literal`
    /// form or as JSON objects.
    pub fn dump_tokens(&mut self, source: &str, json: bool) -> Result<ExitStatus> {
        let (tokens, errors) = Scanner::new(source).scan_tokens();
        self.report_all(errors);

        for token in &tokens {
            let line: String = if json {
                serde_json::to_string(token)?
            } else {
                token.to_string()
            };
            self.host.borrow_mut().out_line(&line);
        }

        Ok(self.status())
    }

    /// Exit status implied by the errors reported so far.
    pub fn status(&self) -> ExitStatus {
        if self.had_error {
            ExitStatus::DataError
        } else if self.had_runtime_error {
            ExitStatus::Software
        } else {
            ExitStatus::Success
        }
    }

    fn run(&mut self, source: &str, promote_expressions: bool) {
        let Some(mut statements) = self.parse(source) else {
            return;
        };

        if promote_expressions {
            // Calculator mode: a bare expression prints its value.
            for stmt in statements.iter_mut() {
                if let Stmt::Expression(expr) = stmt {
                    *stmt = Stmt::Print(expr.clone());
                }
            }
        }

        if let Err(errors) = Resolver::new(&mut self.interpreter).resolve(&statements) {
            self.interpreter.forget_top_level();
            self.report_all(errors);
            return;
        }

        if let Err(e) = self.interpreter.interpret(&statements) {
            self.report(&e);
        }
    }

    /// Scan and parse, reporting every static error.  `None` if any occurred.
    fn parse(&mut self, source: &str) -> Option<Vec<Stmt>> {
        let (tokens, lex_errors) = Scanner::new(source).scan_tokens();
        self.report_all(lex_errors);

        let (statements, parse_errors) = Parser::new(tokens).parse();
        self.report_all(parse_errors);

        if self.had_error {
            None
        } else {
            Some(statements)
        }
    }

    fn report_all(&mut self, errors: Vec<LoxError>) {
        for error in &errors {
            self.report(error);
        }
    }

    fn report(&mut self, error: &LoxError) {
        debug!("Reporting error: {}", error);

        self.host.borrow_mut().err_line(&error.to_string());

        if error.is_static() {
            self.had_error = true;
        } else {
            self.had_runtime_error = true;
        }
    }
}
