//! Output sinks the interpreter talks to.
//!
//! Program output (`print`, REPL prompt, AST dumps) goes to the stdout side;
//! every diagnostic goes to the stderr side.  The driver and the evaluator
//! share one host through [`SharedHost`].

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

pub trait Host {
    /// Write `text` to the program's standard output, unterminated.
    fn write_out(&mut self, text: &str);

    /// Write `text` to the program's standard error, unterminated.
    fn write_err(&mut self, text: &str);

    fn out_line(&mut self, line: &str) {
        self.write_out(line);
        self.write_out("\n");
    }

    fn err_line(&mut self, line: &str) {
        self.write_err(line);
        self.write_err("\n");
    }
}

pub type SharedHost = Rc<RefCell<dyn Host>>;

/// The process's real stdout / stderr.
#[derive(Debug, Default)]
pub struct StdHost;

impl Host for StdHost {
    fn write_out(&mut self, text: &str) {
        let mut stdout = io::stdout().lock();
        // A closed pipe must not abort the script.
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }

    fn write_err(&mut self, text: &str) {
        let _ = io::stderr().lock().write_all(text.as_bytes());
    }
}

/// Collects both streams in memory; used by tests and embedders.
#[derive(Debug, Default)]
pub struct CaptureHost {
    pub out: String,
    pub err: String,
}

impl Host for CaptureHost {
    fn write_out(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn write_err(&mut self, text: &str) {
        self.err.push_str(text);
    }
}
