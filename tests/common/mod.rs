#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::thread;

use treelox::host::CaptureHost;
use treelox::lox::{ExitStatus, Lox, STACK_SIZE};

/// Captured result of running one program.
pub struct Outcome {
    pub out: String,
    pub err: String,
    pub status: ExitStatus,
}

/// Run `body` on a thread with the interpreter's stack size.
fn on_lox_thread<F>(body: F) -> Outcome
where
    F: FnOnce() -> Outcome + Send + 'static,
{
    thread::Builder::new()
        .stack_size(STACK_SIZE)
        .spawn(body)
        .expect("spawn interpreter thread")
        .join()
        .expect("interpreter thread panicked")
}

/// Run `source` as a script against an in‑memory host.
pub fn run(source: &str) -> Outcome {
    let source = source.to_owned();
    on_lox_thread(move || run_here(&source))
}

fn run_here(source: &str) -> Outcome {
    let host = Rc::new(RefCell::new(CaptureHost::default()));
    let mut lox = Lox::new(host.clone());

    let status = lox.run_source(source);

    let host = host.borrow();
    Outcome {
        out: host.out.clone(),
        err: host.err.clone(),
        status,
    }
}

/// Run `source` and return its stdout, asserting nothing went to stderr.
pub fn run_ok(source: &str) -> String {
    let outcome = run(source);
    assert_eq!(outcome.err, "", "unexpected diagnostics for:\n{}", source);
    assert_eq!(outcome.status, ExitStatus::Success);
    outcome.out
}

/// Feed `input` to the REPL, one line per `\n`.
pub fn repl(input: &str) -> Outcome {
    let input = input.to_owned();
    on_lox_thread(move || repl_here(&input))
}

fn repl_here(input: &str) -> Outcome {
    let host = Rc::new(RefCell::new(CaptureHost::default()));
    let mut lox = Lox::new(host.clone());

    let status = lox
        .run_prompt(input.as_bytes())
        .expect("in-memory input never fails");

    let host = host.borrow();
    Outcome {
        out: host.out.clone(),
        err: host.err.clone(),
        status,
    }
}
