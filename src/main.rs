use std::cell::RefCell;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::thread;

use anyhow::{anyhow, Context, Result};
use clap::Parser as ClapParser;
use env_logger::Builder;
use log::info;

use treelox::host::{SharedHost, StdHost};
use treelox::lox::{ExitStatus, Lox, STACK_SIZE};

#[derive(ClapParser, Debug)]
#[command(version, about = "Tree-walking Lox interpreter", long_about = None)]
pub struct Cli {
    /// Script to run; starts the REPL when omitted
    scripts: Vec<PathBuf>,

    /// Enable logging to app.log
    #[arg(long)]
    log: bool,

    /// Print the script's tokens instead of running it
    #[arg(long, conflicts_with = "ast")]
    tokens: bool,

    /// Print tokens as JSON objects
    #[arg(long, requires = "tokens")]
    json: bool,

    /// Print the script's syntax tree instead of running it
    #[arg(long)]
    ast: bool,
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    // `[module:line] - message`, crate prefix stripped
    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("treelox::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug)
        .parse_default_env()
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

fn read_script(path: &Path) -> Result<String> {
    info!("Reading file: {:?}", path);

    std::fs::read_to_string(path).context(format!("Failed to read file {:?}", path))
}

fn run(args: Cli) -> Result<ExitStatus> {
    let host: SharedHost = Rc::new(RefCell::new(StdHost));
    let mut lox = Lox::new(host.clone());

    if args.scripts.len() > 1 {
        host.borrow_mut().out_line("Usage: treelox [script]");
        return Ok(ExitStatus::Usage);
    }

    let Some(script) = args.scripts.first() else {
        info!("No script given, starting REPL");
        return Ok(lox.run_prompt(io::stdin().lock())?);
    };

    if args.tokens {
        let source = read_script(script)?;
        return Ok(lox.dump_tokens(&source, args.json)?);
    }

    if args.ast {
        let source = read_script(script)?;
        lox.print_ast(&source);
        return Ok(lox.status());
    }

    let status = lox
        .run_file(script)
        .context(format!("Failed to run file {:?}", script))?;

    Ok(status)
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    if args.log {
        init_logger()?;
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    // Lox calls recurse on the native stack.
    let status: ExitStatus = thread::Builder::new()
        .name("treelox".into())
        .stack_size(STACK_SIZE)
        .spawn(move || run(args))
        .context("Failed to spawn interpreter thread")?
        .join()
        .map_err(|_| anyhow!("Interpreter thread panicked"))??;

    info!("Exiting with {:?}", status);

    std::process::exit(status.code());
}
