//! Command-line driver for the spinel interpreter.
//!
//! Exit codes: 0 on success, 1 on an uncaught runtime error, 2 on a
//! lex/parse/compile error.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use spinel::{Diagnostic, Error, Interpreter};

#[derive(Parser)]
#[command(name = "spinel", version, about = "The spinel scripting language")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Evaluate source passed on the command line.
    #[arg(short = 'e', value_name = "SOURCE", conflicts_with = "command")]
    eval: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a source file.
    Run { file: PathBuf },
    /// Compile a source file and print the bytecode textual form.
    Compile { file: PathBuf },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let code = match (cli.command, cli.eval) {
        (Some(Command::Run { file }), _) => match read_source(&file) {
            Ok(source) => run_source(&source),
            Err(code) => code,
        },
        (Some(Command::Compile { file }), _) => match read_source(&file) {
            Ok(source) => compile_source(&source),
            Err(code) => code,
        },
        (None, Some(source)) => run_source(&source),
        (None, None) => {
            eprintln!("usage: spinel <run|compile> <file>, or spinel -e <source>");
            2
        }
    };
    ExitCode::from(code)
}

fn read_source(path: &PathBuf) -> Result<String, u8> {
    fs::read_to_string(path).map_err(|err| {
        eprintln!("spinel: cannot read {}: {err}", path.display());
        1
    })
}

fn run_source(source: &str) -> u8 {
    let mut interpreter = Interpreter::new();
    interpreter.echo_output(true);
    match interpreter.run(source) {
        Ok(_) => 0,
        Err(err) => report(source, &err),
    }
}

fn compile_source(source: &str) -> u8 {
    match Interpreter::new().compile(source) {
        Ok(text) => {
            print!("{text}");
            0
        }
        Err(err) => report(source, &err),
    }
}

/// Compile-phase errors render with a source snippet; runtime errors
/// print their message and backtrace.
fn report(source: &str, err: &Error) -> u8 {
    match Diagnostic::from_error(source, err) {
        Some(diagnostic) => eprint!("{diagnostic}"),
        None => eprintln!("{err}"),
    }
    err.exit_code() as u8
}
