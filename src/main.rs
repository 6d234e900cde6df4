//! Command-line entry point: a REPL when run with no arguments, or a script interpreter when run
//! with one path argument.

use std::io::{self, Write};
use std::process::ExitCode;

use rlox::error::InterpretationError;
use rlox::vm::VM;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    match args.as_slice() {
        [_] => repl(),
        [_, path] => run_file(path),
        [program, ..] => {
            eprintln!("Usage: {program} [path]");
            ExitCode::from(64)
        }
        [] => unreachable!("argv always has at least the program name"),
    }
}

/// Reads a line at a time from stdin and interprets it, forever. A fresh [VM] is used for the
/// whole session, so globals declared on one line are visible on the next.
fn repl() -> ExitCode {
    let mut vm = VM::new();
    let stdin = io::stdin();
    let mut line = String::new();

    loop {
        print!("> ");
        io::stdout().flush().expect("flushing the prompt");

        line.clear();
        let bytes_read = stdin.read_line(&mut line).expect("reading from stdin");
        if bytes_read == 0 {
            println!();
            return ExitCode::SUCCESS;
        }

        // Errors are already reported to stderr by the compiler/VM; the REPL just keeps going.
        let _ = vm.interpret(line.as_bytes());
    }
}

/// Reads the whole file at `path` and interprets it as one program.
fn run_file(path: &str) -> ExitCode {
    let source = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("Could not open file \"{path}\": {err}");
            return ExitCode::from(74);
        }
    };

    let mut vm = VM::new();
    match vm.interpret(&source) {
        Ok(()) => ExitCode::SUCCESS,
        Err(InterpretationError::CompileError) => ExitCode::from(65),
        Err(InterpretationError::RuntimeError) => ExitCode::from(70),
    }
}
