use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use tamarin_vm::{compile, interpret, InterpretResult, LoxFunction, Obj, Value, Vm};

#[derive(Parser, Debug)]
#[command(name = "tamarin", version, about = "A clox-style bytecode interpreter")]
struct Cli {
    /// Script to compile and run. Omit to start the REPL.
    script: Option<PathBuf>,

    /// Print the disassembled bytecode for every compiled chunk instead of
    /// suppressing it.
    #[arg(long)]
    disassemble: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.script {
        Some(path) => run_file(&path, cli.disassemble),
        None => {
            run_repl(cli.disassemble);
            ExitCode::from(0)
        }
    }
}

fn run_file(path: &PathBuf, disassemble: bool) -> ExitCode {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("tamarin: cannot read '{}': {e}", path.display());
            return ExitCode::from(74);
        }
    };

    if disassemble {
        match compile(&source) {
            Ok(function) => print_disassembly(&function),
            Err(_) => return ExitCode::from(65),
        }
    }

    let mut vm = Vm::new();
    match interpret(&mut vm, &source) {
        InterpretResult::Ok => ExitCode::from(0),
        InterpretResult::CompileError => ExitCode::from(65),
        InterpretResult::RuntimeError => ExitCode::from(70),
    }
}

fn run_repl(disassemble: bool) {
    println!("tamarin {} — Ctrl-D to exit", env!("CARGO_PKG_VERSION"));
    let mut vm = Vm::new();
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("tamarin: cannot start line editor: {e}");
            return;
        }
    };

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());
                run_repl_line(&mut vm, &line, disassemble);
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("tamarin: {e}");
                break;
            }
        }
    }
}

/// Echoes the value of a bare expression statement, matching the REPL
/// ergonomics clox's own `main.c` provides: `1 + 2` prints `3` without
/// requiring an explicit `print`.
fn run_repl_line(vm: &mut Vm, line: &str, disassemble: bool) {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return;
    }

    let without_semicolon = trimmed.trim_end_matches(';');
    let as_expression = format!("print {without_semicolon};");
    let source = if compile(&as_expression).is_ok() { as_expression } else { trimmed.to_string() };

    if disassemble {
        if let Ok(function) = compile(&source) {
            print_disassembly(&function);
        }
    }

    interpret(vm, &source);
}

fn print_disassembly(function: &LoxFunction) {
    let name = function.name.as_deref().unwrap_or("script");
    print!("{}", tamarin_vm::disassemble_chunk(&function.chunk, name));
    for constant in function.chunk.constants() {
        if let Value::Object(Obj::Function(nested)) = constant {
            print_disassembly(nested);
        }
    }
}
