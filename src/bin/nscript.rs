use std::{fs, path::PathBuf, time::Duration};

use clap::{Parser, Subcommand};

use nscript::{EvalConfig, Interpreter, NScriptError, Repl};

#[derive(Parser)]
#[command(author, version, about = "NScript language interpreter")]
struct Args {
    /// Abort loops after this many iterations
    #[arg(long, global = true)]
    loop_limit: Option<u64>,
    /// Abort loops after this many milliseconds
    #[arg(long, global = true)]
    loop_timeout_ms: Option<u64>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run an NScript file
    Run { script: PathBuf },
    /// Start an interactive session
    Repl,
    /// Evaluate a snippet of NScript code
    Eval { source: String },
}

fn main() -> Result<(), NScriptError> {
    let args = Args::parse();
    let config = EvalConfig {
        loop_limit: args.loop_limit,
        loop_timeout: args.loop_timeout_ms.map(Duration::from_millis),
    };
    let outcome = match args.command.unwrap_or(Command::Repl) {
        Command::Run { script } => {
            let source = fs::read_to_string(&script)?;
            evaluate(&source, config)
        }
        Command::Repl => return Repl::with_config(config).run(),
        Command::Eval { source } => evaluate(&source, config),
    };
    if let Err(NScriptError::Diagnostic(diag)) = &outcome {
        nscript::repl::report(diag);
        std::process::exit(1);
    }
    outcome
}

fn evaluate(source: &str, config: EvalConfig) -> Result<(), NScriptError> {
    let mut interpreter = Interpreter::with_config(config);
    let value = interpreter.eval(source)?;
    if !value.is_empty() {
        println!("{value}");
    }
    Ok(())
}
