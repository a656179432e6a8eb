use rustyline::{error::ReadlineError, DefaultEditor};

use crate::{
    diagnostics::{Diagnostic, NScriptError, Result},
    runtime::{EvalConfig, Interpreter},
};

pub struct Repl {
    interpreter: Interpreter,
}

impl Repl {
    pub fn new() -> Self {
        Self::with_config(EvalConfig::default())
    }

    pub fn with_config(config: EvalConfig) -> Self {
        Self {
            interpreter: Interpreter::with_config(config),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut editor = DefaultEditor::new()
            .map_err(|err| NScriptError::from(std::io::Error::other(err)))?;
        loop {
            match editor.readline(">> ") {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed == ":quit" || trimmed == ":exit" {
                        break;
                    }
                    if trimmed.is_empty() {
                        continue;
                    }
                    editor.add_history_entry(trimmed).ok();
                    match self.interpreter.eval(trimmed) {
                        Ok(value) => {
                            if !value.is_empty() {
                                println!("{value}");
                            }
                        }
                        Err(NScriptError::Diagnostic(diag)) => report(&diag),
                        Err(other) => eprintln!("error: {other}"),
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => {
                    return Err(NScriptError::from(std::io::Error::other(err)));
                }
            }
        }
        Ok(())
    }
}

impl Default for Repl {
    fn default() -> Self {
        Self::new()
    }
}

/// Prints the offending line with a caret under the failure position.
pub fn report(diag: &Diagnostic) {
    if let (Some(content), Some(offset)) = (&diag.content, diag.offset()) {
        let offset = offset.min(content.len());
        let start = content[..offset].rfind('\n').map_or(0, |i| i + 1);
        let end = content[offset..]
            .find('\n')
            .map_or(content.len(), |i| offset + i);
        eprintln!("  {}", &content[start..end]);
        let column = content[start..offset].chars().count();
        eprintln!("  {}^", " ".repeat(column));
    }
    eprintln!("{}: {}", diag.kind, diag.message);
}
