//! Embeddable NScript interpreter: a small expression-oriented scripting
//! language evaluated directly while parsing, with no syntax tree. Hosts
//! create an [`Interpreter`], [`bind`](Interpreter::bind) values or custom
//! [`Object`] implementations, and [`eval`](Interpreter::eval) scripts.

pub mod context;
pub mod diagnostics;
pub mod lexer;
pub mod object;
pub mod operators;
pub mod repl;
pub mod runtime;
pub mod stdlib;
pub mod value;

pub use diagnostics::{Diagnostic, ErrorKind, NScriptError, SourceSpan};
pub use object::{Object, ObjectRef};
pub use repl::Repl;
pub use runtime::{EvalConfig, Interpreter};
pub use value::Value;
