use std::fmt;

use thiserror::Error;

/// Represents a byte span within a script source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Closed set of error codes surfaced to embedding hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    RuntimeError,
    UnexpectedEof,
    MissingCharacter,
    UnknownVar,
    MissingLval,
    SyntaxError,
    BadParamCount,
    TypeMismatch,
    ValueTooLarge,
    OperationNotSupported,
    TooManyIterations,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::RuntimeError => "runtime error",
            ErrorKind::UnexpectedEof => "unexpected end",
            ErrorKind::MissingCharacter => "missing character",
            ErrorKind::UnknownVar => "unknown variable",
            ErrorKind::MissingLval => "missing variable",
            ErrorKind::SyntaxError => "syntax error",
            ErrorKind::BadParamCount => "bad parameters count",
            ErrorKind::TypeMismatch => "type mismatch",
            ErrorKind::ValueTooLarge => "value too large",
            ErrorKind::OperationNotSupported => "operation not supported",
            ErrorKind::TooManyIterations => "too many iterations",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rich diagnostic information surfaced to end users. `content` carries the
/// evaluated source text so hosts can render a caret at `span.start`.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Option<SourceSpan>,
    pub content: Option<String>,
}

impl Diagnostic {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            span: None,
            content: None,
        }
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Byte offset of the failure within `content`, when known.
    pub fn offset(&self) -> Option<usize> {
        self.span.map(|span| span.start)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(span) = self.span {
            write!(f, " (at offset {})", span.start)?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

/// Unified error type for the NScript engine and tooling.
#[derive(Debug, Error)]
pub enum NScriptError {
    #[error("{0}")]
    Diagnostic(#[from] Diagnostic),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NScriptError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            NScriptError::Diagnostic(diag) => Some(diag.kind),
            NScriptError::Io(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, NScriptError>;

pub(crate) fn error(kind: ErrorKind, message: impl Into<String>) -> NScriptError {
    NScriptError::Diagnostic(Diagnostic::new(kind, message))
}
