// File: src/errors.rs
//
// Error handling and reporting for the IBTL compiler.
// Provides the structured error type shared by the lexer, parser and
// generator, with source line information and pretty-printed messages.

use colored::Colorize;
use std::fmt;

/// The three fatal error families a compilation unit can die with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lexical,
    Parse,
    Semantic,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::Lexical => write!(f, "lexical error"),
            ErrorKind::Parse => write!(f, "parse error"),
            ErrorKind::Semantic => write!(f, "semantic error"),
        }
    }
}

/// A fatal compiler error carrying the source line it was raised on.
///
/// All three kinds are unrecoverable: the compilation unit aborts at the
/// first error and any partially produced output must be discarded by the
/// caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub kind: ErrorKind,
    pub message: String,
    pub line: usize,
}

impl CompileError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, line: usize) -> Self {
        Self { kind, message: message.into(), line }
    }

    /// Create a lexical error (malformed literal, unrecognized character)
    pub fn lexical(message: impl Into<String>, line: usize) -> Self {
        Self::new(ErrorKind::Lexical, message, line)
    }

    /// Create a parse error; the message names the expected token category
    pub fn parse(message: impl Into<String>, line: usize) -> Self {
        Self::new(ErrorKind::Parse, message, line)
    }

    /// Create a semantic/generation error; the message names the offending
    /// type(s) or identifier
    pub fn semantic(message: impl Into<String>, line: usize) -> Self {
        Self::new(ErrorKind::Semantic, message, line)
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind_str = format!("{}", self.kind);
        writeln!(f, "{}: {}", kind_str.red().bold(), self.message.bold())?;
        write!(f, "{}", format!("  --> line {}", self.line).bright_blue())
    }
}

impl std::error::Error for CompileError {}
