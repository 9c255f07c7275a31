//! sexpr - a small Lisp runtime core
//!
//! This crate reads s-expression text into an immutable, reference-counted value
//! graph, evaluates that graph against lexically scoped environments, and prints
//! values back as text.
//!
//! ```scheme
//! (define square (lambda (x) (* x x)))
//! (square 5)                     ; 25
//! `(1 ,(+ 1 1) ,@(list 3 4))     ; (1 2 3 4)
//! ```
//!
//! ## Modules
//!
//! - `ast`: the [`Value`](ast::Value) sum type and list helpers
//! - `symbol`: symbol interning
//! - `environment`: scope frames with deep and shallow lookup
//! - `parser`: the incremental reader
//! - `quote`: quote tokens and quasiquote expansion
//! - `evaluator`: the evaluation rule plus `lambda` and `macro`
//! - `printer`: textual output in display and inspect styles
//! - `builtinops`: the standard library of host procedures
//! - `interpreter`: a session bundling all of the above

use thiserror::Error;

/// Categorizes the different kinds of reader failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// A `)` with no open list to close
    RedundantParen,
    /// Input finished inside a string literal
    UnterminatedString,
    /// Input finished with at least one list still open
    UnterminatedList,
    /// Input finished after a quote prefix with nothing to quote
    DanglingQuote,
    /// Text that starts no token
    Unreadable,
}

/// A reader failure with the byte offset in the stream where it was detected.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} (at offset {offset})")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub offset: usize,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>, offset: usize) -> Self {
        ParseError {
            kind,
            message: message.into(),
            offset,
        }
    }
}

/// Evaluation failures. Offending values are carried in printed form.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("not a proc: {0}")]
    NotAProcedure(String),
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),
    #[error("cannot update unbound variable: {0}")]
    UnboundUpdate(String),
    #[error("{command}: expected {expected} arguments, got {got}")]
    Arity {
        command: String,
        expected: String,
        got: usize,
    },
    #[error("{command}: bad parameter {found}")]
    BadParameter { command: String, found: String },
    #[error("{command}: expected {expected}, got {found}")]
    Type {
        command: String,
        expected: &'static str,
        found: String,
    },
    #[error("{0}")]
    Raised(String),
}

/// Error type for the runtime
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),
    #[error("Evaluation error: {0}")]
    EvalError(#[from] EvalError),
}

impl Error {
    /// Build an arity error for `command`.
    pub fn arity(command: &str, expected: impl ToString, got: usize) -> Self {
        Error::EvalError(EvalError::Arity {
            command: command.to_string(),
            expected: expected.to_string(),
            got,
        })
    }

    /// Build a type error for `command`, printing the offending value.
    pub fn type_error(command: &str, expected: &'static str, found: &ast::Value) -> Self {
        Error::EvalError(EvalError::Type {
            command: command.to_string(),
            expected,
            found: found.to_string(),
        })
    }

    pub fn is_parse_error(&self) -> bool {
        matches!(self, Error::ParseError(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub mod ast;
pub mod builtinops;
pub mod environment;
pub mod evaluator;
pub mod interpreter;
pub mod parser;
pub mod printer;
pub mod quote;
pub mod symbol;

pub use ast::Value;
pub use environment::Environment;
pub use evaluator::Evaluator;
pub use interpreter::Interpreter;
pub use parser::{InputStream, Parser};
pub use printer::Style;
pub use symbol::{Symbol, SymbolTable};
