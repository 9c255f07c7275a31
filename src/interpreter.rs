//! A complete session: one symbol table shared by a reader and an evaluator,
//! and a global environment holding the core forms and the standard library.

use crate::Result;
use crate::ast::Value;
use crate::builtinops;
use crate::environment::Environment;
use crate::evaluator::Evaluator;
use crate::parser::{InputStream, Parser};
use crate::symbol::SymbolTable;

pub struct Interpreter {
    parser: Parser,
    evaluator: Evaluator,
    global: Environment,
    stream: InputStream,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        let symbols = SymbolTable::new();
        let evaluator = Evaluator::new(symbols.clone());
        let global = Environment::create();
        evaluator.install_core(&global);
        builtinops::install(&evaluator, &global);
        Interpreter {
            parser: Parser::new(symbols),
            evaluator,
            global,
            stream: InputStream::new(),
        }
    }

    pub fn symbols(&self) -> &SymbolTable {
        self.evaluator.symbols()
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// The reader, e.g. to register extension factories.
    pub fn parser_mut(&mut self) -> &mut Parser {
        &mut self.parser
    }

    pub fn global(&self) -> &Environment {
        &self.global
    }

    /// Evaluate one value in the global environment.
    pub fn eval(&self, expr: &Value) -> Result<Value> {
        self.evaluator.eval(expr, &self.global)
    }

    /// Read all of `source`, then evaluate each datum in order and return the
    /// last value (nil for empty input).
    ///
    /// Nothing is evaluated if `source` does not read cleanly. Text fed
    /// through [`feed`](Self::feed) but not yet complete is discarded.
    pub fn eval_str(&mut self, source: &str) -> Result<Value> {
        self.reset_reader();
        let exprs = self.parser.parse_all(source);
        if exprs.is_err() {
            self.parser.reset();
        }
        let mut result = Value::Nil;
        for expr in exprs? {
            result = self.eval(&expr)?;
        }
        Ok(result)
    }

    /// Append `text` to the pending input and evaluate every datum it completes.
    ///
    /// A token touching the end of `text` waits for the next feed, since it may
    /// continue there; end lines with `\n` or call [`flush`](Self::flush).
    /// On error the reader is reset, so pending input is dropped; datums
    /// evaluated before the failure keep their effects.
    pub fn feed(&mut self, text: &str) -> Result<Vec<Value>> {
        self.stream.push_str(text);
        self.drain(false)
    }

    /// Declare the end of input: evaluate whatever the pending input still
    /// completes, then fail if a datum remains unfinished.
    pub fn flush(&mut self) -> Result<Vec<Value>> {
        let results = self.drain(true)?;
        if let Err(err) = self.parser.finish(&self.stream) {
            self.reset_reader();
            return Err(err);
        }
        Ok(results)
    }

    fn drain(&mut self, at_end: bool) -> Result<Vec<Value>> {
        let mut results = Vec::new();
        loop {
            let read = if at_end {
                self.parser.parse_final(&mut self.stream)
            } else {
                self.parser.parse(&mut self.stream)
            };
            let expr = match read {
                Ok(Some(expr)) => expr,
                Ok(None) => return Ok(results),
                Err(err) => {
                    self.reset_reader();
                    return Err(err);
                }
            };
            match self.eval(&expr) {
                Ok(value) => results.push(value),
                Err(err) => {
                    self.reset_reader();
                    return Err(err);
                }
            }
        }
    }

    /// True when no datum is partially read.
    pub fn is_clean(&self) -> bool {
        self.parser.clean()
    }

    /// Drop pending input and any reader error.
    pub fn reset_reader(&mut self) {
        self.parser.reset();
        self.stream.clear();
    }
}
