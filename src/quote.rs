//! Quote forms.
//!
//! The four prefix tokens `'`, `` ` ``, `,` and `,@` are sugar for calls to the
//! reserved symbols `quote`, `quasiquote`, `unquote` and `unquote-splicing`. The
//! reader maps tokens to symbols, the printer maps them back, and the evaluator
//! runs quasiquote templates through [`quasiquote`].

use crate::{Error, Result};
use crate::ast::Value;
use crate::environment::Environment;
use crate::evaluator::Evaluator;
use crate::symbol::{Symbol, SymbolTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteKind {
    Quote,
    Quasiquote,
    Unquote,
    UnquoteSplicing,
}

impl QuoteKind {
    pub const ALL: [QuoteKind; 4] = [
        QuoteKind::Quote,
        QuoteKind::Quasiquote,
        QuoteKind::Unquote,
        QuoteKind::UnquoteSplicing,
    ];

    /// The surface prefix token.
    pub fn token(self) -> &'static str {
        match self {
            QuoteKind::Quote => "'",
            QuoteKind::Quasiquote => "`",
            QuoteKind::Unquote => ",",
            QuoteKind::UnquoteSplicing => ",@",
        }
    }

    /// The reserved symbol name.
    pub fn symbol_name(self) -> &'static str {
        match self {
            QuoteKind::Quote => "quote",
            QuoteKind::Quasiquote => "quasiquote",
            QuoteKind::Unquote => "unquote",
            QuoteKind::UnquoteSplicing => "unquote-splicing",
        }
    }

    pub fn from_token(token: &str) -> Option<QuoteKind> {
        Self::ALL.into_iter().find(|kind| kind.token() == token)
    }

    pub fn from_symbol_name(name: &str) -> Option<QuoteKind> {
        Self::ALL.into_iter().find(|kind| kind.symbol_name() == name)
    }

    /// If `value` is a two-element list `(quote-symbol datum)`, its kind and datum.
    pub fn match_form(value: &Value) -> Option<(QuoteKind, &Value)> {
        let pair = value.as_pair()?;
        let kind = QuoteKind::from_symbol_name(pair.head().as_symbol()?.name())?;
        let rest = pair.tail().as_pair()?;
        if rest.tail().is_nil() {
            Some((kind, rest.head()))
        } else {
            None
        }
    }
}

/// The reserved quote symbols, interned in one table.
#[derive(Debug, Clone)]
pub struct QuoteSymbols {
    pub quote: Symbol,
    pub quasiquote: Symbol,
    pub unquote: Symbol,
    pub unquote_splicing: Symbol,
}

impl QuoteSymbols {
    pub fn new(symbols: &SymbolTable) -> Self {
        QuoteSymbols {
            quote: symbols.intern(QuoteKind::Quote.symbol_name()),
            quasiquote: symbols.intern(QuoteKind::Quasiquote.symbol_name()),
            unquote: symbols.intern(QuoteKind::Unquote.symbol_name()),
            unquote_splicing: symbols.intern(QuoteKind::UnquoteSplicing.symbol_name()),
        }
    }

    pub fn get(&self, kind: QuoteKind) -> &Symbol {
        match kind {
            QuoteKind::Quote => &self.quote,
            QuoteKind::Quasiquote => &self.quasiquote,
            QuoteKind::Unquote => &self.unquote,
            QuoteKind::UnquoteSplicing => &self.unquote_splicing,
        }
    }

    /// `(quote-symbol datum)`
    pub fn wrap(&self, kind: QuoteKind, datum: Value) -> Value {
        Value::list(&[Value::Symbol(self.get(kind).clone()), datum])
    }
}

/// Expand a quasiquote template in `env`.
///
/// A template that is an `(unquote x)` form evaluates `x`; any other non-list
/// template is returned as is.
pub fn quasiquote(evaluator: &Evaluator, template: &Value, env: &Environment) -> Result<Value> {
    let symbols = evaluator.quote_symbols();
    if template.is_form(&symbols.unquote) {
        return evaluator.eval(&form_argument(QuoteKind::Unquote, template)?, env);
    }
    if !template.is_list() {
        return Ok(template.clone());
    }
    expand_list(evaluator, template, env)
}

fn expand_list(evaluator: &Evaluator, template: &Value, env: &Environment) -> Result<Value> {
    let symbols = evaluator.quote_symbols();
    let mut items = Vec::new();
    for element in template.iter() {
        if !matches!(element, Value::Pair(_)) {
            items.push(element);
        } else if element.is_form(&symbols.quote) {
            items.push(element);
        } else if element.is_form(&symbols.unquote) {
            let argument = form_argument(QuoteKind::Unquote, &element)?;
            items.push(evaluator.eval(&argument, env)?);
        } else if element.is_form(&symbols.unquote_splicing) {
            let argument = form_argument(QuoteKind::UnquoteSplicing, &element)?;
            let spliced = evaluator.eval(&argument, env)?;
            if spliced.is_list() {
                items.extend(spliced.iter());
            } else {
                items.push(spliced);
            }
        } else {
            items.push(expand_list(evaluator, &element, env)?);
        }
    }
    tracing::trace!(elements = items.len(), "quasiquote expanded");
    Ok(Value::list(&items))
}

/// The single argument of an `(unquote x)` or `(unquote-splicing x)` form.
fn form_argument(kind: QuoteKind, form: &Value) -> Result<Value> {
    let args = form.tail().cloned().unwrap_or(Value::Nil);
    match args.len() {
        1 => Ok(args.head().cloned().unwrap_or(Value::Nil)),
        n => Err(Error::arity(kind.symbol_name(), 1, n)),
    }
}
