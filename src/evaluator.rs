//! The evaluation rule.
//!
//! Evaluation is a direct walk over the value graph:
//!
//! - nil evaluates to itself
//! - a pair `(f a ...)` evaluates `f`, which must yield a procedure, and calls it
//!   with the *unevaluated* arguments and the current environment
//! - the reserved symbol `quote` evaluates to a built-in procedure returning its
//!   argument unevaluated; any other symbol is looked up through the scope chain
//! - everything else evaluates to itself
//!
//! Because procedures receive their arguments unevaluated, special forms need no
//! support from the evaluator beyond this rule. `lambda` and `macro` are built here.

use crate::ast::Value;
use crate::environment::Environment;
use crate::quote::{self, QuoteKind, QuoteSymbols};
use crate::symbol::{Symbol, SymbolTable};
use crate::{Error, EvalError, Result};
use std::rc::Rc;

/// Prefix marking a rest parameter in a formal parameter list.
pub const VARIADIC_PREFIX: char = '*';

/// Evaluates values against environments. Holds the session's symbol table so
/// reserved words are recognised by identity.
pub struct Evaluator {
    symbols: SymbolTable,
    quotes: QuoteSymbols,
    quote_proc: Value,
    t: Symbol,
}

impl Evaluator {
    pub fn new(symbols: SymbolTable) -> Self {
        let quotes = QuoteSymbols::new(&symbols);
        let t = symbols.intern("t");
        Evaluator {
            symbols,
            quotes,
            quote_proc: Value::procedure("quote", eval_quote),
            t,
        }
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn quote_symbols(&self) -> &QuoteSymbols {
        &self.quotes
    }

    pub fn intern(&self, name: &str) -> Symbol {
        self.symbols.intern(name)
    }

    /// The canonical true value `t`, or nil.
    pub fn truth(&self, condition: bool) -> Value {
        if condition {
            Value::Symbol(self.t.clone())
        } else {
            Value::Nil
        }
    }

    /// Evaluate `expr` in `env`.
    pub fn eval(&self, expr: &Value, env: &Environment) -> Result<Value> {
        match expr {
            Value::Nil => Ok(Value::Nil),

            Value::Pair(pair) => {
                let head = self.eval(pair.head(), env)?;
                match &head {
                    Value::Procedure(procedure) => {
                        tracing::trace!(procedure = procedure.name(), "apply");
                        procedure.call(self, pair.tail(), env)
                    }
                    _ => Err(EvalError::NotAProcedure(head.to_string()).into()),
                }
            }

            Value::Symbol(symbol) if *symbol == self.quotes.quote => Ok(self.quote_proc.clone()),

            Value::Symbol(symbol) => env
                .deep_lookup(symbol.name())
                .ok_or_else(|| EvalError::UnknownSymbol(symbol.name().to_string()).into()),

            // Self-evaluating forms
            Value::Procedure(_) | Value::Number(_) | Value::String(_) | Value::Extension(_) => {
                Ok(expr.clone())
            }
        }
    }

    /// Evaluate each form of `body` in order, returning the last value (nil if empty).
    pub fn eval_sequence(&self, body: &Value, env: &Environment) -> Result<Value> {
        let mut result = Value::Nil;
        for form in body.iter() {
            result = self.eval(&form, env)?;
        }
        Ok(result)
    }

    /// Evaluate every element of an argument list.
    pub fn eval_args(&self, args: &Value, env: &Environment) -> Result<Vec<Value>> {
        args.iter().map(|arg| self.eval(&arg, env)).collect()
    }

    /// Call `procedure` with already evaluated `values`.
    ///
    /// Each value is passed as `(quote value)`, so a procedure that evaluates its
    /// arguments gets them back unchanged.
    pub fn apply(&self, procedure: &Value, values: &[Value], env: &Environment) -> Result<Value> {
        let Value::Procedure(callee) = procedure else {
            return Err(EvalError::NotAProcedure(procedure.to_string()).into());
        };
        let quoted: Vec<Value> = values
            .iter()
            .map(|value| self.quotes.wrap(QuoteKind::Quote, value.clone()))
            .collect();
        callee.call(self, &Value::list(&quoted), env)
    }

    /// Bind the core special forms `lambda`, `macro` and `quasiquote` in `env`.
    pub fn install_core(&self, env: &Environment) {
        env.set("lambda", Value::procedure("lambda", eval_lambda));
        env.set("macro", Value::procedure("macro", eval_macro));
        env.set(
            QuoteKind::Quasiquote.symbol_name(),
            Value::procedure("quasiquote", eval_quasiquote),
        );
        tracing::debug!(depth = env.depth(), "installed core forms");
    }
}

/// The built-in behind the reserved `quote` symbol.
fn eval_quote(_evaluator: &Evaluator, args: &Value, _env: &Environment) -> Result<Value> {
    match args.to_vec().as_slice() {
        [datum] => Ok(datum.clone()),
        other => Err(Error::arity("quote", 1, other.len())),
    }
}

fn eval_quasiquote(evaluator: &Evaluator, args: &Value, env: &Environment) -> Result<Value> {
    match args.to_vec().as_slice() {
        [template] => quote::quasiquote(evaluator, template, env),
        other => Err(Error::arity("quasiquote", 1, other.len())),
    }
}

/// A validated formal parameter list.
#[derive(Debug, Clone, PartialEq)]
pub struct Formals {
    fixed: Vec<Rc<str>>,
    rest: Option<Rc<str>>,
}

impl Formals {
    /// Validate a formal parameter list: all symbols, with at most one trailing
    /// `*name` rest parameter.
    pub fn parse(command: &str, params: &Value) -> Result<Formals> {
        if !params.is_list() {
            return Err(bad_parameter(command, params));
        }
        let mut fixed: Vec<Rc<str>> = Vec::new();
        let mut rest = None;
        for param in params.iter() {
            let Some(symbol) = param.as_symbol() else {
                return Err(bad_parameter(command, &param));
            };
            if rest.is_some() {
                // Something follows the rest parameter
                return Err(bad_parameter(command, &param));
            }
            let name = symbol.name();
            let bound: Rc<str> = match name.strip_prefix(VARIADIC_PREFIX) {
                Some(stripped) if !stripped.is_empty() => Rc::from(stripped),
                _ => symbol.name_rc(),
            };
            if fixed.contains(&bound) {
                return Err(bad_parameter(command, &param));
            }
            if bound.len() < name.len() {
                rest = Some(bound);
            } else {
                fixed.push(bound);
            }
        }
        Ok(Formals { fixed, rest })
    }

    pub fn fixed(&self) -> &[Rc<str>] {
        &self.fixed
    }

    pub fn rest(&self) -> Option<&str> {
        self.rest.as_deref()
    }

    fn expected(&self) -> String {
        match self.rest {
            Some(_) => format!("at least {}", self.fixed.len()),
            None => self.fixed.len().to_string(),
        }
    }

    /// Bind `args` into `frame`. With `evaluate` set, each argument is first
    /// evaluated in `caller`.
    fn bind(
        &self,
        evaluator: &Evaluator,
        command: &str,
        args: &Value,
        caller: &Environment,
        frame: &Environment,
        evaluate: bool,
    ) -> Result<()> {
        let supplied = args.len();
        let mut remaining = args.iter();
        for name in &self.fixed {
            let Some(arg) = remaining.next() else {
                return Err(Error::arity(command, self.expected(), supplied));
            };
            let value = if evaluate {
                evaluator.eval(&arg, caller)?
            } else {
                arg
            };
            frame.set(Rc::clone(name), value);
        }
        match &self.rest {
            Some(name) => {
                let rest: Vec<Value> = if evaluate {
                    remaining
                        .map(|arg| evaluator.eval(&arg, caller))
                        .collect::<Result<_>>()?
                } else {
                    remaining.collect()
                };
                frame.set(Rc::clone(name), Value::list(&rest));
            }
            None => {
                if remaining.next().is_some() {
                    return Err(Error::arity(command, self.expected(), supplied));
                }
            }
        }
        Ok(())
    }
}

fn bad_parameter(command: &str, found: &Value) -> Error {
    Error::EvalError(EvalError::BadParameter {
        command: command.to_string(),
        found: found.to_string(),
    })
}

/// Split `(formals body...)`.
fn closure_parts(command: &str, args: &Value) -> Result<(Formals, Value)> {
    let Some(pair) = args.as_pair() else {
        return Err(Error::arity(command, "at least 1", 0));
    };
    let formals = Formals::parse(command, pair.head())?;
    Ok((formals, pair.tail().clone()))
}

/// `(lambda (formals...) body...)`: a closure over the defining environment.
///
/// On call, each argument is evaluated in the caller's environment and bound
/// in a fresh frame derived from the captured one; the body forms are then
/// evaluated in order and the last value returned.
pub fn eval_lambda(_evaluator: &Evaluator, args: &Value, env: &Environment) -> Result<Value> {
    let (formals, body) = closure_parts("lambda", args)?;
    let captured = env.clone();
    Ok(Value::procedure(
        "lambda",
        move |evaluator: &Evaluator, args: &Value, caller: &Environment| {
            let frame = captured.derive();
            formals.bind(evaluator, "lambda", args, caller, &frame, true)?;
            evaluator.eval_sequence(&body, &frame)
        },
    ))
}

/// `(macro (formals...) body...)`: arguments are bound unevaluated in a frame
/// derived from the call site, the body produces an expansion, and the
/// expansion is evaluated in the caller's environment.
///
/// Macros are unhygienic: the body sees the caller's bindings, not those of
/// the defining scope.
pub fn eval_macro(_evaluator: &Evaluator, args: &Value, _env: &Environment) -> Result<Value> {
    let (formals, body) = closure_parts("macro", args)?;
    Ok(Value::procedure(
        "macro",
        move |evaluator: &Evaluator, args: &Value, caller: &Environment| {
            let frame = caller.derive();
            formals.bind(evaluator, "macro", args, caller, &frame, false)?;
            let expansion = evaluator.eval_sequence(&body, &frame)?;
            tracing::debug!(expansion = %expansion, "macro expanded");
            evaluator.eval(&expansion, caller)
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::Interpreter;
    use crate::parser::Parser;
    use pretty_assertions::assert_eq;

    /// An evaluator with only the core forms installed.
    fn core() -> (Parser, Evaluator, Environment) {
        let symbols = SymbolTable::new();
        let evaluator = Evaluator::new(symbols.clone());
        let env = Environment::create();
        evaluator.install_core(&env);
        (Parser::new(symbols), evaluator, env)
    }

    fn eval_core(source: &str) -> Result<Value> {
        let (mut parser, evaluator, env) = core();
        let mut result = Value::Nil;
        for expr in parser.parse_all(source)? {
            result = evaluator.eval(&expr, &env)?;
        }
        Ok(result)
    }

    fn eval_string(source: &str) -> Result<Value> {
        Interpreter::new().eval_str(source)
    }

    #[test]
    fn test_self_evaluating() {
        assert_eq!(eval_core("42").unwrap(), Value::Number(42.0));
        assert_eq!(eval_core("\"hello\"").unwrap(), Value::from("hello"));
        assert_eq!(eval_core("()").unwrap(), Value::Nil);
    }

    #[test]
    fn test_procedures_evaluate_to_themselves() {
        let (_, evaluator, env) = core();
        let procedure = Value::procedure("id", |_, args, _| Ok(args.clone()));
        let result = evaluator.eval(&procedure, &env).unwrap();
        assert!(result.is_eq(&procedure));
    }

    #[test]
    fn test_quote_suppresses_one_level() {
        let (mut parser, evaluator, env) = core();
        let expr = parser.parse_all("(quote (quote x))").unwrap().remove(0);
        let once = evaluator.eval(&expr, &env).unwrap();
        assert_eq!(once.to_string(), "'x");
        let twice = evaluator.eval(&once, &env).unwrap();
        assert_eq!(twice.to_string(), "x");
        assert!(twice.as_symbol().is_some());
    }

    #[test]
    fn test_quote_needs_no_binding() {
        let (_, evaluator, env) = core();
        assert!(env.deep_lookup("quote").is_none());
        let quote = Value::Symbol(evaluator.intern("quote"));
        assert_eq!(
            evaluator.eval(&quote, &env).unwrap().to_string(),
            "#<procedure quote>"
        );
        assert!(matches!(
            eval_core("(quote)"),
            Err(Error::EvalError(EvalError::Arity { .. }))
        ));
    }

    #[test]
    fn test_unknown_symbol() {
        assert_eq!(
            eval_core("undefined-name").unwrap_err(),
            Error::EvalError(EvalError::UnknownSymbol("undefined-name".to_string()))
        );
    }

    #[test]
    fn test_not_a_procedure() {
        assert_eq!(
            eval_core("(1 2 3)").unwrap_err(),
            Error::EvalError(EvalError::NotAProcedure("1".to_string()))
        );
        assert_eq!(
            eval_core("(\"f\")").unwrap_err(),
            Error::EvalError(EvalError::NotAProcedure("\"f\"".to_string()))
        );
    }

    #[test]
    fn test_lambda_application() {
        assert_eq!(eval_core("((lambda (x) x) 7)").unwrap(), Value::Number(7.0));
        assert_eq!(
            eval_core("((lambda (a b) b) 1 '(2 3))").unwrap().to_string(),
            "(2 3)"
        );
        assert_eq!(eval_core("((lambda ()))").unwrap(), Value::Nil);
    }

    #[test]
    fn test_lambda_body_is_a_sequence() {
        assert_eq!(eval_core("((lambda (x) 1 2 x) 3)").unwrap(), Value::Number(3.0));
        assert_eq!(
            eval_string("((lambda (x) (define y (+ x 1)) (* y 2)) 4)").unwrap(),
            Value::Number(10.0)
        );
    }

    #[test]
    fn test_lambda_arity() {
        assert_eq!(
            eval_core("((lambda (a b) a) 1)").unwrap_err(),
            Error::arity("lambda", 2, 1)
        );
        assert_eq!(
            eval_core("((lambda (a) a) 1 2)").unwrap_err(),
            Error::arity("lambda", 1, 2)
        );
        assert_eq!(
            eval_core("((lambda (a *rest) a))").unwrap_err(),
            Error::arity("lambda", "at least 1", 0)
        );
    }

    #[test]
    fn test_variadic_parameter() {
        assert_eq!(
            eval_string("((lambda (a *rest) rest) 1 (+ 1 1) 3)")
                .unwrap()
                .to_string(),
            "(2 3)"
        );
        assert_eq!(eval_core("((lambda (a *rest) rest) 1)").unwrap(), Value::Nil);
        assert_eq!(
            eval_core("((lambda (*all) all) 'a 'b)").unwrap().to_string(),
            "(a b)"
        );
    }

    #[test]
    fn test_bad_formals() {
        assert!(matches!(
            eval_core("(lambda (a 1) a)"),
            Err(Error::EvalError(EvalError::BadParameter { .. }))
        ));
        assert!(matches!(
            eval_core("(lambda (*rest a) a)"),
            Err(Error::EvalError(EvalError::BadParameter { .. }))
        ));
        assert!(matches!(
            eval_core("(lambda x x)"),
            Err(Error::EvalError(EvalError::BadParameter { .. }))
        ));
        assert!(matches!(
            eval_core("(macro (a a) a)"),
            Err(Error::EvalError(EvalError::BadParameter { .. }))
        ));
        assert_eq!(eval_core("(lambda)").unwrap_err(), Error::arity("lambda", "at least 1", 0));
    }

    #[test]
    fn test_formals_parse() {
        let table = SymbolTable::new();
        let mut parser = Parser::new(table);
        let params = parser.parse_all("(a b *more)").unwrap().remove(0);
        let formals = Formals::parse("lambda", &params).unwrap();
        assert_eq!(formals.fixed().len(), 2);
        assert_eq!(formals.rest(), Some("more"));

        // A bare `*` is an ordinary name
        let params = parser.parse_all("(*)").unwrap().remove(0);
        let formals = Formals::parse("lambda", &params).unwrap();
        assert_eq!(formals.fixed().len(), 1);
        assert_eq!(formals.rest(), None);
    }

    #[test]
    fn test_closure_captures_defining_environment() {
        let source = "
            (define make-adder (lambda (n) (lambda (x) (+ x n))))
            (define add5 (make-adder 5))
            (define n 100)
            (add5 1)";
        assert_eq!(eval_string(source).unwrap(), Value::Number(6.0));
    }

    #[test]
    fn test_arguments_evaluate_in_caller_environment() {
        let source = "
            (define x 1)
            (define f (lambda (x) x))
            ((lambda (x) (f (+ x 1))) 10)";
        assert_eq!(eval_string(source).unwrap(), Value::Number(11.0));
    }

    #[test]
    fn test_call_frame_is_discarded() {
        let mut interpreter = Interpreter::new();
        interpreter.eval_str("((lambda (temp) temp) 1)").unwrap();
        assert!(interpreter.global().deep_lookup("temp").is_none());
    }

    #[test]
    fn test_macro_binds_unevaluated_and_reevaluates() {
        let source = "
            (define my-if (macro (c a b) (list 'cond (list c a) (list 't b))))
            (my-if (< 1 2) 'yes (undefined))";
        assert_eq!(eval_string(source).unwrap().to_string(), "yes");
    }

    #[test]
    fn test_macro_expands_with_quasiquote() {
        let source = "
            (define unless (macro (c *body) `(if ,c () (progn ,@body))))
            (unless (= 1 2) 1 2 3)";
        assert_eq!(eval_string(source).unwrap(), Value::Number(3.0));
    }

    #[test]
    fn test_macro_is_unhygienic() {
        // The macro body sees the caller's binding of `secret`, not the
        // definer's.
        let source = "
            (define secret 'outer)
            (define peek (macro () (list 'quote secret)))
            ((lambda (secret) (peek)) 'inner)";
        assert_eq!(eval_string(source).unwrap().to_string(), "inner");
    }

    #[test]
    fn test_macro_arity() {
        assert_eq!(
            eval_core("((macro (a b) a) 1)").unwrap_err(),
            Error::arity("macro", 2, 1)
        );
    }

    #[test]
    fn test_apply_passes_values_unchanged() {
        let (mut parser, evaluator, env) = core();
        let procedure = evaluator
            .eval(&parser.parse_all("(lambda (a *b) b)").unwrap().remove(0), &env)
            .unwrap();
        let symbol = Value::Symbol(evaluator.intern("unbound-name"));
        let result = evaluator
            .apply(&procedure, &[Value::Nil, symbol.clone(), Value::Number(2.0)], &env)
            .unwrap();
        assert_eq!(result, Value::list(&[symbol, Value::Number(2.0)]));

        assert!(matches!(
            evaluator.apply(&Value::Number(1.0), &[], &env),
            Err(Error::EvalError(EvalError::NotAProcedure(_)))
        ));
    }

    #[test]
    fn test_recursive_definition() {
        let source = "
            (define fact (lambda (n) (if (< n 2) 1 (* n (fact (- n 1))))))
            (fact 10)";
        assert_eq!(eval_string(source).unwrap(), Value::Number(3628800.0));
    }

    #[test]
    fn test_truth_values() {
        let (_, evaluator, _) = core();
        assert_eq!(evaluator.truth(true).to_string(), "t");
        assert_eq!(evaluator.truth(false), Value::Nil);
    }
}
