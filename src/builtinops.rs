//! Built-in operations registry.
//!
//! Every host procedure of the standard library is described once in
//! [`BUILTIN_OPS`] with its identifier, implementation and arity, and
//! [`install`] binds them all into an environment.
//!
//! ```scheme
//! (define xs (list 1 2 3))
//! (if (null? xs) 'empty (car xs))   ; 1
//! (apply + xs)                      ; 6
//! ```
//!
//! ## Functions vs Special Forms
//!
//! - **Functions**: Evaluate all arguments before application (e.g., `+`, `not`, `car`)
//! - **Special Forms**: Receive their arguments unevaluated together with the
//!   caller's environment (e.g., `if`, `and`, `define`)
//!
//! `lambda`, `macro`, `quasiquote` and `quote` are not in this registry; the
//! evaluator provides them.
//!
//! ## Truth
//!
//! Nil is false and everything else is true. Predicates return the symbol `t`
//! or nil.

use crate::ast::Value;
use crate::environment::Environment;
use crate::evaluator::Evaluator;
use crate::printer::Style;
use crate::{Error, EvalError, Result};
use rustc_hash::FxHashMap;
use std::io::Write;
use std::sync::LazyLock;

/// Represents the expected number of arguments for an operation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Arity {
    /// Exactly n arguments required
    Exact(usize),
    /// At least n arguments required
    AtLeast(usize),
    /// Between min and max arguments (inclusive)
    Range(usize, usize),
    /// Any number of arguments (0 or more)
    Any,
}

impl Arity {
    /// Check if the given number of arguments is valid for this arity constraint
    pub fn validate(&self, command: &str, arg_count: usize) -> Result<()> {
        let valid = match self {
            Arity::Exact(n) => arg_count == *n,
            Arity::AtLeast(n) => arg_count >= *n,
            Arity::Range(min, max) => arg_count >= *min && arg_count <= *max,
            Arity::Any => true,
        };

        if valid {
            Ok(())
        } else {
            Err(Error::arity(command, self.describe(), arg_count))
        }
    }

    fn describe(&self) -> String {
        match self {
            Arity::Exact(n) => n.to_string(),
            Arity::AtLeast(n) => format!("at least {n}"),
            Arity::Range(min, max) => format!("{min} to {max}"),
            Arity::Any => "any number of".to_string(),
        }
    }
}

/// Signature of a function: the arguments arrive evaluated.
pub type BuiltinFn = fn(&Evaluator, &[Value]) -> Result<Value>;

/// Signature of a special form: unevaluated arguments plus the caller's environment.
pub type SpecialFormFn = fn(&Evaluator, &[Value], &Environment) -> Result<Value>;

/// Represents the implementation of a built-in expression (function or special form)
#[derive(Clone, Copy)]
pub enum OpKind {
    Function(BuiltinFn),
    SpecialForm(SpecialFormFn),
}

impl std::fmt::Debug for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpKind::Function(_) => write!(f, "Function(<fn>)"),
            OpKind::SpecialForm(_) => write!(f, "SpecialForm(<fn>)"),
        }
    }
}

/// Definition of a built-in operation
#[derive(Debug, Clone)]
pub struct BuiltinOp {
    /// The name this operation is bound under
    pub id: &'static str,
    /// The implementation of this operation (function or special form)
    pub op_kind: OpKind,
    /// Expected number of arguments
    pub arity: Arity,
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl BuiltinOp {
    /// Check if this operation is a special form
    pub fn is_special_form(&self) -> bool {
        matches!(self.op_kind, OpKind::SpecialForm(_))
    }

    /// Check if the given number of arguments is valid for this operation
    pub fn validate_arity(&self, arg_count: usize) -> Result<()> {
        self.arity.validate(self.id, arg_count)
    }

    /// Run this operation on an unevaluated argument list.
    pub fn invoke(&self, evaluator: &Evaluator, args: &Value, env: &Environment) -> Result<Value> {
        let args = args.to_vec();
        self.validate_arity(args.len())?;
        match self.op_kind {
            OpKind::Function(func) => {
                let values = args
                    .iter()
                    .map(|arg| evaluator.eval(arg, env))
                    .collect::<Result<Vec<_>>>()?;
                func(evaluator, &values)
            }
            OpKind::SpecialForm(form) => form(evaluator, &args, env),
        }
    }

    /// Wrap this operation as a procedure value.
    pub fn to_procedure(&'static self) -> Value {
        Value::procedure(self.id, move |evaluator: &Evaluator, args: &Value, env: &Environment| {
            self.invoke(evaluator, args, env)
        })
    }
}

//
// Argument helpers
//

fn number(command: &str, value: &Value) -> Result<f64> {
    value
        .as_number()
        .ok_or_else(|| Error::type_error(command, "number", value))
}

fn list(command: &str, value: &Value) -> Result<()> {
    if value.is_list() {
        Ok(())
    } else {
        Err(Error::type_error(command, "list", value))
    }
}

fn symbol_name(command: &str, value: &Value) -> Result<String> {
    value
        .as_symbol()
        .map(|symbol| symbol.name().to_string())
        .ok_or_else(|| Error::type_error(command, "symbol", value))
}

//
// Builtin Function Implementations
//

// Macro to generate numeric comparison functions
macro_rules! numeric_comparison {
    ($name:ident, $op:tt, $op_str:expr) => {
        pub fn $name(evaluator: &Evaluator, args: &[Value]) -> Result<Value> {
            let numbers = args
                .iter()
                .map(|arg| number($op_str, arg))
                .collect::<Result<Vec<f64>>>()?;
            // Chain comparisons: all adjacent pairs must satisfy the comparison
            Ok(evaluator.truth(numbers.windows(2).all(|w| w[0] $op w[1])))
        }
    };
}

// Generate all comparison functions
numeric_comparison!(builtin_num_eq, ==, "=");
numeric_comparison!(builtin_lt, <, "<");
numeric_comparison!(builtin_gt, >, ">");
numeric_comparison!(builtin_le, <=, "<=");
numeric_comparison!(builtin_ge, >=, ">=");

pub fn builtin_add(_: &Evaluator, args: &[Value]) -> Result<Value> {
    let mut sum = 0.0;
    for arg in args {
        sum += number("+", arg)?;
    }
    Ok(Value::Number(sum))
}

pub fn builtin_sub(_: &Evaluator, args: &[Value]) -> Result<Value> {
    match args {
        [] => Err(Error::arity("-", "at least 1", 0)),
        [only] => Ok(Value::Number(-number("-", only)?)),
        [first, rest @ ..] => {
            let mut result = number("-", first)?;
            for arg in rest {
                result -= number("-", arg)?;
            }
            Ok(Value::Number(result))
        }
    }
}

pub fn builtin_mul(_: &Evaluator, args: &[Value]) -> Result<Value> {
    let mut product = 1.0;
    for arg in args {
        product *= number("*", arg)?;
    }
    Ok(Value::Number(product))
}

pub fn builtin_div(_: &Evaluator, args: &[Value]) -> Result<Value> {
    let (first, rest) = match args {
        [] => return Err(Error::arity("/", "at least 1", 0)),
        [only] => (1.0, std::slice::from_ref(only)),
        [first, rest @ ..] => (number("/", first)?, rest),
    };
    let mut result = first;
    for arg in rest {
        let divisor = number("/", arg)?;
        if divisor == 0.0 {
            return Err(EvalError::Raised("/: division by zero".to_string()).into());
        }
        result /= divisor;
    }
    Ok(Value::Number(result))
}

pub fn builtin_car(_: &Evaluator, args: &[Value]) -> Result<Value> {
    match args {
        [Value::Nil] => Ok(Value::Nil),
        [Value::Pair(pair)] => Ok(pair.head().clone()),
        [other] => Err(Error::type_error("car", "list", other)),
        _ => Err(Error::arity("car", 1, args.len())),
    }
}

pub fn builtin_cdr(_: &Evaluator, args: &[Value]) -> Result<Value> {
    match args {
        [Value::Nil] => Ok(Value::Nil),
        [Value::Pair(pair)] => Ok(pair.tail().clone()),
        [other] => Err(Error::type_error("cdr", "list", other)),
        _ => Err(Error::arity("cdr", 1, args.len())),
    }
}

pub fn builtin_cons(_: &Evaluator, args: &[Value]) -> Result<Value> {
    match args {
        [head, tail] => {
            // Tails are always lists; there are no dotted pairs
            list("cons", tail)?;
            Ok(Value::cons(head.clone(), tail.clone()))
        }
        _ => Err(Error::arity("cons", 2, args.len())),
    }
}

pub fn builtin_list(_: &Evaluator, args: &[Value]) -> Result<Value> {
    Ok(Value::list(args))
}

pub fn builtin_length(_: &Evaluator, args: &[Value]) -> Result<Value> {
    match args {
        [value] => {
            list("length", value)?;
            Ok(Value::Number(value.len() as f64))
        }
        _ => Err(Error::arity("length", 1, args.len())),
    }
}

pub fn builtin_eq(evaluator: &Evaluator, args: &[Value]) -> Result<Value> {
    match args {
        [first, second] => Ok(evaluator.truth(first.is_eq(second))),
        _ => Err(Error::arity("eq?", 2, args.len())),
    }
}

pub fn builtin_equal(evaluator: &Evaluator, args: &[Value]) -> Result<Value> {
    match args {
        [first, second] => Ok(evaluator.truth(first == second)),
        _ => Err(Error::arity("equal?", 2, args.len())),
    }
}

// Macro to generate single-argument type predicates
macro_rules! type_predicate {
    ($name:ident, $id:expr, $test:expr) => {
        pub fn $name(evaluator: &Evaluator, args: &[Value]) -> Result<Value> {
            match args {
                [value] => Ok(evaluator.truth($test(value))),
                _ => Err(Error::arity($id, 1, args.len())),
            }
        }
    };
}

type_predicate!(builtin_null, "null?", Value::is_nil);
type_predicate!(builtin_atom, "atom?", Value::is_atom);
type_predicate!(builtin_pair, "pair?", |v: &Value| matches!(v, Value::Pair(_)));
type_predicate!(builtin_symbol, "symbol?", |v: &Value| v.as_symbol().is_some());
type_predicate!(builtin_number, "number?", |v: &Value| v.as_number().is_some());
type_predicate!(builtin_string, "string?", |v: &Value| v.as_str().is_some());
type_predicate!(builtin_procedure, "procedure?", |v: &Value| v.as_procedure().is_some());

pub fn builtin_not(evaluator: &Evaluator, args: &[Value]) -> Result<Value> {
    match args {
        [value] => Ok(evaluator.truth(!value.is_truthy())),
        _ => Err(Error::arity("not", 1, args.len())),
    }
}

/// Write the arguments in display style, space separated, then a newline.
/// Returns the last argument.
pub fn builtin_print(_: &Evaluator, args: &[Value]) -> Result<Value> {
    let line = args
        .iter()
        .map(|arg| arg.to_string_with(Style::Display))
        .collect::<Vec<_>>()
        .join(" ");
    let mut stdout = std::io::stdout().lock();
    // Output failures are not evaluation errors
    let _ = writeln!(stdout, "{line}");
    Ok(args.last().cloned().unwrap_or(Value::Nil))
}

pub fn builtin_error(_: &Evaluator, args: &[Value]) -> Result<Value> {
    let message = if args.is_empty() {
        "error".to_string()
    } else {
        args.iter()
            .map(|arg| arg.to_string_with(Style::Display))
            .collect::<Vec<_>>()
            .join(" ")
    };
    Err(EvalError::Raised(message).into())
}

//
// Special forms
//

/// `(define name expr)`: bind in the current frame, returning the name.
pub fn eval_define(evaluator: &Evaluator, args: &[Value], env: &Environment) -> Result<Value> {
    let [name, expr] = args else {
        return Err(Error::arity("define", 2, args.len()));
    };
    let key = symbol_name("define", name)?;
    let value = evaluator.eval(expr, env)?;
    tracing::debug!(name = %key, "define");
    env.set(key.as_str(), value);
    Ok(name.clone())
}

/// `(set! name expr)`: rebind in the nearest frame that binds `name`.
pub fn eval_set(evaluator: &Evaluator, args: &[Value], env: &Environment) -> Result<Value> {
    let [name, expr] = args else {
        return Err(Error::arity("set!", 2, args.len()));
    };
    let key = symbol_name("set!", name)?;
    let value = evaluator.eval(expr, env)?;
    if env.deep_update(&key, value.clone()) {
        Ok(value)
    } else {
        Err(EvalError::UnboundUpdate(key).into())
    }
}

/// `(if test then [else])`
pub fn eval_if(evaluator: &Evaluator, args: &[Value], env: &Environment) -> Result<Value> {
    match args {
        [test, then, rest @ ..] if rest.len() <= 1 => {
            if evaluator.eval(test, env)?.is_truthy() {
                evaluator.eval(then, env)
            } else {
                match rest {
                    [otherwise] => evaluator.eval(otherwise, env),
                    _ => Ok(Value::Nil),
                }
            }
        }
        _ => Err(Error::arity("if", "2 to 3", args.len())),
    }
}

/// `(cond (test body...)...)`: the first clause whose test is true runs its
/// body; a clause without a body yields the test value.
pub fn eval_cond(evaluator: &Evaluator, args: &[Value], env: &Environment) -> Result<Value> {
    for clause in args {
        let Some(pair) = clause.as_pair() else {
            return Err(Error::type_error("cond", "clause list", clause));
        };
        let test = evaluator.eval(pair.head(), env)?;
        if test.is_truthy() {
            if pair.tail().is_nil() {
                return Ok(test);
            }
            return evaluator.eval_sequence(pair.tail(), env);
        }
    }
    Ok(Value::Nil)
}

pub fn eval_progn(evaluator: &Evaluator, args: &[Value], env: &Environment) -> Result<Value> {
    let mut result = Value::Nil;
    for form in args {
        result = evaluator.eval(form, env)?;
    }
    Ok(result)
}

/// Short-circuit: the first false value, else the last value (`t` when empty).
pub fn eval_and(evaluator: &Evaluator, args: &[Value], env: &Environment) -> Result<Value> {
    let mut result = evaluator.truth(true);
    for arg in args {
        result = evaluator.eval(arg, env)?;
        if !result.is_truthy() {
            break;
        }
    }
    Ok(result)
}

/// Short-circuit: the first true value, else nil.
pub fn eval_or(evaluator: &Evaluator, args: &[Value], env: &Environment) -> Result<Value> {
    for arg in args {
        let result = evaluator.eval(arg, env)?;
        if result.is_truthy() {
            return Ok(result);
        }
    }
    Ok(Value::Nil)
}

/// `(label name expr)`: evaluate `expr` in a new frame where `name` will be
/// bound to its own value, allowing anonymous recursion.
pub fn eval_label(evaluator: &Evaluator, args: &[Value], env: &Environment) -> Result<Value> {
    let [name, expr] = args else {
        return Err(Error::arity("label", 2, args.len()));
    };
    let key = symbol_name("label", name)?;
    let frame = env.derive();
    let value = evaluator.eval(expr, &frame)?;
    frame.set(key.as_str(), value.clone());
    Ok(value)
}

/// `(apply f list)`
pub fn eval_apply(evaluator: &Evaluator, args: &[Value], env: &Environment) -> Result<Value> {
    let [procedure, values] = args else {
        return Err(Error::arity("apply", 2, args.len()));
    };
    let procedure = evaluator.eval(procedure, env)?;
    let values = evaluator.eval(values, env)?;
    list("apply", &values)?;
    evaluator.apply(&procedure, &values.to_vec(), env)
}

/// `(eval expr)`: evaluate the value of `expr` in the current environment.
pub fn eval_eval(evaluator: &Evaluator, args: &[Value], env: &Environment) -> Result<Value> {
    let [expr] = args else {
        return Err(Error::arity("eval", 1, args.len()));
    };
    let form = evaluator.eval(expr, env)?;
    evaluator.eval(&form, env)
}

/// Global registry of all built-in operations as a simple array
static BUILTIN_OPS: &[BuiltinOp] = &[
    // Definitions and control flow
    BuiltinOp {
        id: "define",
        op_kind: OpKind::SpecialForm(eval_define),
        arity: Arity::Exact(2),
    },
    BuiltinOp {
        id: "set!",
        op_kind: OpKind::SpecialForm(eval_set),
        arity: Arity::Exact(2),
    },
    BuiltinOp {
        id: "if",
        op_kind: OpKind::SpecialForm(eval_if),
        arity: Arity::Range(2, 3),
    },
    BuiltinOp {
        id: "cond",
        op_kind: OpKind::SpecialForm(eval_cond),
        arity: Arity::Any,
    },
    BuiltinOp {
        id: "progn",
        op_kind: OpKind::SpecialForm(eval_progn),
        arity: Arity::Any,
    },
    BuiltinOp {
        id: "and",
        op_kind: OpKind::SpecialForm(eval_and),
        arity: Arity::Any,
    },
    BuiltinOp {
        id: "or",
        op_kind: OpKind::SpecialForm(eval_or),
        arity: Arity::Any,
    },
    BuiltinOp {
        id: "label",
        op_kind: OpKind::SpecialForm(eval_label),
        arity: Arity::Exact(2),
    },
    BuiltinOp {
        id: "apply",
        op_kind: OpKind::SpecialForm(eval_apply),
        arity: Arity::Exact(2),
    },
    BuiltinOp {
        id: "eval",
        op_kind: OpKind::SpecialForm(eval_eval),
        arity: Arity::Exact(1),
    },
    // Arithmetic operations
    BuiltinOp {
        id: "+",
        op_kind: OpKind::Function(builtin_add),
        arity: Arity::Any,
    },
    BuiltinOp {
        id: "-",
        op_kind: OpKind::Function(builtin_sub),
        arity: Arity::AtLeast(1),
    },
    BuiltinOp {
        id: "*",
        op_kind: OpKind::Function(builtin_mul),
        arity: Arity::Any,
    },
    BuiltinOp {
        id: "/",
        op_kind: OpKind::Function(builtin_div),
        arity: Arity::AtLeast(1),
    },
    // Comparison operations
    BuiltinOp {
        id: "=",
        op_kind: OpKind::Function(builtin_num_eq),
        arity: Arity::AtLeast(2),
    },
    BuiltinOp {
        id: "<",
        op_kind: OpKind::Function(builtin_lt),
        arity: Arity::AtLeast(2),
    },
    BuiltinOp {
        id: ">",
        op_kind: OpKind::Function(builtin_gt),
        arity: Arity::AtLeast(2),
    },
    BuiltinOp {
        id: "<=",
        op_kind: OpKind::Function(builtin_le),
        arity: Arity::AtLeast(2),
    },
    BuiltinOp {
        id: ">=",
        op_kind: OpKind::Function(builtin_ge),
        arity: Arity::AtLeast(2),
    },
    // List operations
    BuiltinOp {
        id: "car",
        op_kind: OpKind::Function(builtin_car),
        arity: Arity::Exact(1),
    },
    BuiltinOp {
        id: "cdr",
        op_kind: OpKind::Function(builtin_cdr),
        arity: Arity::Exact(1),
    },
    BuiltinOp {
        id: "cons",
        op_kind: OpKind::Function(builtin_cons),
        arity: Arity::Exact(2),
    },
    BuiltinOp {
        id: "list",
        op_kind: OpKind::Function(builtin_list),
        arity: Arity::Any,
    },
    BuiltinOp {
        id: "length",
        op_kind: OpKind::Function(builtin_length),
        arity: Arity::Exact(1),
    },
    // Equality and predicates
    BuiltinOp {
        id: "eq?",
        op_kind: OpKind::Function(builtin_eq),
        arity: Arity::Exact(2),
    },
    BuiltinOp {
        id: "equal?",
        op_kind: OpKind::Function(builtin_equal),
        arity: Arity::Exact(2),
    },
    BuiltinOp {
        id: "null?",
        op_kind: OpKind::Function(builtin_null),
        arity: Arity::Exact(1),
    },
    BuiltinOp {
        id: "atom?",
        op_kind: OpKind::Function(builtin_atom),
        arity: Arity::Exact(1),
    },
    BuiltinOp {
        id: "pair?",
        op_kind: OpKind::Function(builtin_pair),
        arity: Arity::Exact(1),
    },
    BuiltinOp {
        id: "symbol?",
        op_kind: OpKind::Function(builtin_symbol),
        arity: Arity::Exact(1),
    },
    BuiltinOp {
        id: "number?",
        op_kind: OpKind::Function(builtin_number),
        arity: Arity::Exact(1),
    },
    BuiltinOp {
        id: "string?",
        op_kind: OpKind::Function(builtin_string),
        arity: Arity::Exact(1),
    },
    BuiltinOp {
        id: "procedure?",
        op_kind: OpKind::Function(builtin_procedure),
        arity: Arity::Exact(1),
    },
    BuiltinOp {
        id: "not",
        op_kind: OpKind::Function(builtin_not),
        arity: Arity::Exact(1),
    },
    // Output and error handling
    BuiltinOp {
        id: "print",
        op_kind: OpKind::Function(builtin_print),
        arity: Arity::Any,
    },
    BuiltinOp {
        id: "error",
        op_kind: OpKind::Function(builtin_error),
        arity: Arity::Any,
    },
];

/// Lazy static map from id to BuiltinOp (private - use find_builtin_op)
static BUILTIN_INDEX: LazyLock<FxHashMap<&'static str, &'static BuiltinOp>> =
    LazyLock::new(|| BUILTIN_OPS.iter().map(|op| (op.id, op)).collect());

/// Get all builtin operations
pub fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS
}

/// Find a builtin op by the name it is bound under
pub fn find_builtin_op(id: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_INDEX.get(id).copied()
}

/// Bind every builtin, plus `nil` and `t`, in `env`.
pub fn install(evaluator: &Evaluator, env: &Environment) {
    for op in BUILTIN_OPS {
        env.set(op.id, op.to_procedure());
    }
    env.set("nil", Value::Nil);
    env.set("t", evaluator.truth(true));
    tracing::debug!(count = BUILTIN_OPS.len(), "installed standard library");
}
