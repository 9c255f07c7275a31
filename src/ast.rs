//! Core value types.
//!
//! [`Value`] is the universal handle for every runtime datum. Compound payloads
//! are reference counted and never mutated after construction, so lists are
//! persistent and acyclic by construction. The empty list is [`Value::Nil`],
//! and every list query treats it as a list with no elements.

use crate::Result;
use crate::environment::Environment;
use crate::evaluator::Evaluator;
use crate::printer::{self, Style};
use crate::symbol::Symbol;
use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// Signature of a procedure body: `(evaluator, unevaluated arguments, caller environment)`.
pub type Closure = dyn Fn(&Evaluator, &Value, &Environment) -> Result<Value>;

/// A cons cell. The tail is always a pair or nil.
pub struct Pair {
    head: Value,
    tail: Value,
}

impl Pair {
    pub fn head(&self) -> &Value {
        &self.head
    }

    pub fn tail(&self) -> &Value {
        &self.tail
    }
}

// Unlink the spine one cell at a time so dropping a long list does not recurse
// once per element. Stops at the first cell still shared elsewhere.
impl Drop for Pair {
    fn drop(&mut self) {
        let mut tail = std::mem::replace(&mut self.tail, Value::Nil);
        while let Value::Pair(rc) = tail {
            match Rc::try_unwrap(rc) {
                Ok(mut pair) => tail = std::mem::replace(&mut pair.tail, Value::Nil),
                Err(_) => break,
            }
        }
    }
}

/// A callable value. Primitives, lambdas and macros all share this shape;
/// the evaluator never looks inside.
pub struct Procedure {
    name: Rc<str>,
    body: Box<Closure>,
}

impl Procedure {
    /// Diagnostic name, used only for printing and error messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, evaluator: &Evaluator, args: &Value, env: &Environment) -> Result<Value> {
        (self.body)(evaluator, args, env)
    }
}

/// Host-defined leaf values, produced by reader factories.
///
/// An extension prints itself; everything else about it is opaque to the core.
pub trait Extension: Any {
    /// Short type name for diagnostics.
    fn type_name(&self) -> &str;

    fn print(&self, out: &mut dyn fmt::Write, style: Style) -> fmt::Result;

    fn as_any(&self) -> &dyn Any;
}

/// Core value type in the runtime
#[derive(Clone)]
pub enum Value {
    /// The empty list
    Nil,
    Pair(Rc<Pair>),
    Procedure(Rc<Procedure>),
    Symbol(Symbol),
    Number(f64),
    String(Rc<str>),
    /// Host-registered leaf
    Extension(Rc<dyn Extension>),
}

/// Typed view of a value, used to check argument types.
pub trait Cast {
    fn cast(value: &Value) -> Option<&Self>;
}

impl Cast for Pair {
    fn cast(value: &Value) -> Option<&Self> {
        match value {
            Value::Pair(pair) => Some(pair.as_ref()),
            _ => None,
        }
    }
}

impl Cast for Procedure {
    fn cast(value: &Value) -> Option<&Self> {
        match value {
            Value::Procedure(procedure) => Some(procedure.as_ref()),
            _ => None,
        }
    }
}

impl Cast for Symbol {
    fn cast(value: &Value) -> Option<&Self> {
        match value {
            Value::Symbol(symbol) => Some(symbol),
            _ => None,
        }
    }
}

impl Cast for f64 {
    fn cast(value: &Value) -> Option<&Self> {
        match value {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }
}

impl Cast for str {
    fn cast(value: &Value) -> Option<&Self> {
        match value {
            Value::String(s) => Some(s.as_ref()),
            _ => None,
        }
    }
}

impl Value {
    /// Build a pair. `tail` must be a list (pair or nil).
    pub fn cons(head: Value, tail: Value) -> Value {
        debug_assert!(tail.is_list(), "cons tail must be a list");
        Value::Pair(Rc::new(Pair { head, tail }))
    }

    pub fn number(n: f64) -> Value {
        Value::Number(n)
    }

    pub fn string(s: impl Into<Rc<str>>) -> Value {
        Value::String(s.into())
    }

    pub fn procedure<F>(name: impl Into<Rc<str>>, body: F) -> Value
    where
        F: Fn(&Evaluator, &Value, &Environment) -> Result<Value> + 'static,
    {
        Value::Procedure(Rc::new(Procedure {
            name: name.into(),
            body: Box::new(body),
        }))
    }

    pub fn extension<E: Extension>(ext: E) -> Value {
        Value::Extension(Rc::new(ext))
    }

    /// Build a proper list from a slice of values.
    pub fn list(values: &[Value]) -> Value {
        Self::list_with_tail(values, Value::Nil)
    }

    /// Build a list of `values` followed by the elements of `tail`.
    pub fn list_with_tail(values: &[Value], tail: Value) -> Value {
        values
            .iter()
            .rev()
            .fold(tail, |acc, value| Value::cons(value.clone(), acc))
    }

    /// Typed view of this value: `value.cast::<f64>()`, `value.cast::<Symbol>()`, ...
    pub fn cast<T: Cast + ?Sized>(&self) -> Option<&T> {
        T::cast(self)
    }

    /// Typed view of an extension payload.
    pub fn downcast_extension<T: Extension>(&self) -> Option<&T> {
        match self {
            Value::Extension(ext) => ext.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    pub fn as_pair(&self) -> Option<&Pair> {
        self.cast::<Pair>()
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        self.cast::<Symbol>()
    }

    pub fn as_number(&self) -> Option<f64> {
        self.cast::<f64>().copied()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.cast::<str>()
    }

    pub fn as_procedure(&self) -> Option<&Procedure> {
        self.cast::<Procedure>()
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// True for pairs and nil.
    pub fn is_list(&self) -> bool {
        matches!(self, Value::Nil | Value::Pair(_))
    }

    /// True for everything except pairs.
    pub fn is_atom(&self) -> bool {
        !matches!(self, Value::Pair(_))
    }

    /// Nil is false; every other value is true.
    pub fn is_truthy(&self) -> bool {
        !self.is_nil()
    }

    /// First element of a pair.
    pub fn head(&self) -> Option<&Value> {
        self.as_pair().map(Pair::head)
    }

    /// Rest of a pair.
    pub fn tail(&self) -> Option<&Value> {
        self.as_pair().map(Pair::tail)
    }

    /// Iterate over the elements of a list. Atoms yield nothing.
    pub fn iter(&self) -> ListIter {
        ListIter {
            current: self.clone(),
        }
    }

    /// Number of elements in a list; zero for atoms.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.is_nil()
    }

    /// Collect the elements of a list.
    pub fn to_vec(&self) -> Vec<Value> {
        self.iter().collect()
    }

    /// True if this is a list whose head is `symbol`.
    pub fn is_form(&self, symbol: &Symbol) -> bool {
        matches!(self.head(), Some(Value::Symbol(head)) if head == symbol)
    }

    /// Identity comparison (`eq?`). Numbers compare by value.
    pub fn is_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Pair(a), Value::Pair(b)) => Rc::ptr_eq(a, b),
            (Value::Procedure(a), Value::Procedure(b)) => Rc::ptr_eq(a, b),
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => Rc::ptr_eq(a, b),
            (Value::Extension(a), Value::Extension(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Short name of the variant, for diagnostics.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Nil => "nil",
            Value::Pair(_) => "pair",
            Value::Procedure(_) => "procedure",
            Value::Symbol(_) => "symbol",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Extension(ext) => ext.type_name(),
        }
    }

    /// Render with the given style.
    pub fn to_string_with(&self, style: Style) -> String {
        printer::to_string(self, style)
    }
}

/// Iterator over the elements of a list.
pub struct ListIter {
    current: Value,
}

impl Iterator for ListIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        let (head, tail) = match &self.current {
            Value::Pair(pair) => (pair.head.clone(), pair.tail.clone()),
            _ => return None,
        };
        self.current = tail;
        Some(head)
    }
}

impl FromIterator<Value> for Value {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        let items: Vec<Value> = iter.into_iter().collect();
        Value::list(&items)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Symbol> for Value {
    fn from(symbol: Symbol) -> Self {
        Value::Symbol(symbol)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        printer::print(f, self, Style::Inspect)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        printer::print(f, self, Style::Inspect)
    }
}

/// Structural equality (`equal?`). Procedures and extensions compare by identity.
///
/// Walks list tails in a loop; only nesting through heads recurses.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Pair(_), Value::Pair(_)) => {
                let (mut a, mut b) = (self, other);
                loop {
                    match (a, b) {
                        (Value::Pair(x), Value::Pair(y)) => {
                            if Rc::ptr_eq(x, y) {
                                return true;
                            }
                            if x.head != y.head {
                                return false;
                            }
                            a = &x.tail;
                            b = &y.tail;
                        }
                        _ => return a == b,
                    }
                }
            }
            (Value::Procedure(a), Value::Procedure(b)) => Rc::ptr_eq(a, b),
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Extension(a), Value::Extension(b)) => Rc::ptr_eq(a, b),
            _ => false, // Different variants are never equal
        }
    }
}
