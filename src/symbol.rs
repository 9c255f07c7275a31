//! Symbol interning.
//!
//! A [`SymbolTable`] maps each distinct name to one canonical [`Symbol`] handle,
//! so symbol equality is pointer equality. The table is an explicit value owned
//! by a session and shared (by cloning the handle) between the parser and the
//! evaluator. Symbols from two different tables never compare equal, even when
//! their names match.

use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// An interned name. Cloning is a reference-count increment.
#[derive(Clone)]
pub struct Symbol(Rc<str>);

impl Symbol {
    pub fn name(&self) -> &str {
        &self.0
    }

    /// The shared name, usable as an environment key without copying.
    pub fn name_rc(&self) -> Rc<str> {
        Rc::clone(&self.0)
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Rc::as_ptr(&self.0) as *const u8, state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.0)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Interned symbol table. Each unique name maps to exactly one [`Symbol`].
///
/// The handle is cheap to clone; clones share the same underlying table.
#[derive(Clone, Default)]
pub struct SymbolTable {
    names: Rc<RefCell<FxHashMap<Rc<str>, Symbol>>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a symbol name, returning the existing handle if there is one.
    pub fn intern(&self, name: &str) -> Symbol {
        if let Some(symbol) = self.names.borrow().get(name) {
            return symbol.clone();
        }
        let key: Rc<str> = Rc::from(name);
        let symbol = Symbol(Rc::clone(&key));
        self.names.borrow_mut().insert(key, symbol.clone());
        symbol
    }

    /// Look up a symbol without interning.
    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        self.names.borrow().get(name).cloned()
    }

    /// Total number of interned symbols.
    pub fn count(&self) -> usize {
        self.names.borrow().len()
    }

    /// True if both handles refer to the same table.
    pub fn same_table(&self, other: &SymbolTable) -> bool {
        Rc::ptr_eq(&self.names, &other.names)
    }
}

impl fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymbolTable({} symbols)", self.count())
    }
}
