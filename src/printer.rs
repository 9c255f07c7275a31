//! Textual output.
//!
//! The printer is the inverse of the reader for pairs, symbols and atoms.
//! Two-element quote forms print with their prefix token, so `(quote x)` prints
//! as `'x`.

use crate::ast::Value;
use crate::quote::QuoteKind;
use std::fmt::{self, Write};

/// How strings are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Style {
    /// Strings are written raw, as `print` shows them to a user.
    Display,
    /// Strings are quoted and escaped so the output reads back.
    #[default]
    Inspect,
}

/// Write `value` to `out` in the given style.
pub fn print(out: &mut dyn Write, value: &Value, style: Style) -> fmt::Result {
    match value {
        Value::Nil => out.write_str("()"),
        Value::Pair(_) => {
            if let Some((kind, datum)) = QuoteKind::match_form(value) {
                out.write_str(kind.token())?;
                return print(out, datum, style);
            }
            out.write_char('(')?;
            for (i, element) in value.iter().enumerate() {
                if i > 0 {
                    out.write_char(' ')?;
                }
                print(out, &element, style)?;
            }
            out.write_char(')')
        }
        Value::Procedure(procedure) => write!(out, "#<procedure {}>", procedure.name()),
        Value::Symbol(symbol) => out.write_str(symbol.name()),
        Value::Number(n) => write_number(out, *n),
        Value::String(s) => match style {
            Style::Display => out.write_str(s),
            Style::Inspect => write_escaped(out, s),
        },
        Value::Extension(ext) => ext.print(out, style),
    }
}

/// Render `value` into a fresh string.
pub fn to_string(value: &Value, style: Style) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = print(&mut out, value, style);
    out
}

/// Write `value` to an I/O stream.
pub fn write_to(out: &mut impl std::io::Write, value: &Value, style: Style) -> std::io::Result<()> {
    out.write_all(to_string(value, style).as_bytes())
}

fn write_number(out: &mut dyn Write, n: f64) -> fmt::Result {
    // Integral values print without a fractional part.
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        write!(out, "{}", n as i64)
    } else {
        write!(out, "{}", n)
    }
}

fn write_escaped(out: &mut dyn Write, s: &str) -> fmt::Result {
    out.write_char('"')?;
    for c in s.chars() {
        match c {
            '\n' => out.write_str("\\n")?,
            '\t' => out.write_str("\\t")?,
            '\r' => out.write_str("\\r")?,
            '\x07' => out.write_str("\\a")?,
            '\x08' => out.write_str("\\b")?,
            '\x0c' => out.write_str("\\f")?,
            '\x0b' => out.write_str("\\v")?,
            '\\' => out.write_str("\\\\")?,
            '"' => out.write_str("\\\"")?,
            c => out.write_char(c)?,
        }
    }
    out.write_char('"')
}
