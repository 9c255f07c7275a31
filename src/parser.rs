//! Incremental reader.
//!
//! [`Parser::parse`] consumes exactly one top-level datum from an
//! [`InputStream`] per call. When the stream runs dry in the middle of a datum
//! (an open list, a pending quote prefix, an unterminated string) the partial
//! state is kept, and a later call completes it once more text has been pushed
//! onto the same stream. [`Parser::clean`] tells the caller whether it is safe to
//! stop feeding input.
//!
//! Individual tokens are recognised with `nom`; nesting is tracked on an
//! explicit context stack rather than by recursion.

use nom::{
    IResult, Needed,
    branch::alt,
    bytes::complete::{tag, take_till, take_while1},
    character::complete::{char, multispace1, satisfy},
    combinator::{map, opt, recognize, value},
    multi::many0_count,
    sequence::{pair, tuple},
};

use crate::ast::Value;
use crate::quote::{QuoteKind, QuoteSymbols};
use crate::symbol::SymbolTable;
use crate::{ParseError, ParseErrorKind, Result};

/// Characters that end an atom token.
const DELIMITERS: &str = " \t\r\n()'`,\";";

/// A growable character buffer the parser reads from.
///
/// Text may be appended between calls to [`Parser::parse`]; consumed text is
/// discarded on the next append.
#[derive(Debug, Clone, Default)]
pub struct InputStream {
    buffer: String,
    pos: usize,
    discarded: usize,
}

impl InputStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append more text to the end of the stream.
    pub fn push_str(&mut self, text: &str) {
        if self.pos > 0 {
            self.buffer.drain(..self.pos);
            self.discarded += self.pos;
            self.pos = 0;
        }
        self.buffer.push_str(text);
    }

    /// The unread part of the stream.
    pub fn remaining(&self) -> &str {
        &self.buffer[self.pos..]
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.buffer.len()
    }

    /// Byte offset of the read position from the start of everything pushed.
    pub fn offset(&self) -> usize {
        self.discarded + self.pos
    }

    /// Drop all unread text.
    pub fn clear(&mut self) {
        self.discarded += self.buffer.len();
        self.buffer.clear();
        self.pos = 0;
    }

    fn advance(&mut self, bytes: usize) {
        self.pos = (self.pos + bytes).min(self.buffer.len());
    }
}

impl From<&str> for InputStream {
    fn from(text: &str) -> Self {
        InputStream {
            buffer: text.to_string(),
            pos: 0,
            discarded: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    Open,
    Close,
    Quote(QuoteKind),
    Str(String),
    Atom(&'a str),
}

/// An open context on the parser stack.
enum Context {
    /// Inside `( ... )`, with the elements read so far
    List(Vec<Value>),
    /// After a quote prefix, waiting for the datum to wrap
    Quote(QuoteKind),
}

/// Maps an atom token to a host value, or declines with `None`.
pub type ExtensionFactory = Box<dyn Fn(&str) -> Option<Value>>;

/// Skip whitespace and `;` comments. A comment ends at `\n` or a bare `\r`.
fn skip_trivia(input: &str) -> IResult<&str, usize> {
    many0_count(alt((
        value((), multispace1),
        value((), pair(char(';'), take_till(|c| c == '\n' || c == '\r'))),
    )))(input)
}

fn quote_prefix(input: &str) -> IResult<&str, QuoteKind> {
    alt((
        value(QuoteKind::UnquoteSplicing, tag(",@")),
        value(QuoteKind::Unquote, tag(",")),
        value(QuoteKind::Quote, tag("'")),
        value(QuoteKind::Quasiquote, tag("`")),
    ))(input)
}

/// Parse a string literal, unescaping C-style escapes.
///
/// Returns `Incomplete` if the input ends before the closing quote.
fn string_literal(input: &str) -> IResult<&str, String> {
    let (mut remaining, _) = char('"')(input)?;
    let mut text = String::new();

    loop {
        let mut chars = remaining.chars();
        match chars.next() {
            Some('"') => return Ok((chars.as_str(), text)),
            Some('\\') => {
                let Some(escaped) = chars.next() else {
                    return Err(nom::Err::Incomplete(Needed::new(1)));
                };
                match escaped {
                    'n' => text.push('\n'),
                    't' => text.push('\t'),
                    'r' => text.push('\r'),
                    'a' => text.push('\x07'),
                    'b' => text.push('\x08'),
                    'f' => text.push('\x0c'),
                    'v' => text.push('\x0b'),
                    '\\' => text.push('\\'),
                    '"' => text.push('"'),
                    '\'' => text.push('\''),
                    other => {
                        // Unknown escapes pass through untouched
                        text.push('\\');
                        text.push(other);
                    }
                }
            }
            Some(c) => text.push(c),
            None => return Err(nom::Err::Incomplete(Needed::new(1))),
        }
        remaining = chars.as_str();
    }
}

fn atom_text(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !DELIMITERS.contains(c))(input)
}

fn token(input: &str) -> IResult<&str, Token<'_>> {
    alt((
        value(Token::Open, char('(')),
        value(Token::Close, char(')')),
        map(quote_prefix, Token::Quote),
        map(string_literal, Token::Str),
        map(atom_text, Token::Atom),
    ))(input)
}

/// Byte offset of a `;` comment that runs to the end of `trivia`, if any.
fn open_comment(trivia: &str) -> Option<usize> {
    let line_start = trivia.rfind(['\n', '\r']).map_or(0, |i| i + 1);
    trivia[line_start..].find(';').map(|i| line_start + i)
}

/// True if `text` starts like a number: optional `-`, optional `.`, then a digit.
fn looks_numeric(text: &str) -> bool {
    recognize(tuple((
        opt(char::<&str, nom::error::Error<&str>>('-')),
        opt(char('.')),
        satisfy(|c| c.is_ascii_digit()),
    )))(text)
    .is_ok()
}

/// Incremental s-expression reader.
pub struct Parser {
    symbols: SymbolTable,
    quotes: QuoteSymbols,
    stack: Vec<Context>,
    pending_string: bool,
    /// A token touching the end of the buffer, left unread
    pending_token: bool,
    failed: bool,
    factories: Vec<ExtensionFactory>,
}

impl Parser {
    /// Create a parser interning symbols into `symbols`.
    pub fn new(symbols: SymbolTable) -> Self {
        let quotes = QuoteSymbols::new(&symbols);
        Parser {
            symbols,
            quotes,
            stack: Vec::new(),
            pending_string: false,
            pending_token: false,
            failed: false,
            factories: Vec::new(),
        }
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Register a factory for host-defined atoms. Factories are tried in
    /// registration order before numbers and symbols.
    pub fn register_extension<F>(&mut self, factory: F)
    where
        F: Fn(&str) -> Option<Value> + 'static,
    {
        self.factories.push(Box::new(factory));
    }

    /// True when no datum is partially read and no error has occurred since
    /// the last [`reset`](Self::reset).
    pub fn clean(&self) -> bool {
        self.stack.is_empty() && !self.pending_string && !self.pending_token && !self.failed
    }

    /// Discard all partial state, including a previous error.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.pending_string = false;
        self.pending_token = false;
        self.failed = false;
    }

    /// Read one top-level datum from `stream`.
    ///
    /// Returns `Ok(None)` when the stream is exhausted; any partially read datum
    /// is kept and resumed by the next call. An atom, a `,` or a comment that
    /// reaches the end of the stream may continue in the next chunk, so it is
    /// left unread until a delimiter follows or [`parse_final`](Self::parse_final)
    /// is called.
    pub fn parse(&mut self, stream: &mut InputStream) -> Result<Option<Value>> {
        self.read(stream, false)
    }

    /// Like [`parse`](Self::parse), but the end of the stream ends the last token.
    pub fn parse_final(&mut self, stream: &mut InputStream) -> Result<Option<Value>> {
        self.read(stream, true)
    }

    fn read(&mut self, stream: &mut InputStream, at_end: bool) -> Result<Option<Value>> {
        self.pending_string = false;
        self.pending_token = false;
        loop {
            let input = stream.remaining();
            let after_trivia = match skip_trivia(input) {
                Ok((rest, _)) => rest,
                Err(_) => input,
            };
            let skipped = &input[..input.len() - after_trivia.len()];
            if after_trivia.is_empty()
                && !at_end
                && let Some(comment) = open_comment(skipped)
            {
                // Stop at the comment; its line may not be finished
                stream.advance(comment);
                self.pending_token = true;
                return Ok(None);
            }
            stream.advance(skipped.len());

            let input = stream.remaining();
            if input.is_empty() {
                return Ok(None);
            }

            let (rest, tok) = match token(input) {
                Ok(result) => result,
                Err(nom::Err::Incomplete(_)) => {
                    // An unterminated string: wait for more input
                    self.pending_string = true;
                    return Ok(None);
                }
                Err(_) => {
                    // Text that starts no token cannot be resumed later
                    return Err(self.fail(
                        ParseErrorKind::Unreadable,
                        "unreadable input",
                        stream.offset(),
                    ));
                }
            };
            let consumed = input.len() - rest.len();

            if rest.is_empty()
                && !at_end
                && matches!(tok, Token::Atom(_) | Token::Quote(QuoteKind::Unquote))
            {
                // `foo` may grow to `foobar`, and `,` to `,@`
                self.pending_token = true;
                return Ok(None);
            }

            let datum = match tok {
                Token::Open => {
                    self.stack.push(Context::List(Vec::new()));
                    None
                }
                Token::Close => match self.stack.pop() {
                    Some(Context::List(items)) => Some(Value::list(&items)),
                    Some(Context::Quote(kind)) => {
                        return Err(self.fail(
                            ParseErrorKind::RedundantParen,
                            format!("unexpected ')' after '{}'", kind.token()),
                            stream.offset(),
                        ));
                    }
                    None => {
                        return Err(self.fail(
                            ParseErrorKind::RedundantParen,
                            "unexpected ')'",
                            stream.offset(),
                        ));
                    }
                },
                Token::Quote(kind) => {
                    self.stack.push(Context::Quote(kind));
                    None
                }
                Token::Str(text) => Some(Value::string(text)),
                Token::Atom(text) => Some(self.atom(text)),
            };
            stream.advance(consumed);

            if let Some(datum) = datum
                && let Some(complete) = self.attach(datum)
            {
                tracing::debug!(datum = %complete, "read datum");
                return Ok(Some(complete));
            }
        }
    }

    /// Declare the end of input, failing if a datum is still incomplete.
    pub fn finish(&self, stream: &InputStream) -> Result<()> {
        let offset = stream.offset();
        if self.pending_string {
            return Err(ParseError::new(
                ParseErrorKind::UnterminatedString,
                "unterminated string literal",
                offset,
            )
            .into());
        }
        match self.stack.last() {
            Some(Context::List(_)) => Err(ParseError::new(
                ParseErrorKind::UnterminatedList,
                format!("{} unclosed '('", self.open_lists()),
                offset,
            )
            .into()),
            Some(Context::Quote(kind)) => Err(ParseError::new(
                ParseErrorKind::DanglingQuote,
                format!("nothing follows '{}'", kind.token()),
                offset,
            )
            .into()),
            None => Ok(()),
        }
    }

    /// Read every datum in `text`, which must be complete.
    pub fn parse_all(&mut self, text: &str) -> Result<Vec<Value>> {
        let mut stream = InputStream::from(text);
        let mut values = Vec::new();
        while let Some(value) = self.parse_final(&mut stream)? {
            values.push(value);
        }
        self.finish(&stream)?;
        Ok(values)
    }

    fn open_lists(&self) -> usize {
        self.stack
            .iter()
            .filter(|context| matches!(context, Context::List(_)))
            .count()
    }

    /// Wrap `datum` in any pending quotes, then add it to the enclosing list.
    /// Returns the datum if it completed a top-level form.
    fn attach(&mut self, mut datum: Value) -> Option<Value> {
        loop {
            match self.stack.last_mut() {
                None => return Some(datum),
                Some(Context::List(items)) => {
                    items.push(datum);
                    return None;
                }
                Some(Context::Quote(_)) => {}
            }
            if let Some(Context::Quote(kind)) = self.stack.pop() {
                datum = self.quotes.wrap(kind, datum);
            }
        }
    }

    fn atom(&self, text: &str) -> Value {
        if let Some(value) = self.factories.iter().find_map(|factory| factory(text)) {
            return value;
        }
        if looks_numeric(text)
            && let Ok(n) = text.parse::<f64>()
        {
            return Value::Number(n);
        }
        Value::Symbol(self.symbols.intern(text))
    }

    fn fail(
        &mut self,
        kind: ParseErrorKind,
        message: impl Into<String>,
        offset: usize,
    ) -> crate::Error {
        self.failed = true;
        ParseError::new(kind, message, offset).into()
    }
}
