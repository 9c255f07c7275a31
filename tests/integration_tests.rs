use pretty_assertions::assert_eq;
use sexpr::ast::Extension;
use sexpr::{
    Environment, Error, EvalError, InputStream, Interpreter, ParseErrorKind, Parser, Style,
    SymbolTable, Value, printer,
};
use std::any::Any;
use std::fmt;

/// Helper function to evaluate source in a fresh session
fn eval_fresh(input: &str) -> Result<Value, Error> {
    Interpreter::new().eval_str(input)
}

/// Helper function to evaluate and print the result
fn eval_printed(input: &str) -> String {
    eval_fresh(input).unwrap().to_string()
}

fn parse_kind(input: &str) -> ParseErrorKind {
    match Parser::new(SymbolTable::new()).parse_all(input) {
        Err(Error::ParseError(e)) => e.kind,
        other => panic!("expected a parse error, got {:?}", other),
    }
}

#[test]
fn test_basic_arithmetic() {
    assert_eq!(eval_fresh("(+ 1 2 3)").unwrap(), Value::Number(6.0));
    assert_eq!(eval_fresh("(- 10 3 2)").unwrap(), Value::Number(5.0));
    assert_eq!(eval_fresh("(* 2 3 4)").unwrap(), Value::Number(24.0));
    assert_eq!(eval_fresh("(- 5)").unwrap(), Value::Number(-5.0));
    assert_eq!(eval_fresh("(+ (* 2 3) (- 8 2))").unwrap(), Value::Number(12.0));
}

#[test]
fn test_print_parse_round_trip() {
    let sources = [
        "(a (b \"c\\n\" 1.5) () 'd `(e ,f ,@g))",
        "(define square (lambda (x) (* x x)))",
        "((nested (deeply (here))) -3 0.25)",
        "\"quote \\\" and backslash \\\\\"",
    ];
    for source in sources {
        let table = SymbolTable::new();
        let mut parser = Parser::new(table);
        let first = parser.parse_all(source).unwrap().remove(0);
        let printed = printer::to_string(&first, Style::Inspect);
        let second = parser.parse_all(&printed).unwrap().remove(0);
        assert_eq!(second, first, "round trip of {source}");
        assert_eq!(printer::to_string(&second, Style::Inspect), printed);
    }
}

#[test]
fn test_double_quote_evaluates_to_single_quote() {
    let mut interpreter = Interpreter::new();
    let once = interpreter.eval_str("''x").unwrap();
    assert_eq!(once.to_string(), "'x");
    let twice = interpreter.eval(&once).unwrap();
    assert!(twice.is_eq(&Value::Symbol(interpreter.symbols().intern("x"))));
}

#[test]
fn test_symbols_intern_per_table() {
    let table = SymbolTable::new();
    let mut parser = Parser::new(table.clone());
    let values = parser.parse_all("foo foo").unwrap();
    assert!(values[0].is_eq(&values[1]));

    let mut other = Parser::new(SymbolTable::new());
    let foreign = other.parse_all("foo").unwrap().remove(0);
    assert!(!values[0].is_eq(&foreign));
    assert_ne!(values[0], foreign);
    assert_eq!(values[0].to_string(), foreign.to_string());
}

#[test]
fn test_environment_shadowing() {
    let source = "
        (define x 'outer)
        (define get-x (lambda () x))
        ((lambda (x) (list x (get-x))) 'inner)";
    assert_eq!(eval_printed(source), "(inner outer)");
}

#[test]
fn test_failed_deep_update_leaves_chain_unchanged() {
    let root = Environment::create();
    let child = root.derive();
    assert!(!child.deep_update("missing", Value::Number(1.0)));
    assert!(root.names().is_empty());
    assert!(child.names().is_empty());

    assert_eq!(
        eval_fresh("(set! missing 1)").unwrap_err(),
        Error::EvalError(EvalError::UnboundUpdate("missing".to_string()))
    );
}

#[test]
fn test_lambda_arity_and_variadic() {
    assert_eq!(
        eval_fresh("((lambda (a b) a) 1)").unwrap_err(),
        Error::arity("lambda", 2, 1)
    );
    assert_eq!(
        eval_fresh("((lambda (a b) a) 1 2 3)").unwrap_err(),
        Error::arity("lambda", 2, 3)
    );
    assert_eq!(
        eval_printed("((lambda (a *rest) (list a rest)) 1 2 3)"),
        "(1 (2 3))"
    );
}

#[test]
fn test_quasiquote() {
    assert_eq!(eval_printed("`(1 ,(+ 1 1) ,@(list 3 4))"), "(1 2 3 4)");
}

#[test]
fn test_redundant_paren_leaves_reader_unclean() {
    let mut parser = Parser::new(SymbolTable::new());
    let mut stream = InputStream::from("1 )");
    assert_eq!(parser.parse(&mut stream).unwrap(), Some(Value::Number(1.0)));
    let err = parser.parse(&mut stream).unwrap_err();
    assert!(matches!(err, Error::ParseError(ref e) if e.kind == ParseErrorKind::RedundantParen));
    assert!(!parser.clean());
    parser.reset();
    assert!(parser.clean());

    assert_eq!(parse_kind("(a))"), ParseErrorKind::RedundantParen);
    assert_eq!(parse_kind("(a (b"), ParseErrorKind::UnterminatedList);
    assert_eq!(parse_kind("(a '"), ParseErrorKind::DanglingQuote);
    assert_eq!(parse_kind("'"), ParseErrorKind::DanglingQuote);
    assert_eq!(parse_kind("\"abc"), ParseErrorKind::UnterminatedString);
}

#[test]
fn test_reading_a_long_list() {
    let items: Vec<String> = (0..300_000).map(|n| n.to_string()).collect();
    let source = format!("'({})", items.join(" "));
    let mut interpreter = Interpreter::new();
    let list = interpreter.eval_str(&source).unwrap();
    assert_eq!(list.len(), 300_000);
    let again = interpreter.eval_str(&source).unwrap();
    assert!(list == again);
    drop(list);
    drop(again);
    drop(interpreter);
}

#[test]
fn test_recursion_through_define() {
    let source = "
        (define fib (lambda (n) (if (< n 2) n (+ (fib (- n 1)) (fib (- n 2))))))
        (fib 15)";
    assert_eq!(eval_fresh(source).unwrap(), Value::Number(610.0));
}

#[test]
fn test_recursion_through_label() {
    let source = "
        ((label fact (lambda (n) (if (< n 2) 1 (* n (fact (- n 1))))))
         6)";
    assert_eq!(eval_fresh(source).unwrap(), Value::Number(720.0));
}

#[test]
fn test_higher_order_functions() {
    let source = "
        (define map (lambda (f xs)
          (if (null? xs) nil (cons (f (car xs)) (map f (cdr xs))))))
        (map (lambda (x) (* x x)) '(1 2 3 4))";
    assert_eq!(eval_printed(source), "(1 4 9 16)");
}

#[test]
fn test_macros_build_control_flow() {
    let source = "
        (define while (macro (test *body)
          `((label loop (lambda ()
              (if ,test (progn ,@body (loop)) nil))))))
        (define i 0)
        (define total 0)
        (while (< i 5) (set! total (+ total i)) (set! i (+ i 1)))
        total";
    assert_eq!(eval_fresh(source).unwrap(), Value::Number(10.0));
}

#[test]
fn test_incremental_session() {
    let mut interpreter = Interpreter::new();
    assert!(interpreter.feed("(define greeting").unwrap().is_empty());
    assert!(interpreter.feed("  \"multi").unwrap().is_empty());
    assert!(!interpreter.is_clean());
    let results = interpreter.feed("line\")\ngreeting\n").unwrap();
    let printed: Vec<String> = results.iter().map(|v| v.to_string_with(Style::Display)).collect();
    assert_eq!(printed, vec!["greeting".to_string(), "multiline".to_string()]);
    assert!(interpreter.is_clean());
}

#[test]
fn test_error_cases() {
    assert!(matches!(
        eval_fresh("(1 2)"),
        Err(Error::EvalError(EvalError::NotAProcedure(_)))
    ));
    assert!(matches!(
        eval_fresh("nope"),
        Err(Error::EvalError(EvalError::UnknownSymbol(_)))
    ));
    assert!(matches!(
        eval_fresh("(lambda (1) 1)"),
        Err(Error::EvalError(EvalError::BadParameter { .. }))
    ));
    assert!(matches!(
        eval_fresh("(+ 1 \"2\")"),
        Err(Error::EvalError(EvalError::Type { .. }))
    ));
    assert!(eval_fresh("(").unwrap_err().is_parse_error());
}

#[test]
fn test_truthiness() {
    assert_eq!(eval_printed("(if '() 'yes 'no)"), "no");
    assert_eq!(eval_printed("(if 0 'yes 'no)"), "yes");
    assert_eq!(eval_printed("(if \"\" 'yes 'no)"), "yes");
    assert_eq!(eval_printed("(if 'nil 'yes 'no)"), "yes");
}

#[test]
fn test_self_evaluating_forms() {
    assert_eq!(eval_printed("42"), "42");
    assert_eq!(eval_printed("\"str\""), "\"str\"");
    assert_eq!(eval_printed("()"), "()");
    assert_eq!(eval_printed("car"), "#<procedure car>");
}

#[derive(Debug)]
struct Keyword(String);

impl Extension for Keyword {
    fn type_name(&self) -> &str {
        "keyword"
    }

    fn print(&self, out: &mut dyn fmt::Write, _style: Style) -> fmt::Result {
        write!(out, ":{}", self.0)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn test_extension_atoms() {
    let mut interpreter = Interpreter::new();
    interpreter.parser_mut().register_extension(|token| {
        token
            .strip_prefix(':')
            .filter(|name| !name.is_empty())
            .map(|name| Value::extension(Keyword(name.to_string())))
    });
    let value = interpreter.eval_str("(list :key 'sym)").unwrap();
    assert_eq!(value.to_string(), "(:key sym)");
    let head = value.head().unwrap();
    assert_eq!(head.type_name(), "keyword");
    assert_eq!(head.downcast_extension::<Keyword>().unwrap().0, "key");
}
