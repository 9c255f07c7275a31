use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use sexpr::{Environment, Interpreter, Style, Value};
use std::path::PathBuf;

/// Settings for one REPL run.
struct ReplConfig {
    prompt: &'static str,
    continuation_prompt: &'static str,
    /// Where line history is kept; `None` disables persistence.
    history_file: Option<PathBuf>,
    echo_style: Style,
}

impl ReplConfig {
    /// Defaults, with the history file taken from `SEXPR_HISTORY` if set.
    fn from_env() -> Self {
        ReplConfig {
            prompt: "sexpr> ",
            continuation_prompt: "   ... ",
            history_file: std::env::var_os("SEXPR_HISTORY").map(PathBuf::from),
            echo_style: Style::Inspect,
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    // Only initialize if RUST_LOG is set
    if std::env::var("RUST_LOG").is_ok() {
        let filter = EnvFilter::from_default_env();
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true))
            .with(filter)
            .init();
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let config = ReplConfig::from_env();

    println!("sexpr v{}", env!("CARGO_PKG_VERSION"));
    println!("Type expressions to evaluate them, :help for commands, Ctrl+D to exit.");
    println!();

    let mut rl = DefaultEditor::new()?;
    if let Some(path) = &config.history_file {
        let _ = rl.load_history(path);
    }
    let mut interpreter = Interpreter::new();

    loop {
        let prompt = if interpreter.is_clean() {
            config.prompt
        } else {
            config.continuation_prompt
        };
        match rl.readline(prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                // Add the line to history
                let _ = rl.add_history_entry(trimmed);

                // Handle special commands, only between datums
                if interpreter.is_clean() {
                    match trimmed {
                        ":help" => {
                            print_help();
                            continue;
                        }
                        ":env" => {
                            print_environment(interpreter.global(), config.echo_style);
                            continue;
                        }
                        ":quit" | ":exit" => {
                            println!("Goodbye!");
                            break;
                        }
                        _ => {}
                    }
                }

                match interpreter.feed(&format!("{line}\n")) {
                    Ok(results) => {
                        for result in results {
                            println!("{}", result.to_string_with(config.echo_style));
                        }
                    }
                    Err(e) => println!("Error: {}", e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                if interpreter.is_clean() {
                    println!("Interrupted. Use Ctrl+D or :quit to exit.");
                } else {
                    interpreter.reset_reader();
                    println!("Input discarded.");
                }
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    if let Some(path) = &config.history_file {
        let _ = rl.save_history(path);
    }
    Ok(())
}

fn print_help() {
    println!("Commands:");
    println!("  :help    - Show this help message");
    println!("  :env     - Show global bindings");
    println!("  :quit    - Exit the interpreter");
    println!("  :exit    - Exit the interpreter");
    println!();
    println!("Syntax:");
    println!("  Numbers: 42, 3.14, -5, .5");
    println!("  Strings: \"hello\\nworld\"");
    println!("  Lists: (1 2 3), '(a b), nil");
    println!("  Quoting: 'x, `(a ,b ,@c)");
    println!("  Comments: ; to end of line");
    println!();
    println!("Examples:");
    println!("  (+ 1 2 3)");
    println!("  (define square (lambda (x) (* x x)))");
    println!("  (square 5)");
    println!("  (define when (macro (c *body) `(if ,c (progn ,@body))))");
    println!("  ((label fact (lambda (n) (if (< n 2) 1 (* n (fact (- n 1)))))) 10)");
}

fn print_environment(env: &Environment, style: Style) {
    for name in env.names() {
        match env.shallow_lookup(&name) {
            Some(value @ Value::Procedure(_)) => println!("  {name}: {value}"),
            Some(value) => println!("  {name} = {}", value.to_string_with(style)),
            None => {}
        }
    }
}
