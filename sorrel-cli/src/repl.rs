//! REPL for the Sorrel programming language.

use colored::Colorize;
use rustyline::{error::ReadlineError, Editor};
use sorrel::{SorrelError, Value, VM};

/// Repl's line prompt.
const PROMPT: &str = "> ";
/// Line continuation prompt.
const CONTINUE: &str = "| ";

/// help command.
const HELP: &str = ".help";

enum ReplResult<T> {
    Ok(T),
    Error(SorrelError),
    Eof,
    Interrupted,
}

pub struct Repl<'a> {
    vm: VM,
    lines: Vec<String>,
    prompt: &'a str,
}

impl<'a> Repl<'a> {
    pub fn new(vm: VM) -> Self {
        Repl {
            vm,
            lines: vec![],
            prompt: PROMPT,
        }
    }

    /// Fire up the REPL.
    pub fn run(&mut self) {
        self.print_welcome();

        let mut editor = Editor::<()>::new();

        loop {
            match self.readline(&mut editor) {
                ReplResult::Ok(_) => {
                    self.reset();
                    continue;
                }
                ReplResult::Error(err) => {
                    err.emit();
                    self.reset();
                    continue;
                }
                ReplResult::Eof => {
                    println!("Goodbye!");
                    break;
                }
                ReplResult::Interrupted => {
                    self.reset();
                    continue;
                }
            }
        }
    }

    /// Read a line, also handling multiline input.
    fn readline(&mut self, editor: &mut Editor<()>) -> ReplResult<()> {
        let line = editor.readline(self.prompt);

        match line {
            Ok(line) if line == HELP => {
                self.print_help();
                editor.add_history_entry(line);
                ReplResult::Ok(())
            }
            Ok(line) => {
                self.lines.push(line.clone());
                editor.add_history_entry(line);

                match self.eval() {
                    Ok(_) => ReplResult::Ok(()),
                    Err(err) => {
                        // An error caused by running out of input means
                        // the user meant to keep typing.
                        if err.is_unexpected_eof() {
                            self.prompt = CONTINUE;

                            self.readline(editor)
                        } else {
                            ReplResult::Error(err)
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => ReplResult::Interrupted,
            Err(ReadlineError::Eof) => ReplResult::Eof,
            Err(err) => ReplResult::Error(SorrelError::Io(err.to_string())),
        }
    }

    /// The evil, err, _eval_ part of REPL.
    fn eval(&mut self) -> Result<(), SorrelError> {
        let result = self.vm.exec(&self.lines.join("\n"))?;

        if result != Value::Nil {
            println!("{}", self.vm.stringify(&result));
        }

        Ok(())
    }

    /// Reset the REPL's state.
    fn reset(&mut self) {
        self.lines.clear();
        self.prompt = PROMPT;
    }

    /// Print out a help message.
    fn print_help(&mut self) {
        println!("Press Ctrl+C to abort current expression, Ctrl+D to exit the REPL");
    }

    /// Print out Sorrel's welcome message.
    fn print_welcome(&mut self) {
        println!("{}", BANNER.green());
        println!(
            "Welcome to Sorrel! (Version {})",
            env!("CARGO_PKG_VERSION")
        );
        println!("type '{}' for more information, press Ctrl+D to exit", HELP);
        println!();
    }
}

/// VM's welcome banner.
const BANNER: &str = r#"
                              _
 ___  ___  _ __ _ __ ___  ___| |
/ __|/ _ \| '__| '__/ _ \/ _ \ |
\__ \ (_) | |  | | |  __/  __/ |
|___/\___/|_|  |_|  \___|\___|_|"#;
