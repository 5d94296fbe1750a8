//! End-to-end snippet runner.
//!
//! Every `.srl` file under `snippets/` is compiled and run in a fresh
//! VM. Expectations live in comments inside the snippet itself:
//!
//! ```text
//! print 1 + 2; // expect: 3
//! var = 4;     // expect error: Expect variable name.
//! missing();   // expect runtime error: Undefined variable 'missing'.
//! ```
//!
//! Run directly (`cargo run -p tests`) for a colored report, or let
//! `cargo test` drive the same suite.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use colored::Colorize;
use lazy_static::lazy_static;
use regex::Regex;

use sorrel::config::{Config, SorrelFile};
use sorrel::{SorrelError, VM};

lazy_static! {
    static ref EXPECT: Regex = Regex::new(r"// expect: ?(.*)").unwrap();
    static ref EXPECT_ERROR: Regex = Regex::new(r"// expect error: ?(.*)").unwrap();
    static ref EXPECT_RUNTIME_ERROR: Regex =
        Regex::new(r"// expect runtime error: ?(.*)").unwrap();
}

/// Collects everything the VM prints instead of writing to stdout.
#[derive(Debug, Default)]
struct Capture {
    lines: RefCell<Vec<String>>,
}

impl SorrelFile for Capture {
    fn write(&self, msg: &str) {
        self.lines.borrow_mut().push(msg.to_string());
    }
}

/// What a snippet's comments claim it should do.
#[derive(Debug, Default)]
struct Expected {
    output: Vec<String>,
    errors: Vec<String>,
    runtime_error: Option<String>,
}

fn parse_expectations(src: &str) -> Expected {
    let mut expected = Expected::default();

    for line in src.lines() {
        if let Some(captures) = EXPECT_RUNTIME_ERROR.captures(line) {
            expected.runtime_error = Some(captures[1].trim_end().to_string());
        } else if let Some(captures) = EXPECT_ERROR.captures(line) {
            expected.errors.push(captures[1].trim_end().to_string());
        } else if let Some(captures) = EXPECT.captures(line) {
            expected.output.push(captures[1].trim_end().to_string());
        }
    }

    expected
}

fn run_snippet(path: &Path) -> Result<(), Vec<String>> {
    let src = match fs::read_to_string(path) {
        Ok(src) => src,
        Err(err) => return Err(vec![format!("could not read snippet: {}", err)]),
    };
    let expected = parse_expectations(&src);

    let capture = Rc::new(Capture::default());
    let config = Config::with_stdout(Rc::clone(&capture) as Rc<dyn SorrelFile>);
    let mut vm = VM::with_config(Rc::new(config));

    let mut failures = vec![];
    let result = vm.exec(&src);

    match result {
        Ok(_) => {
            if !expected.errors.is_empty() {
                failures.push("expected a compile error, but the snippet compiled".to_string());
            }
            if let Some(message) = &expected.runtime_error {
                failures.push(format!(
                    "expected runtime error '{}', but the snippet ran to completion",
                    message
                ));
            }
        }
        Err(err @ SorrelError::Compile(_)) => {
            let rendered = err.to_string();
            if expected.errors.is_empty() {
                failures.push(format!("unexpected compile error:\n{}", rendered));
            } else {
                for message in &expected.errors {
                    if !rendered.contains(message.as_str()) {
                        failures.push(format!(
                            "missing compile error '{}' in:\n{}",
                            message, rendered
                        ));
                    }
                }
            }
        }
        Err(SorrelError::Runtime(trace)) => match &expected.runtime_error {
            Some(message) => {
                if &trace.message != message {
                    failures.push(format!(
                        "expected runtime error '{}', got '{}'",
                        message, trace.message
                    ));
                }
            }
            None => failures.push(format!("unexpected runtime error:\n{}", trace)),
        },
        Err(err) => failures.push(format!("unexpected error: {}", err)),
    }

    let output = capture.lines.borrow();
    if *output != expected.output {
        failures.push(format!(
            "expected output {:?}, got {:?}",
            expected.output, output
        ));
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(failures)
    }
}

fn snippet_files() -> Vec<PathBuf> {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("snippets");
    let entries = fs::read_dir(&dir).expect("could not read the snippets directory");

    let mut files: Vec<PathBuf> = entries
        .map(|entry| entry.expect("could not read snippet path").path())
        .filter(|path| path.extension().map_or(false, |ext| ext == "srl"))
        .collect();

    files.sort();
    files
}

fn run_suite() -> bool {
    let files = snippet_files();
    println!("Running {} snippet(s)...\n", files.len());

    let mut failed = 0;
    for path in &files {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        match run_snippet(path) {
            Ok(()) => println!("{} {}", "pass".green(), name),
            Err(failures) => {
                failed += 1;
                println!("{} {}", "FAIL".red(), name);
                for failure in failures {
                    println!("     {}", failure);
                }
            }
        }
    }

    println!();
    if failed == 0 {
        println!("{}", format!("{} passed", files.len()).green());
    } else {
        println!(
            "{}",
            format!("{} passed, {} failed", files.len() - failed, failed).red()
        );
    }

    failed == 0
}

fn main() {
    if !run_suite() {
        std::process::exit(1);
    }
}

#[test]
fn end_to_end_snippets() {
    assert!(run_suite(), "one or more snippets failed");
}
