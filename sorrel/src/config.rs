use std::fmt;
use std::rc::Rc;

const DEFAULT_FILE_NAME: &str = "script";

/// Where the VM sends the output of `print` statements.
///
/// The default sink writes to the process's stdout; tests swap in
/// a buffering sink to capture output.
pub trait SorrelFile: fmt::Debug {
    fn write(&self, msg: &str);
}

#[derive(Debug)]
pub struct Stdout;

impl SorrelFile for Stdout {
    fn write(&self, msg: &str) {
        println!("{}", msg);
    }
}

#[derive(Debug)]
pub struct Config {
    pub repl: bool,
    pub default_filename: String,
    pub stdout: Rc<dyn SorrelFile>,
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            repl: false,
            default_filename: DEFAULT_FILE_NAME.to_string(),
            stdout: Rc::new(Stdout),
        }
    }

    pub fn with_stdout(stdout: Rc<dyn SorrelFile>) -> Self {
        Self {
            stdout,
            ..Config::new()
        }
    }
}
