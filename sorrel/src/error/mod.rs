use std::fmt;

use crate::compiler::SyntaxError;
use crate::vm::Trace;

pub mod renderer;

pub use renderer::Renderer;

/// Everything that can go wrong between a source string and a result.
#[derive(Debug, Clone, PartialEq)]
pub enum SorrelError {
    /// One or more syntax errors; compilation produced nothing.
    Compile(Vec<SyntaxError>),
    /// A fatal error during execution.
    Runtime(Trace),
    /// The embedding boundary could not read a source file.
    Io(String),
}

impl SorrelError {
    /// Report this error on stderr, colored when the terminal
    /// supports it.
    pub fn emit(&self) {
        use termcolor::{ColorChoice, StandardStream};

        let mut stderr = StandardStream::stderr(ColorChoice::Auto);
        let _ = Renderer::new(&mut stderr).render(self);
    }

    /// Whether this is a compile error caused by running out of
    /// input, which a REPL treats as "keep typing" rather than a
    /// mistake.
    pub fn is_unexpected_eof(&self) -> bool {
        match self {
            SorrelError::Compile(errors) => errors
                .iter()
                .any(|error| error.context == crate::compiler::ErrorContext::End),
            _ => false,
        }
    }
}

impl fmt::Display for SorrelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SorrelError::Compile(errors) => {
                let mut first = true;
                for error in errors {
                    if !first {
                        writeln!(f)?;
                    }
                    first = false;
                    write!(f, "{}", error)?;
                }
                Ok(())
            }
            SorrelError::Runtime(trace) => write!(f, "{}", trace),
            SorrelError::Io(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for SorrelError {}

impl From<Trace> for SorrelError {
    fn from(trace: Trace) -> Self {
        SorrelError::Runtime(trace)
    }
}
