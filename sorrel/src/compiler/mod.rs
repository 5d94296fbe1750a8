pub mod error;
pub mod parser;
pub mod scanner;
pub mod token;

pub use error::{ErrorContext, SyntaxError};
pub use parser::{compile, compile_repl};
pub use scanner::Scanner;
pub use token::{Token, TokenKind};
