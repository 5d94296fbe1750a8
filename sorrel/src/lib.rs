pub mod common;
pub mod compiler;
pub mod config;
pub mod error;
pub mod vm;

pub use common::source::Source;
pub use common::value::Value;
pub use config::Config;
pub use error::SorrelError;
pub use vm::VM;
