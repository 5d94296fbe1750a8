pub mod eval;
pub mod stack;
pub mod trace;
pub mod vm;

pub use trace::Trace;
pub use vm::{VM, MAX_FRAMES, MAX_STACK};
