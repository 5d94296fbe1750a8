//! Module containing datastructures and utilities shared by the
//! compiler and the virtual machine.

pub mod chunk;
pub use chunk::Chunk;

pub mod opcode;
pub use opcode::Opcode;

pub mod source;
pub use source::Source;

pub mod span;
pub use span::Span;

pub mod value;
pub use value::{Value, ValueArray};

pub mod table;
pub use table::{HashIndex, Table};

pub mod heap;
pub use heap::{hash_bytes, FunObj, Handle, Heap, MapObj, Object, StrObj};

pub mod native;
pub use native::NativeFunction;
