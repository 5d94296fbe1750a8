use rustc_hash::FxHashMap;

use crate::common::heap::Handle;
use crate::common::value::{Value, ValueArray};

/// A chunk of bytecode and its associated data.
///
/// `lines` and `columns` run parallel to `code`: every emitted byte
/// records the source position of the token it was emitted for, so
/// runtime errors can point back into the source.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Chunk {
    /// An array where each byte is either an Opcode or an operand.
    pub code: Vec<u8>,
    pub lines: Vec<u32>,
    pub columns: Vec<u32>,
    /// The chunk's constant pool.
    pub constants: ValueArray,
    /// Identifier constants mapped to their location in the pool.
    identifiers: FxHashMap<Handle, usize>,
}

impl Chunk {
    pub fn new() -> Self {
        Chunk::default()
    }

    pub fn emit(&mut self, byte: u8, line: u32, column: u32) {
        self.code.push(byte);
        self.lines.push(line);
        self.columns.push(column);
    }

    /// Add a [`Value`] to this [`Chunk`]'s constant pool, returning
    /// its index. Equal constants are reused.
    pub fn add_constant(&mut self, value: Value) -> usize {
        self.constants.add(value, false)
    }

    /// Add an interned identifier to the constant pool, returning its
    /// index. If the identifier is already in the pool, returns that
    /// index.
    pub fn add_identifier(&mut self, handle: Handle) -> usize {
        if let Some(index) = self.identifiers.get(&handle) {
            *index
        } else {
            let index = self.constants.add(Value::Object(handle), true);
            self.identifiers.insert(handle, index);
            index
        }
    }

    /// Overwrite a previously emitted placeholder byte.
    pub fn patch(&mut self, offset: usize, byte: u8) {
        self.code[offset] = byte;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_tracks_positions() {
        let mut chunk = Chunk::new();
        chunk.emit(7, 1, 4);
        chunk.emit(9, 2, 1);

        assert_eq!(chunk.code, vec![7, 9]);
        assert_eq!(chunk.lines, vec![1, 2]);
        assert_eq!(chunk.columns, vec![4, 1]);
    }

    #[test]
    fn identifier_constants_dedup() {
        let mut chunk = Chunk::new();
        let a = Handle::new(0, 0);
        let b = Handle::new(1, 0);

        let first = chunk.add_identifier(a);
        let second = chunk.add_identifier(b);
        let third = chunk.add_identifier(a);

        assert_eq!(first, third);
        assert_ne!(first, second);
        assert_eq!(chunk.constants.len(), 2);
    }
}
