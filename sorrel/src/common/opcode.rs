#[repr(u8)]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Opcode {
    LoadConst,
    Del,

    True,
    False,
    Nil,

    Neg,
    Not,
    Add,
    Sub,
    Mul,
    Div,
    CmpLT,
    CmpLTEq,
    CmpEq,

    DefGlobal,
    LoadGlobal,
    SaveGlobal,

    LoadLocal,
    SaveLocal,

    JumpIfFalse,
    Jump,

    Call,
    Return,

    BuildMap,
    LoadField,
    SaveField,
    LoadIndex,
    SaveIndex,

    Print,

    /// Reserved for closure support; the compiler never emits it yet.
    Closure,
}

impl From<u8> for Opcode {
    /// convert a raw byte into an opcode.
    /// Note that non-opcode bytes should never be interpreted as opcodes (will break).
    fn from(op: u8) -> Opcode {
        unsafe { std::mem::transmute(op) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_round_trip() {
        assert_eq!(Opcode::from(Opcode::LoadConst as u8), Opcode::LoadConst);
        assert_eq!(Opcode::from(Opcode::Print as u8), Opcode::Print);
        assert_eq!(Opcode::from(Opcode::Closure as u8), Opcode::Closure);
    }
}
