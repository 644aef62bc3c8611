use core::fmt;

use crate::op::{ArgKind, Op};

/// One instruction read back from a byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// Byte offset of the opcode.
    pub offset: usize,
    pub op: Op,
    pub arg: Option<u16>,
}

impl Instruction {
    #[inline]
    pub fn size(&self) -> usize {
        self.op.size()
    }

    /// Offset of the following instruction.
    #[inline]
    pub fn next_offset(&self) -> usize {
        self.offset + self.size()
    }

    /// Byte offset this instruction jumps to, if it is a jump.
    pub fn jump_target(&self) -> Option<usize> {
        let arg = self.arg? as usize;
        match self.op.arg_kind() {
            ArgKind::AbsJump => Some(arg),
            ArgKind::RelJump => Some(self.next_offset() + arg),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.arg {
            Some(arg) => write!(f, "{} {arg}", self.op),
            None => write!(f, "{}", self.op),
        }
    }
}
