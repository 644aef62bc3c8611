use thiserror::Error;

use crate::op::Op;

/// Errors raised while encoding or decoding raw bytecode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BytecodeError {
    #[error("bytecode ends inside the instruction at offset {offset}")]
    UnexpectedEof { offset: usize },

    #[error("unknown opcode {byte} at offset {offset}")]
    UnknownOpcode { offset: usize, byte: u8 },

    #[error("argument presence does not match opcode {op}")]
    ArityMismatch { op: Op },

    #[error("closure has {actual} cells but the code has {expected} free variables")]
    ClosureArityMismatch { expected: usize, actual: usize },
}
