use bytecode::{BytecodeError, Op};
use thiserror::Error;

use crate::symbols::TableKind;

/// Errors raised while assembling source text or building units from it.
///
/// Variants tied to a source line carry the auto-assigned line number, not
/// any number written in the text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AsmError {
    #[error("line {line}: {reason}")]
    MalformedLine { line: u32, reason: String },

    #[error("line {line}: no such opcode: {name}")]
    UnknownOpcode { line: u32, name: String },

    #[error("line {line}: opcode {op} {}", arity_text(.takes_arg))]
    ArgumentArity { line: u32, op: Op, takes_arg: bool },

    #[error("line {line}: argument {value} is outside 0..=65535")]
    ArgumentRange { line: u32, value: i64 },

    #[error("line {line}: no such entry '{name}' in {table}")]
    UndefinedSymbol {
        line: u32,
        table: TableKind,
        name: String,
    },

    #[error("line {line}: {op} is not a valid comparison operator")]
    UnknownCompareOp { line: u32, op: String },

    #[error("line {line}: label '{label}' is already defined")]
    DuplicateLabel { line: u32, label: String },

    #[error("line {line}: unassigned label '{label}'")]
    UndefinedLabel { line: u32, label: String },

    #[error("unassigned labels: {}", .labels.join(", "))]
    IncompleteAssembly { labels: Vec<String> },

    #[error("a code unit must start at offset 0, not {first_offset}")]
    PartialUnit { first_offset: usize },

    #[error("closure has {actual} cells but there are {expected} free variables")]
    ClosureArityMismatch { expected: usize, actual: usize },

    #[error("corrupt assembler state at offset {offset}: {reason}")]
    CorruptState { offset: usize, reason: String },
}

fn arity_text(takes_arg: &bool) -> &'static str {
    if *takes_arg {
        "requires an argument"
    } else {
        "takes no argument"
    }
}

impl From<BytecodeError> for AsmError {
    fn from(err: BytecodeError) -> Self {
        match &err {
            BytecodeError::ClosureArityMismatch { expected, actual } => {
                AsmError::ClosureArityMismatch {
                    expected: *expected,
                    actual: *actual,
                }
            }
            BytecodeError::UnexpectedEof { offset }
            | BytecodeError::UnknownOpcode { offset, .. } => AsmError::CorruptState {
                offset: *offset,
                reason: err.to_string(),
            },
            BytecodeError::ArityMismatch { .. } => AsmError::CorruptState {
                offset: 0,
                reason: err.to_string(),
            },
        }
    }
}
