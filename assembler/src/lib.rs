//! Text assembler for the stack VM.
//!
//! Source is written in the layout the disassembler prints, so disassembler
//! output can be fed straight back in:
//!
//! ```
//! use assembler::{Assembler, CodeInfo};
//!
//! let mut asm = Assembler::new();
//! asm.assemble("LOAD_CONST #None\nRETURN_VALUE")?;
//! let code = asm.build_code(CodeInfo::default())?;
//! assert_eq!(&*code.bytecode, &[100, 0, 0, 83]);
//! # Ok::<(), assembler::AsmError>(())
//! ```

mod assembler;
mod error;
mod line;
mod listing;
mod literal;
mod resolve;
mod symbols;
mod unit;

pub use assembler::{
    Argument, Assembler, AssemblerOptions, Diagnostic, DiagnosticKind, Instruction,
};
pub use error::AsmError;
pub use line::{CodeLine, SourceLine, parse_line};
pub use listing::Listing;
pub use literal::{parse_constant, parse_constant_prefix};
pub use symbols::{MAX_ENTRIES, SymbolTable, TableKind};
pub use unit::{CodeInfo, FunctionInfo};

pub use bytecode;
