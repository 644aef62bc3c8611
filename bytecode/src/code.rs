use std::collections::HashMap;

use bitflags::bitflags;

use crate::constant::Constant;
use crate::error::BytecodeError;
use crate::line_table::LineTable;

bitflags! {
    /// Code object flag bits understood by the VM.
    #[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
    pub struct CodeFlags: u32 {
        const OPTIMIZED = 0x0001;
        const NEWLOCALS = 0x0002;
        const VARARGS = 0x0004;
        const VARKEYWORDS = 0x0008;
        const NESTED = 0x0010;
        const GENERATOR = 0x0020;
        const NOFREE = 0x0040;
        const COROUTINE = 0x0080;
        const ITERABLE_COROUTINE = 0x0100;
    }
}

/// An executable unit: encoded instructions plus everything they index.
///
/// Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeUnit {
    pub name: String,
    pub filename: String,
    pub first_line: u32,
    pub bytecode: Box<[u8]>,
    pub line_table: LineTable,
    pub constants: Box<[Constant]>,
    pub names: Box<[String]>,
    pub varnames: Box<[String]>,
    pub freevars: Box<[String]>,
    pub cellvars: Box<[String]>,
    pub arg_count: u32,
    pub kwonly_arg_count: u32,
    pub local_count: u32,
    pub stack_size: u32,
    pub flags: CodeFlags,
}

impl CodeUnit {
    /// Source line of the instruction at `offset`.
    pub fn line_for_offset(&self, offset: usize) -> u32 {
        self.line_table.line_for_offset(self.first_line, offset)
    }
}

/// The enclosing namespace a function resolves its globals in.
pub type Namespace = HashMap<String, Constant>;

/// A closure cell. Empty until the enclosing scope stores into it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cell {
    pub contents: Option<Constant>,
}

impl Cell {
    pub fn new(value: Constant) -> Self {
        Self {
            contents: Some(value),
        }
    }

    pub fn empty() -> Self {
        Self { contents: None }
    }
}

/// A callable unit: a [`CodeUnit`] bound to globals, defaults and closure
/// cells.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionUnit {
    code: CodeUnit,
    globals: Namespace,
    name: Option<String>,
    defaults: Vec<Constant>,
    closure: Vec<Cell>,
}

impl FunctionUnit {
    /// Bind `code` into a callable.
    ///
    /// The closure must hold exactly one cell per free variable of the code.
    pub fn new(
        code: CodeUnit,
        globals: Namespace,
        name: Option<String>,
        defaults: Vec<Constant>,
        closure: Vec<Cell>,
    ) -> Result<Self, BytecodeError> {
        if closure.len() != code.freevars.len() {
            return Err(BytecodeError::ClosureArityMismatch {
                expected: code.freevars.len(),
                actual: closure.len(),
            });
        }
        Ok(Self {
            code,
            globals,
            name,
            defaults,
            closure,
        })
    }

    pub fn code(&self) -> &CodeUnit {
        &self.code
    }

    pub fn globals(&self) -> &Namespace {
        &self.globals
    }

    /// The display name: the override if one was given, else the code's.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.code.name)
    }

    pub fn defaults(&self) -> &[Constant] {
        &self.defaults
    }

    pub fn closure(&self) -> &[Cell] {
        &self.closure
    }

    pub fn into_code(self) -> CodeUnit {
        self.code
    }
}
