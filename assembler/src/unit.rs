use bytecode::{Cell, CodeFlags, CodeUnit, Constant, FunctionUnit, Namespace};

use crate::assembler::Assembler;
use crate::error::AsmError;

/// Metadata for [`Assembler::build_code`] that the source text does not
/// carry.
#[derive(Debug, Clone)]
pub struct CodeInfo {
    pub arg_count: u32,
    pub kwonly_arg_count: u32,
    pub local_count: u32,
    pub stack_size: u32,
    pub flags: CodeFlags,
    pub name: String,
    pub cellvars: Vec<String>,
}

impl Default for CodeInfo {
    fn default() -> Self {
        Self {
            arg_count: 0,
            kwonly_arg_count: 0,
            local_count: 0,
            stack_size: 0,
            flags: CodeFlags::empty(),
            name: "<module>".into(),
            cellvars: Vec::new(),
        }
    }
}

/// What [`Assembler::build_function`] binds the code to.
#[derive(Debug, Clone, Default)]
pub struct FunctionInfo {
    pub globals: Namespace,
    /// Overrides the code name when set.
    pub name: Option<String>,
    pub defaults: Vec<Constant>,
    /// One cell per free variable, in table order.
    pub closure: Vec<Cell>,
}

impl Assembler {
    /// Package the assembled instructions as an executable unit.
    ///
    /// Every referenced label must be bound and the unit must start at
    /// offset 0.
    pub fn build_code(&mut self, info: CodeInfo) -> Result<CodeUnit, AsmError> {
        let unbound = self.unbound_labels();
        if !unbound.is_empty() {
            return Err(AsmError::IncompleteAssembly { labels: unbound });
        }
        if self.first_offset != 0 {
            return Err(AsmError::PartialUnit {
                first_offset: self.first_offset,
            });
        }

        let encoded = self.encoded()?.clone();
        log::debug!(
            "built code unit {} ({} bytes, {} constants)",
            info.name,
            encoded.bytecode.len(),
            self.constants.len()
        );

        Ok(CodeUnit {
            name: info.name,
            filename: self.filename.clone(),
            first_line: self.first_line,
            bytecode: encoded.bytecode.into(),
            line_table: encoded.line_table,
            constants: self.constants.as_slice().into(),
            names: self.names.as_slice().into(),
            varnames: self.varnames.as_slice().into(),
            freevars: self.freevars.as_slice().into(),
            cellvars: info.cellvars.into(),
            arg_count: info.arg_count,
            kwonly_arg_count: info.kwonly_arg_count,
            local_count: info.local_count,
            stack_size: info.stack_size,
            flags: info.flags,
        })
    }

    /// Package the assembled instructions as a callable unit.
    ///
    /// Defaults are passed through unchecked.
    pub fn build_function(
        &mut self,
        code: CodeInfo,
        function: FunctionInfo,
    ) -> Result<FunctionUnit, AsmError> {
        if function.closure.len() != self.freevars.len() {
            return Err(AsmError::ClosureArityMismatch {
                expected: self.freevars.len(),
                actual: function.closure.len(),
            });
        }

        let code = self.build_code(code)?;
        Ok(FunctionUnit::new(
            code,
            function.globals,
            function.name,
            function.defaults,
            function.closure,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AssemblerOptions;

    #[test]
    fn none_return_unit() {
        let mut asm = Assembler::new();
        asm.assemble("LOAD_CONST #None\nRETURN_VALUE").unwrap();
        let code = asm.build_code(CodeInfo::default()).unwrap();
        assert_eq!(&*code.bytecode, &[100, 0, 0, 83]);
        assert_eq!(&*code.constants, &[Constant::None]);
        assert_eq!(code.line_table.as_bytes(), &[3, 1]);
        assert_eq!(code.filename, "<assembly>");
        assert_eq!(code.name, "<module>");
    }

    #[test]
    fn metadata_is_copied() {
        let mut asm = Assembler::with_options(AssemblerOptions {
            filename: "f.asm".into(),
            first_line: 40,
            ..Default::default()
        });
        asm.assemble("LOAD_FAST a\nRETURN_VALUE").unwrap();
        let code = asm
            .build_code(CodeInfo {
                arg_count: 1,
                local_count: 1,
                stack_size: 1,
                flags: CodeFlags::OPTIMIZED | CodeFlags::NEWLOCALS,
                name: "ident".into(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(code.filename, "f.asm");
        assert_eq!(code.first_line, 40);
        assert_eq!(&*code.varnames, &["a".to_string()]);
        assert_eq!(code.arg_count, 1);
        assert_eq!(code.line_for_offset(3), 41);
    }

    #[test]
    fn unbound_labels_are_reported() {
        let mut asm = Assembler::new();
        asm.assemble("JUMP_ABSOLUTE a\nJUMP_ABSOLUTE b\nJUMP_ABSOLUTE a").unwrap();
        assert_eq!(
            asm.build_code(CodeInfo::default()),
            Err(AsmError::IncompleteAssembly {
                labels: vec!["a".into(), "b".into()]
            })
        );
    }

    #[test]
    fn partial_units_are_refused() {
        let mut asm = Assembler::with_options(AssemblerOptions {
            first_offset: 6,
            ..Default::default()
        });
        asm.assemble("RETURN_VALUE").unwrap();
        assert_eq!(asm.bytecode().unwrap(), &[83]);
        assert_eq!(
            asm.build_code(CodeInfo::default()),
            Err(AsmError::PartialUnit { first_offset: 6 })
        );
    }

    #[test]
    fn closure_must_cover_freevars() {
        let mut asm = Assembler::new();
        asm.assemble("LOAD_DEREF x\nRETURN_VALUE").unwrap();

        let err = asm
            .build_function(CodeInfo::default(), FunctionInfo::default())
            .unwrap_err();
        assert_eq!(err, AsmError::ClosureArityMismatch { expected: 1, actual: 0 });

        let f = asm
            .build_function(
                CodeInfo::default(),
                FunctionInfo {
                    name: Some("inner".into()),
                    defaults: vec![Constant::Int(1)],
                    closure: vec![Cell::empty()],
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(f.name(), "inner");
        assert_eq!(f.defaults(), &[Constant::Int(1)]);
        assert_eq!(&*f.code().freevars, &["x".to_string()]);
    }
}
