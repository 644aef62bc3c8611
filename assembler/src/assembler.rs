use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use bytecode::{ArgKind, BytecodeBuilder, Constant, LineTable, LineTableBuilder, Op};

use crate::error::AsmError;
use crate::line::{CodeLine, SourceLine, is_identifier, is_integer, parse_line};
use crate::literal::parse_constant;
use crate::symbols::{SymbolTable, TableKind};

/// Construction options for an [`Assembler`].
///
/// ```
/// # use assembler::AssemblerOptions;
/// let options = AssemblerOptions {
///     varnames: vec!["x".into()],
///     first_line: 10,
///     ..Default::default()
/// };
/// # assert!(options.add_names);
/// ```
#[derive(Debug, Clone)]
pub struct AssemblerOptions {
    pub constants: Vec<Constant>,
    pub varnames: Vec<String>,
    pub freevars: Vec<String>,
    pub names: Vec<String>,
    /// Append unknown identifiers to their table instead of failing.
    pub add_names: bool,
    pub filename: String,
    pub first_line: u32,
    pub first_offset: usize,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            constants: Vec::new(),
            varnames: Vec::new(),
            freevars: Vec::new(),
            names: Vec::new(),
            add_names: true,
            filename: "<assembly>".into(),
            first_line: 1,
            first_offset: 0,
        }
    }
}

/// An instruction argument before or after label resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    Value(u16),
    Label(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub line: u32,
    pub offset: usize,
    pub is_jump_target: bool,
    pub op: Op,
    pub arg: Option<Argument>,
    /// Text shown in parentheses in listings instead of the derived one.
    pub display: Option<String>,
}

impl Instruction {
    /// The numeric argument, once any label has been resolved.
    pub fn arg_value(&self) -> Option<u16> {
        match self.arg {
            Some(Argument::Value(v)) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    LineNumber,
    Offset,
}

/// An explicit line number or offset in the source that disagreed with the
/// one assigned automatically. The written value is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: u32,
    pub kind: DiagnosticKind,
    pub written: usize,
    pub assigned: usize,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            DiagnosticKind::LineNumber => "line number",
            DiagnosticKind::Offset => "offset",
        };
        write!(
            f,
            "line {}: {what} {} ignored, using {}",
            self.line, self.written, self.assigned
        )
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Encoded {
    pub(crate) bytecode: Vec<u8>,
    pub(crate) line_table: LineTable,
}

/// State to return to when an assembly call fails part way.
struct Checkpoint {
    constants: usize,
    names: usize,
    varnames: usize,
    freevars: usize,
    instructions: usize,
    labels: HashMap<String, usize>,
    pending: Vec<(String, u32)>,
    source: usize,
    diagnostics: usize,
    line: u32,
    offset: usize,
}

/// Translates disassembly-style text into instructions for one code unit.
///
/// Text can be fed in several calls; labels defined in one call may be
/// referenced or bound in another. Each call either succeeds as a whole or
/// leaves the assembler as it was.
pub struct Assembler {
    pub(crate) constants: SymbolTable<Constant>,
    pub(crate) names: SymbolTable<String>,
    pub(crate) varnames: SymbolTable<String>,
    pub(crate) freevars: SymbolTable<String>,
    pub(crate) add_names: bool,
    pub(crate) filename: String,
    pub(crate) first_line: u32,
    pub(crate) first_offset: usize,

    pub(crate) instructions: Vec<Instruction>,
    /// Label name to the index of the instruction it marks.
    pub(crate) labels: HashMap<String, usize>,
    /// Labels waiting for the next instruction, with their source line.
    pub(crate) pending: Vec<(String, u32)>,
    source: Vec<String>,
    diagnostics: Vec<Diagnostic>,
    line: u32,
    offset: usize,

    pub(crate) cache: Option<Encoded>,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    pub fn new() -> Self {
        Self::with_options(AssemblerOptions::default())
    }

    pub fn with_options(options: AssemblerOptions) -> Self {
        Self {
            constants: options.constants.into_iter().collect(),
            names: options.names.into_iter().collect(),
            varnames: options.varnames.into_iter().collect(),
            freevars: options.freevars.into_iter().collect(),
            add_names: options.add_names,
            filename: options.filename,
            first_line: options.first_line,
            first_offset: options.first_offset,
            instructions: Vec::new(),
            labels: HashMap::new(),
            pending: Vec::new(),
            source: Vec::new(),
            diagnostics: Vec::new(),
            line: options.first_line,
            offset: options.first_offset,
            cache: None,
        }
    }

    /// Build an assembler and assemble `source` into it.
    pub fn with_source(source: &str, options: AssemblerOptions) -> Result<Self, AsmError> {
        let mut asm = Self::with_options(options);
        asm.assemble(source)?;
        Ok(asm)
    }

    /// Assemble more source, registering unknown identifiers according to
    /// the configured `add_names`.
    pub fn assemble(&mut self, source: &str) -> Result<(), AsmError> {
        self.assemble_with(source, self.add_names)
    }

    /// Assemble more source with an explicit auto-registration setting.
    pub fn assemble_with(&mut self, source: &str, add_names: bool) -> Result<(), AsmError> {
        let checkpoint = self.checkpoint();
        let result: Result<(), AsmError> = source.lines().try_for_each(|text| {
            self.add_line(text, add_names)?;
            self.source.push(text.to_owned());
            Ok(())
        });

        if let Err(err) = result {
            log::debug!("assembly failed, rolling back: {err}");
            self.restore(checkpoint);
            return Err(err);
        }

        self.cache = None;
        log::trace!(
            "assembled {} instructions, next offset {}",
            self.instructions.len(),
            self.offset
        );
        Ok(())
    }

    // ── accessors ──────────────────────────────────────────────────

    pub fn constants(&self) -> &SymbolTable<Constant> {
        &self.constants
    }

    pub fn names(&self) -> &SymbolTable<String> {
        &self.names
    }

    pub fn varnames(&self) -> &SymbolTable<String> {
        &self.varnames
    }

    pub fn freevars(&self) -> &SymbolTable<String> {
        &self.freevars
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Every source line accepted so far, in order.
    pub fn source(&self) -> &[String] {
        &self.source
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn first_line(&self) -> u32 {
        self.first_line
    }

    pub fn first_offset(&self) -> usize {
        self.first_offset
    }

    pub fn add_names(&self) -> bool {
        self.add_names
    }

    /// Line number the next source line will get.
    pub fn current_line(&self) -> u32 {
        self.line
    }

    /// Offset the next instruction will get.
    pub fn current_offset(&self) -> usize {
        self.offset
    }

    // ── table registration ─────────────────────────────────────────

    /// Find or append a constant, returning its index.
    pub fn add_constant(&mut self, value: Constant) -> Result<u16, AsmError> {
        let line = self.line;
        intern(&mut self.constants, TableKind::Constants, value, true, line)
    }

    pub fn add_name(&mut self, name: impl Into<String>) -> Result<u16, AsmError> {
        let line = self.line;
        intern(&mut self.names, TableKind::Names, name.into(), true, line)
    }

    pub fn add_varname(&mut self, name: impl Into<String>) -> Result<u16, AsmError> {
        let line = self.line;
        intern(&mut self.varnames, TableKind::Varnames, name.into(), true, line)
    }

    pub fn add_freevar(&mut self, name: impl Into<String>) -> Result<u16, AsmError> {
        let line = self.line;
        intern(&mut self.freevars, TableKind::Freevars, name.into(), true, line)
    }

    // ── encoding ───────────────────────────────────────────────────

    /// The encoded instruction stream. Resolves labels first if needed.
    pub fn bytecode(&mut self) -> Result<&[u8], AsmError> {
        Ok(&self.encoded()?.bytecode)
    }

    pub fn line_table(&mut self) -> Result<&LineTable, AsmError> {
        Ok(&self.encoded()?.line_table)
    }

    pub(crate) fn encoded(&mut self) -> Result<&Encoded, AsmError> {
        let encoded = match self.cache.take() {
            Some(encoded) => encoded,
            None => self.encode()?,
        };
        Ok(self.cache.insert(encoded))
    }

    fn encode(&mut self) -> Result<Encoded, AsmError> {
        self.resolve()?;

        let mut builder = BytecodeBuilder::with_capacity(self.offset - self.first_offset);
        let mut lines = LineTableBuilder::new(self.first_line);
        for inst in &self.instructions {
            let at = self.first_offset + builder.current_offset();
            if at != inst.offset {
                return Err(AsmError::CorruptState {
                    offset: at,
                    reason: format!("instruction recorded at offset {}", inst.offset),
                });
            }
            let arg = match &inst.arg {
                None => None,
                Some(Argument::Value(v)) => Some(*v),
                Some(Argument::Label(label)) => {
                    return Err(AsmError::CorruptState {
                        offset: at,
                        reason: format!("label '{label}' survived resolution"),
                    });
                }
            };
            builder.emit(inst.op, arg).map_err(|err| AsmError::CorruptState {
                offset: at,
                reason: err.to_string(),
            })?;
            lines.add(inst.offset, inst.line);
        }

        log::debug!(
            "encoded {} instructions into {} bytes",
            self.instructions.len(),
            builder.current_offset()
        );
        Ok(Encoded {
            bytecode: builder.into_bytes(),
            line_table: lines.finish(),
        })
    }

    // ── line handling ──────────────────────────────────────────────

    fn add_line(&mut self, text: &str, add_names: bool) -> Result<(), AsmError> {
        let line = self.line;
        match parse_line(text).map_err(|reason| AsmError::MalformedLine { line, reason })? {
            SourceLine::Blank => {}
            SourceLine::Label(name) => self.add_label(line, name)?,
            SourceLine::Code(code) => self.add_code(line, code, add_names)?,
        }
        self.line += 1;
        Ok(())
    }

    fn add_label(&mut self, line: u32, name: &str) -> Result<(), AsmError> {
        if self.labels.contains_key(name) || self.pending.iter().any(|(n, _)| n == name) {
            return Err(AsmError::DuplicateLabel {
                line,
                label: name.to_owned(),
            });
        }
        self.pending.push((name.to_owned(), line));
        Ok(())
    }

    fn add_code(&mut self, line: u32, code: CodeLine<'_>, add_names: bool) -> Result<(), AsmError> {
        let op = Op::from_name(code.opname).ok_or_else(|| AsmError::UnknownOpcode {
            line,
            name: code.opname.to_owned(),
        })?;

        let arg = match (op.has_arg(), code.arg) {
            (false, None) => None,
            (true, Some(text)) => Some(self.build_arg(line, op, text, add_names)?),
            (takes_arg, _) => return Err(AsmError::ArgumentArity { line, op, takes_arg }),
        };

        if let Some(written) = code.line_number {
            self.check_explicit(line, DiagnosticKind::LineNumber, written as usize, line as usize);
        }
        if let Some(written) = code.offset {
            self.check_explicit(line, DiagnosticKind::Offset, written, self.offset);
        }

        let index = self.instructions.len();
        for (label, _) in self.pending.drain(..) {
            self.labels.insert(label, index);
        }

        self.instructions.push(Instruction {
            line,
            offset: self.offset,
            is_jump_target: code.jump_target,
            op,
            arg,
            display: code.display.map(str::to_owned),
        });
        self.offset += op.size();
        Ok(())
    }

    /// Explicit line numbers and offsets are never honoured. Only a value
    /// that disagrees with the assigned one is warned about and recorded as a
    /// [`Diagnostic`]; a matching value is logged at debug level.
    fn check_explicit(&mut self, line: u32, kind: DiagnosticKind, written: usize, assigned: usize) {
        if written == assigned {
            log::debug!("line {line}: explicit {kind:?} {written} matches");
            return;
        }
        let diagnostic = Diagnostic {
            line,
            kind,
            written,
            assigned,
        };
        log::warn!("{diagnostic}");
        self.diagnostics.push(diagnostic);
    }

    fn build_arg(&mut self, line: u32, op: Op, text: &str, add_names: bool) -> Result<Argument, AsmError> {
        let kind = op.arg_kind();

        if is_integer(text) {
            let value = text
                .parse::<i64>()
                .unwrap_or(if text.starts_with('-') { i64::MIN } else { i64::MAX });
            let arg = u16::try_from(value).map_err(|_| AsmError::ArgumentRange { line, value })?;
            self.check_raw_index(line, op, arg)?;
            return Ok(Argument::Value(arg));
        }

        let malformed = |reason: String| AsmError::MalformedLine { line, reason };
        let index = match kind {
            ArgKind::ConstIndex => {
                let value = match text.strip_prefix('#') {
                    Some(literal) => parse_constant(literal).map_err(malformed)?,
                    None => Constant::Str(text.to_owned()),
                };
                intern(&mut self.constants, TableKind::Constants, value, add_names, line)?
            }
            ArgKind::NameIndex => {
                let name = symbol_text(text).map_err(malformed)?;
                intern(&mut self.names, TableKind::Names, name, add_names, line)?
            }
            ArgKind::LocalIndex => {
                let name = symbol_text(text).map_err(malformed)?;
                intern(&mut self.varnames, TableKind::Varnames, name, add_names, line)?
            }
            ArgKind::FreeIndex => {
                let name = symbol_text(text).map_err(malformed)?;
                intern(&mut self.freevars, TableKind::Freevars, name, add_names, line)?
            }
            ArgKind::CompareOp => bytecode::compare_op_index(text).ok_or_else(|| {
                AsmError::UnknownCompareOp {
                    line,
                    op: text.to_owned(),
                }
            })?,
            ArgKind::RelJump | ArgKind::AbsJump => {
                if !is_identifier(text) {
                    return Err(malformed(format!("jump target '{text}' is not a label")));
                }
                return Ok(Argument::Label(text.to_owned()));
            }
            ArgKind::RawInt => {
                return Err(malformed(format!("{op} requires a numeric argument, not '{text}'")));
            }
            ArgKind::None => return Err(AsmError::ArgumentArity { line, op, takes_arg: false }),
        };
        Ok(Argument::Value(index))
    }

    /// Raw integers are taken as-is. Out-of-table indices are only warned
    /// about; an unknown comparison index is an error.
    fn check_raw_index(&self, line: u32, op: Op, arg: u16) -> Result<(), AsmError> {
        let len = match op.arg_kind() {
            ArgKind::ConstIndex => self.constants.len(),
            ArgKind::NameIndex => self.names.len(),
            ArgKind::LocalIndex => self.varnames.len(),
            ArgKind::FreeIndex => self.freevars.len(),
            ArgKind::CompareOp => {
                return match bytecode::compare_op_symbol(arg) {
                    Some(_) => Ok(()),
                    None => Err(AsmError::UnknownCompareOp {
                        line,
                        op: arg.to_string(),
                    }),
                };
            }
            _ => return Ok(()),
        };
        if arg as usize >= len {
            log::warn!("line {line}: {op} index {arg} is past the end of its table ({len} entries)");
        }
        Ok(())
    }

    // ── rollback ───────────────────────────────────────────────────

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            constants: self.constants.len(),
            names: self.names.len(),
            varnames: self.varnames.len(),
            freevars: self.freevars.len(),
            instructions: self.instructions.len(),
            labels: self.labels.clone(),
            pending: self.pending.clone(),
            source: self.source.len(),
            diagnostics: self.diagnostics.len(),
            line: self.line,
            offset: self.offset,
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.constants.truncate(checkpoint.constants);
        self.names.truncate(checkpoint.names);
        self.varnames.truncate(checkpoint.varnames);
        self.freevars.truncate(checkpoint.freevars);
        self.instructions.truncate(checkpoint.instructions);
        self.labels = checkpoint.labels;
        self.pending = checkpoint.pending;
        self.source.truncate(checkpoint.source);
        self.diagnostics.truncate(checkpoint.diagnostics);
        self.line = checkpoint.line;
        self.offset = checkpoint.offset;
    }
}

/// Names are identifiers, optionally dotted (`os.path` for `IMPORT_NAME`).
fn symbol_text(text: &str) -> Result<String, String> {
    if text.starts_with('#') {
        Err(format!("literal '{text}' where a name is expected"))
    } else if text.split('.').all(is_identifier) {
        Ok(text.to_owned())
    } else {
        Err(format!("'{text}' is not a valid name"))
    }
}

fn intern<T>(
    table: &mut SymbolTable<T>,
    kind: TableKind,
    value: T,
    add_names: bool,
    line: u32,
) -> Result<u16, AsmError>
where
    T: Eq + Hash + Clone + fmt::Display,
{
    if let Some(idx) = table.find(&value) {
        return u16::try_from(idx).map_err(|_| AsmError::ArgumentRange {
            line,
            value: idx as i64,
        });
    }
    if !add_names {
        return Err(AsmError::UndefinedSymbol {
            line,
            table: kind,
            name: value.to_string(),
        });
    }
    let len = table.len();
    table.find_or_insert(value).ok_or(AsmError::ArgumentRange {
        line,
        value: len as i64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::MAX_ENTRIES;

    fn assembled(source: &str) -> Assembler {
        let mut asm = Assembler::new();
        asm.assemble(source).unwrap();
        asm
    }

    #[test]
    fn load_none_and_return() {
        let mut asm = assembled("LOAD_CONST #None\nRETURN_VALUE");
        assert_eq!(asm.constants().as_slice(), &[Constant::None]);
        assert_eq!(asm.bytecode().unwrap(), &[100, 0, 0, 83]);
        assert_eq!(asm.line_table().unwrap().as_bytes(), &[3, 1]);
        assert_eq!(asm.current_line(), 3);
        assert_eq!(asm.current_offset(), 4);
    }

    #[test]
    fn arity_is_checked_for_every_opcode() {
        for &op in Op::ALL {
            let mut asm = Assembler::new();
            let (source, takes_arg) = if op.has_arg() {
                (op.name().to_owned(), true)
            } else {
                (format!("{} 0", op.name()), false)
            };
            assert_eq!(
                asm.assemble(&source),
                Err(AsmError::ArgumentArity { line: 1, op, takes_arg }),
                "{op}"
            );
            assert!(asm.instructions().is_empty());
        }
    }

    #[test]
    fn unknown_opcode() {
        let mut asm = Assembler::new();
        assert_eq!(
            asm.assemble("NOP\nLOAD_CONSTANT 1"),
            Err(AsmError::UnknownOpcode { line: 2, name: "LOAD_CONSTANT".into() })
        );
    }

    #[test]
    fn names_register_in_first_use_order() {
        let asm = assembled(
            "LOAD_GLOBAL print\n\
             LOAD_FAST b\n\
             LOAD_FAST a\n\
             LOAD_GLOBAL len\n\
             LOAD_FAST b\n\
             STORE_ATTR print\n\
             LOAD_CONST #1\n\
             LOAD_CONST #1.0\n\
             LOAD_CONST #True\n\
             LOAD_CONST hello\n\
             LOAD_CONST #1",
        );
        assert_eq!(asm.names().as_slice(), &["print", "len"]);
        assert_eq!(asm.varnames().as_slice(), &["b", "a"]);
        assert_eq!(
            asm.constants().as_slice(),
            &[
                Constant::Int(1),
                Constant::Float(1.0),
                Constant::Bool(true),
                Constant::from("hello"),
            ]
        );
        let args: Vec<_> = asm.instructions().iter().map(|i| i.arg_value()).collect();
        assert_eq!(
            args,
            [0u16, 0, 1, 1, 0, 0, 0, 1, 2, 3, 0].map(Some).to_vec()
        );
    }

    #[test]
    fn seeded_tables_are_used() {
        let asm = Assembler::with_source(
            "LOAD_FAST y\nLOAD_CONST #None",
            AssemblerOptions {
                varnames: vec!["x".into(), "y".into()],
                constants: vec![Constant::Int(7), Constant::None],
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(asm.instructions()[0].arg, Some(Argument::Value(1)));
        assert_eq!(asm.instructions()[1].arg, Some(Argument::Value(1)));
        assert_eq!(asm.varnames().len(), 2);
    }

    #[test]
    fn missing_names_without_registration() {
        let mut asm = Assembler::with_options(AssemblerOptions {
            names: vec!["known".into()],
            add_names: false,
            ..Default::default()
        });
        asm.assemble("LOAD_NAME known").unwrap();
        assert_eq!(
            asm.assemble("LOAD_NAME unknown"),
            Err(AsmError::UndefinedSymbol {
                line: 2,
                table: TableKind::Names,
                name: "unknown".into(),
            })
        );
        assert_eq!(asm.names().len(), 1);

        // per-call override
        asm.assemble_with("LOAD_NAME unknown", true).unwrap();
        assert_eq!(asm.names().as_slice(), &["known", "unknown"]);
    }

    #[test]
    fn raw_integers_are_taken_as_is() {
        let mut asm = assembled("LOAD_CONST 5\nLOAD_FAST 65535\nBUILD_TUPLE 2\nCOMPARE_OP 2");
        assert!(asm.constants().is_empty());
        assert!(asm.varnames().is_empty());
        assert_eq!(
            asm.bytecode().unwrap(),
            &[100, 5, 0, 124, 255, 255, 102, 2, 0, 107, 2, 0]
        );

        let mut asm = Assembler::new();
        assert_eq!(
            asm.assemble("BUILD_TUPLE 65536"),
            Err(AsmError::ArgumentRange { line: 1, value: 65536 })
        );
        assert_eq!(
            asm.assemble("LOAD_CONST -1"),
            Err(AsmError::ArgumentRange { line: 1, value: -1 })
        );
        assert!(matches!(
            asm.assemble("BUILD_TUPLE many"),
            Err(AsmError::MalformedLine { line: 1, .. })
        ));
    }

    #[test]
    fn compare_operators() {
        let asm = assembled(
            "COMPARE_OP <\nCOMPARE_OP ==\nCOMPARE_OP not_in\nCOMPARE_OP exception_match\nCOMPARE_OP BAD",
        );
        let args: Vec<_> = asm.instructions().iter().map(|i| i.arg_value()).collect();
        assert_eq!(args, [0u16, 2, 7, 10, 11].map(Some).to_vec());

        let mut asm = Assembler::new();
        assert_eq!(
            asm.assemble("COMPARE_OP <>"),
            Err(AsmError::UnknownCompareOp { line: 1, op: "<>".into() })
        );
        assert_eq!(
            asm.assemble("COMPARE_OP 12"),
            Err(AsmError::UnknownCompareOp { line: 1, op: "12".into() })
        );
    }

    #[test]
    fn duplicate_labels() {
        let mut asm = Assembler::new();
        assert_eq!(
            asm.assemble("a:\na:\nNOP"),
            Err(AsmError::DuplicateLabel { line: 2, label: "a".into() })
        );

        asm.assemble("a:\nNOP").unwrap();
        assert_eq!(
            asm.assemble("NOP\na:\nNOP"),
            Err(AsmError::DuplicateLabel { line: 4, label: "a".into() })
        );
    }

    #[test]
    fn labels_bind_across_calls() {
        let mut asm = assembled("JUMP_ABSOLUTE later\nNOP\nlater:");
        assert_eq!(
            asm.bytecode(),
            Err(AsmError::UndefinedLabel { line: 1, label: "later".into() })
        );

        asm.assemble("RETURN_VALUE").unwrap();
        assert_eq!(asm.bytecode().unwrap(), &[113, 4, 0, 9, 83]);
        assert!(asm.instructions()[2].is_jump_target);
    }

    #[test]
    fn failed_call_rolls_back() {
        let mut asm = assembled("LOAD_NAME a\npending:");
        let before_bytes = asm.bytecode().unwrap().to_vec();

        let err = asm.assemble("LOAD_NAME b\nLOAD_CONST #'new'\n7 NOP\nfresh:\nLOAD_FAST\n");
        assert_eq!(err, Err(AsmError::ArgumentArity { line: 7, op: Op::LOAD_FAST, takes_arg: true }));

        assert_eq!(asm.names().as_slice(), &["a"]);
        assert!(asm.constants().is_empty());
        assert_eq!(asm.instructions().len(), 1);
        assert_eq!(asm.source(), &["LOAD_NAME a", "pending:"]);
        assert!(asm.diagnostics().is_empty());
        assert_eq!(asm.current_line(), 3);
        assert_eq!(asm.current_offset(), 3);
        assert_eq!(asm.bytecode().unwrap(), before_bytes.as_slice());

        // the pending label is still waiting and "fresh" was forgotten
        asm.assemble("fresh:\nNOP\nJUMP_ABSOLUTE pending").unwrap();
        assert_eq!(asm.bytecode().unwrap(), &[101, 0, 0, 9, 113, 3, 0]);
    }

    #[test]
    fn explicit_numbers_are_diagnosed_not_honoured() {
        let mut asm = assembled("  1   0 NOP\n  5   9 NOP\n 3 NOP");
        assert_eq!(asm.bytecode().unwrap(), &[9, 9, 9]);
        assert_eq!(
            asm.diagnostics(),
            &[
                Diagnostic { line: 2, kind: DiagnosticKind::LineNumber, written: 5, assigned: 2 },
                Diagnostic { line: 2, kind: DiagnosticKind::Offset, written: 9, assigned: 1 },
                Diagnostic { line: 3, kind: DiagnosticKind::Offset, written: 3, assigned: 2 },
            ]
        );
        assert_eq!(
            asm.diagnostics()[0].to_string(),
            "line 2: line number 5 ignored, using 2"
        );
    }

    #[test]
    fn cache_is_invalidated_by_assembly() {
        let mut asm = assembled("NOP");
        assert_eq!(asm.bytecode().unwrap(), &[9]);
        asm.assemble("POP_TOP").unwrap();
        assert_eq!(asm.bytecode().unwrap(), &[9, 1]);
    }

    #[test]
    fn table_exhaustion() {
        let mut asm = Assembler::with_options(AssemblerOptions {
            names: (0..MAX_ENTRIES).map(|i| format!("n{i}")).collect(),
            ..Default::default()
        });
        asm.assemble("LOAD_NAME n65535").unwrap();
        assert_eq!(asm.instructions()[0].arg, Some(Argument::Value(65535)));
        assert_eq!(
            asm.assemble("LOAD_NAME one_more"),
            Err(AsmError::ArgumentRange { line: 2, value: 65536 })
        );
        assert_eq!(asm.names().len(), MAX_ENTRIES);
        assert_eq!(asm.add_name("another"), Err(AsmError::ArgumentRange { line: 2, value: 65536 }));
    }

    #[test]
    fn explicit_registration() {
        let mut asm = Assembler::new();
        assert_eq!(asm.add_constant(Constant::None), Ok(0));
        assert_eq!(asm.add_varname("x"), Ok(0));
        assert_eq!(asm.add_freevar("cell"), Ok(0));
        assert_eq!(asm.add_constant(Constant::None), Ok(0));
        asm.assemble("LOAD_CONST #None\nLOAD_DEREF cell").unwrap();
        assert_eq!(asm.constants().len(), 1);
        assert_eq!(asm.freevars().len(), 1);
    }

    #[test]
    fn free_and_cell_opcodes_share_one_table() {
        // LOAD_CLOSURE normally names a cell variable and LOAD_DEREF a free
        // one; both index the same freevars table here.
        let asm = assembled("LOAD_CLOSURE x\nLOAD_DEREF y\nSTORE_DEREF x\nLOAD_CLASSDEREF y");
        assert_eq!(asm.freevars().as_slice(), &["x", "y"]);
        let args: Vec<_> = asm.instructions().iter().map(|i| i.arg_value()).collect();
        assert_eq!(args, [0u16, 1, 0, 1].map(Some).to_vec());
    }

    #[test]
    fn literal_errors_are_malformed_lines() {
        let mut asm = Assembler::new();
        assert!(matches!(
            asm.assemble("LOAD_CONST #nope"),
            Err(AsmError::MalformedLine { line: 1, .. })
        ));
        assert!(matches!(
            asm.assemble("LOAD_NAME #1"),
            Err(AsmError::MalformedLine { line: 1, .. })
        ));
        assert!(matches!(
            asm.assemble("JUMP_ABSOLUTE not-a-label"),
            Err(AsmError::MalformedLine { line: 1, .. })
        ));
    }

    #[test]
    fn names_are_dotted_identifiers() {
        let mut asm = assembled("IMPORT_NAME os.path\nLOAD_ATTR _private\nLOAD_FAST x1");
        assert_eq!(asm.names().as_slice(), &["os.path", "_private"]);

        for bad in ["a.b-c", "a..b", ".a", "1x"] {
            assert!(matches!(
                asm.assemble(&format!("LOAD_NAME {bad}")),
                Err(AsmError::MalformedLine { line: 4, .. })
            ));
        }
        assert!(matches!(
            asm.assemble("LOAD_DEREF x-y"),
            Err(AsmError::MalformedLine { line: 4, .. })
        ));
        assert_eq!(asm.names().len(), 2);
        assert!(asm.freevars().is_empty());
    }

    #[test]
    fn with_source_reports_errors() {
        assert!(matches!(
            Assembler::with_source("BOGUS", AssemblerOptions::default()),
            Err(AsmError::UnknownOpcode { line: 1, .. })
        ));
    }
}
