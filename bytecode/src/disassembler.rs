use std::collections::{HashMap, HashSet};

use crate::code::CodeUnit;
use crate::constant::Constant;
use crate::decoder::BytecodeDecoder;
use crate::error::BytecodeError;
use crate::op::{ArgKind, Op, compare_op_symbol};

/// The tables an instruction argument may index into.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArgContext<'a> {
    pub constants: &'a [Constant],
    pub names: &'a [String],
    pub varnames: &'a [String],
    /// Names addressed by the free-index opcodes.
    pub freevars: &'a [String],
}

/// Human-readable meaning of an argument, as shown in parentheses after it.
///
/// `offset` is the instruction's own offset, used to turn relative jumps
/// into absolute targets. Returns `None` when there is nothing to add or the
/// index lies outside its table.
pub fn describe_arg(op: Op, arg: u16, offset: usize, ctx: &ArgContext<'_>) -> Option<String> {
    let idx = arg as usize;
    match op.arg_kind() {
        ArgKind::None => None,
        ArgKind::ConstIndex => ctx.constants.get(idx).map(Constant::repr),
        ArgKind::NameIndex => ctx.names.get(idx).cloned(),
        ArgKind::LocalIndex => ctx.varnames.get(idx).cloned(),
        ArgKind::FreeIndex => ctx.freevars.get(idx).cloned(),
        ArgKind::CompareOp => compare_op_symbol(arg).map(str::to_owned),
        ArgKind::AbsJump => Some(format!("to {idx}")),
        ArgKind::RelJump => Some(format!("to {}", offset + op.size() + idx)),
        ArgKind::RawInt if op.counts_call_args() => Some(format!(
            "{} positional, {} keyword pair",
            arg & 0xff,
            arg >> 8
        )),
        ArgKind::RawInt => None,
    }
}

/// Width of the line-number column: at least 3, wider for large lines.
pub fn lineno_width(max_line: u32) -> usize {
    max_line.to_string().len().max(3)
}

/// One row of a listing, in the column layout the line parser reads back:
///
/// ```text
///   3     >>    6 LOAD_CONST               0 (None)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingLine<'a> {
    /// Shown only where a source line starts.
    pub line: Option<u32>,
    pub is_jump_target: bool,
    pub offset: usize,
    pub op: Op,
    pub arg: Option<u16>,
    pub argrepr: Option<&'a str>,
}

impl ListingLine<'_> {
    pub fn render(&self, lineno_width: usize) -> String {
        let mut fields: Vec<String> = Vec::with_capacity(6);
        match self.line {
            Some(line) => fields.push(format!("{line:>lineno_width$}")),
            None => fields.push(" ".repeat(lineno_width)),
        }
        // current-instruction marker column, never set here
        fields.push("   ".into());
        fields.push(if self.is_jump_target { ">>" } else { "  " }.into());
        fields.push(format!("{:>4}", self.offset));
        fields.push(format!("{:<20}", self.op.name()));
        if let Some(arg) = self.arg {
            fields.push(format!("{arg:>5}"));
            if let Some(argrepr) = self.argrepr.filter(|s| !s.is_empty()) {
                fields.push(format!("({argrepr})"));
            }
        }
        fields.join(" ").trim_end().to_owned()
    }
}

/// Render a code unit as text the assembler accepts.
///
/// Every argument is written as its raw integer, so reassembling the text
/// with the same tables reproduces the bytecode exactly. A blank line
/// separates source lines.
pub fn disassemble(code: &CodeUnit) -> Result<String, BytecodeError> {
    let instructions = BytecodeDecoder::new(&code.bytecode).collect::<Result<Vec<_>, _>>()?;

    let starts: HashMap<usize, u32> = code.line_table.line_starts(code.first_line).into_iter().collect();
    let targets: HashSet<usize> = instructions.iter().filter_map(|i| i.jump_target()).collect();
    let width = lineno_width(starts.values().copied().max().unwrap_or(code.first_line));

    let cells: Vec<String> = code.cellvars.iter().chain(code.freevars.iter()).cloned().collect();
    let ctx = ArgContext {
        constants: &code.constants,
        names: &code.names,
        varnames: &code.varnames,
        freevars: &cells,
    };

    let mut out = String::new();
    for inst in &instructions {
        let line = starts.get(&inst.offset).copied();
        if line.is_some() && inst.offset > 0 {
            out.push('\n');
        }
        let argrepr = inst.arg.and_then(|arg| describe_arg(inst.op, arg, inst.offset, &ctx));
        let row = ListingLine {
            line,
            is_jump_target: targets.contains(&inst.offset),
            offset: inst.offset,
            op: inst.op,
            arg: inst.arg,
            argrepr: argrepr.as_deref(),
        };
        out.push_str(&row.render(width));
        out.push('\n');
    }

    log::debug!("disassembled {} instructions of {}", instructions.len(), code.name);
    Ok(out)
}
