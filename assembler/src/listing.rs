use std::fmt;

use bytecode::{ArgContext, ListingLine, describe_arg, lineno_width};

use crate::assembler::{Assembler, Instruction};
use crate::error::AsmError;

/// A disassembly-style view of the assembled instructions.
///
/// Lines are rendered on demand; iterate [`Listing::lines`] as often as
/// needed or print the whole listing through `Display`. Every row carries
/// its source line number, so the output assembles back to the same
/// instructions.
#[derive(Clone, Copy)]
pub struct Listing<'a> {
    instructions: &'a [Instruction],
    ctx: ArgContext<'a>,
    width: usize,
}

impl<'a> Listing<'a> {
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn lines(&self) -> impl Iterator<Item = String> + 'a {
        let Listing {
            instructions,
            ctx,
            width,
        } = *self;
        instructions
            .iter()
            .map(move |inst| render(inst, &ctx, width))
    }
}

fn render(inst: &Instruction, ctx: &ArgContext<'_>, width: usize) -> String {
    let arg = inst.arg_value();
    let derived = match (&inst.display, arg) {
        (None, Some(arg)) => describe_arg(inst.op, arg, inst.offset, ctx),
        _ => None,
    };
    ListingLine {
        line: Some(inst.line),
        is_jump_target: inst.is_jump_target,
        offset: inst.offset,
        op: inst.op,
        arg,
        argrepr: inst.display.as_deref().or(derived.as_deref()),
    }
    .render(width)
}

impl fmt::Display for Listing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Listing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listing")
            .field("instructions", &self.instructions.len())
            .field("width", &self.width)
            .finish()
    }
}

impl Assembler {
    /// Resolve labels and list the instructions in disassembler layout.
    pub fn disassemble(&mut self) -> Result<Listing<'_>, AsmError> {
        self.resolve()?;
        let last_line = self
            .instructions
            .last()
            .map_or(self.first_line, |inst| inst.line);
        Ok(Listing {
            instructions: &self.instructions,
            ctx: ArgContext {
                constants: self.constants.as_slice(),
                names: self.names.as_slice(),
                varnames: self.varnames.as_slice(),
                freevars: self.freevars.as_slice(),
            },
            width: lineno_width(last_line),
        })
    }
}
