use std::collections::HashMap;

use bytecode::ArgKind;

use crate::assembler::{Argument, Assembler, Instruction};
use crate::error::AsmError;

/// Everything resolution would change, computed up front so that a failure
/// leaves the instructions untouched.
#[derive(Debug, Default)]
struct Patches {
    /// Offsets recomputed from instruction sizes; each must match the
    /// offset recorded when the instruction was added.
    offsets: Vec<usize>,
    /// Instruction index and its resolved jump argument.
    args: Vec<(usize, u16)>,
    /// Indices of instructions some jump lands on.
    targets: Vec<usize>,
}

fn plan(
    instructions: &[Instruction],
    labels: &HashMap<String, usize>,
    first_offset: usize,
) -> Result<Patches, AsmError> {
    let mut patches = Patches::default();

    let mut at = first_offset;
    for inst in instructions {
        if inst.offset != at {
            return Err(AsmError::CorruptState {
                offset: at,
                reason: format!("{} recorded at offset {}", inst.op, inst.offset),
            });
        }
        patches.offsets.push(at);
        at += inst.op.size();
    }
    let by_offset: HashMap<usize, usize> = patches
        .offsets
        .iter()
        .enumerate()
        .map(|(idx, &offset)| (offset, idx))
        .collect();

    for (idx, inst) in instructions.iter().enumerate() {
        let kind = inst.op.arg_kind();
        if !kind.is_jump() {
            continue;
        }
        let offset = patches.offsets[idx];
        let next = offset + inst.op.size();

        let target = match &inst.arg {
            Some(Argument::Label(label)) => {
                let &bound = labels.get(label).ok_or_else(|| AsmError::UndefinedLabel {
                    line: inst.line,
                    label: label.clone(),
                })?;
                let target = patches.offsets[bound];
                let value = match kind {
                    ArgKind::RelJump => target as i64 - next as i64,
                    _ => target as i64,
                };
                let arg = u16::try_from(value).map_err(|_| AsmError::ArgumentRange {
                    line: inst.line,
                    value,
                })?;
                patches.args.push((idx, arg));
                target
            }
            Some(Argument::Value(v)) => match kind {
                ArgKind::RelJump => next + *v as usize,
                _ => *v as usize,
            },
            None => continue,
        };

        if let Some(&landing) = by_offset.get(&target) {
            patches.targets.push(landing);
        }
    }

    Ok(patches)
}

impl Assembler {
    /// Bind every label reference to a concrete argument and mark the
    /// instructions jumps land on.
    ///
    /// Fails with [`AsmError::CorruptState`] if a recorded offset disagrees
    /// with the one implied by the preceding instructions.
    ///
    /// Safe to call repeatedly; once resolved, a second call changes
    /// nothing.
    pub fn resolve(&mut self) -> Result<(), AsmError> {
        let patches = plan(&self.instructions, &self.labels, self.first_offset)?;

        for &(idx, arg) in &patches.args {
            self.instructions[idx].arg = Some(Argument::Value(arg));
        }
        for &idx in &patches.targets {
            self.instructions[idx].is_jump_target = true;
        }

        log::trace!(
            "resolved {} label references, {} jump targets",
            patches.args.len(),
            patches.targets.len()
        );
        Ok(())
    }

    /// Labels referenced by some instruction but never bound, in order of
    /// first use.
    pub fn unbound_labels(&self) -> Vec<String> {
        let mut unbound: Vec<String> = Vec::new();
        for inst in &self.instructions {
            if let Some(Argument::Label(label)) = &inst.arg {
                if !self.labels.contains_key(label) && !unbound.contains(label) {
                    unbound.push(label.clone());
                }
            }
        }
        unbound
    }
}
