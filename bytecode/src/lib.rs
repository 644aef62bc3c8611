//! Byte-level model of the stack VM's code objects: the opcode table, the
//! instruction encoder and decoder, the offset-to-line table, and the code
//! and function descriptors built from them.

mod builder;
mod code;
mod constant;
mod decoder;
mod disassembler;
mod error;
mod instruction;
mod line_table;
mod op;

pub use builder::BytecodeBuilder;
pub use code::{Cell, CodeFlags, CodeUnit, FunctionUnit, Namespace};
pub use constant::Constant;
pub use decoder::{BytecodeDecoder, decode_all};
pub use disassembler::{ArgContext, ListingLine, describe_arg, disassemble, lineno_width};
pub use error::BytecodeError;
pub use instruction::Instruction;
pub use line_table::{LineTable, LineTableBuilder};
pub use op::{ArgKind, COMPARE_OPS, HAVE_ARGUMENT, Op, compare_op_index, compare_op_symbol};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_output_decodes() {
        let mut b = BytecodeBuilder::new();
        b.load_fast(0);
        b.emit(Op::POP_JUMP_IF_FALSE, Some(10)).unwrap();
        b.load_const(1);
        b.return_value();
        b.load_const(0);
        b.return_value();

        let ops: Vec<_> = decode_all(b.as_bytes())
            .unwrap()
            .into_iter()
            .map(|i| (i.offset, i.op, i.arg))
            .collect();
        assert_eq!(
            ops,
            vec![
                (0, Op::LOAD_FAST, Some(0)),
                (3, Op::POP_JUMP_IF_FALSE, Some(10)),
                (6, Op::LOAD_CONST, Some(1)),
                (9, Op::RETURN_VALUE, None),
                (10, Op::LOAD_CONST, Some(0)),
                (13, Op::RETURN_VALUE, None),
            ]
        );
    }

    #[test]
    fn every_opcode_survives_encoding() {
        let mut b = BytecodeBuilder::new();
        for &op in Op::ALL {
            b.emit(op, op.has_arg().then_some(op.code() as u16)).unwrap();
        }
        let decoded = decode_all(&b.into_bytes()).unwrap();
        assert_eq!(decoded.len(), Op::ALL.len());
        for (inst, &op) in decoded.iter().zip(Op::ALL) {
            assert_eq!(inst.op, op);
            assert_eq!(inst.arg.is_some(), op.has_arg());
        }
    }
}
