use crate::error::BytecodeError;
use crate::op::Op;

/// Builds a bytecode byte sequence.
///
/// Instructions below [`HAVE_ARGUMENT`](crate::op::HAVE_ARGUMENT) are one
/// opcode byte; the rest are the opcode followed by the argument as a
/// little-endian `u16`. Arguments wider than 16 bits are never split into an
/// `EXTENDED_ARG` prefix.
#[derive(Debug, Default, Clone)]
pub struct BytecodeBuilder {
    buf: Vec<u8>,
}

impl BytecodeBuilder {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Current byte offset in the bytecode stream.
    pub fn current_offset(&self) -> usize {
        self.buf.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Append one instruction.
    ///
    /// The argument must be present exactly when the opcode takes one.
    pub fn emit(&mut self, op: Op, arg: Option<u16>) -> Result<(), BytecodeError> {
        match (op.has_arg(), arg) {
            (true, Some(arg)) => {
                self.emit_op(op);
                self.emit_u16(arg);
            }
            (false, None) => self.emit_op(op),
            _ => return Err(BytecodeError::ArityMismatch { op }),
        }
        Ok(())
    }

    // ── emit helpers ───────────────────────────────────────────────

    fn emit_op(&mut self, op: Op) {
        self.buf.push(op as u8);
    }

    fn emit_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    // ── convenience emitters ───────────────────────────────────────

    pub fn load_const(&mut self, idx: u16) {
        self.emit_op(Op::LOAD_CONST);
        self.emit_u16(idx);
    }

    pub fn load_fast(&mut self, idx: u16) {
        self.emit_op(Op::LOAD_FAST);
        self.emit_u16(idx);
    }

    pub fn store_fast(&mut self, idx: u16) {
        self.emit_op(Op::STORE_FAST);
        self.emit_u16(idx);
    }

    pub fn jump_absolute(&mut self, target: u16) {
        self.emit_op(Op::JUMP_ABSOLUTE);
        self.emit_u16(target);
    }

    pub fn return_value(&mut self) {
        self.emit_op(Op::RETURN_VALUE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_and_wide_widths() {
        let mut b = BytecodeBuilder::new();
        b.emit(Op::POP_TOP, None).unwrap();
        assert_eq!(b.current_offset(), 1);
        b.emit(Op::LOAD_CONST, Some(0x0102)).unwrap();
        assert_eq!(b.current_offset(), 4);
        assert_eq!(b.as_bytes(), &[1, 100, 0x02, 0x01]);
    }

    #[test]
    fn arity_is_checked() {
        let mut b = BytecodeBuilder::new();
        assert_eq!(
            b.emit(Op::RETURN_VALUE, Some(0)),
            Err(BytecodeError::ArityMismatch { op: Op::RETURN_VALUE })
        );
        assert_eq!(
            b.emit(Op::LOAD_FAST, None),
            Err(BytecodeError::ArityMismatch { op: Op::LOAD_FAST })
        );
        assert!(b.as_bytes().is_empty());
    }

    #[test]
    fn convenience_emitters() {
        let mut b = BytecodeBuilder::new();
        b.load_fast(0);
        b.store_fast(1);
        b.load_const(2);
        b.jump_absolute(0);
        b.return_value();
        assert_eq!(
            b.into_bytes(),
            vec![124, 0, 0, 125, 1, 0, 100, 2, 0, 113, 0, 0, 83]
        );
    }
}
