use crate::error::BytecodeError;
use crate::instruction::Instruction;
use crate::op::Op;

/// Decodes a bytecode byte slice into [`Instruction`]s.
///
/// Malformed input is reported rather than assumed away: an unknown opcode
/// byte or an argument cut off by the end of the slice yields an error, after
/// which the iterator is exhausted.
pub struct BytecodeDecoder<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> BytecodeDecoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Current byte offset in the stream.
    #[inline(always)]
    pub fn offset(&self) -> usize {
        self.pos
    }

    #[inline(always)]
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Decode the next instruction, or `None` at end-of-stream.
    pub fn decode_next(&mut self) -> Option<Result<Instruction, BytecodeError>> {
        if self.is_at_end() {
            return None;
        }
        let result = self.decode();
        if result.is_err() {
            self.pos = self.bytes.len();
        }
        Some(result)
    }

    fn decode(&mut self) -> Result<Instruction, BytecodeError> {
        let offset = self.pos;
        let byte = self.bytes[offset];
        let op = Op::from_u8(byte).ok_or(BytecodeError::UnknownOpcode { offset, byte })?;

        if !op.has_arg() {
            self.pos += 1;
            return Ok(Instruction { offset, op, arg: None });
        }

        match self.bytes.get(offset + 1..offset + 3) {
            Some(&[lo, hi]) => {
                self.pos += 3;
                Ok(Instruction {
                    offset,
                    op,
                    arg: Some(u16::from_le_bytes([lo, hi])),
                })
            }
            _ => Err(BytecodeError::UnexpectedEof { offset }),
        }
    }
}

impl Iterator for BytecodeDecoder<'_> {
    type Item = Result<Instruction, BytecodeError>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.decode_next()
    }
}

/// Decode a whole byte stream, stopping at the first error.
pub fn decode_all(bytes: &[u8]) -> Result<Vec<Instruction>, BytecodeError> {
    BytecodeDecoder::new(bytes).collect()
}
