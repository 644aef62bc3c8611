/// Opcodes at or above this value carry a 16-bit argument.
pub const HAVE_ARGUMENT: u8 = 90;

/// How the argument of an opcode is interpreted.
///
/// The kind decides which symbol table an identifier argument is looked up
/// in, whether a label may stand in for the value, and how a disassembler
/// describes the raw number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    /// No argument; the instruction is a single byte.
    None,
    /// Index into the constant pool.
    ConstIndex,
    /// Index into the global/attribute name table.
    NameIndex,
    /// Index into the local variable name table.
    LocalIndex,
    /// Index into the free variable name table.
    FreeIndex,
    /// Byte distance from the end of the instruction to the target.
    RelJump,
    /// Byte offset of the target from the start of the code.
    AbsJump,
    /// Index into [`COMPARE_OPS`].
    CompareOp,
    /// Plain unsigned 16-bit operand (counts, flags, ...).
    RawInt,
}

impl ArgKind {
    pub const fn is_jump(self) -> bool {
        matches!(self, ArgKind::RelJump | ArgKind::AbsJump)
    }
}

/// Comparison operators, indexed by the `COMPARE_OP` argument.
pub const COMPARE_OPS: [&str; 12] = [
    "<",
    "<=",
    "==",
    "!=",
    ">",
    ">=",
    "in",
    "not in",
    "is",
    "is not",
    "exception match",
    "BAD",
];

/// Look up a comparison operator by symbol.
///
/// Multi-word operators also match with `_` in place of the space, since
/// source arguments are single tokens.
pub fn compare_op_index(symbol: &str) -> Option<u16> {
    COMPARE_OPS
        .iter()
        .position(|op| *op == symbol || op.replace(' ', "_") == symbol)
        .map(|idx| idx as u16)
}

/// The symbol for a `COMPARE_OP` argument, if it is in range.
pub fn compare_op_symbol(arg: u16) -> Option<&'static str> {
    COMPARE_OPS.get(arg as usize).copied()
}

macro_rules! define_ops {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $code:literal, $mnemonic:literal, $kind:ident;
        )*
    ) => {
        /// Opcodes of the target VM.
        ///
        /// Opcodes below [`HAVE_ARGUMENT`] occupy one byte. The rest are
        /// followed by a little-endian `u16` argument.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Op {
            $(
                $(#[$doc])*
                $name = $code,
            )*
        }

        impl Op {
            /// Every opcode, in numeric order.
            pub const ALL: &'static [Op] = &[$(Op::$name,)*];

            /// The mnemonic used in source text and listings.
            pub const fn name(self) -> &'static str {
                match self {
                    $(Op::$name => $mnemonic,)*
                }
            }

            pub const fn arg_kind(self) -> ArgKind {
                match self {
                    $(Op::$name => ArgKind::$kind,)*
                }
            }

            /// Look up an opcode by mnemonic (case-sensitive).
            pub fn from_name(name: &str) -> Option<Op> {
                match name {
                    $($mnemonic => Some(Op::$name),)*
                    _ => None,
                }
            }

            pub const fn from_u8(byte: u8) -> Option<Op> {
                match byte {
                    $($code => Some(Op::$name),)*
                    _ => None,
                }
            }
        }
    };
}

define_ops! {
    // ── no argument ────────────────────────────────────────────────
    POP_TOP = 1, "POP_TOP", None;
    ROT_TWO = 2, "ROT_TWO", None;
    ROT_THREE = 3, "ROT_THREE", None;
    DUP_TOP = 4, "DUP_TOP", None;
    DUP_TOP_TWO = 5, "DUP_TOP_TWO", None;
    NOP = 9, "NOP", None;
    UNARY_POSITIVE = 10, "UNARY_POSITIVE", None;
    UNARY_NEGATIVE = 11, "UNARY_NEGATIVE", None;
    UNARY_NOT = 12, "UNARY_NOT", None;
    UNARY_INVERT = 15, "UNARY_INVERT", None;
    BINARY_MATRIX_MULTIPLY = 16, "BINARY_MATRIX_MULTIPLY", None;
    INPLACE_MATRIX_MULTIPLY = 17, "INPLACE_MATRIX_MULTIPLY", None;
    BINARY_POWER = 19, "BINARY_POWER", None;
    BINARY_MULTIPLY = 20, "BINARY_MULTIPLY", None;
    BINARY_MODULO = 22, "BINARY_MODULO", None;
    BINARY_ADD = 23, "BINARY_ADD", None;
    BINARY_SUBTRACT = 24, "BINARY_SUBTRACT", None;
    BINARY_SUBSCR = 25, "BINARY_SUBSCR", None;
    BINARY_FLOOR_DIVIDE = 26, "BINARY_FLOOR_DIVIDE", None;
    BINARY_TRUE_DIVIDE = 27, "BINARY_TRUE_DIVIDE", None;
    INPLACE_FLOOR_DIVIDE = 28, "INPLACE_FLOOR_DIVIDE", None;
    INPLACE_TRUE_DIVIDE = 29, "INPLACE_TRUE_DIVIDE", None;
    GET_AITER = 50, "GET_AITER", None;
    GET_ANEXT = 51, "GET_ANEXT", None;
    BEFORE_ASYNC_WITH = 52, "BEFORE_ASYNC_WITH", None;
    INPLACE_ADD = 55, "INPLACE_ADD", None;
    INPLACE_SUBTRACT = 56, "INPLACE_SUBTRACT", None;
    INPLACE_MULTIPLY = 57, "INPLACE_MULTIPLY", None;
    INPLACE_MODULO = 59, "INPLACE_MODULO", None;
    STORE_SUBSCR = 60, "STORE_SUBSCR", None;
    DELETE_SUBSCR = 61, "DELETE_SUBSCR", None;
    BINARY_LSHIFT = 62, "BINARY_LSHIFT", None;
    BINARY_RSHIFT = 63, "BINARY_RSHIFT", None;
    BINARY_AND = 64, "BINARY_AND", None;
    BINARY_XOR = 65, "BINARY_XOR", None;
    BINARY_OR = 66, "BINARY_OR", None;
    INPLACE_POWER = 67, "INPLACE_POWER", None;
    GET_ITER = 68, "GET_ITER", None;
    GET_YIELD_FROM_ITER = 69, "GET_YIELD_FROM_ITER", None;
    PRINT_EXPR = 70, "PRINT_EXPR", None;
    LOAD_BUILD_CLASS = 71, "LOAD_BUILD_CLASS", None;
    YIELD_FROM = 72, "YIELD_FROM", None;
    GET_AWAITABLE = 73, "GET_AWAITABLE", None;
    INPLACE_LSHIFT = 75, "INPLACE_LSHIFT", None;
    INPLACE_RSHIFT = 76, "INPLACE_RSHIFT", None;
    INPLACE_AND = 77, "INPLACE_AND", None;
    INPLACE_XOR = 78, "INPLACE_XOR", None;
    INPLACE_OR = 79, "INPLACE_OR", None;
    BREAK_LOOP = 80, "BREAK_LOOP", None;
    WITH_CLEANUP_START = 81, "WITH_CLEANUP_START", None;
    WITH_CLEANUP_FINISH = 82, "WITH_CLEANUP_FINISH", None;
    RETURN_VALUE = 83, "RETURN_VALUE", None;
    IMPORT_STAR = 84, "IMPORT_STAR", None;
    YIELD_VALUE = 86, "YIELD_VALUE", None;
    POP_BLOCK = 87, "POP_BLOCK", None;
    END_FINALLY = 88, "END_FINALLY", None;
    POP_EXCEPT = 89, "POP_EXCEPT", None;

    // ── with argument ──────────────────────────────────────────────
    STORE_NAME = 90, "STORE_NAME", NameIndex;
    DELETE_NAME = 91, "DELETE_NAME", NameIndex;
    UNPACK_SEQUENCE = 92, "UNPACK_SEQUENCE", RawInt;
    FOR_ITER = 93, "FOR_ITER", RelJump;
    UNPACK_EX = 94, "UNPACK_EX", RawInt;
    STORE_ATTR = 95, "STORE_ATTR", NameIndex;
    DELETE_ATTR = 96, "DELETE_ATTR", NameIndex;
    STORE_GLOBAL = 97, "STORE_GLOBAL", NameIndex;
    DELETE_GLOBAL = 98, "DELETE_GLOBAL", NameIndex;
    LOAD_CONST = 100, "LOAD_CONST", ConstIndex;
    LOAD_NAME = 101, "LOAD_NAME", NameIndex;
    BUILD_TUPLE = 102, "BUILD_TUPLE", RawInt;
    BUILD_LIST = 103, "BUILD_LIST", RawInt;
    BUILD_SET = 104, "BUILD_SET", RawInt;
    BUILD_MAP = 105, "BUILD_MAP", RawInt;
    LOAD_ATTR = 106, "LOAD_ATTR", NameIndex;
    COMPARE_OP = 107, "COMPARE_OP", CompareOp;
    IMPORT_NAME = 108, "IMPORT_NAME", NameIndex;
    IMPORT_FROM = 109, "IMPORT_FROM", NameIndex;
    JUMP_FORWARD = 110, "JUMP_FORWARD", RelJump;
    JUMP_IF_FALSE_OR_POP = 111, "JUMP_IF_FALSE_OR_POP", AbsJump;
    JUMP_IF_TRUE_OR_POP = 112, "JUMP_IF_TRUE_OR_POP", AbsJump;
    JUMP_ABSOLUTE = 113, "JUMP_ABSOLUTE", AbsJump;
    POP_JUMP_IF_FALSE = 114, "POP_JUMP_IF_FALSE", AbsJump;
    POP_JUMP_IF_TRUE = 115, "POP_JUMP_IF_TRUE", AbsJump;
    LOAD_GLOBAL = 116, "LOAD_GLOBAL", NameIndex;
    CONTINUE_LOOP = 119, "CONTINUE_LOOP", AbsJump;
    SETUP_LOOP = 120, "SETUP_LOOP", RelJump;
    SETUP_EXCEPT = 121, "SETUP_EXCEPT", RelJump;
    SETUP_FINALLY = 122, "SETUP_FINALLY", RelJump;
    LOAD_FAST = 124, "LOAD_FAST", LocalIndex;
    STORE_FAST = 125, "STORE_FAST", LocalIndex;
    DELETE_FAST = 126, "DELETE_FAST", LocalIndex;
    RAISE_VARARGS = 130, "RAISE_VARARGS", RawInt;
    CALL_FUNCTION = 131, "CALL_FUNCTION", RawInt;
    MAKE_FUNCTION = 132, "MAKE_FUNCTION", RawInt;
    BUILD_SLICE = 133, "BUILD_SLICE", RawInt;
    MAKE_CLOSURE = 134, "MAKE_CLOSURE", RawInt;
    LOAD_CLOSURE = 135, "LOAD_CLOSURE", FreeIndex;
    LOAD_DEREF = 136, "LOAD_DEREF", FreeIndex;
    STORE_DEREF = 137, "STORE_DEREF", FreeIndex;
    DELETE_DEREF = 138, "DELETE_DEREF", FreeIndex;
    CALL_FUNCTION_VAR = 140, "CALL_FUNCTION_VAR", RawInt;
    CALL_FUNCTION_KW = 141, "CALL_FUNCTION_KW", RawInt;
    CALL_FUNCTION_VAR_KW = 142, "CALL_FUNCTION_VAR_KW", RawInt;
    SETUP_WITH = 143, "SETUP_WITH", RelJump;
    /// Prefix carrying the high 16 bits of the next argument. Written by
    /// hand only; arguments are never split automatically.
    EXTENDED_ARG = 144, "EXTENDED_ARG", RawInt;
    LIST_APPEND = 145, "LIST_APPEND", RawInt;
    SET_ADD = 146, "SET_ADD", RawInt;
    MAP_ADD = 147, "MAP_ADD", RawInt;
    LOAD_CLASSDEREF = 148, "LOAD_CLASSDEREF", FreeIndex;
    BUILD_LIST_UNPACK = 149, "BUILD_LIST_UNPACK", RawInt;
    BUILD_MAP_UNPACK = 150, "BUILD_MAP_UNPACK", RawInt;
    BUILD_MAP_UNPACK_WITH_CALL = 151, "BUILD_MAP_UNPACK_WITH_CALL", RawInt;
    BUILD_TUPLE_UNPACK = 152, "BUILD_TUPLE_UNPACK", RawInt;
    BUILD_SET_UNPACK = 153, "BUILD_SET_UNPACK", RawInt;
    SETUP_ASYNC_WITH = 154, "SETUP_ASYNC_WITH", RelJump;
}

impl Op {
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn has_arg(self) -> bool {
        self as u8 >= HAVE_ARGUMENT
    }

    /// Encoded size in bytes: 1, or 3 with the argument.
    #[inline]
    pub const fn size(self) -> usize {
        if self.has_arg() { 3 } else { 1 }
    }

    /// Whether the raw argument counts positional and keyword arguments.
    pub const fn counts_call_args(self) -> bool {
        matches!(
            self,
            Op::CALL_FUNCTION
                | Op::CALL_FUNCTION_VAR
                | Op::CALL_FUNCTION_KW
                | Op::CALL_FUNCTION_VAR_KW
        )
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
