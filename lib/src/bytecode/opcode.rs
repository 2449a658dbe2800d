use std::borrow::Cow;
use std::fmt;

/// One-byte operation code
///
/// Any byte is a valid `Opcode`; bytes without an assigned operation simply have no name (they
/// render as `<N>`).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Opcode(pub u8);

macro_rules! opcodes {
    ($($ident:ident = $value:literal => $name:literal,)*) => {
        impl Opcode {
            $(pub const $ident: Opcode = Opcode($value);)*

            /// Mnemonic, if this opcode is assigned
            pub fn known_name(self) -> Option<&'static str> {
                match self.0 {
                    $($value => Some($name),)*
                    _ => None,
                }
            }
        }
    };
}

opcodes! {
    STOP_CODE = 0 => "STOP_CODE",
    POP_TOP = 1 => "POP_TOP",
    ROT_TWO = 2 => "ROT_TWO",
    ROT_THREE = 3 => "ROT_THREE",
    DUP_TOP = 4 => "DUP_TOP",
    ROT_FOUR = 5 => "ROT_FOUR",
    NOP = 9 => "NOP",
    UNARY_POSITIVE = 10 => "UNARY_POSITIVE",
    UNARY_NEGATIVE = 11 => "UNARY_NEGATIVE",
    UNARY_NOT = 12 => "UNARY_NOT",
    UNARY_CONVERT = 13 => "UNARY_CONVERT",
    UNARY_INVERT = 15 => "UNARY_INVERT",
    BINARY_POWER = 19 => "BINARY_POWER",
    BINARY_MULTIPLY = 20 => "BINARY_MULTIPLY",
    BINARY_DIVIDE = 21 => "BINARY_DIVIDE",
    BINARY_MODULO = 22 => "BINARY_MODULO",
    BINARY_ADD = 23 => "BINARY_ADD",
    BINARY_SUBTRACT = 24 => "BINARY_SUBTRACT",
    BINARY_SUBSCR = 25 => "BINARY_SUBSCR",
    BINARY_FLOOR_DIVIDE = 26 => "BINARY_FLOOR_DIVIDE",
    BINARY_TRUE_DIVIDE = 27 => "BINARY_TRUE_DIVIDE",
    INPLACE_FLOOR_DIVIDE = 28 => "INPLACE_FLOOR_DIVIDE",
    INPLACE_TRUE_DIVIDE = 29 => "INPLACE_TRUE_DIVIDE",
    SLICE_0 = 30 => "SLICE+0",
    SLICE_1 = 31 => "SLICE+1",
    SLICE_2 = 32 => "SLICE+2",
    SLICE_3 = 33 => "SLICE+3",
    STORE_SLICE_0 = 40 => "STORE_SLICE+0",
    STORE_SLICE_1 = 41 => "STORE_SLICE+1",
    STORE_SLICE_2 = 42 => "STORE_SLICE+2",
    STORE_SLICE_3 = 43 => "STORE_SLICE+3",
    DELETE_SLICE_0 = 50 => "DELETE_SLICE+0",
    DELETE_SLICE_1 = 51 => "DELETE_SLICE+1",
    DELETE_SLICE_2 = 52 => "DELETE_SLICE+2",
    DELETE_SLICE_3 = 53 => "DELETE_SLICE+3",
    STORE_MAP = 54 => "STORE_MAP",
    INPLACE_ADD = 55 => "INPLACE_ADD",
    INPLACE_SUBTRACT = 56 => "INPLACE_SUBTRACT",
    INPLACE_MULTIPLY = 57 => "INPLACE_MULTIPLY",
    INPLACE_DIVIDE = 58 => "INPLACE_DIVIDE",
    INPLACE_MODULO = 59 => "INPLACE_MODULO",
    STORE_SUBSCR = 60 => "STORE_SUBSCR",
    DELETE_SUBSCR = 61 => "DELETE_SUBSCR",
    BINARY_LSHIFT = 62 => "BINARY_LSHIFT",
    BINARY_RSHIFT = 63 => "BINARY_RSHIFT",
    BINARY_AND = 64 => "BINARY_AND",
    BINARY_XOR = 65 => "BINARY_XOR",
    BINARY_OR = 66 => "BINARY_OR",
    INPLACE_POWER = 67 => "INPLACE_POWER",
    GET_ITER = 68 => "GET_ITER",
    PRINT_EXPR = 70 => "PRINT_EXPR",
    PRINT_ITEM = 71 => "PRINT_ITEM",
    PRINT_NEWLINE = 72 => "PRINT_NEWLINE",
    PRINT_ITEM_TO = 73 => "PRINT_ITEM_TO",
    PRINT_NEWLINE_TO = 74 => "PRINT_NEWLINE_TO",
    INPLACE_LSHIFT = 75 => "INPLACE_LSHIFT",
    INPLACE_RSHIFT = 76 => "INPLACE_RSHIFT",
    INPLACE_AND = 77 => "INPLACE_AND",
    INPLACE_XOR = 78 => "INPLACE_XOR",
    INPLACE_OR = 79 => "INPLACE_OR",
    BREAK_LOOP = 80 => "BREAK_LOOP",
    WITH_CLEANUP = 81 => "WITH_CLEANUP",
    LOAD_LOCALS = 82 => "LOAD_LOCALS",
    RETURN_VALUE = 83 => "RETURN_VALUE",
    IMPORT_STAR = 84 => "IMPORT_STAR",
    EXEC_STMT = 85 => "EXEC_STMT",
    YIELD_VALUE = 86 => "YIELD_VALUE",
    POP_BLOCK = 87 => "POP_BLOCK",
    END_FINALLY = 88 => "END_FINALLY",
    BUILD_CLASS = 89 => "BUILD_CLASS",
    STORE_NAME = 90 => "STORE_NAME",
    DELETE_NAME = 91 => "DELETE_NAME",
    UNPACK_SEQUENCE = 92 => "UNPACK_SEQUENCE",
    FOR_ITER = 93 => "FOR_ITER",
    LIST_APPEND = 94 => "LIST_APPEND",
    STORE_ATTR = 95 => "STORE_ATTR",
    DELETE_ATTR = 96 => "DELETE_ATTR",
    STORE_GLOBAL = 97 => "STORE_GLOBAL",
    DELETE_GLOBAL = 98 => "DELETE_GLOBAL",
    DUP_TOPX = 99 => "DUP_TOPX",
    LOAD_CONST = 100 => "LOAD_CONST",
    LOAD_NAME = 101 => "LOAD_NAME",
    BUILD_TUPLE = 102 => "BUILD_TUPLE",
    BUILD_LIST = 103 => "BUILD_LIST",
    BUILD_SET = 104 => "BUILD_SET",
    BUILD_MAP = 105 => "BUILD_MAP",
    LOAD_ATTR = 106 => "LOAD_ATTR",
    COMPARE_OP = 107 => "COMPARE_OP",
    IMPORT_NAME = 108 => "IMPORT_NAME",
    IMPORT_FROM = 109 => "IMPORT_FROM",
    JUMP_FORWARD = 110 => "JUMP_FORWARD",
    JUMP_IF_FALSE_OR_POP = 111 => "JUMP_IF_FALSE_OR_POP",
    JUMP_IF_TRUE_OR_POP = 112 => "JUMP_IF_TRUE_OR_POP",
    JUMP_ABSOLUTE = 113 => "JUMP_ABSOLUTE",
    POP_JUMP_IF_FALSE = 114 => "POP_JUMP_IF_FALSE",
    POP_JUMP_IF_TRUE = 115 => "POP_JUMP_IF_TRUE",
    LOAD_GLOBAL = 116 => "LOAD_GLOBAL",
    CONTINUE_LOOP = 119 => "CONTINUE_LOOP",
    SETUP_LOOP = 120 => "SETUP_LOOP",
    SETUP_EXCEPT = 121 => "SETUP_EXCEPT",
    SETUP_FINALLY = 122 => "SETUP_FINALLY",
    LOAD_FAST = 124 => "LOAD_FAST",
    STORE_FAST = 125 => "STORE_FAST",
    DELETE_FAST = 126 => "DELETE_FAST",
    RAISE_VARARGS = 130 => "RAISE_VARARGS",
    CALL_FUNCTION = 131 => "CALL_FUNCTION",
    MAKE_FUNCTION = 132 => "MAKE_FUNCTION",
    BUILD_SLICE = 133 => "BUILD_SLICE",
    MAKE_CLOSURE = 134 => "MAKE_CLOSURE",
    LOAD_CLOSURE = 135 => "LOAD_CLOSURE",
    LOAD_DEREF = 136 => "LOAD_DEREF",
    STORE_DEREF = 137 => "STORE_DEREF",
    CALL_FUNCTION_VAR = 140 => "CALL_FUNCTION_VAR",
    CALL_FUNCTION_KW = 141 => "CALL_FUNCTION_KW",
    CALL_FUNCTION_VAR_KW = 142 => "CALL_FUNCTION_VAR_KW",
    SETUP_WITH = 143 => "SETUP_WITH",
    EXTENDED_ARG = 145 => "EXTENDED_ARG",
    SET_ADD = 146 => "SET_ADD",
    MAP_ADD = 147 => "MAP_ADD",
}

/// Comparison operators, indexed by the operand of `COMPARE_OP`
pub const COMPARE_OPERATORS: [&str; 12] = [
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

/// Which table (if any) the operand of an instruction indexes
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum OperandKind {
    /// No operand at all
    None,
    Constant,
    Name,
    Local,
    /// Cell variables followed by free variables
    Free,
    Compare,
    RelativeJump,
    AbsoluteJump,
    /// Plain number (counts, extended argument bits, ...)
    Number,
}

impl Opcode {
    /// Opcodes at or above this take a two byte operand
    pub const HAVE_ARGUMENT: Opcode = Opcode(90);

    pub fn has_argument(self) -> bool {
        self >= Opcode::HAVE_ARGUMENT
    }

    /// Number of bytes the instruction occupies in the stream
    pub fn width(self) -> usize {
        if self.has_argument() {
            3
        } else {
            1
        }
    }

    /// Mnemonic (or `<N>` for unassigned opcodes)
    pub fn name(self) -> Cow<'static, str> {
        match self.known_name() {
            Some(name) => Cow::Borrowed(name),
            None => Cow::Owned(format!("<{}>", self.0)),
        }
    }

    pub fn is_relative_jump(self) -> bool {
        matches!(
            self,
            Opcode::FOR_ITER
                | Opcode::JUMP_FORWARD
                | Opcode::SETUP_LOOP
                | Opcode::SETUP_EXCEPT
                | Opcode::SETUP_FINALLY
                | Opcode::SETUP_WITH
        )
    }

    pub fn is_absolute_jump(self) -> bool {
        matches!(
            self,
            Opcode::JUMP_IF_FALSE_OR_POP
                | Opcode::JUMP_IF_TRUE_OR_POP
                | Opcode::JUMP_ABSOLUTE
                | Opcode::POP_JUMP_IF_FALSE
                | Opcode::POP_JUMP_IF_TRUE
                | Opcode::CONTINUE_LOOP
        )
    }

    pub fn operand_kind(self) -> OperandKind {
        if !self.has_argument() {
            return OperandKind::None;
        }
        match self {
            Opcode::LOAD_CONST => OperandKind::Constant,
            Opcode::STORE_NAME
            | Opcode::DELETE_NAME
            | Opcode::STORE_ATTR
            | Opcode::DELETE_ATTR
            | Opcode::STORE_GLOBAL
            | Opcode::DELETE_GLOBAL
            | Opcode::LOAD_NAME
            | Opcode::LOAD_ATTR
            | Opcode::IMPORT_NAME
            | Opcode::IMPORT_FROM
            | Opcode::LOAD_GLOBAL => OperandKind::Name,
            Opcode::LOAD_FAST | Opcode::STORE_FAST | Opcode::DELETE_FAST => OperandKind::Local,
            Opcode::LOAD_CLOSURE | Opcode::LOAD_DEREF | Opcode::STORE_DEREF => OperandKind::Free,
            Opcode::COMPARE_OP => OperandKind::Compare,
            op if op.is_relative_jump() => OperandKind::RelativeJump,
            op if op.is_absolute_jump() => OperandKind::AbsoluteJump,
            _ => OperandKind::Number,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
