use super::Opcode;
use std::fmt;

/// Why the stack effect of an instruction could not be determined
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum UnknownEffect {
    /// The oracle has no entry for this opcode
    Unclassified,

    /// The effect depends on runtime state (eg. which branch was taken)
    RuntimeDependent,
}

/// Operand stack change of one instruction
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum StackEffect {
    Known { pop: u32, push: u32 },
    Unknown(UnknownEffect),
}

impl StackEffect {
    /// Net change in stack depth
    pub fn net(self) -> Option<i64> {
        match self {
            StackEffect::Known { pop, push } => Some(push as i64 - pop as i64),
            StackEffect::Unknown(_) => None,
        }
    }
}

/// Fixed-width annotation: ` (-P +S) ` or nine blanks when the effect is unknown
impl fmt::Display for StackEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackEffect::Known { pop, push } => write!(f, " (-{} +{}) ", pop, push),
            StackEffect::Unknown(_) => f.write_str("         "),
        }
    }
}

/// Source of stack effects for opcodes
///
/// Not knowing an effect is an expected outcome (some instructions have effects that depend on
/// runtime state), not an error.
pub trait StackEffectOracle {
    /// Number of values popped and pushed
    fn effect(&self, opcode: Opcode, operand: Option<u32>) -> Result<(u32, u32), UnknownEffect>;

    fn stack_effect(&self, opcode: Opcode, operand: Option<u32>) -> StackEffect {
        match self.effect(opcode, operand) {
            Ok((pop, push)) => StackEffect::Known { pop, push },
            Err(unknown) => StackEffect::Unknown(unknown),
        }
    }
}

impl<F> StackEffectOracle for F
where
    F: Fn(Opcode, Option<u32>) -> Result<(u32, u32), UnknownEffect>,
{
    fn effect(&self, opcode: Opcode, operand: Option<u32>) -> Result<(u32, u32), UnknownEffect> {
        self(opcode, operand)
    }
}

/// Stack effects of the legacy (2.7) instruction set
///
/// Jumping instructions report the effect along the fall-through edge. Instructions which leave a
/// different number of values behind depending on the edge taken or on the state of the block
/// stack are reported as [`UnknownEffect::RuntimeDependent`].
#[derive(Copy, Clone, Debug, Default)]
pub struct LegacyStackEffects;

impl StackEffectOracle for LegacyStackEffects {
    fn effect(&self, opcode: Opcode, operand: Option<u32>) -> Result<(u32, u32), UnknownEffect> {
        let arg = operand.unwrap_or(0);

        // `CALL_FUNCTION` family: low byte is positional count, high byte keyword pair count
        let call_args = 1 + (arg & 0xff) + 2 * ((arg >> 8) & 0xff);

        Ok(match opcode {
            Opcode::NOP
            | Opcode::PRINT_NEWLINE
            | Opcode::BREAK_LOOP
            | Opcode::POP_BLOCK
            | Opcode::DELETE_NAME
            | Opcode::DELETE_GLOBAL
            | Opcode::DELETE_FAST
            | Opcode::JUMP_FORWARD
            | Opcode::JUMP_ABSOLUTE
            | Opcode::CONTINUE_LOOP
            | Opcode::SETUP_LOOP
            | Opcode::SETUP_EXCEPT
            | Opcode::SETUP_FINALLY
            | Opcode::EXTENDED_ARG => (0, 0),

            Opcode::POP_TOP
            | Opcode::PRINT_EXPR
            | Opcode::PRINT_ITEM
            | Opcode::PRINT_NEWLINE_TO
            | Opcode::RETURN_VALUE
            | Opcode::IMPORT_STAR
            | Opcode::STORE_NAME
            | Opcode::STORE_GLOBAL
            | Opcode::STORE_FAST
            | Opcode::STORE_DEREF
            | Opcode::DELETE_ATTR
            | Opcode::DELETE_SLICE_0
            | Opcode::POP_JUMP_IF_FALSE
            | Opcode::POP_JUMP_IF_TRUE
            | Opcode::LIST_APPEND
            | Opcode::SET_ADD => (1, 0),

            Opcode::ROT_TWO => (2, 2),
            Opcode::ROT_THREE => (3, 3),
            Opcode::ROT_FOUR => (4, 4),
            Opcode::DUP_TOP => (1, 2),
            Opcode::DUP_TOPX => (arg, arg.saturating_mul(2)),

            Opcode::UNARY_POSITIVE
            | Opcode::UNARY_NEGATIVE
            | Opcode::UNARY_NOT
            | Opcode::UNARY_CONVERT
            | Opcode::UNARY_INVERT
            | Opcode::GET_ITER
            | Opcode::YIELD_VALUE
            | Opcode::LOAD_ATTR
            | Opcode::SLICE_0 => (1, 1),

            Opcode::BINARY_POWER
            | Opcode::BINARY_MULTIPLY
            | Opcode::BINARY_DIVIDE
            | Opcode::BINARY_MODULO
            | Opcode::BINARY_ADD
            | Opcode::BINARY_SUBTRACT
            | Opcode::BINARY_SUBSCR
            | Opcode::BINARY_FLOOR_DIVIDE
            | Opcode::BINARY_TRUE_DIVIDE
            | Opcode::BINARY_LSHIFT
            | Opcode::BINARY_RSHIFT
            | Opcode::BINARY_AND
            | Opcode::BINARY_XOR
            | Opcode::BINARY_OR
            | Opcode::INPLACE_FLOOR_DIVIDE
            | Opcode::INPLACE_TRUE_DIVIDE
            | Opcode::INPLACE_ADD
            | Opcode::INPLACE_SUBTRACT
            | Opcode::INPLACE_MULTIPLY
            | Opcode::INPLACE_DIVIDE
            | Opcode::INPLACE_MODULO
            | Opcode::INPLACE_POWER
            | Opcode::INPLACE_LSHIFT
            | Opcode::INPLACE_RSHIFT
            | Opcode::INPLACE_AND
            | Opcode::INPLACE_XOR
            | Opcode::INPLACE_OR
            | Opcode::COMPARE_OP
            | Opcode::IMPORT_NAME
            | Opcode::SLICE_1
            | Opcode::SLICE_2 => (2, 1),

            Opcode::SLICE_3 => (3, 1),
            Opcode::STORE_SLICE_0 => (2, 0),
            Opcode::STORE_SLICE_1 | Opcode::STORE_SLICE_2 => (3, 0),
            Opcode::STORE_SLICE_3 => (4, 0),
            Opcode::DELETE_SLICE_1 | Opcode::DELETE_SLICE_2 => (2, 0),
            Opcode::DELETE_SLICE_3 => (3, 0),

            Opcode::STORE_MAP => (3, 1),
            Opcode::STORE_SUBSCR => (3, 0),
            Opcode::DELETE_SUBSCR => (2, 0),
            Opcode::STORE_ATTR => (2, 0),
            Opcode::PRINT_ITEM_TO => (2, 0),
            Opcode::EXEC_STMT => (3, 0),
            Opcode::BUILD_CLASS => (3, 1),
            Opcode::MAP_ADD => (2, 0),

            Opcode::LOAD_LOCALS
            | Opcode::LOAD_CONST
            | Opcode::LOAD_NAME
            | Opcode::LOAD_GLOBAL
            | Opcode::LOAD_FAST
            | Opcode::LOAD_CLOSURE
            | Opcode::LOAD_DEREF
            | Opcode::BUILD_MAP => (0, 1),

            Opcode::IMPORT_FROM => (1, 2),
            Opcode::FOR_ITER => (1, 2),
            Opcode::UNPACK_SEQUENCE => (1, arg),
            Opcode::BUILD_TUPLE | Opcode::BUILD_LIST | Opcode::BUILD_SET => (arg, 1),
            Opcode::BUILD_SLICE => (arg, 1),
            Opcode::RAISE_VARARGS => (arg, 0),

            Opcode::CALL_FUNCTION => (call_args, 1),
            Opcode::CALL_FUNCTION_VAR | Opcode::CALL_FUNCTION_KW => (call_args + 1, 1),
            Opcode::CALL_FUNCTION_VAR_KW => (call_args + 2, 1),
            Opcode::MAKE_FUNCTION => (arg.saturating_add(1), 1),
            Opcode::MAKE_CLOSURE => (arg.saturating_add(2), 1),

            Opcode::JUMP_IF_FALSE_OR_POP
            | Opcode::JUMP_IF_TRUE_OR_POP
            | Opcode::WITH_CLEANUP
            | Opcode::END_FINALLY
            | Opcode::SETUP_WITH => return Err(UnknownEffect::RuntimeDependent),

            _ => return Err(UnknownEffect::Unclassified),
        })
    }
}
