//! Decoding and rendering instruction streams
//!
//! The instruction stream of a [`CodeUnit`](crate::code::CodeUnit) is a flat byte string. Each
//! instruction is an opcode byte, followed by a little-endian 16-bit operand if the opcode is at
//! least [`Opcode::HAVE_ARGUMENT`]. An `EXTENDED_ARG` prefix contributes the high 16 bits of the
//! operand of the instruction after it.
//!
//! [`Decoder`] turns the stream into [`DecodedInstruction`]s: offset, source line, opcode,
//! operand, stack effect (as reported by a [`StackEffectOracle`]) and jump target. The
//! [`render`] functions lay those out as fixed-width text, one line per instruction.

mod decoder;
mod disassembly;
mod opcode;
mod stack_effect;

pub use decoder::*;
pub use disassembly::*;
pub use opcode::*;
pub use stack_effect::*;
