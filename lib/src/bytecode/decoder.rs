use super::{Opcode, OperandKind, StackEffect, StackEffectOracle, COMPARE_OPERATORS};
use crate::code::{line_starts, repr_bytes, CodeUnit, Constant, LineStarts};
use crate::util::RefId;
use byteorder::{ByteOrder, LittleEndian};
use std::fmt;
use std::iter::{FusedIterator, Peekable};

/// One instruction read out of a code unit's instruction stream
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedInstruction<'a> {
    /// Byte offset of the opcode in the instruction stream
    pub offset: usize,

    /// Source line active at this instruction
    pub line: u32,

    pub opcode: Opcode,

    /// Operand, with any preceding `EXTENDED_ARG` bits already folded in
    pub operand: Option<u32>,

    /// Code unit the instruction was decoded from
    pub owner: RefId<'a, CodeUnit>,

    pub stack_effect: StackEffect,

    /// Absolute offset this instruction can jump to, for jumping instructions
    pub jump_target: Option<usize>,
}

impl<'a> DecodedInstruction<'a> {
    pub fn width(&self) -> usize {
        self.opcode.width()
    }

    /// Resolve the operand against the tables of the owning code unit
    ///
    /// Operands which index past the end of their table resolve to a plain number.
    pub fn argument(&self) -> Option<Argument<'a>> {
        let operand = self.operand?;
        let owner: &'a CodeUnit = self.owner.0;
        let index = operand as usize;

        let resolved = match self.opcode.operand_kind() {
            OperandKind::Constant => owner.constants().get(index).map(Argument::Constant),
            OperandKind::Name => owner.names().get(index).map(|name| Argument::Name(name)),
            OperandKind::Local => owner
                .local_names()
                .get(index)
                .map(|name| Argument::Local(name)),
            OperandKind::Free => {
                let cells = owner.cell_vars();
                if index < cells.len() {
                    Some(Argument::Free(&cells[index]))
                } else {
                    owner
                        .free_vars()
                        .get(index - cells.len())
                        .map(|name| Argument::Free(name))
                }
            }
            OperandKind::Compare => COMPARE_OPERATORS.get(index).map(|op| Argument::Compare(*op)),
            OperandKind::RelativeJump | OperandKind::AbsoluteJump | OperandKind::Number => None,
            OperandKind::None => None,
        };
        Some(resolved.unwrap_or(Argument::Number(operand)))
    }
}

/// Operand of an instruction, resolved to what it refers to
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Argument<'a> {
    Constant(&'a Constant),
    Name(&'a str),
    Local(&'a str),
    /// Cell or free variable
    Free(&'a str),
    Compare(&'static str),
    Number(u32),
}

impl<'a> fmt::Display for Argument<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Constant(constant) => fmt::Display::fmt(constant, f),
            Argument::Name(name) | Argument::Local(name) | Argument::Free(name) => {
                f.write_str(&repr_bytes(name.as_bytes()))
            }
            Argument::Compare(op) => f.write_str(&repr_bytes(op.as_bytes())),
            Argument::Number(number) => write!(f, "{}", number),
        }
    }
}

/// Reason decoding stopped before the end of the instruction stream
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Malformation {
    /// The opcode at this offset takes an operand, but the stream ends first
    TruncatedOperand { offset: usize },
}

/// Lazy decoder over the instruction stream of a code unit
///
/// Instructions come out in increasing offset order. An instruction whose stack effect is
/// unknown to the oracle is still produced (with [`StackEffect::Unknown`]). A malformed tail
/// ends the iteration without affecting the instructions already produced; see
/// [`Decoder::malformation`].
pub struct Decoder<'a, O: ?Sized> {
    unit: &'a CodeUnit,
    oracle: &'a O,

    /// Offset of the next opcode to read
    cursor: usize,

    /// Last offset at which an instruction may start
    end: usize,

    line: u32,
    line_starts: Peekable<LineStarts<'a>>,

    /// Bits contributed to the next operand by an `EXTENDED_ARG` prefix
    extended_arg: u32,

    malformation: Option<Malformation>,
}

impl<'a, O: StackEffectOracle + ?Sized> Decoder<'a, O> {
    pub fn new(unit: &'a CodeUnit, oracle: &'a O, start: usize, end: usize) -> Decoder<'a, O> {
        Decoder {
            unit,
            oracle,
            cursor: start,
            end,
            line: unit.first_line(),
            line_starts: line_starts(unit).peekable(),
            extended_arg: 0,
            malformation: None,
        }
    }

    /// Why decoding stopped early (if it did)
    pub fn malformation(&self) -> Option<Malformation> {
        self.malformation
    }

    fn advance_line(&mut self, offset: usize) {
        while let Some(&(start, line)) = self.line_starts.peek() {
            if start > offset {
                break;
            }
            self.line = line;
            self.line_starts.next();
        }
    }
}

impl<'a, O: StackEffectOracle + ?Sized> Iterator for Decoder<'a, O> {
    type Item = DecodedInstruction<'a>;

    fn next(&mut self) -> Option<DecodedInstruction<'a>> {
        let code = self.unit.instructions();
        let offset = self.cursor;
        if offset > self.end || offset >= code.len() {
            return None;
        }

        let opcode = Opcode(code[offset]);
        let operand = if opcode.has_argument() {
            match code.get(offset + 1..offset + 3) {
                Some(word) => {
                    let word = LittleEndian::read_u16(word) as u32;
                    Some(word.wrapping_add(self.extended_arg))
                }
                None => {
                    log::debug!(
                        "Instruction stream of {} ends inside the operand of {} at {}",
                        self.unit,
                        opcode,
                        offset
                    );
                    self.malformation = Some(Malformation::TruncatedOperand { offset });
                    self.cursor = code.len();
                    return None;
                }
            }
        } else {
            None
        };

        self.extended_arg = match (opcode, operand) {
            (Opcode::EXTENDED_ARG, Some(operand)) => operand.wrapping_shl(16),
            _ => 0,
        };

        self.advance_line(offset);
        self.cursor = offset + opcode.width();

        let stack_effect = self.oracle.stack_effect(opcode, operand);
        if let StackEffect::Unknown(reason) = stack_effect {
            log::trace!("Unknown stack effect for {} at {}: {:?}", opcode, offset, reason);
        }

        let jump_target = match operand {
            Some(operand) if opcode.is_relative_jump() => {
                Some(offset + operand as usize + opcode.width())
            }
            Some(operand) if opcode.is_absolute_jump() => Some(operand as usize),
            _ => None,
        };

        Some(DecodedInstruction {
            offset,
            line: self.line,
            opcode,
            operand,
            owner: RefId(self.unit),
            stack_effect,
            jump_target,
        })
    }
}

impl<'a, O: StackEffectOracle + ?Sized> FusedIterator for Decoder<'a, O> {}

/// Decode the full instruction stream of a code unit
pub fn decode<'a, O: StackEffectOracle + ?Sized>(
    unit: &'a CodeUnit,
    oracle: &'a O,
) -> Decoder<'a, O> {
    Decoder::new(unit, oracle, 0, usize::MAX)
}

/// Decode the instructions starting between `start` and `end` (both inclusive)
pub fn decode_range<'a, O: StackEffectOracle + ?Sized>(
    unit: &'a CodeUnit,
    oracle: &'a O,
    start: usize,
    end: usize,
) -> Decoder<'a, O> {
    Decoder::new(unit, oracle, start, end)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bytecode::{LegacyStackEffects, UnknownEffect};

    /// ```text
    ///   1     0 LOAD_FAST      0 (x)
    ///         3 POP_JUMP_IF_FALSE 13
    ///   2     6 LOAD_CONST     1 ('yes')
    ///         9 RETURN_VALUE
    ///        10 JUMP_FORWARD   0 (to 13)
    ///   3    13 LOAD_CONST     2 ('no')
    ///        16 RETURN_VALUE
    /// ```
    fn branching() -> CodeUnit {
        CodeUnit::builder("choose", "choose.py")
            .arg_count(1)
            .local_count(1)
            .stack_size(1)
            .instructions(vec![
                124, 0, 0, 114, 13, 0, 100, 1, 0, 83, 110, 0, 0, 100, 2, 0, 83,
            ])
            .constants(vec![
                Constant::None,
                Constant::bytes("yes"),
                Constant::bytes("no"),
            ])
            .local_names(vec!["x"])
            .first_line(1)
            .line_table(vec![6, 1, 7, 1])
            .build()
    }

    #[test]
    fn decodes_offsets_lines_and_operands() {
        let unit = branching();
        let decoded: Vec<_> = decode(&unit, &LegacyStackEffects).collect();

        let summary: Vec<_> = decoded
            .iter()
            .map(|instr| (instr.offset, instr.line, instr.opcode, instr.operand))
            .collect();
        assert_eq!(
            summary,
            vec![
                (0, 1, Opcode::LOAD_FAST, Some(0)),
                (3, 1, Opcode::POP_JUMP_IF_FALSE, Some(13)),
                (6, 2, Opcode::LOAD_CONST, Some(1)),
                (9, 2, Opcode::RETURN_VALUE, None),
                (10, 2, Opcode::JUMP_FORWARD, Some(0)),
                (13, 3, Opcode::LOAD_CONST, Some(2)),
                (16, 3, Opcode::RETURN_VALUE, None),
            ]
        );
        assert!(decoded.iter().all(|instr| instr.owner == RefId(&unit)));
    }

    #[test]
    fn resolves_jump_targets() {
        let unit = branching();
        let targets: Vec<_> = decode(&unit, &LegacyStackEffects)
            .map(|instr| instr.jump_target)
            .collect();
        assert_eq!(
            targets,
            vec![None, Some(13), None, None, Some(13), None, None]
        );

        for instr in decode(&unit, &LegacyStackEffects) {
            let operand = instr.operand.unwrap_or(0) as usize;
            if instr.opcode.is_relative_jump() {
                assert_eq!(instr.jump_target, Some(instr.offset + operand + 3));
            } else if instr.opcode.is_absolute_jump() {
                assert_eq!(instr.jump_target, Some(operand));
            }
        }
    }

    #[test]
    fn resolves_arguments() {
        let unit = branching();
        let arguments: Vec<_> = decode(&unit, &LegacyStackEffects)
            .map(|instr| instr.argument().map(|arg| arg.to_string()))
            .collect();
        assert_eq!(
            arguments,
            vec![
                Some(String::from("'x'")),
                Some(String::from("13")),
                Some(String::from("'yes'")),
                None,
                Some(String::from("0")),
                Some(String::from("'no'")),
                None,
            ]
        );
    }

    #[test]
    fn decoding_is_deterministic() {
        let unit = branching();
        let first: Vec<_> = decode(&unit, &LegacyStackEffects).collect();
        let second: Vec<_> = decode(&unit, &LegacyStackEffects).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_effects_do_not_stop_decoding() {
        let unit = branching();
        let oracle = |op: Opcode, _: Option<u32>| -> Result<(u32, u32), UnknownEffect> {
            if op == Opcode::LOAD_CONST {
                Err(UnknownEffect::Unclassified)
            } else {
                Ok((0, 0))
            }
        };
        let decoded: Vec<_> = decode(&unit, &oracle).collect();
        assert_eq!(decoded.len(), 7);
        assert_eq!(
            decoded[2].stack_effect,
            StackEffect::Unknown(UnknownEffect::Unclassified)
        );
        assert_eq!(decoded[3].stack_effect, StackEffect::Known { pop: 0, push: 0 });
    }

    #[test]
    fn range_is_inclusive_and_keeps_lines() {
        let unit = branching();
        let offsets: Vec<_> = decode_range(&unit, &LegacyStackEffects, 6, 10)
            .map(|instr| (instr.offset, instr.line))
            .collect();
        assert_eq!(offsets, vec![(6, 2), (9, 2), (10, 2)]);
    }

    #[test]
    fn truncated_operand_stops_decoding() {
        let unit = CodeUnit::builder("broken", "b.py")
            .instructions(vec![9, 100, 0])
            .build();
        let mut decoder = decode(&unit, &LegacyStackEffects);

        let first = decoder.next().unwrap();
        assert_eq!(first.opcode, Opcode::NOP);
        assert!(decoder.next().is_none());
        assert_eq!(
            decoder.malformation(),
            Some(Malformation::TruncatedOperand { offset: 1 })
        );
        assert!(decoder.next().is_none());
    }

    #[test]
    fn extended_arg_widens_next_operand() {
        // EXTENDED_ARG 1; JUMP_ABSOLUTE 2  =>  jump to 0x10002
        let unit = CodeUnit::builder("far", "f.py")
            .instructions(vec![145, 1, 0, 113, 2, 0, 9])
            .build();
        let decoded: Vec<_> = decode(&unit, &LegacyStackEffects).collect();

        assert_eq!(decoded[0].opcode, Opcode::EXTENDED_ARG);
        assert_eq!(decoded[1].operand, Some(0x1_0002));
        assert_eq!(decoded[1].jump_target, Some(0x1_0002));
        assert_eq!(decoded[2].operand, None);
    }

    #[test]
    fn start_past_the_end_is_empty() {
        let unit = branching();
        assert_eq!(decode_range(&unit, &LegacyStackEffects, 100, 200).count(), 0);
    }
}
