use super::{decode, DecodedInstruction, StackEffectOracle};
use crate::code::CodeUnit;
use std::fmt::Write;

/// Knobs for rendering disassembly
#[derive(Clone, Debug)]
pub struct RenderSettings {
    /// Operand text longer than this many characters gets cut off
    pub operand_width: usize,

    /// Appended to operand text that was cut off
    pub truncation_marker: &'static str,

    /// Print the short tag of the owning code unit in the first column
    ///
    /// Tags are derived from addresses, so turn this off for output that must be reproducible.
    pub unit_tags: bool,
}

impl Default for RenderSettings {
    fn default() -> RenderSettings {
        RenderSettings {
            operand_width: 40,
            truncation_marker: "[...]",
            unit_tags: true,
        }
    }
}

/// Render instructions `start..=end` (by position in `instructions`) with default settings
///
/// `end` is clamped to the last instruction. An empty range renders as an empty string.
pub fn render(instructions: &[DecodedInstruction<'_>], start: usize, end: Option<usize>) -> String {
    render_with(&RenderSettings::default(), instructions, start, end)
}

pub fn render_with(
    settings: &RenderSettings,
    instructions: &[DecodedInstruction<'_>],
    start: usize,
    end: Option<usize>,
) -> String {
    let last = match instructions.len().checked_sub(1) {
        Some(last) => last,
        None => return String::new(),
    };
    let end = end.map_or(last, |end| end.min(last));
    if start > end {
        return String::new();
    }

    instructions[start..=end]
        .iter()
        .map(|instruction| render_instruction(settings, instruction))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Decode and render a whole code unit
pub fn disassemble<O: StackEffectOracle + ?Sized>(unit: &CodeUnit, oracle: &O) -> String {
    let instructions: Vec<_> = decode(unit, oracle).collect();
    render(&instructions, 0, None)
}

fn render_instruction(settings: &RenderSettings, instruction: &DecodedInstruction<'_>) -> String {
    let tag = if settings.unit_tags {
        instruction.owner.short_tag()
    } else {
        String::new()
    };

    let mut line = format!(
        "[{:>5}]{:>4}({:>4}) {:>20}({:>3}){}",
        tag,
        instruction.line,
        instruction.offset,
        instruction.opcode.name(),
        instruction.opcode.0,
        instruction.stack_effect,
    );

    if let Some(argument) = instruction.argument() {
        let text = truncate(settings, argument.to_string());
        let _ = write!(line, " ({})", text);
        if let Some(target) = instruction.jump_target {
            let _ = write!(line, " -------------> ({:>4})", target);
        }
    }

    line
}

fn truncate(settings: &RenderSettings, text: String) -> String {
    match text.char_indices().nth(settings.operand_width) {
        Some((cut, _)) => format!("{}{}", &text[..cut], settings.truncation_marker),
        None => text,
    }
}
