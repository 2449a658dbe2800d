use super::{CodeFlags, Constant};
use std::fmt;
use std::sync::Arc;

/// Compiled body of one function, class, or module
///
/// Code units are immutable once built. Every sequence is kept behind an `Arc`, so deriving a new
/// code unit from an old one (see [`CodeUnit::with_constant`]) shares all of the fields that did
/// not change.
///
/// Equality is structural over every field, including nested code units in the constants pool.
#[derive(Clone, Debug, PartialEq)]
pub struct CodeUnit {
    arg_count: u32,
    local_count: u32,
    stack_size: u32,
    flags: u32,
    instructions: Arc<[u8]>,
    constants: Arc<[Constant]>,
    names: Arc<[String]>,
    local_names: Arc<[String]>,
    free_vars: Arc<[String]>,
    cell_vars: Arc<[String]>,
    source_file: Arc<str>,
    qualified_name: Arc<str>,
    first_line: u32,
    line_table: Arc<[u8]>,
}

impl CodeUnit {
    /// Start building a code unit
    pub fn builder(
        qualified_name: impl AsRef<str>,
        source_file: impl AsRef<str>,
    ) -> CodeUnitBuilder {
        CodeUnitBuilder::new(qualified_name, source_file)
    }

    pub fn arg_count(&self) -> u32 {
        self.arg_count
    }

    pub fn local_count(&self) -> u32 {
        self.local_count
    }

    pub fn stack_size(&self) -> u32 {
        self.stack_size
    }

    /// Raw flags word, including bits that [`CodeFlags`] does not know about
    pub fn raw_flags(&self) -> u32 {
        self.flags
    }

    pub fn flags(&self) -> CodeFlags {
        CodeFlags::from_bits_truncate(self.flags)
    }

    pub fn instructions(&self) -> &[u8] {
        &self.instructions
    }

    pub fn constants(&self) -> &[Constant] {
        &self.constants
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn local_names(&self) -> &[String] {
        &self.local_names
    }

    pub fn free_vars(&self) -> &[String] {
        &self.free_vars
    }

    pub fn cell_vars(&self) -> &[String] {
        &self.cell_vars
    }

    pub fn source_file(&self) -> &str {
        &self.source_file
    }

    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    pub fn first_line(&self) -> u32 {
        self.first_line
    }

    pub fn line_table(&self) -> &[u8] {
        &self.line_table
    }

    /// Nested code units in the constants pool, in pool order
    pub fn nested_code_units(&self) -> impl Iterator<Item = &Arc<CodeUnit>> + '_ {
        self.constants.iter().filter_map(Constant::as_code)
    }

    /// Copy of this code unit where the constant at `index` is swapped for `constant`
    ///
    /// Every other field is shared with `self`. Returns `None` if `index` is out of bounds.
    pub fn with_constant(&self, index: usize, constant: Constant) -> Option<CodeUnit> {
        if index >= self.constants.len() {
            return None;
        }

        let constants: Arc<[Constant]> = self.constants[..index]
            .iter()
            .cloned()
            .chain(std::iter::once(constant))
            .chain(self.constants[index + 1..].iter().cloned())
            .collect();

        Some(CodeUnit {
            constants,
            ..self.clone()
        })
    }
}

/// Same shape as the runtime's code object `repr`, with this value's address
impl fmt::Display for CodeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<code object {} at {:p}, file \"{}\", line {}>",
            self.qualified_name, self as *const CodeUnit, self.source_file, self.first_line
        )
    }
}

/// Builder for [`CodeUnit`]
///
/// Everything except the name and file defaults to empty (and the first line to 1).
#[derive(Clone, Debug)]
pub struct CodeUnitBuilder {
    unit: CodeUnit,
}

impl CodeUnitBuilder {
    pub fn new(qualified_name: impl AsRef<str>, source_file: impl AsRef<str>) -> CodeUnitBuilder {
        CodeUnitBuilder {
            unit: CodeUnit {
                arg_count: 0,
                local_count: 0,
                stack_size: 0,
                flags: 0,
                instructions: Arc::from(&[][..]),
                constants: Arc::from(Vec::new()),
                names: Arc::from(Vec::new()),
                local_names: Arc::from(Vec::new()),
                free_vars: Arc::from(Vec::new()),
                cell_vars: Arc::from(Vec::new()),
                source_file: Arc::from(source_file.as_ref()),
                qualified_name: Arc::from(qualified_name.as_ref()),
                first_line: 1,
                line_table: Arc::from(&[][..]),
            },
        }
    }

    pub fn arg_count(mut self, arg_count: u32) -> Self {
        self.unit.arg_count = arg_count;
        self
    }

    pub fn local_count(mut self, local_count: u32) -> Self {
        self.unit.local_count = local_count;
        self
    }

    pub fn stack_size(mut self, stack_size: u32) -> Self {
        self.unit.stack_size = stack_size;
        self
    }

    pub fn raw_flags(mut self, flags: u32) -> Self {
        self.unit.flags = flags;
        self
    }

    pub fn flags(self, flags: CodeFlags) -> Self {
        self.raw_flags(flags.bits())
    }

    pub fn instructions(mut self, instructions: impl Into<Vec<u8>>) -> Self {
        self.unit.instructions = Arc::from(instructions.into());
        self
    }

    pub fn constants(mut self, constants: impl IntoIterator<Item = Constant>) -> Self {
        self.unit.constants = constants.into_iter().collect();
        self
    }

    pub fn names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.unit.names = collect_strings(names);
        self
    }

    pub fn local_names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.unit.local_names = collect_strings(names);
        self
    }

    pub fn free_vars<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.unit.free_vars = collect_strings(names);
        self
    }

    pub fn cell_vars<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.unit.cell_vars = collect_strings(names);
        self
    }

    pub fn first_line(mut self, first_line: u32) -> Self {
        self.unit.first_line = first_line;
        self
    }

    pub fn line_table(mut self, line_table: impl Into<Vec<u8>>) -> Self {
        self.unit.line_table = Arc::from(line_table.into());
        self
    }

    pub fn build(self) -> CodeUnit {
        self.unit
    }
}

fn collect_strings<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Arc<[String]> {
    names.into_iter().map(Into::into).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample() -> CodeUnit {
        CodeUnit::builder("f", "m.py")
            .arg_count(1)
            .local_count(2)
            .stack_size(3)
            .flags(CodeFlags::OPTIMIZED | CodeFlags::NEWLOCALS)
            .instructions(vec![100, 0, 0, 83])
            .constants(vec![Constant::None, Constant::Int(4)])
            .names(vec!["print"])
            .local_names(vec!["x", "y"])
            .first_line(10)
            .line_table(vec![3, 1])
            .build()
    }

    #[test]
    fn with_constant_patches_one_slot() {
        let unit = sample();
        let patched = unit.with_constant(1, Constant::Int(5)).unwrap();

        assert_eq!(patched.constants(), &[Constant::None, Constant::Int(5)]);
        assert_eq!(unit.constants(), &[Constant::None, Constant::Int(4)]);
        assert!(Arc::ptr_eq(&unit.instructions, &patched.instructions));
        assert!(Arc::ptr_eq(&unit.local_names, &patched.local_names));
        assert_eq!(patched.first_line(), 10);
    }

    #[test]
    fn with_constant_out_of_bounds() {
        assert!(sample().with_constant(2, Constant::None).is_none());
    }

    #[test]
    fn unknown_flag_bits_are_kept() {
        let unit = CodeUnit::builder("f", "m.py").raw_flags(0x8000_0043).build();
        assert_eq!(unit.raw_flags(), 0x8000_0043);
        assert_eq!(
            unit.flags(),
            CodeFlags::OPTIMIZED | CodeFlags::NEWLOCALS | CodeFlags::NOFREE
        );
    }

    #[test]
    fn structural_equality() {
        assert_eq!(sample(), sample());
        assert_ne!(sample(), sample().with_constant(0, Constant::Bool(true)).unwrap());
    }
}
