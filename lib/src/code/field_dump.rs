//! Debug views over every field of a code unit

use super::constant::TupleDisplay;
use super::repr::repr_bytes;
use super::{CodeUnit, Constant};
use std::collections::BTreeMap;
use std::fmt;

/// Fields of a code unit, in dump order
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CodeField {
    ArgCount,
    CellVars,
    Constants,
    SourceFile,
    FirstLine,
    Flags,
    FreeVars,
    LineTable,
    QualifiedName,
    Names,
    LocalCount,
    StackSize,
    LocalNames,
}

impl CodeField {
    pub const ALL: [CodeField; 13] = [
        CodeField::ArgCount,
        CodeField::CellVars,
        CodeField::Constants,
        CodeField::SourceFile,
        CodeField::FirstLine,
        CodeField::Flags,
        CodeField::FreeVars,
        CodeField::LineTable,
        CodeField::QualifiedName,
        CodeField::Names,
        CodeField::LocalCount,
        CodeField::StackSize,
        CodeField::LocalNames,
    ];

    /// Runtime attribute name (eg. `co_argcount`)
    pub fn key(self) -> &'static str {
        match self {
            CodeField::ArgCount => "co_argcount",
            CodeField::CellVars => "co_cellvars",
            CodeField::Constants => "co_consts",
            CodeField::SourceFile => "co_filename",
            CodeField::FirstLine => "co_firstlineno",
            CodeField::Flags => "co_flags",
            CodeField::FreeVars => "co_freevars",
            CodeField::LineTable => "co_lnotab",
            CodeField::QualifiedName => "co_name",
            CodeField::Names => "co_names",
            CodeField::LocalCount => "co_nlocals",
            CodeField::StackSize => "co_stacksize",
            CodeField::LocalNames => "co_varnames",
        }
    }

    /// Attribute name without the `co_` prefix
    pub fn short_name(self) -> &'static str {
        &self.key()[3..]
    }

    pub fn value(self, unit: &CodeUnit) -> FieldValue<'_> {
        match self {
            CodeField::ArgCount => FieldValue::Count(unit.arg_count()),
            CodeField::CellVars => FieldValue::Names(unit.cell_vars()),
            CodeField::Constants => FieldValue::Constants(unit.constants()),
            CodeField::SourceFile => FieldValue::Text(unit.source_file()),
            CodeField::FirstLine => FieldValue::Count(unit.first_line()),
            CodeField::Flags => FieldValue::Flags(unit.raw_flags()),
            CodeField::FreeVars => FieldValue::Names(unit.free_vars()),
            CodeField::LineTable => FieldValue::Bytes(unit.line_table()),
            CodeField::QualifiedName => FieldValue::Text(unit.qualified_name()),
            CodeField::Names => FieldValue::Names(unit.names()),
            CodeField::LocalCount => FieldValue::Count(unit.local_count()),
            CodeField::StackSize => FieldValue::Count(unit.stack_size()),
            CodeField::LocalNames => FieldValue::Names(unit.local_names()),
        }
    }
}

/// Borrowed value of one code unit field
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum FieldValue<'a> {
    Count(u32),
    Flags(u32),
    Text(&'a str),
    Bytes(&'a [u8]),
    Names(&'a [String]),
    Constants(&'a [Constant]),
}

impl<'a> fmt::Display for FieldValue<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Count(count) | FieldValue::Flags(count) => write!(f, "{}", count),
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Bytes(bytes) => f.write_str(&repr_bytes(bytes)),
            FieldValue::Names(names) => {
                let quoted: Vec<String> = names
                    .iter()
                    .map(|name| repr_bytes(name.as_bytes()))
                    .collect();
                fmt::Display::fmt(&TupleDisplay(&quoted[..]), f)
            }
            FieldValue::Constants(constants) => fmt::Display::fmt(&TupleDisplay(*constants), f),
        }
    }
}

/// Dump every field as a `name := value` line
pub fn debug_info(unit: &CodeUnit) -> String {
    CodeField::ALL
        .iter()
        .map(|field| format!("{} := {}", field.short_name(), field.value(unit)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Every field, keyed by its runtime attribute name
pub fn debug_fields(unit: &CodeUnit) -> BTreeMap<&'static str, FieldValue<'_>> {
    CodeField::ALL
        .iter()
        .map(|field| (field.key(), field.value(unit)))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample() -> CodeUnit {
        CodeUnit::builder("add", "calc.py")
            .arg_count(2)
            .local_count(3)
            .stack_size(2)
            .raw_flags(67)
            .instructions(vec![124, 0, 0, 124, 1, 0, 23, 83])
            .constants(vec![Constant::None, Constant::bytes("doc")])
            .local_names(vec!["a", "b", "c"])
            .cell_vars(vec!["c"])
            .first_line(4)
            .line_table(vec![0, 1])
            .build()
    }

    #[test]
    fn text_dump_in_field_order() {
        let expected = [
            "argcount := 2",
            "cellvars := ('c',)",
            "consts := (None, 'doc')",
            "filename := calc.py",
            "firstlineno := 4",
            "flags := 67",
            "freevars := ()",
            "lnotab := '\\x00\\x01'",
            "name := add",
            "names := ()",
            "nlocals := 3",
            "stacksize := 2",
            "varnames := ('a', 'b', 'c')",
        ]
        .join("\n");
        assert_eq!(debug_info(&sample()), expected);
    }

    #[test]
    fn mapping_has_every_field() {
        let unit = sample();
        let fields = debug_fields(&unit);
        assert_eq!(fields.len(), 13);
        assert_eq!(fields["co_argcount"], FieldValue::Count(2));
        assert_eq!(fields["co_filename"], FieldValue::Text("calc.py"));
        assert_eq!(fields["co_varnames"], FieldValue::Names(unit.local_names()));
        assert_eq!(fields["co_lnotab"], FieldValue::Bytes(&[0, 1]));
    }
}
