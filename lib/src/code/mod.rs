//! Code units and their constants
//!
//! ### Structure
//!
//! A [`CodeUnit`] is the compiled body of one function, class, or module: raw instructions plus
//! everything those instructions refer to by index (constants, names, local variable names, free
//! and cell variable names) and some metadata (argument count, stack size, flags, line table).
//! Functions nested inside another body show up as [`Constant::Code`] entries in the enclosing
//! body's constants pool, so a module is really a tree of code units.
//!
//! ### Updating
//!
//! Code units never change. Patching one means building a new one, and since the parent refers to
//! the child by value, building a new parent too (see [`replace_nested`]).

mod code_unit;
mod constant;
mod field_dump;
mod flags;
mod line_table;
mod nested;
mod repr;

pub use code_unit::*;
pub use constant::*;
pub use field_dump::*;
pub use flags::*;
pub use line_table::*;
pub use nested::*;
pub(crate) use repr::repr_bytes;
