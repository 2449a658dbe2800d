use super::repr::{repr_bytes, repr_complex, repr_float, repr_unicode};
use super::CodeUnit;
use std::fmt;
use std::sync::Arc;

/// Entry in the constants pool of a code unit
///
/// Nested code units are shared behind an `Arc`, so cloning a constant (or a whole pool) never
/// copies a nested code unit.
///
/// Floats compare by bit pattern, so a constant is always equal to itself (even a NaN) and `0.0`
/// is distinct from `-0.0`.
#[derive(Clone, Debug)]
pub enum Constant {
    None,
    Bool(bool),
    Ellipsis,
    Int(i64),
    /// Arbitrary-precision integer (the runtime's `long`) which happens to fit in 64 bits
    Long(i64),
    Float(f64),
    Complex { real: f64, imag: f64 },
    Bytes(Arc<[u8]>),
    Unicode(Arc<str>),
    Tuple(Arc<[Constant]>),
    Code(Arc<CodeUnit>),
}

impl Constant {
    /// Byte string constant (the runtime's `str`)
    pub fn bytes(value: impl AsRef<[u8]>) -> Constant {
        Constant::Bytes(Arc::from(value.as_ref()))
    }

    /// Unicode string constant
    pub fn unicode(value: impl AsRef<str>) -> Constant {
        Constant::Unicode(Arc::from(value.as_ref()))
    }

    pub fn tuple(elements: impl IntoIterator<Item = Constant>) -> Constant {
        Constant::Tuple(elements.into_iter().collect())
    }

    pub fn code(unit: impl Into<Arc<CodeUnit>>) -> Constant {
        Constant::Code(unit.into())
    }

    /// If this constant is a nested code unit, get it
    pub fn as_code(&self) -> Option<&Arc<CodeUnit>> {
        match self {
            Constant::Code(unit) => Some(unit),
            _ => None,
        }
    }
}

impl PartialEq for Constant {
    fn eq(&self, other: &Constant) -> bool {
        match (self, other) {
            (Constant::None, Constant::None) => true,
            (Constant::Ellipsis, Constant::Ellipsis) => true,
            (Constant::Bool(a), Constant::Bool(b)) => a == b,
            (Constant::Int(a), Constant::Int(b)) => a == b,
            (Constant::Long(a), Constant::Long(b)) => a == b,
            (Constant::Float(a), Constant::Float(b)) => a.to_bits() == b.to_bits(),
            (
                Constant::Complex { real, imag },
                Constant::Complex {
                    real: other_real,
                    imag: other_imag,
                },
            ) => real.to_bits() == other_real.to_bits() && imag.to_bits() == other_imag.to_bits(),
            (Constant::Bytes(a), Constant::Bytes(b)) => a == b,
            (Constant::Unicode(a), Constant::Unicode(b)) => a == b,
            (Constant::Tuple(a), Constant::Tuple(b)) => Arc::ptr_eq(a, b) || a == b,
            (Constant::Code(a), Constant::Code(b)) => Arc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

impl Eq for Constant {}

/// Renders the constant the way the runtime's `repr` does
impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::None => f.write_str("None"),
            Constant::Bool(true) => f.write_str("True"),
            Constant::Bool(false) => f.write_str("False"),
            Constant::Ellipsis => f.write_str("Ellipsis"),
            Constant::Int(value) => write!(f, "{}", value),
            Constant::Long(value) => write!(f, "{}L", value),
            Constant::Float(value) => f.write_str(&repr_float(*value)),
            Constant::Complex { real, imag } => f.write_str(&repr_complex(*real, *imag)),
            Constant::Bytes(value) => f.write_str(&repr_bytes(value)),
            Constant::Unicode(value) => f.write_str(&repr_unicode(value)),
            Constant::Tuple(elements) => fmt::Display::fmt(&TupleDisplay(&elements[..]), f),
            Constant::Code(unit) => fmt::Display::fmt(&**unit, f),
        }
    }
}

/// Displays a slice as a tuple literal (`()`, `(x,)`, `(x, y)`)
pub(crate) struct TupleDisplay<'a, T>(pub &'a [T]);

impl<'a, T: fmt::Display> fmt::Display for TupleDisplay<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (idx, element) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            fmt::Display::fmt(element, f)?;
        }
        if self.0.len() == 1 {
            f.write_str(",")?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn literal_reprs() {
        assert_eq!(Constant::None.to_string(), "None");
        assert_eq!(Constant::Bool(false).to_string(), "False");
        assert_eq!(Constant::Int(-12).to_string(), "-12");
        assert_eq!(Constant::Long(5).to_string(), "5L");
        assert_eq!(Constant::Long(-7).to_string(), "-7L");
        assert_eq!(Constant::Float(3.5).to_string(), "3.5");
        assert_eq!(Constant::bytes("x").to_string(), "'x'");
        assert_eq!(Constant::unicode("x").to_string(), "u'x'");
    }

    #[test]
    fn tuple_reprs() {
        assert_eq!(Constant::tuple(vec![]).to_string(), "()");
        assert_eq!(Constant::tuple(vec![Constant::Int(1)]).to_string(), "(1,)");
        assert_eq!(
            Constant::tuple(vec![Constant::Int(1), Constant::bytes("a")]).to_string(),
            "(1, 'a')"
        );
    }

    #[test]
    fn floats_compare_by_bits() {
        assert_eq!(Constant::Float(f64::NAN), Constant::Float(f64::NAN));
        assert_ne!(Constant::Float(0.0), Constant::Float(-0.0));
        assert_eq!(
            Constant::Complex {
                real: f64::NAN,
                imag: 1.0
            },
            Constant::Complex {
                real: f64::NAN,
                imag: 1.0
            }
        );
        assert_ne!(Constant::Int(5), Constant::Long(5));
    }

    #[test]
    fn code_repr_names_the_unit() {
        let unit = CodeUnit::builder("inner", "m.py").first_line(7).build();
        let rendered = Constant::code(unit).to_string();
        assert!(rendered.starts_with("<code object inner at 0x"));
        assert!(rendered.ends_with(", file \"m.py\", line 7>"));
    }
}
