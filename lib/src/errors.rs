use std::string::FromUtf8Error;

#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),

    /// File does not start with the magic number this crate understands
    BadMagic([u8; 4]),

    /// Marshal type code which does not correspond to any object kind
    UnknownTag { tag: u8, offset: u64 },

    /// Marshal type code of an object that cannot appear in a code unit (eg. dicts or sets)
    UnsupportedObject { tag: u8, offset: u64 },

    /// Arbitrary-precision integer which does not fit in 64 bits
    IntegerOverflow { offset: u64 },

    InvalidUtf8(FromUtf8Error),

    /// Length prefix of a sequence is negative
    NegativeLength { length: i32, offset: u64 },

    /// Objects nested deeper than the reader allows
    RecursionLimit { offset: u64 },

    /// Reference to an interned string that was never read
    BadStringRef { index: i32, offset: u64 },

    /// An object of the wrong kind at a place where the format expects a specific kind
    UnexpectedObject {
        expected: &'static str,
        offset: u64,
    },
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}

impl From<FromUtf8Error> for Error {
    fn from(err: FromUtf8Error) -> Error {
        Error::InvalidUtf8(err)
    }
}
