//! Reading and writing compiled modules
//!
//! A `.pyc` file is a four byte magic number identifying the bytecode version, a four byte
//! modification time of the source file, and then the module's code unit in the interpreter's
//! `marshal` serialization format. Everything is little-endian.
//!
//! Only the 2.7 format is understood. Objects that can never appear inside a code unit (lists,
//! dicts, sets) are rejected rather than modelled.

mod reader;
mod writer;

pub use reader::*;
pub use writer::*;

use crate::code::CodeUnit;
use crate::Error;
use std::fs;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

/// Type codes of marshalled objects
pub(crate) mod tag {
    pub const NULL: u8 = b'0';
    pub const NONE: u8 = b'N';
    pub const FALSE: u8 = b'F';
    pub const TRUE: u8 = b'T';
    pub const STOP_ITER: u8 = b'S';
    pub const ELLIPSIS: u8 = b'.';
    pub const INT: u8 = b'i';
    pub const INT64: u8 = b'I';
    pub const FLOAT: u8 = b'f';
    pub const BINARY_FLOAT: u8 = b'g';
    pub const COMPLEX: u8 = b'x';
    pub const BINARY_COMPLEX: u8 = b'y';
    pub const LONG: u8 = b'l';
    pub const STRING: u8 = b's';
    pub const INTERNED: u8 = b't';
    pub const STRING_REF: u8 = b'R';
    pub const TUPLE: u8 = b'(';
    pub const LIST: u8 = b'[';
    pub const DICT: u8 = b'{';
    pub const CODE: u8 = b'c';
    pub const UNICODE: u8 = b'u';
    pub const UNKNOWN: u8 = b'?';
    pub const SET: u8 = b'<';
    pub const FROZEN_SET: u8 = b'>';
}

/// Contents of a `.pyc` file
#[derive(Clone, Debug, PartialEq)]
pub struct Pyc {
    pub magic: [u8; 4],

    /// Modification time of the source, in seconds since the epoch
    pub mtime: u32,

    /// Module code unit
    pub code: Arc<CodeUnit>,
}

impl Pyc {
    /// Magic number of 2.7 bytecode
    pub const MAGIC: [u8; 4] = [0x03, 0xF3, 0x0D, 0x0A];

    pub fn new(code: Arc<CodeUnit>, mtime: u32) -> Pyc {
        Pyc {
            magic: Pyc::MAGIC,
            mtime,
            code,
        }
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Pyc, Error> {
        let file = fs::File::open(path).map_err(Error::IoError)?;
        read_pyc(BufReader::new(file))
    }

    /// Save the module to disk
    pub fn save_to_path<P: AsRef<Path>>(
        &self,
        path: P,
        create_missing_directories: bool,
    ) -> std::io::Result<()> {
        let path = path.as_ref();
        if create_missing_directories {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut pyc_file = fs::File::create(path)?;
        self.serialize(&mut pyc_file)
    }
}
