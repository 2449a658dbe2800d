use super::{tag, Pyc};
use crate::code::{CodeUnit, Constant};
use crate::Error;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Read};
use std::sync::Arc;

/// Reads marshalled objects out of a byte stream
///
/// Byte strings tagged as interned are remembered, so later back-references to them can be
/// resolved. Errors carry the stream offset at which the offending object started.
pub struct Unmarshaller<R> {
    reader: R,

    /// Number of bytes consumed so far
    offset: u64,

    interned: Vec<Arc<[u8]>>,

    /// Number of objects currently being read (tuples and code objects nest)
    depth: usize,
}

/// Deepest nesting of objects that will be read
pub const MAX_DEPTH: usize = 2000;

impl<R: Read> Unmarshaller<R> {
    pub fn new(reader: R) -> Unmarshaller<R> {
        Unmarshaller {
            reader,
            offset: 0,
            interned: vec![],
            depth: 0,
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    fn read_u8(&mut self) -> Result<u8, Error> {
        let byte = self.reader.read_u8()?;
        self.offset += 1;
        Ok(byte)
    }

    fn read_u16(&mut self) -> Result<u16, Error> {
        let word = self.reader.read_u16::<LittleEndian>()?;
        self.offset += 2;
        Ok(word)
    }

    fn read_i32(&mut self) -> Result<i32, Error> {
        let value = self.reader.read_i32::<LittleEndian>()?;
        self.offset += 4;
        Ok(value)
    }

    fn read_u32(&mut self) -> Result<u32, Error> {
        let value = self.reader.read_u32::<LittleEndian>()?;
        self.offset += 4;
        Ok(value)
    }

    fn read_i64(&mut self) -> Result<i64, Error> {
        let value = self.reader.read_i64::<LittleEndian>()?;
        self.offset += 8;
        Ok(value)
    }

    fn read_f64(&mut self) -> Result<f64, Error> {
        let value = self.reader.read_f64::<LittleEndian>()?;
        self.offset += 8;
        Ok(value)
    }

    /// Read exactly `length` bytes, growing the buffer only as data actually arrives
    fn read_raw(&mut self, length: usize) -> Result<Vec<u8>, Error> {
        let mut bytes = vec![];
        (&mut self.reader)
            .take(length as u64)
            .read_to_end(&mut bytes)?;
        self.offset += bytes.len() as u64;
        if bytes.len() < length {
            return Err(Error::IoError(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("expected {} bytes, found {}", length, bytes.len()),
            )));
        }
        Ok(bytes)
    }

    fn read_length(&mut self) -> Result<usize, Error> {
        let offset = self.offset;
        let length = self.read_i32()?;
        usize::try_from(length).map_err(|_| Error::NegativeLength { length, offset })
    }

    /// Float written out as text, prefixed by a one byte length
    fn read_text_float(&mut self) -> Result<f64, Error> {
        let offset = self.offset;
        let length = self.read_u8()? as usize;
        let text = String::from_utf8(self.read_raw(length)?)?;
        text.trim().parse::<f64>().map_err(|_| Error::UnexpectedObject {
            expected: "float literal",
            offset,
        })
    }

    /// Arbitrary-precision integer: signed digit count, then that many 15-bit digits
    fn read_long(&mut self, offset: u64) -> Result<i64, Error> {
        let count = self.read_i32()?;
        let mut magnitude: i128 = 0;
        for position in 0..count.unsigned_abs() {
            let digit = self.read_u16()? as i128;
            let shift = 15 * position;
            if shift >= 64 && digit != 0 {
                return Err(Error::IntegerOverflow { offset });
            }
            if shift < 64 {
                magnitude |= digit << shift;
            }
        }
        let value = if count < 0 { -magnitude } else { magnitude };
        i64::try_from(value).map_err(|_| Error::IntegerOverflow { offset })
    }

    /// Read the next object
    pub fn read_object(&mut self) -> Result<Constant, Error> {
        if self.depth >= MAX_DEPTH {
            return Err(Error::RecursionLimit {
                offset: self.offset,
            });
        }
        self.depth += 1;
        let object = self.read_tagged_object();
        self.depth -= 1;
        object
    }

    fn read_tagged_object(&mut self) -> Result<Constant, Error> {
        let offset = self.offset;
        let type_code = self.read_u8()?;
        log::trace!("Reading object '{}' at {}", type_code as char, offset);

        Ok(match type_code {
            tag::NONE => Constant::None,
            tag::TRUE => Constant::Bool(true),
            tag::FALSE => Constant::Bool(false),
            tag::ELLIPSIS => Constant::Ellipsis,
            tag::INT => Constant::Int(self.read_i32()? as i64),
            tag::INT64 => Constant::Int(self.read_i64()?),
            tag::LONG => Constant::Long(self.read_long(offset)?),
            tag::FLOAT => Constant::Float(self.read_text_float()?),
            tag::BINARY_FLOAT => Constant::Float(self.read_f64()?),
            tag::COMPLEX => {
                let real = self.read_text_float()?;
                let imag = self.read_text_float()?;
                Constant::Complex { real, imag }
            }
            tag::BINARY_COMPLEX => {
                let real = self.read_f64()?;
                let imag = self.read_f64()?;
                Constant::Complex { real, imag }
            }
            tag::STRING => {
                let length = self.read_length()?;
                Constant::bytes(self.read_raw(length)?)
            }
            tag::INTERNED => {
                let length = self.read_length()?;
                let bytes: Arc<[u8]> = Arc::from(self.read_raw(length)?);
                self.interned.push(bytes.clone());
                Constant::Bytes(bytes)
            }
            tag::STRING_REF => {
                let index = self.read_i32()?;
                let interned = usize::try_from(index)
                    .ok()
                    .and_then(|index| self.interned.get(index));
                match interned {
                    Some(bytes) => Constant::Bytes(bytes.clone()),
                    None => return Err(Error::BadStringRef { index, offset }),
                }
            }
            tag::UNICODE => {
                let length = self.read_length()?;
                Constant::unicode(String::from_utf8(self.read_raw(length)?)?)
            }
            tag::TUPLE => {
                let length = self.read_length()?;
                let mut elements = Vec::with_capacity(length.min(1024));
                for _ in 0..length {
                    elements.push(self.read_object()?);
                }
                Constant::tuple(elements)
            }
            tag::CODE => Constant::Code(Arc::new(self.read_code_body()?)),

            tag::NULL
            | tag::STOP_ITER
            | tag::LIST
            | tag::DICT
            | tag::SET
            | tag::FROZEN_SET
            | tag::UNKNOWN => {
                return Err(Error::UnsupportedObject {
                    tag: type_code,
                    offset,
                })
            }
            _ => {
                return Err(Error::UnknownTag {
                    tag: type_code,
                    offset,
                })
            }
        })
    }

    /// Read the next object, which must be a code unit
    pub fn read_code(&mut self) -> Result<Arc<CodeUnit>, Error> {
        let offset = self.offset;
        match self.read_object()? {
            Constant::Code(unit) => Ok(unit),
            _ => Err(Error::UnexpectedObject {
                expected: "code object",
                offset,
            }),
        }
    }

    /// Fields of a code object, after the type code
    fn read_code_body(&mut self) -> Result<CodeUnit, Error> {
        let arg_count = self.read_u32()?;
        let local_count = self.read_u32()?;
        let stack_size = self.read_u32()?;
        let flags = self.read_u32()?;
        let instructions = self.read_byte_string()?;

        let offset = self.offset;
        let constants = match self.read_object()? {
            Constant::Tuple(constants) => constants,
            _ => {
                return Err(Error::UnexpectedObject {
                    expected: "tuple of constants",
                    offset,
                })
            }
        };

        let names = self.read_names()?;
        let local_names = self.read_names()?;
        let free_vars = self.read_names()?;
        let cell_vars = self.read_names()?;
        let source_file = self.read_text()?;
        let qualified_name = self.read_text()?;
        let line_offset = self.offset;
        let first_line = u32::try_from(self.read_i32()?).map_err(|_| Error::UnexpectedObject {
            expected: "non-negative first line number",
            offset: line_offset,
        })?;
        let line_table = self.read_byte_string()?;

        log::trace!("Read code object '{}' from '{}'", qualified_name, source_file);
        Ok(CodeUnit::builder(qualified_name, source_file)
            .arg_count(arg_count)
            .local_count(local_count)
            .stack_size(stack_size)
            .raw_flags(flags)
            .instructions(instructions)
            .constants(constants.iter().cloned())
            .names(names)
            .local_names(local_names)
            .free_vars(free_vars)
            .cell_vars(cell_vars)
            .first_line(first_line)
            .line_table(line_table)
            .build())
    }

    fn read_byte_string(&mut self) -> Result<Vec<u8>, Error> {
        let offset = self.offset;
        match self.read_object()? {
            Constant::Bytes(bytes) => Ok(bytes.to_vec()),
            _ => Err(Error::UnexpectedObject {
                expected: "byte string",
                offset,
            }),
        }
    }

    /// Byte or unicode string, decoded as UTF-8
    fn read_text(&mut self) -> Result<String, Error> {
        let offset = self.offset;
        let object = self.read_object()?;
        text_of(object, offset)
    }

    fn read_names(&mut self) -> Result<Vec<String>, Error> {
        let offset = self.offset;
        match self.read_object()? {
            Constant::Tuple(elements) => elements
                .iter()
                .map(|element| text_of(element.clone(), offset))
                .collect(),
            _ => Err(Error::UnexpectedObject {
                expected: "tuple of names",
                offset,
            }),
        }
    }
}

fn text_of(object: Constant, offset: u64) -> Result<String, Error> {
    match object {
        Constant::Bytes(bytes) => Ok(String::from_utf8(bytes.to_vec())?),
        Constant::Unicode(text) => Ok(String::from(&*text)),
        _ => Err(Error::UnexpectedObject {
            expected: "string",
            offset,
        }),
    }
}

/// Read a `.pyc` file: magic number, modification time, module code unit
pub fn read_pyc<R: Read>(reader: R) -> Result<Pyc, Error> {
    let mut unmarshaller = Unmarshaller::new(reader);
    let mut magic = [0; 4];
    unmarshaller.reader.read_exact(&mut magic)?;
    unmarshaller.offset += 4;
    if magic != Pyc::MAGIC {
        return Err(Error::BadMagic(magic));
    }
    let mtime = unmarshaller.read_u32()?;
    let code = unmarshaller.read_code()?;
    Ok(Pyc { magic, mtime, code })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::marshal::Serialize;
    use std::io::Cursor;

    fn unmarshal(bytes: &[u8]) -> Result<Constant, Error> {
        Unmarshaller::new(Cursor::new(bytes)).read_object()
    }

    #[test]
    fn scalars() {
        assert_eq!(unmarshal(b"N").unwrap(), Constant::None);
        assert_eq!(unmarshal(b"T").unwrap(), Constant::Bool(true));
        assert_eq!(unmarshal(b"i\xff\xff\xff\xff").unwrap(), Constant::Int(-1));
        assert_eq!(unmarshal(b"f\x032.5").unwrap(), Constant::Float(2.5));
        assert_eq!(
            unmarshal(b"x\x031.5\x04-2.0").unwrap(),
            Constant::Complex {
                real: 1.5,
                imag: -2.0
            }
        );
    }

    #[test]
    fn longs() {
        // 2**15 + 1 is two digits: 1, 1
        assert_eq!(
            unmarshal(b"l\x02\x00\x00\x00\x01\x00\x01\x00").unwrap(),
            Constant::Long(32769)
        );
        assert_eq!(
            unmarshal(b"l\xfe\xff\xff\xff\x01\x00\x01\x00").unwrap(),
            Constant::Long(-32769)
        );
        // 2**75 does not fit
        let mut huge = b"l\x06\x00\x00\x00".to_vec();
        huge.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0]);
        assert!(matches!(
            unmarshal(&huge),
            Err(Error::IntegerOverflow { offset: 0 })
        ));
    }

    #[test]
    fn interned_strings_are_remembered() {
        let bytes = b"(\x02\x00\x00\x00t\x01\x00\x00\x00xR\x00\x00\x00\x00";
        assert_eq!(
            unmarshal(bytes).unwrap(),
            Constant::tuple(vec![Constant::bytes("x"), Constant::bytes("x")])
        );
        assert!(matches!(
            unmarshal(b"R\x03\x00\x00\x00"),
            Err(Error::BadStringRef { index: 3, .. })
        ));
    }

    #[test]
    fn rejected_objects() {
        assert!(matches!(
            unmarshal(b"{0"),
            Err(Error::UnsupportedObject { tag: b'{', offset: 0 })
        ));
        assert!(matches!(
            unmarshal(b"Z"),
            Err(Error::UnknownTag { tag: b'Z', offset: 0 })
        ));
        assert!(matches!(
            unmarshal(b"s\xff\xff\xff\xff"),
            Err(Error::NegativeLength { length: -1, offset: 1 })
        ));
        assert!(matches!(unmarshal(b"s\x05\x00\x00\x00ab"), Err(Error::IoError(_))));
    }

    #[test]
    fn huge_length_on_short_input() {
        match unmarshal(b"s\xff\xff\xff\x7fab") {
            Err(Error::IoError(err)) => assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn nesting_is_limited() {
        fn nested_tuples(depth: usize) -> Vec<u8> {
            let mut bytes = b"(\x01\x00\x00\x00".repeat(depth);
            bytes.push(b'N');
            bytes
        }

        // Plenty of stack so that only the limit itself can stop the reader
        let reader = std::thread::Builder::new()
            .stack_size(64 * 1024 * 1024)
            .spawn(|| {
                let deepest = unmarshal(&nested_tuples(MAX_DEPTH - 1));
                let too_deep = unmarshal(&nested_tuples(500_000));
                (deepest.is_ok(), too_deep)
            })
            .unwrap();
        let (deepest_ok, too_deep) = reader.join().unwrap();

        assert!(deepest_ok);
        assert!(matches!(
            too_deep,
            Err(Error::RecursionLimit { offset }) if offset == 5 * MAX_DEPTH as u64
        ));
    }

    #[test]
    fn negative_first_line_is_rejected() {
        let unit = CodeUnit::builder("f", "m.py").first_line(u32::MAX).build();
        let mut bytes = vec![];
        unit.serialize(&mut bytes).unwrap();
        assert!(matches!(
            unmarshal(&bytes),
            Err(Error::UnexpectedObject {
                expected: "non-negative first line number",
                ..
            })
        ));
    }

    #[test]
    fn code_round_trip() {
        let inner = CodeUnit::builder("inner", "m.py")
            .arg_count(1)
            .local_count(1)
            .stack_size(1)
            .raw_flags(0x43)
            .instructions(vec![124, 0, 0, 83])
            .local_names(vec!["x"])
            .first_line(2)
            .line_table(vec![0, 1])
            .build();
        let module = CodeUnit::builder("<module>", "m.py")
            .stack_size(2)
            .raw_flags(0x40)
            .instructions(vec![100, 0, 0, 132, 0, 0, 90, 0, 0, 100, 1, 0, 83])
            .constants(vec![
                Constant::code(inner),
                Constant::None,
                Constant::Int(1 << 40),
                Constant::Long(5),
                Constant::Long(-(1 << 40)),
                Constant::Long(i64::MIN),
                Constant::Float(0.1),
                Constant::Float(f64::NAN),
                Constant::unicode("caf\u{e9}"),
                Constant::tuple(vec![Constant::Bool(false), Constant::Ellipsis]),
            ])
            .names(vec!["inner"])
            .build();

        let pyc = Pyc::new(Arc::new(module), 1_234_567);
        let mut bytes = vec![];
        pyc.serialize(&mut bytes).unwrap();
        let read_back = read_pyc(Cursor::new(&bytes)).unwrap();
        assert_eq!(read_back, pyc);
    }

    #[test]
    fn foreign_magic_is_rejected() {
        let bytes = b"\x33\x0d\x0d\x0a\x00\x00\x00\x00N";
        assert!(matches!(
            read_pyc(Cursor::new(&bytes[..])),
            Err(Error::BadMagic([0x33, 0x0d, 0x0d, 0x0a]))
        ));
    }

    #[test]
    fn module_must_be_code() {
        let bytes = b"\x03\xf3\x0d\x0a\x00\x00\x00\x00N";
        assert!(matches!(
            read_pyc(Cursor::new(&bytes[..])),
            Err(Error::UnexpectedObject {
                expected: "code object",
                offset: 8
            })
        ));
    }
}
