use super::{tag, Pyc};
use crate::code::{CodeUnit, Constant};
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{Error, ErrorKind, Result};

/// Utility trait for serializing objects in the `marshal` format
///
/// Every object starts with a one byte type code. Lengths are signed 32-bit, so anything longer
/// than `i32::MAX` cannot be written.
pub trait Serialize: Sized {
    /// Serialize construct into a binary output stream
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()>;
}

fn write_length<W: WriteBytesExt>(writer: &mut W, length: usize) -> Result<()> {
    let length = i32::try_from(length).map_err(|_| {
        Error::new(
            ErrorKind::InvalidInput,
            format!("sequence of length {} is too long to marshal", length),
        )
    })?;
    writer.write_i32::<LittleEndian>(length)
}

fn write_bytes<W: WriteBytesExt>(writer: &mut W, type_code: u8, bytes: &[u8]) -> Result<()> {
    writer.write_u8(type_code)?;
    write_length(writer, bytes.len())?;
    writer.write_all(bytes)
}

/// Signed digit count, then the magnitude in 15-bit digits, least significant first
fn write_long<W: WriteBytesExt>(writer: &mut W, value: i64) -> Result<()> {
    let mut magnitude = value.unsigned_abs();
    let mut digits = vec![];
    while magnitude != 0 {
        digits.push((magnitude & 0x7fff) as u16);
        magnitude >>= 15;
    }

    let count = digits.len() as i32;
    writer.write_u8(tag::LONG)?;
    writer.write_i32::<LittleEndian>(if value < 0 { -count } else { count })?;
    for digit in digits {
        writer.write_u16::<LittleEndian>(digit)?;
    }
    Ok(())
}

/// Names are written as plain byte strings
fn write_names<W: WriteBytesExt>(writer: &mut W, names: &[String]) -> Result<()> {
    writer.write_u8(tag::TUPLE)?;
    write_length(writer, names.len())?;
    for name in names {
        write_bytes(writer, tag::STRING, name.as_bytes())?;
    }
    Ok(())
}

impl Serialize for Constant {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        match self {
            Constant::None => writer.write_u8(tag::NONE),
            Constant::Bool(true) => writer.write_u8(tag::TRUE),
            Constant::Bool(false) => writer.write_u8(tag::FALSE),
            Constant::Ellipsis => writer.write_u8(tag::ELLIPSIS),
            Constant::Int(value) => match i32::try_from(*value) {
                Ok(small) => {
                    writer.write_u8(tag::INT)?;
                    writer.write_i32::<LittleEndian>(small)
                }
                Err(_) => {
                    writer.write_u8(tag::INT64)?;
                    writer.write_i64::<LittleEndian>(*value)
                }
            },
            Constant::Long(value) => write_long(writer, *value),
            Constant::Float(value) => {
                writer.write_u8(tag::BINARY_FLOAT)?;
                writer.write_f64::<LittleEndian>(*value)
            }
            Constant::Complex { real, imag } => {
                writer.write_u8(tag::BINARY_COMPLEX)?;
                writer.write_f64::<LittleEndian>(*real)?;
                writer.write_f64::<LittleEndian>(*imag)
            }
            Constant::Bytes(bytes) => write_bytes(writer, tag::STRING, bytes),
            Constant::Unicode(text) => write_bytes(writer, tag::UNICODE, text.as_bytes()),
            Constant::Tuple(elements) => {
                writer.write_u8(tag::TUPLE)?;
                write_length(writer, elements.len())?;
                for element in elements.iter() {
                    element.serialize(writer)?;
                }
                Ok(())
            }
            Constant::Code(unit) => unit.serialize(writer),
        }
    }
}

impl Serialize for CodeUnit {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(tag::CODE)?;
        writer.write_u32::<LittleEndian>(self.arg_count())?;
        writer.write_u32::<LittleEndian>(self.local_count())?;
        writer.write_u32::<LittleEndian>(self.stack_size())?;
        writer.write_u32::<LittleEndian>(self.raw_flags())?;
        write_bytes(writer, tag::STRING, self.instructions())?;

        writer.write_u8(tag::TUPLE)?;
        write_length(writer, self.constants().len())?;
        for constant in self.constants() {
            constant.serialize(writer)?;
        }

        write_names(writer, self.names())?;
        write_names(writer, self.local_names())?;
        write_names(writer, self.free_vars())?;
        write_names(writer, self.cell_vars())?;
        write_bytes(writer, tag::STRING, self.source_file().as_bytes())?;
        write_bytes(writer, tag::STRING, self.qualified_name().as_bytes())?;
        writer.write_u32::<LittleEndian>(self.first_line())?;
        write_bytes(writer, tag::STRING, self.line_table())
    }
}

impl Serialize for Pyc {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.magic)?;
        writer.write_u32::<LittleEndian>(self.mtime)?;
        self.code.serialize(writer)
    }
}
