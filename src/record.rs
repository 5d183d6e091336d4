//! Fixed-layout record instances: flat storage read and written through a
//! compiled [`StructLayout`].

use std::fmt;
use std::sync::Arc;

use crate::errors::{span, BlockError, Error};
use crate::layout::{CompiledKind, StructLayout};
use crate::scalar::{Endianness, ScalarKind};
use crate::value::Value;

/// An instance of a compiled structure: exactly `layout.size()` bytes of
/// storage, in wire order. Field access goes through the compiled layout
/// (byte order, bit extraction, promotion); `decode`/`encode` are plain
/// bounded copies.
#[derive(Debug, Clone)]
pub struct Record {
    layout: Arc<StructLayout>,
    bytes: Vec<u8>,
}

impl Record {
    /// A zero-filled instance of `layout`.
    pub fn new(layout: Arc<StructLayout>) -> Self {
        let bytes = vec![0; layout.size()];
        Record { layout, bytes }
    }

    pub(crate) fn from_bytes(layout: Arc<StructLayout>, bytes: Vec<u8>) -> Self {
        debug_assert_eq!(bytes.len(), layout.size());
        Record { layout, bytes }
    }

    pub fn layout(&self) -> &Arc<StructLayout> {
        &self.layout
    }

    pub fn size(&self) -> usize {
        self.layout.size()
    }

    /// Raw storage in wire order.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Copies exactly `size` bytes from `buf` at `offset` into storage.
    /// On a short buffer the instance is left untouched.
    pub fn decode(&mut self, buf: &[u8], offset: usize) -> Result<usize, Error> {
        let n = self.layout.size();
        span(buf.len(), offset, n).map_err(Error::Block)?;
        self.bytes.copy_from_slice(&buf[offset..offset + n]);
        Ok(n)
    }

    /// Copies exactly `size` bytes of storage into `buf` at `offset`.
    pub fn encode(&self, buf: &mut [u8], offset: usize) -> Result<usize, Error> {
        let n = self.layout.size();
        span(buf.len(), offset, n).map_err(Error::Block)?;
        buf[offset..offset + n].copy_from_slice(&self.bytes);
        Ok(n)
    }

    /// Reads a field by direct or promoted name. Scalars and bitfields come
    /// back as scalar values; nested records as a snapshot copy (promoted
    /// names, by contrast, alias the parent's storage directly).
    pub fn get(&self, name: &str) -> Result<Value, Error> {
        let (offset, kind, endian) = self
            .layout
            .resolve(name)
            .ok_or_else(|| BlockError::UnresolvedReference(name.to_string()))?;
        read_kind(&self.bytes, offset, kind, endian).map_err(Error::Block)
    }

    /// Writes a field by direct or promoted name.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), Error> {
        let value = value.into();
        let (offset, kind, endian) = match self.layout.resolve(name) {
            Some((o, k, e)) => (o, k.clone(), e),
            None => return Err(BlockError::UnresolvedReference(name.to_string()).into()),
        };
        write_kind(&mut self.bytes, offset, &kind, endian, &value).map_err(Error::Block)
    }

    pub fn get_u64(&self, name: &str) -> Result<u64, Error> {
        let v = self.get(name)?;
        v.as_u64().ok_or_else(|| {
            Error::Block(BlockError::TypeMismatch {
                expected: "unsigned integer",
                found: v.kind_name(),
            })
        })
    }

    pub fn get_i64(&self, name: &str) -> Result<i64, Error> {
        let v = self.get(name)?;
        v.as_i64().ok_or_else(|| {
            Error::Block(BlockError::TypeMismatch {
                expected: "integer",
                found: v.kind_name(),
            })
        })
    }

    pub fn get_f64(&self, name: &str) -> Result<f64, Error> {
        let v = self.get(name)?;
        v.as_f64().ok_or_else(|| {
            Error::Block(BlockError::TypeMismatch {
                expected: "float",
                found: v.kind_name(),
            })
        })
    }

    /// Reads a `u8`/`char` array field as raw bytes.
    pub fn get_bytes(&self, name: &str) -> Result<Vec<u8>, Error> {
        let (offset, kind, _) = self
            .layout
            .resolve(name)
            .ok_or_else(|| BlockError::UnresolvedReference(name.to_string()))?;
        match kind {
            CompiledKind::Array { elem, count }
                if matches!(elem, ScalarKind::U8 | ScalarKind::Char) =>
            {
                Ok(self.bytes[offset..offset + count].to_vec())
            }
            _ => Err(BlockError::TypeMismatch {
                expected: "byte array",
                found: "other field",
            }
            .into()),
        }
    }

    /// Writes a `u8`/`char` array field from raw bytes.
    pub fn set_bytes(&mut self, name: &str, data: &[u8]) -> Result<(), Error> {
        let (offset, kind, _) = self
            .layout
            .resolve(name)
            .ok_or_else(|| BlockError::UnresolvedReference(name.to_string()))?;
        match kind {
            CompiledKind::Array { elem, count }
                if matches!(elem, ScalarKind::U8 | ScalarKind::Char) && *count == data.len() =>
            {
                let count = *count;
                self.bytes[offset..offset + count].copy_from_slice(data);
                Ok(())
            }
            _ => Err(BlockError::TypeMismatch {
                expected: "byte array of matching length",
                found: "other field",
            }
            .into()),
        }
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.layout.name() == other.layout.name() && self.bytes == other.bytes
    }
}

fn read_kind(
    bytes: &[u8],
    offset: usize,
    kind: &CompiledKind,
    endian: Endianness,
) -> Result<Value, BlockError> {
    match kind {
        CompiledKind::Scalar(k) => k.read(bytes, offset, endian),
        CompiledKind::Bits {
            backing,
            shift,
            width,
        } => {
            let unit = backing.read_unit(bytes, offset, endian)?;
            let raw = (unit >> shift) & mask_bits(*width);
            Ok(if backing.is_signed() {
                Value::I64(sign_extend(raw, *width))
            } else {
                Value::U64(raw)
            })
        }
        CompiledKind::Array { elem, count } => {
            let mut items = Vec::with_capacity(*count);
            for i in 0..*count {
                items.push(elem.read(bytes, offset + i * elem.width(), endian)?);
            }
            Ok(Value::Array(items))
        }
        CompiledKind::Struct { layout, .. } => {
            let sub = bytes[offset..offset + layout.size()].to_vec();
            Ok(Value::Record(Record::from_bytes(layout.clone(), sub)))
        }
    }
}

fn write_kind(
    bytes: &mut [u8],
    offset: usize,
    kind: &CompiledKind,
    endian: Endianness,
    value: &Value,
) -> Result<(), BlockError> {
    match kind {
        CompiledKind::Scalar(k) => k.write(value, bytes, offset, endian),
        CompiledKind::Bits {
            backing,
            shift,
            width,
        } => {
            let raw = if backing.is_signed() {
                value.as_i64().ok_or(BlockError::TypeMismatch {
                    expected: "integer",
                    found: value.kind_name(),
                })? as u64
            } else {
                value.as_u64().ok_or(BlockError::TypeMismatch {
                    expected: "unsigned integer",
                    found: value.kind_name(),
                })?
            };
            let mask = mask_bits(*width);
            let mut unit = backing.read_unit(bytes, offset, endian)?;
            unit &= !(mask << shift);
            unit |= (raw & mask) << shift;
            backing.write_unit(unit, bytes, offset, endian)
        }
        CompiledKind::Array { elem, count } => {
            let items = value.as_array().ok_or(BlockError::TypeMismatch {
                expected: "array",
                found: value.kind_name(),
            })?;
            if items.len() != *count {
                return Err(BlockError::TypeMismatch {
                    expected: "array of matching length",
                    found: "array",
                });
            }
            for (i, item) in items.iter().enumerate() {
                elem.write(item, bytes, offset + i * elem.width(), endian)?;
            }
            Ok(())
        }
        CompiledKind::Struct { layout, .. } => {
            let sub = value.as_record().ok_or(BlockError::TypeMismatch {
                expected: "record",
                found: value.kind_name(),
            })?;
            if sub.size() != layout.size() {
                return Err(BlockError::TypeMismatch {
                    expected: "record of matching layout",
                    found: "record",
                });
            }
            bytes[offset..offset + layout.size()].copy_from_slice(sub.as_bytes());
            Ok(())
        }
    }
}

fn mask_bits(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

fn sign_extend(raw: u64, width: u32) -> i64 {
    if width == 0 || width >= 64 {
        return raw as i64;
    }
    let sign = 1u64 << (width - 1);
    if raw & sign != 0 {
        (raw | !mask_bits(width)) as i64
    } else {
        raw as i64
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.layout.name())?;
        for (i, field) in self.layout.fields().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match read_kind(&self.bytes, field.offset, &field.kind, self.layout.endian()) {
                Ok(v) => write!(f, "{}={}", field.name, v)?,
                Err(_) => write!(f, "{}=?", field.name)?,
            }
        }
        write!(f, ")")
    }
}
