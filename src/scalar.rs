//! Closed registry of primitive binary scalar kinds and their wire codec.

use crate::errors::{span, BlockError};
use crate::value::Value;
use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Byte order for multi-byte scalars. Affects only which byte is most
/// significant, never field ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endianness {
    Big,
    Little,
}

impl Endianness {
    /// Engine default, used for bare scalars handed to the top-level entry
    /// points and for union layouts.
    pub const DEFAULT: Endianness = Endianness::Little;
}

/// The finite set of primitive scalar kinds a field can be stored as.
///
/// `Char` is a raw one-byte value kept distinct from `U8` so schemas can
/// mark text-ish bytes; it has identical wire behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    U8,
    I8,
    Char,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
    /// 80-bit extended float, carried as raw bytes (see [`Value::F80`]).
    F80,
}

impl ScalarKind {
    /// Storage width in bytes.
    pub const fn width(self) -> usize {
        match self {
            ScalarKind::U8 | ScalarKind::I8 | ScalarKind::Char => 1,
            ScalarKind::U16 | ScalarKind::I16 => 2,
            ScalarKind::U32 | ScalarKind::I32 | ScalarKind::F32 => 4,
            ScalarKind::U64 | ScalarKind::I64 | ScalarKind::F64 => 8,
            ScalarKind::F80 => 10,
        }
    }

    /// Storage width in bits.
    pub const fn bits(self) -> u32 {
        (self.width() * 8) as u32
    }

    /// Natural alignment used by non-packed layouts. Width for the
    /// power-of-two widths, 2 for the 10-byte extended float; a fixed engine
    /// convention, not a platform probe.
    pub const fn alignment(self) -> usize {
        match self {
            ScalarKind::F80 => 2,
            k => k.width(),
        }
    }

    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            ScalarKind::I8 | ScalarKind::I16 | ScalarKind::I32 | ScalarKind::I64
        )
    }

    pub const fn is_integer(self) -> bool {
        !matches!(self, ScalarKind::F32 | ScalarKind::F64 | ScalarKind::F80)
    }

    /// The zero value of this kind.
    pub fn zero(self) -> Value {
        match self {
            ScalarKind::U8 => Value::U8(0),
            ScalarKind::I8 => Value::I8(0),
            ScalarKind::Char => Value::Char(0),
            ScalarKind::U16 => Value::U16(0),
            ScalarKind::I16 => Value::I16(0),
            ScalarKind::U32 => Value::U32(0),
            ScalarKind::I32 => Value::I32(0),
            ScalarKind::U64 => Value::U64(0),
            ScalarKind::I64 => Value::I64(0),
            ScalarKind::F32 => Value::F32(0.0),
            ScalarKind::F64 => Value::F64(0.0),
            ScalarKind::F80 => Value::F80([0; 10]),
        }
    }

    /// Reads one scalar of this kind from `buf` at `offset`.
    pub fn read(self, buf: &[u8], offset: usize, endian: Endianness) -> Result<Value, BlockError> {
        span(buf.len(), offset, self.width())?;
        let b = &buf[offset..offset + self.width()];
        Ok(match (self, endian) {
            (ScalarKind::U8, _) => Value::U8(b[0]),
            (ScalarKind::I8, _) => Value::I8(b[0] as i8),
            (ScalarKind::Char, _) => Value::Char(b[0]),
            (ScalarKind::U16, Endianness::Big) => Value::U16(BigEndian::read_u16(b)),
            (ScalarKind::U16, Endianness::Little) => Value::U16(LittleEndian::read_u16(b)),
            (ScalarKind::I16, Endianness::Big) => Value::I16(BigEndian::read_i16(b)),
            (ScalarKind::I16, Endianness::Little) => Value::I16(LittleEndian::read_i16(b)),
            (ScalarKind::U32, Endianness::Big) => Value::U32(BigEndian::read_u32(b)),
            (ScalarKind::U32, Endianness::Little) => Value::U32(LittleEndian::read_u32(b)),
            (ScalarKind::I32, Endianness::Big) => Value::I32(BigEndian::read_i32(b)),
            (ScalarKind::I32, Endianness::Little) => Value::I32(LittleEndian::read_i32(b)),
            (ScalarKind::U64, Endianness::Big) => Value::U64(BigEndian::read_u64(b)),
            (ScalarKind::U64, Endianness::Little) => Value::U64(LittleEndian::read_u64(b)),
            (ScalarKind::I64, Endianness::Big) => Value::I64(BigEndian::read_i64(b)),
            (ScalarKind::I64, Endianness::Little) => Value::I64(LittleEndian::read_i64(b)),
            (ScalarKind::F32, Endianness::Big) => Value::F32(BigEndian::read_f32(b)),
            (ScalarKind::F32, Endianness::Little) => Value::F32(LittleEndian::read_f32(b)),
            (ScalarKind::F64, Endianness::Big) => Value::F64(BigEndian::read_f64(b)),
            (ScalarKind::F64, Endianness::Little) => Value::F64(LittleEndian::read_f64(b)),
            (ScalarKind::F80, endian) => {
                // Extended floats are carried as raw bytes, normalized to
                // little-endian order so round trips are exact.
                let mut raw = [0u8; 10];
                raw.copy_from_slice(b);
                if endian == Endianness::Big {
                    raw.reverse();
                }
                Value::F80(raw)
            }
        })
    }

    /// Writes `value` as one scalar of this kind into `buf` at `offset`.
    pub fn write(
        self,
        value: &Value,
        buf: &mut [u8],
        offset: usize,
        endian: Endianness,
    ) -> Result<(), BlockError> {
        span(buf.len(), offset, self.width())?;
        let b = &mut buf[offset..offset + self.width()];
        match self {
            ScalarKind::U8 | ScalarKind::Char => b[0] = expect_u64(self, value)? as u8,
            ScalarKind::I8 => b[0] = expect_i64(self, value)? as u8,
            ScalarKind::U16 => write_uint(b, endian, expect_u64(self, value)?),
            ScalarKind::U32 => write_uint(b, endian, expect_u64(self, value)?),
            ScalarKind::U64 => write_uint(b, endian, expect_u64(self, value)?),
            ScalarKind::I16 => write_uint(b, endian, expect_i64(self, value)? as u64),
            ScalarKind::I32 => write_uint(b, endian, expect_i64(self, value)? as u64),
            ScalarKind::I64 => write_uint(b, endian, expect_i64(self, value)? as u64),
            ScalarKind::F32 => {
                let v = value.as_f32().ok_or(BlockError::TypeMismatch {
                    expected: "f32",
                    found: value.kind_name(),
                })?;
                match endian {
                    Endianness::Big => BigEndian::write_f32(b, v),
                    Endianness::Little => LittleEndian::write_f32(b, v),
                }
            }
            ScalarKind::F64 => {
                let v = value.as_f64().ok_or(BlockError::TypeMismatch {
                    expected: "f64",
                    found: value.kind_name(),
                })?;
                match endian {
                    Endianness::Big => BigEndian::write_f64(b, v),
                    Endianness::Little => LittleEndian::write_f64(b, v),
                }
            }
            ScalarKind::F80 => {
                let raw = match value {
                    Value::F80(raw) => *raw,
                    other => {
                        return Err(BlockError::TypeMismatch {
                            expected: "f80",
                            found: other.kind_name(),
                        })
                    }
                };
                b.copy_from_slice(&raw);
                if endian == Endianness::Big {
                    b.reverse();
                }
            }
        }
        Ok(())
    }

    /// Reads the storage unit of an integer kind as a raw unsigned value.
    /// Used for bitfield units, which extract their bits from this.
    pub(crate) fn read_unit(
        self,
        buf: &[u8],
        offset: usize,
        endian: Endianness,
    ) -> Result<u64, BlockError> {
        span(buf.len(), offset, self.width())?;
        let b = &buf[offset..offset + self.width()];
        Ok(match endian {
            Endianness::Big => BigEndian::read_uint(b, self.width()),
            Endianness::Little => LittleEndian::read_uint(b, self.width()),
        })
    }

    /// Writes a raw unsigned value into the storage unit of an integer kind.
    pub(crate) fn write_unit(
        self,
        unit: u64,
        buf: &mut [u8],
        offset: usize,
        endian: Endianness,
    ) -> Result<(), BlockError> {
        span(buf.len(), offset, self.width())?;
        let b = &mut buf[offset..offset + self.width()];
        write_uint(b, endian, unit);
        Ok(())
    }
}

fn write_uint(b: &mut [u8], endian: Endianness, v: u64) {
    let n = b.len();
    match endian {
        Endianness::Big => BigEndian::write_uint(b, v & mask_bytes(n), n),
        Endianness::Little => LittleEndian::write_uint(b, v & mask_bytes(n), n),
    }
}

const fn mask_bytes(n: usize) -> u64 {
    if n >= 8 {
        u64::MAX
    } else {
        (1u64 << (n * 8)) - 1
    }
}

fn expect_u64(kind: ScalarKind, value: &Value) -> Result<u64, BlockError> {
    value.as_u64().ok_or(BlockError::TypeMismatch {
        expected: unsigned_name(kind),
        found: value.kind_name(),
    })
}

fn expect_i64(kind: ScalarKind, value: &Value) -> Result<i64, BlockError> {
    value.as_i64().ok_or(BlockError::TypeMismatch {
        expected: signed_name(kind),
        found: value.kind_name(),
    })
}

const fn unsigned_name(kind: ScalarKind) -> &'static str {
    match kind {
        ScalarKind::U8 => "u8",
        ScalarKind::Char => "char",
        ScalarKind::U16 => "u16",
        ScalarKind::U32 => "u32",
        _ => "u64",
    }
}

const fn signed_name(kind: ScalarKind) -> &'static str {
    match kind {
        ScalarKind::I8 => "i8",
        ScalarKind::I16 => "i16",
        ScalarKind::I32 => "i32",
        _ => "i64",
    }
}
