//! Runtime values produced by decode and consumed by encode.

use std::fmt;

use crate::block::{BlockValue, CustomBlock, Sequence};
use crate::record::Record;
use crate::scalar::ScalarKind;

/// A single decoded value: a scalar leaf, a fixed-layout record, a dependent
/// block, an array, a repeat sequence, a user-supplied custom block, or the
/// zero-size placeholder an `optional` with a false condition resolves to.
#[derive(Debug, Clone)]
pub enum Value {
    U8(u8),
    I8(i8),
    Char(u8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
    F64(f64),
    /// 80-bit extended float as raw little-endian bytes: 64-bit mantissa
    /// (explicit integer bit included) then sign + 15-bit exponent.
    F80([u8; 10]),
    Record(Record),
    Block(BlockValue),
    Array(Vec<Value>),
    Seq(Sequence),
    /// A value driving its own decode/encode through the custom block
    /// contract. Compares unequal to everything, including itself.
    Custom(Box<dyn CustomBlock>),
    /// Zero-size, zero-field placeholder; contributes 0 bytes both ways.
    Empty,
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::U8(a), Value::U8(b)) => a == b,
            (Value::I8(a), Value::I8(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::U16(a), Value::U16(b)) => a == b,
            (Value::I16(a), Value::I16(b)) => a == b,
            (Value::U32(a), Value::U32(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a == b,
            (Value::F80(a), Value::F80(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Block(a), Value::Block(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Seq(a), Value::Seq(b)) => a == b,
            (Value::Empty, Value::Empty) => true,
            _ => false,
        }
    }
}

impl Value {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U8(x) | Value::Char(x) => Some(*x as u64),
            Value::U16(x) => Some(*x as u64),
            Value::U32(x) => Some(*x as u64),
            Value::U64(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I8(x) => Some(*x as i64),
            Value::I16(x) => Some(*x as i64),
            Value::I32(x) => Some(*x as i64),
            Value::I64(x) => Some(*x),
            Value::U8(x) | Value::Char(x) => Some(*x as i64),
            Value::U16(x) => Some(*x as i64),
            Value::U32(x) => Some(*x as i64),
            Value::U64(x) => Some(*x as i64),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::F32(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F32(x) => Some(*x as f64),
            Value::F64(x) => Some(*x),
            Value::F80(raw) => Some(extended_to_f64(raw)),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_block(&self) -> Option<&BlockValue> {
        match self {
            Value::Block(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&Sequence> {
        match self {
            Value::Seq(s) => Some(s),
            _ => None,
        }
    }

    /// The scalar kind of a scalar leaf value, `None` for composites.
    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        Some(match self {
            Value::U8(_) => ScalarKind::U8,
            Value::I8(_) => ScalarKind::I8,
            Value::Char(_) => ScalarKind::Char,
            Value::U16(_) => ScalarKind::U16,
            Value::I16(_) => ScalarKind::I16,
            Value::U32(_) => ScalarKind::U32,
            Value::I32(_) => ScalarKind::I32,
            Value::U64(_) => ScalarKind::U64,
            Value::I64(_) => ScalarKind::I64,
            Value::F32(_) => ScalarKind::F32,
            Value::F64(_) => ScalarKind::F64,
            Value::F80(_) => ScalarKind::F80,
            _ => return None,
        })
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Value::U8(_) => "u8",
            Value::I8(_) => "i8",
            Value::Char(_) => "char",
            Value::U16(_) => "u16",
            Value::I16(_) => "i16",
            Value::U32(_) => "u32",
            Value::I32(_) => "i32",
            Value::U64(_) => "u64",
            Value::I64(_) => "i64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::F80(_) => "f80",
            Value::Record(_) => "record",
            Value::Block(_) => "block",
            Value::Array(_) => "array",
            Value::Seq(_) => "sequence",
            Value::Custom(_) => "custom",
            Value::Empty => "empty",
        }
    }
}

/// Best-effort conversion of an 80-bit extended float to `f64`.
fn extended_to_f64(raw: &[u8; 10]) -> f64 {
    let mantissa = u64::from_le_bytes([
        raw[0], raw[1], raw[2], raw[3], raw[4], raw[5], raw[6], raw[7],
    ]);
    let se = u16::from_le_bytes([raw[8], raw[9]]);
    let sign = if se & 0x8000 != 0 { -1.0 } else { 1.0 };
    let exp = (se & 0x7fff) as i32;
    if exp == 0x7fff {
        return if mantissa << 1 == 0 {
            sign * f64::INFINITY
        } else {
            f64::NAN
        };
    }
    if mantissa == 0 {
        return sign * 0.0;
    }
    // The explicit integer bit is part of the mantissa; denormals use the
    // minimum exponent.
    let e = if exp == 0 { 1 } else { exp };
    sign * (mantissa as f64) * (2f64).powi(e - 16383 - 63)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::U8(x) => write!(f, "{x}"),
            Value::I8(x) => write!(f, "{x}"),
            Value::Char(x) => write!(f, "{:?}", *x as char),
            Value::U16(x) => write!(f, "{x}"),
            Value::I16(x) => write!(f, "{x}"),
            Value::U32(x) => write!(f, "{x}"),
            Value::I32(x) => write!(f, "{x}"),
            Value::U64(x) => write!(f, "{x}"),
            Value::I64(x) => write!(f, "{x}"),
            Value::F32(x) => write!(f, "{x}"),
            Value::F64(x) => write!(f, "{x}"),
            Value::F80(raw) => write!(f, "{}", extended_to_f64(raw)),
            Value::Record(r) => write!(f, "{r}"),
            Value::Block(b) => write!(f, "{b}"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Seq(s) => write!(f, "{s}"),
            Value::Custom(c) => write!(f, "{c:?}"),
            Value::Empty => write!(f, "()"),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Value {
                Value::$variant(v)
            }
        })*
    };
}

value_from! {
    u8 => U8, i8 => I8, u16 => U16, i16 => I16,
    u32 => U32, i32 => I32, u64 => U64, i64 => I64,
    f32 => F32, f64 => F64,
    Record => Record, BlockValue => Block, Sequence => Seq,
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Value {
        Value::Array(v)
    }
}
