//! Dependent evaluator: the recursive decode/encode traversal.
//!
//! Decode and encode are structurally symmetric. Both dispatch three ways:
//! scalar and record leaves handle themselves, custom blocks (sequences)
//! supply their own pair through [`CustomBlock`], and composite blocks loop
//! over declared fields. On decode the composite loop evaluates each field's
//! type expression against the values already decoded by earlier iterations
//! of the same loop; on encode no expression is re-evaluated, because every
//! field already holds a concrete typed value.
//!
//! Buffers are plain slices with explicit offsets, so any schema composes at
//! an arbitrary position inside a larger buffer. Bare scalars (and
//! bare-scalar sequences) handed to the top-level entry points use the
//! engine default byte order; fields inside a block use the block's.

use crate::block::{BlockValue, CustomBlock, Scope, TypeDesc, TypeExpr};
use crate::errors::{span, BlockError, Error};
use crate::record::Record;
use crate::scalar::Endianness;
use crate::value::Value;

/// Decodes `value` in place from `buf` at `offset`, returning the bytes
/// consumed. On failure the call aborts as a whole and `value` must be
/// treated as invalid.
pub fn decode(value: &mut Value, buf: &[u8], offset: usize) -> Result<usize, Error> {
    decode_with(value, buf, offset, Endianness::DEFAULT)
}

/// Encodes `value` into `buf` at `offset`, returning the bytes written.
/// The destination region must be large enough; see [`encoded_len`].
pub fn encode(value: &Value, buf: &mut [u8], offset: usize) -> Result<usize, Error> {
    encode_with(value, buf, offset, Endianness::DEFAULT)
}

/// The zero value of a resolved type, ready to decode into.
pub fn instantiate(ty: &TypeDesc) -> Value {
    instantiate_with(ty, Endianness::DEFAULT)
}

/// Exact encoded size of `value`: what [`encode`] will write.
pub fn encoded_len(value: &Value) -> usize {
    match value {
        Value::Record(r) => r.size(),
        Value::Block(b) => b.entries().iter().map(|(_, v)| encoded_len(v)).sum(),
        Value::Seq(s) => s.iter().map(encoded_len).sum(),
        Value::Array(items) => items.iter().map(encoded_len).sum(),
        Value::Custom(c) => c.encoded_len(),
        Value::Empty => 0,
        scalar => scalar.scalar_kind().map(|k| k.width()).unwrap_or(0),
    }
}

/// Encodes `value` into a freshly sized buffer.
pub fn to_bytes(value: &Value) -> Result<Vec<u8>, Error> {
    let mut buf = vec![0; encoded_len(value)];
    let n = encode(value, &mut buf, 0)?;
    buf.truncate(n);
    Ok(buf)
}

pub(crate) fn instantiate_with(ty: &TypeDesc, endian: Endianness) -> Value {
    match ty {
        TypeDesc::Scalar(k) => k.zero(),
        TypeDesc::Struct(layout) => Value::Record(Record::new(layout.clone())),
        TypeDesc::Block(schema) => Value::Block(BlockValue::new(schema.clone())),
        TypeDesc::Array { elem, count } => {
            Value::Array(vec![instantiate_with(elem, endian); *count])
        }
        TypeDesc::Seq(t) => Value::Seq(crate::block::Sequence::with_endian(t.clone(), endian)),
        TypeDesc::Custom(factory) => Value::Custom((factory.as_ref())()),
        TypeDesc::Empty => Value::Empty,
    }
}

pub(crate) fn decode_with(
    value: &mut Value,
    buf: &[u8],
    offset: usize,
    endian: Endianness,
) -> Result<usize, Error> {
    match value {
        Value::Record(r) => r.decode(buf, offset),
        Value::Block(b) => decode_block(b, buf, offset),
        Value::Seq(s) => s.decode_self(buf, offset),
        Value::Custom(c) => c.decode_self(buf, offset),
        Value::Array(items) => {
            let mut off = offset;
            for item in items.iter_mut() {
                off += decode_with(item, buf, off, endian)?;
            }
            Ok(off - offset)
        }
        Value::Empty => Ok(0),
        scalar => {
            let kind = scalar.scalar_kind().ok_or(BlockError::TypeMismatch {
                expected: "scalar leaf",
                found: scalar.kind_name(),
            })?;
            *scalar = kind.read(buf, offset, endian).map_err(Error::Block)?;
            Ok(kind.width())
        }
    }
}

pub(crate) fn encode_with(
    value: &Value,
    buf: &mut [u8],
    offset: usize,
    endian: Endianness,
) -> Result<usize, Error> {
    match value {
        Value::Record(r) => r.encode(buf, offset),
        Value::Block(b) => encode_block(b, buf, offset),
        Value::Seq(s) => s.encode_self(buf, offset),
        Value::Custom(c) => c.encode_self(buf, offset),
        Value::Array(items) => {
            let mut off = offset;
            for item in items {
                off += encode_with(item, buf, off, endian)?;
            }
            Ok(off - offset)
        }
        Value::Empty => Ok(0),
        scalar => {
            let kind = scalar.scalar_kind().ok_or(BlockError::TypeMismatch {
                expected: "scalar leaf",
                found: scalar.kind_name(),
            })?;
            kind.write(scalar, buf, offset, endian)
                .map_err(Error::Block)?;
            Ok(kind.width())
        }
    }
}

fn decode_block(b: &mut BlockValue, buf: &[u8], offset: usize) -> Result<usize, Error> {
    let schema = b.schema().clone();
    let endian = schema.endian();
    b.clear();
    let mut off = offset;
    for field in schema.fields() {
        let ty = match &field.ty {
            TypeExpr::Const(t) => t.clone(),
            TypeExpr::Resolver(resolve) => (resolve.as_ref())(&Scope::new(b.entries()))?,
        };
        // Reject wire-supplied shapes that cannot fit the remaining bytes
        // before allocating element storage for them.
        let min = ty.min_size();
        if min > 0 {
            span(buf.len(), off, min).map_err(Error::Block)?;
        }
        let mut value = instantiate_with(&ty, endian);
        off += decode_with(&mut value, buf, off, endian)?;
        b.push_entry(field.name.clone(), value);
    }
    Ok(off - offset)
}

fn encode_block(b: &BlockValue, buf: &mut [u8], offset: usize) -> Result<usize, Error> {
    let schema = b.schema().clone();
    let endian = schema.endian();
    let mut off = offset;
    for field in schema.fields() {
        let value = b
            .get(&field.name)
            .ok_or_else(|| BlockError::UnresolvedReference(field.name.clone()))?;
        off += encode_with(value, buf, off, endian)?;
    }
    Ok(off - offset)
}
