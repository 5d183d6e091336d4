//! Error types: compile-time layout failures and decode/encode-time block failures.

use crate::scalar::{Endianness, ScalarKind};

/// Errors raised while compiling a structure or block schema. Compilation
/// aborts on the first error; no partial layout is ever produced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("bitfield unit over {backing:?}: {used} + {requested} bits exceed {capacity}")]
    BitfieldOverflow {
        backing: ScalarKind,
        used: u32,
        requested: u32,
        capacity: u32,
    },
    #[error("bitfield backed by non-integer scalar {0:?}")]
    BitfieldBacking(ScalarKind),
    #[error("duplicate field name `{0}`")]
    DuplicateField(String),
    #[error("union layouts use the engine byte order; explicit {0:?} is not supported")]
    UnionByteOrder(Endianness),
}

/// Errors raised while decoding or encoding instances. The failing call
/// aborts as a whole; a partially populated instance is invalid by contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlockError {
    #[error("need {needed} bytes at offset {offset}, {available} available")]
    SizeMismatch {
        needed: usize,
        available: usize,
        offset: usize,
    },
    #[error("field `{0}` is not in scope or not decoded yet")]
    UnresolvedReference(String),
    #[error("discriminant {discriminant:#x} has no branch and no default")]
    DispatchMiss { discriminant: u64 },
    #[error("expected a {expected} value, got {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

/// Any engine error: a layout (compile-time) or block (decode/encode-time)
/// failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Block(#[from] BlockError),
}

/// Bounds check for a read or write of `needed` bytes at `offset`.
pub(crate) fn span(len: usize, offset: usize, needed: usize) -> Result<(), BlockError> {
    let fits = offset
        .checked_add(needed)
        .map(|end| end <= len)
        .unwrap_or(false);
    if fits {
        Ok(())
    } else {
        Err(BlockError::SizeMismatch {
            needed,
            available: len.saturating_sub(offset),
            offset,
        })
    }
}
