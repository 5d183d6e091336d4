//! # binblock — declarative binary records and dependent blocks
//!
//! A schema engine for fixed-size C-like records (scalars, fixed arrays,
//! bitfields, unions, anonymously-merged nested records, explicit byte order
//! and packing) and for composing them into variable-shape binary blocks
//! whose field types, presence, and repetition are resolved at decode time
//! from sibling fields decoded earlier in the same record.
//!
//! ## Layers
//!
//! - **Structures**: [`StructLayout::compile`] turns an ordered
//!   [`FieldDef`] list into an immutable compiled layout; [`Record`]
//!   instances decode/encode exactly `size` bytes through it.
//! - **Blocks**: [`BlockSchema`] fields carry type *expressions* — fixed, or
//!   resolved against already-decoded siblings via [`BlockField::dependent`].
//! - **Combinators**: [`optional`], [`dispatch`], [`repeat`] build the
//!   schema fragments those resolvers return.
//! - **Evaluator**: [`decode`] / [`encode`] drive the recursive traversal;
//!   [`CustomBlock`] lets a type supply its own pair.
//!
//! ## Example
//!
//! ```
//! use binblock::{
//!     decode, instantiate, BlockField, BlockSchema, Endianness, ScalarKind, TypeDesc,
//! };
//!
//! // size: u8;  data: u8 * size
//! let chunk = BlockSchema::new(
//!     "chunk",
//!     Endianness::Little,
//!     vec![
//!         BlockField::fixed("size", TypeDesc::Scalar(ScalarKind::U8)),
//!         BlockField::dependent("data", |env| {
//!             Ok(TypeDesc::Array {
//!                 elem: Box::new(TypeDesc::Scalar(ScalarKind::U8)),
//!                 count: env.u64("size")? as usize,
//!             })
//!         }),
//!     ],
//! )
//! .unwrap();
//!
//! let mut value = instantiate(&TypeDesc::Block(chunk));
//! let consumed = decode(&mut value, b"\x05\x01\x02\x03\x04\x05", 0).unwrap();
//! assert_eq!(consumed, 6);
//! ```
//!
//! ## Byte and bit order
//!
//! Byte order is declared per structure/block and affects only multi-byte
//! scalars. Within a packed bitfield unit the first declared field occupies
//! the most significant bits — a fixed engine convention (see
//! [`layout`](crate::layout)). Bare scalars at the top level default to
//! little-endian.
//!
//! ## Trust model
//!
//! Schemas are trusted, integrator-authored code; only the bytes being
//! decoded are treated as untrusted input. Decode either completes or fails
//! synchronously with an error; partial instances are invalid by contract.

pub mod block;
pub mod errors;
pub mod eval;
pub mod layout;
pub mod record;
pub mod scalar;
pub mod value;

pub use block::{
    custom, dispatch, optional, repeat, BlockField, BlockSchema, BlockValue, CustomBlock, Scope,
    SeqType, Sequence, TypeDesc, TypeExpr,
};
pub use errors::{BlockError, Error, LayoutError};
pub use eval::{decode, encode, encoded_len, instantiate, to_bytes};
pub use layout::{
    BitfieldDef, CompiledField, CompiledKind, FieldDef, FieldTy, LayoutOptions, StructLayout,
};
pub use record::Record;
pub use scalar::{Endianness, ScalarKind};
pub use value::Value;
