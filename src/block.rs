//! Dependent block schemas and combinators.
//!
//! A [`BlockSchema`] is an ordered field list like a structure, except each
//! field's type is a [`TypeExpr`]: either a fixed [`TypeDesc`] or a resolver
//! function evaluated at decode time against the [`Scope`] of sibling values
//! already decoded on the same pass. The combinators [`optional`],
//! [`dispatch`] and [`repeat`] build the `TypeDesc` fragments those resolvers
//! return.
//!
//! ```
//! use binblock::{BlockField, BlockSchema, Endianness, ScalarKind, TypeDesc};
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
//! # let _ = chunk;
//! ```

use std::fmt;
use std::sync::Arc;

use crate::errors::{BlockError, Error, LayoutError};
use crate::eval;
use crate::layout::StructLayout;
use crate::scalar::{Endianness, ScalarKind};
use crate::value::Value;

/// A resolvable type: what a block field's type expression evaluates to.
/// Closed set; the evaluator dispatches over exactly these shapes.
#[derive(Clone)]
pub enum TypeDesc {
    Scalar(ScalarKind),
    Struct(Arc<StructLayout>),
    Block(Arc<BlockSchema>),
    /// `count` elements of `elem`, back to back. The count is usually
    /// computed from an earlier sibling inside a resolver.
    Array { elem: Box<TypeDesc>, count: usize },
    /// A repeat sequence; build with [`repeat`].
    Seq(Arc<SeqType>),
    /// A user-supplied [`CustomBlock`] type; build with [`custom`].
    Custom(Arc<dyn Fn() -> Box<dyn CustomBlock> + Send + Sync>),
    /// The zero-size placeholder; what [`optional`] yields for false.
    Empty,
}

impl TypeDesc {
    /// Minimum bytes any instance of this type must consume. Used to reject
    /// wire-supplied counts that cannot possibly fit the remaining buffer
    /// before anything is allocated for them.
    pub(crate) fn min_size(&self) -> usize {
        match self {
            TypeDesc::Scalar(k) => k.width(),
            TypeDesc::Struct(l) => l.size(),
            TypeDesc::Block(b) => b
                .fields
                .iter()
                .map(|f| match &f.ty {
                    TypeExpr::Const(t) => t.min_size(),
                    TypeExpr::Resolver(_) => 0,
                })
                .sum(),
            TypeDesc::Array { elem, count } => elem.min_size().saturating_mul(*count),
            TypeDesc::Seq(t) => t.element.min_size(),
            TypeDesc::Custom(_) => 0,
            TypeDesc::Empty => 0,
        }
    }
}

impl fmt::Debug for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDesc::Scalar(k) => f.debug_tuple("Scalar").field(k).finish(),
            TypeDesc::Struct(l) => f.debug_tuple("Struct").field(&l.name()).finish(),
            TypeDesc::Block(b) => f.debug_tuple("Block").field(&b.name()).finish(),
            TypeDesc::Array { elem, count } => f
                .debug_struct("Array")
                .field("elem", elem)
                .field("count", count)
                .finish(),
            TypeDesc::Seq(t) => f.debug_tuple("Seq").field(t).finish(),
            TypeDesc::Custom(_) => f.write_str("Custom(..)"),
            TypeDesc::Empty => f.write_str("Empty"),
        }
    }
}

/// A field's type expression: fixed, or resolved at decode time from the
/// sibling values decoded so far.
#[derive(Clone)]
pub enum TypeExpr {
    Const(TypeDesc),
    Resolver(Arc<dyn Fn(&Scope<'_>) -> Result<TypeDesc, Error> + Send + Sync>),
}

impl fmt::Debug for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Const(t) => f.debug_tuple("Const").field(t).finish(),
            TypeExpr::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

/// One declared block field.
#[derive(Debug, Clone)]
pub struct BlockField {
    pub name: String,
    pub ty: TypeExpr,
}

impl BlockField {
    /// A field whose type needs no sibling values.
    pub fn fixed(name: impl Into<String>, ty: TypeDesc) -> Self {
        BlockField {
            name: name.into(),
            ty: TypeExpr::Const(ty),
        }
    }

    /// A field whose type is resolved against earlier siblings at decode
    /// time.
    pub fn dependent<F>(name: impl Into<String>, resolve: F) -> Self
    where
        F: Fn(&Scope<'_>) -> Result<TypeDesc, Error> + Send + Sync + 'static,
    {
        BlockField {
            name: name.into(),
            ty: TypeExpr::Resolver(Arc::new(resolve)),
        }
    }
}

/// An ordered, immutable block schema. Scalar fields use the schema's byte
/// order; nested records and blocks keep their own.
pub struct BlockSchema {
    name: String,
    endian: Endianness,
    fields: Vec<BlockField>,
}

impl BlockSchema {
    pub fn new(
        name: impl Into<String>,
        endian: Endianness,
        fields: Vec<BlockField>,
    ) -> Result<Arc<Self>, LayoutError> {
        for (i, f) in fields.iter().enumerate() {
            if fields[..i].iter().any(|g| g.name == f.name) {
                return Err(LayoutError::DuplicateField(f.name.clone()));
            }
        }
        Ok(Arc::new(BlockSchema {
            name: name.into(),
            endian,
            fields,
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endian(&self) -> Endianness {
        self.endian
    }

    pub fn fields(&self) -> &[BlockField] {
        &self.fields
    }
}

impl fmt::Debug for BlockSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockSchema")
            .field("name", &self.name)
            .field("endian", &self.endian)
            .field("fields", &self.fields)
            .finish()
    }
}

/// If the condition holds, the given type; otherwise the zero-size
/// placeholder, contributing 0 bytes to both decode and encode.
pub fn optional(on: bool, ty: TypeDesc) -> TypeDesc {
    if on {
        ty
    } else {
        TypeDesc::Empty
    }
}

/// Exact-match branch selection on a discriminant. With no matching branch
/// and no default, fails with [`BlockError::DispatchMiss`] before any bytes
/// of the field are consumed.
pub fn dispatch(
    on: u64,
    branches: &[(u64, TypeDesc)],
    default: Option<TypeDesc>,
) -> Result<TypeDesc, Error> {
    branches
        .iter()
        .find(|(key, _)| *key == on)
        .map(|(_, ty)| ty.clone())
        .or(default)
        .ok_or_else(|| BlockError::DispatchMiss { discriminant: on }.into())
}

/// A sequence of `element` values decoded until `until` holds for the most
/// recently decoded element. One element is always decoded before the
/// predicate is first consulted; the terminator stays in the sequence.
pub fn repeat<F>(element: TypeDesc, until: F) -> TypeDesc
where
    F: Fn(&Value) -> bool + Send + Sync + 'static,
{
    TypeDesc::Seq(Arc::new(SeqType {
        element,
        until: Box::new(until),
    }))
}

/// The compiled shape of a [`repeat`] field.
pub struct SeqType {
    pub(crate) element: TypeDesc,
    pub(crate) until: Box<dyn Fn(&Value) -> bool + Send + Sync>,
}

impl SeqType {
    pub fn element(&self) -> &TypeDesc {
        &self.element
    }
}

impl fmt::Debug for SeqType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeqType")
            .field("element", &self.element)
            .field("until", &"<predicate>")
            .finish()
    }
}

/// The view a resolver gets of the sibling values decoded so far, in
/// declaration order. Referencing a later (not yet decoded) field fails with
/// [`BlockError::UnresolvedReference`].
pub struct Scope<'a> {
    entries: &'a [(String, Value)],
}

impl<'a> Scope<'a> {
    pub(crate) fn new(entries: &'a [(String, Value)]) -> Self {
        Scope { entries }
    }

    /// An already-decoded sibling by name.
    pub fn get(&self, name: &str) -> Result<&'a Value, Error> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| BlockError::UnresolvedReference(name.to_string()).into())
    }

    /// Walks a dotted path (`"header.size"`) through records and blocks,
    /// returning a copy of the value at the end.
    pub fn value(&self, path: &str) -> Result<Value, Error> {
        let mut parts = path.split('.');
        let first = parts.next().unwrap_or(path);
        let mut current = self.get(first)?.clone();
        for part in parts {
            current = match current {
                Value::Record(r) => r.get(part)?,
                Value::Block(b) => b
                    .get(part)
                    .cloned()
                    .ok_or_else(|| BlockError::UnresolvedReference(path.to_string()))?,
                _ => return Err(BlockError::UnresolvedReference(path.to_string()).into()),
            };
        }
        Ok(current)
    }

    /// A dotted path as an unsigned integer (scalars and unsigned bitfields).
    pub fn u64(&self, path: &str) -> Result<u64, Error> {
        let v = self.value(path)?;
        v.as_u64().ok_or_else(|| {
            BlockError::TypeMismatch {
                expected: "unsigned integer",
                found: v.kind_name(),
            }
            .into()
        })
    }

    /// A dotted path as a signed integer.
    pub fn i64(&self, path: &str) -> Result<i64, Error> {
        let v = self.value(path)?;
        v.as_i64().ok_or_else(|| {
            BlockError::TypeMismatch {
                expected: "integer",
                found: v.kind_name(),
            }
            .into()
        })
    }
}

/// A decode/encode pair a type can supply to be treated as a leaf by the
/// evaluator: it recurses into these instead of the generic field loop.
/// Implemented by [`Sequence`]; user composite types that need custom wiring
/// beyond plain field-by-field traversal enter a schema through [`custom`].
pub trait CustomBlock: fmt::Debug + Send + Sync {
    fn decode_self(&mut self, buf: &[u8], offset: usize) -> Result<usize, Error>;
    fn encode_self(&self, buf: &mut [u8], offset: usize) -> Result<usize, Error>;
    /// Exact size `encode_self` will write.
    fn encoded_len(&self) -> usize;
    fn boxed_clone(&self) -> Box<dyn CustomBlock>;
}

impl Clone for Box<dyn CustomBlock> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}

/// A type that instantiates fresh [`CustomBlock`] values for the evaluator.
pub fn custom<F>(factory: F) -> TypeDesc
where
    F: Fn() -> Box<dyn CustomBlock> + Send + Sync + 'static,
{
    TypeDesc::Custom(Arc::new(factory))
}

/// The ordered, mutable element container a [`repeat`] field decodes into.
/// There is no stored count: the length is implicit in the data and only
/// recoverable by the same predicate, so elements must not be mutated
/// between a decode and a later encode unless the predicate still holds on
/// exactly the last element.
pub struct Sequence {
    ty: Arc<SeqType>,
    endian: Endianness,
    items: Vec<Value>,
}

impl Sequence {
    /// An empty sequence of `ty`, for construction before an encode.
    pub fn new(ty: Arc<SeqType>) -> Self {
        Self::with_endian(ty, Endianness::DEFAULT)
    }

    pub(crate) fn with_endian(ty: Arc<SeqType>, endian: Endianness) -> Self {
        Sequence {
            ty,
            endian,
            items: Vec::new(),
        }
    }

    pub fn seq_type(&self) -> &Arc<SeqType> {
        &self.ty
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut Vec<Value> {
        &mut self.items
    }

    pub fn push(&mut self, value: Value) {
        self.items.push(value);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.items.iter()
    }
}

impl Clone for Sequence {
    fn clone(&self) -> Self {
        Sequence {
            ty: self.ty.clone(),
            endian: self.endian,
            items: self.items.clone(),
        }
    }
}

impl PartialEq for Sequence {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("items", &self.items)
            .finish()
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{item}")?;
        }
        write!(f, "]")
    }
}

impl CustomBlock for Sequence {
    fn decode_self(&mut self, buf: &[u8], offset: usize) -> Result<usize, Error> {
        self.items.clear();
        let mut off = offset;
        loop {
            let done = match self.items.last() {
                Some(last) => (self.ty.until)(last),
                None => false,
            };
            if done {
                break;
            }
            let mut item = eval::instantiate_with(&self.ty.element, self.endian);
            off += eval::decode_with(&mut item, buf, off, self.endian)?;
            self.items.push(item);
        }
        Ok(off - offset)
    }

    fn encode_self(&self, buf: &mut [u8], offset: usize) -> Result<usize, Error> {
        let mut off = offset;
        for item in &self.items {
            off += eval::encode_with(item, buf, off, self.endian)?;
        }
        Ok(off - offset)
    }

    fn encoded_len(&self) -> usize {
        self.items.iter().map(eval::encoded_len).sum()
    }

    fn boxed_clone(&self) -> Box<dyn CustomBlock> {
        Box::new(self.clone())
    }
}

/// A decoded (or under-construction) instance of a [`BlockSchema`]: field
/// values in declaration order.
pub struct BlockValue {
    schema: Arc<BlockSchema>,
    entries: Vec<(String, Value)>,
}

impl BlockValue {
    /// An instance with no fields assigned yet.
    pub fn new(schema: Arc<BlockSchema>) -> Self {
        BlockValue {
            schema,
            entries: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Arc<BlockSchema> {
        &self.schema
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Assigns a declared field, replacing any previous value. Names not in
    /// the schema are rejected.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), Error> {
        if !self.schema.fields().iter().any(|f| f.name == name) {
            return Err(BlockError::UnresolvedReference(name.to_string()).into());
        }
        let value = value.into();
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| n == name) {
            slot.1 = value;
        } else {
            self.entries.push((name.to_string(), value));
        }
        Ok(())
    }

    /// Assigned fields in decode/assignment order.
    pub fn entries(&self) -> &[(String, Value)] {
        &self.entries
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn push_entry(&mut self, name: String, value: Value) {
        self.entries.push((name, value));
    }
}

impl Clone for BlockValue {
    fn clone(&self) -> Self {
        BlockValue {
            schema: self.schema.clone(),
            entries: self.entries.clone(),
        }
    }
}

impl PartialEq for BlockValue {
    fn eq(&self, other: &Self) -> bool {
        self.schema.name() == other.schema.name() && self.entries == other.entries
    }
}

impl fmt::Debug for BlockValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockValue")
            .field("schema", &self.schema.name())
            .field("entries", &self.entries)
            .finish()
    }
}

impl fmt::Display for BlockValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.schema.name())?;
        for (i, (name, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        write!(f, ")")
    }
}
