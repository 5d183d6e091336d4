//! Structure compiler: ordered field definitions into a fixed byte/bit layout.
//!
//! Compilation walks the declared fields once, accumulating byte offsets and
//! packing consecutive bitfields that share a backing scalar into one storage
//! unit. The result is an immutable [`StructLayout`] shared behind an `Arc`;
//! instances ([`Record`](crate::record::Record)) read and write through it.
//!
//! ## Bit order
//!
//! Within a packed unit the FIRST declared bitfield occupies the MOST
//! significant bits of the backing scalar; the assembled unit is then encoded
//! as an ordinary scalar honoring the layout's byte order. Two 4-bit fields
//! set to `(1, 2)` encode to `0x12`. This is a fixed engine convention, not a
//! platform probe.

use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::LayoutError;
use crate::scalar::{Endianness, ScalarKind};

/// A sub-scalar field: `width` bits carved out of one `backing` storage unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitfieldDef {
    pub backing: ScalarKind,
    pub width: u32,
}

/// The storage type a field is declared with.
#[derive(Debug, Clone)]
pub enum FieldTy {
    Scalar(ScalarKind),
    Bits(BitfieldDef),
    /// `count` contiguous scalars.
    Array(ScalarKind, usize),
    Struct(Arc<StructLayout>),
    /// Nested layout whose fields are promoted into this layout's namespace.
    Anon(Arc<StructLayout>),
}

/// One declared field. Declaration order is both storage order and
/// dependent-evaluation order.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub ty: FieldTy,
}

impl FieldDef {
    pub fn scalar(name: impl Into<String>, kind: ScalarKind) -> Self {
        FieldDef {
            name: name.into(),
            ty: FieldTy::Scalar(kind),
        }
    }

    pub fn bits(name: impl Into<String>, backing: ScalarKind, width: u32) -> Self {
        FieldDef {
            name: name.into(),
            ty: FieldTy::Bits(BitfieldDef { backing, width }),
        }
    }

    pub fn array(name: impl Into<String>, elem: ScalarKind, count: usize) -> Self {
        FieldDef {
            name: name.into(),
            ty: FieldTy::Array(elem, count),
        }
    }

    pub fn nested(name: impl Into<String>, layout: Arc<StructLayout>) -> Self {
        FieldDef {
            name: name.into(),
            ty: FieldTy::Struct(layout),
        }
    }

    /// Nested layout whose fields alias directly into this field's storage.
    pub fn anon(name: impl Into<String>, layout: Arc<StructLayout>) -> Self {
        FieldDef {
            name: name.into(),
            ty: FieldTy::Anon(layout),
        }
    }
}

/// Compilation options: byte order, struct-or-union, packing.
#[derive(Debug, Clone, Copy)]
pub struct LayoutOptions {
    pub endian: Endianness,
    pub union: bool,
    pub packed: bool,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        LayoutOptions {
            endian: Endianness::DEFAULT,
            union: false,
            packed: true,
        }
    }
}

/// Compiled per-field placement.
#[derive(Debug, Clone)]
pub struct CompiledField {
    pub name: String,
    /// Byte offset from the start of the record (0 for every union field).
    pub offset: usize,
    pub kind: CompiledKind,
}

#[derive(Debug, Clone)]
pub enum CompiledKind {
    Scalar(ScalarKind),
    Bits {
        backing: ScalarKind,
        /// Left-shift from the least significant bit of the assembled unit.
        shift: u32,
        width: u32,
    },
    Array {
        elem: ScalarKind,
        count: usize,
    },
    Struct {
        layout: Arc<StructLayout>,
        anonymous: bool,
    },
}

impl CompiledKind {
    fn width(&self) -> usize {
        match self {
            CompiledKind::Scalar(k) => k.width(),
            CompiledKind::Bits { backing, .. } => backing.width(),
            CompiledKind::Array { elem, count } => elem.width() * count,
            CompiledKind::Struct { layout, .. } => layout.size(),
        }
    }

    fn alignment(&self) -> usize {
        match self {
            CompiledKind::Scalar(k) => k.alignment(),
            CompiledKind::Bits { backing, .. } => backing.alignment(),
            CompiledKind::Array { elem, .. } => elem.alignment(),
            CompiledKind::Struct { layout, .. } => layout.align,
        }
    }
}

/// A promoted name: an anonymous member's field resolved to an absolute
/// placement inside the owning record's storage. Access through it is pure
/// indirection, never a copy.
#[derive(Debug, Clone)]
pub(crate) struct Promoted {
    pub offset: usize,
    pub kind: CompiledKind,
    /// Byte order of the layout that owns the underlying field.
    pub endian: Endianness,
    /// Anonymous member chain, ending with the field's own name.
    pub path: Vec<String>,
}

/// The compiled, immutable layout of a fixed-size record.
#[derive(Debug)]
pub struct StructLayout {
    name: String,
    size: usize,
    align: usize,
    endian: Endianness,
    union: bool,
    packed: bool,
    fields: Vec<CompiledField>,
    index: HashMap<String, usize>,
    promoted: HashMap<String, Promoted>,
}

// Running bitfield unit while compiling.
struct Unit {
    backing: ScalarKind,
    offset: usize,
    used: u32,
}

impl StructLayout {
    /// Compiles a packed struct layout, the common case.
    pub fn compile(
        name: impl Into<String>,
        endian: Endianness,
        fields: Vec<FieldDef>,
    ) -> Result<Arc<Self>, LayoutError> {
        Self::compile_with(
            name,
            LayoutOptions {
                endian,
                ..LayoutOptions::default()
            },
            fields,
        )
    }

    /// Compiles a packed union layout. Unions use the engine byte order.
    pub fn union(
        name: impl Into<String>,
        fields: Vec<FieldDef>,
    ) -> Result<Arc<Self>, LayoutError> {
        Self::compile_with(
            name,
            LayoutOptions {
                union: true,
                ..LayoutOptions::default()
            },
            fields,
        )
    }

    /// Full-form compilation with explicit options.
    pub fn compile_with(
        name: impl Into<String>,
        opts: LayoutOptions,
        fields: Vec<FieldDef>,
    ) -> Result<Arc<Self>, LayoutError> {
        if opts.union && opts.endian != Endianness::DEFAULT {
            return Err(LayoutError::UnionByteOrder(opts.endian));
        }

        let mut out: Vec<CompiledField> = Vec::with_capacity(fields.len());
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut promoted: HashMap<String, Promoted> = HashMap::new();
        let mut size = 0usize;
        let mut align = 1usize;
        let mut unit: Option<Unit> = None;

        for def in fields {
            let kind = match def.ty {
                FieldTy::Bits(b) => {
                    if !b.backing.is_integer() {
                        return Err(LayoutError::BitfieldBacking(b.backing));
                    }
                    let capacity = b.backing.bits();
                    if b.width == 0 || b.width > capacity {
                        return Err(LayoutError::BitfieldOverflow {
                            backing: b.backing,
                            used: 0,
                            requested: b.width,
                            capacity,
                        });
                    }
                    if opts.union {
                        // Each union bitfield is its own unit at offset 0.
                        CompiledKind::Bits {
                            backing: b.backing,
                            shift: capacity - b.width,
                            width: b.width,
                        }
                    } else {
                        let mut placed = None;
                        if let Some(u) = unit.as_mut() {
                            if u.backing == b.backing {
                                if u.used + b.width > capacity {
                                    return Err(LayoutError::BitfieldOverflow {
                                        backing: b.backing,
                                        used: u.used,
                                        requested: b.width,
                                        capacity,
                                    });
                                }
                                let shift = capacity - u.used - b.width;
                                u.used += b.width;
                                placed = Some((u.offset, shift));
                            }
                        }
                        let (offset, shift) = match placed {
                            Some(p) => p,
                            None => {
                                // Open a new unit; it reserves the full
                                // backing scalar immediately.
                                let al = if opts.packed { 1 } else { b.backing.alignment() };
                                let offset = align_up(size, al);
                                size = offset + b.backing.width();
                                align = align.max(al);
                                unit = Some(Unit {
                                    backing: b.backing,
                                    offset,
                                    used: b.width,
                                });
                                (offset, capacity - b.width)
                            }
                        };
                        push_field(
                            &mut out,
                            &mut index,
                            &promoted,
                            def.name,
                            offset,
                            CompiledKind::Bits {
                                backing: b.backing,
                                shift,
                                width: b.width,
                            },
                        )?;
                        continue;
                    }
                }
                FieldTy::Scalar(k) => CompiledKind::Scalar(k),
                FieldTy::Array(elem, count) => CompiledKind::Array { elem, count },
                FieldTy::Struct(layout) => CompiledKind::Struct {
                    layout,
                    anonymous: false,
                },
                FieldTy::Anon(layout) => CompiledKind::Struct {
                    layout,
                    anonymous: true,
                },
            };

            // Any non-bitfield (and any union bitfield) closes the running
            // unit.
            unit = None;
            let w = kind.width();
            let al = if opts.packed { 1 } else { kind.alignment() };
            let offset = if opts.union { 0 } else { align_up(size, al) };
            size = if opts.union {
                size.max(w)
            } else {
                offset + w
            };
            align = align.max(al);

            if let CompiledKind::Struct {
                ref layout,
                anonymous: true,
            } = kind
            {
                promote(&mut promoted, &index, layout, &def.name, offset)?;
            }
            push_field(&mut out, &mut index, &promoted, def.name, offset, kind)?;
        }

        let size = if opts.packed { size } else { align_up(size, align) };

        Ok(Arc::new(StructLayout {
            name: name.into(),
            size,
            align,
            endian: opts.endian,
            union: opts.union,
            packed: opts.packed,
            fields: out,
            index,
            promoted,
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total byte size. An instance always decodes from and encodes into
    /// exactly this many bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn endian(&self) -> Endianness {
        self.endian
    }

    pub fn is_union(&self) -> bool {
        self.union
    }

    pub fn is_packed(&self) -> bool {
        self.packed
    }

    /// Compiled fields in declaration order.
    pub fn fields(&self) -> &[CompiledField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&CompiledField> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    /// Names promoted from anonymous members.
    pub fn promoted_names(&self) -> impl Iterator<Item = &str> {
        self.promoted.keys().map(String::as_str)
    }

    /// The anonymous member chain behind a promoted name, ending with the
    /// field's own name inside its owning layout.
    pub fn promoted_path(&self, name: &str) -> Option<&[String]> {
        self.promoted.get(name).map(|p| p.path.as_slice())
    }

    /// Resolves a direct or promoted field name to its absolute placement.
    pub(crate) fn resolve(&self, name: &str) -> Option<(usize, &CompiledKind, Endianness)> {
        if let Some(&i) = self.index.get(name) {
            let f = &self.fields[i];
            return Some((f.offset, &f.kind, self.endian));
        }
        self.promoted
            .get(name)
            .map(|p| (p.offset, &p.kind, p.endian))
    }
}

fn push_field(
    out: &mut Vec<CompiledField>,
    index: &mut HashMap<String, usize>,
    promoted: &HashMap<String, Promoted>,
    name: String,
    offset: usize,
    kind: CompiledKind,
) -> Result<(), LayoutError> {
    if index.contains_key(&name) || promoted.contains_key(&name) {
        return Err(LayoutError::DuplicateField(name));
    }
    index.insert(name.clone(), out.len());
    out.push(CompiledField { name, offset, kind });
    Ok(())
}

/// Registers an anonymous member's fields (and its own promoted names,
/// transitively) at their absolute offsets inside the parent.
fn promote(
    promoted: &mut HashMap<String, Promoted>,
    index: &HashMap<String, usize>,
    sub: &Arc<StructLayout>,
    member: &str,
    base: usize,
) -> Result<(), LayoutError> {
    for f in &sub.fields {
        insert_promoted(
            promoted,
            index,
            f.name.clone(),
            Promoted {
                offset: base + f.offset,
                kind: f.kind.clone(),
                endian: sub.endian,
                path: vec![member.to_string(), f.name.clone()],
            },
        )?;
    }
    for (pname, p) in &sub.promoted {
        let mut path = Vec::with_capacity(p.path.len() + 1);
        path.push(member.to_string());
        path.extend(p.path.iter().cloned());
        insert_promoted(
            promoted,
            index,
            pname.clone(),
            Promoted {
                offset: base + p.offset,
                kind: p.kind.clone(),
                endian: p.endian,
                path,
            },
        )?;
    }
    Ok(())
}

fn insert_promoted(
    promoted: &mut HashMap<String, Promoted>,
    index: &HashMap<String, usize>,
    name: String,
    entry: Promoted,
) -> Result<(), LayoutError> {
    if index.contains_key(&name) || promoted.contains_key(&name) {
        return Err(LayoutError::DuplicateField(name));
    }
    promoted.insert(name, entry);
    Ok(())
}

fn align_up(off: usize, align: usize) -> usize {
    debug_assert!(align > 0);
    (off + align - 1) / align * align
}
