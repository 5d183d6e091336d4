//! Structure compiler and record instance tests: offsets, packing, unions,
//! bitfields, anonymous promotion, byte order.

use binblock::{
    BlockError, Endianness, Error, FieldDef, LayoutError, LayoutOptions, Record, ScalarKind,
    StructLayout, Value,
};

fn header_layout() -> std::sync::Arc<StructLayout> {
    StructLayout::compile(
        "header",
        Endianness::Big,
        vec![
            FieldDef::scalar("signature", ScalarKind::U16),
            FieldDef::array("data", ScalarKind::U8, 5),
        ],
    )
    .expect("compile")
}

#[test]
fn packed_offsets_and_size() {
    let layout = header_layout();
    assert_eq!(layout.size(), 7);
    assert_eq!(layout.field("signature").expect("field").offset, 0);
    assert_eq!(layout.field("data").expect("field").offset, 2);
}

#[test]
fn packed_offset_is_prefix_sum_of_widths() {
    let layout = StructLayout::compile(
        "mixed",
        Endianness::Little,
        vec![
            FieldDef::scalar("a", ScalarKind::U8),
            FieldDef::scalar("b", ScalarKind::U32),
            FieldDef::scalar("c", ScalarKind::U16),
            FieldDef::scalar("d", ScalarKind::U64),
        ],
    )
    .expect("compile");
    let widths = [1usize, 4, 2, 8];
    let mut sum = 0;
    for (field, w) in layout.fields().iter().zip(widths) {
        assert_eq!(field.offset, sum);
        sum += w;
    }
    assert_eq!(layout.size(), sum);
}

#[test]
fn record_decode_and_reencode() {
    let layout = header_layout();
    let mut rec = Record::new(layout);
    let src = b"\x00\x01\x02\x03\x04\x05\x06";
    assert_eq!(rec.decode(src, 0).expect("decode"), 7);
    assert_eq!(rec.get_u64("signature").expect("signature"), 1);
    assert_eq!(rec.get_bytes("data").expect("data"), vec![2, 3, 4, 5, 6]);

    let mut out = [0u8; 7];
    assert_eq!(rec.encode(&mut out, 0).expect("encode"), 7);
    assert_eq!(&out, src);
}

#[test]
fn record_field_assignment() {
    let layout = header_layout();
    let mut rec = Record::new(layout);
    rec.set("signature", 1u16).expect("set signature");
    rec.set_bytes("data", &[2, 3, 4, 5, 6]).expect("set data");
    assert_eq!(rec.as_bytes(), b"\x00\x01\x02\x03\x04\x05\x06");
}

#[test]
fn union_overlap() {
    let u = StructLayout::union(
        "u",
        vec![
            FieldDef::scalar("b", ScalarKind::U8),
            FieldDef::scalar("s", ScalarKind::U16),
        ],
    )
    .expect("compile union");
    assert_eq!(u.size(), 2);
    for field in u.fields() {
        assert_eq!(field.offset, 0);
    }

    let outer = StructLayout::compile(
        "outer",
        Endianness::Little,
        vec![FieldDef::nested("val", u)],
    )
    .expect("compile outer");
    assert_eq!(outer.size(), 2);

    let mut rec = Record::new(outer);
    rec.decode(b"\x01\x00", 0).expect("decode");
    let val = rec.get("val").expect("val");
    let val = val.as_record().expect("record");
    assert_eq!(val.get_u64("b").expect("b"), 1);
    assert_eq!(val.get_u64("s").expect("s"), 1);
}

#[test]
fn union_rejects_explicit_byte_order() {
    let err = StructLayout::compile_with(
        "u",
        LayoutOptions {
            endian: Endianness::Big,
            union: true,
            packed: true,
        },
        vec![FieldDef::scalar("b", ScalarKind::U8)],
    )
    .expect_err("must fail");
    assert!(matches!(err, LayoutError::UnionByteOrder(Endianness::Big)));
}

#[test]
fn bitfield_packing() {
    let layout = StructLayout::compile(
        "flags",
        Endianness::Big,
        vec![
            FieldDef::bits("flag_1", ScalarKind::U8, 4),
            FieldDef::bits("flag_2", ScalarKind::U8, 4),
        ],
    )
    .expect("compile");
    assert_eq!(layout.size(), 1);

    let mut rec = Record::new(layout);
    rec.set("flag_1", 1u64).expect("set flag_1");
    rec.set("flag_2", 2u64).expect("set flag_2");
    let mut out = [0u8; 1];
    rec.encode(&mut out, 0).expect("encode");
    assert_eq!(out, [0x12]);

    rec.decode(b"\x34", 0).expect("decode");
    assert_eq!(rec.get_u64("flag_1").expect("flag_1"), 3);
    assert_eq!(rec.get_u64("flag_2").expect("flag_2"), 4);
}

#[test]
fn bitfields_pack_into_wide_unit() {
    // 23 + 4 + 5 bits in one big-endian u32 unit.
    let layout = StructLayout::compile(
        "phys_addr",
        Endianness::Big,
        vec![
            FieldDef::bits("tag", ScalarKind::U32, 23),
            FieldDef::bits("index", ScalarKind::U32, 4),
            FieldDef::bits("offset", ScalarKind::U32, 5),
        ],
    )
    .expect("compile");
    assert_eq!(layout.size(), 4);

    let mut rec = Record::new(layout);
    rec.set("tag", 1u64).expect("tag");
    rec.set("index", 1u64).expect("index");
    rec.set("offset", 1u64).expect("offset");
    let mut out = [0u8; 4];
    rec.encode(&mut out, 0).expect("encode");
    assert_eq!(out, [0x00, 0x00, 0x02, 0x21]);
}

#[test]
fn bitfield_unit_closes_on_other_field() {
    let layout = StructLayout::compile(
        "s",
        Endianness::Little,
        vec![
            FieldDef::bits("a", ScalarKind::U8, 4),
            FieldDef::scalar("v", ScalarKind::U8),
            FieldDef::bits("b", ScalarKind::U8, 8),
        ],
    )
    .expect("compile");
    assert_eq!(layout.size(), 3);
    assert_eq!(layout.field("a").expect("a").offset, 0);
    assert_eq!(layout.field("v").expect("v").offset, 1);
    assert_eq!(layout.field("b").expect("b").offset, 2);
}

#[test]
fn bitfield_overflow_is_rejected() {
    let err = StructLayout::compile(
        "s",
        Endianness::Little,
        vec![
            FieldDef::bits("a", ScalarKind::U8, 4),
            FieldDef::bits("b", ScalarKind::U8, 4),
            FieldDef::bits("c", ScalarKind::U8, 4),
        ],
    )
    .expect_err("must fail");
    assert!(matches!(err, LayoutError::BitfieldOverflow { used: 8, requested: 4, .. }));
}

#[test]
fn signed_bitfield_sign_extends() {
    let layout = StructLayout::compile(
        "s",
        Endianness::Little,
        vec![
            FieldDef::bits("hi", ScalarKind::I8, 4),
            FieldDef::bits("lo", ScalarKind::I8, 4),
        ],
    )
    .expect("compile");
    let mut rec = Record::new(layout);
    rec.decode(b"\xf2", 0).expect("decode");
    assert_eq!(rec.get_i64("hi").expect("hi"), -1);
    assert_eq!(rec.get_i64("lo").expect("lo"), 2);
}

#[test]
fn duplicate_field_is_rejected() {
    let err = StructLayout::compile(
        "s",
        Endianness::Little,
        vec![
            FieldDef::scalar("x", ScalarKind::U8),
            FieldDef::scalar("x", ScalarKind::U16),
        ],
    )
    .expect_err("must fail");
    assert!(matches!(err, LayoutError::DuplicateField(name) if name == "x"));
}

#[test]
fn anonymous_union_member() {
    let u = StructLayout::union(
        "u",
        vec![
            FieldDef::scalar("fst", ScalarKind::U8),
            FieldDef::scalar("snd", ScalarKind::U8),
        ],
    )
    .expect("compile union");
    let outer = StructLayout::compile(
        "outer",
        Endianness::Little,
        vec![
            FieldDef::scalar("which", ScalarKind::U8),
            FieldDef::anon("val", u),
        ],
    )
    .expect("compile outer");
    assert_eq!(outer.size(), 2);
    assert_eq!(
        outer.promoted_path("fst").expect("path"),
        &["val".to_string(), "fst".to_string()]
    );

    let mut rec = Record::new(outer);
    rec.set("which", 0u8).expect("which");
    rec.set("fst", 1u8).expect("fst");
    // Promoted writes go straight into the member's storage.
    assert_eq!(rec.as_bytes(), &[0, 1]);
    let val = rec.get("val").expect("val");
    assert_eq!(val.as_record().expect("record").get_u64("snd").expect("snd"), 1);
}

#[test]
fn anonymous_promotion_is_transitive() {
    let p1 = StructLayout::compile(
        "point1d",
        Endianness::Big,
        vec![FieldDef::scalar("x", ScalarKind::U32)],
    )
    .expect("p1");
    let p2 = StructLayout::compile(
        "point2d",
        Endianness::Big,
        vec![
            FieldDef::anon("_1d", p1),
            FieldDef::scalar("y", ScalarKind::U32),
        ],
    )
    .expect("p2");
    let p3 = StructLayout::compile(
        "point3d",
        Endianness::Big,
        vec![
            FieldDef::anon("_2d", p2),
            FieldDef::scalar("z", ScalarKind::U32),
        ],
    )
    .expect("p3");
    assert_eq!(p3.size(), 12);

    let mut rec = Record::new(p3);
    rec.set("x", 1u32).expect("x");
    rec.set("y", 2u32).expect("y");
    rec.set("z", 3u32).expect("z");
    assert_eq!(
        rec.as_bytes(),
        b"\x00\x00\x00\x01\x00\x00\x00\x02\x00\x00\x00\x03"
    );
    assert_eq!(rec.get_u64("x").expect("x"), 1);
}

#[test]
fn promoted_read_after_decode() {
    let inner = StructLayout::compile(
        "inner",
        Endianness::Little,
        vec![FieldDef::scalar("len", ScalarKind::U16)],
    )
    .expect("inner");
    let outer = StructLayout::compile(
        "outer",
        Endianness::Little,
        vec![
            FieldDef::scalar("tag", ScalarKind::U8),
            FieldDef::anon("hdr", inner),
        ],
    )
    .expect("outer");
    let mut rec = Record::new(outer);
    rec.decode(b"\x07\x34\x12", 0).expect("decode");
    assert_eq!(rec.get_u64("len").expect("len"), 0x1234);
}

#[test]
fn size_mismatch_leaves_instance_untouched() {
    let layout = header_layout();
    let mut rec = Record::new(layout);
    rec.set("signature", 0xbeefu16).expect("set");
    let before = rec.as_bytes().to_vec();

    let err = rec.decode(b"\x01\x02\x03\x04\x05", 0).expect_err("must fail");
    assert!(matches!(
        err,
        Error::Block(BlockError::SizeMismatch {
            needed: 7,
            available: 5,
            offset: 0,
        })
    ));
    assert_eq!(rec.as_bytes(), before.as_slice());
}

#[test]
fn encode_destination_too_small() {
    let layout = header_layout();
    let rec = Record::new(layout);
    let mut out = [0u8; 5];
    let err = rec.encode(&mut out, 0).expect_err("must fail");
    assert!(matches!(err, Error::Block(BlockError::SizeMismatch { .. })));
}

#[test]
fn decode_at_offset() {
    let layout = StructLayout::compile(
        "pair",
        Endianness::Little,
        vec![
            FieldDef::scalar("a", ScalarKind::U8),
            FieldDef::scalar("b", ScalarKind::U8),
        ],
    )
    .expect("compile");
    let mut rec = Record::new(layout);
    let buf = b"\xff\xff\x0a\x0b";
    assert_eq!(rec.decode(buf, 2).expect("decode"), 2);
    assert_eq!(rec.get_u64("a").expect("a"), 0x0a);
    assert_eq!(rec.get_u64("b").expect("b"), 0x0b);
}

#[test]
fn aligned_layout_pads_fields() {
    let layout = StructLayout::compile_with(
        "s",
        LayoutOptions {
            endian: Endianness::Little,
            union: false,
            packed: false,
        },
        vec![
            FieldDef::scalar("a", ScalarKind::U8),
            FieldDef::scalar("b", ScalarKind::U32),
        ],
    )
    .expect("compile");
    assert_eq!(layout.field("a").expect("a").offset, 0);
    assert_eq!(layout.field("b").expect("b").offset, 4);
    assert_eq!(layout.size(), 8);
}

#[test]
fn empty_layout_is_zero_sized() {
    let layout = StructLayout::compile("trailer", Endianness::Little, vec![]).expect("compile");
    assert_eq!(layout.size(), 0);
    let mut rec = Record::new(layout);
    assert_eq!(rec.decode(b"", 0).expect("decode"), 0);
}

#[test]
fn extended_float_round_trips() {
    let layout = StructLayout::compile(
        "ext",
        Endianness::Big,
        vec![FieldDef::scalar("x", ScalarKind::F80)],
    )
    .expect("compile");
    assert_eq!(layout.size(), 10);

    // 1.0: exponent 16383, explicit integer bit set.
    let one = {
        let mut raw = [0u8; 10];
        raw[7] = 0x80;
        raw[8] = 0xff;
        raw[9] = 0x3f;
        raw
    };
    let mut rec = Record::new(layout);
    rec.set("x", Value::F80(one)).expect("set");
    assert_eq!(rec.get_f64("x").expect("x"), 1.0);

    let mut out = [0u8; 10];
    rec.encode(&mut out, 0).expect("encode");
    let mut back = Record::new(rec.layout().clone());
    back.decode(&out, 0).expect("decode");
    assert_eq!(back.get("x").expect("x"), Value::F80(one));
}

#[test]
fn display_shows_fields() {
    let layout = header_layout();
    let mut rec = Record::new(layout);
    rec.set("signature", 7u16).expect("set");
    let text = rec.to_string();
    assert!(text.starts_with("header("));
    assert!(text.contains("signature=7"));
}

#[test]
fn unknown_field_name_is_unresolved() {
    let layout = header_layout();
    let rec = Record::new(layout);
    let err = rec.get("nope").expect_err("must fail");
    assert!(matches!(
        err,
        Error::Block(BlockError::UnresolvedReference(name)) if name == "nope"
    ));
}
