//! Benchmark: decode vs decode+encode for a container-style dependent block
//! (descriptor with bitfields, dependent color table, terminated sub-block
//! stream). The input buffer is synthesized once; each iteration decodes a
//! fresh instance, and the round-trip bench re-encodes it.

use std::sync::Arc;

use binblock::{
    decode, instantiate, optional, repeat, to_bytes, BlockField, BlockSchema, Endianness, Error,
    FieldDef, ScalarKind, StructLayout, TypeDesc, Value,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn container_schema() -> Arc<BlockSchema> {
    let descriptor = StructLayout::compile(
        "descriptor",
        Endianness::Little,
        vec![
            FieldDef::scalar("width", ScalarKind::U16),
            FieldDef::scalar("height", ScalarKind::U16),
            FieldDef::bits("table_flag", ScalarKind::U8, 1),
            FieldDef::bits("resolution", ScalarKind::U8, 3),
            FieldDef::bits("sorted", ScalarKind::U8, 1),
            FieldDef::bits("depth", ScalarKind::U8, 3),
        ],
    )
    .expect("descriptor");

    let entry = StructLayout::compile(
        "entry",
        Endianness::Little,
        vec![
            FieldDef::scalar("red", ScalarKind::U8),
            FieldDef::scalar("green", ScalarKind::U8),
            FieldDef::scalar("blue", ScalarKind::U8),
        ],
    )
    .expect("entry");

    let chunk = BlockSchema::new(
        "chunk",
        Endianness::Little,
        vec![
            BlockField::fixed("size", TypeDesc::Scalar(ScalarKind::U8)),
            BlockField::dependent("data", |env| {
                Ok(TypeDesc::Array {
                    elem: Box::new(TypeDesc::Scalar(ScalarKind::U8)),
                    count: env.u64("size")? as usize,
                })
            }),
        ],
    )
    .expect("chunk");

    BlockSchema::new(
        "image",
        Endianness::Little,
        vec![
            BlockField::fixed("descriptor", TypeDesc::Struct(descriptor)),
            BlockField::dependent("table", move |env| {
                let desc = env.get("descriptor")?;
                let desc = desc.as_record().ok_or_else(|| {
                    Error::Block(binblock::BlockError::UnresolvedReference(
                        "descriptor".into(),
                    ))
                })?;
                let count = 1usize << (desc.get_u64("depth")? + 1);
                Ok(optional(
                    desc.get_u64("table_flag")? != 0,
                    TypeDesc::Array {
                        elem: Box::new(TypeDesc::Struct(entry.clone())),
                        count,
                    },
                ))
            }),
            BlockField::fixed(
                "chunks",
                repeat(TypeDesc::Block(chunk), |last: &Value| {
                    last.as_block()
                        .and_then(|b| b.get("size"))
                        .and_then(Value::as_u64)
                        == Some(0)
                }),
            ),
        ],
    )
    .expect("image")
}

fn synthesize(chunks: usize) -> Vec<u8> {
    let mut bytes = vec![
        0x00, 0x01, 0x00, 0x01, // width, height
        0x87, // table_flag=1, depth=7 -> 256 entries
    ];
    for i in 0..256usize {
        bytes.extend([i as u8, (i >> 1) as u8, (i >> 2) as u8]);
    }
    for i in 0..chunks {
        bytes.push(64);
        bytes.extend((0..64).map(|j| (i + j) as u8));
    }
    bytes.push(0);
    bytes
}

fn bench_codec(c: &mut Criterion) {
    let schema = container_schema();
    let ty = TypeDesc::Block(schema);
    let bytes = synthesize(32);

    c.bench_function("decode_container", |b| {
        b.iter(|| {
            let mut value = instantiate(&ty);
            let consumed = decode(&mut value, black_box(&bytes), 0).expect("decode");
            black_box(consumed)
        })
    });

    c.bench_function("round_trip_container", |b| {
        b.iter(|| {
            let mut value = instantiate(&ty);
            decode(&mut value, black_box(&bytes), 0).expect("decode");
            let out = to_bytes(&value).expect("encode");
            black_box(out.len())
        })
    });
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);
