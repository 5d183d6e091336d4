//! Decode fuzz target: feed arbitrary bytes to a dependent block schema.
//! The decoder must not panic on untrusted data; it returns Ok(consumed) or
//! Err(Error). Build with: cargo fuzz run decode_fuzz (requires nightly and
//! cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
use std::sync::{Arc, OnceLock};

#[cfg(fuzzing)]
fn stream_type() -> &'static binblock::TypeDesc {
    static TY: OnceLock<binblock::TypeDesc> = OnceLock::new();
    TY.get_or_init(|| {
        use binblock::{repeat, BlockField, BlockSchema, Endianness, ScalarKind, TypeDesc, Value};

        let chunk: Arc<BlockSchema> = BlockSchema::new(
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
        .expect("static schema");

        repeat(TypeDesc::Block(chunk), |last: &Value| {
            last.as_block()
                .and_then(|b| b.get("size"))
                .and_then(Value::as_u64)
                == Some(0)
        })
    })
}

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let mut value = binblock::instantiate(stream_type());
    if let Ok(consumed) = binblock::decode(&mut value, data, 0) {
        // A successful decode must re-encode to the consumed region.
        let bytes = binblock::to_bytes(&value).expect("round trip");
        assert_eq!(&bytes, &data[..consumed]);
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run decode_fuzz");
}
