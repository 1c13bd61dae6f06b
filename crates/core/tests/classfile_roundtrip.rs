use weave_core::classfile::{ClassFile, CpEntry};
use weave_core::testutil::ClassBuilder;

#[test]
fn parse_then_serialize_is_lossless() {
    let bytes = ClassBuilder::new("pkg/Sample")
        .method("handle", "(II)V")
        .static_method("util", "(Ljava/lang/String;)V")
        .build()
        .expect("build class");

    let class = ClassFile::parse(&bytes).expect("parse");
    assert_eq!(class.to_bytes(), bytes);
}

#[test]
fn class_name_resolves_through_the_pool() {
    let bytes = ClassBuilder::new("pkg/inner/Widget").build().expect("build class");
    let class = ClassFile::parse(&bytes).expect("parse");
    assert_eq!(class.class_name().expect("class name"), "pkg/inner/Widget");
}

#[test]
fn methods_carry_their_descriptors() {
    let bytes = ClassBuilder::new("pkg/Sample")
        .method("one", "(I)V")
        .method("two", "(JD)V")
        .build()
        .expect("build class");
    let class = ClassFile::parse(&bytes).expect("parse");

    assert_eq!(class.methods.len(), 2);
    let descs: Vec<&str> = class
        .methods
        .iter()
        .map(|m| class.pool.utf8(m.descriptor_index).expect("descriptor"))
        .collect();
    assert_eq!(descs, vec!["(I)V", "(JD)V"]);
}

#[test]
fn interning_deduplicates_pool_entries() {
    let bytes = ClassBuilder::new("pkg/Sample").build().expect("build class");
    let mut class = ClassFile::parse(&bytes).expect("parse");

    let before = class.pool.count();
    // "java/lang/Object" is already present as the superclass name.
    let idx_a = class.pool.ensure_class("java/lang/Object").expect("ensure");
    let idx_b = class.pool.ensure_class("java/lang/Object").expect("ensure");
    assert_eq!(idx_a, idx_b);
    assert_eq!(class.pool.count(), before);

    // A genuinely new ref grows the pool once, then is found again.
    let ref_a = class.pool.ensure_method_ref("pkg/Other", "run", "()V").expect("ensure");
    let after = class.pool.count();
    let ref_b = class.pool.ensure_method_ref("pkg/Other", "run", "()V").expect("ensure");
    assert_eq!(ref_a, ref_b);
    assert_eq!(class.pool.count(), after);
}

#[test]
fn every_pool_slot_stays_addressable_after_roundtrip() {
    let bytes = ClassBuilder::new("pkg/Sample").build().expect("build class");
    let class = ClassFile::parse(&bytes).expect("parse");

    let reparsed = ClassFile::parse(&class.to_bytes()).expect("reparse");
    // The builder emits no wide constants, so there are no phantom slots.
    for index in 1..reparsed.pool.count() {
        assert!(reparsed.pool.get(index).is_ok());
    }
}

#[test]
fn rejects_bad_magic() {
    let err = ClassFile::parse(&[0xDE, 0xAD, 0xBE, 0xEF, 0, 0, 0, 52]).unwrap_err();
    assert!(err.to_string().contains("magic"));
}

#[test]
fn rejects_truncated_input() {
    let bytes = ClassBuilder::new("pkg/Sample").method("m", "(I)V").build().expect("build");
    assert!(ClassFile::parse(&bytes[..bytes.len() - 3]).is_err());
}

#[test]
fn string_interning_reuses_utf8() {
    let bytes = ClassBuilder::new("pkg/Sample").build().expect("build class");
    let mut class = ClassFile::parse(&bytes).expect("parse");

    let idx = class.pool.ensure_string("pkg.Sample").expect("ensure string");
    match class.pool.get(idx).expect("entry") {
        CpEntry::String(utf8) => {
            assert_eq!(class.pool.utf8(*utf8).expect("utf8"), "pkg.Sample");
        }
        other => panic!("expected String entry, got {other:?}"),
    }
}
