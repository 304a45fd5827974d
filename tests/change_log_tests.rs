// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Change-log tests: entry shapes, two-step reference resolution and
//! merging of repeated touches.

mod common;

use common::{cat, dog, dummy_pool, no_lookups, people_pool, person, string_key, values};
use recordcodec::core::{PoolTypes, RecordRegistry, TypeSubset, Value};
use recordcodec::encoding::json::{
    decode_change_log, encode_change_set, read_change_log, write_change_set,
};
use recordcodec::model::{ChangeEntry, ChangeSet, ChangeState, Key, Record};
use recordcodec::{CodecError, CodecOptions};

fn defaults() -> CodecOptions {
    CodecOptions::default()
}

fn int_key(type_id: recordcodec::schema::TypeId, id: i32) -> Key {
    Key::new(type_id, vec![Value::Integer(id)])
}

// ============================================================================
// Encoding
// ============================================================================

#[test]
fn test_entry_shapes() {
    let (pool, types) = people_pool();
    let mut changes = ChangeSet::new();
    changes
        .create(
            int_key(types.person, 1),
            values(
                &pool,
                types.person,
                &[
                    ("name", Some(Value::from("Ada"))),
                    ("pet", Some(Value::Union(Box::new(cat(&pool, &types, "Tom", 9))))),
                ],
            ),
        )
        .expect("create");
    changes
        .update(
            int_key(types.person, 2),
            values(
                &pool,
                types.person,
                &[
                    (
                        "friends",
                        Some(Value::RecordArray(vec![person(&pool, &types, 1, "Ada")])),
                    ),
                    ("age", None),
                ],
            ),
            values(&pool, types.person, &[("age", Some(Value::Long(40)))]),
        )
        .expect("update");
    changes
        .delete(
            int_key(types.person, 3),
            values(&pool, types.person, &[("name", Some(Value::from("Bob")))]),
        )
        .expect("delete");

    let json = encode_change_set(&pool, &changes, &defaults()).expect("encode");
    assert_eq!(
        json,
        concat!(
            "[",
            r#"{"state":"create","_kind":"Person","key":{"id":1},"newValue":{"name":"Ada","pet":{"Cat":{"name":"Tom"}}}},"#,
            r#"{"state":"update","_kind":"Person","key":{"id":2},"newValue":{"friends":[{"id":1}],"age":null},"oldValue":{"age":40}},"#,
            r#"{"state":"delete","_kind":"Person","key":{"id":3},"oldValue":{"name":"Bob"}}"#,
            "]"
        )
    );
}

#[test]
fn test_reference_to_keyless_type() {
    let (pool, types) = people_pool();
    let address = Record::new(&pool, types.address)
        .with(&pool, "city", "Oslo")
        .expect("address");
    let mut changes = ChangeSet::new();
    changes
        .create(
            int_key(types.person, 1),
            values(
                &pool,
                types.person,
                &[("address", Some(Value::Record(Box::new(address))))],
            ),
        )
        .expect("create");
    let err = encode_change_set(&pool, &changes, &defaults()).unwrap_err();
    assert!(matches!(err, CodecError::Format { .. }));
}

// ============================================================================
// Reference Resolution
// ============================================================================

#[test]
fn test_references_between_created_records() {
    let (pool, types) = people_pool();
    let pending = decode_change_log(
        &pool,
        r#"[
            {"state":"create","_kind":"Person","key":{"id":1},
             "newValue":{"name":"Ada","friends":[{"id":2}]}},
            {"state":"create","_kind":"Person","key":{"id":2},
             "newValue":{"name":"Charles","friends":[{"id":1}]}},
            {"state":"create","_kind":"Cat","key":{"name":"Tom"},"newValue":{"lives":9}},
            {"state":"update","_kind":"Person","key":{"id":2},
             "newValue":{"pet":{"Cat":{"name":"Tom"}}},"oldValue":{}}
        ]"#,
        &PoolTypes,
    )
    .expect("decode");
    assert_eq!(pending.changes().len(), 3);
    assert_eq!(pending.pending_references(), 3);

    // Every target is created by the log, so the accessor is never asked.
    let changes = pending.resolve(no_lookups).expect("resolve");
    assert_eq!(changes.len(), 3);

    let ada = changes.get(&int_key(types.person, 1)).expect("ada");
    assert_eq!(ada.state(), ChangeState::Create);
    let friends = ada.new_values().expect("new values");
    let field = pool.get(types.person).field_index("friends").expect("friends");
    let Some(Some(Value::RecordArray(friends))) = friends.get(field) else {
        panic!("friends not resolved");
    };
    assert_eq!(friends.len(), 1);
    assert_eq!(friends[0].get_by_name(&pool, "id"), Some(&Value::Integer(2)));
    assert_eq!(friends[0].get_by_name(&pool, "name"), Some(&Value::from("Charles")));

    // The update merged into the create of the same key.
    let charles = changes.get(&int_key(types.person, 2)).expect("charles");
    assert_eq!(charles.state(), ChangeState::Create);
    let pet = pool.get(types.person).field_index("pet").expect("pet");
    assert_eq!(
        charles.new_values().and_then(|v| v.get(pet)),
        Some(Some(&Value::Union(Box::new(cat(&pool, &types, "Tom", 9)))))
    );
}

#[test]
fn test_dummy_with_created_sub_type() {
    let (pool, dummy, sub) = dummy_pool();
    let log = r#"[
        {"state":"create","_kind":"SubType","key":{"uuid":"s-1"},"newValue":{"subName":"inner"}},
        {"state":"create","_kind":"Dummy","key":{"uuid":"d-1"},
         "newValue":{"name":"outer","sub":{"uuid":"s-1"}}}
    ]"#;
    let changes = decode_change_log(&pool, log, &PoolTypes)
        .expect("decode")
        .resolve(no_lookups)
        .expect("resolve");

    let expected_sub = Record::new(&pool, sub)
        .with(&pool, "uuid", "s-1")
        .and_then(|r| r.with(&pool, "subName", "inner"))
        .expect("sub record");
    let entry = changes.get(&string_key(dummy, "d-1")).expect("dummy entry");
    assert_eq!(
        entry.new_values().map(|v| v.to_record(&pool, entry.key())),
        Some(
            Record::new(&pool, dummy)
                .with(&pool, "uuid", "d-1")
                .and_then(|r| r.with(&pool, "name", "outer"))
                .and_then(|r| r.with(&pool, "sub", Value::Record(Box::new(expected_sub))))
                .expect("dummy record")
        )
    );

    // Encoding the resolved set gives the log back.
    let json = encode_change_set(&pool, &changes, &defaults()).expect("encode");
    assert_eq!(
        json,
        concat!(
            r#"[{"state":"create","_kind":"SubType","key":{"uuid":"s-1"},"newValue":{"subName":"inner"}},"#,
            r#"{"state":"create","_kind":"Dummy","key":{"uuid":"d-1"},"newValue":{"name":"outer","sub":{"uuid":"s-1"}}}]"#
        )
    );
}

#[test]
fn test_dummy_with_existing_sub_type() {
    let (pool, dummy, sub) = dummy_pool();
    let stored = Record::new(&pool, sub)
        .with(&pool, "uuid", "s-9")
        .and_then(|r| r.with(&pool, "subName", "stored"))
        .expect("stored sub");
    let registry = RecordRegistry::new();
    registry.register(&pool, stored.clone()).expect("register");

    let changes = decode_change_log(
        &pool,
        r#"[{"state":"update","_kind":"Dummy","key":{"uuid":"d-1"},
             "newValue":{"sub":{"uuid":"s-9"}},"oldValue":{"sub":null,"name":"old"}}]"#,
        &PoolTypes,
    )
    .expect("decode")
    .resolve(registry)
    .expect("resolve");

    let entry = changes.get(&string_key(dummy, "d-1")).expect("entry");
    assert_eq!(entry.state(), ChangeState::Update);
    assert_eq!(
        entry.new_values().and_then(|v| v.get(2)),
        Some(Some(&Value::Record(Box::new(stored))))
    );
    let old = entry.old_values().expect("old values");
    assert_eq!(old.get(2), Some(None));
    assert_eq!(old.get(1), Some(Some(&Value::from("old"))));
}

#[test]
fn test_missing_reference_is_reported() {
    let (pool, dummy, _) = dummy_pool();
    let pending = decode_change_log(
        &pool,
        r#"[{"state":"create","_kind":"Dummy","key":{"uuid":"d-1"},"newValue":{"sub":{"uuid":"gone"}}}]"#,
        &PoolTypes,
    )
    .expect("decode");
    assert!(pending.changes().get(&string_key(dummy, "d-1")).is_some());

    let err = pending
        .resolve(|_: &Key| -> Option<Record> { None })
        .unwrap_err();
    match err {
        CodecError::ReferenceNotFound { key } => assert_eq!(key, "SubType[uuid=gone]"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_union_references_through_accessor() {
    let (pool, types) = people_pool();
    let rex = dog(&pool, &types, "Rex");
    let kit = cat(&pool, &types, "Kit", 3);
    let registry = RecordRegistry::new();
    registry.register(&pool, rex.clone()).expect("rex");
    registry.register(&pool, kit.clone()).expect("kit");

    let changes = decode_change_log(
        &pool,
        r#"[{"state":"update","_kind":"Person","key":{"id":4},
             "newValue":{"pets":[{"Dog":{"name":"Rex"}},{"Cat":{"name":"Kit"}}]},
             "oldValue":{"pets":[]}}]"#,
        &PoolTypes,
    )
    .expect("decode")
    .resolve(registry)
    .expect("resolve");

    let pets = pool.get(types.person).field_index("pets").expect("pets");
    let entry = changes.get(&int_key(types.person, 4)).expect("entry");
    assert_eq!(
        entry.new_values().and_then(|v| v.get(pets)),
        Some(Some(&Value::UnionArray(vec![rex, kit])))
    );
    assert_eq!(
        entry.old_values().and_then(|v| v.get(pets)),
        Some(Some(&Value::UnionArray(Vec::new())))
    );
}

// ============================================================================
// Merging
// ============================================================================

#[test]
fn test_create_then_delete_cancels_out() {
    let (pool, types) = people_pool();
    let changes = decode_change_log(
        &pool,
        r#"[
            {"state":"create","_kind":"Person","key":{"id":1},"newValue":{"name":"Ada"}},
            {"state":"delete","_kind":"Person","key":{"id":1},"oldValue":{"name":"Ada"}},
            {"state":"delete","_kind":"Person","key":{"id":2},"oldValue":{"name":"Bob"}}
        ]"#,
        &PoolTypes,
    )
    .expect("decode")
    .resolve(no_lookups)
    .expect("resolve");

    assert_eq!(changes.len(), 1);
    assert!(changes.get(&int_key(types.person, 1)).is_none());
    assert!(matches!(
        changes.get(&int_key(types.person, 2)),
        Some(ChangeEntry::Delete { .. })
    ));
}

#[test]
fn test_recreate_after_delete_forgets_cancelled_references() {
    let (pool, types) = people_pool();
    let pending = decode_change_log(
        &pool,
        r#"[
            {"state":"create","_kind":"Person","key":{"id":2},"newValue":{"friends":[{"id":9}]}},
            {"state":"delete","_kind":"Person","key":{"id":2},"oldValue":{}},
            {"state":"create","_kind":"Person","key":{"id":2},"newValue":{"name":"fresh"}}
        ]"#,
        &PoolTypes,
    )
    .expect("decode");
    assert_eq!(pending.pending_references(), 0);

    let changes = pending.resolve(no_lookups).expect("resolve");
    let ty = pool.get(types.person);
    let entry = changes.get(&int_key(types.person, 2)).expect("entry");
    assert!(matches!(entry, ChangeEntry::Create { .. }));
    let new = entry.new_values().expect("new");
    assert_eq!(new.get(ty.field_index("friends").expect("friends")), None);
    assert_eq!(
        new.get(ty.field_index("name").expect("name")),
        Some(Some(&Value::from("fresh")))
    );
}

#[test]
fn test_null_and_omitted_plain_values() {
    let (pool, types) = people_pool();
    let log = r#"[{"state":"update","_kind":"Person","key":{"id":1},"newValue":{"name":null},"oldValue":{"name":"Ada"}},{"state":"update","_kind":"Person","key":{"id":2},"newValue":{"age":3},"oldValue":{}}]"#;
    let changes = decode_change_log(&pool, log, &PoolTypes)
        .expect("decode")
        .resolve(no_lookups)
        .expect("resolve");

    let name = pool.get(types.person).field_index("name").expect("name");
    let cleared = changes.get(&int_key(types.person, 1)).expect("entry 1");
    assert_eq!(cleared.new_values().expect("new").get(name), Some(None));
    assert_eq!(
        cleared.old_values().expect("old").get(name),
        Some(Some(&Value::from("Ada")))
    );

    let untouched = changes.get(&int_key(types.person, 2)).expect("entry 2");
    assert_eq!(untouched.new_values().expect("new").get(name), None);
    assert_eq!(untouched.old_values().expect("old").get(name), None);

    // Clears are written back as null, omitted fields stay omitted.
    assert_eq!(
        encode_change_set(&pool, &changes, &defaults()).expect("encode"),
        log
    );
}

#[test]
fn test_updates_merge() {
    let (pool, types) = people_pool();
    let changes = decode_change_log(
        &pool,
        r#"[
            {"state":"update","_kind":"Person","key":{"id":1},
             "newValue":{"name":"B","age":2},"oldValue":{"name":"A","age":1}},
            {"state":"update","_kind":"Person","key":{"id":1},
             "newValue":{"name":"C"},"oldValue":{"name":"B","active":false}}
        ]"#,
        &PoolTypes,
    )
    .expect("decode")
    .resolve(no_lookups)
    .expect("resolve");

    let entry = changes.get(&int_key(types.person, 1)).expect("entry");
    let ty = pool.get(types.person);
    let index = |name: &str| ty.field_index(name).expect("field");
    let new = entry.new_values().expect("new");
    let old = entry.old_values().expect("old");
    assert_eq!(new.get(index("name")), Some(Some(&Value::from("C"))));
    assert_eq!(new.get(index("age")), Some(Some(&Value::Long(2))));
    assert_eq!(old.get(index("name")), Some(Some(&Value::from("A"))));
    assert_eq!(old.get(index("active")), Some(Some(&Value::Boolean(false))));
}

#[test]
fn test_update_after_delete_conflicts() {
    let (pool, _) = people_pool();
    let err = decode_change_log(
        &pool,
        r#"[
            {"state":"delete","_kind":"Person","key":{"id":1},"oldValue":{}},
            {"state":"update","_kind":"Person","key":{"id":1},"newValue":{"name":"X"},"oldValue":{}}
        ]"#,
        &PoolTypes,
    )
    .unwrap_err();
    assert!(matches!(err, CodecError::Format { .. }));
}

// ============================================================================
// Failures and I/O
// ============================================================================

#[test]
fn test_unknown_kind_in_log() {
    let (pool, types) = people_pool();
    let err = decode_change_log(
        &pool,
        r#"[{"state":"create","_kind":"Person","key":{"id":1}}]"#,
        &TypeSubset::new([types.cat]),
    )
    .unwrap_err();
    assert!(matches!(err, CodecError::TypeNotFound { ref type_name } if type_name == "Person"));
}

#[test]
fn test_entries_are_read_as_they_arrive() {
    let (pool, _) = people_pool();
    // The bad first entry is reported before the broken tail is reached.
    let err = decode_change_log(
        &pool,
        r#"[{"state":"upsert","_kind":"Person","key":{"id":1}}, {"state": "#,
        &PoolTypes,
    )
    .unwrap_err();
    match err {
        CodecError::Format { context, message } => {
            assert_eq!(context, "change log");
            assert!(message.contains("upsert"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_bad_value_names_field() {
    let (pool, _) = people_pool();
    let err = decode_change_log(
        &pool,
        r#"[{"state":"create","_kind":"Person","key":{"id":1},"newValue":{"age":"old"}}]"#,
        &PoolTypes,
    )
    .unwrap_err();
    match err {
        CodecError::Format { context, .. } => assert_eq!(context, "Person.age"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_stream_round_trip() {
    let (pool, types) = people_pool();
    let mut changes = ChangeSet::new();
    changes
        .create(
            int_key(types.person, 1),
            values(
                &pool,
                types.person,
                &[
                    ("name", Some(Value::from("Ada"))),
                    ("tags", Some(Value::StringArray(vec!["x".to_string()]))),
                    ("photo", Some(Value::Blob(vec![1, 2, 3]))),
                ],
            ),
        )
        .expect("create");

    let mut buf = Vec::new();
    write_change_set(&pool, &mut buf, &changes, &defaults()).expect("write");
    let decoded = read_change_log(&pool, buf.as_slice(), &PoolTypes)
        .expect("read")
        .resolve(no_lookups)
        .expect("resolve");

    let key = int_key(types.person, 1);
    let original = changes.get(&key).and_then(ChangeEntry::new_values).expect("original");
    let copy = decoded.get(&key).and_then(ChangeEntry::new_values).expect("copy");
    assert_eq!(copy.to_record(&pool, &key), original.to_record(&pool, &key));
}
