// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Common fixtures for integration tests.

#![allow(dead_code)]

use chrono::{DateTime, NaiveDate};

use recordcodec::core::{Decimal, Value};
use recordcodec::model::{FieldValues, Key, Record};
use recordcodec::schema::builtin_types;
use recordcodec::schema::{FieldKind, TypeBuilder, TypeId, TypePool};

// ============================================================================
// People
// ============================================================================

/// Handles of the people fixture types.
#[derive(Debug, Clone, Copy)]
pub struct People {
    pub address: TypeId,
    pub cat: TypeId,
    pub dog: TypeId,
    pub person: TypeId,
}

/// A pool with `Person` using every field kind, plus its dependencies.
pub fn people_pool() -> (TypePool, People) {
    let mut pool = TypePool::new();
    let address = pool
        .add(
            TypeBuilder::new("Address")
                .field("street", FieldKind::String)
                .field("city", FieldKind::String),
        )
        .expect("address type");
    let cat = pool
        .add(
            TypeBuilder::new("Cat")
                .key_field("name", FieldKind::String)
                .field("lives", FieldKind::Integer),
        )
        .expect("cat type");
    let dog = pool
        .add(
            TypeBuilder::new("Dog")
                .key_field("name", FieldKind::String)
                .field("good", FieldKind::Boolean),
        )
        .expect("dog type");

    let person = pool.declare("Person").expect("declare person");
    pool.add(
        TypeBuilder::new("Person")
            .key_field("id", FieldKind::Integer)
            .field("name", FieldKind::String)
            .field("age", FieldKind::Long)
            .field("height", FieldKind::Double)
            .field("active", FieldKind::Boolean)
            .field("tags", FieldKind::StringArray)
            .field("scores", FieldKind::IntegerArray)
            .field("ratios", FieldKind::DoubleArray)
            .field("flags", FieldKind::BooleanArray)
            .field("ticks", FieldKind::LongArray)
            .field("balance", FieldKind::BigDecimal)
            .field("history", FieldKind::BigDecimalArray)
            .field("birthday", FieldKind::Date)
            .field("updated", FieldKind::DateTime)
            .field("photo", FieldKind::Blob)
            .field("address", FieldKind::Record(address))
            .field("friends", FieldKind::RecordArray(person))
            .field("pet", FieldKind::RecordUnion(vec![cat, dog]))
            .field("pets", FieldKind::RecordUnionArray(vec![cat, dog]))
            .field_with(
                "extra",
                FieldKind::String,
                vec![builtin_types::json_content()],
            ),
    )
    .expect("person type");

    (
        pool,
        People {
            address,
            cat,
            dog,
            person,
        },
    )
}

pub fn cat(pool: &TypePool, types: &People, name: &str, lives: i32) -> Record {
    Record::new(pool, types.cat)
        .with(pool, "name", name)
        .and_then(|r| r.with(pool, "lives", lives))
        .expect("cat record")
}

pub fn dog(pool: &TypePool, types: &People, name: &str) -> Record {
    Record::new(pool, types.dog)
        .with(pool, "name", name)
        .and_then(|r| r.with(pool, "good", true))
        .expect("dog record")
}

/// A `Person` with a key and a name only.
pub fn person(pool: &TypePool, types: &People, id: i32, name: &str) -> Record {
    Record::new(pool, types.person)
        .with(pool, "id", id)
        .and_then(|r| r.with(pool, "name", name))
        .expect("person record")
}

/// A `Person` with every field set.
pub fn full_person(pool: &TypePool, types: &People) -> Record {
    let address = Record::new(pool, types.address)
        .with(pool, "street", "1 Analytical Way")
        .and_then(|r| r.with(pool, "city", "London"))
        .expect("address record");

    let values = vec![
        ("age", Value::Long(36)),
        ("height", Value::Double(1.65)),
        ("active", Value::Boolean(true)),
        (
            "tags",
            Value::StringArray(vec!["math".to_string(), "poetry".to_string()]),
        ),
        ("scores", Value::IntegerArray(vec![3, -1, 7])),
        ("ratios", Value::DoubleArray(vec![0.5, 2.0])),
        ("flags", Value::BooleanArray(vec![true, false])),
        ("ticks", Value::LongArray(vec![9_007_199_254_740_993, -4])),
        (
            "balance",
            Value::BigDecimal(Decimal::parse("12345678901234567890.000000001").expect("decimal")),
        ),
        (
            "history",
            Value::BigDecimalArray(vec![
                Decimal::parse("0.1").expect("decimal"),
                Decimal::parse("-2e10").expect("decimal"),
            ]),
        ),
        (
            "birthday",
            Value::Date(NaiveDate::from_ymd_opt(1815, 12, 10).expect("date")),
        ),
        (
            "updated",
            Value::DateTime(
                DateTime::parse_from_rfc3339("2024-03-01T12:30:45.250+01:00").expect("date-time"),
            ),
        ),
        ("photo", Value::Blob(vec![0, 1, 2, 253, 254, 255])),
        ("address", Value::Record(Box::new(address))),
        (
            "friends",
            Value::RecordArray(vec![person(pool, types, 2, "Charles")]),
        ),
        ("pet", Value::Union(Box::new(cat(pool, types, "Tom", 9)))),
        (
            "pets",
            Value::UnionArray(vec![dog(pool, types, "Rex"), cat(pool, types, "Kit", 3)]),
        ),
        ("extra", Value::from(r#"{"source":"import","ids":[1,2]}"#)),
    ];

    let mut record = person(pool, types, 1, "Ada");
    for (name, value) in values {
        record.set_by_name(pool, name, value).expect("field value");
    }
    record
}

// ============================================================================
// Dummy / SubType
// ============================================================================

/// `Dummy{uuid(key), name, sub: SubType}` and `SubType{uuid(key), subName}`.
pub fn dummy_pool() -> (TypePool, TypeId, TypeId) {
    let mut pool = TypePool::new();
    let sub = pool
        .add(
            TypeBuilder::new("SubType")
                .key_field("uuid", FieldKind::String)
                .field("subName", FieldKind::String),
        )
        .expect("sub type");
    let dummy = pool
        .add(
            TypeBuilder::new("Dummy")
                .key_field("uuid", FieldKind::String)
                .field("name", FieldKind::String)
                .field("sub", FieldKind::Record(sub)),
        )
        .expect("dummy type");
    (pool, dummy, sub)
}

pub fn string_key(type_id: TypeId, value: &str) -> Key {
    Key::new(type_id, vec![Value::from(value)])
}

/// Field values built from `(name, value)` pairs.
pub fn values(pool: &TypePool, type_id: TypeId, pairs: &[(&str, Option<Value>)]) -> FieldValues {
    pairs
        .iter()
        .try_fold(FieldValues::new(type_id), |acc, (name, value)| {
            acc.with(pool, name, value.clone())
        })
        .expect("field values")
}

/// An accessor that fails the test if it is ever called.
pub fn no_lookups(key: &Key) -> Option<Record> {
    panic!("unexpected lookup of {key}")
}
