// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Predefined annotation types.
//!
//! Every [`TypePool`] registers these first, in this order, so their
//! handles are the same constants in every pool.
//!
//! ## Supported Types
//!
//! - `KeyAnnotation { index: int }` - marks a key field
//! - `FieldNameAnnotation { name: string }` - wire name of a field
//! - `isJsonContent` - string field holding embedded JSON
//! - `jsonDateFormat { format }` - date pattern
//! - `jsonDateTimeFormat { format, asLocal, nullValue }` - date-time pattern
//! - `asJsonObject` - record array written as an object
//! - `jsonValueAsField` - property-name field of an `asJsonObject` array
//! - `unknownAnnotation { uuid, content }` - annotation of an unknown type,
//!   kept verbatim

use uuid::Uuid;

use crate::core::Value;
use crate::model::Record;
use crate::schema::ast::{Field, FieldKind, TypeId};
use crate::schema::pool::{TypeBuilder, TypePool};

pub const KEY_ANNOTATION: TypeId = TypeId::from_index(0);
pub const FIELD_NAME: TypeId = TypeId::from_index(1);
pub const JSON_CONTENT: TypeId = TypeId::from_index(2);
pub const DATE_FORMAT: TypeId = TypeId::from_index(3);
pub const DATE_TIME_FORMAT: TypeId = TypeId::from_index(4);
pub const AS_JSON_OBJECT: TypeId = TypeId::from_index(5);
pub const VALUE_AS_FIELD: TypeId = TypeId::from_index(6);
pub const UNKNOWN_ANNOTATION: TypeId = TypeId::from_index(7);

const NAMES: [&str; 8] = [
    "KeyAnnotation",
    "FieldNameAnnotation",
    "isJsonContent",
    "jsonDateFormat",
    "jsonDateTimeFormat",
    "asJsonObject",
    "jsonValueAsField",
    "unknownAnnotation",
];

/// Field positions of `jsonDateTimeFormat`.
pub(crate) mod date_time_format {
    pub const FORMAT: usize = 0;
    pub const AS_LOCAL: usize = 1;
    pub const NULL_VALUE: usize = 2;
}

/// Field positions of `unknownAnnotation`.
pub(crate) mod unknown_annotation {
    pub const CONTENT: usize = 1;
}

/// Register the builtin types into a fresh pool.
pub(crate) fn register(pool: &mut TypePool) {
    let builders = [
        TypeBuilder::new(NAMES[0]).field("index", FieldKind::Integer),
        TypeBuilder::new(NAMES[1]).field("name", FieldKind::String),
        TypeBuilder::new(NAMES[2]),
        TypeBuilder::new(NAMES[3]).field("format", FieldKind::String),
        TypeBuilder::new(NAMES[4])
            .field("format", FieldKind::String)
            .field("asLocal", FieldKind::Boolean)
            .field("nullValue", FieldKind::String),
        TypeBuilder::new(NAMES[5]),
        TypeBuilder::new(NAMES[6]),
        TypeBuilder::new(NAMES[7])
            .key_field("uuid", FieldKind::String)
            .push(Field::new("content", FieldKind::String).with_annotation(json_content())),
    ];
    for builder in builders {
        // Names are distinct and the pool is empty, so this cannot fail.
        let _ = pool.add(builder);
    }
}

/// Look up a builtin type by name.
pub fn find(name: &str) -> Option<TypeId> {
    NAMES
        .iter()
        .position(|n| *n == name)
        .map(TypeId::from_index)
}

pub fn is_builtin(id: TypeId) -> bool {
    id.index() < NAMES.len()
}

/// Names of all builtin types, in registration order.
pub fn get_all() -> &'static [&'static str] {
    &NAMES
}

// =============================================================================
// Annotation constructors
// =============================================================================

/// Key field marker at key position `index`.
pub fn key(index: i32) -> Record {
    Record::from_values(KEY_ANNOTATION, vec![Some(Value::Integer(index))])
}

pub fn field_name(name: &str) -> Record {
    Record::from_values(FIELD_NAME, vec![Some(Value::from(name))])
}

pub fn json_content() -> Record {
    Record::from_values(JSON_CONTENT, Vec::new())
}

/// Date pattern in `chrono` strftime syntax, e.g. `%d/%m/%Y`.
pub fn date_format(format: &str) -> Record {
    Record::from_values(DATE_FORMAT, vec![Some(Value::from(format))])
}

/// Date-time pattern in `chrono` strftime syntax.
///
/// With `as_local`, values are read and written as wall-clock time of the
/// process time zone. A `null_value` string, like the empty string, reads
/// as an absent value.
pub fn date_time_format(format: &str, as_local: bool, null_value: Option<&str>) -> Record {
    Record::from_values(
        DATE_TIME_FORMAT,
        vec![
            Some(Value::from(format)),
            Some(Value::Boolean(as_local)),
            null_value.map(Value::from),
        ],
    )
}

pub fn as_json_object() -> Record {
    Record::from_values(AS_JSON_OBJECT, Vec::new())
}

pub fn value_as_field() -> Record {
    Record::from_values(VALUE_AS_FIELD, Vec::new())
}

/// Placeholder for an annotation whose type could not be resolved.
///
/// `content` must be the annotation's JSON text; it is written back as is.
pub fn unknown_annotation(content: String) -> Record {
    Record::from_values(
        UNKNOWN_ANNOTATION,
        vec![
            Some(Value::String(Uuid::new_v4().to_string())),
            Some(Value::String(content)),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_handles_match_names() {
        let pool = TypePool::new();
        for (i, name) in get_all().iter().enumerate() {
            let id = pool.find(name).unwrap();
            assert_eq!(id.index(), i);
            assert_eq!(find(name), Some(id));
            assert!(is_builtin(id));
        }
        assert_eq!(find("Person"), None);
    }

    #[test]
    fn test_builtin_type_shapes() {
        let pool = TypePool::new();
        let dtf = pool.get(DATE_TIME_FORMAT);
        assert_eq!(dtf.field_index("asLocal"), Some(date_time_format::AS_LOCAL));
        assert_eq!(dtf.field_index("nullValue"), Some(date_time_format::NULL_VALUE));

        let unknown = pool.get(UNKNOWN_ANNOTATION);
        assert_eq!(unknown.key_fields(), &[0]);
        assert!(unknown.fields()[unknown_annotation::CONTENT].is_json_content());
        assert!(pool.get(JSON_CONTENT).fields().is_empty());
    }

    #[test]
    fn test_unknown_annotation_gets_fresh_uuid() {
        let a = unknown_annotation("{}".to_string());
        let b = unknown_annotation("{}".to_string());
        assert_ne!(a.get(0), b.get(0));
    }
}
