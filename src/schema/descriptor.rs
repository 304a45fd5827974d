// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Wire shapes of type descriptors.
//!
//! ```text
//! { "kind": "Person",
//!   "fields": [ { "name": "id", "type": "int", "annotations": [...] },
//!               { "name": "boss", "type": "record", "kind": "Person" } ],
//!   "annotations": [ ... ] }
//! ```
//!
//! Reading is a two-step affair: the JSON is first parsed into the
//! `Raw*` shapes below, with annotations left as raw JSON, and only then
//! turned into types, once every referenced name can be resolved.

use std::fmt;

use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// A type descriptor as read from the wire.
#[derive(Debug, Deserialize)]
pub(crate) struct RawTypeDescriptor {
    pub kind: Option<String>,
    pub fields: Option<RawFields>,
    pub annotations: Option<Vec<Box<RawValue>>>,
}

impl RawTypeDescriptor {
    pub fn name(&self) -> &str {
        self.kind.as_deref().unwrap_or("<unnamed>")
    }
}

/// A field descriptor as read from the wire.
#[derive(Debug, Deserialize)]
pub(crate) struct RawFieldDescriptor {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub tag: Option<String>,
    pub kind: Option<String>,
    pub kinds: Option<Vec<String>>,
    pub annotations: Option<Vec<Box<RawValue>>>,
}

/// Field descriptors in wire order, each with the property name it was
/// keyed by when `fields` is written as an object.
#[derive(Debug, Default)]
pub(crate) struct RawFields(pub Vec<(Option<String>, RawFieldDescriptor)>);

impl<'de> Deserialize<'de> for RawFields {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldsVisitor;

        impl<'de> Visitor<'de> for FieldsVisitor {
            type Value = RawFields;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an array of field descriptors or an object keyed by field name")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<RawFields, A::Error> {
                let mut fields = Vec::new();
                while let Some(field) = seq.next_element::<RawFieldDescriptor>()? {
                    fields.push((None, field));
                }
                Ok(RawFields(fields))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RawFields, A::Error> {
                let mut fields = Vec::new();
                while let Some(name) = map.next_key::<String>()? {
                    let field = map.next_value::<RawFieldDescriptor>()?;
                    fields.push((Some(name), field));
                }
                Ok(RawFields(fields))
            }

            fn visit_unit<E: de::Error>(self) -> Result<RawFields, E> {
                Ok(RawFields::default())
            }
        }

        deserializer.deserialize_any(FieldsVisitor)
    }
}

/// Just the `_kind` discriminator of an annotation.
#[derive(Debug, Deserialize)]
pub(crate) struct KindProbe {
    #[serde(rename = "_kind")]
    pub kind: Option<String>,
}

/// A type descriptor ready to be written.
#[derive(Debug, Serialize)]
pub(crate) struct TypeDescriptorOut<'a, A: Serialize> {
    pub kind: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDescriptorOut<'a, A>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<A>,
}

/// A field descriptor ready to be written.
#[derive(Debug, Serialize)]
pub(crate) struct FieldDescriptorOut<'a, A: Serialize> {
    pub name: &'a str,
    #[serde(rename = "type")]
    pub tag: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kinds: Option<Vec<&'a str>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<A>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_as_array() {
        let raw: RawTypeDescriptor = serde_json::from_str(
            r#"{"kind":"P","fields":[{"name":"a","type":"int"},{"name":"b","type":"record","kind":"P"}]}"#,
        )
        .unwrap();
        let fields = raw.fields.unwrap().0;
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].0, None);
        assert_eq!(fields[1].1.kind.as_deref(), Some("P"));
    }

    #[test]
    fn test_fields_as_object_keep_order() {
        let raw: RawTypeDescriptor = serde_json::from_str(
            r#"{"kind":"P","fields":{"z":{"type":"int"},"a":{"type":"string"}}}"#,
        )
        .unwrap();
        let names: Vec<_> = raw
            .fields
            .unwrap()
            .0
            .into_iter()
            .map(|(n, _)| n.unwrap())
            .collect();
        assert_eq!(names, vec!["z", "a"]);
    }

    #[test]
    fn test_annotations_stay_raw() {
        let raw: RawFieldDescriptor = serde_json::from_str(
            r#"{"name":"a","type":"int","annotations":[{"_kind":"Custom","x":[1, 2]}]}"#,
        )
        .unwrap();
        let annotations = raw.annotations.unwrap();
        assert_eq!(annotations[0].get(), r#"{"_kind":"Custom","x":[1, 2]}"#);
        let probe: KindProbe = serde_json::from_str(annotations[0].get()).unwrap();
        assert_eq!(probe.kind.as_deref(), Some("Custom"));
    }

    #[test]
    fn test_descriptor_out_skips_empty_parts() {
        let out = TypeDescriptorOut::<u8> {
            kind: "Empty",
            fields: Vec::new(),
            annotations: Vec::new(),
        };
        assert_eq!(serde_json::to_string(&out).unwrap(), r#"{"kind":"Empty"}"#);
    }
}
