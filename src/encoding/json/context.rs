// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Per-call state shared by the serde adapters of this module.
//!
//! serde only lets visitors fail with a message. Typed failures are parked
//! in an [`ErrorSlot`] and picked up again once serde has unwound, so the
//! caller sees the original [`CodecError`] variant.

use std::cell::RefCell;
use std::fmt;
use std::io;

use serde::de::{self, DeserializeSeed, MapAccess, Visitor};
use serde::{ser, Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;

use crate::config::CodecOptions;
use crate::core::{CodecError, Result, TypeResolver};
use crate::schema::TypePool;

/// First typed error raised inside serde callbacks.
#[derive(Debug, Default)]
pub(crate) struct ErrorSlot(RefCell<Option<CodecError>>);

impl ErrorSlot {
    fn stash(&self, err: CodecError) -> String {
        let message = err.to_string();
        let mut slot = self.0.borrow_mut();
        if slot.is_none() {
            *slot = Some(err);
        }
        message
    }

    /// Park `err` and hand serde a message-only copy.
    pub fn de<E: de::Error>(&self, err: CodecError) -> E {
        E::custom(self.stash(err))
    }

    pub fn ser<E: ser::Error>(&self, err: CodecError) -> E {
        E::custom(self.stash(err))
    }

    /// Turn the outcome of a serde call into a codec result.
    pub fn finish<T>(&self, result: std::result::Result<T, serde_json::Error>) -> Result<T> {
        result.map_err(|e| self.0.borrow_mut().take().unwrap_or_else(|| e.into()))
    }
}

/// State of one encode call.
pub(crate) struct EncodeContext<'a> {
    pub pool: &'a TypePool,
    pub options: &'a CodecOptions,
    pub errors: ErrorSlot,
}

impl<'a> EncodeContext<'a> {
    pub fn new(pool: &'a TypePool, options: &'a CodecOptions) -> Self {
        Self {
            pool,
            options,
            errors: ErrorSlot::default(),
        }
    }

    /// Serialize `value` into `writer`, compact or pretty per options.
    pub fn write<W: io::Write, T: Serialize + ?Sized>(&self, writer: W, value: &T) -> Result<()> {
        let result = if self.options.pretty {
            value.serialize(&mut serde_json::Serializer::pretty(writer))
        } else {
            value.serialize(&mut serde_json::Serializer::new(writer))
        };
        self.errors.finish(result)
    }

    pub fn to_string<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        let mut buf = Vec::with_capacity(128);
        self.write(&mut buf, value)?;
        String::from_utf8(buf).map_err(|e| CodecError::format("json", e.to_string()))
    }
}

/// State of one decode call.
pub(crate) struct DecodeContext<'a> {
    pub pool: &'a TypePool,
    pub resolver: &'a dyn TypeResolver,
    pub errors: ErrorSlot,
}

impl<'a> DecodeContext<'a> {
    pub fn new(pool: &'a TypePool, resolver: &'a dyn TypeResolver) -> Self {
        Self {
            pool,
            resolver,
            errors: ErrorSlot::default(),
        }
    }

    /// Run `seed` over the whole of `json`, rejecting trailing content.
    pub fn decode<'de, S: DeserializeSeed<'de>>(&self, json: &'de str, seed: S) -> Result<S::Value> {
        self.errors.finish(decode_str(json, seed))
    }
}

pub(crate) fn decode_str<'de, S: DeserializeSeed<'de>>(
    json: &'de str,
    seed: S,
) -> std::result::Result<S::Value, serde_json::Error> {
    let mut de = serde_json::Deserializer::from_str(json);
    let value = seed.deserialize(&mut de)?;
    de.end()?;
    Ok(value)
}

pub(crate) fn read_to_string<R: io::Read>(mut reader: R) -> Result<String> {
    let mut json = String::new();
    reader.read_to_string(&mut json)?;
    Ok(json)
}

/// Wrap text that must be written verbatim.
pub(crate) fn raw_json(text: String) -> std::result::Result<Box<RawValue>, String> {
    RawValue::from_string(text).map_err(|e| format!("invalid JSON content: {e}"))
}

/// Re-serialize a JSON document compactly, keeping property order.
///
/// Number tokens are copied as written so arbitrary-precision values
/// survive.
pub(crate) fn canonical_json(text: &str) -> std::result::Result<String, serde_json::Error> {
    let raw: Box<RawValue> = serde_json::from_str(text)?;
    let mut out = String::with_capacity(text.len());
    write_canonical(&raw, &mut out)?;
    Ok(out)
}

fn write_canonical(raw: &RawValue, out: &mut String) -> std::result::Result<(), serde_json::Error> {
    let text = raw.get().trim();
    match text.as_bytes().first() {
        Some(b'{') => {
            let object: RawObject = serde_json::from_str(text)?;
            out.push('{');
            for (i, (name, value)) in object.0.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(name)?);
                out.push(':');
                write_canonical(value, out)?;
            }
            out.push('}');
        }
        Some(b'[') => {
            let items: Vec<Box<RawValue>> = serde_json::from_str(text)?;
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        Some(b'"') => {
            let s: String = serde_json::from_str(text)?;
            out.push_str(&serde_json::to_string(&s)?);
        }
        _ => out.push_str(text),
    }
    Ok(())
}

/// Object properties in stream order, values left as raw JSON.
#[derive(Debug, Default)]
pub(crate) struct RawObject(pub Vec<(String, Box<RawValue>)>);

impl<'de> Deserialize<'de> for RawObject {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct ObjectVisitor;

        impl<'de> Visitor<'de> for ObjectVisitor {
            type Value = RawObject;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<RawObject, A::Error> {
                let mut properties = Vec::new();
                while let Some(name) = map.next_key::<String>()? {
                    properties.push((name, map.next_value::<Box<RawValue>>()?));
                }
                Ok(RawObject(properties))
            }
        }

        deserializer.deserialize_map(ObjectVisitor)
    }
}
