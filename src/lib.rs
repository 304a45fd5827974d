// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # recordcodec
//!
//! JSON codec for runtime-described records.
//!
//! Types are plain data held in a [`TypePool`](schema::TypePool): named
//! record types with ordered, kinded fields, key fields and annotations.
//! Records of those types are written to and read from JSON, and so are the
//! types themselves and change logs describing edits to records.
//!
//! ## Architecture
//!
//! - `core/` - errors, values and the resolver/accessor seams
//! - `schema/` - the type model and the builtin annotation types
//! - `model/` - records, keys and change sets
//! - `encoding/json/` - field, record, schema, type-set and change-log codecs
//! - `config` - codec options
//!
//! ## Example: Records
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use recordcodec::core::PoolTypes;
//! use recordcodec::encoding::json::RecordCodec;
//! use recordcodec::model::Record;
//! use recordcodec::schema::{FieldKind, TypeBuilder, TypePool};
//!
//! let mut pool = TypePool::new();
//! let person = pool.add(
//!     TypeBuilder::new("Person")
//!         .key_field("id", FieldKind::Integer)
//!         .field("name", FieldKind::String),
//! )?;
//!
//! let ada = Record::new(&pool, person)
//!     .with(&pool, "id", 1)?
//!     .with(&pool, "name", "Ada")?;
//!
//! let codec = RecordCodec::new(&pool);
//! let json = codec.encode(&ada, true)?;
//! assert_eq!(json, r#"{"_kind":"Person","id":1,"name":"Ada"}"#);
//! assert_eq!(codec.decode_with_kind(&json, &PoolTypes)?, ada);
//! # Ok(())
//! # }
//! ```
//!
//! ## Example: Exchanging Types
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use recordcodec::config::CodecOptions;
//! use recordcodec::core::PoolTypes;
//! use recordcodec::encoding::json::{decode_type_set, encode_type_set};
//! use recordcodec::schema::{FieldKind, TypeBuilder, TypePool};
//!
//! let mut pool = TypePool::new();
//! let node = pool.declare("Node")?;
//! pool.add(TypeBuilder::new("Node").field("children", FieldKind::RecordArray(node)))?;
//! let json = encode_type_set(&pool, node, &CodecOptions::default())?;
//!
//! let mut other = TypePool::new();
//! let copy = decode_type_set(&mut other, &json, &PoolTypes, &CodecOptions::default())?;
//! assert_eq!(other.get(copy).fields()[0].kind(), &FieldKind::RecordArray(copy));
//! # Ok(())
//! # }
//! ```

// Core types
pub mod core;

pub use crate::core::{CodecError, Result, Value};

// Options
pub mod config;

pub use config::CodecOptions;

// Type model
pub mod schema;

// Records and change sets
pub mod model;

// Wire encodings
pub mod encoding;
