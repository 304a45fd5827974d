// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! JSON codec.
//!
//! - `field` - one value of one field kind
//! - [`record`] - whole records, keys and record arrays
//! - [`schema`] - record types as descriptors
//! - [`type_set`] - closed sets of types
//! - [`change_log`] - create/update/delete batches with deferred references
//! - [`date_format`] - date and date-time patterns

pub mod change_log;
mod context;
pub mod date_format;
mod field;
pub mod record;
pub mod schema;
pub mod type_set;

pub use change_log::{
    decode_change_log, encode_change_set, read_change_log, write_change_set, PendingChangeSet,
};
pub use record::{normalize, RecordArrayWriter, RecordCodec, KIND};
pub use schema::{decode_type, encode_type, read_type, write_type};
pub use type_set::{
    decode_type_set, decode_type_set_all, encode_type_set, export, read_type_set, write_type_set,
    TypeLoader,
};
