// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Wire encodings.
//!
//! - [`json`] - the JSON codec for records, schemas and change logs

pub mod json;

pub use json::{RecordCodec, TypeLoader};
