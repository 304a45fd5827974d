// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core types used throughout recordcodec.
//!
//! This module provides the foundational types for the library:
//! - [`CodecError`] - Error handling
//! - [`Value`] - Field value representation
//! - [`TypeResolver`] / [`RecordAccessor`] - Name and key lookup seams

pub mod error;
pub mod registry;
pub mod value;

pub use error::{CodecError, Result};
pub use registry::{
    BuiltinTypes, Chain, FnResolver, NoTypes, PoolTypes, RecordAccessor, RecordRegistry,
    TypeResolver, TypeSubset,
};
pub use value::{Decimal, Value};
