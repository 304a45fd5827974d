// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Runtime type model.
//!
//! This module provides:
//! - [`TypePool`] - arena of record types addressed by [`TypeId`]
//! - [`RecordType`], [`Field`], [`FieldKind`] - type definitions
//! - [`builtin_types`] - annotation types present in every pool
//! - `descriptor` - wire form of type definitions

pub mod ast;
pub mod builtin_types;
pub(crate) mod descriptor;
pub mod pool;

pub use ast::{Field, FieldKind, KindTag, RecordType, TypeId};
pub use pool::{TypeBuilder, TypePool};
