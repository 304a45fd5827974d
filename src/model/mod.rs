// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Record instances, keys and change sets.

pub mod change_set;
pub mod record;

pub use change_set::{ChangeEntry, ChangeSet, ChangeSetVisitor, ChangeSource, ChangeState, Side};
pub use record::{FieldValues, Key, Record};
