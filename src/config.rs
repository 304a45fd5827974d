// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Codec options.
//!
//! Options can be built in code or loaded from TOML:
//!
//! ```toml
//! ignore_unknown_annotations = true
//! sort_annotations = false
//! pretty = false
//! ```

use serde::{Deserialize, Serialize};

use crate::core::{CodecError, Result};

/// Options shared by every codec operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecOptions {
    /// Keep annotations of unknown types as `unknownAnnotation` records
    /// instead of failing the schema decode.
    pub ignore_unknown_annotations: bool,
    /// Write annotations ordered by type name.
    pub sort_annotations: bool,
    /// Indent written JSON.
    pub pretty: bool,
}

impl CodecOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| CodecError::format("codec options", e.to_string()))
    }

    pub fn with_ignore_unknown_annotations(mut self, ignore: bool) -> Self {
        self.ignore_unknown_annotations = ignore;
        self
    }

    pub fn with_sort_annotations(mut self, sort: bool) -> Self {
        self.sort_annotations = sort;
        self
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}
