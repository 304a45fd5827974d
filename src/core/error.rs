// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core error types for recordcodec.
//!
//! Every public operation fails fast with a [`CodecError`]; no partial
//! results are returned. The variants map onto the failure classes of the
//! codec:
//! - malformed input or an unexpected shape ([`CodecError::Format`])
//! - an invalid type descriptor ([`CodecError::SchemaDefinition`])
//! - a union value naming none of its candidates ([`CodecError::SchemaMismatch`])
//! - unresolvable type names and record references
//! - failures of the underlying stream ([`CodecError::Io`])

use thiserror::Error;

/// Errors raised while encoding or decoding records, schemas and change logs.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Malformed stream, wrong JSON shape, unknown state or field name.
    #[error("Format error in {context}: {message}")]
    Format {
        /// Where the failure occurred, `Type.field` for field values
        context: String,
        /// Error message
        message: String,
    },

    /// A type descriptor could not be turned into a type.
    #[error("Invalid schema definition '{type_name}': {reason}")]
    SchemaDefinition {
        /// Name of the type being defined
        type_name: String,
        /// Validation error message
        reason: String,
    },

    /// A union value carried none of the declared candidate types.
    #[error("No candidate of field '{field}' found (expected one of: {})", .candidates.join(", "))]
    SchemaMismatch {
        /// `Type.field` of the union field
        field: String,
        /// Declared candidate type names
        candidates: Vec<String>,
    },

    /// A type name could not be resolved.
    #[error("Type not found: '{type_name}'")]
    TypeNotFound {
        /// Type name that was not found
        type_name: String,
    },

    /// A referenced record could not be supplied by the accessor.
    #[error("Referenced record not found: {key}")]
    ReferenceNotFound {
        /// Rendered key of the missing record
        key: String,
    },

    /// Underlying reader or writer failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    /// Create a format error.
    pub fn format(context: impl Into<String>, message: impl Into<String>) -> Self {
        CodecError::Format {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create a schema definition error.
    pub fn schema_definition(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        CodecError::SchemaDefinition {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    /// Create a union mismatch error.
    pub fn schema_mismatch(field: impl Into<String>, candidates: Vec<String>) -> Self {
        CodecError::SchemaMismatch {
            field: field.into(),
            candidates,
        }
    }

    /// Create a "type not found" error.
    pub fn type_not_found(type_name: impl Into<String>) -> Self {
        CodecError::TypeNotFound {
            type_name: type_name.into(),
        }
    }

    /// Create a "reference not found" error.
    pub fn reference_not_found(key: impl Into<String>) -> Self {
        CodecError::ReferenceNotFound { key: key.into() }
    }

    /// Get structured fields for logging.
    pub fn log_fields(&self) -> Vec<(&'static str, String)> {
        match self {
            CodecError::Format { context, message } => {
                vec![("context", context.clone()), ("message", message.clone())]
            }
            CodecError::SchemaDefinition { type_name, reason } => {
                vec![("type", type_name.clone()), ("reason", reason.clone())]
            }
            CodecError::SchemaMismatch { field, candidates } => {
                vec![("field", field.clone()), ("candidates", candidates.join(","))]
            }
            CodecError::TypeNotFound { type_name } => vec![("type", type_name.clone())],
            CodecError::ReferenceNotFound { key } => vec![("key", key.clone())],
            CodecError::Io(err) => vec![("io", err.to_string())],
        }
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            CodecError::Io(err.into())
        } else {
            CodecError::Format {
                context: format!("line {} column {}", err.line(), err.column()),
                message: err.to_string(),
            }
        }
    }
}

/// Result type for recordcodec operations.
pub type Result<T> = std::result::Result<T, CodecError>;
