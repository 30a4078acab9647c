//! Error taxonomy shared by the extractors, renderers and assembly resolver.
//!
//! Extraction-level variants are normally recovered into diagnostics by the
//! extractor entry points; assembly-level variants reach the caller and abort
//! before any output is written.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("source unavailable: {source_ref}: {reason}")]
    SourceUnavailable { source_ref: String, reason: String },

    #[error("malformed source: {source_ref}: {reason}")]
    MalformedSource { source_ref: String, reason: String },

    #[error("unresolved reference {reference} in {source_ref}")]
    UnresolvedReference {
        source_ref: String,
        reference: String,
    },

    #[error("required placeholder '{placeholder}' is unsatisfied: {detail}")]
    MissingRequiredAssemblyInput { placeholder: String, detail: String },

    #[error("template {path} is unreadable: {reason}")]
    Template { path: PathBuf, reason: String },

    #[error("invalid multiplicity: {0}")]
    InvalidMultiplicity(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn unavailable(source_ref: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            source_ref: source_ref.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn malformed(source_ref: impl Into<String>, reason: impl ToString) -> Self {
        Self::MalformedSource {
            source_ref: source_ref.into(),
            reason: reason.to_string(),
        }
    }

    /// Short machine-readable code, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SourceUnavailable { .. } => "SOURCE_UNAVAILABLE",
            Self::MalformedSource { .. } => "MALFORMED_SOURCE",
            Self::UnresolvedReference { .. } => "UNRESOLVED_REFERENCE",
            Self::MissingRequiredAssemblyInput { .. } => "MISSING_REQUIRED_ASSEMBLY_INPUT",
            Self::Template { .. } => "TEMPLATE_ERROR",
            Self::InvalidMultiplicity(_) => "INVALID_MULTIPLICITY",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
        }
    }
}
