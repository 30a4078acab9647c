//! Structured diagnostics collected while extracting and assembling.
//!
//! Extraction never aborts on a single bad collection or classifier; the
//! problem is recorded here instead so downstream tooling can decide whether
//! degraded output is acceptable. Every recorded entry is mirrored to
//! `tracing` at the matching level.

use crate::error::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// What went wrong, independent of the human-readable message.
///
/// `Other` keeps diagnostics files written by newer builds readable.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DiagnosticKind {
    SourceUnavailable,
    MalformedSource,
    UnresolvedReference,
    DuplicateName,
    InvalidMultiplicity,
    DroppedAssociation,
    SkippedInclude,
    UnboundPlaceholder,
    Other(String),
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub source: String,
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
}

/// Ordered accumulator; insertion order is report order.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Info => info!(
                source = %diagnostic.source,
                kind = diagnostic.kind.as_str(),
                "{}",
                diagnostic.message
            ),
            Severity::Warning | Severity::Error => warn!(
                source = %diagnostic.source,
                kind = diagnostic.kind.as_str(),
                severity = ?diagnostic.severity,
                "{}",
                diagnostic.message
            ),
        }
        self.0.push(diagnostic);
    }

    pub fn record(
        &mut self,
        source: impl Into<String>,
        severity: Severity,
        kind: DiagnosticKind,
        message: impl Into<String>,
    ) {
        self.push(Diagnostic {
            source: source.into(),
            severity,
            kind,
            message: message.into(),
        });
    }

    pub fn warn(&mut self, source: impl Into<String>, kind: DiagnosticKind, message: impl Into<String>) {
        self.record(source, Severity::Warning, kind, message);
    }

    /// Record a recovered library error under its taxonomy kind.
    pub fn record_error(&mut self, source: impl Into<String>, err: &Error) {
        self.record(source, Severity::Error, DiagnosticKind::from(err), err.to_string());
    }

    /// Like [`Diagnostics::record_error`] for errors whose field degraded to
    /// a placeholder value.
    pub fn warn_error(&mut self, source: impl Into<String>, err: &Error) {
        self.record(source, Severity::Warning, DiagnosticKind::from(err), err.to_string());
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn of_kind<'a>(&'a self, kind: &'a DiagnosticKind) -> impl Iterator<Item = &'a Diagnostic> {
        self.0.iter().filter(move |d| &d.kind == kind)
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<&Error> for DiagnosticKind {
    fn from(err: &Error) -> Self {
        match err {
            Error::SourceUnavailable { .. } => DiagnosticKind::SourceUnavailable,
            Error::MalformedSource { .. } | Error::Json(_) => DiagnosticKind::MalformedSource,
            Error::UnresolvedReference { .. } => DiagnosticKind::UnresolvedReference,
            Error::InvalidMultiplicity(_) => DiagnosticKind::InvalidMultiplicity,
            other => DiagnosticKind::Other(other.code().to_ascii_lowercase()),
        }
    }
}

impl Serialize for DiagnosticKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DiagnosticKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(Self::from_str(&value))
    }
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &str {
        match self {
            DiagnosticKind::SourceUnavailable => "source_unavailable",
            DiagnosticKind::MalformedSource => "malformed_source",
            DiagnosticKind::UnresolvedReference => "unresolved_reference",
            DiagnosticKind::DuplicateName => "duplicate_name",
            DiagnosticKind::InvalidMultiplicity => "invalid_multiplicity",
            DiagnosticKind::DroppedAssociation => "dropped_association",
            DiagnosticKind::SkippedInclude => "skipped_include",
            DiagnosticKind::UnboundPlaceholder => "unbound_placeholder",
            DiagnosticKind::Other(value) => value.as_str(),
        }
    }

    fn from_str(value: &str) -> Self {
        match value {
            "source_unavailable" => DiagnosticKind::SourceUnavailable,
            "malformed_source" => DiagnosticKind::MalformedSource,
            "unresolved_reference" => DiagnosticKind::UnresolvedReference,
            "duplicate_name" => DiagnosticKind::DuplicateName,
            "invalid_multiplicity" => DiagnosticKind::InvalidMultiplicity,
            "dropped_association" => DiagnosticKind::DroppedAssociation,
            "skipped_include" => DiagnosticKind::SkippedInclude,
            "unbound_placeholder" => DiagnosticKind::UnboundPlaceholder,
            other => DiagnosticKind::Other(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_known_and_unknown() {
        let json = serde_json::to_string(&DiagnosticKind::DroppedAssociation).unwrap();
        assert_eq!(json, "\"dropped_association\"");
        let back: DiagnosticKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DiagnosticKind::DroppedAssociation);

        let custom: DiagnosticKind = serde_json::from_str("\"rate_limited\"").unwrap();
        assert_eq!(custom, DiagnosticKind::Other("rate_limited".to_string()));
        assert_eq!(serde_json::to_string(&custom).unwrap(), "\"rate_limited\"");
    }

    #[test]
    fn diagnostics_serialize_as_flat_list() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.warn("ogc:roads", DiagnosticKind::MalformedSource, "schema is not JSON");
        diagnostics.record_error(
            "xmi:model.xml",
            &Error::unavailable("model.xml", "No such file"),
        );

        let value = serde_json::to_value(&diagnostics).unwrap();
        let entries = value.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["source"], "ogc:roads");
        assert_eq!(entries[0]["severity"], "warning");
        assert_eq!(entries[1]["kind"], "source_unavailable");
        assert_eq!(entries[1]["severity"], "error");
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn degraded_references_are_warnings() {
        let mut diagnostics = Diagnostics::new();
        let err = Error::UnresolvedReference {
            source_ref: "model.xml".to_string(),
            reference: "EAID_gone".to_string(),
        };
        diagnostics.warn_error("model.xml", &err);
        assert!(!diagnostics.has_errors());
        let found: Vec<_> = diagnostics
            .of_kind(&DiagnosticKind::UnresolvedReference)
            .collect();
        assert_eq!(found.len(), 1);
        assert!(found[0].message.contains("EAID_gone"));
    }
}
