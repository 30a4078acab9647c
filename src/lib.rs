//! Feature catalogue extraction and rendering.
//!
//! Two extractors (OGC API Features and XMI/UML) normalise their sources into
//! one canonical [`Catalogue`]; the renderers turn a catalogue into a JSON
//! cache, a Markdown table and a PlantUML diagram; the assembly resolver
//! splices those artefacts into a specification template. The binaries in
//! `src/bin` are thin wrappers over these modules.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::Builder;

pub mod assembly;
pub mod catalogue;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod fetch;
pub mod ogc;
pub mod render;
pub mod schema_loader;
pub mod xmi;

pub use assembly::{
    Assembly, AssemblyPlan, Candidate, CatalogueArtefacts, PlaceholderSpec, assemble,
    assemble_to_path,
};
pub use catalogue::{
    Association, AssociationKind, Attribute, Catalogue, CatalogueBuilder, CatalogueIndex,
    CatalogueRepository, CatalogueSource, Extraction, FeatureType, ListedValue, Multiplicity,
    UpperBound,
};
pub use config::PipelineConfig;
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use error::{Error, Result};
pub use fetch::{Credentials, Fetch, FetchedDocument, HttpFetcher};
pub use ogc::OgcExtractor;
pub use render::{ArtefactPaths, RenderOptions, write_artefacts};
pub use xmi::{XmiExtractor, XmiOptions, XmiSource};

/// Write `contents` to `path` through a temporary sibling and a rename, so
/// readers never see a partial artefact.
pub fn atomic_write(path: &Path, contents: &str) -> io::Result<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&parent)?;

    let mut tmp = Builder::new()
        .prefix(".feature-catalogue")
        .tempfile_in(&parent)?;
    tmp.as_file_mut().write_all(contents.as_bytes())?;
    tmp.as_file_mut().sync_all()?;

    tmp.persist(path).map(|_| ()).map_err(|err| err.error)
}

/// Split comma- or whitespace-delimited lists into tokens.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .replace(',', " ")
        .split_whitespace()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse a `NAME=PATH` include mapping.
pub fn parse_include(value: &str) -> Result<(String, PathBuf)> {
    let invalid = |reason: &str| Error::Template {
        path: PathBuf::from(value),
        reason: reason.to_string(),
    };
    let (name, path) = value
        .split_once('=')
        .ok_or_else(|| invalid("expected NAME=PATH"))?;
    let (name, path) = (name.trim(), path.trim());
    if name.is_empty() {
        return Err(invalid("include placeholder name is empty"));
    }
    if path.is_empty() {
        return Err(invalid("include path is empty"));
    }
    Ok((name.to_string(), PathBuf::from(path)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn split_list_accepts_commas_and_spaces() {
        assert_eq!(
            split_list("FeatureType, dataType  CodeList"),
            vec!["FeatureType", "dataType", "CodeList"]
        );
        assert!(split_list(" , ").is_empty());
    }

    #[test]
    fn include_mappings_need_both_halves() {
        let (name, path) = parse_include("incl_scope = docs/scope.md").unwrap();
        assert_eq!(name, "incl_scope");
        assert_eq!(path, PathBuf::from("docs/scope.md"));
        assert!(parse_include("incl_scope").is_err());
        assert!(parse_include("=docs/scope.md").is_err());
    }

    #[test]
    fn atomic_write_creates_parents_and_replaces() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("nested").join("out.md");
        atomic_write(&target, "first").unwrap();
        atomic_write(&target, "second").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "second");
    }
}
