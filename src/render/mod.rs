//! Catalogue renderers and artefact writing.
//!
//! The three renderers are pure functions of a `Catalogue`; only
//! [`write_artefacts`] touches the filesystem.

pub mod json;
pub mod markdown;
pub mod plantuml;

pub use json::{parse_catalogue, render_json};
pub use markdown::{MarkdownOptions, render_markdown, render_markdown_with};
pub use plantuml::{PlantUmlOptions, render_plantuml, render_plantuml_with};

use crate::atomic_write;
use crate::catalogue::Catalogue;
use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Clone, Debug, Default)]
pub struct RenderOptions {
    pub markdown: MarkdownOptions,
    pub plantuml: PlantUmlOptions,
}

/// Files produced for one catalogue. Markdown and PlantUML are absent when
/// the catalogue is empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtefactPaths {
    pub json: PathBuf,
    pub markdown: Option<PathBuf>,
    pub plantuml: Option<PathBuf>,
}

/// Write `<stem>.json`, `<stem>.md` and `<stem>.puml` under `dir`.
pub fn write_artefacts(
    catalogue: &Catalogue,
    dir: &Path,
    stem: &str,
    options: &RenderOptions,
) -> Result<ArtefactPaths> {
    let json_path = dir.join(format!("{stem}.json"));
    atomic_write(&json_path, &render_json(catalogue)?)?;

    let mut paths = ArtefactPaths {
        json: json_path,
        markdown: None,
        plantuml: None,
    };
    if catalogue.is_empty() {
        info!(
            source = catalogue.source().as_str(),
            "catalogue is empty; skipping markdown and plantuml artefacts"
        );
        return Ok(paths);
    }

    let md_path = dir.join(format!("{stem}.md"));
    atomic_write(&md_path, &render_markdown_with(catalogue, &options.markdown))?;
    paths.markdown = Some(md_path);

    let puml_path = dir.join(format!("{stem}.puml"));
    atomic_write(&puml_path, &render_plantuml_with(catalogue, &options.plantuml))?;
    paths.plantuml = Some(puml_path);

    debug!(?paths, "wrote catalogue artefacts");
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::{CatalogueBuilder, CatalogueSource, FeatureType};
    use tempfile::TempDir;

    #[test]
    fn empty_catalogue_writes_only_json() {
        let dir = TempDir::new().unwrap();
        let paths = write_artefacts(
            &Catalogue::empty(CatalogueSource::Ogc),
            dir.path(),
            "demo_feature_types",
            &RenderOptions::default(),
        )
        .unwrap();
        assert_eq!(std::fs::read_to_string(&paths.json).unwrap(), "[]\n");
        assert!(paths.markdown.is_none());
        assert!(!dir.path().join("demo_feature_types.md").exists());
    }

    #[test]
    fn non_empty_catalogue_writes_all_three() {
        let dir = TempDir::new().unwrap();
        let mut builder = CatalogueBuilder::new(CatalogueSource::Ogc, "test");
        builder.push_feature_type(FeatureType::new("roads"));
        let paths = write_artefacts(
            &builder.finish().catalogue,
            &dir.path().join("nested"),
            "demo",
            &RenderOptions::default(),
        )
        .unwrap();
        let md = std::fs::read_to_string(paths.markdown.unwrap()).unwrap();
        assert!(md.starts_with("#### roads"));
        let puml = std::fs::read_to_string(paths.plantuml.unwrap()).unwrap();
        assert!(puml.contains("class roads {"));
    }
}
