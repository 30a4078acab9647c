//! Indexed view of a JSON catalogue cache.
//!
//! The index validates the cache against `schema/feature_catalogue.schema.json`
//! before parsing and is strict about duplicates and dangling associations, so
//! a re-run never renders from a cache the extractor could not have written.

use crate::catalogue::identity::CatalogueSource;
use crate::catalogue::model::{Catalogue, FeatureType};
use crate::diagnostics::DiagnosticKind;
use crate::render::json::parse_catalogue_value;
use crate::schema_loader::{
    SchemaLoadOptions, load_json_schema, resolve_catalogue_schema_path, validate_value,
};
use anyhow::{Context, Result, bail};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(Debug)]
/// Catalogue plus a derived index keyed by feature type name.
pub struct CatalogueIndex {
    catalogue: Catalogue,
    by_name: BTreeMap<String, usize>,
}

impl CatalogueIndex {
    /// Load and validate a cache from disk.
    pub fn load(path: &Path, source: CatalogueSource) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("opening cache {}", path.display()))?;
        let value: Value = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing cache {}", path.display()))?;

        let schema_path = resolve_catalogue_schema_path(path);
        let schema = load_json_schema(&schema_path, SchemaLoadOptions::default())
            .with_context(|| format!("loading catalogue schema {}", schema_path.display()))?;
        validate_value(&schema, &value, &format!("catalogue cache {}", path.display()))?;

        Self::from_value(value, source, &path.display().to_string())
    }

    /// Build from an already-parsed cache value without schema validation.
    pub fn from_value(value: Value, source: CatalogueSource, origin: &str) -> Result<Self> {
        let extraction = parse_catalogue_value(value, source, origin)
            .with_context(|| format!("decoding catalogue {origin}"))?;

        let strict = [DiagnosticKind::DuplicateName, DiagnosticKind::DroppedAssociation];
        if let Some(problem) = extraction
            .diagnostics
            .iter()
            .find(|diag| strict.contains(&diag.kind))
        {
            bail!("catalogue {origin} is inconsistent: {}", problem.message);
        }

        let by_name = build_index(&extraction.catalogue);
        Ok(Self {
            catalogue: extraction.catalogue,
            by_name,
        })
    }

    pub fn feature_type(&self, name: &str) -> Option<&FeatureType> {
        self.by_name
            .get(name)
            .and_then(|idx| self.catalogue.feature_types().get(*idx))
    }

    /// Iterates feature type names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    pub fn catalogue(&self) -> &Catalogue {
        &self.catalogue
    }

    pub fn into_catalogue(self) -> Catalogue {
        self.catalogue
    }
}

fn build_index(catalogue: &Catalogue) -> BTreeMap<String, usize> {
    catalogue
        .feature_types()
        .iter()
        .enumerate()
        .map(|(idx, ft)| (ft.name.clone(), idx))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_duplicate_names() {
        let value = json!([
            {"name": "roads", "description": null, "attributes": []},
            {"name": "roads", "description": null, "attributes": []}
        ]);
        let err = CatalogueIndex::from_value(value, CatalogueSource::Ogc, "cache.json").unwrap_err();
        assert!(err.to_string().contains("inconsistent"));
    }

    #[test]
    fn looks_up_by_name() {
        let value = json!([
            {"name": "roads", "description": "Road network", "attributes": []},
            {"name": "buildings", "description": null, "attributes": []}
        ]);
        let index = CatalogueIndex::from_value(value, CatalogueSource::Ogc, "cache.json").unwrap();
        assert_eq!(
            index.feature_type("roads").unwrap().description.as_deref(),
            Some("Road network")
        );
        assert_eq!(index.names().collect::<Vec<_>>(), vec!["buildings", "roads"]);
        assert_eq!(index.catalogue().feature_types()[0].name, "roads");
    }
}
