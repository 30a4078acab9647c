//! Holds the OGC-derived and XMI-derived catalogues side by side.
//!
//! Each source owns exactly one slot; registering a second catalogue for the
//! same source replaces the first rather than merging into it.

use crate::catalogue::identity::CatalogueSource;
use crate::catalogue::model::{Catalogue, FeatureType};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
/// In-memory store for catalogues keyed by `CatalogueSource`.
pub struct CatalogueRepository {
    catalogues: BTreeMap<CatalogueSource, Catalogue>,
}

impl CatalogueRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a catalogue, returning the one it displaced.
    pub fn register(&mut self, catalogue: Catalogue) -> Option<Catalogue> {
        self.catalogues.insert(catalogue.source(), catalogue)
    }

    pub fn get(&self, source: CatalogueSource) -> Option<&Catalogue> {
        self.catalogues.get(&source)
    }

    /// Resolve a feature type inside one registered catalogue.
    pub fn find_feature_type(&self, source: CatalogueSource, name: &str) -> Option<&FeatureType> {
        self.get(source)?.feature_type(name)
    }

    /// Registered catalogues in source order (OGC first).
    pub fn iter(&self) -> impl Iterator<Item = &Catalogue> {
        self.catalogues.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::model::CatalogueBuilder;

    fn catalogue(source: CatalogueSource, names: &[&str]) -> Catalogue {
        let mut builder = CatalogueBuilder::new(source, "test");
        for name in names {
            builder.push_feature_type(FeatureType::new(*name));
        }
        builder.finish().catalogue
    }

    #[test]
    fn sources_never_merge() {
        let mut repo = CatalogueRepository::new();
        assert!(repo.register(catalogue(CatalogueSource::Ogc, &["roads"])).is_none());
        assert!(repo.register(catalogue(CatalogueSource::Xmi, &["Veg"])).is_none());

        assert!(repo.find_feature_type(CatalogueSource::Ogc, "roads").is_some());
        assert!(repo.find_feature_type(CatalogueSource::Ogc, "Veg").is_none());
        assert!(repo.find_feature_type(CatalogueSource::Xmi, "Veg").is_some());

        let replaced = repo
            .register(catalogue(CatalogueSource::Ogc, &["buildings"]))
            .unwrap();
        assert!(replaced.contains("roads"));
        let current = repo.get(CatalogueSource::Ogc).unwrap();
        assert!(current.contains("buildings"));
        assert!(!current.contains("roads"));
    }
}
