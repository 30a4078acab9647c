//! Canonical feature catalogue model.
//!
//! Both extractors emit this structure and every renderer consumes it. Use
//! `CatalogueBuilder` to construct one, `CatalogueIndex` to load a validated
//! JSON cache, and `CatalogueRepository` to hold the OGC and XMI catalogues
//! next to each other.

pub mod identity;
pub mod index;
pub mod model;
pub mod repository;

pub use identity::{AssociationKind, CatalogueSource, Multiplicity, UpperBound};
pub use index::CatalogueIndex;
pub use model::{
    Association, Attribute, Catalogue, CatalogueBuilder, Extraction, FeatureType, ListedValue,
};
pub use repository::CatalogueRepository;
