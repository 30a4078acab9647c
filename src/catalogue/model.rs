//! Canonical feature catalogue shared by both extractors and all renderers.
//!
//! A [`Catalogue`] is built once through [`CatalogueBuilder`], which enforces
//! the naming and reference invariants, and is read-only afterwards. The JSON
//! artefact written by `render::json` is its durable form.

use crate::catalogue::identity::{AssociationKind, CatalogueSource, Multiplicity};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
/// One permitted value of a code list or enumeration.
pub struct ListedValue {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl ListedValue {
    /// A label equal to the value carries nothing and is dropped.
    pub fn new(value: impl Into<String>, label: Option<String>) -> Self {
        let value = value.into();
        let label = normalize_text(label).filter(|label| *label != value);
        Self { value, label }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
/// One property of a feature type.
pub struct Attribute {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub multiplicity: Multiplicity,
    pub description: Option<String>,
    /// Value domain when the type is a code list or enumeration.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<ListedValue>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            multiplicity: Multiplicity::default(),
            description: None,
            values: Vec::new(),
        }
    }

    pub fn with_values(mut self, values: Vec<ListedValue>) -> Self {
        self.values = values;
        self
    }

    pub fn with_multiplicity(mut self, multiplicity: Multiplicity) -> Self {
        self.multiplicity = multiplicity;
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = normalize_text(description);
        self
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
/// A geospatial feature class with its attributes in declaration order.
pub struct FeatureType {
    pub name: String,
    pub description: Option<String>,
    pub stereotype: Option<String>,
    pub is_abstract: bool,
    pub attributes: Vec<Attribute>,
}

impl FeatureType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            stereotype: None,
            is_abstract: false,
            attributes: Vec::new(),
        }
    }

    pub fn with_abstract(mut self, is_abstract: bool) -> Self {
        self.is_abstract = is_abstract;
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = normalize_text(description);
        self
    }

    pub fn with_stereotype(mut self, stereotype: Option<String>) -> Self {
        self.stereotype = normalize_text(stereotype);
        self
    }

    /// Append an attribute; a repeated name replaces the earlier entry in
    /// place so the first declaration keeps its position.
    pub fn push_attribute(&mut self, attribute: Attribute) {
        match self
            .attributes
            .iter_mut()
            .find(|existing| existing.name == attribute.name)
        {
            Some(existing) => *existing = attribute,
            None => self.attributes.push(attribute),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|attr| attr.name == name)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
/// Typed relationship between two feature types of the same catalogue.
///
/// For generalizations `source` is the specialised type and `target` its
/// parent.
pub struct Association {
    pub source: String,
    pub target: String,
    pub source_multiplicity: Multiplicity,
    pub target_multiplicity: Multiplicity,
    pub kind: AssociationKind,
    pub role_name: Option<String>,
}

impl Association {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: AssociationKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            source_multiplicity: Multiplicity::default(),
            target_multiplicity: Multiplicity::default(),
            kind,
            role_name: None,
        }
    }

    pub fn generalization(child: impl Into<String>, parent: impl Into<String>) -> Self {
        Self::new(child, parent, AssociationKind::Generalization)
    }

    pub fn with_multiplicities(mut self, source: Multiplicity, target: Multiplicity) -> Self {
        self.source_multiplicity = source;
        self.target_multiplicity = target;
        self
    }

    pub fn with_role(mut self, role_name: Option<String>) -> Self {
        self.role_name = normalize_text(role_name);
        self
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
/// Ordered, name-unique collection of feature types from one source.
pub struct Catalogue {
    source: CatalogueSource,
    feature_types: Vec<FeatureType>,
    associations: Vec<Association>,
}

impl Catalogue {
    pub fn empty(source: CatalogueSource) -> Self {
        Self {
            source,
            feature_types: Vec::new(),
            associations: Vec::new(),
        }
    }

    pub fn source(&self) -> CatalogueSource {
        self.source
    }

    pub fn feature_types(&self) -> &[FeatureType] {
        &self.feature_types
    }

    /// Associations grouped by source feature type in catalogue order.
    pub fn associations(&self) -> &[Association] {
        &self.associations
    }

    pub fn is_empty(&self) -> bool {
        self.feature_types.is_empty()
    }

    pub fn len(&self) -> usize {
        self.feature_types.len()
    }

    pub fn feature_type(&self, name: &str) -> Option<&FeatureType> {
        self.feature_types.iter().find(|ft| ft.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.feature_type(name).is_some()
    }

    /// Associations whose source is the named feature type.
    pub fn associations_from<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Association> {
        self.associations.iter().filter(move |assoc| assoc.source == name)
    }
}

/// Incremental constructor that enforces the catalogue invariants.
///
/// Violations are never fatal: duplicates and dangling associations are
/// dropped and reported through the accumulated diagnostics.
pub struct CatalogueBuilder {
    source: CatalogueSource,
    origin: String,
    feature_types: Vec<FeatureType>,
    positions: BTreeMap<String, usize>,
    associations: Vec<Association>,
    diagnostics: Diagnostics,
}

impl CatalogueBuilder {
    /// `origin` labels diagnostics (an endpoint URL or document path).
    pub fn new(source: CatalogueSource, origin: impl Into<String>) -> Self {
        Self {
            source,
            origin: origin.into(),
            feature_types: Vec::new(),
            positions: BTreeMap::new(),
            associations: Vec::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    /// Add a feature type. Returns false when the name was already taken.
    pub fn push_feature_type(&mut self, feature_type: FeatureType) -> bool {
        let name = feature_type.name.trim().to_string();
        if name.is_empty() {
            self.diagnostics.warn(
                self.origin.clone(),
                DiagnosticKind::MalformedSource,
                "skipping feature type without a name",
            );
            return false;
        }
        if self.positions.contains_key(&name) {
            self.diagnostics.warn(
                self.origin.clone(),
                DiagnosticKind::DuplicateName,
                format!("feature type '{name}' declared more than once; keeping the first"),
            );
            return false;
        }

        let mut normalized = FeatureType::new(name.clone())
            .with_description(feature_type.description)
            .with_stereotype(feature_type.stereotype)
            .with_abstract(feature_type.is_abstract);
        for attribute in feature_type.attributes {
            if attribute.name.trim().is_empty() {
                continue;
            }
            normalized.push_attribute(attribute);
        }

        self.positions.insert(name, self.feature_types.len());
        self.feature_types.push(normalized);
        true
    }

    pub fn push_association(&mut self, association: Association) {
        self.associations.push(association);
    }

    /// Drop dangling associations, order the rest by source position and
    /// seal the catalogue.
    pub fn finish(self) -> Extraction {
        let CatalogueBuilder {
            source,
            origin,
            feature_types,
            positions,
            associations,
            mut diagnostics,
        } = self;

        let mut kept: Vec<(usize, Association)> = Vec::with_capacity(associations.len());
        for association in associations {
            let missing = [&association.source, &association.target]
                .into_iter()
                .find(|name| !positions.contains_key(name.as_str()))
                .cloned();
            if let Some(name) = missing {
                diagnostics.warn(
                    origin.clone(),
                    DiagnosticKind::DroppedAssociation,
                    format!(
                        "dropping {} {} -> {}: '{}' is not a feature type in this catalogue",
                        association.kind.as_str(),
                        association.source,
                        association.target,
                        name
                    ),
                );
                continue;
            }
            let position = positions[association.source.as_str()];
            kept.push((position, association));
        }
        // Stable: source order survives within each group.
        kept.sort_by_key(|(position, _)| *position);

        Extraction {
            catalogue: Catalogue {
                source,
                feature_types,
                associations: kept.into_iter().map(|(_, assoc)| assoc).collect(),
            },
            diagnostics,
        }
    }
}

#[derive(Clone, Debug)]
/// A catalogue plus everything that went wrong while producing it.
pub struct Extraction {
    pub catalogue: Catalogue,
    pub diagnostics: Diagnostics,
}

impl Extraction {
    /// Empty catalogue carrying the error that prevented extraction.
    pub fn failed(source: CatalogueSource, origin: &str, err: &Error) -> Self {
        let mut diagnostics = Diagnostics::new();
        diagnostics.record_error(origin, err);
        Self {
            catalogue: Catalogue::empty(source),
            diagnostics,
        }
    }
}

fn normalize_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> CatalogueBuilder {
        CatalogueBuilder::new(CatalogueSource::Xmi, "model.xml")
    }

    #[test]
    fn duplicate_feature_type_keeps_first() {
        let mut builder = builder();
        assert!(builder.push_feature_type(
            FeatureType::new("Road").with_description(Some("first".into()))
        ));
        assert!(!builder.push_feature_type(
            FeatureType::new("Road").with_description(Some("second".into()))
        ));
        let extraction = builder.finish();
        assert_eq!(extraction.catalogue.len(), 1);
        assert_eq!(
            extraction.catalogue.feature_types()[0].description.as_deref(),
            Some("first")
        );
        assert_eq!(
            extraction
                .diagnostics
                .of_kind(&DiagnosticKind::DuplicateName)
                .count(),
            1
        );
    }

    #[test]
    fn duplicate_attribute_replaces_in_place() {
        let mut ft = FeatureType::new("Road");
        ft.push_attribute(Attribute::new("name", "string"));
        ft.push_attribute(Attribute::new("width", "number"));
        ft.push_attribute(Attribute::new("name", "CharacterString"));
        let names: Vec<_> = ft.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["name", "width"]);
        assert_eq!(ft.attribute("name").unwrap().type_name, "CharacterString");
    }

    #[test]
    fn dangling_associations_are_dropped_and_reported() {
        let mut builder = builder();
        builder.push_feature_type(FeatureType::new("Road"));
        builder.push_feature_type(FeatureType::new("Bridge"));
        builder.push_association(Association::new("Road", "Bridge", AssociationKind::Association));
        builder.push_association(Association::new("Road", "Ghost", AssociationKind::Aggregation));
        let extraction = builder.finish();
        assert_eq!(extraction.catalogue.associations().len(), 1);
        assert_eq!(
            extraction
                .diagnostics
                .of_kind(&DiagnosticKind::DroppedAssociation)
                .count(),
            1
        );
    }

    #[test]
    fn associations_grouped_by_source_position() {
        let mut builder = builder();
        builder.push_feature_type(FeatureType::new("A"));
        builder.push_feature_type(FeatureType::new("B"));
        builder.push_association(Association::generalization("B", "A"));
        builder.push_association(Association::new("A", "B", AssociationKind::Composition));
        builder.push_association(Association::new("B", "A", AssociationKind::Association));
        let catalogue = builder.finish().catalogue;
        let order: Vec<_> = catalogue
            .associations()
            .iter()
            .map(|a| (a.source.as_str(), a.kind))
            .collect();
        assert_eq!(
            order,
            vec![
                ("A", AssociationKind::Composition),
                ("B", AssociationKind::Generalization),
                ("B", AssociationKind::Association),
            ]
        );
    }

    #[test]
    fn builder_keeps_abstract_flag_and_value_domains() {
        let mut builder = builder();
        let mut ft = FeatureType::new("Vegobjekt").with_abstract(true);
        ft.push_attribute(Attribute::new("status", "Status").with_values(vec![
            ListedValue::new("P", Some("Planlagt".into())),
            ListedValue::new("E", Some("E".into())),
        ]));
        builder.push_feature_type(ft);
        let catalogue = builder.finish().catalogue;
        let kept = &catalogue.feature_types()[0];
        assert!(kept.is_abstract);
        let values = &kept.attribute("status").unwrap().values;
        assert_eq!(values[0].label.as_deref(), Some("Planlagt"));
        assert_eq!(values[1].label, None);
    }

    #[test]
    fn blank_descriptions_become_absent() {
        let ft = FeatureType::new("Road").with_description(Some("   ".into()));
        assert!(ft.description.is_none());
    }
}
