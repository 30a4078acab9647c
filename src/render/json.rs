//! JSON cache codec.
//!
//! The cache is an ordered array of feature type objects. Associations ride
//! along under their source feature type so the array shape is preserved and
//! a render/parse cycle reproduces the catalogue exactly.

use crate::catalogue::{
    Association, AssociationKind, Attribute, Catalogue, CatalogueBuilder, CatalogueSource,
    Extraction, FeatureType, Multiplicity,
};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize)]
struct FeatureTypeRecord<'a> {
    name: &'a str,
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stereotype: Option<&'a str>,
    #[serde(rename = "abstract", skip_serializing_if = "is_false")]
    is_abstract: bool,
    attributes: &'a [Attribute],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    associations: Vec<AssociationRecord<'a>>,
}

#[derive(Serialize)]
struct AssociationRecord<'a> {
    target: &'a str,
    kind: AssociationKind,
    source_multiplicity: Multiplicity,
    target_multiplicity: Multiplicity,
    #[serde(skip_serializing_if = "Option::is_none")]
    role_name: Option<&'a str>,
}

#[derive(Deserialize)]
struct FeatureTypeEntry {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    stereotype: Option<String>,
    #[serde(default, rename = "abstract")]
    is_abstract: bool,
    #[serde(default)]
    attributes: Vec<Attribute>,
    #[serde(default)]
    associations: Vec<AssociationEntry>,
}

#[derive(Deserialize)]
struct AssociationEntry {
    target: String,
    kind: AssociationKind,
    #[serde(default)]
    source_multiplicity: Multiplicity,
    #[serde(default)]
    target_multiplicity: Multiplicity,
    #[serde(default)]
    role_name: Option<String>,
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

/// Serialize a catalogue as pretty-printed JSON with a trailing newline.
pub fn render_json(catalogue: &Catalogue) -> Result<String> {
    let records: Vec<FeatureTypeRecord<'_>> = catalogue
        .feature_types()
        .iter()
        .map(|ft| FeatureTypeRecord {
            name: &ft.name,
            description: ft.description.as_deref(),
            stereotype: ft.stereotype.as_deref(),
            is_abstract: ft.is_abstract,
            attributes: &ft.attributes,
            associations: catalogue
                .associations_from(&ft.name)
                .map(|assoc| AssociationRecord {
                    target: &assoc.target,
                    kind: assoc.kind,
                    source_multiplicity: assoc.source_multiplicity,
                    target_multiplicity: assoc.target_multiplicity,
                    role_name: assoc.role_name.as_deref(),
                })
                .collect(),
        })
        .collect();
    let mut out = serde_json::to_string_pretty(&records)?;
    out.push('\n');
    Ok(out)
}

/// Parse a cache written by [`render_json`].
pub fn parse_catalogue(text: &str, source: CatalogueSource, origin: &str) -> Result<Extraction> {
    let entries: Vec<FeatureTypeEntry> =
        serde_json::from_str(text).map_err(|err| Error::malformed(origin, err))?;
    Ok(build(entries, source, origin))
}

pub fn parse_catalogue_value(value: Value, source: CatalogueSource, origin: &str) -> Result<Extraction> {
    let entries: Vec<FeatureTypeEntry> =
        serde_json::from_value(value).map_err(|err| Error::malformed(origin, err))?;
    Ok(build(entries, source, origin))
}

fn build(entries: Vec<FeatureTypeEntry>, source: CatalogueSource, origin: &str) -> Extraction {
    let mut builder = CatalogueBuilder::new(source, origin);
    let mut associations = Vec::new();
    for entry in entries {
        for assoc in entry.associations {
            associations.push(
                Association::new(entry.name.clone(), assoc.target, assoc.kind)
                    .with_multiplicities(assoc.source_multiplicity, assoc.target_multiplicity)
                    .with_role(assoc.role_name),
            );
        }
        let mut feature_type = FeatureType::new(entry.name)
            .with_description(entry.description)
            .with_stereotype(entry.stereotype)
            .with_abstract(entry.is_abstract);
        feature_type.attributes = entry.attributes;
        builder.push_feature_type(feature_type);
    }
    for association in associations {
        builder.push_association(association);
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::ListedValue;

    #[test]
    fn empty_catalogue_is_an_empty_array() {
        let rendered = render_json(&Catalogue::empty(CatalogueSource::Ogc)).unwrap();
        assert_eq!(rendered, "[]\n");
    }

    #[test]
    fn keys_follow_declaration_order_and_keep_non_ascii() {
        let mut builder = CatalogueBuilder::new(CatalogueSource::Xmi, "test");
        let mut ft = FeatureType::new("Bygning").with_stereotype(Some("FeatureType".into()));
        ft.push_attribute(
            Attribute::new("høyde", "Real").with_description(Some("Målt høyde".into())),
        );
        builder.push_feature_type(ft);
        let rendered = render_json(&builder.finish().catalogue).unwrap();

        assert!(rendered.contains("høyde"));
        assert!(!rendered.contains("\\u"));
        let name_at = rendered.find("\"name\"").unwrap();
        let description_at = rendered.find("\"description\"").unwrap();
        let stereotype_at = rendered.find("\"stereotype\"").unwrap();
        let attributes_at = rendered.find("\"attributes\"").unwrap();
        assert!(name_at < description_at && description_at < stereotype_at);
        assert!(stereotype_at < attributes_at);
        assert!(!rendered.contains("\"associations\""));
    }

    #[test]
    fn abstract_flag_and_listed_values_survive_the_cache() {
        let mut builder = CatalogueBuilder::new(CatalogueSource::Xmi, "test");
        let mut ft = FeatureType::new("Vegobjekt").with_abstract(true);
        ft.push_attribute(Attribute::new("status", "Status").with_values(vec![
            ListedValue::new("P", Some("Planlagt".into())),
            ListedValue::new("E", None),
        ]));
        builder.push_feature_type(ft);
        builder.push_feature_type(FeatureType::new("Veglenke"));
        let catalogue = builder.finish().catalogue;

        let rendered = render_json(&catalogue).unwrap();
        let value: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value[0]["abstract"], true);
        assert!(value[1].get("abstract").is_none());
        assert_eq!(
            value[0]["attributes"][0]["values"],
            serde_json::json!([{"value": "P", "label": "Planlagt"}, {"value": "E"}])
        );

        let reparsed = parse_catalogue(&rendered, CatalogueSource::Xmi, "cache.json").unwrap();
        assert_eq!(reparsed.catalogue, catalogue);
    }

    #[test]
    fn malformed_cache_reports_origin() {
        let err = parse_catalogue("{\"name\": 1}", CatalogueSource::Ogc, "cache.json").unwrap_err();
        assert!(matches!(err, Error::MalformedSource { ref source_ref, .. } if source_ref == "cache.json"));
    }
}
