//! PlantUML class diagrams.
//!
//! Classes come first in catalogue order, relationship lines after them in
//! association order, so unchanged input always yields identical bytes.

use crate::catalogue::{Association, AssociationKind, Catalogue, FeatureType};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug)]
pub struct PlantUmlOptions {
    pub title: Option<String>,
    /// Attach each description as a note next to its class.
    pub include_notes: bool,
    pub hide_empty_members: bool,
}

impl Default for PlantUmlOptions {
    fn default() -> Self {
        Self {
            title: None,
            include_notes: false,
            hide_empty_members: true,
        }
    }
}

pub fn render_plantuml(catalogue: &Catalogue) -> String {
    render_plantuml_with(catalogue, &PlantUmlOptions::default())
}

pub fn render_plantuml_with(catalogue: &Catalogue, options: &PlantUmlOptions) -> String {
    let mut lines = vec!["@startuml".to_string()];
    if catalogue.is_empty() {
        lines.push("@enduml".to_string());
        return finish(lines);
    }

    if let Some(title) = options.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        lines.push(format!("title {title}"));
    }
    if options.hide_empty_members {
        lines.push("hide empty members".to_string());
    }

    let aliases = assign_aliases(catalogue.feature_types());
    for ft in catalogue.feature_types() {
        let Some(alias) = aliases.get(ft.name.as_str()) else {
            continue;
        };
        lines.push(String::new());
        lines.extend(class_block(ft, alias));
        if options.include_notes {
            if let Some(description) = &ft.description {
                lines.push(format!("note right of {alias}"));
                lines.extend(description.lines().map(|line| format!("  {}", line.trim_end())));
                lines.push("end note".to_string());
            }
        }
    }

    let relations: Vec<String> = catalogue
        .associations()
        .iter()
        .filter_map(|assoc| relation_line(assoc, &aliases))
        .collect();
    if !relations.is_empty() {
        lines.push(String::new());
        lines.extend(relations);
    }

    lines.push("@enduml".to_string());
    finish(lines)
}

fn finish(lines: Vec<String>) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn class_block(ft: &FeatureType, alias: &str) -> Vec<String> {
    let keyword = if ft.is_abstract { "abstract class" } else { "class" };
    let mut header = if alias == ft.name {
        format!("{keyword} {alias}")
    } else {
        format!("{keyword} \"{}\" as {alias}", ft.name.replace('"', "'"))
    };
    if let Some(stereotype) = &ft.stereotype {
        header.push_str(&format!(" <<{stereotype}>>"));
    }
    header.push_str(" {");

    let mut block = vec![header];
    for attr in &ft.attributes {
        let type_name = attr.type_name.trim();
        if type_name.is_empty() {
            block.push(format!("  {}", attr.name));
        } else {
            block.push(format!("  {type_name} {}", attr.name));
        }
    }
    block.push("}".to_string());
    block
}

/// Associations whose ends lack an alias are skipped.
fn relation_line(assoc: &Association, aliases: &BTreeMap<&str, String>) -> Option<String> {
    let source = aliases.get(assoc.source.as_str())?;
    let target = aliases.get(assoc.target.as_str())?;
    let arrow = match assoc.kind {
        AssociationKind::Generalization => return Some(format!("{target} <|-- {source}")),
        AssociationKind::Association => "-->",
        AssociationKind::Aggregation => "o--",
        AssociationKind::Composition => "*--",
    };
    let target_label = match &assoc.role_name {
        Some(role) => format!("{role} {}", assoc.target_multiplicity),
        None => assoc.target_multiplicity.to_string(),
    };
    Some(format!(
        "{source} \"{}\" {arrow} \"{}\" {target}",
        assoc.source_multiplicity,
        target_label.replace('"', "'")
    ))
}

/// Map each feature type name to a PlantUML-safe alias, suffixing on clashes.
fn assign_aliases(feature_types: &[FeatureType]) -> BTreeMap<&str, String> {
    let mut used = BTreeSet::new();
    let mut aliases = BTreeMap::new();
    for ft in feature_types {
        let base = sanitize_alias(&ft.name);
        let mut alias = base.clone();
        let mut counter = 2;
        while !used.insert(alias.clone()) {
            alias = format!("{base}_{counter}");
            counter += 1;
        }
        aliases.insert(ft.name.as_str(), alias);
    }
    aliases
}

fn sanitize_alias(name: &str) -> String {
    let mut alias: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if alias.is_empty() || alias.starts_with(|c: char| c.is_ascii_digit()) {
        alias.insert(0, '_');
    }
    alias
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::{Attribute, CatalogueBuilder, CatalogueSource, Multiplicity};

    #[test]
    fn empty_catalogue_has_no_classes() {
        let out = render_plantuml(&Catalogue::empty(CatalogueSource::Xmi));
        assert_eq!(out, "@startuml\n@enduml\n");
    }

    #[test]
    fn relation_notation_per_kind() {
        let mut builder = CatalogueBuilder::new(CatalogueSource::Xmi, "test");
        for name in ["Whole", "Part", "Other"] {
            builder.push_feature_type(FeatureType::new(name));
        }
        builder.push_association(
            Association::new("Whole", "Part", AssociationKind::Composition)
                .with_multiplicities(Multiplicity::EXACTLY_ONE, Multiplicity::MANY)
                .with_role(Some("parts".into())),
        );
        builder.push_association(Association::new("Whole", "Other", AssociationKind::Aggregation));
        builder.push_association(Association::new("Part", "Other", AssociationKind::Association));
        builder.push_association(Association::generalization("Other", "Whole"));
        let out = render_plantuml(&builder.finish().catalogue);

        assert!(out.contains("Whole \"1..1\" *-- \"parts 0..*\" Part\n"));
        assert!(out.contains("Whole \"1..1\" o-- \"1..1\" Other\n"));
        assert!(out.contains("Part \"1..1\" --> \"1..1\" Other\n"));
        assert!(out.contains("Whole <|-- Other\n"));
    }

    #[test]
    fn names_that_are_not_identifiers_get_aliases() {
        let mut builder = CatalogueBuilder::new(CatalogueSource::Xmi, "test");
        let mut ft = FeatureType::new("Kyst kontur").with_stereotype(Some("FeatureType".into()));
        ft.push_attribute(Attribute::new("id", "Integer"));
        builder.push_feature_type(ft);
        builder.push_feature_type(FeatureType::new("Kyst_kontur"));
        builder.push_feature_type(FeatureType::new("3D"));
        let out = render_plantuml(&builder.finish().catalogue);

        assert!(out.contains("class \"Kyst kontur\" as Kyst_kontur <<FeatureType>> {\n  Integer id\n}"));
        assert!(out.contains("class \"Kyst_kontur\" as Kyst_kontur_2 {"));
        assert!(out.contains("class \"3D\" as _3D {"));
    }

    #[test]
    fn abstract_types_use_the_abstract_keyword() {
        let mut builder = CatalogueBuilder::new(CatalogueSource::Xmi, "test");
        builder.push_feature_type(FeatureType::new("Vegobjekt").with_abstract(true));
        builder.push_feature_type(FeatureType::new("Veglenke"));
        builder.push_association(Association::generalization("Veglenke", "Vegobjekt"));
        let out = render_plantuml(&builder.finish().catalogue);

        assert!(out.contains("\nabstract class Vegobjekt {\n}"));
        assert!(out.contains("\nclass Veglenke {\n}"));
        assert!(out.contains("Vegobjekt <|-- Veglenke\n"));
    }

    #[test]
    fn notes_and_title_are_optional() {
        let mut builder = CatalogueBuilder::new(CatalogueSource::Ogc, "test");
        builder.push_feature_type(FeatureType::new("roads").with_description(Some("Road network".into())));
        let catalogue = builder.finish().catalogue;
        let plain = render_plantuml(&catalogue);
        assert!(!plain.contains("note"));

        let options = PlantUmlOptions {
            title: Some("Roads".into()),
            include_notes: true,
            hide_empty_members: false,
        };
        let decorated = render_plantuml_with(&catalogue, &options);
        assert!(decorated.starts_with("@startuml\ntitle Roads\n"));
        assert!(decorated.contains("note right of roads\n  Road network\nend note"));
        assert!(!decorated.contains("hide empty members"));
    }
}
