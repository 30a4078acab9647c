//! Markdown tables, one section per feature type.
//!
//! Abstract types are marked `(abstrakt)` in their heading. Listed values of
//! a code list or enumeration follow the description in the same cell, one
//! `- value – label` bullet per line.

use crate::catalogue::{Association, AssociationKind, Attribute, Catalogue, FeatureType};

const TABLE_HEADER: &str = "| Attribute name | Type | Multiplicity | Description |";
const TABLE_RULE: &str = "| --- | --- | --- | --- |";

#[derive(Clone, Debug)]
pub struct MarkdownOptions {
    /// Heading depth for each feature type, clamped to 1..=6.
    pub heading_level: usize,
    pub include_descriptions: bool,
    pub include_stereotypes: bool,
    pub include_relationships: bool,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            heading_level: 4,
            include_descriptions: true,
            include_stereotypes: true,
            include_relationships: true,
        }
    }
}

pub fn render_markdown(catalogue: &Catalogue) -> String {
    render_markdown_with(catalogue, &MarkdownOptions::default())
}

/// Render every feature type in catalogue order. An empty catalogue yields
/// an empty string, which callers treat as "no artefact".
pub fn render_markdown_with(catalogue: &Catalogue, options: &MarkdownOptions) -> String {
    if catalogue.is_empty() {
        return String::new();
    }
    let sections: Vec<String> = catalogue
        .feature_types()
        .iter()
        .map(|ft| render_section(catalogue, ft, options))
        .collect();
    let mut out = sections.join("\n\n");
    out.push('\n');
    out
}

fn render_section(catalogue: &Catalogue, ft: &FeatureType, options: &MarkdownOptions) -> String {
    let level = options.heading_level.clamp(1, 6);
    let mut heading = format!("{} {}", "#".repeat(level), ft.name);
    if ft.is_abstract {
        heading.push_str(" (abstrakt)");
    }
    if options.include_stereotypes {
        if let Some(stereotype) = &ft.stereotype {
            heading.push_str(&format!(" «{stereotype}»"));
        }
    }

    let mut blocks = vec![heading];
    if options.include_descriptions {
        if let Some(description) = &ft.description {
            blocks.push(description.clone());
        }
    }

    let mut table = vec![TABLE_HEADER.to_string(), TABLE_RULE.to_string()];
    for attr in &ft.attributes {
        table.push(format!(
            "| {} | {} | {} | {} |",
            escape_cell(&attr.name),
            escape_cell(&attr.type_name),
            attr.multiplicity,
            description_cell(attr)
        ));
    }
    blocks.push(table.join("\n"));

    if options.include_relationships {
        let relations: Vec<String> = catalogue
            .associations_from(&ft.name)
            .map(describe_relation)
            .collect();
        if !relations.is_empty() {
            blocks.push(format!("**Relationships**\n\n{}", relations.join("\n")));
        }
    }
    blocks.join("\n\n")
}

fn describe_relation(assoc: &Association) -> String {
    match assoc.kind {
        AssociationKind::Generalization => format!("- specialises **{}**", assoc.target),
        kind => {
            let mut line = format!(
                "- {} to **{}** ({} to {})",
                kind.as_str(),
                assoc.target,
                assoc.source_multiplicity,
                assoc.target_multiplicity
            );
            if let Some(role) = &assoc.role_name {
                line.push_str(&format!(", role *{role}*"));
            }
            line
        }
    }
}

fn description_cell(attr: &Attribute) -> String {
    let mut parts: Vec<String> = attr
        .description
        .as_deref()
        .map(escape_cell)
        .into_iter()
        .collect();
    parts.extend(attr.values.iter().map(|listed| match &listed.label {
        Some(label) => format!("- {} – {}", escape_cell(&listed.value), escape_cell(label)),
        None => format!("- {}", escape_cell(&listed.value)),
    }));
    parts.join("<br>")
}

fn escape_cell(value: &str) -> String {
    value
        .trim()
        .replace('|', "\\|")
        .replace("\r\n", "<br>")
        .replace('\n', "<br>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::{CatalogueBuilder, CatalogueSource, ListedValue, Multiplicity};

    #[test]
    fn empty_catalogue_renders_empty_string() {
        assert_eq!(render_markdown(&Catalogue::empty(CatalogueSource::Ogc)), "");
    }

    #[test]
    fn table_row_formats_multiplicity_and_escapes_cells() {
        let mut builder = CatalogueBuilder::new(CatalogueSource::Ogc, "test");
        let mut ft = FeatureType::new("roads").with_description(Some("Road network".into()));
        ft.push_attribute(Attribute::new("name", "string"));
        ft.push_attribute(
            Attribute::new("lanes", "integer")
                .with_multiplicity(Multiplicity::MANY)
                .with_description(Some("a | b\nc".into())),
        );
        builder.push_feature_type(ft);
        let md = render_markdown(&builder.finish().catalogue);

        let expected = "#### roads\n\nRoad network\n\n\
| Attribute name | Type | Multiplicity | Description |\n\
| --- | --- | --- | --- |\n\
| name | string | 1..1 |  |\n\
| lanes | integer | 0..* | a \\| b<br>c |\n";
        assert_eq!(md, expected);
    }

    #[test]
    fn abstract_types_and_listed_values() {
        let mut builder = CatalogueBuilder::new(CatalogueSource::Xmi, "test");
        let mut ft = FeatureType::new("Vegobjekt")
            .with_stereotype(Some("FeatureType".into()))
            .with_abstract(true);
        ft.push_attribute(
            Attribute::new("status", "Status")
                .with_description(Some("Fase".into()))
                .with_values(vec![
                    ListedValue::new("P", Some("Planlagt".into())),
                    ListedValue::new("E", None),
                ]),
        );
        ft.push_attribute(
            Attribute::new("dekke", "Dekke").with_values(vec![ListedValue::new("asfalt", None)]),
        );
        builder.push_feature_type(ft);
        let md = render_markdown(&builder.finish().catalogue);

        assert!(md.starts_with("#### Vegobjekt (abstrakt) «FeatureType»\n"));
        assert!(md.contains("| status | Status | 1..1 | Fase<br>- P – Planlagt<br>- E |\n"));
        assert!(md.contains("| dekke | Dekke | 1..1 | - asfalt |\n"));
    }

    #[test]
    fn heading_level_is_clamped() {
        let mut builder = CatalogueBuilder::new(CatalogueSource::Xmi, "test");
        builder.push_feature_type(FeatureType::new("Veg").with_stereotype(Some("FeatureType".into())));
        let options = MarkdownOptions {
            heading_level: 9,
            ..MarkdownOptions::default()
        };
        let md = render_markdown_with(&builder.finish().catalogue, &options);
        assert!(md.starts_with("###### Veg «FeatureType»\n"));
    }
}
