//! XMI 1.x exports (`UML:` 1.3/1.4 metamodel), as written by Enterprise
//! Architect's "XMI 1.1 / UML 1.3" option.

use super::arena::{Arena, Classifier};
use super::multiplicity_or_default;
use super::nodes::{
    attr, child, children, clean_text, local_name, path, reference, tagged_values, xmi_id, xmi_idref,
};
use super::relations::{AggregationMark, AssociationEnd, aggregation_kind, build_association, parse_flag};
use crate::catalogue::{Association, Attribute, ListedValue, Multiplicity};
use crate::diagnostics::Diagnostics;
use roxmltree::{Document, Node};

const RANGE_PATH: &[&str] = &["Multiplicity", "Multiplicity.range", "MultiplicityRange"];

/// Inline stereotype and description of a class.
pub(crate) fn describe(classifier: &Classifier<'_, '_>) -> (Option<String>, Option<String>) {
    let tags = tagged_values(classifier.node);
    let stereotype = path(classifier.node, &["ModelElement.stereotype", "Stereotype"])
        .and_then(|stereotype| attr(stereotype, "name"))
        .or_else(|| tags.get("stereotype").copied())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    let description = ["documentation", "description"]
        .iter()
        .find_map(|key| tags.get(key).and_then(|value| clean_text(value)));
    (stereotype, description)
}

pub(crate) fn attributes(
    arena: &Arena<'_, '_>,
    classifier: &Classifier<'_, '_>,
    default_type: &str,
    origin: &str,
    diagnostics: &mut Diagnostics,
) -> Vec<Attribute> {
    let Some(features) = child(classifier.node, "Classifier.feature") else {
        return Vec::new();
    };
    let mut attributes = Vec::new();
    for node in children(features, "Attribute") {
        let Some(name) = attr(node, "name") else {
            continue;
        };
        let tags = tagged_values(node);
        let subject = format!("{}.{}", classifier.name, name);

        let type_name = tags
            .get("type")
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .or_else(|| {
                let declared = child(node, "StructuralFeature.type").and_then(|container| {
                    container.children().find(|candidate| candidate.is_element())
                });
                match declared {
                    Some(target) => match xmi_idref(target) {
                        Some(id) => Some(arena.resolve(id, origin, diagnostics)),
                        None => attr(target, "name").map(str::to_string),
                    },
                    None => attr(node, "type").map(|id| arena.resolve(id, origin, diagnostics)),
                }
            })
            .unwrap_or_else(|| default_type.to_string());

        let (lower, upper) = match range(node, "StructuralFeature.multiplicity") {
            Some(bounds) => bounds,
            None => (
                tags.get("lowerBound").copied(),
                tags.get("upperBound").copied(),
            ),
        };
        let multiplicity = multiplicity_or_default(
            Multiplicity::from_bounds(lower, upper),
            &subject,
            origin,
            diagnostics,
        );

        let description = ["description", "documentation"]
            .iter()
            .find_map(|key| tags.get(key).and_then(|value| clean_text(value)))
            .or_else(|| {
                xmi_id(node)
                    .and_then(|id| arena.notes(id))
                    .and_then(|notes| notes.documentation.clone())
            });

        attributes.push(
            Attribute::new(name, type_name)
                .with_multiplicity(multiplicity)
                .with_description(description),
        );
    }
    attributes
}

/// Codes of an enumeration or code list: enumeration literals when present,
/// else the class attributes with the `code` tag over the name and the
/// `description` tag as label.
pub(crate) fn listed_values(classifier: &Classifier<'_, '_>) -> Vec<ListedValue> {
    let literals: Vec<ListedValue> = child(classifier.node, "Enumeration.literal")
        .into_iter()
        .flat_map(|container| children(container, "EnumerationLiteral"))
        .filter_map(|literal| attr(literal, "name"))
        .map(|name| ListedValue::new(name, None))
        .collect();
    if !literals.is_empty() {
        return literals;
    }
    let Some(features) = child(classifier.node, "Classifier.feature") else {
        return Vec::new();
    };
    children(features, "Attribute")
        .filter_map(|node| {
            let name = attr(node, "name")?;
            let tags = tagged_values(node);
            let value = tags
                .get("code")
                .map(|code| code.trim())
                .filter(|code| !code.is_empty())
                .unwrap_or(name);
            let label = ["description", "documentation"]
                .iter()
                .find_map(|key| tags.get(key).and_then(|text| clean_text(text)));
            Some(ListedValue::new(value, label))
        })
        .collect()
}

fn range<'a>(node: Node<'a, '_>, container: &str) -> Option<(Option<&'a str>, Option<&'a str>)> {
    let container = child(node, container)?;
    let range = path(container, RANGE_PATH)?;
    Some((range.attribute("lower"), range.attribute("upper")))
}

pub(crate) fn generalizations(
    document: &Document<'_>,
    arena: &Arena<'_, '_>,
    origin: &str,
    diagnostics: &mut Diagnostics,
) -> Vec<Association> {
    let mut found = Vec::new();
    for node in document
        .descendants()
        .filter(|node| node.is_element() && local_name(*node) == "Generalization")
        .filter(|node| node.attribute("xmi.id").is_some())
    {
        let endpoint = |attribute: &str, nested: &str| {
            attr(node, attribute).or_else(|| {
                child(node, nested)
                    .and_then(|container| container.children().find(|c| c.is_element()))
                    .and_then(reference)
            })
        };
        let (Some(child_id), Some(parent_id)) = (
            endpoint("subtype", "Generalization.child"),
            endpoint("supertype", "Generalization.parent"),
        ) else {
            continue;
        };
        let child_name = arena.resolve(child_id, origin, diagnostics);
        let parent_name = arena.resolve(parent_id, origin, diagnostics);
        found.push(Association::generalization(child_name, parent_name));
    }
    found
}

pub(crate) fn associations(
    document: &Document<'_>,
    arena: &Arena<'_, '_>,
    origin: &str,
    diagnostics: &mut Diagnostics,
) -> Vec<Association> {
    let mut found = Vec::new();
    for node in document
        .descendants()
        .filter(|node| node.is_element() && local_name(*node) == "Association")
        .filter(|node| node.attribute("xmi.id").is_some())
    {
        let Some(connection) = child(node, "Association.connection") else {
            continue;
        };
        let ends: Vec<AssociationEnd<'_>> = children(connection, "AssociationEnd")
            .map(|end| association_end(end, origin, diagnostics))
            .collect();
        if let Some(association) =
            build_association(arena, &ends, AggregationMark::OnWhole, origin, diagnostics)
        {
            found.push(association);
        }
    }
    found
}

fn association_end<'a>(end: Node<'a, '_>, origin: &str, diagnostics: &mut Diagnostics) -> AssociationEnd<'a> {
    let type_ref = attr(end, "type").or_else(|| {
        ["AssociationEnd.participant", "AssociationEnd.type"]
            .iter()
            .filter_map(|container| child(end, container))
            .find_map(|container| container.children().find(|c| c.is_element()))
            .and_then(reference)
    });
    let role = attr(end, "name").map(str::to_string);
    let subject = format!("association end '{}'", role.as_deref().unwrap_or("?"));

    let declared = match attr(end, "multiplicity") {
        Some(raw) => Multiplicity::parse_range(raw),
        None => {
            let (lower, upper) = range(end, "AssociationEnd.multiplicity").unwrap_or((None, None));
            Multiplicity::from_bounds(lower, upper)
        }
    };
    let multiplicity = multiplicity_or_default(declared, &subject, origin, diagnostics);

    let navigable = parse_flag(end.attribute("isNavigable").or_else(|| end.attribute("navigable")))
        .or_else(|| {
            child(end, "AssociationEnd.isNavigable").and_then(|flag| {
                parse_flag(flag.attribute("xmi.value").or_else(|| flag.attribute("value")))
            })
        });

    AssociationEnd {
        type_ref,
        role,
        multiplicity,
        aggregation: aggregation_kind(end.attribute("aggregation")),
        navigable,
    }
}
