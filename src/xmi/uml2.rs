//! XMI 2.x exports: `packagedElement` classifiers typed through `xmi:type`.

use super::arena::{Arena, Classifier, Dialect};
use super::multiplicity_or_default;
use super::nodes::{attr, child, children, clean_text, local_name, reference, xmi_id, xmi_idref, xmi_type};
use super::relations::{AggregationMark, AssociationEnd, aggregation_kind, build_association};
use crate::catalogue::{Association, Attribute, ListedValue, Multiplicity};
use crate::diagnostics::Diagnostics;
use crate::error::Error;
use roxmltree::{Document, Node};
use std::collections::HashMap;

/// `ownedComment` body, either as attribute or as a `body` child.
fn comment(node: Node<'_, '_>) -> Option<String> {
    children(node, "ownedComment").find_map(|comment| {
        comment
            .attribute("body")
            .or_else(|| child(comment, "body").and_then(|body| body.text()))
            .and_then(clean_text)
    })
}

pub(crate) fn describe(classifier: &Classifier<'_, '_>) -> (Option<String>, Option<String>) {
    (None, comment(classifier.node))
}

/// Type of a property: the `type` attribute, else a nested `type` reference.
fn type_reference<'a>(property: Node<'a, '_>) -> Option<&'a str> {
    attr(property, "type").or_else(|| child(property, "type").and_then(reference))
}

/// UML defaults: an empty `lowerValue` is 0, a missing one is 1.
fn bounds<'a>(property: Node<'a, '_>) -> (Option<&'a str>, Option<&'a str>) {
    let lower = child(property, "lowerValue").map(|value| value.attribute("value").unwrap_or("0"));
    let upper = child(property, "upperValue").and_then(|value| value.attribute("value"));
    (lower, upper)
}

pub(crate) fn attributes(
    arena: &Arena<'_, '_>,
    classifier: &Classifier<'_, '_>,
    default_type: &str,
    origin: &str,
    diagnostics: &mut Diagnostics,
) -> Vec<Attribute> {
    let mut attributes = Vec::new();
    for property in children(classifier.node, "ownedAttribute") {
        // Association ends are reported as associations.
        if property.attribute("association").is_some() {
            continue;
        }
        let Some(name) = attr(property, "name") else {
            continue;
        };
        let type_name = type_reference(property)
            .map(|reference| arena.resolve(reference, origin, diagnostics))
            .unwrap_or_else(|| default_type.to_string());
        let (lower, upper) = bounds(property);
        let multiplicity = multiplicity_or_default(
            Multiplicity::from_bounds(lower, upper),
            &format!("{}.{}", classifier.name, name),
            origin,
            diagnostics,
        );
        let description = comment(property).or_else(|| {
            xmi_id(property)
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

/// Codes of an enumeration (`ownedLiteral`) or code list class
/// (`ownedAttribute`), labelled by their comment or EA notes.
pub(crate) fn listed_values(arena: &Arena<'_, '_>, classifier: &Classifier<'_, '_>) -> Vec<ListedValue> {
    let member = if classifier.is_enumeration() {
        "ownedLiteral"
    } else {
        "ownedAttribute"
    };
    children(classifier.node, member)
        .filter(|node| node.attribute("association").is_none())
        .filter_map(|node| {
            let name = attr(node, "name")?;
            let label = comment(node).or_else(|| {
                xmi_id(node)
                    .and_then(|id| arena.notes(id))
                    .and_then(|notes| notes.documentation.clone())
            });
            Some(ListedValue::new(name, label))
        })
        .collect()
}

pub(crate) fn generalizations(
    arena: &Arena<'_, '_>,
    origin: &str,
    diagnostics: &mut Diagnostics,
) -> Vec<Association> {
    let mut found = Vec::new();
    for classifier in arena
        .classifiers()
        .filter(|classifier| classifier.dialect == Dialect::Uml2)
    {
        for generalization in children(classifier.node, "generalization") {
            let Some(general) =
                attr(generalization, "general").or_else(|| child(generalization, "general").and_then(reference))
            else {
                continue;
            };
            let parent = arena.resolve(general, origin, diagnostics);
            found.push(Association::generalization(classifier.name.clone(), parent));
        }
    }
    found
}

pub(crate) fn associations(
    document: &Document<'_>,
    arena: &Arena<'_, '_>,
    origin: &str,
    diagnostics: &mut Diagnostics,
) -> Vec<Association> {
    let properties: HashMap<&str, Node<'_, '_>> = document
        .descendants()
        .filter(|node| node.is_element() && matches!(local_name(*node), "ownedEnd" | "ownedAttribute"))
        .filter_map(|node| xmi_id(node).map(|id| (id, node)))
        .collect();

    let mut found = Vec::new();
    for node in document.descendants().filter(|node| {
        node.is_element()
            && matches!(local_name(*node), "packagedElement" | "ownedMember")
            && xmi_type(*node) == Some("Association")
    }) {
        let mut member_ids: Vec<&str> = node
            .attribute("memberEnd")
            .map(|ids| ids.split_whitespace().collect())
            .unwrap_or_default();
        if member_ids.is_empty() {
            member_ids = children(node, "memberEnd").filter_map(xmi_idref).collect();
        }
        if member_ids.is_empty() {
            member_ids = children(node, "ownedEnd").filter_map(xmi_id).collect();
        }
        let navigable_owned: Vec<&str> = node
            .attribute("navigableOwnedEnd")
            .map(|ids| ids.split_whitespace().collect())
            .unwrap_or_default();

        let mut ends = Vec::with_capacity(member_ids.len());
        for id in member_ids {
            let Some(property) = properties.get(id) else {
                diagnostics.warn_error(
                    origin,
                    &Error::UnresolvedReference {
                        source_ref: origin.to_string(),
                        reference: id.to_string(),
                    },
                );
                continue;
            };
            // Class-owned ends are navigable; association-owned ones only when listed.
            let navigable = local_name(*property) == "ownedAttribute" || navigable_owned.contains(&id);
            let role = attr(*property, "name").map(str::to_string);
            let (lower, upper) = bounds(*property);
            let multiplicity = multiplicity_or_default(
                Multiplicity::from_bounds(lower, upper),
                &format!("association end '{id}'"),
                origin,
                diagnostics,
            );
            ends.push(AssociationEnd {
                type_ref: type_reference(*property),
                role,
                multiplicity,
                aggregation: aggregation_kind(property.attribute("aggregation")),
                navigable: Some(navigable),
            });
        }
        if let Some(association) = build_association(arena, &ends, AggregationMark::OnPart, origin, diagnostics) {
            found.push(association);
        }
    }
    found
}
