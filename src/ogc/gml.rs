//! GML application schemas (XSD) served from a collection's schema link.
//!
//! The feature's `complexType` is turned into the same property-map shape
//! the JSON path understands, with XSD occurrence bounds carried as
//! `minOccurs`/`maxOccurs` and inline `xsd:enumeration` facets as `enum`.

use crate::error::{Error, Result};
use roxmltree::{Document, Node};
use serde_json::{Map, Value, json};

const XSD_NAMESPACE_MARKER: &str = "XMLSchema";

/// Parse an XSD document. `Ok(None)` means it held no usable complex type.
pub(crate) fn parse_gml_schema(text: &str, origin: &str) -> Result<Option<Value>> {
    let document = Document::parse(text).map_err(|err| Error::malformed(origin, err))?;

    let complex_types: Vec<(&str, Node<'_, '_>)> = document
        .descendants()
        .filter(|node| is_xsd(node, "complexType"))
        .filter_map(|node| node.attribute("name").map(|name| (name, node)))
        .collect();

    let feature_element = document.descendants().find(|node| {
        is_xsd(node, "element")
            && node
                .attribute("substitutionGroup")
                .is_some_and(|group| group.contains("AbstractFeature"))
    });
    let feature_type_name = feature_element
        .and_then(|element| element.attribute("type"))
        .map(strip_prefix);

    let selected = feature_type_name
        .and_then(|wanted| complex_types.iter().find(|(name, _)| *name == wanted))
        .or_else(|| complex_types.first());
    let Some((type_name, complex)) = selected else {
        return Ok(None);
    };

    let mut properties = Map::new();
    for element in property_elements(*complex) {
        let Some(name) = element
            .attribute("name")
            .or_else(|| element.attribute("ref").map(strip_prefix))
        else {
            continue;
        };
        if properties.contains_key(name) {
            continue;
        }
        properties.insert(name.to_string(), element_details(element));
    }
    if properties.is_empty() {
        return Ok(None);
    }

    let title = feature_element
        .and_then(|element| element.attribute("name"))
        .unwrap_or(*type_name);
    Ok(Some(json!({
        "title": title,
        "properties": Value::Object(properties),
    })))
}

/// Elements declared directly by the complex type, not those nested inside
/// anonymous child types.
fn property_elements<'a, 'input>(complex: Node<'a, 'input>) -> Vec<Node<'a, 'input>> {
    complex
        .descendants()
        .filter(|node| is_xsd(node, "element"))
        .filter(|node| {
            !node
                .ancestors()
                .skip(1)
                .take_while(|ancestor| *ancestor != complex)
                .any(|ancestor| is_xsd(&ancestor, "element"))
        })
        .collect()
}

fn element_details(element: Node<'_, '_>) -> Value {
    let mut details = Map::new();
    let type_name = element
        .attribute("type")
        .or_else(|| element.attribute("ref"))
        .map(strip_prefix)
        .or_else(|| {
            element
                .descendants()
                .find(|node| is_xsd(node, "restriction"))
                .and_then(|restriction| restriction.attribute("base"))
                .map(strip_prefix)
        });
    if let Some(type_name) = type_name {
        details.insert("type".to_string(), Value::from(type_name));
    }

    // XSD defaults both bounds to 1.
    let min = element
        .attribute("minOccurs")
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .unwrap_or(1);
    details.insert("minOccurs".to_string(), Value::from(min));
    let max = match element.attribute("maxOccurs").map(str::trim) {
        Some("unbounded") => Value::from("unbounded"),
        Some(raw) => raw.parse::<u64>().map(Value::from).unwrap_or(Value::from(1)),
        None => Value::from(1),
    };
    details.insert("maxOccurs".to_string(), max);

    let listed: Vec<Value> = element
        .descendants()
        .filter(|node| is_xsd(node, "enumeration"))
        .filter_map(|node| node.attribute("value"))
        .map(Value::from)
        .collect();
    if !listed.is_empty() {
        details.insert("enum".to_string(), Value::Array(listed));
    }

    let documentation = element
        .children()
        .filter(|node| is_xsd(node, "annotation"))
        .flat_map(|annotation| annotation.children())
        .find(|node| is_xsd(node, "documentation"))
        .and_then(|doc| doc.text())
        .map(str::trim)
        .filter(|text| !text.is_empty());
    if let Some(text) = documentation {
        details.insert("description".to_string(), Value::from(text));
    }
    Value::Object(details)
}

fn is_xsd(node: &Node<'_, '_>, local: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == local
        && node
            .tag_name()
            .namespace()
            .is_none_or(|ns| ns.contains(XSD_NAMESPACE_MARKER))
}

fn strip_prefix(value: &str) -> &str {
    value.rsplit_once(':').map_or(value, |(_, local)| local)
}
