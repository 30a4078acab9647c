//! JSON-Schema style property descriptions to catalogue attributes.
//!
//! Several documents can describe the same collection (schema, queryables,
//! the collection detail); properties are merged by name in first-seen
//! order, the first document that states a type, description or value list
//! wins, and required-ness from any document makes the attribute required.

use crate::catalogue::{Attribute, ListedValue, Multiplicity, UpperBound};
use serde_json::{Map, Value};
use std::collections::HashMap;

const MAX_REF_DEPTH: usize = 16;
const DEFINITION_CONTAINERS: &[&str] = &["/$defs", "/definitions", "/components/schemas"];

#[derive(Default)]
struct AttributeDraft {
    type_name: Option<String>,
    description: Option<String>,
    required: Option<bool>,
    many: Option<UpperBound>,
    values: Vec<ListedValue>,
}

/// Normalized view of one property's type.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct TypeInfo {
    pub name: String,
    /// Set for arrays and repeated elements: the upper bound to use.
    pub many: Option<UpperBound>,
}

pub(crate) fn collect_attributes(documents: &[&Value]) -> Vec<Attribute> {
    let mut order: Vec<String> = Vec::new();
    let mut drafts: HashMap<String, AttributeDraft> = HashMap::new();

    for document in documents {
        for (owner, properties) in property_containers(document, documents) {
            let required_names = owner.get("required").and_then(Value::as_array);
            for (name, details) in properties {
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                let draft = drafts.entry(name.to_string()).or_insert_with(|| {
                    order.push(name.to_string());
                    AttributeDraft::default()
                });
                merge_property(draft, name, details, required_names, documents);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|name| {
            let draft = drafts.remove(&name)?;
            let lower = if draft.required.unwrap_or(false) { 1 } else { 0 };
            let upper = draft.many.unwrap_or(UpperBound::Bounded(1));
            Some(
                Attribute::new(name, draft.type_name.unwrap_or_else(|| "unknown".to_string()))
                    .with_multiplicity(Multiplicity::clamped(lower, upper))
                    .with_description(draft.description)
                    .with_values(draft.values),
            )
        })
        .collect()
}

fn merge_property(
    draft: &mut AttributeDraft,
    name: &str,
    details: &Value,
    required_names: Option<&Vec<Value>>,
    documents: &[&Value],
) {
    let resolved = resolve_refs(details, documents);

    if draft.type_name.is_none() {
        let info = normalize_type(details, documents);
        draft.type_name = Some(info.name);
        draft.many = info.many;
    }
    if draft.description.is_none() {
        draft.description = text_field(details, &["description", "title"])
            .or_else(|| text_field(resolved, &["description", "title"]));
    }
    if draft.values.is_empty() && draft.type_name.as_deref() != Some("object") {
        draft.values = enum_values(resolved, documents);
    }

    let required = required_flag(details)
        .or_else(|| required_flag(resolved))
        .or_else(|| {
            required_names.map(|names| names.iter().any(|n| n.as_str() == Some(name)))
        });
    if let Some(flag) = required {
        draft.required = Some(draft.required.unwrap_or(false) || flag);
    }
}

fn required_flag(details: &Value) -> Option<bool> {
    if let Some(flag) = details.get("required").and_then(Value::as_bool) {
        return Some(flag);
    }
    details
        .get("minOccurs")
        .and_then(Value::as_u64)
        .map(|min| min > 0)
}

type Properties<'a> = Vec<(&'a String, &'a Value)>;

/// Property lists in a document, each paired with the object that owns its
/// `required` list. GeoJSON feature schemas nest the real properties one
/// level down; their outer `geometry` is listed first as a property of its
/// own. `allOf` members contribute their own lists.
fn property_containers<'a>(document: &'a Value, documents: &[&'a Value]) -> Vec<(&'a Value, Properties<'a>)> {
    let mut containers = Vec::new();
    collect_containers(document, documents, &mut containers, 0);
    containers
}

fn collect_containers<'a>(
    node: &'a Value,
    documents: &[&'a Value],
    acc: &mut Vec<(&'a Value, Properties<'a>)>,
    depth: usize,
) {
    if depth > MAX_REF_DEPTH {
        return;
    }
    let node = resolve_refs(node, documents);

    if let Some(properties) = node.get("properties").and_then(Value::as_object) {
        let nested = properties
            .get("properties")
            .map(|inner| resolve_refs(inner, documents))
            .filter(|inner| inner.get("properties").is_some_and(Value::is_object));
        match nested {
            Some(inner) if properties.contains_key("geometry") || properties.contains_key("type") => {
                if let Some(geometry) = properties.get_key_value("geometry") {
                    acc.push((node, vec![geometry]));
                }
                collect_containers(inner, documents, acc, depth + 1)
            }
            _ => acc.push((node, listed(properties))),
        }
    } else if let Some(properties) = node.get("itemProperties").and_then(Value::as_object) {
        acc.push((node, listed(properties)));
    }

    if let Some(members) = node.get("allOf").and_then(Value::as_array) {
        for member in members {
            collect_containers(member, documents, acc, depth + 1);
        }
    }
}

fn listed(properties: &Map<String, Value>) -> Properties<'_> {
    properties.iter().collect()
}

/// Listed values of an `enum`/`const` domain, in declaration order. Array
/// properties report the domain of their items; `anyOf`/`oneOf`/`allOf`
/// members are merged. Labels come from `enumNames`/`x-enumNames` or a
/// member's `title`.
fn enum_values(details: &Value, documents: &[&Value]) -> Vec<ListedValue> {
    let mut values: Vec<ListedValue> = Vec::new();
    collect_enum_values(details, documents, &mut values, 0);
    values
}

fn collect_enum_values(node: &Value, documents: &[&Value], acc: &mut Vec<ListedValue>, depth: usize) {
    if depth > MAX_REF_DEPTH {
        return;
    }
    let node = resolve_refs(node, documents);
    let mut add = |value: String, label: Option<String>| {
        if !acc.iter().any(|known| known.value == value) {
            acc.push(ListedValue::new(value, label));
        }
    };

    if let Some(members) = node.get("enum").and_then(Value::as_array) {
        let labels = ["enumNames", "x-enumNames"]
            .iter()
            .find_map(|key| node.get(*key).and_then(Value::as_array));
        for (index, member) in members.iter().enumerate() {
            let Some(value) = simple_value(member) else {
                continue;
            };
            let label = labels
                .and_then(|labels| labels.get(index))
                .and_then(|label| non_empty_str(Some(label)))
                .map(str::to_string);
            add(value, label);
        }
    }
    if let Some(value) = node.get("const").and_then(simple_value) {
        add(value, text_field(node, &["title"]));
    }

    if let Some(items) = node.get("items") {
        collect_enum_values(items, documents, acc, depth + 1);
    }
    for combinator in ["anyOf", "oneOf", "allOf"] {
        if let Some(members) = node.get(combinator).and_then(Value::as_array) {
            for member in members {
                collect_enum_values(member, documents, acc, depth + 1);
            }
        }
    }
}

fn simple_value(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_string()).filter(|text| !text.is_empty()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Follow local `$ref` chains; unresolvable references return the last node.
pub(crate) fn resolve_refs<'a>(details: &'a Value, documents: &[&'a Value]) -> &'a Value {
    let mut current = details;
    for _ in 0..MAX_REF_DEPTH {
        let Some(reference) = current.get("$ref").and_then(Value::as_str) else {
            return current;
        };
        match lookup_ref(reference, documents) {
            Some(target) => current = target,
            None => return current,
        }
    }
    current
}

fn lookup_ref<'a>(reference: &str, documents: &[&'a Value]) -> Option<&'a Value> {
    let local = reference.split_once('#').map(|(_, fragment)| fragment)?;
    if local.starts_with('/') {
        return documents.iter().find_map(|doc| doc.pointer(local));
    }
    // Bare anchors name a definition.
    DEFINITION_CONTAINERS.iter().find_map(|container| {
        documents
            .iter()
            .find_map(|doc| doc.pointer(container)?.get(local))
    })
}

fn ref_name(reference: &str) -> Option<&str> {
    reference
        .rsplit(['/', '#'])
        .find(|segment| !segment.is_empty())
        .map(|segment| segment.trim_end_matches(".json"))
}

/// Normalize a property's `type`/`format` into the catalogue vocabulary.
///
/// `format` wins over `type`; arrays report their element type; anything
/// not recognised passes through verbatim.
pub(crate) fn normalize_type(details: &Value, documents: &[&Value]) -> TypeInfo {
    normalize_type_at(details, documents, 0)
}

fn normalize_type_at(details: &Value, documents: &[&Value], depth: usize) -> TypeInfo {
    let single = |name: String| TypeInfo { name, many: None };
    if depth > MAX_REF_DEPTH {
        return single("unknown".to_string());
    }

    let reference = details.get("$ref").and_then(Value::as_str);
    let resolved = resolve_refs(details, documents);
    let many = occurs_upper(details).or_else(|| occurs_upper(resolved));

    if let Some(format) = non_empty_str(resolved.get("format")) {
        return TypeInfo {
            name: format.to_string(),
            many,
        };
    }

    let declared: Vec<&str> = match resolved.get("type") {
        Some(Value::String(name)) => vec![name.as_str()],
        Some(Value::Array(names)) => names
            .iter()
            .filter_map(Value::as_str)
            .filter(|name| *name != "null")
            .collect(),
        _ => Vec::new(),
    };

    if declared.contains(&"array") || (declared.is_empty() && resolved.get("items").is_some()) {
        let element = resolved
            .get("items")
            .map(|items| normalize_type_at(items, documents, depth + 1).name)
            .unwrap_or_else(|| "unknown".to_string());
        let upper = resolved
            .get("maxItems")
            .and_then(Value::as_u64)
            .and_then(|max| u32::try_from(max).ok())
            .map(UpperBound::Bounded)
            .unwrap_or(UpperBound::Unbounded);
        return TypeInfo {
            name: element,
            many: Some(upper),
        };
    }

    let is_object = declared == ["object"] || (declared.is_empty() && resolved.get("properties").is_some());
    if is_object {
        // A named definition says more than "object".
        let name = reference
            .filter(|r| r.contains('#'))
            .and_then(ref_name)
            .or_else(|| non_empty_str(resolved.get("title")))
            .unwrap_or("object");
        return TypeInfo {
            name: name.to_string(),
            many,
        };
    }

    if !declared.is_empty() {
        return TypeInfo {
            name: declared.join(" | "),
            many,
        };
    }

    if let Some(reference) = reference {
        if let Some(name) = ref_name(reference) {
            return TypeInfo {
                name: name.to_string(),
                many,
            };
        }
    }

    for combinator in ["allOf", "oneOf", "anyOf"] {
        if let Some(first) = resolved
            .get(combinator)
            .and_then(Value::as_array)
            .and_then(|members| members.iter().find(|m| m.get("type") != Some(&Value::from("null"))))
        {
            let inner = normalize_type_at(first, documents, depth + 1);
            return TypeInfo {
                name: inner.name,
                many: many.or(inner.many),
            };
        }
    }

    if let Some(values) = resolved.get("enum").and_then(Value::as_array) {
        if let Some(kind) = uniform_json_type(values) {
            return single(kind.to_string());
        }
    }

    TypeInfo {
        name: "unknown".to_string(),
        many,
    }
}

/// `maxOccurs` from GML-derived descriptions.
fn occurs_upper(details: &Value) -> Option<UpperBound> {
    match details.get("maxOccurs")? {
        Value::String(raw) => match UpperBound::parse(raw)? {
            UpperBound::Bounded(n) if n <= 1 => None,
            other => Some(other),
        },
        Value::Number(n) => n
            .as_u64()
            .filter(|max| *max > 1)
            .and_then(|max| u32::try_from(max).ok())
            .map(UpperBound::Bounded),
        _ => None,
    }
}

fn uniform_json_type(values: &[Value]) -> Option<&'static str> {
    let kind = |value: &Value| match value {
        Value::String(_) => Some("string"),
        Value::Bool(_) => Some("boolean"),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some("integer"),
        Value::Number(_) => Some("number"),
        _ => None,
    };
    let first = kind(values.first()?)?;
    values.iter().all(|v| kind(v) == Some(first)).then_some(first)
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn text_field(details: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| non_empty_str(details.get(*key)))
        .map(str::to_string)
}
