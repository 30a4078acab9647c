//! Link relation lookup for OGC API documents.

use serde_json::Value;

pub(crate) const SCHEMA_RELS: &[&str] = &[
    "http://www.opengis.net/def/rel/ogc/1.0/schema",
    "http://www.opengis.net/def/rel/ogc/0.0/schema",
    "schema",
    "describedby",
];

pub(crate) const QUERYABLES_RELS: &[&str] = &[
    "http://www.opengis.net/def/rel/ogc/1.0/queryables",
    "http://www.opengis.net/def/rel/ogc/0.0/queryables",
    "queryables",
];

pub(crate) const COLLECTIONS_RELS: &[&str] = &[
    "http://www.opengis.net/def/rel/ogc/1.0/collections",
    "http://www.opengis.net/def/rel/ogc/0.0/collections",
    "collections",
    "data",
];

pub(crate) const SELF_RELS: &[&str] = &["self"];

/// Find the href of the first link matching `rels`, in rel priority order.
///
/// When several links share a rel, a JSON media type wins over others.
pub(crate) fn find_link<'a>(document: &'a Value, rels: &[&str]) -> Option<&'a str> {
    let links = document.get("links")?.as_array()?;
    for wanted in rels {
        let mut fallback = None;
        for link in links {
            let rel = link.get("rel").and_then(Value::as_str).unwrap_or_default();
            if !rel.eq_ignore_ascii_case(wanted) {
                continue;
            }
            let Some(href) = link
                .get("href")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|href| !href.is_empty())
            else {
                continue;
            };
            let is_json = link
                .get("type")
                .and_then(Value::as_str)
                .is_some_and(|media| media.to_ascii_lowercase().contains("json"));
            if is_json {
                return Some(href);
            }
            fallback.get_or_insert(href);
        }
        if fallback.is_some() {
            return fallback;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prefers_versioned_rel_then_json_type() {
        let doc = json!({
            "links": [
                {"rel": "describedby", "href": "https://x.test/describedby"},
                {"rel": "http://www.opengis.net/def/rel/ogc/1.0/schema", "href": "https://x.test/schema.xsd", "type": "application/xml"},
                {"rel": "http://www.opengis.net/def/rel/ogc/1.0/schema", "href": "https://x.test/schema", "type": "application/schema+json"}
            ]
        });
        assert_eq!(find_link(&doc, SCHEMA_RELS), Some("https://x.test/schema"));
    }

    #[test]
    fn falls_back_to_lower_priority_rels() {
        let doc = json!({"links": [{"rel": "DATA", "href": "collections"}]});
        assert_eq!(find_link(&doc, COLLECTIONS_RELS), Some("collections"));
        assert_eq!(find_link(&doc, QUERYABLES_RELS), None);
        assert_eq!(find_link(&json!({"links": "nope"}), SELF_RELS), None);
    }
}
