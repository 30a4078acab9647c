//! Small helpers over `roxmltree` nodes shared by both XMI dialects.

use roxmltree::Node;
use std::collections::BTreeMap;

fn is_xmi_namespace(namespace: &str) -> bool {
    namespace.contains("XMI")
}

/// An `xmi.*` (XMI 1.x) or `xmi:*` (XMI 2.x) attribute.
pub(crate) fn xmi_attr<'a>(node: Node<'a, '_>, local: &str) -> Option<&'a str> {
    node.attributes()
        .find(|attr| match attr.namespace() {
            Some(namespace) => attr.name() == local && is_xmi_namespace(namespace),
            None => attr.name().strip_prefix("xmi.") == Some(local),
        })
        .map(|attr| attr.value())
}

pub(crate) fn xmi_id<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    xmi_attr(node, "id")
}

pub(crate) fn xmi_idref<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    xmi_attr(node, "idref")
}

/// Local part of `xmi:type`, e.g. `Class` for `uml:Class`.
pub(crate) fn xmi_type<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    xmi_attr(node, "type").map(|value| value.rsplit_once(':').map_or(value, |(_, local)| local))
}

pub(crate) fn local_name<'a>(node: Node<'a, '_>) -> &'a str {
    node.tag_name().name()
}

pub(crate) fn child<'a, 'input>(node: Node<'a, 'input>, local: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|candidate| candidate.is_element() && local_name(*candidate) == local)
}

pub(crate) fn children<'a, 'input>(
    node: Node<'a, 'input>,
    local: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(move |candidate| candidate.is_element() && local_name(*candidate) == local)
}

/// Follow a chain of child element names.
pub(crate) fn path<'a, 'input>(node: Node<'a, 'input>, steps: &[&str]) -> Option<Node<'a, 'input>> {
    steps.iter().try_fold(node, |current, step| child(current, step))
}

/// Trimmed, non-empty attribute value.
pub(crate) fn attr<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attribute(name)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// `UML:ModelElement.taggedValue/UML:TaggedValue` pairs; later tags win.
pub(crate) fn tagged_values<'a>(node: Node<'a, '_>) -> BTreeMap<&'a str, &'a str> {
    let mut values = BTreeMap::new();
    if let Some(container) = child(node, "ModelElement.taggedValue") {
        for tagged in children(container, "TaggedValue") {
            if let Some(tag) = attr(tagged, "tag") {
                values.insert(tag, tagged.attribute("value").unwrap_or_default());
            }
        }
    }
    values
}

/// The identifier a reference points at: an id, or the fragment of an href.
pub(crate) fn reference<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    xmi_idref(node).or_else(|| {
        node.attribute("href")
            .map(|href| href.rsplit_once('#').map_or(href, |(_, fragment)| fragment))
    })
}

/// Documentation text with EA's double-escaped entities undone and line
/// breaks normalised. Blank text is `None`.
pub(crate) fn clean_text(raw: &str) -> Option<String> {
    let unescaped = unescape_html(raw);
    let normalized = unescaped.replace("\r\n", "\n").replace('\r', "\n");
    let joined = normalized
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn unescape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let decoded = tail
            .find(';')
            .filter(|end| *end <= 10)
            .and_then(|end| decode_entity(&tail[1..end]).map(|ch| (ch, end)));
        match decoded {
            Some((ch, end)) => {
                out.push(ch);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{A0}'),
        _ => {
            let numeric = entity.strip_prefix('#')?;
            let code = match numeric.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => numeric.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roxmltree::Document;

    #[test]
    fn reads_both_id_spellings() {
        let doc = Document::parse(
            r#"<root xmlns:xmi="http://www.omg.org/spec/XMI/20131001">
                 <a xmi.id="one"/>
                 <b xmi:id="two" xmi:type="uml:Class"/>
               </root>"#,
        )
        .unwrap();
        let a = doc.descendants().find(|n| n.has_tag_name("a")).unwrap();
        let b = doc.descendants().find(|n| n.has_tag_name("b")).unwrap();
        assert_eq!(xmi_id(a), Some("one"));
        assert_eq!(xmi_id(b), Some("two"));
        assert_eq!(xmi_type(b), Some("Class"));
    }

    #[test]
    fn cleans_documentation() {
        assert_eq!(
            clean_text("  Line one &lt;b&gt;\r\n   line two&#33; &amp;x  ").as_deref(),
            Some("Line one <b>\nline two! &x")
        );
        assert_eq!(clean_text("   \n "), None);
        assert_eq!(clean_text("R&D").as_deref(), Some("R&D"));
    }
}
