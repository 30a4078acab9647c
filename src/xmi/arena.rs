//! First pass over an XMI document: every classifier keyed by its XMI id,
//! plus stereotypes and documentation attached from outside the element
//! (profile applications, EA extension blocks, detached tagged values).
//!
//! References between classifiers are resolved by id lookup against this
//! arena once it is complete, so forward references and cycles need no
//! special handling.

use super::nodes::{attr, child, clean_text, local_name, xmi_attr, xmi_id, xmi_idref, xmi_type};
use super::relations::parse_flag;
use crate::diagnostics::Diagnostics;
use crate::error::Error;
use roxmltree::{Document, Node};
use std::collections::HashMap;

/// Enterprise Architect pseudo-ids for types that have no model element.
const EA_PSEUDO_PREFIXES: &[&str] = &["EAJava_", "EAnone_"];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Dialect {
    /// XMI 1.x with the `UML:` 1.3/1.4 metamodel.
    Uml13,
    /// XMI 2.x with `packagedElement xmi:type="uml:..."`.
    Uml2,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Role {
    /// Becomes a feature type.
    Feature,
    /// Only names attribute types (primitives, enumerations).
    TypeOnly,
}

pub(crate) struct Classifier<'a, 'input> {
    pub id: &'a str,
    pub name: String,
    pub node: Node<'a, 'input>,
    pub dialect: Dialect,
    pub role: Role,
    pub is_abstract: bool,
}

impl Classifier<'_, '_> {
    /// An enumeration classifier, as opposed to a class stereotyped as one.
    pub(crate) fn is_enumeration(&self) -> bool {
        match self.dialect {
            Dialect::Uml13 => local_name(self.node) == "Enumeration",
            Dialect::Uml2 => xmi_type(self.node) == Some("Enumeration"),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Notes {
    pub stereotype: Option<String>,
    pub documentation: Option<String>,
}

pub(crate) struct Arena<'a, 'input> {
    classifiers: Vec<Classifier<'a, 'input>>,
    by_id: HashMap<&'a str, usize>,
    notes: HashMap<&'a str, Notes>,
}

impl<'a, 'input> Arena<'a, 'input> {
    pub(crate) fn collect(document: &'a Document<'input>) -> Self {
        let mut arena = Arena {
            classifiers: Vec::new(),
            by_id: HashMap::new(),
            notes: HashMap::new(),
        };
        for node in document.descendants().filter(Node::is_element) {
            match classify(node) {
                Some((dialect, role)) => arena.insert(node, dialect, role),
                None => arena.collect_notes(node),
            }
        }
        arena
    }

    fn insert(&mut self, node: Node<'a, 'input>, dialect: Dialect, role: Role) {
        let Some(id) = xmi_id(node) else {
            return;
        };
        if self.by_id.contains_key(id) {
            return;
        }
        let name = attr(node, "name").unwrap_or_default().to_string();
        // XMI 1.x may spell the flag as a nested element.
        let is_abstract = parse_flag(node.attribute("isAbstract"))
            .or_else(|| {
                child(node, "GeneralizableElement.isAbstract")
                    .and_then(|flag| parse_flag(flag.attribute("xmi.value")))
            })
            .unwrap_or(false);
        self.by_id.insert(id, self.classifiers.len());
        self.classifiers.push(Classifier {
            id,
            name,
            node,
            dialect,
            role,
            is_abstract,
        });
    }

    fn collect_notes(&mut self, node: Node<'a, 'input>) {
        let tag = local_name(node);

        // Profile application: <Profile:FeatureType base_Class="id"/>.
        for base in ["base_Class", "base_DataType", "base_Property"] {
            if let Some(target) = attr(node, base) {
                self.note(target).stereotype.get_or_insert_with(|| tag.to_string());
            }
        }

        match tag {
            // EA: xmi:Extension/elements/element[@xmi:idref]/properties.
            "element" | "attribute" => {
                let Some(target) = xmi_idref(node) else {
                    return;
                };
                let (stereotype, documentation) = if tag == "element" {
                    let properties = child(node, "properties");
                    (
                        properties.and_then(|p| attr(p, "stereotype")),
                        properties.and_then(|p| p.attribute("documentation")),
                    )
                } else {
                    (
                        child(node, "stereotype").and_then(|s| attr(s, "stereotype")),
                        child(node, "documentation").and_then(|d| d.attribute("value")),
                    )
                };
                self.merge(target, stereotype, documentation);
            }
            // XMI 1.x: top-level <UML:Stereotype extendedElement="id id"/>.
            "Stereotype" => {
                let (Some(name), Some(extended)) = (attr(node, "name"), attr(node, "extendedElement"))
                else {
                    return;
                };
                for target in extended.split_whitespace() {
                    self.merge(target, Some(name), None);
                }
            }
            // XMI 1.x: detached <UML:TaggedValue modelElement="id" .../>.
            "TaggedValue" => {
                let (Some(target), Some(tag)) = (attr(node, "modelElement"), attr(node, "tag")) else {
                    return;
                };
                let value = node.attribute("value");
                match tag {
                    "stereotype" => self.merge(target, value, None),
                    "documentation" | "description" => self.merge(target, None, value),
                    _ => {}
                }
            }
            _ => {}
        }
    }

    fn note(&mut self, id: &'a str) -> &mut Notes {
        self.notes.entry(id).or_default()
    }

    fn merge(&mut self, id: &'a str, stereotype: Option<&str>, documentation: Option<&str>) {
        let notes = self.note(id);
        if notes.stereotype.is_none() {
            notes.stereotype = stereotype
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string);
        }
        if notes.documentation.is_none() {
            notes.documentation = documentation.and_then(clean_text);
        }
    }

    /// Feature classifiers in document order.
    pub(crate) fn features(&self) -> impl Iterator<Item = &Classifier<'a, 'input>> {
        self.classifiers
            .iter()
            .filter(|classifier| classifier.role == Role::Feature)
    }

    pub(crate) fn classifiers(&self) -> impl Iterator<Item = &Classifier<'a, 'input>> {
        self.classifiers.iter()
    }

    pub(crate) fn notes(&self, id: &str) -> Option<&Notes> {
        self.notes.get(id)
    }

    /// Human-readable name for a type or endpoint reference. Unknown ids
    /// degrade to the raw id and leave an `unresolved_reference` diagnostic.
    pub(crate) fn resolve(&self, reference: &str, origin: &str, diagnostics: &mut Diagnostics) -> String {
        let reference = reference.trim();
        if let Some(classifier) = self.by_id.get(reference).map(|index| &self.classifiers[*index]) {
            if !classifier.name.is_empty() {
                return classifier.name.clone();
            }
        }
        if let Some(stripped) = EA_PSEUDO_PREFIXES
            .iter()
            .find_map(|prefix| reference.strip_prefix(prefix))
            .filter(|rest| !rest.is_empty())
        {
            return stripped.to_string();
        }
        if !self.by_id.contains_key(reference) {
            diagnostics.warn_error(
                origin,
                &Error::UnresolvedReference {
                    source_ref: origin.to_string(),
                    reference: reference.to_string(),
                },
            );
        }
        reference.to_string()
    }
}

fn classify(node: Node<'_, '_>) -> Option<(Dialect, Role)> {
    let tag = local_name(node);
    if node.attribute("xmi.id").is_some() {
        return match tag {
            "Class" => Some((Dialect::Uml13, Role::Feature)),
            "DataType" | "Enumeration" | "Primitive" => Some((Dialect::Uml13, Role::TypeOnly)),
            _ => None,
        };
    }
    if !matches!(tag, "packagedElement" | "ownedMember" | "nestedClassifier" | "ownedType") {
        return None;
    }
    xmi_attr(node, "id")?;
    match xmi_type(node)? {
        "Class" | "DataType" => Some((Dialect::Uml2, Role::Feature)),
        "PrimitiveType" | "Enumeration" => Some((Dialect::Uml2, Role::TypeOnly)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticKind;

    const UML2: &str = r#"<xmi:XMI xmlns:xmi="http://www.omg.org/spec/XMI/20131001"
        xmlns:uml="http://www.omg.org/spec/UML/20131001"
        xmlns:SOSI="http://example.test/sosi">
      <uml:Model xmi:id="m">
        <packagedElement xmi:type="uml:Class" xmi:id="c1" name="Bygning" isAbstract="true"/>
        <packagedElement xmi:type="uml:PrimitiveType" xmi:id="p1" name="Integer"/>
      </uml:Model>
      <SOSI:FeatureType xmi:id="s1" base_Class="c1"/>
      <xmi:Extension extender="Enterprise Architect">
        <elements>
          <element xmi:idref="c1"><properties documentation="A &amp;lt;building&amp;gt;"/></element>
        </elements>
      </xmi:Extension>
    </xmi:XMI>"#;

    #[test]
    fn indexes_classifiers_and_notes() {
        let doc = Document::parse(UML2).unwrap();
        let arena = Arena::collect(&doc);
        let features: Vec<_> = arena.features().map(|c| c.name.as_str()).collect();
        assert_eq!(features, vec!["Bygning"]);
        assert!(arena.features().all(|c| c.is_abstract));
        assert!(arena.classifiers().all(|c| !c.is_enumeration()));
        let notes = arena.notes("c1").unwrap();
        assert_eq!(notes.stereotype.as_deref(), Some("FeatureType"));
        assert_eq!(notes.documentation.as_deref(), Some("A <building>"));
    }

    #[test]
    fn resolves_ids_pseudo_ids_and_unknowns() {
        let doc = Document::parse(UML2).unwrap();
        let arena = Arena::collect(&doc);
        let mut diagnostics = Diagnostics::new();
        assert_eq!(arena.resolve("p1", "t", &mut diagnostics), "Integer");
        assert_eq!(arena.resolve("EAJava_int", "t", &mut diagnostics), "int");
        assert!(diagnostics.is_empty());
        assert_eq!(arena.resolve("EAID_missing", "t", &mut diagnostics), "EAID_missing");
        assert_eq!(diagnostics.of_kind(&DiagnosticKind::UnresolvedReference).count(), 1);
    }
}
