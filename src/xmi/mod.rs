//! XMI/UML extractor.
//!
//! Reads an Enterprise-Architect-style XMI export (1.x or 2.x) from disk or
//! over HTTP and maps its classes, attributes, generalizations and
//! associations onto the canonical catalogue. The document is parsed once;
//! a first pass indexes every classifier by XMI id, a second resolves
//! references against that index. Enumerations and classes stereotyped
//! `CodeList` or `enumeration` become value domains: attributes typed by
//! them carry their listed values.

mod arena;
mod nodes;
mod relations;
mod uml13;
mod uml2;

use crate::catalogue::{
    CatalogueBuilder, CatalogueSource, Extraction, FeatureType, ListedValue, Multiplicity,
};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::{Error, Result};
use crate::fetch::{Credentials, Fetch, decode_text, is_remote};
use arena::{Arena, Classifier, Dialect};
use roxmltree::{Document, ParsingOptions};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Type recorded for attributes that declare none.
pub const DEFAULT_ATTRIBUTE_TYPE: &str = "CharacterString";

/// Stereotypes that turn a class into a value domain.
const VALUE_DOMAIN_STEREOTYPES: &[&str] = &["CodeList", "enumeration"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum XmiSource {
    Path(PathBuf),
    Url(String),
}

impl XmiSource {
    /// `http(s)://` locations are URLs, anything else a local path.
    pub fn parse(location: &str) -> Self {
        if is_remote(location) {
            XmiSource::Url(location.trim().to_string())
        } else {
            XmiSource::Path(PathBuf::from(location))
        }
    }
}

impl fmt::Display for XmiSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XmiSource::Path(path) => write!(f, "{}", path.display()),
            XmiSource::Url(url) => f.write_str(url),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct XmiOptions {
    /// Keep only classifiers carrying one of these stereotypes
    /// (case-insensitive). Empty keeps every class and data type.
    pub stereotypes: Vec<String>,
}

impl XmiOptions {
    fn accepts(&self, stereotype: Option<&str>) -> bool {
        if self.stereotypes.is_empty() {
            return true;
        }
        stereotype.is_some_and(|stereotype| {
            self.stereotypes
                .iter()
                .any(|wanted| wanted.trim().eq_ignore_ascii_case(stereotype))
        })
    }
}

pub struct XmiExtractor<F> {
    fetcher: F,
    credentials: Credentials,
    options: XmiOptions,
}

impl<F: Fetch> XmiExtractor<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            credentials: Credentials::default(),
            options: XmiOptions::default(),
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_options(mut self, options: XmiOptions) -> Self {
        self.options = options;
        self
    }

    /// Extract a catalogue; an unreadable or unparsable document yields an
    /// empty catalogue plus the diagnostic.
    pub fn extract(&self, source: &XmiSource) -> Extraction {
        let origin = source.to_string();
        match self.load(source) {
            Ok(text) => extract_from_str(&text, &origin, &self.options),
            Err(err) => {
                warn!(source = %origin, error = %err, "XMI source unavailable");
                Extraction::failed(CatalogueSource::Xmi, &origin, &err)
            }
        }
    }

    fn load(&self, source: &XmiSource) -> Result<String> {
        match source {
            XmiSource::Path(path) => {
                let bytes = fs::read(path).map_err(|err| Error::unavailable(path.display().to_string(), err))?;
                Ok(decode_text(&bytes))
            }
            XmiSource::Url(url) => Ok(self.fetcher.get(url, Some(&self.credentials))?.text()),
        }
    }
}

/// Extract from an already decoded document.
pub fn extract_from_str(text: &str, origin: &str, options: &XmiOptions) -> Extraction {
    match read_catalogue(text, origin, options) {
        Ok(extraction) => extraction,
        Err(err) => {
            warn!(source = origin, error = %err, "XMI document rejected");
            Extraction::failed(CatalogueSource::Xmi, origin, &err)
        }
    }
}

fn read_catalogue(text: &str, origin: &str, options: &XmiOptions) -> Result<Extraction> {
    let mut parsing = ParsingOptions::default();
    parsing.allow_dtd = true;
    let document = Document::parse_with_options(text, parsing).map_err(|err| Error::malformed(origin, err))?;
    let arena = Arena::collect(&document);
    let domains = value_domains(&arena);

    let mut builder = CatalogueBuilder::new(CatalogueSource::Xmi, origin);
    let mut skipped = 0usize;
    for classifier in arena.features() {
        let (stereotype, description) = describe(&arena, classifier);
        if !options.accepts(stereotype.as_deref()) {
            skipped += 1;
            continue;
        }

        let diagnostics = builder.diagnostics_mut();
        let attributes = match classifier.dialect {
            Dialect::Uml13 => uml13::attributes(&arena, classifier, DEFAULT_ATTRIBUTE_TYPE, origin, diagnostics),
            Dialect::Uml2 => uml2::attributes(&arena, classifier, DEFAULT_ATTRIBUTE_TYPE, origin, diagnostics),
        };
        let mut feature_type = FeatureType::new(classifier.name.clone())
            .with_stereotype(stereotype)
            .with_description(description)
            .with_abstract(classifier.is_abstract);
        for mut attribute in attributes {
            if let Some(values) = domains.get(attribute.type_name.as_str()) {
                attribute.values = values.clone();
            }
            feature_type.push_attribute(attribute);
        }
        builder.push_feature_type(feature_type);
    }
    if skipped > 0 {
        debug!(skipped, "classifiers outside the stereotype filter");
    }

    let diagnostics = builder.diagnostics_mut();
    let mut relations = uml13::generalizations(&document, &arena, origin, diagnostics);
    relations.extend(uml2::generalizations(&arena, origin, diagnostics));
    relations.extend(uml13::associations(&document, &arena, origin, diagnostics));
    relations.extend(uml2::associations(&document, &arena, origin, diagnostics));
    for association in relations {
        builder.push_association(association);
    }

    let extraction = builder.finish();
    info!(
        source = origin,
        feature_types = extraction.catalogue.len(),
        associations = extraction.catalogue.associations().len(),
        "extracted XMI feature types"
    );
    Ok(extraction)
}

/// Inline stereotype and description of a classifier, falling back to what
/// was attached from outside the element.
fn describe(arena: &Arena<'_, '_>, classifier: &Classifier<'_, '_>) -> (Option<String>, Option<String>) {
    let (inline_stereotype, inline_description) = match classifier.dialect {
        Dialect::Uml13 => uml13::describe(classifier),
        Dialect::Uml2 => uml2::describe(classifier),
    };
    let notes = arena.notes(classifier.id);
    (
        inline_stereotype.or_else(|| notes.and_then(|notes| notes.stereotype.clone())),
        inline_description.or_else(|| notes.and_then(|notes| notes.documentation.clone())),
    )
}

/// Listed values keyed by classifier name; the first classifier of a name
/// wins.
fn value_domains<'a>(arena: &'a Arena<'_, '_>) -> HashMap<&'a str, Vec<ListedValue>> {
    let mut domains = HashMap::new();
    for classifier in arena.classifiers() {
        let is_domain = classifier.is_enumeration()
            || describe(arena, classifier).0.is_some_and(|stereotype| {
                VALUE_DOMAIN_STEREOTYPES
                    .iter()
                    .any(|wanted| wanted.eq_ignore_ascii_case(&stereotype))
            });
        if !is_domain || classifier.name.is_empty() {
            continue;
        }
        let values = match classifier.dialect {
            Dialect::Uml13 => uml13::listed_values(classifier),
            Dialect::Uml2 => uml2::listed_values(arena, classifier),
        };
        if !values.is_empty() {
            domains.entry(classifier.name.as_str()).or_insert(values);
        }
    }
    domains
}

/// Fall back to 1..1 when a declared multiplicity is not usable.
fn multiplicity_or_default(
    declared: Result<Multiplicity>,
    subject: &str,
    origin: &str,
    diagnostics: &mut Diagnostics,
) -> Multiplicity {
    declared.unwrap_or_else(|err| {
        diagnostics.warn(
            origin,
            DiagnosticKind::InvalidMultiplicity,
            format!("{subject}: {err}; using 1..1"),
        );
        Multiplicity::EXACTLY_ONE
    })
}
