//! OGC API Features extractor.
//!
//! Walks a `/collections` listing (or a landing page that links to one) and
//! turns every collection into a feature type. Each collection is processed
//! on its own: a schema that cannot be fetched or parsed costs that
//! collection its attributes and leaves a diagnostic, nothing more. Schema
//! fetches run on a small bounded pool so a large listing does not flood the
//! remote service.

mod gml;
mod links;
mod schema;

use crate::catalogue::{CatalogueBuilder, CatalogueSource, Extraction, FeatureType};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::{Error, Result};
use crate::fetch::{Fetch, resolve_href};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, info, warn};

const DEFAULT_WORKERS: usize = 4;

pub struct OgcExtractor<F> {
    fetcher: F,
    workers: usize,
}

/// Outcome of one collection; diagnostics travel with it so the parallel
/// pass needs no shared state.
struct CollectionOutcome {
    feature_type: Option<FeatureType>,
    diagnostics: Diagnostics,
}

impl<F: Fetch> OgcExtractor<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            workers: DEFAULT_WORKERS,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Extract a catalogue; never fails, problems land in the diagnostics.
    pub fn extract(&self, collections_url: &str) -> Extraction {
        let (listing_url, collections) = match self.list_collections(collections_url) {
            Ok(found) => found,
            Err(err) => {
                warn!(url = collections_url, error = %err, "collections listing unavailable");
                return Extraction::failed(CatalogueSource::Ogc, collections_url, &err);
            }
        };
        info!(
            url = %listing_url,
            collections = collections.len(),
            workers = self.workers,
            "extracting OGC feature types"
        );

        let outcomes = self.run_collections(&listing_url, &collections);

        let mut builder = CatalogueBuilder::new(CatalogueSource::Ogc, listing_url.as_str());
        for outcome in outcomes {
            builder.diagnostics_mut().extend(outcome.diagnostics);
            if let Some(feature_type) = outcome.feature_type {
                builder.push_feature_type(feature_type);
            }
        }
        builder.finish()
    }

    fn run_collections(&self, listing_url: &str, collections: &[Value]) -> Vec<CollectionOutcome> {
        match ThreadPoolBuilder::new().num_threads(self.workers).build() {
            Ok(pool) => pool.install(|| {
                collections
                    .par_iter()
                    .map(|collection| self.extract_collection(listing_url, collection))
                    .collect()
            }),
            Err(err) => {
                warn!(error = %err, "worker pool unavailable; fetching sequentially");
                collections
                    .iter()
                    .map(|collection| self.extract_collection(listing_url, collection))
                    .collect()
            }
        }
    }

    /// Locate the collections array, following a landing page link if needed.
    /// Returns the URL the array was read from, for resolving relative links.
    fn list_collections(&self, url: &str) -> Result<(String, Vec<Value>)> {
        let payload = self.fetcher.get(url, None)?.json()?;
        if let Some(collections) = payload.get("collections").and_then(Value::as_array) {
            return Ok((url.to_string(), collections.clone()));
        }

        if let Some(href) = links::find_link(&payload, links::COLLECTIONS_RELS) {
            let target = resolve_href(url, href)?;
            debug!(from = url, to = %target, "following collections link");
            let follow = self.fetcher.get(&target, None)?.json()?;
            if let Some(collections) = follow.get("collections").and_then(Value::as_array) {
                return Ok((target, collections.clone()));
            }
            return Err(Error::malformed(target, "linked document has no 'collections' array"));
        }

        match payload {
            Value::Array(items) => Ok((url.to_string(), items)),
            _ => Err(Error::malformed(url, "response has no 'collections' array")),
        }
    }

    fn extract_collection(&self, listing_url: &str, collection: &Value) -> CollectionOutcome {
        let mut diagnostics = Diagnostics::new();
        let name = ["id", "title"]
            .iter()
            .find_map(|key| collection.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .filter(|name| !name.is_empty());
        let Some(name) = name else {
            diagnostics.warn(
                listing_url,
                DiagnosticKind::MalformedSource,
                "skipping collection without 'id' or 'title'",
            );
            return CollectionOutcome {
                feature_type: None,
                diagnostics,
            };
        };
        let origin = format!("{listing_url}#{name}");

        let mut schema_url = self.link_in(collection, listing_url, links::SCHEMA_RELS, &origin, &mut diagnostics);
        let mut queryables_url =
            self.link_in(collection, listing_url, links::QUERYABLES_RELS, &origin, &mut diagnostics);

        let mut detail: Option<Value> = None;
        if schema_url.is_none() || queryables_url.is_none() {
            if let Some(self_url) =
                self.link_in(collection, listing_url, links::SELF_RELS, &origin, &mut diagnostics)
            {
                match self.fetcher.get(&self_url, None).and_then(|doc| doc.json()) {
                    Ok(value) => {
                        if schema_url.is_none() {
                            schema_url =
                                self.link_in(&value, &self_url, links::SCHEMA_RELS, &origin, &mut diagnostics);
                        }
                        if queryables_url.is_none() {
                            queryables_url = self.link_in(
                                &value,
                                &self_url,
                                links::QUERYABLES_RELS,
                                &origin,
                                &mut diagnostics,
                            );
                        }
                        detail = Some(value);
                    }
                    Err(err) => diagnostics.warn(
                        origin.clone(),
                        DiagnosticKind::SourceUnavailable,
                        format!("collection detail unavailable: {err}"),
                    ),
                }
            }
        }

        let mut schemas = Vec::new();
        for url in [schema_url, queryables_url].into_iter().flatten() {
            match self.load_schema(&url) {
                Ok(Some(schema)) => schemas.push(schema),
                Ok(None) => debug!(url = %url, "schema document describes no properties"),
                Err(err) => diagnostics.record_error(origin.clone(), &err),
            }
        }
        if schemas.is_empty() {
            debug!(collection = name, "no schema retrieved; attributes left empty");
        }

        let mut documents: Vec<&Value> = schemas.iter().collect();
        documents.extend(detail.as_ref());
        documents.push(collection);
        let mut feature_type = FeatureType::new(name).with_description(describe(collection, name));
        for attribute in schema::collect_attributes(&documents) {
            feature_type.push_attribute(attribute);
        }

        CollectionOutcome {
            feature_type: Some(feature_type),
            diagnostics,
        }
    }

    fn link_in(
        &self,
        document: &Value,
        base: &str,
        rels: &[&str],
        origin: &str,
        diagnostics: &mut Diagnostics,
    ) -> Option<String> {
        let href = links::find_link(document, rels)?;
        match resolve_href(base, href) {
            Ok(url) => Some(url),
            Err(err) => {
                diagnostics.record_error(origin, &err);
                None
            }
        }
    }

    fn load_schema(&self, url: &str) -> Result<Option<Value>> {
        let document = self.fetcher.get(url, None)?;
        if document.is_xml() {
            return gml::parse_gml_schema(&document.text(), url);
        }
        let value = document.json()?;
        if !value.is_object() {
            return Err(Error::malformed(url, "schema is not a JSON object"));
        }
        Ok(Some(value))
    }
}

/// Collection description, else its title when that adds something.
fn describe(collection: &Value, name: &str) -> Option<String> {
    let text = |key: &str| {
        collection
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };
    text("description")
        .or_else(|| text("title").filter(|title| *title != name))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn description_prefers_description_then_distinct_title() {
        let with_both = json!({"id": "roads", "title": "Roads", "description": "Road network"});
        assert_eq!(describe(&with_both, "roads").as_deref(), Some("Road network"));
        let title_only = json!({"id": "roads", "title": "Veger"});
        assert_eq!(describe(&title_only, "roads").as_deref(), Some("Veger"));
        let same = json!({"title": "roads"});
        assert_eq!(describe(&same, "roads"), None);
    }
}
