//! JSON Schema loading for the catalogue cache.
//!
//! The cache written by the JSON renderer is consumed again by later pipeline
//! stages; loading goes through a compiled validator so a hand-edited or stale
//! cache fails with every violation listed instead of a single serde error.

use anyhow::{Context, Result, anyhow, bail};
use jsonschema::JSONSchema;
use serde_json::Value;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

pub const CATALOGUE_SCHEMA_ID: &str = "feature_catalogue_v1";
const CATALOGUE_SCHEMA_RELATIVE: &str = "schema/feature_catalogue.schema.json";

/// Result of loading and compiling a JSON Schema.
pub(crate) struct SchemaLoadResult {
    pub schema_id: Option<String>,
    pub compiled: JSONSchema,
}

/// Controls how schemas are checked before compilation.
pub(crate) struct SchemaLoadOptions<'a> {
    /// Reject schemas whose `$id` differs from this value.
    pub expected_id: Option<&'a str>,
}

impl Default for SchemaLoadOptions<'_> {
    fn default() -> Self {
        Self {
            expected_id: Some(CATALOGUE_SCHEMA_ID),
        }
    }
}

pub(crate) fn load_json_schema(path: &Path, options: SchemaLoadOptions<'_>) -> Result<SchemaLoadResult> {
    let schema: Value = serde_json::from_reader(BufReader::new(
        File::open(path).with_context(|| format!("opening schema {}", path.display()))?,
    ))
    .with_context(|| format!("parsing schema {}", path.display()))?;

    let schema_id = schema.get("$id").and_then(Value::as_str).map(str::to_string);
    if let Some(expected) = options.expected_id {
        if schema_id.as_deref() != Some(expected) {
            bail!(
                "schema {} declares $id {:?}, expected '{}'",
                path.display(),
                schema_id,
                expected
            );
        }
    }

    let compiled = JSONSchema::compile(&schema)
        .map_err(|err| anyhow!("compiling schema {}: {err}", path.display()))?;

    Ok(SchemaLoadResult {
        schema_id,
        compiled,
    })
}

/// Validate `value`, collecting every violation into one error.
pub(crate) fn validate_value(schema: &SchemaLoadResult, value: &Value, label: &str) -> Result<()> {
    if let Err(errors) = schema.compiled.validate(value) {
        let details = errors
            .map(|err| format!("{}: {err}", err.instance_path))
            .collect::<Vec<_>>()
            .join("\n");
        bail!("{label} failed schema validation:\n{details}");
    }
    Ok(())
}

/// Locate the catalogue schema: next to the cache first, then the crate copy.
pub fn resolve_catalogue_schema_path(cache_path: &Path) -> PathBuf {
    for base in cache_path.ancestors().skip(1).take(3) {
        let candidate = base.join(CATALOGUE_SCHEMA_RELATIVE);
        if candidate.is_file() {
            return candidate;
        }
    }
    canonical_catalogue_schema_path()
}

pub fn canonical_catalogue_schema_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(CATALOGUE_SCHEMA_RELATIVE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_schema_compiles_and_checks_id() {
        let schema =
            load_json_schema(&canonical_catalogue_schema_path(), SchemaLoadOptions::default())
                .unwrap();
        assert_eq!(schema.schema_id.as_deref(), Some(CATALOGUE_SCHEMA_ID));

        let wrong = load_json_schema(
            &canonical_catalogue_schema_path(),
            SchemaLoadOptions {
                expected_id: Some("something_else"),
            },
        );
        assert!(wrong.is_err());
    }

    #[test]
    fn validation_lists_violations() {
        let schema =
            load_json_schema(&canonical_catalogue_schema_path(), SchemaLoadOptions::default())
                .unwrap();
        let good = json!([{
            "name": "roads",
            "description": null,
            "attributes": [{
                "name": "name",
                "type": "string",
                "multiplicity": {"lower": 1, "upper": 1},
                "description": null
            }]
        }]);
        assert!(validate_value(&schema, &good, "cache").is_ok());

        let bad = json!([{
            "name": "roads",
            "attributes": [{"name": "length", "type": "integer", "multiplicity": {"lower": 0, "upper": "many"}}]
        }]);
        let err = validate_value(&schema, &bad, "cache").unwrap_err();
        assert!(err.to_string().contains("failed schema validation"));
    }
}
