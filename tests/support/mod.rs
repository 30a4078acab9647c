use anyhow::{Context, Result, bail};
use feature_catalogue::{Credentials, Error, Fetch, FetchedDocument};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::Mutex;

pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn helper_binary(name: &str) -> PathBuf {
    let path = match name {
        "catalogue-extract" => env!("CARGO_BIN_EXE_catalogue-extract"),
        "catalogue-render" => env!("CARGO_BIN_EXE_catalogue-render"),
        "spec-assemble" => env!("CARGO_BIN_EXE_spec-assemble"),
        other => panic!("unknown helper binary {other}"),
    };
    PathBuf::from(path)
}

pub fn run_command(mut cmd: Command) -> Result<Output> {
    let output = cmd
        .output()
        .with_context(|| format!("failed to run command: {:?}", cmd))?;
    if output.status.success() {
        Ok(output)
    } else {
        bail!(
            "command {:?} failed: status {:?}\nstdout: {}\nstderr: {}",
            cmd,
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        )
    }
}

/// In-memory fetcher keyed by exact URL. Unknown URLs are unavailable, and
/// every request is logged with the credentials it carried.
#[derive(Default)]
pub struct StaticFetcher {
    documents: BTreeMap<String, (Option<String>, Vec<u8>)>,
    requests: Mutex<Vec<(String, Option<Credentials>)>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn json(mut self, url: &str, value: Value) -> Self {
        self.documents.insert(
            url.to_string(),
            (Some("application/json".to_string()), value.to_string().into_bytes()),
        );
        self
    }

    pub fn xml(mut self, url: &str, body: &str) -> Self {
        self.documents.insert(
            url.to_string(),
            (Some("application/xml".to_string()), body.as_bytes().to_vec()),
        );
        self
    }

    pub fn requests(&self) -> Vec<(String, Option<Credentials>)> {
        self.requests
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .clone()
    }

    pub fn requested(&self, url: &str) -> bool {
        self.requests().iter().any(|(seen, _)| seen == url)
    }
}

impl Fetch for StaticFetcher {
    fn get(&self, url: &str, credentials: Option<&Credentials>) -> feature_catalogue::Result<FetchedDocument> {
        self.requests
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .push((url.to_string(), credentials.cloned()));
        match self.documents.get(url) {
            Some((content_type, body)) => Ok(FetchedDocument::new(url, content_type.as_deref(), body.clone())),
            None => Err(Error::SourceUnavailable {
                source_ref: url.to_string(),
                reason: "HTTP 404 Not Found".to_string(),
            }),
        }
    }
}
