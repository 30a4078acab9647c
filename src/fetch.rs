//! Network collaborator used by both extractors.
//!
//! Extractors depend on the [`Fetch`] trait only; [`HttpFetcher`] is the
//! production implementation and tests swap in an in-memory map. Credentials
//! are passed through untouched.

use crate::error::{Error, Result};
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Default account for the SOSI model registry that hosts most XMI exports.
const DEFAULT_USERNAME: &str = "sosi";
const DEFAULT_PASSWORD: &str = "sosi";

const ACCEPT_HEADER: &str =
    "application/json, application/schema+json, application/geo+json;q=0.9, application/xml;q=0.8, */*;q=0.5";

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new(DEFAULT_USERNAME, DEFAULT_PASSWORD)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Debug)]
/// Fully buffered response body.
pub struct FetchedDocument {
    pub url: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl FetchedDocument {
    pub fn new(url: impl Into<String>, content_type: Option<&str>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            url: url.into(),
            content_type: content_type.map(str::to_string),
            body: body.into(),
        }
    }

    pub fn text(&self) -> String {
        decode_text(&self.body)
    }

    pub fn json(&self) -> Result<Value> {
        serde_json::from_slice(strip_bom(&self.body)).map_err(|err| Error::malformed(&self.url, err))
    }

    /// True for XML media types or bodies that open with a tag.
    pub fn is_xml(&self) -> bool {
        if let Some(content_type) = &self.content_type {
            let lowered = content_type.to_ascii_lowercase();
            if lowered.contains("json") {
                return false;
            }
            if lowered.contains("xml") {
                return true;
            }
        }
        strip_bom(&self.body)
            .iter()
            .find(|b| !b.is_ascii_whitespace())
            .is_some_and(|b| *b == b'<')
    }
}

/// Blocking GET of a whole document.
pub trait Fetch: Send + Sync {
    fn get(&self, url: &str, credentials: Option<&Credentials>) -> Result<FetchedDocument>;
}

impl<F: Fetch + ?Sized> Fetch for &F {
    fn get(&self, url: &str, credentials: Option<&Credentials>) -> Result<FetchedDocument> {
        (**self).get(url, credentials)
    }
}

#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("feature-catalogue/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| Error::unavailable("http client", err))?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn get(&self, url: &str, credentials: Option<&Credentials>) -> Result<FetchedDocument> {
        debug!(url, authenticated = credentials.is_some(), "fetching");
        let mut request = self.client.get(url).header(ACCEPT, ACCEPT_HEADER);
        if let Some(credentials) = credentials {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }
        let response = request.send().map_err(|err| Error::unavailable(url, err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::unavailable(url, format!("HTTP {status}")));
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().map_err(|err| Error::unavailable(url, err))?;
        Ok(FetchedDocument {
            url: url.to_string(),
            content_type,
            body: body.to_vec(),
        })
    }
}

/// Resolve `href` against the URL of the document it appeared in.
pub fn resolve_href(base: &str, href: &str) -> Result<String> {
    if let Ok(absolute) = Url::parse(href) {
        return Ok(absolute.to_string());
    }
    let base_url = Url::parse(base).map_err(|err| Error::malformed(base, err))?;
    base_url
        .join(href)
        .map(|url| url.to_string())
        .map_err(|err| Error::malformed(base, format!("cannot resolve '{href}': {err}")))
}

pub fn is_remote(location: &str) -> bool {
    let lowered = location.trim_start().to_ascii_lowercase();
    lowered.starts_with("http://") || lowered.starts_with("https://")
}

/// Decode bytes as UTF-8, falling back to Windows-1252 (a Latin-1 superset)
/// for legacy exports.
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = strip_bom(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|b| windows_1252_char(*b)).collect(),
    }
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
}

fn windows_1252_char(byte: u8) -> char {
    // 0x80..=0x9F differ from Latin-1; the five undefined slots keep their C1 code point.
    const HIGH: [char; 32] = [
        '\u{20AC}', '\u{0081}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}',
        '\u{2021}', '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{008D}',
        '\u{017D}', '\u{008F}', '\u{0090}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}',
        '\u{2022}', '\u{2013}', '\u{2014}', '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}',
        '\u{0153}', '\u{009D}', '\u{017E}', '\u{0178}',
    ];
    match byte {
        0x80..=0x9F => HIGH[(byte - 0x80) as usize],
        other => char::from(other),
    }
}
