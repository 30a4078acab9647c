//! Runtime configuration read from the environment.
//!
//! Binaries start from [`PipelineConfig::from_env`] and then apply their
//! command-line flags on top, so flags always win.

use crate::fetch::Credentials;
use std::time::Duration;

pub const ENV_HTTP_TIMEOUT_SECS: &str = "FEATURE_CATALOGUE_HTTP_TIMEOUT_SECS";
pub const ENV_OGC_WORKERS: &str = "FEATURE_CATALOGUE_OGC_WORKERS";
pub const ENV_XMI_USERNAME: &str = "FEATURE_CATALOGUE_XMI_USERNAME";
pub const ENV_XMI_PASSWORD: &str = "FEATURE_CATALOGUE_XMI_PASSWORD";

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_OGC_WORKERS: usize = 4;
const MAX_OGC_WORKERS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub http_timeout: Duration,
    /// Concurrent per-collection fetches against one OGC service.
    pub ogc_workers: usize,
    pub xmi_credentials: Credentials,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            ogc_workers: DEFAULT_OGC_WORKERS,
            xmi_credentials: Credentials::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset, blank or unparsable values
    /// keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let http_timeout = read(ENV_HTTP_TIMEOUT_SECS)
            .and_then(|raw| raw.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.http_timeout);
        let ogc_workers = read(ENV_OGC_WORKERS)
            .and_then(|raw| raw.parse::<usize>().ok())
            .unwrap_or(defaults.ogc_workers)
            .clamp(1, MAX_OGC_WORKERS);
        let username = read(ENV_XMI_USERNAME).unwrap_or(defaults.xmi_credentials.username);
        let password = read(ENV_XMI_PASSWORD).unwrap_or(defaults.xmi_credentials.password);

        Self {
            http_timeout,
            ogc_workers,
            xmi_credentials: Credentials::new(username, password),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = PipelineConfig::from_lookup(lookup(&[]));
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.xmi_credentials.username, "sosi");
        assert_eq!(config.xmi_credentials.password, "sosi");
    }

    #[test]
    fn overrides_and_clamps() {
        let config = PipelineConfig::from_lookup(lookup(&[
            (ENV_HTTP_TIMEOUT_SECS, "5"),
            (ENV_OGC_WORKERS, "64"),
            (ENV_XMI_USERNAME, "alice"),
            (ENV_XMI_PASSWORD, " "),
        ]));
        assert_eq!(config.http_timeout, Duration::from_secs(5));
        assert_eq!(config.ogc_workers, MAX_OGC_WORKERS);
        assert_eq!(config.xmi_credentials.username, "alice");
        assert_eq!(config.xmi_credentials.password, "sosi");
    }

    #[test]
    fn garbage_values_fall_back() {
        let config = PipelineConfig::from_lookup(lookup(&[
            (ENV_HTTP_TIMEOUT_SECS, "soon"),
            (ENV_OGC_WORKERS, "0"),
        ]));
        assert_eq!(config.http_timeout, Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS));
        assert_eq!(config.ogc_workers, 1);
    }
}
