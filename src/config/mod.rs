//! Configuration for an audit run.
//!
//! # Resolution order
//!
//! Each layer is a partial [`Settings`]; later layers override earlier ones:
//!
//! 1. Built-in defaults
//! 2. JSON settings file (`--config`, or `~/.config/jobboard-audit/settings.json`)
//! 3. Environment (`SUPABASE_URL` / `SUPABASE_ANON_KEY`, with `VITE_` fallbacks)
//! 4. Command-line flags
//!
//! The endpoint and credential are only required when auditing a live store;
//! [`AuditConfig::credentials`] enforces that at startup.

pub mod loader;

use crate::audit::DEFAULT_SAMPLE_LIMIT;
use crate::error::{AuditError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variables holding the store endpoint, in lookup order.
pub const ENDPOINT_VARS: [&str; 2] = ["SUPABASE_URL", "VITE_SUPABASE_URL"];

/// Environment variables holding the store credential, in lookup order.
pub const API_KEY_VARS: [&str; 2] = ["SUPABASE_ANON_KEY", "VITE_SUPABASE_ANON_KEY"];

pub const DEFAULT_SOURCE_ROOT: &str = "src";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// One partial configuration layer.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub source_root: Option<PathBuf>,
    pub row_sample_limit: Option<usize>,
    pub request_timeout_secs: Option<u64>,
    pub report_path: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
}

impl Settings {
    /// Read endpoint and credential through `lookup`, skipping blank values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let first = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| lookup(name))
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty())
        };
        Settings {
            endpoint: first(&ENDPOINT_VARS),
            api_key: first(&API_KEY_VARS),
            ..Settings::default()
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Overlay `other` on top of `self`.
    pub fn merge(self, other: Settings) -> Settings {
        Settings {
            endpoint: other.endpoint.or(self.endpoint),
            api_key: other.api_key.or(self.api_key),
            source_root: other.source_root.or(self.source_root),
            row_sample_limit: other.row_sample_limit.or(self.row_sample_limit),
            request_timeout_secs: other.request_timeout_secs.or(self.request_timeout_secs),
            report_path: other.report_path.or(self.report_path),
            log_dir: other.log_dir.or(self.log_dir),
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("source_root", &self.source_root)
            .field("row_sample_limit", &self.row_sample_limit)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("report_path", &self.report_path)
            .field("log_dir", &self.log_dir)
            .finish()
    }
}

/// Endpoint and credential for a live store.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub endpoint: String,
    pub api_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"***")
            .finish()
    }
}

/// Fully resolved configuration.
#[derive(Clone)]
pub struct AuditConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub source_root: PathBuf,
    pub row_sample_limit: usize,
    pub request_timeout_secs: u64,
    pub report_path: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        AuditConfig {
            endpoint: None,
            api_key: None,
            source_root: PathBuf::from(DEFAULT_SOURCE_ROOT),
            row_sample_limit: DEFAULT_SAMPLE_LIMIT,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            report_path: None,
            log_dir: None,
        }
    }
}

impl AuditConfig {
    /// Apply layers in order over the defaults.
    pub fn resolve(layers: impl IntoIterator<Item = Settings>) -> Self {
        let merged = layers
            .into_iter()
            .fold(Settings::default(), Settings::merge);
        let defaults = AuditConfig::default();
        AuditConfig {
            endpoint: merged.endpoint.filter(|v| !v.trim().is_empty()),
            api_key: merged.api_key.filter(|v| !v.trim().is_empty()),
            source_root: merged.source_root.unwrap_or(defaults.source_root),
            row_sample_limit: merged
                .row_sample_limit
                .unwrap_or(defaults.row_sample_limit)
                .max(1),
            request_timeout_secs: merged
                .request_timeout_secs
                .unwrap_or(defaults.request_timeout_secs),
            report_path: merged.report_path,
            log_dir: merged.log_dir,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Endpoint and credential, or the first missing variable.
    pub fn credentials(&self) -> Result<Credentials> {
        let endpoint = self
            .endpoint
            .clone()
            .ok_or_else(|| AuditError::ConfigurationMissing(ENDPOINT_VARS[0].to_string()))?;
        let api_key = self
            .api_key
            .clone()
            .ok_or_else(|| AuditError::ConfigurationMissing(API_KEY_VARS[0].to_string()))?;

        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(AuditError::InvalidConfig(format!(
                "Endpoint must start with http:// or https://, got {}",
                endpoint
            )));
        }
        Ok(Credentials { endpoint, api_key })
    }
}

impl fmt::Debug for AuditConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("source_root", &self.source_root)
            .field("row_sample_limit", &self.row_sample_limit)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("report_path", &self.report_path)
            .field("log_dir", &self.log_dir)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AuditConfig::resolve(Vec::new());
        assert_eq!(config.source_root, PathBuf::from("src"));
        assert_eq!(config.row_sample_limit, 100);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.endpoint.is_none());
    }

    #[test]
    fn test_env_prefers_primary_names() {
        let settings = Settings::from_lookup(lookup(&[
            ("SUPABASE_URL", "https://primary.test"),
            ("VITE_SUPABASE_URL", "https://vite.test"),
            ("VITE_SUPABASE_ANON_KEY", "anon"),
        ]));
        assert_eq!(settings.endpoint.as_deref(), Some("https://primary.test"));
        assert_eq!(settings.api_key.as_deref(), Some("anon"));
    }

    #[test]
    fn test_blank_env_falls_back() {
        let settings = Settings::from_lookup(lookup(&[
            ("SUPABASE_URL", "   "),
            ("VITE_SUPABASE_URL", "https://vite.test"),
        ]));
        assert_eq!(settings.endpoint.as_deref(), Some("https://vite.test"));
        assert!(settings.api_key.is_none());
    }

    #[test]
    fn test_later_layers_win() {
        let file = Settings {
            endpoint: Some("https://file.test".into()),
            row_sample_limit: Some(10),
            ..Settings::default()
        };
        let env = Settings::from_lookup(lookup(&[("SUPABASE_URL", "https://env.test")]));
        let cli = Settings {
            row_sample_limit: Some(5),
            ..Settings::default()
        };
        let config = AuditConfig::resolve(vec![file, env, cli]);
        assert_eq!(config.endpoint.as_deref(), Some("https://env.test"));
        assert_eq!(config.row_sample_limit, 5);
    }

    #[test]
    fn test_missing_credentials() {
        let config = AuditConfig::resolve(vec![Settings::from_lookup(lookup(&[]))]);
        let err = config.credentials().unwrap_err();
        assert!(matches!(err, AuditError::ConfigurationMissing(ref v) if v == "SUPABASE_URL"));
        assert_eq!(err.exit_code(), 2);

        let config = AuditConfig::resolve(vec![Settings::from_lookup(lookup(&[(
            "SUPABASE_URL",
            "https://db.test",
        )]))]);
        assert!(matches!(
            config.credentials(),
            Err(AuditError::ConfigurationMissing(ref v)) if v == "SUPABASE_ANON_KEY"
        ));
    }

    #[test]
    fn test_endpoint_scheme_is_checked() {
        let config = AuditConfig::resolve(vec![Settings {
            endpoint: Some("db.test".into()),
            api_key: Some("k".into()),
            ..Settings::default()
        }]);
        assert!(matches!(config.credentials(), Err(AuditError::InvalidConfig(_))));
    }

    #[test]
    fn test_debug_masks_key() {
        let config = AuditConfig::resolve(vec![Settings {
            endpoint: Some("https://db.test".into()),
            api_key: Some("super-secret".into()),
            ..Settings::default()
        }]);
        let rendered = format!("{:?} {:?}", config, config.credentials().unwrap());
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("***"));
    }
}
