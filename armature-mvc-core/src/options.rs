//! MVC options.
//!
//! A single [`MvcOptions`] value is shared read-only by every request.
//! It can be built in code, parsed from TOML, or read from
//! `ARMATURE_MVC_*` environment variables.
//!
//! ```
//! use armature_mvc_core::options::MvcOptions;
//!
//! let options = MvcOptions::new()
//!     .return_http_not_acceptable(true)
//!     .https_port(8443);
//! assert!(options.return_http_not_acceptable);
//! ```

use crate::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;

/// Default request body limit, roughly 28.6 MB.
pub const DEFAULT_MAX_REQUEST_BODY_SIZE: u64 = 30_000_000;

/// Prefix for environment-sourced options.
pub const ENV_PREFIX: &str = "ARMATURE_MVC";

/// Options that shape filter and result behaviour.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MvcOptions {
    /// Answer 406 when no formatter satisfies the Accept header instead of
    /// falling back to the first formatter that can write the value.
    pub return_http_not_acceptable: bool,
    /// When false, an Accept header containing `*/*` is ignored, since
    /// browsers send it alongside their real preferences.
    pub respect_browser_accept_header: bool,
    /// Initial value of the request body size feature; `None` means unlimited.
    pub max_request_body_size: Option<u64>,
    /// Port used when redirecting plain HTTP requests to HTTPS.
    pub https_port: Option<u16>,
    /// Use permanent redirects for the HTTPS requirement.
    pub require_https_permanent: bool,
    /// Null object values produce 204 rather than a `null` body.
    pub treat_null_value_as_no_content: bool,
    /// Default for file results that don't set range processing explicitly.
    pub enable_range_processing: bool,
}

impl Default for MvcOptions {
    fn default() -> Self {
        Self {
            return_http_not_acceptable: false,
            respect_browser_accept_header: false,
            max_request_body_size: Some(DEFAULT_MAX_REQUEST_BODY_SIZE),
            https_port: None,
            require_https_permanent: false,
            treat_null_value_as_no_content: true,
            enable_range_processing: false,
        }
    }
}

impl MvcOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn return_http_not_acceptable(mut self, enabled: bool) -> Self {
        self.return_http_not_acceptable = enabled;
        self
    }

    pub fn respect_browser_accept_header(mut self, enabled: bool) -> Self {
        self.respect_browser_accept_header = enabled;
        self
    }

    pub fn max_request_body_size(mut self, limit: Option<u64>) -> Self {
        self.max_request_body_size = limit;
        self
    }

    pub fn https_port(mut self, port: u16) -> Self {
        self.https_port = Some(port);
        self
    }

    pub fn require_https_permanent(mut self, permanent: bool) -> Self {
        self.require_https_permanent = permanent;
        self
    }

    pub fn treat_null_value_as_no_content(mut self, enabled: bool) -> Self {
        self.treat_null_value_as_no_content = enabled;
        self
    }

    pub fn enable_range_processing(mut self, enabled: bool) -> Self {
        self.enable_range_processing = enabled;
        self
    }

    /// Parse options from a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Configuration(format!("Invalid MVC options: {}", e)))
    }

    /// Read options from `ARMATURE_MVC_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let vars: HashMap<String, String> = env::vars()
            .filter_map(|(key, value)| {
                key.strip_prefix(ENV_PREFIX)
                    .map(|rest| (rest.trim_start_matches('_').to_lowercase(), value))
            })
            .collect();
        Self::from_pairs(&vars)
    }

    /// Apply `key -> value` overrides, with keys named like the struct fields.
    pub fn from_pairs(vars: &HashMap<String, String>) -> Result<Self> {
        let mut options = Self::default();

        for (key, value) in vars {
            match key.as_str() {
                "return_http_not_acceptable" => {
                    options.return_http_not_acceptable = parse_bool(key, value)?
                }
                "respect_browser_accept_header" => {
                    options.respect_browser_accept_header = parse_bool(key, value)?
                }
                "max_request_body_size" => {
                    options.max_request_body_size = if value.eq_ignore_ascii_case("none") {
                        None
                    } else {
                        Some(parse_number(key, value)?)
                    }
                }
                "https_port" => options.https_port = Some(parse_number(key, value)?),
                "require_https_permanent" => {
                    options.require_https_permanent = parse_bool(key, value)?
                }
                "treat_null_value_as_no_content" => {
                    options.treat_null_value_as_no_content = parse_bool(key, value)?
                }
                "enable_range_processing" => {
                    options.enable_range_processing = parse_bool(key, value)?
                }
                _ => {}
            }
        }

        Ok(options)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Configuration(format!(
            "Option '{}' expects a boolean, got '{}'",
            key, other
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        Error::Configuration(format!("Option '{}' expects a number, got '{}'", key, value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = MvcOptions::default();
        assert!(!options.return_http_not_acceptable);
        assert!(!options.respect_browser_accept_header);
        assert_eq!(options.max_request_body_size, Some(DEFAULT_MAX_REQUEST_BODY_SIZE));
        assert!(options.treat_null_value_as_no_content);
    }

    #[test]
    fn test_from_toml() {
        let options = MvcOptions::from_toml_str(
            r#"
            return_http_not_acceptable = true
            https_port = 8443
            "#,
        )
        .unwrap();
        assert!(options.return_http_not_acceptable);
        assert_eq!(options.https_port, Some(8443));
        // untouched keys keep defaults
        assert!(options.treat_null_value_as_no_content);
    }

    #[test]
    fn test_from_toml_rejects_bad_types() {
        let result = MvcOptions::from_toml_str("https_port = \"nope\"");
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_from_pairs() {
        let mut vars = HashMap::new();
        vars.insert("respect_browser_accept_header".to_string(), "yes".to_string());
        vars.insert("max_request_body_size".to_string(), "none".to_string());
        vars.insert("unknown_key".to_string(), "ignored".to_string());

        let options = MvcOptions::from_pairs(&vars).unwrap();
        assert!(options.respect_browser_accept_header);
        assert_eq!(options.max_request_body_size, None);
    }

    #[test]
    fn test_from_pairs_rejects_garbage() {
        let mut vars = HashMap::new();
        vars.insert("https_port".to_string(), "eighty".to_string());
        assert!(MvcOptions::from_pairs(&vars).is_err());
    }

    #[test]
    fn test_from_env_without_vars_uses_defaults() {
        // Nothing in the test environment sets ARMATURE_MVC_* variables.
        assert!(MvcOptions::from_env().is_ok());
    }
}
