//! Configuration management for the chat proxy server.
//!
//! Server settings come from the process environment once at startup.
//! Upstream provider settings are resolved per request into a
//! [`ProviderConfig`], so a changed environment takes effect on the next call.

use serde::{Deserialize, Serialize};

/// Default base URL for the standard (OpenAI-compatible) branch.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Model sent upstream on the standard branch.
pub const DEFAULT_MODEL: &str = "claude-3-haiku";

/// Azure OpenAI REST API version used in deployment URLs.
pub const AZURE_API_VERSION: &str = "2024-02-01";

pub const ENV_AZURE_BASE_URL: &str = "AZURE_OPENAI_API_BASE_URL";
pub const ENV_AZURE_DEPLOYMENT: &str = "AZURE_OPENAI_DEPLOYMENT";
pub const ENV_AZURE_API_KEY: &str = "AZURE_OPENAI_API_KEY";
pub const ENV_OPENAI_BASE_URL: &str = "OPENAI_API_BASE_URL";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port)
    #[serde(default)]
    pub server: ServerConfig,

    /// Whether to verify SSL certificates for upstream requests
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,

    /// Connect timeout in seconds for upstream providers
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Server-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            verify_ssl: default_verify_ssl(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_verify_ssl() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    300
}

impl AppConfig {
    /// Build configuration from environment variables, falling back to defaults.
    ///
    /// Recognized variables: `HOST`, `PORT`, `VERIFY_SSL`, `REQUEST_TIMEOUT_SECS`.
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = AppConfig::default();

        if let Some(host) = lookup("HOST").filter(|h| !h.is_empty()) {
            config.server.host = host;
        }

        if let Some(port_str) = lookup("PORT") {
            match port_str.parse::<u16>() {
                Ok(port) => config.server.port = port,
                Err(_) => tracing::warn!(value = %port_str, "Ignoring invalid PORT"),
            }
        }

        if let Some(verify_ssl_str) = lookup("VERIFY_SSL") {
            config.verify_ssl = str_to_bool(&verify_ssl_str);
        }

        if let Some(timeout_str) = lookup("REQUEST_TIMEOUT_SECS") {
            match timeout_str.parse::<u64>() {
                Ok(timeout) => config.request_timeout_secs = timeout,
                Err(_) => {
                    tracing::warn!(value = %timeout_str, "Ignoring invalid REQUEST_TIMEOUT_SECS")
                }
            }
        }

        config
    }
}

/// Upstream chat-completion provider, resolved once per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// OpenAI-compatible endpoint (`/v1/chat/completions`).
    Standard {
        base_url: String,
        api_key: String,
        model: String,
    },
    /// Azure OpenAI deployment; the deployment name implies the model.
    Azure {
        base_url: String,
        deployment: String,
        api_key: String,
    },
}

impl ProviderConfig {
    /// Resolve the provider from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve the provider from an arbitrary variable lookup.
    ///
    /// A present, non-empty `AZURE_OPENAI_API_BASE_URL` selects the Azure
    /// branch. Missing keys and deployment resolve to empty strings.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup(ENV_AZURE_BASE_URL).filter(|base| !base.is_empty()) {
            Some(base_url) => ProviderConfig::Azure {
                base_url,
                deployment: lookup(ENV_AZURE_DEPLOYMENT).unwrap_or_default(),
                api_key: lookup(ENV_AZURE_API_KEY).unwrap_or_default(),
            },
            None => ProviderConfig::Standard {
                base_url: lookup(ENV_OPENAI_BASE_URL)
                    .filter(|base| !base.is_empty())
                    .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
                api_key: lookup(ENV_OPENAI_API_KEY).unwrap_or_default(),
                model: DEFAULT_MODEL.to_string(),
            },
        }
    }

    /// Full chat-completions URL for this provider.
    pub fn api_url(&self) -> String {
        match self {
            ProviderConfig::Standard { base_url, .. } => {
                format!("{}/v1/chat/completions", strip_trailing_slash(base_url))
            }
            ProviderConfig::Azure {
                base_url,
                deployment,
                ..
            } => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                strip_trailing_slash(base_url),
                deployment,
                AZURE_API_VERSION
            ),
        }
    }

    pub fn api_key(&self) -> &str {
        match self {
            ProviderConfig::Standard { api_key, .. } | ProviderConfig::Azure { api_key, .. } => {
                api_key
            }
        }
    }

    /// Model field sent upstream. Empty for Azure.
    pub fn model(&self) -> &str {
        match self {
            ProviderConfig::Standard { model, .. } => model,
            ProviderConfig::Azure { .. } => "",
        }
    }

    /// Short label for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            ProviderConfig::Standard { .. } => "openai",
            ProviderConfig::Azure { .. } => "azure",
        }
    }
}

/// Where handlers obtain their [`ProviderConfig`].
#[derive(Debug, Clone, Default)]
pub enum ProviderSource {
    /// Re-read the environment on every request.
    #[default]
    Environment,
    /// Always use the given provider.
    Fixed(ProviderConfig),
}

impl ProviderSource {
    pub fn resolve(&self) -> ProviderConfig {
        match self {
            ProviderSource::Environment => ProviderConfig::from_env(),
            ProviderSource::Fixed(provider) => provider.clone(),
        }
    }
}

/// Remove exactly one trailing `/`, if present.
fn strip_trailing_slash(base: &str) -> &str {
    base.strip_suffix('/').unwrap_or(base)
}

/// Convert string to boolean.
///
/// Accepts: "true", "1", "yes", "on" (case-insensitive)
fn str_to_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_str_to_bool() {
        assert!(str_to_bool("true"));
        assert!(str_to_bool("TRUE"));
        assert!(str_to_bool("1"));
        assert!(str_to_bool("yes"));
        assert!(str_to_bool("On"));
        assert!(!str_to_bool("false"));
        assert!(!str_to_bool("0"));
        assert!(!str_to_bool("off"));
        assert!(!str_to_bool(""));
        assert!(!str_to_bool("invalid"));
    }

    #[test]
    fn test_default_values() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert!(config.verify_ssl);
        assert_eq!(config.request_timeout_secs, 300);
    }

    #[test]
    fn test_app_config_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("VERIFY_SSL", "false"),
            ("REQUEST_TIMEOUT_SECS", "30"),
        ]));
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert!(!config.verify_ssl);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_app_config_ignores_invalid_numbers() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("PORT", "not-a-port"),
            ("REQUEST_TIMEOUT_SECS", "-5"),
        ]));
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.request_timeout_secs, 300);
    }

    #[test]
    fn test_standard_provider_defaults() {
        let provider = ProviderConfig::from_lookup(lookup_from(&[]));
        assert_eq!(
            provider,
            ProviderConfig::Standard {
                base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
                api_key: String::new(),
                model: DEFAULT_MODEL.to_string(),
            }
        );
        assert_eq!(provider.api_url(), "https://api.openai.com/v1/chat/completions");
        assert_eq!(provider.model(), "claude-3-haiku");
    }

    #[test]
    fn test_standard_provider_with_override() {
        let provider = ProviderConfig::from_lookup(lookup_from(&[
            (ENV_OPENAI_BASE_URL, "https://proxy.local/"),
            (ENV_OPENAI_API_KEY, "sk-test"),
        ]));
        assert_eq!(provider.api_url(), "https://proxy.local/v1/chat/completions");
        assert_eq!(provider.api_key(), "sk-test");
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn test_empty_azure_base_selects_standard() {
        let provider = ProviderConfig::from_lookup(lookup_from(&[
            (ENV_AZURE_BASE_URL, ""),
            (ENV_AZURE_API_KEY, "azure-key"),
            (ENV_OPENAI_API_KEY, "sk-test"),
        ]));
        assert!(matches!(provider, ProviderConfig::Standard { .. }));
        assert_eq!(provider.api_key(), "sk-test");
    }

    #[test]
    fn test_azure_provider() {
        let provider = ProviderConfig::from_lookup(lookup_from(&[
            (ENV_AZURE_BASE_URL, "https://res.openai.azure.com/"),
            (ENV_AZURE_DEPLOYMENT, "gpt35"),
            (ENV_AZURE_API_KEY, "azure-key"),
            (ENV_OPENAI_API_KEY, "sk-test"),
        ]));
        assert_eq!(
            provider.api_url(),
            "https://res.openai.azure.com/openai/deployments/gpt35/chat/completions?api-version=2024-02-01"
        );
        assert_eq!(provider.api_key(), "azure-key");
        assert_eq!(provider.model(), "");
        assert_eq!(provider.name(), "azure");
    }

    #[test]
    fn test_azure_missing_deployment_is_empty_segment() {
        let provider =
            ProviderConfig::from_lookup(lookup_from(&[(ENV_AZURE_BASE_URL, "https://res")]));
        assert_eq!(
            provider.api_url(),
            "https://res/openai/deployments//chat/completions?api-version=2024-02-01"
        );
        assert_eq!(provider.api_key(), "");
    }

    #[test]
    fn test_strip_trailing_slash_only_once() {
        assert_eq!(strip_trailing_slash("https://host/"), "https://host");
        assert_eq!(strip_trailing_slash("https://host//"), "https://host/");
        assert_eq!(strip_trailing_slash("https://host"), "https://host");
    }

    #[test]
    fn test_fixed_provider_source() {
        let provider = ProviderConfig::Standard {
            base_url: "http://localhost:1234".to_string(),
            api_key: "k".to_string(),
            model: "m".to_string(),
        };
        let source = ProviderSource::Fixed(provider.clone());
        assert_eq!(source.resolve(), provider);
    }
}
