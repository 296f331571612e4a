use std::env;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use crate::error::ConfigError;

pub const DEFAULT_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "llama3-8b-8192";
pub const DEFAULT_ADDR: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 3000));

/// Relay settings, read once at startup and handed to the relay by value.
#[derive(Clone)]
pub struct RelayConfig {
    /// Bearer credential for the upstream completion API.
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
    pub addr: SocketAddr,
}

impl RelayConfig {
    pub fn new(api_key: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            api_url: api_url.into(),
            model: DEFAULT_MODEL.to_string(),
            addr: DEFAULT_ADDR,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = lookup("LLM_API_KEY");

        let api_url = lookup("LLM_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let model = lookup("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let addr = match lookup("RELAY_ADDR") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidAddr(raw))?,
            None => DEFAULT_ADDR,
        };

        Ok(Self {
            api_key,
            api_url,
            model,
            addr,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.credential().is_none() {
            return Err(ConfigError::MissingApiKey);
        }
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err(ConfigError::InvalidUrl(self.api_url.clone()));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::MissingModel);
        }
        Ok(())
    }

    /// The credential, if one is configured and non-blank.
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("addr", &self.addr)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let vars: HashMap<&str, &str> = vars.iter().copied().collect();
        move |key| vars.get(key).map(|value| value.to_string())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = RelayConfig::from_lookup(lookup(&[("LLM_API_KEY", "gsk_live")])).unwrap();
        assert_eq!(config.credential(), Some("gsk_live"));
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.addr, DEFAULT_ADDR);
        assert_eq!(config.addr.to_string(), "127.0.0.1:3000");
    }

    #[test]
    fn reads_overrides() {
        let config = RelayConfig::from_lookup(lookup(&[
            ("LLM_API_URL", "http://localhost:8080/v1/chat/completions"),
            ("LLM_MODEL", "mixtral"),
            ("RELAY_ADDR", "0.0.0.0:8000"),
        ]))
        .unwrap();
        assert_eq!(config.api_key, None);
        assert_eq!(config.api_url, "http://localhost:8080/v1/chat/completions");
        assert_eq!(config.model, "mixtral");
        assert_eq!(config.addr.port(), 8000);
    }

    #[test]
    fn bad_bind_address_is_rejected() {
        for raw in ["localhost", "127.0.0.1", "127.0.0.1:http"] {
            let result = RelayConfig::from_lookup(lookup(&[("RELAY_ADDR", raw)]));
            assert!(
                matches!(&result, Err(ConfigError::InvalidAddr(addr)) if addr == raw),
                "{raw}"
            );
        }
    }

    #[test]
    fn blank_key_fails_validation() {
        let mut config = RelayConfig::new("   ", DEFAULT_API_URL);
        assert!(matches!(config.validate(), Err(ConfigError::MissingApiKey)));

        config.api_key = None;
        assert!(matches!(config.validate(), Err(ConfigError::MissingApiKey)));

        config.api_key = Some("gsk_live".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_non_http_upstream() {
        let config = RelayConfig::new("key", "ftp://example.com");
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn debug_output_redacts_key() {
        let config = RelayConfig::new("super-secret", DEFAULT_API_URL);
        let printed = format!("{:?}", config);
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("<redacted>"));
    }
}
