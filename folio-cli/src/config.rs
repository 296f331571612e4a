use std::env;
use std::fs;
use std::path::PathBuf;

use tracing::info;

use crate::persona::DEFAULT_PERSONA;

pub const DEFAULT_RELAY_URL: &str = "http://127.0.0.1:3000/api/chat";
pub const DEFAULT_HISTORY_WINDOW: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("FOLIO_HISTORY_WINDOW must be a non-negative integer, got '{0}'")]
    InvalidHistoryWindow(String),

    #[error("FOLIO_RELAY_URL must be an http(s) URL, got '{0}'")]
    InvalidRelayUrl(String),

    #[error("failed to read persona file {path:?}: {source}")]
    Persona {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub relay_url: String,
    /// Most recent transcript entries sent with each request.
    pub history_window: usize,
    pub persona: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
            history_window: DEFAULT_HISTORY_WINDOW,
            persona: DEFAULT_PERSONA.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let relay_url = lookup("FOLIO_RELAY_URL").unwrap_or_else(|| DEFAULT_RELAY_URL.to_string());
        if !relay_url.starts_with("http://") && !relay_url.starts_with("https://") {
            return Err(ConfigError::InvalidRelayUrl(relay_url));
        }

        let history_window = match lookup("FOLIO_HISTORY_WINDOW") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidHistoryWindow(raw))?,
            None => DEFAULT_HISTORY_WINDOW,
        };

        let persona = match lookup("FOLIO_PERSONA_FILE") {
            Some(path) => {
                let path = PathBuf::from(path);
                info!("Loading persona from {:?}", path);
                fs::read_to_string(&path)
                    .map_err(|source| ConfigError::Persona { path, source })?
            }
            None => DEFAULT_PERSONA.to_string(),
        };

        Ok(Self {
            relay_url,
            history_window,
            persona,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ClientConfig, ConfigError> {
        let vars: HashMap<&str, &str> = vars.iter().copied().collect();
        ClientConfig::from_lookup(|key| vars.get(key).map(|value| value.to_string()))
    }

    #[test]
    fn defaults_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.relay_url, DEFAULT_RELAY_URL);
        assert_eq!(config.history_window, DEFAULT_HISTORY_WINDOW);
        assert_eq!(config.persona, DEFAULT_PERSONA);
    }

    #[test]
    fn relay_url_must_be_http() {
        let result = load(&[("FOLIO_RELAY_URL", "ws://127.0.0.1:3000/api/chat")]);
        assert!(matches!(result, Err(ConfigError::InvalidRelayUrl(_))));

        let config = load(&[("FOLIO_RELAY_URL", "https://folio.example/api/chat")]).unwrap();
        assert_eq!(config.relay_url, "https://folio.example/api/chat");
    }

    #[test]
    fn history_window_must_be_a_count() {
        for raw in ["-1", "abc", ""] {
            let result = load(&[("FOLIO_HISTORY_WINDOW", raw)]);
            assert!(
                matches!(&result, Err(ConfigError::InvalidHistoryWindow(value)) if value == raw),
                "{raw:?}"
            );
        }

        let config = load(&[("FOLIO_HISTORY_WINDOW", " 6 ")]).unwrap();
        assert_eq!(config.history_window, 6);
    }

    #[test]
    fn missing_persona_file_is_an_error() {
        let result = load(&[("FOLIO_PERSONA_FILE", "/nonexistent/folio/persona.txt")]);
        assert!(matches!(result, Err(ConfigError::Persona { .. })));
    }

    #[test]
    fn persona_file_replaces_default() {
        let path = env::temp_dir().join(format!("folio-persona-{}.txt", std::process::id()));
        fs::write(&path, "You are a terse assistant.").unwrap();

        let result = load(&[("FOLIO_PERSONA_FILE", path.to_str().unwrap())]);
        fs::remove_file(&path).unwrap();

        assert_eq!(result.unwrap().persona, "You are a terse assistant.");
    }
}
