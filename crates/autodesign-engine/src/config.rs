use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use autodesign_contracts::errors::ConfigError;
use tracing::warn;

pub const API_KEY_VARS: &[&str] = &["API_KEY", "GEMINI_API_KEY", "GOOGLE_API_KEY"];
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    #[default]
    Google,
    Dryrun,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Dryrun => "dryrun",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "google" | "gemini" | "imagen" => Ok(Self::Google),
            "dryrun" | "dry-run" => Ok(Self::Dryrun),
            _ => Err(ConfigError::InvalidSetting {
                key: "provider",
                value: raw.to_string(),
            }),
        }
    }
}

/// Everything the request client needs, resolved once at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub provider: ProviderKind,
    pub api_key: Option<String>,
    pub api_base: String,
    pub generate_model: Option<String>,
    pub refine_model: Option<String>,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Google,
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            generate_model: None,
            refine_model: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .field("generate_model", &self.generate_model)
            .field("refine_model", &self.refine_model)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl ClientConfig {
    pub fn dryrun() -> Self {
        Self {
            provider: ProviderKind::Dryrun,
            ..Self::default()
        }
    }

    /// Process environment first, then `.env` in the working directory.
    pub fn from_env() -> Result<Self, ConfigError> {
        let dotenv = dotenv_vars(Path::new(".env"));
        Self::from_lookup(|key| {
            non_empty(env::var(key).ok()).or_else(|| non_empty(dotenv.get(key).cloned()))
        })
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(raw) = lookup("AUTODESIGN_PROVIDER") {
            config.provider = raw.parse()?;
        }
        config.api_key = API_KEY_VARS.iter().find_map(|key| lookup(*key));
        if let Some(base) = lookup("AUTODESIGN_API_BASE") {
            let trimmed = base.trim().trim_end_matches('/').to_string();
            if !trimmed.is_empty() {
                config.api_base = trimmed;
            }
        }
        config.generate_model = lookup("AUTODESIGN_GENERATE_MODEL");
        config.refine_model = lookup("AUTODESIGN_REFINE_MODEL");
        if let Some(raw) = lookup("AUTODESIGN_REQUEST_TIMEOUT_SECS") {
            let secs = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::InvalidSetting {
                    key: "AUTODESIGN_REQUEST_TIMEOUT_SECS",
                    value: raw.clone(),
                })?;
            config.request_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingCredential)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Pairs from a `.env` file. A missing file yields nothing; lines dotenvy
/// cannot parse are skipped with a warning.
pub fn dotenv_vars(path: &Path) -> HashMap<String, String> {
    let entries = match dotenvy::from_path_iter(path) {
        Ok(entries) => entries,
        Err(err) => {
            if !err.not_found() {
                warn!(path = %path.display(), error = %err, "ignoring unreadable .env file");
            }
            return HashMap::new();
        }
    };
    entries
        .filter_map(|entry| match entry {
            Ok(pair) => Some(pair),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping .env entry");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use autodesign_contracts::errors::ConfigError;

    use super::{dotenv_vars, ClientConfig, ProviderKind, DEFAULT_API_BASE};

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() -> anyhow::Result<()> {
        let config = ClientConfig::from_lookup(lookup(&[]))?;
        assert_eq!(config.provider, ProviderKind::Google);
        assert_eq!(config.api_key, None);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.request_timeout, Duration::from_secs(120));
        assert_eq!(config.require_api_key(), Err(ConfigError::MissingCredential));
        Ok(())
    }

    #[test]
    fn api_key_prefers_api_key_var() -> anyhow::Result<()> {
        let config = ClientConfig::from_lookup(lookup(&[
            ("GOOGLE_API_KEY", "google"),
            ("API_KEY", "primary"),
        ]))?;
        assert_eq!(config.require_api_key()?, "primary");

        let config = ClientConfig::from_lookup(lookup(&[("GEMINI_API_KEY", "gemini")]))?;
        assert_eq!(config.require_api_key()?, "gemini");
        Ok(())
    }

    #[test]
    fn overrides_are_applied() -> anyhow::Result<()> {
        let config = ClientConfig::from_lookup(lookup(&[
            ("AUTODESIGN_PROVIDER", "dryrun"),
            ("AUTODESIGN_API_BASE", "http://localhost:9000/v1beta/"),
            ("AUTODESIGN_GENERATE_MODEL", "imagen-4.0-ultra-generate-001"),
            ("AUTODESIGN_REQUEST_TIMEOUT_SECS", "30"),
        ]))?;
        assert_eq!(config.provider, ProviderKind::Dryrun);
        assert_eq!(config.api_base, "http://localhost:9000/v1beta");
        assert_eq!(
            config.generate_model.as_deref(),
            Some("imagen-4.0-ultra-generate-001")
        );
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        Ok(())
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let err = ClientConfig::from_lookup(lookup(&[("AUTODESIGN_REQUEST_TIMEOUT_SECS", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSetting { .. }));

        let err = ClientConfig::from_lookup(lookup(&[("AUTODESIGN_PROVIDER", "midjourney")]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid provider: 'midjourney'"
        );
    }

    #[test]
    fn debug_output_redacts_key() {
        let config = ClientConfig {
            api_key: Some("secret-value".to_string()),
            ..ClientConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret-value"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn dotenv_file_feeds_lookup() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join(".env");
        std::fs::write(
            &path,
            "# local overrides\nexport API_KEY=\"abc 123\"\nAUTODESIGN_PROVIDER='dryrun'\n",
        )?;

        let vars = dotenv_vars(&path);
        assert_eq!(vars.get("API_KEY").map(String::as_str), Some("abc 123"));
        let config = ClientConfig::from_lookup(|key: &str| vars.get(key).cloned())?;
        assert_eq!(config.provider, ProviderKind::Dryrun);
        assert_eq!(config.require_api_key()?, "abc 123");
        Ok(())
    }

    #[test]
    fn missing_dotenv_file_is_empty() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        assert!(dotenv_vars(&temp.path().join(".env")).is_empty());
        Ok(())
    }
}
