use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "CropSwag";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Object storage bucket holding submitted leaf photographs.
pub const IMAGE_BUCKET: &str = "crop-images";

/// Value shipped in example env files; treated the same as a missing key.
pub const PLACEHOLDER_API_KEY: &str = "your_gemini_api_key_here";

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8787";

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "cropswag_lib=info,tower_http=warn"
}

/// Get the application data directory.
/// ~/CropSwag/ on all platforms; falls back to the working directory
/// when no home directory can be determined (containers, CI).
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

// ═══════════════════════════════════════════════════════════
// Runtime configuration
// ═══════════════════════════════════════════════════════════

/// Runtime configuration resolved from the environment at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
    /// Prefix for public image URLs handed back to clients.
    pub public_base_url: String,
    /// `None` when absent, empty, or the placeholder value.
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    /// `(owner_id, bearer_token)` pairs accepted by the identity middleware.
    pub user_tokens: Vec<(String, String)>,
}

impl AppConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration through an arbitrary key lookup (tests inject a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = lookup("CROPSWAG_DATA_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(app_data_dir);

        let bind_raw = lookup("CROPSWAG_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into());
        let bind_addr: SocketAddr = bind_raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddr(bind_raw.clone()))?;

        let public_base_url = lookup("CROPSWAG_PUBLIC_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| format!("http://{bind_addr}"))
            .trim_end_matches('/')
            .to_string();

        let user_tokens = match lookup("CROPSWAG_USER_TOKENS") {
            Some(raw) => parse_user_tokens(&raw)?,
            None => Vec::new(),
        };

        Ok(Self {
            data_dir,
            bind_addr,
            public_base_url,
            gemini_api_key: resolve_api_key(lookup("GEMINI_API_KEY")),
            gemini_model: lookup("GEMINI_MODEL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.into()),
            gemini_base_url: lookup("GEMINI_BASE_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.into()),
            user_tokens,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("cropswag.db")
    }

    /// Root directory of the local object storage bucket.
    pub fn storage_dir(&self) -> PathBuf {
        self.data_dir.join("storage").join(IMAGE_BUCKET)
    }

    /// URL prefix under which stored objects are publicly served.
    pub fn storage_base_url(&self) -> String {
        format!("{}/storage/{}", self.public_base_url, IMAGE_BUCKET)
    }
}

/// Normalize a raw credential: blank values and the placeholder mean "not configured".
pub fn resolve_api_key(raw: Option<String>) -> Option<String> {
    raw.map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty() && k != PLACEHOLDER_API_KEY)
}

/// Parse `user_id:token,user_id:token`.
fn parse_user_tokens(raw: &str) -> Result<Vec<(String, String)>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((user, token)) if !user.trim().is_empty() && !token.trim().is_empty() => {
                Ok((user.trim().to_string(), token.trim().to_string()))
            }
            _ => Err(ConfigError::InvalidUserToken(entry.to_string())),
        })
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid bind address: {0}")]
    InvalidBindAddr(String),
    #[error("Invalid CROPSWAG_USER_TOKENS entry (expected user_id:token): {0}")]
    InvalidUserToken(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn app_data_dir_ends_with_app_name() {
        assert!(app_data_dir().ends_with("CropSwag"));
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.public_base_url, "http://127.0.0.1:8787");
        assert_eq!(config.gemini_model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.gemini_base_url, DEFAULT_GEMINI_BASE_URL);
        assert!(config.gemini_api_key.is_none());
        assert!(config.user_tokens.is_empty());
    }

    #[test]
    fn placeholder_key_is_not_configured() {
        let config =
            AppConfig::from_lookup(lookup_from(&[("GEMINI_API_KEY", PLACEHOLDER_API_KEY)])).unwrap();
        assert!(config.gemini_api_key.is_none());
    }

    #[test]
    fn blank_key_is_not_configured() {
        assert_eq!(resolve_api_key(Some("   ".into())), None);
        assert_eq!(resolve_api_key(None), None);
        assert_eq!(resolve_api_key(Some(" abc ".into())), Some("abc".into()));
    }

    #[test]
    fn storage_paths_derive_from_data_dir() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("CROPSWAG_DATA_DIR", "/tmp/cs"),
            ("CROPSWAG_PUBLIC_BASE_URL", "https://crops.example/"),
        ]))
        .unwrap();
        assert_eq!(config.database_path(), PathBuf::from("/tmp/cs/cropswag.db"));
        assert_eq!(
            config.storage_dir(),
            PathBuf::from("/tmp/cs/storage/crop-images")
        );
        assert_eq!(
            config.storage_base_url(),
            "https://crops.example/storage/crop-images"
        );
    }

    #[test]
    fn user_tokens_parse() {
        let config = AppConfig::from_lookup(lookup_from(&[(
            "CROPSWAG_USER_TOKENS",
            "alice:tok-a, bob:tok-b",
        )]))
        .unwrap();
        assert_eq!(
            config.user_tokens,
            vec![
                ("alice".to_string(), "tok-a".to_string()),
                ("bob".to_string(), "tok-b".to_string())
            ]
        );
    }

    #[test]
    fn malformed_user_token_rejected() {
        let result = AppConfig::from_lookup(lookup_from(&[("CROPSWAG_USER_TOKENS", "alice")]));
        assert!(matches!(result, Err(ConfigError::InvalidUserToken(_))));
    }

    #[test]
    fn invalid_bind_addr_rejected() {
        let result = AppConfig::from_lookup(lookup_from(&[("CROPSWAG_BIND_ADDR", "nowhere")]));
        assert!(matches!(result, Err(ConfigError::InvalidBindAddr(_))));
    }

    #[test]
    fn app_name_is_cropswag() {
        assert_eq!(APP_NAME, "CropSwag");
    }
}
