use std::{
    io,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
    time::Duration,
};

use url::Url;

use crate::{
    feed::{Feed, FeedError, FirebaseConfig, FirebaseFeed, MemoryFeed},
    message::MAX_LENGTH,
    sync::LoadingPolicy,
    view::{Retry, ViewOptions},
};

pub const DEFAULT_FILE: &str = "chatfeed.toml";
pub const DEFAULT_PATH: &str = "messages";

#[derive(Clone, Debug)]
pub struct Config {
    /// `http(s)://` for a hosted database, `memory://` for an in-process feed.
    pub database_url: Url,
    pub path: String,
    pub user_name: String,
    pub auth: Option<String>,
    pub view: ViewOptions,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("`{key}` must be set")]
    Missing { key: &'static str },

    #[error("`{key}` is empty")]
    Empty { key: &'static str },

    #[error("invalid database url: {0}")]
    Url(#[from] url::ParseError),

    #[error("unsupported database url scheme `{0}`")]
    Scheme(String),

    #[error("invalid `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl Config {
    /// Loads `chatfeed.toml` (or `$CHATFEED_CONFIG`), then applies
    /// environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        simple_env_load::load_env_from([".dev.env", ".secrets.env"]);
        let path = std::env::var_os("CHATFEED_CONFIG")
            .map_or_else(|| PathBuf::from(DEFAULT_FILE), PathBuf::from);
        Self::load_from(path)
    }

    /// A missing file counts as empty.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let loaded = Loaded::from_file(path.as_ref())?.apply(MaybeOverride::load_from_env())?;
        Self::validate(loaded)
    }

    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        Self::validate(toml::from_str(input)?)
    }

    pub fn is_memory(&self) -> bool {
        self.database_url.scheme() == "memory"
    }

    pub fn open_feed(&self) -> Result<Arc<dyn Feed>, FeedError> {
        if self.is_memory() {
            return Ok(Arc::new(MemoryFeed::new()));
        }

        let feed = FirebaseFeed::create(FirebaseConfig {
            database_url: self.database_url.clone(),
            path: self.path.clone(),
            auth: self.auth.clone(),
        })?;
        Ok(Arc::new(feed))
    }

    fn validate(loaded: Loaded) -> Result<Self, ConfigError> {
        let database_url = Validator::database_url(loaded.database_url.as_deref())?;
        let user_name = Validator::user_name(loaded.user_name.as_deref())?;
        let path = Validator::path(loaded.path.as_deref().unwrap_or(DEFAULT_PATH))?;
        let max_length = Validator::max_length(loaded.max_length.unwrap_or(MAX_LENGTH))?;

        let retry = match loaded.retry.unwrap_or_default() {
            RetryKind::Manual => Retry::Manual,
            RetryKind::Backoff => Validator::backoff(
                loaded.retry_initial_ms.unwrap_or(1_000),
                loaded.retry_max_ms.unwrap_or(30_000),
                loaded.retry_attempts,
            )?,
        };

        Ok(Self {
            database_url,
            path,
            user_name,
            auth: loaded.auth.filter(|auth| !auth.trim().is_empty()),
            view: ViewOptions {
                loading: loaded.loading.unwrap_or_default(),
                retry,
                max_length,
            },
        })
    }
}

#[derive(Default, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Loaded {
    database_url: Option<String>,
    path: Option<String>,
    user_name: Option<String>,
    auth: Option<String>,
    loading: Option<LoadingPolicy>,
    retry: Option<RetryKind>,
    retry_initial_ms: Option<u64>,
    retry_max_ms: Option<u64>,
    retry_attempts: Option<u32>,
    max_length: Option<usize>,
}

impl Loaded {
    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Ok(toml::from_str(&data)?)
    }

    fn apply(self, maybe: MaybeOverride) -> Result<Self, ConfigError> {
        fn parse<T: FromStr<Err = String>>(
            key: &'static str,
            value: Option<String>,
        ) -> Result<Option<T>, ConfigError> {
            value
                .map(|value| value.parse().map_err(|reason| ConfigError::Invalid { key, reason }))
                .transpose()
        }

        Ok(Self {
            loading: parse("CHATFEED_LOADING", maybe.loading)?.or(self.loading),
            retry: parse("CHATFEED_RETRY", maybe.retry)?.or(self.retry),
            database_url: maybe.database_url.or(self.database_url),
            path: maybe.path.or(self.path),
            user_name: maybe.user_name.or(self.user_name),
            auth: maybe.auth.or(self.auth),
            ..self
        })
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
enum RetryKind {
    #[default]
    Manual,
    Backoff,
}

impl FromStr for RetryKind {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match &*input.trim().to_ascii_lowercase() {
            "manual" => Ok(Self::Manual),
            "backoff" => Ok(Self::Backoff),
            _ => Err(format!("expected `manual` or `backoff`, got `{input}`")),
        }
    }
}

struct MaybeOverride {
    database_url: Option<String>,
    path: Option<String>,
    user_name: Option<String>,
    auth: Option<String>,
    loading: Option<String>,
    retry: Option<String>,
}

impl MaybeOverride {
    fn load_from_env() -> Self {
        let get = |key: &str| std::env::var(key).ok();
        Self {
            database_url: get("CHATFEED_URL"),
            path: get("CHATFEED_PATH"),
            user_name: get("CHATFEED_USER"),
            auth: get("CHATFEED_AUTH"),
            loading: get("CHATFEED_LOADING"),
            retry: get("CHATFEED_RETRY"),
        }
    }
}

struct Validator;

impl Validator {
    fn user_name(input: Option<&str>) -> Result<String, ConfigError> {
        let input = input.ok_or(ConfigError::Missing { key: "user_name" })?.trim();
        if input.is_empty() {
            return Err(ConfigError::Empty { key: "user_name" });
        }
        Ok(input.to_string())
    }

    fn database_url(input: Option<&str>) -> Result<Url, ConfigError> {
        let input = input.ok_or(ConfigError::Missing { key: "database_url" })?.trim();
        if input.is_empty() {
            return Err(ConfigError::Empty { key: "database_url" });
        }

        let url = Url::parse(input)?;
        match url.scheme() {
            "http" | "https" | "memory" => Ok(url),
            scheme => Err(ConfigError::Scheme(scheme.to_string())),
        }
    }

    fn path(input: &str) -> Result<String, ConfigError> {
        let path = input.trim().trim_matches('/');
        if path.is_empty() {
            return Err(ConfigError::Empty { key: "path" });
        }

        // not allowed in database keys
        if let Some(c) = path.chars().find(|c| matches!(c, '.' | '$' | '#' | '[' | ']')) {
            return Err(ConfigError::Invalid {
                key: "path",
                reason: format!("`{c}` is not allowed"),
            });
        }
        Ok(path.to_string())
    }

    fn backoff(initial_ms: u64, max_ms: u64, attempts: Option<u32>) -> Result<Retry, ConfigError> {
        if initial_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "retry_initial_ms",
                reason: "must be at least 1".into(),
            });
        }
        if max_ms < initial_ms {
            return Err(ConfigError::Invalid {
                key: "retry_max_ms",
                reason: format!("must not be below `retry_initial_ms` ({initial_ms})"),
            });
        }
        Ok(Retry::Backoff {
            initial: Duration::from_millis(initial_ms),
            max: Duration::from_millis(max_ms),
            attempts,
        })
    }

    fn max_length(input: usize) -> Result<usize, ConfigError> {
        if input == 0 {
            return Err(ConfigError::Invalid {
                key: "max_length",
                reason: "must be at least 1".into(),
            });
        }
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_file() {
        let config = Config::from_toml(
            r#"
                database_url = "https://demo.firebaseio.com"
                user_name = "alice"
            "#,
        )
        .unwrap();

        assert_eq!(config.path, "messages");
        assert_eq!(config.user_name, "alice");
        assert_eq!(config.auth, None);
        assert_eq!(config.view, ViewOptions::default());
        assert!(!config.is_memory());
    }

    #[test]
    fn full_file() {
        let config = Config::from_toml(
            r#"
                database_url = "memory://"
                path = "/rooms/lobby/"
                user_name = " bob "
                auth = ""
                loading = "buffer"
                retry = "backoff"
                retry_initial_ms = 250
                retry_attempts = 3
                max_length = 140
            "#,
        )
        .unwrap();

        assert!(config.is_memory());
        assert_eq!(config.path, "rooms/lobby");
        assert_eq!(config.user_name, "bob");
        assert_eq!(config.auth, None);
        assert_eq!(config.view.loading, LoadingPolicy::Buffer);
        assert_eq!(config.view.max_length, 140);
        assert_eq!(
            config.view.retry,
            Retry::Backoff {
                initial: Duration::from_millis(250),
                max: Duration::from_secs(30),
                attempts: Some(3),
            }
        );
    }

    #[test]
    fn validation() {
        let err = |input: &str| Config::from_toml(input).unwrap_err();

        assert!(matches!(
            err(r#"user_name = "alice""#),
            ConfigError::Missing { key: "database_url" }
        ));
        assert!(matches!(
            err("database_url = \"https://x.io\"\nuser_name = \"  \""),
            ConfigError::Empty { key: "user_name" }
        ));
        assert!(matches!(
            err("database_url = \"ftp://x.io\"\nuser_name = \"a\""),
            ConfigError::Scheme(..)
        ));
        assert!(matches!(
            err("database_url = \"https://x.io\"\nuser_name = \"a\"\npath = \"a.b\""),
            ConfigError::Invalid { key: "path", .. }
        ));
        assert!(matches!(
            err("database_url = \"https://x.io\"\nuser_name = \"a\"\ncolour = 1"),
            ConfigError::Toml(..)
        ));

        let backoff = "database_url = \"https://x.io\"\nuser_name = \"a\"\nretry = \"backoff\"\n";
        assert!(matches!(
            err(&format!("{backoff}retry_initial_ms = 0\nretry_max_ms = 0")),
            ConfigError::Invalid {
                key: "retry_initial_ms",
                ..
            }
        ));
        assert!(matches!(
            err(&format!("{backoff}retry_initial_ms = 5000\nretry_max_ms = 1000")),
            ConfigError::Invalid {
                key: "retry_max_ms",
                ..
            }
        ));
    }

    #[test]
    fn policy_names() {
        assert_eq!("Buffer".parse::<LoadingPolicy>(), Ok(LoadingPolicy::Buffer));
        assert!("keep".parse::<LoadingPolicy>().is_err());
        assert_eq!("backoff".parse::<RetryKind>(), Ok(RetryKind::Backoff));
    }
}
