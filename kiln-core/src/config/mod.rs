mod loader;
pub mod secrets;
pub mod value;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub use secrets::{DefaultSecretResolver, SecretResolver};
pub use value::{ConfigValue, FromConfigValue};

/// Error type for configuration operations.
#[derive(Debug)]
pub enum ConfigError {
    /// The requested key was not found in the configuration.
    NotFound(String),
    /// The value could not be converted to the requested type.
    TypeMismatch { key: String, expected: &'static str },
    /// An I/O or YAML parsing error occurred while loading config files.
    Load(String),
    /// A value was present and well-typed but outside its accepted range.
    Invalid { key: String, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound(key) => write!(f, "Config key not found: {key}"),
            ConfigError::TypeMismatch { key, expected } => {
                write!(f, "Config type mismatch for '{key}': expected {expected}")
            }
            ConfigError::Load(msg) => write!(f, "Config load error: {msg}"),
            ConfigError::Invalid { key, reason } => {
                write!(f, "Invalid config value for '{key}': {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// A strongly-typed configuration section read from a [`KilnConfig`].
///
/// Implementors pick their keys under [`prefix`](Self::prefix) and fall back
/// to their own defaults for anything missing.
pub trait ConfigProperties: Sized {
    /// The key prefix of the section (e.g. `"database"`).
    fn prefix() -> &'static str;

    /// Construct the section from raw config values.
    fn from_config(config: &KilnConfig) -> Result<Self, ConfigError>;
}

/// Layered key-value configuration.
///
/// Resolution order (lowest to highest priority):
/// 1. `application.yaml`
/// 2. `application-{profile}.yaml`
/// 3. `.env` and `.env.{profile}` (loaded into the process environment,
///    never overwriting variables that are already set)
/// 4. Environment variables (`DATABASE_HOST` overrides `database.host`)
///
/// `${...}` placeholders in YAML string values are resolved before the
/// environment overlay. The profile comes from `KILN_PROFILE`, falling back to
/// the argument given to [`load`](Self::load).
#[derive(Debug, Clone)]
pub struct KilnConfig {
    values: HashMap<String, ConfigValue>,
    profile: String,
}

impl KilnConfig {
    /// Load configuration from the current working directory.
    pub fn load(profile: &str) -> Result<Self, ConfigError> {
        Self::load_from_dir(Path::new("."), profile, &DefaultSecretResolver)
    }

    /// Load configuration from `dir` with a custom secret resolver.
    pub fn load_from_dir(
        dir: &Path,
        profile: &str,
        resolver: &dyn SecretResolver,
    ) -> Result<Self, ConfigError> {
        let active_profile =
            std::env::var("KILN_PROFILE").unwrap_or_else(|_| profile.to_string());

        let mut values = HashMap::new();
        loader::load_yaml_file(&dir.join("application.yaml"), &mut values)?;
        loader::load_yaml_file(
            &dir.join(format!("application-{active_profile}.yaml")),
            &mut values,
        )?;

        let _ = dotenvy::from_path(dir.join(".env"));
        let profile_env: PathBuf = dir.join(format!(".env.{active_profile}"));
        let _ = dotenvy::from_path(profile_env);

        resolve_string_values(&mut values, resolver)?;

        for (env_key, env_val) in std::env::vars() {
            let config_key = env_key.to_lowercase().replace('_', ".");
            values.insert(config_key, ConfigValue::String(env_val));
        }

        Ok(KilnConfig {
            values,
            profile: active_profile,
        })
    }

    /// Create a config from a YAML string, without any environment overlay.
    pub fn from_yaml_str(yaml: &str, profile: &str) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();
        loader::load_yaml_str(yaml, &mut values)?;
        Ok(KilnConfig {
            values,
            profile: profile.to_string(),
        })
    }

    /// An empty config; every typed section falls back to its defaults.
    pub fn empty() -> Self {
        KilnConfig {
            values: HashMap::new(),
            profile: "test".to_string(),
        }
    }

    pub fn set(&mut self, key: &str, value: ConfigValue) {
        self.values.insert(key.to_string(), value);
    }

    /// Get a typed value for a dot-separated key.
    pub fn get<V: FromConfigValue>(&self, key: &str) -> Result<V, ConfigError> {
        let value = self
            .values
            .get(key)
            .ok_or_else(|| ConfigError::NotFound(key.to_string()))?;
        V::from_config_value(value, key)
    }

    /// Get a typed value, or `default` when the key is missing.
    ///
    /// A present but malformed value is still an error.
    pub fn get_or<V: FromConfigValue>(&self, key: &str, default: V) -> Result<V, ConfigError> {
        match self.get(key) {
            Err(ConfigError::NotFound(_)) => Ok(default),
            other => other,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Read a typed section.
    pub fn section<C: ConfigProperties>(&self) -> Result<C, ConfigError> {
        C::from_config(self)
    }
}

fn resolve_string_values(
    values: &mut HashMap<String, ConfigValue>,
    resolver: &dyn SecretResolver,
) -> Result<(), ConfigError> {
    for value in values.values_mut() {
        if let ConfigValue::String(s) = value {
            if s.contains("${") {
                *s = secrets::resolve_placeholders(s, resolver)?;
            }
        }
    }
    Ok(())
}
