//! Runtime configuration
//!
//! Loaded from a TOML file or from `TYPTHON_FFI_*` environment variables;
//! every field has a default so partial files are fine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Policy for trampoline call-ins arriving from several native threads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchPolicy {
    /// One call-in per trampoline at a time; same-thread recursion allowed
    #[default]
    Serialized,
    /// No locking; callables must be safe to reenter concurrently
    Concurrent,
}

impl DispatchPolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Serialized => "serialized",
            Self::Concurrent => "concurrent",
        }
    }
}

impl fmt::Display for DispatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DispatchPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "serialized" => Ok(Self::Serialized),
            "concurrent" => Ok(Self::Concurrent),
            other => Err(ConfigError::Invalid(format!("unknown dispatch policy {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FfiConfig {
    #[serde(default)]
    pub dispatch: DispatchPolicy,

    #[serde(default = "default_true")]
    pub intern_descriptors: bool,

    #[serde(default)]
    pub log: LogSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub file: Option<String>,

    #[serde(default)]
    pub json: bool,

    #[serde(default)]
    pub spans: bool,
}

fn default_true() -> bool {
    true
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for FfiConfig {
    fn default() -> Self {
        Self {
            dispatch: DispatchPolicy::default(),
            intern_descriptors: true,
            log: LogSettings::default(),
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file: None,
            json: false,
            spans: false,
        }
    }
}

impl FfiConfig {
    /// Load from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Defaults overridden by environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from `TYPTHON_FFI_*` variables that are set
    ///
    /// Unparseable values are ignored and the current setting kept.
    pub fn apply_env(&mut self) {
        if let Ok(policy) = std::env::var("TYPTHON_FFI_DISPATCH") {
            if let Ok(policy) = policy.parse() {
                self.dispatch = policy;
            }
        }
        if let Ok(intern) = std::env::var("TYPTHON_FFI_INTERN") {
            self.intern_descriptors = !matches!(intern.to_lowercase().as_str(), "0" | "false" | "off");
        }
        if let Ok(level) = std::env::var("TYPTHON_FFI_LOG_LEVEL") {
            self.log.level = level;
        }
        if let Ok(path) = std::env::var("TYPTHON_FFI_LOG_FILE") {
            self.log.file = Some(path);
        }
        if std::env::var("TYPTHON_FFI_LOG_JSON").is_ok() {
            self.log.json = true;
        }
        if std::env::var("TYPTHON_FFI_LOG_SPANS").is_ok() {
            self.log.spans = true;
        }
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "cannot read config: {}", e),
            Self::Parse(e) => write!(f, "invalid config: {}", e),
            Self::Invalid(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Parse(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_serialize_and_intern() {
        let config = FfiConfig::default();
        assert_eq!(config.dispatch, DispatchPolicy::Serialized);
        assert!(config.intern_descriptors);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = FfiConfig::from_toml_str("dispatch = \"concurrent\"\n").unwrap();
        assert_eq!(config.dispatch, DispatchPolicy::Concurrent);
        assert!(config.intern_descriptors);
        assert!(config.log.file.is_none());
    }

    #[test]
    fn nested_log_table() {
        let config = FfiConfig::from_toml_str(
            "intern_descriptors = false\n[log]\nlevel = \"trace\"\njson = true\n",
        )
        .unwrap();
        assert!(!config.intern_descriptors);
        assert_eq!(config.log.level, "trace");
        assert!(config.log.json);
        assert!(!config.log.spans);
    }

    #[test]
    fn unknown_policy_is_rejected() {
        assert!(FfiConfig::from_toml_str("dispatch = \"parallel\"\n").is_err());
        assert!("parallel".parse::<DispatchPolicy>().is_err());
        assert_eq!(" Concurrent ".parse::<DispatchPolicy>().unwrap(), DispatchPolicy::Concurrent);
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "dispatch = \"serialized\"\n[log]\nfile = \"ffi.log\"").unwrap();

        let config = FfiConfig::from_file(file.path()).unwrap();
        assert_eq!(config.dispatch, DispatchPolicy::Serialized);
        assert_eq!(config.log.file.as_deref(), Some("ffi.log"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = FfiConfig::from_file("/nonexistent/typthon-ffi.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
