#![forbid(unsafe_code)]

//! Framework configuration.
//!
//! A [`Config`] carries the attribute prefix, transition class names,
//! diagnostics switches and text-interpolation settings. It can be built in
//! code, or loaded from TOML or JSON. Both `snake_case` and the historical
//! `camelCase` keys (`enterClass`, `leaveClass`) are accepted.
//!
//! ```
//! use tether_core::Config;
//!
//! let config = Config::from_toml_str(r#"
//!     prefix = "x"
//!     enter_class = "fade-in"
//! "#).unwrap();
//! assert_eq!(config.attribute("transition"), "x-transition");
//! assert_eq!(config.enter_class, "fade-in");
//! assert_eq!(config.leave_class, "v-leave");
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Errors from configuration loading and validation.
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// JSON input was malformed.
    Json(serde_json::Error),
    /// TOML input was malformed.
    Toml(toml::de::Error),
    /// The file extension is neither `.toml` nor `.json`.
    UnsupportedFormat { path: PathBuf },
    /// The attribute prefix was empty or contained whitespace.
    InvalidPrefix(String),
    /// Delimiters were empty or identical.
    InvalidDelimiters { open: String, close: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "cannot read {}: {source}", path.display()),
            Self::Json(err) => write!(f, "invalid JSON config: {err}"),
            Self::Toml(err) => write!(f, "invalid TOML config: {err}"),
            Self::UnsupportedFormat { path } => {
                write!(f, "unsupported config format: {}", path.display())
            }
            Self::InvalidPrefix(prefix) => write!(f, "invalid attribute prefix '{prefix}'"),
            Self::InvalidDelimiters { open, close } => {
                write!(f, "invalid delimiters '{open}' '{close}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json(err) => Some(err),
            Self::Toml(err) => Some(err),
            _ => None,
        }
    }
}

/// Runtime-wide framework settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Attribute prefix, e.g. `v` for `v-transition`.
    pub prefix: String,
    /// Emit per-call trace events for instance methods.
    pub debug: bool,
    /// Suppress warnings.
    pub silent: bool,
    /// Class applied while an element enters.
    #[serde(alias = "enterClass")]
    pub enter_class: String,
    /// Class applied while an element leaves.
    #[serde(alias = "leaveClass")]
    pub leave_class: String,
    /// Whether text interpolation is enabled for template compilers.
    pub interpolate: bool,
    delimiters: (String, String),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix: "v".to_owned(),
            debug: false,
            silent: false,
            enter_class: "v-enter".to_owned(),
            leave_class: "v-leave".to_owned(),
            interpolate: true,
            delimiters: ("{{".to_owned(), "}}".to_owned()),
        }
    }
}

impl Config {
    /// Parse and validate a JSON document.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(input).map_err(ConfigError::Json)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input).map_err(ConfigError::Toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.toml` or `.json` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&text),
            Some("json") => Self::from_json_str(&text),
            _ => Err(ConfigError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prefix.is_empty() || self.prefix.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidPrefix(self.prefix.clone()));
        }
        check_delimiters(&self.delimiters.0, &self.delimiters.1)
    }

    /// Builder-style prefix override.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Builder-style debug switch.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Builder-style silent switch.
    #[must_use]
    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// Builder-style transition class override.
    #[must_use]
    pub fn with_transition_classes(
        mut self,
        enter: impl Into<String>,
        leave: impl Into<String>,
    ) -> Self {
        self.enter_class = enter.into();
        self.leave_class = leave.into();
        self
    }

    /// Interpolation delimiters as `(open, close)`.
    #[must_use]
    pub fn delimiters(&self) -> (&str, &str) {
        (&self.delimiters.0, &self.delimiters.1)
    }

    /// Replace the interpolation delimiters.
    pub fn set_delimiters(
        &mut self,
        open: impl Into<String>,
        close: impl Into<String>,
    ) -> Result<(), ConfigError> {
        let (open, close) = (open.into(), close.into());
        check_delimiters(&open, &close)?;
        self.delimiters = (open, close);
        Ok(())
    }

    /// Full attribute name for a framework attribute: `prefix-name`.
    #[must_use]
    pub fn attribute(&self, name: &str) -> String {
        format!("{}-{name}", self.prefix)
    }
}

fn check_delimiters(open: &str, close: &str) -> Result<(), ConfigError> {
    if open.is_empty() || close.is_empty() || open == close {
        return Err(ConfigError::InvalidDelimiters {
            open: open.to_owned(),
            close: close.to_owned(),
        });
    }
    Ok(())
}
