//! `.statelit.toml` configuration file support.
//!
//! Provides deserialization, validation and discovery (walk up to the `.git`
//! root). Every section is optional; an empty file yields the defaults.
//!
//! # Example config
//!
//! ```toml
//! [discovery]
//! factories = ["createMachine", "Machine", "createFlow"]
//! setup_function = "setup"
//!
//! [style]
//! quote = "single"       # auto | single | double
//! indent = 2
//! use_tabs = false
//! trailing_comma = true
//!
//! [edit]
//! flavor = "v5"          # auto | v4 | v5
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ast::is_valid_identifier;

/// Name of the configuration file looked up by [`discover_config`].
pub const CONFIG_FILE_NAME: &str = ".statelit.toml";

/// Top-level `.statelit.toml` configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LensConfig {
    /// Which calls count as machine definitions.
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Formatting of inserted text.
    #[serde(default)]
    pub style: StyleConfig,

    /// Keyword choices for edits.
    #[serde(default)]
    pub edit: EditConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DiscoveryConfig {
    /// Factory function names. Member calls match on the property name, so
    /// `xstate.createMachine(...)` is found through `createMachine`.
    #[serde(default = "default_factories")]
    pub factories: Vec<String>,

    /// Name of the `setup({...}).createMachine(...)` builder.
    #[serde(default = "default_setup_function")]
    pub setup_function: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            factories: default_factories(),
            setup_function: default_setup_function(),
        }
    }
}

fn default_factories() -> Vec<String> {
    vec!["createMachine".to_string(), "Machine".to_string()]
}

fn default_setup_function() -> String {
    "setup".to_string()
}

/// Formatting overrides. Unset fields are inferred from the machine text.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StyleConfig {
    #[serde(default)]
    pub quote: QuotePreference,

    /// Spaces per indentation level.
    #[serde(default)]
    pub indent: Option<usize>,

    /// Indent with tabs instead of spaces.
    #[serde(default)]
    pub use_tabs: bool,

    /// Emit a trailing comma after the last entry of multi-line containers.
    #[serde(default)]
    pub trailing_comma: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QuotePreference {
    #[default]
    Auto,
    Single,
    Double,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EditConfig {
    #[serde(default)]
    pub flavor: Flavor,
}

/// Keyword generation used for newly written properties.
///
/// `V4` writes `cond` and `internal: false`; `V5` writes `guard` and
/// `reenter: true`. `Auto` looks at the keywords already present in the
/// machine and falls back to `V5`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Flavor {
    #[default]
    Auto,
    V4,
    V5,
}

/// Errors from loading or validating a config file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {}", .0.display(), .1)]
    Io(PathBuf, std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid factory name '{0}' (must be an identifier)")]
    InvalidFactory(String),

    #[error("discovery.factories must not be empty")]
    NoFactories,

    #[error("invalid indent {0} (expected 1..=16)")]
    InvalidIndent(usize),
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

impl LensConfig {
    /// Parse a `.statelit.toml` file from a string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a `.statelit.toml` file from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::parse(&content)
    }

    /// Validate constraints the TOML schema cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.discovery.factories.is_empty() {
            return Err(ConfigError::NoFactories);
        }
        for name in self
            .discovery
            .factories
            .iter()
            .chain(std::iter::once(&self.discovery.setup_function))
        {
            if !is_valid_identifier(name) {
                return Err(ConfigError::InvalidFactory(name.clone()));
            }
        }
        if let Some(indent) = self.style.indent {
            if !(1..=16).contains(&indent) {
                return Err(ConfigError::InvalidIndent(indent));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Walk up from `start_dir` looking for [`CONFIG_FILE_NAME`].
///
/// The search stops at the first directory containing `.git`.
pub fn discover_config(start_dir: &Path) -> Option<PathBuf> {
    let mut current = if start_dir.is_file() {
        start_dir.parent()?.to_path_buf()
    } else {
        start_dir.to_path_buf()
    };

    loop {
        let candidate = current.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        if current.join(".git").exists() {
            return None;
        }
        match current.parent() {
            Some(parent) if parent != current => current = parent.to_path_buf(),
            _ => return None,
        }
    }
}

/// Discover and load the config file. `Ok(None)` when none exists.
pub fn discover_and_load_config(
    start_dir: &Path,
) -> Result<Option<(LensConfig, PathBuf)>, ConfigError> {
    match discover_config(start_dir) {
        Some(path) => {
            let config = LensConfig::load(&path)?;
            tracing::debug!(path = %path.display(), "loaded config");
            Ok(Some((config, path)))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let config = LensConfig::parse("").unwrap();
        assert_eq!(config, LensConfig::default());
        assert_eq!(config.discovery.factories, vec!["createMachine", "Machine"]);
        assert_eq!(config.edit.flavor, Flavor::Auto);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[discovery]
factories = ["createFlow"]
setup_function = "configure"

[style]
quote = "double"
indent = 4
trailing_comma = false

[edit]
flavor = "v4"
"#;
        let config = LensConfig::parse(toml).unwrap();
        assert_eq!(config.discovery.factories, vec!["createFlow"]);
        assert_eq!(config.discovery.setup_function, "configure");
        assert_eq!(config.style.quote, QuotePreference::Double);
        assert_eq!(config.style.indent, Some(4));
        assert_eq!(config.style.trailing_comma, Some(false));
        assert_eq!(config.edit.flavor, Flavor::V4);
    }

    #[test]
    fn unknown_field_rejected() {
        let err = LensConfig::parse("[style]\ncolour = true\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn invalid_values_rejected() {
        let err = LensConfig::parse("[discovery]\nfactories = []\n").unwrap_err();
        assert!(matches!(err, ConfigError::NoFactories));
        let err = LensConfig::parse("[discovery]\nfactories = [\"a-b\"]\n").unwrap_err();
        assert!(err.to_string().contains("'a-b'"));
        let err = LensConfig::parse("[style]\nindent = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidIndent(0)));
    }

    #[test]
    fn discover_config_walks_up() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join(".git")).unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE_NAME), "").unwrap();
        let nested = tmp.path().join("src").join("machines");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(
            discover_config(&nested),
            Some(tmp.path().join(CONFIG_FILE_NAME))
        );
    }

    #[test]
    fn discover_config_stops_at_git_root() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join(".git")).unwrap();
        let nested = tmp.path().join("src");
        std::fs::create_dir_all(&nested).unwrap();

        assert!(discover_config(&nested).is_none());
        assert!(discover_and_load_config(&nested).unwrap().is_none());
    }
}
