//! Compiler configuration
//!
//! Settings the CLI threads into a run, loadable from a `cedar.toml`
//! next to the source file. Command-line flags are merged over the file,
//! which is merged over the defaults.

use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Name of the per-project configuration file.
pub const CONFIG_FILE: &str = "cedar.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    /// Echo the token stream before parsing.
    pub dump_tokens: bool,
    /// Pretty-print the decorated AST after type checking.
    pub dump_ast: bool,
    /// Print at most this many diagnostics; the rest only count.
    pub max_errors: Option<usize>,
}

impl CompilerConfig {
    pub fn new() -> Self {
        CompilerConfig::default()
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse config: {}", e))
    }

    /// Load a configuration file from disk.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Could not read {}: {}", path.display(), e))?;
        Self::from_toml(&content)
    }

    /// Pick up `cedar.toml` from the given directory when present.
    pub fn discover(dir: &Path) -> Result<Self, String> {
        let candidate = dir.join(CONFIG_FILE);
        if candidate.is_file() {
            Self::load(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    /// Merge `other` over this config: set flags win, an explicit
    /// max_errors wins.
    pub fn merge(&mut self, other: CompilerConfig) {
        self.dump_tokens |= other.dump_tokens;
        self.dump_ast |= other.dump_ast;
        if other.max_errors.is_some() {
            self.max_errors = other.max_errors;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CompilerConfig::new();
        assert!(!config.dump_tokens);
        assert!(!config.dump_ast);
        assert_eq!(config.max_errors, None);
    }

    #[test]
    fn test_from_toml() {
        let config = CompilerConfig::from_toml("dump_ast = true\nmax_errors = 5\n").unwrap();
        assert!(config.dump_ast);
        assert!(!config.dump_tokens);
        assert_eq!(config.max_errors, Some(5));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(CompilerConfig::from_toml("dump_everything = true\n").is_err());
    }

    #[test]
    fn test_merge_prefers_set_values() {
        let mut base = CompilerConfig::from_toml("max_errors = 5\n").unwrap();
        base.merge(CompilerConfig::from_toml("dump_tokens = true\n").unwrap());
        assert!(base.dump_tokens);
        assert_eq!(base.max_errors, Some(5));

        base.merge(CompilerConfig::from_toml("max_errors = 2\n").unwrap());
        assert_eq!(base.max_errors, Some(2));
    }

    #[test]
    fn test_discover_without_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = CompilerConfig::discover(dir.path()).unwrap();
        assert_eq!(config, CompilerConfig::default());
    }

    #[test]
    fn test_discover_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "dump_ast = true\n").unwrap();
        let config = CompilerConfig::discover(dir.path()).unwrap();
        assert!(config.dump_ast);
    }
}
