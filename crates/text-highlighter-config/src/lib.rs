use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_COLOR: &str = "#ffff7b";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid config file at {config_path}: {reason}")]
    ConfigInvalid { config_path: PathBuf, reason: String },
}

/// Highlighter settings. Keys missing from the file take their defaults;
/// unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Color applied to new highlights.
    pub color: String,
    /// Colors the interactive color switch cycles through.
    pub palette: Vec<String>,
    pub highlighted_class: String,
    pub context_class: String,
    /// Document opened when none is given on the command line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            color: DEFAULT_COLOR.to_string(),
            palette: ["#ffff7b", "#a6e3a1", "#89dceb", "#f5a97f"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            highlighted_class: "highlighted".to_string(),
            context_class: "highlighter-context".to_string(),
            document_path: None,
        }
    }
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        if let Some(reason) = config.problem() {
            return Err(ConfigError::ConfigInvalid {
                config_path: config_path.to_path_buf(),
                reason,
            });
        }

        // Expand shell variables and tilde in the document path
        config.document_path = config
            .document_path
            .map(|path| Self::expand_path(&path).unwrap_or(path));

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// Load the config file, falling back to defaults when there is none.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        Self::load_or_default_from_path(Self::config_path())
    }

    pub fn load_or_default_from_path<P: AsRef<Path>>(
        config_path: P,
    ) -> Result<Self, ConfigError> {
        Ok(Self::load_from_path(config_path)?.unwrap_or_default())
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/text-highlighter");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    /// The palette color following `current`, wrapping around. Falls back to
    /// the first palette entry when `current` is not in the palette.
    pub fn next_color(&self, current: &str) -> &str {
        let next = self
            .palette
            .iter()
            .position(|c| c == current)
            .map_or(0, |i| (i + 1) % self.palette.len());
        self.palette.get(next).map_or(&self.color, String::as_str)
    }

    fn problem(&self) -> Option<String> {
        if self.color.trim().is_empty() {
            return Some("color must not be empty".to_string());
        }
        if self.palette.iter().any(|c| c.trim().is_empty()) {
            return Some("palette entries must not be empty".to_string());
        }
        None
    }

    fn expand_path(path: &Path) -> Option<PathBuf> {
        let path_str = path.to_string_lossy();
        match shellexpand::full(&path_str) {
            Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::env;
    use tempfile::TempDir;

    fn write_config(content: &str) -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(&config_file, content).unwrap();
        (temp_dir, config_file)
    }

    #[test]
    fn test_config_path() {
        let config_path = Config::config_path();
        let path_str = config_path.to_string_lossy();

        assert!(!path_str.starts_with('~'));
        assert!(path_str.ends_with(".config/text-highlighter/config.toml"));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let non_existent_config = temp_dir.path().join("nonexistent.toml");

        let result = Config::load_from_path(&non_existent_config).unwrap();

        assert!(result.is_none());
    }

    #[test]
    fn test_load_or_default_falls_back_only_when_file_is_missing() {
        let temp_dir = TempDir::new().unwrap();

        let absent = temp_dir.path().join("absent.toml");
        let config = Config::load_or_default_from_path(&absent).unwrap();
        assert_eq!(config, Config::default());

        let (_dir, config_file) = write_config("color = \"red\"\n");
        let config = Config::load_or_default_from_path(&config_file).unwrap();
        assert_eq!(config.color, "red");

        let (_dir, broken) = write_config("color = \"  \"\n");
        assert!(Config::load_or_default_from_path(&broken).is_err());
    }

    #[test]
    fn test_missing_keys_take_defaults() {
        let (_dir, config_file) = write_config("color = \"red\"\n");

        let config = Config::load_from_path(&config_file).unwrap().unwrap();

        assert_eq!(config.color, "red");
        assert_eq!(config.highlighted_class, "highlighted");
        assert_eq!(config.context_class, "highlighter-context");
        assert_eq!(config.palette, Config::default().palette);
        assert_eq!(config.document_path, None);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let (_dir, config_file) = write_config("color = \"red\"\nnotes_path = \"/tmp\"\n");

        let result = Config::load_from_path(&config_file);

        assert!(matches!(result, Err(ConfigError::ConfigParseError { .. })));
    }

    #[test]
    fn test_empty_color_is_invalid() {
        let (_dir, config_file) = write_config("color = \"  \"\n");

        let result = Config::load_from_path(&config_file);

        assert!(matches!(result, Err(ConfigError::ConfigInvalid { .. })));
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("nested").join("config.toml");
        let test_config = Config {
            color: "lightgreen".to_string(),
            document_path: Some(PathBuf::from("/tmp/notes.md")),
            ..Config::default()
        };

        test_config.save_to_path(&config_file).unwrap();
        let loaded_config = Config::load_from_path(&config_file).unwrap().unwrap();

        assert_eq!(loaded_config, test_config);
    }

    #[test]
    fn test_document_path_with_env_var_in_toml() {
        unsafe {
            env::set_var("HIGHLIGHT_DOCS", "/custom/docs");
        }
        let (_dir, config_file) = write_config("document_path = \"$HIGHLIGHT_DOCS/notes.md\"\n");

        let config = Config::load_from_path(&config_file).unwrap().unwrap();

        assert_eq!(
            config.document_path,
            Some(PathBuf::from("/custom/docs/notes.md"))
        );
        unsafe {
            env::remove_var("HIGHLIGHT_DOCS");
        }
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let expanded = Config::expand_path(Path::new("~/test/path")).unwrap();

        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().contains("test/path"));
    }

    #[test]
    fn test_next_color_cycles_through_palette() {
        let config = Config {
            palette: vec!["a".to_string(), "b".to_string()],
            ..Config::default()
        };

        assert_eq!(config.next_color("a"), "b");
        assert_eq!(config.next_color("b"), "a");
        assert_eq!(config.next_color("zzz"), "a");

        let empty = Config {
            palette: Vec::new(),
            ..Config::default()
        };
        assert_eq!(empty.next_color("zzz"), DEFAULT_COLOR);
    }
}
