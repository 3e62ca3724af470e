//! Configuration for the parsing and naming engine
//!
//! The configuration is a flat mapping of option names to values, stored as a
//! JSON document. Every option has a default, so an empty document (or no
//! document at all) yields a working configuration. The engine only ever reads
//! the configuration, it is never written back.

use crate::patterns::DEFAULT_PATTERNS;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors caused by invalid configuration values
///
/// These are never per-file problems: a malformed pattern or template affects
/// every file and is reported as soon as it is detected.
#[derive(Debug, Error)]
pub enum ConfigValueError {
    /// A filename pattern does not declare the fields needed to build an episode
    #[error("Invalid filename pattern ({reason}):\n{pattern}")]
    MalformedPattern { pattern: String, reason: String },

    /// A configured regular expression could not be compiled
    #[error("Invalid regular expression for {key} ({pattern}): {reason}")]
    InvalidRegex {
        key: String,
        pattern: String,
        reason: String,
    },

    /// A template references a field that is not available
    #[error("Template {template:?} references undefined field {field:?}")]
    UndefinedField { template: String, field: String },

    /// A template applies a numeric conversion to a text value
    #[error("Template {template:?} formats text field {field:?} as a number")]
    NotANumber { template: String, field: String },

    /// A template could not be parsed
    #[error("Invalid template {template:?}: {reason}")]
    InvalidTemplate { template: String, reason: String },

    /// The configuration file could not be read
    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration file is not a valid configuration document
    #[error("Failed to parse config file {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// A single text substitution rule
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplacementRuleConfig {
    /// Literal text or regular expression to look for
    #[serde(rename = "match")]
    pub pattern: String,
    /// Replacement text, `$1`/`${name}` refer to regex groups
    pub replacement: String,
    /// Treat `match` as a regular expression
    #[serde(default)]
    pub is_regex: bool,
    /// Apply the rule to the extension as well instead of only the base name
    #[serde(default)]
    pub with_extension: bool,
}

impl ReplacementRuleConfig {
    /// Creates a literal rule that leaves the extension untouched
    pub fn literal(pattern: &str, replacement: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            replacement: replacement.to_string(),
            is_regex: false,
            with_extension: false,
        }
    }

    /// Creates a regex rule that leaves the extension untouched
    pub fn regex(pattern: &str, replacement: &str) -> Self {
        Self {
            is_regex: true,
            ..Self::literal(pattern, replacement)
        }
    }
}

/// What an input series replacement resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeriesTarget {
    /// Use this name for the lookup
    Name(String),
    /// Look the series up by its numeric id
    Id(u64),
}

impl SeriesTarget {
    fn from_json(value: serde_json::Value) -> Result<Self, String> {
        match value {
            serde_json::Value::Number(n) => n
                .as_u64()
                .map(SeriesTarget::Id)
                .ok_or_else(|| format!("series id {n} is not a positive integer")),
            serde_json::Value::String(s) => match s.parse::<u64>() {
                Ok(id) if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) => {
                    Ok(SeriesTarget::Id(id))
                }
                _ => Ok(SeriesTarget::Name(s)),
            },
            other => Err(format!("expected series name or id, got {other}")),
        }
    }
}

/// Complete engine configuration
///
/// Field names match the option names of the JSON configuration document.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Ordered filename patterns, first match wins
    pub filename_patterns: Vec<String>,
    /// Pattern locating the file extension, must match at the end of the name
    pub extension_pattern: String,

    pub filename_with_episode: String,
    pub filename_without_episode: String,
    pub filename_with_episode_no_season: String,
    pub filename_without_episode_no_season: String,
    pub filename_with_date_and_episode: String,
    pub filename_with_date_without_episode: String,
    pub filename_anime_with_episode: String,
    pub filename_anime_without_episode: String,
    pub filename_anime_with_episode_without_crc: String,
    pub filename_anime_without_episode_without_crc: String,

    /// printf-style format for a single episode number
    pub episode_single: String,
    /// Joins formatted episode numbers of multi-episode files
    pub episode_separator: String,
    /// Joins episode names that cannot be aggregated
    pub multiep_join_name_with: String,
    /// Format for aggregated names, fields `epname`, `episodemin`, `episodemax`
    pub multiep_format: String,

    pub windows_safe_filenames: bool,
    pub normalize_unicode_filenames: bool,
    pub lowercase_filename: bool,
    pub titlecase_filename: bool,
    pub custom_filename_character_blacklist: String,
    pub replace_invalid_characters_with: String,
    /// Two-digit years below this value are 20xx, the rest 19xx
    pub two_digit_year_pivot: u32,

    pub input_filename_replacements: Vec<ReplacementRuleConfig>,
    pub output_filename_replacements: Vec<ReplacementRuleConfig>,
    pub move_files_fullpath_replacements: Vec<ReplacementRuleConfig>,
    #[serde(deserialize_with = "deserialize_series_replacements")]
    pub input_series_replacements: Vec<(String, SeriesTarget)>,
    pub output_series_replacements: HashMap<String, String>,

    /// Lower-case extensions (without dot) to process, empty means all
    pub valid_extensions: Vec<String>,
    /// Literal names or regular expressions of files to ignore
    pub filename_blacklist: Vec<BlacklistEntry>,
    pub recursive: bool,

    pub batch: bool,
    pub always_rename: bool,
    pub dry_run: bool,
    pub skip_file_on_error: bool,
    pub overwrite_destination_on_rename: bool,

    pub move_files_enable: bool,
    pub move_files_only: bool,
    pub move_files_lowercase_destination: bool,
    pub move_files_destination: String,
    pub move_files_destination_date: String,
    pub copy_files: bool,

    /// Use this name for every lookup instead of the parsed series name
    pub force_name: Option<String>,
    /// Use this series id for every lookup
    pub series_id: Option<u64>,
    pub language: String,
}

/// Entry of the filename blacklist
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum BlacklistEntry {
    /// Exact basename to skip
    Literal(String),
    /// Regular expression tested against basename or full path
    Pattern {
        #[serde(rename = "match")]
        pattern: String,
        #[serde(default)]
        is_regex: bool,
        #[serde(default)]
        full_path: bool,
    },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            filename_patterns: DEFAULT_PATTERNS.iter().map(|p| p.to_string()).collect(),
            extension_pattern: r"(\.[a-zA-Z0-9]+)$".to_string(),

            filename_with_episode:
                "%(seriesname)s - [%(seasonnumber)02dx%(episode)s] - %(episodename)s%(ext)s"
                    .to_string(),
            filename_without_episode: "%(seriesname)s - [%(seasonnumber)02dx%(episode)s]%(ext)s"
                .to_string(),
            filename_with_episode_no_season:
                "%(seriesname)s - [%(episode)s] - %(episodename)s%(ext)s".to_string(),
            filename_without_episode_no_season: "%(seriesname)s - [%(episode)s]%(ext)s".to_string(),
            filename_with_date_and_episode:
                "%(seriesname)s - [%(episode)s] - %(episodename)s%(ext)s".to_string(),
            filename_with_date_without_episode: "%(seriesname)s - [%(episode)s]%(ext)s".to_string(),
            filename_anime_with_episode:
                "[%(group)s] %(seriesname)s - %(episode)s - %(episodename)s [%(crc)s]%(ext)s"
                    .to_string(),
            filename_anime_without_episode:
                "[%(group)s] %(seriesname)s - %(episode)s [%(crc)s]%(ext)s".to_string(),
            filename_anime_with_episode_without_crc:
                "[%(group)s] %(seriesname)s - %(episode)s - %(episodename)s%(ext)s".to_string(),
            filename_anime_without_episode_without_crc:
                "[%(group)s] %(seriesname)s - %(episode)s%(ext)s".to_string(),

            episode_single: "%02d".to_string(),
            episode_separator: "-".to_string(),
            multiep_join_name_with: ", ".to_string(),
            multiep_format: "%(epname)s (Parts %(episodemin)s-%(episodemax)s)".to_string(),

            windows_safe_filenames: false,
            normalize_unicode_filenames: false,
            lowercase_filename: false,
            titlecase_filename: false,
            custom_filename_character_blacklist: String::new(),
            replace_invalid_characters_with: "_".to_string(),
            two_digit_year_pivot: 50,

            input_filename_replacements: Vec::new(),
            output_filename_replacements: Vec::new(),
            move_files_fullpath_replacements: Vec::new(),
            input_series_replacements: Vec::new(),
            output_series_replacements: HashMap::new(),

            valid_extensions: Vec::new(),
            filename_blacklist: Vec::new(),
            recursive: false,

            batch: false,
            always_rename: false,
            dry_run: false,
            skip_file_on_error: true,
            overwrite_destination_on_rename: false,

            move_files_enable: false,
            move_files_only: false,
            move_files_lowercase_destination: false,
            move_files_destination: ".".to_string(),
            move_files_destination_date: ".".to_string(),
            copy_files: false,

            force_name: None,
            series_id: None,
            language: "en".to_string(),
        }
    }
}

impl Config {
    /// Parses a configuration document, missing keys take their defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Loads the configuration document at `path`
    pub fn load(path: &Path) -> Result<Self, ConfigValueError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigValueError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::from_json(&content).map_err(|e| ConfigValueError::ParseFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Loads the configuration from the user's config directory
    ///
    /// A missing file is not an error and yields the defaults.
    pub fn load_default() -> Result<Self, ConfigValueError> {
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Location of the per-user configuration file
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("de", "westhoffswelt", "tvrename")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }
}

/// Reads `input_series_replacements` as an ordered JSON object
fn deserialize_series_replacements<'de, D>(
    deserializer: D,
) -> Result<Vec<(String, SeriesTarget)>, D::Error>
where
    D: Deserializer<'de>,
{
    let map = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;

    map.into_iter()
        .map(|(pattern, value)| {
            SeriesTarget::from_json(value)
                .map(|target| (pattern, target))
                .map_err(serde::de::Error::custom)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config.episode_single, "%02d");
        assert_eq!(config.episode_separator, "-");
        assert_eq!(config.replace_invalid_characters_with, "_");
        assert_eq!(config.filename_patterns.len(), DEFAULT_PATTERNS.len());
        assert!(config.skip_file_on_error);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(Config::from_json(r#"{"no_such_option": true}"#).is_err());
    }

    #[test]
    fn test_replacement_rules() {
        let config = Config::from_json(
            r#"{"input_filename_replacements": [
                {"match": "u", "replacement": "v"},
                {"match": "[0-9]+", "replacement": "N", "is_regex": true, "with_extension": true}
            ]}"#,
        )
        .unwrap();

        assert_eq!(
            config.input_filename_replacements,
            vec![
                ReplacementRuleConfig::literal("u", "v"),
                ReplacementRuleConfig {
                    with_extension: true,
                    ..ReplacementRuleConfig::regex("[0-9]+", "N")
                },
            ]
        );
    }

    #[test]
    fn test_series_replacements_keep_order_and_ids() {
        let config = Config::from_json(
            r#"{"input_series_replacements": {
                "the office \\(us\\)": "The Office (US)",
                "^cow$": 76156,
                "scrubs": "12345"
            }}"#,
        )
        .unwrap();

        assert_eq!(
            config.input_series_replacements,
            vec![
                (
                    r"the office \(us\)".to_string(),
                    SeriesTarget::Name("The Office (US)".to_string())
                ),
                ("^cow$".to_string(), SeriesTarget::Id(76156)),
                ("scrubs".to_string(), SeriesTarget::Id(12345)),
            ]
        );
    }

    #[test]
    fn test_blacklist_entries() {
        let config = Config::from_json(
            r#"{"filename_blacklist": ["sample.avi", {"match": "^\\.", "is_regex": true}]}"#,
        )
        .unwrap();

        assert_eq!(
            config.filename_blacklist,
            vec![
                BlacklistEntry::Literal("sample.avi".to_string()),
                BlacklistEntry::Pattern {
                    pattern: r"^\.".to_string(),
                    is_regex: true,
                    full_path: false,
                },
            ]
        );
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/tvrename/config.json"));
        assert!(matches!(result, Err(ConfigValueError::ReadFailed { .. })));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"lowercase_filename": true, "series_id": 42}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert!(config.lowercase_filename);
        assert_eq!(config.series_id, Some(42));
    }
}
