//! Filename parsing
//!
//! Turns a path into an [`EpisodeIdentity`] by running the input replacements
//! on the basename and matching it against the pattern library.

use crate::config::{Config, ConfigValueError, SeriesTarget};
use crate::episode::{EpisodeIdentity, EpisodeKind};
use crate::patterns::{
    EpisodeNumbering, EpisodePattern, EpisodeShape, PatternLibrary, is_numbered_episode_field,
};
use crate::replacements::{ExtensionSplitter, Replacements, compile_regex};
use chrono::NaiveDate;
use fancy_regex::Captures;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, warn};

/// Largest span of a detected episode range that is taken at face value
const MAX_EPISODE_RANGE: u32 = 5;

static DOT_BETWEEN_NON_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\D)[.](\D)").expect("dot regex should compile"));

/// Errors that can occur while parsing a filename
#[derive(Debug, Error)]
pub enum ParseError {
    /// No pattern matched the filename
    #[error("Cannot parse {path}: none of the {pattern_count} filename patterns matched")]
    InvalidFilename { path: PathBuf, pattern_count: usize },

    /// A pattern or replacement is unusable
    #[error(transparent)]
    Config(#[from] ConfigValueError),
}

/// Applies the configured patterns to filenames
#[derive(Debug)]
pub struct FilenameParser {
    library: PatternLibrary,
    input_replacements: Replacements,
    extension: ExtensionSplitter,
    series_replacements: Vec<(Regex, SeriesTarget)>,
    year_pivot: u32,
}

impl FilenameParser {
    /// Compiles patterns and replacements from the configuration
    pub fn new(config: &Config) -> Result<Self, ConfigValueError> {
        let series_replacements = config
            .input_series_replacements
            .iter()
            .map(|(pattern, target)| {
                let whole_name = format!("(?i)^(?:{pattern})$");
                compile_regex("input_series_replacements", &whole_name)
                    .map(|regex| (regex, target.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            library: PatternLibrary::new(config.filename_patterns.as_slice())?,
            input_replacements: Replacements::compile(
                "input_filename_replacements",
                &config.input_filename_replacements,
            )?,
            extension: ExtensionSplitter::new(&config.extension_pattern)?,
            series_replacements,
            year_pivot: config.two_digit_year_pivot,
        })
    }

    pub fn library(&self) -> &PatternLibrary {
        &self.library
    }

    /// Parses the basename of `path` into an episode identity
    ///
    /// The input replacements run on the basename first, then the patterns
    /// are tried in order and the first match wins. The series name is
    /// cleaned and passed through the input series replacements.
    ///
    /// # Arguments
    ///
    /// * `path` - The episode file, only its basename is matched
    ///
    /// # Returns
    ///
    /// The parsed identity without episode names, `InvalidFilename` if no
    /// pattern matched or a `Config` error if the matching pattern is
    /// malformed.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let parser = FilenameParser::new(&Config::default())?;
    /// let episode = parser.parse(Path::new("scrubs.s01e01.avi"))?;
    /// assert_eq!(episode.series_name, "scrubs");
    /// ```
    pub fn parse(&self, path: &Path) -> Result<EpisodeIdentity, ParseError> {
        let invalid = || ParseError::InvalidFilename {
            path: path.to_path_buf(),
            pattern_count: self.library.len(),
        };

        let basename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(invalid)?;

        let name = self.input_replacements.apply(&basename, &self.extension);
        let (pattern, captures) = self.library.first_match(&name).ok_or_else(invalid)?;

        debug!(file = %path.display(), pattern = pattern.source(), "Filename matched pattern");

        let matched = MatchedFields {
            pattern,
            captures: &captures,
            path,
            pattern_count: self.library.len(),
        };

        let mut consumed = vec!["seriesname", "seasonnumber"];
        let kind = match pattern.numbering() {
            EpisodeNumbering::Date => {
                consumed.extend(["year", "month", "day"]);
                let year = expand_year(matched.number("year")?, self.year_pivot);
                let month = matched.number("month")?;
                let day = matched.number("day")?;
                let date = NaiveDate::from_ymd_opt(year as i32, month, day).ok_or_else(invalid)?;
                EpisodeKind::Dated { dates: vec![date] }
            }
            numbering => {
                let episodes = self.episode_numbers(&matched, numbering, &mut consumed)?;
                match pattern.shape() {
                    EpisodeShape::Seasoned => EpisodeKind::Seasoned {
                        season: matched.number("seasonnumber")?,
                        episodes,
                    },
                    EpisodeShape::Anime => {
                        consumed.extend(["group", "crc"]);
                        EpisodeKind::Anime {
                            group: matched.text("group").unwrap_or_default().to_string(),
                            crc: matched.text("crc").map(str::to_string),
                            episodes,
                        }
                    }
                    EpisodeShape::NoSeason | EpisodeShape::Dated => {
                        EpisodeKind::NoSeason { episodes }
                    }
                }
            }
        };

        let extra: BTreeMap<String, String> = pattern
            .fields()
            .iter()
            .filter(|field| {
                !consumed.contains(&field.as_str()) && !is_numbered_episode_field(field)
            })
            .filter_map(|field| {
                matched
                    .text(field)
                    .map(|value| (field.clone(), value.to_string()))
            })
            .collect();

        let mut identity = EpisodeIdentity {
            series_name: clean_series_name(matched.text("seriesname").unwrap_or_default()),
            series_id: None,
            kind,
            episode_name: None,
            original_path: path.to_path_buf(),
            extension: self.extension.split(&name).1.to_string(),
            extra,
        };
        self.replace_series_name(&mut identity);

        Ok(identity)
    }

    /// Gathers the episode numbers of a non-dated match
    fn episode_numbers(
        &self,
        matched: &MatchedFields<'_, '_>,
        numbering: &EpisodeNumbering,
        consumed: &mut Vec<&'static str>,
    ) -> Result<Vec<u32>, ParseError> {
        match numbering {
            EpisodeNumbering::Numbered(fields) => {
                let mut numbers = Vec::new();
                for field in fields {
                    if matched.text(field).is_some() {
                        numbers.push(matched.number(field)?);
                    }
                }
                if numbers.is_empty() {
                    return Err(
                        matched.malformed("no numbered episode group took part in the match")
                    );
                }
                numbers.sort_unstable();
                Ok(numbers)
            }
            EpisodeNumbering::Range => {
                consumed.extend(["episodenumberstart", "episodenumberend"]);
                let mut start = matched.number("episodenumberstart")?;
                let mut end = matched.number("episodenumberend")?;
                if start > end {
                    std::mem::swap(&mut start, &mut end);
                }

                if end - start > MAX_EPISODE_RANGE {
                    warn!(
                        file = %matched.path.display(),
                        start,
                        end,
                        "Episode range too large, using the first episode only"
                    );
                    Ok(vec![start])
                } else {
                    Ok((start..=end).collect())
                }
            }
            EpisodeNumbering::Single => {
                consumed.push("episodenumber");
                Ok(vec![matched.number("episodenumber")?])
            }
            EpisodeNumbering::Date => Err(matched.malformed("date pattern without date fields")),
        }
    }

    /// First matching input series replacement rewrites the name or sets an id
    fn replace_series_name(&self, identity: &mut EpisodeIdentity) {
        let Some((_, target)) = self
            .series_replacements
            .iter()
            .find(|(regex, _)| regex.is_match(&identity.series_name))
        else {
            return;
        };

        debug!(
            series = %identity.series_name,
            target = ?target,
            "Applying input series replacement"
        );
        match target {
            SeriesTarget::Name(name) => identity.series_name = name.clone(),
            SeriesTarget::Id(id) => identity.series_id = Some(*id),
        }
    }
}

/// Captures of one successful match
struct MatchedFields<'a, 't> {
    pattern: &'a EpisodePattern,
    captures: &'a Captures<'t>,
    path: &'a Path,
    pattern_count: usize,
}

impl MatchedFields<'_, '_> {
    fn text(&self, field: &str) -> Option<&str> {
        self.captures.name(field).map(|m| m.as_str())
    }

    fn number(&self, field: &str) -> Result<u32, ParseError> {
        let text = self.text(field).ok_or_else(|| {
            self.malformed(&format!("group {field} did not take part in the match"))
        })?;

        text.parse().map_err(|_| ParseError::InvalidFilename {
            path: self.path.to_path_buf(),
            pattern_count: self.pattern_count,
        })
    }

    fn malformed(&self, reason: &str) -> ParseError {
        ParseError::Config(ConfigValueError::MalformedPattern {
            pattern: self.pattern.source().to_string(),
            reason: reason.to_string(),
        })
    }
}

/// Normalizes a captured series name
///
/// Dots between non-digits become spaces (`1.0` is kept), underscores become
/// spaces, a trailing hyphen is dropped and surrounding whitespace trimmed.
pub fn clean_series_name(name: &str) -> String {
    let mut cleaned = name.to_string();
    loop {
        let next = DOT_BETWEEN_NON_DIGITS.replace_all(&cleaned, "$1 $2");
        if next == cleaned {
            break;
        }
        cleaned = next.into_owned();
    }

    let cleaned = cleaned.replace('_', " ");
    let cleaned = cleaned.strip_suffix('-').unwrap_or(&cleaned);
    cleaned.trim().to_string()
}

/// Resolves two-digit years, `pivot` is the first year mapped to 19xx
pub fn expand_year(year: u32, pivot: u32) -> u32 {
    match year {
        100.. => year,
        y if y < pivot => 2000 + y,
        y => 1900 + y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episode::EpisodeIdentity;

    fn parse(name: &str) -> EpisodeIdentity {
        FilenameParser::new(&Config::default())
            .unwrap()
            .parse(Path::new(name))
            .unwrap_or_else(|e| panic!("{name}: {e}"))
    }

    fn parse_with(patterns: &[&str], name: &str) -> Result<EpisodeIdentity, ParseError> {
        let config = Config {
            filename_patterns: patterns.iter().map(|p| p.to_string()).collect(),
            ..Config::default()
        };
        FilenameParser::new(&config).unwrap().parse(Path::new(name))
    }

    fn seasoned(season: u32, episodes: &[u32]) -> EpisodeKind {
        EpisodeKind::Seasoned {
            season,
            episodes: episodes.to_vec(),
        }
    }

    #[test]
    fn test_season_and_episode() {
        let episode = parse("scrubs.s01e01.avi");
        assert_eq!(episode.series_name, "scrubs");
        assert_eq!(episode.kind, seasoned(1, &[1]));
        assert_eq!(episode.extension, ".avi");

        assert_eq!(parse("Show.Name.1x02.avi").kind, seasoned(1, &[2]));
        assert_eq!(parse("Show.Name.1x02.avi").series_name, "Show Name");
        assert_eq!(parse("Show Name - S02E10 - Title.mkv").kind, seasoned(2, &[10]));
    }

    #[test]
    fn test_multi_episode() {
        let episode = parse("Scrubs - [01x01-02-03]");
        assert_eq!(episode.series_name, "Scrubs");
        assert_eq!(episode.kind, seasoned(1, &[1, 2, 3]));
        assert_eq!(episode.extension, "");

        let episode = parse("my.show.s01e01e02.avi");
        assert_eq!(episode.series_name, "my show");
        assert_eq!(episode.kind, seasoned(1, &[1, 2]));
    }

    #[test]
    fn test_dated_episode() {
        let episode = parse("show.name.2010.01.02.avi");
        assert_eq!(episode.series_name, "show name");
        assert_eq!(
            episode.kind,
            EpisodeKind::Dated {
                dates: vec![NaiveDate::from_ymd_opt(2010, 1, 2).unwrap()]
            }
        );
    }

    #[test]
    fn test_anime_episode() {
        let episode = parse("[Group Name] Show Name - 03 [ABCD1234].mkv");
        assert_eq!(episode.series_name, "Show Name");
        assert_eq!(
            episode.kind,
            EpisodeKind::Anime {
                group: "Group Name".to_string(),
                crc: Some("ABCD1234".to_string()),
                episodes: vec![3],
            }
        );
        assert!(episode.extra.is_empty());
    }

    #[test]
    fn test_episode_without_season() {
        let episode = parse("Show Name - [012].avi");
        assert_eq!(episode.series_name, "Show Name");
        assert_eq!(episode.kind, EpisodeKind::NoSeason { episodes: vec![12] });
    }

    #[test]
    fn test_unparsable_filename() {
        let err = FilenameParser::new(&Config::default())
            .unwrap()
            .parse(Path::new("holiday video.avi"))
            .unwrap_err();
        assert!(matches!(err, ParseError::InvalidFilename { .. }));
    }

    #[test]
    fn test_numbered_groups_are_sorted_by_value() {
        let episode = parse_with(
            &[r"^(?P<seriesname>.+?)\.e(?P<episodenumber1>\d+)e(?P<episodenumber2>\d+)"],
            "show.e05e02.avi",
        )
        .unwrap();
        assert_eq!(episode.kind, EpisodeKind::NoSeason { episodes: vec![2, 5] });
    }

    #[test]
    fn test_large_range_falls_back_to_first_episode() {
        let pattern =
            r"^(?P<seriesname>.+?)\.(?P<episodenumberstart>\d+)-(?P<episodenumberend>\d+)";
        let episode = parse_with(&[pattern], "show.1-900.avi").unwrap();
        assert_eq!(episode.kind, EpisodeKind::NoSeason { episodes: vec![1] });

        let episode = parse_with(&[pattern], "show.5-3.avi").unwrap();
        assert_eq!(episode.kind, EpisodeKind::NoSeason { episodes: vec![3, 4, 5] });
    }

    #[test]
    fn test_unconsumed_captures_are_extra_fields() {
        let episode = parse_with(
            &[r"^(?P<seriesname>.+?)\.(?P<episodenumber>\d+)\.(?P<quality>\d+p)"],
            "show.03.720p.mkv",
        )
        .unwrap();
        assert_eq!(episode.extra.get("quality").map(String::as_str), Some("720p"));
        assert!(!episode.extra.contains_key("episodenumber"));
    }

    #[test]
    fn test_non_participating_group_is_config_error() {
        let err = parse_with(
            &[r"^(?P<seriesname>.+?)\.(?:e(?P<episodenumber>\d+)|x(?P<other>\d+))"],
            "show.x03.mkv",
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::Config(ConfigValueError::MalformedPattern { .. })));
    }

    #[test]
    fn test_input_replacements_run_before_parsing() {
        let config = Config {
            input_filename_replacements: vec![crate::config::ReplacementRuleConfig::literal(
                "Episode.", "s01e",
            )],
            ..Config::default()
        };
        let episode = FilenameParser::new(&config)
            .unwrap()
            .parse(Path::new("/tv/Show.Episode.05.avi"))
            .unwrap();
        assert_eq!(episode.kind, seasoned(1, &[5]));
        assert_eq!(episode.original_filename(), "Show.Episode.05.avi");
    }

    #[test]
    fn test_input_series_replacements() {
        let config = Config::from_json(
            r#"{"input_series_replacements": {
                "the office( us)?": "The Office (US)",
                "scrubs": 76156
            }}"#,
        )
        .unwrap();
        let parser = FilenameParser::new(&config).unwrap();

        let office = parser.parse(Path::new("The.Office.US.s01e01.avi")).unwrap();
        assert_eq!(office.series_name, "The Office (US)");

        let scrubs = parser.parse(Path::new("scrubs.s01e01.avi")).unwrap();
        assert_eq!(scrubs.series_name, "scrubs");
        assert_eq!(scrubs.series_id, Some(76156));

        // Whole-name matches only
        let other = parser.parse(Path::new("scrubs.reboot.s01e01.avi")).unwrap();
        assert_eq!(other.series_id, None);
    }

    #[test]
    fn test_clean_series_name() {
        assert_eq!(clean_series_name("show.name"), "show name");
        assert_eq!(clean_series_name("a.b.c.d"), "a b c d");
        assert_eq!(clean_series_name("Show_Name"), "Show Name");
        assert_eq!(clean_series_name("Show Name -"), "Show Name");
        assert_eq!(clean_series_name("Version.1.0"), "Version.1.0");
        assert_eq!(clean_series_name("  padded  "), "padded");
    }

    #[test]
    fn test_expand_year() {
        assert_eq!(expand_year(99, 50), 1999);
        assert_eq!(expand_year(79, 50), 1979);
        assert_eq!(expand_year(0, 50), 2000);
        assert_eq!(expand_year(20, 50), 2020);
        assert_eq!(expand_year(2010, 50), 2010);
        assert_eq!(expand_year(60, 70), 2060);
    }

    #[test]
    fn test_two_digit_year_in_filename() {
        let pattern =
            r"(?P<seriesname>.+?) \. (?P<year>\d{2}) \. (?P<month>\d{2}) \. (?P<day>\d{2})";
        let date = |name: &str| match parse_with(&[pattern], name).unwrap().kind {
            EpisodeKind::Dated { dates } => dates,
            other => panic!("{name}: unexpected {other:?}"),
        };

        assert_eq!(
            date("show.99.01.02.avi"),
            vec![NaiveDate::from_ymd_opt(1999, 1, 2).unwrap()]
        );
        assert_eq!(
            date("show.20.01.02.avi"),
            vec![NaiveDate::from_ymd_opt(2020, 1, 2).unwrap()]
        );
    }
}
