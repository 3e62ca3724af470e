//! Filename synthesis
//!
//! Renders an [`EpisodeIdentity`] into the new filename. The template is
//! chosen by episode kind and by whether the episode name (and for anime
//! releases the crc) is known.

use crate::config::{Config, ConfigValueError};
use crate::episode::{EpisodeIdentity, EpisodeKind, EpisodeName};
use crate::multi_episode::aggregate_names;
use crate::replacements::{ExtensionSplitter, Replacements};
use crate::sanitize::{FilenameSanitizer, Platform, strip_accents};
use crate::template::{self, Fields, Value};

/// Words kept lower-case by title casing unless they start or end the name
const SMALL_WORDS: &[&str] = &[
    "a", "an", "and", "as", "at", "but", "by", "en", "for", "if", "in", "of", "on", "or", "the",
    "to", "v", "via", "vs",
];

/// Templates for every episode kind
#[derive(Debug, Clone)]
struct Templates {
    with_episode: String,
    without_episode: String,
    with_episode_no_season: String,
    without_episode_no_season: String,
    with_date_and_episode: String,
    with_date_without_episode: String,
    anime_with_episode: String,
    anime_without_episode: String,
    anime_with_episode_without_crc: String,
    anime_without_episode_without_crc: String,
}

/// Renders identities into filenames
#[derive(Debug, Clone)]
pub struct NameSynthesizer {
    templates: Templates,
    episode_single: String,
    episode_separator: String,
    multiep_join_name_with: String,
    multiep_format: String,
    titlecase: bool,
    lowercase: bool,
    normalize_unicode: bool,
    output_replacements: Replacements,
    extension: ExtensionSplitter,
    sanitizer: FilenameSanitizer,
}

impl NameSynthesizer {
    pub fn new(config: &Config) -> Result<Self, ConfigValueError> {
        let extension = ExtensionSplitter::new(&config.extension_pattern)?;
        let platform = if config.windows_safe_filenames {
            Platform::Windows
        } else {
            Platform::current()
        };

        let sanitizer = FilenameSanitizer::new(platform, extension.clone())
            .with_custom_blacklist(&config.custom_filename_character_blacklist)
            .with_replacement(&config.replace_invalid_characters_with)
            .with_unicode_normalization(config.normalize_unicode_filenames);

        Ok(Self {
            templates: Templates {
                with_episode: config.filename_with_episode.clone(),
                without_episode: config.filename_without_episode.clone(),
                with_episode_no_season: config.filename_with_episode_no_season.clone(),
                without_episode_no_season: config.filename_without_episode_no_season.clone(),
                with_date_and_episode: config.filename_with_date_and_episode.clone(),
                with_date_without_episode: config.filename_with_date_without_episode.clone(),
                anime_with_episode: config.filename_anime_with_episode.clone(),
                anime_without_episode: config.filename_anime_without_episode.clone(),
                anime_with_episode_without_crc: config
                    .filename_anime_with_episode_without_crc
                    .clone(),
                anime_without_episode_without_crc: config
                    .filename_anime_without_episode_without_crc
                    .clone(),
            },
            episode_single: config.episode_single.clone(),
            episode_separator: config.episode_separator.clone(),
            multiep_join_name_with: config.multiep_join_name_with.clone(),
            multiep_format: config.multiep_format.clone(),
            titlecase: config.titlecase_filename,
            lowercase: config.lowercase_filename,
            normalize_unicode: config.normalize_unicode_filenames,
            output_replacements: Replacements::compile(
                "output_filename_replacements",
                &config.output_filename_replacements,
            )?,
            extension,
            sanitizer,
        })
    }

    /// Sanitizer used for the final name, also used for destination paths
    pub fn sanitizer(&self) -> &FilenameSanitizer {
        &self.sanitizer
    }

    /// Renders the name without output replacements or filesystem rules
    pub fn preview(&self, identity: &EpisodeIdentity) -> Result<String, ConfigValueError> {
        let fields = self.fields(identity)?;
        let mut name = template::render(self.template_for(identity), &fields)?;

        if self.titlecase {
            let (base, extension) = self.extension.split(&name);
            name = title_case(base) + extension;
        } else if self.lowercase {
            name = name.to_lowercase();
        }

        if self.normalize_unicode {
            name = strip_accents(&name);
        }

        Ok(name)
    }

    /// Renders the final, filesystem-safe filename
    ///
    /// Applies the output filename replacements to the preview and makes the
    /// result a valid filename for the target platform.
    ///
    /// # Arguments
    ///
    /// * `identity` - The episode, usually after the metadata lookup
    ///
    /// # Returns
    ///
    /// The new filename, or a `ConfigValueError` if the selected template
    /// references a field the episode does not provide.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let synthesizer = NameSynthesizer::new(&Config::default())?;
    /// let name = synthesizer.render(&episode)?;
    /// assert_eq!(name, "Scrubs - [01x01] - My First Day.avi");
    /// ```
    pub fn render(&self, identity: &EpisodeIdentity) -> Result<String, ConfigValueError> {
        let name = self.preview(identity)?;
        let name = self.output_replacements.apply(&name, &self.extension);
        Ok(self.sanitizer.make_valid(&name))
    }

    fn template_for(&self, identity: &EpisodeIdentity) -> &str {
        let named = identity.episode_name.is_some();
        let t = &self.templates;

        match (&identity.kind, named) {
            (EpisodeKind::Seasoned { .. }, true) => &t.with_episode,
            (EpisodeKind::Seasoned { .. }, false) => &t.without_episode,
            (EpisodeKind::NoSeason { .. }, true) => &t.with_episode_no_season,
            (EpisodeKind::NoSeason { .. }, false) => &t.without_episode_no_season,
            (EpisodeKind::Dated { .. }, true) => &t.with_date_and_episode,
            (EpisodeKind::Dated { .. }, false) => &t.with_date_without_episode,
            (EpisodeKind::Anime { crc: Some(_), .. }, true) => &t.anime_with_episode,
            (EpisodeKind::Anime { crc: Some(_), .. }, false) => &t.anime_without_episode,
            (EpisodeKind::Anime { crc: None, .. }, true) => &t.anime_with_episode_without_crc,
            (EpisodeKind::Anime { crc: None, .. }, false) => &t.anime_without_episode_without_crc,
        }
    }

    /// Extra captures overlaid with the computed fields
    fn fields(&self, identity: &EpisodeIdentity) -> Result<Fields, ConfigValueError> {
        let mut fields: Fields = identity
            .extra
            .iter()
            .map(|(name, value)| (name.clone(), Value::from(value.as_str())))
            .collect();

        fields.insert("seriesname".to_string(), identity.series_name.as_str().into());
        fields.insert("episode".to_string(), self.format_episode(identity)?.into());
        fields.insert("ext".to_string(), identity.extension.as_str().into());

        match &identity.kind {
            EpisodeKind::Seasoned { season, .. } => {
                fields.insert("seasonnumber".to_string(), Value::from(*season));
            }
            EpisodeKind::Anime { group, crc, .. } => {
                fields.insert("group".to_string(), group.as_str().into());
                if let Some(crc) = crc {
                    fields.insert("crc".to_string(), crc.as_str().into());
                }
            }
            EpisodeKind::NoSeason { .. } | EpisodeKind::Dated { .. } => {}
        }

        match &identity.episode_name {
            Some(EpisodeName::Single(name)) => {
                fields.insert("episodename".to_string(), name.as_str().into());
            }
            Some(EpisodeName::Multiple(names)) => {
                let name =
                    aggregate_names(names, &self.multiep_join_name_with, &self.multiep_format)?;
                fields.insert("episodename".to_string(), name.into());
            }
            None => {}
        }

        Ok(fields)
    }

    /// Formats the episode numbers, or the air dates of dated episodes
    fn format_episode(&self, identity: &EpisodeIdentity) -> Result<String, ConfigValueError> {
        let formatted = match &identity.kind {
            EpisodeKind::Dated { dates } => dates
                .iter()
                .map(|date| date.format("%Y-%m-%d").to_string())
                .collect::<Vec<_>>(),
            _ => identity
                .episode_numbers()
                .iter()
                .map(|&number| template::format_number(&self.episode_single, i64::from(number)))
                .collect::<Result<Vec<_>, _>>()?,
        };

        Ok(formatted.join(&self.episode_separator))
    }
}

/// Capitalizes words, keeping small words lower-case inside the name
///
/// Words that already contain upper-case letters after their first character
/// are left alone.
pub fn title_case(text: &str) -> String {
    let words: Vec<&str> = text.split(' ').collect();
    let last = words.len().saturating_sub(1);

    words
        .iter()
        .enumerate()
        .map(|(i, word)| {
            if word.chars().skip(1).any(char::is_uppercase) {
                return word.to_string();
            }

            let lower = word.to_lowercase();
            if i != 0 && i != last && SMALL_WORDS.contains(&lower.as_str()) {
                return lower;
            }

            capitalize_first(word)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Upper-cases the first alphanumeric character if it is a letter
fn capitalize_first(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut done = false;

    for c in word.chars() {
        if !done && c.is_alphanumeric() {
            done = true;
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata_retrieval::testing::scrubs;
    use crate::parser::FilenameParser;
    use chrono::NaiveDate;
    use std::collections::{BTreeMap, HashMap};
    use std::path::{Path, PathBuf};

    fn identity(kind: EpisodeKind, name: Option<EpisodeName>) -> EpisodeIdentity {
        EpisodeIdentity {
            series_name: "Scrubs".to_string(),
            series_id: None,
            kind,
            episode_name: name,
            original_path: PathBuf::from("scrubs.avi"),
            extension: ".avi".to_string(),
            extra: BTreeMap::new(),
        }
    }

    fn single(name: &str) -> Option<EpisodeName> {
        Some(EpisodeName::Single(name.to_string()))
    }

    fn synthesizer(config: &Config) -> NameSynthesizer {
        NameSynthesizer::new(config).unwrap()
    }

    #[test]
    fn test_seasoned_templates() {
        let synth = synthesizer(&Config::default());
        let kind = EpisodeKind::Seasoned {
            season: 1,
            episodes: vec![1],
        };

        assert_eq!(
            synth.render(&identity(kind.clone(), single("My First Day"))).unwrap(),
            "Scrubs - [01x01] - My First Day.avi"
        );
        assert_eq!(
            synth.render(&identity(kind, None)).unwrap(),
            "Scrubs - [01x01].avi"
        );
    }

    #[test]
    fn test_multi_episode_numbers_and_names() {
        let synth = synthesizer(&Config::default());
        let episode = identity(
            EpisodeKind::Seasoned {
                season: 1,
                episodes: vec![1, 2],
            },
            Some(EpisodeName::Multiple(vec![
                "My First Day".to_string(),
                "My Mentor".to_string(),
            ])),
        );

        assert_eq!(
            synth.render(&episode).unwrap(),
            "Scrubs - [01x01-02] - My First Day, My Mentor.avi"
        );
    }

    #[test]
    fn test_no_season_and_dated_templates() {
        let synth = synthesizer(&Config::default());

        let no_season = identity(EpisodeKind::NoSeason { episodes: vec![12] }, single("Pilot"));
        assert_eq!(synth.render(&no_season).unwrap(), "Scrubs - [12] - Pilot.avi");

        let dated = identity(
            EpisodeKind::Dated {
                dates: vec![NaiveDate::from_ymd_opt(2010, 1, 2).unwrap()],
            },
            None,
        );
        assert_eq!(synth.render(&dated).unwrap(), "Scrubs - [2010-01-02].avi");
    }

    #[test]
    fn test_anime_templates() {
        let synth = synthesizer(&Config::default());
        let with_crc = EpisodeKind::Anime {
            group: "Group".to_string(),
            crc: Some("ABCD1234".to_string()),
            episodes: vec![3],
        };
        let without_crc = EpisodeKind::Anime {
            group: "Group".to_string(),
            crc: None,
            episodes: vec![3],
        };

        assert_eq!(
            synth.render(&identity(with_crc.clone(), single("Foo"))).unwrap(),
            "[Group] Scrubs - 03 - Foo [ABCD1234].avi"
        );
        assert_eq!(
            synth.render(&identity(with_crc, None)).unwrap(),
            "[Group] Scrubs - 03 [ABCD1234].avi"
        );
        assert_eq!(
            synth.render(&identity(without_crc.clone(), single("Foo"))).unwrap(),
            "[Group] Scrubs - 03 - Foo.avi"
        );
        assert_eq!(
            synth.render(&identity(without_crc, None)).unwrap(),
            "[Group] Scrubs - 03.avi"
        );
    }

    #[test]
    fn test_computed_fields_win_over_extra_captures() {
        let config = Config {
            filename_without_episode_no_season: "%(seriesname)s %(quality)s%(ext)s".to_string(),
            ..Config::default()
        };
        let mut episode = identity(EpisodeKind::NoSeason { episodes: vec![1] }, None);
        episode.extra.insert("quality".to_string(), "720p".to_string());
        episode.extra.insert("seriesname".to_string(), "raw".to_string());

        assert_eq!(synthesizer(&config).render(&episode).unwrap(), "Scrubs 720p.avi");
    }

    #[test]
    fn test_missing_field_is_error() {
        let config = Config {
            filename_without_episode: "%(seriesname)s %(episodename)s%(ext)s".to_string(),
            ..Config::default()
        };
        let episode = identity(
            EpisodeKind::Seasoned {
                season: 1,
                episodes: vec![1],
            },
            None,
        );
        assert!(matches!(
            synthesizer(&config).render(&episode),
            Err(ConfigValueError::UndefinedField { .. })
        ));
    }

    #[test]
    fn test_episode_number_format() {
        let config = Config {
            episode_single: "%03d".to_string(),
            episode_separator: "+".to_string(),
            ..Config::default()
        };
        let episode = identity(EpisodeKind::NoSeason { episodes: vec![7, 8] }, None);
        assert_eq!(synthesizer(&config).render(&episode).unwrap(), "Scrubs - [007+008].avi");
    }

    #[test]
    fn test_case_transforms() {
        let episode = identity(
            EpisodeKind::Seasoned {
                season: 1,
                episodes: vec![3],
            },
            single("my best friend's mistake"),
        );

        let lowercase = Config {
            lowercase_filename: true,
            ..Config::default()
        };
        assert_eq!(
            synthesizer(&lowercase).preview(&episode).unwrap(),
            "scrubs - [01x03] - my best friend's mistake.avi"
        );

        // Title case wins when both are set
        let both = Config {
            titlecase_filename: true,
            ..lowercase
        };
        assert_eq!(
            synthesizer(&both).preview(&episode).unwrap(),
            "Scrubs - [01x03] - My Best Friend's Mistake.avi"
        );
    }

    #[test]
    fn test_unicode_normalization() {
        let config = Config {
            normalize_unicode_filenames: true,
            ..Config::default()
        };
        let episode = identity(EpisodeKind::NoSeason { episodes: vec![1] }, single("Café Crème"));
        assert_eq!(
            synthesizer(&config).preview(&episode).unwrap(),
            "Scrubs - [01] - Cafe Creme.avi"
        );
    }

    #[test]
    fn test_output_replacements_and_sanitizing() {
        let config = Config {
            output_filename_replacements: vec![crate::config::ReplacementRuleConfig::literal(
                " - ", ".",
            )],
            ..Config::default()
        };
        let episode = identity(
            EpisodeKind::Seasoned {
                season: 1,
                episodes: vec![1],
            },
            single("AC/DC"),
        );
        let synth = synthesizer(&config);

        assert_eq!(synth.preview(&episode).unwrap(), "Scrubs - [01x01] - AC/DC.avi");
        assert_eq!(synth.render(&episode).unwrap(), "Scrubs.[01x01].AC_DC.avi");
    }

    #[test]
    fn test_round_trip_is_identical() {
        let config = Config::default();
        let parser = FilenameParser::new(&config).unwrap();
        let synth = synthesizer(&config);

        for name in [
            "Scrubs - [01x01] - My First Day.avi",
            "Scrubs - [01x02-03] - My Mentor, My Best Friend's Mistake.avi",
        ] {
            let mut episode = parser.parse(Path::new(name)).unwrap();
            episode.apply_lookup(&scrubs(), &HashMap::new()).unwrap();
            assert_eq!(synth.render(&episode).unwrap(), name);
        }
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("the lord of the rings"), "The Lord of the Rings");
        assert_eq!(title_case("what is it for"), "What Is It For");
        assert_eq!(title_case("meet the iPhone"), "Meet the iPhone");
        assert_eq!(title_case("(parts 1-2)"), "(Parts 1-2)");
        assert_eq!(title_case("[01x01]"), "[01x01]");
    }
}
