//! Episode identity extracted from a filename
//!
//! An [`EpisodeIdentity`] is created by the parser for one file, updated once
//! with the result of the metadata lookup and finally rendered into the new
//! filename.

use crate::config::Config;
use crate::metadata_retrieval::{Episode, MetadataRetrievalError, SeriesQuery, TVSeries};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// How the episode is identified within its series
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EpisodeKind {
    /// Season and one or more episode numbers
    Seasoned { season: u32, episodes: Vec<u32> },
    /// Episode numbers without a season
    NoSeason { episodes: Vec<u32> },
    /// Fansub release, `[group] Show - 01 [crc]`
    Anime {
        group: String,
        crc: Option<String>,
        episodes: Vec<u32>,
    },
    /// Daily shows identified by air date
    Dated { dates: Vec<NaiveDate> },
}

/// Resolved episode name(s)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EpisodeName {
    Single(String),
    /// One name per episode number, in the same order
    Multiple(Vec<String>),
}

/// Sort position of a single episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EpisodeOrdinal {
    Number(u32),
    Date(NaiveDate),
}

/// Everything known about the episode stored in one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeIdentity {
    /// Parsed (and after lookup canonical) series name
    pub series_name: String,
    /// Series id from an input series replacement or the lookup
    pub series_id: Option<u64>,
    pub kind: EpisodeKind,
    pub episode_name: Option<EpisodeName>,
    pub original_path: PathBuf,
    /// Extension including the leading dot, may be empty
    pub extension: String,
    /// Named captures not consumed by the parser, available to templates
    pub extra: BTreeMap<String, String>,
}

impl EpisodeIdentity {
    pub fn season(&self) -> Option<u32> {
        match &self.kind {
            EpisodeKind::Seasoned { season, .. } => Some(*season),
            _ => None,
        }
    }

    /// Episode numbers, empty for dated episodes
    pub fn episode_numbers(&self) -> &[u32] {
        match &self.kind {
            EpisodeKind::Seasoned { episodes, .. }
            | EpisodeKind::NoSeason { episodes }
            | EpisodeKind::Anime { episodes, .. } => episodes,
            EpisodeKind::Dated { .. } => &[],
        }
    }

    pub fn episode_count(&self) -> usize {
        match &self.kind {
            EpisodeKind::Dated { dates } => dates.len(),
            _ => self.episode_numbers().len(),
        }
    }

    pub fn is_dated(&self) -> bool {
        matches!(self.kind, EpisodeKind::Dated { .. })
    }

    /// Basename of the file the identity was parsed from
    pub fn original_filename(&self) -> String {
        self.original_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Orders files by series, season and episode
    pub fn sort_key(&self) -> (String, Option<u32>, Vec<EpisodeOrdinal>) {
        let ordinals = match &self.kind {
            EpisodeKind::Dated { dates } => {
                dates.iter().copied().map(EpisodeOrdinal::Date).collect()
            }
            _ => self
                .episode_numbers()
                .iter()
                .copied()
                .map(EpisodeOrdinal::Number)
                .collect(),
        };

        (self.series_name.to_lowercase(), self.season(), ordinals)
    }

    /// What to ask the metadata provider for
    ///
    /// A configured series id wins over a forced name, which wins over an id
    /// from the input series replacements and finally the parsed name.
    pub fn lookup_query(&self, config: &Config) -> SeriesQuery {
        if let Some(id) = config.series_id {
            SeriesQuery::Id(id)
        } else if let Some(name) = &config.force_name {
            SeriesQuery::Name(name.clone())
        } else if let Some(id) = self.series_id {
            SeriesQuery::Id(id)
        } else {
            SeriesQuery::Name(self.series_name.clone())
        }
    }

    /// Takes over the canonical series name and fills in the episode names
    ///
    /// The series name is updated even if the episodes cannot be resolved.
    /// In that case the episode name stays empty and the partial error is
    /// returned.
    pub fn apply_lookup(
        &mut self,
        series: &TVSeries,
        output_series_replacements: &HashMap<String, String>,
    ) -> Result<(), MetadataRetrievalError> {
        self.series_name = output_series_replacements
            .get(&series.name)
            .cloned()
            .unwrap_or_else(|| series.name.clone());
        self.series_id = series.id.or(self.series_id);
        self.episode_name = None;

        let names = match &self.kind {
            EpisodeKind::Seasoned { season, episodes } => episodes
                .iter()
                .map(|&number| {
                    let label = format!("S{season:02}E{number:02}");
                    episode_title(series, series.episode(*season, number)?, label)
                })
                .collect::<Result<Vec<_>, _>>()?,
            EpisodeKind::NoSeason { episodes } | EpisodeKind::Anime { episodes, .. } => episodes
                .iter()
                .map(|&number| {
                    episode_title(series, series.episode_by_absolute(number)?, format!("#{number}"))
                })
                .collect::<Result<Vec<_>, _>>()?,
            EpisodeKind::Dated { dates } => dates
                .iter()
                .map(|&date| {
                    episode_title(series, series.episode_aired_on(date)?, date.to_string())
                })
                .collect::<Result<Vec<_>, _>>()?,
        };

        self.episode_name = match <[String; 1]>::try_from(names) {
            Ok([name]) => Some(EpisodeName::Single(name)),
            Err(names) if names.is_empty() => None,
            Err(names) => Some(EpisodeName::Multiple(names)),
        };

        Ok(())
    }
}

fn episode_title(
    series: &TVSeries,
    episode: &Episode,
    label: String,
) -> Result<String, MetadataRetrievalError> {
    episode
        .name
        .clone()
        .ok_or_else(|| MetadataRetrievalError::EpisodeNameNotFound {
            series: series.name.clone(),
            episode: label,
        })
}
