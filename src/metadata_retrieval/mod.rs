/// Data structures and traits for TV series metadata retrieval.
///
/// This module provides structures to represent TV series, seasons, and episodes
/// with their associated metadata (names, air dates, absolute numbers), as well
/// as the trait for implementing metadata providers.
mod cached;
mod tvmaze;
mod tvmaze_types;

pub use cached::CachedMetadataProvider;
pub use tvmaze::TvMazeProvider;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur during metadata retrieval operations.
///
/// The request, parse and invalid-data variants are data retrieval failures:
/// nothing is known about the series. The season, episode and episode name
/// variants are partial failures, the canonical series name is still usable.
#[derive(Debug, Error)]
pub enum MetadataRetrievalError {
    /// Request to the metadata provider failed
    #[error("Request failed: {0}")]
    RequestError(String),

    /// Failed to parse the provider's JSON response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// The API returned invalid or unexpected data
    #[error("API returned invalid data: {0}")]
    InvalidData(String),

    /// The requested series was not found
    #[error("Series not found: {0}")]
    ShowNotFound(String),

    /// The series has no such season
    #[error("Season {season} of {series} not found")]
    SeasonNotFound { series: String, season: u32 },

    /// The season (or the air date) has no such episode
    #[error("Episode {episode} of {series} not found")]
    EpisodeNotFound { series: String, episode: String },

    /// The episode exists but has no title
    #[error("Episode {episode} of {series} has no name")]
    EpisodeNameNotFound { series: String, episode: String },

    /// The user cancelled the lookup
    #[error("Aborted by user")]
    UserAbort,
}

impl MetadataRetrievalError {
    /// Whether the series was identified but the episode name is unknown
    pub fn is_partial(&self) -> bool {
        matches!(
            self,
            Self::SeasonNotFound { .. }
                | Self::EpisodeNotFound { .. }
                | Self::EpisodeNameNotFound { .. }
        )
    }
}

/// What to look a series up by
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SeriesQuery {
    /// Search by (parsed or forced) series name
    Name(String),
    /// Fetch by the provider's numeric series id
    Id(u64),
}

impl fmt::Display for SeriesQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesQuery::Name(name) => f.write_str(name),
            SeriesQuery::Id(id) => write!(f, "#{id}"),
        }
    }
}

/// Represents a single episode of a TV series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    /// The season number this episode belongs to
    pub season_number: u32,
    /// The episode number within the season
    pub episode_number: u32,
    /// Running number across all regular seasons, starting at 1
    pub absolute_number: Option<u32>,
    /// The episode title, if the provider knows it
    pub name: Option<String>,
    /// Date of the first broadcast
    pub airdate: Option<NaiveDate>,
}

/// Represents a season of a TV series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Season {
    /// The season number
    pub season_number: u32,
    /// List of episodes in this season
    pub episodes: Vec<Episode>,
}

/// Represents a complete TV series with all seasons and episodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TVSeries {
    /// The provider's id of the series
    pub id: Option<u64>,
    /// The canonical name of the TV series
    pub name: String,
    /// List of seasons in this series
    pub seasons: Vec<Season>,
}

impl TVSeries {
    pub fn season(&self, season_number: u32) -> Option<&Season> {
        self.seasons.iter().find(|s| s.season_number == season_number)
    }

    fn episodes(&self) -> impl Iterator<Item = &Episode> {
        self.seasons.iter().flat_map(|s| s.episodes.iter())
    }

    /// Finds an episode by season and episode number
    pub fn episode(
        &self,
        season_number: u32,
        episode_number: u32,
    ) -> Result<&Episode, MetadataRetrievalError> {
        let season = self
            .season(season_number)
            .ok_or_else(|| MetadataRetrievalError::SeasonNotFound {
                series: self.name.clone(),
                season: season_number,
            })?;

        season
            .episodes
            .iter()
            .find(|e| e.episode_number == episode_number)
            .ok_or_else(|| MetadataRetrievalError::EpisodeNotFound {
                series: self.name.clone(),
                episode: format!("S{season_number:02}E{episode_number:02}"),
            })
    }

    /// Finds an episode by its absolute number
    pub fn episode_by_absolute(
        &self,
        absolute_number: u32,
    ) -> Result<&Episode, MetadataRetrievalError> {
        self.episodes()
            .find(|e| e.absolute_number == Some(absolute_number))
            .ok_or_else(|| MetadataRetrievalError::EpisodeNotFound {
                series: self.name.clone(),
                episode: format!("#{absolute_number}"),
            })
    }

    /// Finds the single episode aired on `date`
    ///
    /// Several episodes on the same day are ambiguous and reported as not found.
    pub fn episode_aired_on(&self, date: NaiveDate) -> Result<&Episode, MetadataRetrievalError> {
        let aired: Vec<&Episode> = self.episodes().filter(|e| e.airdate == Some(date)).collect();

        match aired.as_slice() {
            [episode] => Ok(*episode),
            [] => Err(MetadataRetrievalError::EpisodeNotFound {
                series: self.name.clone(),
                episode: date.to_string(),
            }),
            _ => Err(MetadataRetrievalError::EpisodeNotFound {
                series: self.name.clone(),
                episode: format!("{date} (ambiguous air date, {} episodes)", aired.len()),
            }),
        }
    }
}

/// Trait for metadata providers that can fetch TV series information.
///
/// Implementors of this trait can retrieve episode metadata from various sources
/// such as TVMaze, TVDB, TMDB, or other episode databases. Calls are blocking.
pub trait MetadataProvider {
    /// Fetches metadata for a TV series.
    ///
    /// # Arguments
    ///
    /// * `query` - The name or id of the TV series to fetch
    /// * `language` - Preferred language for series and episode names
    ///
    /// # Returns
    ///
    /// A Result containing the TVSeries with metadata, or a MetadataRetrievalError
    fn fetch_series(
        &self,
        query: &SeriesQuery,
        language: &str,
    ) -> Result<TVSeries, MetadataRetrievalError>;
}
