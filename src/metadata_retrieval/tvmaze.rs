/// TVMaze metadata provider implementation.
use super::tvmaze_types::{TvMazeEpisode, TvMazeShow};
use super::{Episode, MetadataProvider, MetadataRetrievalError, Season, SeriesQuery, TVSeries};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

/// Metadata provider for the TVMaze API.
///
/// This provider fetches TV series information from https://api.tvmaze.com
/// using the singlesearch endpoint (or the show endpoint for ids) with
/// embedded episodes. TVMaze has a single catalogue language, so the
/// requested language does not change the result.
pub struct TvMazeProvider {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl Default for TvMazeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TvMazeProvider {
    /// Creates a new TVMaze provider instance.
    pub fn new() -> Self {
        Self::with_base_url("https://api.tvmaze.com")
    }

    /// Creates a provider talking to another TVMaze compatible endpoint.
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Converts a TVMaze episode to our internal Episode structure.
    ///
    /// Specials have no episode number and are dropped.
    fn convert_episode(tvmaze_episode: TvMazeEpisode) -> Option<Episode> {
        let episode_number = tvmaze_episode.number?;

        Some(Episode {
            season_number: tvmaze_episode.season,
            episode_number,
            absolute_number: None,
            name: tvmaze_episode.name.filter(|n| !n.trim().is_empty()),
            airdate: tvmaze_episode
                .airdate
                .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
        })
    }

    /// Converts TVMaze show data to our internal TVSeries structure.
    ///
    /// Groups episodes by season and assigns absolute numbers in season order.
    fn convert_to_series(tvmaze_show: TvMazeShow) -> Result<TVSeries, MetadataRetrievalError> {
        // Extract episodes from embedded data
        let episodes = tvmaze_show
            .embedded
            .ok_or_else(|| {
                MetadataRetrievalError::InvalidData("No episodes found in API response".to_string())
            })?
            .episodes;

        // Group episodes by season number, sorted by season number
        let mut seasons_map: BTreeMap<u32, Vec<Episode>> = BTreeMap::new();

        for episode in episodes.into_iter().filter_map(Self::convert_episode) {
            seasons_map
                .entry(episode.season_number)
                .or_default()
                .push(episode);
        }

        let mut absolute_number = 0;
        let seasons: Vec<Season> = seasons_map
            .into_iter()
            .map(|(season_number, mut episodes)| {
                // Sort episodes by episode number within each season
                episodes.sort_by_key(|e| e.episode_number);

                // Season 0 holds specials, they are not part of the absolute order
                if season_number > 0 {
                    for episode in &mut episodes {
                        absolute_number += 1;
                        episode.absolute_number = Some(absolute_number);
                    }
                }

                Season {
                    season_number,
                    episodes,
                }
            })
            .collect();

        Ok(TVSeries {
            id: Some(tvmaze_show.id),
            name: tvmaze_show.name,
            seasons,
        })
    }
}

impl MetadataProvider for TvMazeProvider {
    fn fetch_series(
        &self,
        query: &SeriesQuery,
        _language: &str,
    ) -> Result<TVSeries, MetadataRetrievalError> {
        // Build the API request
        let request = match query {
            SeriesQuery::Name(name) => self
                .client
                .get(format!("{}/singlesearch/shows", self.base_url))
                .query(&[("q", name.as_str()), ("embed", "episodes")]),
            SeriesQuery::Id(id) => self
                .client
                .get(format!("{}/shows/{}", self.base_url, id))
                .query(&[("embed", "episodes")]),
        };

        debug!(%query, "Requesting series from TVMaze");

        let response = request
            .send()
            .map_err(|e| MetadataRetrievalError::RequestError(e.to_string()))?;

        // Check if the series was found
        if response.status() == 404 {
            return Err(MetadataRetrievalError::ShowNotFound(query.to_string()));
        }

        // Ensure request was successful
        if !response.status().is_success() {
            return Err(MetadataRetrievalError::RequestError(format!(
                "HTTP {} {}",
                response.status().as_u16(),
                response.status().canonical_reason().unwrap_or("Unknown")
            )));
        }

        // Parse the JSON response
        let tvmaze_show: TvMazeShow = response
            .json()
            .map_err(|e| MetadataRetrievalError::ParseError(e.to_string()))?;

        // Convert to our internal structures
        Self::convert_to_series(tvmaze_show)
    }
}
