//! MyAnimeList scores, through the Jikan API.

use anyhow::Error;
use async_std::task::sleep;
use async_trait::async_trait;
use derive_more::Into;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use surf::{StatusCode, Url};

/// The Jikan v4 API.
pub const JIKAN_API_URL: &str = "https://api.jikan.moe/v4/";

/// Pause between lookups; Jikan allows 3 requests per second.
pub const LOOKUP_DELAY: Duration = Duration::from_millis(350);

/// A source of MyAnimeList statistics.
#[async_trait]
pub trait Jikan {
    /// Look up the statistics for a MyAnimeList ID.
    ///
    /// Returns [`None`] if MyAnimeList has nothing for this ID.
    async fn scores(&self, mal_id: u64) -> Result<Option<MalScores>, Error>;
}

/// MyAnimeList statistics for a series.
///
/// These are attached to tracked series after the fact, so every field is optional and absent
/// fields are left out of the data files entirely.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct MalScores {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mal_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mal_scored_by: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mal_rank: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mal_popularity: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mal_members: Option<u64>,
}

/// Something which can carry MyAnimeList statistics.
pub trait MalTarget {
    /// A readable name, for logging.
    fn label(&self) -> &str;

    fn mal_id(&self) -> Option<u64>;

    fn mal(&self) -> &MalScores;

    fn mal_mut(&mut self) -> &mut MalScores;
}

/// Response from the `anime/{id}` endpoint.
#[derive(Clone, Debug, Deserialize, Into)]
struct AnimeResponse {
    data: AnimeStatistics,
}

#[derive(Clone, Debug, Deserialize)]
struct AnimeStatistics {
    score: Option<f64>,
    scored_by: Option<u64>,
    rank: Option<u64>,
    popularity: Option<u64>,
    members: Option<u64>,
}

impl From<AnimeStatistics> for MalScores {
    fn from(stats: AnimeStatistics) -> Self {
        Self {
            mal_score: stats.score,
            mal_scored_by: stats.scored_by,
            mal_rank: stats.rank,
            mal_popularity: stats.popularity,
            mal_members: stats.members,
        }
    }
}

/// A Jikan client.
pub struct Client {
    client: surf::Client,
    attempts: u32,
}

impl Client {
    /// Connect to Jikan.
    pub fn new() -> Result<Self, Error> {
        let client: surf::Client = surf::Config::new()
            .set_base_url(Url::parse(JIKAN_API_URL)?)
            .set_timeout(Some(Duration::from_secs(10)))
            .try_into()
            .map_err(|err| Error::msg(format!("unable to build Jikan client: {err}")))?;
        Ok(Self {
            client,
            attempts: 3,
        })
    }
}

/// What to do with a Jikan response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lookup {
    Read,
    Wait(Duration),
    Missing,
}

/// Decide what to do with a response on the given (0-based) attempt.
///
/// Rate limiting backs off exponentially; any other failure means MyAnimeList has nothing for us.
fn on_status(status: StatusCode, attempt: u32) -> Lookup {
    match status {
        StatusCode::Ok => Lookup::Read,
        StatusCode::TooManyRequests => Lookup::Wait(Duration::from_secs(1 << attempt)),
        _ => Lookup::Missing,
    }
}

#[async_trait]
impl Jikan for Client {
    async fn scores(&self, mal_id: u64) -> Result<Option<MalScores>, Error> {
        for attempt in 0..self.attempts {
            let last = attempt + 1 == self.attempts;
            let mut res = match self.client.get(format!("anime/{mal_id}")).await {
                Ok(res) => res,
                Err(err) => {
                    tracing::warn!("request error for MAL ID {mal_id}: {err}");
                    if !last {
                        sleep(Duration::from_secs(1)).await;
                    }
                    continue;
                }
            };
            match on_status(res.status(), attempt) {
                Lookup::Read => {
                    let body: AnimeResponse = res.body_json().await.map_err(Error::msg)?;
                    let stats: AnimeStatistics = body.into();
                    return Ok(Some(stats.into()));
                }
                Lookup::Wait(wait) => {
                    tracing::warn!("rate limited by Jikan for MAL ID {mal_id}");
                    if !last {
                        tracing::info!("waiting {wait:?}");
                        sleep(wait).await;
                    }
                }
                Lookup::Missing => {
                    tracing::warn!("error fetching MAL data for ID {mal_id}: {}", res.status());
                    return Ok(None);
                }
            }
        }
        Ok(None)
    }
}

/// Outcome of a score update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScoreStats {
    pub updated: usize,
    pub skipped: usize,
}

/// Fill in MyAnimeList statistics for every entry that has a MAL ID and no score yet.
pub async fn update_scores<J, T>(jikan: &J, entries: &mut [T], delay: Duration) -> ScoreStats
where
    J: Jikan + ?Sized,
    T: MalTarget,
{
    let mut stats = ScoreStats::default();
    let total = entries.len();
    for (i, entry) in entries.iter_mut().enumerate() {
        let Some(mal_id) = entry.mal_id().filter(|_| entry.mal().mal_score.is_none()) else {
            stats.skipped += 1;
            continue;
        };

        tracing::info!(
            "fetching MAL data for {} (MAL ID {mal_id}) [{}/{total}]",
            entry.label(),
            i + 1
        );
        match jikan.scores(mal_id).await {
            Ok(Some(scores)) => {
                *entry.mal_mut() = scores;
                stats.updated += 1;
            }
            Ok(None) => {}
            Err(err) => tracing::error!("unable to load MAL data for {}: {err}", entry.label()),
        }

        if !delay.is_zero() {
            sleep(delay).await;
        }
    }
    tracing::info!(
        "updated {} entries with MAL scores, skipped {}",
        stats.updated,
        stats.skipped
    );
    stats
}
