//! Facilities for pulling anime data from AniList.

use crate::season::Season;
use anyhow::Error;
use async_std::task::sleep;
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use clap::Args;
use derive_more::Into;
use serde::{de::Deserializer, Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use strum::{Display, EnumString};

mod client;
mod local;

pub use client::{Action, Client, Retry};
pub use local::LocalClient;

/// The AniList GraphQL endpoint.
pub const ANILIST_API_URL: &str = "https://graphql.anilist.co/";

/// A source of AniList media pages.
#[async_trait]
pub trait AniList {
    /// Load one page of results for `query`.
    ///
    /// Pages are numbered from 1.
    async fn page(&self, query: &MediaQuery, page: u32, per_page: u32) -> Result<Page, Error>;
}

/// AniList source options.
#[derive(Clone, Debug, Default, Args)]
#[group(skip)]
pub struct Options {
    /// Read AniList pages saved under DIR instead of querying the API.
    ///
    /// DIR should contain one directory per query, each holding raw responses named by page
    /// number:
    ///
    ///     DIR/
    ///         releasing/
    ///             1.json
    ///             2.json
    ///         finished/
    ///         upcoming/
    ///         started/
    #[clap(long = "local", env = "ANIME_TRACKER_ANILIST_DIR", name = "DIR")]
    pub local: Option<PathBuf>,
}

impl Options {
    /// Open the configured AniList source.
    pub fn open(&self) -> Result<Box<dyn AniList + Send + Sync>, Error> {
        Ok(match &self.local {
            Some(dir) => Box::new(LocalClient::open(dir.clone())),
            None => Box::new(Client::new()?),
        })
    }
}

#[async_trait]
impl<T: AniList + Send + Sync + ?Sized> AniList for Box<T> {
    async fn page(&self, query: &MediaQuery, page: u32, per_page: u32) -> Result<Page, Error> {
        (**self).page(query, page, per_page).await
    }
}

/// A media listing to page through.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MediaQuery {
    /// Everything currently airing.
    Releasing,
    /// Series which finished airing between two dates.
    FinishedBetween { from: NaiveDate, to: NaiveDate },
    /// Series announced for a season which has not started yet.
    Upcoming { season: Season, year: i32 },
    /// Every non-adult series which started between two dates.
    StartedBetween { from: NaiveDate, to: NaiveDate },
}

const SCHEDULE_FIELDS: &str = "
    id
    idMal
    title { romaji english }
    averageScore
    episodes
    nextAiringEpisode { episode airingAt }
    coverImage { extraLarge large medium }
    siteUrl
    startDate { year month day }
    endDate { year month day }
    externalLinks { site url icon }
    genres
    isAdult
    duration
    format
    popularity
    status
";

const UPCOMING_FIELDS: &str = "
    id
    idMal
    title { romaji english }
    averageScore
    episodes
    coverImage { extraLarge large medium }
    siteUrl
    startDate { year month day }
    season
    seasonYear
    genres
    isAdult
    duration
    format
    popularity
    favourites
    studios { nodes { name } }
";

const CATALOG_FIELDS: &str = "
    id idMal
    title { romaji english }
    averageScore popularity genres episodes format status
    season seasonYear
    coverImage { large medium }
    siteUrl
    startDate { year month day }
";

impl MediaQuery {
    /// A short, stable name for this kind of query.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Releasing => "releasing",
            Self::FinishedBetween { .. } => "finished",
            Self::Upcoming { .. } => "upcoming",
            Self::StartedBetween { .. } => "started",
        }
    }

    /// The GraphQL document for this query.
    pub fn document(&self) -> String {
        let (params, filter, fields) = match self {
            Self::Releasing => (
                "",
                "status: RELEASING, type: ANIME, format_in: [TV, ONA, TV_SHORT], \
                 sort: [POPULARITY_DESC]",
                SCHEDULE_FIELDS,
            ),
            Self::FinishedBetween { .. } => (
                ", $startDate: FuzzyDateInt, $endDate: FuzzyDateInt",
                "status: FINISHED, type: ANIME, format_in: [TV, ONA, TV_SHORT], \
                 sort: [POPULARITY_DESC], endDate_greater: $startDate, endDate_lesser: $endDate",
                SCHEDULE_FIELDS,
            ),
            Self::Upcoming { .. } => (
                ", $season: MediaSeason, $year: Int",
                "status: NOT_YET_RELEASED, type: ANIME, format_in: [TV, ONA, TV_SHORT], \
                 season: $season, seasonYear: $year, sort: [POPULARITY_DESC]",
                UPCOMING_FIELDS,
            ),
            Self::StartedBetween { .. } => (
                ", $startDate: FuzzyDateInt, $endDate: FuzzyDateInt",
                "type: ANIME, format_in: [TV, ONA, TV_SHORT], sort: [START_DATE], \
                 startDate_greater: $startDate, startDate_lesser: $endDate, isAdult: false",
                CATALOG_FIELDS,
            ),
        };
        format!(
            "query ($page: Int, $perPage: Int{params}) {{
                Page(page: $page, perPage: $perPage) {{
                    pageInfo {{ hasNextPage currentPage }}
                    media({filter}) {{ {fields} }}
                }}
            }}"
        )
    }

    /// The GraphQL variables for one page of this query.
    pub fn variables(&self, page: u32, per_page: u32) -> Value {
        let mut vars = json!({ "page": page, "perPage": per_page });
        match self {
            Self::Releasing => {}
            Self::FinishedBetween { from, to } | Self::StartedBetween { from, to } => {
                vars["startDate"] = fuzzy_int(*from).into();
                vars["endDate"] = fuzzy_int(*to).into();
            }
            Self::Upcoming { season, year } => {
                vars["season"] = season.to_string().into();
                vars["year"] = (*year).into();
            }
        }
        vars
    }
}

/// Encode a date as an AniList `FuzzyDateInt` (`YYYYMMDD`).
pub fn fuzzy_int(date: NaiveDate) -> u32 {
    date.year() as u32 * 10_000 + date.month() * 100 + date.day()
}

/// One page of media results.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Page {
    #[serde(rename = "pageInfo", default)]
    pub info: PageInfo,
    #[serde(default, deserialize_with = "null_as_default")]
    pub media: Vec<Media>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(default)]
    pub has_next_page: bool,
    #[serde(default)]
    pub current_page: Option<u32>,
}

/// The body of an AniList response.
///
/// Successful responses have the form
/// ```json
/// { "data": { "Page": { ... } } }
/// ```
/// while failed ones carry an `errors` array, possibly alongside a null `data`.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct Response {
    #[serde(default)]
    data: Option<PageResponse>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Clone, Debug, Deserialize, Into)]
struct PageResponse {
    #[serde(rename = "Page")]
    page: Page,
}

#[derive(Clone, Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

impl Response {
    pub(crate) fn into_page(self) -> Result<Page, Error> {
        match self.data {
            Some(data) => {
                for err in &self.errors {
                    tracing::warn!("AniList partial error: {}", err.message);
                }
                Ok(data.into())
            }
            None => {
                let messages = self
                    .errors
                    .into_iter()
                    .map(|err| err.message)
                    .collect::<Vec<_>>();
                Err(Error::msg(format!(
                    "AniList API error: {}",
                    if messages.is_empty() {
                        "response has no data".to_string()
                    } else {
                        messages.join("; ")
                    }
                )))
            }
        }
    }
}

/// An AniList media entry.
///
/// Only the fields this tracker uses are modeled. AniList sends `null` for anything it does not
/// know, so every field tolerates absence.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub id: u64,
    #[serde(default)]
    pub id_mal: Option<u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: Title,
    #[serde(default)]
    pub average_score: Option<u32>,
    #[serde(default)]
    pub episodes: Option<u32>,
    #[serde(default)]
    pub next_airing_episode: Option<AiringEpisode>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cover_image: CoverImage,
    #[serde(default)]
    pub site_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub start_date: FuzzyDate,
    #[serde(default, deserialize_with = "null_as_default")]
    pub end_date: FuzzyDate,
    #[serde(default, deserialize_with = "null_as_default")]
    pub external_links: Vec<ExternalLink>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub genres: Vec<String>,
    #[serde(default)]
    pub is_adult: Option<bool>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub format: Option<MediaFormat>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub popularity: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub favourites: u64,
    #[serde(default)]
    pub status: Option<MediaStatus>,
    #[serde(default)]
    pub season: Option<Season>,
    #[serde(default)]
    pub season_year: Option<i32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub studios: Studios,
}

impl Media {
    /// The romaji title.
    pub fn name(&self) -> &str {
        &self.title.romaji
    }

    /// The English title, if there is a non-empty one.
    pub fn english(&self) -> Option<&str> {
        self.title.english.as_deref().filter(|title| !title.is_empty())
    }

    /// Whether either title contains `needle`, ignoring case.
    pub fn title_contains(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.name().to_lowercase().contains(&needle)
            || self
                .english()
                .is_some_and(|english| english.to_lowercase().contains(&needle))
    }

    /// The largest available cover image.
    pub fn poster_url(&self) -> String {
        let cover = &self.cover_image;
        cover
            .extra_large
            .as_ref()
            .or(cover.large.as_ref())
            .or(cover.medium.as_ref())
            .cloned()
            .unwrap_or_default()
    }

    /// The AniList page for this media.
    pub fn site_url(&self) -> String {
        self.site_url
            .clone()
            .unwrap_or_else(|| format!("https://anilist.co/anime/{}", self.id))
    }

    /// Names of the studios credited on this media.
    pub fn studio_names(&self) -> Vec<String> {
        self.studios
            .nodes
            .iter()
            .map(|studio| studio.name.clone())
            .collect()
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Title {
    #[serde(default, deserialize_with = "null_as_default")]
    pub romaji: String,
    #[serde(default)]
    pub english: Option<String>,
}

/// The next scheduled episode of a series.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiringEpisode {
    pub episode: u32,
    /// Unix timestamp of the broadcast.
    pub airing_at: i64,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverImage {
    #[serde(default)]
    pub extra_large: Option<String>,
    #[serde(default)]
    pub large: Option<String>,
    #[serde(default)]
    pub medium: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ExternalLink {
    #[serde(default, deserialize_with = "null_as_default")]
    pub site: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Studios {
    #[serde(default, deserialize_with = "null_as_default")]
    pub nodes: Vec<Studio>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Studio {
    pub name: String,
}

/// A date which may be only partially known.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct FuzzyDate {
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub month: Option<u32>,
    #[serde(default)]
    pub day: Option<u32>,
}

impl FuzzyDate {
    pub fn new(year: i32, month: u32, day: u32) -> Self {
        Self {
            year: Some(year),
            month: Some(month),
            day: Some(day),
        }
    }

    /// The date, with an unknown month or day taken to be the first.
    pub fn to_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year?, self.month.unwrap_or(1), self.day.unwrap_or(1))
    }

    /// The date, with an unknown day taken to be the first, if at least the month is known.
    pub fn to_month_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year?, self.month?, self.day.unwrap_or(1))
    }

    /// The date, only if it is fully known.
    pub fn to_exact_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year?, self.month?, self.day?)
    }

    /// As precise a label as is known: `YYYY-MM-DD`, `YYYY-MM`, or `YYYY`.
    pub fn label(&self) -> Option<String> {
        match (self.year?, self.month, self.day) {
            (year, Some(month), Some(day)) => Some(format!("{year}-{month:02}-{day:02}")),
            (year, Some(month), None) => Some(format!("{year}-{month:02}")),
            (year, None, _) => Some(year.to_string()),
        }
    }
}

/// The format of a media entry.
#[derive(
    Clone, Copy, Debug, Display, PartialEq, Eq, Hash, EnumString, Deserialize, Serialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaFormat {
    Tv,
    TvShort,
    Movie,
    Special,
    Ova,
    Ona,
    Music,
    Manga,
    Novel,
    OneShot,
}

/// The release status of a media entry.
#[derive(
    Clone, Copy, Debug, Display, PartialEq, Eq, Hash, EnumString, Deserialize, Serialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaStatus {
    Finished,
    Releasing,
    NotYetReleased,
    Cancelled,
    Hiatus,
}

/// How to page through a query.
#[derive(Clone, Debug)]
pub struct Paging {
    pub per_page: u32,
    /// Stop after this many pages even if more are available.
    pub max_pages: Option<u32>,
    /// Pause between consecutive page requests.
    pub delay: Duration,
}

impl Default for Paging {
    fn default() -> Self {
        Self {
            per_page: 50,
            max_pages: None,
            delay: Duration::ZERO,
        }
    }
}

impl Paging {
    /// Paging for long catalog scans, which are gentle on the rate limit.
    pub fn catalog() -> Self {
        Self {
            delay: Duration::from_secs(1),
            ..Default::default()
        }
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = Some(max_pages);
        self
    }
}

/// Load every page of `query`.
pub async fn fetch_all<A: AniList + ?Sized>(
    anilist: &A,
    query: &MediaQuery,
    paging: &Paging,
) -> Result<Vec<Media>, Error> {
    let (media, res) = fetch_partial(anilist, query, paging).await;
    res?;
    Ok(media)
}

/// Load pages of `query` until the listing is exhausted or a request fails.
///
/// The media loaded before a failure are returned along with the error.
pub async fn fetch_partial<A: AniList + ?Sized>(
    anilist: &A,
    query: &MediaQuery,
    paging: &Paging,
) -> (Vec<Media>, Result<(), Error>) {
    let mut results = vec![];
    let mut page = 1;
    loop {
        let res = match anilist.page(query, page, paging.per_page).await {
            Ok(res) => res,
            Err(err) => return (results, Err(err)),
        };
        if res.media.is_empty() {
            break;
        }
        results.extend(res.media);
        tracing::info!(
            "fetched {} page {page}, {} media so far",
            query.name(),
            results.len()
        );

        if !res.info.has_next_page {
            break;
        }
        if paging.max_pages.is_some_and(|max| page >= max) {
            tracing::warn!("{} stopped at page limit {page}", query.name());
            break;
        }
        page += 1;
        if !paging.delay.is_zero() {
            sleep(paging.delay).await;
        }
    }
    (results, Ok(()))
}

fn null_as_default<'a, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'a>,
    T: Default + Deserialize<'a>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}
