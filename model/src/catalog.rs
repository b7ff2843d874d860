//! The catalog of every non-adult TV, TV short and ONA series AniList knows about.
//!
//! The catalog is built once with a full historical scan and then kept current by incremental
//! updates which re-fetch the last two months. Entries are keyed by AniList ID, so either kind of
//! update can be repeated safely.

use crate::{
    anilist::{fetch_partial, AniList, Media, MediaFormat, MediaQuery, MediaStatus, Paging},
    clock::Clock,
    season::Season,
    store::{Store, CATALOG},
};
use anyhow::Error;
use async_std::task::sleep;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};

/// First year covered by a full scan.
pub const FIRST_YEAR: i32 = 1990;

/// Years per full scan window.
pub const WINDOW_YEARS: i32 = 2;

/// Most pages fetched for a single full scan window.
pub const WINDOW_MAX_PAGES: u32 = 50;

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CatalogEntry {
    pub id: u64,
    pub mal_id: Option<u64>,
    pub name: String,
    pub english_title: Option<String>,
    pub poster_url: String,
    pub site_url: String,
    pub anilist_score: Option<u32>,
    pub popularity: u64,
    #[serde(default)]
    pub genres: Vec<String>,
    pub season: Option<Season>,
    pub season_year: Option<i32>,
    pub format: Option<MediaFormat>,
    pub episodes: Option<u32>,
    pub status: Option<MediaStatus>,
    /// As much of the start date as is known: `YYYY-MM-DD`, `YYYY-MM` or `YYYY`.
    pub start_date: Option<String>,
}

impl From<&Media> for CatalogEntry {
    fn from(media: &Media) -> Self {
        let cover = &media.cover_image;
        Self {
            id: media.id,
            mal_id: media.id_mal,
            name: media.name().to_string(),
            english_title: media.title.english.clone(),
            poster_url: cover
                .large
                .as_ref()
                .or(cover.medium.as_ref())
                .cloned()
                .unwrap_or_default(),
            site_url: media.site_url(),
            anilist_score: media.average_score,
            popularity: media.popularity,
            genres: media.genres.clone(),
            season: media.season,
            season_year: media.season_year,
            format: media.format,
            episodes: media.episodes,
            status: media.status,
            start_date: media.start_date.label(),
        }
    }
}

/// The outcome of merging new entries into the catalog.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub added: usize,
    pub updated: usize,
    pub total: usize,
}

/// Insert or replace entries by ID.
///
/// Replaced entries keep their position in the catalog; new ones are appended.
pub fn merge(
    catalog: &mut Vec<CatalogEntry>,
    new: impl IntoIterator<Item = CatalogEntry>,
) -> MergeStats {
    let mut index = catalog
        .iter()
        .enumerate()
        .map(|(i, entry)| (entry.id, i))
        .collect::<HashMap<_, _>>();
    let mut stats = MergeStats::default();
    for entry in new {
        match index.get(&entry.id) {
            Some(&i) => {
                catalog[i] = entry;
                stats.updated += 1;
            }
            None => {
                index.insert(entry.id, catalog.len());
                catalog.push(entry);
                stats.added += 1;
            }
        }
    }
    stats.total = catalog.len();
    tracing::info!(
        "merged: {} new, {} updated, total {}",
        stats.added,
        stats.updated,
        stats.total
    );
    stats
}

/// Most popular first.
pub fn sort(catalog: &mut [CatalogEntry]) {
    catalog.sort_by_key(|entry| Reverse(entry.popularity));
}

/// Every season which has at least one entry, newest first.
pub fn season_options(catalog: &[CatalogEntry]) -> Vec<(Season, i32)> {
    let seasons = catalog
        .iter()
        .filter_map(|entry| Some((entry.season_year?, entry.season?.order(), entry.season?)))
        .collect::<BTreeSet<_>>();
    seasons
        .into_iter()
        .rev()
        .map(|(year, _, season)| (season, year))
        .collect()
}

fn load(store: &Store) -> Result<Vec<CatalogEntry>, Error> {
    let catalog: Vec<CatalogEntry> = store.load_or_default(CATALOG)?;
    tracing::info!("loaded catalog with {} anime", catalog.len());
    Ok(catalog)
}

fn save(store: &Store, catalog: &mut [CatalogEntry]) -> Result<(), Error> {
    sort(catalog);
    store.save(CATALOG, &*catalog)
}

/// Fetch every series which started in `[from, to]`.
///
/// A failed request ends the range early; whatever was fetched before it is still returned.
async fn fetch_range<A: AniList + ?Sized>(
    anilist: &A,
    from: NaiveDate,
    to: NaiveDate,
    paging: &Paging,
) -> Vec<CatalogEntry> {
    let query = MediaQuery::StartedBetween { from, to };
    let (media, res) = fetch_partial(anilist, &query, paging).await;
    if let Err(err) = res {
        tracing::error!(
            "request failed for {from}..{to} after {} anime, continuing: {err:#}",
            media.len()
        );
    }
    media.iter().map(CatalogEntry::from).collect()
}

/// Rebuild the catalog from the first year covered to the present.
///
/// The scan walks multi-year windows oldest first, saving after each window, so an interrupted scan
/// loses at most one window of progress. Windows are paced at twice the page delay.
pub async fn full_scan<A: AniList + ?Sized>(
    anilist: &A,
    store: &Store,
    clock: &Clock,
    paging: &Paging,
) -> Result<MergeStats, Error> {
    let mut catalog = load(store)?;
    let paging = paging.clone().with_max_pages(WINDOW_MAX_PAGES);
    let this_year = clock.today().year();
    let mut stats = MergeStats {
        total: catalog.len(),
        ..Default::default()
    };

    for year in (FIRST_YEAR..=this_year).step_by(WINDOW_YEARS as usize) {
        let last = (year + WINDOW_YEARS - 1).min(this_year);
        let (Some(from), Some(to)) = (
            NaiveDate::from_ymd_opt(year, 1, 1),
            NaiveDate::from_ymd_opt(last, 12, 31),
        ) else {
            continue;
        };
        tracing::info!("scanning {year}-{last}");

        let window = fetch_range(anilist, from, to, &paging).await;
        if !window.is_empty() {
            let merged = merge(&mut catalog, window);
            stats.added += merged.added;
            stats.updated += merged.updated;
            stats.total = merged.total;
            save(store, &mut catalog)?;
        }
        if !paging.delay.is_zero() {
            sleep(paging.delay * 2).await;
        }
    }

    save(store, &mut catalog)?;
    tracing::info!("full scan complete: {} anime in catalog", catalog.len());
    Ok(stats)
}

/// Refresh the catalog with series which started last month or this month.
pub async fn incremental<A: AniList + ?Sized>(
    anilist: &A,
    store: &Store,
    clock: &Clock,
    paging: &Paging,
) -> Result<MergeStats, Error> {
    let mut catalog = load(store)?;
    let this_month = month_range(clock.today())
        .ok_or_else(|| Error::msg("cannot compute the current month"))?;
    let last_month = this_month
        .0
        .pred_opt()
        .and_then(month_range)
        .ok_or_else(|| Error::msg("cannot compute the previous month"))?;

    let mut stats = MergeStats {
        total: catalog.len(),
        ..Default::default()
    };
    for (i, (from, to)) in [last_month, this_month].into_iter().enumerate() {
        if i > 0 && !paging.delay.is_zero() {
            sleep(paging.delay).await;
        }
        tracing::info!("fetching {}", from.format("%Y-%m"));
        let entries = fetch_range(anilist, from, to, paging).await;
        if !entries.is_empty() {
            let merged = merge(&mut catalog, entries);
            stats.added += merged.added;
            stats.updated += merged.updated;
            stats.total = merged.total;
        }
    }

    save(store, &mut catalog)?;
    Ok(stats)
}

/// The first and last days of the month containing `date`.
fn month_range(date: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let first = date.with_day(1)?;
    let next = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)?
    };
    Some((first, next.pred_opt()?))
}
