//! The airing schedule: which episode of each current series airs today or tomorrow.
//!
//! AniList only tells us about the *next* episode of a series, which is often a week away by the
//! time its predecessor airs. The inference here works backwards from that (or, for series with
//! no next episode, forwards from the start and end dates) to decide what to show on a given day.

use crate::{
    anilist::{fetch_all, AniList, Media, MediaQuery, Paging},
    anitrendz::ChartPosition,
    clock::Clock,
    jikan::{MalScores, MalTarget},
    links::{streaming_links, StreamingLink},
    rules::Rules,
};
use anyhow::Error;
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashSet;

/// One currently airing (or just finished) series, as stored in the data files.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Release {
    pub id: u64,
    pub mal_id: Option<u64>,
    pub name: String,
    pub english_title: Option<String>,
    /// The episode shown for this series.
    pub episode: u32,
    /// The day [`episode`](Self::episode) airs, if it airs on a day worth highlighting.
    pub release_date: Option<NaiveDate>,
    pub next_airing_date: Option<NaiveDate>,
    pub next_episode_number: u32,
    pub poster_url: String,
    pub site_url: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub streaming_links: Vec<StreamingLink>,
    pub popularity: u64,
    #[serde(default)]
    pub popularity_rank: u32,
    pub anilist_score: Option<u32>,
    #[serde(default)]
    pub recently_finished: bool,
    #[serde(flatten)]
    pub mal: MalScores,
    #[serde(flatten)]
    pub chart: ChartPosition,
}

impl Release {
    /// Whether this series has something airing on `date`, either a regular episode or its
    /// final one.
    pub fn airs_on(&self, date: NaiveDate) -> bool {
        self.release_date == Some(date) || self.end_date == Some(date)
    }
}

impl MalTarget for Release {
    fn label(&self) -> &str {
        &self.name
    }

    fn mal_id(&self) -> Option<u64> {
        self.mal_id
    }

    fn mal(&self) -> &MalScores {
        &self.mal
    }

    fn mal_mut(&mut self) -> &mut MalScores {
        &mut self.mal
    }
}

/// Load every series which is airing, or which finished or is finishing around today.
pub async fn fetch_current<A: AniList + ?Sized>(
    anilist: &A,
    clock: &Clock,
    paging: &Paging,
) -> Result<Vec<Media>, Error> {
    let mut media = fetch_all(anilist, &MediaQuery::Releasing, paging).await?;
    let today = clock.today();
    let finished = MediaQuery::FinishedBetween {
        from: today - Duration::days(7),
        to: today + Duration::days(3),
    };
    media.extend(fetch_all(anilist, &finished, paging).await?);

    let mut seen = HashSet::new();
    media.retain(|m| seen.insert(m.id));
    tracing::info!("fetched {} current media", media.len());
    Ok(media)
}

/// Whether an episode of a series which started on `start` could plausibly air today.
fn could_air_today(start: NaiveDate, clock: &Clock) -> bool {
    let days = clock.days_since(start);
    (0..=7).contains(&days) || (days >= 7 && days % 7 == 0)
}

/// Should this media appear on the schedule at all?
pub fn is_relevant(media: &Media, rules: &Rules, clock: &Clock) -> bool {
    let cutoff = clock.today() - Duration::days(rules.cutoff_days);
    if media
        .start_date
        .year
        .is_some_and(|year| year < cutoff.year())
        && !rules.is_exception(media)
    {
        return false;
    }
    if rules.is_kids(media) || media.popularity < rules.min_popularity || rules.is_too_short(media)
    {
        return false;
    }
    if media.next_airing_episode.is_some() {
        return true;
    }

    if media
        .start_date
        .to_exact_date()
        .is_some_and(|start| could_air_today(start, clock))
    {
        return true;
    }
    match media.end_date.to_date() {
        Some(end) => {
            let until = clock.days_until(end);
            (-3..=7).contains(&until) || (0..=14).contains(&-until)
        }
        None => false,
    }
}

/// The outcome of episode inference for one series.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Estimate {
    pub episode: u32,
    pub release_date: Option<NaiveDate>,
    pub next_airing_date: Option<NaiveDate>,
    pub next_episode_number: u32,
}

/// Work out which episode of a series to show, and when it airs.
pub fn infer_episode(media: &Media, rules: &Rules, clock: &Clock) -> Estimate {
    let today = clock.today();
    // Weekly cadence is counted from the start date; an unknown day is taken to be the first.
    let start = media.start_date.to_month_date();
    let weeks_since_start = || {
        let days = clock.days_since(start?);
        (days >= 7 && days % 7 == 0).then_some((days / 7 + 1) as u32)
    };

    let mut next = None;
    let (mut episode, mut release_date) = match media.next_airing_episode {
        Some(airing) => {
            let n = airing.episode;
            let date = clock.date_of(airing.airing_at);
            next = date.map(|date| (n, date));

            let long_ago = today - Duration::days(rules.started_long_ago_days);
            let started_long_ago = start.is_some_and(|start| start <= long_ago);
            if !rules.is_exception(media) && (started_long_ago || n > rules.long_running_episodes) {
                (n, None)
            } else {
                match date {
                    Some(date) if (1..=7).contains(&clock.days_until(date)) => {
                        let previous = date - Duration::days(7);
                        if date.weekday() == today.weekday() {
                            (n.saturating_sub(1), Some(today))
                        } else if start.is_some() && (1..=2).contains(&clock.days_since(previous)) {
                            (n.saturating_sub(1), Some(previous))
                        } else {
                            (n, Some(date))
                        }
                    }
                    _ => match weeks_since_start() {
                        Some(expected) if expected < n => (expected, Some(today)),
                        _ => (n, date),
                    },
                }
            }
        }
        None => {
            let count = media.episodes.filter(|&count| count > 0).unwrap_or(1);
            let end = media.end_date.to_date();
            if end.is_some_and(|end| (1..=2).contains(&clock.days_until(end))) {
                // The series ends tomorrow or the day after, so its finale is today.
                (count, Some(today))
            } else if count > rules.long_running_episodes {
                (count, None)
            } else {
                match weeks_since_start() {
                    Some(expected) if expected <= count => (expected, Some(today)),
                    _ => (count, None),
                }
            }
        }
    };

    if let Some(end) = media.end_date.to_date() {
        if (end == today || end == clock.tomorrow()) && release_date != Some(end) {
            release_date = Some(end);
            if let Some(count) = media.episodes.filter(|&count| count > 0) {
                episode = count;
            }
        }
    }

    Estimate {
        episode,
        release_date,
        next_airing_date: next.map(|(_, date)| date),
        next_episode_number: next.map(|(n, _)| n).unwrap_or(episode),
    }
}

/// Turn raw media into the tracked schedule, ranked by popularity.
pub fn process(media: &[Media], rules: &Rules, clock: &Clock) -> Vec<Release> {
    let mut releases = media
        .iter()
        .filter(|m| is_relevant(m, rules, clock))
        .map(|m| {
            let estimate = infer_episode(m, rules, clock);
            let end_date = m.end_date.to_date();
            let recently_finished = m.next_airing_episode.is_none()
                && end_date.is_some_and(|end| (0..=14).contains(&clock.days_since(end)));
            Release {
                id: m.id,
                mal_id: m.id_mal,
                name: m.name().to_string(),
                english_title: m.title.english.clone(),
                episode: estimate.episode,
                release_date: estimate.release_date,
                next_airing_date: estimate.next_airing_date,
                next_episode_number: estimate.next_episode_number,
                poster_url: m.poster_url(),
                site_url: m.site_url(),
                start_date: m.start_date.to_date(),
                end_date,
                streaming_links: streaming_links(m, rules),
                popularity: m.popularity,
                popularity_rank: 0,
                anilist_score: m.average_score,
                recently_finished,
                mal: Default::default(),
                chart: Default::default(),
            }
        })
        .collect::<Vec<_>>();

    releases.sort_by_key(|release| Reverse(release.popularity));
    for (i, release) in releases.iter_mut().enumerate() {
        release.popularity_rank = i as u32 + 1;
    }
    tracing::info!(
        "{} of {} media are on the schedule",
        releases.len(),
        media.len()
    );
    releases
}

/// Order the series not airing today or tomorrow.
///
/// Returns the series still airing, soonest first, and separately those which finished in the
/// last two weeks, most recent first.
pub fn sort_other(releases: &[Release], clock: &Clock) -> (Vec<Release>, Vec<Release>) {
    let (today, tomorrow) = (clock.today(), clock.tomorrow());
    let (mut finished, mut other): (Vec<_>, Vec<_>) = releases
        .iter()
        .filter(|release| {
            release.release_date != Some(today) && release.release_date != Some(tomorrow)
        })
        .cloned()
        .partition(|release| release.recently_finished);

    other.sort_by_key(|release| {
        let rank = release.popularity_rank;
        match release.release_date.map(|date| clock.days_until(date)) {
            None => (3, 0),
            Some(2) => (0, rank),
            Some(3) => (1, rank),
            Some(4..=6) => (2, rank),
            Some(-1) => (4, rank),
            Some(days) if days >= 7 => (4, rank),
            Some(_) => (3, rank),
        }
    });
    finished.sort_by_key(|release| Reverse(release.end_date));
    (other, finished)
}
