//! Series announced for the next broadcast season.

use crate::{
    anilist::{fetch_all, AniList, Media, MediaQuery, Paging},
    clock::Clock,
    jikan::{MalScores, MalTarget},
    links::StreamingLink,
    rules::Rules,
    season::Season,
};
use anyhow::Error;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

/// Placeholder for a start date or studio which has not been announced.
pub const TBD: &str = "TBD";

/// A next-season series, as stored in the data files.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Upcoming {
    pub id: u64,
    pub mal_id: Option<u64>,
    pub name: String,
    pub english_title: Option<String>,
    pub episode: u32,
    /// The start date, or [`TBD`].
    pub release_date: String,
    pub poster_url: String,
    pub site_url: String,
    pub start_date: Option<NaiveDate>,
    /// Season name in title case, e.g. "Summer".
    pub season: String,
    pub season_year: Option<i32>,
    /// Up to two studios, comma separated, or [`TBD`].
    pub studios: String,
    #[serde(default)]
    pub genres: Vec<String>,
    pub popularity: u64,
    #[serde(default)]
    pub favourites: u64,
    pub anilist_score: Option<u32>,
    #[serde(default)]
    pub streaming_links: Vec<StreamingLink>,
    #[serde(default)]
    pub popularity_rank: u32,
    #[serde(flatten)]
    pub mal: MalScores,
}

impl From<&Media> for Upcoming {
    fn from(media: &Media) -> Self {
        let start_date = media.start_date.to_date();
        let studios = media.studio_names();
        Self {
            id: media.id,
            mal_id: media.id_mal,
            name: media.name().to_string(),
            english_title: media.title.english.clone(),
            episode: 1,
            release_date: start_date
                .map(|date| date.to_string())
                .unwrap_or_else(|| TBD.into()),
            poster_url: media.poster_url(),
            site_url: media.site_url(),
            start_date,
            season: media
                .season
                .map(|season| season.title().to_string())
                .unwrap_or_default(),
            season_year: media.season_year,
            studios: if studios.is_empty() {
                TBD.into()
            } else {
                studios.iter().take(2).cloned().collect::<Vec<_>>().join(", ")
            },
            genres: media.genres.clone(),
            popularity: media.popularity,
            favourites: media.favourites,
            anilist_score: media.average_score,
            streaming_links: vec![],
            popularity_rank: 0,
            mal: Default::default(),
        }
    }
}

impl MalTarget for Upcoming {
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

/// Load everything announced for the season after the current one.
pub async fn fetch_upcoming<A: AniList + ?Sized>(
    anilist: &A,
    clock: &Clock,
    paging: &Paging,
) -> Result<Vec<Media>, Error> {
    let (season, year) = Season::next(clock.today());
    tracing::info!("fetching upcoming {season} {year} anime");
    fetch_all(anilist, &MediaQuery::Upcoming { season, year }, paging).await
}

/// Filter and rank next-season media.
pub fn process_upcoming(media: &[Media], rules: &Rules) -> Vec<Upcoming> {
    let mut upcoming = media
        .iter()
        .filter(|m| {
            !rules.is_kids(m)
                && m.popularity >= rules.min_upcoming_popularity
                && !rules.is_too_short(m)
        })
        .map(Upcoming::from)
        .collect::<Vec<_>>();
    upcoming.sort_by_key(|entry| Reverse(entry.popularity));
    for (i, entry) in upcoming.iter_mut().enumerate() {
        entry.popularity_rank = i as u32 + 1;
    }
    upcoming
}
