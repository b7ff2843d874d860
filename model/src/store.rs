//! The JSON data directory shared by the fetchers and the site generator.

use crate::{clock::Clock, season::{self, Season}};
use anyhow::Error;
use chrono::{DateTime, FixedOffset, NaiveDate};
use clap::Args;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Every tracked airing series.
pub const ANIME_DATA: &str = "anime_data.json";
/// Airing series not releasing today or tomorrow, in display order.
pub const OTHER_ANIME: &str = "other_anime_sorted.json";
/// Series which finished within the last two weeks.
pub const RECENTLY_FINISHED: &str = "recently_finished_anime.json";
/// Series announced for next season.
pub const UPCOMING: &str = "upcoming_seasonal_anime.json";
pub const METADATA: &str = "metadata.json";
/// The full historical catalog.
pub const CATALOG: &str = "all_anime_catalog.json";
/// The latest scraped AniTrendz chart.
pub const ANITRENDZ: &str = "anitrendz_rankings.json";
/// Hand-maintained streaming links, keyed by romaji title.
pub const MANUAL_STREAMING_LINKS: &str = "manual_streaming_links.json";
/// Hand-maintained replacements for the AniList link, keyed by romaji title.
pub const CUSTOM_LINKS: &str = "custom_links.json";

/// Data directory options.
#[derive(Clone, Debug, Args)]
#[group(skip)]
pub struct Options {
    /// Directory holding the tracker's JSON data files.
    #[clap(
        long,
        env = "ANIME_TRACKER_DATA_DIR",
        name = "DATA_DIR",
        default_value = "data"
    )]
    pub data_dir: PathBuf,
}

impl Options {
    /// Open the data directory, creating it if necessary.
    pub fn open(&self) -> Result<Store, Error> {
        Store::open(&self.data_dir)
    }
}

/// A directory of JSON data files.
#[derive(Clone, Debug)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Open a data directory, creating it if necessary.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, Error> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|err| {
            Error::msg(format!("unable to create data directory {}: {err}", root.display()))
        })?;
        Ok(Self { root })
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.root.join(file)
    }

    pub fn exists(&self, file: &str) -> bool {
        self.path(file).is_file()
    }

    /// Load a data file, failing if it does not exist.
    pub fn load<T: DeserializeOwned>(&self, file: &str) -> Result<T, Error> {
        let path = self.path(file);
        let bytes = fs::read(&path)
            .map_err(|err| Error::msg(format!("unable to read {}: {err}", path.display())))?;
        serde_json::from_slice(&bytes)
            .map_err(|err| Error::msg(format!("file {} is malformed: {err}", path.display())))
    }

    /// Load a data file, or the default value if it does not exist.
    pub fn load_or_default<T: DeserializeOwned + Default>(&self, file: &str) -> Result<T, Error> {
        if self.exists(file) {
            self.load(file)
        } else {
            tracing::debug!("{file} not found, using default");
            Ok(T::default())
        }
    }

    /// Write a data file as pretty-printed JSON.
    pub fn save<T: Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<(), Error> {
        let path = self.path(file);
        let mut bytes = serde_json::to_vec_pretty(value)?;
        bytes.push(b'\n');
        fs::write(&path, bytes)
            .map_err(|err| Error::msg(format!("unable to write {}: {err}", path.display())))?;
        tracing::info!("saved {}", path.display());
        Ok(())
    }
}

/// Summary of the last schedule update.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Metadata {
    pub last_updated: DateTime<FixedOffset>,
    pub total_anime: usize,
    pub total_upcoming_anime: usize,
    pub current_season: Season,
    pub next_season: Season,
    pub next_season_year: i32,
    #[serde(default)]
    pub next_season_imminent: bool,
    pub today_date: NaiveDate,
    pub tomorrow_date: NaiveDate,
}

impl Metadata {
    pub fn new(clock: &Clock, total_anime: usize, total_upcoming_anime: usize) -> Self {
        let today = clock.today();
        let (current_season, _) = Season::current(today);
        let (next_season, next_season_year) = Season::next(today);
        Self {
            last_updated: clock.datetime(),
            total_anime,
            total_upcoming_anime,
            current_season,
            next_season,
            next_season_year,
            next_season_imminent: season::next_season_imminent(clock.datetime().naive_local()),
            today_date: today,
            tomorrow_date: clock.tomorrow(),
        }
    }
}
