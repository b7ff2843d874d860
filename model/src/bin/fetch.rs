use anyhow::Error;
use clap::Parser;
use model::{
    anilist::{self, Paging},
    anitrendz::{self, apply_chart, fetch_chart, match_chart},
    catalog,
    clock::Clock,
    init_logging,
    jikan::{self, update_scores, MalTarget, LOOKUP_DELAY},
    rules,
    schedule::{fetch_current, process, sort_other, Release},
    store::{
        self, Metadata, Store, ANIME_DATA, ANITRENDZ, METADATA, OTHER_ANIME, RECENTLY_FINISHED,
        UPCOMING,
    },
    upcoming::{fetch_upcoming, process_upcoming, Upcoming},
};
use serde::{de::DeserializeOwned, Serialize};

/// Pull the latest anime data into the data directory.
#[derive(Parser)]
enum Command {
    /// Rebuild the airing schedule and the next-season list from AniList.
    Schedule {
        #[clap(flatten)]
        anilist: anilist::Options,

        #[clap(flatten)]
        rules: rules::Options,

        #[clap(flatten)]
        store: store::Options,
    },
    /// Update the catalog of every series.
    Catalog {
        /// Scan every year instead of only the last two months.
        ///
        /// This takes hours; it is meant for building the catalog for the first time.
        #[clap(long)]
        full: bool,

        #[clap(flatten)]
        anilist: anilist::Options,

        #[clap(flatten)]
        store: store::Options,
    },
    /// Add MyAnimeList scores to the schedule and next-season list.
    MalScores {
        #[clap(flatten)]
        store: store::Options,
    },
    /// Scrape the AniTrendz weekly chart and attach chart positions to the schedule.
    Anitrendz {
        #[clap(flatten)]
        store: store::Options,
    },
}

#[async_std::main]
async fn main() -> Result<(), Error> {
    init_logging();
    let clock = Clock::now();

    match Command::parse() {
        Command::Schedule {
            anilist,
            rules,
            store,
        } => {
            let rules = rules.load()?;
            let anilist = anilist.open()?;
            let store = store.open()?;

            let media = fetch_current(&anilist, &clock, &Paging::default()).await?;
            let releases = process(&media, &rules, &clock);
            let (other, finished) = sort_other(&releases, &clock);
            store.save(ANIME_DATA, &releases)?;
            store.save(OTHER_ANIME, &other)?;
            store.save(RECENTLY_FINISHED, &finished)?;

            let upcoming = match fetch_upcoming(&anilist, &clock, &Paging::default()).await {
                Ok(media) => process_upcoming(&media, &rules),
                Err(err) => {
                    tracing::error!("unable to fetch upcoming anime: {err:#}");
                    vec![]
                }
            };
            store.save(UPCOMING, &upcoming)?;

            store.save(
                METADATA,
                &Metadata::new(&clock, releases.len(), upcoming.len()),
            )?;
            tracing::info!(
                "{} airing, {} upcoming, {} recently finished",
                releases.len(),
                upcoming.len(),
                finished.len()
            );
        }
        Command::Catalog {
            full,
            anilist,
            store,
        } => {
            let anilist = anilist.open()?;
            let store = store.open()?;
            let stats = if full {
                catalog::full_scan(&anilist, &store, &clock, &Paging::catalog()).await?
            } else {
                catalog::incremental(&anilist, &store, &clock, &Paging::catalog()).await?
            };
            tracing::info!("catalog has {} anime ({} new)", stats.total, stats.added);
        }
        Command::MalScores { store } => {
            let store = store.open()?;
            let client = jikan::Client::new()?;
            enrich::<Release>(&client, &store, ANIME_DATA).await?;
            enrich::<Release>(&client, &store, OTHER_ANIME).await?;
            enrich::<Upcoming>(&client, &store, UPCOMING).await?;
        }
        Command::Anitrendz { store } => {
            let store = store.open()?;
            let client = anitrendz::Client::new()?;
            let chart = fetch_chart(&client, &clock).await?;
            store.save(ANITRENDZ, &chart)?;

            if store.exists(ANIME_DATA) {
                let mut releases: Vec<Release> = store.load(ANIME_DATA)?;
                let matched = match_chart(&chart.rankings, &releases)?;
                apply_chart(&mut releases, &matched);
                store.save(ANIME_DATA, &releases)?;
                tracing::info!(
                    "matched {} of {} chart entries",
                    matched.len(),
                    chart.total_entries
                );
            } else {
                tracing::warn!("{ANIME_DATA} not found, chart saved but not applied");
            }
        }
    }

    Ok(())
}

/// Add MyAnimeList scores to the entries in one data file.
async fn enrich<T>(client: &jikan::Client, store: &Store, file: &str) -> Result<(), Error>
where
    T: MalTarget + Serialize + DeserializeOwned,
{
    if !store.exists(file) {
        tracing::warn!("{file} not found, skipping");
        return Ok(());
    }
    let mut entries: Vec<T> = store.load(file)?;
    tracing::info!("processing {} entries from {file}", entries.len());
    let stats = update_scores(client, &mut entries, LOOKUP_DELAY).await;
    if stats.updated > 0 {
        store.save(file, &entries)?;
    }
    Ok(())
}
