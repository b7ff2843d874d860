//! The main tracker page, `index.html`.

use crate::html::{escape, script_json, with_manual_links, Card};
use anyhow::Error;
use chrono::{NaiveDate, Utc};
use model::{
    links::StreamingLink,
    schedule::Release,
    season::{emoji_for, Season},
    store::{
        Metadata, Store, ANIME_DATA, CUSTOM_LINKS, MANUAL_STREAMING_LINKS, METADATA, OTHER_ANIME,
        RECENTLY_FINISHED, UPCOMING,
    },
    upcoming::{Upcoming, TBD},
};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;

/// Number of next-season cards shown before "Show More".
pub const UPCOMING_VISIBLE: usize = 20;

/// Everything the tracker page is built from.
#[derive(Clone, Debug)]
pub struct IndexData {
    pub releases: Vec<Release>,
    pub other: Vec<Release>,
    pub finished: Vec<Release>,
    pub upcoming: Vec<Upcoming>,
    pub metadata: Metadata,
    /// Extra streaming links by series name.
    pub manual_links: HashMap<String, Vec<StreamingLink>>,
    /// Replacement main links by series name.
    pub custom_links: BTreeMap<String, String>,
}

impl IndexData {
    /// Load the page data from a data directory.
    ///
    /// The schedule and metadata must exist; everything else is optional.
    pub fn load(store: &Store) -> Result<Self, Error> {
        Ok(Self {
            releases: store.load(ANIME_DATA)?,
            other: store.load(OTHER_ANIME)?,
            metadata: store.load(METADATA)?,
            finished: store.load_or_default(RECENTLY_FINISHED)?,
            upcoming: store.load_or_default(UPCOMING)?,
            manual_links: store.load_or_default(MANUAL_STREAMING_LINKS)?,
            custom_links: store.load_or_default(CUSTOM_LINKS)?,
        })
    }

    fn link<'a>(&'a self, release: &'a Release) -> &'a str {
        self.custom_links
            .get(&release.name)
            .map(String::as_str)
            .unwrap_or(&release.site_url)
    }

    fn release_card<'a>(
        &'a self,
        release: &'a Release,
        class: &'a str,
        release_attr: &'a str,
        episode: String,
        date: Option<String>,
    ) -> Card<'a> {
        Card {
            class,
            id: release.id,
            name: &release.name,
            english_title: release.english_title.as_deref(),
            link: self.link(release),
            release: release_attr,
            site_url: &release.site_url,
            poster_url: &release.poster_url,
            popularity: release.popularity,
            popularity_rank: release.popularity_rank,
            rank_qualifier: "",
            episode,
            date,
            streaming_links: with_manual_links(
                &release.streaming_links,
                self.manual_links.get(&release.name).map(Vec::as_slice),
            ),
            studios: None,
        }
    }
}

fn date_attr(date: Option<NaiveDate>) -> String {
    date.map(|date| date.to_string()).unwrap_or_default()
}

fn section_start(
    out: &mut String,
    class: &str,
    icon: &str,
    title: &str,
    date: Option<NaiveDate>,
) -> Result<(), Error> {
    writeln!(out, r#"<div class="time-section{class}">"#)?;
    write!(
        out,
        r#"<h2 class="section-title"><span class="section-icon">{icon}</span> {}"#,
        escape(title)
    )?;
    if let Some(date) = date {
        write!(out, r#" <span class="date-label">{date}</span>"#)?;
    }
    writeln!(out, "</h2>")?;
    Ok(())
}

/// Cards for the series with something airing on `date`.
fn airing_on(
    out: &mut String,
    data: &IndexData,
    date: NaiveDate,
    class: &str,
) -> Result<(), Error> {
    for release in data.releases.iter().filter(|release| release.airs_on(date)) {
        let release_attr = date_attr(release.release_date);
        data.release_card(
            release,
            class,
            &release_attr,
            format!("Episode {}", release.episode),
            None,
        )
        .write(out)?;
    }
    Ok(())
}

pub fn render(data: &IndexData) -> Result<String, Error> {
    let meta = &data.metadata;
    let (today, tomorrow) = (meta.today_date, meta.tomorrow_date);
    let mut out = String::new();

    writeln!(
        out,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Anime Tracker</title>
<link rel="stylesheet" href="css/style.css">
</head>
<body>
<header>
<h1>Current Anime Tracker</h1>
<div class="anime-count">({} anime)</div>
</header>
<nav class="nav-tabs">
<button class="nav-tab active" data-tab="list">📋 List View</button>
<button class="nav-tab" data-tab="calendar">📅 Calendar</button>
<button class="nav-tab" onclick="window.location.href='rankings.html'">🏆 Rankings</button>
</nav>
<main>
<div id="list-view" class="tab-content active">
<div class="list-controls">
<div class="filter-controls">
<button class="list-tab active" data-list-tab="all">All Anime</button>
<button class="list-tab" data-list-tab="favorites">Favorites Only</button>
</div>
<div class="layout-controls">
<label for="layout-selector">Layout:</label>
<select id="layout-selector" class="layout-selector">
<option value="grid">Grid View</option>
<option value="compact">Compact List</option>
<option value="table">Table View</option>
<option value="poster">Poster Wall</option>
</select>
</div>
</div>"#,
        data.releases.len()
    )?;

    section_start(&mut out, "", "🌟", "Today's Releases", Some(today))?;
    writeln!(out, r#"<div class="anime-grid today-grid">"#)?;
    airing_on(&mut out, data, today, "today-card")?;
    writeln!(out, "</div>\n</div>")?;

    section_start(&mut out, "", "📅", "Tomorrow's Releases", Some(tomorrow))?;
    writeln!(out, r#"<div class="anime-grid tomorrow-grid">"#)?;
    airing_on(&mut out, data, tomorrow, "tomorrow-card")?;
    writeln!(out, "</div>\n</div>")?;

    let (_, year) = Season::current(today);
    section_start(
        &mut out,
        "",
        meta.current_season.emoji(),
        &format!("{} {year} Anime", meta.current_season.title()),
        None,
    )?;
    writeln!(out, r#"<div class="anime-grid other-grid">"#)?;
    for release in &data.other {
        let (episode, date) = match release.next_airing_date {
            Some(next) => (
                format!("Episode {}", release.next_episode_number),
                format!("Next: {next}"),
            ),
            None => (
                format!("Episode {}", release.episode),
                release
                    .release_date
                    .map(|date| date.to_string())
                    .unwrap_or_else(|| "Ongoing".into()),
            ),
        };
        let release_attr = date_attr(release.release_date);
        data.release_card(release, "", &release_attr, episode, Some(date))
            .write(&mut out)?;
    }
    writeln!(out, "</div>\n</div>")?;

    if !data.finished.is_empty() {
        section_start(
            &mut out,
            " recently-finished-section",
            "✅",
            "Recently Finished (Last 2 Weeks)",
            None,
        )?;
        writeln!(out, r#"<div class="anime-grid recently-finished-grid">"#)?;
        for release in &data.finished {
            let end = release
                .end_date
                .map(|date| date.to_string())
                .unwrap_or_else(|| "Unknown".into());
            let release_attr = date_attr(release.end_date);
            data.release_card(
                release,
                "recently-finished-card",
                &release_attr,
                format!("Total: {} Episodes", release.episode),
                Some(format!("Finished: {end}")),
            )
            .write(&mut out)?;
        }
        writeln!(out, "</div>\n</div>")?;
    }

    if !data.upcoming.is_empty() {
        let season = meta.next_season;
        section_start(
            &mut out,
            " next-seasonal-section",
            emoji_for(&season.to_string()),
            &format!(
                "Next Seasonal Anime ({} {})",
                season.title(),
                meta.next_season_year
            ),
            None,
        )?;
        writeln!(out, r#"<div class="anime-grid upcoming-grid">"#)?;
        for (i, upcoming) in data.upcoming.iter().enumerate() {
            let class = if i < UPCOMING_VISIBLE {
                "upcoming-card"
            } else {
                "upcoming-card hidden-upcoming"
            };
            Card {
                class,
                id: upcoming.id,
                name: &upcoming.name,
                english_title: upcoming.english_title.as_deref(),
                link: &upcoming.site_url,
                release: &upcoming.release_date,
                site_url: &upcoming.site_url,
                poster_url: &upcoming.poster_url,
                popularity: upcoming.popularity,
                popularity_rank: upcoming.popularity_rank,
                rank_qualifier: " upcoming",
                episode: "Episode 1".into(),
                date: Some(upcoming.release_date.clone()),
                streaming_links: vec![],
                studios: Some(if upcoming.studios.is_empty() {
                    TBD
                } else {
                    &upcoming.studios
                }),
            }
            .write(&mut out)?;
        }
        writeln!(out, "</div>")?;
        if data.upcoming.len() > UPCOMING_VISIBLE {
            writeln!(
                out,
                r#"<div class="show-more-container">
<button class="show-more-btn" id="show-more-upcoming" data-target="upcoming">
<span class="show-more-text">Show More ({} more)</span>
<span class="show-less-text" style="display: none;">Show Less</span>
<span class="show-more-icon">▼</span>
</button>
</div>"#,
                data.upcoming.len() - UPCOMING_VISIBLE
            )?;
        }
        writeln!(out, "</div>")?;
    }
    writeln!(out, "</div>")?;

    let updated = meta.last_updated.with_timezone(&Utc);
    writeln!(
        out,
        r#"<div id="calendar-view" class="tab-content">
<div class="calendar-controls">
<button class="calendar-tab active" data-calendar-tab="all">All Anime</button>
<button class="calendar-tab" data-calendar-tab="favorites">Favorites Only</button>
</div>
<div class="calendar-container">
<div class="calendar-grid" id="calendar-all"></div>
<div class="calendar-grid" id="calendar-favorites" style="display: none;"></div>
</div>
</div>
</main>
<div id="anime-modal" class="modal">
<div class="modal-content">
<button class="modal-close">&times;</button>
<div class="modal-body"></div>
</div>
</div>
<div id="context-menu" class="context-menu">
<div class="context-item" id="edit-link"><span class="context-icon">🔗</span> Edit Link</div>
<div class="context-separator"></div>
<div class="context-item" id="copy-main-title"><span class="context-icon">📄</span> Copy: Main Title</div>
<div class="context-item" id="copy-english-title"><span class="context-icon">📋</span> Copy: English Title</div>
</div>
<footer class="last-updated">Last updated: {} at {} UTC</footer>
<script>
window.animeData = {};
window.upcomingAnime = {};
window.customLinks = {};
window.todayDate = {};
window.tomorrowDate = {};
</script>
<script src="js/script.js"></script>
</body>
</html>"#,
        updated.format("%Y-%m-%d"),
        updated.format("%H:%M:%S"),
        script_json(&data.releases)?,
        script_json(&data.upcoming)?,
        script_json(&data.custom_links)?,
        script_json(&today)?,
        script_json(&tomorrow)?,
    )?;
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use model::clock::Clock;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn release(id: u64, name: &str) -> Release {
        Release {
            id,
            name: name.into(),
            episode: 1,
            next_episode_number: 2,
            popularity: 10_000,
            popularity_rank: id as u32,
            site_url: format!("https://anilist.co/anime/{id}"),
            poster_url: format!("https://img/{id}.jpg"),
            ..Default::default()
        }
    }

    fn upcoming(id: u64) -> Upcoming {
        Upcoming {
            id,
            name: format!("Upcoming {id}"),
            episode: 1,
            release_date: TBD.into(),
            studios: "MAPPA".into(),
            site_url: format!("https://anilist.co/anime/{id}"),
            popularity_rank: id as u32,
            ..Default::default()
        }
    }

    fn data() -> IndexData {
        let clock = Clock::on(date(2025, 4, 16));
        let mut today = release(1, "Today Show");
        today.release_date = Some(date(2025, 4, 16));
        today.episode = 3;
        today.streaming_links = vec![StreamingLink {
            site: "Crunchyroll".into(),
            url: "https://crunchyroll.com/a".into(),
            icon: "cr.png".into(),
        }];
        let mut finale = release(2, "Finale Show");
        finale.end_date = Some(date(2025, 4, 17));
        finale.episode = 12;
        let mut other = release(3, "Other Show");
        other.next_airing_date = Some(date(2025, 4, 20));
        other.next_episode_number = 5;
        let mut ongoing = release(4, "Ongoing Show");
        ongoing.next_episode_number = 4;
        let mut done = release(5, "Done Show");
        done.end_date = Some(date(2025, 4, 10));
        done.episode = 24;
        done.recently_finished = true;

        IndexData {
            releases: vec![today, finale, other.clone(), ongoing.clone(), done.clone()],
            other: vec![other, ongoing],
            finished: vec![done],
            upcoming: (1..=23).map(upcoming).collect(),
            metadata: Metadata::new(&clock, 5, 23),
            manual_links: [(
                "Today Show".to_string(),
                vec![
                    StreamingLink {
                        site: "Crunchyroll".into(),
                        url: "https://other.example/cr".into(),
                        icon: "x.png".into(),
                    },
                    StreamingLink {
                        site: "Netflix".into(),
                        url: "https://netflix.com/a".into(),
                        icon: "nf.png".into(),
                    },
                ],
            )]
            .into(),
            custom_links: [(
                "Other Show".to_string(),
                "https://www.hidive.com/other".to_string(),
            )]
            .into(),
        }
    }

    fn section<'a>(html: &'a str, start: &str, end: &str) -> &'a str {
        let from = html.find(start).unwrap();
        let to = html[from..].find(end).unwrap() + from;
        &html[from..to]
    }

    #[test]
    fn test_today_and_tomorrow() {
        let html = render(&data()).unwrap();
        let today = section(&html, "today-grid", "tomorrow-grid");
        assert!(today.contains("Today Show"));
        assert!(today.contains("Episode 3"));
        assert!(!today.contains("Finale Show"));
        // Manual links fill in sites the series does not already link to.
        assert!(today.contains("https://netflix.com/a"));
        assert!(!today.contains("https://other.example/cr"));

        let tomorrow = section(&html, "tomorrow-grid", "other-grid");
        assert!(tomorrow.contains("Finale Show"));
        assert!(tomorrow.contains("Episode 12"));
    }

    #[test]
    fn test_current_season_cards() {
        let html = render(&data()).unwrap();
        assert!(html.contains("Spring 2025 Anime"));
        let other = section(&html, "other-grid", "recently-finished-grid");
        assert!(other.contains("Next: 2025-04-20"));
        assert!(other.contains("Episode 5"));
        assert!(other.contains("Ongoing"));
        assert!(other.contains(r#"data-link="https://www.hidive.com/other""#));
        assert!(other.contains(r#"class="main-link-btn">www.hidive.com</a>"#));
    }

    #[test]
    fn test_recently_finished_and_upcoming() {
        let html = render(&data()).unwrap();
        assert!(html.contains("Recently Finished (Last 2 Weeks)"));
        assert!(html.contains("Total: 24 Episodes"));
        assert!(html.contains("Finished: 2025-04-10"));

        assert!(html.contains("Next Seasonal Anime (Summer 2025)"));
        assert_eq!(html.matches("hidden-upcoming").count(), 3);
        assert!(html.contains("Show More (3 more)"));
        assert!(html.contains("most popular upcoming"));
        assert!(html.contains(r#"<div class="studio-info">MAPPA</div>"#));
    }

    #[test]
    fn test_empty_optional_sections() {
        let mut data = data();
        data.finished.clear();
        data.upcoming.clear();
        let html = render(&data).unwrap();
        assert!(!html.contains("Recently Finished"));
        assert!(!html.contains("Next Seasonal Anime"));
        assert!(!html.contains("Show More"));
    }

    #[test]
    fn test_embedded_data() {
        let html = render(&data()).unwrap();
        assert!(html.contains("(5 anime)"));
        assert!(html.contains("Last updated: 2025-04-16 at 12:00:00 UTC"));
        assert!(html.contains(r#"window.todayDate = "2025-04-16";"#));
        assert!(html.contains(r#"window.tomorrowDate = "2025-04-17";"#));
        assert!(html.contains(r#"window.customLinks = {"Other Show":"https://www.hidive.com/other"};"#));
        assert!(html.contains(r#""name":"Today Show""#));
    }
}
