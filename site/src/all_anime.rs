//! The searchable catalog page, `all-anime.html`.
//!
//! The page is self-contained: it carries the whole catalog as embedded JSON along with the
//! stylesheet and script that filter, sort and render it in the browser.

use crate::html::script_json;
use anyhow::Error;
use model::{
    catalog::{season_options, sort, CatalogEntry},
    clock::Clock,
    season::Season,
    store::{Store, CATALOG},
};
use std::fmt::Write;

/// Sort orders offered by the page, as `(value, label)`.
pub const SORT_OPTIONS: [(&str, &str); 5] = [
    ("season_popular", "⭐ Popular This Season"),
    ("popular_all", "🔥 Most Popular All Time"),
    ("score", "⭐ Highest Score"),
    ("newest", "🆕 Newest First"),
    ("oldest", "📅 Oldest First"),
];

const STYLE: &str = include_str!("../assets/all-anime.css");
const SCRIPT: &str = include_str!("../assets/all-anime.js");

/// Load the catalog, writing an empty one first if there is none yet.
pub fn load(store: &Store) -> Result<Vec<CatalogEntry>, Error> {
    if !store.exists(CATALOG) {
        tracing::warn!(
            "{CATALOG} not found, writing an empty catalog; \
             run `fetch catalog --full` to build it"
        );
        store.save(CATALOG, &Vec::<CatalogEntry>::new())?;
    }
    store.load(CATALOG)
}

pub fn render(catalog: &[CatalogEntry], clock: &Clock) -> Result<String, Error> {
    let (current_season, current_year) = Season::current(clock.today());
    let mut sorted = catalog.to_vec();
    sort(&mut sorted);

    let mut out = String::new();
    writeln!(
        out,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>All Anime - Anime Tracker</title>
<link rel="stylesheet" href="css/style.css">
<style>
{STYLE}</style>
</head>
<body>
<div class="all-anime-header">
<a href="index.html" class="back-btn">← Tracker</a>
<h1>🎬 All Anime</h1>
<div class="catalog-stats" id="catalog-stats">Loading catalog...</div>
</div>
<div class="all-anime-controls">
<div class="search-wrapper">
<span class="search-icon">🔍</span>
<input type="text" id="search-input" class="search-input" placeholder="Search anime...">
</div>
<select id="sort-select" class="control-select" title="Sort by">"#
    )?;
    for (value, label) in SORT_OPTIONS {
        writeln!(out, r#"<option value="{value}">{label}</option>"#)?;
    }
    writeln!(out, "</select>")?;

    writeln!(
        out,
        r#"<select id="season-select" class="control-select" title="Filter by season">
<option value="">All Seasons</option>"#
    )?;
    for (season, year) in season_options(catalog) {
        let selected = if (season, year) == (current_season, current_year) {
            " selected"
        } else {
            ""
        };
        writeln!(
            out,
            r#"<option value="{season}_{year}"{selected}>{} {} {year}</option>"#,
            season.emoji(),
            season.title(),
        )?;
    }
    writeln!(out, "</select>")?;

    writeln!(
        out,
        r#"<div class="poster-toggle-wrapper">
<span>Cards</span>
<label class="toggle-switch" title="Toggle poster-only view">
<input type="checkbox" id="poster-toggle">
<span class="toggle-slider"></span>
</label>
<span>Posters</span>
</div>
<span class="results-count" id="results-count"></span>
</div>
<main class="all-anime-main">
<div class="all-anime-grid" id="anime-grid">
<div class="loading-overlay">Loading anime catalog...</div>
</div>
</main>
<div class="context-menu" id="context-menu">
<div class="context-item" id="ctx-anilist"><span class="context-icon">📋</span> Open on AniList</div>
<div class="context-item" id="ctx-9anime"><span class="context-icon">▶️</span> Search on 9anime</div>
<div class="context-separator"></div>
<div class="context-item" id="ctx-favorite"><span class="context-icon">♡</span> Toggle Favorite</div>
</div>
<script>
const ALL_ANIME_DATA = {};
const CURRENT_SEASON = {};
const CURRENT_YEAR = {current_year};
const LAST_UPDATED = {};
</script>
<script>
{SCRIPT}</script>
</body>
</html>"#,
        script_json(&sorted)?,
        script_json(&current_season)?,
        script_json(&clock.today())?,
    )?;
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn entry(id: u64, popularity: u64, season: Season, year: i32) -> CatalogEntry {
        CatalogEntry {
            id,
            name: format!("Anime {id}"),
            popularity,
            season: Some(season),
            season_year: Some(year),
            ..Default::default()
        }
    }

    fn clock() -> Clock {
        Clock::on(NaiveDate::from_ymd_opt(2025, 4, 16).unwrap())
    }

    #[test]
    fn test_season_dropdown() {
        let catalog = vec![
            entry(1, 10, Season::Winter, 2025),
            entry(2, 30, Season::Spring, 2025),
            entry(3, 20, Season::Fall, 2024),
        ];
        let html = render(&catalog, &clock()).unwrap();

        let all = html.find(r#"<option value="">All Seasons</option>"#).unwrap();
        let spring = html
            .find(r#"<option value="SPRING_2025" selected>🌸 Spring 2025</option>"#)
            .unwrap();
        let winter = html
            .find(r#"<option value="WINTER_2025">❄️ Winter 2025</option>"#)
            .unwrap();
        let fall = html
            .find(r#"<option value="FALL_2024">🍂 Fall 2024</option>"#)
            .unwrap();
        assert!(all < spring && spring < winter && winter < fall);

        for (value, _) in SORT_OPTIONS {
            assert!(html.contains(&format!(r#"<option value="{value}">"#)));
        }
    }

    #[test]
    fn test_embedded_catalog() {
        let mut evil = entry(1, 10, Season::Winter, 2025);
        evil.name = "</script><script>alert(1)".into();
        let catalog = vec![evil, entry(2, 30, Season::Spring, 2025)];
        let html = render(&catalog, &clock()).unwrap();

        assert!(!html.contains("</script><script>alert"));
        let data = html.find("const ALL_ANIME_DATA = [").unwrap();
        let popular = html[data..].find(r#""id":2"#).unwrap();
        let other = html[data..].find(r#""id":1"#).unwrap();
        assert!(popular < other);
        assert!(html.contains(r#"const CURRENT_SEASON = "SPRING";"#));
        assert!(html.contains("const CURRENT_YEAR = 2025;"));
        assert!(html.contains(r#"const LAST_UPDATED = "2025-04-16";"#));
    }

    #[test]
    fn test_page_is_self_contained() {
        let html = render(&[entry(1, 10, Season::Spring, 2025)], &clock()).unwrap();
        assert!(html.contains("function renderAnime()"));
        assert!(html.contains("function buildCard(anime, rank)"));
        assert!(html.contains(".all-anime-grid {"));
        assert!(html.contains(r#"id="ctx-9anime""#));
        assert!(!html.contains("js/all-anime.js"));
        assert!(!html.contains("css/all-anime.css"));

        // The data constants are defined before the script that reads them.
        let data = html.find("const ALL_ANIME_DATA").unwrap();
        let script = html.find("const CATALOG_TOTAL = ALL_ANIME_DATA.length;").unwrap();
        assert!(data < script);
        assert!(!SCRIPT.contains("</script"));
    }

    #[test]
    fn test_missing_catalog_is_created() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();
        assert!(load(&store).unwrap().is_empty());
        assert!(store.exists(CATALOG));

        let html = render(&[], &clock()).unwrap();
        assert!(html.contains("const ALL_ANIME_DATA = [];"));
        assert!(html.contains(r#"<option value="">All Seasons</option>"#));
    }
}
