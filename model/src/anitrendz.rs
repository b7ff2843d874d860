//! The AniTrendz weekly top anime chart.

use crate::{clock::Clock, schedule::Release};
use anyhow::Error;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use strum::{Display, EnumString};
use surf::Url;

/// The AniTrendz site.
pub const ANITRENDZ_URL: &str = "https://www.anitrendz.com/";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// A source of the chart page.
#[async_trait]
pub trait Charts {
    /// The HTML of the current top anime chart.
    async fn chart_html(&self) -> Result<String, Error>;
}

/// An AniTrendz client.
pub struct Client {
    client: surf::Client,
}

impl Client {
    pub fn new() -> Result<Self, Error> {
        let client: surf::Client = surf::Config::new()
            .set_base_url(Url::parse(ANITRENDZ_URL)?)
            .set_timeout(Some(Duration::from_secs(15)))
            .try_into()
            .map_err(|err| Error::msg(format!("unable to build AniTrendz client: {err}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Charts for Client {
    async fn chart_html(&self) -> Result<String, Error> {
        let mut res = self
            .client
            .get("charts/top-anime")
            .header("User-Agent", USER_AGENT)
            .await
            .map_err(Error::msg)?;
        if !res.status().is_success() {
            return Err(Error::msg(format!("AniTrendz HTTP error {}", res.status())));
        }
        res.body_string().await.map_err(Error::msg)
    }
}

/// Week-over-week movement of a chart entry.
#[derive(
    Clone, Copy, Debug, Default, Display, PartialEq, Eq, EnumString, Deserialize, Serialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Movement {
    Up,
    Down,
    #[default]
    Stable,
}

impl Movement {
    /// Arrow shown next to a moving entry.
    pub fn arrow(&self) -> Option<&'static str> {
        match self {
            Self::Up => Some("↑"),
            Self::Down => Some("↓"),
            Self::Stable => None,
        }
    }
}

/// One row of the chart.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChartEntry {
    pub rank: u32,
    pub title: String,
    pub change: Movement,
    pub movement_number: i32,
    pub weeks_on_chart: u32,
    pub peak_rank: u32,
    pub last_position: u32,
}

/// A scraped chart.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Chart {
    pub rankings: Vec<ChartEntry>,
    pub last_updated: DateTime<FixedOffset>,
    /// Week label, `YYYY-Www` with Sunday-based weeks.
    pub week: String,
    pub total_entries: usize,
}

impl Chart {
    pub fn new(rankings: Vec<ChartEntry>, clock: &Clock) -> Self {
        Self {
            total_entries: rankings.len(),
            rankings,
            last_updated: clock.datetime(),
            week: clock.datetime().format("%Y-W%U").to_string(),
        }
    }
}

/// A series' position on the chart, as stored alongside the series.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChartPosition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anitrendz_rank: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anitrendz_change: Option<Movement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anitrendz_movement: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anitrendz_weeks: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anitrendz_peak: Option<u32>,
}

impl From<&ChartEntry> for ChartPosition {
    fn from(entry: &ChartEntry) -> Self {
        Self {
            anitrendz_rank: Some(entry.rank),
            anitrendz_change: Some(entry.change),
            anitrendz_movement: Some(entry.movement_number),
            anitrendz_weeks: Some(entry.weeks_on_chart),
            anitrendz_peak: Some(entry.peak_rank),
        }
    }
}

struct Selectors {
    entry: Selector,
    rank: Selector,
    title: Selector,
    movement: Selector,
    img: Selector,
    arrow_number: Selector,
    stats: Selector,
    span: Selector,
}

impl Selectors {
    fn new() -> Result<Self, Error> {
        // The chart's class names carry a build hash suffix, so match on the stable prefix.
        Ok(Self {
            entry: selector(r#"div[class*="at-mcc-entry"]"#)?,
            rank: selector(r#"div[class*="main-rank"] div"#)?,
            title: selector(r#"div[class*="entry-title"]"#)?,
            movement: selector(r#"div[class*="at-mcc-e-movement"]"#)?,
            img: selector("img")?,
            arrow_number: selector(r#"div[class*="arrow-number"]"#)?,
            stats: selector(r#"div[class*="stats-entry"]"#)?,
            span: selector("span")?,
        })
    }
}

fn selector(css: &str) -> Result<Selector, Error> {
    Selector::parse(css).map_err(|err| Error::msg(format!("invalid selector {css}: {err:?}")))
}

fn text(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Extract the chart entries from the chart page.
///
/// Entries missing a rank or title are skipped. The result is sorted by rank with duplicates
/// removed.
pub fn parse_chart(html: &str) -> Result<Vec<ChartEntry>, Error> {
    let sel = Selectors::new()?;
    let movement_number = Regex::new(r"([+-]?\d+)|(\d+W)")?;
    let doc = Html::parse_document(html);

    let mut rankings = vec![];
    for item in doc.select(&sel.entry) {
        let Some(rank) = item
            .select(&sel.rank)
            .next()
            .and_then(|el| text(el).parse::<u32>().ok())
        else {
            continue;
        };
        let Some(title) = item
            .select(&sel.title)
            .next()
            .map(text)
            .filter(|title| !title.is_empty())
        else {
            tracing::warn!("chart entry {rank} has no title, skipping");
            continue;
        };

        let movement = item.select(&sel.movement).next();
        let change = movement
            .and_then(|el| el.select(&sel.img).next())
            .and_then(|img| img.value().attr("alt"))
            .map(|alt| {
                if alt.contains("up-arrow") {
                    Movement::Up
                } else if alt.contains("down-arrow") {
                    Movement::Down
                } else {
                    Movement::Stable
                }
            })
            .unwrap_or_default();
        let number = movement
            .and_then(|el| el.select(&sel.arrow_number).next())
            .map(text)
            .and_then(|s| {
                let caps = movement_number.captures(&s)?;
                let val = caps.get(1).or_else(|| caps.get(2))?.as_str();
                val.trim_end_matches('W').parse::<i32>().ok()
            })
            .unwrap_or(0);

        let mut entry = ChartEntry {
            rank,
            title,
            change,
            movement_number: number,
            weeks_on_chart: 0,
            peak_rank: 0,
            last_position: 0,
        };
        for stat in item.select(&sel.stats) {
            let (Some(span), Some(img)) =
                (stat.select(&sel.span).next(), stat.select(&sel.img).next())
            else {
                continue;
            };
            let alt = img.value().attr("alt").unwrap_or_default().to_lowercase();
            let Ok(value) = text(span).parse::<u32>() else {
                continue;
            };
            if alt.contains("peak") {
                entry.peak_rank = value;
            } else if alt.contains("weeks") {
                entry.weeks_on_chart = value;
            } else if alt.contains("lastposition") {
                entry.last_position = value;
            }
        }
        rankings.push(entry);
    }

    rankings.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.title.cmp(&b.title)));
    rankings.dedup_by(|a, b| a.rank == b.rank && a.title == b.title);
    tracing::info!("found {} chart entries", rankings.len());
    Ok(rankings)
}

/// Fetch and parse the current chart.
pub async fn fetch_chart<C: Charts + ?Sized>(charts: &C, clock: &Clock) -> Result<Chart, Error> {
    let html = charts.chart_html().await?;
    Ok(Chart::new(parse_chart(&html)?, clock))
}

/// Match chart entries to tracked series.
///
/// Chart titles are usually English titles, sometimes abbreviated ("S2" for "Season 2"), so each
/// tracked series' English title is mapped back to its romaji title, with and without a season
/// suffix. A chart entry then matches the first series whose title equals, contains, or is
/// contained in the chart title.
pub fn match_chart(
    chart: &[ChartEntry],
    releases: &[Release],
) -> Result<HashMap<u64, ChartPosition>, Error> {
    let season_suffix = Regex::new(r"\s(s\d+|season \d+)")?;
    let mut variations = HashMap::new();
    for release in releases {
        let name = release.name.to_lowercase();
        let english = release
            .english_title
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();
        if name.is_empty() || english.is_empty() {
            continue;
        }
        if name != english {
            variations.insert(english.clone(), name.clone());
        }
        let stripped = season_suffix.replace_all(&english, "");
        if stripped != english {
            variations.insert(stripped.into_owned(), name);
        }
    }

    let mut matched = HashMap::new();
    for entry in chart {
        let title = entry.title.to_lowercase();
        let target = variations.get(&title).unwrap_or(&title);

        let found = releases.iter().find(|release| {
            let name = release.name.to_lowercase();
            let english = release
                .english_title
                .as_deref()
                .unwrap_or_default()
                .to_lowercase();
            related(target, &name)
                || related(target, &english)
                || same(&title, &name)
                || same(&title, &english)
        });
        match found {
            Some(release) => {
                matched.insert(release.id, ChartPosition::from(entry));
            }
            None => tracing::warn!("no match found for AniTrendz title: {}", entry.title),
        }
    }
    Ok(matched)
}

/// Record chart positions on the tracked series.
///
/// Series which are not on the chart lose any position from an earlier chart.
pub fn apply_chart(releases: &mut [Release], matched: &HashMap<u64, ChartPosition>) {
    for release in releases {
        release.chart = matched.get(&release.id).cloned().unwrap_or_default();
    }
}

fn same(a: &str, b: &str) -> bool {
    !a.is_empty() && a == b
}

fn related(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a == b || a.contains(b) || b.contains(a))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schedule::test::release;
    use chrono::NaiveDate;

    const CHART: &str = r#"
        <html><body>
        <div class="ChartChoice_at-mcc-entry__Cciiz">
            <div class="ChartChoice_main-rank___oDHZ"><div>2</div></div>
            <div class="ChartChoice_entry-title__dp5Tw">Frieren: Beyond Journey's End</div>
            <div class="ChartChoice_at-mcc-e-movement__5jaUV">
                <img alt="down-arrow">
                <div class="ChartChoice_arrow-number__rEGbh">-1</div>
            </div>
            <div class="ChartChoice_stats-entry__Lgw6A"><img alt="Peak"><span>1</span></div>
            <div class="ChartChoice_stats-entry__Lgw6A"><img alt="Weeks"><span>6</span></div>
            <div class="ChartChoice_stats-entry__Lgw6A"><img alt="LastPosition"><span>1</span></div>
        </div>
        <div class="ChartChoice_at-mcc-entry__Cciiz">
            <div class="ChartChoice_main-rank___oDHZ"><div>1</div></div>
            <div class="ChartChoice_entry-title__dp5Tw">The Apothecary Diaries</div>
            <div class="ChartChoice_at-mcc-e-movement__5jaUV">
                <img alt="up-arrow">
                <div class="ChartChoice_arrow-number__rEGbh">+3</div>
            </div>
        </div>
        <div class="ChartChoice_at-mcc-entry__Cciiz">
            <div class="ChartChoice_main-rank___oDHZ"><div>3</div></div>
            <div class="ChartChoice_entry-title__dp5Tw">Dandadan</div>
            <div class="ChartChoice_at-mcc-e-movement__5jaUV">
                <img alt="right-arrow">
                <div class="ChartChoice_arrow-number__rEGbh">4W</div>
            </div>
        </div>
        <div class="ChartChoice_at-mcc-entry__Cciiz">
            <div class="ChartChoice_main-rank___oDHZ"><div>RE</div></div>
            <div class="ChartChoice_entry-title__dp5Tw">Unranked</div>
        </div>
        </body></html>
    "#;

    #[test]
    fn test_parse_chart() {
        let rankings = parse_chart(CHART).unwrap();
        assert_eq!(rankings.len(), 3);

        assert_eq!(rankings[0].rank, 1);
        assert_eq!(rankings[0].title, "The Apothecary Diaries");
        assert_eq!(rankings[0].change, Movement::Up);
        assert_eq!(rankings[0].movement_number, 3);

        assert_eq!(rankings[1].change, Movement::Down);
        assert_eq!(rankings[1].movement_number, -1);
        assert_eq!(rankings[1].peak_rank, 1);
        assert_eq!(rankings[1].weeks_on_chart, 6);
        assert_eq!(rankings[1].last_position, 1);

        assert_eq!(rankings[2].change, Movement::Stable);
        assert_eq!(rankings[2].movement_number, 4);
    }

    #[test]
    fn test_chart_week() {
        let clock = Clock::on(NaiveDate::from_ymd_opt(2025, 1, 8).unwrap());
        let chart = Chart::new(vec![], &clock);
        assert_eq!(chart.week, "2025-W01");
        assert_eq!(chart.total_entries, 0);
    }

    #[test]
    fn test_match_chart() {
        let mut frieren = release(10, 50_000);
        frieren.name = "Sousou no Frieren 2nd Season".into();
        frieren.english_title = Some("Frieren: Beyond Journey's End Season 2".into());
        let mut apothecary = release(11, 40_000);
        apothecary.name = "Kusuriya no Hitorigoto 2nd Season".into();
        apothecary.english_title = Some("The Apothecary Diaries Season 2".into());
        // A series without an English title must not swallow every chart entry.
        let mut untitled = release(12, 30_000);
        untitled.name = "Gachiakuta".into();
        untitled.english_title = None;
        let releases = vec![untitled, frieren, apothecary];

        let chart = parse_chart(CHART).unwrap();
        let matched = match_chart(&chart, &releases).unwrap();
        assert_eq!(matched.len(), 2);
        assert_eq!(matched[&11].anitrendz_rank, Some(1));
        assert_eq!(matched[&11].anitrendz_change, Some(Movement::Up));
        assert_eq!(matched[&10].anitrendz_rank, Some(2));
        assert_eq!(matched[&10].anitrendz_peak, Some(1));

        let mut releases = releases;
        releases[0].chart.anitrendz_rank = Some(9);
        apply_chart(&mut releases, &matched);
        assert_eq!(releases[0].chart, ChartPosition::default());
        assert_eq!(releases[2].chart.anitrendz_rank, Some(1));
    }

    #[test]
    fn test_match_chart_season_suffix() {
        // Listed first, and its English title contains the bare chart title.
        let mut special = release(20, 90_000);
        special.name = "Dandadan: Evil Eye".into();
        special.english_title = Some("Dan Da Dan Evil Eye".into());
        let mut sequel = release(21, 80_000);
        sequel.name = "Dandadan 2nd Season".into();
        sequel.english_title = Some("Dan Da Dan Season 2".into());
        let releases = vec![special, sequel];

        let chart = vec![ChartEntry {
            rank: 3,
            title: "Dan Da Dan".into(),
            change: Movement::Down,
            movement_number: -2,
            weeks_on_chart: 4,
            peak_rank: 1,
            last_position: 1,
        }];
        let matched = match_chart(&chart, &releases).unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[&21].anitrendz_rank, Some(3));
        assert!(!matched.contains_key(&20));
    }
}
