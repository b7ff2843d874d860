//! The combined rankings page, `rankings.html`.

use crate::html::{escape, thousands};
use anyhow::Error;
use model::ranking::{rank, Ranked};
use model::schedule::Release;
use std::fmt::Write;

/// Number of series ranked on the page.
pub const TOP: usize = 50;

const NA: &str = r#"<span class="na">—</span>"#;

fn medal(place: usize) -> String {
    match place {
        1 => "🥇".into(),
        2 => "🥈".into(),
        3 => "🥉".into(),
        n => n.to_string(),
    }
}

fn rank_class(rank: Option<u32>) -> &'static str {
    match rank {
        Some(r) if r <= 10 => "good",
        Some(r) if r <= 25 => "medium",
        _ => "",
    }
}

fn mal_class(score: Option<f64>) -> &'static str {
    match score {
        Some(s) if s >= 8. => "good",
        Some(s) if s >= 7. => "medium",
        _ => "",
    }
}

fn score_class(score: f64) -> &'static str {
    if score >= 80. {
        "good"
    } else if score >= 60. {
        "medium"
    } else {
        ""
    }
}

/// Format a score with at least one decimal place, so that 80 reads "80.0" and 83.25 "83.25".
fn decimal(score: f64) -> String {
    format!("{score:?}")
}

fn row(out: &mut String, place: usize, ranked: &Ranked) -> Result<(), Error> {
    let r = &ranked.release;
    let popularity_rank = Some(r.popularity_rank).filter(|&rank| rank > 0);
    let chart_rank = r.chart.anitrendz_rank;
    let breakdown = ranked.breakdown();

    writeln!(out, r#"<tr data-anime-id="{}">"#, r.id)?;
    writeln!(out, r#"<td class="rank">{}</td>"#, medal(place))?;
    write!(
        out,
        r#"<td class="anime-title"><img src="{poster}" alt="{name}" class="mini-poster"><div><a href="{url}" target="_blank">{name}</a>"#,
        poster = escape(&r.poster_url),
        url = escape(&r.site_url),
        name = escape(&r.name),
    )?;
    if let Some(english) = r.english_title.as_deref().filter(|title| !title.is_empty()) {
        write!(out, "<small>{}</small>", escape(english))?;
    }
    writeln!(out, "</div></td>")?;

    write!(
        out,
        r#"<td class="anilist-data {}"><strong>{}</strong><br><small>{} users</small>"#,
        rank_class(popularity_rank),
        popularity_rank.map(|rank| format!("#{rank}")).unwrap_or_else(|| NA.into()),
        thousands(r.popularity),
    )?;
    if let Some(score) = r.anilist_score.filter(|&score| score > 0) {
        write!(out, "<br><small>Score: {score}/100</small>")?;
    }
    writeln!(out, "</td>")?;

    writeln!(
        out,
        r#"<td class="mal-data {}"><strong>{}</strong><br><small>{} members</small></td>"#,
        mal_class(r.mal.mal_score),
        r.mal
            .mal_score
            .map(|score| format!("{score}/10"))
            .unwrap_or_else(|| NA.into()),
        r.mal
            .mal_members
            .filter(|&members| members > 0)
            .map(thousands)
            .unwrap_or_else(|| NA.into()),
    )?;

    write!(
        out,
        r#"<td class="anitrendz-data {}"><strong>{}</strong>"#,
        if chart_rank.is_some_and(|rank| rank <= 10) {
            "good"
        } else {
            ""
        },
        chart_rank
            .map(|rank| format!("#{rank}"))
            .unwrap_or_else(|| NA.into()),
    )?;
    if let Some(change) = r.chart.anitrendz_change {
        if let Some(arrow) = change.arrow() {
            write!(out, r#" <span class="trend-{change}">{arrow}</span>"#)?;
        }
    }
    writeln!(out, "</td>")?;

    writeln!(
        out,
        r#"<td class="weekly-score {}"><strong>{}</strong></td>"#,
        score_class(ranked.weekly),
        decimal(ranked.weekly)
    )?;
    writeln!(
        out,
        r#"<td class="overall-score {}"><strong>{}</strong><div class="score-breakdown" style="display:none;"><small>AniList: {}<br>MAL: {}<br>AniTrendz: {}</small></div></td>"#,
        score_class(ranked.overall),
        decimal(ranked.overall),
        decimal(breakdown.anilist),
        decimal(breakdown.mal),
        decimal(breakdown.anitrendz),
    )?;
    writeln!(out, "</tr>")?;
    Ok(())
}

pub fn render(releases: &[Release]) -> Result<String, Error> {
    let mut out = String::new();
    writeln!(
        out,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Anime Rankings - Ultimate Rankings</title>
<link rel="stylesheet" href="./css/rankings.css">
<link rel="stylesheet" href="./css/style.css">
</head>
<body>
<header>
<h1>🏆 Anime Rankings</h1>
<button id="update-btn" class="update-btn">🔄 Update</button>
</header>
<nav class="nav-tabs">
<button class="nav-tab" onclick="window.location.href='index.html'">📋 List View</button>
<button class="nav-tab" onclick="window.location.href='index.html#calendar';">📅 Calendar</button>
<button class="nav-tab active">🏆 Rankings</button>
</nav>
<main>
<table class="rankings-table">
<thead>
<tr>
<th>Rank</th>
<th>Anime</th>
<th>AniList</th>
<th>MAL</th>
<th>AniTrendz</th>
<th>Weekly</th>
<th>Overall</th>
</tr>
</thead>
<tbody>"#
    )?;
    for (i, ranked) in rank(releases).iter().take(TOP).enumerate() {
        row(&mut out, i + 1, ranked)?;
    }
    writeln!(
        out,
        r#"</tbody>
</table>
</main>
<script src="./js/rankings.js"></script>
</body>
</html>"#
    )?;
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use model::anitrendz::Movement;

    fn release(id: u64, popularity_rank: u32) -> Release {
        Release {
            id,
            name: format!("Show {id}"),
            popularity: 1_000 * id,
            popularity_rank,
            ..Default::default()
        }
    }

    #[test]
    fn test_top_fifty_with_medals() {
        let releases = (1..=60).map(|id| release(id, id as u32)).collect::<Vec<_>>();
        let html = render(&releases).unwrap();
        assert_eq!(html.matches("<tr data-anime-id=").count(), TOP);
        assert!(html.contains(r#"<tr data-anime-id="1">"#));
        assert!(!html.contains(r#"<tr data-anime-id="51">"#));
        assert!(html.contains("🥇"));
        assert!(html.contains("🥈"));
        assert!(html.contains("🥉"));
        assert!(html.contains(r#"<td class="rank">4</td>"#));
        assert!(html.contains("<thead>"));
    }

    #[test]
    fn test_row_cells() {
        let mut r = release(1, 3);
        r.english_title = Some("Show & Tell".into());
        r.anilist_score = Some(84);
        r.mal.mal_score = Some(8.5);
        r.mal.mal_members = Some(250_000);
        r.chart.anitrendz_rank = Some(2);
        r.chart.anitrendz_change = Some(Movement::Up);
        let html = render(&[r]).unwrap();

        assert!(html.contains("<small>Show &amp; Tell</small>"));
        assert!(html.contains(r#"<td class="anilist-data good"><strong>#3</strong>"#));
        assert!(html.contains("Score: 84/100"));
        assert!(html.contains(r#"<td class="mal-data good"><strong>8.5/10</strong><br><small>250,000 members</small>"#));
        assert!(html.contains(r#"<td class="anitrendz-data good"><strong>#2</strong> <span class="trend-up">↑</span>"#));
        assert!(html.contains("AniList: 24.0<br>MAL: 25.5<br>AniTrendz: 22.5"));
    }

    #[test]
    fn test_missing_values() {
        let mut r = release(1, 30);
        r.mal.mal_score = Some(6.9);
        let html = render(&[r]).unwrap();
        assert!(html.contains(r#"<td class="anilist-data "><strong>#30</strong>"#));
        assert!(html.contains(r#"<td class="mal-data "><strong>6.9/10</strong><br><small><span class="na">—</span> members</small>"#));
        assert!(html.contains(r#"<td class="anitrendz-data "><strong><span class="na">—</span></strong></td>"#));
        assert!(!html.contains("Score:"));
    }

    #[test]
    fn test_score_cells_keep_a_decimal() {
        let ranked = Ranked {
            release: release(1, 0),
            overall: 80.,
            weekly: 83.25,
        };
        let mut out = String::new();
        row(&mut out, 1, &ranked).unwrap();
        assert!(out.contains(r#"<td class="weekly-score good"><strong>83.25</strong></td>"#));
        assert!(out.contains(r#"<td class="overall-score good"><strong>80.0</strong>"#));
        assert!(out.contains("AniList: 0.0<br>MAL: 0.0<br>AniTrendz: 0.0"));
    }
}
