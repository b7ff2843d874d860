//! Helpers shared by the page renderers.

use anyhow::Error;
use model::links::{host_of, merge_links, StreamingLink};
use serde::Serialize;
use std::fmt::Write;

/// Escape text for use in HTML content or a quoted attribute.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Serialize a value as JSON which can be embedded in a `<script>` element.
pub fn script_json<T: Serialize + ?Sized>(value: &T) -> Result<String, Error> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}

/// Format a count with thousands separators, e.g. `12,345`.
pub fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Label for the main link button: the host of the link, or AniList if it has none.
pub fn link_label(url: &str) -> String {
    host_of(url).unwrap_or_else(|| "anilist.co".into())
}

/// One series card in a grid.
pub struct Card<'a> {
    /// Extra classes, after `anime-card`.
    pub class: &'a str,
    pub id: u64,
    pub name: &'a str,
    pub english_title: Option<&'a str>,
    /// Where the main button points.
    pub link: &'a str,
    /// Value for `data-release`.
    pub release: &'a str,
    pub site_url: &'a str,
    pub poster_url: &'a str,
    pub popularity: u64,
    pub popularity_rank: u32,
    /// Appended to the "most popular" tooltip, e.g. " upcoming".
    pub rank_qualifier: &'a str,
    pub episode: String,
    pub date: Option<String>,
    pub streaming_links: Vec<StreamingLink>,
    /// Shown under the episode info for series which have not started.
    pub studios: Option<&'a str>,
}

impl<'a> Card<'a> {
    pub fn write(&self, out: &mut String) -> Result<(), Error> {
        let name = escape(self.name);
        let link = escape(self.link);
        let class = if self.class.is_empty() {
            "anime-card".to_string()
        } else {
            format!("anime-card {}", self.class)
        };
        writeln!(
            out,
            r#"<div class="{class}" data-name="{name}" data-link="{link}" data-anime-id="{id}" data-release="{release}" data-site-url="{site}" data-poster="{poster}">"#,
            id = self.id,
            release = escape(self.release),
            site = escape(self.site_url),
            poster = escape(self.poster_url),
        )?;
        writeln!(out, r#"<div class="card-image-wrapper">"#)?;
        writeln!(
            out,
            r#"<img class="anime-poster" src="{}" alt="{name} poster">"#,
            escape(self.poster_url)
        )?;
        writeln!(out, r#"<div class="card-overlay">"#)?;
        writeln!(
            out,
            r#"<button class="favorite-btn" data-anime-id="{}"><span class="favorite-icon">♡</span></button>"#,
            self.id
        )?;
        writeln!(
            out,
            r#"<div class="popularity-rank-badge" data-tooltip="🔥 #{rank} most popular{qualifier} • {users} users tracking">#{rank}</div>"#,
            rank = self.popularity_rank,
            qualifier = escape(self.rank_qualifier),
            users = thousands(self.popularity),
        )?;
        writeln!(out, "</div>")?;
        if self.studios.is_none() {
            writeln!(
                out,
                r#"<div class="custom-link-badge" style="display: none;"><span class="custom-favicon"></span></div>"#
            )?;
        }
        writeln!(out, "</div>")?;

        writeln!(out, r#"<div class="card-info">"#)?;
        if let Some(english) = self.english_title.filter(|title| !title.is_empty()) {
            writeln!(out, r#"<div class="anime-english-title">{}</div>"#, escape(english))?;
        }
        writeln!(out, r#"<h3 class="anime-title">{name}</h3>"#)?;
        writeln!(out, r#"<div class="episode-info">"#)?;
        writeln!(out, r#"<span class="episode-badge">{}</span>"#, escape(&self.episode))?;
        writeln!(
            out,
            r#"<a href="{link}" target="_blank" class="main-link-btn">{}</a>"#,
            escape(&link_label(self.link))
        )?;
        if let Some(date) = &self.date {
            writeln!(out, r#"<span class="release-date">{}</span>"#, escape(date))?;
        }
        writeln!(out, "</div>")?;
        match self.studios {
            Some(studios) => writeln!(
                out,
                r#"<div class="anime-details"><div class="studio-info">{}</div></div>"#,
                escape(studios)
            )?,
            None => {
                writeln!(out, r#"<div class="streaming-links">"#)?;
                for link in &self.streaming_links {
                    writeln!(
                        out,
                        r#"<a href="{url}" target="_blank" title="{site}" class="streaming-link"><img src="{icon}" alt="{site}"></a>"#,
                        url = escape(&link.url),
                        site = escape(&link.site),
                        icon = escape(&link.icon),
                    )?;
                }
                writeln!(out, "</div>")?;
            }
        }
        writeln!(out, "</div>")?;
        writeln!(out, "</div>")?;
        Ok(())
    }
}

/// A series' own streaming links followed by any manually curated ones for other sites.
pub fn with_manual_links(
    own: &[StreamingLink],
    manual: Option<&[StreamingLink]>,
) -> Vec<StreamingLink> {
    merge_links(own.iter().chain(manual.into_iter().flatten()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(
            escape(r#"<a href="x">Tom & Jerry's</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#39;s&lt;/a&gt;"
        );
        assert_eq!(escape("Frieren: 葬送のフリーレン"), "Frieren: 葬送のフリーレン");
    }

    #[test]
    fn test_script_json() {
        let json = script_json(&vec!["</script><script>alert(1)</script>"]).unwrap();
        assert!(!json.contains("</"));
        assert_eq!(json, r#"["<\/script><script>alert(1)<\/script>"]"#);
        assert_eq!(script_json("薬屋").unwrap(), "\"薬屋\"");
    }

    #[test]
    fn test_thousands() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1000), "1,000");
        assert_eq!(thousands(1234567), "1,234,567");
    }

    #[test]
    fn test_link_label() {
        assert_eq!(link_label("https://anilist.co/anime/1"), "anilist.co");
        assert_eq!(link_label("https://www.crunchyroll.com/x"), "www.crunchyroll.com");
        assert_eq!(link_label("not a url"), "anilist.co");
        assert_eq!(link_label("https://www.hidive.com?x=1"), "www.hidive.com");
    }

    #[test]
    fn test_with_manual_links() {
        let link = |site: &str| StreamingLink {
            site: site.into(),
            url: format!("https://{site}.example"),
            icon: String::new(),
        };
        let own = [link("Crunchyroll")];
        let manual = vec![link("Crunchyroll"), link("HIDIVE")];

        let merged = with_manual_links(&own, Some(manual.as_slice()));
        assert_eq!(merged, vec![link("Crunchyroll"), link("HIDIVE")]);
        assert_eq!(with_manual_links(&own, None), own.to_vec());
    }

    #[test]
    fn test_card_escapes_everything() {
        let card = Card {
            class: "today-card",
            id: 7,
            name: "<b>Evil</b>",
            english_title: Some("\"Quoted\""),
            link: "https://example.com/?a=1&b=2",
            release: "2025-04-16",
            site_url: "https://anilist.co/anime/7",
            poster_url: "https://img/7.jpg",
            popularity: 12_345,
            popularity_rank: 4,
            rank_qualifier: "",
            episode: "Episode 3".into(),
            date: None,
            streaming_links: vec![],
            studios: None,
        };
        let mut out = String::new();
        card.write(&mut out).unwrap();
        assert!(out.contains(r#"class="anime-card today-card""#));
        assert!(out.contains("&lt;b&gt;Evil&lt;/b&gt;"));
        assert!(!out.contains("<b>"));
        assert!(out.contains("&quot;Quoted&quot;"));
        assert!(out.contains("?a=1&amp;b=2"));
        assert!(out.contains("#4 most popular • 12,345 users tracking"));
        assert!(out.contains(r#"class="main-link-btn">example.com</a>"#));
        assert!(out.contains("custom-link-badge"));
    }
}
