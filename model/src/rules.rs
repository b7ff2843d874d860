//! The rule table behind filtering and episode inference.

use crate::anilist::{Media, MediaFormat};
use anyhow::Error;
use clap::Args;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

/// Rule table options.
#[derive(Clone, Debug, Default, Args)]
#[group(skip)]
pub struct Options {
    /// JSON file overriding the default filtering rules.
    ///
    /// Any field left out of the file keeps its default value.
    #[clap(long = "rules", env = "ANIME_TRACKER_RULES", name = "FILE")]
    pub rules: Option<PathBuf>,
}

impl Options {
    /// Load the configured rules.
    pub fn load(&self) -> Result<Rules, Error> {
        match &self.rules {
            Some(path) => {
                let bytes = fs::read(path)?;
                let rules = serde_json::from_slice(&bytes).map_err(|err| {
                    Error::msg(format!("rules file {} is malformed: {err}", path.display()))
                })?;
                tracing::info!("loaded rules from {}", path.display());
                Ok(rules)
            }
            None => Ok(Rules::default()),
        }
    }
}

/// Thresholds and keyword lists used to decide which series are tracked.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Rules {
    /// Title fragments identifying children's shows, which are never tracked.
    pub kids_keywords: Vec<String>,
    /// Title fragments identifying long-running series which are tracked despite their age and
    /// episode count.
    pub long_running_exceptions: Vec<String>,
    /// Minimum AniList popularity for an airing series.
    pub min_popularity: u64,
    /// Minimum AniList popularity for a next-season series.
    pub min_upcoming_popularity: u64,
    /// Minimum episode length, in minutes.
    pub min_duration: u32,
    /// Series which started in a year before the one this many days ago are dropped.
    pub cutoff_days: i64,
    /// A series whose start month is at least this many days ago has no inferred release date.
    pub started_long_ago_days: i64,
    /// A series with more episodes than this is treated as long-running.
    pub long_running_episodes: u32,
    /// External link sites which are streaming services.
    pub streaming_sites: Vec<String>,
    /// Domains used for favicons of known streaming sites.
    pub site_domains: BTreeMap<String, String>,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            kids_keywords: strings(&[
                "Maebashi Witches",
                "Shirobuta Kizoku",
                "Mashin Souzouden Wataru",
                "Crayon Shin-chan",
                "Doraemon",
                "Pokemon",
                "Pocket Monsters",
                "Beyblade",
                "Yu-Gi-Oh",
                "Digimon",
                "PreCure",
                "Pretty Cure",
                "Aikatsu",
                "PriPara",
                "Yokai Watch",
                "Hamtaro",
                "Anpanman",
            ]),
            long_running_exceptions: strings(&["ONE PIECE", "Naruto", "Detective Conan", "Boruto"]),
            min_popularity: 5000,
            min_upcoming_popularity: 1000,
            min_duration: 10,
            cutoff_days: 365,
            started_long_ago_days: 90,
            long_running_episodes: 50,
            streaming_sites: strings(&[
                "Crunchyroll",
                "Funimation",
                "Netflix",
                "Hulu",
                "Amazon Prime Video",
                "Disney Plus",
                "HBO Max",
                "VRV",
                "Hidive",
                "HIDIVE",
                "AnimeLab",
                "Wakanim",
                "Bilibili",
                "iQiyi",
                "Tencent Video",
                "YouTube",
                "Niconico",
                "AbemaTV",
                "dAnime Store",
                "U-NEXT",
                "Muse Asia",
                "Oceanveil",
                "Crave",
                "Apple TV+",
                "Apple TV Plus",
                "Peacock",
            ]),
            site_domains: [
                ("Crunchyroll", "crunchyroll.com"),
                ("Netflix", "netflix.com"),
                ("Hulu", "hulu.com"),
                ("Amazon Prime Video", "primevideo.com"),
                ("Disney Plus", "disneyplus.com"),
                ("HBO Max", "hbomax.com"),
                ("YouTube", "youtube.com"),
                ("Funimation", "funimation.com"),
                ("VRV", "vrv.co"),
                ("Hidive", "www.hidive.com"),
                ("HIDIVE", "www.hidive.com"),
                ("Bilibili", "bilibili.com"),
                ("AnimeLab", "animelab.com"),
                ("Wakanim", "wakanim.tv"),
                ("Oceanveil", "oceanveil.org"),
                ("Crave", "crave.ca"),
                ("Apple TV+", "tv.apple.com"),
                ("Apple TV Plus", "tv.apple.com"),
                ("Peacock", "peacocktv.com"),
            ]
            .into_iter()
            .map(|(site, domain)| (site.to_string(), domain.to_string()))
            .collect(),
        }
    }
}

impl Rules {
    /// Is this a children's show?
    pub fn is_kids(&self, media: &Media) -> bool {
        self.kids_keywords
            .iter()
            .any(|keyword| media.title_contains(keyword))
    }

    /// Is this a long-running series we track anyway?
    pub fn is_exception(&self, media: &Media) -> bool {
        self.long_running_exceptions
            .iter()
            .any(|exception| media.title_contains(exception))
    }

    /// Are episodes too short to count as a regular series?
    ///
    /// TV shorts with an unknown duration are assumed to be short.
    pub fn is_too_short(&self, media: &Media) -> bool {
        match media.duration {
            Some(duration) if duration > 0 => duration < self.min_duration,
            _ => media.format == Some(MediaFormat::TvShort),
        }
    }

    pub fn is_streaming_site(&self, site: &str) -> bool {
        self.streaming_sites.iter().any(|s| s == site)
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::anilist::test::media;

    #[test]
    fn test_title_predicates() {
        let rules = Rules::default();

        let mut m = media(1);
        m.title.romaji = "Pocket Monsters (2023)".into();
        assert!(rules.is_kids(&m));

        let mut m = media(2);
        m.title.english = Some("Case Closed: Detective Conan".into());
        assert!(rules.is_exception(&m));
        assert!(!rules.is_kids(&m));
    }

    #[test]
    fn test_too_short() {
        let rules = Rules::default();
        let mut m = media(1);
        assert!(!rules.is_too_short(&m));
        m.format = Some(MediaFormat::TvShort);
        assert!(rules.is_too_short(&m));
        m.duration = Some(12);
        assert!(!rules.is_too_short(&m));
        m.format = Some(MediaFormat::Tv);
        m.duration = Some(5);
        assert!(rules.is_too_short(&m));
    }

    #[test]
    fn test_partial_rules_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        fs::write(&path, r#"{ "min_popularity": 100, "kids_keywords": [] }"#).unwrap();
        let rules = Options { rules: Some(path) }.load().unwrap();
        assert_eq!(rules.min_popularity, 100);
        assert!(rules.kids_keywords.is_empty());
        assert_eq!(rules.long_running_episodes, 50);
    }
}
