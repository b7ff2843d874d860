//! Streaming service links.

use crate::{anilist::Media, rules::Rules};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use surf::Url;

/// A link to a series on a streaming service.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct StreamingLink {
    pub site: String,
    pub url: String,
    /// Favicon for the site.
    pub icon: String,
}

/// The streaming service links among a media's external links.
pub fn streaming_links(media: &Media, rules: &Rules) -> Vec<StreamingLink> {
    media
        .external_links
        .iter()
        .filter(|link| rules.is_streaming_site(&link.site))
        .filter_map(|link| {
            let url = link.url.clone().filter(|url| !url.is_empty())?;
            let domain = rules
                .site_domains
                .get(&link.site)
                .cloned()
                .unwrap_or_else(|| domain_of(&url));
            Some(StreamingLink {
                site: link.site.clone(),
                icon: favicon(&domain),
                url,
            })
        })
        .collect()
}

/// Combine two lists of links, keeping only the first link for each site.
pub fn merge_links<'a, I>(links: I) -> Vec<StreamingLink>
where
    I: IntoIterator<Item = &'a StreamingLink>,
{
    let mut seen = HashSet::new();
    links
        .into_iter()
        .filter(|link| seen.insert(link.site.clone()))
        .cloned()
        .collect()
}

/// The host of a URL, without any `www.` prefix.
///
/// If the URL has no recognizable host the URL itself is returned.
pub fn domain_of(url: &str) -> String {
    match host_of(url) {
        Some(host) => host.strip_prefix("www.").unwrap_or(&host).to_string(),
        None => url.to_string(),
    }
}

/// The host part of a URL, if it has one.
pub fn host_of(url: &str) -> Option<String> {
    if let Some(host) = Url::parse(url).ok().as_ref().and_then(Url::host_str) {
        return Some(host.to_string());
    }
    url.split_once("//")
        .map(|(_, rest)| rest)
        .and_then(|rest| rest.split(['/', '?', '#']).next())
        .filter(|host| !host.is_empty())
        .map(String::from)
}

fn favicon(domain: &str) -> String {
    format!("https://www.google.com/s2/favicons?domain={domain}&sz=32")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::anilist::{test::media, ExternalLink};

    fn link(site: &str, url: Option<&str>) -> ExternalLink {
        ExternalLink {
            site: site.into(),
            url: url.map(Into::into),
        }
    }

    #[test]
    fn test_streaming_links() {
        let mut m = media(1);
        m.external_links = vec![
            link("Twitter", Some("https://twitter.com/anime")),
            link("Crunchyroll", Some("https://www.crunchyroll.com/series/x")),
            link("Niconico", Some("https://www.nicovideo.jp/watch/1")),
            link("Netflix", None),
        ];
        let links = streaming_links(&m, &Rules::default());
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].site, "Crunchyroll");
        assert_eq!(
            links[0].icon,
            "https://www.google.com/s2/favicons?domain=crunchyroll.com&sz=32"
        );
        // Sites without a known domain fall back to the URL host.
        assert_eq!(
            links[1].icon,
            "https://www.google.com/s2/favicons?domain=nicovideo.jp&sz=32"
        );
    }

    #[test]
    fn test_merge_links_keeps_first_per_site() {
        let a = StreamingLink {
            site: "Netflix".into(),
            url: "https://netflix.com/a".into(),
            icon: String::new(),
        };
        let b = StreamingLink {
            url: "https://netflix.com/b".into(),
            ..a.clone()
        };
        let c = StreamingLink {
            site: "Hulu".into(),
            ..a.clone()
        };
        let merged = merge_links([&a, &b, &c]);
        assert_eq!(merged, [a, c]);
    }

    #[test]
    fn test_domain_of() {
        assert_eq!(domain_of("https://www.hidive.com/tv/x?y=1"), "hidive.com");
        assert_eq!(domain_of("not a url"), "not a url");
        assert_eq!(domain_of("https://WWW.Netflix.com"), "netflix.com");
    }

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("https://anilist.co/anime/1").as_deref(), Some("anilist.co"));
        assert_eq!(host_of("https://example.com:8080/x").as_deref(), Some("example.com"));
        // Not parseable as a URL, but still has a host after the scheme separator.
        assert_eq!(host_of("//cdn.example.com/a.png").as_deref(), Some("cdn.example.com"));
        assert_eq!(host_of("mailto:someone@example.com"), None);
        assert_eq!(host_of("not a url"), None);
    }
}
