//! An AniList client which reads from the local file system instead of the AniList API.

use super::{AniList, MediaQuery, Page, Response};
use anyhow::Error;
use async_trait::async_trait;
use std::fs;
use std::path::PathBuf;

/// An AniList client which reads from the local file system instead of the AniList API.
///
/// Pages are raw AniList responses stored as `<root>/<query name>/<page>.json`. A missing page
/// ends the listing, as an empty page from the API would.
pub struct LocalClient {
    root: PathBuf,
}

impl LocalClient {
    /// Open a directory of saved AniList pages.
    pub fn open(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl AniList for LocalClient {
    async fn page(&self, query: &MediaQuery, page: u32, _per_page: u32) -> Result<Page, Error> {
        let path = self.root.join(query.name()).join(format!("{page}.json"));
        if !path.is_file() {
            tracing::debug!("no saved page {}", path.display());
            return Ok(Page::default());
        }
        let bytes = fs::read(&path)?;
        let res: Response = serde_json::from_slice(&bytes)
            .map_err(|err| Error::msg(format!("file {} is malformed: {err}", path.display())))?;
        res.into_page()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::anilist::{fetch_all, Paging};
    use serde_json::json;

    #[async_std::test]
    async fn test_local_pages() {
        let dir = tempfile::tempdir().unwrap();
        let releasing = dir.path().join("releasing");
        fs::create_dir_all(&releasing).unwrap();
        for (page, ids, more) in [(1, [1, 2], true), (2, [3, 4], false)] {
            let media = ids
                .iter()
                .map(|id| json!({ "id": id, "title": { "romaji": format!("Anime {id}") } }))
                .collect::<Vec<_>>();
            let body = json!({
                "data": {
                    "Page": {
                        "pageInfo": { "hasNextPage": more, "currentPage": page },
                        "media": media,
                    }
                }
            });
            fs::write(releasing.join(format!("{page}.json")), body.to_string()).unwrap();
        }

        let client = LocalClient::open(dir.path().into());
        let media = fetch_all(&client, &MediaQuery::Releasing, &Paging::default())
            .await
            .unwrap();
        assert_eq!(media.iter().map(|m| m.id).collect::<Vec<_>>(), [1, 2, 3, 4]);
        assert_eq!(media[2].name(), "Anime 3");

        // Queries with no saved pages are simply empty.
        let upcoming = fetch_all(
            &client,
            &MediaQuery::Upcoming {
                season: crate::season::Season::Spring,
                year: 2025,
            },
            &Paging::default(),
        )
        .await
        .unwrap();
        assert!(upcoming.is_empty());
    }

    #[async_std::test]
    async fn test_malformed_page() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("releasing")).unwrap();
        fs::write(dir.path().join("releasing/1.json"), "not json").unwrap();
        let client = LocalClient::open(dir.path().into());
        assert!(client.page(&MediaQuery::Releasing, 1, 50).await.is_err());
    }
}
