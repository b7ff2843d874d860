//! An AniList client.

use super::{AniList, MediaQuery, Page, Response, ANILIST_API_URL};
use anyhow::Error;
use async_std::task::sleep;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use surf::{StatusCode, Url};

/// How the client reacts to rate limiting and transient failures.
#[derive(Clone, Debug)]
pub struct Retry {
    /// Total number of attempts per request.
    pub attempts: u32,
    /// Slow down once the `X-RateLimit-Remaining` header drops to this value.
    pub low_remaining: u64,
    /// How long to slow down for when the rate limit is running low.
    pub low_remaining_pause: Duration,
    /// Wait used for a 429 response without a `Retry-After` header.
    pub default_retry_after: Duration,
    /// Added to every `Retry-After` wait.
    pub retry_after_padding: Duration,
    /// Base backoff after a server or transport error; multiplied by the attempt number.
    pub backoff: Duration,
}

/// What to do with a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Read the body.
    Accept,
    /// Wait, then try again.
    Retry(Duration),
    /// Give up on this request.
    Fail,
}

impl Retry {
    /// How long to wait after a transport error on the given (1-based) attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }

    /// How long to pause when the response reports `remaining` requests left in the window.
    pub fn pause(&self, remaining: Option<u64>) -> Option<Duration> {
        remaining
            .filter(|&remaining| remaining <= self.low_remaining)
            .map(|_| self.low_remaining_pause)
    }

    /// Decide what to do with a response, given its `Retry-After` header in seconds.
    pub fn on_status(&self, status: StatusCode, retry_after: Option<u64>, attempt: u32) -> Action {
        match status {
            StatusCode::Ok => Action::Accept,
            StatusCode::TooManyRequests => Action::Retry(
                retry_after
                    .map(Duration::from_secs)
                    .unwrap_or(self.default_retry_after)
                    + self.retry_after_padding,
            ),
            status if status.is_server_error() => Action::Retry(self.backoff(attempt)),
            _ => Action::Fail,
        }
    }
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            attempts: 5,
            low_remaining: 2,
            low_remaining_pause: Duration::from_secs(15),
            default_retry_after: Duration::from_secs(60),
            retry_after_padding: Duration::from_secs(2),
            backoff: Duration::from_secs(5),
        }
    }
}

/// An AniList client.
pub struct Client {
    client: surf::Client,
    retry: Retry,
}

impl Client {
    /// Connect to AniList.
    pub fn new() -> Result<Self, Error> {
        Self::with_retry(Retry::default())
    }

    /// Connect to AniList with a custom retry policy.
    pub fn with_retry(retry: Retry) -> Result<Self, Error> {
        let client: surf::Client = surf::Config::new()
            .set_base_url(Url::parse(ANILIST_API_URL)?)
            .set_timeout(Some(Duration::from_secs(20)))
            .try_into()
            .map_err(|err| Error::msg(format!("unable to build AniList client: {err}")))?;
        Ok(Self { client, retry })
    }
}

#[async_trait]
impl AniList for Client {
    async fn page(&self, query: &MediaQuery, page: u32, per_page: u32) -> Result<Page, Error> {
        let body = json!({
            "query": query.document(),
            "variables": query.variables(page, per_page),
        });
        tracing::debug!(query = query.name(), page, "AniList request");

        let attempts = self.retry.attempts;
        for attempt in 1..=attempts {
            let last = attempt == attempts;
            let mut res = match self.client.post("/").body_json(&body).map_err(Error::msg)?.await {
                Ok(res) => res,
                Err(err) => {
                    tracing::warn!("AniList request error: {err}");
                    if !last {
                        sleep(self.retry.backoff(attempt)).await;
                    }
                    continue;
                }
            };

            // Slow down before hitting the limit.
            let remaining = header_u64(&res, "X-RateLimit-Remaining");
            if let Some(pause) = self.retry.pause(remaining) {
                tracing::warn!("rate limit low ({remaining:?} remaining), pausing {pause:?}");
                sleep(pause).await;
            }

            let status = res.status();
            match self
                .retry
                .on_status(status, header_u64(&res, "Retry-After"), attempt)
            {
                Action::Accept => {
                    let body: Response = res.body_json().await.map_err(Error::msg)?;
                    return body.into_page();
                }
                Action::Retry(wait) => {
                    tracing::warn!("AniList returned {status} (attempt {attempt}/{attempts})");
                    if !last {
                        tracing::info!("retrying in {wait:?}");
                        sleep(wait).await;
                    }
                }
                Action::Fail => {
                    let text = res.body_string().await.unwrap_or_default();
                    let text: String = text.chars().take(200).collect();
                    return Err(Error::msg(format!("AniList HTTP error {status}: {text}")));
                }
            }
        }

        Err(Error::msg(format!(
            "AniList request for {} page {page} failed after {attempts} attempts",
            query.name(),
        )))
    }
}

fn header_u64(res: &surf::Response, name: &str) -> Option<u64> {
    res.header(name)?.last().as_str().trim().parse().ok()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_rate_limited_waits_retry_after() {
        let retry = Retry::default();
        assert_eq!(
            retry.on_status(StatusCode::TooManyRequests, Some(30), 1),
            Action::Retry(Duration::from_secs(32))
        );
        assert_eq!(
            retry.on_status(StatusCode::TooManyRequests, None, 4),
            Action::Retry(Duration::from_secs(62))
        );
    }

    #[test]
    fn test_server_errors_back_off_by_attempt() {
        let retry = Retry::default();
        assert_eq!(
            retry.on_status(StatusCode::InternalServerError, None, 1),
            Action::Retry(Duration::from_secs(5))
        );
        assert_eq!(
            retry.on_status(StatusCode::BadGateway, Some(30), 3),
            Action::Retry(Duration::from_secs(15))
        );
        assert_eq!(retry.backoff(2), Duration::from_secs(10));
    }

    #[test]
    fn test_other_statuses() {
        let retry = Retry::default();
        assert_eq!(retry.on_status(StatusCode::Ok, None, 1), Action::Accept);
        assert_eq!(retry.on_status(StatusCode::BadRequest, None, 1), Action::Fail);
        assert_eq!(retry.on_status(StatusCode::NotFound, Some(5), 2), Action::Fail);
    }

    #[test]
    fn test_low_remaining_pause() {
        let retry = Retry::default();
        assert_eq!(retry.pause(Some(2)), Some(Duration::from_secs(15)));
        assert_eq!(retry.pause(Some(0)), Some(Duration::from_secs(15)));
        assert_eq!(retry.pause(Some(3)), None);
        assert_eq!(retry.pause(None), None);
    }
}
