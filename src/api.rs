//! Article fetching with timeout, exponential backoff and a JSON backup.
//!
//! # Architecture
//!
//! - [`ArticleSource`]: core trait, "give me the articles for this id"
//! - [`ApiArticleSource`]: the news API (`/News/news-detailvip?id=`)
//! - [`BackupArticleSource`]: static `{id}.json` snapshots of the same payload
//! - [`RetryFetch`]: decorator that adds retry logic to any [`ArticleSource`]
//! - [`get_articles`]: slug in, articles out; never fails
//!
//! # Retry Strategy
//!
//! - 2 retry attempts by default
//! - Exponential backoff starting at 100ms, capped at 2 seconds
//! - Random jitter added to each delay

use crate::error::{Error, Result};
use crate::models::{Article, ArticleResponse};
use crate::utils::{extract_id_from_slug, truncate_for_log};
use rand::{Rng, rng};
use reqwest::Client;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Something that can return the articles for an id.
///
/// Implemented by the live API, the JSON backup and the [`RetryFetch`]
/// decorator, so they can be stacked.
pub trait ArticleSource {
    /// Fetch the articles for `id`.
    ///
    /// # Arguments
    ///
    /// * `id` - The article id extracted from the slug
    ///
    /// # Returns
    ///
    /// The decoded articles, primary first, or the transport/decoding error.
    async fn fetch_articles(&self, id: &str) -> Result<Vec<Article>>;
}

async fn get_body(client: &Client, url: &str) -> Result<String> {
    let resp = client.get(url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(Error::Status { status: status.as_u16(), url: url.to_string() });
    }
    Ok(resp.text().await?)
}

/// GET `url` and decode an [`ArticleResponse`], all within `limit`.
#[instrument(level = "debug", skip(client))]
async fn fetch_json(client: &Client, url: &str, limit: Duration) -> Result<Vec<Article>> {
    let body = timeout(limit, get_body(client, url))
        .await
        .map_err(|_| Error::Timeout { url: url.to_string(), millis: limit.as_millis() as u64 })??;

    let parsed = serde_json::from_str::<ArticleResponse>(&body).inspect_err(|e| {
        warn!(error = %e, body_preview = %truncate_for_log(&body, 300), "Malformed article JSON");
    })?;
    Ok(parsed.into_articles())
}

/// The live news API.
#[derive(Debug, Clone)]
pub struct ApiArticleSource {
    /// Shared HTTP client.
    client: Client,
    /// API origin without a trailing slash.
    base_url: String,
    /// Whole-request budget, connect through body.
    timeout: Duration,
}

impl ApiArticleSource {
    pub fn new(client: Client, base_url: &str, timeout: Duration) -> Self {
        Self { client, base_url: base_url.trim_end_matches('/').to_string(), timeout }
    }

    /// `{base}/News/news-detailvip?id={id}`, with the id percent-encoded.
    pub fn detail_url(&self, id: &str) -> String {
        format!("{}/News/news-detailvip?id={}", self.base_url, urlencoding::encode(id))
    }
}

impl ArticleSource for ApiArticleSource {
    #[instrument(level = "info", skip(self))]
    async fn fetch_articles(&self, id: &str) -> Result<Vec<Article>> {
        fetch_json(&self.client, &self.detail_url(id), self.timeout).await
    }
}

/// Static JSON snapshots served as `{base}/{id}.json`.
#[derive(Debug, Clone)]
pub struct BackupArticleSource {
    /// Shared HTTP client.
    client: Client,
    /// Backup directory, always ending in '/'.
    base_url: Url,
    /// Whole-request budget, connect through body.
    timeout: Duration,
}

impl BackupArticleSource {
    /// # Errors
    ///
    /// [`Error::InvalidUrl`] when `base_url` is not an absolute URL.
    pub fn new(client: Client, base_url: &str, timeout: Duration) -> Result<Self> {
        // `Url::join` replaces the last segment unless the base ends in '/'.
        let base = format!("{}/", base_url.trim_end_matches('/'));
        Ok(Self { client, base_url: Url::parse(&base)?, timeout })
    }

    pub fn backup_url(&self, id: &str) -> Result<Url> {
        Ok(self.base_url.join(&format!("{}.json", urlencoding::encode(id)))?)
    }
}

impl ArticleSource for BackupArticleSource {
    #[instrument(level = "info", skip(self))]
    async fn fetch_articles(&self, id: &str) -> Result<Vec<Article>> {
        let url = self.backup_url(id)?;
        fetch_json(&self.client, url.as_str(), self.timeout).await
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`ArticleSource`].
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..=max_jitter)
/// ```
pub struct RetryFetch<T> {
    /// The source being retried.
    inner: T,
    /// Retries after the first attempt before the error is returned.
    max_retries: usize,
    /// Delay before the first retry; doubles on each further attempt.
    base_delay: Duration,
    /// Upper bound on the exponential part of the delay.
    max_delay: Duration,
    /// Upper bound on the random jitter added to every delay.
    max_jitter: Duration,
}

impl<T> RetryFetch<T>
where
    T: ArticleSource,
{
    /// Wrap `inner` with retries.
    ///
    /// # Arguments
    ///
    /// * `inner` - The source to retry
    /// * `max_retries` - Retries after the first failure (2 by default in config)
    /// * `base_delay` - Delay before the first retry
    ///
    /// # Example
    ///
    /// ```ignore
    /// let api = ApiArticleSource::new(client, "https://api.example.com", Duration::from_secs(5));
    /// let source = RetryFetch::new(api, 2, Duration::from_millis(100));
    /// ```
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(2),
            max_jitter: Duration::from_millis(50),
        }
    }

    /// Override the jitter bound (50ms by default). Zero disables jitter.
    pub fn with_max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    fn backoff(&self, attempt: usize) -> Duration {
        let delay = self
            .base_delay
            .saturating_mul(1 << (attempt - 1).min(16))
            .min(self.max_delay);
        let jitter_ms = rng().random_range(0..=self.max_jitter.as_millis() as u64);
        delay + Duration::from_millis(jitter_ms)
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> ArticleSource for RetryFetch<T>
where
    T: ArticleSource,
{
    #[instrument(level = "info", skip(self))]
    async fn fetch_articles(&self, id: &str) -> Result<Vec<Article>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.fetch_articles(id).await {
                Ok(articles) => return Ok(articles),
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "fetch_articles() exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.backoff(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "fetch_articles() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

fn usable(articles: &[Article]) -> bool {
    articles.first().is_some_and(|a| !a.name.trim().is_empty())
}

/// Resolve a slug to its articles: primary first, then the backup.
///
/// # Arguments
///
/// * `slug` - URL slug ending in the article id (`some-title-abc123`)
/// * `primary` - The detail API
/// * `backup` - The static JSON backup, tried when the API fails or returns nothing usable
///
/// # Returns
///
/// The articles, primary first. Errors never escape: an empty list means the
/// page should render "not found".
#[instrument(level = "info", skip(primary, backup))]
pub async fn get_articles<P, B>(slug: &str, primary: &P, backup: &B) -> Vec<Article>
where
    P: ArticleSource,
    B: ArticleSource,
{
    let Some(id) = extract_id_from_slug(slug) else {
        warn!("Slug has no article id");
        return Vec::new();
    };

    match primary.fetch_articles(id).await {
        Ok(articles) if usable(&articles) => {
            info!(count = articles.len(), "Fetched articles from API");
            return articles;
        }
        Ok(articles) => warn!(count = articles.len(), "API returned no usable article; trying backup"),
        Err(e) => warn!(error = %e, "API fetch failed; trying backup"),
    }

    match backup.fetch_articles(id).await {
        Ok(articles) if usable(&articles) => {
            info!(count = articles.len(), "Fetched articles from backup");
            articles
        }
        Ok(_) => {
            let e = Error::EmptyResponse { id: id.to_string() };
            error!(error = %e, "Backup had no usable article");
            Vec::new()
        }
        Err(e) => {
            error!(error = %e, "Backup fetch failed");
            debug!(id, "Rendering not found");
            Vec::new()
        }
    }
}
