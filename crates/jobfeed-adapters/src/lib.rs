//! Feed retrieval contracts + entry classification for jobfeed.

mod classify;

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobfeed_core::JobType;
use jobfeed_storage::{FetchError, HttpClientConfig, HttpFetcher};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

pub use classify::{
    categorize, CategoryRule, Classifier, AGE_LIMIT_PLACEHOLDER, CATEGORY_RULES, DEFAULT_LOCATION,
    EXPERIENCE_PLACEHOLDER, GOVT_MARKERS, KNOWN_ORGANIZATIONS, LAST_DATE_PLACEHOLDER,
    QUALIFICATION_PLACEHOLDER, SALARY_PLACEHOLDER, UNSPECIFIED_ORGANIZATION, URGENT_KEYWORDS,
    VACANCIES_PLACEHOLDER,
};

pub const CRATE_NAME: &str = "jobfeed-adapters";

/// Day-month-year format used for entry dates.
pub const FEED_DATE_FORMAT: &str = "%d %b %Y";

/// One raw entry as it came out of a feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub published: String,
}

/// A configured update feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub url: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub type_override: Option<JobType>,
    #[serde(default)]
    pub organization: Option<String>,
}

impl SourceDescriptor {
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            type_override: None,
            organization: None,
        }
    }

    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.url
        } else {
            &self.name
        }
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterContext {
    pub run_id: Uuid,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("parsing feed {url}: {message}")]
    Feed { url: String, message: String },
}

/// Retrieval collaborator: one source in, its raw entries out.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_entries(
        &self,
        ctx: &AdapterContext,
        source: &SourceDescriptor,
    ) -> Result<Vec<FeedEntry>, AdapterError>;
}

/// Fetches RSS 2.0 / Atom feeds over HTTP.
#[derive(Debug)]
pub struct RssFeedSource {
    http: HttpFetcher,
}

impl RssFeedSource {
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        Ok(Self {
            http: HttpFetcher::new(config)?,
        })
    }
}

#[async_trait]
impl FeedSource for RssFeedSource {
    async fn fetch_entries(
        &self,
        ctx: &AdapterContext,
        source: &SourceDescriptor,
    ) -> Result<Vec<FeedEntry>, AdapterError> {
        let body = self
            .http
            .fetch_feed(ctx.run_id, source.display_name(), &source.url)
            .await?;
        debug!(
            source = source.display_name(),
            bytes = body.bytes.len(),
            final_url = %body.final_url,
            "feed fetched"
        );
        parse_feed(&body.final_url, &body.bytes, ctx.fetched_at)
    }
}

/// Parse a feed body. Untitled entries are skipped; a missing link becomes `#` and a
/// missing date becomes `fetched_at`.
pub fn parse_feed(url: &str, body: &[u8], fetched_at: DateTime<Utc>) -> Result<Vec<FeedEntry>, AdapterError> {
    let feed = feed_rs::parser::parse(body).map_err(|err| AdapterError::Feed {
        url: url.to_string(),
        message: err.to_string(),
    })?;

    Ok(feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let title = entry
                .title
                .map(|text| collapse_whitespace(&text.content))
                .filter(|title| !title.is_empty())?;
            let link = entry
                .links
                .first()
                .map(|link| link.href.trim().to_string())
                .filter(|href| !href.is_empty())
                .unwrap_or_else(|| "#".to_string());
            let published = entry.published.or(entry.updated).unwrap_or(fetched_at);
            Some(FeedEntry {
                title,
                link,
                published: published.format(FEED_DATE_FORMAT).to_string(),
            })
        })
        .collect())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trusted-domain allow-list. Empty means every link is allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainPolicy {
    trusted: Vec<String>,
}

impl DomainPolicy {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            trusted: domains
                .into_iter()
                .map(|d| d.as_ref().trim().to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.trusted.is_empty()
    }

    /// Host suffix or substring match; links without a parseable host fall back to a
    /// substring match on the whole link.
    pub fn allows(&self, link: &str) -> bool {
        if self.is_open() {
            return true;
        }
        let link = link.trim();
        let haystack = Url::parse(link)
            .ok()
            .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
            .unwrap_or_else(|| link.to_ascii_lowercase());
        self.trusted
            .iter()
            .any(|domain| haystack.ends_with(domain.as_str()) || haystack.contains(domain.as_str()))
    }
}
