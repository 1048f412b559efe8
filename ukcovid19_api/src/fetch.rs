//! The paginated fetch loop shared by the JSON and XML read paths.
//!
//! The API does not report a total item count up front; the loop walks
//! `page=1..` until the server answers 204 No Content, which marks the end
//! of the data set. The terminating page is neither merged nor counted.

use std::marker::PhantomData;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, LAST_MODIFIED};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::errors::Error;
use crate::types::ApiPage;
use crate::xml::XmlNode;

/// Wire encodings the engine can request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Format {
    Json,
    Xml,
}

impl Format {
    fn as_str(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Xml => "xml",
        }
    }
}

/// Merges successive page bodies into a format-specific accumulator.
pub(crate) trait MergePages {
    type Output;

    fn empty(&self) -> Self::Output;

    /// Folds one page body into the accumulator. A body without the
    /// expected `data` section is a decode error and aborts the fetch.
    fn merge(&self, acc: &mut Self::Output, body: &str) -> Result<(), Error>;
}

/// Record-oriented JSON pages: each page's `data` array is appended to the
/// running sequence, preserving server order.
pub(crate) struct RecordPages<T> {
    _marker: PhantomData<T>,
}

impl<T> RecordPages<T> {
    pub(crate) fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> MergePages for RecordPages<T> {
    type Output = Vec<T>;

    fn empty(&self) -> Vec<T> {
        Vec::new()
    }

    fn merge(&self, acc: &mut Vec<T>, body: &str) -> Result<(), Error> {
        let page: ApiPage<T> = serde_json::from_str(body).map_err(|e| {
            tracing::error!("failed to decode page body: {}", e);
            Error::Decode(e.to_string())
        })?;
        acc.extend(page.data);
        Ok(())
    }
}

/// Tree-oriented XML pages: the first page's document becomes the
/// accumulator root; every later page contributes only its `data` elements.
pub(crate) struct DocumentPages;

impl MergePages for DocumentPages {
    type Output = Option<XmlNode>;

    fn empty(&self) -> Option<XmlNode> {
        None
    }

    fn merge(&self, acc: &mut Option<XmlNode>, body: &str) -> Result<(), Error> {
        let mut doc = XmlNode::parse(body)?;
        if doc.descendants("data").is_empty() {
            return Err(Error::Decode("page body has no data section".to_string()));
        }
        match acc {
            None => *acc = Some(doc),
            Some(root) => {
                for data in doc.take_descendants("data") {
                    root.push(data);
                }
            }
        }
        Ok(())
    }
}

/// Everything the loop learned in one fetch session.
pub(crate) struct FetchOutcome<A> {
    pub data: A,
    pub total_pages: u32,
    pub last_update: Option<DateTime<Utc>>,
}

/// Walks the paged endpoint until exhaustion, folding each page into the
/// merger's accumulator.
pub(crate) async fn paged_fetch<M: MergePages>(
    endpoint: &str,
    query: &str,
    format: Format,
    merger: &M,
    max_pages: Option<u32>,
    cancel: &CancellationToken,
) -> Result<FetchOutcome<M::Output>, Error> {
    let client = http_client()?;

    let mut acc = merger.empty();
    let mut last_update = None;
    let mut page: u32 = 1;

    loop {
        if let Some(limit) = max_pages {
            if page > limit {
                tracing::error!("server did not signal exhaustion within {} pages", limit);
                return Err(Error::PageLimitExceeded(limit));
            }
        }

        let url = page_url(endpoint, query, page, format)?;
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            resp = client.get(url).send() => resp.map_err(|e| {
                tracing::error!("page {} request failed: {}", page, e);
                Error::RequestFailed
            })?,
        };

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            break;
        }
        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            let snippet = truncate_body(&body);
            tracing::error!("page {} failed with status {}: {}", page, status, snippet);
            return Err(Error::UpstreamStatus {
                status: status.as_u16(),
                body: snippet,
            });
        }

        if let Some(stamp) = last_modified_stamp(response.headers()) {
            last_update = Some(stamp);
        }

        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            body = response.text() => body.map_err(|e| {
                tracing::error!("failed to read page {} body: {}", page, e);
                Error::RequestFailed
            })?,
        };
        merger.merge(&mut acc, &body)?;

        page += 1;
    }

    Ok(FetchOutcome {
        data: acc,
        total_pages: page - 1,
        last_update,
    })
}

/// Builds the HTTP client used for the duration of one call. Requests get
/// a fixed 10-second timeout each; a multi-page fetch has no aggregate
/// deadline beyond the caller's cancellation signal.
pub(crate) fn http_client() -> Result<reqwest::Client, Error> {
    reqwest::Client::builder()
        .user_agent(concat!("ukcovid19_api/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| {
            tracing::error!("failed to build HTTP client: {}", e);
            Error::RequestFailed
        })
}

pub(crate) fn last_modified_stamp(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    headers
        .get(LAST_MODIFIED)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| DateTime::parse_from_rfc2822(value).ok())
        .map(|stamp| stamp.with_timezone(&Utc))
}

fn page_url(endpoint: &str, query: &str, page: u32, format: Format) -> Result<Url, Error> {
    let url = format!("{}{}&page={}&format={}", endpoint, query, page, format.as_str());
    Url::parse(&url).map_err(|e| {
        tracing::error!("invalid URL constructed: {}", e);
        Error::RequestFailed
    })
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 2000;
    if body.len() <= MAX {
        body.to_string()
    } else {
        format!("{}...[truncated]", &body[..MAX])
    }
}
