//! HTTP client for the UK Coronavirus (COVID-19) Dashboard API.
//!
//! The endpoint for the data provided by this client is
//! `https://api.coronavirus.data.gov.uk/v1/data`, as published by Public
//! Health England on the Coronavirus (COVID-19) in the UK dashboard.

use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{
    errors::Error,
    fetch::{http_client, last_modified_stamp, paged_fetch, DocumentPages, Format, RecordPages},
    query::{ApiParams, Filters, Structure},
    types::JsonResponse,
    xml::XmlNode,
};

const ENDPOINT: &str = "https://api.coronavirus.data.gov.uk/v1/data";

/// Client for the dashboard API.
///
/// A client is built once from filters and a response structure; the
/// rendered query fragment is cached and reused by every request it makes.
/// The only mutable state is the last `Last-Modified` stamp observed, kept
/// behind a lock so concurrent fetches on one client stay safe.
pub struct Cov19Api {
    endpoint: String,
    params: ApiParams,
    rendered_query: String,
    max_pages: Option<u32>,
    last_updated: Mutex<Option<DateTime<Utc>>>,
}

impl Cov19Api {
    /// Creates a client for the production dashboard endpoint.
    pub fn new(filters: Filters, structure: Structure) -> Self {
        let params = ApiParams {
            filters,
            structure,
            latest_by: None,
        };
        let rendered_query = params.to_string();
        Self {
            endpoint: ENDPOINT.to_string(),
            params,
            rendered_query,
            max_pages: None,
            last_updated: Mutex::new(None),
        }
    }

    /// Aggregates the response down to the latest value of the given metric.
    pub fn with_latest_by(mut self, metric: &str) -> Self {
        self.params.latest_by = Some(metric.to_string());
        self.rendered_query = self.params.to_string();
        self
    }

    /// Points the client at a different base URL. Used for testing with wiremock.
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    /// Caps how many pages a single fetch may walk before failing with
    /// [`Error::PageLimitExceeded`]. Unset by default: the server's 204 is
    /// normally the only termination signal.
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    /// Fetches every page of the structured JSON encoding, decoding the
    /// records into `T`.
    pub async fn get<T: DeserializeOwned>(&self) -> Result<JsonResponse<T>, Error> {
        self.get_with_cancel(&CancellationToken::new()).await
    }

    /// Like [`Cov19Api::get`], aborting promptly once `cancel` fires. A
    /// cancelled fetch returns no partial data.
    pub async fn get_with_cancel<T: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
    ) -> Result<JsonResponse<T>, Error> {
        let outcome = paged_fetch(
            &self.endpoint,
            &self.rendered_query,
            Format::Json,
            &RecordPages::<T>::new(),
            self.max_pages,
            cancel,
        )
        .await?;

        self.store_last_update(outcome.last_update);
        Ok(JsonResponse {
            length: outcome.data.len(),
            data: outcome.data,
            total_pages: outcome.total_pages,
            last_update: outcome.last_update.map(format_stamp),
        })
    }

    /// Fetches every page of the XML encoding and returns the merged
    /// document root, with `length`, `totalPages` and `lastUpdate` elements
    /// reflecting the whole data set.
    pub async fn get_xml(&self) -> Result<XmlNode, Error> {
        self.get_xml_with_cancel(&CancellationToken::new()).await
    }

    /// Like [`Cov19Api::get_xml`], aborting promptly once `cancel` fires.
    pub async fn get_xml_with_cancel(&self, cancel: &CancellationToken) -> Result<XmlNode, Error> {
        let outcome = paged_fetch(
            &self.endpoint,
            &self.rendered_query,
            Format::Xml,
            &DocumentPages,
            self.max_pages,
            cancel,
        )
        .await?;

        self.store_last_update(outcome.last_update);

        let mut root = outcome
            .data
            .ok_or_else(|| Error::Decode("no pages returned".to_string()))?;

        let count = root.descendants("data").len();
        match root.child_mut("length") {
            Some(length) => length.text = count.to_string(),
            None => root.push(XmlNode::with_text("length", &count.to_string())),
        }
        root.push(XmlNode::with_text(
            "totalPages",
            &outcome.total_pages.to_string(),
        ));
        let stamp = outcome.last_update.map(format_stamp).unwrap_or_default();
        root.push(XmlNode::with_text("lastUpdate", &stamp));
        root.remove_descendants("pagination");
        root.remove_descendants("maxPageLimit");
        Ok(root)
    }

    /// Issues a single unpaged GET of the base query and returns the
    /// response headers.
    pub async fn head(&self) -> Result<HeaderMap, Error> {
        let url = self.base_url()?;
        let client = http_client()?;
        let response = client.get(url).send().await.map_err(|e| {
            tracing::error!("header probe failed: {}", e);
            Error::RequestFailed
        })?;
        Ok(response.headers().clone())
    }

    /// Fetches the API's self-description document via an OPTIONS request
    /// to the bare endpoint. Informational only.
    pub async fn options(&self) -> Result<serde_json::Value, Error> {
        let url = Url::parse(&self.endpoint).map_err(|e| {
            tracing::error!("invalid endpoint URL: {}", e);
            Error::RequestFailed
        })?;
        let client = http_client()?;
        let response = client
            .request(Method::OPTIONS, url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("capability probe failed: {}", e);
                Error::RequestFailed
            })?;
        let body = response.text().await.map_err(|e| {
            tracing::error!("failed to read capability document: {}", e);
            Error::RequestFailed
        })?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!("failed to decode capability document: {}", e);
            Error::Decode(e.to_string())
        })
    }

    /// Returns the upstream's last release stamp.
    ///
    /// A stamp remembered from an earlier call is returned without a
    /// network round trip. Otherwise a single header probe is made; a
    /// missing or unparsable `Last-Modified` yields `Ok(None)` rather than
    /// an error.
    pub async fn last_update(&self) -> Result<Option<DateTime<Utc>>, Error> {
        if let Some(stamp) = *self.last_updated.lock().unwrap() {
            return Ok(Some(stamp));
        }

        let headers = self.head().await?;
        let parsed = last_modified_stamp(&headers);
        if parsed.is_some() {
            *self.last_updated.lock().unwrap() = parsed;
        }
        Ok(parsed)
    }

    fn base_url(&self) -> Result<Url, Error> {
        let url = format!("{}{}", self.endpoint, self.rendered_query);
        Url::parse(&url).map_err(|e| {
            tracing::error!("invalid URL constructed: {}", e);
            Error::RequestFailed
        })
    }

    /// A session that observed no `Last-Modified` header leaves the shared
    /// stamp untouched.
    fn store_last_update(&self, seen: Option<DateTime<Utc>>) {
        if seen.is_some() {
            *self.last_updated.lock().unwrap() = seen;
        }
    }
}

fn format_stamp(stamp: DateTime<Utc>) -> String {
    stamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}
