//! Response envelopes returned to callers.

use serde::{Deserialize, Serialize};

/// One page of the structured JSON encoding. Only the `data` array is kept;
/// per-page pagination metadata is discarded during aggregation.
#[derive(Deserialize)]
pub(crate) struct ApiPage<T> {
    pub data: Vec<T>,
}

/// The aggregated result of a structured-mode fetch.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonResponse<T> {
    /// Decoded records from every page, in server order.
    pub data: Vec<T>,
    /// Number of records in `data`.
    pub length: usize,
    /// Pages consumed before the server signalled exhaustion.
    pub total_pages: u32,
    /// ISO-8601 stamp of the last `Last-Modified` header observed during
    /// the fetch, or `None` if no page carried one.
    pub last_update: Option<String>,
}
