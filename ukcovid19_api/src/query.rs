//! Query parameters for the dashboard API: metric filters, the response
//! structure, and the optional `latestby` aggregation.

use std::fmt;

/// Metric filters, rendered as `key=value` pairs joined with `;`.
///
/// Entries keep their insertion order. The API treats the filter string as
/// order-insensitive, but the rendered form is deterministic for a given
/// sequence of [`Filters::add`] calls.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Filters(Vec<(String, String)>);

impl Filters {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Adds a filter, e.g. `add("areaType", "nation")`.
    ///
    /// Values are passed through verbatim; they are expected to already be
    /// query-safe.
    pub fn add(mut self, key: &str, value: &str) -> Self {
        self.0.push((key.to_string(), value.to_string()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn render(&self) -> String {
        self.0
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// The response structure: maps output field names to source metric names.
///
/// Rendered as a compact JSON object in insertion order; an empty structure
/// renders as `{}`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Structure(Vec<(String, String)>);

impl Structure {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Declares an output field, e.g. `field("newCases", "newCasesByPublishDate")`.
    pub fn field(mut self, name: &str, metric: &str) -> Self {
        self.0.push((name.to_string(), metric.to_string()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn render(&self) -> String {
        let mut out = String::from("{");
        for (i, (name, metric)) in self.0.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&json_string(name));
            out.push(':');
            out.push_str(&json_string(metric));
        }
        out.push('}');
        out
    }
}

fn json_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// The full parameter set of a fetch session. Renders the query fragment
/// every request of the session shares.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ApiParams {
    pub filters: Filters,
    pub structure: Structure,
    pub latest_by: Option<String>,
}

impl fmt::Display for ApiParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "?filters={}&structure={}&latestby={}",
            self.filters.render(),
            self.structure.render(),
            self.latest_by.as_deref().unwrap_or("")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ApiParams {
        ApiParams {
            filters: Filters::new()
                .add("areaType", "nation")
                .add("areaName", "England"),
            structure: Structure::new()
                .field("MyDate", "date")
                .field("newCases", "newCasesByPublishDate"),
            latest_by: None,
        }
    }

    #[test]
    fn filters_join_pairs_with_semicolons() {
        assert_eq!(params().filters.render(), "areaType=nation;areaName=England");
    }

    #[test]
    fn filters_keep_insertion_order() {
        let reversed = Filters::new()
            .add("areaName", "England")
            .add("areaType", "nation");
        assert_eq!(reversed.render(), "areaName=England;areaType=nation");
    }

    #[test]
    fn empty_filters_render_empty_string() {
        assert_eq!(Filters::new().render(), "");
    }

    #[test]
    fn structure_renders_canonical_json_object() {
        assert_eq!(
            params().structure.render(),
            r#"{"MyDate":"date","newCases":"newCasesByPublishDate"}"#
        );
    }

    #[test]
    fn empty_structure_renders_braces() {
        assert_eq!(Structure::new().render(), "{}");
    }

    #[test]
    fn structure_escapes_json_strings() {
        let structure = Structure::new().field("my\"field", "metric\\name");
        assert_eq!(structure.render(), r#"{"my\"field":"metric\\name"}"#);
    }

    #[test]
    fn params_render_full_query_fragment() {
        assert_eq!(
            params().to_string(),
            r#"?filters=areaType=nation;areaName=England&structure={"MyDate":"date","newCases":"newCasesByPublishDate"}&latestby="#
        );
    }

    #[test]
    fn latest_by_passes_through_verbatim() {
        let mut p = params();
        p.latest_by = Some("newCasesByPublishDate".to_string());
        assert!(p.to_string().ends_with("&latestby=newCasesByPublishDate"));
    }

    #[test]
    fn rendering_is_deterministic() {
        assert_eq!(params().to_string(), params().to_string());
    }
}
