//! URL query-parameter state.
//!
//! `QueryParams` is the flat view state serialized to the address bar.
//! Values are percent-decoded without the form-encoding rule that turns `+`
//! into a space: legacy entity lists use a literal `+` as their delimiter and
//! the migrations need to see it.

use std::collections::BTreeMap;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::Serialize;

pub mod migrations;
pub mod schema;

pub use migrations::*;
pub use schema::*;

/// Characters left as-is when encoding keys and values (RFC 3986 unreserved).
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryParams(BTreeMap<String, String>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `a=1&b=2` (a leading `?` is accepted). Repeated keys: last wins.
    /// A key without `=` maps to the empty string.
    pub fn from_query_str(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut params = BTreeMap::new();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = decode(key);
            if key.is_empty() {
                continue;
            }
            params.insert(key, decode(value));
        }
        Self(params)
    }

    /// Serialize without the leading `?`; keys are sorted.
    pub fn to_query_string(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// Apply several changes at once; `None` removes the key.
    pub fn update<K, I>(mut self, changes: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Option<String>)>,
    {
        for (key, value) in changes {
            let key = key.into();
            match value {
                Some(v) => {
                    self.0.insert(key, v);
                }
                None => {
                    self.0.remove(&key);
                }
            }
        }
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// An address split around its query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlParts {
    /// Everything before `?` (or before `#` when there is no query).
    pub base: String,
    pub params: QueryParams,
    /// Fragment without the leading `#`.
    pub fragment: Option<String>,
}

/// Split an address (or a bare query string) into base, params and fragment.
pub fn split_url(url: &str) -> UrlParts {
    let (rest, fragment) = match url.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment.to_string())),
        None => (url, None),
    };
    let (base, query) = match rest.split_once('?') {
        Some((base, query)) => (base.to_string(), query),
        // A bare `a=b&c=d` string is all query.
        None if rest.contains('=') => (String::new(), rest),
        None => (rest.to_string(), ""),
    };
    UrlParts {
        base,
        params: QueryParams::from_query_str(query),
        fragment,
    }
}

/// Inverse of `split_url`; an empty query drops the `?`.
pub fn join_url(parts: &UrlParts) -> String {
    let mut out = parts.base.clone();
    let query = parts.params.to_query_string();
    if !query.is_empty() {
        out.push('?');
        out.push_str(&query);
    }
    if let Some(fragment) = &parts.fragment {
        out.push('#');
        out.push_str(fragment);
    }
    out
}

fn decode(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

fn encode(raw: &str) -> String {
    utf8_percent_encode(raw, QUERY_VALUE).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_decodes_without_plus_to_space() {
        let params = QueryParams::from_query_str("?country=USA+GBR&time=2000..2010&tab=chart&flag");
        assert_eq!(params.get("country"), Some("USA+GBR"));
        assert_eq!(params.get("time"), Some("2000..2010"));
        assert_eq!(params.get("flag"), Some(""));

        let params = QueryParams::from_query_str("country=United%20States~Canada");
        assert_eq!(params.get("country"), Some("United States~Canada"));
    }

    #[test]
    fn serializes_with_unreserved_tilde() {
        let params: QueryParams = [("country", "United States~Canada"), ("time", "2000..2010")]
            .into_iter()
            .collect();
        assert_eq!(params.to_query_string(), "country=United%20States~Canada&time=2000..2010");
        assert_eq!(QueryParams::from_query_str(&params.to_query_string()), params);
    }

    #[test]
    fn update_sets_and_removes() {
        let params: QueryParams = [("year", "2015")].into_iter().collect();
        let params = params.update([("year", None), ("time", Some("2015".to_string()))]);
        assert_eq!(params.get("time"), Some("2015"));
        assert!(!params.contains("year"));
    }

    #[test]
    fn split_and_join_round_trip_addresses() {
        let parts = split_url("https://example.org/grapher/gdp?tab=map&year=2010#note");
        assert_eq!(parts.base, "https://example.org/grapher/gdp");
        assert_eq!(parts.params.get("year"), Some("2010"));
        assert_eq!(parts.fragment.as_deref(), Some("note"));
        assert_eq!(join_url(&parts), "https://example.org/grapher/gdp?tab=map&year=2010#note");

        let bare = split_url("tab=table");
        assert_eq!(bare.base, "");
        assert_eq!(bare.params.get("tab"), Some("table"));

        let no_query = split_url("https://example.org/grapher/gdp");
        assert!(no_query.params.is_empty());
        assert_eq!(join_url(&no_query), "https://example.org/grapher/gdp");
    }
}
