//! Variable data API: routes and parsing.
//!
//! A variable is two JSON documents, `{id}.data.json` (parallel `years`,
//! `entities`, `values` arrays) and `{id}.metadata.json`. Both are required.

use serde::de::DeserializeOwned;

use crate::config::DataApiConfig;
use crate::data::retry::RetryPolicy;
use crate::data::transport::Transport;
use crate::domain::{VariableDataMetadata, VariableId, VariableMetadata, VariableMixedData};
use crate::error::FetchError;

const NO_CACHE_PARAM: &str = "nocache";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Ask the server (and the loader) not to serve a cached copy.
    pub no_cache: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariableUrls {
    pub data: String,
    pub metadata: String,
}

/// Resolve both URLs of `variable_id`.
pub fn variable_urls(api: &DataApiConfig, variable_id: VariableId, options: FetchOptions) -> VariableUrls {
    let mut urls = VariableUrls {
        data: api.data_url(variable_id),
        metadata: api.metadata_url(variable_id),
    };
    if options.no_cache {
        urls.data = append_no_cache(&urls.data);
        urls.metadata = append_no_cache(&urls.metadata);
    }
    urls
}

fn append_no_cache(url: &str) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{url}{sep}{NO_CACHE_PARAM}")
}

/// Fetch and parse one variable. Each resource is retried independently.
pub fn fetch_variable(
    transport: &dyn Transport,
    api: &DataApiConfig,
    variable_id: VariableId,
    options: FetchOptions,
    retry: &RetryPolicy,
) -> Result<VariableDataMetadata, FetchError> {
    if variable_id == 0 {
        return Err(FetchError::InvalidVariableId(variable_id));
    }
    let urls = variable_urls(api, variable_id, options);
    tracing::debug!(variable_id, data = %urls.data, metadata = %urls.metadata, "fetching variable");

    let data: VariableMixedData = fetch_json(transport, &urls.data, retry)?;
    let metadata: VariableMetadata = fetch_json(transport, &urls.metadata, retry)?;

    Ok(VariableDataMetadata { data, metadata })
}

fn fetch_json<T: DeserializeOwned>(transport: &dyn Transport, url: &str, retry: &RetryPolicy) -> Result<T, FetchError> {
    let body = retry.run(|| transport.get(url))?;
    serde_json::from_str(&body).map_err(|e| FetchError::Parse {
        url: url.to_string(),
        message: e.to_string(),
    })
}
