//! Shared workflows behind the CLI commands.
//!
//! Each function returns plain data; `app` handles printing and exports.

use std::sync::Arc;

use crate::config::{ChartsConfig, DataApiConfig};
use crate::data::{FetchOptions, FileTransport, HttpTransport, Transport, VariableLoader};
use crate::dimension::{EffectiveDisplay, resolve_display};
use crate::domain::{ChartDimension, VariableDataMetadata, VariableId};
use crate::error::AppError;
use crate::grapher::{ChartTable, GrapherState, LoadState};
use crate::platform::MemoryPlatform;
use crate::url::{GrapherQueryState, UrlParts, legacy_to_current_params, split_url};

/// Container id used when the CLI mounts a chart.
const CLI_CONTAINER: &str = "cli";

/// Where variables come from: an explicit directory or URL, or the environment.
#[derive(Debug, Clone, Default)]
pub struct Source {
    pub base_url: Option<String>,
    pub data_dir: Option<std::path::PathBuf>,
}

/// Resolve the configuration and a loader for `source`.
///
/// An explicit source needs no environment; otherwise `ChartsConfig::from_env`
/// must find a data API.
pub fn build_loader(source: &Source) -> Result<(ChartsConfig, VariableLoader), AppError> {
    let (config, transport): (ChartsConfig, Arc<dyn Transport>) = match (&source.data_dir, &source.base_url) {
        (Some(dir), _) => {
            let api = DataApiConfig::new(dir.display().to_string());
            (ChartsConfig::new(api), Arc::new(FileTransport::new(dir)))
        }
        (None, Some(url)) => (ChartsConfig::new(DataApiConfig::new(url.clone())), Arc::new(HttpTransport::new()?)),
        (None, None) => (ChartsConfig::from_env()?, Arc::new(HttpTransport::new()?)),
    };
    tracing::debug!(api = ?config.data_api, "resolved data source");
    let loader = VariableLoader::new(transport, config.data_api.clone());
    Ok((config, loader))
}

/// Mount an in-memory chart, load its variables and build the table.
pub fn run_table(
    config: ChartsConfig,
    loader: &VariableLoader,
    dims: Vec<ChartDimension>,
    options: FetchOptions,
) -> Result<Arc<ChartTable>, AppError> {
    let platform = Arc::new(MemoryPlatform::default());
    let mut state = GrapherState::new(config, platform, CLI_CONTAINER, dims);

    if let LoadState::Failed { error, .. } = state.load(loader, options) {
        return Err(error.clone().into());
    }
    state
        .table()?
        .ok_or_else(|| AppError::new(4, "Variables did not load."))
}

/// Load one variable and resolve its display settings.
pub fn inspect_variable(
    loader: &VariableLoader,
    variable_id: VariableId,
    options: FetchOptions,
) -> Result<(Arc<VariableDataMetadata>, EffectiveDisplay), AppError> {
    let variable = loader.load(variable_id, options)?;
    let display = resolve_display(&variable.metadata, None);
    Ok((variable, display))
}

/// Result of migrating one address.
#[derive(Debug, Clone)]
pub struct Migration {
    pub before: UrlParts,
    pub after: UrlParts,
    pub state: GrapherQueryState,
}

pub fn migrate(input: &str) -> Migration {
    let before = split_url(input.trim());
    let mut after = before.clone();
    after.params = legacy_to_current_params(after.params);
    let state = GrapherQueryState::from_params(&after.params);
    Migration { before, after, state }
}
