//! Chart state for one embedded chart.
//!
//! `GrapherState` owns the pieces a host needs to show a chart: the migrated
//! URL state, the dimension list, the loaded variables and the derived table.
//!
//! - the address is migrated once, at construction
//! - loads are ticketed; results for a superseded ticket are dropped
//! - `table()` is rebuilt only when its inputs change
//! - `render` is the error boundary around the host's drawing code

use std::any::Any;
use std::collections::BTreeSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value, json};

use crate::config::ChartsConfig;
use crate::data::{FetchOptions, VariableLoader};
use crate::domain::{ChartDimension, VariableDataMap, VariableId};
use crate::error::{FetchError, RenderError, TableError};
use crate::platform::{ObserverId, Platform, Size};
use crate::table::{ResolvedDimension, Table, legacy_to_table};
use crate::url::{GrapherQueryState, QueryParams, UrlParts, join_url, legacy_to_current_params, split_url};

/// Shown in place of a chart whose data could not be loaded.
pub const LOAD_FAILURE_MESSAGE: &str = "Couldn't load chart";

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Idle,
    Loading,
    Loaded,
    Failed { message: String, error: FetchError },
}

/// Identifies one load. Only the most recent ticket is honoured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    pub variable_ids: Vec<VariableId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome<T> {
    Rendered(T),
    /// Data is not loaded yet.
    Loading,
    Error(String),
}

/// The table built for the current dimensions and data.
#[derive(Debug)]
pub struct ChartTable {
    pub table: Table,
    pub dimensions: Vec<ResolvedDimension>,
}

struct TableMemo {
    dimensions_version: u64,
    data: Arc<VariableDataMap>,
    result: Result<Arc<ChartTable>, TableError>,
}

pub struct GrapherState {
    config: ChartsConfig,
    platform: Arc<dyn Platform>,
    url: UrlParts,
    dimensions: Vec<ChartDimension>,
    dimensions_version: u64,
    data: Option<Arc<VariableDataMap>>,
    load_state: LoadState,
    load_generation: u64,
    mounted: bool,
    bounds: Arc<Mutex<Size>>,
    observer: Option<ObserverId>,
    memo: Option<TableMemo>,
    table_builds: u64,
}

impl GrapherState {
    /// Mount a chart in `container`.
    ///
    /// Legacy query params in the current address are migrated and, when that
    /// changed anything, the address is rewritten through the platform.
    pub fn new(
        config: ChartsConfig,
        platform: Arc<dyn Platform>,
        container: &str,
        dimensions: Vec<ChartDimension>,
    ) -> Self {
        let mut url = split_url(&platform.current_url());
        let migrated = legacy_to_current_params(url.params.clone());
        if migrated != url.params {
            url.params = migrated;
            let address = join_url(&url);
            tracing::debug!(%address, "migrated legacy query params");
            platform.set_current_url(&address);
        }

        let bounds = Arc::new(Mutex::new(Size::default()));
        let sink = bounds.clone();
        let observer = platform.observe_resize(container, Box::new(move |size| *sink.lock() = size));

        Self {
            config,
            platform,
            url,
            dimensions,
            dimensions_version: 0,
            data: None,
            load_state: LoadState::Idle,
            load_generation: 0,
            mounted: true,
            bounds,
            observer: Some(observer),
            memo: None,
            table_builds: 0,
        }
    }

    pub fn config(&self) -> &ChartsConfig {
        &self.config
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Last size reported for the container.
    pub fn bounds(&self) -> Size {
        *self.bounds.lock()
    }

    pub fn query_params(&self) -> &QueryParams {
        &self.url.params
    }

    pub fn query_state(&self) -> GrapherQueryState {
        GrapherQueryState::from_params(&self.url.params)
    }

    /// Set (or with `None`, remove) one param and write the address back.
    pub fn set_query_param(&mut self, key: &str, value: Option<String>) {
        let params = std::mem::take(&mut self.url.params);
        self.url.params = params.update([(key, value)]);
        self.write_url();
    }

    pub fn apply_query_state(&mut self, state: &GrapherQueryState) {
        let params = std::mem::take(&mut self.url.params);
        self.url.params = state.apply_to(params);
        self.write_url();
    }

    fn write_url(&self) {
        if self.mounted {
            self.platform.set_current_url(&join_url(&self.url));
        }
    }

    pub fn dimensions(&self) -> &[ChartDimension] {
        &self.dimensions
    }

    pub fn set_dimensions(&mut self, dimensions: Vec<ChartDimension>) {
        self.dimensions = dimensions;
        self.dimensions_version += 1;
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    pub fn data(&self) -> Option<&Arc<VariableDataMap>> {
        self.data.as_ref()
    }

    /// Begin a load of every variable the dimensions reference.
    pub fn start_load(&mut self) -> LoadTicket {
        self.load_generation += 1;
        self.load_state = LoadState::Loading;
        let variable_ids: BTreeSet<VariableId> = self.dimensions.iter().map(|d| d.variable_id).collect();
        LoadTicket {
            generation: self.load_generation,
            variable_ids: variable_ids.into_iter().collect(),
        }
    }

    /// Apply the result of `ticket`'s load. Returns whether it was applied.
    pub fn finish_load(&mut self, ticket: LoadTicket, result: Result<VariableDataMap, FetchError>) -> bool {
        if !self.mounted {
            tracing::debug!("ignoring load result after unmount");
            return false;
        }
        if ticket.generation != self.load_generation {
            tracing::debug!(
                ticket = ticket.generation,
                current = self.load_generation,
                "ignoring superseded load result"
            );
            return false;
        }

        match result {
            Ok(data) => {
                self.data = Some(Arc::new(data));
                self.load_state = LoadState::Loaded;
            }
            Err(error) => {
                let mut context = Map::new();
                context.insert("variableIds".to_string(), json!(ticket.variable_ids));
                self.config.error_reporting.report(&error, &context);
                self.load_state = LoadState::Failed {
                    message: LOAD_FAILURE_MESSAGE.to_string(),
                    error,
                };
            }
        }
        true
    }

    /// Load through `loader` and apply the result.
    pub fn load(&mut self, loader: &VariableLoader, options: FetchOptions) -> &LoadState {
        let ticket = self.start_load();
        let result = loader.load_many(&ticket.variable_ids, options);
        self.finish_load(ticket, result);
        &self.load_state
    }

    /// The table for the current dimensions and data; `Ok(None)` before data
    /// has loaded.
    pub fn table(&mut self) -> Result<Option<Arc<ChartTable>>, TableError> {
        let Some(data) = self.data.clone() else {
            return Ok(None);
        };

        if let Some(cached) = &self.memo
            && cached.dimensions_version == self.dimensions_version
            && Arc::ptr_eq(&cached.data, &data)
        {
            return cached.result.clone().map(Some);
        }

        self.table_builds += 1;
        let result = legacy_to_table(&data, &self.dimensions)
            .map(|(table, dimensions)| Arc::new(ChartTable { table, dimensions }));
        self.memo = Some(TableMemo {
            dimensions_version: self.dimensions_version,
            data,
            result: result.clone(),
        });
        result.map(Some)
    }

    /// Run `draw` against the current table and bounds.
    ///
    /// Errors and panics from `draw`, table errors and load failures all
    /// become `RenderOutcome::Error`; the first three are reported.
    pub fn render<T>(&mut self, draw: impl FnOnce(&ChartTable, Size) -> Result<T, RenderError>) -> RenderOutcome<T> {
        if let LoadState::Failed { message, .. } = &self.load_state {
            return RenderOutcome::Error(message.clone());
        }

        let table = match self.table() {
            Ok(Some(table)) => table,
            Ok(None) => return RenderOutcome::Loading,
            Err(err) => {
                self.report_render_error(&err);
                return RenderOutcome::Error(err.to_string());
            }
        };

        let size = self.bounds();
        match catch_unwind(AssertUnwindSafe(|| draw(&table, size))) {
            Ok(Ok(out)) => RenderOutcome::Rendered(out),
            Ok(Err(err)) => {
                self.report_render_error(&err);
                RenderOutcome::Error(err.to_string())
            }
            Err(payload) => {
                let err = RenderError::Other(panic_message(payload.as_ref()));
                self.report_render_error(&err);
                RenderOutcome::Error(err.to_string())
            }
        }
    }

    fn report_render_error(&self, error: &(dyn std::error::Error + 'static)) {
        let mut context = Map::new();
        context.insert("phase".to_string(), Value::from("render"));
        self.config.error_reporting.report(error, &context);
    }

    pub fn track_event(&self, name: &str, properties: &Map<String, Value>) {
        self.config.analytics.track_event(name, properties);
    }

    /// Detach from the host. Later load results are ignored.
    pub fn unmount(&mut self) {
        if let Some(id) = self.observer.take() {
            self.platform.unobserve(id);
        }
        self.mounted = false;
    }
}

impl Drop for GrapherState {
    fn drop(&mut self) {
        self.unmount();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        return (*msg).to_string();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    "render panicked".to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::config::{DataApiConfig, ErrorReporter};
    use crate::data::{FileTransport, RetryPolicy};
    use crate::domain::{DatumValue, DimensionProperty, VariableDataMetadata, VariableMetadata, VariableMixedData};
    use crate::platform::MemoryPlatform;

    #[derive(Default)]
    struct RecordingReporter {
        messages: Mutex<Vec<String>>,
    }

    impl ErrorReporter for RecordingReporter {
        fn report(&self, error: &(dyn std::error::Error + 'static), _context: &Map<String, Value>) {
            self.messages.lock().push(error.to_string());
        }
    }

    fn variable(id: VariableId) -> Arc<VariableDataMetadata> {
        Arc::new(VariableDataMetadata {
            data: VariableMixedData {
                years: vec![2000, 2001],
                entities: vec![1, 1],
                values: vec![DatumValue::Number(1.0), DatumValue::Number(2.0)],
            },
            metadata: VariableMetadata {
                id: Some(id),
                name: Some(format!("Variable {id}")),
                ..Default::default()
            },
        })
    }

    fn data_map(ids: &[VariableId]) -> VariableDataMap {
        ids.iter().map(|&id| (id, variable(id))).collect::<BTreeMap<_, _>>()
    }

    fn setup(url: &str) -> (Arc<MemoryPlatform>, Arc<RecordingReporter>, GrapherState) {
        let platform = Arc::new(MemoryPlatform::new(url));
        let reporter = Arc::new(RecordingReporter::default());
        let config = ChartsConfig::new(DataApiConfig::new("https://api.example.com"))
            .with_error_reporter(reporter.clone());
        let state = GrapherState::new(
            config,
            platform.clone(),
            "chart",
            vec![
                ChartDimension::new(DimensionProperty::Y, 1),
                ChartDimension::new(DimensionProperty::X, 2),
            ],
        );
        (platform, reporter, state)
    }

    #[test]
    fn construction_migrates_and_writes_back_the_address() {
        let (platform, _, state) = setup("https://example.org/grapher/gdp?year=2015&country=USA+CAN#top");
        assert_eq!(
            platform.current_url(),
            "https://example.org/grapher/gdp?country=USA~CAN&time=2015#top"
        );
        assert_eq!(
            state.query_state().selected_entities,
            Some(vec!["USA".to_string(), "CAN".to_string()])
        );
    }

    #[test]
    fn query_param_updates_reach_the_platform() {
        let (platform, _, mut state) = setup("https://example.org/grapher/gdp?tab=chart");
        state.set_query_param("tab", Some("map".to_string()));
        assert_eq!(platform.current_url(), "https://example.org/grapher/gdp?tab=map");
        state.set_query_param("tab", None);
        assert_eq!(platform.current_url(), "https://example.org/grapher/gdp");
    }

    #[test]
    fn superseded_results_are_ignored() {
        let (_, _, mut state) = setup("");
        let stale = state.start_load();
        let current = state.start_load();
        assert_eq!(current.variable_ids, vec![1, 2]);

        assert!(!state.finish_load(stale, Ok(data_map(&[1]))));
        assert_eq!(state.load_state(), &LoadState::Loading);

        assert!(state.finish_load(current, Ok(data_map(&[1, 2]))));
        assert_eq!(state.load_state(), &LoadState::Loaded);
    }

    #[test]
    fn failed_load_is_reported_and_rendered_as_message() {
        let (_, reporter, mut state) = setup("");
        let ticket = state.start_load();
        state.finish_load(
            ticket,
            Err(FetchError::Status {
                url: "https://api.example.com/1.data.json".to_string(),
                status: 500,
            }),
        );

        assert!(matches!(state.load_state(), LoadState::Failed { .. }));
        assert_eq!(reporter.messages.lock().len(), 1);
        let outcome = state.render(|_, _| Ok(()));
        assert_eq!(outcome, RenderOutcome::Error(LOAD_FAILURE_MESSAGE.to_string()));
    }

    #[test]
    fn table_is_rebuilt_only_when_inputs_change() {
        let (_, _, mut state) = setup("");
        assert!(state.table().unwrap().is_none());

        let ticket = state.start_load();
        state.finish_load(ticket, Ok(data_map(&[1, 2])));

        let first = state.table().unwrap().unwrap();
        let second = state.table().unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(state.table_builds, 1);

        state.set_dimensions(vec![ChartDimension::new(DimensionProperty::Y, 1)]);
        assert_eq!(state.table().unwrap().unwrap().table.num_columns(), 1);
        assert_eq!(state.table_builds, 2);

        let ticket = state.start_load();
        state.finish_load(ticket, Ok(data_map(&[1])));
        state.table().unwrap();
        assert_eq!(state.table_builds, 3);
    }

    #[test]
    fn render_catches_errors_and_panics() {
        let (_, reporter, mut state) = setup("");
        assert_eq!(state.render(|_, _| Ok(())), RenderOutcome::Loading);

        let ticket = state.start_load();
        state.finish_load(ticket, Ok(data_map(&[1, 2])));

        let rows = state.render(|chart, _| Ok(chart.table.num_rows()));
        assert_eq!(rows, RenderOutcome::Rendered(2));

        let missing = state.render::<()>(|_, _| Err(RenderError::MissingColumn("99".to_string())));
        assert!(matches!(missing, RenderOutcome::Error(msg) if msg.contains("99")));

        let panicked = state.render::<()>(|_, _| panic!("axis exploded"));
        assert_eq!(panicked, RenderOutcome::Error("axis exploded".to_string()));
        assert_eq!(reporter.messages.lock().len(), 2);
    }

    #[test]
    fn table_errors_surface_through_render() {
        let (_, _, mut state) = setup("");
        let ticket = state.start_load();
        state.finish_load(ticket, Ok(data_map(&[1])));

        assert!(matches!(state.table(), Err(TableError::UnknownVariable { variable_id: 2, .. })));
        assert!(matches!(state.render(|_, _| Ok(())), RenderOutcome::Error(_)));
    }

    #[test]
    fn resize_and_unmount() {
        let (platform, _, mut state) = setup("");
        platform.resize("chart", Size::new(800.0, 600.0));
        assert_eq!(state.bounds(), Size::new(800.0, 600.0));

        let ticket = state.start_load();
        state.unmount();
        assert_eq!(platform.observer_count(), 0);
        assert!(!state.finish_load(ticket, Ok(data_map(&[1, 2]))));
        assert!(state.data().is_none());
    }

    #[test]
    fn load_goes_through_the_loader() {
        let dir = tempfile::tempdir().unwrap();
        for id in [1u64, 2] {
            let data = r#"{"years":[2000],"entities":[1],"values":[3]}"#;
            let metadata = format!(r#"{{"id":{id},"name":"Variable {id}"}}"#);
            std::fs::write(dir.path().join(format!("{id}.data.json")), data).unwrap();
            std::fs::write(dir.path().join(format!("{id}.metadata.json")), metadata).unwrap();
        }
        let api = DataApiConfig::new(dir.path().display().to_string());
        let loader =
            VariableLoader::new(Arc::new(FileTransport::new(dir.path())), api).with_retry(RetryPolicy::none());

        let (_, _, mut state) = setup("");
        assert_eq!(state.load(&loader, FetchOptions::default()), &LoadState::Loaded);
        let chart = state.table().unwrap().unwrap();
        assert_eq!(chart.table.num_rows(), 1);
        assert_eq!(chart.dimensions.len(), 2);
    }
}
