//! Library configuration.
//!
//! `ChartsConfig` is passed explicitly to whatever needs it (fetch layer,
//! error reporting, analytics). Branding, error-reporting and analytics fields
//! that the caller leaves unset get defaults; the data API has none and must
//! be configured.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::domain::VariableId;
use crate::error::ConfigError;

pub const DEFAULT_LICENSE_TEXT: &str = "CC BY";
pub const DEFAULT_LICENSE_URL: &str = "https://creativecommons.org/licenses/by/4.0/";
pub const DEFAULT_POWERED_BY_TEXT: &str = "Powered by Build Canada Charts";

const ENV_DATA_API_URL: &str = "CHARTS_DATA_API_URL";
const ENV_LICENSE_TEXT: &str = "CHARTS_LICENSE_TEXT";
const ENV_LICENSE_URL: &str = "CHARTS_LICENSE_URL";
const ENV_POWERED_BY_TEXT: &str = "CHARTS_POWERED_BY_TEXT";
const ENV_POWERED_BY_URL: &str = "CHARTS_POWERED_BY_URL";
const ENV_SUPPORT_EMAIL: &str = "CHARTS_SUPPORT_EMAIL";
const ENV_ERROR_REPORTING: &str = "CHARTS_ERROR_REPORTING";
const ENV_ANALYTICS: &str = "CHARTS_ANALYTICS";

/// Builds the URL of one resource of a variable.
pub type RouteBuilder = Arc<dyn Fn(VariableId) -> String + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoConfig {
    pub svg: String,
    pub width: u32,
    pub height: u32,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branding {
    pub license_text: String,
    pub license_url: String,
    pub powered_by_text: String,
    pub powered_by_url: Option<String>,
    pub support_email: Option<String>,
    pub license_tooltip: Option<String>,
    pub logos: BTreeMap<String, LogoConfig>,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            license_text: DEFAULT_LICENSE_TEXT.to_string(),
            license_url: DEFAULT_LICENSE_URL.to_string(),
            powered_by_text: DEFAULT_POWERED_BY_TEXT.to_string(),
            powered_by_url: None,
            support_email: None,
            license_tooltip: None,
            logos: BTreeMap::new(),
        }
    }
}

/// User-supplied branding; unset fields keep the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrandingOverrides {
    pub license_text: Option<String>,
    pub license_url: Option<String>,
    pub powered_by_text: Option<String>,
    pub powered_by_url: Option<String>,
    pub support_email: Option<String>,
    pub license_tooltip: Option<String>,
    pub logos: Option<BTreeMap<String, LogoConfig>>,
}

impl BrandingOverrides {
    pub fn resolve(self) -> Branding {
        let defaults = Branding::default();
        Branding {
            license_text: self.license_text.unwrap_or(defaults.license_text),
            license_url: self.license_url.unwrap_or(defaults.license_url),
            powered_by_text: self.powered_by_text.unwrap_or(defaults.powered_by_text),
            powered_by_url: self.powered_by_url.or(defaults.powered_by_url),
            support_email: self.support_email.or(defaults.support_email),
            license_tooltip: self.license_tooltip.or(defaults.license_tooltip),
            logos: self.logos.unwrap_or(defaults.logos),
        }
    }
}

/// Where variable data and metadata live.
#[derive(Clone)]
pub struct DataApiConfig {
    /// Example: `https://api.example.com/v1/indicators/`.
    pub base_url: String,
    pub data_route: Option<RouteBuilder>,
    pub metadata_route: Option<RouteBuilder>,
}

impl DataApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            data_route: None,
            metadata_route: None,
        }
    }

    pub fn with_data_route(mut self, route: impl Fn(VariableId) -> String + Send + Sync + 'static) -> Self {
        self.data_route = Some(Arc::new(route));
        self
    }

    pub fn with_metadata_route(mut self, route: impl Fn(VariableId) -> String + Send + Sync + 'static) -> Self {
        self.metadata_route = Some(Arc::new(route));
        self
    }

    pub fn data_url(&self, variable_id: VariableId) -> String {
        match &self.data_route {
            Some(route) => route(variable_id),
            None => self.default_route(variable_id, "data"),
        }
    }

    pub fn metadata_url(&self, variable_id: VariableId) -> String {
        match &self.metadata_route {
            Some(route) => route(variable_id),
            None => self.default_route(variable_id, "metadata"),
        }
    }

    fn default_route(&self, variable_id: VariableId, resource: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        format!("{base}/{variable_id}.{resource}.json")
    }
}

impl fmt::Debug for DataApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataApiConfig")
            .field("base_url", &self.base_url)
            .field("data_route", &self.data_route.is_some())
            .field("metadata_route", &self.metadata_route.is_some())
            .finish()
    }
}

/// Receives errors the library surfaces to the host (load and render failures).
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &(dyn std::error::Error + 'static), context: &Map<String, Value>);
}

/// Receives analytics events.
pub trait EventTracker: Send + Sync {
    fn track_event(&self, name: &str, properties: &Map<String, Value>);
}

/// Reporter used when reporting is enabled without a handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn report(&self, error: &(dyn std::error::Error + 'static), context: &Map<String, Value>) {
        tracing::error!(context = %serde_json::Value::Object(context.clone()), "{error}");
    }
}

#[derive(Clone, Default)]
pub struct ErrorReporting {
    pub enabled: bool,
    pub handler: Option<Arc<dyn ErrorReporter>>,
}

impl ErrorReporting {
    pub fn report(&self, error: &(dyn std::error::Error + 'static), context: &Map<String, Value>) {
        if !self.enabled {
            return;
        }
        match &self.handler {
            Some(handler) => handler.report(error, context),
            None => TracingErrorReporter.report(error, context),
        }
    }
}

impl fmt::Debug for ErrorReporting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorReporting")
            .field("enabled", &self.enabled)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

#[derive(Clone, Default)]
pub struct Analytics {
    pub enabled: bool,
    pub tracker: Option<Arc<dyn EventTracker>>,
}

impl Analytics {
    pub fn track_event(&self, name: &str, properties: &Map<String, Value>) {
        if !self.enabled {
            return;
        }
        match &self.tracker {
            Some(tracker) => tracker.track_event(name, properties),
            None => tracing::debug!(event = name, "analytics enabled without a tracker; dropping event"),
        }
    }
}

impl fmt::Debug for Analytics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analytics")
            .field("enabled", &self.enabled)
            .field("tracker", &self.tracker.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ChartsConfig {
    pub branding: Branding,
    pub data_api: DataApiConfig,
    pub error_reporting: ErrorReporting,
    pub analytics: Analytics,
}

impl ChartsConfig {
    /// Defaults everywhere except the (required) data API.
    pub fn new(data_api: DataApiConfig) -> Self {
        Self {
            branding: Branding::default(),
            data_api,
            error_reporting: ErrorReporting::default(),
            analytics: Analytics::default(),
        }
    }

    pub fn with_branding(mut self, overrides: BrandingOverrides) -> Self {
        self.branding = overrides.resolve();
        self
    }

    pub fn with_error_reporter(mut self, handler: Arc<dyn ErrorReporter>) -> Self {
        self.error_reporting = ErrorReporting {
            enabled: true,
            handler: Some(handler),
        };
        self
    }

    pub fn with_event_tracker(mut self, tracker: Arc<dyn EventTracker>) -> Self {
        self.analytics = Analytics {
            enabled: true,
            tracker: Some(tracker),
        };
        self
    }

    /// Load from the process environment (and `.env`, if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` uses the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let base_url = get(ENV_DATA_API_URL).ok_or(ConfigError::MissingDataApi)?;

        let branding = BrandingOverrides {
            license_text: get(ENV_LICENSE_TEXT),
            license_url: get(ENV_LICENSE_URL),
            powered_by_text: get(ENV_POWERED_BY_TEXT),
            powered_by_url: get(ENV_POWERED_BY_URL),
            support_email: get(ENV_SUPPORT_EMAIL),
            ..Default::default()
        };

        let error_reporting = match get(ENV_ERROR_REPORTING) {
            Some(raw) => parse_flag(ENV_ERROR_REPORTING, &raw)?,
            None => false,
        };
        let analytics = match get(ENV_ANALYTICS) {
            Some(raw) => parse_flag(ENV_ANALYTICS, &raw)?,
            None => false,
        };

        let mut config = ChartsConfig::new(DataApiConfig::new(base_url)).with_branding(branding);
        config.error_reporting.enabled = error_reporting;
        config.analytics.enabled = analytics;
        Ok(config)
    }
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
        }),
    }
}
