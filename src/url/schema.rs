//! Recognized query-parameter keys and their typed view.

use serde::Serialize;

use crate::domain::Time;
use crate::url::QueryParams;

pub const KEY_COUNTRY: &str = "country";
pub const KEY_TIME: &str = "time";
pub const KEY_TAB: &str = "tab";
pub const KEY_X_SCALE: &str = "xScale";
pub const KEY_Y_SCALE: &str = "yScale";
pub const KEY_COLOR_SCHEME: &str = "colorScheme";
pub const KEY_COLOR_SCHEME_INVERT: &str = "colorSchemeInvert";
/// Custom bin thresholds, ascending and `~`-delimited.
pub const KEY_COLOR_SCALE_BINS: &str = "colorScaleBins";
/// Legacy spelling of `time`.
pub const KEY_YEAR: &str = "year";

/// Delimiter of the current entity list format.
pub const ENTITY_DELIMITER: char = '~';

const TIME_RANGE_DELIMITER: &str = "..";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimeBound {
    Earliest,
    Latest,
    Year(Time),
}

impl TimeBound {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "earliest" => Some(TimeBound::Earliest),
            "latest" => Some(TimeBound::Latest),
            other => other.parse::<Time>().ok().map(TimeBound::Year),
        }
    }

    fn as_param(self) -> String {
        match self {
            TimeBound::Earliest => "earliest".to_string(),
            TimeBound::Latest => "latest".to_string(),
            TimeBound::Year(y) => y.to_string(),
        }
    }
}

/// `time=start..end`; an omitted end is open (`None`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub start: Option<TimeBound>,
    pub end: Option<TimeBound>,
}

impl TimeRange {
    /// Parse `2000..2010`, `..2010`, `2000..`, `earliest..latest`, or a single
    /// value, which pins both ends. Malformed input yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match raw.split_once(TIME_RANGE_DELIMITER) {
            Some((start, end)) => {
                let start = parse_open_bound(start)?;
                let end = parse_open_bound(end)?;
                if start.is_none() && end.is_none() {
                    return None;
                }
                Some(TimeRange { start, end })
            }
            None => {
                let bound = TimeBound::parse(raw)?;
                Some(TimeRange {
                    start: Some(bound),
                    end: Some(bound),
                })
            }
        }
    }

    pub fn as_param(&self) -> String {
        if self.start.is_some() && self.start == self.end {
            return self.start.map(TimeBound::as_param).unwrap_or_default();
        }
        format!(
            "{}{TIME_RANGE_DELIMITER}{}",
            self.start.map(TimeBound::as_param).unwrap_or_default(),
            self.end.map(TimeBound::as_param).unwrap_or_default()
        )
    }
}

/// `Some(None)` for an empty side, `None` for garbage.
fn parse_open_bound(raw: &str) -> Option<Option<TimeBound>> {
    if raw.trim().is_empty() {
        return Some(None);
    }
    TimeBound::parse(raw).map(Some)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GrapherTab {
    Chart,
    Map,
    Table,
    Line,
    Slope,
    DiscreteBar,
    Marimekko,
    StackedArea,
    StackedBar,
    Scatter,
}

impl GrapherTab {
    pub const ALL: [GrapherTab; 10] = [
        GrapherTab::Chart,
        GrapherTab::Map,
        GrapherTab::Table,
        GrapherTab::Line,
        GrapherTab::Slope,
        GrapherTab::DiscreteBar,
        GrapherTab::Marimekko,
        GrapherTab::StackedArea,
        GrapherTab::StackedBar,
        GrapherTab::Scatter,
    ];

    pub fn as_param(self) -> &'static str {
        match self {
            GrapherTab::Chart => "chart",
            GrapherTab::Map => "map",
            GrapherTab::Table => "table",
            GrapherTab::Line => "line",
            GrapherTab::Slope => "slope",
            GrapherTab::DiscreteBar => "discrete-bar",
            GrapherTab::Marimekko => "marimekko",
            GrapherTab::StackedArea => "stacked-area",
            GrapherTab::StackedBar => "stacked-bar",
            GrapherTab::Scatter => "scatter",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        GrapherTab::ALL.into_iter().find(|t| t.as_param() == raw.trim())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleType {
    Linear,
    Log,
}

impl ScaleType {
    pub fn as_param(self) -> &'static str {
        match self {
            ScaleType::Linear => "linear",
            ScaleType::Log => "log",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "linear" => Some(ScaleType::Linear),
            "log" => Some(ScaleType::Log),
            _ => None,
        }
    }
}

/// Colour-scale overrides carried in the URL. Binning itself is up to the
/// renderer; these are only the user's choices.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ColorScaleOverrides {
    pub scheme: Option<String>,
    pub invert: Option<bool>,
    pub bins: Option<Vec<f64>>,
}

impl ColorScaleOverrides {
    fn from_params(params: &QueryParams) -> Self {
        Self {
            scheme: params
                .get(KEY_COLOR_SCHEME)
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            invert: params.get(KEY_COLOR_SCHEME_INVERT).and_then(parse_flag),
            bins: params.get(KEY_COLOR_SCALE_BINS).and_then(parse_bins),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.scheme.is_none() && self.invert.is_none() && self.bins.is_none()
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Finite and strictly ascending, or nothing.
fn parse_bins(raw: &str) -> Option<Vec<f64>> {
    let bins = raw
        .split(ENTITY_DELIMITER)
        .map(|b| b.trim().parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect::<Option<Vec<_>>>()?;
    let ascending = bins.windows(2).all(|pair| pair[0] < pair[1]);
    (!bins.is_empty() && ascending).then_some(bins)
}

fn bins_as_param(bins: &[f64]) -> String {
    bins.iter()
        .map(f64::to_string)
        .collect::<Vec<_>>()
        .join(ENTITY_DELIMITER.to_string().as_str())
}

/// Typed view of the recognized keys. Unknown keys are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GrapherQueryState {
    /// `None` when `country` is absent; an empty list when it is empty.
    pub selected_entities: Option<Vec<String>>,
    pub time: Option<TimeRange>,
    pub tab: Option<GrapherTab>,
    pub x_scale: Option<ScaleType>,
    pub y_scale: Option<ScaleType>,
    pub color_scale: ColorScaleOverrides,
}

impl GrapherQueryState {
    /// Read the recognized keys; malformed values are ignored.
    pub fn from_params(params: &QueryParams) -> Self {
        Self {
            selected_entities: params.get(KEY_COUNTRY).map(parse_entity_list),
            time: params.get(KEY_TIME).and_then(TimeRange::parse),
            tab: params.get(KEY_TAB).and_then(GrapherTab::parse),
            x_scale: params.get(KEY_X_SCALE).and_then(ScaleType::parse),
            y_scale: params.get(KEY_Y_SCALE).and_then(ScaleType::parse),
            color_scale: ColorScaleOverrides::from_params(params),
        }
    }

    /// Write the recognized keys back; `None` fields leave the params untouched.
    pub fn apply_to(&self, params: QueryParams) -> QueryParams {
        let delimiter = ENTITY_DELIMITER.to_string();
        params.update([
            (
                KEY_COUNTRY,
                self.selected_entities.as_ref().map(|names| names.join(delimiter.as_str())),
            ),
            (KEY_TIME, self.time.map(|t| t.as_param())),
            (KEY_TAB, self.tab.map(|t| t.as_param().to_string())),
            (KEY_X_SCALE, self.x_scale.map(|s| s.as_param().to_string())),
            (KEY_Y_SCALE, self.y_scale.map(|s| s.as_param().to_string())),
            (KEY_COLOR_SCHEME, self.color_scale.scheme.clone()),
            (KEY_COLOR_SCHEME_INVERT, self.color_scale.invert.map(|b| b.to_string())),
            (KEY_COLOR_SCALE_BINS, self.color_scale.bins.as_deref().map(bins_as_param)),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_some()))
    }
}

fn parse_entity_list(raw: &str) -> Vec<String> {
    raw.split(ENTITY_DELIMITER)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_time_ranges() {
        assert_eq!(
            TimeRange::parse("2000..2010"),
            Some(TimeRange {
                start: Some(TimeBound::Year(2000)),
                end: Some(TimeBound::Year(2010))
            })
        );
        assert_eq!(
            TimeRange::parse("..latest"),
            Some(TimeRange {
                start: None,
                end: Some(TimeBound::Latest)
            })
        );
        assert_eq!(
            TimeRange::parse("-500"),
            Some(TimeRange {
                start: Some(TimeBound::Year(-500)),
                end: Some(TimeBound::Year(-500))
            })
        );
        assert_eq!(TimeRange::parse(".."), None);
        assert_eq!(TimeRange::parse("soon..later"), None);
        assert_eq!(TimeRange::parse("2000..2010").unwrap().as_param(), "2000..2010");
        assert_eq!(TimeRange::parse("2015").unwrap().as_param(), "2015");
        assert_eq!(TimeRange::parse("earliest..").unwrap().as_param(), "earliest..");
    }

    #[test]
    fn reads_recognized_keys_and_ignores_garbage() {
        let params = QueryParams::from_query_str("country=CAN~United%20States&time=2000..2010&tab=map&xScale=log&yScale=cubic");
        let state = GrapherQueryState::from_params(&params);

        assert_eq!(
            state.selected_entities,
            Some(vec!["CAN".to_string(), "United States".to_string()])
        );
        assert_eq!(state.tab, Some(GrapherTab::Map));
        assert_eq!(state.x_scale, Some(ScaleType::Log));
        assert_eq!(state.y_scale, None);
        assert!(state.time.is_some());
    }

    #[test]
    fn apply_to_keeps_unknown_keys() {
        let params = QueryParams::from_query_str("stackMode=relative&tab=chart");
        let state = GrapherQueryState {
            selected_entities: Some(vec!["CAN".to_string(), "MEX".to_string()]),
            tab: Some(GrapherTab::Table),
            ..Default::default()
        };

        let out = state.apply_to(params);
        assert_eq!(out.get("stackMode"), Some("relative"));
        assert_eq!(out.get("tab"), Some("table"));
        assert_eq!(out.get("country"), Some("CAN~MEX"));
        assert!(!out.contains("time"));
    }

    #[test]
    fn color_scale_overrides_round_trip() {
        let params = QueryParams::from_query_str(
            "colorScheme=BuGn&colorSchemeInvert=1&colorScaleBins=0~2.5~10&stackMode=absolute",
        );
        let state = GrapherQueryState::from_params(&params);
        assert_eq!(state.color_scale.scheme.as_deref(), Some("BuGn"));
        assert_eq!(state.color_scale.invert, Some(true));
        assert_eq!(state.color_scale.bins, Some(vec![0.0, 2.5, 10.0]));

        let out = state.apply_to(QueryParams::from_query_str("stackMode=absolute"));
        assert_eq!(out.get("colorScheme"), Some("BuGn"));
        assert_eq!(out.get("colorSchemeInvert"), Some("true"));
        assert_eq!(out.get("colorScaleBins"), Some("0~2.5~10"));
        assert_eq!(out.get("stackMode"), Some("absolute"));
        assert_eq!(GrapherQueryState::from_params(&out), state);
    }

    #[test]
    fn malformed_color_scale_values_are_ignored() {
        let params = QueryParams::from_query_str("colorScheme=&colorSchemeInvert=maybe&colorScaleBins=10~5");
        let state = GrapherQueryState::from_params(&params);
        assert!(state.color_scale.is_empty());

        for bins in ["1~NaN", "1~~2", "inf", "3~3"] {
            let params = QueryParams::from_query_str(&format!("colorScaleBins={bins}"));
            assert_eq!(GrapherQueryState::from_params(&params).color_scale.bins, None, "{bins}");
        }
    }
}
