//! Value and time formatting driven by `EffectiveDisplay`.

use chrono::{Duration, NaiveDate};

use crate::dimension::{EffectiveDisplay, MAX_DECIMAL_PLACES, MAX_SIGNIFICANT_FIGURES};
use crate::domain::{RoundingMode, Time};
use crate::table::CellValue;

/// Units written without a separating space; `$`-like ones go in front.
const PREFIX_UNITS: [&str; 3] = ["$", "£", "€"];
const SUFFIX_UNITS: [&str; 2] = ["%", "pp"];

/// Format a number per the display's rounding mode, plus its short unit.
pub fn format_value(value: f64, display: &EffectiveDisplay) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let number = match display.rounding_mode {
        RoundingMode::DecimalPlaces => {
            let places = display
                .num_decimal_places
                .unwrap_or_else(|| auto_decimal_places(value))
                .min(MAX_DECIMAL_PLACES);
            format!("{value:.places$}", places = places as usize)
        }
        RoundingMode::SignificantFigures => format_significant(value, display.num_significant_figures),
    };
    with_unit(number, display.short_unit.as_deref())
}

/// Format a table cell; missing data is an empty string.
pub fn format_cell(cell: &CellValue, display: &EffectiveDisplay) -> String {
    match cell {
        CellValue::Number(v) => format_value(*v, display),
        CellValue::Text(s) => s.clone(),
        CellValue::NoData => String::new(),
    }
}

/// Years as years (negative ones as BCE), or as ISO dates when the column
/// counts days from `zero_day`.
pub fn format_time(time: Time, display: &EffectiveDisplay) -> String {
    if display.year_is_day {
        return day_to_date(display.zero_day, time)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| time.to_string());
    }
    if time < 0 {
        format!("{} BCE", time.unsigned_abs())
    } else {
        time.to_string()
    }
}

pub fn day_to_date(zero_day: NaiveDate, days: Time) -> Option<NaiveDate> {
    zero_day.checked_add_signed(Duration::days(i64::from(days)))
}

fn auto_decimal_places(value: f64) -> u32 {
    let magnitude = value.abs();
    if magnitude >= 100.0 || magnitude == 0.0 {
        0
    } else if magnitude >= 10.0 {
        1
    } else {
        2
    }
}

/// Round to `figures` significant digits. Values whose fixed-point form
/// would need more than `MAX_DECIMAL_PLACES` decimals stay in scientific
/// notation.
fn format_significant(value: f64, figures: u32) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    let digits = (figures.clamp(1, MAX_SIGNIFICANT_FIGURES) - 1) as usize;
    // `{:e}` rounds and normalizes (9.99 → 1.00e1), so the exponent is final.
    let scientific = format!("{value:.digits$e}");
    let Some(exponent) = scientific.split_once('e').and_then(|(_, e)| e.parse::<i64>().ok()) else {
        return scientific;
    };
    let places = digits as i64 - exponent;
    if places > i64::from(MAX_DECIMAL_PLACES) {
        return scientific;
    }
    let rounded = scientific.parse::<f64>().unwrap_or(value);
    format!("{rounded:.places$}", places = places.max(0) as usize)
}

fn with_unit(number: String, short_unit: Option<&str>) -> String {
    let Some(unit) = short_unit.map(str::trim).filter(|u| !u.is_empty()) else {
        return number;
    };
    if PREFIX_UNITS.contains(&unit) {
        match number.strip_prefix('-') {
            Some(abs) => format!("-{unit}{abs}"),
            None => format!("{unit}{number}"),
        }
    } else if SUFFIX_UNITS.contains(&unit) {
        format!("{number}{unit}")
    } else {
        format!("{number} {unit}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn display() -> EffectiveDisplay {
        EffectiveDisplay::default()
    }

    #[test]
    fn decimal_places_and_magnitude_heuristic() {
        let mut d = display();
        assert_eq!(format_value(1234.567, &d), "1235");
        assert_eq!(format_value(12.345, &d), "12.3");
        assert_eq!(format_value(0.12345, &d), "0.12");

        d.num_decimal_places = Some(3);
        assert_eq!(format_value(1234.5, &d), "1234.500");
    }

    #[test]
    fn significant_figures() {
        let mut d = display();
        d.rounding_mode = RoundingMode::SignificantFigures;
        assert_eq!(format_value(123456.0, &d), "123000");
        assert_eq!(format_value(0.0012345, &d), "0.00123");
        assert_eq!(format_value(-4.5678, &d), "-4.57");
    }

    #[test]
    fn extreme_rounding_settings_stay_bounded() {
        let mut d = display();
        d.rounding_mode = RoundingMode::SignificantFigures;
        d.num_significant_figures = u32::MAX;
        let wide = format_value(0.05, &d);
        assert!(wide.starts_with("0.0500000000000000"), "{wide}");
        assert_eq!(wide.len(), "0.".len() + 18);

        d.num_significant_figures = 3;
        assert_eq!(format_value(5e-324, &d), "4.94e-324");
        assert_eq!(format_value(9.996, &d), "10.0");

        let mut d = display();
        d.num_decimal_places = Some(u32::MAX);
        assert_eq!(format_value(1.5, &d).len(), "1.".len() + MAX_DECIMAL_PLACES as usize);
    }

    #[test]
    fn short_units() {
        let mut d = display();
        d.num_decimal_places = Some(1);
        d.short_unit = Some("%".to_string());
        assert_eq!(format_value(12.34, &d), "12.3%");
        d.short_unit = Some("$".to_string());
        assert_eq!(format_value(-5.0, &d), "-$5.0");
        d.short_unit = Some("t".to_string());
        assert_eq!(format_value(5.0, &d), "5.0 t");
    }

    #[test]
    fn times_as_years_or_days() {
        let mut d = display();
        assert_eq!(format_time(2015, &d), "2015");
        assert_eq!(format_time(-500, &d), "500 BCE");

        d.year_is_day = true;
        assert_eq!(format_time(0, &d), "2020-01-21");
        assert_eq!(format_time(11, &d), "2020-02-01");
    }

    #[test]
    fn missing_cells_are_blank() {
        assert_eq!(format_cell(&CellValue::NoData, &display()), "");
        assert_eq!(format_cell(&CellValue::Text("high".to_string()), &display()), "high");
    }
}
