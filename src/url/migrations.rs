//! Rewrites of legacy query-parameter shapes into the current schema.
//!
//! Each migration handles one historical change and is a pure function. The
//! chain runs in a fixed order and each step sees the output of the previous
//! one. Every migration's precondition excludes already-migrated input, so the
//! chain is idempotent.

use crate::url::QueryParams;
use crate::url::schema::{ENTITY_DELIMITER, KEY_COUNTRY, KEY_TIME, KEY_YEAR};

pub type UrlMigration = fn(QueryParams) -> QueryParams;

/// Delimiter of the legacy entity list format.
pub const LEGACY_ENTITY_DELIMITER: char = '+';

/// The grapher migrations, in application order.
pub const GRAPHER_URL_MIGRATIONS: [UrlMigration; 2] = [migrate_year_to_time, migrate_selected_entity_names];

/// `year=X` → `time=X`. An existing `time` wins and `year` is dropped.
pub fn migrate_year_to_time(params: QueryParams) -> QueryParams {
    let Some(year) = params.get(KEY_YEAR).filter(|y| !y.is_empty()).map(str::to_string) else {
        return params;
    };
    let time = params.get(KEY_TIME).map(str::to_string).unwrap_or(year);
    params.update([(KEY_YEAR, None), (KEY_TIME, Some(time))])
}

/// `country=A+B` → `country=A~B`.
///
/// Only values that contain the legacy delimiter and none of the current one
/// are rewritten. Entity tokens are kept verbatim; empty segments are dropped.
/// Country codes are not resolved to entity names here, since that needs the
/// entity list of a loaded table (see `Table::entities`).
pub fn migrate_selected_entity_names(params: QueryParams) -> QueryParams {
    let Some(country) = params.get(KEY_COUNTRY) else {
        return params;
    };
    if !country.contains(LEGACY_ENTITY_DELIMITER) || country.contains(ENTITY_DELIMITER) {
        return params;
    }
    let delimiter = ENTITY_DELIMITER.to_string();
    let migrated = country
        .split(LEGACY_ENTITY_DELIMITER)
        .filter(|name| !name.is_empty())
        .collect::<Vec<_>>()
        .join(delimiter.as_str());
    params.update([(KEY_COUNTRY, Some(migrated))])
}

/// Run `migrations` in order.
pub fn perform_url_migrations(migrations: &[UrlMigration], params: QueryParams) -> QueryParams {
    migrations.iter().fold(params, |params, migrate| migrate(params))
}

pub fn legacy_to_current_params(params: QueryParams) -> QueryParams {
    perform_url_migrations(&GRAPHER_URL_MIGRATIONS, params)
}

/// Parse a query string and bring it up to date.
pub fn legacy_to_current_query_params(query: &str) -> QueryParams {
    legacy_to_current_params(QueryParams::from_query_str(query))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        pairs.iter().copied().collect()
    }

    #[test]
    fn year_becomes_time() {
        assert_eq!(
            legacy_to_current_params(params(&[("year", "2015")])),
            params(&[("time", "2015")])
        );
    }

    #[test]
    fn existing_time_wins_over_year() {
        assert_eq!(
            legacy_to_current_params(params(&[("year", "2015"), ("time", "2010")])),
            params(&[("time", "2010")])
        );
    }

    #[test]
    fn empty_year_is_passed_through() {
        let input = params(&[("year", "")]);
        assert_eq!(legacy_to_current_params(input.clone()), input);
    }

    #[test]
    fn legacy_entity_list_is_rewritten() {
        assert_eq!(
            legacy_to_current_query_params("country=USA+United%20Kingdom+FRA"),
            params(&[("country", "USA~United Kingdom~FRA")])
        );
        assert_eq!(
            legacy_to_current_query_params("country=CAN+"),
            params(&[("country", "CAN")])
        );
    }

    #[test]
    fn legacy_codes_stay_codes() {
        let out = legacy_to_current_query_params("country=CAN+MEX+United%20States");
        assert_eq!(out.get("country"), Some("CAN~MEX~United States"));

        let state = crate::url::GrapherQueryState::from_params(&out);
        assert_eq!(
            state.selected_entities,
            Some(vec!["CAN".to_string(), "MEX".to_string(), "United States".to_string()])
        );
    }

    #[test]
    fn current_entity_list_is_untouched() {
        let input = params(&[("country", "USA~GBR"), ("tab", "map")]);
        assert_eq!(legacy_to_current_params(input.clone()), input);

        let single = params(&[("country", "Canada")]);
        assert_eq!(legacy_to_current_params(single.clone()), single);
    }

    #[test]
    fn migrations_compose_in_order() {
        let out = legacy_to_current_query_params("?year=2000&country=USA+CAN&stackMode=relative");
        assert_eq!(
            out,
            params(&[("time", "2000"), ("country", "USA~CAN"), ("stackMode", "relative")])
        );
    }

    fn arb_params() -> impl Strategy<Value = QueryParams> {
        let key = prop_oneof![
            Just("year".to_string()),
            Just("time".to_string()),
            Just("country".to_string()),
            Just("tab".to_string()),
            "[a-z]{1,6}",
        ];
        let value = prop_oneof!["[A-Za-z0-9 +~.]{0,12}", "[0-9]{4}", "[A-Z]{3}(\\+[A-Z]{3}){0,3}"];
        proptest::collection::btree_map(key, value, 0..6).prop_map(|m| m.into_iter().collect())
    }

    proptest! {
        #[test]
        fn migration_is_idempotent(input in arb_params()) {
            let once = legacy_to_current_params(input);
            let twice = legacy_to_current_params(once.clone());
            prop_assert_eq!(twice, once);
        }
    }
}
