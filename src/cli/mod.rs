//! Command-line parsing for the `grapher` binary.
//!
//! Argument parsing and command dispatch stay separate from the table, URL
//! and fetch code; `app` wires the two together.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{ChartDimension, DimensionProperty, Time, VariableId};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "grapher", version, about = "Load chart variables, build tables, migrate chart URLs")]
pub struct Cli {
    /// Debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load the variables of some dimensions and print the joined table.
    Table(TableArgs),
    /// Bring a legacy chart URL (or query string) up to date.
    Migrate(MigrateArgs),
    /// Print a variable's metadata and effective display settings.
    Inspect(InspectArgs),
}

/// Where variables are loaded from.
///
/// Without either flag the data API comes from the environment
/// (`CHARTS_DATA_API_URL`, `.env` supported).
#[derive(Debug, Args, Clone, Default)]
pub struct SourceArgs {
    /// Base URL of the variable data API.
    #[arg(long, value_name = "URL", conflicts_with = "data_dir")]
    pub base_url: Option<String>,

    /// Directory holding `{id}.data.json` / `{id}.metadata.json` files.
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Bypass the in-memory cache and ask the server for fresh copies.
    #[arg(long)]
    pub no_cache: bool,
}

#[derive(Debug, Args, Clone)]
pub struct TableArgs {
    /// Chart dimension as `property=variableId[@targetYear]`, e.g. `y=123` or
    /// `x=456@2000`. Repeatable.
    #[arg(long = "dim", value_name = "DIM", required = true, value_parser = parse_dimension)]
    pub dims: Vec<ChartDimension>,

    #[command(flatten)]
    pub source: SourceArgs,

    /// Export the table to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Number of rows to print.
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

#[derive(Debug, Args, Clone)]
pub struct MigrateArgs {
    /// A full URL or a bare query string such as `year=2015&country=USA+FRA`.
    pub input: String,

    /// Print the recognized state as JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args, Clone)]
pub struct InspectArgs {
    pub variable_id: VariableId,

    #[command(flatten)]
    pub source: SourceArgs,
}

/// Parse `property=variableId[@targetYear]`.
pub fn parse_dimension(raw: &str) -> Result<ChartDimension, String> {
    let (property, rest) = raw
        .split_once('=')
        .ok_or_else(|| format!("Invalid dimension '{raw}'. Expected property=variableId[@targetYear]."))?;
    let property: DimensionProperty = property.parse()?;

    let (id, target_year) = match rest.split_once('@') {
        Some((id, year)) => {
            let year = year
                .trim()
                .parse::<Time>()
                .map_err(|e| format!("Invalid target year '{year}': {e}"))?;
            (id, Some(year))
        }
        None => (rest, None),
    };
    let variable_id = id
        .trim()
        .parse::<VariableId>()
        .map_err(|e| format!("Invalid variable id '{id}': {e}"))?;
    if variable_id == 0 {
        return Err("Variable ids are positive integers.".to_string());
    }

    let dim = ChartDimension::new(property, variable_id);
    Ok(match target_year {
        Some(year) => dim.with_target_year(year),
        None => dim,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dimensions() {
        let dim = parse_dimension("y=123").unwrap();
        assert_eq!(dim, ChartDimension::new(DimensionProperty::Y, 123));

        let dim = parse_dimension("X=456@2000").unwrap();
        assert_eq!(dim, ChartDimension::new(DimensionProperty::X, 456).with_target_year(2000));

        assert!(parse_dimension("y123").is_err());
        assert!(parse_dimension("width=1").is_err());
        assert!(parse_dimension("y=abc").is_err());
        assert!(parse_dimension("y=0").is_err());
        assert!(parse_dimension("y=1@soon").is_err());
    }

    #[test]
    fn table_command_parses() {
        let cli = Cli::try_parse_from([
            "grapher",
            "-v",
            "table",
            "--dim",
            "y=1",
            "--dim",
            "x=2@1990",
            "--data-dir",
            "fixtures",
            "--limit",
            "5",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Command::Table(args) = cli.command else {
            panic!("expected table command");
        };
        assert_eq!(args.dims.len(), 2);
        assert_eq!(args.source.data_dir, Some(PathBuf::from("fixtures")));
        assert_eq!(args.limit, 5);
    }

    #[test]
    fn source_flags_conflict() {
        let res = Cli::try_parse_from([
            "grapher",
            "inspect",
            "7",
            "--base-url",
            "https://api.example.com",
            "--data-dir",
            "fixtures",
        ]);
        assert!(res.is_err());
    }
}
