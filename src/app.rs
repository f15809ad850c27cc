//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the "real main" that:
//! - parses CLI arguments and installs logging
//! - resolves the data source (flags, or `ChartsConfig::from_env`)
//! - runs the requested workflow
//! - prints reports and writes optional exports

use clap::Parser;

use crate::cli::{Command, InspectArgs, MigrateArgs, SourceArgs, TableArgs};
use crate::data::FetchOptions;
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `grapher` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();
    crate::logging::init_tracing(cli.verbose);

    match cli.command {
        Command::Table(args) => handle_table(args),
        Command::Migrate(args) => handle_migrate(args),
        Command::Inspect(args) => handle_inspect(args),
    }
}

fn handle_table(args: TableArgs) -> Result<(), AppError> {
    let (config, loader) = pipeline::build_loader(&source_from_args(&args.source))?;
    let chart = pipeline::run_table(config, &loader, args.dims, fetch_options(&args.source))?;

    println!("{}", crate::report::format_table_summary(&chart.table, &chart.dimensions));
    println!("{}", crate::report::format_table_rows(&chart.table, args.limit));

    if let Some(path) = &args.export {
        crate::io::write_table_csv(path, &chart.table)?;
        tracing::info!(path = %path.display(), rows = chart.table.num_rows(), "exported table");
    }

    Ok(())
}

fn handle_migrate(args: MigrateArgs) -> Result<(), AppError> {
    let migration = pipeline::migrate(&args.input);

    if args.json {
        let json = serde_json::to_string_pretty(&migration.state)
            .map_err(|e| AppError::new(2, format!("Failed to serialize state: {e}")))?;
        println!("{json}");
    } else {
        print!(
            "{}",
            crate::report::format_migration(&migration.before, &migration.after, &migration.state)
        );
    }
    Ok(())
}

fn handle_inspect(args: InspectArgs) -> Result<(), AppError> {
    let (_, loader) = pipeline::build_loader(&source_from_args(&args.source))?;
    let (variable, display) = pipeline::inspect_variable(&loader, args.variable_id, fetch_options(&args.source))?;
    print!("{}", crate::report::format_variable(args.variable_id, &variable, &display));
    Ok(())
}

fn source_from_args(args: &SourceArgs) -> pipeline::Source {
    pipeline::Source {
        base_url: args.base_url.clone(),
        data_dir: args.data_dir.clone(),
    }
}

fn fetch_options(args: &SourceArgs) -> FetchOptions {
    FetchOptions {
        no_cache: args.no_cache,
    }
}
