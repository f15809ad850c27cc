//! `grapher-data` library crate.
//!
//! The data side of an embeddable chart: variables are fetched from a data
//! API, joined into a columnar table according to the chart's dimensions, and
//! the chart's URL state is kept current through a chain of migrations.
//!
//! The binary (`grapher`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - hosts can embed `GrapherState` with their own `Platform`

pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod dimension;
pub mod domain;
pub mod error;
pub mod grapher;
pub mod io;
pub mod logging;
pub mod platform;
pub mod report;
pub mod table;
pub mod url;
