pub mod aggregate;
pub mod cli;
pub mod data;
pub mod dates;
pub mod error;
pub mod headers;
pub mod io_utils;
pub mod manifest;
pub mod mapping;
pub mod numeric;
pub mod pipeline;
pub mod process;
pub mod qc;
pub mod report;
pub mod table;
pub mod verify;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use crate::cli::{Cli, Commands};

pub use crate::{
    aggregate::{KpiSet, compute_dashboard_kpis, compute_top_products, compute_top_regions, compute_weekly},
    data::{CleanedRow, CleanedTable, RawTable, REQUIRED_COLUMNS},
    error::{ConfigError, QcError},
    mapping::ColumnMapping,
    numeric::NumberLocale,
    pipeline::{CleanOptions, CleanOutcome, CleanStatus, clean},
    qc::QcReport,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging(quiet: bool) {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            let level = if quiet {
                LevelFilter::Warn
            } else {
                LevelFilter::Info
            };
            builder.filter_module("spreadsheet_rescue", level);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

/// How a command ended; soft data problems still count as success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Success,
    /// Schema failure, empty or unreadable input, or bad configuration.
    Failure,
}

impl CommandStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            CommandStatus::Success => 0,
            CommandStatus::Failure => 2,
        }
    }
}

pub fn run() -> Result<CommandStatus> {
    let cli = Cli::parse();
    init_logging(cli.command.quiet());
    match cli.command {
        Commands::Run(args) => process::execute(&args),
        Commands::Validate(args) => verify::execute(&args),
    }
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}
