use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::numeric::NumberLocale;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Clean messy sales spreadsheets into client-ready reports",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Clean a spreadsheet and write the report, QC report and run manifest
    Run(RunArgs),
    /// Check a spreadsheet and write only the QC report and run manifest
    Validate(ValidateArgs),
}

impl Commands {
    pub fn quiet(&self) -> bool {
        match self {
            Commands::Run(args) => args.input.quiet,
            Commands::Validate(args) => args.input.quiet,
        }
    }
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Number of rows kept in the Top_Products and Top_Regions sheets
    #[arg(long = "top", default_value_t = crate::aggregate::DEFAULT_TOP_N)]
    pub top: usize,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub input: InputArgs,
}

/// Options shared by every command that loads and cleans an input file.
#[derive(Debug, Args)]
pub struct InputArgs {
    /// Input file (.csv, .tsv, .txt, .xlsx, .xlsm, .xls or .ods)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Directory receiving the report, qc_report.json and run_manifest.json
    #[arg(short = 'o', long = "out-dir", default_value = "output")]
    pub out_dir: PathBuf,
    /// Column mapping as target=source, e.g. --map revenue=Sales (repeatable)
    #[arg(short = 'm', long = "map", action = clap::ArgAction::Append)]
    pub map: Vec<String>,
    /// Profile file with one target=source mapping per line
    #[arg(long)]
    pub profile: Option<PathBuf>,
    /// Read ambiguous dates such as 01/02/2024 as day/month
    #[arg(long, conflicts_with = "monthfirst")]
    pub dayfirst: bool,
    /// Read ambiguous dates as month/day (default)
    #[arg(long)]
    pub monthfirst: bool,
    /// Decimal and grouping convention for numeric columns
    #[arg(long = "number-locale", value_enum, default_value_t = NumberLocale::Auto)]
    pub number_locale: NumberLocale,
    /// CSV delimiter character (supports ',', 'tab', ';', '|'); sniffed when omitted
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of text input (defaults to utf-8 with a windows-1252 fallback)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Suppress informational output; artifacts are still written
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" | "\\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
