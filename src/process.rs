//! The `run` command and the load/map/clean stages it shares with `validate`.

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::{
    CommandStatus,
    aggregate::{
        compute_dashboard_kpis, compute_top_products, compute_top_regions, compute_weekly,
    },
    cli::{InputArgs, RunArgs},
    data::REQUIRED_COLUMNS,
    io_utils,
    manifest::{ErrorCode, RunManifest, utc_now_rfc3339},
    mapping::ColumnMapping,
    pipeline::{CleanOptions, CleanOutcome, CleanStatus, clean},
    qc::QcReport,
    report::{ReportInputs, write_report},
};

/// A run that got as far as a clean pass with a trustworthy schema.
pub(crate) struct CleanedRun {
    pub outcome: CleanOutcome,
    pub manifest: RunManifest,
    pub out_dir: PathBuf,
}

pub(crate) enum Prepared {
    Ready(CleanedRun),
    /// Loading or cleaning failed; artifacts are written and the error reported.
    Finished(CommandStatus),
}

pub fn execute(args: &RunArgs) -> Result<CommandStatus> {
    let run = match prepare(&args.input, true)? {
        Prepared::Ready(run) => run,
        Prepared::Finished(status) => return Ok(status),
    };
    let CleanedRun {
        outcome,
        manifest,
        out_dir,
    } = run;

    info!("Computing KPIs");
    let kpis = compute_dashboard_kpis(&outcome.table);
    let weekly = compute_weekly(&outcome.table);
    let top_products = compute_top_products(&outcome.table, args.top);
    let top_regions = compute_top_regions(&outcome.table, args.top);

    let report_path = write_report(
        &out_dir,
        &ReportInputs {
            table: &outcome.table,
            kpis: &kpis,
            weekly: &weekly,
            top_products: &top_products,
            top_regions: &top_regions,
            qc: &outcome.report,
        },
    )?;
    info!("Report -> {}", report_path.display());

    let manifest_path = manifest.succeeded(&outcome.report).save(&out_dir)?;
    info!("Manifest -> {}", manifest_path.display());
    info!(
        "Done: {} row(s) -> {}",
        outcome.report.rows_out(),
        report_path.display()
    );
    Ok(CommandStatus::Success)
}

/// Builds the mapping, loads the input and cleans it. Every failure past
/// configuration leaves a QC report and a failed manifest behind.
pub(crate) fn prepare(args: &InputArgs, report_schema_failure: bool) -> Result<Prepared> {
    let created_at = utc_now_rfc3339();

    let mapping = match ColumnMapping::from_profile_and_entries(args.profile.as_deref(), &args.map)
    {
        Ok(mapping) => mapping,
        Err(err) => return Ok(config_failure(&err)),
    };
    for message in mapping.overrides() {
        if args.quiet {
            debug!("{message}");
        } else {
            warn!("{message}");
        }
    }
    let encoding = match io_utils::resolve_encoding(args.input_encoding.as_deref()) {
        Ok(encoding) => encoding,
        Err(err) => return Ok(config_failure(&err)),
    };

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("Creating output directory {}", args.out_dir.display()))?;
    let out_dir = args.out_dir.clone();
    let manifest = RunManifest::new(&args.input, &out_dir, created_at);

    info!(
        "Loading '{}' (delimiter {})",
        args.input.display(),
        args.delimiter
            .map(crate::printable_delimiter)
            .unwrap_or_else(|| "auto".to_string())
    );
    if !mapping.is_empty() {
        debug!("Column map: {:?}", mapping.iter().collect::<Vec<_>>());
    }
    let raw = match io_utils::load_table(&args.input, args.delimiter, encoding) {
        Ok(raw) => raw,
        Err(err) => {
            let message = format!("{err:#}");
            eprintln!("error: {message}");
            QcReport::new(0, 0, Vec::new(), vec![message.clone()])?.save(&out_dir)?;
            manifest
                .failed(0, ErrorCode::LoadFailed, message)
                .save(&out_dir)?;
            return Ok(Prepared::Finished(CommandStatus::Failure));
        }
    };
    info!("{} row(s) x {} column(s)", raw.len(), raw.headers().len());

    if raw.is_empty() {
        let qc = QcReport::empty_input();
        let qc_path = qc.save(&out_dir)?;
        let message = "Input file has 0 rows.";
        eprintln!("error: {message}");
        let manifest_path = manifest
            .failed(0, ErrorCode::EmptyInput, message)
            .save(&out_dir)?;
        info!("QC report -> {}", qc_path.display());
        info!("Manifest -> {}", manifest_path.display());
        return Ok(Prepared::Finished(CommandStatus::Failure));
    }

    info!("Cleaning");
    let options = CleanOptions {
        dayfirst: args.dayfirst,
        number_locale: args.number_locale,
        mapping,
    };
    let outcome = clean(&raw, &options);
    let qc_path = outcome.report.save(&out_dir)?;
    info!("QC report -> {}", qc_path.display());

    if outcome.status.is_schema_failure() {
        let manifest = schema_failure_manifest(manifest, &outcome);
        manifest.save(&out_dir)?;
        if report_schema_failure {
            report_schema_problem(&outcome);
            return Ok(Prepared::Finished(CommandStatus::Failure));
        }
        return Ok(Prepared::Ready(CleanedRun {
            outcome,
            manifest,
            out_dir,
        }));
    }

    if outcome.status == CleanStatus::Empty {
        warn!("No rows survived cleaning; writing an empty report");
    }
    info!("{} clean row(s) retained", outcome.report.rows_out());
    Ok(Prepared::Ready(CleanedRun {
        outcome,
        manifest,
        out_dir,
    }))
}

fn config_failure(err: &anyhow::Error) -> Prepared {
    eprintln!("error: {err:#}");
    Prepared::Finished(CommandStatus::Failure)
}

pub(crate) fn schema_failure_manifest(manifest: RunManifest, outcome: &CleanOutcome) -> RunManifest {
    let code = match outcome.status {
        CleanStatus::DuplicateColumns => ErrorCode::DuplicateColumns,
        _ => ErrorCode::MissingColumns,
    };
    let message = outcome.report.warnings().join("; ");
    manifest.failed(outcome.report.rows_in(), code, message)
}

pub(crate) fn report_schema_problem(outcome: &CleanOutcome) {
    match outcome.status {
        CleanStatus::MissingColumns => {
            eprintln!(
                "error: Missing columns: {}",
                outcome.report.missing_columns().join(", ")
            );
            eprintln!("  Expected: {}", REQUIRED_COLUMNS.join(", "));
            eprintln!("  Hint: use --map target=source to rename headers");
        }
        _ => {
            for warning in outcome.report.warnings() {
                eprintln!("error: {warning}");
            }
        }
    }
}
