use anyhow::Result;
use log::info;

use crate::{
    CommandStatus,
    cli::ValidateArgs,
    process::{self, CleanedRun, Prepared},
    qc::QcReport,
    table::TextTable,
};

pub fn execute(args: &ValidateArgs) -> Result<CommandStatus> {
    let CleanedRun {
        outcome,
        manifest,
        out_dir,
    } = match process::prepare(&args.input, false)? {
        Prepared::Ready(run) => run,
        Prepared::Finished(status) => return Ok(status),
    };

    let passed = !outcome.status.is_schema_failure();
    if passed {
        let manifest_path = manifest.succeeded(&outcome.report).save(&out_dir)?;
        info!("Manifest -> {}", manifest_path.display());
    }

    if !args.input.quiet {
        summary_table(&outcome.report, passed).print();
    }

    if passed {
        Ok(CommandStatus::Success)
    } else {
        process::report_schema_problem(&outcome);
        Ok(CommandStatus::Failure)
    }
}

fn summary_table(qc: &QcReport, passed: bool) -> TextTable {
    let mut table = TextTable::new(["Check", "Result"]).with_title("Validation Summary");
    table.push_row(["Rows in".to_string(), qc.rows_in().to_string()]);
    table.push_row(["Rows out".to_string(), qc.rows_out().to_string()]);
    table.push_row(["Dropped".to_string(), qc.dropped_rows().to_string()]);
    let missing = if qc.missing_columns().is_empty() {
        "none".to_string()
    } else {
        qc.missing_columns().join(", ")
    };
    table.push_row(["Missing columns".to_string(), missing]);
    for warning in qc.warnings() {
        table.push_row(["Warning", warning.as_str()]);
    }
    table.push_row(["Status", if passed { "PASS" } else { "FAIL" }]);
    table
}
