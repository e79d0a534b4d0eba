use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tracing::info;
use vaulture::{AppPaths, MigrationFile, MigrationReport, Migrator, OutputFormat};

/// Arguments for the Migrate command
#[derive(Args)]
pub struct MigrateArgs {
    /// List the migrations that would run without applying them
    #[clap(long)]
    pub dry_run: bool,
}

#[derive(Tabled, Serialize)]
pub(crate) struct PendingRow {
    pub version: u32,
    pub file: String,
}

impl From<&MigrationFile> for PendingRow {
    fn from(script: &MigrationFile) -> Self {
        PendingRow {
            version: script.version,
            file: script.file_name(),
        }
    }
}

#[derive(Serialize)]
struct DryRun {
    current_version: u32,
    pending: Vec<PendingRow>,
}

pub fn run(paths: &AppPaths, args: MigrateArgs, output_format: OutputFormat) -> Result<()> {
    let MigrateArgs { dry_run } = args;

    for dir in paths.initialize()? {
        info!("created {}", dir.display());
    }
    let migrator = Migrator::from_paths(paths);

    if dry_run {
        let status = migrator.status()?;
        let plan = DryRun {
            current_version: status.current_version,
            pending: status.pending.iter().map(PendingRow::from).collect(),
        };
        print_dry_run(&plan, output_format)?;
        return Ok(());
    }

    let report = migrator.run()?;
    print_report(&report, output_format)
}

fn print_dry_run(plan: &DryRun, output_format: OutputFormat) -> Result<()> {
    match output_format {
        OutputFormat::Table | OutputFormat::Markdown => {
            if plan.pending.is_empty() {
                println!("Schema is at version {}, nothing to apply", plan.current_version);
                return Ok(());
            }
            println!(
                "Schema is at version {}, {} migration(s) would be applied:",
                plan.current_version,
                plan.pending.len()
            );
            println!("{}", render_table(&plan.pending, output_format));
        }
        OutputFormat::JsonLine => {
            for row in &plan.pending {
                println!("{}", serde_json::to_string(row)?);
            }
        }
        OutputFormat::Json | OutputFormat::JsonPretty => {
            println!("{}", output_format.to_json(plan)?);
        }
        OutputFormat::Psv => {
            println!("version|file");
            for row in &plan.pending {
                println!("{}|{}", row.version, row.file);
            }
        }
    }
    Ok(())
}

fn print_report(report: &MigrationReport, output_format: OutputFormat) -> Result<()> {
    match output_format {
        OutputFormat::Table | OutputFormat::Markdown => {
            if report.is_noop() {
                println!("Schema is up to date at version {}", report.to_version);
                return Ok(());
            }
            println!("{}", render_table(&report.applied, output_format));
            println!(
                "Migrated schema from version {} to {}",
                report.from_version, report.to_version
            );
        }
        OutputFormat::JsonLine => {
            for applied in &report.applied {
                println!("{}", serde_json::to_string(applied)?);
            }
        }
        OutputFormat::Json | OutputFormat::JsonPretty => {
            println!("{}", output_format.to_json(report)?);
        }
        OutputFormat::Psv => {
            println!("version|file|duration_ms");
            for applied in &report.applied {
                println!(
                    "{}|{}|{}",
                    applied.version, applied.file_name, applied.duration_ms
                );
            }
        }
    }
    Ok(())
}

pub(crate) fn render_table<T: Tabled>(rows: &[T], output_format: OutputFormat) -> String {
    let mut table = Table::new(rows);
    match output_format {
        OutputFormat::Markdown => table.with(Style::markdown()),
        _ => table.with(Style::rounded()),
    };
    table.to_string()
}
