use anyhow::Result;
use vaulture::{AppPaths, MigrationStatus, Migrator, OutputFormat, SchemaState};

use super::migrate::{render_table, PendingRow};

pub fn run(paths: &AppPaths, output_format: OutputFormat) -> Result<()> {
    let status = Migrator::from_paths(paths).status()?;

    match output_format {
        OutputFormat::Table | OutputFormat::Markdown => {
            println!("Database:        {}", status.db_path.display());
            println!("Migrations:      {}", status.migrations_dir.display());
            println!("Schema version:  {}", status.current_version);
            println!("Latest known:    {}", status.latest_version);
            println!("State:           {}", describe(&status));
            if !status.pending.is_empty() {
                let rows: Vec<PendingRow> = status.pending.iter().map(PendingRow::from).collect();
                println!("{}", render_table(&rows, output_format));
            }
        }
        OutputFormat::Json | OutputFormat::JsonPretty | OutputFormat::JsonLine => {
            println!("{}", output_format.to_json(&status)?);
        }
        OutputFormat::Psv => {
            println!("current_version|latest_version|pending");
            println!(
                "{}|{}|{}",
                status.current_version,
                status.latest_version,
                status.pending.len()
            );
        }
    }
    Ok(())
}

fn describe(status: &MigrationStatus) -> String {
    match &status.state {
        SchemaState::Empty => "empty (no migrations found)".to_string(),
        SchemaState::UpToDate => "up to date".to_string(),
        SchemaState::NeedsMigration { from, to } => {
            format!(
                "{} pending migration(s), {} -> {}",
                status.pending.len(),
                from,
                to
            )
        }
        SchemaState::Ahead {
            database_version,
            latest_known,
        } => format!(
            "database version {} is newer than the latest known migration {}",
            database_version, latest_known
        ),
    }
}
