use anyhow::Result;
use clap::Args;
use tracing::info;
use vaulture::{AppPaths, Migrator, OutputFormat};

/// Arguments for the Init command
#[derive(Args)]
pub struct InitArgs {
    /// Also apply pending migrations after preparing the directories
    #[clap(long)]
    pub migrate: bool,
}

pub fn run(paths: &AppPaths, args: InitArgs, output_format: OutputFormat) -> Result<()> {
    let InitArgs { migrate } = args;

    let created = paths.initialize()?;
    for dir in &created {
        info!("created {}", dir.display());
    }

    let report = if migrate {
        Some(Migrator::from_paths(paths).run()?)
    } else {
        None
    };

    if output_format.is_json() {
        let value = serde_json::json!({
            "created": created,
            "migrated_to": report.as_ref().map(|r| r.to_version),
        });
        println!("{}", output_format.to_json(&value)?);
        return Ok(());
    }

    if created.is_empty() {
        println!("Directories already initialized");
    } else {
        for dir in &created {
            println!("Created {}", dir.display());
        }
    }
    if let Some(report) = report {
        println!(
            "Schema at version {} ({} migration(s) applied)",
            report.to_version,
            report.applied.len()
        );
    }
    Ok(())
}
