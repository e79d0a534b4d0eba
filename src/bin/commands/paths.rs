use anyhow::Result;
use serde::Serialize;
use vaulture::{AppPaths, OutputFormat, VaultureConfig};

#[derive(Serialize)]
struct PathsInfo<'a> {
    config_file: String,
    database_exists: bool,
    migrations_dir_exists: bool,
    #[serde(flatten)]
    paths: &'a AppPaths,
}

pub fn run(config: &VaultureConfig, paths: &AppPaths, output_format: OutputFormat) -> Result<()> {
    let config_file = VaultureConfig::config_file_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "<unknown>".to_string());

    let info = PathsInfo {
        config_file,
        database_exists: paths.db_path.exists(),
        migrations_dir_exists: paths.migrations_dir.is_dir(),
        paths,
    };

    match output_format {
        OutputFormat::Json | OutputFormat::JsonPretty | OutputFormat::JsonLine => {
            println!("{}", output_format.to_json(&info)?);
        }
        OutputFormat::Psv => {
            println!("mode|db_path|migrations_dir|log_file");
            println!(
                "{}|{}|{}|{}",
                paths.mode,
                paths.db_path.display(),
                paths.migrations_dir.display(),
                paths.log_file().display()
            );
        }
        OutputFormat::Table | OutputFormat::Markdown => {
            println!("Config File:        {}", info.config_file);
            println!("{}", config.summary());
            println!("{}", paths.summary());
            if !info.database_exists {
                println!("Database file does not exist yet; run `vaulture migrate` to create it");
            }
            if !info.migrations_dir_exists {
                println!("WARNING: migrations directory is missing");
            }
        }
    }
    Ok(())
}
