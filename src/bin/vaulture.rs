#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use clap::{Parser, Subcommand};
use tracing::debug;
use vaulture::logging::{self, LogSettings};
use vaulture::{AppPaths, OutputFormat, VaultureConfig};

mod commands;

use commands::init::InitArgs;
use commands::migrate::MigrateArgs;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default <config dir>/Vaulture/vaulture.toml is used
    #[clap(short, long, global = true)]
    config: Option<String>,

    /// Print debug information
    #[clap(long, global = true)]
    debug: bool,

    /// Output format: table, markdown, json, json-pretty, json-line, psv
    #[clap(short, long, global = true, default_value = "table")]
    format: OutputFormat,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations to the vault database
    Migrate(MigrateArgs),

    /// Show the current schema version and pending migrations
    Status,

    /// Show the configuration and resolved file locations
    Paths,

    /// Create the data and log directories with owner-only permissions
    Init(InitArgs),
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match VaultureConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    let paths = match AppPaths::from_config(&config) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    let mut settings = LogSettings::from_config(&config, &paths);
    if cli.debug {
        settings = settings.with_debug_console();
    }
    if let Err(e) = logging::init(&settings) {
        eprintln!("WARNING: file logging disabled: {}", e);
    }
    debug!(mode = %config.mode, db = %paths.db_path.display(), "starting vaulture");

    let output_format = cli.format;
    let result = match cli.command {
        Commands::Migrate(args) => commands::migrate::run(&paths, args, output_format),
        Commands::Status => commands::status::run(&paths, output_format),
        Commands::Paths => commands::paths::run(&config, &paths, output_format),
        Commands::Init(args) => commands::init::run(&paths, args, output_format),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
}
