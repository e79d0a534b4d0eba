//! Logging bootstrap
//!
//! Installs a global `tracing` subscriber with:
//! - a size-rotated log file (DEBUG and above, no ANSI colors)
//! - an optional stdout sink (INFO by default), on in source checkouts
//! - redaction of secret-bearing fields in every sink
//! - a panic hook that records the panic before the default hook runs
//!
//! ```rust,ignore
//! use vaulture::logging::{self, LogSettings};
//!
//! let settings = LogSettings::from_config(&config, &paths);
//! logging::init(&settings)?;
//! tracing::info!(master_password = %input, "unlocking vault"); // logged as <redacted>
//! ```

use anyhow::{anyhow, Result};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::field::Field;
use tracing_subscriber::field::MakeExt;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::{debug_fn, Writer};
use tracing_subscriber::fmt::FormatFields;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::config::VaultureConfig;
use crate::paths::{ensure_private_dir, AppPaths};

/// Field names whose values never reach a log sink
pub const SENSITIVE_FIELDS: &[&str] = &["master_password", "derived_key", "password_clear", "secret"];

/// Replacement text for redacted values
pub const REDACTED: &str = "<redacted>";

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Settings for [`init`]
#[derive(Debug, Clone)]
pub struct LogSettings {
    pub file: PathBuf,
    pub max_bytes: u64,
    pub backup_count: usize,
    pub file_level: LevelFilter,
    pub console: bool,
    pub console_level: LevelFilter,
}

impl LogSettings {
    pub fn from_config(config: &VaultureConfig, paths: &AppPaths) -> Self {
        Self {
            file: paths.log_file(),
            max_bytes: config.log_max_bytes,
            backup_count: config.log_backup_count,
            file_level: LevelFilter::DEBUG,
            console: config.console_log,
            console_level: LevelFilter::INFO,
        }
    }

    /// Mirror DEBUG-level output to the console
    pub fn with_debug_console(mut self) -> Self {
        self.console = true;
        self.console_level = LevelFilter::DEBUG;
        self
    }
}

/// Install the global subscriber
///
/// Returns `Ok(false)` without doing anything when logging was already
/// initialized by an earlier call.
pub fn init(settings: &LogSettings) -> Result<bool> {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return Ok(false);
    }

    match install(settings) {
        Ok(()) => Ok(true),
        Err(e) => {
            INITIALIZED.store(false, Ordering::SeqCst);
            Err(e)
        }
    }
}

fn install(settings: &LogSettings) -> Result<()> {
    if let Some(dir) = settings.file.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_private_dir(dir)?;
    }

    let file = RotatingFile::open(&settings.file, settings.max_bytes, settings.backup_count)
        .map_err(|e| anyhow!("Failed to open log file '{}': {}", settings.file.display(), e))?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .fmt_fields(redacting_fields())
        .with_writer(Mutex::new(file))
        .with_filter(settings.file_level);

    let console_layer = settings.console.then(|| {
        tracing_subscriber::fmt::layer()
            .fmt_fields(redacting_fields())
            .with_writer(io::stdout)
            .with_filter(settings.console_level)
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to install log subscriber: {}", e))?;

    install_panic_hook();
    Ok(())
}

/// Log panics at ERROR before handing over to the previous hook
fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!("uncaught panic: {}", info);
        previous(info);
    }));
}

/// Field formatter that hides the values of [`SENSITIVE_FIELDS`]
pub fn redacting_fields() -> impl for<'w> FormatFields<'w> + Send + Sync + 'static {
    debug_fn(format_field).delimited(" ")
}

fn format_field(writer: &mut Writer<'_>, field: &Field, value: &dyn fmt::Debug) -> fmt::Result {
    let name = field.name();
    if name == "message" {
        write!(writer, "{:?}", value)
    } else if SENSITIVE_FIELDS.contains(&name) {
        write!(writer, "{}={}", name, REDACTED)
    } else {
        write!(writer, "{}={:?}", name, value)
    }
}

/// Append-only log file that rolls over once it would exceed `max_bytes`
///
/// Backups are named `<file>.1` (newest) through `<file>.<backup_count>`
/// (oldest); the oldest is deleted on rollover. With `backup_count == 0`
/// the file is truncated instead.
pub struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    backup_count: usize,
    file: File,
    size: u64,
}

impl RotatingFile {
    pub fn open(path: &Path, max_bytes: u64, backup_count: usize) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            max_bytes,
            backup_count,
            file,
            size,
        })
    }

    /// Current size of the active file in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{index}"));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.backup_count > 0 {
            let oldest = self.backup_path(self.backup_count);
            if oldest.exists() {
                fs::remove_file(&oldest)?;
            }
            for index in (1..self.backup_count).rev() {
                let from = self.backup_path(index);
                if from.exists() {
                    fs::rename(&from, self.backup_path(index + 1))?;
                }
            }
            fs::rename(&self.path, self.backup_path(1))?;
            self.file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
        } else {
            self.file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.path)?;
        }

        self.size = 0;
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.size > 0 && self.size + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        let written = self.file.write(buf)?;
        self.size += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
