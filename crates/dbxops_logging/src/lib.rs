//! Process-wide logging setup for the dbxops binaries.
//!
//! Call [`init_logging`] exactly once at the top of `main`. Components never
//! look a logger up by name; they emit `tracing` events and carry their
//! context (lineage, job id, wheel name) in spans and fields.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "dbxops=info,dbxops_security=info,dbxops_schema=info,dbxops_db=info";
const MAX_LOG_FILES: usize = 5;
const MAX_LOG_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Logging options for a dbxops process.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    /// Lower the console threshold to `debug`.
    pub verbose: bool,
    /// Also write to a size-rotated file under [`logs_dir`].
    pub log_to_file: bool,
}

/// Initialize tracing with stderr output and an optional rotating log file.
///
/// `RUST_LOG` overrides the default filter for both sinks.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let base_filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            if config.verbose {
                EnvFilter::new(DEFAULT_LOG_FILTER.replace("=info", "=debug"))
            } else {
                EnvFilter::new(DEFAULT_LOG_FILTER)
            }
        })
    };

    let file_layer = if config.log_to_file {
        let dir = ensure_logs_dir().context("Failed to ensure log directory")?;
        let writer = SharedRotatingWriter::open(&dir, config.app_name)?;
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(base_filter()),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .with_filter(base_filter()),
        )
        .with(file_layer)
        .try_init()
        .context("Logging was already initialized for this process")?;

    Ok(())
}

/// The dbxops home directory: `$DBXOPS_HOME` or `~/.dbxops`.
pub fn dbxops_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("DBXOPS_HOME") {
        return PathBuf::from(override_path);
    }
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".dbxops")
}

/// `~/.dbxops/logs`
pub fn logs_dir() -> PathBuf {
    dbxops_home().join("logs")
}

pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir();
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}

/// A log file that is renamed to `<name>.log.1`, `.2`, ... once it grows past
/// `max_size`, keeping at most `max_files` files in total.
struct RotatingFile {
    dir: PathBuf,
    stem: String,
    max_files: usize,
    max_size: u64,
    file: Option<File>,
    written: u64,
}

impl RotatingFile {
    fn open(dir: &Path, name: &str, max_files: usize, max_size: u64) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let mut rotating = Self {
            dir: dir.to_path_buf(),
            stem: file_stem(name),
            max_files: max_files.max(1),
            max_size,
            file: None,
            written: 0,
        };
        rotating.reopen()?;
        if rotating.written > rotating.max_size {
            rotating.rotate()?;
        }
        Ok(rotating)
    }

    fn active_path(&self) -> PathBuf {
        self.dir.join(format!("{}.log", self.stem))
    }

    fn numbered_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}.log.{}", self.stem, index))
    }

    fn reopen(&mut self) -> io::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.active_path())?;
        self.written = file.metadata()?.len();
        self.file = Some(file);
        Ok(())
    }

    fn rotate(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            let _ = file.flush();
        }

        let last = self.max_files - 1;
        if last > 0 {
            let oldest = self.numbered_path(last);
            if oldest.exists() {
                fs::remove_file(&oldest)?;
            }
            for index in (1..last).rev() {
                let from = self.numbered_path(index);
                if from.exists() {
                    fs::rename(&from, self.numbered_path(index + 1))?;
                }
            }
            let active = self.active_path();
            if active.exists() {
                fs::rename(active, self.numbered_path(1))?;
            }
        } else {
            // Single-file retention: truncate in place.
            File::create(self.active_path())?;
        }

        self.reopen()
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written + buf.len() as u64 > self.max_size {
            self.rotate()?;
        }
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "log file unavailable"))?;
        let n = file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

#[derive(Clone)]
struct SharedRotatingWriter {
    inner: Arc<Mutex<RotatingFile>>,
}

impl SharedRotatingWriter {
    fn open(dir: &Path, app_name: &str) -> Result<Self> {
        let file = RotatingFile::open(dir, app_name, MAX_LOG_FILES, MAX_LOG_FILE_SIZE)
            .with_context(|| format!("Failed to open log file for {}", app_name))?;
        Ok(Self {
            inner: Arc::new(Mutex::new(file)),
        })
    }
}

struct WriterHandle {
    inner: Arc<Mutex<RotatingFile>>,
}

impl WriterHandle {
    fn with_file<T>(&self, f: impl FnOnce(&mut RotatingFile) -> io::Result<T>) -> io::Result<T> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?;
        f(&mut guard)
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedRotatingWriter {
    type Writer = WriterHandle;

    fn make_writer(&'a self) -> Self::Writer {
        WriterHandle {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Write for WriterHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.with_file(|file| file.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.with_file(|file| file.flush())
    }
}

fn file_stem(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}
