//! # RotateLog
//!
//! RotateLog is a byte sink that splits its output into one file per period,
//! named by the calendar date of the moment the period started. A background
//! thread switches to the next file at every period boundary, while any
//! number of threads keep writing. An optional stable path is kept as a hard
//! link to whichever file is currently active, so `tail -F app.log` follows
//! the log across rotations.
//!
//! The rotating log implements [`std::io::Write`] for both `RotateLog` and
//! `&RotateLog`, so it can be handed to `tracing_appender::non_blocking` or
//! shared between threads behind an `Arc`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use {
//!     rotatelog::{RotateLogBuilder, TimeZone},
//!     std::{io::Write, time::Duration},
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let log = RotateLogBuilder::new("./logs/app_%d_%02d_%02d.log")
//!         .period(Duration::from_secs(24 * 60 * 60))
//!         .link("./logs/app.log")
//!         .time_zone(TimeZone::UTC)
//!         .build()?;
//!
//!     writeln!(&log, "server started")?;
//!     log.close()?;
//!     Ok(())
//! }
//! ```
mod error;
mod executor;
mod registry;
mod scheduler;
mod template;

pub use {
    error::{is_closed, RotateLogError},
    executor::RotationStats,
    registry::{Registry, RegistryOptions, Stream},
    scheduler::{next_boundary, until_next_rotation},
    template::PathTemplate,
};

use {
    chrono::{DateTime, Datelike, FixedOffset, Local, Offset, Utc},
    executor::Executor,
    scheduler::Scheduler,
    std::{
        fmt, fs, io,
        path::{Path, PathBuf},
        sync::{Arc, Mutex, PoisonError},
        time::Duration,
    },
};

#[cfg(unix)]
use std::{
    fs::Permissions,
    os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt},
};

/// Rotation period used when none is configured.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Mode for newly created log files: owner read/write, everyone else read.
pub const DEFAULT_FILE_MODE: u32 = 0o644;

#[cfg(unix)]
const DIRECTORY_MODE: u32 = 0o755;

/// Specifies the time zone used to name files and align rotation boundaries.
///
/// The offset is resolved once when the log is built. With
/// [`TimeZone::Local`] a daylight saving change is not picked up until the
/// log is rebuilt.
///
/// # Examples
/// ```
/// use rotatelog::TimeZone;
/// use chrono::FixedOffset;
///
/// let utc = TimeZone::UTC;
/// let local = TimeZone::Local;
/// let china = TimeZone::Fix(FixedOffset::east_opt(8 * 3600).unwrap());
/// ```
#[derive(Debug, Clone)]
pub enum TimeZone {
    /// Use UTC. This is the default.
    UTC,
    /// Use the system's local offset at build time.
    Local,
    /// Use a fixed offset.
    Fix(FixedOffset),
}

impl TimeZone {
    fn offset(&self) -> FixedOffset {
        match self {
            TimeZone::UTC => Utc.fix(),
            TimeZone::Local => Local::now().offset().to_owned(),
            TimeZone::Fix(fixed_offset) => *fixed_offset,
        }
    }
}

/// Source of the current time for naming files and scheduling rotations.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock stopped at a single instant. Useful in tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Immutable rotation configuration, fixed when the log is built.
#[derive(Debug, Clone)]
pub struct RotationPolicy {
    /// Template for the file paths, filled with year, month and day.
    template: PathTemplate,
    /// Length of one rotation period. Zero disables scheduled rotation.
    period: Duration,
    /// Path kept as a hard link to the active file.
    link: Option<PathBuf>,
    /// Offset used to derive the date and align the boundaries.
    offset: FixedOffset,
    /// Explicitly configured file mode (Unix-like systems only). When unset,
    /// new files are created with [`DEFAULT_FILE_MODE`] and existing files
    /// are left alone.
    file_mode: Option<u32>,
}

impl RotationPolicy {
    pub fn template(&self) -> &PathTemplate {
        &self.template
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn link(&self) -> Option<&Path> {
        self.link.as_deref()
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn file_mode(&self) -> Option<u32> {
        self.file_mode
    }

    /// The file path for the period containing `now`.
    pub fn path_for(&self, now: DateTime<Utc>) -> PathBuf {
        let local = now.with_timezone(&self.offset);
        self.template.render(local.year(), local.month(), local.day())
    }

    /// Open `log_path` for appending, creating it and its parent directories
    /// if needed. Existing content is never truncated.
    fn create_log_file(&self, log_path: &Path) -> Result<fs::File, RotateLogError> {
        if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            let mut dir_builder = fs::DirBuilder::new();
            dir_builder.recursive(true);
            #[cfg(unix)]
            dir_builder.mode(DIRECTORY_MODE);
            dir_builder
                .create(parent)
                .map_err(|err| RotateLogError::CreateDirectoryFailed(parent.to_path_buf(), err.to_string()))?;
        }

        let mut open_options = fs::OpenOptions::new();
        open_options.append(true).create(true);
        #[cfg(unix)]
        open_options.mode(self.file_mode.unwrap_or(DEFAULT_FILE_MODE));

        let log_file = open_options
            .open(log_path)
            .map_err(|err| RotateLogError::CreateFileFailed(log_path.to_path_buf(), err.to_string()))?;

        self.set_permissions(log_path)?;

        Ok(log_file)
    }

    /// Enforce the configured file mode regardless of the process umask.
    ///
    /// Only has an effect when a mode was configured and on Unix-like
    /// systems; elsewhere a warning is logged.
    fn set_permissions(&self, path: &Path) -> Result<(), RotateLogError> {
        if let Some(mode) = self.file_mode {
            #[cfg(unix)]
            {
                let perms = Permissions::from_mode(mode);
                fs::set_permissions(path, perms).map_err(|err| RotateLogError::SetFilePermissionsError {
                    path: path.to_path_buf(),
                    error: err.to_string(),
                })?
            }
            #[cfg(not(unix))]
            {
                tracing::warn!(mode, path = %path.display(), "file permissions are not supported on this platform");
            }
        }
        Ok(())
    }
}

/// Provides a fluent interface for configuring [`RotateLog`] instances.
///
/// # Default Configuration
///
/// * Daily rotation ([`DEFAULT_PERIOD`])
/// * UTC dates and boundaries
/// * No stable link
/// * New files created with [`DEFAULT_FILE_MODE`]
///
/// # Examples
///
/// ```rust,no_run
/// use {rotatelog::RotateLogBuilder, std::time::Duration};
///
/// let log = RotateLogBuilder::new("/var/log/app_%d_%d_%d.log")
///     .period(Duration::from_secs(60 * 60))
///     .link("/var/log/app.log")
///     .file_mode(0o640)
///     .build()
///     .unwrap();
/// ```
///
/// A zero period keeps writing to the file opened at construction:
///
/// ```rust,no_run
/// use {rotatelog::RotateLogBuilder, std::time::Duration};
///
/// let log = RotateLogBuilder::new("./logs/once_%d_%d_%d.log")
///     .period(Duration::ZERO)
///     .build()
///     .unwrap();
/// ```
pub struct RotateLogBuilder {
    template: String,
    period: Duration,
    link: Option<PathBuf>,
    time_zone: TimeZone,
    file_mode: Option<u32>,
    clock: Arc<dyn Clock>,
}

impl RotateLogBuilder {
    /// Create a new builder for files named by `template`, a path with three
    /// integer directives (`%d` or zero-padded `%02d`) for year, month and
    /// day.
    pub fn new(template: impl Into<String>) -> Self {
        RotateLogBuilder {
            template: template.into(),
            period: DEFAULT_PERIOD,
            link: None,
            time_zone: TimeZone::UTC,
            file_mode: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Set the rotation period. `Duration::ZERO` disables scheduled rotation.
    pub fn period(self, period: Duration) -> Self {
        Self { period, ..self }
    }

    /// Keep `link` as a hard link to the active file.
    pub fn link<P: AsRef<Path>>(self, link: P) -> Self {
        Self {
            link: Some(link.as_ref().to_path_buf()),
            ..self
        }
    }

    /// Set the time zone for file dates and boundary alignment.
    pub fn time_zone(self, time_zone: TimeZone) -> Self {
        Self { time_zone, ..self }
    }

    /// Set the file permissions for log files (Unix-like systems only).
    /// This sets the file mode bits in octal notation like when using chmod.
    /// For example, 0o640 for rw-r----- permissions.
    pub fn file_mode(self, mode: u32) -> Self {
        Self {
            file_mode: Some(mode),
            ..self
        }
    }

    /// Replace the clock used for naming files and scheduling.
    pub fn clock(self, clock: Arc<dyn Clock>) -> Self {
        Self { clock, ..self }
    }

    pub(crate) fn policy(&self) -> Result<RotationPolicy, RotateLogError> {
        Ok(RotationPolicy {
            template: PathTemplate::parse(&self.template)?,
            period: self.period,
            link: self.link.clone(),
            offset: self.time_zone.offset(),
            file_mode: self.file_mode,
        })
    }

    /// Build the rotating log.
    ///
    /// The first file is opened (and the link created) before this returns,
    /// so the log is writable immediately. A link failure is logged but does
    /// not fail the build.
    pub fn build(self) -> Result<RotateLog, RotateLogError> {
        let policy = self.policy()?;
        let executor = Arc::new(Executor::start(policy, self.clock)?);
        let scheduler = if executor.policy().period().is_zero() {
            None
        } else {
            Some(Scheduler::spawn(Arc::clone(&executor))?)
        };
        Ok(RotateLog {
            executor,
            scheduler: Mutex::new(scheduler),
        })
    }
}

/// A log file that rotates on period boundaries.
///
/// Closing is explicit with [`RotateLog::close`] and also happens on drop.
pub struct RotateLog {
    executor: Arc<Executor>,
    scheduler: Mutex<Option<Scheduler>>,
}

impl RotateLog {
    /// Stop the scheduler and close the active file.
    ///
    /// Safe to call any number of times and from any thread; calls after the
    /// first return `Ok(())` without blocking.
    pub fn close(&self) -> Result<(), RotateLogError> {
        let scheduler = self.scheduler.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(scheduler) = scheduler {
            scheduler.shutdown();
        }
        self.executor.close()
    }

    pub fn is_closed(&self) -> bool {
        self.executor.is_closed()
    }

    /// Path of the file currently receiving writes, `None` once closed.
    pub fn current_path(&self) -> Option<PathBuf> {
        self.executor.current_path()
    }

    pub fn policy(&self) -> &RotationPolicy {
        self.executor.policy()
    }

    pub fn stats(&self) -> RotationStats {
        self.executor.stats()
    }
}

impl fmt::Debug for RotateLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotateLog").field("executor", &self.executor).finish()
    }
}

impl Drop for RotateLog {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(error = %err, "failed to close rotating log");
        }
    }
}

impl io::Write for &RotateLog {
    // `File` is unbuffered, each call is one write on the active handle.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.executor.with_active(|file| io::Write::write(file, buf))
    }

    /// Writes the whole buffer under one lock hold, so it is never split
    /// across a rotation.
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.executor.with_active(|file| io::Write::write_all(file, buf))
    }

    /// Formats into a buffer first, so one `writeln!` is one locked write.
    fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        let formatted = fmt::format(args);
        io::Write::write_all(self, formatted.as_bytes())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.executor.with_active(|file| io::Write::flush(file))
    }
}

impl io::Write for RotateLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::Write::write(&mut &*self, buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        io::Write::write_all(&mut &*self, buf)
    }

    fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        io::Write::write_fmt(&mut &*self, args)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::Write::flush(&mut &*self)
    }
}
