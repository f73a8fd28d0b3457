//! One rotating log per named output stream.
//!
//! The registry is built once at startup and passed to whoever needs to
//! write; there is no global state. Formatting and level filtering belong to
//! the logging facade that wraps each stream.

use {
    crate::{Clock, RotateLog, RotateLogBuilder, RotateLogError, SystemClock, TimeZone, DEFAULT_PERIOD},
    std::{collections::HashMap, fmt, sync::Arc, time::Duration},
};

/// The named output streams of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Error,
    Request,
    Call,
    Debug,
}

impl Stream {
    pub const ALL: [Stream; 4] = [Stream::Error, Stream::Request, Stream::Call, Stream::Debug];

    pub fn name(self) -> &'static str {
        match self {
            Stream::Error => "error",
            Stream::Request => "request",
            Stream::Call => "call",
            Stream::Debug => "debug",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Settings shared by every stream in a [`Registry`].
#[derive(Clone)]
pub struct RegistryOptions {
    pub period: Duration,
    pub time_zone: TimeZone,
    pub file_mode: Option<u32>,
    /// File names used instead of [`Stream::name`].
    pub names: HashMap<Stream, String>,
    pub clock: Arc<dyn Clock>,
}

impl RegistryOptions {
    /// Name the files of `stream` with `name` instead of its default.
    pub fn with_name(mut self, stream: Stream, name: impl Into<String>) -> Self {
        self.names.insert(stream, name.into());
        self
    }

    /// The file name used for `stream`.
    pub fn name(&self, stream: Stream) -> &str {
        self.names.get(&stream).map_or(stream.name(), String::as_str)
    }
}

impl Default for RegistryOptions {
    fn default() -> Self {
        RegistryOptions {
            period: DEFAULT_PERIOD,
            time_zone: TimeZone::UTC,
            file_mode: None,
            names: HashMap::new(),
            clock: Arc::new(SystemClock),
        }
    }
}

impl fmt::Debug for RegistryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryOptions")
            .field("period", &self.period)
            .field("time_zone", &self.time_zone)
            .field("file_mode", &self.file_mode)
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}

/// The set of rotating logs for all [`Stream`]s.
#[derive(Debug)]
pub struct Registry {
    logs: Vec<RotateLog>,
}

impl Registry {
    /// Open every stream under `prefix`.
    ///
    /// Stream `error` writes to `{prefix}error_YYYY_M_D.log` with
    /// `{prefix}error.log` as its stable link, and likewise for the others;
    /// [`RegistryOptions::names`] replaces the stream part of the name.
    /// If any stream fails to open, the ones already opened are closed and
    /// the error is returned.
    pub fn open(prefix: &str, options: &RegistryOptions) -> Result<Self, RotateLogError> {
        let mut logs = Vec::with_capacity(Stream::ALL.len());

        for stream in Stream::ALL {
            let base = format!("{prefix}{}", options.name(stream));
            // the base is literal text inside the path template
            let template = format!("{}_%d_%d_%d.log", base.replace('%', "%%"));
            let mut builder = RotateLogBuilder::new(template)
                .period(options.period)
                .link(format!("{base}.log"))
                .time_zone(options.time_zone.clone())
                .clock(Arc::clone(&options.clock));
            if let Some(mode) = options.file_mode {
                builder = builder.file_mode(mode);
            }

            match builder.build() {
                Ok(log) => logs.push(log),
                Err(err) => {
                    tracing::error!(stream = %stream, error = %err, "failed to open log stream");
                    for log in &logs {
                        if let Err(close_err) = log.close() {
                            tracing::warn!(error = %close_err, "failed to close log stream during rollback");
                        }
                    }
                    return Err(err);
                }
            }
        }

        Ok(Registry { logs })
    }

    pub fn get(&self, stream: Stream) -> &RotateLog {
        &self.logs[stream.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Stream, &RotateLog)> {
        Stream::ALL.into_iter().zip(self.logs.iter())
    }

    /// Close every stream, returning the first error after trying them all.
    pub fn close(&self) -> Result<(), RotateLogError> {
        let mut first_err = None;
        for (stream, log) in self.iter() {
            if let Err(err) = log.close() {
                tracing::warn!(stream = %stream, error = %err, "failed to close log stream");
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}
