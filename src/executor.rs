use {
    crate::{Clock, RotateLogError, RotationPolicy},
    chrono::{DateTime, Utc},
    std::{
        ffi::OsString,
        fmt, fs,
        io::{self, Write as _},
        path::{Path, PathBuf},
        sync::{
            atomic::{AtomicU64, Ordering},
            Arc, Mutex, MutexGuard, PoisonError,
        },
    },
};

/// Rotation counters, as returned by [`RotateLog::stats`].
///
/// [`RotateLog::stats`]: crate::RotateLog::stats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationStats {
    /// Successful rotations, including the initial one at construction.
    pub rotations: u64,
    /// Scheduled rotations that failed and left the previous file active.
    pub failed_rotations: u64,
    /// Stable link updates that failed.
    pub failed_links: u64,
}

#[derive(Default)]
struct Counters {
    rotations: AtomicU64,
    failed_rotations: AtomicU64,
    failed_links: AtomicU64,
}

/// The file currently receiving writes.
struct ActiveFile {
    file: fs::File,
    path: PathBuf,
}

/// Owns the active file handle and performs rotations.
///
/// `active` is `None` only after close. Writes and the rotation swap take the
/// same lock, so a write lands wholly in either the old or the new file.
pub(crate) struct Executor {
    policy: RotationPolicy,
    clock: Arc<dyn Clock>,
    active: Mutex<Option<ActiveFile>>,
    counters: Counters,
}

impl Executor {
    /// Perform the first rotation and return an executor with an open file.
    pub(crate) fn start(policy: RotationPolicy, clock: Arc<dyn Clock>) -> Result<Self, RotateLogError> {
        let now = clock.now();
        let path = policy.path_for(now);
        let file = policy.create_log_file(&path)?;
        let executor = Executor {
            policy,
            clock,
            active: Mutex::new(Some(ActiveFile {
                file,
                path: path.clone(),
            })),
            counters: Counters::default(),
        };
        executor.counters.rotations.fetch_add(1, Ordering::Relaxed);
        executor.update_link(&path);
        Ok(executor)
    }

    pub(crate) fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn lock(&self) -> MutexGuard<'_, Option<ActiveFile>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Switch the active file to the one named for `now`.
    ///
    /// The new file is opened before the lock is taken; the swap and the
    /// close of the old handle happen under the lock. Returns the path of the
    /// now active file.
    pub(crate) fn rotate(&self, now: DateTime<Utc>) -> Result<PathBuf, RotateLogError> {
        let path = self.policy.path_for(now);
        let file = self.policy.create_log_file(&path)?;

        let flushed = {
            let mut active = self.lock();
            let Some(current) = active.as_mut() else {
                // closed while we were opening; keep it closed
                return Err(RotateLogError::Closed);
            };
            let mut old = std::mem::replace(
                current,
                ActiveFile {
                    file,
                    path: path.clone(),
                },
            );
            let flushed = old.file.flush().map_err(|err| (old.path.clone(), err));
            drop(old);
            flushed
        };
        if let Err((old_path, err)) = flushed {
            tracing::warn!(path = %old_path.display(), error = %err, "failed to flush rotated-out log file");
        }

        self.counters.rotations.fetch_add(1, Ordering::Relaxed);
        self.update_link(&path);
        Ok(path)
    }

    /// Rotation driven by the scheduler. Failures are logged and counted,
    /// never propagated: the previous file stays active until the next
    /// boundary.
    pub(crate) fn rotate_scheduled(&self, now: DateTime<Utc>) {
        match self.rotate(now) {
            Ok(path) => tracing::debug!(path = %path.display(), "rotated log file"),
            Err(RotateLogError::Closed) => tracing::debug!("skipped rotation of closed log"),
            Err(err) => {
                self.counters.failed_rotations.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    template = %self.policy.template(),
                    error = %err,
                    "log rotation failed, keeping the current file"
                );
            }
        }
    }

    fn update_link(&self, target: &Path) {
        let Some(link) = self.policy.link() else {
            return;
        };
        if let Err(err) = relink(link, target) {
            self.counters.failed_links.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(error = %err, "failed to update stable log link");
        }
    }

    /// Run `f` against the active file under the lock.
    pub(crate) fn with_active<T>(&self, f: impl FnOnce(&mut fs::File) -> io::Result<T>) -> io::Result<T> {
        match self.lock().as_mut() {
            Some(active) => f(&mut active.file),
            None => Err(RotateLogError::closed_io()),
        }
    }

    /// Close the active file. Later writes fail with [`RotateLogError::Closed`].
    pub(crate) fn close(&self) -> Result<(), RotateLogError> {
        let active = self.lock().take();
        if let Some(mut active) = active {
            active.file.flush()?;
        }
        Ok(())
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    pub(crate) fn current_path(&self) -> Option<PathBuf> {
        self.lock().as_ref().map(|active| active.path.clone())
    }

    pub(crate) fn stats(&self) -> RotationStats {
        RotationStats {
            rotations: self.counters.rotations.load(Ordering::Relaxed),
            failed_rotations: self.counters.failed_rotations.load(Ordering::Relaxed),
            failed_links: self.counters.failed_links.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("policy", &self.policy)
            .field("current_path", &self.current_path())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Point the hard link `link` at `target`.
///
/// The new link is created under a temporary sibling name and renamed over
/// `link`, so the stable path is never missing while it is repointed.
pub(crate) fn relink(link: &Path, target: &Path) -> Result<(), RotateLogError> {
    let failed = |err: io::Error| RotateLogError::LinkFailed {
        link: link.to_path_buf(),
        target: target.to_path_buf(),
        error: err.to_string(),
    };

    let staging = staging_path(link);
    // left over from an interrupted relink
    let _ = fs::remove_file(&staging);

    fs::hard_link(target, &staging).map_err(failed)?;
    let renamed = fs::rename(&staging, link);
    // rename() is a no-op when both names already refer to the same file,
    // which leaves the staging name behind.
    if renamed.is_err() || fs::symlink_metadata(&staging).is_ok() {
        let _ = fs::remove_file(&staging);
    }
    renamed.map_err(failed)
}

fn staging_path(link: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(link.file_name().unwrap_or_default());
    name.push(".relink");
    link.with_file_name(name)
}
