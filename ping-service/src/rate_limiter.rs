use crate::record::{RateRecord, RECORD_LEN};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// How long a caller waits for another holder before giving up on a tick.
pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_millis(500);
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Why an admission decision could not be made at all.
///
/// This is distinct from a denial: callers must not treat it as either
/// "admitted" or "rate limited".
#[derive(Debug, thiserror::Error)]
pub enum LimiterError {
    #[error("failed to open rate limit file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to lock rate limit file {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to {op} rate limit record {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("rate limiter task did not complete: {0}")]
    Task(String),
}

/// Cross-process admission check consulted before every outbound call.
pub trait AdmissionControl: Send + Sync + 'static {
    /// `Ok(true)` when a token was granted for the current one-second window,
    /// `Ok(false)` when the window is already full.
    fn try_acquire(&self) -> Result<bool, LimiterError>;
}

/// Fixed one-second window counter persisted in a shared file.
///
/// Every read-modify-write of the record happens while holding an exclusive
/// `flock` on the file itself. The lock belongs to the open file description,
/// so the kernel drops it when the holding process exits, including on a
/// crash; there is no separate lock file that could be left behind.
///
/// Windows are aligned to wall-clock seconds, so up to twice the limit can be
/// admitted across a boundary (the tail of one second and the head of the
/// next).
///
/// The lock is taken without blocking and retried for at most `lock_wait`; a
/// holder that never lets go turns into [`LimiterError::Lock`] instead of a
/// stalled caller.
#[derive(Debug, Clone)]
pub struct PersistedRateLimiter {
    path: PathBuf,
    rps_limit: u32,
    lock_wait: Duration,
}

impl PersistedRateLimiter {
    pub fn new(path: impl Into<PathBuf>, rps_limit: u32) -> Self {
        Self {
            path: path.into(),
            rps_limit,
            lock_wait: DEFAULT_LOCK_WAIT,
        }
    }

    pub fn with_lock_wait(mut self, lock_wait: Duration) -> Self {
        self.lock_wait = lock_wait;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rps_limit(&self) -> u32 {
        self.rps_limit
    }

    /// Runs one admission decision against the record as of `now_epoch_secs`.
    pub fn try_acquire_at(&self, now_epoch_secs: u64) -> Result<bool, LimiterError> {
        if self.rps_limit == 0 {
            return Ok(false);
        }
        let mut lock = RecordLock::acquire(&self.path, self.lock_wait)?;

        let next = match lock.read()? {
            None => {
                debug!(path = %self.path.display(), "No rate record yet, first request allowed");
                RateRecord::new(now_epoch_secs, 1)
            }
            Some(record) => {
                let record = if record.is_stale_at(now_epoch_secs) {
                    RateRecord::new(now_epoch_secs, 0)
                } else {
                    record
                };
                if record.count >= self.rps_limit {
                    debug!(
                        count = record.count,
                        limit = self.rps_limit,
                        window_start = record.window_start_epoch_secs,
                        "Rate limit reached"
                    );
                    return Ok(false);
                }
                RateRecord::new(record.window_start_epoch_secs, record.count + 1)
            }
        };

        lock.write(&next)?;
        Ok(true)
    }

    /// Reads the record under the lock without changing it.
    pub fn current(&self) -> Result<Option<RateRecord>, LimiterError> {
        RecordLock::acquire(&self.path, self.lock_wait)?.read()
    }
}

impl AdmissionControl for PersistedRateLimiter {
    fn try_acquire(&self) -> Result<bool, LimiterError> {
        self.try_acquire_at(now_epoch_secs())
    }
}

/// Open handle on the record file holding the exclusive lock until dropped.
struct RecordLock<'a> {
    file: File,
    path: &'a Path,
}

impl<'a> RecordLock<'a> {
    fn acquire(path: &'a Path, wait: Duration) -> Result<Self, LimiterError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|source| LimiterError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        let deadline = Instant::now() + wait;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(Self { file, path }),
                Err(e)
                    if e.kind() == fs2::lock_contended_error().kind()
                        && Instant::now() < deadline =>
                {
                    thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(source) => {
                    return Err(LimiterError::Lock {
                        path: path.to_path_buf(),
                        source,
                    })
                }
            }
        }
    }

    fn read(&mut self) -> Result<Option<RateRecord>, LimiterError> {
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(|source| io_error(self.path, "seek", source))?;
        let mut buf = Vec::with_capacity(RECORD_LEN);
        (&mut self.file)
            .take(RECORD_LEN as u64)
            .read_to_end(&mut buf)
            .map_err(|source| io_error(self.path, "read", source))?;
        Ok(RateRecord::decode(&buf))
    }

    fn write(&mut self, record: &RateRecord) -> Result<(), LimiterError> {
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(|source| io_error(self.path, "seek", source))?;
        self.file
            .write_all(&record.encode())
            .map_err(|source| io_error(self.path, "write", source))?;
        self.file
            .sync_all()
            .map_err(|source| io_error(self.path, "sync", source))
    }
}

fn io_error(path: &Path, op: &'static str, source: io::Error) -> LimiterError {
    LimiterError::Io {
        op,
        path: path.to_path_buf(),
        source,
    }
}

impl Drop for RecordLock<'_> {
    fn drop(&mut self) {
        if let Err(error) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), %error, "Failed to release rate limit lock");
        }
    }
}

pub fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
