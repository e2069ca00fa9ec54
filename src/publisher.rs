//! Atomic snapshot publication.
//!
//! Each entity has one file, `<basedir>/<digest>`. A new snapshot is written
//! to `<basedir>/<digest>.new` and renamed over the final path, so readers on
//! the same filesystem see the previous complete snapshot or the new one.
//!
//! # Staging files
//! - The staging file is created exclusively. If it already exists the
//!   publish is dropped: the file is an unconsumed write from an earlier cycle.
//! - A staging file this process created and then failed to write or rename
//!   is removed again before the error is returned.
//! - A staging file left behind by a crash stays until removed by an operator
//!   or by [`AtomicPublisher::sweep_stale_staging`] at startup.

use std::ffi::OsStr;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

use crate::config::GatewayConfig;
use crate::diag::bounded_line;
use crate::error::PublishError;
use crate::identity::EntityDigest;
use crate::snapshot::Snapshot;

/// Extension of staging files.
pub const STAGING_EXTENSION: &str = "new";

/// Commits snapshot files into the output directory.
#[derive(Debug, Clone)]
pub struct AtomicPublisher {
    basedir: PathBuf,
    sync_on_write: bool,
}

impl AtomicPublisher {
    /// Publisher for the configured output directory.
    #[must_use]
    pub fn new(config: &GatewayConfig) -> Self {
        Self::with_basedir(config.basedir(), config.sync_on_write())
    }

    /// Publisher for `basedir`, optionally fsyncing each snapshot.
    #[must_use]
    pub fn with_basedir(basedir: impl Into<PathBuf>, sync_on_write: bool) -> Self {
        Self {
            basedir: basedir.into(),
            sync_on_write,
        }
    }

    /// Output directory.
    #[must_use]
    pub fn basedir(&self) -> &Path {
        &self.basedir
    }

    /// Final path of an entity's snapshot.
    #[must_use]
    pub fn final_path(&self, digest: &EntityDigest) -> PathBuf {
        self.basedir.join(digest.as_str())
    }

    /// Staging path of an entity's snapshot.
    #[must_use]
    pub fn staging_path(&self, digest: &EntityDigest) -> PathBuf {
        self.basedir
            .join(format!("{}.{STAGING_EXTENSION}", digest.as_str()))
    }

    /// Create the output directory if it does not exist. Startup only.
    pub fn prepare(&self) -> io::Result<()> {
        if !self.basedir.is_dir() {
            fs::create_dir_all(&self.basedir)?;
            info!("{}", bounded_line(&format!("created output directory {}", self.basedir.display())));
        }
        Ok(())
    }

    /// Serialize and commit a snapshot.
    pub fn publish_snapshot(
        &self,
        digest: &EntityDigest,
        snapshot: &Snapshot,
    ) -> Result<PathBuf, PublishError> {
        let line = snapshot.to_line()?;
        self.publish(digest, line.as_bytes())
    }

    /// Commit `payload` as the content of the entity's file.
    ///
    /// Returns the final path. On error the final file is untouched.
    pub fn publish(&self, digest: &EntityDigest, payload: &[u8]) -> Result<PathBuf, PublishError> {
        let final_path = self.final_path(digest);
        let mut staged = StagingFile::create(self.staging_path(digest))?;
        staged.write_all(payload, self.sync_on_write)?;
        staged.commit(&final_path)?;
        Ok(final_path)
    }

    /// Remove staging files older than `max_age`.
    ///
    /// Only files named `<digest>.new` are considered. Failures on individual
    /// entries are logged and skipped.
    pub fn sweep_stale_staging(&self, max_age: Duration) -> io::Result<SweepReport> {
        let mut report = SweepReport::default();
        let now = SystemTime::now();

        for entry in fs::read_dir(&self.basedir)? {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("{}", bounded_line(&format!("failed to read output directory entry: {e}")));
                    continue;
                }
            };
            let path = entry.path();
            if !is_staging_name(&path) {
                continue;
            }

            let age = entry
                .metadata()
                .and_then(|m| m.modified())
                .map(|mtime| now.duration_since(mtime).unwrap_or(Duration::ZERO));
            match age {
                Ok(age) if age > max_age => match fs::remove_file(&path) {
                    Ok(()) => {
                        let msg = format!("removed stale staging file {} ({}s old)", path.display(), age.as_secs());
                        info!("{}", bounded_line(&msg));
                        report.removed.push(path);
                    }
                    Err(e) => {
                        let msg = format!("failed to remove stale staging file {}: {e}", path.display());
                        warn!("{}", bounded_line(&msg));
                    }
                },
                Ok(_) => report.kept += 1,
                Err(e) => warn!("{}", bounded_line(&format!("failed to stat staging file {}: {e}", path.display()))),
            }
        }

        Ok(report)
    }
}

/// Outcome of a staging sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Staging files deleted.
    pub removed: Vec<PathBuf>,
    /// Staging files younger than the limit.
    pub kept: usize,
}

fn is_staging_name(path: &Path) -> bool {
    path.extension() == Some(OsStr::new(STAGING_EXTENSION))
        && path
            .file_stem()
            .and_then(OsStr::to_str)
            .and_then(EntityDigest::parse)
            .is_some()
}

/// An exclusively created staging file.
///
/// Removed on drop unless committed.
struct StagingFile {
    path: PathBuf,
    file: Option<File>,
    committed: bool,
}

impl StagingFile {
    fn create(path: PathBuf) -> Result<Self, PublishError> {
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => Ok(Self {
                path,
                file: Some(file),
                committed: false,
            }),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(PublishError::StagingExists { path }),
            Err(source) => Err(PublishError::Create { path, source }),
        }
    }

    fn write_all(&mut self, payload: &[u8], sync: bool) -> Result<(), PublishError> {
        let result = match self.file.as_mut() {
            Some(file) => file
                .write_all(payload)
                .and_then(|()| file.flush())
                .and_then(|()| if sync { file.sync_all() } else { Ok(()) }),
            None => Err(io::Error::new(ErrorKind::Other, "staging file already closed")),
        };
        result.map_err(|source| PublishError::Write {
            path: self.path.clone(),
            source,
        })
    }

    fn commit(mut self, final_path: &Path) -> Result<(), PublishError> {
        // Close before the rename so the content is complete when it appears.
        self.file.take();
        fs::rename(&self.path, final_path).map_err(|source| PublishError::Rename {
            from: self.path.clone(),
            to: final_path.to_path_buf(),
            source,
        })?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        self.file.take();
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("{}", bounded_line(&format!("removed unfinished staging file {}", self.path.display()))),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                let msg = format!("failed to remove unfinished staging file {}: {e}", self.path.display());
                warn!("{}", bounded_line(&msg));
            }
        }
    }
}
