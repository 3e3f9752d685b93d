//! Path Operations Module
//!
//! This module handles the dataset directory layout and snapshot file naming.

use std::path::{Path, PathBuf};

use crate::module::define;

pub mod dir {
    //! Directory Operations Submodule

    use std::fs;
    use std::io;
    use std::path::Path;

    use super::{TvcapDir, TvcapFile, TvcapPath};
    use crate::module::define;

    /// Create a directory and its parents.
    ///
    /// A directory that already exists, or that another process creates
    /// concurrently, is not an error. Anything else is returned.
    pub fn ensure(path: &Path) -> io::Result<()> {
        match fs::create_dir_all(path) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Create Application Subdirectories and Paths
    ///
    /// Builds the layout rooted at `base` and creates the snapshot and log
    /// directories. The base directory itself must already exist.
    pub fn create_app_sub_dir(base: &Path) -> io::Result<TvcapPath> {
        let snap = base.join(define::path::SNAP_DIR);
        let log = base.join(define::path::LOG_DIR);
        ensure(&snap)?;
        ensure(&log)?;
        Ok(TvcapPath {
            dir: TvcapDir {
                base: base.to_path_buf(),
                unmatched: snap.join(define::path::UNMATCHED_DIR),
                snap,
                model: base.join(define::path::MODEL_DIR),
                log,
            },
            file: TvcapFile {
                channels: base.join(define::path::CHANNEL_FILE),
                conf: base.join(define::path::CONF_FILE),
            },
        })
    }
}

pub mod snapshot {
    //! Snapshot File Naming

    use chrono::{DateTime, TimeZone};
    use std::fs;
    use std::io;
    use std::path::Path;

    use crate::module::define::path::{SNAP_EXT, SNAP_PREFIX};

    /// Minute-resolution session stamp, `MMDDHHmm`.
    pub fn timestamp<Tz: TimeZone>(now: &DateTime<Tz>) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        now.format("%m%d%H%M").to_string()
    }

    /// `snap-MMDDHHmm-NNN.jpg`
    pub fn file_name(timestamp: &str, seq: u32) -> String {
        format!("{}{}-{:03}.{}", SNAP_PREFIX, timestamp, seq, SNAP_EXT)
    }

    /// Whether a file name follows the `snap-*.jpg` pattern.
    pub fn is_snapshot(name: &str) -> bool {
        name.len() > SNAP_PREFIX.len() + SNAP_EXT.len()
            && name.starts_with(SNAP_PREFIX)
            && name.ends_with(&format!(".{}", SNAP_EXT))
    }

    /// Highest sequence number already used in `dir` for `timestamp`, 0 if none.
    pub fn last_seq(dir: &Path, timestamp: &str) -> io::Result<u32> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };
        let prefix = format!("{}{}-", SNAP_PREFIX, timestamp);
        let suffix = format!(".{}", SNAP_EXT);
        let mut last = 0;
        for entry in entries {
            let name = entry?.file_name();
            let seq = name
                .to_str()
                .and_then(|n| n.strip_prefix(&prefix))
                .and_then(|n| n.strip_suffix(&suffix))
                .and_then(|n| n.parse::<u32>().ok());
            if let Some(seq) = seq {
                last = last.max(seq);
            }
        }
        Ok(last)
    }

    /// Count snapshot files directly inside `dir`. A missing directory counts as zero.
    pub fn count(dir: &Path) -> io::Result<u32> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };
        let mut n = 0;
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if entry.file_name().to_str().map_or(false, is_snapshot) {
                n += 1;
            }
        }
        Ok(n)
    }
}

/// Paths of Resources
#[derive(Debug, Clone)]
pub struct TvcapPath {
    /// Directories Paths
    pub dir: TvcapDir,
    /// Files Paths
    pub file: TvcapFile,
}

/// Paths of Directories
#[derive(Debug, Clone)]
pub struct TvcapDir {
    pub base: PathBuf,      // BASEDIR
    pub snap: PathBuf,      // Verified snapshots, one subdirectory per channel
    pub unmatched: PathBuf, // Snapshots of channels that failed verification
    pub model: PathBuf,     // Classifier assets
    pub log: PathBuf,       // Log files
}

/// Paths of Files
#[derive(Debug, Clone)]
pub struct TvcapFile {
    pub channels: PathBuf, // channels.map
    pub conf: PathBuf,     // tvcap.toml
}

impl TvcapPath {
    /// Snapshot directory of a channel.
    pub fn channel_dir(&self, label: &str, matched: bool) -> PathBuf {
        if matched {
            self.dir.snap.join(label)
        } else {
            self.dir.unmatched.join(label)
        }
    }

    /// Log file of the application.
    pub fn log_file(&self) -> PathBuf {
        self.dir.log.join(format!("{}.log", define::system::NAME))
    }

    /// A file inside the model directory.
    pub fn model_file(&self, name: &str) -> PathBuf {
        self.dir.model.join(Path::new(name))
    }
}
