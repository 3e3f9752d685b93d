//! Per-channel snapshot counts.
//!
//! Counts live in memory only. The snapshot files are the source of truth
//! and the store is rebuilt from them at every start.

use std::collections::HashMap;

use super::Channel;
use crate::module::error::Result;
use crate::module::util::path::{dir, snapshot, TvcapPath};

#[derive(Debug, Default, Clone)]
pub struct ScoreStore {
    scores: HashMap<usize, u32>,
}

impl ScoreStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store from the snapshot directories.
    ///
    /// Creates `snap/<label>` for every channel and counts the `snap-*.jpg`
    /// files in it. Unmatched snapshots are not counted.
    pub fn seed(path: &TvcapPath, channels: &[Channel]) -> Result<Self> {
        let mut store = Self::new();
        for ch in channels {
            let chdir = path.channel_dir(&ch.label, true);
            dir::ensure(&chdir)?;
            let n = snapshot::count(&chdir)?;
            log::debug!("Channel {} has {} snapshots", ch.label, n);
            store.record(ch.index, n);
        }
        Ok(store)
    }

    /// Record the known count for a channel, replacing the previous one.
    pub fn record(&mut self, index: usize, count: u32) {
        self.scores.insert(index, count);
    }

    /// Last recorded count, 0 if never recorded.
    pub fn score(&self, index: usize) -> u32 {
        self.scores.get(&index).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::channel::parse;
    use std::fs;

    #[test]
    fn default_score_test() {
        let mut store = ScoreStore::new();
        assert_eq!(store.score(3), 0);
        store.record(3, 7);
        assert_eq!(store.score(3), 7);
        store.record(3, 9);
        assert_eq!(store.score(3), 9);
    }

    #[test]
    fn seed_test() {
        let tmp = tempfile::tempdir().unwrap();
        let path = dir::create_app_sub_dir(tmp.path()).unwrap();
        let channels = parse("101\n102\n103\n").unwrap();

        // Existing progress, one channel already has a directory.
        let ch101 = path.channel_dir("101", true);
        fs::create_dir_all(&ch101).unwrap();
        for i in 1..=4 {
            fs::write(ch101.join(snapshot::file_name("01020304", i)), b"").unwrap();
        }
        fs::write(ch101.join("notes.txt"), b"").unwrap();
        // Unmatched snapshots do not count.
        let un102 = path.channel_dir("102", false);
        fs::create_dir_all(&un102).unwrap();
        fs::write(un102.join(snapshot::file_name("01020304", 1)), b"").unwrap();

        let store = ScoreStore::seed(&path, &channels).unwrap();
        assert_eq!(store.score(0), 4);
        assert_eq!(store.score(1), 0);
        assert_eq!(store.score(2), 0);
        assert!(path.channel_dir("102", true).is_dir());
        assert!(path.channel_dir("103", true).is_dir());
    }

    #[test]
    fn seed_propagates_fs_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let path = dir::create_app_sub_dir(tmp.path()).unwrap();
        let channels = parse("101\n").unwrap();
        // A plain file where the channel directory should go.
        fs::write(path.channel_dir("101", true), b"").unwrap();
        assert!(ScoreStore::seed(&path, &channels).is_err());
    }
}
