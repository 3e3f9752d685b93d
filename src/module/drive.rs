//! Provide Loop for Capture.
//!
//! One channel at a time, end to end:
//!
//! ```text
//! Select -> Tune -> Verify (up to 3 attempts) -> Settle -> Capture -> Record score -> Settle
//!   ^                                                                                  |
//!   +----------------------------------------------------------------------------------+
//! ```
//!
//! The loop ends when no channel is below the limit, or on the first fatal error.

use chrono::Local;
use rand::Rng;
use std::thread;
use std::time::Duration;

use crate::module::channel::scheduler::{ChannelScheduler, Priority};
use crate::module::channel::{score::ScoreStore, Channel};
use crate::module::define;
use crate::module::error::{Result, TvcapError};
use crate::module::session::capture::{self, progress_bar, target_size};
use crate::module::session::verify::{self, VerifyPolicy};
use crate::module::tuner::{BatchConfig, Tuner};
use crate::module::util::conf::Config;
use crate::module::util::path::{dir, snapshot, TvcapPath};
use crate::module::vision::Classifier;

/// Run parameters.
#[derive(Debug, Clone)]
pub struct DriveOptions {
    pub limit: u32,           // Snapshots per channel
    pub batch: u32,           // Snapshots per visit
    pub priority: Priority,
    pub pool_size: usize,
    pub max_stall: Duration,
    pub max_skip: Duration,
    pub settle: Duration,     // Pause before and after raw capture
    pub verify: VerifyPolicy,
    pub show_progress: bool,
}

impl DriveOptions {
    pub fn from_conf(conf: &Config) -> Self {
        Self {
            limit: conf.capture.limit,
            batch: conf.capture.batch,
            priority: conf.capture.priority,
            pool_size: conf.capture.pool_size,
            max_stall: Duration::from_secs(conf.capture.max_stall_seconds),
            max_skip: Duration::from_secs(conf.capture.max_skip_seconds),
            settle: Duration::from_millis(conf.capture.settle_millis),
            verify: VerifyPolicy::default(),
            show_progress: true,
        }
    }
}

impl Default for DriveOptions {
    fn default() -> Self {
        Self {
            limit: define::capture::SNAPSHOTS_LIMIT,
            batch: define::capture::SNAPSHOTS_BATCH,
            priority: Priority::Min,
            pool_size: define::capture::CANDIDATE_POOL,
            max_stall: Duration::from_secs(define::capture::MAX_STALL_SECONDS),
            max_skip: Duration::from_secs(define::capture::MAX_SKIP_SECONDS),
            settle: Duration::from_millis(define::capture::SETTLE_MILLIS),
            verify: VerifyPolicy::default(),
            show_progress: true,
        }
    }
}

/// What a run did.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub visits: u32,
    pub matched: u32,
    pub unmatched: u32,
    pub captured: u32,
}

/// Wait for the tuner, then seed the scores from disk.
///
/// Returns `None` without creating any channel directory when the tuner
/// never comes online.
pub fn prepare<T: Tuner + ?Sized>(
    tuner: &mut T,
    path: &TvcapPath,
    channels: &[Channel],
) -> Result<Option<ScoreStore>> {
    if !tuner.wait_online() {
        log::warn!("Power control not online");
        return Ok(None);
    }
    ScoreStore::seed(path, channels).map(Some)
}

/// Capture until every channel reaches `options.limit`.
///
/// Scores are updated in `store` after each capture, including partial ones,
/// before any capture fault is returned.
pub fn run<T, C, R>(
    tuner: &mut T,
    classifier: &mut C,
    channels: &[Channel],
    store: &mut ScoreStore,
    path: &TvcapPath,
    options: &DriveOptions,
    rng: &mut R,
) -> Result<RunSummary>
where
    T: Tuner + ?Sized,
    C: Classifier + ?Sized,
    R: Rng + ?Sized,
{
    let mut summary = RunSummary::default();
    let res = visit_all(tuner, classifier, channels, store, path, options, rng, &mut summary);
    log::info!(
        "Run ended: {} visits, {} matched, {} unmatched, {} snapshots",
        summary.visits,
        summary.matched,
        summary.unmatched,
        summary.captured
    );
    res.map(|_| summary)
}

#[allow(clippy::too_many_arguments)]
fn visit_all<T, C, R>(
    tuner: &mut T,
    classifier: &mut C,
    channels: &[Channel],
    store: &mut ScoreStore,
    path: &TvcapPath,
    options: &DriveOptions,
    rng: &mut R,
    summary: &mut RunSummary,
) -> Result<()>
where
    T: Tuner + ?Sized,
    C: Classifier + ?Sized,
    R: Rng + ?Sized,
{
    let scheduler = ChannelScheduler::new(channels);
    while let Some((idx, score)) = scheduler.next_channel_by_score(
        store,
        options.priority,
        0..options.limit,
        options.pool_size,
        rng,
    ) {
        let channel = channels
            .iter()
            .find(|ch| ch.index == idx)
            .ok_or_else(|| TvcapError::ChannelList(format!("no channel at index {}", idx)))?;
        let target = target_size(options.batch, options.limit, score);
        if target == 0 {
            log::warn!("Batch size is 0, nothing to capture");
            break;
        }
        log::info!(
            "Channel {} selected: {}/{}, capturing {}",
            channel.label,
            score,
            options.limit,
            target
        );
        summary.visits += 1;

        tuner.set_channel(idx)?;
        let verdict = verify::verify(tuner, classifier, channel, &options.verify)?;
        if verdict.matched {
            summary.matched += 1;
        } else {
            summary.unmatched += 1;
            log::warn!("Channel {} unmatched, capturing aside", channel.label);
        }

        let chdir = path.channel_dir(&channel.label, verdict.matched);
        dir::ensure(&chdir)?;
        thread::sleep(options.settle);

        let timestamp = snapshot::timestamp(&Local::now());
        let bar = progress_bar(target, options.show_progress);
        let report = capture::capture(
            tuner,
            BatchConfig::raw(define::capture::TRACK, options.max_stall, options.max_skip),
            &chdir,
            &timestamp,
            target,
            &bar,
        );
        store.record(idx, score + report.captured);
        summary.captured += report.captured;
        if let Some(fault) = report.fault {
            return Err(fault);
        }

        thread::sleep(options.settle);
    }
    Ok(())
}
