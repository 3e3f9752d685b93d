//! Snapshot Capture
//!
//! Pulls raw keyframes into the channel directory until the batch target is
//! met or the stream ends. Whatever was written before a failure stays on
//! disk and is reported, so the caller can account for it.

use image::{codecs::jpeg::JpegEncoder, DynamicImage};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::module::error::{Result, TvcapError};
use crate::module::tuner::{BatchConfig, BatchGuard, Tuner};
use crate::module::util::path::snapshot;

const JPEG_QUALITY: u8 = 100;

/// Outcome of a capture session.
#[derive(Debug)]
pub struct CaptureReport {
    pub captured: u32, // Snapshots written
    pub target: u32,
    pub fault: Option<TvcapError>, // Set when the session stopped on an error
}

/// Snapshots to take in one visit: never past `limit`, never more than `batch`.
pub fn target_size(batch: u32, limit: u32, score: u32) -> u32 {
    batch.min(limit.saturating_sub(score))
}

/// Progress bar styled `  12: [=====.....]`.
pub fn progress_bar(target: u32, visible: bool) -> ProgressBar {
    let bar = if visible {
        ProgressBar::new(target as u64)
    } else {
        ProgressBar::hidden()
    };
    let style = ProgressStyle::with_template("{pos:>4}: [{bar:100}] {len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=.");
    bar.set_style(style);
    bar.set_length(target as u64);
    bar
}

/// Run one capture session into `dir`.
///
/// # Arguments
///
/// * `tuner` - Tuner already on the channel.
/// * `config` - Raw keyframe batch with stall and skip limits.
/// * `dir` - Existing channel directory.
/// * `timestamp` - Session stamp used in every file name.
/// * `target` - Snapshots wanted.
/// * `progress` - Advanced after every snapshot.
///
pub fn capture<T: Tuner + ?Sized>(
    tuner: &mut T,
    config: BatchConfig,
    dir: &Path,
    timestamp: &str,
    target: u32,
    progress: &ProgressBar,
) -> CaptureReport {
    let mut captured = 0;
    let fault = match BatchGuard::open(tuner, config) {
        Err(e) => Some(e.into()),
        Ok(mut batch) => {
            let res = fill(&mut batch, dir, timestamp, target, progress, &mut captured);
            let closed = batch.close();
            match (res, closed) {
                (Err(e), _) => Some(e),
                (Ok(()), Err(e)) => Some(e.into()),
                (Ok(()), Ok(())) => None,
            }
        }
    };
    match &fault {
        Some(e) => {
            progress.abandon();
            log::error!("Capture stopped after {}/{}: {}", captured, target, e);
        }
        None => {
            progress.finish();
            log::info!("Captured {}/{} into {}", captured, target, dir.display());
        }
    }
    CaptureReport {
        captured,
        target,
        fault,
    }
}

fn fill<T: Tuner + ?Sized>(
    batch: &mut BatchGuard<'_, T>,
    dir: &Path,
    timestamp: &str,
    target: u32,
    progress: &ProgressBar,
    captured: &mut u32,
) -> Result<()> {
    // The first frame after opening is left over from the session setup.
    if batch.pull()?.is_none() {
        log::warn!("Stream ended before the first frame");
        return Ok(());
    }

    // Numbering continues after an earlier session from the same minute.
    let offset = snapshot::last_seq(dir, timestamp)?;
    while *captured < target {
        let frame = match batch.pull()? {
            Some(frame) => frame,
            None => {
                log::info!("Stream ended at {}/{}", captured, target);
                break;
            }
        };
        let seq = *captured + 1;
        save(
            &frame.image,
            &dir.join(snapshot::file_name(timestamp, offset + seq)),
        )?;
        *captured = seq;
        progress.set_position(seq as u64);
    }
    Ok(())
}

/// Write a snapshot as a JPEG.
///
/// A file that could not be written completely is removed, so it is never
/// counted as a snapshot.
fn save(image: &DynamicImage, path: &Path) -> Result<()> {
    let res = write_jpeg(image, path);
    if let Err(e) = &res {
        let partial = fs::symlink_metadata(path)
            .map(|m| m.is_file())
            .unwrap_or(false);
        if partial {
            if let Err(rm) = fs::remove_file(path) {
                log::warn!("Could not remove partial {}: {}", path.display(), rm);
            }
        }
        log::error!("Failed to save {}: {}", path.display(), e);
    } else {
        log::trace!("Saved {}", path.display());
    }
    res
}

fn write_jpeg(image: &DynamicImage, path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY).encode_image(&image.to_rgb8())?;
    writer.flush()?;
    Ok(())
}
