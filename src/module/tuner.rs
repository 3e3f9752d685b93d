//! Tuner and Frame Source.
//!
//! The tuner is one exclusively owned device shared by verification and
//! capture. A batch is one open-to-close lifetime of frame delivery and only
//! one can be open at a time: [`BatchGuard`] borrows the tuner mutably for as
//! long as the batch lives and closes it when dropped.

pub mod keyframe;
#[cfg(test)]
pub mod mock;
pub mod v4l2;

use chrono::{DateTime, Local};
use image::DynamicImage;
use std::time::Duration;

use crate::module::error::TunerError;

/// What a batch delivers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputKind {
    LogoCrop, // Scaled and cropped to the logo region, ready for the classifier
    RawImage, // Full frame as captured
}

/// How frames are sampled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameMode {
    KeyframeMixing, // Every frame, changed or not
    KeyframeDelta,  // Only frames that differ from the previous keyframe
}

/// Batch parameters, fixed for the lifetime of one batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchConfig {
    pub track: u32,
    pub output: OutputKind,
    pub mode: FrameMode,
    pub max_stall: Option<Duration>, // End the stream when no keyframe arrives for this long
    pub max_skip: Option<Duration>,  // Drop frames older than this
}

impl BatchConfig {
    /// Classifier input for channel verification.
    pub fn logo(track: u32) -> Self {
        Self {
            track,
            output: OutputKind::LogoCrop,
            mode: FrameMode::KeyframeMixing,
            max_stall: None,
            max_skip: None,
        }
    }

    /// Training snapshots.
    pub fn raw(track: u32, max_stall: Duration, max_skip: Duration) -> Self {
        Self {
            track,
            output: OutputKind::RawImage,
            mode: FrameMode::KeyframeDelta,
            max_stall: Some(max_stall),
            max_skip: Some(max_skip),
        }
    }
}

/// Frame metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameMeta {
    pub seq: u64,                     // Arrival order within the batch, from 1
    pub captured_at: DateTime<Local>, // Wall clock at delivery
    pub keyframe: bool,
}

/// One delivered frame.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: DynamicImage,
    pub meta: FrameMeta,
}

/// Contract the capture engine needs from a tuner / frame source.
pub trait Tuner {
    /// Switch to the channel at `index` in the channel list.
    fn set_channel(&mut self, index: usize) -> Result<(), TunerError>;

    /// Start delivering frames.
    fn open_batch(&mut self, config: BatchConfig) -> Result<(), TunerError>;

    /// Block until the next frame. `Ok(None)` marks the end of the stream,
    /// including a stall.
    fn pull_frame(&mut self) -> Result<Option<Frame>, TunerError>;

    /// Stop delivering frames and release the device.
    fn close_batch(&mut self) -> Result<(), TunerError>;

    /// Wait for the set-top box to come online.
    fn wait_online(&mut self) -> bool;
}

/// An open batch.
///
/// Closes the batch exactly once: either through [`BatchGuard::close`] or,
/// on early return and unwinding, when dropped.
pub struct BatchGuard<'a, T: Tuner + ?Sized> {
    tuner: &'a mut T,
    open: bool,
}

impl<'a, T: Tuner + ?Sized> BatchGuard<'a, T> {
    /// Open a batch on `tuner`.
    pub fn open(tuner: &'a mut T, config: BatchConfig) -> Result<Self, TunerError> {
        tuner.open_batch(config)?;
        log::debug!("Batch opened: {:?}", config);
        Ok(Self { tuner, open: true })
    }

    pub fn pull(&mut self) -> Result<Option<Frame>, TunerError> {
        self.tuner.pull_frame()
    }

    /// Re-tune while the batch stays open.
    pub fn set_channel(&mut self, index: usize) -> Result<(), TunerError> {
        self.tuner.set_channel(index)
    }

    /// Close the batch and report the outcome.
    pub fn close(mut self) -> Result<(), TunerError> {
        self.open = false;
        log::debug!("Batch closed");
        self.tuner.close_batch()
    }
}

impl<'a, T: Tuner + ?Sized> Drop for BatchGuard<'a, T> {
    fn drop(&mut self) {
        if self.open {
            self.open = false;
            if let Err(e) = self.tuner.close_batch() {
                log::error!("Closing batch failed: {}", e);
            } else {
                log::debug!("Batch closed on unwind");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{Event, ScriptedTuner};
    use super::*;

    #[test]
    fn guard_closes_once_on_close_test() {
        let mut tuner = ScriptedTuner::with_frames(2);
        let mut guard = BatchGuard::open(&mut tuner, BatchConfig::logo(1)).unwrap();
        assert!(guard.pull().unwrap().is_some());
        guard.close().unwrap();
        assert_eq!(tuner.closes(), 1);
        assert_eq!(tuner.opens(), 1);
    }

    #[test]
    fn guard_closes_once_on_drop_test() {
        let mut tuner = ScriptedTuner::with_frames(0);
        {
            let mut guard = BatchGuard::open(&mut tuner, BatchConfig::logo(1)).unwrap();
            assert!(guard.pull().unwrap().is_none());
        }
        assert_eq!(tuner.closes(), 1);
    }

    #[test]
    fn guard_closes_on_error_path_test() {
        fn body(tuner: &mut ScriptedTuner) -> Result<(), TunerError> {
            let mut guard = BatchGuard::open(tuner, BatchConfig::logo(1))?;
            guard.pull()?;
            guard.close()
        }
        let mut tuner = ScriptedTuner::with_frames(0);
        tuner.push_error(TunerError::Interrupted);
        assert!(matches!(body(&mut tuner), Err(TunerError::Interrupted)));
        assert_eq!(tuner.closes(), 1);
    }

    #[test]
    fn failed_open_is_not_closed_test() {
        let mut tuner = ScriptedTuner::with_frames(0);
        tuner.fail_open = true;
        assert!(BatchGuard::open(&mut tuner, BatchConfig::logo(1)).is_err());
        assert_eq!(tuner.closes(), 0);
        assert_eq!(tuner.events, vec![Event::OpenFailed]);
    }

    #[test]
    fn raw_config_test() {
        let cfg = BatchConfig::raw(1, Duration::from_secs(20), Duration::from_secs(60));
        assert_eq!(cfg.output, OutputKind::RawImage);
        assert_eq!(cfg.mode, FrameMode::KeyframeDelta);
        assert_eq!(cfg.max_stall, Some(Duration::from_secs(20)));
        assert_eq!(cfg.max_skip, Some(Duration::from_secs(60)));
        let cfg = BatchConfig::logo(1);
        assert_eq!(cfg.output, OutputKind::LogoCrop);
        assert_eq!(cfg.mode, FrameMode::KeyframeMixing);
        assert_eq!(cfg.max_stall, None);
    }
}
