//! Scripted tuner for tests.

use chrono::Local;
use image::{DynamicImage, RgbImage};
use std::collections::VecDeque;

use super::{BatchConfig, Frame, FrameMeta, Tuner};
use crate::module::error::TunerError;

/// Calls observed by the scripted tuner.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    SetChannel(usize),
    Open(BatchConfig),
    OpenFailed,
    Pull,
    Close,
}

/// Plays back a scripted sequence of pull results.
///
/// Once the script runs out every pull returns end-of-stream.
pub struct ScriptedTuner {
    pub script: VecDeque<Result<Option<Frame>, TunerError>>,
    pub events: Vec<Event>,
    pub online: bool,
    pub fail_open: bool,
    open: bool,
    seq: u64,
}

impl ScriptedTuner {
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
            events: vec![],
            online: true,
            fail_open: false,
            open: false,
            seq: 0,
        }
    }

    /// A tuner that delivers `n` frames, then ends the stream.
    pub fn with_frames(n: usize) -> Self {
        let mut tuner = Self::new();
        for _ in 0..n {
            tuner.push_frame();
        }
        tuner
    }

    pub fn push_frame(&mut self) {
        self.seq += 1;
        let frame = Frame {
            image: DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 2, image::Rgb([16, 32, 64]))),
            meta: FrameMeta {
                seq: self.seq,
                captured_at: Local::now(),
                keyframe: true,
            },
        };
        self.script.push_back(Ok(Some(frame)));
    }

    pub fn push_end(&mut self) {
        self.script.push_back(Ok(None));
    }

    pub fn push_error(&mut self, e: TunerError) {
        self.script.push_back(Err(e));
    }

    fn count(&self, f: impl Fn(&Event) -> bool) -> usize {
        self.events.iter().filter(|e| f(e)).count()
    }

    pub fn opens(&self) -> usize {
        self.count(|e| matches!(e, Event::Open(_)))
    }

    pub fn closes(&self) -> usize {
        self.count(|e| *e == Event::Close)
    }

    pub fn pulls(&self) -> usize {
        self.count(|e| *e == Event::Pull)
    }

    pub fn tunes(&self) -> usize {
        self.count(|e| matches!(e, Event::SetChannel(_)))
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl Tuner for ScriptedTuner {
    fn set_channel(&mut self, index: usize) -> Result<(), TunerError> {
        self.events.push(Event::SetChannel(index));
        Ok(())
    }

    fn open_batch(&mut self, config: BatchConfig) -> Result<(), TunerError> {
        if self.fail_open {
            self.events.push(Event::OpenFailed);
            return Err(TunerError::Start("scripted".to_string()));
        }
        if self.open {
            return Err(TunerError::BatchBusy);
        }
        self.open = true;
        self.events.push(Event::Open(config));
        Ok(())
    }

    fn pull_frame(&mut self) -> Result<Option<Frame>, TunerError> {
        if !self.open {
            return Err(TunerError::NoBatch);
        }
        self.events.push(Event::Pull);
        self.script.pop_front().unwrap_or(Ok(None))
    }

    fn close_batch(&mut self) -> Result<(), TunerError> {
        if !self.open {
            return Err(TunerError::NoBatch);
        }
        self.open = false;
        self.events.push(Event::Close);
        Ok(())
    }

    fn wait_online(&mut self) -> bool {
        self.online
    }
}
