//! V4L2 Capture-Card Tuner
//!
//! Frames come from an MJPEG capture device wired to the set-top box output.
//! Channel switching and the power probe are external shell commands.

use image::{imageops::FilterType, DynamicImage, ImageFormat};
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use rscam::{Camera, Config};
use std::os::fd::{AsRawFd, BorrowedFd, RawFd};
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use std::thread;

use super::keyframe::KeyframeDetector;
use super::{BatchConfig, Frame, FrameMeta, FrameMode, OutputKind, Tuner};
use crate::module::channel::Channel;
use crate::module::define;
use crate::module::error::TunerError;
use crate::module::util::conf;

/// State of the open batch.
struct Batch {
    cap: Camera,
    config: BatchConfig,
    detector: KeyframeDetector,
    last_key_at: Instant, // Last keyframe, or the last (re)tune
    seq: u64,
}

/// Tuner backed by a V4L2 device.
pub struct V4l2Tuner {
    conf: conf::Tuner,
    crop: conf::Crop,
    channels: Vec<Channel>,
    interrupt: Arc<AtomicBool>, // Raised by the signal handler
    batch: Option<Batch>,
}

impl V4l2Tuner {
    /// Creates a tuner. The device is only opened while a batch is open.
    ///
    /// # Arguments
    ///
    /// * `conf` - Application configuration.
    /// * `channels` - Channel list, indexes match the scheduler's.
    /// * `interrupt` - Checked before every frame; when set, pulls fail with `Interrupted`.
    ///
    pub fn new(conf: &conf::Config, channels: Vec<Channel>, interrupt: Arc<AtomicBool>) -> Self {
        Self {
            conf: conf.tuner.clone(),
            crop: conf.crop,
            channels,
            interrupt,
            batch: None,
        }
    }

    fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst)
    }
}

/// Run a shell command, failing on a non-zero exit status.
fn run_shell(cmd: &str) -> Result<(), TunerError> {
    log::debug!("Run: {}", cmd);
    let output = Command::new("sh").args(["-c", cmd]).output()?;
    if output.status.success() {
        Ok(())
    } else {
        Err(TunerError::command(
            cmd.to_string(),
            format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        ))
    }
}

/// Age of a V4L2 buffer timestamp (microseconds, monotonic clock).
fn frame_age(timestamp_us: u64) -> Result<Duration, TunerError> {
    let now = nix::time::clock_gettime(nix::time::ClockId::CLOCK_MONOTONIC)?;
    let now = Duration::new(now.tv_sec() as u64, now.tv_nsec() as u32);
    Ok(now.saturating_sub(Duration::from_micros(timestamp_us)))
}

/// Longest single wait on the device before the interrupt flag is checked again.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Wait up to `timeout` for `fd` to become readable.
fn wait_readable(fd: RawFd, timeout: Duration) -> Result<bool, TunerError> {
    // SAFETY: callers pass the fd of a device they keep open during the call.
    let fd = unsafe { BorrowedFd::borrow_raw(fd) };
    let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
    let millis = timeout.as_millis().min(u16::MAX as u128) as u16;
    match poll(&mut fds, PollTimeout::from(millis)) {
        Ok(n) => Ok(n > 0),
        // A signal arrived, let the caller look at the interrupt flag.
        Err(Errno::EINTR) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Block until the device has a frame ready.
///
/// Returns `Ok(false)` once `max_stall` has passed since `since` without one,
/// and `Interrupted` as soon as `interrupt` is raised.
fn await_frame(
    fd: RawFd,
    interrupt: &AtomicBool,
    since: Instant,
    max_stall: Option<Duration>,
) -> Result<bool, TunerError> {
    loop {
        if interrupt.load(Ordering::SeqCst) {
            return Err(TunerError::Interrupted);
        }
        if wait_readable(fd, POLL_INTERVAL)? {
            return Ok(true);
        }
        if let Some(max_stall) = max_stall {
            if since.elapsed() > max_stall {
                return Ok(false);
            }
        }
    }
}

/// Scale a frame to the reference size and cut out the logo region.
pub fn crop_logo(img: &DynamicImage, crop: &conf::Crop) -> DynamicImage {
    img.resize_exact(crop.scale_width, crop.scale_height, FilterType::Triangle)
        .crop_imm(crop.x, crop.y, crop.width, crop.height)
}

impl Tuner for V4l2Tuner {
    fn set_channel(&mut self, index: usize) -> Result<(), TunerError> {
        let channel = self
            .channels
            .get(index)
            .ok_or(TunerError::UnknownChannel(index))?;
        let cmd = self.conf.tune_command.replace("{channel}", &channel.tune_key);
        run_shell(&cmd)?;
        log::info!("Tuned to {} ({})", channel.label, channel.tune_key);
        // Whatever comes next is new content.
        if let Some(batch) = self.batch.as_mut() {
            batch.detector.reset();
            batch.last_key_at = Instant::now();
        }
        Ok(())
    }

    fn open_batch(&mut self, config: BatchConfig) -> Result<(), TunerError> {
        if self.batch.is_some() {
            return Err(TunerError::BatchBusy);
        }
        if config.track != define::capture::TRACK {
            return Err(TunerError::UnsupportedTrack(config.track));
        }
        let mut cap = Camera::new(&self.conf.device)?;
        cap.start(&Config {
            interval: (1, self.conf.fps),
            resolution: (self.conf.width, self.conf.height),
            format: b"MJPG",
            nbuffers: 4,
            ..Default::default()
        })
        .map_err(|e| TunerError::Start(format!("{}: {:?}", self.conf.device, e)))?;

        self.batch = Some(Batch {
            cap,
            config,
            detector: KeyframeDetector::new(self.conf.delta_threshold),
            last_key_at: Instant::now(),
            seq: 0,
        });
        Ok(())
    }

    fn pull_frame(&mut self) -> Result<Option<Frame>, TunerError> {
        loop {
            if self.interrupted() {
                return Err(TunerError::Interrupted);
            }
            let batch = self.batch.as_mut().ok_or(TunerError::NoBatch)?;
            let ready = await_frame(
                batch.cap.as_raw_fd(),
                &self.interrupt,
                batch.last_key_at,
                batch.config.max_stall,
            )?;
            if !ready {
                log::warn!("No frame from {} in time, stream stalled", self.conf.device);
                return Ok(None);
            }
            let raw = batch.cap.capture()?;

            if let Some(max_skip) = batch.config.max_skip {
                let age = frame_age(raw.get_timestamp())?;
                if age > max_skip {
                    log::debug!("Skip frame buffered {:?} ago", age);
                    continue;
                }
            }

            let img = image::load_from_memory_with_format(&raw[..], ImageFormat::Jpeg)?;
            let keyframe = batch.detector.is_keyframe(&img);
            if batch.config.mode == FrameMode::KeyframeDelta && !keyframe {
                if let Some(max_stall) = batch.config.max_stall {
                    if batch.last_key_at.elapsed() > max_stall {
                        log::warn!("No new keyframe for {:?}, stream stalled", max_stall);
                        return Ok(None);
                    }
                }
                continue;
            }
            if keyframe {
                batch.last_key_at = Instant::now();
            }

            batch.seq += 1;
            let image = match batch.config.output {
                OutputKind::LogoCrop => crop_logo(&img, &self.crop),
                OutputKind::RawImage => img,
            };
            return Ok(Some(Frame {
                image,
                meta: FrameMeta {
                    seq: batch.seq,
                    captured_at: chrono::Local::now(),
                    keyframe,
                },
            }));
        }
    }

    fn close_batch(&mut self) -> Result<(), TunerError> {
        let mut batch = self.batch.take().ok_or(TunerError::NoBatch)?;
        log::debug!("Stop capture after {} frames", batch.seq);
        batch.cap.stop()?;
        Ok(())
    }

    fn wait_online(&mut self) -> bool {
        if self.conf.probe_command.is_empty() {
            return true;
        }
        let deadline = Instant::now() + Duration::from_secs(self.conf.online_timeout_seconds);
        loop {
            match run_shell(&self.conf.probe_command) {
                Ok(()) => return true,
                Err(e) => log::debug!("Not online yet: {}", e),
            }
            if Instant::now() >= deadline || self.interrupted() {
                log::warn!("Power control did not come online");
                return false;
            }
            thread::sleep(Duration::from_secs(1));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Write;
    use std::os::unix::net::UnixStream;

    fn crop() -> conf::Crop {
        conf::Crop {
            scale_width: 640,
            scale_height: 360,
            x: 20,
            y: 4,
            width: 160,
            height: 80,
        }
    }

    #[test]
    fn crop_logo_test() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(1280, 720, Rgb([1, 2, 3])));
        let logo = crop_logo(&img, &crop());
        assert_eq!((logo.width(), logo.height()), (160, 80));
    }

    #[test]
    fn run_shell_test() {
        assert!(run_shell("true").is_ok());
        assert!(matches!(
            run_shell("echo nope >&2; exit 3"),
            Err(TunerError::Command { .. })
        ));
    }

    fn tuner(tune_command: &str, probe_command: &str) -> V4l2Tuner {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = crate::module::util::conf::toml::load(&tmp.path().join("c.toml")).unwrap();
        config.tuner.tune_command = tune_command.to_string();
        config.tuner.probe_command = probe_command.to_string();
        config.tuner.online_timeout_seconds = 0;
        let channels = crate::module::channel::parse("101 65\n102\n").unwrap();
        V4l2Tuner::new(&config, channels, Arc::new(AtomicBool::new(false)))
    }

    #[test]
    fn set_channel_substitutes_tune_key_test() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("tuned");
        let mut tuner = tuner(&format!("echo {{channel}} > {}", out.display()), "");
        tuner.set_channel(0).unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap().trim(), "65");
        tuner.set_channel(1).unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap().trim(), "102");
        assert!(matches!(
            tuner.set_channel(2),
            Err(TunerError::UnknownChannel(2))
        ));
    }

    #[test]
    fn wait_online_test() {
        assert!(tuner("true", "").wait_online());
        assert!(tuner("true", "true").wait_online());
        assert!(!tuner("true", "false").wait_online());
    }

    #[test]
    fn batch_misuse_test() {
        let mut tuner = tuner("true", "");
        assert!(matches!(tuner.pull_frame(), Err(TunerError::NoBatch)));
        assert!(matches!(tuner.close_batch(), Err(TunerError::NoBatch)));
        let mut cfg = BatchConfig::logo(define::capture::TRACK);
        cfg.track = 2;
        assert!(matches!(
            tuner.open_batch(cfg),
            Err(TunerError::UnsupportedTrack(2))
        ));
    }

    #[test]
    fn await_frame_ready_test() {
        let (mut tx, rx) = UnixStream::pair().unwrap();
        tx.write_all(b"x").unwrap();
        let flag = AtomicBool::new(false);
        assert!(await_frame(rx.as_raw_fd(), &flag, Instant::now(), None).unwrap());
    }

    #[test]
    fn await_frame_stalls_test() {
        let (_tx, rx) = UnixStream::pair().unwrap();
        let flag = AtomicBool::new(false);
        let since = Instant::now();
        let ready =
            await_frame(rx.as_raw_fd(), &flag, since, Some(Duration::from_millis(50))).unwrap();
        assert!(!ready);
        assert!(since.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn await_frame_interrupted_while_silent_test() {
        let (_tx, rx) = UnixStream::pair().unwrap();
        let flag = Arc::new(AtomicBool::new(false));
        let setter = flag.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            setter.store(true, Ordering::SeqCst);
        });
        // No stall limit: only the interrupt can end the wait.
        let res = await_frame(rx.as_raw_fd(), &flag, Instant::now(), None);
        handle.join().unwrap();
        assert!(matches!(res, Err(TunerError::Interrupted)));
    }

    #[test]
    fn interrupt_test() {
        let mut tuner = tuner("true", "");
        tuner.interrupt.store(true, Ordering::SeqCst);
        assert!(matches!(tuner.pull_frame(), Err(TunerError::Interrupted)));
    }
}
