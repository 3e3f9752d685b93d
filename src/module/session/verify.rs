//! Channel Verification
//!
//! A channel switch takes a while to show up on the capture side, and the
//! first frames after it still belong to the previous channel. The tuner is
//! trusted only once the classifier recognises the expected logo in several
//! consecutive frames.

use std::thread;
use std::time::Duration;

use crate::module::channel::Channel;
use crate::module::define;
use crate::module::error::{Result, TvcapError};
use crate::module::tuner::{BatchConfig, BatchGuard, Tuner};
use crate::module::vision::Classifier;

/// Verification limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerifyPolicy {
    pub max_frames: u32,       // Frames per attempt
    pub required_matches: u32, // Consecutive matches to confirm
    pub max_attempts: u32,     // First attempt included
    pub retune_wait: Duration, // Pause after re-tuning
}

impl Default for VerifyPolicy {
    fn default() -> Self {
        Self {
            max_frames: define::verify::MAX_FRAMES,
            required_matches: define::verify::REQUIRED_MATCHES,
            max_attempts: define::verify::MAX_ATTEMPTS,
            retune_wait: Duration::from_millis(define::verify::RETUNE_WAIT_MILLIS),
        }
    }
}

/// Outcome of a verification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub matched: bool,
    pub attempts: u32,
    pub frames: u32, // Frames classified over all attempts
}

/// Confirm that the tuner shows `channel`.
///
/// An unconfirmed channel is not an error: the verdict says `matched: false`.
/// Errors pulling or classifying frames, and the stream ending, are returned
/// after the batch has been closed.
pub fn verify<T, C>(
    tuner: &mut T,
    classifier: &mut C,
    channel: &Channel,
    policy: &VerifyPolicy,
) -> Result<Verdict>
where
    T: Tuner + ?Sized,
    C: Classifier + ?Sized,
{
    let mut batch = BatchGuard::open(tuner, BatchConfig::logo(define::capture::TRACK))?;
    let verdict = confirm(&mut batch, classifier, channel, policy);
    let closed = batch.close();
    let verdict = verdict?;
    closed?;
    Ok(verdict)
}

fn confirm<T, C>(
    batch: &mut BatchGuard<'_, T>,
    classifier: &mut C,
    channel: &Channel,
    policy: &VerifyPolicy,
) -> Result<Verdict>
where
    T: Tuner + ?Sized,
    C: Classifier + ?Sized,
{
    let mut total = 0;
    for attempt in 1..=policy.max_attempts {
        if attempt > 1 {
            batch.set_channel(channel.index)?;
            thread::sleep(policy.retune_wait);
        }

        let mut matches = 0;
        let mut frames = 0;
        while matches < policy.required_matches && frames < policy.max_frames {
            let frame = batch
                .pull()?
                .ok_or_else(|| TvcapError::StreamEnded(channel.label.clone()))?;
            let result = classifier.classify(&frame.image)?;
            log::info!(
                "{} #{} {}: {}",
                channel.label,
                frame.meta.seq,
                frame.meta.captured_at.format("%H:%M:%S%.3f"),
                result
            );
            frames += 1;
            // No partial credit, a stray misclassification starts over.
            if result.is_top(&channel.label) {
                matches += 1;
            } else {
                matches = 0;
            }
        }
        total += frames;

        if matches >= policy.required_matches {
            log::info!("Channel {} confirmed on attempt {}", channel.label, attempt);
            return Ok(Verdict {
                matched: true,
                attempts: attempt,
                frames: total,
            });
        }
        log::warn!(
            "Channel {} not confirmed after {} frames (attempt {}/{})",
            channel.label,
            frames,
            attempt,
            policy.max_attempts
        );
    }
    Ok(Verdict {
        matched: false,
        attempts: policy.max_attempts,
        frames: total,
    })
}
