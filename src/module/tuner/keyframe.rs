//! Keyframe detection for delta sampling.
//!
//! Downsamples to 64x64 grayscale, builds a 64-bin histogram and compares it
//! with the previous keyframe via chi-squared distance.

use image::{imageops::FilterType, DynamicImage};

const NUM_BINS: usize = 64;
const DOWNSAMPLE_SIZE: u32 = 64;

pub struct KeyframeDetector {
    last_histogram: Option<[f64; NUM_BINS]>,
    threshold: f64,
}

impl KeyframeDetector {
    pub fn new(threshold: f64) -> Self {
        Self {
            last_histogram: None,
            threshold,
        }
    }

    fn compute_histogram(img: &DynamicImage) -> [f64; NUM_BINS] {
        let gray = img
            .resize_exact(DOWNSAMPLE_SIZE, DOWNSAMPLE_SIZE, FilterType::Nearest)
            .to_luma8();

        let mut bins = [0u64; NUM_BINS];
        for pixel in gray.pixels() {
            let bin = (pixel.0[0] as usize * NUM_BINS) / 256;
            bins[bin.min(NUM_BINS - 1)] += 1;
        }

        let total = (DOWNSAMPLE_SIZE * DOWNSAMPLE_SIZE) as f64;
        let mut hist = [0.0f64; NUM_BINS];
        for (i, &count) in bins.iter().enumerate() {
            hist[i] = count as f64 / total;
        }
        hist
    }

    fn chi_squared(a: &[f64; NUM_BINS], b: &[f64; NUM_BINS]) -> f64 {
        let mut sum = 0.0;
        for i in 0..NUM_BINS {
            let denom = a[i] + b[i];
            if denom > 1e-10 {
                let diff = a[i] - b[i];
                sum += (diff * diff) / denom;
            }
        }
        sum
    }

    /// Whether `img` starts a new keyframe. The first frame always does.
    pub fn is_keyframe(&mut self, img: &DynamicImage) -> bool {
        let hist = Self::compute_histogram(img);
        let changed = match &self.last_histogram {
            Some(last) => {
                let distance = Self::chi_squared(last, &hist);
                log::trace!("Keyframe distance {:.4}", distance);
                distance > self.threshold
            }
            None => true,
        };
        if changed {
            self.last_histogram = Some(hist);
        }
        changed
    }

    /// Forget the previous keyframe.
    pub fn reset(&mut self) {
        self.last_histogram = None;
    }
}
