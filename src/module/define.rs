//! Module for Constants and Paths Definitions
//!
//! This module defines various constants and paths used throughout the application.

/// System Constants
pub mod system {
    /// Name of the system
    pub const NAME: &str = "tvcap";
}

/// Capture Defaults
pub mod capture {
    /// Snapshots each channel should reach before it stops being scheduled.
    pub const SNAPSHOTS_LIMIT: u32 = 5000;

    /// Upper bound of snapshots taken from one channel per visit.
    pub const SNAPSHOTS_BATCH: u32 = 200;

    /// End the raw capture stream if no new keyframe shows up within this many seconds.
    pub const MAX_STALL_SECONDS: u64 = 20;

    /// Drop buffered frames older than this many seconds.
    pub const MAX_SKIP_SECONDS: u64 = 60;

    /// Number of lowest-scoring channels the scheduler picks from.
    pub const CANDIDATE_POOL: usize = 5;

    /// Pause between verification and raw capture, and after each capture.
    pub const SETTLE_MILLIS: u64 = 1000;

    /// Video track the batches are opened on.
    pub const TRACK: u32 = 1;
}

/// Channel Verification
pub mod verify {
    /// Frames classified per attempt.
    pub const MAX_FRAMES: u32 = 20;

    /// Consecutive top-1 matches needed to trust the tuner.
    pub const REQUIRED_MATCHES: u32 = 3;

    /// Total attempts, the first one included.
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Wait after re-tuning before classifying again.
    pub const RETUNE_WAIT_MILLIS: u64 = 1000;
}

/// File Paths
pub mod path {
    // Channel List
    pub const CHANNEL_FILE: &str = "channels.map";

    // Configuration File
    pub const CONF_FILE: &str = "tvcap.toml";

    // Log Directory
    pub const LOG_DIR: &str = "log";

    // Classifier Assets
    pub const MODEL_DIR: &str = "model";

    // Snapshot Root
    pub const SNAP_DIR: &str = "snap";

    // Snapshots taken while the tuner could not be verified
    pub const UNMATCHED_DIR: &str = "unmatched";

    // Snapshot file name prefix and extension
    pub const SNAP_PREFIX: &str = "snap-";
    pub const SNAP_EXT: &str = "jpg";
}
