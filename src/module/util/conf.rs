//! Config Handler.

use serde::{Deserialize, Serialize};

use crate::module::channel::scheduler::Priority;

/// Provides TOML config file handling.
pub mod toml {

    use super::DEFAULT_CONFIG;
    use crate::module::error::Result;
    use std::fs::File;
    use std::io::prelude::*;
    use std::path::Path;

    /// Loads a configuration file from the given path.
    /// If not found, generates a default config file there.
    ///
    /// # Arguments
    ///
    /// * `path` - The configuration file location.
    ///
    pub fn load(path: &Path) -> Result<super::Config> {
        if !path.is_file() {
            // Create the default config if it doesn't exist
            let config: super::Config = toml::from_str(DEFAULT_CONFIG)?;
            save(path, &config)?;
            log::info!("Default config written to {}", path.display());
        }

        let conf_str: String = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&conf_str)?)
    }

    /// Saves a configuration file to the given path.
    ///
    /// # Arguments
    ///
    /// * `path` - The file the configuration should be saved to.
    /// * `conf` - The configuration data to be saved.
    ///
    pub fn save(path: &Path, conf: &super::Config) -> Result<()> {
        let toml_str = toml::to_string(conf)?;
        let mut file = File::create(path)?;
        file.write_all(toml_str.as_bytes())?;
        Ok(())
    }
}

/// Represents the configuration data structure.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub system: System,
    pub capture: Capture,
    pub tuner: Tuner,
    pub crop: Crop,
    pub model: Model,
}

/// Represents system-related configuration parameters.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct System {
    pub log_level: String,
}

/// Represents capture scheduling parameters.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Capture {
    pub limit: u32,
    pub batch: u32,
    pub max_stall_seconds: u64,
    pub max_skip_seconds: u64,
    pub pool_size: usize,
    pub settle_millis: u64,
    #[serde(default)]
    pub priority: Priority,
}

/// Represents frame source parameters.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Tuner {
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub tune_command: String,
    pub probe_command: String,
    pub online_timeout_seconds: u64,
    pub delta_threshold: f64,
}

/// Represents the logo crop geometry.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct Crop {
    pub scale_width: u32,
    pub scale_height: u32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Represents classifier model parameters.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Model {
    pub file: String,
    pub labels: String,
    pub intra_threads: i16,
}

// Default configuration data in TOML format
const DEFAULT_CONFIG: &str = r#"
[system]
  log_level = 'INFO' # Log level ('DEBUG', 'INFO', 'WARN', 'ERROR')

[capture]
  limit = 5000 # Snapshots per channel
  batch = 200 # Snapshots per channel visit
  max_stall_seconds = 20 # End raw capture when no new keyframe arrives for this long
  max_skip_seconds = 60 # Drop buffered frames older than this
  pool_size = 5 # Pick randomly among this many lowest-scoring channels
  settle_millis = 1000 # Pause around raw capture
  priority = 'min' # 'min' fills the emptiest channels first, 'max' finishes the fullest first

[tuner]
  device = '/dev/video0' # V4L2 capture device
  width = 1280 # Capture width
  height = 720 # Capture height
  fps = 30 # Capture rate
  tune_command = 'tvctl tune {channel}' # Shell command switching the set-top box, {channel} is the tune key
  probe_command = '' # Shell command exiting 0 once the box is powered on (empty: always online)
  online_timeout_seconds = 60 # How long to wait for the probe
  delta_threshold = 0.05 # Histogram distance above which a frame counts as a new keyframe

[crop]
  scale_width = 640 # Frame is scaled to this size before cropping
  scale_height = 360
  x = 20 # Logo region
  y = 4
  width = 160
  height = 80

[model]
  file = 'tvlogo.onnx' # Under BASEDIR/model
  labels = 'labels.txt' # One label per line, in model output order
  intra_threads = 4
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_load_writes_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tvcap.toml");
        let res = toml::load(&path).unwrap();
        assert!(path.is_file());
        assert_eq!(res.capture.limit, 5000);
        assert_eq!(res.capture.batch, 200);
        assert_eq!(res.capture.max_stall_seconds, 20);
        assert_eq!(res.capture.max_skip_seconds, 60);
        assert_eq!(res.crop.width, 160);
        assert_eq!(res.system.log_level, "INFO");
    }

    #[test]
    fn run_load_keeps_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tvcap.toml");
        let mut conf = toml::load(&path).unwrap();
        conf.capture.batch = 17;
        toml::save(&path, &conf).unwrap();
        assert_eq!(toml::load(&path).unwrap().capture.batch, 17);
    }
}
