//! Error Types
//!
//! One enum per collaborator and a top-level one for the capture run.

use thiserror::Error;

/// Failures raised by a frame source / tuner.
#[derive(Error, Debug)]
pub enum TunerError {
    #[error("Device error: {0}")]
    Device(#[from] std::io::Error),

    #[error("Capture start failed: {0}")]
    Start(String),

    #[error("Frame decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("System call failed: {0}")]
    Sys(#[from] nix::Error),

    #[error("Command `{command}` failed: {message}")]
    Command { command: String, message: String },

    #[error("Unknown channel index {0}")]
    UnknownChannel(usize),

    #[error("Unsupported track {0}")]
    UnsupportedTrack(u32),

    #[error("A batch is already open")]
    BatchBusy,

    #[error("No batch is open")]
    NoBatch,

    #[error("Interrupted")]
    Interrupted,
}

impl TunerError {
    pub fn command<S: Into<String>>(command: S, message: S) -> Self {
        Self::Command {
            command: command.into(),
            message: message.into(),
        }
    }
}

/// Failures raised by a logo classifier.
#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("Model error: {0}")]
    Model(#[from] ort::OrtError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Model returned {outputs} scores for {labels} labels")]
    LabelMismatch { outputs: usize, labels: usize },

    #[error("Model returned no output")]
    EmptyOutput,
}

/// Errors that end a capture run.
#[derive(Error, Debug)]
pub enum TvcapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Configuration write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error("Tuner error: {0}")]
    Tuner(#[from] TunerError),

    #[error("Classifier error: {0}")]
    Classify(#[from] ClassifyError),

    #[error("Snapshot write error: {0}")]
    Snapshot(#[from] image::ImageError),

    #[error("Frame stream ended while verifying channel {0}")]
    StreamEnded(String),

    #[error("Channel list error: {0}")]
    ChannelList(String),

    #[error("Logger error: {0}")]
    Logger(String),

    #[error("Signal handler error: {0}")]
    Signal(#[from] ctrlc::Error),
}

impl TvcapError {
    /// Whether the run was stopped from outside rather than by a fault.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, Self::Tuner(TunerError::Interrupted))
    }
}

pub type Result<T> = std::result::Result<T, TvcapError>;
