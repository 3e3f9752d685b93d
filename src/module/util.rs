//! Configuration, dataset layout and start-up helpers.

pub mod conf; // tvcap.toml handling
pub mod init; // Start-up resources
pub mod path; // Dataset directories and snapshot names
