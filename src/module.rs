//! This module contains all the sub-modules of the project.

pub mod channel; // Channel module: Channel list, scores and selection.
pub mod define; // Definition module: Contains definitions and constants used throughout the project.
pub mod drive; // Drive module: Runs the capture loop over all channels.
pub mod error; // Error module: Error types shared by the other modules.
pub mod session; // Session module: Verification and capture batches.
pub mod tuner; // Tuner module: Frame sources and channel switching.
pub mod util; // Utility module: Provides configuration, paths and initialization.
pub mod vision; // Vision module: Logo classification.
