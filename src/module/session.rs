//! Batch Sessions.
//!
//! Each session opens one batch on the tuner, uses it for a single purpose
//! and closes it before returning, whatever the outcome.

pub mod capture;
pub mod verify;
