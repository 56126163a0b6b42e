#![forbid(unsafe_code)]

//! Application services for the progress engine: enrollment lifecycle,
//! playback heartbeats, quiz assessment, SCORM tracking, and the shared
//! completion recalculation they all feed into.

pub mod assessment;
mod completion;
pub mod enrollment;
pub mod error;
pub mod playback;
pub mod scorm;

pub use progress_core::Clock;
