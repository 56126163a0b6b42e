#![forbid(unsafe_code)]

pub mod aggregate;
pub mod grading;
pub mod intervals;
pub mod model;
pub mod policy;
pub mod time;

pub use time::Clock;
