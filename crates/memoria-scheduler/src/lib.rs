//! `memoria-scheduler`: clock that drives the batch compaction pass.
//!
//! | Variant    | Behaviour                          |
//! |------------|------------------------------------|
//! | `Interval` | Repeat every N seconds             |
//! | `Hourly`   | Fire at :MM past every hour (UTC)  |
//! | `Daily`    | Fire at HH:MM UTC every day        |

pub mod engine;
pub mod error;
pub mod schedule;

pub use engine::SchedulerEngine;
pub use error::{Result, SchedulerError};
pub use schedule::{compute_next_run, next_fire};
