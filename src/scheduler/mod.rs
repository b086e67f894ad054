//! Cron-driven trigger process for theme generation runs.
//!
//! `ThemeScheduler` owns the loop; `SchedulerHandle` is the cloneable side used by
//! the HTTP surface for manual runs and status.

mod handle;
mod schedule;
mod worker;

pub use handle::{NextRun, ScheduledTheme, SchedulerHandle, ThemeInfo};
pub use schedule::{Schedule, ScheduleError};
pub use worker::{create_scheduler, ThemeScheduler};
