//! Input front end that replays fixed command lines on a schedule.

mod job;
mod service;

pub use {
    job::{CRON_CATEGORY, CronJob, JobConfig, jobs_from_table, load_jobs},
    service::CronInputFrontend,
};
