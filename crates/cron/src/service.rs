use std::time::Duration;

use {
    async_trait::async_trait,
    cmdbot_channels::{CommandCallback, InputFrontend, Result},
    tokio::time::{Instant, MissedTickBehavior},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info},
};

use crate::job::CronJob;

const TICK: Duration = Duration::from_secs(1);

/// Emits each job's command line at start and then once per interval.
///
/// Schedules are checked on a one-second tick, so intervals are honored to
/// within a second. Fire counts are kept per `run`.
pub struct CronInputFrontend {
    jobs: Vec<CronJob>,
    cancel: CancellationToken,
}

impl CronInputFrontend {
    pub fn new(jobs: Vec<CronJob>) -> Self {
        Self {
            jobs,
            cancel: CancellationToken::new(),
        }
    }

    pub fn jobs(&self) -> &[CronJob] {
        &self.jobs
    }

    /// Fire every job that is due at `elapsed`, bumping its count.
    fn fire_due(&self, elapsed: Duration, counts: &mut [u32], callback: &CommandCallback) {
        for (job, count) in self.jobs.iter().zip(counts.iter_mut()) {
            if elapsed >= job.interval.saturating_mul(*count) {
                debug!(
                    content = %job.cmdline.content(),
                    fired = *count,
                    "cron job fired"
                );
                callback(job.cmdline.clone());
                *count += 1;
            }
        }
    }
}

#[async_trait]
impl InputFrontend for CronInputFrontend {
    async fn run(&self, callback: CommandCallback) -> Result<()> {
        info!(jobs = self.jobs.len(), "cron front end started");
        let start = Instant::now();
        let mut counts = vec![0; self.jobs.len()];
        let mut ticker = tokio::time::interval(TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                _ = ticker.tick() => self.fire_due(start.elapsed(), &mut counts, &callback),
            }
        }
        info!("cron front end stopped");
        Ok(())
    }

    async fn kill(&self) {
        self.cancel.cancel();
    }
}
