use std::time::Duration;

use {
    cmdbot_channels::{CommandLine, Error, Result},
    cmdbot_config::{DataStore, Table},
    serde::{Deserialize, Serialize},
};

/// Store category holding `jobs = [...]`.
pub const CRON_CATEGORY: &str = "cron";

/// A command line emitted every `interval`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronJob {
    pub cmdline: CommandLine,
    pub interval: Duration,
}

impl CronJob {
    pub fn new(cmdline: CommandLine, interval: Duration) -> Self {
        Self { cmdline, interval }
    }
}

/// One entry of the `[cron]` section.
///
/// Without `channel` the job is emitted as a direct message from `author`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default)]
    pub channel: Option<String>,
    pub author: String,
    pub content: String,
    pub every_secs: u64,
}

impl TryFrom<JobConfig> for CronJob {
    type Error = Error;

    fn try_from(cfg: JobConfig) -> Result<Self> {
        if cfg.every_secs == 0 {
            return Err(Error::invalid_input(format!(
                "cron job `{}` needs every_secs > 0",
                cfg.content
            )));
        }
        let cmdline = match cfg.channel {
            Some(channel_name) => CommandLine::Message {
                content: cfg.content,
                author: cfg.author,
                channel_name,
            },
            None => CommandLine::DirectMessage {
                content: cfg.content,
                author: cfg.author,
            },
        };
        Ok(Self::new(cmdline, Duration::from_secs(cfg.every_secs)))
    }
}

#[derive(Debug, Default, Deserialize)]
struct CronSection {
    #[serde(default)]
    jobs: Vec<JobConfig>,
}

/// Parse the jobs of a `[cron]` table.
pub fn jobs_from_table(table: Table) -> Result<Vec<CronJob>> {
    let section: CronSection = toml::Value::Table(table)
        .try_into()
        .map_err(|e| Error::invalid_input(format!("invalid [cron] section: {e}")))?;
    section.jobs.into_iter().map(CronJob::try_from).collect()
}

/// Jobs configured under [`CRON_CATEGORY`]; empty when the section is absent.
pub fn load_jobs(store: &dyn DataStore) -> Result<Vec<CronJob>> {
    match store.section(CRON_CATEGORY) {
        Some(table) => jobs_from_table(table),
        None => Ok(Vec::new()),
    }
}
