use std::{path::Path, sync::Arc};

use async_trait::async_trait;

use crate::{
    Result,
    cmdline::{CommandLine, Task},
};

/// Receives every command line an input front end produces.
///
/// Invoked synchronously from the front end's event path; implementations
/// must not block.
pub type CommandCallback = Arc<dyn Fn(CommandLine) + Send + Sync>;

/// A source of command lines (chat platform, scheduler, ...).
#[async_trait]
pub trait InputFrontend: Send + Sync {
    /// Start producing command lines into `callback`.
    async fn run(&self, callback: CommandCallback) -> Result<()>;

    /// Stop producing command lines.
    async fn kill(&self);
}

/// A sink for outbound tasks.
#[async_trait]
pub trait OutputFrontend: Send + Sync {
    async fn send_msg(&self, channel_name: &str, text: &str, file: Option<&Path>) -> Result<()>;

    async fn send_dm(&self, user_name: &str, text: &str, file: Option<&Path>) -> Result<()>;

    async fn execute(&self, task: &Task) -> Result<()> {
        match task {
            Task::Message {
                channel_name,
                text,
                file,
            } => self.send_msg(channel_name, text, file.as_deref()).await,
            Task::DirectMessage {
                user_name,
                text,
                file,
            } => self.send_dm(user_name, text, file.as_deref()).await,
        }
    }

    async fn kill(&self);
}
