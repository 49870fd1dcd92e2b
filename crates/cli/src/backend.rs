//! Example command backend: parses prefixed command lines into tasks.

use std::path::{Component, Path, PathBuf};

use {
    cmdbot_channels::{CommandLine, OutputFrontend, Task},
    tracing::{debug, warn},
};

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("could not parse arguments: {0}")]
    Parse(#[from] shell_words::ParseError),

    #[error("unknown command `{name}`, try `{prefix}help`")]
    Unknown { name: String, prefix: String },

    #[error("`{cmd}` takes {expected} argument(s), got {got}")]
    Arity {
        cmd: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("file commands are disabled: set `{FILE_DIR_KEY}` under [{BACKEND_CATEGORY}]")]
    FilesDisabled,

    #[error("file `{0}` is not allowed: name a file inside the file directory")]
    FileNotAllowed(String),

    #[error("file `{name}` not found")]
    FileNotFound {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Store category for backend settings.
pub const BACKEND_CATEGORY: &str = "backend";

/// Directory the file command may attach from.
pub const FILE_DIR_KEY: &str = "file_dir";

/// Turns command lines starting with `prefix` into outbound tasks.
///
/// The file command only attaches files from `file_dir`; without one it is
/// refused.
pub struct Backend {
    prefix: String,
    file_dir: Option<PathBuf>,
}

impl Backend {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            file_dir: None,
        }
    }

    #[must_use]
    pub fn with_file_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.file_dir = Some(dir.into());
        self
    }

    /// Resolve `name` to a regular file inside the file directory.
    ///
    /// Only plain relative names are accepted; symlinks leading out of the
    /// directory are rejected after canonicalization.
    fn resolve_file(&self, name: &str) -> Result<PathBuf, CommandError> {
        let dir = self.file_dir.as_ref().ok_or(CommandError::FilesDisabled)?;
        let relative = Path::new(name);
        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if name.is_empty() || !plain {
            return Err(CommandError::FileNotAllowed(name.to_string()));
        }
        let not_found = |source| CommandError::FileNotFound {
            name: name.to_string(),
            source,
        };
        let root = dir.canonicalize().map_err(not_found)?;
        let path = root.join(relative).canonicalize().map_err(not_found)?;
        if !path.starts_with(&root) || !path.is_file() {
            return Err(CommandError::FileNotAllowed(name.to_string()));
        }
        Ok(path)
    }

    /// Tasks for `line`; empty when it is not a command.
    pub fn handle(&self, line: &CommandLine) -> Result<Vec<Task>, CommandError> {
        let Some(rest) = line.content().strip_prefix(self.prefix.as_str()) else {
            return Ok(Vec::new());
        };
        let words = shell_words::split(rest)?;
        let Some((name, args)) = words.split_first() else {
            return Ok(Vec::new());
        };

        let task = match name.as_str() {
            "msg" | "message" | "m" => {
                let [channel, text] = exact_args("msg", args)?;
                Task::message(channel, text)
            },
            "dm" | "d" => {
                let [user, text] = exact_args("dm", args)?;
                Task::direct_message(user, text)
            },
            "file" | "f" => {
                let [channel, text, file] = exact_args("file", args)?;
                Task::message(channel, text).with_file(self.resolve_file(file)?)
            },
            "reply" | "re" | "r" => {
                let [text] = exact_args("reply", args)?;
                Task::reply(line, text)
            },
            "help" | "h" => Task::reply(line, self.help()),
            _ => {
                return Err(CommandError::Unknown {
                    name: name.clone(),
                    prefix: self.prefix.clone(),
                });
            },
        };
        Ok(vec![task])
    }

    fn help(&self) -> String {
        let p = &self.prefix;
        format!(
            "commands:\n\
             {p}msg|message|m <channel> <text>  send to a channel\n\
             {p}dm|d <user> <text>  send a direct message\n\
             {p}file|f <channel> <text> <file>  send with a file from the file directory\n\
             {p}reply|re|r <text>  answer where the command came from\n\
             {p}help|h  show this list"
        )
    }
}

fn exact_args<'a, const N: usize>(
    cmd: &'static str,
    args: &'a [String],
) -> Result<[&'a str; N], CommandError> {
    if args.len() != N {
        return Err(CommandError::Arity {
            cmd,
            expected: N,
            got: args.len(),
        });
    }
    Ok(std::array::from_fn(|i| args[i].as_str()))
}

/// Run `line` through the backend and execute the resulting tasks.
///
/// Command and delivery errors are reported back to where the line came from.
pub async fn dispatch(backend: &Backend, output: &dyn OutputFrontend, line: &CommandLine) {
    let tasks = match backend.handle(line) {
        Ok(tasks) => tasks,
        Err(e) => {
            debug!(content = %line.content(), error = %e, "command rejected");
            vec![Task::reply(line, format!("error: {e}"))]
        },
    };
    for task in tasks {
        if let Err(e) = output.execute(&task).await {
            warn!(error = %e, "task failed");
            let report = Task::reply(line, format!("error: {e}"));
            if report != task
                && let Err(e) = output.execute(&report).await
            {
                warn!(error = %e, "failed to report task error");
            }
        }
    }
}
