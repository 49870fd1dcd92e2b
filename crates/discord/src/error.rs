use std::{fmt, path::PathBuf};

use cmdbot_channels::Error as ChannelError;

/// What kind of name failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationKind {
    Channel,
    User,
}

impl fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel => write!(f, "channel"),
            Self::User => write!(f, "user"),
        }
    }
}

/// Errors specific to the Discord front ends.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no Discord token configured: set `token` under [{category}] in {}", .config_path.display())]
    MissingToken {
        category: String,
        config_path: PathBuf,
    },

    #[error(
        "no Discord server configured: send the init command in a server text channel, or set \
         `servername` in the config"
    )]
    ServerNotConfigured,

    #[error("`{init_cmd}` must be sent in a server text channel, not a direct message")]
    InitializationContext { init_cmd: String },

    #[error("unknown {kind} name `{name}`\n{kind}s: {}", .known.join(", "))]
    UnknownDestination {
        kind: DestinationKind,
        name: String,
        known: Vec<String>,
    },

    #[error("discord login: {0}")]
    Login(String),

    #[error("discord gateway: {0}")]
    Gateway(String),

    #[error("discord send: {0}")]
    Send(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] cmdbot_config::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for ChannelError {
    fn from(err: Error) -> Self {
        match err {
            Error::MissingToken { .. } | Error::InitializationContext { .. } => {
                ChannelError::invalid_input(err.to_string())
            },
            Error::UnknownDestination { .. } => ChannelError::unknown_destination(err.to_string()),
            Error::ServerNotConfigured | Error::Login(_) | Error::Gateway(_) => {
                ChannelError::unavailable(err.to_string())
            },
            Error::Send(msg) => {
                ChannelError::external("Discord send", std::io::Error::other(msg))
            },
            Error::Io(e) => ChannelError::Io(e),
            Error::Store(e) => ChannelError::external("config store", e),
        }
    }
}
