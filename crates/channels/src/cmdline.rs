use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One inbound chat message, tagged by where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandLine {
    /// Posted in a named server channel.
    Message {
        content: String,
        author: String,
        channel_name: String,
    },
    /// Sent in a direct conversation with the bot.
    DirectMessage { content: String, author: String },
}

impl CommandLine {
    pub fn content(&self) -> &str {
        match self {
            Self::Message { content, .. } | Self::DirectMessage { content, .. } => content,
        }
    }

    pub fn author(&self) -> &str {
        match self {
            Self::Message { author, .. } | Self::DirectMessage { author, .. } => author,
        }
    }

    pub fn channel_name(&self) -> Option<&str> {
        match self {
            Self::Message { channel_name, .. } => Some(channel_name),
            Self::DirectMessage { .. } => None,
        }
    }

    pub fn is_direct(&self) -> bool {
        matches!(self, Self::DirectMessage { .. })
    }
}

/// Outbound instruction produced by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Task {
    Message {
        channel_name: String,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file: Option<PathBuf>,
    },
    DirectMessage {
        user_name: String,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file: Option<PathBuf>,
    },
}

impl Task {
    pub fn message(channel_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Message {
            channel_name: channel_name.into(),
            text: text.into(),
            file: None,
        }
    }

    pub fn direct_message(user_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::DirectMessage {
            user_name: user_name.into(),
            text: text.into(),
            file: None,
        }
    }

    /// Answer `cmdline` where it came from: the same channel, or the author's DMs.
    pub fn reply(cmdline: &CommandLine, text: impl Into<String>) -> Self {
        match cmdline {
            CommandLine::Message { channel_name, .. } => Self::message(channel_name.clone(), text),
            CommandLine::DirectMessage { author, .. } => Self::direct_message(author.clone(), text),
        }
    }

    #[must_use]
    pub fn with_file(self, path: impl Into<PathBuf>) -> Self {
        let path = Some(path.into());
        match self {
            Self::Message {
                channel_name, text, ..
            } => Self::Message {
                channel_name,
                text,
                file: path,
            },
            Self::DirectMessage {
                user_name, text, ..
            } => Self::DirectMessage {
                user_name,
                text,
                file: path,
            },
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Message { text, .. } | Self::DirectMessage { text, .. } => text,
        }
    }

    pub fn file(&self) -> Option<&PathBuf> {
        match self {
            Self::Message { file, .. } | Self::DirectMessage { file, .. } => file.as_ref(),
        }
    }
}
