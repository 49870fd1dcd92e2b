//! Seam between the front ends and the Discord client library.
//!
//! [`ConnectionManager`](crate::connection::ConnectionManager) only talks to
//! a [`ChatClient`]; the serenity-backed implementation lives in
//! [`gateway`](crate::gateway).

use std::{path::Path, sync::Arc};

use {
    async_trait::async_trait,
    serenity::all::{ChannelId, GuildId, UserId},
};

use crate::error::Result;

/// A server (guild) visible to the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerRef {
    pub id: GuildId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRef {
    pub id: ChannelId,
    pub name: String,
    /// Text channels are the only ones listed in error hints.
    pub is_text: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    pub id: UserId,
    pub name: String,
}

/// Where an outbound message goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Channel(ChannelId),
    /// Delivered through the user's DM channel.
    User(UserId),
}

/// Where an inbound message came from, resolved once at ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Server {
        server: ServerRef,
        channel_id: ChannelId,
        channel_name: String,
    },
    Direct {
        channel_id: ChannelId,
    },
}

impl Origin {
    pub fn channel_id(&self) -> ChannelId {
        match self {
            Self::Server { channel_id, .. } | Self::Direct { channel_id } => *channel_id,
        }
    }
}

/// A raw message event, already classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub content: String,
    pub author: String,
    pub origin: Origin,
}

/// Receives message events from the client.
#[async_trait]
pub trait InboundHandler: Send + Sync {
    async fn handle(&self, msg: InboundMessage);
}

/// The operations the front ends need from a chat client.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Install the handler for message events. Replaces any previous handler.
    fn set_inbound_handler(&self, handler: Arc<dyn InboundHandler>);

    /// Connect and authenticate; resolves once the client is ready.
    async fn login(&self, token: &str) -> Result<()>;

    /// Disconnect; resolves once the connection is closed.
    async fn logout(&self) -> Result<()>;

    async fn servers(&self) -> Result<Vec<ServerRef>>;

    async fn channels(&self, server: GuildId) -> Result<Vec<ChannelRef>>;

    async fn members(&self, server: GuildId) -> Result<Vec<MemberRef>>;

    async fn send_message(&self, to: Destination, content: &str) -> Result<()>;

    /// Send `content` with the file at `path` attached.
    async fn send_file(&self, to: Destination, content: &str, path: &Path) -> Result<()>;
}
