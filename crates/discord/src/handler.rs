use std::sync::Arc;

use {
    async_trait::async_trait,
    cmdbot_channels::{
        CommandCallback, CommandLine, InputFrontend, Result as ChannelResult,
    },
    tracing::{debug, info, warn},
};

use crate::{
    client::{InboundHandler, InboundMessage, Origin},
    connection::ConnectionManager,
    error::{Error, Result},
};

/// Acknowledgement posted after the init command binds a server.
pub const INIT_ACK_TEXT: &str = "Initialized.";

/// Normalize a classified message into a command line.
pub fn to_command_line(msg: InboundMessage) -> CommandLine {
    match msg.origin {
        Origin::Server { channel_name, .. } => CommandLine::Message {
            content: msg.content,
            author: msg.author,
            channel_name,
        },
        Origin::Direct { .. } => CommandLine::DirectMessage {
            content: msg.content,
            author: msg.author,
        },
    }
}

/// Per-subscription message processor installed on the client.
pub struct Dispatcher {
    manager: Arc<ConnectionManager>,
    callback: CommandCallback,
}

impl Dispatcher {
    pub fn new(manager: Arc<ConnectionManager>, callback: CommandCallback) -> Self {
        Self { manager, callback }
    }

    /// Handle one message: run the init command if it is one, then emit it.
    ///
    /// An init command posted in a channel is emitted like any other message.
    /// A failed init aborts processing before emission.
    pub async fn process(&self, msg: InboundMessage) -> Result<()> {
        if msg.content == self.manager.config().init_cmd {
            self.initialize(&msg).await?;
        }
        debug!(
            author = %msg.author,
            direct = matches!(msg.origin, Origin::Direct { .. }),
            text_len = msg.content.len(),
            "discord inbound command line"
        );
        (self.callback)(to_command_line(msg));
        Ok(())
    }

    async fn initialize(&self, msg: &InboundMessage) -> Result<()> {
        let Origin::Server {
            server, channel_id, ..
        } = &msg.origin
        else {
            return Err(Error::InitializationContext {
                init_cmd: self.manager.config().init_cmd.clone(),
            });
        };
        info!(server = %server.name, author = %msg.author, "discord init command received");
        self.manager.bind_server(server.clone())?;
        self.manager.reply(*channel_id, INIT_ACK_TEXT).await
    }
}

#[async_trait]
impl InboundHandler for Dispatcher {
    async fn handle(&self, msg: InboundMessage) {
        let channel_id = msg.origin.channel_id();
        if let Err(e) = self.process(msg).await {
            warn!(%channel_id, error = %e, "discord inbound message failed");
        }
    }
}

/// Input front end: turns Discord messages into command lines.
pub struct DiscordInbound {
    manager: Arc<ConnectionManager>,
}

impl DiscordInbound {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl InputFrontend for DiscordInbound {
    async fn run(&self, callback: CommandCallback) -> ChannelResult<()> {
        let dispatcher = Dispatcher::new(Arc::clone(&self.manager), callback);
        self.manager
            .client()
            .set_inbound_handler(Arc::new(dispatcher));
        self.manager.ensure_ready().await?;
        Ok(())
    }

    async fn kill(&self) {
        if let Err(e) = self.manager.shutdown().await {
            warn!(error = %e, "discord shutdown failed");
        }
    }
}
