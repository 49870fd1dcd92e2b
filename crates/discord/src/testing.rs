//! In-process [`ChatClient`] used by the unit tests.

use std::{
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    serenity::all::{ChannelId, GuildId, UserId},
};

use crate::{
    client::{
        ChannelRef, ChatClient, Destination, InboundHandler, InboundMessage, MemberRef, Origin,
        ServerRef,
    },
    error::{Error, Result},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub to: Destination,
    pub content: String,
    pub file: Option<PathBuf>,
}

pub struct FakeServer {
    pub server: ServerRef,
    pub channels: Vec<ChannelRef>,
    pub members: Vec<MemberRef>,
}

impl FakeServer {
    pub fn new(id: u64, name: &str) -> Self {
        Self {
            server: ServerRef {
                id: GuildId::new(id),
                name: name.into(),
            },
            channels: Vec::new(),
            members: Vec::new(),
        }
    }

    pub fn text_channel(mut self, id: u64, name: &str) -> Self {
        self.channels.push(ChannelRef {
            id: ChannelId::new(id),
            name: name.into(),
            is_text: true,
        });
        self
    }

    pub fn voice_channel(mut self, id: u64, name: &str) -> Self {
        self.channels.push(ChannelRef {
            id: ChannelId::new(id),
            name: name.into(),
            is_text: false,
        });
        self
    }

    pub fn member(mut self, id: u64, name: &str) -> Self {
        self.members.push(MemberRef {
            id: UserId::new(id),
            name: name.into(),
        });
        self
    }
}

#[derive(Default)]
pub struct FakeClient {
    pub servers: Vec<FakeServer>,
    pub login_delay: Duration,
    pub logout_delay: Duration,
    pub fail_login: bool,
    /// Number of upcoming sends to reject.
    pub fail_sends: AtomicUsize,
    pub logins: AtomicUsize,
    pub logouts: AtomicUsize,
    pub connected: AtomicBool,
    pub sent: Mutex<Vec<Sent>>,
    pub handler: Mutex<Option<Arc<dyn InboundHandler>>>,
}

impl FakeClient {
    pub fn with_servers(servers: Vec<FakeServer>) -> Self {
        Self {
            servers,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn login_count(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn logout_count(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn has_handler(&self) -> bool {
        self.handler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Push a message event through the installed handler.
    pub async fn deliver(&self, msg: InboundMessage) {
        let handler = self
            .handler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(handler) = handler {
            handler.handle(msg).await;
        }
    }

    fn find(&self, server: GuildId) -> Result<&FakeServer> {
        self.servers
            .iter()
            .find(|s| s.server.id == server)
            .ok_or_else(|| Error::Gateway(format!("unknown guild {server}")))
    }

    fn record(&self, to: Destination, content: &str, file: Option<&Path>) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(Error::Send("not connected".into()));
        }
        if self
            .fail_sends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::Send("rejected".into()));
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Sent {
                to,
                content: content.to_string(),
                file: file.map(Path::to_path_buf),
            });
        Ok(())
    }
}

#[async_trait]
impl ChatClient for FakeClient {
    fn set_inbound_handler(&self, handler: Arc<dyn InboundHandler>) {
        *self.handler.lock().unwrap_or_else(|e| e.into_inner()) = Some(handler);
    }

    async fn login(&self, token: &str) -> Result<()> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        if !self.login_delay.is_zero() {
            tokio::time::sleep(self.login_delay).await;
        }
        if self.fail_login || token.is_empty() {
            return Err(Error::Login("invalid token".into()));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        if !self.logout_delay.is_zero() {
            tokio::time::sleep(self.logout_delay).await;
        }
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn servers(&self) -> Result<Vec<ServerRef>> {
        Ok(self.servers.iter().map(|s| s.server.clone()).collect())
    }

    async fn channels(&self, server: GuildId) -> Result<Vec<ChannelRef>> {
        Ok(self.find(server)?.channels.clone())
    }

    async fn members(&self, server: GuildId) -> Result<Vec<MemberRef>> {
        Ok(self.find(server)?.members.clone())
    }

    async fn send_message(&self, to: Destination, content: &str) -> Result<()> {
        self.record(to, content, None)
    }

    async fn send_file(&self, to: Destination, content: &str, path: &Path) -> Result<()> {
        self.record(to, content, Some(path))
    }
}

pub fn server_message(server: &ServerRef, channel_id: u64, channel: &str, content: &str) -> InboundMessage {
    InboundMessage {
        content: content.into(),
        author: "alice".into(),
        origin: Origin::Server {
            server: server.clone(),
            channel_id: ChannelId::new(channel_id),
            channel_name: channel.into(),
        },
    }
}

pub fn direct_message(channel_id: u64, content: &str) -> InboundMessage {
    InboundMessage {
        content: content.into(),
        author: "bob".into(),
        origin: Origin::Direct {
            channel_id: ChannelId::new(channel_id),
        },
    }
}
