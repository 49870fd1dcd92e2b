//! Serenity-backed [`ChatClient`].

use std::{
    path::Path,
    sync::{Arc, Mutex, RwLock},
};

use {
    async_trait::async_trait,
    serenity::{
        all::{
            Channel, ChannelId, ChannelType, Context, CreateAttachment, CreateMessage,
            EventHandler, GatewayIntents, GuildId, Message, Ready, UserId,
        },
        http::Http,
    },
    tokio::{sync::watch, task::JoinHandle},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::{
    client::{
        ChannelRef, ChatClient, Destination, InboundHandler, InboundMessage, MemberRef, Origin,
        ServerRef,
    },
    error::{Error, Result},
};

/// Page size used when listing guild members; Discord's maximum.
const MEMBER_PAGE_LIMIT: u64 = 1000;

/// Required gateway intents for the bot.
///
/// `GUILD_MEMBERS` is privileged and must be enabled in the developer
/// portal; without it member lookups for direct sends come back empty.
pub fn required_intents() -> GatewayIntents {
    GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MEMBERS
}

type InboundSlot = Arc<RwLock<Option<Arc<dyn InboundHandler>>>>;

/// Live connection handles, present between login and logout.
struct Session {
    http: Arc<Http>,
    cancel: CancellationToken,
    task: JoinHandle<std::result::Result<(), String>>,
}

/// Discord client over a single gateway connection.
#[derive(Default)]
pub struct GatewayClient {
    inbound: InboundSlot,
    session: Mutex<Option<Session>>,
}

impl GatewayClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn http(&self) -> Result<Arc<Http>> {
        self.session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|s| Arc::clone(&s.http))
            .ok_or_else(|| Error::Gateway("not logged in".into()))
    }

    async fn resolve_channel(&self, http: &Arc<Http>, to: Destination) -> Result<ChannelId> {
        match to {
            Destination::Channel(id) => Ok(id),
            Destination::User(user_id) => user_id
                .create_dm_channel(http)
                .await
                .map(|dm| dm.id)
                .map_err(|e| Error::Send(format!("open DM with {user_id}: {e}"))),
        }
    }

    async fn send(&self, to: Destination, message: CreateMessage) -> Result<()> {
        let http = self.http()?;
        let channel_id = self.resolve_channel(&http, to).await?;
        channel_id
            .send_message(&http, message)
            .await
            .map_err(|e| Error::Send(e.to_string()))?;
        Ok(())
    }
}

/// Run the serenity client until it stops or `cancel` fires.
async fn run_client(
    mut client: serenity::Client,
    cancel: CancellationToken,
) -> std::result::Result<(), String> {
    tokio::select! {
        result = client.start() => {
            if let Err(e) = &result {
                warn!(error = %e, "Discord client stopped with error");
            }
            result.map_err(|e| e.to_string())
        }
        () = cancel.cancelled() => {
            info!("Discord client shutting down");
            client.shard_manager.shutdown_all().await;
            Ok(())
        }
    }
}

/// Fetch member pages of `limit` until a short page comes back.
///
/// `fetch_page` receives the last user id seen so far.
async fn collect_members<F, Fut>(limit: u64, mut fetch_page: F) -> Result<Vec<MemberRef>>
where
    F: FnMut(Option<UserId>) -> Fut,
    Fut: Future<Output = Result<Vec<MemberRef>>>,
{
    let mut members = Vec::new();
    let mut after = None;
    loop {
        let page = fetch_page(after).await?;
        let full = page.len() as u64 >= limit;
        after = page.last().map(|m| m.id);
        members.extend(page);
        if !full || after.is_none() {
            return Ok(members);
        }
    }
}

#[async_trait]
impl ChatClient for GatewayClient {
    fn set_inbound_handler(&self, handler: Arc<dyn InboundHandler>) {
        *self.inbound.write().unwrap_or_else(|e| e.into_inner()) = Some(handler);
    }

    async fn login(&self, token: &str) -> Result<()> {
        let (ready_tx, mut ready_rx) = watch::channel(false);
        let handler = GatewayHandler {
            inbound: Arc::clone(&self.inbound),
            ready: ready_tx,
        };
        let client = serenity::Client::builder(token, required_intents())
            .event_handler(handler)
            .await
            .map_err(|e| Error::Login(format!("failed to build client: {e}")))?;

        let http = Arc::clone(&client.http);
        let cancel = CancellationToken::new();
        let mut task = tokio::spawn(run_client(client, cancel.clone()));

        let outcome = tokio::select! {
            ready = async { ready_rx.wait_for(|ready| *ready).await.is_ok() } => {
                if ready {
                    Ok(())
                } else {
                    Err(Error::Login("gateway closed before ready".into()))
                }
            },
            joined = &mut task => Err(Error::Login(match joined {
                Ok(Err(e)) => e,
                Ok(Ok(())) => "gateway stopped before ready".into(),
                Err(e) => e.to_string(),
            })),
        };

        match outcome {
            Ok(()) => {
                *self.session.lock().unwrap_or_else(|e| e.into_inner()) = Some(Session {
                    http,
                    cancel,
                    task,
                });
                Ok(())
            },
            Err(e) => {
                cancel.cancel();
                task.abort();
                Err(e)
            },
        }
    }

    async fn logout(&self) -> Result<()> {
        let session = self.session.lock().unwrap_or_else(|e| e.into_inner()).take();
        let Some(session) = session else {
            return Ok(());
        };
        session.cancel.cancel();
        match session.task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(Error::Gateway(e)),
            Err(e) => Err(Error::Gateway(format!("client task failed: {e}"))),
        }
    }

    async fn servers(&self) -> Result<Vec<ServerRef>> {
        let http = self.http()?;
        let guilds = http
            .get_guilds(None, None)
            .await
            .map_err(|e| Error::Gateway(format!("list guilds: {e}")))?;
        Ok(guilds
            .into_iter()
            .map(|g| ServerRef {
                id: g.id,
                name: g.name,
            })
            .collect())
    }

    async fn channels(&self, server: GuildId) -> Result<Vec<ChannelRef>> {
        let http = self.http()?;
        let mut channels: Vec<_> = server
            .channels(&http)
            .await
            .map_err(|e| Error::Gateway(format!("list channels of {server}: {e}")))?
            .into_values()
            .collect();
        channels.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.name.cmp(&b.name)));
        Ok(channels
            .into_iter()
            .map(|c| ChannelRef {
                id: c.id,
                is_text: matches!(c.kind, ChannelType::Text | ChannelType::News),
                name: c.name,
            })
            .collect())
    }

    async fn members(&self, server: GuildId) -> Result<Vec<MemberRef>> {
        let http = self.http()?;
        let members = collect_members(MEMBER_PAGE_LIMIT, |after| {
            let http = Arc::clone(&http);
            async move {
                let page = server
                    .members(&http, Some(MEMBER_PAGE_LIMIT), after)
                    .await
                    .map_err(|e| Error::Gateway(format!("list members of {server}: {e}")))?;
                Ok(page
                    .into_iter()
                    .map(|m| MemberRef {
                        id: m.user.id,
                        name: m.user.name,
                    })
                    .collect())
            }
        })
        .await?;
        debug!(%server, count = members.len(), "discord members listed");
        Ok(members)
    }

    async fn send_message(&self, to: Destination, content: &str) -> Result<()> {
        self.send(to, CreateMessage::new().content(content)).await
    }

    async fn send_file(&self, to: Destination, content: &str, path: &Path) -> Result<()> {
        let attachment = CreateAttachment::path(path)
            .await
            .map_err(|e| Error::Send(format!("attach {}: {e}", path.display())))?;
        self.send(to, CreateMessage::new().content(content).add_file(attachment))
            .await
    }
}

/// Serenity event handler forwarding messages to the installed
/// [`InboundHandler`].
struct GatewayHandler {
    inbound: InboundSlot,
    ready: watch::Sender<bool>,
}

impl GatewayHandler {
    async fn classify(&self, ctx: &Context, msg: &Message) -> Option<Origin> {
        let channel = match msg.channel(ctx).await {
            Ok(channel) => channel,
            Err(e) => {
                warn!(channel_id = %msg.channel_id, error = %e, "failed to fetch Discord channel");
                return None;
            },
        };
        match channel {
            Channel::Guild(channel) => {
                let name = match channel.guild_id.name(ctx) {
                    Some(name) => name,
                    None => channel
                        .guild_id
                        .to_partial_guild(ctx)
                        .await
                        .map(|g| g.name)
                        .unwrap_or_default(),
                };
                Some(Origin::Server {
                    server: ServerRef {
                        id: channel.guild_id,
                        name,
                    },
                    channel_id: channel.id,
                    channel_name: channel.name,
                })
            },
            Channel::Private(channel) => Some(Origin::Direct {
                channel_id: channel.id,
            }),
            _ => None,
        }
    }
}

#[serenity::async_trait]
impl EventHandler for GatewayHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(
            bot_user = %ready.user.name,
            guilds = ready.guilds.len(),
            "Discord bot connected as {}",
            ready.user.name,
        );
        self.ready.send_replace(true);
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let handler = self.inbound.read().unwrap_or_else(|e| e.into_inner()).clone();
        let Some(handler) = handler else {
            debug!("Discord message dropped: no inbound handler");
            return;
        };
        let Some(origin) = self.classify(&ctx, &msg).await else {
            return;
        };
        handler
            .handle(InboundMessage {
                content: msg.content,
                author: msg.author.name,
                origin,
            })
            .await;
    }
}
