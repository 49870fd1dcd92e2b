use std::sync::{Arc, Mutex, RwLock};

use {
    cmdbot_config::DataStore,
    secrecy::{ExposeSecret, Secret},
    serenity::all::ChannelId,
    tokio::sync::watch,
    tracing::{info, warn},
};

use crate::{
    client::{ChannelRef, ChatClient, Destination, MemberRef, ServerRef},
    config::{DiscordConfig, SERVERNAME_KEY, TOKEN_KEY},
    error::{Error, Result},
};

/// Outcome of a login attempt, shared with every caller waiting on it.
type LoginOutcome = Option<std::result::Result<(), String>>;

enum LoginState {
    Idle,
    /// A login task owns the attempt; callers wait on the receiver.
    InFlight(watch::Receiver<LoginOutcome>),
    Ready,
}

/// Owns the chat client and the active server binding.
///
/// Both front ends share one manager, so there is exactly one connection per
/// process and at most one login attempt in flight.
pub struct ConnectionManager {
    client: Arc<dyn ChatClient>,
    store: Arc<dyn DataStore>,
    config: DiscordConfig,
    state: Arc<Mutex<LoginState>>,
    server: RwLock<Option<ServerRef>>,
}

impl ConnectionManager {
    pub fn new(client: Arc<dyn ChatClient>, store: Arc<dyn DataStore>, config: DiscordConfig) -> Self {
        Self {
            client,
            store,
            config,
            state: Arc::new(Mutex::new(LoginState::Idle)),
            server: RwLock::new(None),
        }
    }

    pub fn client(&self) -> &Arc<dyn ChatClient> {
        &self.client
    }

    pub fn config(&self) -> &DiscordConfig {
        &self.config
    }

    pub fn is_ready(&self) -> bool {
        matches!(
            *self.state.lock().unwrap_or_else(|e| e.into_inner()),
            LoginState::Ready
        )
    }

    fn token(&self) -> Result<Secret<String>> {
        self.store
            .get(&self.config.category, TOKEN_KEY)
            .filter(|token| !token.trim().is_empty())
            .map(Secret::new)
            .ok_or_else(|| Error::MissingToken {
                category: self.config.category.clone(),
                config_path: self.store.config_path().to_path_buf(),
            })
    }

    /// Make sure the client is logged in and ready.
    ///
    /// Returns at once when already ready. When another caller's login is in
    /// flight, waits for that attempt and reports its outcome instead of
    /// starting a second one.
    pub async fn ensure_ready(&self) -> Result<()> {
        let rx = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            match &*state {
                LoginState::Ready => return Ok(()),
                LoginState::InFlight(rx) => rx.clone(),
                LoginState::Idle => {
                    let token = self.token()?;
                    let (tx, rx) = watch::channel(None);
                    *state = LoginState::InFlight(rx.clone());
                    self.spawn_login(token, tx);
                    rx
                },
            }
        };
        self.wait_for_login(rx).await
    }

    fn spawn_login(&self, token: Secret<String>, tx: watch::Sender<LoginOutcome>) {
        let client = Arc::clone(&self.client);
        let state = Arc::clone(&self.state);
        info!(category = %self.config.category, "discord login starting");
        tokio::spawn(async move {
            let outcome = client
                .login(token.expose_secret())
                .await
                .map_err(|e| e.to_string());
            {
                let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
                *state = if outcome.is_ok() {
                    LoginState::Ready
                } else {
                    LoginState::Idle
                };
            }
            match &outcome {
                Ok(()) => info!("discord client ready"),
                Err(e) => warn!(error = %e, "discord login failed"),
            }
            tx.send_replace(Some(outcome));
        });
    }

    async fn wait_for_login(&self, mut rx: watch::Receiver<LoginOutcome>) -> Result<()> {
        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        };
        match outcome {
            Some(Ok(())) => Ok(()),
            Some(Err(msg)) => Err(Error::Login(msg)),
            None => {
                // The login task went away without reporting (panicked).
                let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
                if matches!(*state, LoginState::InFlight(_)) {
                    *state = LoginState::Idle;
                }
                Err(Error::Login("login task ended without a result".into()))
            },
        }
    }

    /// Log out if logged in, waiting up to the configured timeout.
    ///
    /// A login still in flight is awaited first, so a connection that comes
    /// up during shutdown is closed too.
    pub async fn shutdown(&self) -> Result<()> {
        loop {
            let rx = {
                let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
                match &*state {
                    LoginState::Idle => return Ok(()),
                    LoginState::Ready => {
                        *state = LoginState::Idle;
                        break;
                    },
                    LoginState::InFlight(rx) => rx.clone(),
                }
            };
            info!("discord shutdown waiting for in-flight login");
            if self.wait_for_login(rx).await.is_err() {
                // Nothing connected; the failure was reported to the login's callers.
                return Ok(());
            }
        }

        let timeout = self.config.logout_timeout();
        info!(timeout_secs = timeout.as_secs(), "discord logout starting");
        match tokio::time::timeout(timeout, self.client.logout()).await {
            Ok(result) => {
                result?;
                info!("discord logout complete");
                Ok(())
            },
            Err(_) => Err(Error::Gateway(format!(
                "logout did not complete within {}s",
                timeout.as_secs()
            ))),
        }
    }

    // ── Server binding ──────────────────────────────────────────────

    /// Bind the visible server named exactly `name`.
    ///
    /// Returns `false`, leaving the current binding alone, when no such
    /// server is visible.
    pub async fn resolve_server(&self, name: &str) -> Result<bool> {
        let servers = self.client.servers().await?;
        match servers.into_iter().find(|s| s.name == name) {
            Some(server) => {
                self.bind_server(server)?;
                Ok(true)
            },
            None => Ok(false),
        }
    }

    /// Make `server` the active server and persist its name.
    pub fn bind_server(&self, server: ServerRef) -> Result<()> {
        info!(server = %server.name, server_id = %server.id, "discord server bound");
        self.store
            .set(&self.config.category, SERVERNAME_KEY, &server.name)?;
        *self.server.write().unwrap_or_else(|e| e.into_inner()) = Some(server);
        Ok(())
    }

    /// The server bound so far, without consulting the store.
    pub fn bound_server(&self) -> Option<ServerRef> {
        self.server.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// The active server, resolving the configured `servername` on first use.
    pub async fn active_server(&self) -> Result<Option<ServerRef>> {
        if let Some(server) = self.bound_server() {
            return Ok(Some(server));
        }
        let name = self
            .store
            .get(&self.config.category, SERVERNAME_KEY)
            .ok_or(Error::ServerNotConfigured)?;
        if self.resolve_server(&name).await? {
            Ok(self.bound_server())
        } else {
            warn!(server = %name, "configured discord server is not visible to the bot");
            Ok(None)
        }
    }

    // ── Lookups ─────────────────────────────────────────────────────

    pub async fn lookup_channel(&self, name: &str) -> Result<Option<ChannelRef>> {
        let Some(server) = self.active_server().await? else {
            return Ok(None);
        };
        let channels = self.client.channels(server.id).await?;
        Ok(channels.into_iter().find(|c| c.name == name))
    }

    pub async fn lookup_user(&self, name: &str) -> Result<Option<MemberRef>> {
        let Some(server) = self.active_server().await? else {
            return Ok(None);
        };
        let members = self.client.members(server.id).await?;
        Ok(members.into_iter().find(|m| m.name == name))
    }

    /// Text channel names of the bound server, for error hints.
    pub async fn channel_names(&self) -> Result<Vec<String>> {
        let Some(server) = self.bound_server() else {
            return Ok(Vec::new());
        };
        let channels = self.client.channels(server.id).await?;
        Ok(channels
            .into_iter()
            .filter(|c| c.is_text)
            .map(|c| c.name)
            .collect())
    }

    /// Member names of the bound server, for error hints.
    pub async fn user_names(&self) -> Result<Vec<String>> {
        let Some(server) = self.bound_server() else {
            return Ok(Vec::new());
        };
        let members = self.client.members(server.id).await?;
        Ok(members.into_iter().map(|m| m.name).collect())
    }

    /// Post `text` verbatim to a channel.
    pub async fn reply(&self, channel_id: ChannelId, text: &str) -> Result<()> {
        self.client
            .send_message(Destination::Channel(channel_id), text)
            .await
    }
}
