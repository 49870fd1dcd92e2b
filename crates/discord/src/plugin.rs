use std::sync::Arc;

use {cmdbot_config::DataStore, tracing::info};

use crate::{
    client::ChatClient, config::DiscordConfig, connection::ConnectionManager,
    gateway::GatewayClient, handler::DiscordInbound, outbound::DiscordOutbound,
};

/// The Discord input and output front ends over one shared connection.
pub struct DiscordFrontend {
    manager: Arc<ConnectionManager>,
    input: DiscordInbound,
    output: DiscordOutbound,
}

impl DiscordFrontend {
    pub fn new(client: Arc<dyn ChatClient>, store: Arc<dyn DataStore>, config: DiscordConfig) -> Self {
        let manager = Arc::new(ConnectionManager::new(client, store, config));
        Self {
            input: DiscordInbound::new(Arc::clone(&manager)),
            output: DiscordOutbound::new(Arc::clone(&manager)),
            manager,
        }
    }

    /// Front ends backed by a serenity gateway connection.
    pub fn connect(store: Arc<dyn DataStore>, config: DiscordConfig) -> Self {
        info!(category = %config.category, init_cmd = %config.init_cmd, "discord front end created");
        Self::new(Arc::new(GatewayClient::new()), store, config)
    }

    pub fn input(&self) -> &DiscordInbound {
        &self.input
    }

    pub fn output(&self) -> &DiscordOutbound {
        &self.output
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }
}
