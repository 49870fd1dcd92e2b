//! Discord front ends for cmdbot.
//!
//! Connects to the Discord Gateway API through serenity. Inbound messages
//! become [`CommandLine`](cmdbot_channels::CommandLine)s; outbound tasks are
//! split into Discord-sized segments and delivered to channels or DMs.

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod gateway;
pub mod handler;
pub mod outbound;
pub mod plugin;

#[cfg(test)]
mod testing;

pub use {
    client::{ChatClient, Destination, InboundMessage, Origin},
    config::DiscordConfig,
    connection::ConnectionManager,
    error::{Error, Result},
    gateway::GatewayClient,
    handler::DiscordInbound,
    outbound::DiscordOutbound,
    plugin::DiscordFrontend,
};
