//! Configuration and persisted data for cmdbot.
//!
//! Settings are addressed as `category.key`. The user edits `cmdbot.toml`;
//! values the bot learns at runtime (such as the bound server) go to
//! `data.toml`, which shadows the user file on lookup.

pub mod error;
pub mod paths;
pub mod store;

pub use {
    error::{Error, Result},
    store::{DataStore, FileStore, MemoryStore},
    toml::Table,
};
