use std::time::Duration;

use {
    cmdbot_config::DataStore,
    serde::{Deserialize, Serialize},
};

pub const DEFAULT_CATEGORY: &str = "discord";
pub const DEFAULT_INIT_CMD: &str = "!init";
const DEFAULT_LOGOUT_TIMEOUT_SECS: u64 = 10;

/// Store keys under the Discord category.
pub const TOKEN_KEY: &str = "token";
pub const SERVERNAME_KEY: &str = "servername";
const INIT_CMD_KEY: &str = "init_cmd";
const LOGOUT_TIMEOUT_KEY: &str = "logout_timeout_secs";

/// Settings for the Discord front ends.
///
/// The token itself is not kept here: it is read from the store at login time
/// so it never sits in a `Debug`-printable struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// Store category holding `token` and `servername`.
    pub category: String,

    /// Message text that binds the originating server.
    pub init_cmd: String,

    /// How long `shutdown` waits for the gateway to close.
    pub logout_timeout_secs: u64,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            category: DEFAULT_CATEGORY.into(),
            init_cmd: DEFAULT_INIT_CMD.into(),
            logout_timeout_secs: DEFAULT_LOGOUT_TIMEOUT_SECS,
        }
    }
}

impl DiscordConfig {
    /// Read overrides from `category` in the store, falling back to defaults.
    pub fn from_store(store: &dyn DataStore, category: &str) -> Self {
        let defaults = Self::default();
        Self {
            category: category.to_string(),
            init_cmd: store
                .get(category, INIT_CMD_KEY)
                .filter(|cmd| !cmd.trim().is_empty())
                .unwrap_or(defaults.init_cmd),
            logout_timeout_secs: store
                .get(category, LOGOUT_TIMEOUT_KEY)
                .and_then(|secs| secs.parse().ok())
                .unwrap_or(defaults.logout_timeout_secs),
        }
    }

    #[must_use]
    pub fn with_init_cmd(mut self, init_cmd: impl Into<String>) -> Self {
        self.init_cmd = init_cmd.into();
        self
    }

    pub fn logout_timeout(&self) -> Duration {
        Duration::from_secs(self.logout_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use {super::*, cmdbot_config::MemoryStore};

    #[test]
    fn defaults() {
        let cfg = DiscordConfig::default();
        assert_eq!(cfg.category, "discord");
        assert_eq!(cfg.init_cmd, "!init");
        assert_eq!(cfg.logout_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn from_store_reads_overrides() {
        let store = MemoryStore::new()
            .with("bot", "init_cmd", "!setup")
            .with("bot", "logout_timeout_secs", "3");
        let cfg = DiscordConfig::from_store(&store, "bot");
        assert_eq!(cfg.category, "bot");
        assert_eq!(cfg.init_cmd, "!setup");
        assert_eq!(cfg.logout_timeout_secs, 3);
    }

    #[test]
    fn from_store_ignores_garbage() {
        let store = MemoryStore::new()
            .with("discord", "init_cmd", "  ")
            .with("discord", "logout_timeout_secs", "soon");
        let cfg = DiscordConfig::from_store(&store, "discord");
        assert_eq!(cfg, DiscordConfig::default());
    }

    #[test]
    fn deserializes_partial_json() {
        let cfg: DiscordConfig = serde_json::from_value(serde_json::json!({ "init_cmd": "!go" }))
            .unwrap_or_else(|e| panic!("parse failed: {e}"));
        assert_eq!(cfg.init_cmd, "!go");
        assert_eq!(cfg.category, "discord");
    }
}
