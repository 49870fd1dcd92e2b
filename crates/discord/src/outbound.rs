use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use {
    async_trait::async_trait,
    cmdbot_channels::{OutputFrontend, Result as ChannelResult},
    tracing::{debug, info, warn},
};

use crate::{
    client::Destination,
    connection::ConnectionManager,
    error::{DestinationKind, Error, Result},
};

// ── Constants ────────────────────────────────────────────────────────

/// Discord rejects messages of 2 000 characters or more.
pub const DISCORD_MAX_MESSAGE_LEN: usize = 2000;

/// Piece size when a single line has to be cut; leaves room for its `\n`.
const HARD_SPLIT_LEN: usize = DISCORD_MAX_MESSAGE_LEN - 2;

/// Sent instead of blank segments, which Discord refuses.
pub const EMPTY_PLACEHOLDER: &str = "<EMPTY STRING>";

/// Posted before the first message of every outbound session.
pub const SESSION_SEPARATOR: &str =
    "-------------------- New Session Start --------------------";

// ── Segmentation ─────────────────────────────────────────────────────

/// Split `text` into segments shorter than [`DISCORD_MAX_MESSAGE_LEN`].
///
/// Lines are packed greedily and each keeps its trailing `\n`. A line too
/// long to fit on its own is cut on character boundaries, and only its last
/// piece carries the `\n`.
pub fn split_text(text: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in text.split('\n') {
        let line_len = line.chars().count();
        if current_len > 0 && current_len + line_len + 1 >= DISCORD_MAX_MESSAGE_LEN {
            segments.push(std::mem::take(&mut current));
            current_len = 0;
        }

        let mut rest = line;
        let mut rest_len = line_len;
        while rest_len > HARD_SPLIT_LEN {
            let cut = rest
                .char_indices()
                .nth(HARD_SPLIT_LEN)
                .map_or(rest.len(), |(idx, _)| idx);
            segments.push(rest[..cut].to_string());
            rest = &rest[cut..];
            rest_len -= HARD_SPLIT_LEN;
        }

        current.push_str(rest);
        current.push('\n');
        current_len += rest_len + 1;
    }

    segments.push(current);
    segments
}

/// Replace a segment with no visible characters by [`EMPTY_PLACEHOLDER`].
pub fn fix_content(segment: &str) -> &str {
    if segment.chars().all(char::is_whitespace) {
        EMPTY_PLACEHOLDER
    } else {
        segment
    }
}

// ── Outbound sender ──────────────────────────────────────────────────

/// Output front end delivering text and files to Discord.
pub struct DiscordOutbound {
    manager: Arc<ConnectionManager>,
    session_started: AtomicBool,
}

impl DiscordOutbound {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self {
            manager,
            session_started: AtomicBool::new(false),
        }
    }

    /// Send to the active server's channel named `channel_name`.
    pub async fn send_to_channel(
        &self,
        channel_name: &str,
        text: &str,
        file: Option<&Path>,
    ) -> Result<()> {
        self.manager.ensure_ready().await?;
        let Some(channel) = self.manager.lookup_channel(channel_name).await? else {
            return Err(Error::UnknownDestination {
                kind: DestinationKind::Channel,
                name: channel_name.to_string(),
                known: self.manager.channel_names().await?,
            });
        };
        info!(
            channel = channel_name,
            channel_id = %channel.id,
            text_len = text.len(),
            has_file = file.is_some(),
            "discord outbound channel send"
        );
        self.deliver(Destination::Channel(channel.id), text, file)
            .await
    }

    /// Send to the DMs of the active server's member named `user_name`.
    pub async fn send_to_user(&self, user_name: &str, text: &str, file: Option<&Path>) -> Result<()> {
        self.manager.ensure_ready().await?;
        let Some(user) = self.manager.lookup_user(user_name).await? else {
            return Err(Error::UnknownDestination {
                kind: DestinationKind::User,
                name: user_name.to_string(),
                known: self.manager.user_names().await?,
            });
        };
        info!(
            user = user_name,
            user_id = %user.id,
            text_len = text.len(),
            has_file = file.is_some(),
            "discord outbound direct send"
        );
        self.deliver(Destination::User(user.id), text, file).await
    }

    async fn deliver(&self, to: Destination, text: &str, file: Option<&Path>) -> Result<()> {
        let client = self.manager.client();

        // Checked before anything is sent so a bad path leaves no partial output.
        let file_size = match file {
            Some(path) => Some(tokio::fs::metadata(path).await?.len()),
            None => None,
        };

        if !self.session_started.load(Ordering::Acquire) {
            client.send_message(to, SESSION_SEPARATOR).await?;
            self.session_started.store(true, Ordering::Release);
        }

        let segments = split_text(text);
        match (file, segments.split_last()) {
            (Some(path), Some((last, head))) => {
                for segment in head {
                    self.send_segment(to, segment).await?;
                }
                let size_mb = file_size.unwrap_or_default() as f64 / (1024.0 * 1024.0);
                info!(
                    file = %path.display(),
                    size_mb = format!("{size_mb:.2}"),
                    "discord outbound file send"
                );
                if size_mb > 8.0 {
                    warn!(
                        file = %path.display(),
                        "attachment is larger than 8MB; Discord may reject it"
                    );
                }
                client.send_file(to, fix_content(last), path).await
            },
            (Some(path), None) => client.send_file(to, EMPTY_PLACEHOLDER, path).await,
            (None, _) => {
                for segment in &segments {
                    self.send_segment(to, segment).await?;
                }
                Ok(())
            },
        }
    }

    async fn send_segment(&self, to: Destination, segment: &str) -> Result<()> {
        let content = fix_content(segment);
        debug!(len = content.chars().count(), "discord outbound segment");
        self.manager.client().send_message(to, content).await
    }
}

#[async_trait]
impl OutputFrontend for DiscordOutbound {
    async fn send_msg(&self, channel_name: &str, text: &str, file: Option<&Path>) -> ChannelResult<()> {
        self.send_to_channel(channel_name, text, file)
            .await
            .map_err(Into::into)
    }

    async fn send_dm(&self, user_name: &str, text: &str, file: Option<&Path>) -> ChannelResult<()> {
        self.send_to_user(user_name, text, file)
            .await
            .map_err(Into::into)
    }

    async fn kill(&self) {
        if let Err(e) = self.manager.shutdown().await {
            warn!(error = %e, "discord shutdown failed");
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            client::ChatClient,
            config::DiscordConfig,
            testing::{FakeClient, FakeServer, Sent},
        },
        cmdbot_config::{DataStore, MemoryStore},
        serenity::all::{ChannelId, UserId},
    };

    fn strip_newlines(s: &str) -> String {
        s.chars().filter(|&c| c != '\n').collect()
    }

    #[test]
    fn split_short_text() {
        assert_eq!(split_text("hello"), vec!["hello\n"]);
        assert_eq!(split_text("a\nb"), vec!["a\nb\n"]);
    }

    #[test]
    fn split_empty_text_gives_one_blank_segment() {
        assert_eq!(split_text(""), vec!["\n"]);
    }

    #[test]
    fn split_at_line_boundary() {
        let text = format!("{}\n{}", "a".repeat(1500), "b".repeat(1000));
        let segments = split_text(&text);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], format!("{}\n", "a".repeat(1500)));
        assert_eq!(segments[1], format!("{}\n", "b".repeat(1000)));
    }

    #[test]
    fn split_starts_new_segment_when_limit_would_be_reached() {
        // 1000 + 1 + 998 + 1 = 2000: reaching the limit is not allowed.
        let text = format!("{}\n{}", "a".repeat(1000), "b".repeat(998));
        assert_eq!(split_text(&text).len(), 2);

        // 1000 + 1 + 997 + 1 = 1999 still fits.
        let text = format!("{}\n{}", "a".repeat(1000), "b".repeat(997));
        assert_eq!(split_text(&text).len(), 1);
    }

    #[test]
    fn split_hard_cuts_an_oversized_line() {
        let text = "x".repeat(2500);
        let segments = split_text(&text);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].chars().count(), HARD_SPLIT_LEN);
        assert!(!segments[0].ends_with('\n'));
        assert_eq!(segments[1], format!("{}\n", "x".repeat(2500 - HARD_SPLIT_LEN)));
    }

    #[test]
    fn split_hard_cut_respects_char_boundaries() {
        let text = "\u{1f600}".repeat(4000);
        let segments = split_text(&text);
        assert!(segments.len() >= 3);
        for segment in &segments {
            assert!(segment.chars().count() < DISCORD_MAX_MESSAGE_LEN);
        }
        assert_eq!(strip_newlines(&segments.concat()), text);
    }

    #[test]
    fn split_is_lossless_and_bounded() {
        let mut text = String::new();
        for i in 0..400 {
            text.push_str(&"word ".repeat(i % 37));
            text.push('\n');
            if i % 97 == 0 {
                text.push_str(&"y".repeat(2100));
                text.push('\n');
            }
        }
        let segments = split_text(&text);
        assert!(segments.len() > 1);
        for segment in &segments {
            assert!(
                segment.chars().count() < DISCORD_MAX_MESSAGE_LEN,
                "segment of {} chars",
                segment.chars().count()
            );
        }
        assert_eq!(strip_newlines(&segments.concat()), strip_newlines(&text));
    }

    #[test]
    fn blank_segments_get_placeholder() {
        assert_eq!(fix_content("\n"), EMPTY_PLACEHOLDER);
        assert_eq!(fix_content(" \t\n \n"), EMPTY_PLACEHOLDER);
        assert_eq!(fix_content(""), EMPTY_PLACEHOLDER);
        assert_eq!(fix_content(" x \n"), " x \n");
    }

    // ── Delivery ──────────────────────────────────────────────────

    struct Harness {
        client: Arc<FakeClient>,
        outbound: DiscordOutbound,
    }

    fn harness() -> Harness {
        let client = Arc::new(FakeClient::with_servers(vec![
            FakeServer::new(1, "Alpha")
                .text_channel(10, "general")
                .text_channel(11, "random")
                .member(100, "alice"),
        ]));
        let store: Arc<dyn DataStore> = Arc::new(
            MemoryStore::new()
                .with("discord", "token", "t")
                .with("discord", "servername", "Alpha"),
        );
        let manager = Arc::new(ConnectionManager::new(
            Arc::clone(&client) as Arc<dyn ChatClient>,
            store,
            DiscordConfig::default(),
        ));
        Harness {
            client,
            outbound: DiscordOutbound::new(manager),
        }
    }

    fn general() -> Destination {
        Destination::Channel(ChannelId::new(10))
    }

    #[tokio::test]
    async fn first_send_is_preceded_by_session_separator() {
        let h = harness();
        h.outbound
            .send_to_channel("general", "one", None)
            .await
            .unwrap_or_else(|e| panic!("send failed: {e}"));
        h.outbound
            .send_to_channel("general", "two", None)
            .await
            .unwrap_or_else(|e| panic!("send failed: {e}"));
        let contents: Vec<String> = h.client.sent().into_iter().map(|s| s.content).collect();
        assert_eq!(contents, vec![SESSION_SEPARATOR, "one\n", "two\n"]);
    }

    #[tokio::test]
    async fn separator_is_retried_after_a_failed_first_send() {
        let h = harness();
        h.client.fail_sends.store(1, Ordering::SeqCst);
        assert!(matches!(
            h.outbound.send_to_channel("general", "one", None).await,
            Err(Error::Send(_))
        ));
        assert!(h.client.sent().is_empty());

        h.outbound
            .send_to_channel("general", "two", None)
            .await
            .unwrap_or_else(|e| panic!("send failed: {e}"));
        let contents: Vec<String> = h.client.sent().into_iter().map(|s| s.content).collect();
        assert_eq!(contents, vec![SESSION_SEPARATOR, "two\n"]);
    }

    #[tokio::test]
    async fn long_text_is_sent_in_order() {
        let h = harness();
        let text = format!("{}\n{}\n{}", "a".repeat(1500), "b".repeat(1500), "c".repeat(10));
        h.outbound
            .send_to_channel("general", &text, None)
            .await
            .unwrap_or_else(|e| panic!("send failed: {e}"));
        let sent = h.client.sent();
        assert_eq!(sent.len(), 3);
        assert!(sent[1].content.starts_with('a'));
        assert!(sent[2].content.starts_with('b'));
        assert!(sent[2].content.ends_with("ccc\n"));
        assert!(sent.iter().all(|s| s.to == general() && s.file.is_none()));
    }

    #[tokio::test]
    async fn blank_text_is_replaced() {
        let h = harness();
        h.outbound
            .send_to_channel("general", "  \n ", None)
            .await
            .unwrap_or_else(|e| panic!("send failed: {e}"));
        let sent = h.client.sent();
        assert_eq!(sent[1].content, EMPTY_PLACEHOLDER);
    }

    #[tokio::test]
    async fn file_rides_on_the_last_segment_only() {
        let h = harness();
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let path = dir.path().join("dice.png");
        std::fs::write(&path, [0_u8; 16]).unwrap_or_else(|e| panic!("write: {e}"));

        let text = format!("{}\n{}", "a".repeat(1500), "b".repeat(1500));
        h.outbound
            .send_to_channel("general", &text, Some(&path))
            .await
            .unwrap_or_else(|e| panic!("send failed: {e}"));

        let sent = h.client.sent();
        let with_file: Vec<&Sent> = sent.iter().filter(|s| s.file.is_some()).collect();
        assert_eq!(with_file.len(), 1);
        assert_eq!(sent.last().and_then(|s| s.file.clone()), Some(path));
        assert!(sent[sent.len() - 1].content.starts_with('b'));
    }

    #[tokio::test]
    async fn file_with_empty_text_gets_placeholder_caption() {
        let h = harness();
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let path = dir.path().join("report.txt");
        std::fs::write(&path, "data").unwrap_or_else(|e| panic!("write: {e}"));

        h.outbound
            .send_to_channel("general", "", Some(&path))
            .await
            .unwrap_or_else(|e| panic!("send failed: {e}"));
        let sent = h.client.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].content, EMPTY_PLACEHOLDER);
        assert_eq!(sent[1].file.as_deref(), Some(path.as_path()));
    }

    #[tokio::test]
    async fn missing_file_fails_before_sending() {
        let h = harness();
        let result = h
            .outbound
            .send_to_channel("general", "hi", Some(Path::new("/nonexistent/cmdbot.png")))
            .await;
        assert!(matches!(result, Err(Error::Io(_))));
        assert!(h.client.sent().is_empty());
    }

    #[tokio::test]
    async fn unknown_channel_lists_valid_names() {
        let h = harness();
        let Err(err) = h.outbound.send_to_channel("genral", "hi", None).await else {
            panic!("expected unknown destination");
        };
        let Error::UnknownDestination { kind, known, .. } = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(*kind, DestinationKind::Channel);
        let mut known = known.clone();
        known.sort();
        assert_eq!(known, vec!["general", "random"]);
        assert!(h.client.sent().is_empty());
    }

    #[tokio::test]
    async fn direct_send_targets_user() {
        let h = harness();
        h.outbound
            .send_to_user("alice", "psst", None)
            .await
            .unwrap_or_else(|e| panic!("send failed: {e}"));
        let sent = h.client.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].content, SESSION_SEPARATOR);
        assert_eq!(sent[1].to, Destination::User(UserId::new(100)));

        let Err(err) = h.outbound.send_to_user("mallory", "hi", None).await else {
            panic!("expected unknown destination");
        };
        assert!(err.to_string().contains("users: alice"));
    }

    #[tokio::test]
    async fn output_frontend_maps_errors() {
        let h = harness();
        let err = h
            .outbound
            .send_msg("nowhere", "hi", None)
            .await
            .err()
            .unwrap_or_else(|| panic!("expected error"));
        assert!(matches!(err, cmdbot_channels::Error::UnknownDestination(_)));
    }
}
