//! Streaming publisher - progressive in-place edits of one Slack message
//!
//! A placeholder is posted as soon as work starts. As reply fragments
//! arrive they are buffered and the placeholder is edited at most once per
//! `update_interval`. The first edit waits until the buffer holds enough
//! text to be worth showing, so readers never see a lone word flicker in.
//! When the run ends, [`StreamingPublisher::finish`] writes the complete
//! answer unconditionally.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::agent::StreamSink;
use crate::channels::{format_for_slack, MessagingSurface};
use crate::config::StreamingConfig;
use crate::error::Result;

/// Owns one placeholder message and the text streamed into it.
pub struct StreamingPublisher {
    surface: Arc<dyn MessagingSurface>,
    channel: String,
    thread_id: Option<String>,
    message_id: String,
    buffer: String,
    last_edit: Instant,
    first_edit_done: bool,
    update_interval: Duration,
    first_update_min_chars: usize,
}

impl StreamingPublisher {
    /// Post the placeholder and start the edit clock.
    ///
    /// Fails only if the placeholder itself cannot be posted.
    pub async fn start(
        surface: Arc<dyn MessagingSurface>,
        channel: &str,
        thread_id: Option<&str>,
        config: &StreamingConfig,
    ) -> Result<Self> {
        let message_id = surface.post(channel, &config.placeholder, thread_id).await?;
        debug!(channel = channel, message_id = %message_id, "Placeholder posted");

        Ok(Self {
            surface,
            channel: channel.to_string(),
            thread_id: thread_id.map(str::to_string),
            message_id,
            buffer: String::new(),
            last_edit: Instant::now(),
            first_edit_done: false,
            update_interval: Duration::from_millis(config.update_interval_ms),
            first_update_min_chars: config.first_update_min_chars,
        })
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Text accumulated in the current round.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Append a fragment and edit the placeholder if both gates allow it.
    pub async fn push(&mut self, fragment: &str) {
        self.buffer.push_str(fragment);

        if !self.first_edit_done
            && self.buffer.trim().chars().count() < self.first_update_min_chars
        {
            return;
        }

        let now = Instant::now();
        if now.saturating_duration_since(self.last_edit) < self.update_interval {
            return;
        }

        let text = format_for_slack(&self.buffer);
        match self.surface.edit(&self.channel, &self.message_id, &text).await {
            Ok(()) => self.first_edit_done = true,
            Err(e) => debug!(error = %e, "Streaming edit failed, will retry on next fragment"),
        }
        self.last_edit = now;
    }

    /// A tool round finished. The next completion's text replaces this one.
    pub fn new_round(&mut self) {
        self.buffer.clear();
    }

    /// Write the complete answer, bypassing the interval and size gates.
    pub async fn finish(&mut self, final_text: &str) {
        let text = format_for_slack(final_text);
        if let Err(e) = self.surface.edit(&self.channel, &self.message_id, &text).await {
            warn!(error = %e, message_id = %self.message_id, "Final edit failed");
        }
        self.last_edit = Instant::now();
    }

    /// Replace the placeholder with an apology, posting anew if the edit fails.
    pub async fn fail(&mut self, apology: &str) -> Result<()> {
        if let Err(e) = self
            .surface
            .edit(&self.channel, &self.message_id, apology)
            .await
        {
            warn!(error = %e, "Could not edit placeholder with apology, posting instead");
            self.surface
                .post(&self.channel, apology, self.thread_id.as_deref())
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StreamSink for StreamingPublisher {
    async fn on_delta(&mut self, fragment: &str) {
        self.push(fragment).await;
    }

    async fn on_new_round(&mut self) {
        self.new_round();
    }
}
