//! Slack channel implementation.
//!
//! Supports:
//! - outbound messaging via Slack Web API (`chat.postMessage`, `chat.update`)
//! - profile lookups (`users.info`) and bot identity (`auth.test`)
//! - inbound events via Slack Socket Mode (`apps.connections.open`)

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use crate::agent::UserIdentity;
use crate::config::SlackConfig;
use crate::error::{Result, YuriError};

use super::slack_markdown::strip_mentions;
use super::{InboundEvent, MessagingSurface};

const SLACK_API_BASE: &str = "https://slack.com/api";
const SLACK_RECONNECT_DELAY_SECS: u64 = 2;

#[derive(Debug, Deserialize)]
struct SlackSocketOpenResponse {
    ok: bool,
    url: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SlackSocketEnvelope {
    #[serde(default)]
    envelope_id: Option<String>,
    #[serde(rename = "type")]
    envelope_type: String,
    #[serde(default)]
    payload: Option<SlackSocketPayload>,
}

#[derive(Debug, Deserialize)]
struct SlackSocketPayload {
    #[serde(default)]
    event: Option<SlackEvent>,
}

#[derive(Debug, Deserialize)]
struct SlackEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    bot_id: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    channel_type: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackUser {
    #[serde(default)]
    real_name: Option<String>,
    #[serde(default)]
    profile: SlackProfile,
}

#[derive(Debug, Default, Deserialize)]
struct SlackProfile {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Default)]
struct ParsedSocketMessage {
    ack_message: Option<String>,
    inbound_event: Option<InboundEvent>,
    /// Slack asked us to reconnect (`type: disconnect`)
    disconnect: bool,
}

/// Slack channel backed by the Web API and Socket Mode.
pub struct SlackChannel {
    config: SlackConfig,
    api_base: String,
    running: Arc<AtomicBool>,
    client: reqwest::Client,
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl SlackChannel {
    /// Creates a new Slack channel.
    pub fn new(config: SlackConfig) -> Self {
        Self {
            config,
            api_base: SLACK_API_BASE.to_string(),
            running: Arc::new(AtomicBool::new(false)),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            shutdown_tx: None,
        }
    }

    /// Point Web API calls at another host (tests, proxies).
    pub fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    /// Returns a reference to the Slack configuration.
    pub fn slack_config(&self) -> &SlackConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Empty allowlist admits everyone.
    pub fn is_allowed(&self, user_id: &str) -> bool {
        self.config.allow_from.is_empty() || self.config.allow_from.iter().any(|u| u == user_id)
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base, method)
    }

    fn require_bot_token(&self) -> Result<&str> {
        let token = self.config.bot_token.trim();
        if token.is_empty() {
            return Err(YuriError::Config("Slack bot token is empty".to_string()));
        }
        Ok(token)
    }

    /// Decode a Web API reply, turning `ok: false` into an error.
    async fn read_api_response(method: &str, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body = response.text().await.map_err(|e| {
            YuriError::Channel(format!("Failed to read Slack {} response: {}", method, e))
        })?;

        if !status.is_success() {
            return Err(YuriError::Channel(format!(
                "Slack {} returned HTTP {}: {}",
                method, status, body
            )));
        }

        let body_json: Value = serde_json::from_str(&body).map_err(|e| {
            YuriError::Channel(format!("Invalid Slack {} response JSON: {}", method, e))
        })?;

        if !body_json
            .get("ok")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            let api_error = body_json
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error");
            return Err(YuriError::Channel(format!(
                "Slack {} returned error: {}",
                method, api_error
            )));
        }
        Ok(body_json)
    }

    async fn call(&self, method: &str, payload: &Value) -> Result<Value> {
        let token = self.require_bot_token()?;
        let response = self
            .client
            .post(self.method_url(method))
            .bearer_auth(token)
            .json(payload)
            .send()
            .await
            .map_err(|e| YuriError::Channel(format!("Failed to call Slack {}: {}", method, e)))?;
        Self::read_api_response(method, response).await
    }

    /// The bot's own user id, used to recognise mentions of itself.
    pub async fn auth_test(&self) -> Result<String> {
        let body = self.call("auth.test", &json!({})).await?;
        body.get("user_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| YuriError::Channel("auth.test response missing user_id".into()))
    }

    fn build_post_payload(channel: &str, text: &str, thread_id: Option<&str>) -> Result<Value> {
        let channel = channel.trim();
        if channel.is_empty() {
            return Err(YuriError::Channel(
                "Slack channel ID cannot be empty".to_string(),
            ));
        }

        let mut payload = json!({
            "channel": channel,
            "text": text,
        });
        if let Some(thread_ts) = thread_id.filter(|t| !t.trim().is_empty()) {
            if let Some(map) = payload.as_object_mut() {
                map.insert("thread_ts".to_string(), Value::String(thread_ts.to_string()));
            }
        }
        Ok(payload)
    }

    fn identity_from_user(user_id: &str, user: SlackUser) -> UserIdentity {
        let display = user.profile.display_name.unwrap_or_default();
        let name = if display.trim().is_empty() {
            user.real_name.unwrap_or_default()
        } else {
            display
        };
        UserIdentity::new(user_id, &name, user.profile.email.as_deref())
    }

    async fn open_socket_mode_url(
        client: &reqwest::Client,
        api_base: &str,
        app_token: &str,
    ) -> Result<String> {
        let response = client
            .post(format!("{}/apps.connections.open", api_base))
            .bearer_auth(app_token)
            .send()
            .await
            .map_err(|e| {
                YuriError::Channel(format!(
                    "Failed to open Slack Socket Mode connection: {}",
                    e
                ))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            YuriError::Channel(format!("Failed to read Slack Socket Mode response: {}", e))
        })?;

        if !status.is_success() {
            return Err(YuriError::Channel(format!(
                "Slack Socket Mode HTTP {}: {}",
                status, body
            )));
        }

        let parsed: SlackSocketOpenResponse = serde_json::from_str(&body).map_err(|e| {
            YuriError::Channel(format!("Invalid Slack Socket Mode open response: {}", e))
        })?;

        if !parsed.ok {
            return Err(YuriError::Channel(format!(
                "Slack Socket Mode open failed: {}",
                parsed.error.unwrap_or_else(|| "unknown_error".to_string())
            )));
        }

        parsed.url.filter(|u| !u.trim().is_empty()).ok_or_else(|| {
            YuriError::Channel("Slack Socket Mode response missing URL".to_string())
        })
    }

    fn parse_socket_message(raw: &str, allowlist: &[String]) -> Result<ParsedSocketMessage> {
        let envelope: SlackSocketEnvelope = serde_json::from_str(raw)
            .map_err(|e| YuriError::Channel(format!("Invalid Slack socket payload: {}", e)))?;

        let ack_message = envelope
            .envelope_id
            .as_deref()
            .map(|envelope_id| json!({ "envelope_id": envelope_id }).to_string());

        Ok(ParsedSocketMessage {
            ack_message,
            inbound_event: Self::extract_inbound_event(&envelope, allowlist),
            disconnect: envelope.envelope_type == "disconnect",
        })
    }

    fn extract_inbound_event(
        envelope: &SlackSocketEnvelope,
        allowlist: &[String],
    ) -> Option<InboundEvent> {
        if envelope.envelope_type != "events_api" {
            return None;
        }

        let event = envelope.payload.as_ref()?.event.as_ref()?;
        let user_id = event.user.as_deref()?.trim();
        let channel = event.channel.as_deref()?.trim();
        let text = event.text.as_deref().unwrap_or_default();
        if user_id.is_empty() || channel.is_empty() {
            return None;
        }

        let mut inbound = match event.event_type.as_str() {
            // An empty mention is still delivered; the gateway greets the user.
            "app_mention" => InboundEvent::mention(user_id, channel, &strip_mentions(text)),
            "message" => {
                if event.subtype.is_some() || event.bot_id.is_some() || text.trim().is_empty() {
                    return None;
                }
                InboundEvent::message(user_id, channel, text)
            }
            _ => return None,
        };

        if !allowlist.is_empty() && !allowlist.iter().any(|u| u == user_id) {
            info!(user = user_id, "Slack: user not in allowlist, ignoring event");
            return None;
        }

        if let Some(channel_type) = event.channel_type.as_deref() {
            inbound = inbound.with_channel_type(channel_type);
        }
        if let Some(ts) = event.ts.as_deref().filter(|ts| !ts.trim().is_empty()) {
            inbound = inbound.with_message_id(ts);
        }
        Some(inbound)
    }

    async fn wait_for_reconnect_or_shutdown(shutdown_rx: &mut mpsc::Receiver<()>) -> bool {
        tokio::select! {
            _ = shutdown_rx.recv() => true,
            _ = tokio::time::sleep(Duration::from_secs(SLACK_RECONNECT_DELAY_SECS)) => false,
        }
    }

    async fn run_socket_mode_loop(
        client: reqwest::Client,
        api_base: String,
        app_token: String,
        events: mpsc::Sender<InboundEvent>,
        allowlist: Vec<String>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        loop {
            let socket_url = tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Slack Socket Mode shutdown requested");
                    return;
                }
                opened = Self::open_socket_mode_url(&client, &api_base, &app_token) => {
                    match opened {
                        Ok(url) => url,
                        Err(e) => {
                            warn!(error = %e, "Slack Socket Mode open failed");
                            if Self::wait_for_reconnect_or_shutdown(&mut shutdown_rx).await {
                                return;
                            }
                            continue;
                        }
                    }
                }
            };

            let ws_stream = tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Slack Socket Mode shutdown requested");
                    return;
                }
                connected = connect_async(socket_url.as_str()) => {
                    match connected {
                        Ok((stream, _)) => stream,
                        Err(e) => {
                            warn!(error = %e, "Failed to connect Slack Socket Mode websocket");
                            if Self::wait_for_reconnect_or_shutdown(&mut shutdown_rx).await {
                                return;
                            }
                            continue;
                        }
                    }
                }
            };

            info!("Slack Socket Mode connected");
            let (mut ws_writer, mut ws_reader) = ws_stream.split();

            loop {
                let next = tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Slack Socket Mode shutdown requested");
                        return;
                    }
                    message = ws_reader.next() => message,
                };

                match next {
                    Some(Ok(WsMessage::Text(raw))) => {
                        let parsed = match Self::parse_socket_message(raw.as_str(), &allowlist) {
                            Ok(parsed) => parsed,
                            Err(e) => {
                                debug!(error = %e, "Ignoring Slack socket payload");
                                continue;
                            }
                        };

                        // Ack before handling so Slack does not redeliver
                        // while the agent is still working.
                        if let Some(ack_message) = parsed.ack_message {
                            if let Err(e) = ws_writer.send(WsMessage::Text(ack_message.into())).await
                            {
                                warn!(error = %e, "Slack Socket Mode ack send failed");
                                break;
                            }
                        }

                        if let Some(inbound) = parsed.inbound_event {
                            if events.send(inbound).await.is_err() {
                                info!("Inbound event receiver dropped, stopping Socket Mode");
                                return;
                            }
                        }

                        if parsed.disconnect {
                            info!("Slack requested Socket Mode reconnect");
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Ping(payload))) => {
                        if let Err(e) = ws_writer.send(WsMessage::Pong(payload)).await {
                            warn!(error = %e, "Slack Socket Mode pong send failed");
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        info!(?frame, "Slack Socket Mode closed by server");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "Slack Socket Mode stream error");
                        break;
                    }
                    None => {
                        warn!("Slack Socket Mode stream ended");
                        break;
                    }
                }
            }

            if Self::wait_for_reconnect_or_shutdown(&mut shutdown_rx).await {
                return;
            }
            info!("Reconnecting Slack Socket Mode");
        }
    }

    /// Start receiving events over Socket Mode, delivering them to `events`.
    pub async fn start(&mut self, events: mpsc::Sender<InboundEvent>) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            info!("Slack channel already running");
            return Ok(());
        }

        if let Err(e) = self.require_bot_token() {
            self.running.store(false, Ordering::SeqCst);
            return Err(e);
        }

        let app_token = self.config.app_token.trim().to_string();
        if app_token.is_empty() {
            self.running.store(false, Ordering::SeqCst);
            return Err(YuriError::Config(
                "Slack app token is empty; Socket Mode needs an xapp- token".to_string(),
            ));
        }

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        self.shutdown_tx = Some(shutdown_tx);

        info!("Starting Slack channel with Socket Mode inbound");
        tokio::spawn(Self::run_socket_mode_loop(
            self.client.clone(),
            self.api_base.clone(),
            app_token,
            events,
            self.config.allow_from.clone(),
            shutdown_rx,
        ));

        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            info!("Slack channel already stopped");
            return Ok(());
        }

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }

        info!("Slack channel stopped");
        Ok(())
    }
}

#[async_trait]
impl MessagingSurface for SlackChannel {
    async fn post(&self, channel: &str, text: &str, thread_id: Option<&str>) -> Result<String> {
        let payload = Self::build_post_payload(channel, text, thread_id)?;
        let body = self.call("chat.postMessage", &payload).await?;
        body.get("ts")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| YuriError::Channel("chat.postMessage response missing ts".into()))
    }

    async fn edit(&self, channel: &str, message_id: &str, text: &str) -> Result<()> {
        let payload = json!({
            "channel": channel,
            "ts": message_id,
            "text": text,
        });
        self.call("chat.update", &payload).await?;
        Ok(())
    }

    async fn user_identity(&self, user_id: &str) -> Result<UserIdentity> {
        let token = self.require_bot_token()?;
        let response = self
            .client
            .get(self.method_url("users.info"))
            .bearer_auth(token)
            .query(&[("user", user_id)])
            .send()
            .await
            .map_err(|e| YuriError::Channel(format!("Failed to call Slack users.info: {}", e)))?;
        let mut body = Self::read_api_response("users.info", response).await?;
        let user: SlackUser = serde_json::from_value(body["user"].take()).unwrap_or_default();
        Ok(Self::identity_from_user(user_id, user))
    }
}
