//! Gateway module - routes inbound events to the right conversation flow
//!
//! ```text
//! InboundEvent
//!   ├─ mention with no text ─────────────> greeting
//!   ├─ out-of-office channel ────────────> OOO agent, no memory, thread reply
//!   ├─ mention elsewhere / direct message > query agent, memory, streamed reply
//!   └─ anything else ────────────────────> ignored
//! ```
//!
//! Each event runs in its own task. Events that share a session key are
//! serialized so a follow-up never reads history its predecessor has not
//! saved yet.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::agent::{contextual_message, user_context, AgentLoop, PromptBuilder, UserIdentity};
use crate::backend::{
    CalendarService, QueryBackend, RulesCache, RulesSource, TimeOffStore, UserDirectory,
};
use crate::channels::{format_for_slack, EventKind, InboundEvent, MessagingSurface};
use crate::config::{Config, StreamingConfig};
use crate::error::{user_facing_message, Result, YuriError, TIME_OFF_ERROR_MESSAGE};
use crate::providers::LLMProvider;
use crate::publisher::StreamingPublisher;
use crate::session::{SessionKey, SessionStore, SurfaceKind};
use crate::tools::{ooo_tools, query_tools, ToolContext};

/// Reply to a mention that carries no question.
pub const GREETING_MESSAGE: &str = "Hi! How can I help you today?";

/// External services the gateway's flows depend on.
#[derive(Clone)]
pub struct Services {
    pub query: Arc<dyn QueryBackend>,
    pub time_off: Arc<dyn TimeOffStore>,
    pub calendar: Arc<dyn CalendarService>,
    pub directory: Arc<dyn UserDirectory>,
    pub rules: Arc<dyn RulesSource>,
}

/// Which flow an event is handled by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Greeting,
    TimeOff,
    Query(SessionKey),
    Ignore,
}

pub struct Gateway {
    surface: Arc<dyn MessagingSurface>,
    sessions: Arc<SessionStore>,
    query_agent: AgentLoop,
    ooo_agent: AgentLoop,
    directory: Arc<dyn UserDirectory>,
    rules: RulesCache,
    prompts: PromptBuilder,
    streaming: StreamingConfig,
    ooo_channel_id: Option<String>,
    bot_user_id: Option<String>,
    agent_timeout: Duration,
    key_locks: Mutex<HashMap<SessionKey, Arc<Mutex<()>>>>,
}

impl Gateway {
    pub fn new(
        config: &Config,
        surface: Arc<dyn MessagingSurface>,
        provider: Arc<dyn LLMProvider>,
        services: Services,
    ) -> Self {
        let query_registry = Arc::new(query_tools(services.query));
        let ooo_registry = Arc::new(ooo_tools(services.time_off, services.calendar));

        Self {
            surface,
            sessions: Arc::new(SessionStore::from_config(&config.session)),
            query_agent: AgentLoop::new(Arc::clone(&provider), query_registry, &config.agent),
            ooo_agent: AgentLoop::new(provider, ooo_registry, &config.agent),
            directory: services.directory,
            rules: RulesCache::new(
                services.rules,
                Duration::from_secs(config.rules.cache_ttl_secs),
            ),
            prompts: PromptBuilder::from_config(&config.agent),
            streaming: config.streaming.clone(),
            ooo_channel_id: config
                .slack
                .ooo_channel_id
                .clone()
                .filter(|id| !id.trim().is_empty()),
            bot_user_id: None,
            agent_timeout: Duration::from_secs(config.agent.agent_timeout_secs),
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Bot's own user id, so channel posts that mention it are left to the
    /// mention event.
    pub fn with_bot_user_id(mut self, bot_user_id: &str) -> Self {
        self.bot_user_id = Some(bot_user_id.to_string()).filter(|id| !id.is_empty());
        self
    }

    /// Share an existing session store instead of the one built from config.
    pub fn with_sessions(mut self, sessions: Arc<SessionStore>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    fn is_ooo_channel(&self, channel: &str) -> bool {
        self.ooo_channel_id.as_deref() == Some(channel)
    }

    fn mentions_bot(&self, text: &str) -> bool {
        self.bot_user_id
            .as_deref()
            .is_some_and(|id| text.contains(&format!("<@{}>", id)))
    }

    /// Decide which flow handles `event`.
    pub fn route(&self, event: &InboundEvent) -> Route {
        match event.kind {
            EventKind::Mention => {
                if event.text.trim().is_empty() {
                    Route::Greeting
                } else if self.is_ooo_channel(&event.channel) {
                    Route::TimeOff
                } else {
                    Route::Query(SessionKey::new(
                        SurfaceKind::Channel,
                        &event.channel,
                        &event.user_id,
                    ))
                }
            }
            EventKind::Message => {
                if self.is_ooo_channel(&event.channel) {
                    if self.mentions_bot(&event.text) {
                        Route::Ignore
                    } else {
                        Route::TimeOff
                    }
                } else if event.is_direct() {
                    Route::Query(SessionKey::new(
                        SurfaceKind::DirectMessage,
                        &event.channel,
                        &event.user_id,
                    ))
                } else {
                    Route::Ignore
                }
            }
        }
    }

    /// Handle one inbound event to completion. Never fails; problems are
    /// answered with an apology and logged.
    pub async fn handle(&self, event: InboundEvent) {
        let request_id = Uuid::new_v4();
        let span = info_span!(
            "event",
            request_id = %request_id,
            channel = %event.channel,
            user = %event.user_id,
            kind = ?event.kind,
        );

        async {
            let route = self.route(&event);
            debug!(?route, "Routing event");

            let outcome = match route {
                Route::Greeting => self
                    .surface
                    .post(&event.channel, GREETING_MESSAGE, None)
                    .await
                    .map(|_| ()),
                Route::TimeOff => self.handle_time_off(&event).await,
                Route::Query(key) => self.handle_query(&event, key).await,
                Route::Ignore => Ok(()),
            };
            if let Err(e) = outcome {
                error!(error = %e, "Could not deliver reply");
            }

            self.sweep().await;
        }
        .instrument(span)
        .await
    }

    /// Consume events until the sender side closes, one task per event.
    pub async fn serve(self: Arc<Self>, mut events: mpsc::Receiver<InboundEvent>) {
        info!("Gateway accepting events");
        while let Some(event) = events.recv().await {
            let gateway = Arc::clone(&self);
            tokio::spawn(async move {
                gateway.handle(event).await;
            });
        }
        info!("Event stream closed, gateway stopping");
    }

    async fn identity(&self, user_id: &str) -> UserIdentity {
        match self.surface.user_identity(user_id).await {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "User lookup failed, using placeholder identity");
                UserIdentity::unknown(user_id)
            }
        }
    }

    async fn with_timeout<T>(
        &self,
        run: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.agent_timeout, run).await {
            Ok(result) => result,
            Err(_) => Err(YuriError::Timeout(self.agent_timeout.as_secs())),
        }
    }

    async fn handle_time_off(&self, event: &InboundEvent) -> Result<()> {
        info!("Out-of-office message received");
        let identity = self.identity(&event.user_id).await;
        let today = self.prompts.today();
        let system = self.prompts.ooo_prompt(today);
        let ctx = ToolContext::new()
            .with_origin(&event.channel, &event.user_id)
            .with_today(today);
        let thread = event.message_id.as_deref();

        let run = self.ooo_agent.run(
            &system,
            Vec::new(),
            contextual_message(&identity, &event.text),
            &ctx,
        );
        match self.with_timeout(run).await {
            Ok(outcome) => {
                self.surface
                    .post(&event.channel, &format_for_slack(&outcome.reply), thread)
                    .await?;
            }
            Err(e) => {
                error!(error = %e, "Out-of-office request failed");
                self.surface
                    .post(&event.channel, TIME_OFF_ERROR_MESSAGE, thread)
                    .await?;
            }
        }
        Ok(())
    }

    async fn handle_query(&self, event: &InboundEvent, key: SessionKey) -> Result<()> {
        let lock = self.key_lock(&key).await;
        let _guard = lock.lock().await;
        info!(session = %key, "Query received");

        let identity = self.identity(&event.user_id).await;
        let directory_user = match self.directory.lookup(&event.user_id).await {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Directory lookup failed, treating user as unknown");
                None
            }
        };
        let today = self.prompts.today();
        let rules = self.rules.get().await;
        let system = self.prompts.query_prompt(
            today,
            &user_context(&event.user_id, &identity.name, directory_user.as_ref()),
            &rules,
        );
        let ctx = ToolContext::new()
            .with_origin(&event.channel, &event.user_id)
            .with_today(today);

        let mut publisher = StreamingPublisher::start(
            Arc::clone(&self.surface),
            &event.channel,
            None,
            &self.streaming,
        )
        .await?;

        let history = self.sessions.get(&key).await;
        let run = self.query_agent.run_streaming(
            &system,
            history,
            contextual_message(&identity, &event.text),
            &ctx,
            &mut publisher,
        );
        match self.with_timeout(run).await {
            Ok(outcome) => {
                publisher.finish(&outcome.reply).await;
                self.sessions.save(&key, outcome.turns).await;
                info!(rounds = outcome.rounds, "Query answered");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Query failed");
                publisher.fail(user_facing_message(&e)).await
            }
        }
    }

    async fn key_lock(&self, key: &SessionKey) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().await;
        locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Evict idle sessions and the locks nobody is holding.
    async fn sweep(&self) {
        let removed = self.sessions.sweep().await;
        if removed > 0 {
            debug!(removed, "Swept idle sessions");
        }
        let mut locks = self.key_locks.lock().await;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}
