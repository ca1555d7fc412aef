//! Session lifecycle
//!
//! A session bundles one conversation with one order wizard for a
//! single customer visit. Sessions live purely in memory: they are
//! created on first use, touched on every interaction and evicted once
//! idle past the configured timeout. Nothing survives a restart.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::chat::ChatController;
use crate::client::ApiClient;
use crate::config::Config;
use crate::wizard::OrderWizard;

pub struct ChatSession {
    pub id: Uuid,
    pub controller: ChatController,
    pub wizard: OrderWizard,
    last_activity: Instant,
}

impl ChatSession {
    fn new(api: Arc<ApiClient>, config: &Config) -> Self {
        Self {
            id: Uuid::new_v4(),
            controller: ChatController::new(api.clone(), config),
            wizard: OrderWizard::new(api),
            last_activity: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }
}

pub struct SessionManager {
    api: Arc<ApiClient>,
    config: Config,
    sessions: HashMap<Uuid, ChatSession>,
    max_idle: Duration,
}

impl SessionManager {
    pub fn new(api: Arc<ApiClient>, config: Config) -> Self {
        let max_idle = config.session_idle();
        Self {
            api,
            config,
            sessions: HashMap::new(),
            max_idle,
        }
    }

    /// Override the idle timeout from the config.
    pub fn with_max_idle(mut self, max_idle: Duration) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Create a fresh session and return its id.
    pub fn create(&mut self) -> Uuid {
        let session = ChatSession::new(self.api.clone(), &self.config);
        let id = session.id;
        tracing::info!(session = %id, "session created");
        self.sessions.insert(id, session);
        id
    }

    /// Look up a session, marking it active.
    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut ChatSession> {
        let session = self.sessions.get_mut(&id)?;
        session.touch();
        Some(session)
    }

    /// Drop every session idle past the timeout; returns how many went.
    pub fn evict_idle(&mut self) -> usize {
        let max_idle = self.max_idle;
        let before = self.sessions.len();
        self.sessions.retain(|id, session| {
            let keep = session.idle_for() < max_idle;
            if !keep {
                tracing::info!(session = %id, "evicting idle session");
            }
            keep
        });
        before - self.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
