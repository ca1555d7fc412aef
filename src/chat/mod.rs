//! Support-chat controller
//!
//! Drives one conversation with the backend assistant: appends turns,
//! sends the trailing context window, and merges what the server sends
//! back (order snapshot, detected order id, intent and priority tags)
//! into in-memory state. A chat failure never interrupts the
//! conversation; it becomes an inline apology turn carrying the error.

use std::sync::Arc;

use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::client::{ApiClient, ApiError, RequestOptions};
use crate::config::{ChatBackend, Config};
use crate::conversation::{Conversation, Message, Priority};
use crate::orders::OrderDetails;
use crate::wizard::MenuItem;

const WELCOME: &str = "Welcome to Mangia Eats! How can I help you?";

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("input is blocked while a high-priority issue is open")]
    InputBlocked,

    #[error("another message is still being sent")]
    RequestInFlight,
}

#[derive(Debug, Serialize)]
struct AssistantContext<'a> {
    is_ordering: bool,
    previous_messages: &'a [Message],
}

/// `POST /ai-chat` request body.
#[derive(Debug, Serialize)]
struct AssistantChatRequest<'a> {
    message: &'a str,
    order_id: Option<i64>,
    context: AssistantContext<'a>,
}

#[derive(Debug, Deserialize)]
struct AssistantChatResponse {
    response: String,
    #[serde(default)]
    intent: Option<String>,
    #[serde(default)]
    priority: Option<Priority>,
    #[serde(default)]
    order_details: Option<OrderDetails>,
    #[serde(default)]
    menu_items: Option<Vec<MenuItem>>,
}

/// `POST /chat` request body.
#[derive(Debug, Serialize)]
struct TranscriptChatRequest<'a> {
    messages: &'a [Message],
    order_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TranscriptChatResponse {
    response: String,
    #[serde(default)]
    order_data: Option<OrderDetails>,
    #[serde(default)]
    detected_order_id: Option<i64>,
}

/// Both chat endpoints normalized to one shape before merging.
#[derive(Debug)]
struct ChatReply {
    text: String,
    intent: Option<String>,
    priority: Option<Priority>,
    order: Option<OrderDetails>,
    detected_order_id: Option<i64>,
    menu_items: Vec<MenuItem>,
}

impl From<AssistantChatResponse> for ChatReply {
    fn from(r: AssistantChatResponse) -> Self {
        Self {
            text: r.response,
            intent: r.intent,
            priority: r.priority,
            order: r.order_details,
            detected_order_id: None,
            menu_items: r.menu_items.unwrap_or_default(),
        }
    }
}

impl From<TranscriptChatResponse> for ChatReply {
    fn from(r: TranscriptChatResponse) -> Self {
        Self {
            text: r.response,
            intent: None,
            priority: None,
            order: r.order_data,
            detected_order_id: r.detected_order_id,
            menu_items: Vec::new(),
        }
    }
}

pub struct ChatController {
    api: Arc<ApiClient>,
    backend: ChatBackend,
    context_window: usize,
    conversation: Conversation,
    /// Correlation id: the order the conversation is about, once known.
    order_id: Option<i64>,
    priority: Priority,
    last_order: Option<OrderDetails>,
    menu_items: Vec<MenuItem>,
    is_ordering: bool,
    next_seq: u64,
    applied_seq: u64,
    in_flight: bool,
}

impl ChatController {
    pub fn new(api: Arc<ApiClient>, config: &Config) -> Self {
        let mut conversation = Conversation::new();
        conversation.add_assistant(WELCOME);
        Self {
            api,
            backend: config.chat_backend,
            context_window: config.context_window,
            conversation,
            order_id: None,
            priority: Priority::Normal,
            last_order: None,
            menu_items: Vec::new(),
            is_ordering: false,
            next_seq: 0,
            applied_seq: 0,
            in_flight: false,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn order_id(&self) -> Option<i64> {
        self.order_id
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Free-text input is refused while the last classification is high.
    pub fn is_input_blocked(&self) -> bool {
        self.priority.is_high()
    }

    /// The most recent order snapshot the server sent back, if any.
    pub fn last_order(&self) -> Option<&OrderDetails> {
        self.last_order.as_ref()
    }

    pub fn menu_items(&self) -> &[MenuItem] {
        &self.menu_items
    }

    pub fn is_ordering(&self) -> bool {
        self.is_ordering
    }

    /// Drop the correlation id. Nothing else ever clears it; it is
    /// otherwise attached to every chat request once detected.
    pub fn clear_order(&mut self) {
        self.order_id = None;
        self.last_order = None;
    }

    /// Send a free-text user turn. Blocked while priority is high.
    ///
    /// Returns the appended assistant turn: the server reply on success,
    /// or the synthesized apology when the request failed. Prior
    /// conversation state is never rolled back either way.
    pub async fn send(&mut self, text: &str) -> Result<&Message, ChatError> {
        if self.is_input_blocked() {
            return Err(ChatError::InputBlocked);
        }
        self.send_inner(text).await
    }

    /// Send a guided-option selection. Options presented by the server
    /// stay clickable even under the high-priority gate, which is also
    /// how the server gets a chance to downgrade the classification.
    pub async fn choose(&mut self, value: &str) -> Result<&Message, ChatError> {
        self.send_inner(value).await
    }

    async fn send_inner(&mut self, text: &str) -> Result<&Message, ChatError> {
        if self.in_flight {
            return Err(ChatError::RequestInFlight);
        }

        // Context before this turn, for the assistant endpoint.
        let previous: Vec<Message> =
            self.conversation.context_window(self.context_window).to_vec();

        self.conversation.push(Message::user(text));

        let transcript: Vec<Message> =
            self.conversation.context_window(self.context_window).to_vec();

        self.in_flight = true;
        self.next_seq += 1;
        let seq = self.next_seq;

        let result = match self.backend {
            ChatBackend::Assistant => self.assistant_chat(text, &previous).await,
            ChatBackend::Transcript => self.transcript_chat(&transcript).await,
        };
        self.in_flight = false;

        match result {
            Ok(reply) => self.merge_response(seq, reply),
            Err(error) => {
                tracing::error!(%error, "chat request failed");
                self.conversation.push(Message::assistant(format!(
                    "Sorry, there was an error: {error}. Please try again."
                )));
            }
        }

        Ok(self
            .conversation
            .last()
            .expect("conversation holds at least the welcome turn"))
    }

    async fn assistant_chat(
        &self,
        text: &str,
        previous: &[Message],
    ) -> Result<ChatReply, ApiError> {
        let request = AssistantChatRequest {
            message: text,
            order_id: self.order_id,
            context: AssistantContext {
                is_ordering: self.is_ordering,
                previous_messages: previous,
            },
        };
        let response: AssistantChatResponse = self
            .api
            .request(
                Method::POST,
                "/ai-chat",
                Some(serde_json::to_value(&request)?),
                RequestOptions {
                    policy: None,
                    with_auth: true,
                },
            )
            .await?;
        Ok(response.into())
    }

    async fn transcript_chat(&self, transcript: &[Message]) -> Result<ChatReply, ApiError> {
        let request = TranscriptChatRequest {
            messages: transcript,
            order_id: self.order_id,
        };
        let response: TranscriptChatResponse = self
            .api
            .request(
                Method::POST,
                "/chat",
                Some(serde_json::to_value(&request)?),
                RequestOptions {
                    policy: None,
                    with_auth: true,
                },
            )
            .await?;
        Ok(response.into())
    }

    /// Merge a reply unless a response with a newer sequence number was
    /// already applied; merging out of order would rewind state.
    fn merge_response(&mut self, seq: u64, reply: ChatReply) {
        if seq <= self.applied_seq {
            tracing::warn!(seq, applied = self.applied_seq, "discarding stale chat response");
            return;
        }
        self.applied_seq = seq;
        self.apply_reply(reply);
    }

    fn apply_reply(&mut self, reply: ChatReply) {
        if let Some(order) = reply.order {
            self.order_id = Some(order.order_id);
            self.last_order = Some(order);
        }
        if let Some(id) = reply.detected_order_id {
            self.order_id = Some(id);
        }
        if !reply.menu_items.is_empty() {
            self.menu_items = reply.menu_items;
            self.is_ordering = true;
        }
        if let Some(priority) = reply.priority {
            self.priority = priority;
        }
        self.conversation
            .push(Message::assistant(reply.text).with_tags(reply.intent, reply.priority));
    }
}
