//! Mangia Eats support-chat client
//!
//! Client-side interaction logic for the Mangia Eats food-delivery
//! service: a resilient HTTP layer, a conversational controller that
//! threads an order id through chat turns, an order-creation wizard and
//! a stateless order lookup. Rendering and the backend services behind
//! the HTTP endpoints are external to this crate.

pub mod chat;
pub mod client;
pub mod config;
pub mod conversation;
pub mod orders;
pub mod session;
pub mod wizard;

pub use chat::{ChatController, ChatError};
pub use client::{ApiClient, ApiError, RequestOptions, RetryPolicy};
pub use config::{ChatBackend, Config};
pub use conversation::{Conversation, Message, Priority, Role};
pub use orders::{LookupError, OrderDetails, OrderLookup};
pub use session::{ChatSession, SessionManager};
pub use wizard::{Cart, CartLine, MenuItem, OrderWizard, Restaurant, WizardError, WizardStep};
