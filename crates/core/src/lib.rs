//! # Complimenter Core
//!
//! Domain types, traits, and error definitions for the Complimenter bot.
//! Every subsystem (context store, text generators, chat channels) is defined
//! here as a trait or value type; implementations live in their own crates.

pub mod error;
pub mod message;
pub mod category;
pub mod provider;
pub mod memory;
pub mod channel;

// Re-export key types at crate root for ergonomics
pub use error::{ChannelError, MemoryError, ProviderError};
pub use message::{ContextMessage, MessageRecord, Role};
pub use category::Category;
pub use provider::{Compliment, GenerationRequest, Provider, Tier};
pub use memory::ContextStore;
pub use channel::{Channel, InboundEvent, InlineButton, Keyboard, OutboundMessage};
