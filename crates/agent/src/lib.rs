//! Compliment generation and bot dispatch.
//!
//! The flow for one button press:
//!
//! 1. **Receive** a callback event from a channel
//! 2. **Load context** (the most recent messages for that user)
//! 3. **Produce** a compliment: remote API, then local model, then templates
//! 4. **Persist** the request marker and the reply
//! 5. **Reply** with the compliment and a follow-up keyboard

pub mod bot;
pub mod dispatch;
pub mod pipeline;
pub mod prompt;

pub use bot::ComplimentBot;
pub use pipeline::ComplimentPipeline;
pub use prompt::PromptTemplate;
