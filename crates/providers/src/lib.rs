//! Text generation tiers for Complimenter.
//!
//! The remote tier implements the `complimenter_core::Provider` trait.
//! The local tier and the rule-based responder are concrete types driven
//! directly by the compliment pipeline.

#[cfg(feature = "local")]
pub mod candle;
pub mod local;
pub mod openai_compat;
pub mod rule_based;

pub use local::{EngineLoader, LocalEngine, LocalGenerator, LocalStatus};
pub use openai_compat::OpenAiCompatProvider;
pub use rule_based::RuleBasedResponder;
