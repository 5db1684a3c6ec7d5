//! Channel implementations for Complimenter.
//!
//! Each channel implements the `complimenter_core::Channel` trait.

pub mod cli;
pub mod telegram;

pub use cli::CliChannel;
pub use telegram::{TelegramChannel, TelegramConfig};
