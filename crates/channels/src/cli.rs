//! CLI channel — the bot in a terminal.
//!
//! Reads stdin line by line and prints replies to stdout. Button presses are
//! typed as `/type <category>`; keyboards are printed as a list of those
//! commands.

use async_trait::async_trait;
use complimenter_core::channel::{Channel, InboundEvent, OutboundMessage};
use complimenter_core::error::ChannelError;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

const CHAT_ID: &str = "cli_session";
/// Prefix of category callback data, mirrored by `/type`.
const CALLBACK_PREFIX: &str = "type:";

/// Interactive CLI channel for terminal-based chat.
pub struct CliChannel {
    user_id: String,
}

impl CliChannel {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new("local_user")
    }
}

/// What one input line means.
#[derive(Debug, PartialEq, Eq)]
enum Line {
    Skip,
    Quit,
    Event(InboundEvent),
}

fn parse_line(line: &str, user_id: &str) -> Line {
    let line = line.trim();
    if line.is_empty() {
        return Line::Skip;
    }
    if matches!(line, "exit" | "quit" | "/exit" | "/quit" | ":q") {
        return Line::Quit;
    }

    let user_id = user_id.to_string();
    let chat_id = CHAT_ID.to_string();
    if line == "/start" {
        return Line::Event(InboundEvent::Start { user_id, chat_id });
    }
    if let Some(raw) = line.strip_prefix("/type") {
        if raw.is_empty() || raw.starts_with(char::is_whitespace) {
            return Line::Event(InboundEvent::Callback {
                user_id,
                chat_id,
                callback_id: String::new(),
                data: format!("{CALLBACK_PREFIX}{}", raw.trim()),
            });
        }
    }
    Line::Event(InboundEvent::Text {
        user_id,
        chat_id,
        text: line.to_string(),
    })
}

/// Text as printed to the terminal, keyboard included.
fn render(message: &OutboundMessage) -> String {
    let mut out = format!("  Bot > {}", message.text);
    if let Some(keyboard) = &message.keyboard {
        for button in keyboard.buttons() {
            let command = button
                .data
                .strip_prefix(CALLBACK_PREFIX)
                .map(|c| format!("/type {c}"))
                .unwrap_or_else(|| button.data.clone());
            out.push_str(&format!("\n        [{}] {command}", button.text));
        }
    }
    out
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<InboundEvent, ChannelError>>, ChannelError> {
        let (tx, rx) = mpsc::channel(32);
        let user_id = self.user_id.clone();

        tokio::spawn(async move {
            let mut lines = BufReader::new(io::stdin()).lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => match parse_line(&line, &user_id) {
                        Line::Skip => continue,
                        Line::Quit => break,
                        Line::Event(event) => {
                            if tx.send(Ok(event)).await.is_err() {
                                break;
                            }
                        }
                    },
                    Ok(None) => break, // EOF (Ctrl+D)
                    Err(e) => {
                        let _ = tx.send(Err(ChannelError::ConnectionLost(e.to_string()))).await;
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), ChannelError> {
        println!("{}", render(message));
        Ok(())
    }
}
