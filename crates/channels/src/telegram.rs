//! Telegram channel adapter.
//!
//! Built on `teloxide`: a long-polling [`Dispatcher`] turns messages and
//! callback queries into [`InboundEvent`]s, replies go out through
//! `sendMessage` with an inline keyboard, and button presses are answered with
//! `answerCallbackQuery`.

use async_trait::async_trait;
use complimenter_core::channel::{Channel, InboundEvent, Keyboard, OutboundMessage};
use complimenter_core::error::ChannelError;
use std::time::Duration;
use teloxide::RequestError;
use teloxide::dispatching::{Dispatcher, UpdateFilterExt};
use teloxide::error_handlers::LoggingErrorHandler;
use teloxide::prelude::*;
use teloxide::types::{AllowedUpdate, InlineKeyboardButton, InlineKeyboardMarkup, Update};
use teloxide::update_listeners::Polling;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";
/// Long-poll timeout passed to `getUpdates`.
pub const POLL_TIMEOUT_SECS: u64 = 30;

type EventSender = mpsc::Sender<Result<InboundEvent, ChannelError>>;

/// Telegram channel configuration.
#[derive(Clone)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    pub bot_token: String,
    /// Bot API root, overridable for tests.
    pub api_base: String,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base: DEFAULT_API_BASE.into(),
        }
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Telegram channel adapter.
pub struct TelegramChannel {
    bot: Bot,
    poller: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Result<Self, ChannelError> {
        if config.bot_token.trim().is_empty() {
            return Err(ChannelError::NotConfigured("Telegram bot token is empty".into()));
        }
        let api_url = reqwest::Url::parse(&config.api_base).map_err(|e| {
            ChannelError::NotConfigured(format!("Invalid Bot API url '{}': {e}", config.api_base))
        })?;

        Ok(Self {
            bot: Bot::new(config.bot_token).set_api_url(api_url),
            poller: tokio::sync::Mutex::new(None),
        })
    }
}

/// Run the dispatcher until the task is aborted.
async fn poll_updates(bot: Bot, tx: EventSender) {
    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(on_message))
        .branch(Update::filter_callback_query().endpoint(on_callback));

    let listener = Polling::builder(bot.clone())
        .timeout(Duration::from_secs(POLL_TIMEOUT_SECS))
        .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::CallbackQuery])
        .delete_webhook()
        .await
        .build();

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![tx])
        .default_handler(|update| async move {
            debug!(update_id = ?update.id, "Ignoring unhandled update");
        })
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("Telegram polling failed"),
        )
        .await;

    warn!("Telegram dispatcher stopped");
}

async fn on_message(msg: Message, tx: EventSender) -> ResponseResult<()> {
    forward(&tx, message_event(&msg)).await;
    Ok(())
}

async fn on_callback(query: CallbackQuery, tx: EventSender) -> ResponseResult<()> {
    match callback_event(&query) {
        Some(event) => forward(&tx, event).await,
        None => debug!(callback_id = %query.id, "Callback query without data"),
    }
    Ok(())
}

async fn forward(tx: &EventSender, event: InboundEvent) {
    if tx.send(Ok(event)).await.is_err() {
        debug!("Event receiver dropped");
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<InboundEvent, ChannelError>>, ChannelError> {
        let me = self
            .bot
            .get_me()
            .await
            .map_err(|e| map_request_err("getMe", e))?;
        info!(bot = me.username(), "Telegram channel starting");

        let (tx, rx) = mpsc::channel(64);
        let handle = tokio::spawn(poll_updates(self.bot.clone(), tx));
        if let Some(previous) = self.poller.lock().await.replace(handle) {
            previous.abort();
        }
        Ok(rx)
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), ChannelError> {
        let chat_id = parse_chat_id(&message.chat_id)?;
        let request = self.bot.send_message(chat_id, message.text.as_str());
        let request = match &message.keyboard {
            Some(keyboard) => request.reply_markup(inline_markup(keyboard)),
            None => request,
        };

        request
            .await
            .map_err(|e| map_request_err("sendMessage", e))?;
        debug!(chat_id = %message.chat_id, content_len = message.text.len(), "Telegram message sent");
        Ok(())
    }

    async fn acknowledge(&self, callback_id: &str) -> Result<(), ChannelError> {
        self.bot
            .answer_callback_query(callback_id)
            .await
            .map_err(|e| map_request_err("answerCallbackQuery", e))?;
        Ok(())
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        info!("Telegram channel stopping");
        if let Some(handle) = self.poller.lock().await.take() {
            handle.abort();
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, ChannelError> {
        Ok(self.bot.get_me().await.is_ok())
    }
}

fn map_request_err(method: &str, e: RequestError) -> ChannelError {
    match e {
        RequestError::Network(e) => ChannelError::ConnectionLost(format!("{method}: {e}")),
        other => ChannelError::DeliveryFailed {
            channel: "telegram".into(),
            reason: format!("{method}: {other}"),
        },
    }
}

fn parse_chat_id(raw: &str) -> Result<ChatId, ChannelError> {
    raw.parse::<i64>()
        .map(ChatId)
        .map_err(|_| ChannelError::InvalidPayload(format!("not a Telegram chat id: '{raw}'")))
}

fn inline_markup(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(keyboard.rows.iter().map(|row| {
        row.iter()
            .map(|b| InlineKeyboardButton::callback(b.text.clone(), b.data.clone()))
            .collect::<Vec<_>>()
    }))
}

/// Map a message onto a bot event. Non-text messages become empty text.
fn message_event(msg: &Message) -> InboundEvent {
    let chat_id = msg.chat.id.0.to_string();
    let user_id = msg
        .from
        .as_ref()
        .map(|u| u.id.0.to_string())
        .unwrap_or_else(|| chat_id.clone());
    let text = msg.text().unwrap_or_default();

    if is_start_command(text) {
        InboundEvent::Start { user_id, chat_id }
    } else {
        InboundEvent::Text {
            user_id,
            chat_id,
            text: text.to_string(),
        }
    }
}

/// Button presses without callback data yield `None`.
fn callback_event(query: &CallbackQuery) -> Option<InboundEvent> {
    let data = query.data.clone()?;
    let user_id = query.from.id.0.to_string();
    let chat_id = query
        .message
        .as_ref()
        .map(|m| m.chat().id.0.to_string())
        .unwrap_or_else(|| user_id.clone());
    Some(InboundEvent::Callback {
        user_id,
        chat_id,
        callback_id: query.id.clone(),
        data,
    })
}

/// `/start`, `/start@SomeBot` or `/start <payload>`.
fn is_start_command(text: &str) -> bool {
    let command = text.split_whitespace().next().unwrap_or_default();
    command == "/start" || command.starts_with("/start@")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Bytes;
    use axum::http::Uri;
    use axum::response::Json;
    use complimenter_core::channel::InlineButton;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn chat_message(chat_id: i64, from: Option<i64>, extra: Value) -> Value {
        let mut msg = json!({
            "message_id": 7,
            "date": 1_700_000_000,
            "chat": { "id": chat_id, "type": "private", "first_name": "Оля" },
        });
        if let Some(id) = from {
            msg["from"] = json!({ "id": id, "is_bot": false, "first_name": "Оля" });
        }
        for (key, value) in extra.as_object().unwrap() {
            msg[key] = value.clone();
        }
        msg
    }

    fn message(value: Value) -> Message {
        serde_json::from_value(value).unwrap()
    }

    fn callback(value: Value) -> CallbackQuery {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn empty_token_is_rejected() {
        assert!(matches!(
            TelegramChannel::new(TelegramConfig::new("  ")),
            Err(ChannelError::NotConfigured(_))
        ));
    }

    #[test]
    fn debug_redacts_token() {
        let debug = format!("{:?}", TelegramConfig::new("123:secret"));
        assert!(!debug.contains("secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn parses_start_command() {
        for text in ["/start", "/start@ComplimentBot", "/start ref42"] {
            let event = message_event(&message(chat_message(10, Some(20), json!({ "text": text }))));
            assert_eq!(
                event,
                InboundEvent::Start {
                    user_id: "20".into(),
                    chat_id: "10".into()
                },
                "{text}"
            );
        }
    }

    #[test]
    fn parses_text_and_non_text_messages() {
        let event = message_event(&message(chat_message(
            10,
            Some(20),
            json!({ "text": "/starting over" }),
        )));
        assert!(matches!(event, InboundEvent::Text { text, .. } if text == "/starting over"));

        let location = message_event(&message(chat_message(
            10,
            None,
            json!({ "location": { "latitude": 55.75, "longitude": 37.61 } }),
        )));
        assert_eq!(
            location,
            InboundEvent::Text {
                user_id: "10".into(),
                chat_id: "10".into(),
                text: String::new()
            }
        );
    }

    #[test]
    fn parses_callback_query() {
        let event = callback_event(&callback(json!({
            "id": "cbq-1",
            "from": { "id": 20, "is_bot": false, "first_name": "Оля", "username": "olya" },
            "message": chat_message(10, None, json!({ "text": "Выбери тип комплимента:" })),
            "chat_instance": "ci-1",
            "data": "type:appearance"
        })));
        assert_eq!(
            event,
            Some(InboundEvent::Callback {
                user_id: "20".into(),
                chat_id: "10".into(),
                callback_id: "cbq-1".into(),
                data: "type:appearance".into()
            })
        );

        let no_data = callback_event(&callback(json!({
            "id": "cbq-2",
            "from": { "id": 20, "is_bot": false, "first_name": "Оля" },
            "chat_instance": "ci-1"
        })));
        assert_eq!(no_data, None);
    }

    #[test]
    fn keyboard_markup_shape() {
        let keyboard = Keyboard::new(vec![
            vec![
                InlineButton::new("Внешность", "type:appearance"),
                InlineButton::new("Характер", "type:character"),
            ],
            vec![InlineButton::new("Достижения", "type:achievements")],
        ]);
        let markup = serde_json::to_value(inline_markup(&keyboard)).unwrap();
        assert_eq!(markup["inline_keyboard"][0][1]["callback_data"], "type:character");
        assert_eq!(markup["inline_keyboard"][1][0]["text"], "Достижения");
    }

    #[test]
    fn chat_id_must_be_numeric() {
        assert_eq!(parse_chat_id("-100123").unwrap(), ChatId(-100123));
        assert!(matches!(
            parse_chat_id("cli_session"),
            Err(ChannelError::InvalidPayload(_))
        ));
    }

    /// Requests seen by the fake Bot API: lowercased method name plus JSON body.
    type Seen = Arc<Mutex<Vec<(String, Value)>>>;

    /// A fake Bot API answering every method through one handler.
    async fn serve_bot_api(
        respond: impl Fn(&str, &Value) -> Value + Clone + Send + Sync + 'static,
    ) -> (String, Seen) {
        let seen: Seen = Arc::default();
        let sink = seen.clone();
        let app = Router::new().fallback(move |uri: Uri, body: Bytes| {
            let sink = sink.clone();
            let respond = respond.clone();
            async move {
                let method = uri.path().rsplit('/').next().unwrap_or_default().to_lowercase();
                let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
                let reply = respond(&method, &body);
                sink.lock().unwrap().push((method, body));
                Json(reply)
            }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), seen)
    }

    fn bot_user() -> Value {
        json!({ "id": 1, "is_bot": true, "first_name": "Complimenter", "username": "complimenter_bot" })
    }

    fn channel_at(api_base: String) -> TelegramChannel {
        TelegramChannel::new(TelegramConfig {
            bot_token: "123:tok".into(),
            api_base,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn send_message_posts_keyboard() {
        let (base, seen) = serve_bot_api(|_, body| {
            json!({ "ok": true, "result": {
                "message_id": 1,
                "date": 1_700_000_000,
                "chat": { "id": 10, "type": "private", "first_name": "Оля" },
                "from": bot_user(),
                "text": body["text"],
            }})
        })
        .await;
        let channel = channel_at(base);

        let keyboard = Keyboard::new(vec![vec![InlineButton::new("Ещё один", "type:character")]]);
        channel
            .send(&OutboundMessage::text("10", "Хочешь ещё?").with_keyboard(keyboard))
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (method, body) = &seen[0];
        assert_eq!(method, "sendmessage");
        assert_eq!(body["chat_id"], 10);
        assert_eq!(body["text"], "Хочешь ещё?");
        assert_eq!(
            body["reply_markup"]["inline_keyboard"][0][0]["callback_data"],
            "type:character"
        );
    }

    #[tokio::test]
    async fn rejected_request_is_delivery_failure() {
        let (base, _) = serve_bot_api(|_, _| {
            json!({ "ok": false, "error_code": 400, "description": "Bad Request: chat not found" })
        })
        .await;
        let channel = channel_at(base);

        let err = channel
            .send(&OutboundMessage::text("10", "hi"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, ChannelError::DeliveryFailed { reason, .. } if reason.contains("chat not found"))
        );
    }

    #[tokio::test]
    async fn acknowledge_answers_callback_query() {
        let (base, seen) = serve_bot_api(|_, _| json!({ "ok": true, "result": true })).await;
        channel_at(base).acknowledge("cbq-9").await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].0, "answercallbackquery");
        assert_eq!(seen[0].1["callback_query_id"], "cbq-9");
    }

    #[tokio::test]
    async fn polling_delivers_updates() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = polls.clone();
        let (base, _) = serve_bot_api(move |method, _| match method {
            "getme" => json!({ "ok": true, "result": bot_user() }),
            "getupdates" if counter.fetch_add(1, Ordering::SeqCst) == 0 => json!({
                "ok": true,
                "result": [{
                    "update_id": 100,
                    "message": chat_message(10, Some(20), json!({ "text": "/start" })),
                }]
            }),
            "getupdates" => {
                std::thread::sleep(Duration::from_millis(20));
                json!({ "ok": true, "result": [] })
            }
            _ => json!({ "ok": true, "result": true }),
        })
        .await;
        let channel = channel_at(base);

        let mut rx = channel.start().await.unwrap();
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            InboundEvent::Start {
                user_id: "20".into(),
                chat_id: "10".into()
            }
        );
        assert!(polls.load(Ordering::SeqCst) >= 1);
        channel.stop().await.unwrap();
    }
}
