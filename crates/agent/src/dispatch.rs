//! Event dispatch between a channel and the bot.
//!
//! Each event is handled on its own task so one slow generation does not
//! hold up other users.

use crate::bot::ComplimentBot;
use complimenter_core::channel::{Channel, InboundEvent};
use complimenter_core::error::ChannelError;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Run until the channel closes its event stream, then wait for in-flight
/// handlers to finish.
pub async fn serve(channel: Arc<dyn Channel>, bot: Arc<ComplimentBot>) -> Result<(), ChannelError> {
    let mut rx = channel.start().await?;
    info!(channel = channel.name(), "Dispatcher started");

    let mut tasks = JoinSet::new();
    while let Some(result) = rx.recv().await {
        match result {
            Ok(event) => {
                let channel = channel.clone();
                let bot = bot.clone();
                tasks.spawn(async move {
                    handle_event(channel.as_ref(), &bot, event).await;
                });
            }
            Err(e) => warn!(channel = channel.name(), error = %e, "Channel error"),
        }

        // Reap finished handlers.
        while let Some(joined) = tasks.try_join_next() {
            if let Err(e) = joined {
                warn!(error = %e, "Event handler panicked");
            }
        }
    }

    debug!(pending = tasks.len(), "Event stream closed, draining handlers");
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "Event handler panicked");
        }
    }

    channel.stop().await?;
    info!(channel = channel.name(), "Dispatcher stopped");
    Ok(())
}

/// Acknowledge a button press, let the bot handle the event and deliver
/// its replies in order.
pub async fn handle_event(channel: &dyn Channel, bot: &ComplimentBot, event: InboundEvent) {
    if let InboundEvent::Callback { callback_id, .. } = &event {
        if let Err(e) = channel.acknowledge(callback_id).await {
            warn!(channel = channel.name(), error = %e, "Failed to acknowledge callback");
        }
    }

    let user_id = event.user_id().to_string();
    for message in bot.handle(event).await {
        if let Err(e) = channel.send(&message).await {
            warn!(channel = channel.name(), user_id = %user_id, error = %e, "Failed to deliver reply");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ComplimentPipeline;
    use crate::prompt::PromptTemplate;
    use async_trait::async_trait;
    use complimenter_core::channel::OutboundMessage;
    use complimenter_memory::InMemoryContextStore;
    use complimenter_providers::rule_based::RuleBasedResponder;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    /// Replays a fixed list of events and records what the bot sends back.
    struct ScriptedChannel {
        events: Mutex<Vec<Result<InboundEvent, ChannelError>>>,
        sent: Mutex<Vec<OutboundMessage>>,
        acked: Mutex<Vec<String>>,
    }

    impl ScriptedChannel {
        fn new(events: Vec<Result<InboundEvent, ChannelError>>) -> Self {
            Self {
                events: Mutex::new(events),
                sent: Mutex::new(Vec::new()),
                acked: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Channel for ScriptedChannel {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn start(
            &self,
        ) -> Result<mpsc::Receiver<Result<InboundEvent, ChannelError>>, ChannelError> {
            let events: Vec<_> = self.events.lock().unwrap().drain(..).collect();
            let (tx, rx) = mpsc::channel(events.len().max(1));
            for event in events {
                tx.send(event).await.unwrap();
            }
            Ok(rx)
        }

        async fn send(&self, message: &OutboundMessage) -> Result<(), ChannelError> {
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }

        async fn acknowledge(&self, callback_id: &str) -> Result<(), ChannelError> {
            self.acked.lock().unwrap().push(callback_id.to_string());
            Ok(())
        }
    }

    fn bot() -> Arc<ComplimentBot> {
        let pipeline = ComplimentPipeline::new(
            RuleBasedResponder::default(),
            PromptTemplate::with_default("Оля"),
        );
        Arc::new(ComplimentBot::new(
            Arc::new(InMemoryContextStore::new()),
            Arc::new(pipeline),
        ))
    }

    #[tokio::test]
    async fn serves_every_event_and_acknowledges_callbacks() {
        let channel = Arc::new(ScriptedChannel::new(vec![
            Ok(InboundEvent::Start {
                user_id: "1".into(),
                chat_id: "1".into(),
            }),
            Err(ChannelError::ConnectionLost("blip".into())),
            Ok(InboundEvent::Callback {
                user_id: "2".into(),
                chat_id: "2".into(),
                callback_id: "cb-7".into(),
                data: "type:appearance".into(),
            }),
        ]));

        serve(channel.clone(), bot()).await.unwrap();

        let sent = channel.sent.lock().unwrap();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent.iter().filter(|m| m.chat_id == "1").count(), 1);
        let to_two: Vec<&str> = sent
            .iter()
            .filter(|m| m.chat_id == "2")
            .map(|m| m.text.as_str())
            .collect();
        assert_eq!(to_two.len(), 2);
        assert!(to_two[0].contains("улыбка"));
        assert_eq!(to_two[1], crate::bot::MORE_PROMPT);
        assert_eq!(*channel.acked.lock().unwrap(), ["cb-7"]);
    }

    #[tokio::test]
    async fn handle_event_delivers_in_order() {
        let channel = ScriptedChannel::new(Vec::new());
        let bot = bot();
        handle_event(
            &channel,
            &bot,
            InboundEvent::Callback {
                user_id: "3".into(),
                chat_id: "3".into(),
                callback_id: "cb".into(),
                data: "type:character".into(),
            },
        )
        .await;

        let sent = channel.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].keyboard.is_none());
        assert!(sent[1].keyboard.is_some());
    }
}
