use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;

use crate::application::errors::DeliveryError;
use crate::domain::entities::ChatId;
use crate::domain::traits::Bot;

/// Default bound on a single delivery attempt
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of delivering to one destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub chat_id: ChatId,
    pub result: Result<(), DeliveryError>,
}

impl DeliveryOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Report of one broadcast, outcomes in destination order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastResult {
    pub text: String,
    pub outcomes: Vec<DeliveryOutcome>,
}

impl BroadcastResult {
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failed(&self) -> impl Iterator<Item = &DeliveryOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn destinations(&self) -> Vec<ChatId> {
        self.outcomes.iter().map(|o| o.chat_id).collect()
    }
}

/// Delivers one text to a fixed set of destinations.
///
/// Deliveries run concurrently, each bounded by the delivery timeout. A
/// failed or hung destination is recorded and never retried here; the
/// remaining destinations are unaffected.
pub struct Broadcaster {
    bot: Arc<dyn Bot>,
    delivery_timeout: Duration,
}

impl Broadcaster {
    pub fn new(bot: Arc<dyn Bot>) -> Self {
        Self {
            bot,
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
        }
    }

    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    pub async fn broadcast(&self, text: &str, destinations: &[ChatId]) -> BroadcastResult {
        let handles: Vec<_> = destinations.iter()
            .map(|&chat_id| {
                let bot = Arc::clone(&self.bot);
                let text = text.to_string();
                let limit = self.delivery_timeout;
                let handle = tokio::spawn(async move {
                    match tokio::time::timeout(limit, bot.send_message(chat_id, &text)).await {
                        Ok(Ok(_)) => Ok(()),
                        Ok(Err(e)) => Err(DeliveryError::Failed(e.to_string())),
                        Err(_) => Err(DeliveryError::TimedOut(limit)),
                    }
                });
                (chat_id, handle)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (chat_id, handle) in handles {
            let result = handle.await
                .unwrap_or_else(|e| Err(DeliveryError::Aborted(e.to_string())));

            match &result {
                Ok(()) => tracing::info!("Delivered to {}", chat_id),
                Err(e) => tracing::warn!("Delivery to {} failed: {}", chat_id, e),
            }
            outcomes.push(DeliveryOutcome { chat_id, result });
        }

        let result = BroadcastResult {
            text: text.to_string(),
            outcomes,
        };
        tracing::info!("Broadcast delivered {}/{}", result.success_count(), result.total());
        result
    }
}

/// Uniform random choice from a phrase list
pub fn pick_random(phrases: &[String]) -> Option<String> {
    phrases.choose(&mut rand::thread_rng()).cloned()
}
