//! Fire-and-forget publication of cart events to NATS.

use crate::domain::events::CartEvent;

pub const SUBJECT_PREFIX: &str = "food_shop.cart";

#[derive(Clone, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self { Self { nats } }

    pub fn disabled() -> Self { Self::default() }

    pub fn subject(event: &CartEvent) -> String { format!("{}.{}", SUBJECT_PREFIX, event.kind()) }

    /// Failures are logged; the mutation that produced the event has already committed.
    pub async fn publish(&self, event: CartEvent) {
        let Some(client) = &self.nats else {
            tracing::trace!(kind = event.kind(), "event publishing disabled");
            return;
        };
        let payload = match serde_json::to_vec(&event) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, kind = event.kind(), "failed to encode cart event");
                return;
            }
        };
        if let Err(e) = client.publish(Self::subject(&event), payload.into()).await {
            tracing::warn!(error = %e, kind = event.kind(), "failed to publish cart event");
        }
    }
}
