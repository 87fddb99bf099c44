//! Frame listener that feeds translated messages to application listeners.

use crate::data_plane::frame_translation::message_from_frame;
use crate::message::Message;
use crate::observability::events;
use crate::transport::{Frame, FrameListener};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

const COMPONENT: &str = "delivery_listener";

/// Application-side consumer of delivered messages.
///
/// Implemented for plain closures, so `subscribe` accepts `|message| { ... }` as well as
/// dedicated listener types.
#[async_trait]
pub trait MessageListener: Send + Sync {
    async fn on_message(&self, message: Message);
}

#[async_trait]
impl<F> MessageListener for F
where
    F: Fn(Message) + Send + Sync,
{
    async fn on_message(&self, message: Message) {
        self(message)
    }
}

/// Shared open/closed switch of one subscription. A closed gate never reopens.
#[derive(Clone, Debug)]
pub(crate) struct DeliveryGate(Arc<AtomicBool>);

impl DeliveryGate {
    pub(crate) fn open() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub(crate) fn close(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub(crate) fn is_open(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What a subscription does with its frames.
pub(crate) enum Delivery {
    /// Translate and discard; keeps a live handle without application logic.
    ListenOnly,
    Consume {
        listener: Arc<dyn MessageListener>,
        no_ack: bool,
    },
}

impl Delivery {
    pub(crate) fn requires_ack(&self) -> bool {
        matches!(self, Delivery::Consume { no_ack: false, .. })
    }
}

pub(crate) struct DeliveryListener {
    subscription_id: String,
    exchange: String,
    destination: String,
    delivery: Delivery,
    gate: DeliveryGate,
}

impl DeliveryListener {
    pub(crate) fn new(
        subscription_id: &str,
        exchange: &str,
        destination: &str,
        delivery: Delivery,
        gate: DeliveryGate,
    ) -> Self {
        Self {
            subscription_id: subscription_id.to_string(),
            exchange: exchange.to_string(),
            destination: destination.to_string(),
            delivery,
            gate,
        }
    }
}

#[async_trait]
impl FrameListener for DeliveryListener {
    async fn on_frame(&self, frame: Frame) {
        let subscription_id = self.subscription_id.as_str();
        let destination = self.destination.as_str();

        if !self.gate.is_open() {
            debug!(
                event = events::FRAME_DROPPED_INERT,
                component = COMPONENT,
                subscription_id,
                destination,
                "dropping frame delivered to a replaced subscription"
            );
            if self.delivery.requires_ack() {
                if let Err(err) = frame.nack().await {
                    warn!(
                        event = events::FRAME_SETTLE_FAILED,
                        component = COMPONENT,
                        subscription_id,
                        err = %err,
                        "unable to nack frame of replaced subscription"
                    );
                }
            }
            return;
        }

        let message = message_from_frame(&self.exchange, &frame);

        match &self.delivery {
            Delivery::ListenOnly => {
                trace!(
                    event = events::FRAME_LISTEN_ONLY,
                    component = COMPONENT,
                    subscription_id,
                    destination,
                    routing_key = message.routing_key(),
                    "discarding frame on listen-only subscription"
                );
            }
            Delivery::Consume { listener, no_ack } => {
                listener.on_message(message).await;
                if !*no_ack {
                    if let Err(err) = frame.ack().await {
                        warn!(
                            event = events::FRAME_SETTLE_FAILED,
                            component = COMPONENT,
                            subscription_id,
                            err = %err,
                            "unable to ack frame"
                        );
                    }
                }
            }
        }
    }
}
