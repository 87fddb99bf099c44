//! Single-subscription slot with ordered handle swapping.

use crate::data_plane::delivery_listener::{Delivery, DeliveryGate, DeliveryListener};
use crate::observability::{events, fields};
use crate::routing::Destination;
use crate::transport::{Headers, Session, Subscription, TransportError};
use arc_swap::ArcSwapOption;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

const COMPONENT: &str = "subscription_slot";

/// Everything needed to open one watch.
pub(crate) struct WatchRequest {
    pub(crate) destination: Destination,
    pub(crate) headers: Headers,
    /// Exchange name stamped on translated messages.
    pub(crate) exchange: String,
    pub(crate) delivery: Delivery,
}

struct ActiveSubscription {
    id: String,
    destination: Destination,
    consuming: bool,
    gate: DeliveryGate,
    handle: Box<dyn Subscription>,
}

/// Holds at most one live subscription.
///
/// Replacement order: unpublish the current handle, close its gate, unsubscribe it, open
/// the new watch, publish the new handle. Frames still arriving on the old watch hit a
/// closed gate and never reach application code.
pub(crate) struct SubscriptionSlot {
    current: ArcSwapOption<ActiveSubscription>,
    transition: Mutex<()>,
}

impl SubscriptionSlot {
    pub(crate) fn new() -> Self {
        Self {
            current: ArcSwapOption::empty(),
            transition: Mutex::new(()),
        }
    }

    /// Swaps the current subscription for a watch built from `request`.
    ///
    /// On error the slot is left empty.
    pub(crate) async fn replace(
        &self,
        session: &dyn Session,
        request: WatchRequest,
    ) -> Result<(), TransportError> {
        let _transition = self.transition.lock().await;
        self.teardown_current().await;

        let WatchRequest {
            destination,
            headers,
            exchange,
            delivery,
        } = request;

        let id = Uuid::new_v4().to_string();
        let consuming = matches!(delivery, Delivery::Consume { .. });
        let target = destination.to_string();
        let gate = DeliveryGate::open();
        let listener = Arc::new(DeliveryListener::new(
            &id,
            &exchange,
            &target,
            delivery,
            gate.clone(),
        ));

        debug!(
            event = events::SUBSCRIPTION_SWAP,
            component = COMPONENT,
            subscription_id = id.as_str(),
            destination = target.as_str(),
            consuming,
            headers = %fields::format_header_keys(&headers),
            "opening watch"
        );

        let handle = match session.watch(&target, headers, listener).await {
            Ok(handle) => handle,
            Err(err) => {
                gate.close();
                return Err(err);
            }
        };

        self.current.store(Some(Arc::new(ActiveSubscription {
            id,
            destination,
            consuming,
            gate,
            handle,
        })));
        Ok(())
    }

    /// Tears down the current subscription, if any. Returns whether one was active.
    pub(crate) async fn clear(&self) -> bool {
        let _transition = self.transition.lock().await;
        self.teardown_current().await
    }

    pub(crate) fn destination(&self) -> Option<Destination> {
        self.current
            .load_full()
            .map(|active| active.destination.clone())
    }

    pub(crate) fn is_active(&self) -> bool {
        self.current.load().is_some()
    }

    /// Whether the current subscription delivers to an application listener.
    pub(crate) fn is_consuming(&self) -> bool {
        self.current
            .load_full()
            .is_some_and(|active| active.consuming)
    }

    async fn teardown_current(&self) -> bool {
        let Some(previous) = self.current.swap(None) else {
            return false;
        };

        previous.gate.close();
        if let Err(err) = previous.handle.unsubscribe().await {
            warn!(
                event = events::SUBSCRIPTION_TEARDOWN_FAILED,
                component = COMPONENT,
                subscription_id = previous.id.as_str(),
                destination = %previous.destination,
                err = %err,
                "unable to unsubscribe replaced watch"
            );
        }
        true
    }
}
