//! In-process loopback transport.

use async_trait::async_trait;
use rbbt::routing::headers;
use rbbt::{
    Acknowledger, Body, ConnectParams, Connector, Destination, Frame, FrameListener, Headers,
    Publish, Session, Subscription, TransportError,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};
use uuid::Uuid;

const LOOPBACK_TAG: &str = "LoopbackSession:";
const LOOPBACK_FN_WATCH_TAG: &str = "watch():";
const LOOPBACK_FN_PUBLISH_TAG: &str = "publish():";

struct Watch {
    id: usize,
    destination: String,
    listener: Arc<dyn FrameListener>,
}

#[derive(Default)]
struct LoopbackState {
    next_id: usize,
    watches: Vec<Watch>,
    published: Vec<Publish>,
    connects: Vec<ConnectParams>,
}

#[derive(Default)]
struct Settlements {
    acks: AtomicUsize,
    nacks: AtomicUsize,
}

#[async_trait]
impl Acknowledger for Settlements {
    async fn ack(&self, _headers: &Headers) -> Result<(), TransportError> {
        self.acks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn nack(&self, _headers: &Headers) -> Result<(), TransportError> {
        self.nacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Session that delivers every publish to the watches on its destination.
///
/// A publish to `exchange/<name>/<key>` also reaches watches on `exchange/<name>`.
/// Deliveries carry `destination` and `content-length` headers on top of the published ones,
/// plus a fresh `message-id` unless the publisher set one. Acks and nacks are counted.
pub struct LoopbackSession {
    state: Arc<Mutex<LoopbackState>>,
    settlements: Arc<Settlements>,
    active: AtomicBool,
}

impl Default for LoopbackSession {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(LoopbackState::default())),
            settlements: Arc::new(Settlements::default()),
            active: AtomicBool::new(false),
        }
    }
}

impl LoopbackSession {
    fn state(&self) -> MutexGuard<'_, LoopbackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Destinations of live watches, sorted.
    pub fn watched_destinations(&self) -> Vec<String> {
        let mut destinations: Vec<String> = self
            .state()
            .watches
            .iter()
            .map(|watch| watch.destination.clone())
            .collect();
        destinations.sort();
        destinations
    }

    pub fn published(&self) -> Vec<Publish> {
        self.state().published.clone()
    }

    pub fn acks(&self) -> usize {
        self.settlements.acks.load(Ordering::SeqCst)
    }

    pub fn nacks(&self) -> usize {
        self.settlements.nacks.load(Ordering::SeqCst)
    }

    /// Forces the session active or inactive, as a dropped link would.
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    fn targets(destination: &str) -> Vec<String> {
        let mut targets = vec![destination.to_string()];
        if let Some(Destination::Exchange {
            exchange,
            routing_key: Some(_),
        }) = Destination::parse(destination)
        {
            targets.push(Destination::exchange(exchange).to_string());
        }
        targets
    }

    fn frame_for(&self, message: &Publish) -> Frame {
        let frame = match &message.body {
            Body::Text(text) => Frame::text(text.clone()),
            Body::Binary(bytes) => Frame::binary(bytes.clone()),
        };
        let mut frame_headers = message.headers.clone();
        frame_headers
            .entry(headers::MESSAGE_ID.to_string())
            .or_insert_with(|| Uuid::new_v4().to_string());
        frame
            .with_headers(frame_headers)
            .with_header(headers::DESTINATION, message.destination.clone())
            .with_header(headers::CONTENT_LENGTH, message.body.len().to_string())
            .with_acknowledger(self.settlements.clone())
    }
}

struct LoopbackSubscription {
    id: usize,
    state: Arc<Mutex<LoopbackState>>,
}

#[async_trait]
impl Subscription for LoopbackSubscription {
    async fn unsubscribe(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.watches.retain(|watch| watch.id != self.id);
        Ok(())
    }
}

#[async_trait]
impl Session for LoopbackSession {
    async fn activate(&self) -> Result<(), TransportError> {
        self.set_active(true);
        Ok(())
    }

    async fn deactivate(&self) -> Result<(), TransportError> {
        self.set_active(false);
        self.state().watches.clear();
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn watch(
        &self,
        destination: &str,
        watch_headers: Headers,
        listener: Arc<dyn FrameListener>,
    ) -> Result<Box<dyn Subscription>, TransportError> {
        if !self.is_active() {
            return Err(TransportError::Inactive);
        }
        debug!(
            "{}:{} watching {} with {:?}",
            LOOPBACK_TAG, LOOPBACK_FN_WATCH_TAG, destination, watch_headers
        );

        let mut state = self.state();
        let id = state.next_id;
        state.next_id += 1;
        state.watches.push(Watch {
            id,
            destination: destination.to_string(),
            listener,
        });
        Ok(Box::new(LoopbackSubscription {
            id,
            state: self.state.clone(),
        }))
    }

    async fn publish(&self, message: Publish) -> Result<(), TransportError> {
        if !self.is_active() {
            return Err(TransportError::Inactive);
        }

        let targets = Self::targets(&message.destination);
        let listeners: Vec<Arc<dyn FrameListener>> = {
            let mut state = self.state();
            state.published.push(message.clone());
            state
                .watches
                .iter()
                .filter(|watch| targets.contains(&watch.destination))
                .map(|watch| watch.listener.clone())
                .collect()
        };
        trace!(
            "{}:{} {} -> {} watch(es)",
            LOOPBACK_TAG,
            LOOPBACK_FN_PUBLISH_TAG,
            message.destination,
            listeners.len()
        );

        for listener in listeners {
            listener.on_frame(self.frame_for(&message)).await;
        }
        Ok(())
    }
}

/// Connector handing out one shared [`LoopbackSession`].
#[derive(Default)]
pub struct LoopbackConnector {
    session: Arc<LoopbackSession>,
}

impl LoopbackConnector {
    pub fn session(&self) -> Arc<LoopbackSession> {
        self.session.clone()
    }

    /// Snapshots received by [`Connector::connect`], oldest first.
    pub fn connects(&self) -> Vec<ConnectParams> {
        self.session.state().connects.clone()
    }
}

#[async_trait]
impl Connector for LoopbackConnector {
    async fn connect(&self, params: ConnectParams) -> Result<Arc<dyn Session>, TransportError> {
        debug!("{}:connect(): {:?}", LOOPBACK_TAG, params);
        self.session.state().connects.push(params);
        Ok(self.session.clone())
    }
}
