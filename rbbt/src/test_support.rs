//! In-crate transport doubles for unit tests.

use crate::config::ConnectParams;
use crate::data_plane::delivery_listener::MessageListener;
use crate::message::Message;
use crate::routing::NameGenerator;
use crate::transport::{
    Acknowledger, Connector, FrameListener, Frame, Headers, Publish, Session, Subscription,
    TransportError,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct WatchRecord {
    pub(crate) destination: String,
    pub(crate) headers: Headers,
}

#[derive(Default)]
struct SessionState {
    next_id: usize,
    watches: Vec<WatchRecord>,
    active: BTreeMap<usize, (String, Arc<dyn FrameListener>)>,
    unsubscribed: usize,
    published: Vec<Publish>,
}

/// Session that records every call and lets tests push frames into live watches.
pub(crate) struct RecordingSession {
    state: Arc<Mutex<SessionState>>,
    active: AtomicBool,
    deactivations: AtomicUsize,
    refuse_watch: AtomicBool,
    refuse_publish: AtomicBool,
}

impl RecordingSession {
    pub(crate) fn active() -> Arc<Self> {
        Arc::new(Self::with_active(true))
    }

    pub(crate) fn inactive() -> Arc<Self> {
        Arc::new(Self::with_active(false))
    }

    fn with_active(active: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::default())),
            active: AtomicBool::new(active),
            deactivations: AtomicUsize::new(0),
            refuse_watch: AtomicBool::new(false),
            refuse_publish: AtomicBool::new(false),
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().expect("lock recording session state")
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    pub(crate) fn refuse_watches(&self, refuse: bool) {
        self.refuse_watch.store(refuse, Ordering::SeqCst);
    }

    pub(crate) fn refuse_publishes(&self, refuse: bool) {
        self.refuse_publish.store(refuse, Ordering::SeqCst);
    }

    pub(crate) fn watch_count(&self) -> usize {
        self.state().watches.len()
    }

    pub(crate) fn last_watch(&self) -> Option<WatchRecord> {
        self.state().watches.last().cloned()
    }

    pub(crate) fn deactivated_count(&self) -> usize {
        self.deactivations.load(Ordering::SeqCst)
    }

    pub(crate) fn unsubscribed_count(&self) -> usize {
        self.state().unsubscribed
    }

    pub(crate) fn published(&self) -> Vec<Publish> {
        self.state().published.clone()
    }

    /// Destinations of watches that have not been unsubscribed, sorted.
    pub(crate) fn active_destinations(&self) -> Vec<String> {
        let mut destinations: Vec<String> = self
            .state()
            .active
            .values()
            .map(|(destination, _)| destination.clone())
            .collect();
        destinations.sort();
        destinations
    }

    pub(crate) fn listeners_for(&self, destination: &str) -> Vec<Arc<dyn FrameListener>> {
        self.state()
            .active
            .values()
            .filter(|(watched, _)| watched == destination)
            .map(|(_, listener)| listener.clone())
            .collect()
    }

    /// Hands `frame` to every live watch on `destination`. Returns the number of watches hit.
    pub(crate) async fn deliver(&self, destination: &str, frame: Frame) -> usize {
        let listeners = self.listeners_for(destination);
        for listener in &listeners {
            listener.on_frame(frame.clone()).await;
        }
        listeners.len()
    }
}

struct RecordingSubscription {
    id: usize,
    state: Arc<Mutex<SessionState>>,
}

#[async_trait]
impl Subscription for RecordingSubscription {
    async fn unsubscribe(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock().expect("lock recording session state");
        if state.active.remove(&self.id).is_some() {
            state.unsubscribed += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl Session for RecordingSession {
    async fn activate(&self) -> Result<(), TransportError> {
        self.set_active(true);
        Ok(())
    }

    async fn deactivate(&self) -> Result<(), TransportError> {
        self.deactivations.fetch_add(1, Ordering::SeqCst);
        self.set_active(false);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn watch(
        &self,
        destination: &str,
        headers: Headers,
        listener: Arc<dyn FrameListener>,
    ) -> Result<Box<dyn Subscription>, TransportError> {
        let mut state = self.state();
        state.watches.push(WatchRecord {
            destination: destination.to_string(),
            headers,
        });
        if self.refuse_watch.load(Ordering::SeqCst) {
            return Err(TransportError::refused("watch", "refused by test"));
        }
        let id = state.next_id;
        state.next_id += 1;
        state
            .active
            .insert(id, (destination.to_string(), listener));
        Ok(Box::new(RecordingSubscription {
            id,
            state: self.state.clone(),
        }))
    }

    async fn publish(&self, message: Publish) -> Result<(), TransportError> {
        if self.refuse_publish.load(Ordering::SeqCst) {
            return Err(TransportError::refused("publish", "refused by test"));
        }
        self.state().published.push(message);
        Ok(())
    }
}

/// Connector handing out one shared [`RecordingSession`].
pub(crate) struct RecordingConnector {
    session: Arc<RecordingSession>,
    params: Mutex<Vec<ConnectParams>>,
}

impl RecordingConnector {
    /// The session starts inactive; `connect` activates it.
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            session: RecordingSession::inactive(),
            params: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn session(&self) -> Arc<RecordingSession> {
        self.session.clone()
    }

    pub(crate) fn params(&self) -> Vec<ConnectParams> {
        self.params.lock().expect("lock connect params").clone()
    }
}

#[async_trait]
impl Connector for RecordingConnector {
    async fn connect(&self, params: ConnectParams) -> Result<Arc<dyn Session>, TransportError> {
        self.params.lock().expect("lock connect params").push(params);
        Ok(self.session.clone())
    }
}

/// Connector that waits `delay` and then hands out a fresh [`RecordingSession`] per call.
pub(crate) struct SessionPerConnect {
    delay: Duration,
    sessions: Mutex<Vec<Arc<RecordingSession>>>,
}

impl SessionPerConnect {
    pub(crate) fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            sessions: Mutex::new(Vec::new()),
        })
    }

    /// Sessions handed out so far, oldest first.
    pub(crate) fn sessions(&self) -> Vec<Arc<RecordingSession>> {
        self.sessions.lock().expect("lock sessions").clone()
    }
}

#[async_trait]
impl Connector for SessionPerConnect {
    async fn connect(&self, _params: ConnectParams) -> Result<Arc<dyn Session>, TransportError> {
        tokio::time::sleep(self.delay).await;
        let session = RecordingSession::inactive();
        self.sessions
            .lock()
            .expect("lock sessions")
            .push(session.clone());
        Ok(session)
    }
}

/// Generator that always returns the same id.
pub(crate) struct FixedName(pub(crate) &'static str);

impl NameGenerator for FixedName {
    fn generate_id(&self) -> String {
        self.0.to_string()
    }
}

/// Deterministic names: `id-0`, `id-1`, ...
#[derive(Default)]
pub(crate) struct SequentialNames {
    next: AtomicUsize,
}

impl NameGenerator for SequentialNames {
    fn generate_id(&self) -> String {
        format!("id-{}", self.next.fetch_add(1, Ordering::SeqCst))
    }
}

#[derive(Default)]
pub(crate) struct CountingAcknowledger {
    acks: AtomicUsize,
    nacks: AtomicUsize,
}

impl CountingAcknowledger {
    pub(crate) fn acks(&self) -> usize {
        self.acks.load(Ordering::SeqCst)
    }

    pub(crate) fn nacks(&self) -> usize {
        self.nacks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Acknowledger for CountingAcknowledger {
    async fn ack(&self, _headers: &Headers) -> Result<(), TransportError> {
        self.acks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn nack(&self, _headers: &Headers) -> Result<(), TransportError> {
        self.nacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingListener {
    messages: Mutex<Vec<Message>>,
}

impl RecordingListener {
    pub(crate) fn len(&self) -> usize {
        self.messages.lock().expect("lock received messages").len()
    }

    pub(crate) fn messages(&self) -> Vec<Message> {
        self.messages.lock().expect("lock received messages").clone()
    }
}

#[async_trait]
impl MessageListener for RecordingListener {
    async fn on_message(&self, message: Message) {
        self.messages
            .lock()
            .expect("lock received messages")
            .push(message);
    }
}
