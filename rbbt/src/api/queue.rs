//! Queue: consumption endpoint with at most one binding and one subscription.

use crate::api::exchange::ExchangeInner;
use crate::control_plane::registry::remove_entity;
use crate::data_plane::delivery_listener::{Delivery, MessageListener};
use crate::data_plane::subscription_slot::{SubscriptionSlot, WatchRequest};
use crate::error::{ErrorKind, RbbtError};
use crate::message::{Body, Properties};
use crate::observability::{events, fields};
use crate::options::{ConsumeOptions, QueueFlags};
use crate::routing::headers::{self, insert_flag};
use crate::routing::{Binding, Destination};
use crate::transport::{Publish, Session};
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

const QUEUE_TAG: &str = "Queue:";
const QUEUE_FN_DECLARE_TAG: &str = "declare():";
const QUEUE_FN_BIND_TAG: &str = "bind():";
const QUEUE_FN_UNBIND_TAG: &str = "unbind():";
const QUEUE_FN_SUBSCRIBE_TAG: &str = "subscribe():";
const QUEUE_FN_SEND_TAG: &str = "send():";
const QUEUE_FN_CLOSE_TAG: &str = "close():";

const COMPONENT: &str = "queue";

struct QueueInner {
    exchange: Weak<ExchangeInner>,
    exchange_name: String,
    connection_label: String,
    name: String,
    flags: QueueFlags,
    /// Current binding. Its lock also serializes subscription transitions.
    binding: Mutex<Option<Binding>>,
    slot: SubscriptionSlot,
    closed: AtomicBool,
}

impl QueueInner {
    fn session(&self) -> Result<Arc<dyn Session>, ErrorKind> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ErrorKind::QueueClosed);
        }
        self.exchange
            .upgrade()
            .ok_or(ErrorKind::ExchangeClosed)?
            .session()
    }

    fn reject(&self, fn_tag: &str, kind: impl Into<ErrorKind>) -> RbbtError {
        let err = RbbtError::new(kind, self.connection_label.as_str());
        error!(
            event = events::OPERATION_REJECTED,
            component = COMPONENT,
            queue = self.name.as_str(),
            "{}:{} {}",
            QUEUE_TAG,
            fn_tag,
            err
        );
        err
    }

    fn own_destination(&self) -> Destination {
        Destination::queue(&self.name)
    }
}

/// Handle to a declared queue.
///
/// A queue always holds a live watch between transitions: its own destination while
/// unbound, the bound destination after [`Queue::bind`]. Only [`Queue::subscribe`] attaches
/// application logic to that watch.
#[derive(Clone)]
pub struct Queue {
    inner: Arc<QueueInner>,
}

impl Queue {
    /// Builds the queue and opens the listen-only watch on its own destination.
    pub(crate) async fn declare(
        exchange: &Arc<ExchangeInner>,
        name: &str,
        flags: QueueFlags,
        session: &dyn Session,
    ) -> Result<Self, ErrorKind> {
        let queue = Self {
            inner: Arc::new(QueueInner {
                exchange: Arc::downgrade(exchange),
                exchange_name: exchange.name().to_string(),
                connection_label: exchange.connection_label().to_string(),
                name: name.to_string(),
                flags,
                binding: Mutex::new(None),
                slot: SubscriptionSlot::new(),
                closed: AtomicBool::new(false),
            }),
        };

        queue
            .inner
            .slot
            .replace(
                session,
                WatchRequest {
                    destination: queue.inner.own_destination(),
                    headers: flags.headers(),
                    exchange: queue.inner.exchange_name.clone(),
                    delivery: Delivery::ListenOnly,
                },
            )
            .await?;

        debug!(
            event = events::ENTITY_OPEN,
            component = COMPONENT,
            exchange = queue.inner.exchange_name.as_str(),
            queue = name,
            flags = ?flags,
            "{}:{} declared queue",
            QUEUE_TAG,
            QUEUE_FN_DECLARE_TAG
        );
        Ok(queue)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn flags(&self) -> QueueFlags {
        self.inner.flags
    }

    /// Name of the exchange that owns this queue.
    pub fn exchange_name(&self) -> &str {
        &self.inner.exchange_name
    }

    /// Closed explicitly, or through its exchange.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
            || self
                .inner
                .exchange
                .upgrade()
                .map_or(true, |exchange| exchange.is_closed())
    }

    pub async fn binding(&self) -> Option<Binding> {
        self.inner.binding.lock().await.clone()
    }

    /// Destination of the live watch, if any.
    pub fn current_destination(&self) -> Option<Destination> {
        self.inner.slot.destination()
    }

    pub fn is_subscribed(&self) -> bool {
        self.inner.slot.is_active()
    }

    /// Whether the live watch delivers to an application listener.
    pub fn is_consuming(&self) -> bool {
        self.inner.slot.is_consuming()
    }

    /// Re-targets the queue's watch at `exchange/<exchange>/<routing_key>`, replacing any
    /// previous binding.
    ///
    /// When the transport refuses the new watch the queue is left unsubscribed and unbound.
    pub async fn bind(&self, exchange: &str, routing_key: &str) -> Result<(), RbbtError> {
        let session = self
            .inner
            .session()
            .map_err(|kind| self.inner.reject(QUEUE_FN_BIND_TAG, kind))?;

        let mut binding = self.inner.binding.lock().await;
        let previous = binding.take();
        let next = Binding::new(exchange, routing_key);

        let mut watch_headers = next.bind_headers(&self.inner.name);
        watch_headers.extend(self.inner.flags.headers());

        self.inner
            .slot
            .replace(
                session.as_ref(),
                WatchRequest {
                    destination: next.destination(),
                    headers: watch_headers,
                    exchange: next.exchange().to_string(),
                    delivery: Delivery::ListenOnly,
                },
            )
            .await
            .map_err(|err| self.inner.reject(QUEUE_FN_BIND_TAG, err))?;

        debug!(
            event = events::QUEUE_BIND,
            component = COMPONENT,
            queue = self.name(),
            binding = ?next,
            previous = ?previous,
            "{}:{} bound queue",
            QUEUE_TAG,
            QUEUE_FN_BIND_TAG
        );
        *binding = Some(next);
        Ok(())
    }

    /// Drops the binding and returns the watch to `queue/<name>`, announcing the removed
    /// binding through the `x-unbind` header.
    pub async fn unbind(&self, exchange: &str, routing_key: &str) -> Result<(), RbbtError> {
        let session = self
            .inner
            .session()
            .map_err(|kind| self.inner.reject(QUEUE_FN_UNBIND_TAG, kind))?;

        let mut binding = self.inner.binding.lock().await;
        let removed = Binding::new(exchange, routing_key);
        if binding.as_ref() != Some(&removed) {
            warn!(
                event = events::QUEUE_UNBIND,
                component = COMPONENT,
                queue = self.name(),
                requested = ?removed,
                current = ?binding.as_ref(),
                "{}:{} unbinding a binding that is not the current one",
                QUEUE_TAG,
                QUEUE_FN_UNBIND_TAG
            );
        }
        *binding = None;

        let mut watch_headers = self.inner.flags.headers();
        watch_headers.insert(headers::X_UNBIND.to_string(), removed.unbind_header());

        self.inner
            .slot
            .replace(
                session.as_ref(),
                WatchRequest {
                    destination: self.inner.own_destination(),
                    headers: watch_headers,
                    exchange: self.inner.exchange_name.clone(),
                    delivery: Delivery::ListenOnly,
                },
            )
            .await
            .map_err(|err| self.inner.reject(QUEUE_FN_UNBIND_TAG, err))?;

        debug!(
            event = events::QUEUE_UNBIND,
            component = COMPONENT,
            queue = self.name(),
            binding = ?removed,
            "{}:{} unbound queue",
            QUEUE_TAG,
            QUEUE_FN_UNBIND_TAG
        );
        Ok(())
    }

    /// Re-subscribes to the current target (bound destination, else `queue/<name>`) with
    /// `listener` attached.
    ///
    /// While bound, the `exclusive` header carries the queue's own flag. While unbound, it
    /// carries `options.exclusive` alone.
    ///
    /// Unless `options.no_ack` is set, each message is acknowledged once `listener`
    /// returns.
    pub async fn subscribe(
        &self,
        options: ConsumeOptions,
        listener: Arc<dyn MessageListener>,
    ) -> Result<(), RbbtError> {
        let session = self
            .inner
            .session()
            .map_err(|kind| self.inner.reject(QUEUE_FN_SUBSCRIBE_TAG, kind))?;

        let binding = self.inner.binding.lock().await;
        let (destination, mut watch_headers, exchange) = match binding.as_ref() {
            Some(bound) => {
                let mut watch_headers = bound.bind_headers(&self.inner.name);
                watch_headers.extend(self.inner.flags.headers());
                (
                    bound.destination(),
                    watch_headers,
                    bound.exchange().to_string(),
                )
            }
            None => {
                let mut watch_headers = self.inner.flags.headers();
                insert_flag(&mut watch_headers, headers::EXCLUSIVE, options.exclusive);
                (
                    self.inner.own_destination(),
                    watch_headers,
                    self.inner.exchange_name.clone(),
                )
            }
        };
        options.apply(&mut watch_headers);

        self.inner
            .slot
            .replace(
                session.as_ref(),
                WatchRequest {
                    destination,
                    headers: watch_headers,
                    exchange,
                    delivery: Delivery::Consume {
                        listener,
                        no_ack: options.no_ack,
                    },
                },
            )
            .await
            .map_err(|err| self.inner.reject(QUEUE_FN_SUBSCRIBE_TAG, err))
    }

    /// Tears down the live watch. The queue stays unsubscribed until the next
    /// [`Queue::subscribe`], [`Queue::bind`] or [`Queue::unbind`].
    pub async fn unsubscribe(&self) {
        let _binding = self.inner.binding.lock().await;
        self.inner.slot.clear().await;
    }

    /// Publishes `body` directly to `queue/<name>`.
    pub async fn send(
        &self,
        body: impl Into<Body>,
        properties: &Properties,
    ) -> Result<(), RbbtError> {
        let session = self
            .inner
            .session()
            .map_err(|kind| self.inner.reject(QUEUE_FN_SEND_TAG, kind))?;

        let body = body.into();
        let destination = self.inner.own_destination();
        debug!(
            event = events::PUBLISH,
            component = COMPONENT,
            destination = %destination,
            body_kind = fields::body_kind(&body),
            body_len = body.len(),
            "{}:{} publishing",
            QUEUE_TAG,
            QUEUE_FN_SEND_TAG
        );

        session
            .publish(Publish {
                destination: destination.to_string(),
                body,
                headers: properties.publish_headers(),
            })
            .await
            .map_err(|err| self.inner.reject(QUEUE_FN_SEND_TAG, err))
    }

    /// Unsubscribes, clears the binding and leaves the exchange's registry. Idempotent.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut binding = self.inner.binding.lock().await;
        self.inner.slot.clear().await;
        *binding = None;
        drop(binding);

        debug!(
            event = events::ENTITY_CLOSE,
            component = COMPONENT,
            queue = self.name(),
            "{}:{} closed queue",
            QUEUE_TAG,
            QUEUE_FN_CLOSE_TAG
        );

        if let Some(exchange) = self.inner.exchange.upgrade() {
            remove_entity(&exchange.queues, &self.inner.name, self).await;
        }
    }
}

impl PartialEq for Queue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Queue {}

impl Debug for Queue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("name", &self.inner.name)
            .field("exchange", &self.inner.exchange_name)
            .field("flags", &self.inner.flags)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::api::connection::Connection;
    use crate::api::exchange::Exchange;
    use crate::config::ConnectionConfig;
    use crate::error::ErrorKind;
    use crate::message::{Body, Properties};
    use crate::options::{ConsumeOptions, ExchangeOptions, QueueOptions};
    use crate::routing::{Binding, Destination};
    use crate::test_support::{
        CountingAcknowledger, RecordingConnector, RecordingListener, RecordingSession,
        SequentialNames,
    };
    use crate::transport::Frame;
    use std::sync::Arc;

    async fn orders() -> (Connection, Exchange, Arc<RecordingSession>) {
        let connector = RecordingConnector::new();
        let connection = Connection::with_name_generator(
            ConnectionConfig::new("ws://localhost/ws", "/", "guest", "guest"),
            connector.clone(),
            Arc::new(SequentialNames::default()),
        );
        connection.connect().await.expect("connect");
        let exchange = connection
            .exchange("orders", ExchangeOptions::default())
            .await
            .expect("declare");
        (connection, exchange, connector.session())
    }

    #[tokio::test]
    async fn declare_watches_own_destination_with_flags() {
        let (_connection, exchange, session) = orders().await;

        let queue = exchange
            .queue("", QueueOptions::default())
            .await
            .expect("queue");

        assert_eq!(queue.name(), "rbbt.gen-id-0");
        let watch = session.last_watch().expect("queue watch");
        assert_eq!(watch.destination, "queue/rbbt.gen-id-0");
        assert_eq!(watch.headers.get("durable").unwrap(), "false");
        assert_eq!(watch.headers.get("auto-delete").unwrap(), "true");
        assert_eq!(watch.headers.get("exclusive").unwrap(), "true");
        assert_eq!(watch.headers.get("passive").unwrap(), "false");
        assert_eq!(
            queue.current_destination(),
            Some(Destination::queue("rbbt.gen-id-0"))
        );
        assert!(queue.is_subscribed());
        assert!(!queue.is_consuming());
    }

    #[tokio::test]
    async fn bind_replaces_watch_and_tags_headers() {
        let (_connection, exchange, session) = orders().await;
        let queue = exchange
            .queue("audit", QueueOptions::default())
            .await
            .expect("queue");

        queue.bind("orders", "created").await.expect("bind");
        queue.bind("orders", "updated").await.expect("rebind");

        let watch = session.last_watch().expect("bind watch");
        assert_eq!(watch.destination, "exchange/orders/updated");
        assert_eq!(watch.headers.get("x-queue-name").unwrap(), "audit");
        assert_eq!(watch.headers.get("exchange").unwrap(), "orders");
        assert_eq!(watch.headers.get("routing_key").unwrap(), "updated");
        assert_eq!(watch.headers.get("durable").unwrap(), "true");
        assert_eq!(
            session.active_destinations(),
            vec!["exchange/orders", "exchange/orders/updated"]
        );
        assert_eq!(
            queue.binding().await,
            Some(Binding::new("orders", "updated"))
        );
    }

    #[tokio::test]
    async fn bind_then_unbind_restores_own_destination() {
        let (_connection, exchange, session) = orders().await;
        let queue = exchange
            .queue("audit", QueueOptions::default())
            .await
            .expect("queue");
        let initial = queue.current_destination();

        queue.bind("orders", "created").await.expect("bind");
        queue.unbind("orders", "created").await.expect("unbind");

        assert_eq!(queue.current_destination(), initial);
        assert_eq!(queue.binding().await, None);
        let watch = session.last_watch().expect("unbind watch");
        assert_eq!(watch.destination, "queue/audit");
        assert_eq!(
            watch.headers.get("x-unbind").unwrap(),
            r#"{"exchange":"orders","routing_key":"created"}"#
        );
        assert_eq!(
            session.active_destinations(),
            vec!["exchange/orders", "queue/audit"]
        );
    }

    #[tokio::test]
    async fn subscribe_follows_binding_and_delivers() {
        let (_connection, exchange, session) = orders().await;
        let queue = exchange
            .queue("", QueueOptions::default().exclusive(true))
            .await
            .expect("queue");
        let received = Arc::new(RecordingListener::default());
        let acknowledger = Arc::new(CountingAcknowledger::default());

        queue.bind("orders", "created").await.expect("bind");
        queue
            .subscribe(ConsumeOptions::default(), received.clone())
            .await
            .expect("subscribe");

        let watch = session.last_watch().expect("subscribe watch");
        assert_eq!(watch.destination, "exchange/orders/created");
        assert_eq!(watch.headers.get("ack").unwrap(), "client");

        session
            .deliver(
                "exchange/orders/created",
                Frame::text("payload")
                    .with_header("destination", "/exchange/orders/created")
                    .with_header("message-id", "abc")
                    .with_acknowledger(acknowledger.clone()),
            )
            .await;

        let messages = received.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].message_id(), Some("abc"));
        assert_eq!(messages[0].routing_key(), "created");
        assert_eq!(messages[0].exchange(), "orders");
        assert_eq!(acknowledger.acks(), 1);
        assert!(queue.is_consuming());
    }

    #[tokio::test]
    async fn unbound_subscribe_sends_consume_exclusive_and_tag() {
        let (_connection, exchange, session) = orders().await;
        let queue = exchange
            .queue("audit", QueueOptions::default())
            .await
            .expect("queue");

        queue
            .subscribe(
                ConsumeOptions::default()
                    .no_ack(true)
                    .exclusive(true)
                    .tag("worker-1"),
                Arc::new(RecordingListener::default()),
            )
            .await
            .expect("subscribe");

        let watch = session.last_watch().expect("subscribe watch");
        assert_eq!(watch.destination, "queue/audit");
        assert_eq!(watch.headers.get("exclusive").unwrap(), "true");
        assert_eq!(watch.headers.get("id").unwrap(), "worker-1");
        assert!(!watch.headers.contains_key("ack"));
    }

    #[tokio::test]
    async fn exclusive_header_follows_consume_option_unbound_and_queue_flag_bound() {
        let (_connection, exchange, session) = orders().await;
        let anonymous = exchange
            .queue("", QueueOptions::default())
            .await
            .expect("exclusive queue");
        let shared = exchange
            .queue("audit", QueueOptions::default())
            .await
            .expect("shared queue");

        anonymous
            .subscribe(
                ConsumeOptions::default(),
                Arc::new(RecordingListener::default()),
            )
            .await
            .expect("unbound subscribe");
        let watch = session.last_watch().expect("unbound watch");
        assert_eq!(watch.headers.get("exclusive").unwrap(), "false");

        shared.bind("orders", "created").await.expect("bind");
        shared
            .subscribe(
                ConsumeOptions::default().exclusive(true),
                Arc::new(RecordingListener::default()),
            )
            .await
            .expect("bound subscribe");
        let watch = session.last_watch().expect("bound watch");
        assert_eq!(watch.destination, "exchange/orders/created");
        assert_eq!(watch.headers.get("exclusive").unwrap(), "false");
    }

    #[tokio::test]
    async fn unsubscribe_stops_callbacks_until_next_subscribe() {
        let (_connection, exchange, session) = orders().await;
        let queue = exchange
            .queue("audit", QueueOptions::default())
            .await
            .expect("queue");
        let received = Arc::new(RecordingListener::default());

        queue
            .subscribe(ConsumeOptions::default().no_ack(true), received.clone())
            .await
            .expect("subscribe");
        session.deliver("queue/audit", Frame::text("one")).await;
        queue.unsubscribe().await;
        session.deliver("queue/audit", Frame::text("two")).await;

        assert_eq!(received.len(), 1);
        assert!(!queue.is_subscribed());
        assert_eq!(queue.current_destination(), None);

        queue
            .subscribe(ConsumeOptions::default().no_ack(true), received.clone())
            .await
            .expect("resubscribe");
        session.deliver("queue/audit", Frame::text("three")).await;
        assert_eq!(received.len(), 2);
    }

    #[tokio::test]
    async fn refused_bind_leaves_queue_unbound_and_unsubscribed() {
        let (_connection, exchange, session) = orders().await;
        let queue = exchange
            .queue("audit", QueueOptions::default())
            .await
            .expect("queue");
        queue.bind("orders", "created").await.expect("bind");
        session.refuse_watches(true);

        let err = queue
            .bind("orders", "updated")
            .await
            .expect_err("watch refused");

        assert!(matches!(err.kind(), ErrorKind::Transport(_)));
        assert_eq!(queue.binding().await, None);
        assert!(!queue.is_subscribed());
    }

    #[tokio::test]
    async fn send_publishes_to_queue_destination() {
        let (_connection, exchange, session) = orders().await;
        let queue = exchange
            .queue("audit", QueueOptions::default())
            .await
            .expect("queue");

        queue
            .send(
                vec![1u8, 2, 3],
                &Properties {
                    content_type: Some("application/octet-stream".to_string()),
                    ..Default::default()
                },
            )
            .await
            .expect("send");

        let published = session.published();
        assert_eq!(published[0].destination, "queue/audit");
        assert_eq!(published[0].body, Body::Binary(vec![1, 2, 3]));
        assert_eq!(
            published[0].headers.get("content-type").unwrap(),
            "application/octet-stream"
        );
    }

    #[tokio::test]
    async fn operations_on_closed_entities_are_rejected() {
        let (_connection, exchange, _session) = orders().await;
        let queue = exchange
            .queue("audit", QueueOptions::default())
            .await
            .expect("queue");
        let survivor = exchange
            .queue("billing", QueueOptions::default())
            .await
            .expect("queue");

        queue.close().await;
        let err = queue.bind("orders", "k").await.expect_err("closed queue");
        assert_eq!(err.kind(), &ErrorKind::QueueClosed);
        assert_eq!(exchange.queue_names().await, vec!["billing"]);

        exchange.close().await;
        assert!(survivor.is_closed());
        let err = survivor
            .send("x", &Properties::default())
            .await
            .expect_err("closed exchange");
        assert_eq!(err.kind(), &ErrorKind::QueueClosed);
    }

    #[tokio::test]
    async fn inactive_transport_rejects_bind() {
        let (_connection, exchange, session) = orders().await;
        let queue = exchange
            .queue("audit", QueueOptions::default())
            .await
            .expect("queue");
        session.set_active(false);

        let err = queue.bind("orders", "k").await.expect_err("inactive");

        assert_eq!(err.kind(), &ErrorKind::NotConnected);
        assert_eq!(queue.current_destination(), Some(Destination::queue("audit")));
    }

    #[tokio::test]
    async fn connection_close_reaches_queues_held_elsewhere() {
        let (connection, exchange, _session) = orders().await;
        let queue = exchange
            .queue("audit", QueueOptions::default())
            .await
            .expect("queue");

        drop(exchange);
        connection.close().await.expect("close");

        let err = queue.send("x", &Properties::default()).await.expect_err("gone");
        assert_eq!(err.kind(), &ErrorKind::QueueClosed);
    }
}
