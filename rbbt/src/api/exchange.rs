//! Exchange: named routing point owning a queue namespace.

use crate::api::connection::ConnectionInner;
use crate::api::queue::Queue;
use crate::control_plane::registry::{
    drain_entities, entity_names, new_registry, remove_entity, vacant_name, EntityRegistry,
};
use crate::data_plane::delivery_listener::{Delivery, MessageListener};
use crate::data_plane::subscription_slot::{SubscriptionSlot, WatchRequest};
use crate::error::{ErrorKind, RbbtError};
use crate::message::{Body, Properties};
use crate::observability::{events, fields};
use crate::options::{ConsumeOptions, ExchangeOptions, QueueOptions};
use crate::routing::headers::{self, insert_flag};
use crate::routing::Destination;
use crate::transport::{Publish, Session};
use futures::future::join_all;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error};

const EXCHANGE_TAG: &str = "Exchange:";
const EXCHANGE_FN_OPEN_TAG: &str = "open():";
const EXCHANGE_FN_CLOSE_TAG: &str = "close():";
const EXCHANGE_FN_SEND_TAG: &str = "send():";
const EXCHANGE_FN_SUBSCRIBE_TAG: &str = "subscribe():";
const EXCHANGE_FN_QUEUE_TAG: &str = "queue():";

const COMPONENT: &str = "exchange";

pub(crate) struct ExchangeInner {
    connection: Weak<ConnectionInner>,
    connection_label: String,
    name: String,
    options: ExchangeOptions,
    pub(crate) queues: EntityRegistry<Queue>,
    slot: SubscriptionSlot,
    closed: AtomicBool,
}

impl ExchangeInner {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn connection_label(&self) -> &str {
        &self.connection_label
    }

    /// Closed explicitly, or through its connection.
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
            || self
                .connection
                .upgrade()
                .map_or(true, |connection| connection.is_closed())
    }

    pub(crate) fn connection(&self) -> Result<Arc<ConnectionInner>, ErrorKind> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ErrorKind::ExchangeClosed);
        }
        match self.connection.upgrade() {
            Some(connection) if !connection.is_closed() => Ok(connection),
            _ => Err(ErrorKind::ExchangeClosed),
        }
    }

    /// Session of an open exchange on a live transport.
    pub(crate) fn session(&self) -> Result<Arc<dyn Session>, ErrorKind> {
        self.connection()?
            .active_session()
            .ok_or(ErrorKind::NotConnected)
    }

    pub(crate) fn reject(&self, fn_tag: &str, kind: impl Into<ErrorKind>) -> RbbtError {
        let err = RbbtError::new(kind, self.connection_label.as_str());
        error!(
            event = events::OPERATION_REJECTED,
            component = COMPONENT,
            exchange = self.name.as_str(),
            "{}:{} {}",
            EXCHANGE_TAG,
            fn_tag,
            err
        );
        err
    }
}

/// Handle to a declared exchange.
#[derive(Clone)]
pub struct Exchange {
    inner: Arc<ExchangeInner>,
}

impl Exchange {
    /// Builds the exchange and opens its listen-only watch. Nothing is registered here; the
    /// caller registers the exchange once it is open.
    pub(crate) async fn declare(
        connection: &Arc<ConnectionInner>,
        connection_label: &str,
        name: &str,
        options: ExchangeOptions,
        session: &dyn Session,
    ) -> Result<Self, ErrorKind> {
        let exchange = Self {
            inner: Arc::new(ExchangeInner {
                connection: Arc::downgrade(connection),
                connection_label: connection_label.to_string(),
                name: name.to_string(),
                options,
                queues: new_registry(),
                slot: SubscriptionSlot::new(),
                closed: AtomicBool::new(false),
            }),
        };
        exchange.watch_listen_only(session).await?;
        debug!(
            event = events::ENTITY_OPEN,
            component = COMPONENT,
            exchange = name,
            "{}:{} declared exchange",
            EXCHANGE_TAG,
            EXCHANGE_FN_OPEN_TAG
        );
        Ok(exchange)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn options(&self) -> ExchangeOptions {
        self.inner.options
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Whether an exchange-level subscription is live.
    pub fn is_subscribed(&self) -> bool {
        self.inner.slot.is_active()
    }

    /// Replaces any exchange-level subscription with the listen-only watch the exchange
    /// starts with.
    pub async fn open(&self) -> Result<(), RbbtError> {
        let session = self
            .inner
            .session()
            .map_err(|kind| self.inner.reject(EXCHANGE_FN_OPEN_TAG, kind))?;
        self.watch_listen_only(session.as_ref())
            .await
            .map_err(|kind| self.inner.reject(EXCHANGE_FN_OPEN_TAG, kind))
    }

    async fn watch_listen_only(&self, session: &dyn Session) -> Result<(), ErrorKind> {
        self.inner
            .slot
            .replace(
                session,
                WatchRequest {
                    destination: Destination::exchange(&self.inner.name),
                    headers: self.inner.options.declare_headers(),
                    exchange: self.inner.name.clone(),
                    delivery: Delivery::ListenOnly,
                },
            )
            .await?;
        Ok(())
    }

    /// Closes every queue, tears down the exchange-level subscription and leaves the
    /// connection's registry. Idempotent.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let queues = drain_entities(&self.inner.queues).await;
        debug!(
            event = events::ENTITY_CLOSE,
            component = COMPONENT,
            exchange = self.name(),
            queues = queues.len(),
            "{}:{} closing exchange",
            EXCHANGE_TAG,
            EXCHANGE_FN_CLOSE_TAG
        );
        join_all(queues.iter().map(|queue| queue.close())).await;
        self.inner.slot.clear().await;

        if let Some(connection) = self.inner.connection.upgrade() {
            remove_entity(&connection.exchanges, &self.inner.name, self).await;
        }
    }

    /// Publishes `body` to `exchange/<name>`, or `exchange/<name>/<routing_key>` when the
    /// key is non-empty. `properties` become publish headers.
    pub async fn send(
        &self,
        body: impl Into<Body>,
        routing_key: &str,
        properties: &Properties,
    ) -> Result<(), RbbtError> {
        let session = self
            .inner
            .session()
            .map_err(|kind| self.inner.reject(EXCHANGE_FN_SEND_TAG, kind))?;

        let body = body.into();
        let destination = Destination::exchange_with_key(&self.inner.name, routing_key);
        debug!(
            event = events::PUBLISH,
            component = COMPONENT,
            destination = %destination,
            body_kind = fields::body_kind(&body),
            body_len = body.len(),
            "{}:{} publishing",
            EXCHANGE_TAG,
            EXCHANGE_FN_SEND_TAG
        );

        session
            .publish(Publish {
                destination: destination.to_string(),
                body,
                headers: properties.publish_headers(),
            })
            .await
            .map_err(|err| self.inner.reject(EXCHANGE_FN_SEND_TAG, err))
    }

    /// Replaces the exchange-level subscription with one delivering to `listener`.
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
            .map_err(|kind| self.inner.reject(EXCHANGE_FN_SUBSCRIBE_TAG, kind))?;

        let mut watch_headers = self.inner.options.lifecycle_headers();
        insert_flag(&mut watch_headers, headers::EXCLUSIVE, options.exclusive);
        options.apply(&mut watch_headers);

        self.inner
            .slot
            .replace(
                session.as_ref(),
                WatchRequest {
                    destination: Destination::exchange(&self.inner.name),
                    headers: watch_headers,
                    exchange: self.inner.name.clone(),
                    delivery: Delivery::Consume {
                        listener,
                        no_ack: options.no_ack,
                    },
                },
            )
            .await
            .map_err(|err| self.inner.reject(EXCHANGE_FN_SUBSCRIBE_TAG, err))
    }

    /// Tears down the exchange-level subscription only; queues are untouched.
    pub async fn unsubscribe(&self) {
        self.inner.slot.clear().await;
    }

    /// Returns the queue registered as `name`, or declares a new one.
    ///
    /// Anonymous queues are never deduplicated: each call with an empty `name` declares a
    /// fresh queue under a generated name.
    pub async fn queue(&self, name: &str, options: QueueOptions) -> Result<Queue, RbbtError> {
        let reject = |kind: ErrorKind| self.inner.reject(EXCHANGE_FN_QUEUE_TAG, kind);

        let connection = self.inner.connection().map_err(reject)?;
        let mut registered = self.inner.queues.lock().await;
        if self.inner.is_closed() {
            return Err(reject(ErrorKind::ExchangeClosed));
        }

        if !name.is_empty() {
            if let Some(existing) = registered.get(name) {
                debug!(
                    event = events::ENTITY_REUSED,
                    component = COMPONENT,
                    exchange = self.name(),
                    queue = name,
                    "{}:{} returning registered queue",
                    EXCHANGE_TAG,
                    EXCHANGE_FN_QUEUE_TAG
                );
                return Ok(existing.clone());
            }
        }

        let session = connection
            .active_session()
            .ok_or_else(|| reject(ErrorKind::NotConnected))?;

        let anonymous = name.is_empty();
        let name = if anonymous {
            vacant_name(&registered, || connection.names.queue_name()).map_err(reject)?
        } else {
            name.to_string()
        };

        let queue = Queue::declare(&self.inner, &name, options.resolve(anonymous), session.as_ref())
            .await
            .map_err(reject)?;
        registered.insert(name, queue.clone());
        Ok(queue)
    }

    /// Names of the registered queues, sorted.
    pub async fn queue_names(&self) -> Vec<String> {
        entity_names(&self.inner.queues).await
    }
}

impl PartialEq for Exchange {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Exchange {}

impl Debug for Exchange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exchange")
            .field("name", &self.inner.name)
            .field("connection", &self.inner.connection_label)
            .field("options", &self.inner.options)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
