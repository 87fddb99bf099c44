//! Connection: lifecycle root of the entity tree.

use crate::api::exchange::Exchange;
use crate::config::{ConnectParams, ConnectionConfig};
use crate::control_plane::registry::{
    drain_entities, ensure_capacity, entity_names, new_registry, vacant_name, EntityRegistry,
};
use crate::error::{ErrorKind, RbbtError};
use crate::observability::events;
use crate::options::ExchangeOptions;
use crate::routing::{NameGenerator, RandomNameGenerator};
use crate::transport::{Connector, Session};
use futures::future::join_all;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

const CONNECTION_TAG: &str = "Connection:";
const CONNECTION_FN_CONNECT_TAG: &str = "connect():";
const CONNECTION_FN_CLOSE_TAG: &str = "close():";
const CONNECTION_FN_EXCHANGE_TAG: &str = "exchange():";
const CONNECTION_FN_RETIRE_SESSION_TAG: &str = "retire_session():";

const COMPONENT: &str = "connection";

pub(crate) struct ConnectionInner {
    config: RwLock<ConnectionConfig>,
    connector: Arc<dyn Connector>,
    pub(crate) names: Arc<dyn NameGenerator>,
    session: RwLock<Option<Arc<dyn Session>>>,
    /// Serializes [`Connection::connect`] so only one connector call is in flight.
    connecting: Mutex<()>,
    pub(crate) exchanges: EntityRegistry<Exchange>,
    closed: AtomicBool,
}

impl ConnectionInner {
    pub(crate) fn label(&self) -> String {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .label()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// The session, if one is established and active.
    pub(crate) fn active_session(&self) -> Option<Arc<dyn Session>> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .filter(|session| session.is_active())
    }

    fn set_session(&self, session: Option<Arc<dyn Session>>) -> Option<Arc<dyn Session>> {
        let mut current = self.session.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, session)
    }
}

/// Handle to a broker connection and its exchange namespace.
///
/// A connection starts closed. [`Connection::connect`] establishes the transport session;
/// [`Connection::close`] closes every exchange (and through them every queue) before
/// deactivating the session.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl Connection {
    pub fn new(config: ConnectionConfig, connector: Arc<dyn Connector>) -> Self {
        Self::with_name_generator(config, connector, Arc::new(RandomNameGenerator::default()))
    }

    /// Builds a connection whose anonymous entities are named by `names`.
    pub fn with_name_generator(
        config: ConnectionConfig,
        connector: Arc<dyn Connector>,
        names: Arc<dyn NameGenerator>,
    ) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                config: RwLock::new(config),
                connector,
                names,
                session: RwLock::new(None),
                connecting: Mutex::new(()),
                exchanges: new_registry(),
                closed: AtomicBool::new(true),
            }),
        }
    }

    /// Owned copy of the current configuration.
    pub fn config(&self) -> ConnectionConfig {
        self.inner
            .config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Mutates the configuration used by the next [`Connection::connect`].
    pub fn update_config(&self, update: impl FnOnce(&mut ConnectionConfig)) {
        let mut config = self
            .inner
            .config
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        update(&mut config);
    }

    /// The configured name, else the URL.
    pub fn label(&self) -> String {
        self.inner.label()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    pub fn is_connected(&self) -> bool {
        !self.is_closed() && self.inner.active_session().is_some()
    }

    /// Establishes the transport session. A no-op while already connected.
    ///
    /// Concurrent calls are serialized and share one connector call. The configuration is
    /// snapshotted before the connector runs. A session replaced by a reconnect is
    /// deactivated. On failure the connection stays closed without a session.
    pub async fn connect(&self) -> Result<(), RbbtError> {
        if self.is_connected() {
            return Ok(());
        }

        let _connecting = self.inner.connecting.lock().await;
        if self.is_connected() {
            return Ok(());
        }

        let config = self.config();
        let label = config.label();
        debug!(
            event = events::CONNECTION_OPEN,
            component = COMPONENT,
            "{}:{} connecting {}",
            CONNECTION_TAG,
            CONNECTION_FN_CONNECT_TAG,
            label
        );

        match self.open_session(&config).await {
            Ok(session) => {
                let previous = self.inner.set_session(Some(session.clone()));
                self.inner.closed.store(false, Ordering::SeqCst);
                debug!(
                    event = events::CONNECTION_OPEN,
                    component = COMPONENT,
                    "{}:{} connected {}",
                    CONNECTION_TAG,
                    CONNECTION_FN_CONNECT_TAG,
                    label
                );
                let replaced = previous.filter(|previous| !Arc::ptr_eq(previous, &session));
                if let Some(replaced) = replaced {
                    self.retire_session(replaced).await;
                }
                Ok(())
            }
            Err(kind) => {
                let previous = self.inner.set_session(None);
                self.inner.closed.store(true, Ordering::SeqCst);
                if let Some(previous) = previous {
                    self.retire_session(previous).await;
                }
                let err = RbbtError::new(kind, label);
                error!(
                    event = events::OPERATION_REJECTED,
                    component = COMPONENT,
                    "{}:{} {}",
                    CONNECTION_TAG,
                    CONNECTION_FN_CONNECT_TAG,
                    err
                );
                Err(err)
            }
        }
    }

    /// Deactivates a session that is no longer the connection's own.
    async fn retire_session(&self, session: Arc<dyn Session>) {
        if let Err(err) = session.deactivate().await {
            warn!(
                event = events::CONNECTION_CLOSE,
                component = COMPONENT,
                "{}:{} unable to deactivate replaced session: {}",
                CONNECTION_TAG,
                CONNECTION_FN_RETIRE_SESSION_TAG,
                err
            );
        }
    }

    async fn open_session(&self, config: &ConnectionConfig) -> Result<Arc<dyn Session>, ErrorKind> {
        let params = ConnectParams::from_config(config)?;
        let session = self.inner.connector.connect(params).await?;
        session.activate().await?;
        Ok(session)
    }

    /// Closes every exchange, then deactivates the session.
    pub async fn close(&self) -> Result<(), RbbtError> {
        self.inner.closed.store(true, Ordering::SeqCst);

        let exchanges = drain_entities(&self.inner.exchanges).await;
        debug!(
            event = events::CONNECTION_CLOSE,
            component = COMPONENT,
            exchanges = exchanges.len(),
            "{}:{} closing {}",
            CONNECTION_TAG,
            CONNECTION_FN_CLOSE_TAG,
            self.label()
        );
        join_all(exchanges.iter().map(|exchange| exchange.close())).await;

        let Some(session) = self.inner.set_session(None) else {
            return Ok(());
        };
        session.deactivate().await.map_err(|source| {
            let err = RbbtError::new(source, self.label());
            error!(
                event = events::OPERATION_REJECTED,
                component = COMPONENT,
                "{}:{} {}",
                CONNECTION_TAG,
                CONNECTION_FN_CLOSE_TAG,
                err
            );
            err
        })
    }

    /// Returns the exchange registered as `name`, or declares a new one.
    ///
    /// An empty `name` always declares a new exchange under a generated name. `options` are
    /// ignored when an existing exchange is returned.
    pub async fn exchange(
        &self,
        name: &str,
        options: ExchangeOptions,
    ) -> Result<Exchange, RbbtError> {
        let label = self.label();
        let reject = |kind: ErrorKind| {
            let err = RbbtError::new(kind, label.clone());
            error!(
                event = events::OPERATION_REJECTED,
                component = COMPONENT,
                exchange = name,
                "{}:{} {}",
                CONNECTION_TAG,
                CONNECTION_FN_EXCHANGE_TAG,
                err
            );
            err
        };

        if self.is_closed() {
            return Err(reject(ErrorKind::ClientClosed));
        }

        let mut registered = self.inner.exchanges.lock().await;
        if self.is_closed() {
            return Err(reject(ErrorKind::ClientClosed));
        }

        if !name.is_empty() {
            if let Some(existing) = registered.get(name) {
                debug!(
                    event = events::ENTITY_REUSED,
                    component = COMPONENT,
                    exchange = name,
                    "{}:{} returning registered exchange",
                    CONNECTION_TAG,
                    CONNECTION_FN_EXCHANGE_TAG
                );
                return Ok(existing.clone());
            }
        }

        let channel_max = self
            .inner
            .config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .channel_max;
        ensure_capacity(&registered, channel_max).map_err(&reject)?;

        let session = self
            .inner
            .active_session()
            .ok_or_else(|| reject(ErrorKind::NotConnected))?;

        let name = if name.is_empty() {
            vacant_name(&registered, || self.inner.names.exchange_name()).map_err(&reject)?
        } else {
            name.to_string()
        };

        let exchange = Exchange::declare(&self.inner, &label, &name, options, session.as_ref())
            .await
            .map_err(&reject)?;
        registered.insert(name, exchange.clone());
        Ok(exchange)
    }

    /// Names of the registered exchanges, sorted.
    pub async fn exchange_names(&self) -> Vec<String> {
        entity_names(&self.inner.exchanges).await
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Connection {}

impl Debug for Connection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("label", &self.label())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
