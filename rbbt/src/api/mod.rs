//! API facade layer.
//!
//! The three entity handles applications hold: [`Connection`] owns the transport session
//! and the exchange namespace, [`Exchange`] owns a queue namespace and its own
//! exchange-level subscription, [`Queue`] tracks its binding and mediates between direct
//! and bound consumption.
//!
//! Handles are cheap to clone and compare by identity. Children keep only weak references
//! to their parents; a child whose parent is gone behaves as if the parent were closed.
//!
//! ```ignore
//! let connection = Connection::new(config, connector);
//! connection.connect().await?;
//! let orders = connection.exchange("orders", ExchangeOptions::default()).await?;
//! let queue = orders.queue("", QueueOptions::default().exclusive(true)).await?;
//! queue.bind("orders", "created").await?;
//! # Ok::<(), rbbt::RbbtError>(())
//! ```

pub mod connection;
pub mod exchange;
pub mod queue;

pub use connection::Connection;
pub use exchange::Exchange;
pub use queue::Queue;
