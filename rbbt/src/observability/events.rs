//! Event names attached to structured `tracing` events.

pub const CONNECTION_OPEN: &str = "connection_open";
pub const CONNECTION_CLOSE: &str = "connection_close";
pub const ENTITY_OPEN: &str = "entity_open";
pub const ENTITY_CLOSE: &str = "entity_close";
pub const ENTITY_REUSED: &str = "entity_reused";
pub const QUEUE_BIND: &str = "queue_bind";
pub const QUEUE_UNBIND: &str = "queue_unbind";
pub const SUBSCRIPTION_SWAP: &str = "subscription_swap";
pub const SUBSCRIPTION_TEARDOWN_FAILED: &str = "subscription_teardown_failed";
pub const FRAME_LISTEN_ONLY: &str = "frame_listen_only";
pub const FRAME_DROPPED_INERT: &str = "frame_dropped_inert";
pub const FRAME_SETTLE_FAILED: &str = "frame_settle_failed";
pub const PUBLISH: &str = "publish";
pub const OPERATION_REJECTED: &str = "operation_rejected";
