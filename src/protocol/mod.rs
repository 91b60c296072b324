//! # Routing and Dispatch
//!
//! User-facing routing hooks and the worker pool that runs them.
//!
//! Applications implement [`router::Router`] for each message id they care
//! about and register it on the server before traffic begins. The
//! [`dispatcher::Dispatcher`] fans decoded requests out to a fixed pool of
//! workers while preserving per-connection arrival order.

pub mod dispatcher;
pub mod router;
