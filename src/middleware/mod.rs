//! Request pipeline stages that run before the proxy handler.
//!
//! Order is fixed in [`server::build_router`](crate::server::build_router):
//! [`auth::public_auth`] first, then [`access_log::access_log`], then the
//! proxy. [`client_origin`] holds the caller classification both rely on.

pub mod access_log;
pub mod auth;
pub mod client_origin;
