//! fixp-trader: the client half of a FIX-over-WebSocket order-entry pipeline.
//!
//! [`trader::Trader`] is the facade most callers want — it ties together
//! [`buffer_pool`], [`dispatcher`], [`codec`], [`transport`], and [`session`]
//! into a blocking request/response-capable API. The wire types themselves
//! live in the `fixp-protocol` crate.

pub mod buffer_pool;
pub mod codec;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod session;
pub mod trader;
pub mod transport;

pub use config::TraderConfig;
pub use error::TraderError;
pub use session::{SessionEvent, SessionState};
pub use trader::Trader;
