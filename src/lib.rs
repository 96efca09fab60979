//! Native Store
//!
//! Stores raw upstream content as-is, keyed by collection and UUID, and
//! serves it back in the format it was received.

pub mod codec;
pub mod config;
pub mod db;
pub mod gateway;
pub mod models;
pub mod patch;
pub mod server;

pub use codec::{CodecError, MediaType};
pub use config::{Config, ConfigError};
pub use db::{Connection, Db, DbSettings, IdStream, StoreError};
pub use gateway::{Gateway, GatewayError, HashCheck, Payload};
pub use models::{Content, Resource};
pub use server::{router, AppState};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
