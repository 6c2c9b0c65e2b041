//! wa-bridge library.
//!
//! Records a messaging session's live and historical messages in SQLite and exposes a
//! small HTTP control surface for sending messages and reading what was stored.

pub mod address;
pub mod api;
pub mod content;
pub mod gateway;
pub mod ingest;
pub mod resolver;
pub mod session;
pub mod store;
