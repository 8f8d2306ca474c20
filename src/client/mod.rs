//! # Client
//!
//! Database handle, sessions and configuration transactions.
//!
//! Flow: `Database::session` -> `Session::config_tx` -> mutations ->
//! `ConfigTxContext::commit` or `ConfigTxContext::abort`.

pub mod config_tx;
pub mod database;
pub mod errors;
pub mod session;

pub use config_tx::{ConfigTxContext, TxState};
pub use database::Database;
pub use errors::{ClientError, ClientResult, ConfigScope, Entity};
pub use session::Session;
