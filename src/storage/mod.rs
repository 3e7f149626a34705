//!  Storage is organized through [kv_storage::KeyValueStorage].
//!  The basic idea is:
//!   - Everything lives under plain string keys holding JSON values.
//!   - Each day has its own ledger under `tasks_<YYYY-MM-DD>`.
//!   - The running task and the theme preference have one reserved key each.

pub mod entities;
pub mod kv_storage;
pub mod ledger_store;
pub mod preferences;
pub mod session_store;
