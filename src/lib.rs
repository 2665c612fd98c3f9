//! Pocket Portal client core.
//!
//! Session and auth lifecycle for the chat portal: a persisted credential
//! store, startup auth resolution (redirect, then stored, then none), and a
//! conversation tracker that adopts the backend's session id.
//!
//! Layout:
//! - `net`: typed HTTP client for the portal backend
//! - `storage`: key-value persistence and the credential store on top of it
//! - `state`: per-view state for auth, chat, history, and admin
//! - `controller`: wires the above into one owned session

pub mod config;
pub mod controller;
pub mod net;
pub mod state;
pub mod storage;

#[cfg(test)]
mod test_helpers;

pub use controller::SessionController;
