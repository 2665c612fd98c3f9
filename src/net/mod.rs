//! Networking modules for the chat backend's HTTP contract.
//!
//! SYSTEM CONTEXT
//! ==============
//! `api` defines the backend seam and its `reqwest` implementation, `error`
//! classifies failures, and `types` defines the shared wire schema.

pub mod api;
pub mod error;
pub mod types;
