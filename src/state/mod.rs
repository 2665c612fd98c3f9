//! Client-side state modules.
//!
//! DESIGN
//! ======
//! State is split by concern (`auth`, `chat`, `history`, `admin`) so each
//! piece can be driven and tested on its own. The session controller owns
//! one of each.

pub mod admin;
pub mod auth;
pub mod chat;
pub mod history;
