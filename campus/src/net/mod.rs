//! Networking modules for the JSON-over-HTTP contract with the server.
//!
//! SYSTEM CONTEXT
//! ==============
//! `transport` moves bytes, `types` defines the wire schema, `csrf` finds the
//! token every mutating call must echo, and `api` ties them together into
//! typed endpoint calls.

pub mod api;
pub mod csrf;
pub mod transport;
pub mod types;
