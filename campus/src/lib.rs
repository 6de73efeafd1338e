//! # campus
//!
//! Client-side controllers for the campus community site: event registration,
//! feeds, comments, forum posts and search, and map location lookup.
//!
//! Each controller talks to the server through a [`net::transport::Transport`]
//! and drives a view trait instead of touching a page directly, so the same
//! logic runs behind a browser binding, the terminal front end in `cli`, or a
//! recording view in tests.

pub mod comments;
pub mod config;
pub mod error;
pub mod feed;
pub mod forum;
pub mod geo;
pub mod net;
pub mod registration;
pub mod search;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use config::ClientConfig;
pub use error::ClientError;
