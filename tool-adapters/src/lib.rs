//! Service adapters used by tool handlers.
//!
//! Handlers that reach outside the process depend on the traits in
//! [`traits`]; [`http`] provides the production implementation over HTTPS.

#![warn(missing_docs, clippy::pedantic)]

pub mod http;
pub mod traits;
