//! Integration tests for healthgate
//!
//! Each test starts the real health listener in-process on an ephemeral
//! port and drives it over HTTP, so no external services are needed.
//!
//! Run with: cargo test --test integration

mod helpers;

mod endpoints;
mod shutdown;
