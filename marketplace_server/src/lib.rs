//! # Marketplace server
//! This crate hosts the long-running side of the marketplace engine. It is responsible for:
//! * Running the escalation scheduler, which cancels, completes and auto-resolves stale transactions and refund rounds.
//! * Receiving payment gateway callbacks and settling the payments they refer to.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/webhook/payment`: The payment gateway callback. Requests must carry the shared callback token in the
//!   `x-callback-token` header.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod escalation_worker;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
