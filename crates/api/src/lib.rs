//! Autobids API server library.
//!
//! Exposes config, state, error handling, routes and the maintenance
//! commands so integration tests and the binary entrypoint can share them.

pub mod auth;
pub mod commands;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
