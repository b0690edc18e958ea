//! Task board server library.
//!
//! Holds the authoritative task table and decides status transitions for
//! board clients connected over WebSocket. Exposed as a library for tests
//! and embedding.

pub mod config;
pub mod seed;
pub mod server;
pub mod store;
