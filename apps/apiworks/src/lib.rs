//! # apiworks
//!
//! The async half of apiworks: per-resource RPC services over the
//! synchronous `apiworks-core` store, in-process sync streams that
//! publish committed mutations, the axum HTTP surface and the CLI.
//!
//! ```text
//!   CLI (clap) ──┐
//!                ├──> services ──> apiworks-core (redb, bundles, vault)
//!   HTTP (axum) ─┘        │
//!                         └──> streamer ──> SSE sync endpoints
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod services;
pub mod streamer;
