//! # bihak
//!
//! Service layer around `bihak-core`: the HTTP API, the administrator CLI and
//! their configuration.

pub mod api;
pub mod cli;
pub mod config;
