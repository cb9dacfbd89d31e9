//! Library module for fileproxy-server
//!
//! This library module exists to share code between the `fileproxy-server` binary crate and its
//! integration tests.

pub mod app;
pub mod config;
pub mod logging;
pub mod setup;
pub mod storage;
