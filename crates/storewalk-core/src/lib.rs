//! Core types and trait definitions for the Storewalk visit tracker.
//!
//! This crate has no HTTP or database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod draft;
pub mod error;
pub mod fiscal;
pub mod intent;
pub mod market;
pub mod metric;
pub mod note;
pub mod store;
pub mod tracking;
pub mod transcribe;
pub mod visit;

pub use error::{Error, Result};
