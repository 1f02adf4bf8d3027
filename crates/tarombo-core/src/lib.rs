//! Core types and trait definitions for the Tarombo lineage store.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.
//!
//! The tree logic lives here as pure functions over an in-memory view of the
//! record set: [`hierarchy`] resolves father/child relations through union
//! records, [`generation`] derives and propagates generation numbers,
//! [`fork`] copies a descendant subtree into a proposal, and [`diff`]
//! compares proposal edits against canonical records.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod diff;
pub mod error;
pub mod fork;
pub mod generation;
pub mod hierarchy;
pub mod person;
pub mod request;
pub mod store;
pub mod union;

pub use error::{Error, Result};
