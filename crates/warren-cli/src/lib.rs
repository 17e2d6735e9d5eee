#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::redundant_pub_crate)]

//! Interactive console for inspecting a message broker through its HTTP
//! management API.
//!
//! Layout:
//! - `cli.rs`: argument parsing, logging bootstrap, and `run()`
//! - `session.rs`: verb dispatch, numeric shortcuts, and the input loop
//! - `editor.rs`: line editing, history, and verb completion
//! - `listing.rs`: entity listings and the current list
//! - `structure.rs`: aligned rendering of full entity documents
//! - `client.rs`: streaming HTTP transport and error types
//! - `abort.rs`: interrupt-driven transfer cancellation
//! - `main.rs`: thin entrypoint delegating to `run()`

pub mod abort;
pub mod client;
pub mod structure;

pub(crate) mod cli;
pub(crate) mod editor;
pub(crate) mod listing;
pub(crate) mod session;

pub use cli::run;
