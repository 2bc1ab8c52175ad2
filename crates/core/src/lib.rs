//! postaction core - shared types library.
//!
//! This crate provides the types used across all postaction components:
//! - `server` - Action dispatcher and HTTP API
//! - `cli` - Key management and trigger inspection
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no
//! cryptography. This keeps it lightweight and allows it to be used anywhere,
//! including by integrations written in Rust.
//!
//! # Modules
//!
//! - [`types`] - Typed ids, posts with interactive attachments, dialogs,
//!   integration payloads and real-time events

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
