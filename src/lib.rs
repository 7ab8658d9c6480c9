//! # collcache
//!
//! A binary-protocol cache with server-side collections:
//! - 24-byte header request/response frames with opaque correlation
//! - Ordered lists, unordered sets and b-trees keyed by a signed 64-bit bkey
//! - Overflow policies, attributes and lazy expiration per item
//! - A blocking client session and a thread-per-connection TCP server
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────┐                 ┌───────────────────────────────┐
//! │   client::Session    │  TCP / stream   │       network::Server         │
//! │  (typed operations)  │ ◄─────────────► │   (thread per connection)     │
//! └──────────┬───────────┘                 └───────────────┬───────────────┘
//!            │                                             │
//!            ▼                                             ▼
//! ┌──────────────────────┐                 ┌───────────────────────────────┐
//! │  protocol (codec,    │                 │        engine::Engine         │
//! │  registry, payloads) │                 │  (auth gate, type gating)     │
//! └──────────────────────┘                 └───────────────┬───────────────┘
//!                                                          │
//!                                   ┌──────────────────────┴──────┐
//!                                   ▼                             ▼
//!                           ┌──────────────┐            ┌──────────────────┐
//!                           │    store     │            │    collection    │
//!                           │ (items, CAS, │            │ (list/set/btree  │
//!                           │  expiry)     │            │  semantics)      │
//!                           └──────────────┘            └──────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod clock;
pub mod config;
pub mod error;

pub mod client;
pub mod collection;
pub mod engine;
pub mod network;
pub mod protocol;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use client::Session;
pub use config::Config;
pub use engine::Engine;
pub use error::{CacheError, ErrorCategory, Result};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of collcache
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
