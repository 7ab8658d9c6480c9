//! Store Module
//!
//! In-memory item table keyed by cache key.
//!
//! ## Responsibilities
//! - Hold one typed item per key (plain value, list, set or b-tree)
//! - Hide expired items and items invalidated by a flush
//! - Hand out monotonically increasing CAS values
//!
//! ## Expiration
//! ```text
//! exptime == 0              never expires
//! 0 < exptime <= 30 days    relative seconds from now
//! exptime > 30 days         absolute unix seconds
//! exptime < 0               already expired
//! ```
//! Expired items are removed lazily, the next time their key is looked up.

mod item;
mod table;

pub use item::{resolve_exptime, Item, Value, RELATIVE_EXPTIME_LIMIT};
pub use table::ItemTable;
