//! Client Module
//!
//! A blocking session over any `Read + Write` stream.
//!
//! ## Correlation
//! Each request carries a random opaque that the server echoes back. A
//! response with any other opaque means the stream is out of step, and the
//! session refuses further use:
//! ```text
//! request(opaque=r) ──► server ──► response(opaque=r)   ok
//!                                  response(opaque≠r)   OpaqueMismatch, broken
//! ```

mod ops;
mod session;

pub use ops::AuthOutcome;
pub use session::{GetReply, Reply, Session};
