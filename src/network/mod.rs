//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single acceptor loop (nonblocking, polled so shutdown is noticed)
//! - One thread per connection, tracked by a `WaitGroup`
//! - Requests executed through the shared Engine

mod connection;
mod server;

pub use connection::Connection;
pub use server::{Server, ShutdownHandle};
