//! Connection Handler
//!
//! Handles individual client connections.

use std::io::{BufReader, BufWriter, ErrorKind};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::{ConnState, Engine};
use crate::error::{CacheError, Result};
use crate::protocol::{read_request, write_response, Response};

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Reference to the shared engine
    engine: Arc<Engine>,

    /// Authentication and SASL progress for this peer
    state: ConnState,

    /// Peer address for logging
    peer_addr: String,
}

/// Errors that mean the peer simply went away
fn is_disconnect(err: &CacheError) -> bool {
    match err {
        CacheError::ConnectionClosed => true,
        CacheError::Io(e) => matches!(
            e.kind(),
            ErrorKind::UnexpectedEof
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::BrokenPipe
        ),
        _ => false,
    }
}

/// Read timeouts surface as WouldBlock on unix and TimedOut on windows
fn is_timeout(err: &CacheError) -> bool {
    matches!(
        err,
        CacheError::Io(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
    )
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Sets up buffered I/O and disables Nagle's algorithm
    pub fn new(stream: TcpStream, engine: Arc<Engine>) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            engine,
            state: ConnState::new(),
            peer_addr,
        })
    }

    /// Configure connection timeouts; 0 leaves a direction unbounded
    pub fn set_timeouts(&mut self, idle_ms: u64, write_ms: u64) -> Result<()> {
        if idle_ms > 0 {
            self.reader
                .get_ref()
                .set_read_timeout(Some(Duration::from_millis(idle_ms)))?;
        }
        if write_ms > 0 {
            self.writer
                .get_ref()
                .set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }
        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Reads request frames in a loop and writes back whatever the engine
    /// produces for each. Returns when the client disconnects, sends Quit,
    /// idles past the timeout, or breaks framing.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        loop {
            let request = match read_request(&mut self.reader) {
                Ok(request) => request,
                Err(e) if is_disconnect(&e) => {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(());
                }
                Err(e) if is_timeout(&e) => {
                    tracing::debug!("Idle timeout for client {}", self.peer_addr);
                    return Ok(());
                }
                Err(e) => {
                    // The stream can no longer be trusted to be aligned on a frame
                    tracing::warn!("Framing error from {}: {}", self.peer_addr, e);
                    return Err(e);
                }
            };

            let responses = self.engine.execute(&request, &mut self.state);
            if let Err(e) = self.send(&responses) {
                if is_disconnect(&e) {
                    tracing::debug!(
                        "Client {} disconnected before response could be sent: {}",
                        self.peer_addr,
                        e
                    );
                    return Ok(());
                }
                tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                return Err(e);
            }

            if self.state.is_closing() {
                tracing::debug!("Client {} sent quit", self.peer_addr);
                return Ok(());
            }
        }
    }

    fn send(&mut self, responses: &[Response]) -> Result<()> {
        for response in responses {
            write_response(&mut self.writer, response)?;
        }
        Ok(())
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}
