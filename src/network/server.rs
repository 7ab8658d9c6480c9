//! TCP Server
//!
//! Accepts connections and runs each on its own thread.

use std::collections::HashMap;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::sync::WaitGroup;
use parking_lot::Mutex;

use super::Connection;
use crate::config::Config;
use crate::engine::Engine;
use crate::error::Result;

/// Pause between accept attempts while the listener has nothing pending
const ACCEPT_POLL: Duration = Duration::from_millis(10);

/// TCP server for collcache
pub struct Server {
    config: Config,
    engine: Arc<Engine>,
    listener: TcpListener,
    shutdown: Arc<AtomicBool>,
    /// Sockets of live connections, shut down when the server stops
    connections: Arc<Mutex<HashMap<u64, TcpStream>>>,
    next_conn_id: AtomicU64,
}

/// Cloneable handle that stops a running server
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl Server {
    /// Bind the configured listen address
    pub fn bind(config: Config, engine: Arc<Engine>) -> Result<Self> {
        config.validate()?;
        let listener = TcpListener::bind(&config.listen_addr)?;
        listener.set_nonblocking(true)?;
        tracing::info!("Listening on {}", listener.local_addr()?);

        Ok(Self {
            config,
            engine,
            listener,
            shutdown: Arc::new(AtomicBool::new(false)),
            connections: Arc::new(Mutex::new(HashMap::new())),
            next_conn_id: AtomicU64::new(0),
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
        }
    }

    /// Accept connections until shutdown is signalled (blocking)
    ///
    /// On shutdown every open connection socket is shut down and the call
    /// returns once all connection threads have finished.
    pub fn run(&self) -> Result<()> {
        let wait_group = WaitGroup::new();

        while !self.shutdown.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, addr)) => self.admit(stream, addr, &wait_group),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL);
                }
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                    thread::sleep(ACCEPT_POLL);
                }
            }
        }

        tracing::info!("Shutting down, closing {} connection(s)", self.connections.lock().len());
        for stream in self.connections.lock().values() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        wait_group.wait();
        Ok(())
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    fn admit(&self, stream: TcpStream, addr: SocketAddr, wait_group: &WaitGroup) {
        let stats = self.engine.stats();
        if self.connections.lock().len() >= self.config.max_connections {
            tracing::warn!(
                "Rejecting {}: connection limit {} reached",
                addr,
                self.config.max_connections
            );
            stats.connection_rejected();
            let _ = stream.shutdown(Shutdown::Both);
            return;
        }

        // The listener is nonblocking; accepted sockets must not be
        if let Err(e) = stream.set_nonblocking(false) {
            tracing::warn!("Failed to configure {}: {}", addr, e);
            return;
        }
        let registered = match stream.try_clone() {
            Ok(clone) => clone,
            Err(e) => {
                tracing::warn!("Failed to register {}: {}", addr, e);
                return;
            }
        };

        let id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        self.connections.lock().insert(id, registered);
        stats.connection_opened();

        let engine = Arc::clone(&self.engine);
        let connections = Arc::clone(&self.connections);
        let (idle_ms, write_ms) = (self.config.idle_timeout_ms, self.config.write_timeout_ms);
        let wait_group = wait_group.clone();

        thread::spawn(move || {
            let result = Connection::new(stream, Arc::clone(&engine)).and_then(|mut conn| {
                conn.set_timeouts(idle_ms, write_ms)?;
                conn.handle()
            });
            if let Err(e) = result {
                tracing::debug!("Connection {} ended with error: {}", addr, e);
            }
            connections.lock().remove(&id);
            engine.stats().connection_closed();
            drop(wait_group);
        });
    }
}
