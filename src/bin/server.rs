//! collcache Server Binary
//!
//! Starts the TCP server for collcache.

use std::sync::Arc;

use clap::Parser;
use collcache::network::Server;
use collcache::{Config, Engine};
use tracing_subscriber::{fmt, EnvFilter};

/// collcache Server
#[derive(Parser, Debug)]
#[command(name = "collcache-server")]
#[command(about = "Binary-protocol cache server with list, set and b-tree collections")]
#[command(version)]
struct Args {
    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:11211")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Close connections idle for this many milliseconds (0 = never)
    #[arg(long, default_value = "0")]
    idle_timeout_ms: u64,

    /// Max count given to collections created without one
    #[arg(long, default_value = "4000")]
    default_max_count: u32,

    /// Hard upper bound on a collection's max count
    #[arg(long, default_value = "10000")]
    max_max_count: u32,

    /// Largest value accepted, in KB
    #[arg(long, default_value = "1024")]
    max_item_kb: usize,

    /// SASL PLAIN credential as user:password (repeatable)
    #[arg(short, long = "user")]
    users: Vec<String>,

    /// Refuse data commands until the connection authenticates
    #[arg(long)]
    require_auth: bool,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,collcache=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("collcache Server v{}", collcache::VERSION);
    tracing::info!("Listen address: {}", args.listen);

    let mut builder = Config::builder()
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .idle_timeout_ms(args.idle_timeout_ms)
        .default_max_count(args.default_max_count)
        .max_max_count(args.max_max_count)
        .max_item_size(args.max_item_kb * 1024)
        .require_auth(args.require_auth);
    for entry in &args.users {
        let Some((user, password)) = entry.split_once(':') else {
            tracing::error!("Credential {:?} is not user:password", entry);
            std::process::exit(2);
        };
        builder = builder.credential(user, password);
    }
    let config = builder.build();

    let engine = Arc::new(Engine::new(config.clone()));
    tracing::info!("Engine initialized successfully");

    let server = match Server::bind(config, engine) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
