//! collcache CLI Client
//!
//! Command-line interface for interacting with a collcache server.

use clap::{Parser, Subcommand};
use collcache::protocol::payload::{AttributeReport, BtreeBatch, ElementBatch};
use collcache::protocol::{CreateAttrs, VbucketState};
use collcache::{Result, Session};

/// collcache CLI
#[derive(Parser, Debug)]
#[command(name = "collcache-cli")]
#[command(about = "CLI for the collcache server")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:11211")]
    server: String,

    /// Authenticate with SASL PLAIN as this user first
    #[arg(short, long)]
    user: Option<String>,

    /// Password for --user
    #[arg(short, long, default_value = "")]
    password: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get { key: String },

    /// Set a key-value pair
    Set {
        key: String,
        value: String,
        #[arg(long, default_value = "0")]
        flags: u32,
        #[arg(long, default_value = "0")]
        exptime: u32,
    },

    /// Delete a key of any type
    Del { key: String },

    /// Increment a counter
    Incr {
        key: String,
        #[arg(default_value = "1")]
        amount: u64,
    },

    /// Decrement a counter
    Decr {
        key: String,
        #[arg(default_value = "1")]
        amount: u64,
    },

    /// Show an item's attributes
    Attr { key: String },

    /// Insert into a list, creating it if needed
    LopInsert { key: String, index: i32, value: String },

    /// Read list elements in from..=to
    LopGet {
        key: String,
        #[arg(default_value = "0")]
        from: i32,
        #[arg(default_value = "-1")]
        to: i32,
    },

    /// Insert into a set, creating it if needed
    SopInsert { key: String, value: String },

    /// Read up to COUNT set elements (0 = all)
    SopGet {
        key: String,
        #[arg(default_value = "0")]
        count: u32,
    },

    /// Insert into a b-tree, creating it if needed
    BopInsert { key: String, bkey: i64, value: String },

    /// Read b-tree elements with bkeys between FROM and TO
    BopGet {
        key: String,
        #[arg(allow_hyphen_values = true)]
        from: i64,
        #[arg(allow_hyphen_values = true)]
        to: i64,
        #[arg(long, default_value = "0")]
        count: u32,
    },

    /// Show a stats group ("", settings, collections)
    Stats {
        #[arg(default_value = "")]
        group: String,
    },

    /// Invalidate all items
    Flush {
        #[arg(default_value = "0")]
        delay: u32,
    },

    /// Set a vbucket's state
    VbSet { id: u16, state: String },

    /// Show a vbucket's state
    VbGet { id: u16 },

    /// List SASL mechanisms
    Mechs,

    /// Ping the server
    Ping,

    /// Show the server version
    Version,
}

fn print_elements(batch: &ElementBatch) {
    println!("flags={} count={}", batch.flags, batch.values.len());
    for value in &batch.values {
        println!("  {}", String::from_utf8_lossy(value));
    }
}

fn print_btree(batch: &BtreeBatch) {
    println!("flags={} count={}", batch.flags, batch.elements.len());
    for element in &batch.elements {
        println!("  {} => {}", element.bkey, String::from_utf8_lossy(&element.value));
    }
}

fn print_attrs(report: &AttributeReport) {
    println!("type={}", report.item_type);
    println!("flags={}", report.flags);
    println!("exptime={}", report.exptime);
    println!("count={}", report.count);
    if report.item_type.is_collection() {
        println!("maxcount={}", report.maxcount);
        if let Some(action) = report.overflow_action {
            println!("ovflaction={:?}", action);
        }
    }
    if report.maxbkeyrange != 0 {
        println!("maxbkeyrange={}", report.maxbkeyrange);
    }
}

fn run(args: Args) -> Result<()> {
    let mut session = Session::connect(&args.server)?;
    if let Some(user) = &args.user {
        session.sasl_auth_plain(user, &args.password)?;
    }
    let create = Some(CreateAttrs::default());

    match args.command {
        Commands::Get { key } => {
            let reply = session.get(key.as_bytes())?;
            println!("{}", String::from_utf8_lossy(&reply.value));
        }
        Commands::Set {
            key,
            value,
            flags,
            exptime,
        } => {
            let cas = session.set(key.as_bytes(), value.as_bytes(), flags, exptime)?;
            println!("STORED cas={}", cas);
        }
        Commands::Del { key } => {
            session.delete(key.as_bytes())?;
            println!("DELETED");
        }
        Commands::Incr { key, amount } => {
            println!("{}", session.incr(key.as_bytes(), amount, 0, 0)?);
        }
        Commands::Decr { key, amount } => {
            println!("{}", session.decr(key.as_bytes(), amount, 0, 0)?);
        }
        Commands::Attr { key } => print_attrs(&session.get_attr(key.as_bytes())?),
        Commands::LopInsert { key, index, value } => {
            let status = session.lop_insert(key.as_bytes(), index, value.as_bytes(), create)?;
            println!("{}", status);
        }
        Commands::LopGet { key, from, to } => {
            print_elements(&session.lop_get(key.as_bytes(), from, to)?)
        }
        Commands::SopInsert { key, value } => {
            let status = session.sop_insert(key.as_bytes(), value.as_bytes(), create)?;
            println!("{}", status);
        }
        Commands::SopGet { key, count } => print_elements(&session.sop_get(key.as_bytes(), count)?),
        Commands::BopInsert { key, bkey, value } => {
            let status = session.bop_insert(key.as_bytes(), bkey, value.as_bytes(), create)?;
            println!("{}", status);
        }
        Commands::BopGet {
            key,
            from,
            to,
            count,
        } => print_btree(&session.bop_get(key.as_bytes(), from, to, 0, count)?),
        Commands::Stats { group } => {
            let mut stats: Vec<_> = session.stats(&group)?.into_iter().collect();
            stats.sort();
            for (name, value) in stats {
                println!("{} {}", name, value);
            }
        }
        Commands::Flush { delay } => {
            session.flush(delay)?;
            println!("OK");
        }
        Commands::VbSet { id, state } => {
            let state: VbucketState = state
                .parse()
                .map_err(collcache::CacheError::Config)?;
            session.set_vbucket_state(id, state)?;
            println!("OK");
        }
        Commands::VbGet { id } => println!("{}", session.get_vbucket_state(id)?.name()),
        Commands::Mechs => println!("{}", session.sasl_mechanisms()?.join(" ")),
        Commands::Ping => {
            session.noop()?;
            println!("PONG");
        }
        Commands::Version => println!("{}", session.version()?),
    }
    Ok(())
}

fn main() {
    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
