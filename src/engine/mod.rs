//! Engine Module
//!
//! The reference executor for every opcode in the protocol.
//!
//! ## Responsibilities
//! - Decode request extras according to the opcode's layout
//! - Gate operations by item type and authentication state
//! - Apply expiration, CAS and collection semantics to the item table
//! - Produce the response frame(s) for each request
//!
//! ## Request Path
//! ```text
//! Request ──► opcode lookup ──► auth gate ──► key check ──► extras decode
//!                                                               │
//!      Vec<Response> ◄── quiet suppression ◄── handler ◄────────┘
//! ```

mod admin;
mod collection;
mod kv;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::clock::{Clock, SystemClock, Tick};
use crate::collection::{CollectionError, ItemType, Limits};
use crate::config::Config;
use crate::protocol::{Extras, Family, Opcode, Request, Response, Status, VbucketState};
use crate::store::ItemTable;

/// Longest key accepted
pub const MAX_KEY_LENGTH: usize = 250;

/// A failed operation: the status to report and a short message
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Reject {
    status: Status,
    message: String,
}

impl Reject {
    fn new(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn not_found() -> Self {
        Self::new(Status::NotFound, "Not found")
    }

    fn bad_type(expected: ItemType, actual: ItemType) -> Self {
        Self::new(
            Status::BadType,
            format!("Operation on a {} item, expected {}", actual, expected),
        )
    }

    fn bad_extras(op: Opcode) -> Self {
        Self::new(
            Status::InvalidArguments,
            format!("Bad extras for {}", op.name()),
        )
    }
}

impl From<CollectionError> for Reject {
    fn from(err: CollectionError) -> Self {
        Self::new(err.status(), err.to_string())
    }
}

type OpResult = std::result::Result<Response, Reject>;

/// Per-connection state the engine reads and updates
#[derive(Debug, Default)]
pub struct ConnState {
    authenticated: bool,
    /// Mechanism of a SASL exchange awaiting its next step
    sasl_mech: Option<String>,
    closing: bool,
}

impl ConnState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Set once a Quit has been answered
    pub fn is_closing(&self) -> bool {
        self.closing
    }
}

/// Server-wide counters
#[derive(Debug, Default)]
pub struct EngineStats {
    pub cmd_get: AtomicU64,
    pub get_hits: AtomicU64,
    pub get_misses: AtomicU64,
    pub cmd_set: AtomicU64,
    pub cmd_flush: AtomicU64,
    pub total_items: AtomicU64,
    pub lop_cmds: AtomicU64,
    pub sop_cmds: AtomicU64,
    pub bop_cmds: AtomicU64,
    pub attr_cmds: AtomicU64,
    pub auth_cmds: AtomicU64,
    pub auth_errors: AtomicU64,
    pub curr_connections: AtomicU64,
    pub total_connections: AtomicU64,
    pub rejected_connections: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl EngineStats {
    pub fn connection_opened(&self) {
        bump(&self.curr_connections);
        bump(&self.total_connections);
    }

    pub fn connection_closed(&self) {
        self.curr_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn connection_rejected(&self) {
        bump(&self.rejected_connections);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// The in-memory executor shared by every connection
///
/// ## Concurrency Model
///
/// - The item table sits behind one `parking_lot::Mutex`; every command
///   holds it for its whole duration, so each command is atomic per key,
///   evictions included.
/// - Counters are relaxed atomics.
/// - Connection state lives with the connection and is passed in.
pub struct Engine {
    config: Config,
    limits: Limits,
    clock: Arc<dyn Clock>,
    table: Mutex<ItemTable>,
    vbuckets: Mutex<HashMap<u16, VbucketState>>,
    stats: EngineStats,
    started_at: Tick,
}

impl Engine {
    /// Create an engine on the system clock
    pub fn new(config: Config) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create an engine driven by the given clock
    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Self {
        let started_at = clock.now();
        Self {
            limits: config.limits(),
            config,
            clock,
            table: Mutex::new(ItemTable::new()),
            vbuckets: Mutex::new(HashMap::new()),
            stats: EngineStats::default(),
            started_at,
        }
    }

    /// Execute one request
    ///
    /// Returns the frames to send back, in order. Quiet requests whose
    /// outcome is suppressed return nothing; Stat returns one frame per
    /// statistic plus a terminator.
    pub fn execute(&self, request: &Request, conn: &mut ConnState) -> Vec<Response> {
        let Some(op) = request.op() else {
            tracing::debug!("Unknown opcode 0x{:02x}", request.opcode);
            let reject = Reject::new(Status::UnknownCommand, "Unknown command");
            return vec![self.finish(request, Err(reject))];
        };
        tracing::trace!(
            "{} key={} extras={} value={}",
            op,
            String::from_utf8_lossy(&request.key),
            request.extras.len(),
            request.value.len()
        );

        let outcome = self
            .admit(op, request, conn)
            .and_then(|extras| self.dispatch(op, extras, request, conn));

        match outcome {
            Ok(responses) => responses
                .into_iter()
                .map(|r| self.finish(request, Ok(r)))
                .collect(),
            Err(reject) if op.is_quiet() && reject.status == Status::NotFound => Vec::new(),
            Err(reject) => vec![self.finish(request, Err(reject))],
        }
    }

    /// Checks common to every opcode; yields the decoded extras
    fn admit(&self, op: Opcode, request: &Request, conn: &ConnState) -> Result<Extras, Reject> {
        let exempt = matches!(
            op,
            Opcode::Version | Opcode::Noop | Opcode::Quit
        ) || op.family() == Family::Auth;
        if self.config.require_auth && !conn.authenticated && !exempt {
            return Err(Reject::new(Status::AuthError, "Authentication required"));
        }

        let keyed = !matches!(op.family(), Family::Admin | Family::Auth);
        if keyed && (request.key.is_empty() || request.key.len() > MAX_KEY_LENGTH) {
            return Err(Reject::new(
                Status::InvalidArguments,
                format!("Key length must be 1..={}", MAX_KEY_LENGTH),
            ));
        }

        Extras::for_opcode(op, &request.extras)
            .map_err(|e| Reject::new(Status::InvalidArguments, e.to_string()))
    }

    fn dispatch(
        &self,
        op: Opcode,
        extras: Extras,
        request: &Request,
        conn: &mut ConnState,
    ) -> Result<Vec<Response>, Reject> {
        let single = match op {
            Opcode::Get | Opcode::GetQ => self.get(op, request),
            Opcode::Set | Opcode::Add | Opcode::Replace => self.store(op, extras, request),
            Opcode::Append | Opcode::Prepend => self.concat(op, request),
            Opcode::Delete => self.delete(op, request),
            Opcode::Increment | Opcode::Decrement => self.arithmetic(op, extras, request),
            Opcode::Quit => {
                conn.closing = true;
                Ok(Response::ok(op))
            }
            Opcode::Flush => self.flush(op, extras),
            Opcode::Noop => Ok(Response::ok(op)),
            Opcode::Version => Ok(Response::ok(op).with_value(self.config.version.clone())),
            Opcode::Stat => return self.stat(op, request),
            Opcode::SaslListMechs => Ok(self.sasl_mechanisms(op)),
            Opcode::SaslAuth => self.sasl_auth(op, request, conn),
            Opcode::SaslStep => self.sasl_step(op, request, conn),
            Opcode::GetAttr => self.get_attr(op, request),
            Opcode::SetAttr => self.set_attr(op, extras, request),
            Opcode::LopCreate | Opcode::SopCreate | Opcode::BopCreate => {
                self.create(op, extras, request)
            }
            Opcode::LopInsert => self.lop_insert(op, extras, request),
            Opcode::LopDelete => self.lop_delete(op, extras, request),
            Opcode::LopGet => self.lop_get(op, extras, request),
            Opcode::SopInsert => self.sop_insert(op, extras, request),
            Opcode::SopDelete => self.sop_delete(op, extras, request),
            Opcode::SopExist => self.sop_exist(op, request),
            Opcode::SopGet => self.sop_get(op, extras, request),
            Opcode::BopInsert => self.bop_insert(op, extras, request),
            Opcode::BopDelete => self.bop_delete(op, extras, request),
            Opcode::BopGet => self.bop_get(op, extras, request),
            Opcode::BopCount => self.bop_count(op, extras, request),
            Opcode::SetVbucketState => self.set_vbucket_state(op, request),
            Opcode::GetVbucketState => self.get_vbucket_state(op, request),
            Opcode::DeleteVbucket => self.delete_vbucket(op, request),
        };
        single.map(|response| vec![response])
    }

    /// Echo the request's opcode and opaque into the outgoing frame
    fn finish(&self, request: &Request, outcome: OpResult) -> Response {
        let response = match outcome {
            Ok(response) => response,
            Err(reject) => {
                tracing::trace!(
                    "0x{:02x} -> {}: {}",
                    request.opcode,
                    reject.status,
                    reject.message
                );
                Response::error(request.opcode, reject.status, &reject.message)
            }
        };
        Response {
            opcode: request.opcode,
            opaque: request.opaque,
            ..response
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn now(&self) -> Tick {
        self.clock.now()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Number of stored items, including ones not yet lazily expired
    pub fn item_count(&self) -> usize {
        self.table.lock().len()
    }
}
