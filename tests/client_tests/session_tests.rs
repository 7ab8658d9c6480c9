//! Tests for the client Session
//!
//! The session runs against an in-memory stream that feeds every written
//! frame to an engine and queues the encoded responses for reading. Hooks
//! on the stream rewrite or swallow responses to exercise the framing
//! failure paths.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::Arc;

use bytes::Bytes;
use collcache::client::AuthOutcome;
use collcache::clock::{ManualClock, Tick};
use collcache::collection::{ItemType, OverflowAction};
use collcache::engine::{ConnState, Engine};
use collcache::protocol::{
    read_request, write_response, CreateAttrs, Request, Response, Status, VbucketState,
};
use collcache::{CacheError, Config, ErrorCategory, Session};

// =============================================================================
// Helper Functions
// =============================================================================

type Tamper = Box<dyn FnMut(&mut Response)>;

struct EngineStream {
    engine: Engine,
    conn: ConnState,
    inbound: Vec<u8>,
    outbound: VecDeque<u8>,
    requests: Vec<Request>,
    tamper: Option<Tamper>,
    mute: bool,
}

impl EngineStream {
    fn new(config: Config) -> Self {
        let clock = Arc::new(ManualClock::new(Tick::from_secs(1_700_000_000)));
        Self {
            engine: Engine::with_clock(config, clock),
            conn: ConnState::new(),
            inbound: Vec::new(),
            outbound: VecDeque::new(),
            requests: Vec::new(),
            tamper: None,
            mute: false,
        }
    }

    fn process(&mut self) -> io::Result<()> {
        let inbound = std::mem::take(&mut self.inbound);
        let mut frames: &[u8] = &inbound;
        while !frames.is_empty() {
            let request = read_request(&mut frames)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
            for mut response in self.engine.execute(&request, &mut self.conn) {
                if let Some(tamper) = self.tamper.as_mut() {
                    tamper(&mut response);
                }
                if !self.mute {
                    write_response(&mut self.outbound, &response)
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
                }
            }
            self.requests.push(request);
        }
        Ok(())
    }
}

impl Read for EngineStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.outbound.read(buf)
    }
}

impl Write for EngineStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inbound.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.process()
    }
}

fn session() -> Session<EngineStream> {
    Session::new(EngineStream::new(Config::default()))
}

fn session_with(config: Config) -> Session<EngineStream> {
    Session::new(EngineStream::new(config))
}

fn create() -> Option<CreateAttrs> {
    Some(CreateAttrs::default())
}

fn server_status(err: &CacheError) -> Option<Status> {
    err.status()
}

// =============================================================================
// Key/Value Tests
// =============================================================================

#[test]
fn test_session_set_get() {
    let mut session = session();

    let cas = session.set(b"hello", b"world", 42, 0).unwrap();
    let reply = session.get(b"hello").unwrap();

    assert_eq!(reply.value, Bytes::from("world"));
    assert_eq!(reply.flags, 42);
    assert_eq!(reply.cas, cas);
}

#[test]
fn test_session_server_error_keeps_session() {
    let mut session = session();

    let err = session.get(b"missing").unwrap_err();
    assert_eq!(server_status(&err), Some(Status::NotFound));
    assert_eq!(err.category(), ErrorCategory::NotFound);
    assert!(!session.is_broken());

    session.noop().unwrap();
}

#[test]
fn test_session_cas_conflict() {
    let mut session = session();
    let cas = session.set(b"k", b"v1", 0, 0).unwrap();
    let next = session.cas(b"k", b"v2", 0, 0, cas).unwrap();

    let err = session.cas(b"k", b"v3", 0, 0, cas).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Conflict);
    assert_eq!(session.get(b"k").unwrap().cas, next);

    let err = session.add(b"k", b"v", 0, 0).unwrap_err();
    assert_eq!(server_status(&err), Some(Status::Exists));
    let err = session.replace(b"other", b"v", 0, 0).unwrap_err();
    assert_eq!(server_status(&err), Some(Status::NotFound));
}

#[test]
fn test_session_append_prepend_delete() {
    let mut session = session();
    session.set(b"k", b"mid", 0, 0).unwrap();
    session.append(b"k", b"-end").unwrap();
    session.prepend(b"k", b"start-").unwrap();
    assert_eq!(session.get(b"k").unwrap().value, Bytes::from("start-mid-end"));

    let cas = session.get(b"k").unwrap().cas;
    assert!(session.delete_cas(b"k", cas + 1).is_err());
    session.delete_cas(b"k", cas).unwrap();
    assert!(session.delete(b"k").is_err());
}

#[test]
fn test_session_counters() {
    let mut session = session();

    assert_eq!(session.incr(b"n", 1, 100, 0).unwrap(), 100);
    assert_eq!(session.incr(b"n", 5, 0, 0).unwrap(), 105);
    assert_eq!(session.decr(b"n", 200, 0, 0).unwrap(), 0);

    let err = session.incr(b"absent", 1, 0, 0xffff_ffff).unwrap_err();
    assert_eq!(server_status(&err), Some(Status::NotFound));
}

// =============================================================================
// Framing Failure Tests
// =============================================================================

#[test]
fn test_session_opaque_mismatch_breaks_session() {
    let mut stream = EngineStream::new(Config::default());
    stream.tamper = Some(Box::new(|r: &mut Response| r.opaque = r.opaque.wrapping_add(1)));
    let mut session = Session::new(stream);

    let err = session.noop().unwrap_err();
    assert!(matches!(err, CacheError::OpaqueMismatch { .. }));
    assert!(err.is_framing());
    assert!(session.is_broken());

    let err = session.noop().unwrap_err();
    assert!(matches!(err, CacheError::SessionBroken));
}

#[test]
fn test_session_closed_stream_breaks_session() {
    let mut stream = EngineStream::new(Config::default());
    stream.mute = true;
    let mut session = Session::new(stream);

    let err = session.version().unwrap_err();
    assert!(matches!(err, CacheError::ConnectionClosed));
    assert_eq!(err.category(), ErrorCategory::Protocol);
    assert!(session.is_broken());
    assert!(matches!(session.get(b"k").unwrap_err(), CacheError::SessionBroken));
}

#[test]
fn test_session_vbucket_in_header() {
    let mut session = session();
    assert_eq!(session.vbucket_id(), 0);
    session.set_vbucket_id(9);
    session.noop().unwrap();

    let last = session.get_ref().requests.last().unwrap();
    assert_eq!(last.vbucket, 9);
    assert_ne!(last.opaque, 0);
}

// =============================================================================
// Multi-Get Tests
// =============================================================================

#[test]
fn test_session_multi_get() {
    let mut session = session();
    session.set(b"a", b"1", 1, 0).unwrap();
    session.set(b"c", b"3", 3, 0).unwrap();

    let found = session.multi_get(&["a", "b", "c"]).unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found[&Bytes::from("a")].value, Bytes::from("1"));
    assert_eq!(found[&Bytes::from("c")].flags, 3);
    assert!(!found.contains_key(&Bytes::from("b")));

    // quiet gets carry their position as opaque, then the noop sentinel
    let opaques: Vec<u32> = session
        .get_ref()
        .requests
        .iter()
        .rev()
        .take(4)
        .map(|r| r.opaque)
        .collect();
    assert_eq!(opaques, vec![3, 2, 1, 0]);
}

#[test]
fn test_session_multi_get_empty() {
    let mut session = session();
    let keys: [&str; 0] = [];
    assert!(session.multi_get(&keys).unwrap().is_empty());
}

#[test]
fn test_session_multi_get_drains_before_error() {
    let mut session = session();
    session.set(b"a", b"1", 0, 0).unwrap();
    session.lop_insert(b"list", 0, b"x", create()).unwrap();

    let err = session.multi_get(&["list", "a"]).unwrap_err();
    assert_eq!(server_status(&err), Some(Status::BadType));
    assert!(!session.is_broken());

    // nothing left over from the batch
    assert!(session.get_ref().outbound.is_empty());
    assert_eq!(session.get(b"a").unwrap().value, Bytes::from("1"));
}

#[test]
fn test_session_multi_get_unknown_opaque() {
    let mut session = session();
    session.set(b"a", b"1", 0, 0).unwrap();
    let mut stream = session.into_inner();
    stream.tamper = Some(Box::new(|r: &mut Response| {
        if r.opaque == 0 {
            r.opaque = 77;
        }
    }));
    let mut session = Session::new(stream);

    let err = session.multi_get(&["a", "b"]).unwrap_err();
    assert!(matches!(err, CacheError::OpaqueMismatch { actual: 77, .. }));
    assert!(session.is_broken());
}

// =============================================================================
// Admin Tests
// =============================================================================

#[test]
fn test_session_stats() {
    let mut session = session();
    session.set(b"k", b"v", 0, 0).unwrap();

    let general = session.stats("").unwrap();
    assert_eq!(general["curr_items"], "1");
    assert_eq!(general["cmd_set"], "1");

    let settings = session.stats("settings").unwrap();
    assert_eq!(settings["sasl_mechanisms"], "PLAIN");

    let err = session.stats("bogus").unwrap_err();
    assert_eq!(server_status(&err), Some(Status::NotFound));
    assert!(!session.is_broken());
}

#[test]
fn test_session_flush_version_quit() {
    let config = Config::builder().version("1.2.3").build();
    let mut session = session_with(config);
    session.set(b"k", b"v", 0, 0).unwrap();

    session.flush(0).unwrap();
    assert!(session.get(b"k").is_err());
    assert_eq!(session.version().unwrap(), "1.2.3");

    session.quit().unwrap();
    assert!(session.get_ref().conn.is_closing());
}

#[test]
fn test_session_vbucket_states() {
    let mut session = session();

    session.set_vbucket_state(3, VbucketState::Pending).unwrap();
    assert_eq!(session.get_vbucket_state(3).unwrap(), VbucketState::Pending);
    session.delete_vbucket(3).unwrap();
    assert!(session.get_vbucket_state(3).is_err());
}

// =============================================================================
// SASL Tests
// =============================================================================

fn auth_config() -> Config {
    Config::builder()
        .credential("alice", "secret")
        .require_auth(true)
        .build()
}

#[test]
fn test_session_sasl_plain() {
    let mut session = session_with(auth_config());

    let err = session.get(b"k").unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Auth);

    assert_eq!(session.sasl_mechanisms().unwrap(), vec!["PLAIN".to_string()]);
    assert!(session.sasl_auth_plain("alice", "wrong").is_err());
    session.sasl_auth_plain("alice", "secret").unwrap();

    let err = session.get(b"k").unwrap_err();
    assert_eq!(server_status(&err), Some(Status::NotFound));
}

#[test]
fn test_session_sasl_exchange_with_continue() {
    let mut session = session_with(auth_config());

    let outcome = session.sasl_auth_start("PLAIN", b"").unwrap();
    assert!(matches!(outcome, AuthOutcome::Continue(_)));
    let outcome = session.sasl_auth_step("PLAIN", b"\0alice\0secret").unwrap();
    assert_eq!(outcome, AuthOutcome::Authenticated(Bytes::from("Authenticated")));

    let mut session = session_with(auth_config());
    let mut challenges = 0;
    let data = session
        .sasl_auth_exchange("PLAIN", b"", |_| {
            challenges += 1;
            Ok(b"\0alice\0secret".to_vec())
        })
        .unwrap();
    assert_eq!(challenges, 1);
    assert_eq!(data, Bytes::from("Authenticated"));
    session.set(b"k", b"v", 0, 0).unwrap();
}

// =============================================================================
// Collection Tests
// =============================================================================

#[test]
fn test_session_list_operations() {
    let mut session = session();

    assert!(session.lop_insert(b"l", 0, b"a", None).is_err());
    assert_eq!(session.lop_insert(b"l", 0, b"a", create()).unwrap(), Status::CreatedStored);
    assert_eq!(session.lop_insert(b"l", -1, b"b", None).unwrap(), Status::Success);
    session.lop_insert(b"l", -1, b"c", None).unwrap();

    let batch = session.lop_get(b"l", -1, 0).unwrap();
    assert_eq!(batch.values, vec![Bytes::from("c"), Bytes::from("b"), Bytes::from("a")]);

    let popped = session.lop_get_delete(b"l", 0, 0, false).unwrap();
    assert_eq!(popped.values, vec![Bytes::from("a")]);
    assert_eq!(session.lop_delete(b"l", 0, -1, true).unwrap(), Status::DeletedDropped);

    let err = session.lop_get(b"l", 0, -1).unwrap_err();
    assert_eq!(server_status(&err), Some(Status::NotFound));
}

#[test]
fn test_session_explicit_create_and_attrs() {
    let mut session = session();
    let attrs = CreateAttrs {
        flags: 11,
        exptime: 0,
        maxcount: 3,
    };
    session.lop_create(b"l", attrs, Some(OverflowAction::HeadTrim)).unwrap();

    let report = session.get_attr(b"l").unwrap();
    assert_eq!(report.item_type, ItemType::List);
    assert_eq!(report.flags, 11);
    assert_eq!(report.maxcount, 3);
    assert_eq!(report.overflow_action, Some(OverflowAction::HeadTrim));

    session.set_attr(b"l", None, Some(10), None, Some(OverflowAction::Error)).unwrap();
    let report = session.get_attr(b"l").unwrap();
    assert_eq!(report.maxcount, 10);
    assert_eq!(report.overflow_action, Some(OverflowAction::Error));

    let err = session.set_attr(b"l", None, None, Some(5), None).unwrap_err();
    assert_eq!(server_status(&err), Some(Status::BadAttribute));
}

#[test]
fn test_session_set_operations() {
    let mut session = session();
    session.sop_create(b"s", CreateAttrs::default()).unwrap();

    assert_eq!(session.sop_insert(b"s", b"a", None).unwrap(), Status::Success);
    session.sop_insert(b"s", b"b", None).unwrap();
    let err = session.sop_insert(b"s", b"a", None).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::ElementPresence);

    assert!(session.sop_exist(b"s", b"a").unwrap());
    assert!(!session.sop_exist(b"s", b"z").unwrap());
    assert_eq!(session.sop_get(b"s", 0).unwrap().values.len(), 2);

    assert_eq!(session.sop_delete(b"s", b"a", true).unwrap(), Status::Success);
    let popped = session.sop_get_delete(b"s", 0, true).unwrap();
    assert_eq!(popped.values, vec![Bytes::from("b")]);
    assert!(session.get_attr(b"s").is_err());
}

#[test]
fn test_session_btree_operations() {
    let mut session = session();
    session.bop_create(b"b", CreateAttrs::default(), Some(OverflowAction::LargestTrim)).unwrap();
    for bkey in [5, 1, 3, 4, 2] {
        session.bop_insert(b"b", bkey, format!("v{}", bkey).as_bytes(), None).unwrap();
    }

    assert_eq!(session.bop_count(b"b", 2, 4).unwrap(), 3);

    let batch = session.bop_get(b"b", 5, 1, 0, 2).unwrap();
    let bkeys: Vec<i64> = batch.elements.iter().map(|e| e.bkey).collect();
    assert_eq!(bkeys, vec![5, 4]);

    let popped = session.bop_get_delete(b"b", 1, 2, 0, 0, false).unwrap();
    assert_eq!(popped.elements.len(), 2);
    assert_eq!(popped.elements[0].value, Bytes::from("v1"));

    let err = session.bop_delete(b"b", 100, 200, 0, false).unwrap_err();
    assert_eq!(server_status(&err), Some(Status::ElementNotFound));
    assert_eq!(session.bop_delete(b"b", 0, 10, 0, true).unwrap(), Status::DeletedDropped);
}

#[test]
fn test_session_type_mismatch() {
    let mut session = session();
    session.set(b"kv", b"v", 0, 0).unwrap();

    let err = session.bop_insert(b"kv", 1, b"x", create()).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::TypeMismatch);
    assert!(!session.is_broken());
}
