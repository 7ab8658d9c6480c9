//! Blocking request/response session over a byte stream

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

use bytes::Bytes;

use crate::error::{CacheError, Result};
use crate::protocol::payload;
use crate::protocol::{read_response, write_request, Extras, Opcode, Request, Response, Status};

/// A successful response as seen by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub opaque: u32,
    pub cas: u64,
    pub status: Status,
    pub extras: Bytes,
    pub key: Bytes,
    pub value: Bytes,
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Self {
            opaque: response.opaque,
            cas: response.cas,
            status: response.status,
            extras: response.extras,
            key: response.key,
            value: response.value,
        }
    }
}

/// A value fetched by Get or a multi-get
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetReply {
    pub flags: u32,
    pub cas: u64,
    pub value: Bytes,
}

impl GetReply {
    fn from_response(response: &Response) -> Result<Self> {
        Ok(Self {
            flags: payload::decode_flags(&response.extras)?,
            cas: response.cas,
            value: response.value.clone(),
        })
    }
}

/// Map a response status to `Ok` or a server error
fn check_status(response: Response) -> Result<Response> {
    if response.status.is_success() {
        Ok(response)
    } else {
        Err(CacheError::server(response.status, &response.value))
    }
}

/// One connection to a server
///
/// Every call writes its request frame(s) and reads the matching response
/// frame(s) before returning. A framing failure leaves the stream at an
/// unknown position, so the session refuses further calls once one has
/// happened.
pub struct Session<S> {
    stream: S,
    vbucket: u16,
    broken: bool,
}

impl Session<TcpStream> {
    /// Connect over TCP with Nagle's algorithm disabled
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream))
    }
}

impl<S: Read + Write> Session<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            vbucket: 0,
            broken: false,
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Whether an earlier framing failure has made the session unusable
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    pub fn vbucket_id(&self) -> u16 {
        self.vbucket
    }

    /// Partition id written into every subsequent request header
    pub fn set_vbucket_id(&mut self, vbucket: u16) {
        self.vbucket = vbucket;
    }

    // =========================================================================
    // Frame I/O
    // =========================================================================

    fn ensure_usable(&self) -> Result<()> {
        if self.broken {
            return Err(CacheError::SessionBroken);
        }
        Ok(())
    }

    /// Remember transport failures; server statuses leave the session intact
    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.status().is_none() {
                self.broken = true;
            }
        }
        result
    }

    fn send(&mut self, request: Request) -> Result<()> {
        let request = request.with_vbucket(self.vbucket);
        let result = write_request(&mut self.stream, &request);
        self.track(result)
    }

    fn receive(&mut self) -> Result<Response> {
        let result = read_response(&mut self.stream);
        self.track(result)
    }

    fn opaque_mismatch(&mut self, expected: u32, actual: u32) -> CacheError {
        self.broken = true;
        CacheError::OpaqueMismatch { expected, actual }
    }

    /// Send one request and read its response without interpreting the status
    pub fn round_trip(&mut self, request: Request) -> Result<Response> {
        self.ensure_usable()?;
        let opaque: u32 = rand::random();
        self.send(request.with_opaque(opaque))?;

        let response = self.receive()?;
        if response.opaque != opaque {
            return Err(self.opaque_mismatch(opaque, response.opaque));
        }
        Ok(response)
    }

    /// Execute a single command
    ///
    /// Statuses other than Success, CreatedStored and DeletedDropped come
    /// back as [`CacheError::Server`].
    pub fn execute(
        &mut self,
        opcode: Opcode,
        key: impl Into<Bytes>,
        value: impl Into<Bytes>,
        extras: &Extras,
        cas: u64,
    ) -> Result<Reply> {
        let request = Request::new(opcode)
            .with_key(key)
            .with_value(value)
            .with_extras(extras)
            .with_cas(cas);
        self.round_trip(request)
            .and_then(check_status)
            .map(Reply::from)
    }

    // =========================================================================
    // Multi-frame exchanges
    // =========================================================================

    /// Fetch several keys in one pipelined batch
    ///
    /// Sends a quiet Get per key (opaque = position in `keys`) followed by a
    /// Noop whose opaque is `keys.len()`. Misses produce no frame. The
    /// batch is always drained up to the Noop; the first error seen for
    /// any key is returned afterwards.
    pub fn multi_get<K: AsRef<[u8]>>(&mut self, keys: &[K]) -> Result<HashMap<Bytes, GetReply>> {
        self.ensure_usable()?;
        let sentinel = keys.len() as u32;

        for (ordinal, key) in keys.iter().enumerate() {
            let request = Request::new(Opcode::GetQ)
                .with_key(Bytes::copy_from_slice(key.as_ref()))
                .with_opaque(ordinal as u32);
            self.send(request)?;
        }
        self.send(Request::new(Opcode::Noop).with_opaque(sentinel))?;

        let mut hits = HashMap::new();
        let mut first_error = None;
        loop {
            let response = self.receive()?;
            if response.opaque == sentinel {
                break;
            }
            let Some(key) = keys.get(response.opaque as usize) else {
                return Err(self.opaque_mismatch(sentinel, response.opaque));
            };
            match response.status {
                status if status.is_success() => match GetReply::from_response(&response) {
                    Ok(reply) => {
                        hits.insert(Bytes::copy_from_slice(key.as_ref()), reply);
                    }
                    Err(e) => {
                        first_error.get_or_insert(e);
                    }
                },
                Status::NotFound => {}
                status => {
                    first_error.get_or_insert(CacheError::server(status, &response.value));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(hits),
        }
    }

    /// Query a stats group ("" for the general group)
    ///
    /// The server streams one keyed frame per statistic and ends with a
    /// frame whose key is empty.
    pub fn stats(&mut self, group: &str) -> Result<HashMap<String, String>> {
        self.ensure_usable()?;
        let opaque: u32 = rand::random();
        let request = Request::new(Opcode::Stat)
            .with_key(Bytes::copy_from_slice(group.as_bytes()))
            .with_opaque(opaque);
        self.send(request)?;

        let mut stats = HashMap::new();
        loop {
            let response = self.receive()?;
            if response.opaque != opaque {
                return Err(self.opaque_mismatch(opaque, response.opaque));
            }
            let response = check_status(response)?;
            if response.key.is_empty() {
                return Ok(stats);
            }
            stats.insert(
                String::from_utf8_lossy(&response.key).into_owned(),
                String::from_utf8_lossy(&response.value).into_owned(),
            );
        }
    }
}
