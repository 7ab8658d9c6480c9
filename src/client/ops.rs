//! Typed operations on top of [`Session::execute`]

use std::io::{Read, Write};

use bytes::{Bytes, BytesMut};

use super::{GetReply, Reply, Session};
use crate::collection::OverflowAction;
use crate::error::{CacheError, Result};
use crate::protocol::payload::{self, AttributeReport, BtreeBatch, ElementBatch};
use crate::protocol::{CreateAttrs, Extras, Opcode, Request, Status, VbucketState};

/// Upper bound on SASL round trips in one exchange
const MAX_SASL_STEPS: usize = 8;

/// Result of one SASL message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The server accepted the credentials
    Authenticated(Bytes),
    /// The server wants another step; carries its challenge
    Continue(Bytes),
}

fn key_bytes(key: &[u8]) -> Bytes {
    Bytes::copy_from_slice(key)
}

fn ovfl_code(action: Option<OverflowAction>) -> u8 {
    action.map(OverflowAction::code).unwrap_or(0)
}

impl<S: Read + Write> Session<S> {
    fn simple(
        &mut self,
        op: Opcode,
        key: &[u8],
        value: &[u8],
        extras: &Extras,
        cas: u64,
    ) -> Result<Reply> {
        self.execute(op, key_bytes(key), key_bytes(value), extras, cas)
    }

    // =========================================================================
    // Key/value
    // =========================================================================

    pub fn get(&mut self, key: &[u8]) -> Result<GetReply> {
        let reply = self.simple(Opcode::Get, key, &[], &Extras::None, 0)?;
        Ok(GetReply {
            flags: payload::decode_flags(&reply.extras)?,
            cas: reply.cas,
            value: reply.value,
        })
    }

    fn store(
        &mut self,
        op: Opcode,
        key: &[u8],
        value: &[u8],
        flags: u32,
        exptime: u32,
        cas: u64,
    ) -> Result<u64> {
        let extras = Extras::Store { flags, exptime };
        Ok(self.simple(op, key, value, &extras, cas)?.cas)
    }

    /// Store unconditionally; returns the new CAS
    pub fn set(&mut self, key: &[u8], value: &[u8], flags: u32, exptime: u32) -> Result<u64> {
        self.store(Opcode::Set, key, value, flags, exptime, 0)
    }

    /// Store only if the key is absent
    pub fn add(&mut self, key: &[u8], value: &[u8], flags: u32, exptime: u32) -> Result<u64> {
        self.store(Opcode::Add, key, value, flags, exptime, 0)
    }

    /// Store only if the key is present
    pub fn replace(&mut self, key: &[u8], value: &[u8], flags: u32, exptime: u32) -> Result<u64> {
        self.store(Opcode::Replace, key, value, flags, exptime, 0)
    }

    /// Store only if the item's CAS still equals `cas`
    pub fn cas(
        &mut self,
        key: &[u8],
        value: &[u8],
        flags: u32,
        exptime: u32,
        cas: u64,
    ) -> Result<u64> {
        self.store(Opcode::Set, key, value, flags, exptime, cas)
    }

    pub fn append(&mut self, key: &[u8], value: &[u8]) -> Result<u64> {
        Ok(self.simple(Opcode::Append, key, value, &Extras::None, 0)?.cas)
    }

    pub fn prepend(&mut self, key: &[u8], value: &[u8]) -> Result<u64> {
        Ok(self.simple(Opcode::Prepend, key, value, &Extras::None, 0)?.cas)
    }

    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.delete_cas(key, 0)
    }

    pub fn delete_cas(&mut self, key: &[u8], cas: u64) -> Result<()> {
        self.simple(Opcode::Delete, key, &[], &Extras::None, cas)?;
        Ok(())
    }

    fn counter(
        &mut self,
        op: Opcode,
        key: &[u8],
        amount: u64,
        initial: u64,
        exptime: u32,
    ) -> Result<u64> {
        let extras = Extras::Counter {
            amount,
            initial,
            exptime,
        };
        let reply = self.simple(op, key, &[], &extras, 0)?;
        payload::decode_u64(&reply.value)
    }

    /// Increment a counter; `exptime` 0xffffffff disables auto-creation
    pub fn incr(&mut self, key: &[u8], amount: u64, initial: u64, exptime: u32) -> Result<u64> {
        self.counter(Opcode::Increment, key, amount, initial, exptime)
    }

    /// Decrement a counter, stopping at 0
    pub fn decr(&mut self, key: &[u8], amount: u64, initial: u64, exptime: u32) -> Result<u64> {
        self.counter(Opcode::Decrement, key, amount, initial, exptime)
    }

    // =========================================================================
    // Administration
    // =========================================================================

    /// Invalidate all items, after `delay` seconds when non-zero
    pub fn flush(&mut self, delay: u32) -> Result<()> {
        self.simple(Opcode::Flush, &[], &[], &Extras::Flush { delay }, 0)?;
        Ok(())
    }

    pub fn noop(&mut self) -> Result<()> {
        self.simple(Opcode::Noop, &[], &[], &Extras::None, 0)?;
        Ok(())
    }

    pub fn version(&mut self) -> Result<String> {
        let reply = self.simple(Opcode::Version, &[], &[], &Extras::None, 0)?;
        Ok(String::from_utf8_lossy(&reply.value).into_owned())
    }

    /// Ask the server to close the connection after answering
    pub fn quit(&mut self) -> Result<()> {
        self.simple(Opcode::Quit, &[], &[], &Extras::None, 0)?;
        Ok(())
    }

    pub fn set_vbucket_state(&mut self, vbucket: u16, state: VbucketState) -> Result<()> {
        let id = vbucket.to_string();
        self.simple(
            Opcode::SetVbucketState,
            id.as_bytes(),
            state.name().as_bytes(),
            &Extras::None,
            0,
        )?;
        Ok(())
    }

    pub fn get_vbucket_state(&mut self, vbucket: u16) -> Result<VbucketState> {
        let id = vbucket.to_string();
        let reply = self.simple(Opcode::GetVbucketState, id.as_bytes(), &[], &Extras::None, 0)?;
        std::str::from_utf8(&reply.value)
            .map_err(|_| CacheError::Payload("vbucket state is not text".into()))?
            .parse()
            .map_err(CacheError::Payload)
    }

    pub fn delete_vbucket(&mut self, vbucket: u16) -> Result<()> {
        let id = vbucket.to_string();
        self.simple(Opcode::DeleteVbucket, id.as_bytes(), &[], &Extras::None, 0)?;
        Ok(())
    }

    // =========================================================================
    // SASL
    // =========================================================================

    pub fn sasl_mechanisms(&mut self) -> Result<Vec<String>> {
        let reply = self.simple(Opcode::SaslListMechs, &[], &[], &Extras::None, 0)?;
        Ok(String::from_utf8_lossy(&reply.value)
            .split_whitespace()
            .map(str::to_string)
            .collect())
    }

    fn sasl_message(&mut self, op: Opcode, mechanism: &str, data: &[u8]) -> Result<AuthOutcome> {
        let request = Request::new(op)
            .with_key(key_bytes(mechanism.as_bytes()))
            .with_value(key_bytes(data));
        let response = self.round_trip(request)?;
        match response.status {
            Status::AuthContinue => Ok(AuthOutcome::Continue(response.value)),
            status if status.is_success() => Ok(AuthOutcome::Authenticated(response.value)),
            status => Err(CacheError::server(status, &response.value)),
        }
    }

    /// Begin an exchange with the mechanism's initial response
    pub fn sasl_auth_start(&mut self, mechanism: &str, initial: &[u8]) -> Result<AuthOutcome> {
        self.sasl_message(Opcode::SaslAuth, mechanism, initial)
    }

    /// Answer a challenge from [`AuthOutcome::Continue`]
    pub fn sasl_auth_step(&mut self, mechanism: &str, response: &[u8]) -> Result<AuthOutcome> {
        self.sasl_message(Opcode::SaslStep, mechanism, response)
    }

    /// Run a complete exchange; `respond` turns each challenge into the next message
    pub fn sasl_auth_exchange<F>(
        &mut self,
        mechanism: &str,
        initial: &[u8],
        mut respond: F,
    ) -> Result<Bytes>
    where
        F: FnMut(&[u8]) -> Result<Vec<u8>>,
    {
        let mut outcome = self.sasl_auth_start(mechanism, initial)?;
        for _ in 0..MAX_SASL_STEPS {
            match outcome {
                AuthOutcome::Authenticated(data) => return Ok(data),
                AuthOutcome::Continue(challenge) => {
                    let answer = respond(&challenge)?;
                    outcome = self.sasl_auth_step(mechanism, &answer)?;
                }
            }
        }
        match outcome {
            AuthOutcome::Authenticated(data) => Ok(data),
            AuthOutcome::Continue(_) => Err(CacheError::Payload(format!(
                "SASL exchange still incomplete after {} steps",
                MAX_SASL_STEPS
            ))),
        }
    }

    /// PLAIN authentication: `NUL user NUL password`
    pub fn sasl_auth_plain(&mut self, user: &str, password: &str) -> Result<()> {
        let mut message = BytesMut::with_capacity(user.len() + password.len() + 2);
        message.extend_from_slice(b"\0");
        message.extend_from_slice(user.as_bytes());
        message.extend_from_slice(b"\0");
        message.extend_from_slice(password.as_bytes());
        let message = message.freeze();

        let answer = message.to_vec();
        self.sasl_auth_exchange("PLAIN", &message, move |_| Ok(answer.clone()))?;
        Ok(())
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    pub fn get_attr(&mut self, key: &[u8]) -> Result<AttributeReport> {
        let reply = self.simple(Opcode::GetAttr, key, &[], &Extras::None, 0)?;
        AttributeReport::decode(&reply.value)
    }

    /// Change attributes; `None` leaves a field unchanged
    pub fn set_attr(
        &mut self,
        key: &[u8],
        exptime: Option<i32>,
        maxcount: Option<i32>,
        maxbkeyrange: Option<i64>,
        overflow_action: Option<OverflowAction>,
    ) -> Result<()> {
        let extras = Extras::SetAttr {
            exptime,
            maxcount,
            maxbkeyrange,
            ovflaction: ovfl_code(overflow_action),
        };
        self.simple(Opcode::SetAttr, key, &[], &extras, 0)?;
        Ok(())
    }

    // =========================================================================
    // Lists
    // =========================================================================

    pub fn lop_create(
        &mut self,
        key: &[u8],
        attrs: CreateAttrs,
        overflow_action: Option<OverflowAction>,
    ) -> Result<u64> {
        let extras = Extras::Create {
            attrs,
            ovflaction: ovfl_code(overflow_action),
        };
        Ok(self.simple(Opcode::LopCreate, key, &[], &extras, 0)?.cas)
    }

    /// Insert at `index`; `create` supplies attributes for an implicit create
    ///
    /// Returns `CreatedStored` when the list was created by this call.
    pub fn lop_insert(
        &mut self,
        key: &[u8],
        index: i32,
        value: &[u8],
        create: Option<CreateAttrs>,
    ) -> Result<Status> {
        let extras = Extras::LopInsert {
            index,
            attrs: create.unwrap_or_default(),
            create: create.is_some(),
        };
        Ok(self.simple(Opcode::LopInsert, key, value, &extras, 0)?.status)
    }

    /// Returns `DeletedDropped` when the emptied list was removed
    pub fn lop_delete(
        &mut self,
        key: &[u8],
        from: i32,
        to: i32,
        drop_if_empty: bool,
    ) -> Result<Status> {
        let extras = Extras::LopDelete {
            from,
            to,
            drop_if_empty,
        };
        Ok(self.simple(Opcode::LopDelete, key, &[], &extras, 0)?.status)
    }

    pub fn lop_get(&mut self, key: &[u8], from: i32, to: i32) -> Result<ElementBatch> {
        self.lop_fetch(key, from, to, false, false)
    }

    /// Read and remove the elements in `from..=to`
    pub fn lop_get_delete(
        &mut self,
        key: &[u8],
        from: i32,
        to: i32,
        drop_if_empty: bool,
    ) -> Result<ElementBatch> {
        self.lop_fetch(key, from, to, true, drop_if_empty)
    }

    fn lop_fetch(
        &mut self,
        key: &[u8],
        from: i32,
        to: i32,
        delete: bool,
        drop_if_empty: bool,
    ) -> Result<ElementBatch> {
        let extras = Extras::LopGet {
            from,
            to,
            delete,
            drop_if_empty,
        };
        let reply = self.simple(Opcode::LopGet, key, &[], &extras, 0)?;
        ElementBatch::decode(&reply.extras, &reply.value)
    }

    // =========================================================================
    // Sets
    // =========================================================================

    pub fn sop_create(&mut self, key: &[u8], attrs: CreateAttrs) -> Result<u64> {
        let extras = Extras::SopCreate { attrs };
        Ok(self.simple(Opcode::SopCreate, key, &[], &extras, 0)?.cas)
    }

    pub fn sop_insert(
        &mut self,
        key: &[u8],
        value: &[u8],
        create: Option<CreateAttrs>,
    ) -> Result<Status> {
        let extras = Extras::SopInsert {
            attrs: create.unwrap_or_default(),
            create: create.is_some(),
        };
        Ok(self.simple(Opcode::SopInsert, key, value, &extras, 0)?.status)
    }

    pub fn sop_delete(&mut self, key: &[u8], value: &[u8], drop_if_empty: bool) -> Result<Status> {
        let extras = Extras::SopDelete { drop_if_empty };
        Ok(self.simple(Opcode::SopDelete, key, value, &extras, 0)?.status)
    }

    pub fn sop_exist(&mut self, key: &[u8], value: &[u8]) -> Result<bool> {
        let reply = self.simple(Opcode::SopExist, key, value, &Extras::None, 0)?;
        Ok(payload::decode_u32(&reply.value)? != 0)
    }

    /// Up to `count` elements (0 = all) in unspecified order
    pub fn sop_get(&mut self, key: &[u8], count: u32) -> Result<ElementBatch> {
        self.sop_fetch(key, count, false, false)
    }

    pub fn sop_get_delete(
        &mut self,
        key: &[u8],
        count: u32,
        drop_if_empty: bool,
    ) -> Result<ElementBatch> {
        self.sop_fetch(key, count, true, drop_if_empty)
    }

    fn sop_fetch(
        &mut self,
        key: &[u8],
        count: u32,
        delete: bool,
        drop_if_empty: bool,
    ) -> Result<ElementBatch> {
        let extras = Extras::SopGet {
            count,
            delete,
            drop_if_empty,
        };
        let reply = self.simple(Opcode::SopGet, key, &[], &extras, 0)?;
        ElementBatch::decode(&reply.extras, &reply.value)
    }

    // =========================================================================
    // B-trees
    // =========================================================================

    pub fn bop_create(
        &mut self,
        key: &[u8],
        attrs: CreateAttrs,
        overflow_action: Option<OverflowAction>,
    ) -> Result<u64> {
        let extras = Extras::Create {
            attrs,
            ovflaction: ovfl_code(overflow_action),
        };
        Ok(self.simple(Opcode::BopCreate, key, &[], &extras, 0)?.cas)
    }

    pub fn bop_insert(
        &mut self,
        key: &[u8],
        bkey: i64,
        value: &[u8],
        create: Option<CreateAttrs>,
    ) -> Result<Status> {
        let extras = Extras::BopInsert {
            bkey,
            attrs: create.unwrap_or_default(),
            create: create.is_some(),
        };
        Ok(self.simple(Opcode::BopInsert, key, value, &extras, 0)?.status)
    }

    /// Delete up to `count` elements (0 = all) with bkeys between `from` and `to`
    pub fn bop_delete(
        &mut self,
        key: &[u8],
        from: i64,
        to: i64,
        count: u32,
        drop_if_empty: bool,
    ) -> Result<Status> {
        let extras = Extras::BopDelete {
            from,
            to,
            count,
            drop_if_empty,
        };
        Ok(self.simple(Opcode::BopDelete, key, &[], &extras, 0)?.status)
    }

    /// Elements between `from` and `to`, descending when `from > to`
    pub fn bop_get(
        &mut self,
        key: &[u8],
        from: i64,
        to: i64,
        offset: u32,
        count: u32,
    ) -> Result<BtreeBatch> {
        self.bop_fetch(key, (from, to), offset, count, false, false)
    }

    pub fn bop_get_delete(
        &mut self,
        key: &[u8],
        from: i64,
        to: i64,
        offset: u32,
        count: u32,
        drop_if_empty: bool,
    ) -> Result<BtreeBatch> {
        self.bop_fetch(key, (from, to), offset, count, true, drop_if_empty)
    }

    fn bop_fetch(
        &mut self,
        key: &[u8],
        (from, to): (i64, i64),
        offset: u32,
        count: u32,
        delete: bool,
        drop_if_empty: bool,
    ) -> Result<BtreeBatch> {
        let extras = Extras::BopGet {
            from,
            to,
            offset,
            count,
            delete,
            drop_if_empty,
        };
        let reply = self.simple(Opcode::BopGet, key, &[], &extras, 0)?;
        BtreeBatch::decode(&reply.extras, &reply.value)
    }

    pub fn bop_count(&mut self, key: &[u8], from: i64, to: i64) -> Result<u32> {
        let reply = self.simple(Opcode::BopCount, key, &[], &Extras::BopCount { from, to }, 0)?;
        let (_flags, count) = payload::decode_flags_count(&reply.extras)?;
        Ok(count)
    }
}
