//! Plain key/value operations

use bytes::{Bytes, BytesMut};

use super::{bump, Engine, OpResult, Reject};
use crate::collection::ItemType;
use crate::protocol::payload;
use crate::protocol::{Extras, Opcode, Request, Response, Status};
use crate::store::{resolve_exptime, Item, Value};

/// Incr/decr exptime meaning "do not create a missing counter"
const NO_AUTO_CREATE: u32 = 0xffff_ffff;

fn parse_counter(data: &[u8]) -> Option<u64> {
    std::str::from_utf8(data).ok()?.trim().parse().ok()
}

impl Engine {
    fn check_value_size(&self, len: usize) -> Result<(), Reject> {
        if len > self.config.max_item_size {
            return Err(Reject::new(
                Status::TooLarge,
                format!("Value of {} bytes exceeds {}", len, self.config.max_item_size),
            ));
        }
        Ok(())
    }

    pub(super) fn get(&self, op: Opcode, request: &Request) -> OpResult {
        let now = self.now();
        let mut table = self.table.lock();
        bump(&self.stats.cmd_get);

        let Some(item) = table.get(&request.key, now) else {
            bump(&self.stats.get_misses);
            return Err(Reject::not_found());
        };
        let Value::Kv(data) = &item.value else {
            return Err(Reject::bad_type(ItemType::Kv, item.item_type()));
        };

        bump(&self.stats.get_hits);
        Ok(Response::ok(op)
            .with_extras(payload::encode_flags(item.flags))
            .with_value(data.clone())
            .with_cas(item.cas))
    }

    /// Set, Add and Replace
    pub(super) fn store(&self, op: Opcode, extras: Extras, request: &Request) -> OpResult {
        let Extras::Store { flags, exptime } = extras else {
            return Err(Reject::bad_extras(op));
        };
        self.check_value_size(request.value.len())?;

        let now = self.now();
        let mut table = self.table.lock();
        bump(&self.stats.cmd_set);

        let existing = table
            .get(&request.key, now)
            .map(|item| (item.item_type(), item.cas));
        if let Some((item_type, _)) = existing {
            if item_type != ItemType::Kv {
                return Err(Reject::bad_type(ItemType::Kv, item_type));
            }
        }

        match (op, existing) {
            (Opcode::Add, Some(_)) => {
                return Err(Reject::new(Status::Exists, "Data exists for key"))
            }
            (Opcode::Replace, None) => return Err(Reject::not_found()),
            _ => {}
        }
        if request.cas != 0 {
            match existing {
                None => return Err(Reject::not_found()),
                Some((_, cas)) if cas != request.cas => {
                    return Err(Reject::new(Status::Exists, "CAS mismatch"))
                }
                Some(_) => {}
            }
        }

        let cas = table.next_cas();
        let mut item = Item::new(
            flags,
            resolve_exptime(exptime as i64, now),
            Value::Kv(request.value.clone()),
            now,
        );
        item.stamp(cas, now);
        table.insert(request.key.clone(), item);
        bump(&self.stats.total_items);

        Ok(Response::ok(op).with_cas(cas))
    }

    /// Append and Prepend
    pub(super) fn concat(&self, op: Opcode, request: &Request) -> OpResult {
        let now = self.now();
        let mut table = self.table.lock();
        bump(&self.stats.cmd_set);
        let cas = table.next_cas();

        let Some(item) = table.get_mut(&request.key, now) else {
            return Err(Reject::new(Status::NotStored, "Not stored"));
        };
        let item_type = item.item_type();
        let Value::Kv(data) = &item.value else {
            return Err(Reject::bad_type(ItemType::Kv, item_type));
        };
        if request.cas != 0 && item.cas != request.cas {
            return Err(Reject::new(Status::Exists, "CAS mismatch"));
        }
        self.check_value_size(data.len() + request.value.len())?;

        let mut joined = BytesMut::with_capacity(data.len() + request.value.len());
        if op == Opcode::Prepend {
            joined.extend_from_slice(&request.value);
            joined.extend_from_slice(data);
        } else {
            joined.extend_from_slice(data);
            joined.extend_from_slice(&request.value);
        }
        item.value = Value::Kv(joined.freeze());
        item.stamp(cas, now);

        Ok(Response::ok(op).with_cas(cas))
    }

    /// Delete an item of any type
    pub(super) fn delete(&self, op: Opcode, request: &Request) -> OpResult {
        let now = self.now();
        let mut table = self.table.lock();

        let Some(item) = table.get(&request.key, now) else {
            return Err(Reject::not_found());
        };
        if request.cas != 0 && item.cas != request.cas {
            return Err(Reject::new(Status::Exists, "CAS mismatch"));
        }
        table.remove(&request.key);
        Ok(Response::ok(op))
    }

    /// Increment and Decrement
    ///
    /// Increments wrap at 2^64; decrements stop at 0.
    pub(super) fn arithmetic(&self, op: Opcode, extras: Extras, request: &Request) -> OpResult {
        let Extras::Counter {
            amount,
            initial,
            exptime,
        } = extras
        else {
            return Err(Reject::bad_extras(op));
        };

        let now = self.now();
        let mut table = self.table.lock();
        let cas = table.next_cas();

        if let Some(item) = table.get_mut(&request.key, now) {
            let item_type = item.item_type();
            let Value::Kv(data) = &item.value else {
                return Err(Reject::bad_type(ItemType::Kv, item_type));
            };
            if request.cas != 0 && item.cas != request.cas {
                return Err(Reject::new(Status::Exists, "CAS mismatch"));
            }
            let current = parse_counter(data).ok_or_else(|| {
                Reject::new(Status::NonNumeric, "Cannot increment or decrement non-numeric value")
            })?;
            let next = if op == Opcode::Increment {
                current.wrapping_add(amount)
            } else {
                current.saturating_sub(amount)
            };
            item.value = Value::Kv(Bytes::from(next.to_string()));
            item.stamp(cas, now);
            return Ok(Response::ok(op)
                .with_value(payload::encode_u64(next))
                .with_cas(cas));
        }

        if exptime == NO_AUTO_CREATE {
            return Err(Reject::not_found());
        }
        let mut item = Item::new(
            0,
            resolve_exptime(exptime as i64, now),
            Value::Kv(Bytes::from(initial.to_string())),
            now,
        );
        item.stamp(cas, now);
        table.insert(request.key.clone(), item);
        bump(&self.stats.total_items);

        Ok(Response::ok(op)
            .with_value(payload::encode_u64(initial))
            .with_cas(cas))
    }
}
