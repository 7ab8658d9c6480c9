//! Collection and attribute operations

use bytes::Bytes;

use super::{bump, Engine, OpResult, Reject};
use crate::clock::Tick;
use crate::collection::{
    AttrUpdate, BtreeCollection, CollectionAttrs, ItemType, ListCollection, SetCollection,
};
use crate::protocol::payload::{self, AttributeReport, BtreeBatch, BtreeElement, ElementBatch};
use crate::protocol::{CreateAttrs, Extras, Opcode, Request, Response, Status, MAX_BODY_SIZE};
use crate::store::{resolve_exptime, Item, ItemTable, Value};

/// Look up a live item that must be of `expected` type
fn typed_item<'t>(
    table: &'t mut ItemTable,
    key: &[u8],
    now: Tick,
    expected: ItemType,
) -> Result<Option<&'t mut Item>, Reject> {
    match table.get_mut(key, now) {
        None => Ok(None),
        Some(item) if item.item_type() != expected => {
            Err(Reject::bad_type(expected, item.item_type()))
        }
        Some(item) => Ok(Some(item)),
    }
}

fn required_item<'t>(
    table: &'t mut ItemTable,
    key: &[u8],
    now: Tick,
    expected: ItemType,
) -> Result<&'t mut Item, Reject> {
    typed_item(table, key, now, expected)?.ok_or_else(Reject::not_found)
}

fn list_of(value: &mut Value) -> Result<&mut ListCollection, Reject> {
    let actual = value.item_type();
    value
        .as_list_mut()
        .ok_or_else(|| Reject::bad_type(ItemType::List, actual))
}

fn set_of(value: &mut Value) -> Result<&mut SetCollection, Reject> {
    let actual = value.item_type();
    value
        .as_set_mut()
        .ok_or_else(|| Reject::bad_type(ItemType::Set, actual))
}

fn btree_of(value: &mut Value) -> Result<&mut BtreeCollection, Reject> {
    let actual = value.item_type();
    value
        .as_btree_mut()
        .ok_or_else(|| Reject::bad_type(ItemType::Btree, actual))
}

/// Reject a read whose response would not fit in one frame
///
/// Runs before a read-with-delete removes anything, so an oversized read
/// leaves the collection untouched.
fn check_body(extras: &Bytes, value: &Bytes) -> Result<(), Reject> {
    let len = extras.len() + value.len();
    if len > MAX_BODY_SIZE as usize {
        return Err(Reject::new(
            Status::TooLarge,
            format!("Response of {} bytes exceeds the {} byte frame limit", len, MAX_BODY_SIZE),
        ));
    }
    Ok(())
}

/// Status of a removal that may have dropped the emptied collection
fn drop_status(dropped: bool) -> Status {
    if dropped {
        Status::DeletedDropped
    } else {
        Status::Success
    }
}

impl Engine {
    fn check_element_size(&self, len: usize) -> Result<(), Reject> {
        if len > self.config.max_item_size {
            return Err(Reject::new(
                Status::TooLarge,
                format!("Element of {} bytes exceeds {}", len, self.config.max_item_size),
            ));
        }
        Ok(())
    }

    fn new_collection(&self, item_type: ItemType, attrs: CollectionAttrs) -> Value {
        match item_type {
            ItemType::List => Value::List(ListCollection::new(attrs)),
            ItemType::Set => Value::Set(SetCollection::new(attrs)),
            _ => Value::Btree(BtreeCollection::new(attrs)),
        }
    }

    /// Store a newly created collection under `key`
    fn store_created(
        &self,
        table: &mut ItemTable,
        key: &Bytes,
        create: &CreateAttrs,
        value: Value,
        now: Tick,
    ) -> u64 {
        let item_type = value.item_type();
        let cas = table.next_cas();
        let mut item = Item::new(
            create.flags,
            resolve_exptime(create.exptime as i64, now),
            value,
            now,
        );
        item.stamp(cas, now);
        table.insert(key.clone(), item);
        bump(&self.stats.total_items);
        tracing::debug!("Created {} {}", item_type, String::from_utf8_lossy(key));
        cas
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    pub(super) fn get_attr(&self, op: Opcode, request: &Request) -> OpResult {
        let now = self.now();
        let mut table = self.table.lock();
        bump(&self.stats.attr_cmds);

        let item = table.get(&request.key, now).ok_or_else(Reject::not_found)?;
        let attrs = item.value.attrs();
        let report = AttributeReport {
            flags: item.flags,
            exptime: item.remaining_secs(now),
            count: item.value.count() as u32,
            maxcount: attrs.map(|a| a.max_count).unwrap_or(0),
            maxbkeyrange: attrs.map(|a| a.max_bkey_range).unwrap_or(0),
            item_type: item.item_type(),
            overflow_action: attrs.map(|a| a.overflow_action),
        };
        Ok(Response::ok(op).with_value(report.encode()).with_cas(item.cas))
    }

    pub(super) fn set_attr(&self, op: Opcode, extras: Extras, request: &Request) -> OpResult {
        let Extras::SetAttr {
            exptime,
            maxcount,
            maxbkeyrange,
            ovflaction,
        } = extras
        else {
            return Err(Reject::bad_extras(op));
        };
        let update = AttrUpdate {
            exptime,
            max_count: maxcount,
            max_bkey_range: maxbkeyrange,
            overflow_action: ovflaction,
        };

        let now = self.now();
        let mut table = self.table.lock();
        bump(&self.stats.attr_cmds);

        let item = table
            .get_mut(&request.key, now)
            .ok_or_else(Reject::not_found)?;
        let item_type = item.item_type();
        let count = item.value.count();

        update.check_item_type(item_type)?;
        if let Some(attrs) = item.value.attrs_mut() {
            attrs.apply(item_type, count, &update, &self.limits)?;
        }
        if let Some(exptime) = update.exptime {
            item.expires_at = resolve_exptime(exptime as i64, now);
        }
        Ok(Response::ok(op))
    }

    // =========================================================================
    // Explicit creation
    // =========================================================================

    /// LopCreate, SopCreate and BopCreate
    pub(super) fn create(&self, op: Opcode, extras: Extras, request: &Request) -> OpResult {
        let (item_type, create, ovflaction) = match (op, extras) {
            (Opcode::LopCreate, Extras::Create { attrs, ovflaction }) => {
                (ItemType::List, attrs, ovflaction)
            }
            (Opcode::BopCreate, Extras::Create { attrs, ovflaction }) => {
                (ItemType::Btree, attrs, ovflaction)
            }
            (Opcode::SopCreate, Extras::SopCreate { attrs }) => (ItemType::Set, attrs, 0),
            _ => return Err(Reject::bad_extras(op)),
        };
        self.count_collection_cmd(item_type);
        let attrs = CollectionAttrs::new(item_type, create.maxcount, ovflaction, &self.limits)?;

        let now = self.now();
        let mut table = self.table.lock();
        if table.contains(&request.key, now) {
            return Err(Reject::new(Status::Exists, "Key already exists"));
        }
        let value = self.new_collection(item_type, attrs);
        let cas = self.store_created(&mut table, &request.key, &create, value, now);
        Ok(Response::ok(op).with_cas(cas))
    }

    fn count_collection_cmd(&self, item_type: ItemType) {
        match item_type {
            ItemType::List => bump(&self.stats.lop_cmds),
            ItemType::Set => bump(&self.stats.sop_cmds),
            ItemType::Btree => bump(&self.stats.bop_cmds),
            ItemType::Kv => {}
        }
    }

    // =========================================================================
    // Lists
    // =========================================================================

    pub(super) fn lop_insert(&self, op: Opcode, extras: Extras, request: &Request) -> OpResult {
        let Extras::LopInsert {
            index,
            attrs: create,
            create: auto_create,
        } = extras
        else {
            return Err(Reject::bad_extras(op));
        };
        bump(&self.stats.lop_cmds);
        self.check_element_size(request.value.len())?;

        let now = self.now();
        let mut table = self.table.lock();
        let cas = table.next_cas();

        match typed_item(&mut table, &request.key, now, ItemType::List)? {
            Some(item) => {
                let list = list_of(&mut item.value)?;
                list.insert(index, request.value.clone())?;
                item.stamp(cas, now);
                Ok(Response::ok(op).with_cas(cas))
            }
            None if !auto_create => Err(Reject::not_found()),
            None => {
                let attrs = CollectionAttrs::new(ItemType::List, create.maxcount, 0, &self.limits)?;
                let mut list = ListCollection::new(attrs);
                list.insert(index, request.value.clone())?;
                let cas =
                    self.store_created(&mut table, &request.key, &create, Value::List(list), now);
                Ok(Response::new(op.code(), Status::CreatedStored).with_cas(cas))
            }
        }
    }

    pub(super) fn lop_delete(&self, op: Opcode, extras: Extras, request: &Request) -> OpResult {
        let Extras::LopDelete {
            from,
            to,
            drop_if_empty,
        } = extras
        else {
            return Err(Reject::bad_extras(op));
        };
        bump(&self.stats.lop_cmds);

        let now = self.now();
        let mut table = self.table.lock();
        let cas = table.next_cas();

        let item = required_item(&mut table, &request.key, now, ItemType::List)?;
        let list = list_of(&mut item.value)?;
        list.delete(from, to)?;
        let dropped = drop_if_empty && list.is_empty();
        item.stamp(cas, now);

        if dropped {
            table.remove(&request.key);
        }
        Ok(Response::new(op.code(), drop_status(dropped)))
    }

    pub(super) fn lop_get(&self, op: Opcode, extras: Extras, request: &Request) -> OpResult {
        let Extras::LopGet {
            from,
            to,
            delete,
            drop_if_empty,
        } = extras
        else {
            return Err(Reject::bad_extras(op));
        };
        bump(&self.stats.lop_cmds);

        let now = self.now();
        let mut table = self.table.lock();
        let cas = table.next_cas();

        let item = required_item(&mut table, &request.key, now, ItemType::List)?;
        let flags = item.flags;
        let list = list_of(&mut item.value)?;
        let batch = ElementBatch {
            flags,
            values: list.get(from, to, false)?,
        };
        let (body_extras, body_value) = (batch.encode_extras(), batch.encode_value());
        check_body(&body_extras, &body_value)?;

        if delete {
            list.get(from, to, true)?;
        }
        let dropped = delete && drop_if_empty && list.is_empty();
        if delete {
            item.stamp(cas, now);
        }

        if dropped {
            table.remove(&request.key);
        }
        Ok(Response::new(op.code(), drop_status(dropped))
            .with_extras(body_extras)
            .with_value(body_value))
    }

    // =========================================================================
    // Sets
    // =========================================================================

    pub(super) fn sop_insert(&self, op: Opcode, extras: Extras, request: &Request) -> OpResult {
        let Extras::SopInsert {
            attrs: create,
            create: auto_create,
        } = extras
        else {
            return Err(Reject::bad_extras(op));
        };
        bump(&self.stats.sop_cmds);
        self.check_element_size(request.value.len())?;

        let now = self.now();
        let mut table = self.table.lock();
        let cas = table.next_cas();

        match typed_item(&mut table, &request.key, now, ItemType::Set)? {
            Some(item) => {
                let set = set_of(&mut item.value)?;
                set.insert(request.value.clone())?;
                item.stamp(cas, now);
                Ok(Response::ok(op).with_cas(cas))
            }
            None if !auto_create => Err(Reject::not_found()),
            None => {
                let attrs = CollectionAttrs::new(ItemType::Set, create.maxcount, 0, &self.limits)?;
                let mut set = SetCollection::new(attrs);
                set.insert(request.value.clone())?;
                let cas =
                    self.store_created(&mut table, &request.key, &create, Value::Set(set), now);
                Ok(Response::new(op.code(), Status::CreatedStored).with_cas(cas))
            }
        }
    }

    pub(super) fn sop_delete(&self, op: Opcode, extras: Extras, request: &Request) -> OpResult {
        let Extras::SopDelete { drop_if_empty } = extras else {
            return Err(Reject::bad_extras(op));
        };
        bump(&self.stats.sop_cmds);

        let now = self.now();
        let mut table = self.table.lock();
        let cas = table.next_cas();

        let item = required_item(&mut table, &request.key, now, ItemType::Set)?;
        let set = set_of(&mut item.value)?;
        set.delete(&request.value)?;
        let dropped = drop_if_empty && set.is_empty();
        item.stamp(cas, now);

        if dropped {
            table.remove(&request.key);
        }
        Ok(Response::new(op.code(), drop_status(dropped)))
    }

    pub(super) fn sop_exist(&self, op: Opcode, request: &Request) -> OpResult {
        bump(&self.stats.sop_cmds);
        let now = self.now();
        let mut table = self.table.lock();

        let item = required_item(&mut table, &request.key, now, ItemType::Set)?;
        let set = set_of(&mut item.value)?;
        let present = set.exists(&request.value);
        Ok(Response::ok(op).with_value(payload::encode_u32(present as u32)))
    }

    pub(super) fn sop_get(&self, op: Opcode, extras: Extras, request: &Request) -> OpResult {
        let Extras::SopGet {
            count,
            delete,
            drop_if_empty,
        } = extras
        else {
            return Err(Reject::bad_extras(op));
        };
        bump(&self.stats.sop_cmds);

        let now = self.now();
        let mut table = self.table.lock();
        let cas = table.next_cas();

        let item = required_item(&mut table, &request.key, now, ItemType::Set)?;
        let flags = item.flags;
        let set = set_of(&mut item.value)?;
        let batch = ElementBatch {
            flags,
            values: set.get(count, false)?,
        };
        let (body_extras, body_value) = (batch.encode_extras(), batch.encode_value());
        check_body(&body_extras, &body_value)?;

        if delete {
            set.get(count, true)?;
        }
        let dropped = delete && drop_if_empty && set.is_empty();
        if delete {
            item.stamp(cas, now);
        }

        if dropped {
            table.remove(&request.key);
        }
        Ok(Response::new(op.code(), drop_status(dropped))
            .with_extras(body_extras)
            .with_value(body_value))
    }

    // =========================================================================
    // B-trees
    // =========================================================================

    pub(super) fn bop_insert(&self, op: Opcode, extras: Extras, request: &Request) -> OpResult {
        let Extras::BopInsert {
            bkey,
            attrs: create,
            create: auto_create,
        } = extras
        else {
            return Err(Reject::bad_extras(op));
        };
        bump(&self.stats.bop_cmds);
        self.check_element_size(request.value.len())?;

        let now = self.now();
        let mut table = self.table.lock();
        let cas = table.next_cas();

        match typed_item(&mut table, &request.key, now, ItemType::Btree)? {
            Some(item) => {
                let tree = btree_of(&mut item.value)?;
                let trimmed = tree.insert(bkey, request.value.clone())?;
                if !trimmed.is_empty() {
                    tracing::trace!("Trimmed bkeys {:?}", trimmed);
                }
                item.stamp(cas, now);
                Ok(Response::ok(op).with_cas(cas))
            }
            None if !auto_create => Err(Reject::not_found()),
            None => {
                let attrs =
                    CollectionAttrs::new(ItemType::Btree, create.maxcount, 0, &self.limits)?;
                let mut tree = BtreeCollection::new(attrs);
                tree.insert(bkey, request.value.clone())?;
                let cas =
                    self.store_created(&mut table, &request.key, &create, Value::Btree(tree), now);
                Ok(Response::new(op.code(), Status::CreatedStored).with_cas(cas))
            }
        }
    }

    pub(super) fn bop_delete(&self, op: Opcode, extras: Extras, request: &Request) -> OpResult {
        let Extras::BopDelete {
            from,
            to,
            count,
            drop_if_empty,
        } = extras
        else {
            return Err(Reject::bad_extras(op));
        };
        bump(&self.stats.bop_cmds);

        let now = self.now();
        let mut table = self.table.lock();
        let cas = table.next_cas();

        let item = required_item(&mut table, &request.key, now, ItemType::Btree)?;
        let tree = btree_of(&mut item.value)?;
        tree.delete(from, to, count)?;
        let dropped = drop_if_empty && tree.is_empty();
        item.stamp(cas, now);

        if dropped {
            table.remove(&request.key);
        }
        Ok(Response::new(op.code(), drop_status(dropped)))
    }

    pub(super) fn bop_get(&self, op: Opcode, extras: Extras, request: &Request) -> OpResult {
        let Extras::BopGet {
            from,
            to,
            offset,
            count,
            delete,
            drop_if_empty,
        } = extras
        else {
            return Err(Reject::bad_extras(op));
        };
        bump(&self.stats.bop_cmds);

        let now = self.now();
        let mut table = self.table.lock();
        let cas = table.next_cas();

        let item = required_item(&mut table, &request.key, now, ItemType::Btree)?;
        let flags = item.flags;
        let tree = btree_of(&mut item.value)?;
        let batch = BtreeBatch {
            flags,
            elements: tree
                .get(from, to, offset, count, false)?
                .into_iter()
                .map(|(bkey, value)| BtreeElement { bkey, value })
                .collect(),
        };
        let (body_extras, body_value) = (batch.encode_extras(), batch.encode_value());
        check_body(&body_extras, &body_value)?;

        if delete {
            tree.get(from, to, offset, count, true)?;
        }
        let dropped = delete && drop_if_empty && tree.is_empty();
        if delete {
            item.stamp(cas, now);
        }

        if dropped {
            table.remove(&request.key);
        }
        Ok(Response::new(op.code(), drop_status(dropped))
            .with_extras(body_extras)
            .with_value(body_value))
    }

    pub(super) fn bop_count(&self, op: Opcode, extras: Extras, request: &Request) -> OpResult {
        let Extras::BopCount { from, to } = extras else {
            return Err(Reject::bad_extras(op));
        };
        bump(&self.stats.bop_cmds);

        let now = self.now();
        let mut table = self.table.lock();

        let item = required_item(&mut table, &request.key, now, ItemType::Btree)?;
        let flags = item.flags;
        let tree = btree_of(&mut item.value)?;
        let count = tree.count(from, to);
        Ok(Response::ok(op).with_extras(payload::encode_flags_count(flags, count as u32)))
    }
}
