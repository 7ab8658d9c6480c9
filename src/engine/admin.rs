//! Administrative operations: flush, stats, SASL and vbuckets

use super::{bump, ConnState, Engine, EngineStats, OpResult, Reject};
use crate::collection::ItemType;
use crate::protocol::{Extras, Opcode, Request, Response, Status, VbucketState};
use crate::store::resolve_exptime;

/// Mechanisms offered by SaslListMechs
pub const SASL_MECHANISMS: &str = "PLAIN";

impl Engine {
    // =========================================================================
    // Flush
    // =========================================================================

    /// Invalidate every item, now or once the delay elapses
    pub(super) fn flush(&self, op: Opcode, extras: Extras) -> OpResult {
        let Extras::Flush { delay } = extras else {
            return Err(Reject::bad_extras(op));
        };
        let now = self.now();
        let deadline = resolve_exptime(delay as i64, now);
        bump(&self.stats.cmd_flush);

        let mut table = self.table.lock();
        tracing::debug!("Flush requested (deadline {:?})", deadline);
        table.flush(deadline, now);
        Ok(Response::ok(op))
    }

    // =========================================================================
    // Stats
    // =========================================================================

    /// One response per statistic, then a terminator with an empty key
    pub(super) fn stat(&self, op: Opcode, request: &Request) -> Result<Vec<Response>, Reject> {
        let group = String::from_utf8_lossy(&request.key);
        let entries = match group.as_ref() {
            "" => self.general_stats(),
            "settings" => self.settings_stats(),
            "collections" => self.collection_stats(),
            other => {
                return Err(Reject::new(
                    Status::NotFound,
                    format!("Unknown stat group {:?}", other),
                ))
            }
        };

        let mut responses: Vec<Response> = entries
            .into_iter()
            .map(|(name, value)| Response::ok(op).with_key(name).with_value(value))
            .collect();
        responses.push(Response::ok(op));
        Ok(responses)
    }

    fn general_stats(&self) -> Vec<(String, String)> {
        let now = self.now();
        let s = &self.stats;
        let counter = |name: &str, c| (name.to_string(), EngineStats::get(c).to_string());
        vec![
            ("pid".to_string(), std::process::id().to_string()),
            (
                "uptime".to_string(),
                (now.as_secs().saturating_sub(self.started_at.as_secs())).to_string(),
            ),
            ("time".to_string(), now.as_secs().to_string()),
            ("version".to_string(), self.config.version.clone()),
            ("curr_items".to_string(), self.item_count().to_string()),
            counter("total_items", &s.total_items),
            counter("curr_connections", &s.curr_connections),
            counter("total_connections", &s.total_connections),
            counter("rejected_connections", &s.rejected_connections),
            counter("cmd_get", &s.cmd_get),
            counter("cmd_set", &s.cmd_set),
            counter("cmd_flush", &s.cmd_flush),
            counter("get_hits", &s.get_hits),
            counter("get_misses", &s.get_misses),
            counter("auth_cmds", &s.auth_cmds),
            counter("auth_errors", &s.auth_errors),
        ]
    }

    fn settings_stats(&self) -> Vec<(String, String)> {
        let c = &self.config;
        vec![
            ("maxconns".to_string(), c.max_connections.to_string()),
            ("item_size_max".to_string(), c.max_item_size.to_string()),
            ("default_max_count".to_string(), c.default_max_count.to_string()),
            ("max_max_count".to_string(), c.max_max_count.to_string()),
            ("require_auth".to_string(), c.require_auth.to_string()),
            ("sasl_mechanisms".to_string(), SASL_MECHANISMS.to_string()),
        ]
    }

    fn collection_stats(&self) -> Vec<(String, String)> {
        let s = &self.stats;
        let (lists, sets, btrees) = {
            let table = self.table.lock();
            (
                table.count_of(ItemType::List),
                table.count_of(ItemType::Set),
                table.count_of(ItemType::Btree),
            )
        };
        vec![
            ("list_items".to_string(), lists.to_string()),
            ("set_items".to_string(), sets.to_string()),
            ("btree_items".to_string(), btrees.to_string()),
            ("lop_cmds".to_string(), EngineStats::get(&s.lop_cmds).to_string()),
            ("sop_cmds".to_string(), EngineStats::get(&s.sop_cmds).to_string()),
            ("bop_cmds".to_string(), EngineStats::get(&s.bop_cmds).to_string()),
            ("attr_cmds".to_string(), EngineStats::get(&s.attr_cmds).to_string()),
        ]
    }

    // =========================================================================
    // SASL
    // =========================================================================

    pub(super) fn sasl_mechanisms(&self, op: Opcode) -> Response {
        Response::ok(op).with_value(SASL_MECHANISMS)
    }

    /// Start an exchange; the key names the mechanism
    ///
    /// PLAIN with an empty initial response asks for the credentials in a
    /// follow-up SaslStep.
    pub(super) fn sasl_auth(
        &self,
        op: Opcode,
        request: &Request,
        conn: &mut ConnState,
    ) -> OpResult {
        bump(&self.stats.auth_cmds);
        conn.sasl_mech = None;

        let mech = String::from_utf8_lossy(&request.key).into_owned();
        if mech != "PLAIN" {
            bump(&self.stats.auth_errors);
            return Err(Reject::new(
                Status::AuthError,
                format!("Unsupported mechanism {:?}", mech),
            ));
        }

        if request.value.is_empty() {
            conn.sasl_mech = Some(mech);
            return Ok(Response::new(op.code(), Status::AuthContinue));
        }
        self.finish_plain(op, &request.value, conn)
    }

    pub(super) fn sasl_step(
        &self,
        op: Opcode,
        request: &Request,
        conn: &mut ConnState,
    ) -> OpResult {
        bump(&self.stats.auth_cmds);
        let Some(mech) = conn.sasl_mech.take() else {
            bump(&self.stats.auth_errors);
            return Err(Reject::new(Status::AuthError, "No SASL exchange in progress"));
        };
        if request.key.as_ref() != mech.as_bytes() {
            bump(&self.stats.auth_errors);
            return Err(Reject::new(Status::AuthError, "Mechanism changed mid-exchange"));
        }
        self.finish_plain(op, &request.value, conn)
    }

    fn finish_plain(&self, op: Opcode, data: &[u8], conn: &mut ConnState) -> OpResult {
        if self.check_plain(data) {
            conn.authenticated = true;
            tracing::debug!("SASL PLAIN authentication succeeded");
            Ok(Response::ok(op).with_value("Authenticated"))
        } else {
            bump(&self.stats.auth_errors);
            tracing::debug!("SASL PLAIN authentication failed");
            Err(Reject::new(Status::AuthError, "Auth failure"))
        }
    }

    /// `authzid NUL authcid NUL passwd`
    fn check_plain(&self, data: &[u8]) -> bool {
        let parts: Vec<&[u8]> = data.split(|b| *b == 0).collect();
        let [_authzid, user, password] = parts.as_slice() else {
            return false;
        };
        if self.config.credentials.is_empty() {
            return true;
        }
        self.config
            .credentials
            .iter()
            .any(|(u, p)| u.as_bytes() == *user && p.as_bytes() == *password)
    }

    // =========================================================================
    // Vbuckets
    // =========================================================================

    fn vbucket_id(request: &Request) -> Result<u16, Reject> {
        std::str::from_utf8(&request.key)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                Reject::new(Status::InvalidArguments, "Vbucket id must be a decimal u16")
            })
    }

    pub(super) fn set_vbucket_state(&self, op: Opcode, request: &Request) -> OpResult {
        let id = Self::vbucket_id(request)?;
        let state: VbucketState = std::str::from_utf8(&request.value)
            .map_err(|_| Reject::new(Status::InvalidArguments, "Vbucket state must be text"))?
            .parse()
            .map_err(|e: String| Reject::new(Status::InvalidArguments, e))?;

        self.vbuckets.lock().insert(id, state);
        tracing::debug!("Vbucket {} -> {}", id, state);
        Ok(Response::ok(op))
    }

    pub(super) fn get_vbucket_state(&self, op: Opcode, request: &Request) -> OpResult {
        let id = Self::vbucket_id(request)?;
        let state = self
            .vbuckets
            .lock()
            .get(&id)
            .copied()
            .ok_or_else(Reject::not_found)?;
        Ok(Response::ok(op).with_value(state.name()))
    }

    pub(super) fn delete_vbucket(&self, op: Opcode, request: &Request) -> OpResult {
        let id = Self::vbucket_id(request)?;
        self.vbuckets
            .lock()
            .remove(&id)
            .ok_or_else(Reject::not_found)?;
        tracing::debug!("Vbucket {} deleted", id);
        Ok(Response::ok(op))
    }
}
