//! Soft mode: audit columns and soft delete.
//!
//! With soft mode on, every write is rewritten before SQL is generated:
//!
//! - insert: stamps `created_at` / `created_by`
//! - update: stamps `updated_at` / `updated_by`; only rows with `deleted = 'NO'` are targeted
//! - delete: becomes an update setting `deleted = 'YES'`, `deleted_at`, `deleted_by`
//!
//! Callers may not write the audit columns themselves; doing so is a
//! validation error raised before anything reaches the database.

use crate::error::{OrmError, OrmResult};
use crate::record::Record;
use crate::value::Value;
use chrono::{NaiveDateTime, SubsecRound, Utc};
use std::collections::BTreeSet;

pub const DELETED: &str = "deleted";
pub const CREATED_AT: &str = "created_at";
pub const CREATED_BY: &str = "created_by";
pub const UPDATED_AT: &str = "updated_at";
pub const UPDATED_BY: &str = "updated_by";
pub const DELETED_AT: &str = "deleted_at";
pub const DELETED_BY: &str = "deleted_by";

/// Audit columns managed by soft mode.
pub const AUDIT_COLUMNS: [&str; 7] = [
    DELETED, CREATED_AT, CREATED_BY, UPDATED_AT, UPDATED_BY, DELETED_AT, DELETED_BY,
];

/// Predicate restricting statements to rows that are not soft-deleted.
pub const LIVE_PREDICATE: &str = "deleted = 'NO'";

/// Who is asking for a write. Only the soft-delete path may touch the deletion columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOrigin {
    User,
    SoftDelete,
}

/// Current timestamp at microsecond precision (the resolution PostgreSQL stores).
pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc().trunc_subsecs(6)
}

fn same_column(key: &str, column: &str) -> bool {
    key.trim_matches('"').eq_ignore_ascii_case(column)
}

/// Soft-mode settings and the rewrite rules that apply them.
#[derive(Debug, Clone)]
pub struct SoftMode {
    enabled: bool,
    default_actor: Value,
    forbidden: BTreeSet<String>,
}

impl Default for SoftMode {
    fn default() -> Self {
        Self::new(true, Value::Null)
    }
}

impl SoftMode {
    pub fn new(enabled: bool, default_actor: impl Into<Value>) -> Self {
        Self {
            enabled,
            default_actor: default_actor.into(),
            forbidden: AUDIT_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn default_actor(&self) -> &Value {
        &self.default_actor
    }

    pub fn set_default_actor(&mut self, actor: impl Into<Value>) {
        self.default_actor = actor.into();
    }

    /// Reject an additional column in user payloads.
    pub fn forbid(&mut self, column: impl Into<String>) {
        self.forbidden.insert(column.into());
    }

    pub fn forbidden_columns(&self) -> impl Iterator<Item = &str> {
        self.forbidden.iter().map(String::as_str)
    }

    /// `true` if `column` is one of the forbidden columns.
    pub fn is_forbidden(&self, column: &str) -> bool {
        self.forbidden.iter().any(|f| same_column(column, f))
    }

    /// The WHERE predicate to AND into reads and updates, when enabled.
    pub fn live_predicate(&self) -> Option<&'static str> {
        self.enabled.then_some(LIVE_PREDICATE)
    }

    fn actor(&self, actor: Option<&Value>) -> Value {
        match actor {
            Some(a) if !a.is_blank() => a.clone(),
            _ => self.default_actor.clone(),
        }
    }

    fn check(&self, row: &Record, origin: WriteOrigin) -> OrmResult<()> {
        for key in row.keys() {
            if !self.is_forbidden(key) {
                continue;
            }
            let permitted = origin == WriteOrigin::SoftDelete
                && [DELETED, DELETED_AT, DELETED_BY]
                    .iter()
                    .any(|c| same_column(key, c));
            if !permitted {
                return Err(OrmError::validation(format!("`{key}` is forbidden")));
            }
        }
        Ok(())
    }

    /// Validate an insert payload and stamp the creation columns.
    pub fn rewrite_insert(
        &self,
        mut row: Record,
        actor: Option<&Value>,
        now: NaiveDateTime,
    ) -> OrmResult<Record> {
        if !self.enabled {
            return Ok(row);
        }
        self.check(&row, WriteOrigin::User)?;
        row.insert(CREATED_AT, now);
        row.insert(CREATED_BY, self.actor(actor));
        Ok(row)
    }

    /// Validate an update payload and, for user updates, stamp the update columns.
    pub fn rewrite_update(
        &self,
        mut row: Record,
        actor: Option<&Value>,
        origin: WriteOrigin,
        now: NaiveDateTime,
    ) -> OrmResult<Record> {
        if !self.enabled {
            return Ok(row);
        }
        self.check(&row, origin)?;
        if origin == WriteOrigin::User {
            row.insert(UPDATED_AT, now);
            row.insert(UPDATED_BY, self.actor(actor));
        }
        Ok(row)
    }

    /// The update payload a soft delete writes.
    pub fn soft_delete_payload(&self, actor: Option<&Value>, now: NaiveDateTime) -> Record {
        let mut row = Record::with_capacity(3);
        row.insert(DELETED, "YES");
        row.insert(DELETED_AT, now);
        row.insert(DELETED_BY, self.actor(actor));
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;

    fn ts() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[test]
    fn insert_stamps_creation_columns_with_default_actor() {
        let soft = SoftMode::new(true, "system");
        let row = soft
            .rewrite_insert(record! { "name" => "X" }, None, ts())
            .unwrap();
        assert_eq!(row.get("name"), Some(&Value::from("X")));
        assert_eq!(row.get(CREATED_AT), Some(&Value::Timestamp(ts())));
        assert_eq!(row.get(CREATED_BY), Some(&Value::from("system")));
    }

    #[test]
    fn actor_override_wins_unless_blank() {
        let soft = SoftMode::new(true, "system");
        let bob = Value::from("bob");
        let row = soft
            .rewrite_insert(record! { "name" => "X" }, Some(&bob), ts())
            .unwrap();
        assert_eq!(row.get(CREATED_BY), Some(&bob));

        let blank = Value::from("");
        let row = soft
            .rewrite_insert(record! { "name" => "X" }, Some(&blank), ts())
            .unwrap();
        assert_eq!(row.get(CREATED_BY), Some(&Value::from("system")));
    }

    #[test]
    fn user_payload_may_not_name_audit_columns() {
        let soft = SoftMode::new(true, 1);
        for col in AUDIT_COLUMNS {
            let row = record! { "name" => "X", col => "boom" };
            let err = soft.rewrite_insert(row.clone(), None, ts()).unwrap_err();
            assert!(err.is_validation(), "{col}");
            let err = soft
                .rewrite_update(row, None, WriteOrigin::User, ts())
                .unwrap_err();
            assert!(err.is_validation(), "{col}");
        }
    }

    #[test]
    fn forbidden_check_ignores_case_and_quotes() {
        let soft = SoftMode::new(true, 1);
        let row = record! { "\"Created_At\"" => "x" };
        assert!(soft.rewrite_insert(row, None, ts()).is_err());
    }

    #[test]
    fn soft_delete_origin_may_write_deletion_columns_only() {
        let soft = SoftMode::new(true, 7);
        let payload = soft.soft_delete_payload(None, ts());
        let row = soft
            .rewrite_update(payload, None, WriteOrigin::SoftDelete, ts())
            .unwrap();
        assert_eq!(row.get(DELETED), Some(&Value::from("YES")));
        assert_eq!(row.get(DELETED_BY), Some(&Value::Int(7)));
        assert!(!row.contains_key(UPDATED_AT));

        let sneaky = record! { DELETED => "YES", CREATED_BY => "x" };
        assert!(
            soft.rewrite_update(sneaky, None, WriteOrigin::SoftDelete, ts())
                .is_err()
        );
    }

    #[test]
    fn user_update_stamps_update_columns() {
        let soft = SoftMode::new(true, "system");
        let row = soft
            .rewrite_update(record! { "name" => "Y" }, None, WriteOrigin::User, ts())
            .unwrap();
        assert_eq!(row.get(UPDATED_AT), Some(&Value::Timestamp(ts())));
        assert_eq!(row.get(UPDATED_BY), Some(&Value::from("system")));
    }

    #[test]
    fn disabled_mode_passes_payload_through() {
        let soft = SoftMode::new(false, "system");
        let row = record! { CREATED_AT => "manual" };
        let out = soft.rewrite_insert(row.clone(), None, ts()).unwrap();
        assert_eq!(out, row);
        assert_eq!(soft.live_predicate(), None);
    }

    #[test]
    fn extra_forbidden_columns() {
        let mut soft = SoftMode::new(true, 1);
        soft.forbid("tenant_id");
        assert!(soft.is_forbidden("tenant_id"));
        assert!(
            soft.rewrite_insert(record! { "tenant_id" => 3 }, None, ts())
                .is_err()
        );
    }
}
