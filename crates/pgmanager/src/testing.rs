//! In-memory [`Driver`] for unit tests.
//!
//! Every statement is journaled. Writes land in the innermost open frame and
//! only reach `committed` when the outer transaction commits, so tests can
//! assert which work survived a rollback.

use crate::driver::Driver;
use crate::error::{OrmError, OrmResult};
use crate::record::Record;
use crate::sql::{starts_with_keyword, strip_sql_prefix};
use crate::value::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Statement {
    pub sql: String,
    pub values: Vec<Value>,
}

type Responder = Box<dyn Fn(&str, &[Value]) -> Option<Vec<Record>> + Send>;

#[derive(Default)]
pub(crate) struct MockState {
    /// Everything the driver was asked to run, in order.
    pub journal: Vec<Statement>,
    /// Writes that are durable.
    pub committed: Vec<Statement>,
    /// Open transaction frames: the top-level transaction, then one per savepoint.
    frames: Vec<(Option<String>, Vec<Statement>)>,
    /// Statements starting with one of these fail.
    fail_on: Vec<String>,
    /// Statements binding one of these values fail.
    fail_values: Vec<Value>,
    /// Rows handed out by `query`, first in first out.
    responses: VecDeque<Vec<Record>>,
    responder: Option<Responder>,
    next_id: i64,
    pub closed: bool,
}

impl MockState {
    pub fn sqls(&self) -> Vec<String> {
        self.journal.iter().map(|s| s.sql.clone()).collect()
    }

    pub fn committed_sqls(&self) -> Vec<String> {
        self.committed.iter().map(|s| s.sql.clone()).collect()
    }

    pub fn last(&self) -> Option<&Statement> {
        self.journal.last()
    }

    fn fails(&self, sql: &str, values: &[Value]) -> bool {
        self.fail_on.iter().any(|p| sql.starts_with(p.as_str()))
            || values.iter().any(|v| self.fail_values.contains(v))
    }

    fn write(&mut self, statement: Statement) {
        match self.frames.last_mut() {
            Some((_, ops)) => ops.push(statement),
            None => self.committed.push(statement),
        }
    }

    fn control(&mut self, sql: &str) -> bool {
        let upper = sql.trim().to_ascii_uppercase();
        if upper == "BEGIN" {
            self.frames = vec![(None, Vec::new())];
        } else if upper == "COMMIT" {
            for (_, ops) in self.frames.drain(..) {
                self.committed.extend(ops);
            }
        } else if upper == "ROLLBACK" {
            self.frames.clear();
        } else if let Some(name) = upper.strip_prefix("SAVEPOINT ") {
            self.frames.push((Some(name.to_ascii_lowercase()), Vec::new()));
        } else if let Some(name) = upper.strip_prefix("RELEASE SAVEPOINT ") {
            let name = name.to_ascii_lowercase();
            if let Some(pos) = self.position(&name) {
                let released: Vec<_> = self.frames.drain(pos..).flat_map(|(_, ops)| ops).collect();
                self.write_all(released);
            }
        } else if let Some(name) = upper.strip_prefix("ROLLBACK TO SAVEPOINT ") {
            let name = name.to_ascii_lowercase();
            if let Some(pos) = self.position(&name) {
                self.frames.truncate(pos + 1);
                self.frames[pos].1.clear();
            }
        } else {
            return false;
        }
        true
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.frames
            .iter()
            .rposition(|(n, _)| n.as_deref() == Some(name))
    }

    fn write_all(&mut self, ops: Vec<Statement>) {
        for op in ops {
            self.write(op);
        }
    }
}

/// Cloning shares the same state.
#[derive(Clone, Default)]
pub(crate) struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Make statements starting with `prefix` fail.
    pub fn fail_on(&self, prefix: &str) {
        self.state().fail_on.push(prefix.to_string());
    }

    /// Make statements that bind `value` fail.
    pub fn fail_on_value(&self, value: impl Into<Value>) {
        self.state().fail_values.push(value.into());
    }

    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.fail_on.clear();
        state.fail_values.clear();
    }

    /// Queue rows for the next `query` call.
    pub fn respond(&self, rows: Vec<Record>) {
        self.state().responses.push_back(rows);
    }

    /// Answer queries from a closure; `None` falls back to the defaults.
    pub fn respond_with(
        &self,
        f: impl Fn(&str, &[Value]) -> Option<Vec<Record>> + Send + 'static,
    ) {
        self.state().responder = Some(Box::new(f));
    }

    /// Journal the statement and apply its effect. Returns whether it was a
    /// write and any scripted rows; `None` rows for transaction control.
    fn run(&self, sql: &str, values: &[Value]) -> OrmResult<(bool, Option<Vec<Record>>)> {
        let mut state = self.state();
        let statement = Statement {
            sql: sql.to_string(),
            values: values.to_vec(),
        };
        state.journal.push(statement.clone());
        if state.fails(sql, values) {
            return Err(OrmError::Other(format!("mock failure: {sql}")));
        }
        if values.is_empty() && state.control(sql) {
            return Ok((false, None));
        }
        let head = strip_sql_prefix(sql);
        let is_write = ["INSERT", "UPDATE", "DELETE", "ALTER", "CREATE"]
            .iter()
            .any(|k| starts_with_keyword(head, k));
        if is_write {
            state.write(statement);
        }
        let scripted = match state.responses.pop_front() {
            Some(rows) => Some(rows),
            None => state.responder.as_ref().and_then(|f| f(sql, values)),
        };
        Ok((is_write, scripted))
    }

    fn next_id(&self) -> i64 {
        let mut state = self.state();
        state.next_id += 1;
        state.next_id
    }
}

impl Driver for MockDriver {
    async fn query(&self, sql: &str, values: &[Value]) -> OrmResult<Vec<Record>> {
        match self.run(sql, values)? {
            (_, Some(rows)) => Ok(rows),
            (true, None) if starts_with_keyword(strip_sql_prefix(sql), "INSERT")
                && sql.contains("RETURNING") =>
            {
                let mut row = Record::new();
                row.insert("id", self.next_id());
                Ok(vec![row])
            }
            _ => Ok(Vec::new()),
        }
    }

    /// Scripted rows count as affected rows; otherwise a write affects one row.
    async fn execute(&self, sql: &str, values: &[Value]) -> OrmResult<u64> {
        match self.run(sql, values)? {
            (_, Some(rows)) => Ok(rows.len() as u64),
            (true, None) => Ok(1),
            (false, None) => Ok(0),
        }
    }

    async fn batch_execute(&self, sql: &str) -> OrmResult<()> {
        self.run(sql, &[]).map(|_| ())
    }

    async fn close(self) -> OrmResult<()> {
        self.state().closed = true;
        Ok(())
    }
}
