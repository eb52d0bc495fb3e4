//! # pgmanager
//!
//! A thin PostgreSQL access facade: named-parameter queries, table-scoped
//! CRUD, nested transactions over savepoints, offset pagination and an
//! optional audit/soft-delete mode.
//!
//! ## Features
//!
//! - **Named parameters**: write `:name`, bind from a [`Params`] map; values are always bound, never spliced
//! - **Nested transactions**: `begin`/`commit`/`roll_back` nest through `SAVEPOINT sp_<n>`
//! - **Scoped transactions**: [`DbManager::transaction`] commits on `Ok` and rolls back on `Err` or panic
//! - **Soft mode**: `created_*`/`updated_*` stamping, deletes flag `deleted = 'YES'`, reads skip flagged rows
//! - **Safe errors**: driver failures are wrapped; the SQL is only shown with debug mode on
//!
//! ## Example
//!
//! ```ignore
//! use pgmanager::prelude::*;
//!
//! let mut db = DbManager::connect(
//!     ConnectOptions::new("localhost", "app", "secret", "library"),
//!     DbConfig::new().default_actor("importer"),
//! )
//! .await?;
//!
//! let id = db
//!     .table("author")
//!     .insert(record! { "name" => "Victor Hugo", "birthdate" => "1802-02-26" })
//!     .await?;
//!
//! db.table("author").delete(id).await?; // soft delete
//! assert!(db.table("author").get_by_id(id).await?.is_none());
//!
//! let page = db
//!     .select("id, name")
//!     .from("author")
//!     .order_by("name")
//!     .paginate(&mut db, &Params::new(), 1, 20)
//!     .await?;
//! ```

pub mod driver;
pub mod error;
pub mod filter;
pub mod history;
pub mod ident;
pub mod manager;
pub mod pager;
pub mod pg;
pub mod prelude;
pub mod record;
pub mod select;
pub mod soft;
pub mod sql;
pub mod transaction;
pub mod value;

#[cfg(test)]
pub(crate) mod testing;

pub use driver::Driver;
pub use error::{OPAQUE_ERROR_MESSAGE, OrmError, OrmResult};
pub use filter::Where;
pub use history::{ExecutedStatement, HistoryPolicy, QueryLog};
pub use ident::Ident;
pub use manager::{DbConfig, DbManager, Table};
pub use pager::Page;
pub use pg::{ConnectOptions, PgDriver};
pub use record::{Params, Record};
pub use select::SelectBuilder;
pub use soft::{SoftMode, WriteOrigin};
pub use sql::{CompiledSql, compile};
pub use transaction::{TransactionManager, TransactionOutcome};
pub use value::Value;
