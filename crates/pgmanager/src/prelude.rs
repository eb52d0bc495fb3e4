//! Convenient imports for typical `pgmanager` usage.
//!
//! ```ignore
//! use pgmanager::prelude::*;
//! ```

pub use crate::{
    ConnectOptions, DbConfig, DbManager, OrmError, OrmResult, Page, Params, Record,
    TransactionOutcome, Value, Where, params, record,
};
