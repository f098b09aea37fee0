#[macro_use]
extern crate diesel;

pub mod schema;
pub mod types;
pub mod db;
pub mod error;
pub mod account;
pub mod ledger;
pub mod cache;
pub mod lookup;
pub mod transfer;
pub mod history;
pub mod auth;
pub mod api;

pub use crate::db::PgPool;
pub use crate::error::{Error, ErrorKind};
pub use crate::types::{Id, Result, Time};
