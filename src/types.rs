use chrono::{DateTime, Utc};

pub type Id = i64;
pub type Time = DateTime<Utc>;

pub type Result<T> = std::result::Result<T, crate::error::Error>;
