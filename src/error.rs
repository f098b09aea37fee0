use std::fmt;

use crate::db;

/// An error that can occur while serving a request
#[derive(Debug, PartialEq)]
pub struct Error {
	kind: ErrorKind,
}

impl Error {
	pub fn new(kind: ErrorKind) -> Error {
		Error { kind }
	}

	pub fn kind(&self) -> &ErrorKind {
		&self.kind
	}

	pub fn validation(msg: impl Into<String>) -> Error {
		Error::new(ErrorKind::Validation(msg.into()))
	}

	pub fn unauthorized(msg: impl Into<String>) -> Error {
		Error::new(ErrorKind::Unauthorized(msg.into()))
	}

	/// Maps a store miss to a `NotFound` with a caller-facing message,
	/// leaving every other database failure untouched
	pub fn not_found_or(e: db::Error, msg: &str) -> Error {
		match e {
			db::Error::RecordNotFound => Error::new(ErrorKind::NotFound(msg.to_string())),
			other => Error::from(other),
		}
	}
}

/// The kind of an error that can occur.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
	/// Missing or malformed input
	Validation(String),
	/// A referenced account does not exist
	NotFound(String),
	/// A debit would overdraw the paying account
	InsufficientFunds,
	/// Credential or token failure; never produced by the transfer engine
	Unauthorized(String),
	Database(db::Error),
	Cache(String),
	Internal(String),
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match &self.kind {
			ErrorKind::Validation(msg) => write!(f, "{}", msg),
			ErrorKind::NotFound(msg) => write!(f, "{}", msg),
			ErrorKind::InsufficientFunds => write!(f, "Insufficient balance for the transfer."),
			ErrorKind::Unauthorized(msg) => write!(f, "{}", msg),
			ErrorKind::Database(e) => write!(f, "db error: {}", e),
			ErrorKind::Cache(msg) => write!(f, "cache error: {}", msg),
			ErrorKind::Internal(msg) => write!(f, "{}", msg),
		}
	}
}

impl std::error::Error for Error {}

impl From<db::Error> for Error {
	fn from(e: db::Error) -> Self {
		Error::new(ErrorKind::Database(e))
	}
}

impl From<r2d2::Error> for Error {
	fn from(e: r2d2::Error) -> Self {
		Error::new(ErrorKind::Database(db::Error::from(e)))
	}
}

impl From<diesel::result::Error> for Error {
	fn from(e: diesel::result::Error) -> Self {
		Error::new(ErrorKind::Database(db::Error::from(e)))
	}
}

impl From<redis::RedisError> for Error {
	fn from(e: redis::RedisError) -> Self {
		Error::new(ErrorKind::Cache(e.to_string()))
	}
}

impl From<serde_json::Error> for Error {
	fn from(e: serde_json::Error) -> Self {
		Error::new(ErrorKind::Cache(format!("serializing cached value: {}", e)))
	}
}

impl From<bcrypt::BcryptError> for Error {
	fn from(e: bcrypt::BcryptError) -> Self {
		Error::new(ErrorKind::Internal(format!("hashing password: {}", e)))
	}
}
