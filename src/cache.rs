use redis::Commands;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::types::{Id, Result};

/// Cached lookups live for one hour
pub const TTL_SECONDS: u64 = 60 * 60;

/// Key under which the full account listing is cached
pub const ALL_ACCOUNTS_KEY: &str = "all_users";

pub fn account_key(id: Id) -> String {
	format!("user_{}", id)
}

pub fn username_key(username: &str) -> String {
	format!("user_{}", username)
}

/// Redis-backed key/value store holding JSON values with a TTL
///
/// The persistent store stays the source of truth; everything in here is a
/// read optimization that mutation paths evict
#[derive(Clone)]
pub struct Cache {
	client: redis::Client,
}

impl Cache {
	pub fn connect(url: &str) -> Result<Cache> {
		redis::Client::open(url)
			.map(|client| Cache { client })
			.map_err(Into::into)
	}

	pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
		let mut conn = self.client.get_connection()?;
		let raw: Option<String> = conn.get(key)?;

		match raw {
			Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
			None => Ok(None),
		}
	}

	pub fn put_json<T: Serialize>(&self, key: &str, ttl_seconds: u64, value: &T) -> Result<()> {
		let payload = serde_json::to_string(value)?;
		let mut conn = self.client.get_connection()?;
		let _: () = conn.set_ex(key, payload, ttl_seconds)?;

		Ok(())
	}

	pub fn evict(&self, keys: &[String]) -> Result<()> {
		let mut conn = self.client.get_connection()?;
		let _: () = conn.del(keys)?;

		Ok(())
	}
}
