use std::sync::Arc;

use log::debug;

use crate::account::{self, Profile};
use crate::cache::{self, Cache};
use crate::db::PgPool;
use crate::error::{Error, ErrorKind};
use crate::types::{Id, Result};

/// Read-through cached account lookups
///
/// Consults the cache first; on a miss loads from the persistent store and
/// populates the cache before returning. Never writes balances.
#[derive(Clone)]
pub struct Service {
	db: PgPool,
	accounts: Arc<dyn account::Store>,
	cache: Cache,
}

impl Service {
	pub fn new(db: PgPool, accounts: Arc<dyn account::Store>, cache: Cache) -> Self {
		Service { db, accounts, cache }
	}

	pub fn account_by_id(&self, id: Id) -> Result<Profile> {
		let key = cache::account_key(id);
		if let Some(profile) = self.cache.get_json::<Profile>(&key)? {
			debug!("returning cached account for {}", key);
			return Ok(profile);
		}

		let conn = self.db.get()?;
		let account = self
			.accounts
			.find_by_id(&conn, id)
			.map_err(|e| Error::not_found_or(e, "User not found"))?;

		let profile = Profile::from(&account);
		self.cache.put_json(&key, cache::TTL_SECONDS, &profile)?;

		Ok(profile)
	}

	pub fn account_by_username(&self, username: &str) -> Result<Profile> {
		let key = cache::username_key(username);
		if let Some(profile) = self.cache.get_json::<Profile>(&key)? {
			debug!("returning cached account for {}", key);
			return Ok(profile);
		}

		let conn = self.db.get()?;
		let account = self
			.accounts
			.find_by_username(&conn, username)
			.map_err(|e| Error::not_found_or(e, "User not found"))?;

		let profile = Profile::from(&account);
		self.cache.put_json(&key, cache::TTL_SECONDS, &profile)?;

		Ok(profile)
	}

	pub fn accounts(&self) -> Result<Vec<Profile>> {
		if let Some(profiles) = self.cache.get_json::<Vec<Profile>>(cache::ALL_ACCOUNTS_KEY)? {
			debug!("returning cached account listing");
			return Ok(profiles);
		}

		let conn = self.db.get()?;
		let accounts = self.accounts.list(&conn)?;
		if accounts.is_empty() {
			return Err(Error::new(ErrorKind::NotFound("No users found".to_string())));
		}

		let profiles: Vec<Profile> = accounts.iter().map(Profile::from).collect();
		self.cache.put_json(cache::ALL_ACCOUNTS_KEY, cache::TTL_SECONDS, &profiles)?;

		Ok(profiles)
	}
}
