#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use bigdecimal::BigDecimal;
use diesel::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::ConnectionManager;
use r2d2::PooledConnection;

use remit_api::*;
use remit_api::account::{self, Account, NewAccount};
use remit_api::cache::{self, Cache};
use remit_api::history;
use remit_api::ledger;
use remit_api::lookup;
use remit_api::schema::accounts;
use remit_api::transfer;

static UNIQUE: AtomicUsize = AtomicUsize::new(0);

/// Usernames and emails are unique per call so tests stay independent of
/// each other and of rows left behind by earlier runs
pub fn unique_name(prefix: &str) -> String {
	let n = UNIQUE.fetch_add(1, Ordering::Relaxed);
	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.unwrap()
		.subsec_nanos();

	format!("{}_{}_{}", prefix, nanos, n)
}

pub struct Fixture {
	pub pool: PgPool,
	pub cache: Cache,
}

impl Fixture {
	pub fn new() -> Self {
		let pool = db::pg_connection();
		let redis_url =
			std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());
		let cache = Cache::connect(&redis_url).expect("opening redis client");

		Fixture { pool, cache }
	}

	pub fn conn(&self) -> PooledConnection<ConnectionManager<PgConnection>> {
		self.pool.get().unwrap()
	}

	/// Inserts an account with the given balance under a fresh username,
	/// dropping any cached lookups that could now be stale
	pub fn account(&self, prefix: &str, balance: u32) -> Account {
		let username = unique_name(prefix);
		let email = format!("{}@gmail.com", username);
		let conn = self.conn();

		let account: Account = diesel::insert_into(accounts::table)
			.values(NewAccount {
				email: &email,
				username: &username,
				password: "unused-in-this-test",
				first_name: "Test",
				last_name: "User",
				account_number: account::generate_account_number(),
				account_balance: BigDecimal::from(balance),
			})
			.get_result(&conn)
			.unwrap();

		self.cache
			.evict(&[
				cache::account_key(account.id),
				cache::username_key(&account.username),
				cache::ALL_ACCOUNTS_KEY.to_string(),
			])
			.unwrap();

		account
	}
}

pub struct Suite {
	pub fixture: Fixture,
	pub accounts: Arc<dyn account::Store>,
	pub ledger: Arc<dyn ledger::Store>,
}

impl Suite {
	pub fn setup() -> Self {
		Suite {
			fixture: Fixture::new(),
			accounts: Arc::new(account::Repo),
			ledger: Arc::new(ledger::Repo),
		}
	}

	pub fn transfer_service(&self) -> transfer::Service {
		transfer::Service::new(transfer::NewService {
			db: self.fixture.pool.clone(),
			accounts: self.accounts.clone(),
			ledger: self.ledger.clone(),
			cache: self.fixture.cache.clone(),
		})
	}

	/// A transfer service whose ledger store is swapped out, for failure
	/// injection
	pub fn transfer_service_with_ledger(&self, ledger: Arc<dyn ledger::Store>) -> transfer::Service {
		transfer::Service::new(transfer::NewService {
			db: self.fixture.pool.clone(),
			accounts: self.accounts.clone(),
			ledger,
			cache: self.fixture.cache.clone(),
		})
	}

	pub fn history_service(&self) -> history::Service {
		history::Service::new(self.fixture.pool.clone(), self.ledger.clone())
	}

	pub fn lookup_service(&self) -> lookup::Service {
		lookup::Service::new(
			self.fixture.pool.clone(),
			self.accounts.clone(),
			self.fixture.cache.clone(),
		)
	}

	pub fn reload(&self, id: Id) -> Account {
		self.accounts.find_by_id(&self.fixture.conn(), id).unwrap()
	}

	pub fn ledger_total(&self, account_id: Id) -> i64 {
		let (_, total) = self
			.ledger
			.page_for_account(&self.fixture.conn(), account_id, 0, 1)
			.unwrap();
		total
	}
}
