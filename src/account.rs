use bigdecimal::BigDecimal;
use chrono::{Datelike, Utc};
use diesel::PgConnection;
use diesel::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::db;
use crate::error::{Error, ErrorKind};
use crate::schema::accounts;
use crate::types::{Id, Result, Time};

/// A customer account: the credential fields plus the single mutable
/// financial field, `account_balance`
#[derive(Queryable, Identifiable, PartialEq, Debug)]
pub struct Account {
	pub id: Id,
	pub email: String,
	pub username: String,
	/// bcrypt hash, never a plain password and never serialized
	pub password: String,
	pub first_name: String,
	pub last_name: String,
	pub account_number: i64,
	pub account_balance: BigDecimal,
	pub created_at: Time,
	pub updated_at: Time,
}

#[derive(Insertable)]
#[table_name = "accounts"]
pub struct NewAccount<'a> {
	pub email: &'a str,
	pub username: &'a str,
	pub password: &'a str,
	pub first_name: &'a str,
	pub last_name: &'a str,
	pub account_number: i64,
	pub account_balance: BigDecimal,
}

/// Public view of an account, safe to serialize into responses and the cache
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
	pub id: Id,
	pub email: String,
	pub username: String,
	pub first_name: String,
	pub last_name: String,
	pub account_number: i64,
	pub account_balance: BigDecimal,
}

impl From<&Account> for Profile {
	fn from(account: &Account) -> Self {
		Profile {
			id: account.id,
			email: account.email.clone(),
			username: account.username.clone(),
			first_name: account.first_name.clone(),
			last_name: account.last_name.clone(),
			account_number: account.account_number,
			account_balance: account.account_balance.clone(),
		}
	}
}

/// Data store contract for accounts
///
/// Every method borrows the connection so the caller decides the transaction
/// boundary; the transfer engine runs several of these inside one unit of work
pub trait Store: Send + Sync {
	fn create(&self, conn: &PgConnection, new_account: NewAccount) -> db::Result<Account>;
	fn find_by_id(&self, conn: &PgConnection, id: Id) -> db::Result<Account>;
	fn find_by_username(&self, conn: &PgConnection, username: &str) -> db::Result<Account>;
	fn find_by_email(&self, conn: &PgConnection, email: &str) -> db::Result<Account>;
	fn find_by_account_number(&self, conn: &PgConnection, number: i64) -> db::Result<Account>;
	fn list(&self, conn: &PgConnection) -> db::Result<Vec<Account>>;
	/// Loads the row under a `FOR UPDATE` lock held until the enclosing
	/// transaction ends
	fn find_for_update(&self, conn: &PgConnection, id: Id) -> db::Result<Account>;
	fn save_balance(&self, conn: &PgConnection, id: Id, balance: &BigDecimal) -> db::Result<Account>;
	fn save_password(&self, conn: &PgConnection, id: Id, password_hash: &str) -> db::Result<Account>;
}

/// Diesel-backed `Store` implementation
pub struct Repo;

impl Store for Repo {
	fn create(&self, conn: &PgConnection, new_account: NewAccount) -> db::Result<Account> {
		diesel::insert_into(accounts::table)
			.values(&new_account)
			.get_result(conn)
			.map_err(Into::into)
	}

	fn find_by_id(&self, conn: &PgConnection, id: Id) -> db::Result<Account> {
		accounts::table
			.find(id)
			.first::<Account>(conn)
			.map_err(Into::into)
	}

	fn find_by_username(&self, conn: &PgConnection, username: &str) -> db::Result<Account> {
		accounts::table
			.filter(accounts::username.eq(username))
			.first::<Account>(conn)
			.map_err(Into::into)
	}

	fn find_by_email(&self, conn: &PgConnection, email: &str) -> db::Result<Account> {
		accounts::table
			.filter(accounts::email.eq(email))
			.first::<Account>(conn)
			.map_err(Into::into)
	}

	fn find_by_account_number(&self, conn: &PgConnection, number: i64) -> db::Result<Account> {
		accounts::table
			.filter(accounts::account_number.eq(number))
			.first::<Account>(conn)
			.map_err(Into::into)
	}

	fn list(&self, conn: &PgConnection) -> db::Result<Vec<Account>> {
		accounts::table
			.order(accounts::id.asc())
			.load::<Account>(conn)
			.map_err(Into::into)
	}

	fn find_for_update(&self, conn: &PgConnection, id: Id) -> db::Result<Account> {
		accounts::table
			.find(id)
			.for_update()
			.first::<Account>(conn)
			.map_err(Into::into)
	}

	fn save_balance(&self, conn: &PgConnection, id: Id, balance: &BigDecimal) -> db::Result<Account> {
		diesel::update(accounts::table.find(id))
			.set((
				accounts::account_balance.eq(balance),
				accounts::updated_at.eq(diesel::dsl::now),
			))
			.get_result(conn)
			.map_err(Into::into)
	}

	fn save_password(&self, conn: &PgConnection, id: Id, password_hash: &str) -> db::Result<Account> {
		diesel::update(accounts::table.find(id))
			.set((
				accounts::password.eq(password_hash),
				accounts::updated_at.eq(diesel::dsl::now),
			))
			.get_result(conn)
			.map_err(Into::into)
	}
}

/// Parameters supplied when opening an account
pub struct Signup<'a> {
	pub email: &'a str,
	pub username: &'a str,
	pub password: &'a str,
	pub first_name: &'a str,
	pub last_name: &'a str,
}

const MIN_PASSWORD_LEN: usize = 8;

/// Re-rolls on an account-number collision this many times before giving up
const MAX_NUMBER_ATTEMPTS: u32 = 5;

/// Open a new account: validate the signup, hash the password, allocate an
/// unused account number and insert the row with a zero balance
///
/// Hashing is an explicit step of this path; the data model itself knows
/// nothing about credentials
pub fn open_account(conn: &PgConnection, store: &dyn Store, signup: Signup) -> Result<Account> {
	validate_signup(&signup)?;

	let hash = hash_password(signup.password)?;
	let account_number = unused_account_number(conn, store)?;

	store
		.create(conn, NewAccount {
			email: signup.email,
			username: signup.username,
			password: &hash,
			first_name: signup.first_name,
			last_name: signup.last_name,
			account_number,
			account_balance: BigDecimal::from(0),
		})
		.map_err(Into::into)
}

fn validate_signup(signup: &Signup) -> Result<()> {
	if signup.password.len() < MIN_PASSWORD_LEN {
		return Err(Error::validation("Password must be at least 8 characters long"));
	}
	if !signup.email.contains('@') {
		return Err(Error::validation("Email must be valid"));
	}
	if signup.username.trim().is_empty() {
		return Err(Error::validation("Username cannot be empty"));
	}

	Ok(())
}

pub fn hash_password(plain: &str) -> Result<String> {
	bcrypt::hash(plain, bcrypt::DEFAULT_COST).map_err(Into::into)
}

pub fn verify_password(account: &Account, plain: &str) -> Result<bool> {
	bcrypt::verify(plain, &account.password).map_err(Into::into)
}

/// Four-digit year concatenated with a random six-digit number
pub fn generate_account_number() -> i64 {
	let year = Utc::now().year() as i64;
	let six_digits = rand::thread_rng().gen_range(100_000..1_000_000);
	year * 1_000_000 + six_digits
}

fn unused_account_number(conn: &PgConnection, store: &dyn Store) -> Result<i64> {
	for _ in 0..MAX_NUMBER_ATTEMPTS {
		let candidate = generate_account_number();
		match store.find_by_account_number(conn, candidate) {
			Err(db::Error::RecordNotFound) => return Ok(candidate),
			Ok(_) => continue,
			Err(e) => return Err(e.into()),
		}
	}

	Err(Error::new(ErrorKind::Internal(
		"could not allocate an unused account number".to_string(),
	)))
}
