use std::str::FromStr;

use bigdecimal::BigDecimal;
use diesel::{
	deserialize,
	pg::Pg,
	PgConnection,
	prelude::*,
	serialize,
	sql_types::Varchar,
};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::db;
use crate::schema::transactions;
use crate::types::{Id, Time};

/// One ledger row: the immutable record of a single balance mutation on the
/// owning account
///
/// Rows are append-only. Nothing in this crate updates or deletes them.
#[derive(Queryable, Identifiable, Serialize, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
	pub id: Id,
	/// The account whose balance this entry documents
	pub account_id: Id,
	pub amount: BigDecimal,
	/// The owner's balance immediately after this entry
	pub balance: BigDecimal,
	pub status: Status,
	pub transaction_status: TransactionStatus,
	/// The counterparty's public account number; the owner's own number for
	/// counter deposits
	pub account_number: String,
	/// Free-text label supplied by the caller
	pub name: String,
	pub created_at: Time,
	pub updated_at: Time,
}

#[derive(AsExpression, FromSqlRow, EnumString, Display, Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Debug)]
#[sql_type = "Varchar"]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Status {
	Completed,
}

#[derive(AsExpression, FromSqlRow, EnumString, Display, Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Debug)]
#[sql_type = "Varchar"]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
	Successful,
}

impl serialize::ToSql<Varchar, Pg> for Status {
	fn to_sql<W: std::io::Write>(&self, out: &mut serialize::Output<W, Pg>) -> serialize::Result {
		serialize::ToSql::<Varchar, Pg>::to_sql(&self.to_string(), out)
	}
}

impl deserialize::FromSql<Varchar, Pg> for Status {
	fn from_sql(bytes: Option<&[u8]>) -> deserialize::Result<Self> {
		let bytes = bytes.ok_or_else(|| "error deserializing from varchar")?;
		let s = std::str::from_utf8(bytes)?;

		Status::from_str(s).map_err(|_| "invalid transaction status".into())
	}
}

impl serialize::ToSql<Varchar, Pg> for TransactionStatus {
	fn to_sql<W: std::io::Write>(&self, out: &mut serialize::Output<W, Pg>) -> serialize::Result {
		serialize::ToSql::<Varchar, Pg>::to_sql(&self.to_string(), out)
	}
}

impl deserialize::FromSql<Varchar, Pg> for TransactionStatus {
	fn from_sql(bytes: Option<&[u8]>) -> deserialize::Result<Self> {
		let bytes = bytes.ok_or_else(|| "error deserializing from varchar")?;
		let s = std::str::from_utf8(bytes)?;

		TransactionStatus::from_str(s).map_err(|_| "invalid transaction status".into())
	}
}

#[derive(Insertable)]
#[table_name = "transactions"]
pub struct NewTransaction<'a> {
	pub account_id: Id,
	pub amount: &'a BigDecimal,
	pub balance: &'a BigDecimal,
	pub status: Status,
	pub transaction_status: TransactionStatus,
	pub account_number: &'a str,
	pub name: &'a str,
}

/// Append-only data store contract for ledger rows
pub trait Store: Send + Sync {
	fn append(&self, conn: &PgConnection, new_transaction: NewTransaction) -> db::Result<Transaction>;

	/// Rows filed under the account, newest first, plus the unpaged total
	fn page_for_account(
		&self,
		conn: &PgConnection,
		account_id: Id,
		offset: i64,
		limit: i64,
	) -> db::Result<(Vec<Transaction>, i64)>;

	/// Rows filed under the account whose amount falls inside the given
	/// inclusive bounds; either bound may be absent
	fn filtered_for_account(
		&self,
		conn: &PgConnection,
		account_id: Id,
		min_amount: Option<&BigDecimal>,
		max_amount: Option<&BigDecimal>,
	) -> db::Result<Vec<Transaction>>;
}

/// Diesel-backed `Store` implementation
pub struct Repo;

impl Store for Repo {
	fn append(&self, conn: &PgConnection, new_transaction: NewTransaction) -> db::Result<Transaction> {
		diesel::insert_into(transactions::table)
			.values(&new_transaction)
			.get_result::<Transaction>(conn)
			.map_err(Into::into)
	}

	fn page_for_account(
		&self,
		conn: &PgConnection,
		account_id: Id,
		offset: i64,
		limit: i64,
	) -> db::Result<(Vec<Transaction>, i64)> {
		let total: i64 = transactions::table
			.filter(transactions::account_id.eq(account_id))
			.count()
			.get_result(conn)?;

		let rows = transactions::table
			.filter(transactions::account_id.eq(account_id))
			.order(transactions::created_at.desc())
			.offset(offset)
			.limit(limit)
			.load::<Transaction>(conn)?;

		Ok((rows, total))
	}

	fn filtered_for_account(
		&self,
		conn: &PgConnection,
		account_id: Id,
		min_amount: Option<&BigDecimal>,
		max_amount: Option<&BigDecimal>,
	) -> db::Result<Vec<Transaction>> {
		let mut query = transactions::table
			.filter(transactions::account_id.eq(account_id))
			.into_boxed();

		if let Some(min) = min_amount {
			query = query.filter(transactions::amount.ge(min));
		}
		if let Some(max) = max_amount {
			query = query.filter(transactions::amount.le(max));
		}

		query.load::<Transaction>(conn).map_err(Into::into)
	}
}
