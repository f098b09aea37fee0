use std::sync::Arc;

use bigdecimal::{BigDecimal, Signed};
use diesel::Connection;
use diesel::PgConnection;
use log::info;

use crate::account::{self, Account};
use crate::cache::{self, Cache};
use crate::db::PgPool;
use crate::error::{Error, ErrorKind};
use crate::ledger::{self, NewTransaction, Status, Transaction, TransactionStatus};
use crate::types::{Id, Result};

/// Parameter object for creating a new Service
pub struct NewService {
	pub db: PgPool,
	pub accounts: Arc<dyn account::Store>,
	pub ledger: Arc<dyn ledger::Store>,
	pub cache: Cache,
}

/// The transfer engine: the only code that mutates account balances
///
/// Every mutation runs inside one database transaction spanning the balance
/// writes and the ledger append, with the participant rows locked for the
/// duration. A failure at any step leaves every balance untouched and no
/// ledger row behind.
#[derive(Clone)]
pub struct Service {
	db: PgPool,
	accounts: Arc<dyn account::Store>,
	ledger: Arc<dyn ledger::Store>,
	cache: Cache,
}

impl Service {
	pub fn new(v: NewService) -> Self {
		Service {
			db: v.db,
			accounts: v.accounts,
			ledger: v.ledger,
			cache: v.cache,
		}
	}

	/// Move `amount` from the sender's account to the receiver's account,
	/// filing one ledger row under the sender
	///
	/// # Arguments
	/// * `sender_id` - account debited
	/// * `receiver_id` - account credited
	/// * `amount` - amount moved; must be positive
	/// * `name` - caller-supplied label recorded on the ledger row
	pub fn transfer_funds(
		&self,
		sender_id: Id,
		receiver_id: Id,
		amount: &BigDecimal,
		name: &str,
	) -> Result<Transaction> {
		if name.trim().is_empty() {
			return Err(Error::validation("Validation failed! All fields are required."));
		}
		if !amount.is_positive() {
			return Err(Error::validation("Amount must be a positive number."));
		}
		if sender_id == receiver_id {
			return Err(Error::validation("Sender and receiver must differ."));
		}

		let conn = self.db.get()?;
		let (entry, sender, receiver) = conn.transaction::<_, Error, _>(|| {
			let (sender, receiver) = self.lock_pair(&conn, sender_id, receiver_id)?;

			if sender.account_balance.lt(amount) {
				return Err(Error::new(ErrorKind::InsufficientFunds));
			}

			let sender_balance = &sender.account_balance - amount;
			let receiver_balance = &receiver.account_balance + amount;
			let sender = self.accounts.save_balance(&conn, sender.id, &sender_balance)?;
			let receiver = self.accounts.save_balance(&conn, receiver.id, &receiver_balance)?;

			let counterparty = receiver.account_number.to_string();
			let entry = self.ledger.append(&conn, NewTransaction {
				account_id: sender.id,
				amount,
				balance: &sender.account_balance,
				status: Status::Completed,
				transaction_status: TransactionStatus::Successful,
				account_number: &counterparty,
				name,
			})?;

			Ok((entry, sender, receiver))
		})?;

		info!(
			"transferred {} from account {} to account {}",
			amount, sender.id, receiver.id,
		);
		self.evict(&[&sender, &receiver])?;

		Ok(entry)
	}

	/// Credit cash handed over at the counter to the receiver's account
	///
	/// There is no debiting account; the ledger row carries the receiver's
	/// own account number as the counterparty
	pub fn deposit_from_counter(
		&self,
		receiver_id: Id,
		amount: &BigDecimal,
		name: &str,
	) -> Result<Transaction> {
		if name.trim().is_empty() {
			return Err(Error::validation("Receiver ID, Amount, and Name are required."));
		}
		if !amount.is_positive() {
			return Err(Error::validation("Amount must be a positive number."));
		}

		let conn = self.db.get()?;
		let (entry, receiver) = conn.transaction::<_, Error, _>(|| {
			let receiver = self
				.accounts
				.find_for_update(&conn, receiver_id)
				.map_err(|e| Error::not_found_or(e, "Receiver not found."))?;

			let balance = &receiver.account_balance + amount;
			let receiver = self.accounts.save_balance(&conn, receiver.id, &balance)?;

			let own_number = receiver.account_number.to_string();
			let entry = self.ledger.append(&conn, NewTransaction {
				account_id: receiver.id,
				amount,
				balance: &receiver.account_balance,
				status: Status::Completed,
				transaction_status: TransactionStatus::Successful,
				account_number: &own_number,
				name,
			})?;

			Ok((entry, receiver))
		})?;

		info!("deposited {} into account {} from the counter", amount, receiver.id);
		self.evict(&[&receiver])?;

		Ok(entry)
	}

	/// Locks both participant rows `FOR UPDATE`, always in ascending-id
	/// order so two opposing transfers cannot deadlock, and returns them as
	/// (sender, receiver)
	fn lock_pair(
		&self,
		conn: &PgConnection,
		sender_id: Id,
		receiver_id: Id,
	) -> Result<(Account, Account)> {
		let (first, second) = if sender_id < receiver_id {
			(sender_id, receiver_id)
		} else {
			(receiver_id, sender_id)
		};

		let first_account = self
			.accounts
			.find_for_update(conn, first)
			.map_err(|e| Error::not_found_or(e, "Sender or receiver not found."))?;
		let second_account = self
			.accounts
			.find_for_update(conn, second)
			.map_err(|e| Error::not_found_or(e, "Sender or receiver not found."))?;

		if first == sender_id {
			Ok((first_account, second_account))
		} else {
			Ok((second_account, first_account))
		}
	}

	/// Committed mutations leave cached lookups stale; eviction is part of
	/// the same logical operation, after commit
	fn evict(&self, touched: &[&Account]) -> Result<()> {
		let mut keys = vec![cache::ALL_ACCOUNTS_KEY.to_string()];
		for account in touched {
			keys.push(cache::account_key(account.id));
			keys.push(cache::username_key(&account.username));
		}

		self.cache.evict(&keys)
	}
}
