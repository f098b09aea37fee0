mod common;

use bigdecimal::BigDecimal;
use chrono::{Datelike, Utc};

use remit_api::*;
use remit_api::account::{self, Signup};
use remit_api::db;
use remit_api::ledger::{NewTransaction, Status, Transaction, TransactionStatus};

use crate::common::{Suite, unique_name};

#[test]
fn account_lookups() {
	let suite = Suite::setup();
	let account = suite.fixture.account("bob", 500);
	let conn = suite.fixture.conn();

	let by_id = suite.accounts.find_by_id(&conn, account.id).unwrap();
	assert_eq!(by_id, account);

	let by_username = suite
		.accounts
		.find_by_username(&conn, &account.username)
		.unwrap();
	assert_eq!(by_username, account);

	let by_email = suite.accounts.find_by_email(&conn, &account.email).unwrap();
	assert_eq!(by_email, account);

	let by_number = suite
		.accounts
		.find_by_account_number(&conn, account.account_number)
		.unwrap();
	assert_eq!(by_number, account);

	assert_eq!(
		suite.accounts.find_by_id(&conn, -1).unwrap_err(),
		db::Error::RecordNotFound,
	);
}

#[test]
fn save_balance_touches_only_the_balance() {
	let suite = Suite::setup();
	let account = suite.fixture.account("bob", 500);
	let conn = suite.fixture.conn();

	let updated = suite
		.accounts
		.save_balance(&conn, account.id, &BigDecimal::from(123))
		.unwrap();

	assert_eq!(updated.account_balance, BigDecimal::from(123));
	assert_eq!(updated.username, account.username);
	assert_eq!(updated.account_number, account.account_number);
	assert_eq!(updated.created_at, account.created_at);
	assert!(updated.updated_at >= account.updated_at);
}

#[test]
fn duplicate_username_violates_unique_constraint() {
	let suite = Suite::setup();
	let account = suite.fixture.account("bob", 0);
	let conn = suite.fixture.conn();

	let err = suite
		.accounts
		.create(&conn, account::NewAccount {
			email: &format!("{}@elsewhere.com", account.username),
			username: &account.username,
			password: "unused-in-this-test",
			first_name: "Test",
			last_name: "User",
			account_number: account::generate_account_number(),
			account_balance: BigDecimal::from(0),
		})
		.unwrap_err();

	assert_eq!(err, db::Error::RecordAlreadyExists);
}

#[test]
fn open_account_hashes_password_and_starts_at_zero() {
	let suite = Suite::setup();
	let conn = suite.fixture.conn();
	let username = unique_name("jane");
	let email = format!("{}@gmail.com", username);

	let account = account::open_account(&conn, suite.accounts.as_ref(), Signup {
		email: &email,
		username: &username,
		password: "correct horse battery",
		first_name: "Jane",
		last_name: "Doe",
	})
	.unwrap();

	assert_eq!(account.account_balance, BigDecimal::from(0));
	assert_ne!(account.password, "correct horse battery");
	assert!(account::verify_password(&account, "correct horse battery").unwrap());
	assert!(!account::verify_password(&account, "wrong horse").unwrap());

	// year prefix plus six random digits
	assert_eq!(account.account_number / 1_000_000, Utc::now().year() as i64);
}

#[test]
fn open_account_rejects_duplicate_email() {
	let suite = Suite::setup();
	let conn = suite.fixture.conn();
	let email = format!("{}@gmail.com", unique_name("jane"));

	let first = unique_name("jane");
	account::open_account(&conn, suite.accounts.as_ref(), Signup {
		email: &email,
		username: &first,
		password: "correct horse battery",
		first_name: "Jane",
		last_name: "Doe",
	})
	.unwrap();

	let second = unique_name("jane");
	let err = account::open_account(&conn, suite.accounts.as_ref(), Signup {
		email: &email,
		username: &second,
		password: "correct horse battery",
		first_name: "Jane",
		last_name: "Doe",
	})
	.unwrap_err();
	assert_eq!(err, Error::new(ErrorKind::Database(db::Error::RecordAlreadyExists)));
}

#[test]
fn append_writes_the_row_as_given() {
	let suite = Suite::setup();
	let owner = suite.fixture.account("bob", 400);
	let conn = suite.fixture.conn();

	let amount = BigDecimal::from(250);
	let balance = BigDecimal::from(150);
	let got = suite
		.ledger
		.append(&conn, NewTransaction {
			account_id: owner.id,
			amount: &amount,
			balance: &balance,
			status: Status::Completed,
			transaction_status: TransactionStatus::Successful,
			account_number: "2024123456",
			name: "Jane",
		})
		.unwrap();

	let want = Transaction {
		id: got.id,
		account_id: owner.id,
		amount,
		balance,
		status: Status::Completed,
		transaction_status: TransactionStatus::Successful,
		account_number: "2024123456".to_string(),
		name: "Jane".to_string(),
		created_at: got.created_at,
		updated_at: got.updated_at,
	};

	assert_eq!(got, want);
}

#[test]
fn page_offsets_and_counts() {
	let suite = Suite::setup();
	let owner = suite.fixture.account("bob", 0);
	let conn = suite.fixture.conn();

	let balance = BigDecimal::from(0);
	for n in 1..=5 {
		suite
			.ledger
			.append(&conn, NewTransaction {
				account_id: owner.id,
				amount: &BigDecimal::from(n),
				balance: &balance,
				status: Status::Completed,
				transaction_status: TransactionStatus::Successful,
				account_number: "2024123456",
				name: "Counter",
			})
			.unwrap();
	}

	let (rows, total) = suite.ledger.page_for_account(&conn, owner.id, 0, 3).unwrap();
	assert_eq!(rows.len(), 3);
	assert_eq!(total, 5);

	let (rows, total) = suite.ledger.page_for_account(&conn, owner.id, 3, 3).unwrap();
	assert_eq!(rows.len(), 2);
	assert_eq!(total, 5);

	let (rows, total) = suite.ledger.page_for_account(&conn, owner.id, 6, 3).unwrap();
	assert!(rows.is_empty());
	assert_eq!(total, 5);
}
