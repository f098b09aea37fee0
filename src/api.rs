use std::convert::Infallible;
use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use log::error;
use serde::{Deserialize, Serialize};
use warp::{Filter, Rejection, Reply};
use warp::http::StatusCode;

use crate::account::{self, Profile, Signup};
use crate::auth;
use crate::db::PgPool;
use crate::error::{Error, ErrorKind};
use crate::history;
use crate::ledger::{Status, Transaction, TransactionStatus};
use crate::lookup;
use crate::transfer;
use crate::types::{Id, Result, Time};

/// Handles shared by every route; built once in `main` and cloned per request
#[derive(Clone)]
pub struct State {
	pub db: PgPool,
	pub accounts: Arc<dyn account::Store>,
	pub transfers: transfer::Service,
	pub history: history::Service,
	pub lookup: lookup::Service,
	pub token_secret: String,
}

pub fn routes(state: State) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
	let register = warp::path!("api" / "register")
		.and(warp::post())
		.and(warp::body::json())
		.and(with_state(state.clone()))
		.and_then(handlers::register);

	let login = warp::path!("api" / "login")
		.and(warp::post())
		.and(warp::body::json())
		.and(with_state(state.clone()))
		.and_then(handlers::login);

	let change_password = warp::path!("api" / "change-password" / Id)
		.and(warp::put())
		.and(authenticated(&state))
		.and(warp::body::json())
		.and(with_state(state.clone()))
		.and_then(handlers::change_password);

	let account_by_username = warp::path!("api" / "users" / "username" / String)
		.and(warp::get())
		.and(authenticated(&state))
		.and(with_state(state.clone()))
		.and_then(handlers::account_by_username);

	let account_by_id = warp::path!("api" / "users" / Id)
		.and(warp::get())
		.and(authenticated(&state))
		.and(with_state(state.clone()))
		.and_then(handlers::account_by_id);

	let list_accounts = warp::path!("api" / "users")
		.and(warp::get())
		.and(authenticated(&state))
		.and(with_state(state.clone()))
		.and_then(handlers::list_accounts);

	let transfer = warp::path!("api" / "transactions" / "transfer")
		.and(warp::post())
		.and(authenticated(&state))
		.and(warp::body::json())
		.and(with_state(state.clone()))
		.and_then(handlers::transfer);

	let send_from_counter = warp::path!("api" / "transactions" / "sendFromCounter")
		.and(warp::post())
		.and(authenticated(&state))
		.and(warp::body::json())
		.and(with_state(state.clone()))
		.and_then(handlers::send_from_counter);

	let list_transfers = warp::path!("api" / "transactions" / "transfers")
		.and(warp::get())
		.and(authenticated(&state))
		.and(warp::query::<ListTransfersQuery>())
		.and(with_state(state.clone()))
		.and_then(handlers::list_transfers);

	let transfer_history = warp::path!("api" / "transactions" / "transfer-history" / String)
		.and(warp::get())
		.and(authenticated(&state))
		.and(warp::query::<HistoryQuery>())
		.and(with_state(state))
		.and_then(handlers::transfer_history);

	register
		.or(login)
		.or(change_password)
		.or(account_by_username)
		.or(account_by_id)
		.or(list_accounts)
		.or(transfer)
		.or(send_from_counter)
		.or(list_transfers)
		.or(transfer_history)
		.recover(handle_rejection)
}

fn with_state(state: State) -> impl Filter<Extract = (State,), Error = Infallible> + Clone {
	warp::any().map(move || state.clone())
}

/// Extracts and verifies the bearer token, yielding the authenticated
/// account id
fn authenticated(state: &State) -> impl Filter<Extract = (Id,), Error = Rejection> + Clone {
	let secret = state.token_secret.clone();
	warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
		let secret = secret.clone();
		async move {
			match header.as_deref().and_then(bearer_token) {
				Some(token) => auth::verify_token(token, &secret)
					.map_err(|_| warp::reject::custom(AuthRejection)),
				None => Err(warp::reject::custom(AuthRejection)),
			}
		}
	})
}

fn bearer_token(header: &str) -> Option<&str> {
	header
		.strip_prefix("Bearer ")
		.or_else(|| header.strip_prefix("bearer "))
}

#[derive(Debug)]
struct AuthRejection;

impl warp::reject::Reject for AuthRejection {}

// request DTOs

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
	pub sender_id: Option<Id>,
	pub receiver_id: Option<Id>,
	pub amount: Option<BigDecimal>,
	pub name: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CounterRequest {
	pub receiver_id: Option<Id>,
	pub amount: Option<BigDecimal>,
	pub name: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
	pub email: Option<String>,
	pub username: Option<String>,
	pub password: Option<String>,
	pub first_name: Option<String>,
	pub last_name: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct LoginRequest {
	pub email: Option<String>,
	pub password: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
	pub current_password: Option<String>,
	pub new_password: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ListTransfersQuery {
	pub user_id: Option<String>,
	pub page: Option<String>,
	pub page_size: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
	pub min_amount: Option<String>,
	pub max_amount: Option<String>,
}

// response shapes

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TransactionView {
	id: Id,
	amount: BigDecimal,
	balance: BigDecimal,
	status: Status,
	transaction_status: TransactionStatus,
	account_number: String,
	name: String,
}

impl From<&Transaction> for TransactionView {
	fn from(entry: &Transaction) -> Self {
		TransactionView {
			id: entry.id,
			amount: entry.amount.clone(),
			balance: entry.balance.clone(),
			status: entry.status,
			transaction_status: entry.transaction_status,
			account_number: entry.account_number.clone(),
			name: entry.name.clone(),
		}
	}
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TransferListItem {
	id: Id,
	amount: BigDecimal,
	balance: BigDecimal,
	status: Status,
	transaction_status: TransactionStatus,
	created_at: Time,
	updated_at: Time,
}

impl From<&Transaction> for TransferListItem {
	fn from(entry: &Transaction) -> Self {
		TransferListItem {
			id: entry.id,
			amount: entry.amount.clone(),
			balance: entry.balance.clone(),
			status: entry.status,
			transaction_status: entry.transaction_status,
			created_at: entry.created_at,
			updated_at: entry.updated_at,
		}
	}
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TransferPageResponse {
	transfers: Vec<TransferListItem>,
	total: i64,
	page: i64,
	page_size: i64,
	total_pages: i64,
}

#[derive(Serialize)]
struct TransferResponse {
	msg: &'static str,
	transaction: TransactionView,
}

#[derive(Serialize)]
struct CounterResponse {
	msg: &'static str,
	transaction: Transaction,
}

#[derive(Serialize)]
struct RegisterResponse {
	user: Profile,
	token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
	message: &'static str,
	token: String,
	user_details: Profile,
}

mod handlers {
	use super::*;

	pub async fn register(
		body: RegisterRequest,
		state: State,
	) -> std::result::Result<HttpReply, Infallible> {
		let (email, username, password, first_name, last_name) = match (
			body.email,
			body.username,
			body.password,
			body.first_name,
			body.last_name,
		) {
			(Some(e), Some(u), Some(p), Some(f), Some(l)) => (e, u, p, f, l),
			_ => {
				return Ok(error_reply(&Error::validation(
					"Validation failed! All fields are required.",
				)))
			}
		};

		let result = run_blocking(move || {
			let conn = state.db.get()?;
			let account = account::open_account(&conn, state.accounts.as_ref(), Signup {
				email: &email,
				username: &username,
				password: &password,
				first_name: &first_name,
				last_name: &last_name,
			})?;
			let token = auth::issue_token(account.id, &state.token_secret)?;

			Ok((Profile::from(&account), token))
		})
		.await;

		match result {
			Ok((user, token)) => Ok(json_reply(
				StatusCode::CREATED,
				&RegisterResponse { user, token },
			)),
			Err(e) => Ok(error_reply(&e)),
		}
	}

	pub async fn login(
		body: LoginRequest,
		state: State,
	) -> std::result::Result<HttpReply, Infallible> {
		let (email, password) = match (body.email, body.password) {
			(Some(e), Some(p)) => (e, p),
			_ => {
				return Ok(error_reply(&Error::validation(
					"Validation failed! All fields are required.",
				)))
			}
		};

		let result = run_blocking(move || {
			let conn = state.db.get()?;
			let account = state
				.accounts
				.find_by_email(&conn, &email)
				.map_err(|e| match e {
					crate::db::Error::RecordNotFound => Error::unauthorized("Invalid credentials"),
					other => Error::from(other),
				})?;

			if !account::verify_password(&account, &password)? {
				return Err(Error::unauthorized("Invalid credentials"));
			}

			let token = auth::issue_token(account.id, &state.token_secret)?;
			Ok(LoginResponse {
				message: "Successfully logged in",
				token,
				user_details: Profile::from(&account),
			})
		})
		.await;

		match result {
			Ok(response) => Ok(json_reply(StatusCode::OK, &response)),
			Err(e) => Ok(error_reply(&e)),
		}
	}

	pub async fn change_password(
		account_id: Id,
		_viewer: Id,
		body: ChangePasswordRequest,
		state: State,
	) -> std::result::Result<HttpReply, Infallible> {
		let (current, new) = match (body.current_password, body.new_password) {
			(Some(c), Some(n)) => (c, n),
			_ => {
				return Ok(error_reply(&Error::validation(
					"Current password and new password are required",
				)))
			}
		};

		let result = run_blocking(move || {
			let conn = state.db.get()?;
			let account = state
				.accounts
				.find_by_id(&conn, account_id)
				.map_err(|e| Error::not_found_or(e, "User not found"))?;

			if !account::verify_password(&account, &current)? {
				return Err(Error::unauthorized("Current password is incorrect"));
			}

			let hash = account::hash_password(&new)?;
			state.accounts.save_password(&conn, account.id, &hash)?;

			Ok(())
		})
		.await;

		match result {
			Ok(()) => Ok(json_reply(StatusCode::OK, &"Password changed successfully")),
			Err(e) => Ok(error_reply(&e)),
		}
	}

	pub async fn account_by_id(
		id: Id,
		_viewer: Id,
		state: State,
	) -> std::result::Result<HttpReply, Infallible> {
		match run_blocking(move || state.lookup.account_by_id(id)).await {
			Ok(profile) => Ok(json_reply(StatusCode::OK, &profile)),
			Err(e) => Ok(error_reply(&e)),
		}
	}

	pub async fn account_by_username(
		username: String,
		_viewer: Id,
		state: State,
	) -> std::result::Result<HttpReply, Infallible> {
		match run_blocking(move || state.lookup.account_by_username(&username)).await {
			Ok(profile) => Ok(json_reply(StatusCode::OK, &profile)),
			Err(e) => Ok(error_reply(&e)),
		}
	}

	pub async fn list_accounts(
		_viewer: Id,
		state: State,
	) -> std::result::Result<HttpReply, Infallible> {
		match run_blocking(move || state.lookup.accounts()).await {
			Ok(profiles) => Ok(json_reply(StatusCode::OK, &profiles)),
			Err(e) => Ok(error_reply(&e)),
		}
	}

	pub async fn transfer(
		_viewer: Id,
		body: TransferRequest,
		state: State,
	) -> std::result::Result<HttpReply, Infallible> {
		let (sender_id, receiver_id, amount, name) =
			match (body.sender_id, body.receiver_id, body.amount, body.name) {
				(Some(s), Some(r), Some(a), Some(n)) => (s, r, a, n),
				_ => {
					return Ok(error_reply(&Error::validation(
						"Validation failed! All fields are required.",
					)))
				}
			};

		let result = run_blocking(move || {
			state
				.transfers
				.transfer_funds(sender_id, receiver_id, &amount, &name)
		})
		.await;

		match result {
			Ok(entry) => Ok(json_reply(StatusCode::CREATED, &TransferResponse {
				msg: "Transfer completed successfully",
				transaction: TransactionView::from(&entry),
			})),
			Err(e) => Ok(error_reply(&e)),
		}
	}

	pub async fn send_from_counter(
		_viewer: Id,
		body: CounterRequest,
		state: State,
	) -> std::result::Result<HttpReply, Infallible> {
		let (receiver_id, amount, name) = match (body.receiver_id, body.amount, body.name) {
			(Some(r), Some(a), Some(n)) => (r, a, n),
			_ => {
				return Ok(error_reply(&Error::validation(
					"Receiver ID, Amount, and Name are required.",
				)))
			}
		};

		let result = run_blocking(move || {
			state
				.transfers
				.deposit_from_counter(receiver_id, &amount, &name)
		})
		.await;

		match result {
			Ok(entry) => Ok(json_reply(StatusCode::CREATED, &CounterResponse {
				msg: "Money sent successfully from counter",
				transaction: entry,
			})),
			Err(e) => Ok(error_reply(&e)),
		}
	}

	pub async fn list_transfers(
		_viewer: Id,
		query: ListTransfersQuery,
		state: State,
	) -> std::result::Result<HttpReply, Infallible> {
		let user_id = query.user_id.and_then(|v| v.parse::<Id>().ok());
		// absent page means the first one; anything non-numeric is rejected
		let page = match query.page {
			None => Some(1),
			Some(v) => v.parse::<i64>().ok(),
		};
		let page_size = query.page_size.and_then(|v| v.parse::<i64>().ok());

		let (user_id, page, page_size) = match (user_id, page, page_size) {
			(Some(u), Some(p), Some(s)) => (u, p, s),
			_ => {
				return Ok(error_reply(&Error::validation(
					"Validation failed: Invalid query parameters",
				)))
			}
		};

		let result =
			run_blocking(move || state.history.list_transfers(user_id, page, page_size)).await;

		match result {
			Ok(page) => Ok(json_reply(StatusCode::OK, &TransferPageResponse {
				transfers: page.transfers.iter().map(TransferListItem::from).collect(),
				total: page.total,
				page: page.page,
				page_size: page.page_size,
				total_pages: page.total_pages,
			})),
			Err(e) => Ok(error_reply(&e)),
		}
	}

	pub async fn transfer_history(
		user_id: String,
		_viewer: Id,
		query: HistoryQuery,
		state: State,
	) -> std::result::Result<HttpReply, Infallible> {
		let user_id = match user_id.parse::<Id>() {
			Ok(v) => v,
			Err(_) => return Ok(error_reply(&Error::validation("Invalid userId"))),
		};

		let min_amount = match parse_bound(query.min_amount) {
			Ok(v) => v,
			Err(e) => return Ok(error_reply(&e)),
		};
		let max_amount = match parse_bound(query.max_amount) {
			Ok(v) => v,
			Err(e) => return Ok(error_reply(&e)),
		};

		let result = run_blocking(move || {
			state
				.history
				.history(user_id, min_amount.as_ref(), max_amount.as_ref())
		})
		.await;

		match result {
			Ok(entries) => Ok(json_reply(StatusCode::OK, &entries)),
			Err(e) => Ok(error_reply(&e)),
		}
	}
}

/// Optional amount bound from a query string
fn parse_bound(raw: Option<String>) -> Result<Option<BigDecimal>> {
	match raw {
		None => Ok(None),
		Some(v) => BigDecimal::from_str(&v)
			.map(Some)
			.map_err(|_| Error::validation("Validation failed: Invalid query parameters")),
	}
}

type HttpReply = warp::reply::WithStatus<warp::reply::Json>;

fn json_reply<T: Serialize>(status: StatusCode, body: &T) -> HttpReply {
	warp::reply::with_status(warp::reply::json(body), status)
}

fn error_reply(err: &Error) -> HttpReply {
	let status = match err.kind() {
		ErrorKind::Validation(_) | ErrorKind::InsufficientFunds => StatusCode::BAD_REQUEST,
		ErrorKind::NotFound(_) => StatusCode::NOT_FOUND,
		ErrorKind::Unauthorized(_) => StatusCode::UNAUTHORIZED,
		ErrorKind::Database(_) | ErrorKind::Cache(_) | ErrorKind::Internal(_) => {
			StatusCode::INTERNAL_SERVER_ERROR
		}
	};

	if status == StatusCode::INTERNAL_SERVER_ERROR {
		error!("request failed: {}", err);
	}

	json_reply(status, &serde_json::json!({ "error": err.to_string() }))
}

async fn handle_rejection(err: Rejection) -> std::result::Result<impl Reply, Infallible> {
	let (status, message) = if err.is_not_found() {
		(StatusCode::NOT_FOUND, "Not found".to_string())
	} else if err.find::<AuthRejection>().is_some() {
		(StatusCode::UNAUTHORIZED, "Invalid or missing token".to_string())
	} else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
		(StatusCode::BAD_REQUEST, e.to_string())
	} else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
		(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
	} else {
		error!("unhandled rejection: {:?}", err);
		(StatusCode::INTERNAL_SERVER_ERROR, "Unexpected error".to_string())
	};

	Ok(json_reply(status, &serde_json::json!({ "error": message })))
}

/// Diesel and redis calls block; hop them off the request executor
async fn run_blocking<T, F>(f: F) -> Result<T>
where
	F: FnOnce() -> Result<T> + Send + 'static,
	T: Send + 'static,
{
	match tokio::task::spawn_blocking(f).await {
		Ok(result) => result,
		Err(e) => Err(Error::new(ErrorKind::Internal(format!(
			"blocking task failed: {}",
			e
		)))),
	}
}
