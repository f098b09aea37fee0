use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind};
use crate::types::{Id, Result};

/// Tokens expire two days after issue
pub const TOKEN_TTL_SECONDS: i64 = 60 * 60 * 24 * 2;

#[derive(Serialize, Deserialize, Debug)]
pub struct Claims {
	/// The authenticated account's id
	pub sub: String,
	pub exp: i64,
}

pub fn issue_token(account_id: Id, secret: &str) -> Result<String> {
	let claims = Claims {
		sub: account_id.to_string(),
		exp: Utc::now().timestamp() + TOKEN_TTL_SECONDS,
	};

	encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
		.map_err(|e| Error::new(ErrorKind::Internal(format!("signing token: {}", e))))
}

/// Checks signature and expiry, returning the account id the token was
/// issued for
pub fn verify_token(token: &str, secret: &str) -> Result<Id> {
	let data = decode::<Claims>(
		token,
		&DecodingKey::from_secret(secret.as_bytes()),
		&Validation::new(Algorithm::HS256),
	)
	.map_err(|_| Error::unauthorized("Invalid or expired token"))?;

	data.claims
		.sub
		.parse::<Id>()
		.map_err(|_| Error::unauthorized("Invalid or expired token"))
}

#[cfg(test)]
mod tests {
	use super::*;

	const SECRET: &str = "test-secret";

	#[test]
	fn token_round_trip() {
		let token = issue_token(7, SECRET).unwrap();
		assert_eq!(verify_token(&token, SECRET).unwrap(), 7);
	}

	#[test]
	fn rejects_wrong_secret() {
		let token = issue_token(7, SECRET).unwrap();
		assert!(verify_token(&token, "other-secret").is_err());
	}

	#[test]
	fn rejects_garbage() {
		assert!(verify_token("not-a-token", SECRET).is_err());
	}
}
