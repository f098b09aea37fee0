use std::sync::Arc;

use bigdecimal::BigDecimal;

use crate::db::PgPool;
use crate::error::Error;
use crate::ledger::{self, Transaction};
use crate::types::{Id, Result};

/// One page of a paginated transfer listing
#[derive(PartialEq, Debug)]
pub struct TransferPage {
	pub transfers: Vec<Transaction>,
	pub total: i64,
	pub page: i64,
	pub page_size: i64,
	pub total_pages: i64,
}

/// Read side of the ledger: paginated listings and range-filtered history,
/// always scoped to one owning account
#[derive(Clone)]
pub struct Service {
	db: PgPool,
	ledger: Arc<dyn ledger::Store>,
}

impl Service {
	pub fn new(db: PgPool, ledger: Arc<dyn ledger::Store>) -> Self {
		Service { db, ledger }
	}

	/// Newest-first page of the owner's ledger rows
	///
	/// A page past the end of the data comes back empty but with the same
	/// `total`
	pub fn list_transfers(&self, owner: Id, page: i64, page_size: i64) -> Result<TransferPage> {
		if page < 1 || page_size < 1 {
			return Err(Error::validation("Validation failed: Invalid query parameters"));
		}

		let conn = self.db.get()?;
		let (transfers, total) =
			self.ledger
				.page_for_account(&conn, owner, (page - 1) * page_size, page_size)?;

		Ok(TransferPage {
			transfers,
			total,
			page,
			page_size,
			total_pages: total_pages(total, page_size),
		})
	}

	/// Every ledger row of the owner whose amount lies inside the inclusive
	/// bounds; either bound may be absent
	pub fn history(
		&self,
		owner: Id,
		min_amount: Option<&BigDecimal>,
		max_amount: Option<&BigDecimal>,
	) -> Result<Vec<Transaction>> {
		let conn = self.db.get()?;
		self.ledger
			.filtered_for_account(&conn, owner, min_amount, max_amount)
			.map_err(Into::into)
	}
}

fn total_pages(total: i64, page_size: i64) -> i64 {
	(total + page_size - 1) / page_size
}

#[cfg(test)]
mod tests {
	use super::total_pages;

	#[test]
	fn page_count_rounds_up() {
		assert_eq!(total_pages(0, 10), 0);
		assert_eq!(total_pages(1, 10), 1);
		assert_eq!(total_pages(10, 10), 1);
		assert_eq!(total_pages(11, 10), 2);
		assert_eq!(total_pages(25, 10), 3);
	}
}
