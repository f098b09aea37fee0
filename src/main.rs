use std::env;
use std::sync::Arc;

use dotenv::dotenv;
use log::*;
use warp::Filter;
use warp::filters::log::Info;

use remit_api::{account, api, cache::Cache, db, history, ledger, lookup, transfer};

#[tokio::main]
async fn main() {
	dotenv().ok();
	if env::var("RUST_LOG").is_err() {
		env::set_var("RUST_LOG", "info");
	}
	pretty_env_logger::init();

	let db = db::pg_connection();
	let redis_url = env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());
	let cache = Cache::connect(&redis_url).expect("opening redis client");
	let token_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

	let accounts: Arc<dyn account::Store> = Arc::new(account::Repo);
	let ledger: Arc<dyn ledger::Store> = Arc::new(ledger::Repo);

	let transfers = transfer::Service::new(transfer::NewService {
		db: db.clone(),
		accounts: accounts.clone(),
		ledger: ledger.clone(),
		cache: cache.clone(),
	});
	let history = history::Service::new(db.clone(), ledger.clone());
	let lookup = lookup::Service::new(db.clone(), accounts.clone(), cache.clone());

	let state = api::State {
		db,
		accounts,
		transfers,
		history,
		lookup,
		token_secret,
	};

	let log = warp::log::custom(|info: Info| {
		info!(
			target: "remit::api",
			"\"{} {} {:?}\" \t{} {} {:?}",
			info.method(),
			info.path(),
			info.version(),
			info.status().canonical_reason().unwrap_or_else(|| "-"),
			info.status().as_u16(),
			info.elapsed(),
		);
	});

	let port: u16 = env::var("PORT")
		.ok()
		.and_then(|p| p.parse().ok())
		.unwrap_or(3000);

	let routes = api::routes(state).with(log);
	warp::serve(routes).run(([127, 0, 0, 1], port)).await;
}
