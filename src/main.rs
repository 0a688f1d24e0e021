#![warn(clippy::pedantic)]

mod config;
mod error;
mod extract;
mod openapi;
mod page;
mod query;
mod ratelimit;
mod route;
mod session;
mod store;
mod trace;
mod view;

use std::{net::SocketAddr, sync::Arc};

use aide::{axum::ApiRouter, openapi::OpenApi};
use argon2::Argon2;
use axum::{Extension, Router};
use tower_governor::GovernorLayer;
use tower_http::{
	compression::CompressionLayer,
	request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
	trace::TraceLayer,
};

use crate::{
	config::Config,
	page::Pages,
	query::QueryClient,
	store::{MemoryStore, SharedStore},
};

pub type Database = sqlx::Pool<sqlx::Postgres>;
pub type AppState = State;

/// The shared application state.
///
/// Pages and routes read through `queries`, which sits in front of `store`.
/// Every field can be extracted on its own with `State<T>`.
#[derive(Clone, axum::extract::FromRef)]
pub struct State {
	pub store: SharedStore,
	pub queries: QueryClient,
	pub pages: Pages,
	pub hasher: Argon2<'static>,
}

#[derive(Debug, thiserror::Error)]
enum Error {
	#[error(transparent)]
	Config(#[from] config::Error),
	#[error(transparent)]
	Trace(#[from] trace::Error),
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),
	#[error("migration error: {0}")]
	Migrate(#[from] sqlx::migrate::MigrateError),
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
}

/// Builds the full application: the JSON API, its documentation and the pages.
pub fn router(state: State) -> Router {
	let mut api = OpenApi::default();

	ApiRouter::new()
		.nest("/api/auth", route::auth::routes())
		.nest("/api/posts", route::post::routes())
		.nest("/api/profile", route::profile::routes())
		.nest_api_service("/docs", route::docs::routes())
		.finish_api_with(&mut api, openapi::docs)
		// The pages are not part of the API documentation
		.merge(page::routes())
		.layer(Extension(Arc::new(api)))
		.layer(CompressionLayer::new())
		.layer(PropagateRequestIdLayer::x_request_id())
		.layer(TraceLayer::new_for_http())
		.layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
		.with_state(state)
}

async fn connect(config: &Config) -> Result<SharedStore, Error> {
	let Some(ref url) = config.database_url else {
		tracing::warn!("DATABASE_URL is not set, keeping everything in memory");

		return Ok(Arc::new(MemoryStore::default()));
	};

	let pool = Database::connect(url).await?;

	sqlx::migrate!().run(&pool).await?;

	Ok(Arc::new(pool))
}

async fn shutdown_signal() {
	if let Err(error) = tokio::signal::ctrl_c().await {
		tracing::error!(%error, "failed to listen for shutdown signal");
	}

	tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> Result<(), Error> {
	let config = Config::from_env()?;

	let _guard = if config.otlp {
		Some(trace::init_tracing_subscriber()?)
	} else {
		trace::init_logging();
		None
	};

	let store = connect(&config).await?;
	let state = State {
		queries: QueryClient::with_capacity(store.clone(), config.cache_capacity),
		pages: Pages::new(config.page_revalidate, config.cache_capacity),
		hasher: Argon2::default(),
		store,
	};

	let mut app = router(state);

	if let Some(limits) = ratelimit::from_config(&config) {
		ratelimit::cleanup_old_limits(&limits);

		app = app.layer(GovernorLayer { config: limits });
	} else {
		tracing::warn!("rate limiting is disabled");
	}

	let listener = tokio::net::TcpListener::bind((config.host, config.port)).await?;

	tracing::info!("listening on {}", listener.local_addr()?);

	axum::serve(
		listener,
		app.into_make_service_with_connect_info::<SocketAddr>(),
	)
	.with_graceful_shutdown(shutdown_signal())
	.await?;

	Ok(())
}
