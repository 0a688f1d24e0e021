use std::{sync::Arc, time::Duration};

use axum::{
	body::Body,
	response::{IntoResponse, Response},
};
use governor::middleware::StateInformationMiddleware;
use tower_governor::{
	governor::{GovernorConfig, GovernorConfigBuilder},
	key_extractor::PeerIpKeyExtractor,
	GovernorError,
};

use crate::{config::Config, error::AppError};

pub type Limits = Arc<GovernorConfig<PeerIpKeyExtractor, StateInformationMiddleware>>;

/// Per-IP limits for every route, configured through [`Config`].
///
/// Returns `None` when the configured rate is zero, which the builder rejects.
pub fn from_config(config: &Config) -> Option<Limits> {
	GovernorConfigBuilder::default()
		.per_second(config.rate_limit_per_second)
		.burst_size(config.rate_limit_burst)
		.use_headers()
		.error_handler(error_handler)
		.finish()
		.map(Arc::new)
}

fn error_handler(error: GovernorError) -> Response<Body> {
	AppError::from(error).into_response()
}

/// Periodically drops limiter state for clients that have not been seen recently.
pub fn cleanup_old_limits(limits: &Limits) {
	let limiter = limits.limiter().clone();
	let interval = Duration::from_secs(60);

	std::thread::spawn(move || loop {
		std::thread::sleep(interval);

		tracing::debug!("rate limiting storage size: {}", limiter.len());

		limiter.retain_recent();
	});
}
