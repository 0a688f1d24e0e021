use std::{net::IpAddr, str::FromStr, time::Duration};

/// How many entries the query cache and each page cache hold before the
/// least recently updated are dropped.
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{name} has an invalid value: {value:?}")]
	Invalid { name: &'static str, value: String },
}

/// Runtime configuration, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
	/// Postgres connection string. Without one, everything is kept in memory.
	pub database_url: Option<String>,
	pub host: IpAddr,
	pub port: u16,
	/// How long a generated page is reused before it is built again.
	/// Pages are kept until restart when unset.
	pub page_revalidate: Option<Duration>,
	pub cache_capacity: usize,
	pub rate_limit_per_second: u64,
	pub rate_limit_burst: u32,
	/// Whether traces and metrics are exported over OTLP.
	pub otlp: bool,
}

impl Config {
	pub fn from_env() -> Result<Self, Error> {
		dotenvy::dotenv().ok();

		Self::from_lookup(|name| std::env::var(name).ok())
	}

	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
		Ok(Self {
			database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
			host: parse(&lookup, "HOST")?.unwrap_or(IpAddr::from([127, 0, 0, 1])),
			port: parse(&lookup, "PORT")?.unwrap_or(3000),
			page_revalidate: parse(&lookup, "PAGE_REVALIDATE_SECS")?.map(Duration::from_secs),
			cache_capacity: parse(&lookup, "CACHE_CAPACITY")?.unwrap_or(DEFAULT_CACHE_CAPACITY),
			rate_limit_per_second: parse(&lookup, "RATE_LIMIT_PER_SECOND")?.unwrap_or(10),
			rate_limit_burst: parse(&lookup, "RATE_LIMIT_BURST")?.unwrap_or(50),
			otlp: lookup("OTEL_EXPORTER_OTLP_ENDPOINT").is_some(),
		})
	}
}

fn parse<T: FromStr>(
	lookup: &impl Fn(&str) -> Option<String>,
	name: &'static str,
) -> Result<Option<T>, Error> {
	lookup(name)
		.map(|value| value.parse().map_err(|_| Error::Invalid { name, value }))
		.transpose()
}
