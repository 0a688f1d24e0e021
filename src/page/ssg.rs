//! Pages built ahead of rendering from a fresh query client.
//!
//! Building a page reads its route parameters into props, prefetches the
//! queries the page reads first and keeps `{ props, snapshot }`. Nothing is
//! built before the first request for a path; after that the payload is
//! reused until it is invalidated, older than the revalidation period or
//! evicted to keep the cache within its capacity.

use std::{
	collections::HashMap,
	hash::Hash,
	sync::{
		atomic::{AtomicU64, Ordering},
		Arc,
	},
	time::{Duration, Instant},
};

use dashmap::DashMap;
use serde::Serialize;

use super::Error;
use crate::{
	query::{GetById, GetUserByUsername, QueryClient, Snapshot},
	store::SharedStore,
};

/// A query client for building pages. Pages are shared between visitors, so
/// it never has a signed-in user.
pub fn generate_ssg_helper(store: SharedStore) -> QueryClient {
	QueryClient::new(store)
}

/// A page whose data can be fetched before it is rendered.
#[axum::async_trait]
pub trait StaticPage: Clone + Eq + Hash + Send + Sync + 'static {
	/// The route pattern, used to label build metrics.
	const ROUTE: &'static str;

	/// Reads the props from the route parameters. A missing parameter means
	/// the page was mounted on the wrong route, which is not a 404.
	fn from_params(params: &HashMap<String, String>) -> Result<Self, Error>;

	async fn prefetch(&self, ssg: &QueryClient);
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ProfileProps {
	pub username: String,
}

#[axum::async_trait]
impl StaticPage for ProfileProps {
	const ROUTE: &'static str = "/:slug";

	fn from_params(params: &HashMap<String, String>) -> Result<Self, Error> {
		let slug = params.get("slug").ok_or(Error::MissingParam("slug"))?;

		// Only the first `@` is removed, wherever it is
		Ok(Self {
			username: slug.replacen('@', "", 1),
		})
	}

	async fn prefetch(&self, ssg: &QueryClient) {
		ssg.prefetch(&GetUserByUsername {
			username: self.username.clone(),
		})
		.await;
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PostProps {
	pub id: String,
}

#[axum::async_trait]
impl StaticPage for PostProps {
	const ROUTE: &'static str = "/post/:id";

	fn from_params(params: &HashMap<String, String>) -> Result<Self, Error> {
		let id = params.get("id").ok_or(Error::MissingParam("id"))?;

		Ok(Self { id: id.clone() })
	}

	async fn prefetch(&self, ssg: &QueryClient) {
		ssg.prefetch(&GetById {
			id: self.id.clone(),
		})
		.await;
	}
}

/// What a page is rendered from.
#[derive(Debug, Clone, Serialize)]
pub struct Payload<P> {
	pub props: P,
	pub snapshot: Snapshot,
}

/// Builds the payload of a page with a fresh query client.
pub async fn get_static_props<P: StaticPage>(
	store: SharedStore,
	params: &HashMap<String, String>,
) -> Result<Payload<P>, Error> {
	let props = P::from_params(params)?;
	let ssg = generate_ssg_helper(store);

	props.prefetch(&ssg).await;

	Ok(Payload {
		snapshot: ssg.dehydrate(),
		props,
	})
}

#[derive(Debug, Clone)]
struct Built<P> {
	payload: Payload<P>,
	at: Instant,
}

/// Built pages of one kind, keyed by their props.
#[derive(Clone)]
pub struct PageCache<P> {
	pages: Arc<DashMap<P, Built<P>>>,
	/// Bumped on every invalidation, so a build that started before one is
	/// not kept.
	generation: Arc<AtomicU64>,
	revalidate: Option<Duration>,
	capacity: usize,
}

impl<P: StaticPage> PageCache<P> {
	pub fn new(revalidate: Option<Duration>, capacity: usize) -> Self {
		Self {
			pages: Arc::new(DashMap::new()),
			generation: Arc::new(AtomicU64::new(0)),
			revalidate,
			capacity: capacity.max(1),
		}
	}

	fn is_fresh(&self, built: &Built<P>) -> bool {
		self.revalidate
			.map_or(true, |revalidate| built.at.elapsed() < revalidate)
	}

	/// Returns the built page for the route parameters, building it first when
	/// there is none or it is due for revalidation. Concurrent builds of the
	/// same page may race, the last one is kept.
	pub async fn get_or_build(
		&self,
		store: &SharedStore,
		params: &HashMap<String, String>,
	) -> Result<Payload<P>, Error> {
		let props = P::from_params(params)?;

		if let Some(built) = self.pages.get(&props) {
			if self.is_fresh(&built) {
				return Ok(built.payload.clone());
			}
		}

		let generation = self.generation.load(Ordering::SeqCst);
		let start = Instant::now();
		let payload = get_static_props::<P>(store.clone(), params).await?;
		let elapsed = start.elapsed();

		tracing::info!(
			histogram.page_build_ms = elapsed.as_secs_f64() * 1000.0,
			route = P::ROUTE,
			queries = payload.snapshot.queries.len(),
			"built page"
		);

		if self.generation.load(Ordering::SeqCst) == generation {
			self.pages.insert(
				props,
				Built {
					payload: payload.clone(),
					at: start,
				},
			);
			self.evict();
		} else {
			tracing::debug!(route = P::ROUTE, "not keeping page built before an invalidation");
		}

		Ok(payload)
	}

	/// Drops a built page, returning whether there was one. A build of any
	/// page that is still running is not kept either.
	pub fn invalidate(&self, props: &P) -> bool {
		self.generation.fetch_add(1, Ordering::SeqCst);
		self.pages.remove(props).is_some()
	}

	/// Drops the oldest tenth of the pages once there are more than
	/// `capacity`.
	fn evict(&self) {
		let len = self.pages.len();

		if len <= self.capacity {
			return;
		}

		let mut built = self
			.pages
			.iter()
			.map(|entry| (entry.at, entry.key().clone()))
			.collect::<Vec<_>>();

		built.sort_unstable_by_key(|(at, _)| *at);

		let count = (len - self.capacity).max(self.capacity / 10);

		for (_, props) in built.into_iter().take(count) {
			self.pages.remove(&props);
		}

		tracing::debug!(route = P::ROUTE, count, "evicted built pages");
	}
}

/// The page caches of every page built ahead of rendering.
#[derive(Clone)]
pub struct Pages {
	pub profiles: PageCache<ProfileProps>,
	pub posts: PageCache<PostProps>,
}

impl Pages {
	pub fn new(revalidate: Option<Duration>, capacity: usize) -> Self {
		Self {
			profiles: PageCache::new(revalidate, capacity),
			posts: PageCache::new(revalidate, capacity),
		}
	}
}

#[cfg(test)]
mod test {
	use std::{collections::HashMap, sync::Arc, time::Duration};

	use super::{get_static_props, PageCache, PostProps, ProfileProps, StaticPage};
	use crate::{
		config::DEFAULT_CACHE_CAPACITY,
		page::Error,
		query::{GetUserByUsername, QueryClient, QueryState},
		store::{MemoryStore, SharedStore},
		test::{seed_user, CountingStore, GatedStore},
	};

	fn params(name: &str, value: &str) -> HashMap<String, String> {
		HashMap::from([(name.to_owned(), value.to_owned())])
	}

	#[test]
	fn test_slug_loses_its_first_sigil_only() {
		let props = |slug| ProfileProps::from_params(&params("slug", slug)).unwrap().username;

		assert_eq!(props("@alice"), "alice");
		assert_eq!(props("alice"), "alice");
		assert_eq!(props("@@alice"), "@alice");
		assert_eq!(props("al@ice"), "alice");
	}

	#[test]
	fn test_missing_param_is_an_error() {
		assert!(matches!(
			ProfileProps::from_params(&HashMap::new()),
			Err(Error::MissingParam("slug"))
		));
		assert!(matches!(
			PostProps::from_params(&params("slug", "x")),
			Err(Error::MissingParam("id"))
		));
	}

	#[tokio::test]
	async fn test_snapshot_seeds_a_client_without_store_calls() {
		let store = MemoryStore::default();
		let alice = seed_user(&store, "alice").await;

		let payload = get_static_props::<ProfileProps>(Arc::new(store.clone()), &params("slug", "@alice"))
			.await
			.unwrap();

		assert_eq!(payload.props.username, "alice");

		let counting = Arc::new(CountingStore::new(store));
		let client = QueryClient::new(counting.clone());

		client.hydrate(&payload.snapshot);

		let state = client
			.fetch(&GetUserByUsername {
				username: "alice".into(),
			})
			.await;

		assert_eq!(state, QueryState::Ready(Some(alice.author())));
		assert_eq!(counting.reads(), 0);
	}

	#[tokio::test]
	async fn test_pages_are_built_once() {
		let counting = Arc::new(CountingStore::new(MemoryStore::default()));
		let store: SharedStore = counting.clone();
		let pages = PageCache::<PostProps>::new(None, DEFAULT_CACHE_CAPACITY);

		pages.get_or_build(&store, &params("id", "nope")).await.unwrap();
		pages.get_or_build(&store, &params("id", "nope")).await.unwrap();

		// Malformed ids never reach the store
		assert_eq!(counting.reads(), 0);

		let id = uuid::Uuid::new_v4().to_string();

		pages.get_or_build(&store, &params("id", &id)).await.unwrap();
		pages.get_or_build(&store, &params("id", &id)).await.unwrap();

		assert_eq!(counting.reads(), 1);

		assert!(pages.invalidate(&PostProps { id: id.clone() }));
		pages.get_or_build(&store, &params("id", &id)).await.unwrap();

		assert_eq!(counting.reads(), 2);
	}

	#[tokio::test]
	async fn test_revalidation_rebuilds_old_pages() {
		let counting = Arc::new(CountingStore::new(MemoryStore::default()));
		let store: SharedStore = counting.clone();
		let pages = PageCache::<ProfileProps>::new(Some(Duration::ZERO), DEFAULT_CACHE_CAPACITY);

		pages.get_or_build(&store, &params("slug", "alice")).await.unwrap();
		pages.get_or_build(&store, &params("slug", "alice")).await.unwrap();

		assert_eq!(counting.reads(), 2);
	}

	#[tokio::test]
	async fn test_registration_during_build_is_not_lost() {
		let store = MemoryStore::default();
		let gated = Arc::new(GatedStore::new(store.clone()));
		let shared: SharedStore = gated.clone();
		let pages = PageCache::<ProfileProps>::new(None, DEFAULT_CACHE_CAPACITY);

		gated.arm();

		let build = tokio::spawn({
			let pages = pages.clone();
			let shared = shared.clone();
			async move { pages.get_or_build(&shared, &params("slug", "@bob")).await }
		});

		// The build has found no such user but has not been kept yet
		gated.reached().await;

		let bob = seed_user(&store, "bob").await;
		pages.invalidate(&ProfileProps {
			username: "bob".into(),
		});

		gated.release();
		build.await.unwrap().unwrap();

		let payload = pages.get_or_build(&shared, &params("slug", "@bob")).await.unwrap();
		let client = QueryClient::new(shared);

		client.hydrate(&payload.snapshot);

		let state = client
			.fetch(&GetUserByUsername {
				username: "bob".into(),
			})
			.await;

		assert_eq!(state, QueryState::Ready(Some(bob.author())));
	}

	#[tokio::test]
	async fn test_page_cache_is_bounded() {
		let counting = Arc::new(CountingStore::new(MemoryStore::default()));
		let store: SharedStore = counting.clone();
		let pages = PageCache::<ProfileProps>::new(None, 10);

		for slug in 0..2000 {
			pages
				.get_or_build(&store, &params("slug", &format!("missing-{slug}")))
				.await
				.unwrap();
		}

		assert!(pages.pages.len() <= 10);

		// The newest page is still built
		let reads = counting.reads();

		pages.get_or_build(&store, &params("slug", "missing-1999")).await.unwrap();

		assert_eq!(counting.reads(), reads);
	}
}
