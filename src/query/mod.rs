//! A keyed query cache in front of the [`Store`].
//!
//! Every read goes through a typed [`Query`] whose key is the operation name
//! plus its serialized input. Entries hold a [`QueryState`], so a consumer can
//! always tell a pending read from a failed one. Entries only go stale through
//! explicit invalidation.

mod ops;
mod snapshot;

use std::{borrow::Cow, fmt, sync::Arc};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub use ops::{GetAll, GetById, GetPostsByUserId, GetUserByUsername};
pub use snapshot::{DehydratedQuery, Snapshot};

use crate::{
	config::DEFAULT_CACHE_CAPACITY,
	error::AppError,
	route::post::model::{CreatePostInput, Post},
	store::{self, SharedStore, Store},
};

/// Identifies one cached read: an operation and the arguments it was called with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
	pub operation: Cow<'static, str>,
	/// The input serialized as JSON. Fields are written in declaration order,
	/// so equal inputs of one query type always produce equal keys.
	pub input: String,
}

impl QueryKey {
	pub fn new<I: Serialize + ?Sized>(operation: &'static str, input: &I) -> Self {
		Self {
			operation: Cow::Borrowed(operation),
			input: serde_json::to_string(input).unwrap_or_default(),
		}
	}
}

impl fmt::Display for QueryKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}({})", self.operation, self.input)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[error("{operation} failed: {message}")]
pub struct QueryError {
	pub operation: String,
	pub message: String,
}

impl QueryError {
	fn new(operation: &str, error: &impl fmt::Display) -> Self {
		Self {
			operation: operation.to_owned(),
			message: error.to_string(),
		}
	}
}

/// The state of a single read.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryState<T> {
	/// Nothing has been read yet, or the first read is still in flight.
	Pending,
	Ready(T),
	Failed(QueryError),
}

/// A typed read against the store.
#[axum::async_trait]
pub trait Query: Serialize + Send + Sync {
	/// The operation name, shared with the JSON route serving the same data.
	const NAME: &'static str;

	type Output: Serialize + DeserializeOwned + Send;

	async fn run(&self, store: &dyn Store) -> Result<Self::Output, store::Error>;

	fn key(&self) -> QueryKey {
		QueryKey::new(Self::NAME, self)
	}
}

#[derive(Debug, Clone)]
struct Entry {
	state: QueryState<serde_json::Value>,
	updated_at: Option<DateTime<Utc>>,
	stale: bool,
	/// Bumped on every invalidation. A read that started under an older
	/// generation must not overwrite the entry.
	generation: u64,
}

impl Entry {
	fn pending() -> Self {
		Self {
			state: QueryState::Pending,
			updated_at: None,
			stale: false,
			generation: 0,
		}
	}

	/// Whether a fetch can be answered without calling the store.
	fn is_fresh(&self) -> bool {
		!self.stale && matches!(self.state, QueryState::Ready(..))
	}
}

/// The client that pages read through.
///
/// Cloning is cheap and clones share the same cache. Once the cache holds
/// more than `capacity` entries, the least recently updated are dropped.
#[derive(Clone)]
pub struct QueryClient {
	store: SharedStore,
	cache: Arc<DashMap<QueryKey, Entry>>,
	capacity: usize,
}

impl QueryClient {
	pub fn new(store: SharedStore) -> Self {
		Self::with_capacity(store, DEFAULT_CACHE_CAPACITY)
	}

	pub fn with_capacity(store: SharedStore, capacity: usize) -> Self {
		Self {
			store,
			cache: Arc::new(DashMap::new()),
			capacity: capacity.max(1),
		}
	}

	/// Returns the cached value when it is fresh, otherwise calls the store
	/// and records the outcome.
	pub async fn fetch<Q: Query>(&self, query: &Q) -> QueryState<Q::Output> {
		let key = query.key();

		let generation = {
			let entry = self.cache.entry(key.clone()).or_insert_with(Entry::pending);

			if entry.is_fresh() {
				tracing::debug!(%key, "query cache hit");
				return decode::<Q>(&entry.state);
			}

			entry.generation
		};

		tracing::debug!(%key, "query cache miss");

		let result = query.run(self.store.as_ref()).await;

		let (stored, state) = match result.map(|output| (serde_json::to_value(&output), output)) {
			Ok((Ok(value), output)) => (QueryState::Ready(value), QueryState::Ready(output)),
			Ok((Err(error), _)) => failed(&key, QueryError::new(Q::NAME, &error)),
			Err(error) => failed(&key, QueryError::new(Q::NAME, &error)),
		};

		match self.cache.get_mut(&key) {
			Some(mut entry) if entry.generation == generation => {
				entry.state = stored;
				entry.updated_at = Some(Utc::now());
				entry.stale = false;
			}
			// Invalidated (or evicted) while the store was read, so the
			// entry stays stale and the next fetch reads again
			_ => tracing::debug!(%key, "discarding outdated query result"),
		}

		self.evict();

		state
	}

	/// Fetches ahead of the first read. Failures are only logged, the next
	/// fetch of the same key tries again.
	pub async fn prefetch<Q: Query>(&self, query: &Q) {
		if let QueryState::Failed(error) = self.fetch(query).await {
			tracing::warn!(%error, "prefetch failed");
		}
	}

	/// Marks a single query stale, returning whether it was cached.
	pub fn invalidate<Q: Query>(&self, query: &Q) -> bool {
		match self.cache.get_mut(&query.key()) {
			Some(mut entry) => {
				entry.stale = true;
				entry.generation += 1;
				true
			}
			None => false,
		}
	}

	/// Marks the feeds that show a new post of this author stale.
	pub fn invalidate_feeds(&self, author_id: Uuid) {
		self.invalidate(&GetAll);
		self.invalidate(&GetPostsByUserId { user_id: author_id });
	}

	/// Creates a post for the author. The caller decides what to invalidate.
	pub async fn create_post(
		&self,
		author_id: Uuid,
		input: &CreatePostInput,
	) -> Result<Post, AppError> {
		input.validate()?;

		Ok(self.store.create_post(author_id, &input.content).await?)
	}

	/// Copies every ready entry into a serializable snapshot.
	pub fn dehydrate(&self) -> Snapshot {
		let queries = self
			.cache
			.iter()
			.filter_map(|entry| {
				let QueryState::Ready(ref data) = entry.state else {
					return None;
				};

				Some(DehydratedQuery {
					operation: entry.key().operation.to_string(),
					input: entry.key().input.clone(),
					data: data.clone(),
					updated_at: entry.updated_at?,
				})
			})
			.collect();

		Snapshot { queries }
	}

	/// Seeds the cache from a snapshot. Entries that are at least as new as
	/// the snapshot are kept; a read in flight for a replaced entry is
	/// discarded.
	pub fn hydrate(&self, snapshot: &Snapshot) {
		for query in &snapshot.queries {
			let key = QueryKey {
				operation: Cow::Owned(query.operation.clone()),
				input: query.input.clone(),
			};

			let generation = match self.cache.get(&key) {
				Some(entry)
					if entry
						.updated_at
						.is_some_and(|updated_at| updated_at >= query.updated_at) =>
				{
					continue;
				}
				Some(entry) => entry.generation + 1,
				None => 0,
			};

			self.cache.insert(
				key,
				Entry {
					state: QueryState::Ready(query.data.clone()),
					updated_at: Some(query.updated_at),
					stale: false,
					generation,
				},
			);
		}

		self.evict();
	}

	/// Drops the least recently updated tenth of the settled entries once
	/// the cache is over capacity. Reads still in flight are never dropped.
	fn evict(&self) {
		let len = self.cache.len();

		if len <= self.capacity {
			return;
		}

		let mut settled = self
			.cache
			.iter()
			.filter_map(|entry| Some((entry.updated_at?, entry.key().clone())))
			.collect::<Vec<_>>();

		settled.sort_unstable_by_key(|(updated_at, _)| *updated_at);

		let count = (len - self.capacity).max(self.capacity / 10);

		for (_, key) in settled.into_iter().take(count) {
			self.cache.remove(&key);
		}

		tracing::debug!(count, "evicted query cache entries");
	}
}

fn failed<T>(
	key: &QueryKey,
	error: QueryError,
) -> (QueryState<serde_json::Value>, QueryState<T>) {
	tracing::warn!(%key, %error, "query failed");

	(QueryState::Failed(error.clone()), QueryState::Failed(error))
}

fn decode<Q: Query>(state: &QueryState<serde_json::Value>) -> QueryState<Q::Output> {
	match state {
		QueryState::Pending => QueryState::Pending,
		QueryState::Ready(value) => match Q::Output::deserialize(value) {
			Ok(output) => QueryState::Ready(output),
			Err(error) => QueryState::Failed(QueryError::new(Q::NAME, &error)),
		},
		QueryState::Failed(error) => QueryState::Failed(error.clone()),
	}
}

#[cfg(test)]
impl QueryClient {
	pub(crate) fn state<Q: Query>(&self, query: &Q) -> QueryState<Q::Output> {
		self.cache
			.get(&query.key())
			.map_or(QueryState::Pending, |entry| decode::<Q>(&entry.state))
	}

	pub(crate) fn is_stale<Q: Query>(&self, query: &Q) -> bool {
		self.cache
			.get(&query.key())
			.map_or(true, |entry| !entry.is_fresh())
	}
}

#[cfg(test)]
mod test {
	use std::sync::Arc;

	use crate::{
		query::{GetAll, GetById, GetUserByUsername, Query, QueryClient, QueryKey, QueryState},
		route::post::model::CreatePostInput,
		store::{MemoryStore, Store},
		test::{seed_user, CountingStore, GatedStore},
	};

	#[test]
	fn test_key_includes_arguments() {
		let a = GetById { id: "a".into() }.key();
		let b = GetById { id: "b".into() }.key();

		assert_ne!(a, b);
		assert_eq!(a, QueryKey::new("posts.getById", &serde_json::json!({ "id": "a" })));
		assert_eq!(a.to_string(), r#"posts.getById({"id":"a"})"#);
	}

	#[tokio::test]
	async fn test_state_is_pending_before_fetch() {
		let client = QueryClient::new(Arc::new(MemoryStore::default()));

		assert_eq!(client.state(&GetAll), QueryState::Pending);
		assert!(client.is_stale(&GetAll));
	}

	#[tokio::test]
	async fn test_fetch_is_cached_until_invalidated() {
		let store = Arc::new(CountingStore::new(MemoryStore::default()));
		let client = QueryClient::new(store.clone());

		assert_eq!(client.fetch(&GetAll).await, QueryState::Ready(Vec::new()));
		assert_eq!(client.fetch(&GetAll).await, QueryState::Ready(Vec::new()));
		assert_eq!(store.reads(), 1);

		assert!(client.invalidate(&GetAll));
		assert!(client.is_stale(&GetAll));

		client.fetch(&GetAll).await;
		client.fetch(&GetAll).await;

		assert_eq!(store.reads(), 2);
	}

	#[tokio::test]
	async fn test_invalidate_only_marks_that_input() {
		let client = QueryClient::new(Arc::new(MemoryStore::default()));

		client.fetch(&GetById { id: "a".into() }).await;
		client.fetch(&GetById { id: "b".into() }).await;

		assert!(client.invalidate(&GetById { id: "a".into() }));
		assert!(client.is_stale(&GetById { id: "a".into() }));
		assert!(!client.is_stale(&GetById { id: "b".into() }));
		assert!(!client.invalidate(&GetAll));
	}

	#[tokio::test]
	async fn test_invalidation_during_read_is_not_lost() {
		let store = MemoryStore::default();
		let alice = seed_user(&store, "alice").await;
		let gated = Arc::new(GatedStore::new(store));
		let client = QueryClient::new(gated.clone());

		gated.arm();

		let read = tokio::spawn({
			let client = client.clone();
			async move { client.fetch(&GetAll).await }
		});

		// The read has seen an empty feed but not yet written it back
		gated.reached().await;

		let hello = CreatePostInput {
			content: "hello".into(),
		};

		client.create_post(alice.id, &hello).await.unwrap();
		client.invalidate_feeds(alice.id);

		gated.release();

		assert_eq!(read.await.unwrap(), QueryState::Ready(Vec::new()));
		assert!(client.is_stale(&GetAll));

		let QueryState::Ready(posts) = client.fetch(&GetAll).await else {
			panic!("expected ready state");
		};

		assert_eq!(posts.len(), 1);
		assert_eq!(posts[0].post.content, "hello");
	}

	#[tokio::test]
	async fn test_cache_is_bounded() {
		let store = Arc::new(CountingStore::new(MemoryStore::default()));
		let client = QueryClient::with_capacity(store.clone(), 10);

		for slug in 0..2000 {
			client
				.fetch(&GetUserByUsername {
					username: format!("missing-{slug}"),
				})
				.await;
		}

		assert!(client.cache.len() <= 10);

		// The newest entry survives eviction
		let reads = store.reads();
		let last = GetUserByUsername {
			username: "missing-1999".into(),
		};

		assert_eq!(client.fetch(&last).await, QueryState::Ready(None));
		assert_eq!(store.reads(), reads);
	}

	#[tokio::test]
	async fn test_failed_read_is_not_pending() {
		let store = Arc::new(CountingStore::new(MemoryStore::default()));
		let client = QueryClient::new(store.clone());

		store.fail(true);

		let state = client.fetch(&GetAll).await;

		assert!(matches!(state, QueryState::Failed(..)));
		assert!(matches!(client.state(&GetAll), QueryState::Failed(..)));

		// The next fetch tries again
		store.fail(false);

		assert_eq!(client.fetch(&GetAll).await, QueryState::Ready(Vec::new()));
	}

	#[tokio::test]
	async fn test_hydrated_query_is_ready_without_store_call() {
		let store = MemoryStore::default();
		let alice = seed_user(&store, "alice").await;

		let server = QueryClient::new(Arc::new(store.clone()));
		server
			.prefetch(&GetUserByUsername {
				username: "alice".into(),
			})
			.await;

		let snapshot = server.dehydrate();

		assert_eq!(snapshot.queries.len(), 1);

		let counting = Arc::new(CountingStore::new(store));
		let client = QueryClient::new(counting.clone());

		client.hydrate(&snapshot);

		let query = GetUserByUsername {
			username: "alice".into(),
		};

		assert_eq!(client.state(&query), QueryState::Ready(Some(alice.author())));
		assert_eq!(client.fetch(&query).await, QueryState::Ready(Some(alice.author())));
		assert_eq!(counting.reads(), 0);
	}

	#[tokio::test]
	async fn test_hydrate_keeps_newer_entries() {
		let store = MemoryStore::default();
		let alice = seed_user(&store, "alice").await;

		let old = QueryClient::new(Arc::new(store.clone()));
		old.fetch(&GetAll).await;
		let snapshot = old.dehydrate();

		let client = QueryClient::new(Arc::new(store.clone()));
		store
			.create_post(alice.id, "hello")
			.await
			.unwrap();
		client.fetch(&GetAll).await;
		client.hydrate(&snapshot);

		let QueryState::Ready(posts) = client.state(&GetAll) else {
			panic!("expected ready state");
		};

		assert_eq!(posts.len(), 1);
	}

	#[tokio::test]
	async fn test_create_post_validates_content() {
		let store = MemoryStore::default();
		let alice = seed_user(&store, "alice").await;
		let client = QueryClient::new(Arc::new(store));

		let empty = CreatePostInput {
			content: String::new(),
		};

		assert!(client.create_post(alice.id, &empty).await.is_err());

		let hello = CreatePostInput {
			content: "hello".into(),
		};

		let post = client.create_post(alice.id, &hello).await.unwrap();

		assert_eq!(post.author_id, alice.id);
		assert_eq!(post.content, "hello");
	}
}
