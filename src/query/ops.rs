use serde::Serialize;
use uuid::Uuid;

use super::Query;
use crate::{
	route::{post::model::PostWithAuthor, profile::model::Author},
	store::{self, Store, FEED_LIMIT},
};

/// The global feed.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GetAll;

#[axum::async_trait]
impl Query for GetAll {
	const NAME: &'static str = "posts.getAll";

	type Output = Vec<PostWithAuthor>;

	async fn run(&self, store: &dyn Store) -> Result<Self::Output, store::Error> {
		store.recent_posts(FEED_LIMIT).await
	}
}

/// The posts of a single user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPostsByUserId {
	pub user_id: Uuid,
}

#[axum::async_trait]
impl Query for GetPostsByUserId {
	const NAME: &'static str = "posts.getPostsByUserId";

	type Output = Vec<PostWithAuthor>;

	async fn run(&self, store: &dyn Store) -> Result<Self::Output, store::Error> {
		store.posts_by_author(self.user_id, FEED_LIMIT).await
	}
}

/// A single post by its identifier.
///
/// The identifier is taken as it appears in the URL, so anything that is not a
/// valid id simply does not exist.
#[derive(Debug, Clone, Serialize)]
pub struct GetById {
	pub id: String,
}

#[axum::async_trait]
impl Query for GetById {
	const NAME: &'static str = "posts.getById";

	type Output = Option<PostWithAuthor>;

	async fn run(&self, store: &dyn Store) -> Result<Self::Output, store::Error> {
		match Uuid::parse_str(&self.id) {
			Ok(id) => store.post(id).await,
			Err(..) => Ok(None),
		}
	}
}

/// A user's public profile by their handle (without the `@`).
#[derive(Debug, Clone, Serialize)]
pub struct GetUserByUsername {
	pub username: String,
}

#[axum::async_trait]
impl Query for GetUserByUsername {
	const NAME: &'static str = "profile.getUserByUsername";

	type Output = Option<Author>;

	async fn run(&self, store: &dyn Store) -> Result<Self::Output, store::Error> {
		store.author_by_username(&self.username).await
	}
}

#[cfg(test)]
mod test {
	use std::sync::Arc;

	use uuid::Uuid;

	use super::{GetById, GetPostsByUserId, Query};
	use crate::{
		query::{QueryClient, QueryState},
		store::{MemoryStore, Store},
		test::seed_user,
	};

	#[tokio::test]
	async fn test_get_by_id_treats_malformed_ids_as_missing() {
		let client = QueryClient::new(Arc::new(MemoryStore::default()));

		let state = client
			.fetch(&GetById {
				id: "does-not-exist".into(),
			})
			.await;

		assert_eq!(state, QueryState::Ready(None));
	}

	#[tokio::test]
	async fn test_posts_by_user_are_scoped() {
		let store = MemoryStore::default();
		let alice = seed_user(&store, "alice").await;
		let bob = seed_user(&store, "bob").await;

		store.create_post(alice.id, "from alice").await.unwrap();
		store.create_post(bob.id, "from bob").await.unwrap();

		let posts = GetPostsByUserId { user_id: alice.id }
			.run(&store)
			.await
			.unwrap();

		assert_eq!(posts.len(), 1);
		assert_eq!(posts[0].post.content, "from alice");
		assert_eq!(posts[0].author.id, alice.id);

		let none = GetPostsByUserId {
			user_id: Uuid::new_v4(),
		}
		.run(&store)
		.await
		.unwrap();

		assert!(none.is_empty());
	}
}
