use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Error, NewUser, Store};
use crate::route::{
	auth::model::{Session, User},
	post::model::{Post, PostWithAuthor},
	profile::model::Author,
};

#[derive(Default)]
struct Tables {
	users: HashMap<Uuid, User>,
	sessions: HashMap<Uuid, Session>,
	/// In insertion order, so the newest post is last.
	posts: Vec<Post>,
}

impl Tables {
	fn with_author(&self, post: &Post) -> Result<PostWithAuthor, Error> {
		let user = self
			.users
			.get(&post.author_id)
			.ok_or(Error::MissingAuthor(post.id))?;

		Ok(PostWithAuthor {
			post: post.clone(),
			author: user.author(),
		})
	}

	fn newest(&self, filter: impl Fn(&Post) -> bool, limit: i64) -> Result<Vec<PostWithAuthor>, Error> {
		self.posts
			.iter()
			.rev()
			.filter(|post| filter(post))
			.take(usize::try_from(limit).unwrap_or_default())
			.map(|post| self.with_author(post))
			.collect()
	}
}

/// A store that keeps everything in memory. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
	tables: Arc<RwLock<Tables>>,
}

#[axum::async_trait]
impl Store for MemoryStore {
	async fn recent_posts(&self, limit: i64) -> Result<Vec<PostWithAuthor>, Error> {
		self.tables.read().await.newest(|_| true, limit)
	}

	async fn posts_by_author(
		&self,
		author_id: Uuid,
		limit: i64,
	) -> Result<Vec<PostWithAuthor>, Error> {
		self.tables
			.read()
			.await
			.newest(move |post| post.author_id == author_id, limit)
	}

	async fn post(&self, id: Uuid) -> Result<Option<PostWithAuthor>, Error> {
		let tables = self.tables.read().await;

		tables
			.posts
			.iter()
			.find(|post| post.id == id)
			.map(|post| tables.with_author(post))
			.transpose()
	}

	async fn create_post(&self, author_id: Uuid, content: &str) -> Result<Post, Error> {
		let mut tables = self.tables.write().await;

		let post = Post {
			id: Uuid::new_v4(),
			author_id,
			content: content.to_owned(),
			created_at: Utc::now(),
		};

		tables.posts.push(post.clone());

		Ok(post)
	}

	async fn author_by_username(&self, username: &str) -> Result<Option<Author>, Error> {
		Ok(self
			.tables
			.read()
			.await
			.users
			.values()
			.find(|user| user.username.as_deref() == Some(username))
			.map(User::author))
	}

	async fn user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
		Ok(self
			.tables
			.read()
			.await
			.users
			.values()
			.find(|user| user.email == email)
			.cloned())
	}

	async fn register(&self, user: NewUser) -> Result<Session, Error> {
		let mut tables = self.tables.write().await;

		for existing in tables.users.values() {
			if existing.email == user.email {
				return Err(Error::EmailTaken);
			}

			if user.username.is_some() && existing.username == user.username {
				return Err(Error::UsernameTaken);
			}
		}

		let now = Utc::now();

		tables.users.insert(
			user.id,
			User {
				id: user.id,
				email: user.email,
				password: user.password,
				username: user.username,
				profile_image_url: user.profile_image_url,
				created_at: now,
			},
		);

		let session = Session {
			id: Uuid::new_v4(),
			user_id: user.id,
			created_at: now,
		};

		tables.sessions.insert(session.id, session.clone());

		Ok(session)
	}

	async fn create_session(&self, user_id: Uuid) -> Result<Session, Error> {
		let session = Session {
			id: Uuid::new_v4(),
			user_id,
			created_at: Utc::now(),
		};

		self.tables
			.write()
			.await
			.sessions
			.insert(session.id, session.clone());

		Ok(session)
	}

	async fn session_user(&self, session_id: Uuid) -> Result<Option<User>, Error> {
		let tables = self.tables.read().await;

		Ok(tables
			.sessions
			.get(&session_id)
			.and_then(|session| tables.users.get(&session.user_id))
			.cloned())
	}

	async fn delete_session(&self, session_id: Uuid) -> Result<(), Error> {
		self.tables.write().await.sessions.remove(&session_id);

		Ok(())
	}
}

#[cfg(test)]
mod test {
	use uuid::Uuid;

	use crate::{
		store::{Error, MemoryStore, NewUser, Store},
		test::seed_user,
	};

	#[tokio::test]
	async fn test_posts_are_newest_first() {
		let store = MemoryStore::default();
		let alice = seed_user(&store, "alice").await;

		for content in ["first", "second", "third"] {
			store.create_post(alice.id, content).await.unwrap();
		}

		let posts = store.recent_posts(2).await.unwrap();
		let contents = posts
			.iter()
			.map(|post| post.post.content.as_str())
			.collect::<Vec<_>>();

		assert_eq!(contents, ["third", "second"]);
	}

	#[tokio::test]
	async fn test_post_without_author_is_an_error() {
		let store = MemoryStore::default();
		let post = store.create_post(Uuid::new_v4(), "orphan").await.unwrap();

		assert!(matches!(
			store.post(post.id).await,
			Err(Error::MissingAuthor(id)) if id == post.id
		));
	}

	#[tokio::test]
	async fn test_register_rejects_duplicates() {
		let store = MemoryStore::default();
		let alice = seed_user(&store, "alice").await;

		let user = |email: &str, username: &str| NewUser {
			id: Uuid::new_v4(),
			email: email.into(),
			password: Vec::new(),
			username: Some(username.into()),
			profile_image_url: String::new(),
		};

		assert!(matches!(
			store.register(user(alice.email.as_str(), "other")).await,
			Err(Error::EmailTaken)
		));
		assert!(matches!(
			store.register(user("other@example.com", "alice")).await,
			Err(Error::UsernameTaken)
		));
	}

	#[tokio::test]
	async fn test_sessions_resolve_to_users() {
		let store = MemoryStore::default();
		let alice = seed_user(&store, "alice").await;
		let session = store.create_session(alice.id).await.unwrap();

		let user = store.session_user(session.id).await.unwrap().unwrap();

		assert_eq!(user.id, alice.id);

		store.delete_session(session.id).await.unwrap();

		assert!(store.session_user(session.id).await.unwrap().is_none());
	}
}
