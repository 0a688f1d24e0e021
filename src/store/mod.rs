//! Persistence for users, sessions and posts.
//!
//! Everything above this module talks to a [`Store`] trait object, so the
//! same routes and pages run against Postgres in production and against
//! [`MemoryStore`] when no database is configured (and in tests).

mod memory;
mod postgres;

use std::sync::Arc;

use uuid::Uuid;

pub use memory::MemoryStore;

use crate::route::{
	auth::model::{Session, User},
	post::model::{Post, PostWithAuthor},
	profile::model::Author,
};

/// The maximum number of posts returned by a feed query.
pub const FEED_LIMIT: i64 = 100;

pub type SharedStore = Arc<dyn Store>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),
	#[error("author for post {0} not found")]
	MissingAuthor(Uuid),
	#[error("email already taken")]
	EmailTaken,
	#[error("username already taken")]
	UsernameTaken,
}

/// A user about to be registered. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
	pub id: Uuid,
	pub email: String,
	pub password: Vec<u8>,
	pub username: Option<String>,
	pub profile_image_url: String,
}

#[axum::async_trait]
pub trait Store: Send + Sync + 'static {
	/// Most recent posts across all users, newest first.
	async fn recent_posts(&self, limit: i64) -> Result<Vec<PostWithAuthor>, Error>;

	/// Most recent posts of one author, newest first.
	async fn posts_by_author(
		&self,
		author_id: Uuid,
		limit: i64,
	) -> Result<Vec<PostWithAuthor>, Error>;

	async fn post(&self, id: Uuid) -> Result<Option<PostWithAuthor>, Error>;

	async fn create_post(&self, author_id: Uuid, content: &str) -> Result<Post, Error>;

	async fn author_by_username(&self, username: &str) -> Result<Option<Author>, Error>;

	async fn user_by_email(&self, email: &str) -> Result<Option<User>, Error>;

	/// Creates the user together with its first session.
	async fn register(&self, user: NewUser) -> Result<Session, Error>;

	async fn create_session(&self, user_id: Uuid) -> Result<Session, Error>;

	/// Resolves the user that owns a session.
	async fn session_user(&self, session_id: Uuid) -> Result<Option<User>, Error>;

	async fn delete_session(&self, session_id: Uuid) -> Result<(), Error>;
}
