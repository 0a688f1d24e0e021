use macros::model;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub use crate::route::profile::model::Author;

/// A single post, created by a user.
#[model(create)]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema, Validate, sqlx::FromRow)]
pub struct Post {
	/// The unique identifier of the post.
	#[model(skip)]
	pub id: Uuid,
	/// The user that created the post.
	#[model(skip)]
	pub author_id: Uuid,
	/// The text of the post.
	#[validate(length(min = 1, max = 280, message = "posts must be between 1 and 280 characters"))]
	pub content: String,
	/// The creation time of the post.
	#[model(skip)]
	pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A post together with its author, as shown in a feed.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct PostWithAuthor {
	pub post: Post,
	pub author: Author,
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct UserIdInput {
	/// The author whose posts to return.
	pub user_id: Uuid,
}
