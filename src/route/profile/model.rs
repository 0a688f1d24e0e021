use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// The public part of a user, safe to show next to their posts.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema, sqlx::FromRow)]
pub struct Author {
	/// The unique identifier of the user.
	pub id: Uuid,
	/// The handle shown as `@username`. Users may not have picked one yet.
	pub username: Option<String>,
	/// The URL of the user's profile picture.
	pub profile_image_url: String,
}

impl Author {
	/// The handle without the `@`, empty when the user has none.
	pub fn handle(&self) -> &str {
		self.username.as_deref().unwrap_or_default()
	}
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct UsernameInput {
	/// The username to look up, without the `@`.
	#[validate(length(min = 1, max = 16))]
	pub username: String,
}
