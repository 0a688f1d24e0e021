use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::route::profile::model::Author;

/// Shown for users that did not provide a profile picture.
pub const DEFAULT_PROFILE_IMAGE_URL: &str = "data:image/svg+xml,%3Csvg xmlns='http://www.w3.org/2000/svg' viewBox='0 0 1 1'%3E%3Crect width='1' height='1' fill='%23475569'/%3E%3C/svg%3E";

fn validate_username(username: &str) -> Result<(), ValidationError> {
	if username.chars().any(|c| !c.is_alphanumeric() && c != '_') {
		return Err(ValidationError::new("username must be alphanumeric"));
	}

	Ok(())
}

/// A single user.
#[derive(Debug, Clone, Serialize, JsonSchema, sqlx::FromRow)]
pub struct User {
	/// The unique identifier of the user.
	pub id: Uuid,
	/// The user's primary email address, used for logging in.
	#[serde(skip_serializing)]
	pub email: String,
	/// The hashed password.
	#[serde(skip)]
	pub password: Vec<u8>,
	/// The handle that is displayed to the public.
	pub username: Option<String>,
	/// The URL of the user's profile picture.
	pub profile_image_url: String,
	/// The creation time of the user.
	pub created_at: chrono::DateTime<chrono::Utc>,
}

impl User {
	/// The signed-in identity as it appears on posts.
	pub fn author(&self) -> Author {
		Author {
			id: self.id,
			username: self.username.clone(),
			profile_image_url: self.profile_image_url.clone(),
		}
	}
}

#[derive(Debug, Clone, Serialize, JsonSchema, sqlx::FromRow)]
pub struct Session {
	/// The session id.
	#[serde(rename = "session_id")]
	pub id: Uuid,
	/// The user that owns the session.
	#[serde(skip)]
	pub user_id: Uuid,
	/// The creation time of the session.
	pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct LoginInput {
	#[validate(email)]
	pub email: String,
	#[validate(length(min = 8, max = 128))]
	pub password: String,
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct RegisterInput {
	#[validate(email)]
	pub email: String,
	#[validate(length(min = 8, max = 128))]
	pub password: String,
	/// The handle that is displayed to the public.
	#[validate(length(min = 3, max = 16), custom(function = "validate_username"))]
	pub username: Option<String>,
	/// The URL of the profile picture. A placeholder is used when omitted.
	#[validate(url)]
	pub profile_image_url: Option<String>,
}

#[cfg(test)]
mod test {
	use validator::Validate;

	use super::RegisterInput;

	fn input(username: Option<&str>) -> RegisterInput {
		RegisterInput {
			email: "john@smith.com".into(),
			password: "hunter2hunter".into(),
			username: username.map(Into::into),
			profile_image_url: None,
		}
	}

	#[test]
	fn test_username_is_optional() {
		assert!(input(None).validate().is_ok());
	}

	#[test]
	fn test_username_rejects_sigil() {
		assert!(input(Some("john")).validate().is_ok());
		assert!(input(Some("@john")).validate().is_err());
	}
}
