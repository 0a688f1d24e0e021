use aide::axum::{routing::get_with, ApiRouter};
use axum::http::StatusCode;

use crate::{error, AppState};

pub mod model;
pub mod route;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("unknown user {0}")]
	UnknownUser(String),
}

pub type RouteError = error::RouteError<Error>;

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new().api_route(
		"/:username",
		get_with(get_user_by_username, get_user_by_username_docs),
	)
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::UnknownUser(..) => StatusCode::NOT_FOUND,
		}
	}

	fn errors(&self) -> Vec<error::Message<'_>> {
		match self {
			Self::UnknownUser(username) => vec![error::Message {
				content: "unknown_user".into(),
				field: Some("username".into()),
				details: Some(std::borrow::Cow::Owned({
					let mut map = error::Map::new();
					map.insert("username".into(), username.as_str().into());
					map
				})),
			}],
		}
	}
}

#[cfg(test)]
mod test {
	use crate::test::*;

	#[tokio::test]
	async fn test_profile_lookup() {
		let app = app(MemoryStore::default());

		register(&app, "alice").await;

		let response = app.get("/api/profile/alice").await;

		assert_eq!(response.status_code(), 200);

		let profile = response.json::<serde_json::Value>();

		assert_eq!(profile["username"], "alice");
		assert!(profile.get("email").is_none());

		let response = app.get("/api/profile/nobody").await;

		assert_eq!(response.status_code(), 404);
	}
}
