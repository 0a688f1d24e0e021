use aide::axum::{
	routing::{get_with, post_with},
	ApiRouter,
};
use axum::http::StatusCode;

use crate::{error, AppState};

pub mod model;
pub mod route;

pub use route::{authenticate, register_user};

/// An error that can occur during authentication.
///
/// Note that the messages are presented to the client, so they should not contain
/// sensitive information.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("invalid email or password")]
	InvalidEmailOrPassword,
	#[error("password validation error")]
	Argon(#[from] argon2::Error),
	#[error("no session cookie")]
	NoSessionCookie,
	#[error("invalid session cookie")]
	InvalidSessionCookie,
	#[error("username already taken")]
	UsernameTaken,
	#[error("email already taken")]
	EmailTaken,
}

pub type RouteError = error::RouteError<Error>;

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route("/login", post_with(login, login_docs))
		.api_route("/logout", get_with(logout, logout_docs))
		.api_route("/register", post_with(register, register_docs))
		.api_route("/me", get_with(get_me, get_me_docs))
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::InvalidEmailOrPassword | Self::NoSessionCookie | Self::InvalidSessionCookie => {
				StatusCode::UNAUTHORIZED
			}
			Self::Argon(..) => StatusCode::INTERNAL_SERVER_ERROR,
			Self::UsernameTaken | Self::EmailTaken => StatusCode::CONFLICT,
		}
	}

	fn errors(&self) -> Vec<error::Message<'_>> {
		vec![error::Message::new(self.to_string())]
	}
}

#[cfg(test)]
mod test {
	use crate::test::*;

	#[tokio::test]
	async fn test_signup_flow() {
		let app = app(MemoryStore::default());

		let response = app
			.post("/api/auth/register")
			.json(&json!({
				"email": "john@smith.com",
				"username": "john",
				"password": "hunter2hunter",
			}))
			.await;

		assert_eq!(response.status_code(), 200);

		assert!(response
			.header("set-cookie")
			.to_str()
			.unwrap()
			.contains("session="));

		let response = app
			.post("/api/auth/login")
			.json(&json!({
				"email": "john@smith.com",
				"password": "hunter2hunter",
			}))
			.await;

		assert_eq!(response.status_code(), 200);

		let response = app.get("/api/auth/me").await;

		assert_eq!(response.status_code(), 200);

		let me = response.json::<serde_json::Value>();

		assert_eq!(me["username"], "john");
		assert!(me.get("email").is_none());
		assert!(me.get("password").is_none());
	}

	#[tokio::test]
	async fn test_wrong_password_is_unauthorized() {
		let app = app(MemoryStore::default());

		register(&app, "john").await;

		let response = app
			.post("/api/auth/login")
			.json(&json!({
				"email": "john@example.com",
				"password": "not-the-password",
			}))
			.await;

		assert_eq!(response.status_code(), 401);
	}

	#[tokio::test]
	async fn test_duplicate_username_conflicts() {
		let app = app(MemoryStore::default());

		register(&app, "john").await;

		let response = app
			.post("/api/auth/register")
			.json(&json!({
				"email": "other@example.com",
				"username": "john",
				"password": "hunter2hunter",
			}))
			.await;

		assert_eq!(response.status_code(), 409);
		assert_eq!(
			response.json::<serde_json::Value>()["errors"][0]["content"],
			"username already taken"
		);
	}

	#[tokio::test]
	async fn test_logout_ends_the_session() {
		let app = app(MemoryStore::default());

		register(&app, "john").await;

		assert_eq!(app.get("/api/auth/logout").await.status_code(), 204);
		assert_eq!(app.get("/api/auth/me").await.status_code(), 401);
	}
}
