use aide::OperationInput;
use axum::{
	extract::{FromRef, FromRequestParts},
	http::{header, request},
};
use uuid::Uuid;

use crate::{
	error::RouteError,
	openapi::SECURITY_SCHEME_SESSION,
	route::auth,
	session,
	store::SharedStore,
};

/// Extracts the session and related user from the request.
///
/// If it does not exist, a [`auth::Error::NoSessionCookie`] is returned.
/// If the session is invalid, a [`auth::Error::InvalidSessionCookie`] is returned.
/// Pages that work signed out take an `Option<Session>` instead.
///
/// ```rust
/// async fn route(session: Session) {
///   println!("{:?}", session.user);
/// }
/// ```
#[derive(Debug)]
pub struct Session {
	pub id: Uuid,
	pub user: auth::model::User,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Session
where
	SharedStore: FromRef<S>,
	S: Sync + Send,
{
	type Rejection = RouteError<auth::Error>;

	async fn from_request_parts(
		parts: &mut request::Parts,
		state: &S,
	) -> Result<Self, Self::Rejection> {
		let cookies = parts
			.headers
			.get_all(header::COOKIE)
			.into_iter()
			.filter_map(|value| value.to_str().ok());

		let session_id = cookies
			.flat_map(cookie::Cookie::split_parse)
			.filter_map(Result::ok)
			.find(|cookie| cookie.name() == session::COOKIE_NAME)
			.ok_or(auth::Error::NoSessionCookie)?;

		let session_id =
			Uuid::parse_str(session_id.value()).map_err(|_| auth::Error::InvalidSessionCookie)?;

		let store = SharedStore::from_ref(state);
		let user = store
			.session_user(session_id)
			.await?
			.ok_or(auth::Error::InvalidSessionCookie)?;

		Ok(Session {
			id: session_id,
			user,
		})
	}
}

impl OperationInput for Session {
	/// Operation input for the session extractor.
	///
	/// This adds a session cookie requirement to the `OpenAPI` operation.
	fn operation_input(_ctx: &mut aide::gen::GenContext, operation: &mut aide::openapi::Operation) {
		operation.security.push(
			[(SECURITY_SCHEME_SESSION.to_string(), Vec::new())]
				.into_iter()
				.collect(),
		);
	}
}
