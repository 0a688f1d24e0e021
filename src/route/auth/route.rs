use aide::axum::IntoApiResponse;
use argon2::Argon2;
use axum::{
	extract::State,
	http::{header, StatusCode},
};
use macros::route;
use uuid::Uuid;

use crate::{
	extract::{Json, Session},
	openapi::tag,
	page::ssg::ProfileProps,
	query::GetUserByUsername,
	session,
	store::{self, NewUser},
	AppState,
};

use super::{model, Error, RouteError};

pub const KEY_LENGTH: usize = 32;

/// Hashes a password with Argon2, using the user's id as a salt.
/// Since this is only used for logging in and creating a new password,
/// the scope of this function can remain in here with no issues.
fn hash_password(
	hasher: &Argon2,
	password: &str,
	id: &Uuid,
) -> Result<[u8; KEY_LENGTH], argon2::Error> {
	let mut hash = [0; KEY_LENGTH];

	hasher.hash_password_into(password.as_bytes(), id.as_bytes(), &mut hash)?;
	Ok(hash)
}

/// Checks the credentials and opens a new session for the user.
pub async fn authenticate(
	state: &AppState,
	auth: &model::LoginInput,
) -> Result<model::Session, RouteError> {
	let user = state
		.store
		.user_by_email(&auth.email)
		.await?
		.ok_or(Error::InvalidEmailOrPassword)?;

	let hashed = hash_password(&state.hasher, &auth.password, &user.id).map_err(Error::Argon)?;

	if user.password != hashed {
		return Err(Error::InvalidEmailOrPassword.into());
	}

	Ok(state.store.create_session(user.id).await?)
}

/// Creates the account and its first session.
pub async fn register_user(
	state: &AppState,
	auth: model::RegisterInput,
) -> Result<model::Session, RouteError> {
	let user_id = Uuid::new_v4();
	let hashed = hash_password(&state.hasher, &auth.password, &user_id).map_err(Error::Argon)?;

	let username = auth.username.clone();
	let session = state
		.store
		.register(NewUser {
			id: user_id,
			email: auth.email,
			password: hashed.to_vec(),
			username: auth.username,
			profile_image_url: auth
				.profile_image_url
				.unwrap_or_else(|| model::DEFAULT_PROFILE_IMAGE_URL.to_owned()),
		})
		.await
		.map_err(|e| match e {
			store::Error::EmailTaken => Error::EmailTaken.into(),
			store::Error::UsernameTaken => Error::UsernameTaken.into(),
			e => RouteError::from(e),
		})?;

	// A cached "no such user" for this handle is no longer true
	if let Some(username) = username {
		state.pages.profiles.invalidate(&ProfileProps {
			username: username.clone(),
		});
		state.queries.invalidate(&GetUserByUsername { username });
	}

	Ok(session)
}

/// Log in
/// Logs in to an account, returning an associated session cookie.
#[route(tag = tag::AUTH, id = "auth.login", response(status = 200, description = "Logged in successfully.", shape = "Json<model::Session>"))]
pub async fn login(
	State(state): State<AppState>,
	Json(auth): Json<model::LoginInput>,
) -> Result<impl IntoApiResponse, RouteError> {
	let session = authenticate(&state, &auth).await?;
	let cookie = session::create_cookie(session.id);

	Ok(([(header::SET_COOKIE, cookie.to_string())], Json(session)))
}

/// Log out
/// Logs out of the authenticated account and clears the session cookie.
#[route(tag = tag::AUTH, id = "auth.logout", response(status = 204, description = "Logged out successfully."))]
pub async fn logout(
	State(state): State<AppState>,
	session: Session,
) -> Result<impl IntoApiResponse, RouteError> {
	state.store.delete_session(session.id).await?;

	// Clear the session cookie
	Ok((
		[(header::SET_COOKIE, session::clear_cookie().to_string())],
		StatusCode::NO_CONTENT,
	))
}

/// Register account
/// Registers a new account, returning an associated session cookie.
#[route(tag = tag::AUTH, id = "auth.register", response(status = 200, description = "Registered successfully.", shape = "Json<model::Session>"))]
pub async fn register(
	State(state): State<AppState>,
	Json(auth): Json<model::RegisterInput>,
) -> Result<impl IntoApiResponse, RouteError> {
	let session = register_user(&state, auth).await?;
	let cookie = session::create_cookie(session.id);

	Ok(([(header::SET_COOKIE, cookie.to_string())], Json(session)))
}

/// Get user
/// Returns the authenticated user.
#[route(tag = tag::AUTH, id = "auth.me")]
pub async fn get_me(session: Session) -> Json<model::User> {
	Json(session.user)
}
