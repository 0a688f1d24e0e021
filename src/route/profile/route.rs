use axum::extract::State;
use macros::route;

use crate::{
	extract::{Json, Path},
	openapi::tag,
	store::SharedStore,
};

use super::{model, Error, RouteError};

/// Get user by username
/// Returns the public profile of a user by their handle, without the `@`.
#[route(tag = tag::PROFILE, id = "profile.getUserByUsername")]
pub async fn get_user_by_username(
	State(store): State<SharedStore>,
	Path(path): Path<model::UsernameInput>,
) -> Result<Json<model::Author>, RouteError> {
	let author = store.author_by_username(&path.username).await?;

	Ok(Json(author.ok_or(Error::UnknownUser(path.username))?))
}
