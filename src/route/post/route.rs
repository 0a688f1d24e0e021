use axum::extract::State;
use macros::route;

use crate::{
	extract::{Json, Path, Session},
	openapi::tag,
	route::model::IdInput,
	store::{SharedStore, FEED_LIMIT},
	AppState,
};

use super::{model, Error, RouteError};

/// Get all posts
/// Returns the most recent posts with their authors, newest first.
#[route(tag = tag::POST, id = "posts.getAll")]
pub async fn get_all(
	State(store): State<SharedStore>,
) -> Result<Json<Vec<model::PostWithAuthor>>, RouteError> {
	Ok(Json(store.recent_posts(FEED_LIMIT).await?))
}

/// Get posts of a user
/// Returns the most recent posts of a single user, newest first.
#[route(tag = tag::POST, id = "posts.getPostsByUserId")]
pub async fn get_posts_by_user_id(
	State(store): State<SharedStore>,
	Path(path): Path<model::UserIdInput>,
) -> Result<Json<Vec<model::PostWithAuthor>>, RouteError> {
	Ok(Json(store.posts_by_author(path.user_id, FEED_LIMIT).await?))
}

/// Get single post
/// Returns a single post and its author by the post's unique id.
#[route(tag = tag::POST, id = "posts.getById")]
pub async fn get_by_id(
	State(store): State<SharedStore>,
	Path(path): Path<IdInput>,
) -> Result<Json<model::PostWithAuthor>, RouteError> {
	let post = store.post(path.id).await?;

	Ok(Json(post.ok_or(Error::UnknownPost(path.id))?))
}

/// Create post
/// Creates a new post as the authenticated user.
#[route(tag = tag::POST, id = "posts.create")]
pub async fn create(
	State(state): State<AppState>,
	session: Session,
	Json(input): Json<model::CreatePostInput>,
) -> Result<Json<model::Post>, RouteError> {
	let post = state.queries.create_post(session.user.id, &input).await?;

	state.queries.invalidate_feeds(post.author_id);

	tracing::info!(post = %post.id, author = %post.author_id, "created post");

	Ok(Json(post))
}
