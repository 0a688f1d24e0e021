//! The HTML pages. They read through the shared query client, never the
//! store, so a page and the JSON route serving the same data agree.

pub mod ssg;

use std::collections::HashMap;

use axum::{
	extract::{Path, State},
	http::{header, StatusCode},
	response::{IntoResponse, Redirect, Response},
	routing::get,
	Router,
};
use chrono::Utc;
use validator::Validate;

pub use ssg::Pages;

use crate::{
	error::{self, ErrorShape},
	extract::{Form, Session},
	query::{GetAll, GetById, GetPostsByUserId, GetUserByUsername, QueryState},
	route::{
		auth::{self, model::{LoginInput, RegisterInput}},
		post::model::CreatePostInput,
	},
	session,
	view::{self, escape, layout, post_view, Composer, FeedView, Page},
	AppState,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("missing route parameter `{0}`")]
	MissingParam(&'static str),
}

impl ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::MissingParam(..) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	fn errors(&self) -> Vec<error::Message<'_>> {
		vec![error::Message::new("internal_error")]
	}
}

impl IntoResponse for Error {
	fn into_response(self) -> Response {
		tracing::error!(error = %self, "failed to build page");

		Page::failed(self.status()).into_response()
	}
}

pub fn routes() -> Router<AppState> {
	Router::new()
		.route("/", get(home).post(compose))
		.route("/sign-in", get(sign_in_page).post(sign_in))
		.route("/sign-up", get(sign_in_page).post(sign_up))
		.route("/sign-out", get(sign_out))
		.route("/post/:id", get(post_page))
		.route("/:slug", get(profile_page))
}

async fn render_home(state: &AppState, composer: Option<&Composer>) -> Page {
	let bar = match composer {
		Some(composer) => format!(
			"{}<div class=\"bar\"><a href=\"/sign-out\">Sign out</a></div>",
			composer.render()
		),
		None => "<div class=\"bar\"><a href=\"/sign-in\">Sign in</a></div>".into(),
	};

	let feed = state.queries.fetch(&GetAll).await;

	Page::new(layout(&format!(
		"{bar}{}",
		FeedView::from_state(&feed).render(Utc::now())
	)))
}

async fn home(State(state): State<AppState>, session: Option<Session>) -> Page {
	let composer = Composer::for_identity(session.map(|session| session.user.author()));

	render_home(&state, composer.as_ref()).await
}

async fn compose(
	State(state): State<AppState>,
	session: Option<Session>,
	Form(input): Form<CreatePostInput>,
) -> Response {
	let Some(mut composer) = Composer::for_identity(session.map(|session| session.user.author()))
	else {
		return Redirect::to("/sign-in").into_response();
	};

	composer.set_input(input.content);

	match composer.submit(&state.queries).await {
		Ok(post) => {
			tracing::info!(post = %post.id, author = %post.author_id, "created post");

			Redirect::to("/").into_response()
		}
		Err(error) => {
			let status = match error {
				view::ComposerError::Rejected(ref error) => error.status(),
				view::ComposerError::InFlight => StatusCode::CONFLICT,
			};

			if status.is_server_error() {
				tracing::error!(%error, "failed to create post");
			}

			render_home(&state, Some(&composer))
				.await
				.status(status)
				.into_response()
		}
	}
}

fn auth_forms(error: Option<&str>) -> String {
	let error = error.map_or_else(String::new, |error| {
		format!(
			"<div class=\"bar error\" role=\"alert\">{}</div>",
			escape(error)
		)
	});

	format!(
		"{error}\
		 <form class=\"bar\" method=\"post\" action=\"/sign-in\">\
		 <input name=\"email\" type=\"email\" placeholder=\"Email\" required>\
		 <input name=\"password\" type=\"password\" placeholder=\"Password\" required>\
		 <button type=\"submit\">Sign in</button></form>\
		 <form class=\"bar\" method=\"post\" action=\"/sign-up\">\
		 <input name=\"email\" type=\"email\" placeholder=\"Email\" required>\
		 <input name=\"username\" type=\"text\" placeholder=\"Username\">\
		 <input name=\"password\" type=\"password\" placeholder=\"Password\" required>\
		 <button type=\"submit\">Sign up</button></form>"
	)
}

async fn sign_in_page() -> Page {
	Page::new(layout(&auth_forms(None))).title("Sign in")
}

/// Sets the session cookie and goes home, or shows the forms again.
fn signed_in(result: Result<auth::model::Session, auth::RouteError>) -> Response {
	match result {
		Ok(session) => (
			[(
				header::SET_COOKIE,
				session::create_cookie(session.id).to_string(),
			)],
			Redirect::to("/"),
		)
			.into_response(),
		Err(error) => {
			let status = error.status();

			if status.is_server_error() {
				tracing::error!(%error, "failed to sign in");
			}

			let message = error
				.errors()
				.into_iter()
				.next()
				.map_or_else(|| "Something went wrong".into(), |message| message.content.into_owned());

			Page::new(layout(&auth_forms(Some(&message))))
				.title("Sign in")
				.status(status)
				.into_response()
		}
	}
}

async fn sign_in(State(state): State<AppState>, Form(input): Form<LoginInput>) -> Response {
	let result = match input.validate() {
		Ok(()) => auth::authenticate(&state, &input).await,
		Err(error) => Err(error.into()),
	};

	signed_in(result)
}

async fn sign_up(State(state): State<AppState>, Form(mut input): Form<RegisterInput>) -> Response {
	// Empty form fields mean "not provided"
	input.username = input.username.filter(|username| !username.is_empty());
	input.profile_image_url = input.profile_image_url.filter(|url| !url.is_empty());

	let result = match input.validate() {
		Ok(()) => auth::register_user(&state, input).await,
		Err(error) => Err(error.into()),
	};

	signed_in(result)
}

async fn sign_out(State(state): State<AppState>, session: Option<Session>) -> Response {
	if let Some(session) = session {
		if let Err(error) = state.store.delete_session(session.id).await {
			tracing::error!(%error, "failed to delete session");
		}
	}

	(
		[(header::SET_COOKIE, session::clear_cookie().to_string())],
		Redirect::to("/"),
	)
		.into_response()
}

async fn post_page(
	State(state): State<AppState>,
	Path(params): Path<HashMap<String, String>>,
) -> Result<Page, Error> {
	let payload = state.pages.posts.get_or_build(&state.store, &params).await?;

	state.queries.hydrate(&payload.snapshot);

	let query = GetById {
		id: payload.props.id.clone(),
	};

	Ok(match state.queries.fetch(&query).await {
		QueryState::Pending => Page::new(layout(&view::loading())),
		QueryState::Failed(..) => Page::failed(StatusCode::INTERNAL_SERVER_ERROR),
		QueryState::Ready(None) => Page::not_found(),
		QueryState::Ready(Some(row)) => Page::new(layout(&post_view(&row, Utc::now())))
			.title(format!("{} - @{}", row.post.content, row.author.handle()))
			.snapshot(payload.snapshot),
	})
}

async fn profile_page(
	State(state): State<AppState>,
	Path(params): Path<HashMap<String, String>>,
) -> Result<Page, Error> {
	let payload = state
		.pages
		.profiles
		.get_or_build(&state.store, &params)
		.await?;

	state.queries.hydrate(&payload.snapshot);

	let query = GetUserByUsername {
		username: payload.props.username.clone(),
	};

	let author = match state.queries.fetch(&query).await {
		QueryState::Pending => return Ok(Page::new(layout(&view::loading()))),
		QueryState::Failed(..) => return Ok(Page::failed(StatusCode::INTERNAL_SERVER_ERROR)),
		QueryState::Ready(None) => return Ok(Page::not_found()),
		QueryState::Ready(Some(author)) => author,
	};

	let posts = state
		.queries
		.fetch(&GetPostsByUserId { user_id: author.id })
		.await;

	let handle = escape(author.handle());
	let body = format!(
		"<div class=\"banner\"><img src=\"{image}\" alt=\"{handle}'s profile pic\" width=\"128\" height=\"128\"></div>\
		 <div class=\"handle\">@{handle}</div>{feed}",
		image = escape(&author.profile_image_url),
		feed = FeedView::from_state(&posts).render(Utc::now()),
	);

	Ok(Page::new(layout(&body))
		.title(author.handle())
		.snapshot(payload.snapshot))
}
