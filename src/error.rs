use std::borrow::Cow;

use aide::OperationOutput;
use axum::{
	body::Body,
	extract::rejection,
	http::{Response, StatusCode},
	response::IntoResponse,
	Json,
};
use axum_jsonschema::JsonSchemaRejection;
use schemars::JsonSchema;
use serde::Serialize;
use tower_governor::GovernorError;

use crate::store;

pub type Map = serde_json::Map<String, serde_json::Value>;

/// Application-wide errors that any route can produce.
///
/// The Display trait is not sent to the client, so it can show
/// sensitive information.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
	#[error("validation error: {0}")]
	Validation(#[from] validator::ValidationErrors),
	/// A rejected JSON body, already described for the client.
	#[error("json error: {0:?}")]
	Json(Vec<Message<'static>>),
	#[error("path error: {0}")]
	Path(#[from] rejection::PathRejection),
	#[error("form error: {0}")]
	Form(#[from] rejection::FormRejection),
	#[error("store error: {0}")]
	Store(#[from] store::Error),
	#[error("rate limit error: {0}")]
	RateLimit(#[from] GovernorError),
}

/// A single error message sent to the client.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct Message<'a> {
	/// A machine-readable error code or a human-readable message.
	pub content: Cow<'a, str>,
	/// The input field that caused the error, if any.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub field: Option<Cow<'a, str>>,
	/// Additional details about the error.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<Cow<'a, Map>>,
}

impl<'a> Message<'a> {
	pub fn new(content: impl Into<Cow<'a, str>>) -> Self {
		Self {
			content: content.into(),
			field: None,
			details: None,
		}
	}
}

/// Turns a JSON pointer (`/post/content`) into a field name (`post.content`).
fn pointer_to_field(pointer: &str) -> Option<Cow<'static, str>> {
	let field = pointer.trim_start_matches('/').replace('/', ".");

	(!field.is_empty()).then(|| field.into())
}

impl From<JsonSchemaRejection> for AppError {
	fn from(rejection: JsonSchemaRejection) -> Self {
		let messages = match rejection {
			JsonSchemaRejection::Json(error) => vec![Message::new(error.body_text())],
			JsonSchemaRejection::Serde(error) => {
				let path = error.path().to_string();

				vec![Message {
					content: error.inner().to_string().into(),
					field: (path != ".").then(|| path.into()),
					details: None,
				}]
			}
			JsonSchemaRejection::Schema(units) => units
				.into_iter()
				.map(|unit| Message {
					content: unit.error_description().to_string().into(),
					field: pointer_to_field(&unit.instance_location().to_string()),
					details: None,
				})
				.collect(),
		};

		Self::Json(messages)
	}
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse<'a> {
	pub success: bool,
	pub errors: Vec<Message<'a>>,
}

/// Describes how a route-specific error is presented to the client.
pub trait ErrorShape: std::fmt::Display {
	fn status(&self) -> StatusCode;
	fn errors(&self) -> Vec<Message<'_>>;
}

/// Either an application-wide error or one specific to a group of routes.
#[derive(Debug)]
pub enum RouteError<T> {
	App(AppError),
	Route(T),
}

impl<T: ErrorShape> From<T> for RouteError<T> {
	fn from(error: T) -> Self {
		Self::Route(error)
	}
}

impl<T> From<AppError> for RouteError<T> {
	fn from(error: AppError) -> Self {
		Self::App(error)
	}
}

impl<T> From<store::Error> for RouteError<T> {
	fn from(error: store::Error) -> Self {
		Self::App(AppError::Store(error))
	}
}

impl<T> From<validator::ValidationErrors> for RouteError<T> {
	fn from(error: validator::ValidationErrors) -> Self {
		Self::App(AppError::Validation(error))
	}
}

impl<T: ErrorShape> std::fmt::Display for RouteError<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::App(error) => error.fmt(f),
			Self::Route(error) => error.fmt(f),
		}
	}
}

impl<T: ErrorShape> RouteError<T> {
	pub fn status(&self) -> StatusCode {
		match self {
			Self::App(error) => error.status(),
			Self::Route(error) => error.status(),
		}
	}

	pub fn errors(&self) -> Vec<Message<'_>> {
		match self {
			Self::App(error) => error.errors(),
			Self::Route(error) => error.errors(),
		}
	}
}

impl AppError {
	pub fn status(&self) -> StatusCode {
		match self {
			Self::Validation(..) | Self::Json(..) | Self::Path(..) | Self::Form(..) => {
				StatusCode::BAD_REQUEST
			}
			Self::RateLimit(GovernorError::TooManyRequests { .. }) => StatusCode::TOO_MANY_REQUESTS,
			Self::Store(..) | Self::RateLimit(..) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	pub fn errors(&self) -> Vec<Message<'_>> {
		match self {
			Self::Validation(errors) => errors
				.field_errors()
				.into_iter()
				.flat_map(|(field, errors)| {
					errors.iter().map(move |error| Message {
						content: error.message.clone().unwrap_or(error.code.clone()),
						field: Some(Cow::Owned(field.to_string())),
						details: None,
					})
				})
				.collect(),
			Self::Json(messages) => messages.clone(),
			Self::Path(error) => vec![Message::new(error.body_text())],
			Self::Form(error) => vec![Message::new(error.body_text())],
			Self::RateLimit(GovernorError::TooManyRequests { wait_time, .. }) => vec![Message {
				content: "too_many_requests".into(),
				field: None,
				details: Some(Cow::Owned({
					let mut map = Map::new();
					map.insert("wait_time".into(), serde_json::json!(wait_time));
					map
				})),
			}],
			Self::Store(..) | Self::RateLimit(..) => Vec::new(),
		}
	}
}

impl IntoResponse for AppError {
	fn into_response(self) -> Response<Body> {
		let status = self.status();

		if status.is_server_error() {
			tracing::error!(error = %self, "request failed");
		}

		(
			status,
			Json(ErrorResponse {
				success: false,
				errors: self.errors(),
			}),
		)
			.into_response()
	}
}

impl<T: ErrorShape> IntoResponse for RouteError<T> {
	fn into_response(self) -> Response<Body> {
		match self {
			Self::App(error) => error.into_response(),
			Self::Route(error) => (
				error.status(),
				Json(ErrorResponse {
					success: false,
					errors: error.errors(),
				}),
			)
				.into_response(),
		}
	}
}

impl OperationOutput for AppError {
	type Inner = Self;
}

impl<T> OperationOutput for RouteError<T> {
	type Inner = Self;
}

#[cfg(test)]
mod test {
	use axum::http::StatusCode;
	use validator::Validate;

	use super::*;

	#[derive(Validate)]
	struct Input {
		#[validate(length(min = 1, max = 4))]
		content: String,
	}

	#[test]
	fn test_validation_errors_name_the_field() {
		let error = AppError::from(
			Input {
				content: String::new(),
			}
			.validate()
			.unwrap_err(),
		);

		assert_eq!(error.status(), StatusCode::BAD_REQUEST);

		let errors = error.errors();

		assert_eq!(errors.len(), 1);
		assert_eq!(errors[0].field.as_deref(), Some("content"));
		assert_eq!(errors[0].content, "length");
	}

	#[test]
	fn test_json_pointers_become_field_names() {
		assert_eq!(pointer_to_field("/content").as_deref(), Some("content"));
		assert_eq!(pointer_to_field("/post/content").as_deref(), Some("post.content"));
		assert_eq!(pointer_to_field(""), None);
	}

	#[test]
	fn test_store_errors_hide_details() {
		let error = AppError::from(store::Error::MissingAuthor(uuid::Uuid::nil()));

		assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
		assert!(error.errors().is_empty());
	}
}
