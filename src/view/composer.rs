use super::escape;
use crate::{
	error::AppError,
	query::QueryClient,
	route::post::model::{Author, CreatePostInput, Post},
};

const GENERIC_ERROR: &str = "Failed to post! Please try again later.";

#[derive(Debug, thiserror::Error)]
pub enum ComposerError {
	#[error("a post is already being sent")]
	InFlight,
	#[error("post rejected: {0}")]
	Rejected(#[from] AppError),
}

/// The post composer of the signed-in user.
///
/// Holds a single text buffer. While a submission is in flight the input is
/// disabled and further submissions are refused.
#[derive(Debug, Clone)]
pub struct Composer {
	author: Author,
	input: String,
	in_flight: bool,
	error: Option<String>,
}

impl Composer {
	/// There is nothing to compose without a signed-in user.
	pub fn for_identity(author: Option<Author>) -> Option<Self> {
		author.map(|author| Self {
			author,
			input: String::new(),
			in_flight: false,
			error: None,
		})
	}

	pub fn input(&self) -> &str {
		&self.input
	}

	pub fn set_input(&mut self, input: impl Into<String>) {
		self.input = input.into();
	}

	pub fn is_disabled(&self) -> bool {
		self.in_flight
	}

	pub fn error(&self) -> Option<&str> {
		self.error.as_deref()
	}

	/// Starts a submission of the current input, exactly as typed.
	pub fn begin(&mut self) -> Result<CreatePostInput, ComposerError> {
		if self.in_flight {
			return Err(ComposerError::InFlight);
		}

		self.in_flight = true;
		self.error = None;

		Ok(CreatePostInput {
			content: self.input.clone(),
		})
	}

	/// Ends the submission in flight, returning whether it was accepted.
	///
	/// The input is only cleared once the post has been stored.
	pub fn settle(&mut self, result: &Result<Post, AppError>) -> bool {
		self.in_flight = false;

		match result {
			Ok(..) => {
				self.input.clear();
				true
			}
			Err(error) => {
				self.error = Some(if error.status().is_client_error() {
					error
						.errors()
						.into_iter()
						.next()
						.map_or_else(|| GENERIC_ERROR.into(), |message| message.content.into_owned())
				} else {
					GENERIC_ERROR.into()
				});

				false
			}
		}
	}

	/// Sends the input through the `posts.create` mutation. On success the
	/// feeds showing the new post are invalidated once.
	pub async fn submit(&mut self, client: &QueryClient) -> Result<Post, ComposerError> {
		let input = self.begin()?;
		let result = client.create_post(self.author.id, &input).await;

		if self.settle(&result) {
			client.invalidate_feeds(self.author.id);
		}

		Ok(result?)
	}

	pub fn render(&self) -> String {
		let disabled = if self.is_disabled() { " disabled" } else { "" };
		let error = self.error().map_or_else(String::new, |error| {
			format!("<span class=\"error\" role=\"alert\">{}</span>", escape(error))
		});

		format!(
			"<form class=\"bar\" method=\"post\" action=\"/\">\
			 <img class=\"avatar\" src=\"{image}\" alt=\"Profile Image\" width=\"56\" height=\"56\">\
			 <input name=\"content\" type=\"text\" placeholder=\"Type something...\" value=\"{value}\"{disabled}>\
			 <button type=\"submit\">Post</button>{error}</form>",
			image = escape(&self.author.profile_image_url),
			value = escape(&self.input),
		)
	}
}
